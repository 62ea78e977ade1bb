// common/src/models/client.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A billing account as returned by `GetCredits`.
///
/// The serialized names are the ones the backend uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: String,
    #[serde(rename = "nombre")]
    pub display_name: String,
    pub email: String,
    /// Available balance
    #[serde(rename = "saldo", default)]
    pub balance: f64,
    /// Date of the last provisioning, if any
    #[serde(rename = "fecha", default, skip_serializing_if = "Option::is_none")]
    pub last_provisioned_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Body of `POST /Api/CreateClient`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateClientRequest {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Mail")]
    pub mail: String,
}

/// Body of `PATCH /api/Client`.
///
/// An update carries name and mail; a soft-delete carries only `Status: 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateClientRequest {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "Mail", default, skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,
    #[serde(rename = "Status", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i32>,
}

/// Status flag value marking a client inactive
pub const CLIENT_STATUS_INACTIVE: i32 = 0;

impl UpdateClientRequest {
    pub fn details(id: &str, name: &str, mail: &str) -> Self {
        Self {
            id: id.to_string(),
            name: Some(name.to_string()),
            mail: Some(mail.to_string()),
            status: None,
        }
    }

    pub fn deactivate(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            mail: None,
            status: Some(CLIENT_STATUS_INACTIVE),
        }
    }
}

/// Body of `POST /api/AsignCredits`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionRequest {
    #[serde(rename = "IdCliente")]
    pub client_id: String,
    #[serde(rename = "Cantidad")]
    pub amount: f64,
    /// Discount option id
    #[serde(rename = "Tipo")]
    pub discount_type: i64,
    /// Applied discount percentage
    #[serde(rename = "Descuento")]
    pub discount: f64,
}

/// Body of `POST /api/GetReport`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRequest {
    #[serde(rename = "IdClient")]
    pub client_id: String,
    #[serde(rename = "Month")]
    pub month: u32,
    #[serde(rename = "Year")]
    pub year: i32,
}

/// Month and year a report covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub month: u32,
    pub year: i32,
}

/// First year reports are available for
pub const FIRST_REPORT_YEAR: i32 = 2024;
