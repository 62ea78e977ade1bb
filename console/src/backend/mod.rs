// console/src/backend/mod.rs
pub mod http;

use async_trait::async_trait;
use common::{
    ClientRecord, CreateClientRequest, ProvisionRequest, ReportRequest, UpdateClientRequest,
};

pub use http::HttpBackend;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The backend answered with a non-success status
    #[error("backend returned status {0}")]
    Status(u16),
    /// Connection refused, timed out, or no response at all
    #[error("no response from backend: {0}")]
    NoResponse(String),
    #[error("transport error: {0}")]
    Transport(String),
    /// The response body could not be decoded
    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// Credential exchange
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Returns the raw token issued for these credentials
    async fn login(&self, email: &str, password: &str) -> Result<String, BackendError>;
}

/// Client record endpoints, all authorised by a bearer token
#[async_trait]
pub trait ClientBackend: Send + Sync {
    async fn list_clients(&self, token: &str) -> Result<Vec<ClientRecord>, BackendError>;

    async fn create_client(&self, token: &str, body: &CreateClientRequest) -> Result<(), BackendError>;

    async fn update_client(&self, token: &str, body: &UpdateClientRequest) -> Result<(), BackendError>;

    async fn provision(&self, token: &str, body: &ProvisionRequest) -> Result<(), BackendError>;

    /// Discount options as the backend sends them; see `gateway::decode_discounts`
    async fn discount_options(&self, token: &str) -> Result<serde_json::Value, BackendError>;

    async fn report(&self, token: &str, body: &ReportRequest) -> Result<Vec<u8>, BackendError>;
}
