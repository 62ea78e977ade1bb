// common/src/models/discount.rs
use serde::{Deserialize, Serialize};

/// Discount choice offered when provisioning a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountOption {
    #[serde(rename = "idType")]
    pub id: i64,
    #[serde(rename = "type")]
    pub label: String,
    #[serde(default)]
    pub percentage: f64,
}

/// Id of the option whose percentage is typed in by the operator
pub const FREE_DISCOUNT_ID: i64 = 0;

impl DiscountOption {
    pub fn is_free(&self) -> bool {
        self.id == FREE_DISCOUNT_ID
    }

    /// Label shown in option lists, e.g. `Partner | 10%`
    pub fn menu_label(&self) -> String {
        if self.is_free() {
            self.label.clone()
        } else {
            format!("{} | {}%", self.label, self.percentage)
        }
    }
}
