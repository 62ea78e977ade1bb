// common/src/models/notification.rs
use serde::{Deserialize, Serialize};

/// How long a notification stays visible unless configured otherwise
pub const DEFAULT_AUTO_HIDE_MS: u64 = 6000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Success,
    Error,
}

/// Transient message for the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    pub visible: bool,
    pub auto_hide_ms: u64,
}

impl Default for Notification {
    fn default() -> Self {
        Self {
            message: String::new(),
            severity: Severity::Info,
            visible: false,
            auto_hide_ms: DEFAULT_AUTO_HIDE_MS,
        }
    }
}

impl Notification {
    pub fn new(message: impl Into<String>, severity: Severity, auto_hide_ms: u64) -> Self {
        Self {
            message: message.into(),
            severity,
            visible: true,
            auto_hide_ms,
        }
    }
}
