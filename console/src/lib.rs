// console/src/lib.rs
//! Session-gated console for billing client accounts.
//!
//! [`SessionManager`] owns the operator's token and its expiry;
//! [`ClientGateway`] checks it before every call to the backend.

pub mod backend;
pub mod clock;
pub mod errors;
pub mod gateway;
pub mod notifier;
pub mod session;
pub mod storage;
pub mod table;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use backend::{AuthBackend, BackendError, ClientBackend, HttpBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{AuthError, GatewayError, SessionError};
pub use gateway::{ClientCache, ClientGateway};
pub use notifier::Notifier;
pub use session::{SessionManager, SessionObserver};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
pub use table::ClientTable;
pub use validation::{ClientForm, FieldErrors, ProvisionForm};
