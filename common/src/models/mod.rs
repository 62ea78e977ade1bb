// common/src/models/mod.rs
pub mod client;
pub mod discount;
pub mod notification;
pub mod session;

pub use client::*;
pub use discount::*;
pub use notification::*;
pub use session::*;
