// common/src/lib.rs
//! Types and helpers shared by the console and the stub backend.

pub mod models;
pub mod config;
pub mod utils;

pub use models::*;
pub use config::*;
pub use utils::*;
