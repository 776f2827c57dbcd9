pub mod clients;
pub mod config;
pub mod entitlements;
pub mod errors;
pub mod telemetry;
pub mod types;

pub use errors::{CoreError, CoreResult, ErrorClass, ErrorCode};
pub use types::*;
