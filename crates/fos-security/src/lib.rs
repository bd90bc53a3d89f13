//! fOS Security
//!
//! Origin model used to classify resource locators and the CORS
//! settings that cross-origin image requests carry.

pub mod origin;

pub use origin::{CorsSettings, Origin, default_port};

/// Security error
#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    #[error("Invalid origin: {0}")]
    InvalidOrigin(String),
}
