//! fOS Networking
//!
//! Outbound request admission and the transport image loads fetch through.

pub mod client;
pub mod scheduler;
pub mod transport;

pub use client::{ClientConfig, HttpClient, HttpClientBuilder};
pub use scheduler::{
    Admission, AdmissionGate, Permit, RequestDescriptor, RequestKind, RequestScheduler,
    SchedulerConfig, SchedulerStats,
};
pub use transport::{FetchFuture, FetchMode, Transport};
pub use url::Url;

/// Network error
#[derive(Debug, Clone, thiserror::Error)]
pub enum NetError {
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
