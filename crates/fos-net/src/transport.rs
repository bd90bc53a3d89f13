//! Transport
//!
//! The seam between image loading and whatever actually moves bytes.

use std::future::Future;
use std::pin::Pin;

use fos_security::CorsSettings;
use url::Url;

use crate::NetError;

/// Boxed response-body future returned by a [`Transport`]
pub type FetchFuture = Pin<Box<dyn Future<Output = Result<Vec<u8>, NetError>> + Send>>;

/// Request mode of a fetch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchMode {
    /// Plain request, no `Origin` header
    #[default]
    NoCors,
    /// CORS request made under the element's `crossorigin` settings
    Cors(CorsSettings),
}

impl FetchMode {
    pub fn from_cors(settings: Option<CorsSettings>) -> Self {
        settings.map_or(FetchMode::NoCors, FetchMode::Cors)
    }
}

/// Fetches a response body.
pub trait Transport: Send + Sync {
    fn fetch(&self, url: &Url, mode: FetchMode) -> FetchFuture;
}
