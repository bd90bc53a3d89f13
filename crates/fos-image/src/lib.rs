//! fOS Image Loading
//!
//! Loads an image from a URL, a data URI or a blob URL and resolves to a
//! decoded [`ImageHandle`]. Throttle-eligible loads go through an
//! [`AdmissionGate`](fos_net::AdmissionGate) first and may not start at all.
//!
//! ```no_run
//! use fos_image::{CrossOriginPolicy, ImageLoader, LoadAttempt};
//!
//! # fn main() -> Result<(), fos_image::LoadError> {
//! let loader = ImageLoader::builder().base_url("https://app.example.com/").build()?;
//! if let LoadAttempt::Started(outcome) =
//!     loader.load("tiles/0/0/0.png", CrossOriginPolicy::Unspecified, None)?
//! {
//!     let image = smol::block_on(outcome.wait())?;
//!     println!("{}x{}", image.width(), image.height());
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod blob;
pub mod decoder;
pub mod handle;
pub mod loader;
pub mod locator;
pub mod settle;

pub use backend::{DefaultBackend, ImageBackend};
pub use blob::BlobRegistry;
pub use decoder::DecodedImage;
pub use handle::ImageHandle;
pub use loader::{ImageLoader, ImageLoaderBuilder, LoadAttempt, LoaderConfig};
pub use locator::{CrossOriginPolicy, DataUri, LoadingContext, LocatorKind, ResolvedLocator};
pub use settle::{LoadOutcome, Settler};

pub use fos_net::RequestDescriptor;
pub use fos_security::CorsSettings;

use fos_net::NetError;

/// Load a single image with the process-wide [`ImageLoader::shared`] loader.
///
/// Admission goes through the process-wide
/// [`RequestScheduler`](fos_net::RequestScheduler). Blob URLs are only
/// visible to the loader that registered them, so register them on the
/// shared loader to load them here.
pub fn load_image(
    locator: &str,
    policy: CrossOriginPolicy,
    request: Option<&RequestDescriptor>,
) -> Result<LoadAttempt, LoadError> {
    if locator.trim().is_empty() {
        return Err(LoadError::MissingLocator);
    }
    ImageLoader::shared()?.load(locator, policy, request)
}

/// Image loading error
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The caller passed no locator. Reported before anything starts.
    #[error("Image locator is missing or empty")]
    MissingLocator,

    /// The locator could not be resolved against the loading context.
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error(transparent)]
    Network(#[from] NetError),

    #[error("Image I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode failed: {0}")]
    Decode(String),

    /// The handle was dropped without either completion firing.
    #[error("Image load abandoned before completion")]
    Abandoned,
}

impl LoadError {
    /// Whether this is a caller mistake rather than a runtime load failure
    pub fn is_programmer_fault(&self) -> bool {
        matches!(self, LoadError::MissingLocator | LoadError::InvalidLocator(_))
    }
}
