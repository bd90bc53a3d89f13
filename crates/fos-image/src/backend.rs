//! Image backends
//!
//! A backend constructs handles and runs the native load once a handle has
//! its source. Whatever it does, it fires exactly one completion on the
//! handle, or drops it.

use std::sync::Arc;

use fos_net::{FetchMode, Transport};
use url::Url;

use crate::blob::BlobRegistry;
use crate::decoder::{self, DecodedImage};
use crate::handle::ImageHandle;
use crate::locator::{is_data_uri, DataUri};
use crate::LoadError;

/// Constructs image handles and starts their loads.
pub trait ImageBackend: Send + Sync {
    /// Construct a fresh handle
    fn create_image(&self) -> ImageHandle {
        ImageHandle::new()
    }

    /// Start loading `handle.src()`. May complete before returning.
    fn begin(&self, handle: ImageHandle);
}

/// Loads data URIs and blobs inline, and network and file sources on the
/// smol executor.
pub struct DefaultBackend {
    transport: Arc<dyn Transport>,
    blobs: Arc<BlobRegistry>,
}

impl DefaultBackend {
    pub fn new(transport: Arc<dyn Transport>, blobs: Arc<BlobRegistry>) -> Self {
        Self { transport, blobs }
    }

    pub fn blobs(&self) -> &Arc<BlobRegistry> {
        &self.blobs
    }

    fn load_data_uri(src: &str) -> Result<DecodedImage, LoadError> {
        let uri = DataUri::parse(src)?;
        decoder::decode(&uri.data)
    }

    fn load_blob(&self, src: &str) -> Result<DecodedImage, LoadError> {
        let bytes = self
            .blobs
            .get(src)
            .ok_or_else(|| LoadError::BlobNotFound(src.to_string()))?;
        decoder::decode(&bytes)
    }

    fn spawn_fetch(&self, url: Url, handle: ImageHandle) {
        let fetch = self
            .transport
            .fetch(&url, FetchMode::from_cors(handle.cross_origin()));

        smol::spawn(async move {
            let result = match fetch.await {
                Ok(bytes) => decoder::decode(&bytes),
                Err(e) => Err(LoadError::from(e)),
            };
            handle.complete(result);
        })
        .detach();
    }

    fn spawn_file_read(url: Url, handle: ImageHandle) {
        let Ok(path) = url.to_file_path() else {
            handle.complete(Err(LoadError::InvalidLocator(url.into())));
            return;
        };

        smol::spawn(async move {
            let result = match smol::fs::read(&path).await {
                Ok(bytes) => decoder::decode(&bytes),
                Err(e) => Err(LoadError::from(e)),
            };
            handle.complete(result);
        })
        .detach();
    }
}

impl ImageBackend for DefaultBackend {
    fn begin(&self, handle: ImageHandle) {
        let Some(src) = handle.src().map(str::to_owned) else {
            handle.complete(Err(LoadError::MissingLocator));
            return;
        };

        if is_data_uri(&src) {
            let result = Self::load_data_uri(&src);
            handle.complete(result);
            return;
        }

        let url = match Url::parse(&src) {
            Ok(url) => url,
            Err(e) => {
                handle.complete(Err(LoadError::InvalidLocator(format!("{src}: {e}"))));
                return;
            }
        };

        match url.scheme() {
            "blob" => {
                let result = self.load_blob(&src);
                handle.complete(result);
            }
            "http" | "https" => self.spawn_fetch(url, handle),
            "file" => Self::spawn_file_read(url, handle),
            other => {
                let scheme = other.to_string();
                handle.complete(Err(LoadError::UnsupportedScheme(scheme)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fos_net::{FetchFuture, NetError};
    use fos_security::Origin;
    use std::sync::mpsc;

    struct NoTransport;

    impl Transport for NoTransport {
        fn fetch(&self, url: &Url, _mode: FetchMode) -> FetchFuture {
            let url = url.to_string();
            Box::pin(async move { Err(NetError::Network(format!("offline: {url}"))) })
        }
    }

    fn backend() -> DefaultBackend {
        let blobs = Arc::new(BlobRegistry::new(&Origin::new("https", "example.com", None)));
        DefaultBackend::new(Arc::new(NoTransport), blobs)
    }

    fn run(backend: &DefaultBackend, src: &str) -> Result<(u32, u32), String> {
        let (tx, rx) = mpsc::channel();
        let tx_err = tx.clone();
        let mut handle = backend.create_image();
        handle.set_onload(move |img| tx.send(Ok((img.width(), img.height()))).unwrap());
        handle.set_onerror(move |e| tx_err.send(Err(e.to_string())).unwrap());
        handle.set_src(src);
        backend.begin(handle);
        rx.recv().unwrap()
    }

    #[test]
    fn test_unsupported_scheme() {
        let err = run(&backend(), "ftp://example.com/a.png").unwrap_err();
        assert!(err.contains("Unsupported scheme"));
    }

    #[test]
    fn test_missing_src() {
        assert!(run(&backend(), "").is_err());
    }

    #[test]
    fn test_unknown_blob() {
        let err = run(&backend(), "blob:https://example.com/404").unwrap_err();
        assert!(err.contains("Blob not found"));
    }

    #[test]
    fn test_network_error_fires_onerror() {
        let err = run(&backend(), "https://example.invalid/a.png").unwrap_err();
        assert!(err.contains("offline"));
    }

    #[test]
    fn test_bad_data_uri_fires_onerror() {
        assert!(run(&backend(), "data:image/png;base64,@@@").is_err());
    }
}
