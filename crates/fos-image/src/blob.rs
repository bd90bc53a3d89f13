//! Blob URLs
//!
//! In-memory bytes addressable as `blob:` URLs minted for the loading
//! context's origin.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use fos_security::Origin;

/// Registry of blob URLs
#[derive(Debug)]
pub struct BlobRegistry {
    prefix: String,
    next_id: AtomicU64,
    blobs: Mutex<HashMap<String, Arc<[u8]>>>,
}

impl BlobRegistry {
    /// Registry minting URLs under `origin`
    pub fn new(origin: &Origin) -> Self {
        // Opaque origins serialize as "null", which would not parse back to
        // the same origin.
        let prefix = if origin.is_opaque() {
            format!("blob:{}://", origin.scheme)
        } else {
            format!("blob:{}", origin.serialize())
        };

        Self {
            prefix,
            next_id: AtomicU64::new(1),
            blobs: Mutex::new(HashMap::new()),
        }
    }

    /// Store bytes and return the URL they are reachable at
    pub fn register(&self, bytes: impl Into<Vec<u8>>) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let url = format!("{}/{id:016x}", self.prefix);
        let bytes: Vec<u8> = bytes.into();
        let data: Arc<[u8]> = bytes.into();
        tracing::debug!(%url, len = data.len(), "blob registered");
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.clone(), data);
        url
    }

    pub fn get(&self, url: &str) -> Option<Arc<[u8]>> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
    }

    /// Forget a URL. Loads already holding the bytes are unaffected.
    pub fn revoke(&self, url: &str) -> bool {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(url)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_revoke() {
        let registry = BlobRegistry::new(&Origin::new("https", "example.com", None));
        let url = registry.register(vec![1, 2, 3]);
        assert!(url.starts_with("blob:https://example.com/"));
        assert_eq!(registry.get(&url).as_deref(), Some(&[1u8, 2, 3][..]));

        assert!(registry.revoke(&url));
        assert!(!registry.revoke(&url));
        assert!(registry.get(&url).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_urls_are_unique() {
        let registry = BlobRegistry::new(&Origin::new("https", "example.com", None));
        let a = registry.register(vec![0]);
        let b = registry.register(vec![0]);
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_opaque_origin_round_trips() {
        let origin = Origin::new("file", "", None);
        let registry = BlobRegistry::new(&origin);
        let url = registry.register(vec![0]);
        assert!(Origin::parse(&url).unwrap().is_same_origin(&origin));
    }
}
