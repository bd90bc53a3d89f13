//! Locator classification
//!
//! Sorts a resource locator into data URI, same-origin or cross-origin
//! relative to the loading context, and decides the `crossorigin`
//! annotation that goes with it.

use base64::Engine;
use fos_security::{CorsSettings, Origin};
use percent_encoding::percent_decode_str;
use url::Url;

use crate::LoadError;

/// How a locator relates to the loading context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorKind {
    DataUri,
    SameOrigin,
    CrossOrigin,
}

/// Whether a cross-origin load should carry the anonymous annotation.
///
/// `Unspecified` and `Disabled` differ: only `Disabled` suppresses the
/// annotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CrossOriginPolicy {
    #[default]
    Unspecified,
    Enabled,
    Disabled,
}

impl CrossOriginPolicy {
    /// Annotation a handle gets for a locator of `kind`
    pub fn annotation(self, kind: LocatorKind) -> Option<CorsSettings> {
        match (kind, self) {
            (LocatorKind::CrossOrigin, CrossOriginPolicy::Disabled) => None,
            (LocatorKind::CrossOrigin, _) => Some(CorsSettings::Anonymous),
            (LocatorKind::DataUri | LocatorKind::SameOrigin, _) => None,
        }
    }
}

impl From<Option<bool>> for CrossOriginPolicy {
    fn from(flag: Option<bool>) -> Self {
        match flag {
            None => CrossOriginPolicy::Unspecified,
            Some(true) => CrossOriginPolicy::Enabled,
            Some(false) => CrossOriginPolicy::Disabled,
        }
    }
}

impl From<bool> for CrossOriginPolicy {
    fn from(flag: bool) -> Self {
        Some(flag).into()
    }
}

/// `data:` check, case-insensitive on the scheme
pub fn is_data_uri(locator: &str) -> bool {
    locator
        .trim_start()
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}

/// A locator after classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocator {
    pub kind: LocatorKind,
    /// Absolute form; data URIs are kept verbatim
    pub href: String,
}

/// The document-like context loads are made from
#[derive(Debug, Clone)]
pub struct LoadingContext {
    base: Url,
    origin: Origin,
}

impl LoadingContext {
    pub fn new(base: Url) -> Self {
        let origin = Origin::from_url(&base);
        Self { base, origin }
    }

    pub fn parse(base: &str) -> Result<Self, LoadError> {
        let base = Url::parse(base).map_err(|e| LoadError::InvalidLocator(format!("{base}: {e}")))?;
        Ok(Self::new(base))
    }

    /// Context rooted at the process's working directory
    pub fn current_dir() -> Result<Self, LoadError> {
        let dir = std::env::current_dir()?;
        let base = Url::from_directory_path(&dir)
            .map_err(|()| LoadError::InvalidLocator(dir.display().to_string()))?;
        Ok(Self::new(base))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Resolve and classify a locator. Pure: no I/O.
    pub fn resolve(&self, locator: &str) -> Result<ResolvedLocator, LoadError> {
        let locator = locator.trim();
        if is_data_uri(locator) {
            return Ok(ResolvedLocator {
                kind: LocatorKind::DataUri,
                href: locator.to_string(),
            });
        }

        let url = self
            .base
            .join(locator)
            .map_err(|e| LoadError::InvalidLocator(format!("{locator}: {e}")))?;

        let kind = if Origin::from_url(&url).is_same_origin(&self.origin) {
            LocatorKind::SameOrigin
        } else {
            LocatorKind::CrossOrigin
        };

        Ok(ResolvedLocator {
            kind,
            href: url.into(),
        })
    }

    pub fn classify(&self, locator: &str) -> Result<LocatorKind, LoadError> {
        self.resolve(locator).map(|resolved| resolved.kind)
    }
}

/// Parsed `data:` URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl DataUri {
    /// Parse `data:[<mediatype>][;base64],<data>`
    pub fn parse(uri: &str) -> Result<Self, LoadError> {
        let uri = uri.trim();
        if !is_data_uri(uri) {
            return Err(LoadError::InvalidDataUri("missing data: scheme".into()));
        }

        let (header, payload) = uri[5..]
            .split_once(',')
            .ok_or_else(|| LoadError::InvalidDataUri("missing ',' separator".into()))?;

        let (mime_type, base64) = match header.rsplit_once(';') {
            Some((mime, flag)) if flag.trim().eq_ignore_ascii_case("base64") => (mime, true),
            _ => (header, false),
        };

        let mime_type = match mime_type.trim() {
            "" => "text/plain;charset=US-ASCII".to_string(),
            mime => mime.to_ascii_lowercase(),
        };

        let decoded: Vec<u8> = percent_decode_str(payload).collect();
        let data = if base64 {
            let compact: Vec<u8> = decoded
                .into_iter()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            base64::engine::general_purpose::STANDARD
                .decode(compact)
                .map_err(|e| LoadError::InvalidDataUri(e.to_string()))?
        } else {
            decoded
        };

        Ok(Self { mime_type, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> LoadingContext {
        LoadingContext::parse("https://app.example.com/viewer/index.html").unwrap()
    }

    #[test]
    fn test_data_uri_detection() {
        assert!(is_data_uri("data:image/png;base64,AAAA"));
        assert!(is_data_uri("  DATA:,hello"));
        assert!(!is_data_uri("dat"));
        assert!(!is_data_uri("https://example.com/data:x"));
    }

    #[test]
    fn test_classify_relative_is_same_origin() {
        let ctx = context();
        let resolved = ctx.resolve("./someImage.png").unwrap();
        assert_eq!(resolved.kind, LocatorKind::SameOrigin);
        assert_eq!(resolved.href, "https://app.example.com/viewer/someImage.png");
    }

    #[test]
    fn test_classify_cross_origin() {
        let ctx = context();
        assert_eq!(ctx.classify("http://example.invalid/someImage.png").unwrap(), LocatorKind::CrossOrigin);
        // Different scheme, same host
        assert_eq!(ctx.classify("http://app.example.com/a.png").unwrap(), LocatorKind::CrossOrigin);
        // Different port
        assert_eq!(ctx.classify("https://app.example.com:8443/a.png").unwrap(), LocatorKind::CrossOrigin);
        // Explicit default port
        assert_eq!(ctx.classify("https://app.example.com:443/a.png").unwrap(), LocatorKind::SameOrigin);
    }

    #[test]
    fn test_classify_data_uri_never_cross_origin() {
        let ctx = context();
        assert_eq!(ctx.classify("data:image/png;base64,AAAA").unwrap(), LocatorKind::DataUri);
    }

    #[test]
    fn test_classify_blob() {
        let ctx = context();
        assert_eq!(ctx.classify("blob:https://app.example.com/1").unwrap(), LocatorKind::SameOrigin);
        assert_eq!(ctx.classify("blob:https://other.example.com/1").unwrap(), LocatorKind::CrossOrigin);
    }

    #[test]
    fn test_classify_nested_blob_is_cross_origin() {
        let ctx = context();
        assert_eq!(ctx.classify("blob:blob:https://app.example.com/x").unwrap(), LocatorKind::CrossOrigin);

        let deep = format!("{}https://app.example.com/x", "blob:".repeat(60_000));
        assert_eq!(ctx.classify(&deep).unwrap(), LocatorKind::CrossOrigin);
        assert_eq!(
            CrossOriginPolicy::Unspecified.annotation(ctx.classify(&deep).unwrap()),
            Some(CorsSettings::Anonymous)
        );
    }

    #[test]
    fn test_classify_file_context() {
        let ctx = LoadingContext::parse("file:///srv/app/").unwrap();
        assert_eq!(ctx.classify("./Data/Images/Green.png").unwrap(), LocatorKind::SameOrigin);
        assert_eq!(ctx.classify("https://example.com/a.png").unwrap(), LocatorKind::CrossOrigin);
    }

    #[test]
    fn test_invalid_locator() {
        let ctx = context();
        assert!(matches!(ctx.resolve("http://[::1"), Err(LoadError::InvalidLocator(_))));
    }

    #[test]
    fn test_policy_annotation() {
        use CrossOriginPolicy::*;
        use LocatorKind::*;

        assert_eq!(Unspecified.annotation(CrossOrigin), Some(CorsSettings::Anonymous));
        assert_eq!(Enabled.annotation(CrossOrigin), Some(CorsSettings::Anonymous));
        assert_eq!(Disabled.annotation(CrossOrigin), None);
        for policy in [Unspecified, Enabled, Disabled] {
            assert_eq!(policy.annotation(SameOrigin), None);
            assert_eq!(policy.annotation(DataUri), None);
        }
    }

    #[test]
    fn test_policy_from_option() {
        assert_eq!(CrossOriginPolicy::from(None), CrossOriginPolicy::Unspecified);
        assert_eq!(CrossOriginPolicy::from(Some(true)), CrossOriginPolicy::Enabled);
        assert_eq!(CrossOriginPolicy::from(false), CrossOriginPolicy::Disabled);
    }

    #[test]
    fn test_parse_base64_data_uri() {
        let uri = DataUri::parse("data:text/plain;base64,aGVs bG8=").unwrap();
        assert_eq!(uri.mime_type, "text/plain");
        assert_eq!(uri.data, b"hello");
    }

    #[test]
    fn test_parse_percent_encoded_data_uri() {
        let uri = DataUri::parse("data:,a%20b").unwrap();
        assert_eq!(uri.mime_type, "text/plain;charset=US-ASCII");
        assert_eq!(uri.data, b"a b");
    }

    #[test]
    fn test_parse_bad_data_uri() {
        assert!(matches!(DataUri::parse("data:image/png;base64"), Err(LoadError::InvalidDataUri(_))));
        assert!(matches!(DataUri::parse("data:;base64,!!!"), Err(LoadError::InvalidDataUri(_))));
    }
}
