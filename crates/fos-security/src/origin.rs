//! Origin and Same-Origin Policy
//!
//! Web origin model and the `crossorigin` settings attribute.

use url::Url;

use crate::SecurityError;

/// Web Origin
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
}

impl Origin {
    /// Create new origin
    pub fn new(scheme: &str, host: &str, port: Option<u16>) -> Self {
        Self {
            scheme: scheme.to_lowercase(),
            host: host.to_lowercase(),
            port,
        }
    }

    /// Opaque origin that is not the same origin as anything, itself included
    pub fn opaque() -> Self {
        Self {
            scheme: String::new(),
            host: String::new(),
            port: None,
        }
    }

    /// Origin of a parsed URL.
    ///
    /// `blob:` URLs carry the origin of the URL embedded after the prefix when
    /// that URL is http, https or file. Any other blob URL, nested blobs
    /// included, has an opaque origin.
    pub fn from_url(url: &Url) -> Self {
        if url.scheme() == "blob" {
            return match Url::parse(url.path()) {
                Ok(inner) if matches!(inner.scheme(), "http" | "https" | "file") => {
                    Self::new(inner.scheme(), inner.host_str().unwrap_or(""), inner.port())
                }
                _ => Self::opaque(),
            };
        }

        Self::new(url.scheme(), url.host_str().unwrap_or(""), url.port())
    }

    /// Parse from an absolute URL string
    pub fn parse(url: &str) -> Result<Self, SecurityError> {
        let parsed = Url::parse(url.trim())
            .map_err(|e| SecurityError::InvalidOrigin(format!("{url}: {e}")))?;
        Ok(Self::from_url(&parsed))
    }

    /// Check if same origin
    pub fn is_same_origin(&self, other: &Origin) -> bool {
        if self.is_unique() || other.is_unique() {
            return false;
        }

        self.scheme == other.scheme
            && self.host == other.host
            && self.effective_port() == other.effective_port()
    }

    /// Get effective port (default port for scheme if not specified)
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| default_port(&self.scheme))
    }

    /// Check if opaque origin
    pub fn is_opaque(&self) -> bool {
        self.is_unique() || self.scheme == "data" || self.scheme == "file"
    }

    /// Built by [`Origin::opaque`]
    fn is_unique(&self) -> bool {
        self.scheme.is_empty()
    }

    /// `host:port` with the scheme's default port filled in
    pub fn server_key(&self) -> String {
        format!("{}:{}", self.host, self.effective_port())
    }

    /// Serialize origin
    pub fn serialize(&self) -> String {
        if self.is_opaque() {
            return "null".to_string();
        }

        let port_str = match (self.scheme.as_str(), self.port) {
            ("http", Some(80)) | ("https", Some(443)) => String::new(),
            (_, Some(p)) => format!(":{}", p),
            (_, None) => String::new(),
        };

        format!("{}://{}{}", self.scheme, self.host, port_str)
    }
}

/// Default port for a scheme, 0 when the scheme has none
pub fn default_port(scheme: &str) -> u16 {
    match scheme {
        "http" | "ws" => 80,
        "https" | "wss" => 443,
        "ftp" => 21,
        _ => 0,
    }
}

/// Value of an element's `crossorigin` attribute.
///
/// An empty attribute value means `Anonymous`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorsSettings {
    Anonymous,
    UseCredentials,
}

impl CorsSettings {
    /// Attribute value as it would appear in markup
    pub fn as_attr(&self) -> &'static str {
        match self {
            CorsSettings::Anonymous => "",
            CorsSettings::UseCredentials => "use-credentials",
        }
    }

    /// Parse an attribute value. Unknown keywords fall back to `Anonymous`.
    pub fn from_attr(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("use-credentials") {
            CorsSettings::UseCredentials
        } else {
            CorsSettings::Anonymous
        }
    }
}
