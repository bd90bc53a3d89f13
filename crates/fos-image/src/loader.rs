//! Image Loader
//!
//! Classifies the locator, asks the admission gate, builds the handle and
//! bridges its completion callbacks into a [`LoadOutcome`].

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use fos_net::{Admission, AdmissionGate, HttpClient, RequestDescriptor, RequestScheduler, Transport};

use crate::backend::{DefaultBackend, ImageBackend};
use crate::blob::BlobRegistry;
use crate::locator::{CrossOriginPolicy, LoadingContext};
use crate::settle::{self, LoadOutcome};
use crate::LoadError;

/// What `load` did
#[derive(Debug)]
pub enum LoadAttempt {
    /// The load is under way
    Started(LoadOutcome),
    /// The admission gate throttled the request; nothing was created or sent
    NotStarted,
}

impl LoadAttempt {
    pub fn is_started(&self) -> bool {
        matches!(self, LoadAttempt::Started(_))
    }

    pub fn into_outcome(self) -> Option<LoadOutcome> {
        match self {
            LoadAttempt::Started(outcome) => Some(outcome),
            LoadAttempt::NotStarted => None,
        }
    }
}

/// Loader configuration
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// URL relative locators resolve against; the working directory if unset
    pub base_url: Option<String>,
    /// User agent for network loads
    pub user_agent: String,
    /// Request timeout for network loads
    pub request_timeout: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            user_agent: "fOS-Engine/0.1".into(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Image loader builder
#[derive(Default)]
pub struct ImageLoaderBuilder {
    config: LoaderConfig,
    gate: Option<Arc<dyn AdmissionGate>>,
    backend: Option<Arc<dyn ImageBackend>>,
    transport: Option<Arc<dyn Transport>>,
}

impl ImageLoaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn base_url(mut self, base: &str) -> Self {
        self.config.base_url = Some(base.to_string());
        self
    }

    pub fn user_agent(mut self, ua: &str) -> Self {
        self.config.user_agent = ua.to_string();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Admission gate; the process-wide scheduler if unset
    pub fn gate(mut self, gate: Arc<dyn AdmissionGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Backend that builds handles and runs loads; replaces the default one
    pub fn backend(mut self, backend: Arc<dyn ImageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Transport for the default backend's network loads
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<ImageLoader, LoadError> {
        let context = match &self.config.base_url {
            Some(base) => LoadingContext::parse(base)?,
            None => LoadingContext::current_dir()?,
        };
        let blobs = Arc::new(BlobRegistry::new(context.origin()));

        let backend = match self.backend {
            Some(backend) => backend,
            None => {
                let transport = match self.transport {
                    Some(transport) => transport,
                    None => {
                        let mut client = HttpClient::builder()
                            .user_agent(&self.config.user_agent)
                            .request_timeout(self.config.request_timeout);
                        if !context.origin().is_opaque() {
                            client = client.origin(&context.origin().serialize());
                        }
                        Arc::new(client.build()?)
                    }
                };
                Arc::new(DefaultBackend::new(transport, Arc::clone(&blobs)))
            }
        };

        let gate = self
            .gate
            .unwrap_or_else(|| RequestScheduler::global() as Arc<dyn AdmissionGate>);

        Ok(ImageLoader {
            context,
            gate,
            backend,
            blobs,
        })
    }
}

/// Loads images through an admission gate and a backend
pub struct ImageLoader {
    context: LoadingContext,
    gate: Arc<dyn AdmissionGate>,
    backend: Arc<dyn ImageBackend>,
    blobs: Arc<BlobRegistry>,
}

impl ImageLoader {
    /// Loader with default settings
    pub fn new() -> Result<Self, LoadError> {
        Self::builder().build()
    }

    pub fn builder() -> ImageLoaderBuilder {
        ImageLoaderBuilder::new()
    }

    /// Process-wide default loader, built on first use.
    ///
    /// A failed build is returned to the caller and retried on the next call.
    pub fn shared() -> Result<Arc<ImageLoader>, LoadError> {
        static SHARED: OnceLock<Arc<ImageLoader>> = OnceLock::new();
        if let Some(loader) = SHARED.get() {
            return Ok(loader.clone());
        }

        let loader = Arc::new(ImageLoader::new()?);
        Ok(SHARED.get_or_init(|| loader).clone())
    }

    pub fn context(&self) -> &LoadingContext {
        &self.context
    }

    /// Make bytes loadable as a same-origin `blob:` URL
    pub fn register_blob(&self, bytes: impl Into<Vec<u8>>) -> String {
        self.blobs.register(bytes)
    }

    pub fn revoke_blob(&self, url: &str) -> bool {
        self.blobs.revoke(url)
    }

    /// Start loading an image.
    ///
    /// An empty locator, or one that does not resolve, is reported as `Err`
    /// right away. A throttle-eligible `request` the gate refuses yields
    /// `NotStarted` without creating a handle. Otherwise the returned
    /// outcome settles exactly once, after this call has returned.
    pub fn load(
        &self,
        locator: &str,
        policy: CrossOriginPolicy,
        request: Option<&RequestDescriptor>,
    ) -> Result<LoadAttempt, LoadError> {
        if locator.trim().is_empty() {
            return Err(LoadError::MissingLocator);
        }

        let resolved = self.context.resolve(locator)?;
        tracing::debug!(href = %resolved.href, kind = ?resolved.kind, "locator classified");

        // Descriptors that are not throttle-eligible are admitted without
        // asking the gate.
        let permit = match request {
            Some(req) if req.throttle => match self.gate.try_admit(req) {
                Admission::Admitted(permit) => Some(permit),
                Admission::Throttled => {
                    tracing::debug!(href = %resolved.href, "image load throttled");
                    return Ok(LoadAttempt::NotStarted);
                }
            },
            _ => None,
        };

        let mut handle = self.backend.create_image();
        handle.set_cross_origin(policy.annotation(resolved.kind));

        let (on_load, outcome) = settle::channel(permit);
        let on_error = on_load.clone();
        handle.set_onload(move |image| {
            on_load.resolve(image);
        });
        handle.set_onerror(move |error| {
            on_error.reject(error);
        });

        tracing::info!(id = handle.id(), href = %resolved.href, cross_origin = ?handle.cross_origin(), "image load started");
        handle.set_src(&resolved.href);
        self.backend.begin(handle);

        Ok(LoadAttempt::Started(outcome))
    }
}
