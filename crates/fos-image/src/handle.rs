//! Image handle
//!
//! The in-flight loading object, modelled on an `<img>` element: a source,
//! a `crossorigin` attribute and one-shot `onload` / `onerror` slots.
//! Firing either completion consumes the handle, so at most one of them
//! ever runs.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use fos_security::CorsSettings;

use crate::decoder::DecodedImage;
use crate::LoadError;

/// Success completion slot
pub type LoadCallback = Box<dyn FnOnce(ImageHandle) + Send>;
/// Error completion slot
pub type ErrorCallback = Box<dyn FnOnce(LoadError) + Send>;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// An image being loaded, or a loaded one once handed back to the caller
pub struct ImageHandle {
    id: u64,
    src: Option<String>,
    cross_origin: Option<CorsSettings>,
    image: Option<DecodedImage>,
    on_load: Option<LoadCallback>,
    on_error: Option<ErrorCallback>,
}

impl ImageHandle {
    pub fn new() -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            src: None,
            cross_origin: None,
            image: None,
            on_load: None,
            on_error: None,
        }
    }

    /// Process-unique identity of this handle
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn src(&self) -> Option<&str> {
        self.src.as_deref()
    }

    pub fn set_src(&mut self, src: &str) {
        self.src = Some(src.to_string());
    }

    /// The `crossorigin` annotation, `None` when absent
    pub fn cross_origin(&self) -> Option<CorsSettings> {
        self.cross_origin
    }

    pub fn set_cross_origin(&mut self, settings: Option<CorsSettings>) {
        self.cross_origin = settings;
    }

    pub fn set_onload(&mut self, callback: impl FnOnce(ImageHandle) + Send + 'static) {
        self.on_load = Some(Box::new(callback));
    }

    pub fn set_onerror(&mut self, callback: impl FnOnce(LoadError) + Send + 'static) {
        self.on_error = Some(Box::new(callback));
    }

    /// Decoded width, 0 until loaded
    pub fn width(&self) -> u32 {
        self.image.as_ref().map_or(0, |img| img.width)
    }

    /// Decoded height, 0 until loaded
    pub fn height(&self) -> u32 {
        self.image.as_ref().map_or(0, |img| img.height)
    }

    pub fn image(&self) -> Option<&DecodedImage> {
        self.image.as_ref()
    }

    pub fn into_image(self) -> Option<DecodedImage> {
        self.image
    }

    pub fn set_image(&mut self, image: DecodedImage) {
        self.image = Some(image);
    }

    /// Fire `onload`, handing the handle to it. The error slot is dropped.
    pub fn fire_load(mut self) {
        self.on_error = None;
        if let Some(callback) = self.on_load.take() {
            callback(self);
        }
    }

    /// Fire `onerror`. The handle is dropped.
    pub fn fire_error(mut self, error: LoadError) {
        self.on_load = None;
        if let Some(callback) = self.on_error.take() {
            callback(error);
        }
    }

    /// Finish a load: store the image and fire `onload`, or fire `onerror`
    pub fn complete(mut self, result: Result<DecodedImage, LoadError>) {
        match result {
            Ok(image) => {
                self.set_image(image);
                self.fire_load();
            }
            Err(error) => {
                tracing::warn!(id = self.id, src = self.src().unwrap_or(""), %error, "image load failed");
                self.fire_error(error);
            }
        }
    }
}

impl Default for ImageHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageHandle")
            .field("id", &self.id)
            .field("src", &self.src)
            .field("cross_origin", &self.cross_origin)
            .field("width", &self.width())
            .field("height", &self.height())
            .field("pending", &(self.on_load.is_some() || self.on_error.is_some()))
            .finish()
    }
}
