//! Capture device abstraction.
//!
//! A device is anything that can hand back an image for a slot: a camera
//! bridge, a file on disk, or a test double.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::{CaptureError, CapturePayload, CaptureSlot, DEFAULT_MEDIA_TYPE};

/// Trait for capture sources.
///
/// Implementors provide the mechanism for obtaining one image for a slot.
/// Failures must be reported as [`CaptureError`] so the workflow can stay on
/// the current step.
#[async_trait::async_trait]
pub trait CaptureDevice: Send + Sync {
    /// The name of this device (for logging).
    fn name(&self) -> &'static str;

    /// Capture one image for `slot`.
    ///
    /// # Errors
    ///
    /// Returns an error if permission is missing, the device is unavailable,
    /// or it produced no data.
    async fn capture(&self, slot: CaptureSlot) -> Result<CapturePayload, CaptureError>;
}

/// Reads captures from image files.
///
/// A file whose contents start with `data:` is decoded as a data URL;
/// anything else is taken as raw image bytes with a media type guessed from
/// the extension.
#[derive(Debug, Clone, Default)]
pub struct FileDevice {
    face: Option<PathBuf>,
    body: Option<PathBuf>,
}

impl FileDevice {
    /// A device with no files configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `path` for `slot`.
    #[must_use]
    pub fn with_file(mut self, slot: CaptureSlot, path: impl Into<PathBuf>) -> Self {
        let path = Some(path.into());
        match slot {
            CaptureSlot::Face => self.face = path,
            CaptureSlot::Body => self.body = path,
        }
        self
    }

    fn path(&self, slot: CaptureSlot) -> Option<&Path> {
        match slot {
            CaptureSlot::Face => self.face.as_deref(),
            CaptureSlot::Body => self.body.as_deref(),
        }
    }
}

fn media_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => DEFAULT_MEDIA_TYPE,
    }
}

#[async_trait::async_trait]
impl CaptureDevice for FileDevice {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn capture(&self, slot: CaptureSlot) -> Result<CapturePayload, CaptureError> {
        let path = self.path(slot).ok_or_else(|| CaptureError::DeviceUnavailable {
            device: self.name(),
            message: format!("no file configured for the {slot} scan"),
        })?;

        debug!("Reading {} capture from {}", slot, path.display());
        let bytes = tokio::fs::read(path).await.map_err(|err| match err.kind() {
            std::io::ErrorKind::PermissionDenied => CaptureError::PermissionDenied {
                slot,
                message: format!("{}: {err}", path.display()),
            },
            _ => CaptureError::DeviceUnavailable {
                device: self.name(),
                message: format!("{}: {err}", path.display()),
            },
        })?;

        if bytes.starts_with(b"data:") {
            let url = String::from_utf8(bytes)
                .map_err(|_| CaptureError::InvalidEncoding {
                    message: "data URL is not valid UTF-8".to_string(),
                })?;
            return CapturePayload::from_data_url(slot, &url);
        }

        CapturePayload::new(slot, bytes, media_type_for(path))
    }
}
