//! Biometric capture types.
//!
//! This module defines the two capture slots, the opaque payload collected for
//! each, and the [`CaptureStore`] that holds them while a draft is in progress.
//! Payloads are never inspected beyond their bytes and digest.

mod device;

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use device::{CaptureDevice, FileDevice};

/// Media type used when a payload arrives without one.
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

/// One of the two required capture targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureSlot {
    /// Face scan.
    Face,
    /// Full body scan.
    Body,
}

impl CaptureSlot {
    /// Both slots, in capture order.
    pub const ALL: [Self; 2] = [Self::Face, Self::Body];

    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Face => "face",
            Self::Body => "body",
        }
    }
}

impl std::fmt::Display for CaptureSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while collecting a capture.
///
/// All of these are recoverable by retrying within the same step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// The device produced no data.
    #[error("no image data captured for the {slot} scan")]
    EmptyPayload {
        /// Slot being captured.
        slot: CaptureSlot,
    },

    /// The user or platform denied camera access.
    #[error("camera permission denied for the {slot} scan: {message}")]
    PermissionDenied {
        /// Slot being captured.
        slot: CaptureSlot,
        /// Platform message.
        message: String,
    },

    /// The capture device cannot serve the request.
    #[error("capture device '{device}' unavailable: {message}")]
    DeviceUnavailable {
        /// Name of the device.
        device: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    /// A data URL could not be decoded.
    #[error("invalid capture encoding: {message}")]
    InvalidEncoding {
        /// Description of what went wrong.
        message: String,
    },
}

impl CaptureError {
    fn encoding(message: impl Into<String>) -> Self {
        Self::InvalidEncoding {
            message: message.into(),
        }
    }
}

/// An opaque captured image.
///
/// The bytes are shared, so cloning a payload (and every draft that holds
/// one) does not copy image data. Serializes as a base64 data URL.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CapturePayload {
    bytes: Arc<[u8]>,
    media_type: String,
    digest: String,
}

impl CapturePayload {
    /// Wrap raw image bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::EmptyPayload`] if `bytes` is empty.
    pub fn new(
        slot: CaptureSlot,
        bytes: impl Into<Vec<u8>>,
        media_type: impl Into<String>,
    ) -> Result<Self, CaptureError> {
        let bytes: Vec<u8> = bytes.into();
        if bytes.is_empty() {
            return Err(CaptureError::EmptyPayload { slot });
        }
        Ok(Self::from_parts(bytes, media_type.into()))
    }

    fn from_parts(bytes: Vec<u8>, media_type: String) -> Self {
        let digest = blake3::hash(&bytes).to_hex().to_string();
        Self {
            bytes: bytes.into(),
            media_type,
            digest,
        }
    }

    /// Decode a `data:<media type>;base64,<data>` URL, the format browser
    /// cameras hand back from a screenshot.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::InvalidEncoding`] for malformed URLs and
    /// [`CaptureError::EmptyPayload`] if the URL carries no data.
    pub fn from_data_url(slot: CaptureSlot, url: &str) -> Result<Self, CaptureError> {
        let (header, data) = url
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(','))
            .ok_or_else(|| CaptureError::encoding("expected a data: URL"))?;
        let media_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| CaptureError::encoding("only base64 data URLs are supported"))?;
        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|err| CaptureError::encoding(err.to_string()))?;
        let media_type = if media_type.is_empty() {
            DEFAULT_MEDIA_TYPE
        } else {
            media_type
        };
        Self::new(slot, bytes, media_type)
    }

    /// Encode as a base64 data URL.
    #[must_use]
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, STANDARD.encode(&self.bytes))
    }

    /// Raw image bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Media type, e.g. `image/jpeg`.
    #[must_use]
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// BLAKE3 digest of the bytes, hex encoded.
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; empty payloads cannot be constructed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for CapturePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturePayload")
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .field("digest", &&self.digest[..16])
            .finish()
    }
}

impl From<CapturePayload> for String {
    fn from(payload: CapturePayload) -> Self {
        payload.to_data_url()
    }
}

impl TryFrom<String> for CapturePayload {
    type Error = CaptureError;

    fn try_from(url: String) -> Result<Self, Self::Error> {
        // The slot only labels the empty-payload error; rehydrated payloads
        // were non-empty when first captured.
        Self::from_data_url(CaptureSlot::Face, &url)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct SlotState {
    payload: Option<CapturePayload>,
    #[serde(skip)]
    open: bool,
}

/// Holds the face and body payloads for one draft.
///
/// A slot is complete iff it holds a payload. The "session" flag tracks
/// whether the camera is open for a slot; it is transient and not serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStore {
    face: SlotState,
    body: SlotState,
}

impl CaptureStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, slot: CaptureSlot) -> &SlotState {
        match slot {
            CaptureSlot::Face => &self.face,
            CaptureSlot::Body => &self.body,
        }
    }

    fn slot_mut(&mut self, slot: CaptureSlot) -> &mut SlotState {
        match slot {
            CaptureSlot::Face => &mut self.face,
            CaptureSlot::Body => &mut self.body,
        }
    }

    /// Open a capture session for `slot`.
    ///
    /// Returns `false` if a session was already open (no-op).
    pub fn begin_capture(&mut self, slot: CaptureSlot) -> bool {
        let state = self.slot_mut(slot);
        if state.open {
            return false;
        }
        state.open = true;
        true
    }

    /// Store `payload` for `slot` and close its session.
    ///
    /// Any earlier payload is replaced (retake) and returned.
    pub fn commit_capture(
        &mut self,
        slot: CaptureSlot,
        payload: CapturePayload,
    ) -> Option<CapturePayload> {
        let state = self.slot_mut(slot);
        state.open = false;
        state.payload.replace(payload)
    }

    /// Discard the payload for `slot` and reopen its session.
    pub fn clear_capture(&mut self, slot: CaptureSlot) -> Option<CapturePayload> {
        let state = self.slot_mut(slot);
        state.open = true;
        state.payload.take()
    }

    /// Whether a session is open for `slot`.
    #[must_use]
    pub fn is_open(&self, slot: CaptureSlot) -> bool {
        self.slot(slot).open
    }

    /// Whether `slot` holds a payload.
    #[must_use]
    pub fn is_complete(&self, slot: CaptureSlot) -> bool {
        self.slot(slot).payload.is_some()
    }

    /// Whether both slots hold payloads.
    #[must_use]
    pub fn is_fully_complete(&self) -> bool {
        CaptureSlot::ALL.iter().all(|slot| self.is_complete(*slot))
    }

    /// The payload stored for `slot`.
    #[must_use]
    pub fn payload(&self, slot: CaptureSlot) -> Option<&CapturePayload> {
        self.slot(slot).payload.as_ref()
    }

    /// The slot a returning user should land on.
    ///
    /// Face must be complete before body becomes active. Once face is
    /// complete the user lands on body, even if body is complete too, so a
    /// retake is possible before submitting.
    #[must_use]
    pub fn resume_slot(&self) -> CaptureSlot {
        if self.is_complete(CaptureSlot::Face) {
            CaptureSlot::Body
        } else {
            CaptureSlot::Face
        }
    }
}
