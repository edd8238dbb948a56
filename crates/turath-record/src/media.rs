// Media references and content hashing
//
// A media reference is derived from the payload's SHA-256 digest, so the
// same photo attached twice resolves to one stored copy.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ValidationError;

const REF_PREFIX: &str = "sha256:";

/// Computes the SHA-256 hash of the input bytes and returns it as a lowercase hex string.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Opaque, content-derived handle into the media store (`sha256:<hex>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MediaRef(String);

impl MediaRef {
    /// Reference for the given payload.
    pub fn for_content(bytes: &[u8]) -> Self {
        Self(format!("{REF_PREFIX}{}", sha256_hex(bytes)))
    }

    /// Builds a reference from a bare hex digest.
    pub fn from_digest(digest: &str) -> Result<Self, ValidationError> {
        format!("{REF_PREFIX}{digest}").parse()
    }

    /// Hex digest without the scheme prefix.
    pub fn digest(&self) -> &str {
        &self.0[REF_PREFIX.len()..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for MediaRef {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let digest = raw
            .strip_prefix(REF_PREFIX)
            .ok_or_else(|| ValidationError::malformed("media", format!("'{raw}' is not a sha256 reference")))?;
        let well_formed = digest.len() == 64
            && digest
                .chars()
                .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase());
        if !well_formed {
            return Err(ValidationError::malformed(
                "media",
                format!("'{raw}' does not carry a 64-character lowercase hex digest"),
            ));
        }
        Ok(Self(raw.to_string()))
    }
}

impl TryFrom<String> for MediaRef {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MediaRef> for String {
    fn from(value: MediaRef) -> Self {
        value.0
    }
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of binary payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Model,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Model => "model",
        }
    }

    /// Guesses the kind from a MIME type; 3D models arrive as glTF or octet streams.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            Some(Self::Image)
        } else if mime.starts_with("video/") {
            Some(Self::Video)
        } else if mime.starts_with("model/") || mime == "application/octet-stream" {
            Some(Self::Model)
        } else {
            None
        }
    }

    /// Content type served for payloads of this kind.
    pub fn default_mime(&self) -> &'static str {
        match self {
            Self::Image => "image/jpeg",
            Self::Video => "video/mp4",
            Self::Model => "model/gltf-binary",
        }
    }
}

impl FromStr for MediaKind {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "model" => Ok(Self::Model),
            other => Err(ValidationError::unknown_variant("kind", other)),
        }
    }
}

/// A payload embedded as a `data:` URL, the way the field form captured files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineMedia {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl InlineMedia {
    /// Returns true when the string looks like a data URL rather than a reference.
    pub fn is_data_url(raw: &str) -> bool {
        raw.starts_with("data:")
    }

    /// Decodes `data:<mime>;base64,<payload>`.
    pub fn from_data_url(raw: &str) -> Result<Self, ValidationError> {
        let rest = raw
            .strip_prefix("data:")
            .ok_or_else(|| ValidationError::malformed("media", "missing data: scheme"))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| ValidationError::malformed("media", "missing payload separator"))?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| ValidationError::malformed("media", "only base64 data URLs are supported"))?;
        let bytes = BASE64_STANDARD
            .decode(payload.trim())
            .map_err(|e| ValidationError::malformed("media", format!("invalid base64 payload: {e}")))?;
        Ok(Self {
            mime: if mime.is_empty() {
                "application/octet-stream".to_string()
            } else {
                mime.to_string()
            },
            bytes,
        })
    }

    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_mime(&self.mime)
    }
}
