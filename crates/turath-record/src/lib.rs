// Turath Record - artifact record model and codec for the heritage inventory

pub mod codec;
pub mod draft;
pub mod error;
pub mod media;
pub mod suggestion;
pub mod types;

pub use codec::{normalize, prepare, validate};
pub use draft::{ArtifactDraft, DraftGps};
pub use error::ValidationError;
pub use media::{sha256_hex, InlineMedia, MediaKind, MediaRef};
pub use suggestion::{apply_suggestion, AppliedSuggestion, SuggestedFields};
pub use types::{
    ArtifactRecord, ClosedEnum, CulturalStyle, GpsLocation, HeritageCategory, LegalStatus,
    LocationType, Millis,
};
