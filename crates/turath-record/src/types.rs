//! Type definitions for heritage artifact records.
//!
//! Enumerations are closed sets serialized by their code (`MATERIAL`,
//! `DISCOVERY`, ...). Each variant also carries the Arabic label shown by the
//! field form; parsing accepts either spelling and nothing else.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::media::MediaRef;

/// Milliseconds since the Unix epoch.
pub type Millis = i64;

/// Shared behaviour of the closed enumerations stored on a record.
pub trait ClosedEnum: Sized + Copy + 'static {
    /// Wire name of the record field holding this enumeration.
    const FIELD: &'static str;

    fn variants() -> &'static [Self];

    /// Stable code used in storage and on the wire.
    fn code(&self) -> &'static str;

    /// Display label used by the field form.
    fn label(&self) -> &'static str;

    /// Parses a code or a display label, rejecting anything else.
    fn parse(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        Self::variants()
            .iter()
            .copied()
            .find(|variant| variant.code() == raw || variant.label() == raw)
            .ok_or_else(|| ValidationError::unknown_variant(Self::FIELD, raw))
    }
}

/// Heritage category of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeritageCategory {
    /// Tangible objects.
    Material,
    /// Practices, songs, crafts knowledge.
    Immaterial,
}

impl ClosedEnum for HeritageCategory {
    const FIELD: &'static str = "category";

    fn variants() -> &'static [Self] {
        &[Self::Material, Self::Immaterial]
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Material => "MATERIAL",
            Self::Immaterial => "IMMATERIAL",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Material => "تراث ثقافي مادي",
            Self::Immaterial => "تراث ثقافي لامادي",
        }
    }
}

/// Cultural style the artifact belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CulturalStyle {
    Hassani,
    #[default]
    Sahrawi,
    Other,
}

impl ClosedEnum for CulturalStyle {
    const FIELD: &'static str = "culturalStyle";

    fn variants() -> &'static [Self] {
        &[Self::Hassani, Self::Sahrawi, Self::Other]
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Hassani => "HASSANI",
            Self::Sahrawi => "SAHRAWI",
            Self::Other => "OTHER",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Hassani => "حساني",
            Self::Sahrawi => "صحراوي",
            Self::Other => "آخر",
        }
    }
}

/// Legal protection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LegalStatus {
    #[default]
    NationalProtected,
    PublicProperty,
    PrivateProperty,
    UnderStudy,
}

impl ClosedEnum for LegalStatus {
    const FIELD: &'static str = "legalStatus";

    fn variants() -> &'static [Self] {
        &[
            Self::NationalProtected,
            Self::PublicProperty,
            Self::PrivateProperty,
            Self::UnderStudy,
        ]
    }

    fn code(&self) -> &'static str {
        match self {
            Self::NationalProtected => "NATIONAL_PROTECTED",
            Self::PublicProperty => "PUBLIC_PROPERTY",
            Self::PrivateProperty => "PRIVATE_PROPERTY",
            Self::UnderStudy => "UNDER_STUDY",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::NationalProtected => "محمية وطنية",
            Self::PublicProperty => "ملك عام",
            Self::PrivateProperty => "ملك خاص",
            Self::UnderStudy => "قيد الدراسة",
        }
    }
}

/// What the recorded GPS position refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationType {
    Discovery,
    Preservation,
    Display,
}

impl ClosedEnum for LocationType {
    const FIELD: &'static str = "gps.type";

    fn variants() -> &'static [Self] {
        &[Self::Discovery, Self::Preservation, Self::Display]
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Discovery => "DISCOVERY",
            Self::Preservation => "PRESERVATION",
            Self::Display => "DISPLAY",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Discovery => "اكتشاف",
            Self::Preservation => "حفظ",
            Self::Display => "عرض",
        }
    }
}

/// GPS position plus what kind of site it marks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsLocation {
    pub lat: f64,
    pub lng: f64,
    #[serde(rename = "type")]
    pub location_type: LocationType,
}

/// A validated heritage artifact record.
///
/// Only produced by [`crate::validate`] or by decoding a stored record; the
/// store re-checks it with [`ArtifactRecord::check`] on every write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRecord {
    /// Immutable identity, never reused.
    pub id: String,
    /// Catalog code shown on labels, e.g. `INV-000123`.
    pub inventory_number: String,
    pub name: String,
    pub category: HeritageCategory,
    pub cultural_style: CulturalStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cultural_field: Option<String>,

    // Technical description
    pub material: String,
    pub technique: String,
    pub shape: String,
    pub ornamentation: String,
    pub color: String,
    pub physical_status: String,

    // Measurements; `None` means not measured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diameter: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,

    // Cultural context
    pub function: String,
    pub social_usage: String,
    pub symbolic_meaning: String,

    // History
    pub historical_period: String,
    pub dating_method: String,
    pub place_of_origin: String,
    pub maker: String,
    pub acquisition_method: String,

    // Legal and conservation
    pub ownership: String,
    pub legal_status: LegalStatus,
    pub is_displayable: bool,
    pub conservation_state: String,
    pub storage_conditions: String,
    pub notes: String,

    // Media, by reference only
    #[serde(default)]
    pub images: Vec<MediaRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<MediaRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model3d: Option<MediaRef>,

    pub gps: GpsLocation,

    pub created_at: Millis,
    pub updated_at: Millis,
}

impl ArtifactRecord {
    /// Re-checks the invariants the type system does not encode.
    pub fn check(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::missing("id"));
        }
        if self.inventory_number.trim().is_empty() {
            return Err(ValidationError::missing("inventoryNumber"));
        }
        check_measurement("weight", self.weight)?;
        check_measurement("width", self.width)?;
        check_measurement("thickness", self.thickness)?;
        check_measurement("diameter", self.diameter)?;
        check_coordinates(self.gps.lat, self.gps.lng)?;
        if self.created_at > self.updated_at {
            return Err(ValidationError::out_of_range(
                "updatedAt",
                format!(
                    "updatedAt {} precedes createdAt {}",
                    self.updated_at, self.created_at
                ),
            ));
        }
        Ok(())
    }

    /// The cover image, if any.
    pub fn cover_image(&self) -> Option<&MediaRef> {
        self.images.first()
    }

    /// Every media reference held by this record, images first.
    pub fn media_refs(&self) -> impl Iterator<Item = &MediaRef> {
        self.images
            .iter()
            .chain(self.video.iter())
            .chain(self.model3d.iter())
    }

    /// Lowercased text the list filter matches against.
    pub fn search_text(&self) -> String {
        format!("{}\u{1f}{}", self.name, self.inventory_number).to_lowercase()
    }
}

pub(crate) fn check_measurement(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    match value {
        Some(v) if !v.is_finite() => Err(ValidationError::out_of_range(field, "not a finite number")),
        Some(v) if v < 0.0 => Err(ValidationError::out_of_range(
            field,
            format!("{v} is negative"),
        )),
        _ => Ok(()),
    }
}

pub(crate) fn check_coordinates(lat: f64, lng: f64) -> Result<(), ValidationError> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(ValidationError::out_of_range(
            "gps.lat",
            format!("{lat} is outside [-90, 90]"),
        ));
    }
    if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
        return Err(ValidationError::out_of_range(
            "gps.lng",
            format!("{lng} is outside [-180, 180]"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_serialization() {
        assert_eq!(
            serde_json::to_string(&HeritageCategory::Material).unwrap(),
            "\"MATERIAL\""
        );
        assert_eq!(
            serde_json::to_string(&LegalStatus::UnderStudy).unwrap(),
            "\"UNDER_STUDY\""
        );
    }

    #[test]
    fn test_parse_accepts_code_and_label() {
        assert_eq!(
            HeritageCategory::parse("IMMATERIAL").unwrap(),
            HeritageCategory::Immaterial
        );
        assert_eq!(
            HeritageCategory::parse("تراث ثقافي لامادي").unwrap(),
            HeritageCategory::Immaterial
        );
        assert_eq!(CulturalStyle::parse(" حساني ").unwrap(), CulturalStyle::Hassani);
        assert_eq!(LocationType::parse("عرض").unwrap(), LocationType::Display);
    }

    #[test]
    fn test_parse_rejects_unknown_values() {
        let err = LegalStatus::parse("stolen").unwrap_err();
        assert_eq!(err.field(), "legalStatus");

        // Lowercase codes are not part of the closed set
        assert!(HeritageCategory::parse("material").is_err());
    }

    #[test]
    fn test_location_type_reports_nested_field() {
        let err = LocationType::parse("ARCHIVE").unwrap_err();
        assert_eq!(err.field(), "gps.type");
    }

    #[test]
    fn test_measurement_checks() {
        assert!(check_measurement("weight", None).is_ok());
        assert!(check_measurement("weight", Some(0.0)).is_ok());
        assert!(check_measurement("weight", Some(-0.5)).is_err());
        assert!(check_measurement("width", Some(f64::NAN)).is_err());
    }

    #[test]
    fn test_coordinate_bounds() {
        assert!(check_coordinates(27.6761, -8.1277).is_ok());
        assert_eq!(
            check_coordinates(91.0, 0.0).unwrap_err().field(),
            "gps.lat"
        );
        assert_eq!(
            check_coordinates(0.0, -181.0).unwrap_err().field(),
            "gps.lng"
        );
    }
}
