//! Draft records: the partial, evolving state of the multi-step form.
//!
//! Every field is optional and enumerations are kept as raw strings, since
//! a draft can hold anything the operator (or the image analysis) typed.
//! [`crate::validate`] is the only way to turn a draft into a record.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::types::{
    ArtifactRecord, ClosedEnum, CulturalStyle, HeritageCategory, LegalStatus, LocationType, Millis,
};

/// Field office that holds collected artifacts unless told otherwise.
pub const DEFAULT_OWNERSHIP: &str = "الديوان الوطني للحظيرة الثقافية لتندوف";

/// Where a new form points its GPS pin before a fix arrives (Tindouf).
pub const DEFAULT_GPS: (f64, f64) = (27.6761, -8.1277);

/// GPS section of a draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftGps {
    #[serde(default, deserialize_with = "lenient_number")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub lng: Option<f64>,
    #[serde(rename = "type", default)]
    pub location_type: Option<String>,
}

/// An artifact as the form holds it before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArtifactDraft {
    pub id: Option<String>,
    pub inventory_number: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub cultural_style: Option<String>,
    pub cultural_field: Option<String>,

    pub material: Option<String>,
    pub technique: Option<String>,
    pub shape: Option<String>,
    pub ornamentation: Option<String>,
    pub color: Option<String>,
    pub physical_status: Option<String>,

    #[serde(deserialize_with = "lenient_number")]
    pub diameter: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub width: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub thickness: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub weight: Option<f64>,

    pub function: Option<String>,
    pub social_usage: Option<String>,
    pub symbolic_meaning: Option<String>,

    pub historical_period: Option<String>,
    pub dating_method: Option<String>,
    pub place_of_origin: Option<String>,
    pub maker: Option<String>,
    pub acquisition_method: Option<String>,

    pub ownership: Option<String>,
    pub legal_status: Option<String>,
    pub is_displayable: Option<bool>,
    pub conservation_state: Option<String>,
    pub storage_conditions: Option<String>,
    pub notes: Option<String>,

    /// References, or `data:` URLs still waiting to be moved into the media store.
    pub images: Option<Vec<String>>,
    pub video: Option<String>,
    pub model3d: Option<String>,

    pub gps: Option<DraftGps>,

    pub created_at: Option<Millis>,
    pub updated_at: Option<Millis>,
}

impl ArtifactDraft {
    /// Empty draft with a freshly generated id.
    pub fn with_new_id() -> Self {
        Self {
            id: Some(Uuid::new_v4().to_string()),
            ..Self::default()
        }
    }

    /// The state a new inventory form opens with.
    ///
    /// The inventory number is `INV-` plus the last six digits of `now`.
    pub fn form_defaults(now: Millis) -> Self {
        let (lat, lng) = DEFAULT_GPS;
        Self {
            inventory_number: Some(format!("INV-{:06}", now.rem_euclid(1_000_000))),
            category: Some(HeritageCategory::Material.code().to_string()),
            cultural_style: Some(CulturalStyle::default().code().to_string()),
            is_displayable: Some(true),
            images: Some(Vec::new()),
            gps: Some(DraftGps {
                lat: Some(lat),
                lng: Some(lng),
                location_type: Some(LocationType::Discovery.code().to_string()),
            }),
            physical_status: Some("جيدة".to_string()),
            ownership: Some(DEFAULT_OWNERSHIP.to_string()),
            legal_status: Some(LegalStatus::default().code().to_string()),
            conservation_state: Some("مستقرة".to_string()),
            acquisition_method: Some("جمع ميداني".to_string()),
            created_at: Some(now),
            updated_at: Some(now),
            ..Self::with_new_id()
        }
    }

    /// Assigns a generated id when the caller did not supply one.
    pub fn ensure_id(&mut self) -> &str {
        let needs_id = self
            .id
            .as_deref()
            .map(|id| id.trim().is_empty())
            .unwrap_or(true);
        if needs_id {
            self.id = Some(Uuid::new_v4().to_string());
        }
        self.id.as_deref().unwrap_or_default()
    }

    /// Mutable handles to the free-text fields that default to an empty string.
    pub(crate) fn free_text_mut(&mut self) -> [&mut Option<String>; 19] {
        [
            &mut self.name,
            &mut self.material,
            &mut self.technique,
            &mut self.shape,
            &mut self.ornamentation,
            &mut self.color,
            &mut self.physical_status,
            &mut self.function,
            &mut self.social_usage,
            &mut self.symbolic_meaning,
            &mut self.historical_period,
            &mut self.dating_method,
            &mut self.place_of_origin,
            &mut self.maker,
            &mut self.acquisition_method,
            &mut self.ownership,
            &mut self.conservation_state,
            &mut self.storage_conditions,
            &mut self.notes,
        ]
    }

    /// Optional string fields that stay absent when empty.
    pub(crate) fn optional_text_mut(&mut self) -> [&mut Option<String>; 5] {
        [
            &mut self.id,
            &mut self.inventory_number,
            &mut self.cultural_field,
            &mut self.video,
            &mut self.model3d,
        ]
    }
}

impl From<&ArtifactRecord> for ArtifactDraft {
    fn from(record: &ArtifactRecord) -> Self {
        Self {
            id: Some(record.id.clone()),
            inventory_number: Some(record.inventory_number.clone()),
            name: Some(record.name.clone()),
            category: Some(record.category.code().to_string()),
            cultural_style: Some(record.cultural_style.code().to_string()),
            cultural_field: record.cultural_field.clone(),
            material: Some(record.material.clone()),
            technique: Some(record.technique.clone()),
            shape: Some(record.shape.clone()),
            ornamentation: Some(record.ornamentation.clone()),
            color: Some(record.color.clone()),
            physical_status: Some(record.physical_status.clone()),
            diameter: record.diameter,
            width: record.width,
            thickness: record.thickness,
            weight: record.weight,
            function: Some(record.function.clone()),
            social_usage: Some(record.social_usage.clone()),
            symbolic_meaning: Some(record.symbolic_meaning.clone()),
            historical_period: Some(record.historical_period.clone()),
            dating_method: Some(record.dating_method.clone()),
            place_of_origin: Some(record.place_of_origin.clone()),
            maker: Some(record.maker.clone()),
            acquisition_method: Some(record.acquisition_method.clone()),
            ownership: Some(record.ownership.clone()),
            legal_status: Some(record.legal_status.code().to_string()),
            is_displayable: Some(record.is_displayable),
            conservation_state: Some(record.conservation_state.clone()),
            storage_conditions: Some(record.storage_conditions.clone()),
            notes: Some(record.notes.clone()),
            images: Some(record.images.iter().map(|r| r.to_string()).collect()),
            video: record.video.as_ref().map(|r| r.to_string()),
            model3d: record.model3d.as_ref().map(|r| r.to_string()),
            gps: Some(DraftGps {
                lat: Some(record.gps.lat),
                lng: Some(record.gps.lng),
                location_type: Some(record.gps.location_type.code().to_string()),
            }),
            created_at: Some(record.created_at),
            updated_at: Some(record.updated_at),
        }
    }
}

/// Accepts a JSON number, a numeric string, or an empty string (as "not measured").
///
/// Form inputs hand numbers over as strings, so exported drafts carry both.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(n)) => Ok(Some(n)),
        Some(NumberOrText::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            text.parse::<f64>()
                .map(Some)
                .map_err(|_| serde::de::Error::custom(format!("'{text}' is not a number")))
        }
    }
}
