//! Record codec: the single conversion point from draft to record.
//!
//! `normalize` fills defaults and stamps `updatedAt`; `validate` checks a
//! draft field by field (fail-fast, in declaration order) and produces an
//! [`ArtifactRecord`]. Both are pure.

use crate::draft::ArtifactDraft;
use crate::error::ValidationError;
use crate::media::MediaRef;
use crate::types::{
    check_coordinates, check_measurement, ArtifactRecord, ClosedEnum, CulturalStyle, GpsLocation,
    HeritageCategory, LegalStatus, LocationType, Millis,
};

/// Fills defaults for optional fields and assigns `updatedAt = now`.
///
/// Free text defaults to the empty string and is trimmed; images default to
/// an empty list; `createdAt` defaults to `now` for a fresh draft. Style and
/// legal status fall back to the form's initial selections.
pub fn normalize(mut draft: ArtifactDraft, now: Millis) -> ArtifactDraft {
    for field in draft.free_text_mut() {
        let value = field.take().unwrap_or_default();
        *field = Some(value.trim().to_string());
    }
    for field in draft.optional_text_mut() {
        *field = field
            .take()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
    }

    let images = draft
        .images
        .take()
        .unwrap_or_default()
        .into_iter()
        .map(|image| image.trim().to_string())
        .filter(|image| !image.is_empty())
        .collect();
    draft.images = Some(images);

    if draft.cultural_style.is_none() {
        draft.cultural_style = Some(CulturalStyle::default().code().to_string());
    }
    if draft.legal_status.is_none() {
        draft.legal_status = Some(LegalStatus::default().code().to_string());
    }
    draft.is_displayable.get_or_insert(true);
    draft.created_at.get_or_insert(now);
    draft.updated_at = Some(now);
    draft
}

/// Validates a draft and converts it into a record.
///
/// Required: `id`, `inventoryNumber`, `category`, `gps` (with lat, lng and
/// type), `createdAt`, `updatedAt`. Returns the first offending field.
pub fn validate(draft: &ArtifactDraft) -> Result<ArtifactRecord, ValidationError> {
    let id = required_text("id", draft.id.as_deref())?;
    let inventory_number = required_text("inventoryNumber", draft.inventory_number.as_deref())?;

    let category = match draft.category.as_deref() {
        Some(raw) => HeritageCategory::parse(raw)?,
        None => return Err(ValidationError::missing(HeritageCategory::FIELD)),
    };
    let cultural_style = draft
        .cultural_style
        .as_deref()
        .map(CulturalStyle::parse)
        .transpose()?
        .unwrap_or_default();
    let legal_status = draft
        .legal_status
        .as_deref()
        .map(LegalStatus::parse)
        .transpose()?
        .unwrap_or_default();

    check_measurement("weight", draft.weight)?;
    check_measurement("width", draft.width)?;
    check_measurement("thickness", draft.thickness)?;
    check_measurement("diameter", draft.diameter)?;

    let images = draft
        .images
        .iter()
        .flatten()
        .map(|raw| parse_media_ref("images", raw))
        .collect::<Result<Vec<_>, _>>()?;
    let video = draft
        .video
        .as_deref()
        .map(|raw| parse_media_ref("video", raw))
        .transpose()?;
    let model3d = draft
        .model3d
        .as_deref()
        .map(|raw| parse_media_ref("model3d", raw))
        .transpose()?;

    let gps = draft.gps.as_ref().ok_or(ValidationError::missing("gps"))?;
    let lat = gps.lat.ok_or(ValidationError::missing("gps.lat"))?;
    let lng = gps.lng.ok_or(ValidationError::missing("gps.lng"))?;
    check_coordinates(lat, lng)?;
    let location_type = match gps.location_type.as_deref() {
        Some(raw) => LocationType::parse(raw)?,
        None => return Err(ValidationError::missing(LocationType::FIELD)),
    };

    let created_at = draft.created_at.ok_or(ValidationError::missing("createdAt"))?;
    let updated_at = draft.updated_at.ok_or(ValidationError::missing("updatedAt"))?;

    let record = ArtifactRecord {
        id,
        inventory_number,
        name: text(&draft.name),
        category,
        cultural_style,
        cultural_field: draft.cultural_field.clone().filter(|v| !v.is_empty()),
        material: text(&draft.material),
        technique: text(&draft.technique),
        shape: text(&draft.shape),
        ornamentation: text(&draft.ornamentation),
        color: text(&draft.color),
        physical_status: text(&draft.physical_status),
        diameter: draft.diameter,
        width: draft.width,
        thickness: draft.thickness,
        weight: draft.weight,
        function: text(&draft.function),
        social_usage: text(&draft.social_usage),
        symbolic_meaning: text(&draft.symbolic_meaning),
        historical_period: text(&draft.historical_period),
        dating_method: text(&draft.dating_method),
        place_of_origin: text(&draft.place_of_origin),
        maker: text(&draft.maker),
        acquisition_method: text(&draft.acquisition_method),
        ownership: text(&draft.ownership),
        legal_status,
        is_displayable: draft.is_displayable.unwrap_or(true),
        conservation_state: text(&draft.conservation_state),
        storage_conditions: text(&draft.storage_conditions),
        notes: text(&draft.notes),
        images,
        video,
        model3d,
        gps: GpsLocation {
            lat,
            lng,
            location_type,
        },
        created_at,
        updated_at,
    };

    // Covers the createdAt <= updatedAt ordering
    record.check()?;
    Ok(record)
}

/// `normalize` then `validate`: the save path for a draft.
pub fn prepare(draft: ArtifactDraft, now: Millis) -> Result<ArtifactRecord, ValidationError> {
    validate(&normalize(draft, now))
}

fn required_text(field: &'static str, value: Option<&str>) -> Result<String, ValidationError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ValidationError::missing(field)),
    }
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn parse_media_ref(field: &'static str, raw: &str) -> Result<MediaRef, ValidationError> {
    raw.parse::<MediaRef>().map_err(|err| match err {
        ValidationError::Malformed { reason, .. } => ValidationError::malformed(field, reason),
        other => other,
    })
}
