// Image-analysis suggestions
//
// The analysis service answers with free-form JSON. It is untrusted input:
// it only ever lands in a draft, and the suggested category must still parse
// against the closed enumeration before it is accepted.

use serde::{Deserialize, Serialize};

use crate::draft::ArtifactDraft;
use crate::error::ValidationError;
use crate::types::{ClosedEnum, HeritageCategory};

/// Structured suggestion returned by the image-analysis collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedFields {
    pub name_suggestion: String,
    pub category: String,
    pub material: String,
    #[serde(default)]
    pub period: Option<String>,
    pub description: String,
    pub confidence: f64,
}

/// Result of merging a suggestion into a draft.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedSuggestion {
    pub draft: ArtifactDraft,
    /// Draft fields that were filled from the suggestion, for highlighting.
    pub applied: Vec<&'static str>,
    /// Suggested values that failed validation and were dropped.
    pub rejected: Vec<ValidationError>,
}

/// Merges a suggestion into a draft.
///
/// Refuses the whole suggestion when the confidence is not a number in
/// `[0, 1]`. Blank suggested values never overwrite what the operator typed.
pub fn apply_suggestion(
    mut draft: ArtifactDraft,
    suggestion: &SuggestedFields,
) -> Result<AppliedSuggestion, ValidationError> {
    if !suggestion.confidence.is_finite() || !(0.0..=1.0).contains(&suggestion.confidence) {
        return Err(ValidationError::out_of_range(
            "confidence",
            format!("{} is outside [0, 1]", suggestion.confidence),
        ));
    }

    let mut applied = Vec::new();
    let mut rejected = Vec::new();

    if fill(&mut draft.name, &suggestion.name_suggestion) {
        applied.push("name");
    }
    // The suggested name doubles as a first guess at the object's use
    if fill(&mut draft.function, &suggestion.name_suggestion) {
        applied.push("function");
    }

    match HeritageCategory::parse(&suggestion.category) {
        Ok(category) => {
            draft.category = Some(category.code().to_string());
            applied.push("category");
        }
        Err(err) => rejected.push(err),
    }

    if fill(&mut draft.material, &suggestion.material) {
        applied.push("material");
    }
    if let Some(period) = suggestion.period.as_deref() {
        if fill(&mut draft.historical_period, period) {
            applied.push("historicalPeriod");
        }
    }
    if fill(&mut draft.notes, &suggestion.description) {
        applied.push("notes");
    }
    if fill(&mut draft.social_usage, &suggestion.description) {
        applied.push("socialUsage");
    }

    Ok(AppliedSuggestion {
        draft,
        applied,
        rejected,
    })
}

fn fill(slot: &mut Option<String>, value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return false;
    }
    *slot = Some(value.to_string());
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suggestion(category: &str, confidence: f64) -> SuggestedFields {
        SuggestedFields {
            name_suggestion: "إبريق نحاسي".to_string(),
            category: category.to_string(),
            material: "نحاس".to_string(),
            period: Some("القرن 19".to_string()),
            description: "يستعمل في تحضير الشاي".to_string(),
            confidence,
        }
    }

    #[test]
    fn test_suggestion_deserializes_service_payload() {
        let json = r#"{
            "nameSuggestion": "Teapot",
            "category": "تراث ثقافي مادي",
            "material": "copper",
            "description": "tea ceremony",
            "confidence": 0.82
        }"#;
        let parsed: SuggestedFields = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.period, None);
        assert_eq!(parsed.confidence, 0.82);
    }

    #[test]
    fn test_apply_fills_fields_and_accepts_label_category() {
        let result =
            apply_suggestion(ArtifactDraft::default(), &suggestion("تراث ثقافي مادي", 0.9)).unwrap();

        assert_eq!(result.draft.category.as_deref(), Some("MATERIAL"));
        assert_eq!(result.draft.name.as_deref(), Some("إبريق نحاسي"));
        assert_eq!(result.draft.function.as_deref(), Some("إبريق نحاسي"));
        assert_eq!(result.draft.historical_period.as_deref(), Some("القرن 19"));
        assert_eq!(
            result.applied,
            vec!["name", "function", "category", "material", "historicalPeriod", "notes", "socialUsage"]
        );
        assert!(result.rejected.is_empty());
    }

    #[test]
    fn test_unknown_category_is_rejected_but_other_fields_apply() {
        let draft = ArtifactDraft {
            category: Some("IMMATERIAL".to_string()),
            ..Default::default()
        };
        let result = apply_suggestion(draft, &suggestion("pottery", 0.5)).unwrap();

        assert_eq!(result.draft.category.as_deref(), Some("IMMATERIAL"));
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.rejected[0].field(), "category");
        assert!(result.applied.contains(&"material"));
    }

    #[test]
    fn test_out_of_range_confidence_refuses_suggestion() {
        assert!(apply_suggestion(ArtifactDraft::default(), &suggestion("MATERIAL", 1.5)).is_err());
        assert!(
            apply_suggestion(ArtifactDraft::default(), &suggestion("MATERIAL", f64::NAN)).is_err()
        );
    }

    #[test]
    fn test_blank_values_do_not_overwrite() {
        let draft = ArtifactDraft {
            material: Some("wood".to_string()),
            ..Default::default()
        };
        let mut blank = suggestion("MATERIAL", 0.3);
        blank.material = "  ".to_string();
        let result = apply_suggestion(draft, &blank).unwrap();
        assert_eq!(result.draft.material.as_deref(), Some("wood"));
        assert!(!result.applied.contains(&"material"));
    }
}
