// Codec scenarios for field-collected drafts
//
// These tests validate that:
// 1. A draft exported by the field form becomes a valid record
// 2. Validation is fail-fast on the first offending field
// 3. Suggestions from image analysis go through the same validation path

use turath_record::{
    apply_suggestion, normalize, prepare, validate, ArtifactDraft, HeritageCategory, LocationType,
    MediaRef, SuggestedFields,
};

fn field_form_draft() -> ArtifactDraft {
    // Shape of the JSON the multi-step form kept in its state
    let json = r#"{
        "id": "7b0c53c6-0a61-4a53-9a55-51e6f1a0c2de",
        "inventoryNumber": "INV-482913",
        "name": "خيمة الشعر",
        "category": "تراث ثقافي مادي",
        "culturalStyle": "حساني",
        "material": "وبر الإبل",
        "physicalStatus": "جيدة",
        "width": "4.5",
        "weight": 32,
        "ownership": "الديوان الوطني للحظيرة الثقافية لتندوف",
        "legalStatus": "محمية وطنية",
        "isDisplayable": true,
        "conservationState": "مستقرة",
        "acquisitionMethod": "جمع ميداني",
        "images": [],
        "gps": {"lat": 27.6761, "lng": -8.1277, "type": "اكتشاف"},
        "createdAt": 1700000000000
    }"#;
    serde_json::from_str(json).expect("form draft should deserialize")
}

#[test]
fn test_form_draft_becomes_record() {
    let record = prepare(field_form_draft(), 1700000005000).expect("draft should validate");

    assert_eq!(record.inventory_number, "INV-482913");
    assert_eq!(record.category, HeritageCategory::Material);
    assert_eq!(record.gps.location_type, LocationType::Discovery);
    assert_eq!(record.width, Some(4.5));
    assert_eq!(record.weight, Some(32.0));
    assert_eq!(record.diameter, None);
    assert_eq!(record.created_at, 1700000000000);
    assert_eq!(record.updated_at, 1700000005000);

    // Stored representation uses codes, not labels
    let stored = serde_json::to_value(&record).unwrap();
    assert_eq!(stored["category"], "MATERIAL");
    assert_eq!(stored["culturalStyle"], "HASSANI");
    assert_eq!(stored["gps"]["type"], "DISCOVERY");
    assert!(stored.get("diameter").is_none());
}

#[test]
fn test_validate_without_normalize_requires_timestamps() {
    let draft = field_form_draft();
    let err = validate(&draft).unwrap_err();
    assert_eq!(err.field(), "updatedAt");
}

#[test]
fn test_media_order_is_preserved() {
    let cover = MediaRef::for_content(b"cover");
    let detail = MediaRef::for_content(b"detail");
    let mut draft = field_form_draft();
    draft.images = Some(vec![cover.to_string(), detail.to_string()]);

    let record = prepare(draft, 1700000005000).unwrap();
    assert_eq!(record.cover_image(), Some(&cover));
    assert_eq!(record.media_refs().count(), 2);
}

#[test]
fn test_suggestion_flows_through_validation() {
    let draft = normalize(field_form_draft(), 1700000001000);
    let suggestion = SuggestedFields {
        name_suggestion: "طبل".to_string(),
        category: "تراث ثقافي لامادي".to_string(),
        material: "جلد".to_string(),
        period: None,
        description: "يستعمل في الأعراس".to_string(),
        confidence: 0.71,
    };

    let applied = apply_suggestion(draft, &suggestion).unwrap();
    let record = prepare(applied.draft, 1700000002000).unwrap();
    assert_eq!(record.category, HeritageCategory::Immaterial);
    assert_eq!(record.name, "طبل");
    assert_eq!(record.function, "طبل");
    assert_eq!(record.social_usage, "يستعمل في الأعراس");
}
