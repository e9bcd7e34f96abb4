//! Field normalizer: validates and coerces raw classifier output against the
//! classification schema
//!
//! Pure over its inputs and the static schema. Output is guaranteed to
//! satisfy the schema invariants; downstream components never re-validate.

use crate::classify::RawClassification;
use crate::model::IssueCategory;
use crate::schema::{self, StructuredFields};

/// Expected, non-exceptional rejection of a classification
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RejectionReason {
    #[error("LowConfidence: {0}")]
    LowConfidence(String),

    #[error("NotCivicInfrastructure: {0}")]
    NotCivicInfrastructure(String),
}

impl RejectionReason {
    /// Short reason name carried into the terminal report state
    pub fn reason(&self) -> &'static str {
        match self {
            Self::LowConfidence(_) => "LowConfidence",
            Self::NotCivicInfrastructure(_) => "NotCivicInfrastructure",
        }
    }
}

/// Classifier output after schema validation. `category` is never `None`.
#[derive(Debug, Clone)]
pub struct NormalizedClassification {
    pub category: IssueCategory,
    pub confidence: f64,
    pub description: String,
    pub location_description: String,
    pub fields: StructuredFields,
}

/// Find the legal enumeration value closest to the adapter-supplied guess.
///
/// Three passes of decreasing strictness, each walking the enumeration in
/// declared order so the first match wins deterministically:
/// 1. case-insensitive equality
/// 2. case-insensitive substring in either direction ("cracked" matches
///    "Cracked sidewalk")
/// 3. every word of the candidate appears in the value ("pothole defect"
///    matches "Pothole/Pavement Defect")
pub fn match_enum_value<'a>(candidate: &str, legal: &[&'a str]) -> Option<&'a str> {
    let candidate = candidate.trim().to_lowercase();
    if candidate.is_empty() {
        return None;
    }

    for value in legal {
        if value.to_lowercase() == candidate {
            return Some(value);
        }
    }

    for value in legal {
        let value_lower = value.to_lowercase();
        if value_lower.contains(&candidate) || candidate.contains(&value_lower) {
            return Some(value);
        }
    }

    let tokens: Vec<&str> = candidate
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return None;
    }

    for value in legal {
        let value_lower = value.to_lowercase();
        if tokens.iter().all(|t| value_lower.contains(t)) {
            return Some(value);
        }
    }

    None
}

/// Validate and coerce raw classifier output against the schema.
///
/// Rejects on low confidence (strictly below `threshold`; the boundary is
/// accepted) or a category outside the closed enumeration, then resolves
/// every schema-governed field to a legal enumeration value.
pub fn normalize(
    raw: &RawClassification,
    threshold: f64,
) -> Result<NormalizedClassification, RejectionReason> {
    let category = IssueCategory::match_label(&raw.category);

    if category == IssueCategory::None {
        return Err(RejectionReason::NotCivicInfrastructure(format!(
            "classifier found no reportable issue (raw category: {:?})",
            raw.category
        )));
    }

    if raw.confidence < threshold {
        return Err(RejectionReason::LowConfidence(format!(
            "confidence {:.2} below threshold {:.2} for {}",
            raw.confidence,
            threshold,
            category.label()
        )));
    }

    let description = if raw.description.is_empty() {
        "Civic infrastructure issue detected".to_string()
    } else {
        raw.description.clone()
    };

    let request_description = field(raw, "requestDescription")
        .unwrap_or(&description)
        .to_string();

    let fields = match category {
        IssueCategory::RoadCrack => normalize_street(raw, request_description),
        IssueCategory::SidewalkCrack => normalize_sidewalk(raw, request_description)?,
        IssueCategory::Graffiti => normalize_graffiti(raw, request_description)?,
        IssueCategory::FallenTree => normalize_tree(raw, request_description),
        IssueCategory::OverflowingTrash
        | IssueCategory::FadedMarkings
        | IssueCategory::BrokenStreetlight => {
            StructuredFields::Description(schema::DescriptionFields {
                request_description,
            })
        }
        // Handled above
        IssueCategory::None => unreachable!("None is rejected before field normalization"),
    };

    Ok(NormalizedClassification {
        category,
        confidence: raw.confidence,
        description,
        location_description: raw.location_description.clone(),
        fields,
    })
}

/// Look up a string field from the raw form-field guess, tolerating key-case
/// drift from the upstream classifier
fn field<'a>(raw: &'a RawClassification, key: &str) -> Option<&'a str> {
    if let Some(value) = raw.form_fields.get(key).and_then(|v| v.as_str()) {
        return Some(value);
    }

    raw.form_fields
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .and_then(|(_, v)| v.as_str())
}

fn normalize_street(raw: &RawClassification, request_description: String) -> StructuredFields {
    let request_type = field(raw, "requestType")
        .and_then(|guess| match_enum_value(guess, schema::STREET_REQUEST_TYPES))
        .unwrap_or(schema::STREET_REQUEST_FALLBACK);

    StructuredFields::Street(schema::StreetFields {
        damage_type: schema::STREET_DAMAGE_TYPE,
        issue_type: schema::STREET_ISSUE_TYPE,
        request_type: request_type.to_string(),
        request_description,
    })
}

fn normalize_sidewalk(
    raw: &RawClassification,
    request_description: String,
) -> Result<StructuredFields, RejectionReason> {
    // Mandatory, and the enumeration carries no catch-all to fall back to
    let request_type = field(raw, "requestType")
        .and_then(|guess| match_enum_value(guess, schema::SIDEWALK_REQUEST_TYPES))
        .ok_or_else(|| {
            RejectionReason::NotCivicInfrastructure(
                "sidewalk requestType could not be mapped to a legal value".to_string(),
            )
        })?;

    // Conditional sub-field: only meaningful once the governing field
    // resolved to "Sidewalk Defect"; otherwise omitted, never defaulted
    let secondary_request_type = if request_type == schema::SIDEWALK_SECONDARY_GOVERNOR {
        field(raw, "secondaryRequestType")
            .and_then(|guess| match_enum_value(guess, schema::SIDEWALK_SECONDARY_TYPES))
            .map(|v| v.to_string())
    } else {
        None
    };

    Ok(StructuredFields::Sidewalk(schema::SidewalkFields {
        damage_type: schema::SIDEWALK_DAMAGE_TYPE,
        issue_type: schema::SIDEWALK_ISSUE_TYPE,
        request_type: request_type.to_string(),
        secondary_request_type,
        request_description,
    }))
}

fn normalize_graffiti(
    raw: &RawClassification,
    request_description: String,
) -> Result<StructuredFields, RejectionReason> {
    let issue_type = field(raw, "issueType")
        .and_then(|guess| match_enum_value(guess, schema::GRAFFITI_ISSUE_TYPES))
        .ok_or_else(|| {
            RejectionReason::NotCivicInfrastructure(
                "graffiti issueType could not be mapped to a legal value".to_string(),
            )
        })?;

    let (request_regarding, request_type) = if issue_type == "Illegal Postings on Public Property" {
        // Postings carry the violation type and always target a pole
        let regarding = field(raw, "requestRegarding")
            .and_then(|guess| match_enum_value(guess, schema::POSTING_REGARDING))
            .ok_or_else(|| {
                RejectionReason::NotCivicInfrastructure(
                    "posting requestRegarding could not be mapped to a legal value".to_string(),
                )
            })?;
        (regarding, schema::POSTING_REQUEST_TYPE)
    } else {
        let regarding = field(raw, "requestRegarding")
            .and_then(|guess| match_enum_value(guess, schema::GRAFFITI_REGARDING))
            .unwrap_or(schema::GRAFFITI_REGARDING_FALLBACK);

        let (types, fallback) = if issue_type == "Graffiti on Private Property" {
            (schema::GRAFFITI_PRIVATE_TYPES, schema::GRAFFITI_PRIVATE_FALLBACK)
        } else {
            (schema::GRAFFITI_PUBLIC_TYPES, schema::GRAFFITI_PUBLIC_FALLBACK)
        };

        let request_type = field(raw, "requestType")
            .and_then(|guess| match_enum_value(guess, types))
            .unwrap_or(fallback);

        (regarding, request_type)
    };

    Ok(StructuredFields::Graffiti(schema::GraffitiFields {
        issue_type: issue_type.to_string(),
        request_regarding: request_regarding.to_string(),
        request_type: request_type.to_string(),
        request_description,
    }))
}

fn normalize_tree(raw: &RawClassification, request_description: String) -> StructuredFields {
    let request_regarding = field(raw, "requestRegarding")
        .and_then(|guess| match_enum_value(guess, schema::TREE_REGARDING))
        .unwrap_or("Other");

    // The request-type enumeration is governed by the resolved regarding value
    let request_type = if request_regarding == "Other" {
        schema::TREE_OTHER_TYPE
    } else {
        field(raw, "requestType")
            .and_then(|guess| match_enum_value(guess, schema::tree_types_for(request_regarding)))
            .unwrap_or(schema::TREE_TYPE_FALLBACK)
    };

    StructuredFields::Tree(schema::TreeFields {
        request_regarding: request_regarding.to_string(),
        request_type: request_type.to_string(),
        request_description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::REPORTABLE_CATEGORIES;

    fn raw(category: &str, confidence: f64, fields: serde_json::Value) -> RawClassification {
        RawClassification {
            category: category.to_string(),
            confidence,
            description: "Test description".to_string(),
            location_description: "Near the curb".to_string(),
            form_fields: fields.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn match_enum_value_exact_beats_substring() {
        let legal = &["Damaged Tree", "Damaged Tree Limb"];
        assert_eq!(match_enum_value("damaged tree", legal), Some("Damaged Tree"));
    }

    #[test]
    fn match_enum_value_substring_both_directions() {
        assert_eq!(
            match_enum_value("cracked", schema::SIDEWALK_SECONDARY_TYPES),
            Some("Cracked sidewalk")
        );
        assert_eq!(
            match_enum_value("the sidewalk has a sidewalk defect", schema::SIDEWALK_REQUEST_TYPES),
            Some("Sidewalk Defect")
        );
    }

    #[test]
    fn match_enum_value_token_match() {
        assert_eq!(
            match_enum_value("pothole defect", schema::STREET_REQUEST_TYPES),
            Some("Pothole/Pavement Defect")
        );
    }

    #[test]
    fn match_enum_value_first_match_wins_in_list_order() {
        // "sidewalk" is a substring of several entries; the first declared wins
        assert_eq!(
            match_enum_value("sidewalk", schema::SIDEWALK_SECONDARY_TYPES),
            Some("Collapsed sidewalk")
        );
    }

    #[test]
    fn match_enum_value_no_match() {
        assert_eq!(match_enum_value("volcano", schema::STREET_REQUEST_TYPES), None);
        assert_eq!(match_enum_value("", schema::STREET_REQUEST_TYPES), None);
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let accepted = normalize(
            &raw("Road Crack", 0.6, serde_json::json!({"requestType": "pothole"})),
            0.6,
        );
        assert!(accepted.is_ok());

        let rejected = normalize(
            &raw("Road Crack", 0.59, serde_json::json!({"requestType": "pothole"})),
            0.6,
        );
        assert!(matches!(rejected, Err(RejectionReason::LowConfidence(_))));
    }

    #[test]
    fn none_category_rejected_as_not_civic() {
        let result = normalize(&raw("None", 0.0, serde_json::json!({})), 0.6);
        assert!(matches!(
            result,
            Err(RejectionReason::NotCivicInfrastructure(_))
        ));
    }

    #[test]
    fn missing_category_rejected_as_not_civic() {
        // A response with no category field deserializes to an empty string
        // and must not fall through to the first reportable category.
        let result = normalize(&raw("", 0.95, serde_json::json!({})), 0.6);
        assert!(matches!(
            result,
            Err(RejectionReason::NotCivicInfrastructure(_))
        ));
    }

    #[test]
    fn unrecognized_category_rejected_as_not_civic() {
        let result = normalize(&raw("a sleeping cat", 0.95, serde_json::json!({})), 0.6);
        assert!(matches!(
            result,
            Err(RejectionReason::NotCivicInfrastructure(_))
        ));
    }

    #[test]
    fn every_category_normalizes_with_exact_field_guesses() {
        let guesses = [
            (
                "Road Crack",
                serde_json::json!({"requestType": "Pothole/Pavement Defect"}),
            ),
            (
                "Sidewalk Crack",
                serde_json::json!({"requestType": "Curb or Curb Ramp Defect"}),
            ),
            (
                "Graffiti",
                serde_json::json!({"issueType": "Graffiti on Public Property", "requestRegarding": "Not Offensive (no racial slurs or profanity)", "requestType": "Pole"}),
            ),
            ("Overflowing Trash", serde_json::json!({})),
            ("Faded Street Markings", serde_json::json!({})),
            ("Broken Street Light", serde_json::json!({})),
            (
                "Fallen Tree",
                serde_json::json!({"requestRegarding": "Damaged Tree", "requestType": "Fallen tree"}),
            ),
        ];

        for ((label, fields), category) in guesses.iter().zip(REPORTABLE_CATEGORIES) {
            let normalized = normalize(&raw(label, 0.9, fields.clone()), 0.6)
                .unwrap_or_else(|e| panic!("{label} failed to normalize: {e}"));
            assert_eq!(normalized.category, *category);

            // The structured object's keys equal exactly the schema's
            // required-field set for the category
            let object = normalized.fields.to_object();
            let mut keys: Vec<&str> = object.keys().map(|k| k.as_str()).collect();
            keys.sort_unstable();
            let mut required: Vec<&str> = schema::required_fields(*category).to_vec();
            required.sort_unstable();
            assert_eq!(keys, required, "field keys mismatch for {label}");
        }
    }

    #[test]
    fn scenario_a_normalization() {
        let normalized = normalize(
            &raw(
                "Road Crack",
                0.87,
                serde_json::json!({"requestType": "pothole defect"}),
            ),
            0.6,
        )
        .unwrap();

        match normalized.fields {
            StructuredFields::Street(ref f) => {
                assert_eq!(f.request_type, "Pothole/Pavement Defect");
            }
            ref other => panic!("expected street fields, got {other:?}"),
        }
    }

    #[test]
    fn street_request_type_falls_back_to_other() {
        let normalized = normalize(
            &raw("Road Crack", 0.9, serde_json::json!({"requestType": "sinkhole swallowing a bus"})),
            0.6,
        )
        .unwrap();

        match normalized.fields {
            StructuredFields::Street(ref f) => assert_eq!(f.request_type, "Other"),
            ref other => panic!("expected street fields, got {other:?}"),
        }
    }

    #[test]
    fn sidewalk_unmappable_request_type_rejects() {
        let result = normalize(
            &raw("Sidewalk Crack", 0.9, serde_json::json!({"requestType": "volcano"})),
            0.6,
        );
        assert!(matches!(
            result,
            Err(RejectionReason::NotCivicInfrastructure(_))
        ));
    }

    #[test]
    fn sidewalk_secondary_only_under_governing_value() {
        // Governing value resolved to something else: sub-field omitted
        let normalized = normalize(
            &raw(
                "Sidewalk Crack",
                0.9,
                serde_json::json!({"requestType": "Curb or Curb Ramp Defect", "secondaryRequestType": "Lifted sidewalk"}),
            ),
            0.6,
        )
        .unwrap();

        match normalized.fields {
            StructuredFields::Sidewalk(ref f) => {
                assert!(f.secondary_request_type.is_none());
            }
            ref other => panic!("expected sidewalk fields, got {other:?}"),
        }
    }

    #[test]
    fn posting_issue_type_forces_pole() {
        let normalized = normalize(
            &raw(
                "Graffiti",
                0.9,
                serde_json::json!({"issueType": "Illegal Postings", "requestRegarding": "Multiple Postings"}),
            ),
            0.6,
        )
        .unwrap();

        match normalized.fields {
            StructuredFields::Graffiti(ref f) => {
                assert_eq!(f.issue_type, "Illegal Postings on Public Property");
                assert_eq!(f.request_type, "Pole");
            }
            ref other => panic!("expected graffiti fields, got {other:?}"),
        }
    }

    #[test]
    fn tree_request_type_follows_governing_regarding() {
        let normalized = normalize(
            &raw(
                "Fallen Tree",
                0.9,
                serde_json::json!({"requestRegarding": "Overgrown", "requestType": "pruning"}),
            ),
            0.6,
        )
        .unwrap();

        match normalized.fields {
            StructuredFields::Tree(ref f) => {
                assert_eq!(f.request_regarding, "Overgrown Tree");
                assert_eq!(f.request_type, "Pruning request");
            }
            ref other => panic!("expected tree fields, got {other:?}"),
        }
    }
}
