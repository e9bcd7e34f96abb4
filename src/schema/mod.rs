//! Classification schema: the static rule table mapping each category to its
//! structured form fields and their enumerated legal values.
//!
//! The enumerations mirror the destination forms' dropdowns verbatim. Every
//! value the normalizer accepts appears in one of these tables; there is no
//! free-form field in the schema-governed set (`request_description` is the
//! only free-text carrier and lives outside the tables).

use serde::Serialize;

use crate::model::IssueCategory;

// ---------------------------------------------------------------------------
// Road / street damage
// ---------------------------------------------------------------------------

pub const STREET_DAMAGE_TYPE: &str = "pothole";
pub const STREET_ISSUE_TYPE: &str = "Street";

pub const STREET_REQUEST_TYPES: &[&str] = &[
    "Pothole/Pavement Defect",
    "Construction Plate Shifted",
    "Manhole Cover Off",
    "Utility Excavation",
    "Other",
];

/// Fallback when the classifier's guess matches nothing in the list
pub const STREET_REQUEST_FALLBACK: &str = "Other";

// ---------------------------------------------------------------------------
// Sidewalk / curb damage
// ---------------------------------------------------------------------------

pub const SIDEWALK_DAMAGE_TYPE: &str = "sidewalk";
pub const SIDEWALK_ISSUE_TYPE: &str = "Sidewalk/Curb";

pub const SIDEWALK_REQUEST_TYPES: &[&str] = &[
    "Sidewalk Defect",
    "Curb or Curb Ramp Defect",
    "Missing Side Sewer Vent Cover",
    "Damaged Side Sewer Vent Cover",
    "Public Stairway Defect",
    "Pothole/Pavement Defect",
];

/// Secondary select shown only when `requestType` is "Sidewalk Defect"
pub const SIDEWALK_SECONDARY_TYPES: &[&str] = &[
    "Collapsed sidewalk",
    "Lifted sidewalk",
    "Cracked sidewalk",
];

/// Value of `requestType` that governs the secondary select
pub const SIDEWALK_SECONDARY_GOVERNOR: &str = "Sidewalk Defect";

// ---------------------------------------------------------------------------
// Graffiti
// ---------------------------------------------------------------------------

pub const GRAFFITI_ISSUE_TYPES: &[&str] = &[
    "Graffiti on Private Property",
    "Graffiti on Public Property",
    "Illegal Postings on Public Property",
];

pub const GRAFFITI_REGARDING: &[&str] = &[
    "Not Offensive (no racial slurs or profanity)",
    "Offensive (racial slurs or profanity)",
];

pub const GRAFFITI_REGARDING_FALLBACK: &str = "Not Offensive (no racial slurs or profanity)";

pub const GRAFFITI_PRIVATE_TYPES: &[&str] = &[
    "Building - Commercial",
    "Building - Residential",
    "Building - Other",
    "Sidewalk in front of property",
];

pub const GRAFFITI_PUBLIC_TYPES: &[&str] = &[
    "Pole",
    "Bridge",
    "Street",
    "Sidewalk structure",
    "Signal box",
    "Transit Shelter/ Platform",
    "City receptacle",
    "Bike rack",
    "Fire hydrant",
    "Fire/ Police Call Box",
    "Mail box",
    "News rack",
    "Parking meter",
    "Pay phone",
    "Sign - Parking and Traffic",
    "ATT Property",
    "Other - enter additional details",
];

pub const GRAFFITI_PUBLIC_FALLBACK: &str = "Other - enter additional details";
pub const GRAFFITI_PRIVATE_FALLBACK: &str = "Building - Other";

/// Illegal postings always target a pole; `requestRegarding` carries the
/// violation type instead of the offensiveness flag.
pub const POSTING_REQUEST_TYPE: &str = "Pole";

pub const POSTING_REGARDING: &[&str] = &[
    "Multiple Postings",
    "Affixed Improperly",
    "No Posting Date",
    "Posted Over 70 Days",
    "Posting Too Large in Size",
    "Posting Too High on Pole",
    "Posted on Traffic Light",
    "Posted on Historic Street Light",
    "Posted on Directional Sign",
];

// ---------------------------------------------------------------------------
// Trees
// ---------------------------------------------------------------------------

pub const TREE_REGARDING: &[&str] = &[
    "Damaged Tree",
    "Damaging Property",
    "Landscaping",
    "Overgrown Tree",
    "Other",
];

pub const TREE_DAMAGED_TYPES: &[&str] = &[
    "Fallen tree",
    "Hanging limb",
    "About to fall",
    "Dead tree",
    "Damaged Tree",
    "Vandalized Tree",
    "Other - Enter Details",
];

pub const TREE_PROPERTY_TYPES: &[&str] = &[
    "Lifted sidewalk - tree roots",
    "Hitting window or building",
    "Property damage",
    "Sewer damage - tree roots",
    "Other - Enter Details",
];

pub const TREE_LANDSCAPING_TYPES: &[&str] = &[
    "Weeding",
    "Remove tree suckers",
    "Backfill tree basin",
    "Empty tree basin",
    "Remove garden debris",
    "Restake tree",
    "Shrubbery blocking visibility",
    "Lawn mowing",
    "Vacant lot weeding",
    "Sprinkler system issues",
    "Request water meter",
    "Other - Enter Details",
];

pub const TREE_OVERGROWN_TYPES: &[&str] = &[
    "Pruning request",
    "Blocking sidewalk",
    "Blocking street lights",
    "Blocking traffic signal",
    "Blocking signs",
    "Near communication line",
    "Other - Enter Details",
];

pub const TREE_OTHER_TYPE: &str = "N/A";

pub const TREE_TYPE_FALLBACK: &str = "Other - Enter Details";

/// Request-type enumeration governed by the tree `requestRegarding` value
pub fn tree_types_for(regarding: &str) -> &'static [&'static str] {
    match regarding {
        "Damaged Tree" => TREE_DAMAGED_TYPES,
        "Damaging Property" => TREE_PROPERTY_TYPES,
        "Landscaping" => TREE_LANDSCAPING_TYPES,
        "Overgrown Tree" => TREE_OVERGROWN_TYPES,
        _ => &[],
    }
}

// ---------------------------------------------------------------------------
// Typed structured-field records
// ---------------------------------------------------------------------------

/// Road/street damage form fields
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreetFields {
    pub damage_type: &'static str,
    pub issue_type: &'static str,
    pub request_type: String,
    pub request_description: String,
}

/// Sidewalk/curb damage form fields. The secondary select is present only
/// when `request_type` is "Sidewalk Defect".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SidewalkFields {
    pub damage_type: &'static str,
    pub issue_type: &'static str,
    pub request_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_request_type: Option<String>,
    pub request_description: String,
}

/// Graffiti / illegal-postings form fields
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraffitiFields {
    pub issue_type: String,
    pub request_regarding: String,
    pub request_type: String,
    pub request_description: String,
}

/// Tree issue form fields
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeFields {
    pub request_regarding: String,
    pub request_type: String,
    pub request_description: String,
}

/// Categories without a dropdown decision tree carry only the description
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionFields {
    pub request_description: String,
}

/// Schema-validated structured fields, one closed variant per category
/// family. Produced only by the normalizer; downstream components never
/// re-validate the values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StructuredFields {
    Street(StreetFields),
    Sidewalk(SidewalkFields),
    Graffiti(GraffitiFields),
    Tree(TreeFields),
    Description(DescriptionFields),
}

impl StructuredFields {
    /// Flatten into a JSON object for adapter payload construction
    pub fn to_object(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            // Unreachable: every variant serializes to an object
            _ => serde_json::Map::new(),
        }
    }

    /// The free-text description destined for the form
    pub fn request_description(&self) -> &str {
        match self {
            StructuredFields::Street(f) => &f.request_description,
            StructuredFields::Sidewalk(f) => &f.request_description,
            StructuredFields::Graffiti(f) => &f.request_description,
            StructuredFields::Tree(f) => &f.request_description,
            StructuredFields::Description(f) => &f.request_description,
        }
    }
}

/// Required schema-governed field names per category, used by the payload
/// contract check. `requestDescription` is always required.
pub fn required_fields(category: IssueCategory) -> &'static [&'static str] {
    match category {
        IssueCategory::RoadCrack => {
            &["damageType", "issueType", "requestType", "requestDescription"]
        }
        IssueCategory::SidewalkCrack => {
            &["damageType", "issueType", "requestType", "requestDescription"]
        }
        IssueCategory::Graffiti => &[
            "issueType",
            "requestRegarding",
            "requestType",
            "requestDescription",
        ],
        IssueCategory::FallenTree => &["requestRegarding", "requestType", "requestDescription"],
        IssueCategory::OverflowingTrash
        | IssueCategory::FadedMarkings
        | IssueCategory::BrokenStreetlight => &["requestDescription"],
        IssueCategory::None => &[],
    }
}
