//! Core domain types for issue reports and pipeline outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::schema::StructuredFields;

/// Closed set of civic-issue categories the pipeline recognizes.
///
/// `None` means the image was judged not to show a reportable issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum IssueCategory {
    None,
    RoadCrack,
    SidewalkCrack,
    Graffiti,
    OverflowingTrash,
    FadedMarkings,
    BrokenStreetlight,
    FallenTree,
}

/// All reportable categories, in classifier-prompt order.
pub const REPORTABLE_CATEGORIES: &[IssueCategory] = &[
    IssueCategory::RoadCrack,
    IssueCategory::SidewalkCrack,
    IssueCategory::Graffiti,
    IssueCategory::OverflowingTrash,
    IssueCategory::FadedMarkings,
    IssueCategory::BrokenStreetlight,
    IssueCategory::FallenTree,
];

/// Raw category aliases the upstream classifier uses for "no issue"
const NONE_ALIASES: &[&str] = &["none", "no issue", "not applicable", "n/a"];

impl IssueCategory {
    /// Human-readable label as used in classifier output and search queries
    pub fn label(&self) -> &'static str {
        match self {
            IssueCategory::None => "None",
            IssueCategory::RoadCrack => "Road Crack",
            IssueCategory::SidewalkCrack => "Sidewalk Crack",
            IssueCategory::Graffiti => "Graffiti",
            IssueCategory::OverflowingTrash => "Overflowing Trash",
            IssueCategory::FadedMarkings => "Faded Street Markings",
            IssueCategory::BrokenStreetlight => "Broken Street Light",
            IssueCategory::FallenTree => "Fallen Tree",
        }
    }

    /// Municipal department that owns this category of report
    pub fn department(&self) -> &'static str {
        match self {
            IssueCategory::RoadCrack => "Public Works - Street Maintenance",
            IssueCategory::SidewalkCrack => "Public Works - Sidewalk Repair",
            IssueCategory::Graffiti => "Public Works - Graffiti Removal",
            IssueCategory::OverflowingTrash => "Public Works - Street Cleaning",
            IssueCategory::FadedMarkings => "Public Works - Traffic Division",
            IssueCategory::BrokenStreetlight => "Public Works - Street Lighting",
            IssueCategory::FallenTree => "Public Works - Urban Forestry",
            IssueCategory::None => "Public Works - General",
        }
    }

    /// Map a raw classifier category string onto the closed enumeration.
    ///
    /// Tolerates classifier drift: "None" aliases are normalized, otherwise a
    /// case-insensitive substring match in either direction against the
    /// category labels is accepted. Unrecognized strings map to `None`, the
    /// spam bucket.
    pub fn match_label(raw: &str) -> IssueCategory {
        let raw = raw.trim();
        let raw_lower = raw.to_lowercase();

        if raw_lower.is_empty() || NONE_ALIASES.contains(&raw_lower.as_str()) {
            return IssueCategory::None;
        }

        for category in REPORTABLE_CATEGORIES {
            let label_lower = category.label().to_lowercase();
            if label_lower == raw_lower
                || label_lower.contains(&raw_lower)
                || raw_lower.contains(&label_lower)
            {
                return *category;
            }
        }

        IssueCategory::None
    }
}

/// GPS coordinates attached to a report
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Formatted as the automation adapters expect: `"lat, lon"`
    pub fn formatted(&self) -> String {
        format!("{}, {}", self.latitude, self.longitude)
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

/// Pipeline state machine. Terminal states are final: a report is never
/// mutated after reaching one.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportStatus {
    Created,
    Classifying,
    /// Normal, non-exceptional terminal state: not a reportable issue
    Rejected { reason: String },
    Resolving,
    Dispatching,
    Extracting,
    /// Pipeline-fatal terminal state
    Failed { stage: FailureStage, reason: String },
    Submitted { tracking_number: String },
    /// The adapter almost certainly filed the report, but no tracking
    /// identifier could be recognized in its output
    SubmittedUnconfirmed,
}

/// Stage at which a pipeline-fatal failure occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Resolution,
    Dispatch,
}

impl ReportStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReportStatus::Rejected { .. }
                | ReportStatus::Failed { .. }
                | ReportStatus::Submitted { .. }
                | ReportStatus::SubmittedUnconfirmed
        )
    }

    /// Stable status string for the outcome record
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Created => "created",
            ReportStatus::Classifying => "classifying",
            ReportStatus::Rejected { .. } => "rejected",
            ReportStatus::Resolving => "resolving",
            ReportStatus::Dispatching => "dispatching",
            ReportStatus::Extracting => "extracting",
            ReportStatus::Failed {
                stage: FailureStage::Resolution,
                ..
            } => "failed_resolution",
            ReportStatus::Failed {
                stage: FailureStage::Dispatch,
                ..
            } => "failed_dispatch",
            ReportStatus::Submitted { .. } => "submitted",
            ReportStatus::SubmittedUnconfirmed => "submitted_unconfirmed",
        }
    }
}

/// Per-stage timestamps for observability
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct StageTimestamps {
    pub classified_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One submission attempt, mutated in place by each pipeline stage.
///
/// Owned by exactly one pipeline run; stages execute sequentially so the
/// report is never mutated concurrently.
#[derive(Debug, Clone)]
pub struct IssueReport {
    pub id: Uuid,
    pub coordinates: Coordinates,
    pub category: IssueCategory,
    pub confidence: f64,
    pub description: String,
    pub location_description: String,
    pub structured_fields: Option<StructuredFields>,
    pub resolved_url: Option<Url>,
    pub tracking_number: Option<String>,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    pub timestamps: StageTimestamps,
}

impl IssueReport {
    /// Create a fresh report at pipeline start
    pub fn new(coordinates: Coordinates) -> Self {
        Self {
            id: Uuid::new_v4(),
            coordinates,
            category: IssueCategory::None,
            confidence: 0.0,
            description: String::new(),
            location_description: String::new(),
            structured_fields: None,
            resolved_url: None,
            tracking_number: None,
            status: ReportStatus::Created,
            created_at: Utc::now(),
            timestamps: StageTimestamps::default(),
        }
    }
}

/// Final result record handed off to the caller. One per pipeline run.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReportOutcome {
    pub id: Uuid,
    /// Terminal state: one of `rejected`, `failed_resolution`,
    /// `failed_dispatch`, `submitted`, `submitted_unconfirmed`
    pub status: String,
    pub category: String,
    pub confidence: f64,
    pub coordinates: Coordinates,
    pub department: Option<String>,
    #[schema(value_type = Option<String>)]
    pub resolved_url: Option<Url>,
    pub tracking_number: Option<String>,
    /// Street address recognized in the adapter output, when present
    pub address: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub timestamps: StageTimestamps,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_label_exact() {
        assert_eq!(
            IssueCategory::match_label("Road Crack"),
            IssueCategory::RoadCrack
        );
        assert_eq!(
            IssueCategory::match_label("Fallen Tree"),
            IssueCategory::FallenTree
        );
    }

    #[test]
    fn match_label_substring_and_case() {
        assert_eq!(
            IssueCategory::match_label("sidewalk crack detected"),
            IssueCategory::SidewalkCrack
        );
        assert_eq!(IssueCategory::match_label("graffiti"), IssueCategory::Graffiti);
        assert_eq!(
            IssueCategory::match_label("Broken Street"),
            IssueCategory::BrokenStreetlight
        );
    }

    #[test]
    fn match_label_none_aliases() {
        for alias in ["None", "no issue", "N/A", "not applicable"] {
            assert_eq!(IssueCategory::match_label(alias), IssueCategory::None);
        }
    }

    #[test]
    fn match_label_unrecognized_is_spam_bucket() {
        assert_eq!(IssueCategory::match_label("a cat"), IssueCategory::None);
    }

    #[test]
    fn match_label_blank_is_spam_bucket() {
        assert_eq!(IssueCategory::match_label(""), IssueCategory::None);
        assert_eq!(IssueCategory::match_label("   "), IssueCategory::None);
    }

    #[test]
    fn terminal_states() {
        assert!(ReportStatus::Rejected {
            reason: "spam".into()
        }
        .is_terminal());
        assert!(ReportStatus::SubmittedUnconfirmed.is_terminal());
        assert!(!ReportStatus::Resolving.is_terminal());
    }

    #[test]
    fn status_strings_distinguish_failure_stages() {
        let resolution = ReportStatus::Failed {
            stage: FailureStage::Resolution,
            reason: "LocalityUnresolved".into(),
        };
        let dispatch = ReportStatus::Failed {
            stage: FailureStage::Dispatch,
            reason: "AdapterCrash".into(),
        };
        assert_ne!(resolution.as_str(), dispatch.as_str());
    }
}
