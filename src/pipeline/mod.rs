//! Pipeline orchestrator
//!
//! Drives one report through classify, normalize, resolve, dispatch, and
//! extract. Stages run strictly in order; a rejection or failure at any stage
//! is terminal and no later stage is invoked. The pipeline itself never
//! retries; the caller may retry the whole request.

use std::sync::Arc;

use chrono::Utc;

use crate::classify::{normalize, ImageClassifier, RejectionReason};
use crate::model::{
    Coordinates, FailureStage, IssueCategory, IssueReport, ReportOutcome, ReportStatus,
};
use crate::resolver::FormResolver;
use crate::submit::{build_payload, check_contract, AutomationRegistry, TrackingExtractor};

/// One inbound submission request
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub image: Vec<u8>,
    pub image_path: String,
    pub coordinates: Coordinates,
}

/// Orchestrates the full report lifecycle over its collaborator seams
pub struct ReportPipeline {
    classifier: Arc<dyn ImageClassifier>,
    resolver: FormResolver,
    registry: Arc<AutomationRegistry>,
    extractor: TrackingExtractor,
    confidence_threshold: f64,
}

impl ReportPipeline {
    pub fn new(
        classifier: Arc<dyn ImageClassifier>,
        resolver: FormResolver,
        registry: Arc<AutomationRegistry>,
        confidence_threshold: f64,
    ) -> Self {
        Self {
            classifier,
            resolver,
            registry,
            extractor: TrackingExtractor::new(),
            confidence_threshold,
        }
    }

    /// Run one report end to end. Always returns a terminal outcome; expected
    /// conditions (rejection, resolution or dispatch failure, missing
    /// confirmation) are outcomes, not errors.
    pub async fn run(&self, request: ReportRequest) -> ReportOutcome {
        let mut report = IssueReport::new(request.coordinates);
        tracing::info!(report_id = %report.id, coordinates = %report.coordinates, "pipeline started");

        report.status = ReportStatus::Classifying;
        let classification = match self.classify(&request, &mut report).await {
            Ok(c) => c,
            Err(reason) => {
                tracing::info!(report_id = %report.id, reason = %reason, "report rejected");
                report.status = ReportStatus::Rejected {
                    reason: reason.to_string(),
                };
                report.timestamps.completed_at = Some(Utc::now());
                return self.outcome(report, None);
            }
        };

        report.category = classification.category;
        report.confidence = classification.confidence;
        report.description = classification.description;
        report.location_description = classification.location_description;
        report.structured_fields = Some(classification.fields);
        report.timestamps.classified_at = Some(Utc::now());

        report.status = ReportStatus::Resolving;
        let form = match self.resolver.resolve(report.category, report.coordinates).await {
            Ok(form) => form,
            Err(failure) => {
                tracing::warn!(report_id = %report.id, reason = %failure, "resolution failed");
                report.status = ReportStatus::Failed {
                    stage: FailureStage::Resolution,
                    reason: failure.reason().to_string(),
                };
                report.timestamps.completed_at = Some(Utc::now());
                return self.outcome(report, None);
            }
        };
        report.resolved_url = Some(form.url.clone());
        report.timestamps.resolved_at = Some(Utc::now());
        let geocoded_address = form.locality.address.clone();

        report.status = ReportStatus::Dispatching;
        let adapter_output = match self.dispatch(&request, &report).await {
            Ok(output) => output,
            Err(failure) => {
                tracing::warn!(report_id = %report.id, reason = %failure, "dispatch failed");
                report.status = ReportStatus::Failed {
                    stage: FailureStage::Dispatch,
                    reason: failure.reason().to_string(),
                };
                report.timestamps.completed_at = Some(Utc::now());
                return self.outcome(report, Some(geocoded_address));
            }
        };
        report.timestamps.dispatched_at = Some(Utc::now());

        report.status = ReportStatus::Extracting;
        // Prefer the address the form itself confirmed; fall back to the
        // geocoded one
        let address = self
            .extractor
            .extract_address(&adapter_output)
            .or(Some(geocoded_address));
        match self.extractor.extract(&adapter_output) {
            Ok(tracking_number) => {
                report.tracking_number = Some(tracking_number.clone());
                report.status = ReportStatus::Submitted { tracking_number };
            }
            Err(_) => {
                // The form was almost certainly filed; only confirmation is
                // missing
                report.status = ReportStatus::SubmittedUnconfirmed;
            }
        }
        report.timestamps.completed_at = Some(Utc::now());
        tracing::info!(
            report_id = %report.id,
            status = report.status.as_str(),
            "pipeline finished"
        );

        self.outcome(report, address)
    }

    async fn classify(
        &self,
        request: &ReportRequest,
        report: &mut IssueReport,
    ) -> Result<crate::classify::NormalizedClassification, RejectionReason> {
        let raw = match self
            .classifier
            .classify(&request.image, request.coordinates)
            .await
        {
            Ok(raw) => raw,
            // Classifier transport failures read as "could not establish a
            // confident classification"
            Err(e) => {
                return Err(RejectionReason::LowConfidence(format!(
                    "classification unavailable: {e}"
                )));
            }
        };

        report.confidence = raw.confidence;
        normalize(&raw, self.confidence_threshold)
    }

    async fn dispatch(
        &self,
        request: &ReportRequest,
        report: &IssueReport,
    ) -> Result<String, crate::submit::DispatchFailure> {
        let binding = self.registry.binding(report.category)?;
        let adapter = self.registry.adapter(binding)?;

        // Invariant from normalization: accepted reports always carry fields
        let fields = report
            .structured_fields
            .as_ref()
            .ok_or_else(|| {
                crate::submit::DispatchFailure::ContractViolation(vec![
                    "structuredFields".to_string()
                ])
            })?;

        let payload = build_payload(
            report.coordinates,
            &report.location_description,
            &request.image_path,
            fields,
        );
        check_contract(&payload, &binding.contract)?;

        tracing::info!(
            report_id = %report.id,
            script = binding.script,
            category = report.category.label(),
            "dispatching to automation adapter"
        );
        let outcome = adapter.submit(&payload).await?;
        Ok(outcome.stdout)
    }

    fn outcome(&self, report: IssueReport, address: Option<String>) -> ReportOutcome {
        let failure_reason = match &report.status {
            ReportStatus::Rejected { reason } => Some(reason.clone()),
            ReportStatus::Failed { reason, .. } => Some(reason.clone()),
            _ => None,
        };
        let department = if report.category == IssueCategory::None {
            None
        } else {
            Some(report.category.department().to_string())
        };

        ReportOutcome {
            id: report.id,
            status: report.status.as_str().to_string(),
            category: report.category.label().to_string(),
            confidence: report.confidence,
            coordinates: report.coordinates,
            department,
            resolved_url: report.resolved_url,
            tracking_number: report.tracking_number,
            address,
            failure_reason,
            created_at: report.created_at,
            timestamps: report.timestamps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::classify::RawClassification;
    use crate::resolver::{
        GeocodeError, LocalityResolver, ResolvedLocality, SearchError, SearchProvider, SerpResult,
    };
    use crate::submit::{AdapterOutcome, DispatchFailure, SubmissionAdapter};

    struct MockClassifier {
        category: &'static str,
        confidence: f64,
        fields: serde_json::Value,
        calls: AtomicUsize,
    }

    impl MockClassifier {
        fn new(category: &'static str, confidence: f64, fields: serde_json::Value) -> Self {
            Self {
                category,
                confidence,
                fields,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ImageClassifier for MockClassifier {
        async fn classify(
            &self,
            _image: &[u8],
            _coordinates: Coordinates,
        ) -> Result<RawClassification, crate::classify::ClassifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RawClassification {
                category: self.category.to_string(),
                confidence: self.confidence,
                description: "Damaged asphalt with a deep pothole".to_string(),
                location_description: "Right lane near the crosswalk".to_string(),
                form_fields: self.fields.as_object().cloned().unwrap_or_default(),
            })
        }
    }

    struct MockLocality {
        calls: AtomicUsize,
        fail: bool,
    }

    impl MockLocality {
        fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl LocalityResolver for MockLocality {
        async fn reverse(&self, c: Coordinates) -> Result<ResolvedLocality, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(GeocodeError::NoLocality(c));
            }
            Ok(ResolvedLocality {
                locality: "San Francisco".to_string(),
                state: Some("California".to_string()),
                address: "1455 Market St, San Francisco, California 94103".to_string(),
            })
        }
    }

    struct MockSearch {
        calls: AtomicUsize,
    }

    impl MockSearch {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SearchProvider for MockSearch {
        async fn search(&self, _query: &str) -> Result<Vec<SerpResult>, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![SerpResult {
                title: "Report street and road defects".to_string(),
                url: "https://sf.gov/report-street-defect".to_string(),
                snippet: "Submit a maintenance request".to_string(),
                rank: 1,
            }])
        }
    }

    enum MockAdapterMode {
        Succeed(&'static str),
        Crash,
    }

    struct MockAdapter {
        mode: MockAdapterMode,
        calls: AtomicUsize,
    }

    impl MockAdapter {
        fn new(mode: MockAdapterMode) -> Self {
            Self {
                mode,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SubmissionAdapter for MockAdapter {
        async fn submit(
            &self,
            _payload: &serde_json::Value,
        ) -> Result<AdapterOutcome, DispatchFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.mode {
                MockAdapterMode::Succeed(stdout) => Ok(AdapterOutcome {
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                }),
                MockAdapterMode::Crash => Err(DispatchFailure::AdapterCrash(
                    "script exited with code 1".to_string(),
                )),
            }
        }
    }

    fn request() -> ReportRequest {
        ReportRequest {
            image: vec![0xff, 0xd8, 0xff],
            image_path: "/tmp/uploads/report.jpg".to_string(),
            coordinates: Coordinates {
                latitude: 37.7793,
                longitude: -122.4193,
            },
        }
    }

    fn pipeline(
        classifier: Arc<MockClassifier>,
        locality: Arc<MockLocality>,
        search: Arc<MockSearch>,
        adapter: Arc<MockAdapter>,
    ) -> ReportPipeline {
        ReportPipeline::new(
            classifier,
            FormResolver::new(locality, search),
            Arc::new(AutomationRegistry::with_adapter(adapter)),
            0.6,
        )
    }

    #[tokio::test]
    async fn full_run_submits_with_tracking_number() {
        let classifier = Arc::new(MockClassifier::new(
            "Road Crack",
            0.87,
            serde_json::json!({"requestType": "pothole defect"}),
        ));
        let adapter = Arc::new(MockAdapter::new(MockAdapterMode::Succeed(
            "{\"serviceRequestNumber\": \"101002860550\", \"requestAddress\": \"1455 Market St\"}",
        )));
        let locality = Arc::new(MockLocality::ok());
        let search = Arc::new(MockSearch::new());

        let outcome = pipeline(
            classifier.clone(),
            locality.clone(),
            search.clone(),
            adapter.clone(),
        )
        .run(request())
        .await;

        assert_eq!(outcome.status, "submitted");
        assert_eq!(outcome.tracking_number.as_deref(), Some("101002860550"));
        assert_eq!(outcome.address.as_deref(), Some("1455 Market St"));
        assert_eq!(outcome.category, "Road Crack");
        assert_eq!(
            outcome.resolved_url.as_ref().map(|u| u.as_str()),
            Some("https://sf.gov/report-street-defect")
        );
        assert_eq!(
            outcome.department.as_deref(),
            Some("Public Works - Street Maintenance")
        );
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
        assert!(outcome.timestamps.classified_at.is_some());
        assert!(outcome.timestamps.resolved_at.is_some());
        assert!(outcome.timestamps.dispatched_at.is_some());
        assert!(outcome.timestamps.completed_at.is_some());
    }

    #[tokio::test]
    async fn low_confidence_rejects_before_any_downstream_stage() {
        let classifier = Arc::new(MockClassifier::new(
            "Road Crack",
            0.45,
            serde_json::json!({}),
        ));
        let adapter = Arc::new(MockAdapter::new(MockAdapterMode::Succeed("")));
        let locality = Arc::new(MockLocality::ok());
        let search = Arc::new(MockSearch::new());

        let outcome = pipeline(
            classifier.clone(),
            locality.clone(),
            search.clone(),
            adapter.clone(),
        )
        .run(request())
        .await;

        assert_eq!(outcome.status, "rejected");
        assert!(outcome.failure_reason.as_deref().unwrap().contains("LowConfidence"));
        assert_eq!(outcome.tracking_number, None);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(locality.calls.load(Ordering::SeqCst), 0);
        assert_eq!(search.calls.load(Ordering::SeqCst), 0);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn locality_failure_stops_before_dispatch() {
        let classifier = Arc::new(MockClassifier::new(
            "Graffiti",
            0.9,
            serde_json::json!({
                "issueType": "Graffiti on Private Property",
                "requestType": "Fence"
            }),
        ));
        let adapter = Arc::new(MockAdapter::new(MockAdapterMode::Succeed("")));
        let locality = Arc::new(MockLocality::failing());
        let search = Arc::new(MockSearch::new());

        let outcome = pipeline(
            classifier.clone(),
            locality.clone(),
            search.clone(),
            adapter.clone(),
        )
        .run(request())
        .await;

        assert_eq!(outcome.status, "failed_resolution");
        assert_eq!(outcome.failure_reason.as_deref(), Some("LocalityUnresolved"));
        assert_eq!(search.calls.load(Ordering::SeqCst), 0);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn adapter_crash_fails_dispatch_without_tracking_number() {
        let classifier = Arc::new(MockClassifier::new(
            "Road Crack",
            0.92,
            serde_json::json!({"requestType": "Pothole/Pavement Defect"}),
        ));
        let adapter = Arc::new(MockAdapter::new(MockAdapterMode::Crash));
        let locality = Arc::new(MockLocality::ok());
        let search = Arc::new(MockSearch::new());

        let outcome = pipeline(
            classifier.clone(),
            locality.clone(),
            search.clone(),
            adapter.clone(),
        )
        .run(request())
        .await;

        assert_eq!(outcome.status, "failed_dispatch");
        assert_eq!(outcome.failure_reason.as_deref(), Some("AdapterCrash"));
        assert_eq!(outcome.tracking_number, None);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unrecognized_output_is_submitted_unconfirmed() {
        let classifier = Arc::new(MockClassifier::new(
            "Road Crack",
            0.92,
            serde_json::json!({"requestType": "Pothole/Pavement Defect"}),
        ));
        let adapter = Arc::new(MockAdapter::new(MockAdapterMode::Succeed(
            "form submitted, confirmation will arrive by email",
        )));
        let locality = Arc::new(MockLocality::ok());
        let search = Arc::new(MockSearch::new());

        let outcome = pipeline(
            classifier.clone(),
            locality.clone(),
            search.clone(),
            adapter.clone(),
        )
        .run(request())
        .await;

        assert_eq!(outcome.status, "submitted_unconfirmed");
        assert_eq!(outcome.tracking_number, None);
        assert_eq!(outcome.failure_reason, None);
        assert!(outcome.resolved_url.is_some());
    }

    #[tokio::test]
    async fn non_civic_image_is_rejected() {
        let classifier = Arc::new(MockClassifier::new("None", 0.95, serde_json::json!({})));
        let adapter = Arc::new(MockAdapter::new(MockAdapterMode::Succeed("")));
        let locality = Arc::new(MockLocality::ok());
        let search = Arc::new(MockSearch::new());

        let outcome = pipeline(
            classifier.clone(),
            locality.clone(),
            search.clone(),
            adapter.clone(),
        )
        .run(request())
        .await;

        assert_eq!(outcome.status, "rejected");
        assert!(outcome
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("NotCivicInfrastructure"));
        assert_eq!(outcome.department, None);
        assert_eq!(locality.calls.load(Ordering::SeqCst), 0);
    }
}
