//! Destination form resolution
//!
//! Given accepted report coordinates and a category, find the municipal web
//! form to submit to: reverse geocode to a locality, search for the locality's
//! reporting page, then score and pick the best candidate.

pub mod geocode;
pub mod scoring;
pub mod search;

use std::sync::Arc;

use url::Url;

use crate::model::{Coordinates, IssueCategory};

pub use geocode::{GeocodeError, LocalityResolver, NominatimResolver, ResolvedLocality};
pub use scoring::{rank_candidates, select_top, CandidateLink};
pub use search::{BrightDataSearch, SearchError, SearchProvider, SerpResult};

/// Pipeline-fatal resolution failures. No retry happens inside the pipeline;
/// the caller may retry the whole request later.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionFailure {
    #[error("LocalityUnresolved: {0}")]
    LocalityUnresolved(#[source] GeocodeError),
    #[error("SearchTimeout: {0}")]
    SearchTimeout(#[source] SearchError),
    #[error("SearchFailed: {0}")]
    SearchFailed(#[source] SearchError),
    #[error("NoCandidates: no form candidates for query {query:?}")]
    NoCandidates { query: String },
}

impl ResolutionFailure {
    /// Short reason name carried into the terminal report state
    pub fn reason(&self) -> &'static str {
        match self {
            Self::LocalityUnresolved(_) => "LocalityUnresolved",
            Self::SearchTimeout(_) => "SearchTimeout",
            Self::SearchFailed(_) => "SearchFailed",
            Self::NoCandidates { .. } => "NoCandidates",
        }
    }
}

/// A resolved destination form together with the locality context that
/// produced it
#[derive(Debug, Clone)]
pub struct ResolvedForm {
    pub url: Url,
    pub locality: ResolvedLocality,
    pub query: String,
    pub candidate: CandidateLink,
}

/// Resolves the destination form for an accepted report
pub struct FormResolver {
    locality: Arc<dyn LocalityResolver>,
    search: Arc<dyn SearchProvider>,
}

impl FormResolver {
    pub fn new(locality: Arc<dyn LocalityResolver>, search: Arc<dyn SearchProvider>) -> Self {
        Self { locality, search }
    }

    pub async fn resolve(
        &self,
        category: IssueCategory,
        coordinates: Coordinates,
    ) -> Result<ResolvedForm, ResolutionFailure> {
        let locality = self
            .locality
            .reverse(coordinates)
            .await
            .map_err(ResolutionFailure::LocalityUnresolved)?;

        let query = format!("{} report {}", locality.locality, category.label());
        tracing::info!(query = %query, locality = %locality.locality, "resolving destination form");

        let results = self.search.search(&query).await.map_err(|e| match e {
            SearchError::Timeout { .. } => ResolutionFailure::SearchTimeout(e),
            other => ResolutionFailure::SearchFailed(other),
        })?;

        let candidates = rank_candidates(&results, &locality.locality);
        let top = select_top(&candidates).ok_or_else(|| ResolutionFailure::NoCandidates {
            query: query.clone(),
        })?;

        let url = Url::parse(&top.url).map_err(|_| ResolutionFailure::NoCandidates {
            query: query.clone(),
        })?;

        tracing::info!(
            url = %url,
            score = top.relevance_score,
            authoritative = scoring::is_authoritative_domain(&top.url),
            "destination form selected"
        );

        Ok(ResolvedForm {
            url,
            query,
            candidate: top.clone(),
            locality,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedLocality;

    #[async_trait]
    impl LocalityResolver for FixedLocality {
        async fn reverse(&self, _c: Coordinates) -> Result<ResolvedLocality, GeocodeError> {
            Ok(ResolvedLocality {
                locality: "San Francisco".to_string(),
                state: Some("California".to_string()),
                address: "1455 Market St, San Francisco, California 94103".to_string(),
            })
        }
    }

    struct NoLocality;

    #[async_trait]
    impl LocalityResolver for NoLocality {
        async fn reverse(&self, c: Coordinates) -> Result<ResolvedLocality, GeocodeError> {
            Err(GeocodeError::NoLocality(c))
        }
    }

    struct FixedSearch(Vec<SerpResult>);

    #[async_trait]
    impl SearchProvider for FixedSearch {
        async fn search(&self, _query: &str) -> Result<Vec<SerpResult>, SearchError> {
            Ok(self.0.clone())
        }
    }

    struct FailingSearch(fn() -> SearchError);

    #[async_trait]
    impl SearchProvider for FailingSearch {
        async fn search(&self, _query: &str) -> Result<Vec<SerpResult>, SearchError> {
            Err((self.0)())
        }
    }

    fn coords() -> Coordinates {
        Coordinates {
            latitude: 37.7793,
            longitude: -122.4193,
        }
    }

    #[tokio::test]
    async fn resolves_authoritative_url_and_builds_query() {
        let search = FixedSearch(vec![
            SerpResult {
                title: "Report a pothole".to_string(),
                url: "https://example.com/report".to_string(),
                snippet: String::new(),
                rank: 1,
            },
            SerpResult {
                title: "SF311".to_string(),
                url: "https://sf.gov/report-pothole".to_string(),
                snippet: String::new(),
                rank: 2,
            },
        ]);
        let resolver = FormResolver::new(Arc::new(FixedLocality), Arc::new(search));

        let form = resolver
            .resolve(IssueCategory::RoadCrack, coords())
            .await
            .unwrap();
        assert_eq!(form.url.as_str(), "https://sf.gov/report-pothole");
        assert_eq!(form.query, "San Francisco report Road Crack");
    }

    #[tokio::test]
    async fn falls_back_to_non_authoritative_when_no_gov_result() {
        let search = FixedSearch(vec![SerpResult {
            title: "Report a pothole".to_string(),
            url: "https://seeclickfix.example.com/report".to_string(),
            snippet: String::new(),
            rank: 1,
        }]);
        let resolver = FormResolver::new(Arc::new(FixedLocality), Arc::new(search));

        let form = resolver
            .resolve(IssueCategory::RoadCrack, coords())
            .await
            .unwrap();
        assert_eq!(form.url.host_str(), Some("seeclickfix.example.com"));
    }

    #[tokio::test]
    async fn geocode_failure_maps_to_locality_unresolved() {
        let resolver = FormResolver::new(Arc::new(NoLocality), Arc::new(FixedSearch(vec![])));

        let err = resolver
            .resolve(IssueCategory::Graffiti, coords())
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "LocalityUnresolved");
    }

    #[tokio::test]
    async fn search_timeout_maps_to_search_timeout() {
        let search = FailingSearch(|| SearchError::Timeout {
            attempts: 30,
            elapsed_secs: 90,
        });
        let resolver = FormResolver::new(Arc::new(FixedLocality), Arc::new(search));

        let err = resolver
            .resolve(IssueCategory::RoadCrack, coords())
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "SearchTimeout");
    }

    #[tokio::test]
    async fn other_search_errors_map_to_search_failed() {
        let search = FailingSearch(|| SearchError::NoSnapshotId);
        let resolver = FormResolver::new(Arc::new(FixedLocality), Arc::new(search));

        let err = resolver
            .resolve(IssueCategory::RoadCrack, coords())
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "SearchFailed");
    }

    #[tokio::test]
    async fn empty_results_map_to_no_candidates() {
        let resolver = FormResolver::new(Arc::new(FixedLocality), Arc::new(FixedSearch(vec![])));

        let err = resolver
            .resolve(IssueCategory::Graffiti, coords())
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "NoCandidates");
    }
}
