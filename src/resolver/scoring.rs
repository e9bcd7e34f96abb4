//! Relevance scoring and selection of candidate destination forms
//!
//! Scoring is a deterministic function of domain and keyword signals, not an
//! opaque external ranking: the search engine's own rank is the base signal,
//! and a recognized government zone dominates everything layered on top.

use url::Url;

use crate::resolver::search::SerpResult;

/// Report-intent keywords worth a title bonus
const INTENT_KEYWORDS: &[&str] = &["report", "form", "submit"];

/// A scored candidate destination form
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateLink {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub rank: u32,
    pub relevance_score: f64,
}

/// True for hosts inside a recognized government top-level zone
pub fn is_authoritative_domain(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_lowercase();

    host == "gov" || host.ends_with(".gov") || host.contains(".gov.")
}

/// Score one search result for a given locality.
///
/// Weights, strictly ordered: engine rank inverted to `11 - rank` as base;
/// authoritative domain +5.0; report-intent keyword in title +2.0; "311" in
/// title or URL +1.5; locality in URL +1.0; locality in title +0.5.
pub fn score_candidate(result: &SerpResult, locality: &str) -> f64 {
    let locality_lower = locality.to_lowercase();
    let title_lower = result.title.to_lowercase();
    let url_lower = result.url.to_lowercase();

    // Engine rank is the primary signal: rank 1 scores 10.0, rank 2 scores
    // 9.0, and so on
    let mut score = 11.0 - result.rank as f64;

    if is_authoritative_domain(&result.url) {
        score += 5.0;
    }

    if INTENT_KEYWORDS.iter().any(|k| title_lower.contains(k)) {
        score += 2.0;
    }

    if title_lower.contains("311") || url_lower.contains("311") {
        score += 1.5;
    }

    if url_lower.contains(&locality_lower) {
        score += 1.0;
    }

    if title_lower.contains(&locality_lower) {
        score += 0.5;
    }

    score
}

/// Score and order candidates for a locality.
///
/// The sort key is (score desc, rank asc, url asc), so the ordering is
/// idempotent and independent of input order.
pub fn rank_candidates(results: &[SerpResult], locality: &str) -> Vec<CandidateLink> {
    let mut candidates: Vec<CandidateLink> = results
        .iter()
        .map(|r| CandidateLink {
            url: r.url.clone(),
            title: r.title.clone(),
            snippet: r.snippet.clone(),
            rank: r.rank,
            relevance_score: score_candidate(r, locality),
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.rank.cmp(&b.rank))
            .then_with(|| a.url.cmp(&b.url))
    });

    candidates
}

/// Pick the destination form: the first authoritative-domain candidate in
/// score order, or the highest-scored candidate when no authoritative domain
/// is present.
pub fn select_top(candidates: &[CandidateLink]) -> Option<&CandidateLink> {
    candidates
        .iter()
        .find(|c| is_authoritative_domain(&c.url))
        .or_else(|| candidates.first())
}
