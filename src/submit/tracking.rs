//! Tracking number and address extraction from automation output
//!
//! Scripts print a confirmation page dump on success; the tracking number is
//! recovered by pattern matching rather than a structured channel. Patterns
//! are ordered from most to least specific and the first match with at least
//! eight digits wins, so extraction is deterministic for a given output.

use regex::{Regex, RegexBuilder};

/// A completed submission whose confirmation number could not be recovered.
/// Non-fatal: the report is marked unconfirmed, not failed.
#[derive(Debug, thiserror::Error)]
#[error("ExtractionFailure: no tracking number in adapter output")]
pub struct ExtractionFailure;

/// Minimum digits for a plausible confirmation number
const MIN_TRACKING_DIGITS: usize = 8;

/// Tracking patterns, most specific first. Later entries are broad digit
/// scans and only apply when nothing structured matched.
const TRACKING_PATTERNS: &[&str] = &[
    r#""serviceRequestNumber":\s*"(\d+)""#,
    r#"serviceRequestNumber["']?\s*:\s*["']?(\d+)"#,
    r"Service Request[:\s#]+(\d+)",
    r"Request[:\s#]+(\d+)",
    r"Tracking[:\s#]+(\d+)",
    r"Case[:\s#]+(\d+)",
    r"SR[:\s#]+(\d+)",
    r#"number["']?\s*:\s*["']?(\d{10,})"#,
    r"(\d{12})",
    r"(\d{10,15})",
];

const ADDRESS_PATTERNS: &[&str] = &[
    r#""requestAddress":\s*"([^"]+)""#,
    r#"requestAddress:\s*["']([^"']+)["']"#,
    r"Address:\s*([^\n]+)",
];

/// Compiled extractor, built once at startup
pub struct TrackingExtractor {
    tracking: Vec<Regex>,
    address: Vec<Regex>,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                // Patterns are compile-time constants covered by tests
                .unwrap_or_else(|e| panic!("invalid extraction pattern {p:?}: {e}"))
        })
        .collect()
}

impl Default for TrackingExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackingExtractor {
    pub fn new() -> Self {
        Self {
            tracking: compile(TRACKING_PATTERNS),
            address: compile(ADDRESS_PATTERNS),
        }
    }

    /// Find the confirmation number in script output. Total over any input
    /// string: either a digit string of plausible length or a typed failure.
    pub fn extract(&self, output: &str) -> Result<String, ExtractionFailure> {
        for pattern in &self.tracking {
            if let Some(captures) = pattern.captures(output) {
                let number = &captures[1];
                if number.len() >= MIN_TRACKING_DIGITS {
                    tracing::info!(tracking_number = %number, "tracking number extracted");
                    return Ok(number.to_string());
                }
            }
        }
        tracing::warn!("no tracking number found in adapter output");
        Err(ExtractionFailure)
    }

    /// Find the confirmed street address, if the script echoed one
    pub fn extract_address(&self, output: &str) -> Option<String> {
        for pattern in &self.address {
            if let Some(captures) = pattern.captures(output) {
                let address = captures[1].trim();
                if !address.is_empty() {
                    return Some(address.to_string());
                }
            }
        }
        None
    }
}
