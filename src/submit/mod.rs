//! Form submission: adapter registry, payload assembly, process execution,
//! and confirmation extraction

pub mod payload;
pub mod process;
pub mod registry;
pub mod tracking;

pub use payload::{build_payload, check_contract, BASE_CONTRACT_KEYS};
pub use process::{AdapterOutcome, DispatchFailure, NodeScriptAdapter, SubmissionAdapter};
pub use registry::AutomationRegistry;
pub use tracking::TrackingExtractor;
