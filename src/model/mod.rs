pub mod config;
pub mod report;

pub use config::{AdapterConfig, Config, SearchPollConfig};
pub use report::*;
