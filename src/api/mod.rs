//! HTTP surface: upload and report endpoints, health probes, OpenAPI doc

pub mod error;
pub mod health;
pub mod openapi;
pub mod report;
