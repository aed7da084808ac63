//! Orchestration layer for publish runs

pub mod project_publisher;

pub use project_publisher::{ProjectPublisher, PublishReport, PublishRequest};
