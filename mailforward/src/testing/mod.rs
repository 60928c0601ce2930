//! Test doubles and fixtures for forwarding pipelines.
//!
//! This module provides:
//! - In-memory object storage and a recording mail transport
//! - Stages that count, fail or finish early
//! - Sample notifications, messages and configuration

mod fixtures;
mod mocks;

pub use fixtures::{sample_config, sample_notification, SAMPLE_MESSAGE};
pub use mocks::{
    CountingStage, FailingStage, FinishingStage, InMemoryObjectStore, RecordingMailTransport,
};
