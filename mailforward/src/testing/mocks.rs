//! In-memory capabilities and mock stages.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::context::ForwardContext;
use crate::errors::ForwardError;
use crate::ports::{
    MailTransport, ObjectStore, RawMessageRequest, SendReceipt, StoreError, TransportError,
};
use crate::stages::{Stage, StageOutput};

/// Object storage backed by a map. Records every requested location.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    requests: Mutex<Vec<String>>,
}

impl InMemoryObjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an object.
    #[must_use]
    pub fn with_object(self, bucket: &str, key: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.objects
            .lock()
            .insert((bucket.to_string(), key.to_string()), bytes.into());
        self
    }

    /// Returns every `bucket/key` requested so far.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.requests.lock().push(format!("{bucket}/{key}"));
        self.objects
            .lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::not_found(bucket, key))
    }
}

/// Mail transport that records submissions and optionally fails.
#[derive(Debug, Default)]
pub struct RecordingMailTransport {
    sent: Mutex<Vec<RawMessageRequest>>,
    failure: Option<TransportError>,
}

impl RecordingMailTransport {
    /// Creates a transport that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport that rejects every submission with `error`.
    #[must_use]
    pub fn failing(error: TransportError) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: Some(error),
        }
    }

    /// Returns every accepted submission.
    #[must_use]
    pub fn sent(&self) -> Vec<RawMessageRequest> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl MailTransport for RecordingMailTransport {
    async fn send_raw(&self, request: &RawMessageRequest) -> Result<SendReceipt, TransportError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        let mut sent = self.sent.lock();
        sent.push(request.clone());
        Ok(SendReceipt {
            message_id: format!("sent-{}", sent.len()),
        })
    }
}

/// A stage that passes the context through and counts its calls.
#[derive(Debug)]
pub struct CountingStage {
    name: String,
    calls: Mutex<usize>,
}

impl CountingStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: Mutex::new(0),
        }
    }

    /// Returns the number of times the stage ran.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl Stage for CountingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: ForwardContext) -> Result<StageOutput, ForwardError> {
        *self.calls.lock() += 1;
        Ok(StageOutput::Continue(ctx))
    }
}

/// A stage that always fails with a send error.
#[derive(Debug)]
pub struct FailingStage {
    name: String,
}

impl FailingStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: ForwardContext) -> Result<StageOutput, ForwardError> {
        Err(ForwardError::Send {
            source: TransportError::Transport(format!("stage '{}' failed", self.name)),
        })
    }
}

/// A stage that ends the run early.
#[derive(Debug)]
pub struct FinishingStage {
    name: String,
    reason: String,
}

impl FinishingStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Stage for FinishingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: ForwardContext) -> Result<StageOutput, ForwardError> {
        Ok(StageOutput::finish(ctx, self.reason.clone()))
    }
}
