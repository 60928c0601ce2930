//! The forwarding service: configuration plus capabilities plus the
//! standard five-stage pipeline.

use crate::config::ForwarderConfig;
use crate::errors::InvocationFailed;
use crate::events::{EventSink, LoggingEventSink};
use crate::pipeline::ForwardPipeline;
use crate::ports::{MailTransport, ObjectStore};
use crate::stages::{
    FetchMessageStage, ParseEventStage, ProcessMessageStage, SendMessageStage, Stage,
    TransformRecipientsStage,
};
use serde_json::Value;
use std::sync::Arc;

/// Name of the standard pipeline.
pub const PIPELINE_NAME: &str = "mail_forward";

/// Handles inbound notifications with the standard stage sequence.
#[derive(Debug)]
pub struct Forwarder {
    config: Arc<ForwarderConfig>,
    pipeline: ForwardPipeline,
}

impl Forwarder {
    /// Creates a forwarder running the five standard stages.
    #[must_use]
    pub fn new(
        config: ForwarderConfig,
        store: Arc<dyn ObjectStore>,
        transport: Arc<dyn MailTransport>,
    ) -> Self {
        let config = Arc::new(config);
        let pipeline = Self::standard_pipeline(&config, store, transport, None);
        Self { config, pipeline }
    }

    /// Like [`new`](Self::new), reporting lifecycle events to `sink`.
    #[must_use]
    pub fn with_event_sink(
        config: ForwarderConfig,
        store: Arc<dyn ObjectStore>,
        transport: Arc<dyn MailTransport>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let config = Arc::new(config);
        let pipeline = Self::standard_pipeline(&config, store, transport, Some(sink));
        Self { config, pipeline }
    }

    /// Creates a forwarder around a custom pipeline, e.g. one assembled with
    /// [`PipelineBuilder`](crate::pipeline::PipelineBuilder).
    #[must_use]
    pub fn with_pipeline(config: ForwarderConfig, pipeline: ForwardPipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline,
        }
    }

    fn standard_pipeline(
        config: &Arc<ForwarderConfig>,
        store: Arc<dyn ObjectStore>,
        transport: Arc<dyn MailTransport>,
        sink: Option<Arc<dyn EventSink>>,
    ) -> ForwardPipeline {
        let stages = [
            Arc::new(ParseEventStage::new(Arc::clone(config))) as Arc<dyn Stage>,
            Arc::new(TransformRecipientsStage::new(Arc::clone(config))),
            Arc::new(FetchMessageStage::new(Arc::clone(config), store)),
            Arc::new(ProcessMessageStage::new(config)),
            Arc::new(SendMessageStage::new(transport)),
        ];
        let sink = sink.unwrap_or_else(|| Arc::new(LoggingEventSink::default()));
        ForwardPipeline::new(PIPELINE_NAME.to_string(), stages.into(), sink)
    }

    /// Creates a forwarder with configuration and HTTP clients from the environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a required variable is missing or invalid.
    #[cfg(feature = "http")]
    pub fn from_env() -> Result<Self, crate::errors::ForwardError> {
        use crate::clients::{HttpMailTransport, HttpObjectStore};

        let config = ForwarderConfig::from_env()?;
        let store = HttpObjectStore::from_env()?;
        let transport = HttpMailTransport::from_env()?;
        Ok(Self::new(config, Arc::new(store), Arc::new(transport)))
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ForwarderConfig {
        &self.config
    }

    /// Returns the pipeline.
    #[must_use]
    pub const fn pipeline(&self) -> &ForwardPipeline {
        &self.pipeline
    }

    /// Handles one inbound notification.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationFailed`] if any stage failed; the cause is logged.
    pub async fn handle(&self, notification: Value) -> Result<(), InvocationFailed> {
        self.pipeline.run(notification).await
    }
}
