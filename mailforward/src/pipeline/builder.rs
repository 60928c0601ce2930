//! Pipeline builder with validation.

use super::ForwardPipeline;
use crate::errors::PipelineValidationError;
use crate::events::{EventSink, LoggingEventSink};
use crate::stages::Stage;
use std::fmt;
use std::sync::Arc;

/// Builder for creating validated pipelines.
pub struct PipelineBuilder {
    name: String,
    stages: Vec<Arc<dyn Stage>>,
    sink: Option<Arc<dyn EventSink>>,
}

impl fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("stages", &self.stages)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            sink: None,
        }
    }

    /// Appends a stage. Stages run in the order they are added.
    ///
    /// # Errors
    ///
    /// Returns an error if a stage with the same name was already added.
    pub fn stage(mut self, stage: Arc<dyn Stage>) -> Result<Self, PipelineValidationError> {
        if self.stages.iter().any(|existing| existing.name() == stage.name()) {
            return Err(PipelineValidationError::new(format!(
                "Stage '{}' is already part of pipeline '{}'",
                stage.name(),
                self.name
            ))
            .with_stages(vec![stage.name().to_string()]));
        }
        self.stages.push(stage);
        Ok(self)
    }

    /// Sets the sink that receives lifecycle events.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the builder has no stages.
    pub fn build(self) -> Result<ForwardPipeline, PipelineValidationError> {
        if self.stages.is_empty() {
            return Err(PipelineValidationError::new(format!(
                "Pipeline '{}' has no stages",
                self.name
            )));
        }

        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(LoggingEventSink::default()));
        Ok(ForwardPipeline::new(self.name, self.stages, sink))
    }
}
