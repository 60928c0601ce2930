//! Sequential pipeline execution.
//!
//! A [`ForwardPipeline`] runs its stages one after another, moving the
//! context from each stage to the next. The first error or early finish
//! stops the run.

mod builder;

pub use builder::PipelineBuilder;

use crate::context::ForwardContext;
use crate::errors::{ForwardError, InvocationFailed};
use crate::events::{
    EventSink, RUN_COMPLETED, RUN_FAILED, RUN_FINISHED_EARLY, RUN_STARTED, STAGE_COMPLETED,
    STAGE_FAILED,
};
use crate::observability::SpanTimer;
use crate::stages::{Stage, StageOutput};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;

/// Result of a successful run.
#[derive(Debug)]
pub struct PipelineRun {
    /// The context after the last executed stage.
    pub context: ForwardContext,
    /// Names of the stages that ran, in order.
    pub completed_stages: Vec<String>,
    /// Set when a stage ended the run early.
    pub finished_early: Option<String>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Wall time of the run.
    pub duration_ms: f64,
}

/// An ordered list of stages plus the sink that hears about them.
pub struct ForwardPipeline {
    name: String,
    stages: Vec<Arc<dyn Stage>>,
    sink: Arc<dyn EventSink>,
}

impl fmt::Debug for ForwardPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardPipeline")
            .field("name", &self.name)
            .field("stages", &self.stage_names())
            .finish_non_exhaustive()
    }
}

impl ForwardPipeline {
    pub(crate) fn new(name: String, stages: Vec<Arc<dyn Stage>>, sink: Arc<dyn EventSink>) -> Self {
        Self { name, stages, sink }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Runs every stage against `ctx`.
    ///
    /// # Errors
    ///
    /// Returns the first stage error; later stages do not run.
    pub async fn execute(&self, ctx: ForwardContext) -> Result<PipelineRun, ForwardError> {
        let timer = SpanTimer::start(&self.name);
        let started_at = Utc::now();
        let invocation_id = ctx.invocation_id().to_string();
        self.sink
            .emit(
                RUN_STARTED,
                Some(json!({
                    "pipeline": self.name,
                    "invocation_id": invocation_id,
                    "started_at": started_at.to_rfc3339(),
                })),
            )
            .await;

        let mut ctx = ctx;
        let mut completed_stages = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let stage_name = stage.name().to_string();
            let stage_timer = SpanTimer::start(&stage_name);
            let result = stage.execute(ctx).await;
            let duration_ms = stage_timer.finish();

            match result {
                Ok(output) => {
                    tracing::debug!(stage = %stage_name, duration_ms, "Stage completed");
                    self.sink
                        .emit(
                            STAGE_COMPLETED,
                            Some(json!({"stage": stage_name, "duration_ms": duration_ms})),
                        )
                        .await;
                    completed_stages.push(stage_name);

                    match output {
                        StageOutput::Continue(next) => ctx = next,
                        StageOutput::Finish { context, reason } => {
                            self.sink
                                .emit(RUN_FINISHED_EARLY, Some(json!({"reason": reason})))
                                .await;
                            return Ok(PipelineRun {
                                context,
                                completed_stages,
                                finished_early: Some(reason),
                                started_at,
                                duration_ms: timer.finish(),
                            });
                        }
                    }
                }
                Err(err) => {
                    tracing::error!(
                        stage = %stage_name,
                        kind = err.kind(),
                        error = %err,
                        "Stage failed"
                    );
                    self.sink
                        .emit(
                            STAGE_FAILED,
                            Some(json!({"stage": stage_name, "kind": err.kind(), "error": err.to_string()})),
                        )
                        .await;
                    self.sink
                        .emit(RUN_FAILED, Some(json!({"invocation_id": invocation_id})))
                        .await;
                    return Err(err);
                }
            }
        }

        let duration_ms = timer.finish();
        self.sink
            .emit(RUN_COMPLETED, Some(json!({"duration_ms": duration_ms})))
            .await;
        Ok(PipelineRun {
            context: ctx,
            completed_stages,
            finished_early: None,
            started_at,
            duration_ms,
        })
    }

    /// Runs one invocation for an inbound notification.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationFailed`] if any stage failed; the cause is logged.
    pub async fn run(&self, notification: Value) -> Result<(), InvocationFailed> {
        self.run_context(ForwardContext::new(notification)).await
    }

    /// Like [`run`](Self::run) but with a prepared context.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationFailed`] if any stage failed; the cause is logged.
    pub async fn run_context(&self, ctx: ForwardContext) -> Result<(), InvocationFailed> {
        let invocation_id = ctx.invocation_id();
        let span = tracing::info_span!("forward", invocation_id = %invocation_id);

        async move {
            match self.execute(ctx).await {
                Ok(run) => {
                    tracing::info!(
                        stages = run.completed_stages.len(),
                        finished_early = run.finished_early.as_deref(),
                        duration_ms = run.duration_ms,
                        "Process finished successfully"
                    );
                    Ok(())
                }
                Err(err) => {
                    tracing::error!(kind = err.kind(), error = %err, "Mail forwarding failed");
                    Err(InvocationFailed { invocation_id })
                }
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::testing::{CountingStage, FailingStage, FinishingStage};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_runs_stages_in_order() {
        let first = Arc::new(CountingStage::new("first"));
        let second = Arc::new(CountingStage::new("second"));
        let pipeline = PipelineBuilder::new("test")
            .stage(first.clone())
            .unwrap()
            .stage(second.clone())
            .unwrap()
            .build()
            .unwrap();

        let run = pipeline.execute(ForwardContext::new(json!({}))).await.unwrap();
        assert_eq!(run.completed_stages, vec!["first", "second"]);
        assert!(run.finished_early.is_none());
        assert!(run.started_at <= Utc::now());
        assert_eq!(first.call_count(), 1);
        assert_eq!(second.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_short_circuits() {
        let after = Arc::new(CountingStage::new("after"));
        let sink = Arc::new(CollectingEventSink::new());
        let pipeline = PipelineBuilder::new("test")
            .stage(Arc::new(FailingStage::new("boom")))
            .unwrap()
            .stage(after.clone())
            .unwrap()
            .event_sink(sink.clone())
            .build()
            .unwrap();

        let err = pipeline.execute(ForwardContext::new(json!({}))).await.unwrap_err();
        assert_eq!(err.kind(), "send");
        assert_eq!(after.call_count(), 0);
        assert_eq!(sink.event_types(), vec![RUN_STARTED, STAGE_FAILED, RUN_FAILED]);
    }

    #[tokio::test]
    async fn test_finish_stops_run() {
        let after = Arc::new(CountingStage::new("after"));
        let sink = Arc::new(CollectingEventSink::new());
        let pipeline = PipelineBuilder::new("test")
            .stage(Arc::new(FinishingStage::new("stop", "nothing to do")))
            .unwrap()
            .stage(after.clone())
            .unwrap()
            .event_sink(sink.clone())
            .build()
            .unwrap();

        let run = pipeline.execute(ForwardContext::new(json!({}))).await.unwrap();
        assert_eq!(run.finished_early.as_deref(), Some("nothing to do"));
        assert_eq!(run.completed_stages, vec!["stop"]);
        assert_eq!(after.call_count(), 0);
        assert_eq!(
            sink.event_types(),
            vec![RUN_STARTED, STAGE_COMPLETED, RUN_FINISHED_EARLY]
        );
    }

    #[tokio::test]
    async fn test_run_collapses_error() {
        let pipeline = PipelineBuilder::new("test")
            .stage(Arc::new(FailingStage::new("boom")))
            .unwrap()
            .build()
            .unwrap();
        let id = Uuid::new_v4();

        let failed = pipeline
            .run_context(ForwardContext::with_invocation_id(id, json!({})))
            .await
            .unwrap_err();
        assert_eq!(failed, InvocationFailed { invocation_id: id });
    }
}
