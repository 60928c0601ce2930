//! Stage trait and the five forwarding stages.
//!
//! A stage takes the run's [`ForwardContext`] by value and hands it back,
//! either to continue with the next stage or to end the run early.

mod fetch_message;
mod parse_event;
mod process_message;
mod send_message;
mod transform_recipients;

pub use fetch_message::FetchMessageStage;
pub use parse_event::{parse_notification, ParseEventStage};
pub use process_message::ProcessMessageStage;
pub use send_message::SendMessageStage;
pub use transform_recipients::{TransformRecipientsStage, NO_DESTINATIONS};

use crate::context::ForwardContext;
use crate::errors::ForwardError;
use async_trait::async_trait;
use std::fmt::Debug;

/// Name of the event parsing stage.
pub const PARSE_EVENT: &str = "parse_event";
/// Name of the recipient transformation stage.
pub const TRANSFORM_RECIPIENTS: &str = "transform_recipients";
/// Name of the message fetching stage.
pub const FETCH_MESSAGE: &str = "fetch_message";
/// Name of the header rewriting stage.
pub const PROCESS_MESSAGE: &str = "process_message";
/// Name of the sending stage.
pub const SEND_MESSAGE: &str = "send_message";

/// What a stage hands back on success.
#[derive(Debug)]
pub enum StageOutput {
    /// Run the next stage with this context.
    Continue(ForwardContext),
    /// End the run successfully without running later stages.
    Finish {
        /// The final context.
        context: ForwardContext,
        /// Why the run ended early.
        reason: String,
    },
}

impl StageOutput {
    /// Creates an early finish.
    #[must_use]
    pub fn finish(context: ForwardContext, reason: impl Into<String>) -> Self {
        Self::Finish {
            context,
            reason: reason.into(),
        }
    }

    /// Returns the context carried by either variant.
    #[must_use]
    pub const fn context(&self) -> &ForwardContext {
        match self {
            Self::Continue(context) | Self::Finish { context, .. } => context,
        }
    }

    /// Returns true for an early finish.
    #[must_use]
    pub const fn is_finish(&self) -> bool {
        matches!(self, Self::Finish { .. })
    }
}

/// A unit of work in the forwarding pipeline.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Executes the stage.
    ///
    /// # Errors
    ///
    /// Returns the failure that ends the run.
    async fn execute(&self, ctx: ForwardContext) -> Result<StageOutput, ForwardError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stage_output_accessors() {
        let output = StageOutput::Continue(ForwardContext::new(json!({})));
        assert!(!output.is_finish());
        assert!(output.context().mail().is_none());

        let output = StageOutput::finish(ForwardContext::new(json!({})), "done");
        assert!(output.is_finish());
        match output {
            StageOutput::Finish { reason, .. } => assert_eq!(reason, "done"),
            StageOutput::Continue(_) => panic!("expected finish"),
        }
    }
}
