use super::{Stage, StageOutput, TRANSFORM_RECIPIENTS};
use crate::config::ForwarderConfig;
use crate::context::ForwardContext;
use crate::errors::ForwardError;
use async_trait::async_trait;
use std::sync::Arc;

/// Reason given when no recipient maps to a destination.
pub const NO_DESTINATIONS: &str = "no_matching_recipients";

/// Maps the original recipients to forwarding destinations.
#[derive(Debug)]
pub struct TransformRecipientsStage {
    config: Arc<ForwarderConfig>,
}

impl TransformRecipientsStage {
    /// Creates the stage.
    #[must_use]
    pub const fn new(config: Arc<ForwarderConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Stage for TransformRecipientsStage {
    fn name(&self) -> &str {
        TRANSFORM_RECIPIENTS
    }

    async fn execute(&self, ctx: ForwardContext) -> Result<StageOutput, ForwardError> {
        if ctx.mail().is_none() {
            return Err(ForwardError::missing_state(TRANSFORM_RECIPIENTS, "mail"));
        }

        let resolution = self
            .config
            .forwarding_table
            .resolve(ctx.original_recipients(), self.config.allow_plus_sign);

        if resolution.destinations.is_empty() {
            tracing::info!(
                recipients = ?ctx.original_recipients(),
                unmatched = ?resolution.unmatched,
                "Finishing process. No new recipients found for original destinations"
            );
            return Ok(StageOutput::finish(ctx, NO_DESTINATIONS));
        }

        Ok(StageOutput::Continue(
            ctx.with_forwarding(resolution.destinations, resolution.envelope_sender),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InboundMail;
    use crate::recipients::ForwardingTable;
    use crate::testing::sample_config;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parsed(recipients: &[&str]) -> ForwardContext {
        ForwardContext::new(json!({})).with_mail(InboundMail {
            message_id: "abc".to_string(),
            recipients: recipients.iter().map(|r| (*r).to_string()).collect(),
        })
    }

    #[tokio::test]
    async fn test_recipients_replaced() {
        let stage = TransformRecipientsStage::new(Arc::new(sample_config()));
        let output = stage.execute(parsed(&["Info+News@Example.com"])).await.unwrap();

        assert!(!output.is_finish());
        let ctx = output.context();
        assert_eq!(ctx.recipients(), ["team@dest.com".to_string(), "ops@dest.com".to_string()]);
        assert_eq!(ctx.envelope_sender(), Some("Info+News@Example.com"));
        assert_eq!(ctx.original_recipients(), ["Info+News@Example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_no_match_finishes_early() {
        let mut config = sample_config();
        config.forwarding_table = ForwardingTable::default();
        let stage = TransformRecipientsStage::new(Arc::new(config));

        let output = stage.execute(parsed(&["a@example.com"])).await.unwrap();
        match output {
            StageOutput::Finish { reason, context } => {
                assert_eq!(reason, NO_DESTINATIONS);
                assert!(context.envelope_sender().is_none());
            }
            StageOutput::Continue(_) => panic!("expected early finish"),
        }
    }

    #[tokio::test]
    async fn test_requires_parsed_mail() {
        let stage = TransformRecipientsStage::new(Arc::new(sample_config()));
        let err = stage.execute(ForwardContext::new(json!({}))).await.unwrap_err();
        assert_eq!(err.kind(), "missing_state");
    }
}
