use super::{Stage, StageOutput, PROCESS_MESSAGE};
use crate::config::ForwarderConfig;
use crate::context::ForwardContext;
use crate::errors::ForwardError;
use crate::headers::{rewrite_message, ReplyTo, RewriteOptions};
use async_trait::async_trait;

/// Rewrites the header block so the message can be re-sent from our domain.
#[derive(Debug)]
pub struct ProcessMessageStage {
    options: RewriteOptions,
}

impl ProcessMessageStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(config: &ForwarderConfig) -> Self {
        Self {
            options: RewriteOptions {
                noreply_address: config.noreply_address(),
                to_override: config.to_override.clone(),
                subject_prefix: config.subject_prefix.clone(),
            },
        }
    }
}

#[async_trait]
impl Stage for ProcessMessageStage {
    fn name(&self) -> &str {
        PROCESS_MESSAGE
    }

    async fn execute(&self, ctx: ForwardContext) -> Result<StageOutput, ForwardError> {
        let raw = ctx
            .raw_message()
            .ok_or_else(|| ForwardError::missing_state(PROCESS_MESSAGE, "raw_message"))?;
        let rewritten = rewrite_message(raw, &self.options);
        let report = &rewritten.report;

        if report.header_empty {
            tracing::warn!("Message has an empty header block; forwarding body unchanged");
        }
        match &report.reply_to {
            ReplyTo::Added(value) => tracing::info!(reply_to = %value, "Added Reply-To address"),
            ReplyTo::AlreadyPresent => tracing::info!("Message already has a Reply-To header"),
            ReplyTo::MissingFrom => {
                tracing::info!("Reply-To address not added because From address was not properly extracted");
            }
        }
        tracing::debug!(
            from_rewritten = report.from_rewritten,
            to_rewritten = report.to_rewritten,
            subjects_prefixed = report.subjects_prefixed,
            identity_removed = report.identity_removed,
            dkim_removed = report.dkim_removed,
            "Rewrote message header"
        );

        Ok(StageOutput::Continue(ctx.with_raw_message(rewritten.message)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_config;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn test_rewrites_raw_message() {
        let config = sample_config().with_to_override("desk@example.com");
        let stage = ProcessMessageStage::new(&config);
        let ctx = ForwardContext::new(json!({}))
            .with_raw_message(b"From: A <a@b.com>\r\nTo: x@y.com\r\n\r\nhello".to_vec());

        let output = stage.execute(ctx).await.unwrap();
        let message = String::from_utf8(output.context().raw_message().unwrap().to_vec()).unwrap();

        assert_eq!(
            message,
            "From: A <noreply@forward.example.net>\r\nTo: desk@example.com\r\n\
             Reply-To: A <a@b.com>\r\n\r\nhello"
        );
    }

    #[tokio::test]
    async fn test_requires_raw_message() {
        let stage = ProcessMessageStage::new(&sample_config());
        let err = stage.execute(ForwardContext::new(json!({}))).await.unwrap_err();
        assert_eq!(err.kind(), "missing_state");
    }
}
