use super::{Stage, StageOutput, SEND_MESSAGE};
use crate::context::ForwardContext;
use crate::errors::ForwardError;
use crate::ports::{MailTransport, RawMessageRequest};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Submits the rewritten message to the transmission API.
pub struct SendMessageStage {
    transport: Arc<dyn MailTransport>,
}

impl fmt::Debug for SendMessageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendMessageStage").finish_non_exhaustive()
    }
}

impl SendMessageStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(transport: Arc<dyn MailTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Stage for SendMessageStage {
    fn name(&self) -> &str {
        SEND_MESSAGE
    }

    async fn execute(&self, ctx: ForwardContext) -> Result<StageOutput, ForwardError> {
        if ctx.recipients().is_empty() {
            return Err(ForwardError::missing_state(SEND_MESSAGE, "recipients"));
        }
        let source = ctx
            .envelope_sender()
            .ok_or_else(|| ForwardError::missing_state(SEND_MESSAGE, "envelope_sender"))?;
        let raw = ctx
            .raw_message()
            .ok_or_else(|| ForwardError::missing_state(SEND_MESSAGE, "raw_message"))?;

        let request = RawMessageRequest {
            destinations: ctx.recipients().to_vec(),
            source: source.to_string(),
            raw_message: raw.to_vec(),
        };

        tracing::info!(
            original = ?ctx.original_recipients(),
            transformed = ?request.destinations,
            source = %request.source,
            "Sending email via the transmission API"
        );

        match self.transport.send_raw(&request).await {
            Ok(receipt) => {
                tracing::info!(provider_message_id = %receipt.message_id, "Email sent");
                Ok(StageOutput::Continue(ctx))
            }
            Err(err) => {
                tracing::error!(error = %err, details = ?err, "Email send failed");
                Err(ForwardError::Send { source: err })
            }
        }
    }
}
