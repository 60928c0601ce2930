use super::{Stage, StageOutput, PARSE_EVENT};
use crate::config::ForwarderConfig;
use crate::context::{ForwardContext, InboundMail};
use crate::errors::ForwardError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct Notification {
    #[serde(rename = "Records")]
    records: Vec<Record>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Record {
    event_source: Option<String>,
    event_version: Option<String>,
    ses: Option<Ses>,
}

#[derive(Debug, Deserialize)]
struct Ses {
    mail: Option<SesMail>,
    receipt: Option<SesReceipt>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SesMail {
    message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SesReceipt {
    recipients: Option<Vec<String>>,
}

/// Validates a notification and extracts the mail identity.
///
/// # Errors
///
/// Returns the reason the notification was rejected.
pub fn parse_notification(
    notification: &Value,
    event_source: &str,
    event_version: &str,
) -> Result<InboundMail, String> {
    let parsed = Notification::deserialize(notification)
        .map_err(|err| format!("malformed notification: {err}"))?;

    let [record] = parsed.records.as_slice() else {
        return Err(format!("expected exactly one record, found {}", parsed.records.len()));
    };

    if record.event_source.as_deref() != Some(event_source) {
        return Err(format!(
            "unexpected event source {:?}, expected {event_source:?}",
            record.event_source
        ));
    }
    if record.event_version.as_deref() != Some(event_version) {
        return Err(format!(
            "unexpected event version {:?}, expected {event_version:?}",
            record.event_version
        ));
    }

    let ses = record.ses.as_ref().ok_or("record has no ses section")?;
    let message_id = ses
        .mail
        .as_ref()
        .and_then(|mail| mail.message_id.clone())
        .ok_or("record has no ses.mail.messageId")?;
    let recipients = ses
        .receipt
        .as_ref()
        .and_then(|receipt| receipt.recipients.clone())
        .ok_or("record has no ses.receipt.recipients")?;

    Ok(InboundMail {
        message_id,
        recipients,
    })
}

/// Validates the inbound notification and records message id and recipients.
#[derive(Debug)]
pub struct ParseEventStage {
    config: Arc<ForwarderConfig>,
}

impl ParseEventStage {
    /// Creates the stage.
    #[must_use]
    pub const fn new(config: Arc<ForwarderConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Stage for ParseEventStage {
    fn name(&self) -> &str {
        PARSE_EVENT
    }

    async fn execute(&self, ctx: ForwardContext) -> Result<StageOutput, ForwardError> {
        let mail = parse_notification(
            ctx.notification(),
            &self.config.event_source,
            &self.config.event_version,
        )
        .map_err(|reason| {
            tracing::error!(
                reason = %reason,
                event = %ctx.notification(),
                "Invalid inbound event"
            );
            ForwardError::invalid_event(reason)
        })?;

        tracing::debug!(
            message_id = %mail.message_id,
            recipients = ?mail.recipients,
            "Parsed inbound event"
        );
        Ok(StageOutput::Continue(ctx.with_mail(mail)))
    }
}
