//! The per-invocation state threaded through the stages.
//!
//! A [`ForwardContext`] is created for one notification, moved into each
//! stage in turn and dropped when the run ends. Stages never share it.

use serde_json::Value;
use uuid::Uuid;

/// Mail identity extracted from the notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMail {
    /// Unique id of the stored message.
    pub message_id: String,
    /// Recipients as listed in the receipt, in order.
    pub recipients: Vec<String>,
}

/// State of one forwarding run.
#[derive(Debug, Clone)]
pub struct ForwardContext {
    invocation_id: Uuid,
    notification: Value,
    mail: Option<InboundMail>,
    recipients: Vec<String>,
    envelope_sender: Option<String>,
    raw_message: Option<Vec<u8>>,
}

impl ForwardContext {
    /// Creates a fresh context for one notification.
    #[must_use]
    pub fn new(notification: Value) -> Self {
        Self::with_invocation_id(Uuid::new_v4(), notification)
    }

    /// Creates a context with a caller-chosen invocation id.
    #[must_use]
    pub const fn with_invocation_id(invocation_id: Uuid, notification: Value) -> Self {
        Self {
            invocation_id,
            notification,
            mail: None,
            recipients: Vec::new(),
            envelope_sender: None,
            raw_message: None,
        }
    }

    /// Returns the invocation id.
    #[must_use]
    pub const fn invocation_id(&self) -> Uuid {
        self.invocation_id
    }

    /// Returns the inbound notification.
    #[must_use]
    pub const fn notification(&self) -> &Value {
        &self.notification
    }

    /// Returns the parsed mail identity, once the event has been parsed.
    #[must_use]
    pub const fn mail(&self) -> Option<&InboundMail> {
        self.mail.as_ref()
    }

    /// Returns the message id, once the event has been parsed.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.mail.as_ref().map(|mail| mail.message_id.as_str())
    }

    /// Returns the original recipients (empty before parsing).
    #[must_use]
    pub fn original_recipients(&self) -> &[String] {
        self.mail
            .as_ref()
            .map(|mail| mail.recipients.as_slice())
            .unwrap_or_default()
    }

    /// Returns the current recipients.
    #[must_use]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// Returns the envelope sender chosen during recipient resolution.
    #[must_use]
    pub fn envelope_sender(&self) -> Option<&str> {
        self.envelope_sender.as_deref()
    }

    /// Returns the raw message, once fetched.
    #[must_use]
    pub fn raw_message(&self) -> Option<&[u8]> {
        self.raw_message.as_deref()
    }

    /// Records the parsed mail; current recipients start as a copy of the originals.
    #[must_use]
    pub fn with_mail(mut self, mail: InboundMail) -> Self {
        self.recipients.clone_from(&mail.recipients);
        self.mail = Some(mail);
        self
    }

    /// Replaces the current recipients and records the envelope sender.
    #[must_use]
    pub fn with_forwarding(
        mut self,
        recipients: Vec<String>,
        envelope_sender: Option<String>,
    ) -> Self {
        self.recipients = recipients;
        self.envelope_sender = envelope_sender;
        self
    }

    /// Stores or replaces the raw message.
    #[must_use]
    pub fn with_raw_message(mut self, raw_message: Vec<u8>) -> Self {
        self.raw_message = Some(raw_message);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_context_is_empty() {
        let ctx = ForwardContext::new(json!({"Records": []}));

        assert!(ctx.mail().is_none());
        assert!(ctx.message_id().is_none());
        assert!(ctx.original_recipients().is_empty());
        assert!(ctx.recipients().is_empty());
        assert!(ctx.envelope_sender().is_none());
        assert!(ctx.raw_message().is_none());
    }

    #[test]
    fn test_with_mail_copies_recipients() {
        let ctx = ForwardContext::new(json!({})).with_mail(InboundMail {
            message_id: "abc".to_string(),
            recipients: vec!["a@b.com".to_string(), "c@d.com".to_string()],
        });

        assert_eq!(ctx.message_id(), Some("abc"));
        assert_eq!(ctx.recipients(), ctx.original_recipients());
    }

    #[test]
    fn test_forwarding_leaves_originals_untouched() {
        let ctx = ForwardContext::new(json!({}))
            .with_mail(InboundMail {
                message_id: "abc".to_string(),
                recipients: vec!["a@b.com".to_string()],
            })
            .with_forwarding(vec!["x@y.com".to_string()], Some("a@b.com".to_string()));

        assert_eq!(ctx.original_recipients(), ["a@b.com".to_string()]);
        assert_eq!(ctx.recipients(), ["x@y.com".to_string()]);
        assert_eq!(ctx.envelope_sender(), Some("a@b.com"));
    }

    #[test]
    fn test_invocation_id_is_stable() {
        let id = Uuid::new_v4();
        let ctx = ForwardContext::with_invocation_id(id, json!({})).with_raw_message(b"x".to_vec());

        assert_eq!(ctx.invocation_id(), id);
        assert_eq!(ctx.raw_message(), Some(&b"x"[..]));
    }
}
