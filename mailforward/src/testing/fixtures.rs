//! Sample inputs.

use crate::config::ForwarderConfig;
use crate::recipients::ForwardingTable;
use serde_json::{json, Value};

/// A small signed message with a folded DKIM signature.
pub const SAMPLE_MESSAGE: &str = "Return-Path: <sender@origin.org>\r\n\
DKIM-Signature: v=1; a=rsa-sha256; d=origin.org; s=sel;\r\n\
\th=from:to:subject;\r\n\
\tb=c2lnbmF0dXJl\r\n\
From: Sender Name <sender@origin.org>\r\n\
To: info@example.com\r\n\
Subject: Quarterly report\r\n\
Message-ID: <1234@origin.org>\r\n\
\r\n\
Hello,\r\n\
\r\n\
see attached.\r\n";

/// Builds a receipt notification carrying one record.
#[must_use]
pub fn sample_notification(message_id: &str, recipients: &[&str]) -> Value {
    json!({
        "Records": [{
            "eventSource": "aws:ses",
            "eventVersion": "1.0",
            "ses": {
                "mail": {
                    "messageId": message_id,
                    "source": "sender@origin.org",
                    "destination": recipients,
                },
                "receipt": {
                    "recipients": recipients,
                    "spamVerdict": {"status": "PASS"},
                },
            },
        }],
    })
}

/// A configuration forwarding `info@example.com` to two destinations.
#[must_use]
pub fn sample_config() -> ForwarderConfig {
    let table = ForwardingTable::default()
        .with_entry("info@example.com", ["team@dest.com", "ops@dest.com"])
        .with_entry("@sales.example.com", ["sales@dest.com"]);
    ForwarderConfig::new(table, "mail-bucket", "forward.example.net")
}
