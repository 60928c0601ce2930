//! Forwarder configuration.
//!
//! The configuration is built once at invocation start, either from the
//! process environment or from any key lookup, and shared read-only with
//! every stage.

use crate::recipients::ForwardingTable;
use std::path::PathBuf;
use thiserror::Error;

/// Prefix shared by every environment variable.
pub const ENV_PREFIX: &str = "MAILFORWARD_";

/// Default expected event source of inbound notifications.
pub const DEFAULT_EVENT_SOURCE: &str = "aws:ses";

/// Default expected event schema version.
pub const DEFAULT_EVENT_VERSION: &str = "1.0";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting was not provided.
    #[error("Missing required setting {key}")]
    Missing {
        /// The setting name.
        key: String,
    },

    /// A setting could not be interpreted.
    #[error("Invalid value for {key}: {reason}")]
    Invalid {
        /// The setting name.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The forwarding table is not a JSON object of address lists.
    #[error("Unable to parse forwarding table: {0}")]
    ForwardingTable(#[from] serde_json::Error),

    /// The forwarding table file could not be read.
    #[error("Unable to read forwarding table from {}: {source}", path.display())]
    ForwardingTableFile {
        /// The file path.
        path: PathBuf,
        /// The I/O failure.
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Creates a missing setting error.
    #[must_use]
    pub fn missing(key: impl Into<String>) -> Self {
        Self::Missing { key: key.into() }
    }

    /// Creates an invalid setting error.
    #[must_use]
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Settings shared by every stage of an invocation.
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    /// Address key to destination mapping.
    pub forwarding_table: ForwardingTable,
    /// Bucket holding raw inbound messages.
    pub bucket: String,
    /// Prefix prepended verbatim to the message id to form the object key.
    pub key_prefix: String,
    /// Domain of the generated `noreply@` sender address.
    pub sending_domain: String,
    /// Fixed value for every rewritten `To:` header.
    pub to_override: Option<String>,
    /// Text prepended to every `Subject:` header.
    pub subject_prefix: Option<String>,
    /// Whether plus tags are removed before lookup.
    pub allow_plus_sign: bool,
    /// Expected `eventSource` of inbound notifications.
    pub event_source: String,
    /// Expected `eventVersion` of inbound notifications.
    pub event_version: String,
}

impl ForwarderConfig {
    /// Creates a configuration with defaults for everything optional.
    #[must_use]
    pub fn new(
        forwarding_table: ForwardingTable,
        bucket: impl Into<String>,
        sending_domain: impl Into<String>,
    ) -> Self {
        Self {
            forwarding_table,
            bucket: bucket.into(),
            key_prefix: String::new(),
            sending_domain: sending_domain.into(),
            to_override: None,
            subject_prefix: None,
            allow_plus_sign: true,
            event_source: DEFAULT_EVENT_SOURCE.to_string(),
            event_version: DEFAULT_EVENT_VERSION.to_string(),
        }
    }

    /// Sets the object key prefix.
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Sets the fixed `To:` value.
    #[must_use]
    pub fn with_to_override(mut self, to: impl Into<String>) -> Self {
        self.to_override = Some(to.into());
        self
    }

    /// Sets the subject prefix.
    #[must_use]
    pub fn with_subject_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.subject_prefix = Some(prefix.into());
        self
    }

    /// Enables or disables plus tag stripping.
    #[must_use]
    pub const fn with_allow_plus_sign(mut self, allow: bool) -> Self {
        self.allow_plus_sign = allow;
        self
    }

    /// Sets the expected event source and version.
    #[must_use]
    pub fn with_event_identity(
        mut self,
        source: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        self.event_source = source.into();
        self.event_version = version.into();
        self
    }

    /// The generated no-reply sender address.
    #[must_use]
    pub fn noreply_address(&self) -> String {
        format!("noreply@{}", self.sending_domain)
    }

    /// Loads the configuration from `MAILFORWARD_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through an arbitrary key lookup.
    ///
    /// Keys are the full variable names, e.g. `MAILFORWARD_EMAIL_BUCKET`.
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}")).filter(|value| !value.trim().is_empty())
        };
        let require = |name: &str| {
            get(name).ok_or_else(|| ConfigError::missing(format!("{ENV_PREFIX}{name}")))
        };

        let forwarding_table = match (get("FORWARD_MAPPING"), get("FORWARD_MAPPING_FILE")) {
            (Some(inline), _) => ForwardingTable::from_json(&inline)?,
            (None, Some(path)) => {
                let path = PathBuf::from(path);
                let source = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::ForwardingTableFile { path, source })?;
                ForwardingTable::from_json(&source)?
            }
            (None, None) => {
                return Err(ConfigError::missing(format!("{ENV_PREFIX}FORWARD_MAPPING")));
            }
        };

        let allow_plus_sign = match get("ALLOW_PLUS_SIGN") {
            Some(value) => parse_bool(&value).ok_or_else(|| {
                ConfigError::invalid(
                    format!("{ENV_PREFIX}ALLOW_PLUS_SIGN"),
                    format!("expected a boolean, got '{value}'"),
                )
            })?,
            None => true,
        };

        Ok(Self {
            forwarding_table,
            bucket: require("EMAIL_BUCKET")?,
            key_prefix: get("EMAIL_KEY_PREFIX").unwrap_or_default(),
            sending_domain: require("SENDING_DOMAIN")?,
            to_override: get("TO_OVERRIDE"),
            subject_prefix: get("SUBJECT_PREFIX"),
            allow_plus_sign,
            event_source: get("EVENT_SOURCE").unwrap_or_else(|| DEFAULT_EVENT_SOURCE.to_string()),
            event_version: get("EVENT_VERSION").unwrap_or_else(|| DEFAULT_EVENT_VERSION.to_string()),
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
