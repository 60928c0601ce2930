//! Capabilities injected into stages: object storage and mail transmission.
//!
//! Stages only see these traits. Production implementations live in
//! [`clients`](crate::clients); test doubles live in
//! [`testing`](crate::testing).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures reported by an [`ObjectStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No object exists at the requested location.
    #[error("Object not found: {bucket}/{key}")]
    NotFound {
        /// The bucket name.
        bucket: String,
        /// The object key.
        key: String,
    },

    /// The store refused access to the object.
    #[error("Access denied to {bucket}/{key}")]
    AccessDenied {
        /// The bucket name.
        bucket: String,
        /// The object key.
        key: String,
    },

    /// The request did not complete.
    #[error("Storage transport error: {0}")]
    Transport(String),
}

impl StoreError {
    /// Creates a not found error.
    #[must_use]
    pub fn not_found(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Creates an access denied error.
    #[must_use]
    pub fn access_denied(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::AccessDenied {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

/// Failures reported by a [`MailTransport`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The provider answered but refused the message.
    #[error("Message rejected ({status}): {message}")]
    Rejected {
        /// Provider status code.
        status: u16,
        /// Provider error text.
        message: String,
    },

    /// The request did not complete.
    #[error("Transmission transport error: {0}")]
    Transport(String),
}

/// Read-only access to stored raw messages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Reads the full object at `bucket`/`key`.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;
}

/// A raw message submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessageRequest {
    /// Envelope destinations.
    pub destinations: Vec<String>,
    /// Envelope source (return path).
    pub source: String,
    /// The full message, headers and body.
    pub raw_message: Vec<u8>,
}

/// What the provider reported for an accepted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Provider-assigned id of the outbound message.
    pub message_id: String,
}

/// Outbound raw mail transmission.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Submits a raw message for delivery.
    async fn send_raw(&self, request: &RawMessageRequest) -> Result<SendReceipt, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        assert_eq!(
            StoreError::not_found("bucket", "key").to_string(),
            "Object not found: bucket/key"
        );
        assert_eq!(
            StoreError::access_denied("bucket", "key").to_string(),
            "Access denied to bucket/key"
        );
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Rejected {
            status: 400,
            message: "Email address is not verified".to_string(),
        };
        assert_eq!(err.to_string(), "Message rejected (400): Email address is not verified");
    }

    #[tokio::test]
    async fn test_mock_store_is_object_safe() {
        let mut store = MockObjectStore::new();
        store
            .expect_get()
            .returning(|_, _| Ok(b"Subject: hi\r\n\r\nbody".to_vec()));

        let store: Box<dyn ObjectStore> = Box::new(store);
        let bytes = store.get("bucket", "key").await.unwrap();
        assert!(bytes.starts_with(b"Subject"));
    }
}
