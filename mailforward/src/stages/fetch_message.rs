use super::{Stage, StageOutput, FETCH_MESSAGE};
use crate::config::ForwarderConfig;
use crate::context::ForwardContext;
use crate::errors::ForwardError;
use crate::ports::ObjectStore;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Reads the raw message from object storage.
pub struct FetchMessageStage {
    config: Arc<ForwarderConfig>,
    store: Arc<dyn ObjectStore>,
}

impl fmt::Debug for FetchMessageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchMessageStage")
            .field("bucket", &self.config.bucket)
            .field("key_prefix", &self.config.key_prefix)
            .finish_non_exhaustive()
    }
}

impl FetchMessageStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(config: Arc<ForwarderConfig>, store: Arc<dyn ObjectStore>) -> Self {
        Self { config, store }
    }

    /// The object key for a message id.
    #[must_use]
    pub fn object_key(&self, message_id: &str) -> String {
        format!("{}{}", self.config.key_prefix, message_id)
    }
}

#[async_trait]
impl Stage for FetchMessageStage {
    fn name(&self) -> &str {
        FETCH_MESSAGE
    }

    async fn execute(&self, ctx: ForwardContext) -> Result<StageOutput, ForwardError> {
        let message_id = ctx
            .message_id()
            .ok_or_else(|| ForwardError::missing_state(FETCH_MESSAGE, "message_id"))?;

        let bucket = &self.config.bucket;
        let key = self.object_key(message_id);
        let location = format!("{bucket}/{key}");
        tracing::info!(location = %location, "Fetching email");

        match self.store.get(bucket, &key).await {
            Ok(raw) => {
                tracing::debug!(location = %location, bytes = raw.len(), "Fetched email");
                Ok(StageOutput::Continue(ctx.with_raw_message(raw)))
            }
            Err(err) => {
                tracing::error!(
                    location = %location,
                    error = %err,
                    details = ?err,
                    "Could not fetch message"
                );
                Err(ForwardError::Fetch {
                    location,
                    source: err,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InboundMail;
    use crate::ports::{MockObjectStore, StoreError};
    use crate::testing::sample_config;
    use mockall::predicate::eq;
    use serde_json::json;

    fn parsed(message_id: &str) -> ForwardContext {
        ForwardContext::new(json!({})).with_mail(InboundMail {
            message_id: message_id.to_string(),
            recipients: vec!["a@example.com".to_string()],
        })
    }

    #[tokio::test]
    async fn test_fetches_prefix_plus_id() {
        let mut store = MockObjectStore::new();
        store
            .expect_get()
            .with(eq("mail-bucket"), eq("inbound/abc123"))
            .times(1)
            .returning(|_, _| Ok(b"Subject: x\r\n\r\nbody".to_vec()));

        let config = sample_config().with_key_prefix("inbound/");
        let stage = FetchMessageStage::new(Arc::new(config), Arc::new(store));
        let output = stage.execute(parsed("abc123")).await.unwrap();

        assert_eq!(output.context().raw_message(), Some(&b"Subject: x\r\n\r\nbody"[..]));
    }

    #[tokio::test]
    async fn test_store_failure_is_fetch_error() {
        let mut store = MockObjectStore::new();
        store
            .expect_get()
            .returning(|bucket, key| Err(StoreError::access_denied(bucket, key)));

        let stage = FetchMessageStage::new(Arc::new(sample_config()), Arc::new(store));
        let err = stage.execute(parsed("abc")).await.unwrap_err();

        match err {
            ForwardError::Fetch { location, source } => {
                assert_eq!(location, "mail-bucket/abc");
                assert_eq!(source, StoreError::access_denied("mail-bucket", "abc"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_requires_message_id() {
        let mut store = MockObjectStore::new();
        store.expect_get().never();

        let stage = FetchMessageStage::new(Arc::new(sample_config()), Arc::new(store));
        let err = stage.execute(ForwardContext::new(json!({}))).await.unwrap_err();
        assert_eq!(err.kind(), "missing_state");
    }
}
