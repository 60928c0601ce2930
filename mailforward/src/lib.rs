//! # Mailforward
//!
//! An inbound email forwarding pipeline.
//!
//! Each invocation receives one mail-receipt notification and runs five
//! stages over a single [`ForwardContext`](context::ForwardContext):
//!
//! - **`parse_event`**: validate the notification and extract the message id and recipients
//! - **`transform_recipients`**: map recipients to forwarding destinations
//! - **`fetch_message`**: read the raw message from object storage
//! - **`process_message`**: rewrite the header block so the forward is deliverable
//! - **`send_message`**: hand the rewritten message to the transmission API
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mailforward::prelude::*;
//!
//! let config = ForwarderConfig::from_env()?;
//! let forwarder = Forwarder::new(config, store, transport);
//!
//! // Any failure is logged and collapsed into a single opaque signal.
//! forwarder.handle(notification).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

#[cfg(feature = "http")]
pub mod clients;
pub mod config;
pub mod context;
pub mod errors;
pub mod events;
pub mod forwarder;
pub mod headers;
pub mod observability;
pub mod pipeline;
pub mod ports;
pub mod recipients;
pub mod stages;
pub mod testing;


/// Prelude module for convenient imports
pub mod prelude {
    #[cfg(feature = "http")]
    pub use crate::clients::{HttpMailTransport, HttpObjectStore};
    pub use crate::config::{ConfigError, ForwarderConfig};
    pub use crate::context::{ForwardContext, InboundMail};
    pub use crate::errors::{ForwardError, InvocationFailed, PipelineValidationError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::forwarder::Forwarder;
    pub use crate::pipeline::{ForwardPipeline, PipelineBuilder, PipelineRun};
    pub use crate::ports::{MailTransport, ObjectStore, RawMessageRequest, SendReceipt};
    pub use crate::recipients::{normalize_address, ForwardingTable, MatchRule};
    pub use crate::stages::{Stage, StageOutput};
}
