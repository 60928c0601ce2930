//! `mailforward` - forward one inbound mail notification.
//!
//! Reads the notification JSON from the file named by the first argument,
//! or from stdin, builds the forwarder from `MAILFORWARD_*` variables and
//! runs a single invocation.

#![forbid(unsafe_code)]

use anyhow::Context as _;
use mailforward::observability::init_logging;
use mailforward::prelude::*;
use std::io::Read;
use std::process::ExitCode;

fn read_notification(path: Option<&str>) -> anyhow::Result<serde_json::Value> {
    let source = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read notification from {path}"))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read notification from stdin")?;
            buffer
        }
    };
    serde_json::from_str(&source).context("notification is not valid JSON")
}

async fn run() -> anyhow::Result<()> {
    let path = std::env::args().nth(1);
    let notification = read_notification(path.as_deref())?;
    let forwarder = Forwarder::from_env().context("failed to configure forwarder")?;
    forwarder.handle(notification).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "Invocation failed");
            ExitCode::FAILURE
        }
    }
}
