//! Tracing setup and an [`EventSink`] that writes engine events to the log.

use async_trait::async_trait;
use chatflow_core::event::forward_events;
use chatflow_core::{EngineEvent, EventSink, TranscriptEvent};
use std::convert::Infallible;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

pub const DEFAULT_FILTER: &str = "info,chatflow_runtime=debug";

/// Initialize a simple stdout tracing subscriber for development
pub fn init_stdout_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Like [`init_stdout_tracing`] but writes to stderr and reports a second
/// initialization instead of panicking. `RUST_LOG` wins over `default_filter`.
pub fn try_init_stderr_tracing(default_filter: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_filter))?;

    Registry::default()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()?;
    Ok(())
}

/// Logs every engine event at debug level (transcript text at trace).
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    type Error = Infallible;

    async fn send_event(&self, event: EngineEvent) -> Result<(), Self::Error> {
        match &event {
            EngineEvent::Transcript(TranscriptEvent::Inserted(message)) => {
                tracing::debug!(id = %message.id, sender = %message.sender, streaming = message.is_streaming, "message inserted");
            }
            EngineEvent::Transcript(TranscriptEvent::Appended { id, chunk }) => {
                tracing::trace!(%id, chunk = %chunk, "message appended");
            }
            EngineEvent::Transcript(TranscriptEvent::Finalized { id }) => {
                tracing::debug!(%id, "message finalized");
            }
            EngineEvent::Transcript(TranscriptEvent::Removed { id }) => {
                tracing::debug!(%id, "message removed");
            }
            EngineEvent::BlockEntered { id, options, checkboxes } => {
                tracing::info!(
                    block = %id,
                    options = options.as_ref().map_or(0, |o| o.items.len()),
                    checkboxes = checkboxes.as_ref().map_or(0, |c| c.items.len()),
                    "block entered"
                );
            }
            EngineEvent::UiChanged(ui) => {
                tracing::debug!(
                    disabled = ui.text_area_disabled,
                    typing = ui.bot_typing,
                    sensitive = ui.sensitive_mode,
                    "ui changed"
                );
            }
            EngineEvent::ToastShown(toast) => tracing::info!(id = %toast.id, content = %toast.content, "toast"),
            EngineEvent::ToastDismissed { id } => tracing::debug!(%id, "toast dismissed"),
            EngineEvent::ChatWindowToggled { open } => tracing::debug!(open = *open, "chat window toggled"),
            EngineEvent::TextAreaValue(value) => tracing::trace!(len = value.len(), "text area value"),
        }
        Ok(())
    }
}

/// Log events from `rx` on a background task until the session goes away.
/// The task yields the number of events logged.
pub fn spawn_event_logger(rx: broadcast::Receiver<EngineEvent>) -> JoinHandle<usize> {
    tokio::spawn(async move { forward_events(rx, &LogSink).await })
}
