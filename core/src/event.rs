//! Engine events and sinks
//!
//! The engine never renders. Everything the UI collaborator needs is
//! published as an [`EngineEvent`] on the session's broadcast channel.

use crate::block::{Checkboxes, Options};
use crate::path::BlockId;
use crate::state::{Toast, UiState};
use crate::transcript::TranscriptEvent;
use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Transcript(TranscriptEvent),
    /// A block became current and its affordances should be presented.
    BlockEntered {
        id: BlockId,
        options: Option<Options>,
        checkboxes: Option<Checkboxes>,
    },
    UiChanged(UiState),
    ToastShown(Toast),
    ToastDismissed {
        id: Uuid,
    },
    ChatWindowToggled {
        open: bool,
    },
    TextAreaValue(String),
}

/// Represents a consumer of engine events (e.g. a terminal, a log, a socket).
#[async_trait]
pub trait EventSink: Send + Sync {
    type Error: std::fmt::Debug + Send + Sync + 'static;

    async fn send_event(&self, event: EngineEvent) -> Result<(), Self::Error>;
}

/// Pump events from a session subscription into `sink` until the session is
/// dropped. Returns how many events were delivered.
pub async fn forward_events<S>(mut rx: broadcast::Receiver<EngineEvent>, sink: &S) -> usize
where
    S: EventSink + ?Sized,
{
    let mut delivered = 0;
    loop {
        match rx.recv().await {
            Ok(event) => match sink.send_event(event).await {
                Ok(()) => delivered += 1,
                Err(error) => tracing::warn!(?error, "event sink rejected event"),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event subscriber lagged behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    delivered
}
