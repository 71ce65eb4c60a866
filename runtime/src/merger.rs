//! Streaming merger
//!
//! Pipes a responder's chunk stream into one growing bot message. Control
//! chunks are dropped, an answer that never produced visible text leaves no
//! bubble behind, and any responder failure is replaced by a single fixed
//! bot message so the conversation can continue.

use chatflow_core::responder::is_control_chunk;
use chatflow_core::{ResponderError, Responder, Sender, SessionHandle};
use futures_util::StreamExt;
use tracing::Instrument;
use uuid::Uuid;

/// Shown in place of an answer when the responder fails.
pub const NETWORK_ERROR_MESSAGE: &str =
    "There was a problem getting a response from the server. Please try again in a moment.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Visible text was streamed into message `id`.
    Rendered { id: Uuid, chunks: usize, dropped: usize },
    /// The stream finished without visible text; the placeholder was removed.
    Empty,
    /// The responder failed; [`NETWORK_ERROR_MESSAGE`] was injected.
    Failed,
}

#[derive(Debug, Default)]
struct MergeStats {
    appended: usize,
    dropped: usize,
}

/// Ask `responder` about `prompt` and merge the answer into the transcript.
///
/// The typing indicator is on for the duration of the call and off when it
/// returns, whatever the result.
pub async fn stream_from(session: &SessionHandle, responder: &dyn Responder, prompt: &str) -> MergeOutcome {
    async move {
        session.update_ui(|ui| ui.bot_typing = true);
        if let Some(stale) = session.end_any_stream() {
            tracing::warn!(%stale, "finalized a stream left open before the responder call");
        }

        let outcome = match session.begin_stream(Sender::Bot) {
            Ok(placeholder) => match pump(session, responder, prompt).await {
                Ok(stats) => settle(session, placeholder, stats),
                Err(error) => {
                    tracing::warn!(%error, "responder failed");
                    session.discard_stream();
                    session.inject_message(NETWORK_ERROR_MESSAGE, Sender::Bot);
                    MergeOutcome::Failed
                }
            },
            Err(error) => {
                tracing::error!(%error, "could not open a placeholder message");
                session.inject_message(NETWORK_ERROR_MESSAGE, Sender::Bot);
                MergeOutcome::Failed
            }
        };

        session.update_ui(|ui| ui.bot_typing = false);
        outcome
    }
    .instrument(tracing::info_span!("responder", prompt_len = prompt.len()))
    .await
}

async fn pump(
    session: &SessionHandle,
    responder: &dyn Responder,
    prompt: &str,
) -> Result<MergeStats, ResponderError> {
    let mut stream = responder.send(prompt).await?;
    let mut stats = MergeStats::default();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if chunk.is_empty() {
            continue;
        }
        if is_control_chunk(&chunk) {
            tracing::trace!(len = chunk.len(), "dropped control chunk");
            stats.dropped += 1;
            continue;
        }
        session
            .stream_message(&chunk, Sender::Bot)
            .map_err(|err| ResponderError::Other(err.into()))?;
        stats.appended += 1;
    }
    Ok(stats)
}

fn settle(session: &SessionHandle, placeholder: Uuid, stats: MergeStats) -> MergeOutcome {
    session.end_stream_message(&Sender::Bot);

    let blank = session.read(|s| {
        s.transcript
            .get(placeholder)
            .map(|m| m.content.is_blank())
            .unwrap_or(true)
    });
    if blank {
        if let Err(error) = session.remove_message(placeholder) {
            tracing::debug!(%error, "placeholder already gone");
        }
        tracing::debug!(dropped = stats.dropped, "responder produced no visible text");
        return MergeOutcome::Empty;
    }

    tracing::debug!(chunks = stats.appended, dropped = stats.dropped, "responder answer merged");
    MergeOutcome::Rendered {
        id: placeholder,
        chunks: stats.appended,
        dropped: stats.dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatflow_core::responder::from_chunks;
    use chatflow_core::{Block, ChunkStream, Flow, Settings};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Fixed(Vec<&'static str>);

    #[async_trait]
    impl Responder for Fixed {
        async fn send(&self, _prompt: &str) -> Result<ChunkStream, ResponderError> {
            Ok(from_chunks(self.0.clone()))
        }
    }

    struct Down;

    #[async_trait]
    impl Responder for Down {
        async fn send(&self, _prompt: &str) -> Result<ChunkStream, ResponderError> {
            Err(ResponderError::Status(503))
        }
    }

    struct BreaksMidway;

    #[async_trait]
    impl Responder for BreaksMidway {
        async fn send(&self, _prompt: &str) -> Result<ChunkStream, ResponderError> {
            let items = vec![Ok("partial ".to_string()), Err(ResponderError::Stream("reset".into()))];
            Ok(futures_util::stream::iter(items).boxed())
        }
    }

    fn session() -> SessionHandle {
        let flow = Flow::builder("start").block("start", Block::new()).build().unwrap();
        SessionHandle::new(Arc::new(flow), Arc::new(Settings::default()))
    }

    fn bot_texts(session: &SessionHandle) -> Vec<String> {
        session.read(|s| {
            s.transcript
                .by_sender(&Sender::Bot)
                .filter_map(|m| m.text().map(str::to_string))
                .collect()
        })
    }

    #[tokio::test]
    async fn test_chunks_merge_in_order() {
        let session = session();
        let outcome = stream_from(&session, &Fixed(vec!["A", "B", "C"]), "hi").await;

        assert!(matches!(outcome, MergeOutcome::Rendered { chunks: 3, dropped: 0, .. }));
        assert_eq!(bot_texts(&session), vec!["ABC"]);
        assert!(session.read(|s| s.transcript.streaming_message().is_none()));
        assert!(!session.ui().bot_typing);
    }

    #[tokio::test]
    async fn test_control_chunks_are_not_rendered() {
        let session = session();
        let outcome = stream_from(
            &session,
            &Fixed(vec!["Hel", "\u{1e}{\"trace\":1}", "lo", "Confidence: 0.9"]),
            "hi",
        )
        .await;

        assert!(matches!(outcome, MergeOutcome::Rendered { dropped: 2, .. }));
        assert_eq!(bot_texts(&session), vec!["Hello"]);
    }

    #[tokio::test]
    async fn test_empty_answer_leaves_no_bubble() {
        let session = session();
        let outcome = stream_from(&session, &Fixed(vec!["confidence: low", "  "]), "hi").await;

        assert_eq!(outcome, MergeOutcome::Empty);
        assert!(session.read(|s| s.transcript.is_empty()));
    }

    #[tokio::test]
    async fn test_failure_injects_error_message() {
        let session = session();
        assert_eq!(stream_from(&session, &Down, "hi").await, MergeOutcome::Failed);
        assert_eq!(bot_texts(&session), vec![NETWORK_ERROR_MESSAGE]);
        assert!(!session.ui().bot_typing);
    }

    #[tokio::test]
    async fn test_midstream_failure_replaces_partial_answer() {
        let session = session();
        assert_eq!(stream_from(&session, &BreaksMidway, "hi").await, MergeOutcome::Failed);
        assert_eq!(bot_texts(&session), vec![NETWORK_ERROR_MESSAGE]);
        assert!(session.read(|s| s.transcript.streaming_message().is_none()));
    }
}
