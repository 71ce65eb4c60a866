//! Test utilities for chatflow sessions.
//!
//! - [`ScriptedResponder`] answers with canned chunk sequences and records prompts
//! - [`FailingResponder`] always fails with a status
//! - [`EventRecorder`] collects engine events
//! - [`TestSession`] bundles a session with zero bot delay and transcript helpers
//!
//! ```rust,ignore
//! let responder = ScriptedResponder::new().reply(["Hi ", "there"]);
//! let t = TestSession::with_responder(flow, responder.clone());
//! t.submit("hello").await?;
//! assert_eq!(t.bot_texts(), vec!["Hi there"]);
//! assert_eq!(responder.calls(), 1);
//! ```

use async_trait::async_trait;
use chatflow_core::responder::from_chunks;
use chatflow_core::{
    BlockId, ChunkStream, EngineEvent, EventSink, Flow, FlowError, Responder, ResponderError,
    Sender, Settings, SubmitOutcome, UiState,
};
use chatflow_runtime::{Hooks, Session};
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast;

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum Reply {
    Chunks(Vec<String>),
    /// Fail before producing a stream.
    Status(u16),
    /// Yield these chunks, then fail mid-stream.
    BreakAfter(Vec<String>),
}

#[derive(Default)]
struct Script {
    replies: VecDeque<Reply>,
    prompts: Vec<String>,
}

/// Responder answering from a queue of [`Reply`]s. Once the queue is empty
/// every call yields an empty stream. Clones share the script.
#[derive(Clone, Default)]
pub struct ScriptedResponder {
    script: Arc<Mutex<Script>>,
}

impl ScriptedResponder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply<I, S>(self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Reply::Chunks(chunks.into_iter().map(Into::into).collect()))
    }

    pub fn fail(self, status: u16) -> Self {
        self.push(Reply::Status(status))
    }

    pub fn break_after<I, S>(self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Reply::BreakAfter(chunks.into_iter().map(Into::into).collect()))
    }

    pub fn push(self, reply: Reply) -> Self {
        self.script.lock().replies.push_back(reply);
        self
    }

    pub fn calls(&self) -> usize {
        self.script.lock().prompts.len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.script.lock().prompts.clone()
    }
}

#[async_trait]
impl Responder for ScriptedResponder {
    async fn send(&self, prompt: &str) -> Result<ChunkStream, ResponderError> {
        let reply = {
            let mut script = self.script.lock();
            script.prompts.push(prompt.to_string());
            script.replies.pop_front()
        };
        match reply {
            None => Ok(from_chunks(Vec::<String>::new())),
            Some(Reply::Chunks(chunks)) => Ok(from_chunks(chunks)),
            Some(Reply::Status(status)) => Err(ResponderError::Status(status)),
            Some(Reply::BreakAfter(chunks)) => {
                let items = chunks
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(ResponderError::Stream(
                        "connection reset".into(),
                    ))));
                Ok(futures_util::stream::iter(items).boxed())
            }
        }
    }
}

/// Always answers with a non-success status.
#[derive(Debug, Clone, Copy)]
pub struct FailingResponder(pub u16);

impl Default for FailingResponder {
    fn default() -> Self {
        Self(500)
    }
}

#[async_trait]
impl Responder for FailingResponder {
    async fn send(&self, _prompt: &str) -> Result<ChunkStream, ResponderError> {
        Err(ResponderError::Status(self.0))
    }
}

/// Collects engine events, either as an [`EventSink`] or by draining a
/// subscription.
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move everything already published on `rx` into the recorder.
    pub fn drain(&self, rx: &mut broadcast::Receiver<EngineEvent>) -> usize {
        let mut events = self.events.lock();
        let before = events.len();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events.len() - before
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().clone()
    }

    pub fn entered_blocks(&self) -> Vec<BlockId> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                EngineEvent::BlockEntered { id, .. } => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn ui_changes(&self) -> Vec<UiState> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                EngineEvent::UiChanged(ui) => Some(ui.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl EventSink for EventRecorder {
    type Error = Infallible;

    async fn send_event(&self, event: EngineEvent) -> Result<(), Self::Error> {
        self.events.lock().push(event);
        Ok(())
    }
}

/// Settings tuned for tests: no artificial bot delay.
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.chat_input.bot_delay_ms = 0;
    settings
}

/// A session with its event subscription already open.
pub struct TestSession {
    pub session: Session,
    pub recorder: EventRecorder,
    rx: Mutex<broadcast::Receiver<EngineEvent>>,
}

impl TestSession {
    pub fn new(flow: Flow) -> Self {
        Self::from_session(Session::new(flow, test_settings()))
    }

    pub fn with_responder(flow: Flow, responder: impl Responder + 'static) -> Self {
        Self::from_session(
            Session::builder(flow)
                .settings(test_settings())
                .responder(responder)
                .build(),
        )
    }

    pub fn with_parts(
        flow: Flow,
        settings: Settings,
        responder: Option<Arc<dyn Responder>>,
        hooks: impl Hooks + 'static,
    ) -> Self {
        let mut builder = Session::builder(flow).settings(settings).hooks(hooks);
        if let Some(responder) = responder {
            builder = builder.shared_responder(responder);
        }
        Self::from_session(builder.build())
    }

    pub fn from_session(session: Session) -> Self {
        let rx = session.subscribe();
        Self {
            session,
            recorder: EventRecorder::new(),
            rx: Mutex::new(rx),
        }
    }

    pub async fn start(&self) -> Result<(), FlowError> {
        self.session.start().await
    }

    /// Submit with echo.
    pub async fn submit(&self, input: &str) -> Result<SubmitOutcome, FlowError> {
        self.session.submit(input, true).await
    }

    /// Drain pending events into the recorder and return all recorded so far.
    pub fn events(&self) -> Vec<EngineEvent> {
        self.recorder.drain(&mut self.rx.lock());
        self.recorder.events()
    }

    pub fn entered_blocks(&self) -> Vec<BlockId> {
        self.recorder.drain(&mut self.rx.lock());
        self.recorder.entered_blocks()
    }

    pub fn current(&self) -> Option<BlockId> {
        self.session.handle().current_path()
    }

    pub fn ui(&self) -> UiState {
        self.session.handle().ui()
    }

    pub fn texts(&self, sender: &Sender) -> Vec<String> {
        self.session.handle().read(|s| {
            s.transcript
                .by_sender(sender)
                .filter_map(|m| m.text().map(str::to_string))
                .collect()
        })
    }

    pub fn bot_texts(&self) -> Vec<String> {
        self.texts(&Sender::Bot)
    }

    pub fn user_texts(&self) -> Vec<String> {
        self.texts(&Sender::User)
    }

    pub fn last_text(&self) -> Option<String> {
        self.session
            .handle()
            .read(|s| s.transcript.last().and_then(|m| m.text().map(str::to_string)))
    }

    pub fn transcript_len(&self) -> usize {
        self.session.handle().read(|s| s.transcript.len())
    }
}

/// Assert the session's current block.
#[macro_export]
macro_rules! assert_current_block {
    ($session:expr, $id:expr) => {{
        let current = $session.current();
        assert_eq!(
            current.as_ref().map(|id| id.as_str()),
            Some($id),
            "unexpected current block"
        );
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatflow_core::Block;

    #[tokio::test]
    async fn test_scripted_responder_replays_in_order() {
        let responder = ScriptedResponder::new().reply(["a", "b"]).fail(502);

        let chunks: Vec<String> = responder
            .send("one")
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec!["a", "b"]);
        assert!(matches!(
            responder.send("two").await,
            Err(ResponderError::Status(502))
        ));
        assert_eq!(responder.send("three").await.unwrap().count().await, 0);
        assert_eq!(responder.prompts(), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_recorder_as_sink() {
        let flow = Flow::builder("start")
            .block("start", Block::new().message("hi"))
            .build()
            .unwrap();
        let t = TestSession::new(flow);
        let rx = t.session.subscribe();
        let sink = EventRecorder::new();

        t.start().await.unwrap();
        let forwarder = {
            let sink = sink.clone();
            tokio::spawn(async move { chatflow_core::event::forward_events(rx, &sink).await })
        };
        drop(t);
        let delivered = forwarder.await.unwrap();

        assert_eq!(delivered, sink.events().len());
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, EngineEvent::BlockEntered { id, .. } if id == "start")));
    }
}
