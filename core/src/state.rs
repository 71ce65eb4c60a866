//! Session state and the handle that guards it
//!
//! `SessionState` is the single mutable state of one conversation: Path Stack,
//! transcript, input-area flags and toasts. It lives behind a
//! [`SessionHandle`]; the session driver and block callbacks (through their
//! `Parameters`) are the only holders. The lock is never held across an
//! `.await`.

use crate::error::TranscriptError;
use crate::event::EngineEvent;
use crate::flow::Flow;
use crate::message::{Content, Sender};
use crate::path::{BlockId, PathStack};
use crate::settings::Settings;
use crate::transcript::{Transcript, TranscriptEvent};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

const EVENT_CAPACITY: usize = 256;

/// Flags the input area and chrome render from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UiState {
    pub text_area_disabled: bool,
    pub sensitive_mode: bool,
    pub bot_typing: bool,
    pub allows_attachment: bool,
    pub voice_on: bool,
    pub chat_window_open: bool,
    pub text_area_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub id: Uuid,
    pub content: String,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub paths: PathStack,
    pub transcript: Transcript,
    pub ui: UiState,
    pub toasts: Vec<Toast>,
}

impl SessionState {
    pub fn new(start: impl Into<BlockId>) -> Self {
        Self {
            paths: PathStack::new(start),
            transcript: Transcript::new(),
            ui: UiState::default(),
            toasts: Vec::new(),
        }
    }
}

struct Shared {
    state: Mutex<SessionState>,
    flow: Arc<Flow>,
    settings: Arc<Settings>,
    events: broadcast::Sender<EngineEvent>,
}

/// Cheaply clonable access to one session's state.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl SessionHandle {
    pub fn new(flow: Arc<Flow>, settings: Arc<Settings>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let state = SessionState::new(flow.start().clone());
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                flow,
                settings,
                events,
            }),
        }
    }

    pub fn flow(&self) -> &Arc<Flow> {
        &self.shared.flow
    }

    pub fn settings(&self) -> &Settings {
        &self.shared.settings
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.shared.events.subscribe()
    }

    /// Publish an event. Having no subscriber is not an error.
    pub fn publish(&self, event: EngineEvent) {
        let _ = self.shared.events.send(event);
    }

    /// Run `f` against the state under the lock, publishing the events it
    /// produces before the lock is released so subscribers see mutations in
    /// the order they happened.
    fn mutate<R>(&self, f: impl FnOnce(&mut SessionState, &mut Vec<EngineEvent>) -> R) -> R {
        let mut state = self.shared.state.lock();
        let mut events = Vec::new();
        let result = f(&mut state, &mut events);
        for event in events {
            self.publish(event);
        }
        result
    }

    pub fn read<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        f(&self.shared.state.lock())
    }

    pub fn snapshot(&self) -> SessionState {
        self.read(Clone::clone)
    }

    // --- Path Stack ---

    pub fn current_path(&self) -> Option<BlockId> {
        self.read(|s| s.paths.current().cloned())
    }

    pub fn previous_path(&self) -> Option<BlockId> {
        self.read(|s| s.paths.previous().cloned())
    }

    pub fn path_len(&self) -> usize {
        self.read(|s| s.paths.len())
    }

    /// Push `id` if it names a registered block.
    pub fn go_to_path(&self, id: impl Into<BlockId>) -> bool {
        let id = id.into();
        if !self.shared.flow.contains(id.as_str()) {
            tracing::warn!(block = %id, "go_to_path: unknown block");
            return false;
        }
        tracing::debug!(block = %id, "go_to_path");
        self.mutate(|state, _| state.paths.push(id));
        true
    }

    pub fn pop_path(&self) -> Option<BlockId> {
        self.mutate(|state, _| state.paths.pop())
    }

    // --- Transcript ---

    pub fn inject_message(&self, content: impl Into<Content>, sender: Sender) -> Uuid {
        let content = content.into();
        self.mutate(|state, events| {
            let event = state.transcript.inject(content, sender);
            let id = event.message_id();
            events.push(EngineEvent::Transcript(event));
            id
        })
    }

    pub fn begin_stream(&self, sender: Sender) -> Result<Uuid, TranscriptError> {
        self.mutate(|state, events| {
            let event = state.transcript.begin_stream(sender)?;
            Ok(record(events, event))
        })
    }

    /// Append `chunk` to the streaming message of `sender`, opening one first
    /// if nothing is streaming.
    pub fn stream_message(&self, chunk: &str, sender: Sender) -> Result<Uuid, TranscriptError> {
        self.mutate(|state, events| {
            if state.transcript.streaming_message().is_none() {
                let opened = state.transcript.begin_stream(sender.clone())?;
                events.push(EngineEvent::Transcript(opened));
            }
            let event = state.transcript.append_stream(chunk, &sender)?;
            Ok(record(events, event))
        })
    }

    pub fn end_stream_message(&self, sender: &Sender) -> bool {
        self.mutate(|state, events| match state.transcript.end_stream(sender) {
            Some(event) => {
                events.push(EngineEvent::Transcript(event));
                true
            }
            None => false,
        })
    }

    pub fn end_any_stream(&self) -> Option<Uuid> {
        self.mutate(|state, events| {
            let event = state.transcript.end_any_stream()?;
            Some(record(events, event))
        })
    }

    pub fn discard_stream(&self) -> Option<Uuid> {
        self.mutate(|state, events| {
            let event = state.transcript.discard_stream()?;
            Some(record(events, event))
        })
    }

    pub fn remove_message(&self, id: Uuid) -> Result<(), TranscriptError> {
        self.mutate(|state, events| {
            let event = state.transcript.remove(id)?;
            events.push(EngineEvent::Transcript(event));
            Ok(())
        })
    }

    /// Reveal `text` one character at a time as a streaming message.
    pub async fn simulate_stream_message(
        &self,
        text: &str,
        sender: Sender,
        speed: Duration,
    ) -> Result<Uuid, TranscriptError> {
        let id = self.begin_stream(sender.clone())?;
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            if !speed.is_zero() {
                tokio::time::sleep(speed).await;
            }
            self.stream_message(ch.encode_utf8(&mut buf), sender.clone())?;
        }
        self.end_stream_message(&sender);
        Ok(id)
    }

    // --- UI state ---

    pub fn ui(&self) -> UiState {
        self.read(|s| s.ui.clone())
    }

    /// Apply `f` to the UI flags; publishes `UiChanged` only if something changed.
    pub fn update_ui(&self, f: impl FnOnce(&mut UiState)) -> UiState {
        self.mutate(|state, events| {
            let before = state.ui.clone();
            f(&mut state.ui);
            if state.ui != before {
                events.push(EngineEvent::UiChanged(state.ui.clone()));
            }
            state.ui.clone()
        })
    }

    pub fn set_text_area_value(&self, value: impl Into<String>) {
        let value = value.into();
        self.mutate(|state, events| {
            state.ui.text_area_value = value.clone();
            events.push(EngineEvent::TextAreaValue(value));
        });
    }

    /// Open or close the chat window; `None` flips it. Returns the new state.
    pub fn toggle_chat_window(&self, open: Option<bool>) -> bool {
        self.mutate(|state, events| {
            let open = open.unwrap_or(!state.ui.chat_window_open);
            state.ui.chat_window_open = open;
            events.push(EngineEvent::ChatWindowToggled { open });
            open
        })
    }

    // --- Toasts ---

    pub fn show_toast(&self, content: impl Into<String>, timeout: Option<Duration>) -> Option<Uuid> {
        let content = content.into();
        let limits = self.shared.settings.toast.clone();
        self.mutate(|state, events| {
            if state.toasts.len() >= limits.max_count {
                if limits.forbid_on_max {
                    return None;
                }
                let oldest = state.toasts.remove(0);
                events.push(EngineEvent::ToastDismissed { id: oldest.id });
            }
            let toast = Toast {
                id: Uuid::new_v4(),
                content,
                timeout,
            };
            let id = toast.id;
            state.toasts.push(toast.clone());
            events.push(EngineEvent::ToastShown(toast));
            Some(id)
        })
    }

    pub fn dismiss_toast(&self, id: Uuid) -> bool {
        self.mutate(|state, events| {
            let Some(index) = state.toasts.iter().position(|t| t.id == id) else {
                return false;
            };
            state.toasts.remove(index);
            events.push(EngineEvent::ToastDismissed { id });
            true
        })
    }
}

fn record(events: &mut Vec<EngineEvent>, event: TranscriptEvent) -> Uuid {
    let id = event.message_id();
    events.push(EngineEvent::Transcript(event));
    id
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("path_len", &self.path_len())
            .field("subscribers", &self.shared.events.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;
    use crate::settings::ToastSettings;

    fn handle_with(settings: Settings) -> SessionHandle {
        let flow = Flow::builder("start")
            .block("start", Block::new().message("hi").path("next"))
            .block("next", Block::new())
            .build()
            .unwrap();
        SessionHandle::new(Arc::new(flow), Arc::new(settings))
    }

    fn handle() -> SessionHandle {
        handle_with(Settings::default())
    }

    #[test]
    fn test_starts_on_start_block() {
        let session = handle();
        assert_eq!(session.current_path(), Some(BlockId::from("start")));
        assert_eq!(session.path_len(), 1);
    }

    #[test]
    fn test_go_to_unknown_path_is_refused() {
        let session = handle();
        assert!(!session.go_to_path("nowhere"));
        assert!(session.go_to_path("next"));
        assert_eq!(session.path_len(), 2);
        assert_eq!(session.previous_path(), Some(BlockId::from("start")));
    }

    #[test]
    fn test_events_follow_mutation_order() {
        let session = handle();
        let mut rx = session.subscribe();

        let id = session.stream_message("A", Sender::Bot).unwrap();
        session.stream_message("B", Sender::Bot).unwrap();
        assert!(session.end_stream_message(&Sender::Bot));

        assert!(matches!(
            rx.try_recv().unwrap(),
            EngineEvent::Transcript(TranscriptEvent::Inserted(_))
        ));
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineEvent::Transcript(TranscriptEvent::Appended {
                id,
                chunk: "A".into()
            })
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineEvent::Transcript(TranscriptEvent::Appended {
                id,
                chunk: "B".into()
            })
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineEvent::Transcript(TranscriptEvent::Finalized { id })
        );
    }

    #[test]
    fn test_update_ui_publishes_only_changes() {
        let session = handle();
        let mut rx = session.subscribe();

        session.update_ui(|ui| ui.bot_typing = false);
        assert!(rx.try_recv().is_err());

        session.update_ui(|ui| ui.bot_typing = true);
        match rx.try_recv().unwrap() {
            EngineEvent::UiChanged(ui) => assert!(ui.bot_typing),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_toast_evicts_oldest_at_max() {
        let session = handle_with(Settings {
            toast: ToastSettings {
                max_count: 2,
                forbid_on_max: false,
            },
            ..Settings::default()
        });
        let first = session.show_toast("one", None).unwrap();
        session.show_toast("two", None).unwrap();
        session.show_toast("three", None).unwrap();

        let contents: Vec<String> = session.read(|s| s.toasts.iter().map(|t| t.content.clone()).collect());
        assert_eq!(contents, vec!["two", "three"]);
        assert!(!session.dismiss_toast(first));
    }

    #[test]
    fn test_toast_forbidden_at_max() {
        let session = handle_with(Settings {
            toast: ToastSettings {
                max_count: 1,
                forbid_on_max: true,
            },
            ..Settings::default()
        });
        let id = session.show_toast("one", None).unwrap();
        assert!(session.show_toast("two", None).is_none());
        assert!(session.dismiss_toast(id));
        assert!(session.read(|s| s.toasts.is_empty()));
    }

    #[test]
    fn test_toggle_chat_window() {
        let session = handle();
        assert!(session.toggle_chat_window(None));
        assert!(!session.toggle_chat_window(None));
        assert!(session.toggle_chat_window(Some(true)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_stream_reveals_characters() {
        let session = handle();
        let id = session
            .simulate_stream_message("héllo", Sender::User, Duration::from_millis(30))
            .await
            .unwrap();

        let message = session.read(|s| s.transcript.get(id).cloned()).unwrap();
        assert_eq!(message.text(), Some("héllo"));
        assert!(!message.is_streaming);
        assert_eq!(message.sender, Sender::User);
    }
}
