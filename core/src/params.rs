use crate::error::TranscriptError;
use crate::message::{Content, Sender};
use crate::path::BlockId;
use crate::state::SessionHandle;
use bytes::Bytes;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// A file attached to a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub mime_type: Option<String>,
    pub data: Bytes,
}

impl Attachment {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
            data: data.into(),
        }
    }
}

/// Per-turn capability bundle handed to block callbacks.
///
/// Built fresh for every submission; clones share the same session.
#[derive(Clone)]
pub struct Parameters {
    pub curr_path: Option<BlockId>,
    pub prev_path: Option<BlockId>,
    pub user_input: String,
    pub files: Vec<Attachment>,
    session: SessionHandle,
}

impl Parameters {
    pub fn new(session: &SessionHandle, user_input: impl Into<String>, files: Vec<Attachment>) -> Self {
        let (curr_path, prev_path) = session.read(|s| {
            (s.paths.current().cloned(), s.paths.previous().cloned())
        });
        Self {
            curr_path,
            prev_path,
            user_input: user_input.into(),
            files,
            session: session.clone(),
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn go_to_path(&self, id: impl Into<BlockId>) -> bool {
        self.session.go_to_path(id)
    }

    pub fn inject_message(&self, content: impl Into<Content>, sender: Sender) -> Uuid {
        self.session.inject_message(content, sender)
    }

    pub fn stream_message(&self, chunk: &str, sender: Sender) -> Result<Uuid, TranscriptError> {
        self.session.stream_message(chunk, sender)
    }

    pub fn end_stream_message(&self, sender: &Sender) -> bool {
        self.session.end_stream_message(sender)
    }

    /// Character-by-character reveal at the configured bubble speed.
    pub async fn simulate_stream_message(
        &self,
        text: &str,
        sender: Sender,
    ) -> Result<Uuid, TranscriptError> {
        let settings = self.session.settings();
        let speed = match sender {
            Sender::User => settings.user_bubble.stream_speed(),
            _ => settings.bot_bubble.stream_speed(),
        };
        self.session.simulate_stream_message(text, sender, speed).await
    }

    pub fn remove_message(&self, id: Uuid) -> Result<(), TranscriptError> {
        self.session.remove_message(id)
    }

    pub fn toggle_chat_window(&self, open: Option<bool>) -> bool {
        self.session.toggle_chat_window(open)
    }

    pub fn show_toast(&self, content: impl Into<String>, timeout: Option<Duration>) -> Option<Uuid> {
        self.session.show_toast(content, timeout)
    }

    pub fn dismiss_toast(&self, id: Uuid) -> bool {
        self.session.dismiss_toast(id)
    }

    pub fn set_text_area_value(&self, value: impl Into<String>) {
        self.session.set_text_area_value(value)
    }
}

impl fmt::Debug for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameters")
            .field("curr_path", &self.curr_path)
            .field("prev_path", &self.prev_path)
            .field("user_input", &self.user_input)
            .field("files", &self.files.len())
            .finish()
    }
}
