//! Message Transcript Buffer
//!
//! An ordered, append-only sequence of messages. Atomic messages are inserted
//! whole; incremental ones go through the stream operations, which own the
//! single streaming slot. Every mutation reports what changed as a
//! [`TranscriptEvent`] so the caller can forward it to the renderer.

use crate::error::TranscriptError;
use crate::message::{Content, Message, Sender};
use serde::Serialize;
use uuid::Uuid;

/// A change applied to the transcript.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TranscriptEvent {
    Inserted(Message),
    Appended { id: Uuid, chunk: String },
    Finalized { id: Uuid },
    Removed { id: Uuid },
}

impl TranscriptEvent {
    pub fn message_id(&self) -> Uuid {
        match self {
            TranscriptEvent::Inserted(message) => message.id,
            TranscriptEvent::Appended { id, .. }
            | TranscriptEvent::Finalized { id }
            | TranscriptEvent::Removed { id } => *id,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcript {
    messages: Vec<Message>,
    streaming: Option<Uuid>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a finished message.
    pub fn inject(&mut self, content: impl Into<Content>, sender: Sender) -> TranscriptEvent {
        let message = Message::new(content, sender);
        self.messages.push(message.clone());
        TranscriptEvent::Inserted(message)
    }

    /// Open the streaming slot with an empty message.
    pub fn begin_stream(&mut self, sender: Sender) -> Result<TranscriptEvent, TranscriptError> {
        if let Some(id) = self.streaming {
            return Err(TranscriptError::StreamInProgress(id));
        }
        let message = Message::streaming(sender);
        self.streaming = Some(message.id);
        self.messages.push(message.clone());
        Ok(TranscriptEvent::Inserted(message))
    }

    /// Append to the streaming message of `sender`.
    pub fn append_stream(
        &mut self,
        chunk: &str,
        sender: &Sender,
    ) -> Result<TranscriptEvent, TranscriptError> {
        let id = self.streaming.ok_or(TranscriptError::NoActiveStream)?;
        let message = self
            .messages
            .iter_mut()
            .rev()
            .find(|m| m.id == id)
            .ok_or(TranscriptError::NotFound(id))?;
        if &message.sender != sender {
            return Err(TranscriptError::StreamInProgress(id));
        }
        match &mut message.content {
            Content::Text(text) => text.push_str(chunk),
            Content::Component(_) => {
                message.content = Content::Text(chunk.to_string());
            }
        }
        Ok(TranscriptEvent::Appended {
            id,
            chunk: chunk.to_string(),
        })
    }

    /// Close the streaming message of `sender`, making it immutable.
    pub fn end_stream(&mut self, sender: &Sender) -> Option<TranscriptEvent> {
        let id = self.streaming?;
        let message = self.messages.iter_mut().rev().find(|m| m.id == id)?;
        if &message.sender != sender {
            return None;
        }
        message.is_streaming = false;
        self.streaming = None;
        Some(TranscriptEvent::Finalized { id })
    }

    /// Close whichever message is streaming, regardless of sender.
    pub fn end_any_stream(&mut self) -> Option<TranscriptEvent> {
        let sender = self.streaming_message()?.sender.clone();
        self.end_stream(&sender)
    }

    /// Drop the streaming message entirely.
    pub fn discard_stream(&mut self) -> Option<TranscriptEvent> {
        let id = self.streaming.take()?;
        let index = self.messages.iter().rposition(|m| m.id == id)?;
        self.messages.remove(index);
        Some(TranscriptEvent::Removed { id })
    }

    /// Remove a finished message. The streaming message is off limits.
    pub fn remove(&mut self, id: Uuid) -> Result<TranscriptEvent, TranscriptError> {
        if self.streaming == Some(id) {
            return Err(TranscriptError::Streaming(id));
        }
        let index = self
            .messages
            .iter()
            .position(|m| m.id == id)
            .ok_or(TranscriptError::NotFound(id))?;
        self.messages.remove(index);
        Ok(TranscriptEvent::Removed { id })
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: Uuid) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn streaming_message(&self) -> Option<&Message> {
        let id = self.streaming?;
        self.messages.iter().rev().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages from `sender`, oldest first.
    pub fn by_sender<'a>(&'a self, sender: &'a Sender) -> impl Iterator<Item = &'a Message> {
        self.messages.iter().filter(move |m| &m.sender == sender)
    }
}
