//! chatflow core - the data model of a conversational flow
//!
//! Blocks, the flow registry, the Path Stack, the transcript buffer, settings
//! and the responder contract. Nothing here drives a conversation; that is
//! `chatflow-runtime`'s job.

pub mod block;
pub mod document;
pub mod error;
pub mod event;
pub mod flow;
pub mod message;
pub mod outcome;
pub mod params;
pub mod path;
pub mod responder;
pub mod settings;
pub mod state;
pub mod transcript;

pub use block::{Block, Checkboxes, Choice, Field, Options, TransitionSpec};
pub use document::FlowDocument;
pub use error::{ConfigError, FlowError, ResponderError, TranscriptError};
pub use event::{EngineEvent, EventSink};
pub use flow::Flow;
pub use message::{Component, Content, Message, Sender};
pub use outcome::{IgnoreReason, Outcome, SubmitOutcome};
pub use params::{Attachment, Parameters};
pub use path::{BlockId, PathStack};
pub use responder::{ChunkStream, Responder};
pub use settings::Settings;
pub use state::{SessionHandle, SessionState, Toast, UiState};
pub use transcript::{Transcript, TranscriptEvent};

pub mod prelude {
    pub use crate::block::{Block, Checkboxes, Choice, Field, Options};
    pub use crate::error::{FlowError, ResponderError};
    pub use crate::event::{EngineEvent, EventSink};
    pub use crate::flow::Flow;
    pub use crate::message::{Component, Content, Message, Sender};
    pub use crate::outcome::{IgnoreReason, SubmitOutcome};
    pub use crate::params::{Attachment, Parameters};
    pub use crate::path::BlockId;
    pub use crate::responder::{ChunkStream, Responder};
    pub use crate::settings::Settings;
}
