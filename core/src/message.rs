use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Who authored a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sender {
    User,
    Bot,
    Custom(String),
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => f.write_str("USER"),
            Sender::Bot => f.write_str("BOT"),
            Sender::Custom(name) => f.write_str(name),
        }
    }
}

/// An opaque renderable attached to a message or a block.
///
/// The engine never interprets `props`; the rendering collaborator does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub kind: String,
    #[serde(default)]
    pub props: serde_json::Value,
}

impl Component {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            props: serde_json::Value::Null,
        }
    }

    pub fn with_props(mut self, props: serde_json::Value) -> Self {
        self.props = props;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Content {
    Text(String),
    Component(Component),
}

impl Content {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            Content::Component(_) => None,
        }
    }

    /// Text that trims to nothing. Components are never blank.
    pub fn is_blank(&self) -> bool {
        matches!(self, Content::Text(text) if text.trim().is_empty())
    }
}

impl From<&str> for Content {
    fn from(value: &str) -> Self {
        Content::Text(value.to_string())
    }
}

impl From<String> for Content {
    fn from(value: String) -> Self {
        Content::Text(value)
    }
}

impl From<Component> for Content {
    fn from(value: Component) -> Self {
        Content::Component(value)
    }
}

/// A rendered entry in the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub content: Content,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    pub is_streaming: bool,
}

impl Message {
    pub fn new(content: impl Into<Content>, sender: Sender) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            sender,
            timestamp: Utc::now(),
            is_streaming: false,
        }
    }

    /// An empty text message that stream operations will fill in.
    pub fn streaming(sender: Sender) -> Self {
        Self {
            is_streaming: true,
            ..Self::new(String::new(), sender)
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.content.as_text()
    }
}
