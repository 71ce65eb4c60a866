use crate::path::BlockId;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while driving a flow.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("block `{0}` is not registered in the flow")]
    UnknownBlock(BlockId),
    #[error("flow is invalid: {}", .0.join("; "))]
    Invalid(Vec<String>),
    #[error("callback of block `{block}` failed")]
    Callback {
        block: BlockId,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Transcript(#[from] TranscriptError),
}

/// Transcript buffer rule violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("message {0} is already streaming")]
    StreamInProgress(Uuid),
    #[error("no message is streaming for this sender")]
    NoActiveStream,
    #[error("message {0} is streaming and cannot be modified outside the stream")]
    Streaming(Uuid),
    #[error("message {0} not found")]
    NotFound(Uuid),
}

/// Failures of an external responder.
#[derive(Error, Debug)]
pub enum ResponderError {
    #[error("responder returned non-success status {0}")]
    Status(u16),
    #[error("responder returned no body")]
    MissingBody,
    #[error("responder stream failed: {0}")]
    Stream(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Problems loading settings or flow documents.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
