use crate::path::BlockId;
use serde::Serialize;

/// The explicit result of running a block through the post-process pipeline.
///
/// Control flow as data: callers branch on the variant instead of
/// re-inspecting the Path Stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Outcome {
    /// The pre-hook cancelled the turn; nothing ran.
    Vetoed,
    /// Side effects ran and the Path Stack is unchanged.
    Stayed,
    /// The Path Stack grew; `to` is the new top.
    Advanced { to: BlockId },
}

impl Outcome {
    pub fn is_advanced(&self) -> bool {
        matches!(self, Outcome::Advanced { .. })
    }
}

/// Why a submission was dropped without doing anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IgnoreReason {
    EmptyInput,
    NoCurrentBlock,
    /// Another submission is still in flight.
    Busy,
    /// A selected option or checkbox is not offered by the current block.
    UnknownChoice,
}

/// What a call to `submit` ended up doing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SubmitOutcome {
    Ignored(IgnoreReason),
    Vetoed,
    /// The block transitioned to `to`, which has been rendered.
    Advanced { from: BlockId, to: BlockId },
    /// The block stayed and the responder answered (or failed gracefully).
    Streamed,
    /// The block stayed and no responder fallback was taken.
    Stayed,
}
