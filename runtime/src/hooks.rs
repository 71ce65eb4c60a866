//! Interception points an embedder can plug into a session.

use async_trait::async_trait;
use chatflow_core::{Block, BlockId};

/// What a hook wants the engine to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookDecision {
    Proceed,
    /// Cancel the rest of the turn. Hooks cannot rewrite the payload.
    Veto,
}

impl HookDecision {
    pub fn is_veto(self) -> bool {
        matches!(self, HookDecision::Veto)
    }
}

/// Hooks are only consulted when the matching switch in
/// [`EventSettings`](chatflow_core::settings::EventSettings) is on.
#[async_trait]
pub trait Hooks: Send + Sync {
    /// Runs before the input is echoed, with the input exactly as typed.
    async fn user_submit_text(&self, _input: &str, _echo: bool) -> HookDecision {
        HookDecision::Proceed
    }

    /// Runs before the current block's side effects.
    async fn pre_process_block(&self, _id: &BlockId, _block: &Block) -> HookDecision {
        HookDecision::Proceed
    }
}

/// Lets everything through.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl Hooks for NoHooks {}
