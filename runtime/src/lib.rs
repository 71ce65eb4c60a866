//! chatflow runtime - drives conversations over a [`chatflow_core::Flow`]
//!
//! [`Session`] is the entry point; the other modules are its stages and are
//! public so embedders can reuse them on their own.

pub mod hooks;
pub mod merger;
pub mod pipeline;
pub mod render;
pub mod sensitivity;
pub mod session;

pub mod prelude {
    pub use crate::hooks::{HookDecision, Hooks, NoHooks};
    pub use crate::merger::{MergeOutcome, NETWORK_ERROR_MESSAGE};
    pub use crate::session::{Session, SessionBuilder};
}

pub use hooks::{HookDecision, Hooks, NoHooks};
pub use merger::{MergeOutcome, NETWORK_ERROR_MESSAGE};
pub use pipeline::PostProcessPipeline;
pub use session::{Session, SessionBuilder};
