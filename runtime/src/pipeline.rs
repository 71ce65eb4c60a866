//! Post-process pipeline
//!
//! Runs the current block's side effects for one submission and reports,
//! as an [`Outcome`], whether the Path Stack moved:
//!
//! 1. pre-process hook (may veto)
//! 2. `function`
//! 3. `file`, only when attachments came with the turn
//! 4. `path` resolution and push
//!
//! A resolved path that names no registered block is logged and treated as
//! staying, so the responder fallback takes over.

use crate::hooks::{HookDecision, Hooks};
use chatflow_core::block::Action;
use chatflow_core::{Block, BlockId, FlowError, Outcome, Parameters};
use std::sync::Arc;
use tracing::Instrument;

#[derive(Clone)]
pub struct PostProcessPipeline {
    hooks: Arc<dyn Hooks>,
    check_hook: bool,
}

impl PostProcessPipeline {
    pub fn new(hooks: Arc<dyn Hooks>, check_hook: bool) -> Self {
        Self { hooks, check_hook }
    }

    /// Hook gate only.
    pub async fn pre_process(&self, id: &BlockId, block: &Block) -> HookDecision {
        if !self.check_hook {
            return HookDecision::Proceed;
        }
        let decision = self.hooks.pre_process_block(id, block).await;
        if decision.is_veto() {
            tracing::debug!(block = %id, "pre-process hook vetoed block");
        }
        decision
    }

    /// Side effects only. Never returns [`Outcome::Vetoed`].
    pub async fn run_effects(
        &self,
        id: &BlockId,
        block: &Block,
        params: &Parameters,
    ) -> Result<Outcome, FlowError> {
        let session = params.session();
        let before = session.path_len();

        async {
            if let Some(function) = &block.function {
                invoke(id, function, params).await?;
            }
            if let Some(file) = &block.file {
                if !params.files.is_empty() {
                    invoke(id, file, params).await?;
                }
            }
            if let Some(path) = &block.path {
                let next = path.resolve(params).await.map_err(|source| FlowError::Callback {
                    block: id.clone(),
                    source,
                })?;
                match next {
                    Some(next) if !next.is_empty() => {
                        if !session.go_to_path(next.clone()) {
                            tracing::warn!(block = %id, target = %next, "path resolved to an unknown block, staying");
                        }
                    }
                    _ => tracing::debug!(block = %id, "path resolved to nothing, staying"),
                }
            }
            Ok::<_, FlowError>(())
        }
        .instrument(tracing::debug_span!("block_effects", block = %id))
        .await?;

        if session.path_len() == before {
            return Ok(Outcome::Stayed);
        }
        match session.current_path() {
            Some(to) => Ok(Outcome::Advanced { to }),
            None => Ok(Outcome::Stayed),
        }
    }

    /// Hook gate followed by the side effects.
    pub async fn process(
        &self,
        id: &BlockId,
        block: &Block,
        params: &Parameters,
    ) -> Result<Outcome, FlowError> {
        if self.pre_process(id, block).await.is_veto() {
            return Ok(Outcome::Vetoed);
        }
        self.run_effects(id, block, params).await
    }
}

async fn invoke(id: &BlockId, action: &Action, params: &Parameters) -> Result<(), FlowError> {
    action(params.clone())
        .await
        .map_err(|source| FlowError::Callback {
            block: id.clone(),
            source,
        })
}

impl std::fmt::Debug for PostProcessPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostProcessPipeline")
            .field("check_hook", &self.check_hook)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::NoHooks;
    use async_trait::async_trait;
    use chatflow_core::{Attachment, Flow, SessionHandle, Settings};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct VetoAll;

    #[async_trait]
    impl Hooks for VetoAll {
        async fn pre_process_block(&self, _id: &BlockId, _block: &Block) -> HookDecision {
            HookDecision::Veto
        }
    }

    fn session(flow: Flow) -> SessionHandle {
        SessionHandle::new(Arc::new(flow), Arc::new(Settings::default()))
    }

    async fn run(pipeline: &PostProcessPipeline, handle: &SessionHandle, input: &str) -> Outcome {
        let id = handle.current_path().unwrap();
        let flow = handle.flow().clone();
        let block = flow.get(id.as_str()).unwrap();
        let params = Parameters::new(handle, input, Vec::new());
        pipeline.process(&id, block, &params).await.unwrap()
    }

    #[tokio::test]
    async fn test_literal_path_advances() {
        let flow = Flow::builder("start")
            .block("start", Block::new().path("next"))
            .block("next", Block::new())
            .build()
            .unwrap();
        let handle = session(flow);
        let pipeline = PostProcessPipeline::new(Arc::new(NoHooks), false);

        let outcome = run(&pipeline, &handle, "anything").await;
        assert_eq!(outcome, Outcome::Advanced { to: "next".into() });
        assert_eq!(handle.path_len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_target_stays() {
        let flow = Flow::builder("start")
            .block("start", Block::new().path_fn(|_| Some(BlockId::from("ghost"))))
            .build()
            .unwrap();
        let handle = session(flow);
        let pipeline = PostProcessPipeline::new(Arc::new(NoHooks), false);

        assert_eq!(run(&pipeline, &handle, "x").await, Outcome::Stayed);
        assert_eq!(handle.path_len(), 1);
    }

    #[tokio::test]
    async fn test_function_can_move_the_stack() {
        let flow = Flow::builder("start")
            .block(
                "start",
                Block::new().function(|params: Parameters| async move {
                    params.go_to_path("next");
                    Ok(())
                }),
            )
            .block("next", Block::new())
            .build()
            .unwrap();
        let handle = session(flow);
        let pipeline = PostProcessPipeline::new(Arc::new(NoHooks), false);

        assert!(run(&pipeline, &handle, "x").await.is_advanced());
    }

    #[tokio::test]
    async fn test_veto_skips_everything() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let flow = Flow::builder("start")
            .block(
                "start",
                Block::new().path("next").function(move |_| {
                    let seen = seen.clone();
                    async move {
                        seen.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
            )
            .block("next", Block::new())
            .build()
            .unwrap();
        let handle = session(flow);

        let disabled = PostProcessPipeline::new(Arc::new(VetoAll), false);
        assert!(run(&disabled, &handle, "x").await.is_advanced());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let enabled = PostProcessPipeline::new(Arc::new(VetoAll), true);
        assert_eq!(run(&enabled, &handle, "x").await, Outcome::Vetoed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_file_handler_needs_attachments() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let flow = Flow::builder("start")
            .block(
                "start",
                Block::new().file(move |params: Parameters| {
                    let seen = seen.clone();
                    async move {
                        seen.fetch_add(params.files.len(), Ordering::SeqCst);
                        Ok(())
                    }
                }),
            )
            .build()
            .unwrap();
        let handle = session(flow);
        let pipeline = PostProcessPipeline::new(Arc::new(NoHooks), false);
        let flow = handle.flow().clone();
        let block = flow.get("start").unwrap();
        let id = BlockId::from("start");

        let bare = Parameters::new(&handle, "text", Vec::new());
        pipeline.run_effects(&id, block, &bare).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let with_file = Parameters::new(&handle, "a.txt", vec![Attachment::new("a.txt", "hi")]);
        pipeline.run_effects(&id, block, &with_file).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_callback_error_names_block() {
        let flow = Flow::builder("start")
            .block(
                "start",
                Block::new().function(|_| async { Err(anyhow::anyhow!("boom")) }),
            )
            .build()
            .unwrap();
        let handle = session(flow);
        let pipeline = PostProcessPipeline::new(Arc::new(NoHooks), false);
        let flow = handle.flow().clone();
        let params = Parameters::new(&handle, "x", Vec::new());

        let err = pipeline
            .process(&"start".into(), flow.get("start").unwrap(), &params)
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Callback { ref block, .. } if block == "start"));
    }
}
