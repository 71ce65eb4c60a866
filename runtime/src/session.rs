//! Session controller
//!
//! Drives one conversation: a submitted input is echoed, the current block's
//! side effects run, and the turn either advances to a new block or falls
//! back to the responder. Only one submission is processed at a time; a
//! submission that arrives while another is in flight is ignored.

use crate::hooks::{Hooks, NoHooks};
use crate::merger;
use crate::pipeline::PostProcessPipeline;
use crate::render;
use crate::sensitivity;
use chatflow_core::{
    Attachment, Block, BlockId, EngineEvent, Flow, FlowError, IgnoreReason, Outcome, Parameters,
    Responder, Sender, SessionHandle, Settings, SubmitOutcome,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, broadcast};
use tokio::task::AbortHandle;
use tracing::Instrument;

struct Inner {
    handle: SessionHandle,
    pipeline: PostProcessPipeline,
    hooks: Arc<dyn Hooks>,
    responder: Option<Arc<dyn Responder>>,
    /// Held for the whole of a turn.
    turn: Mutex<()>,
    pending_transition: parking_lot::Mutex<Option<AbortHandle>>,
    started: AtomicBool,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(pending) = self.pending_transition.get_mut().take() {
            pending.abort();
        }
    }
}

/// Builder for [`Session`].
pub struct SessionBuilder {
    flow: Arc<Flow>,
    settings: Arc<Settings>,
    hooks: Arc<dyn Hooks>,
    responder: Option<Arc<dyn Responder>>,
}

impl SessionBuilder {
    pub fn settings(mut self, settings: impl Into<Arc<Settings>>) -> Self {
        self.settings = settings.into();
        self
    }

    pub fn hooks(mut self, hooks: impl Hooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn responder(mut self, responder: impl Responder + 'static) -> Self {
        self.responder = Some(Arc::new(responder));
        self
    }

    pub fn shared_responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.responder = Some(responder);
        self
    }

    pub fn build(self) -> Session {
        let handle = SessionHandle::new(self.flow, self.settings.clone());
        let pipeline = PostProcessPipeline::new(self.hooks.clone(), self.settings.event.pre_process_block);
        Session {
            inner: Arc::new(Inner {
                handle,
                pipeline,
                hooks: self.hooks,
                responder: self.responder,
                turn: Mutex::new(()),
                pending_transition: parking_lot::Mutex::new(None),
                started: AtomicBool::new(false),
            }),
        }
    }
}

/// One running conversation. Clones drive the same session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    pub fn builder(flow: impl Into<Arc<Flow>>) -> SessionBuilder {
        SessionBuilder {
            flow: flow.into(),
            settings: Arc::new(Settings::default()),
            hooks: Arc::new(NoHooks),
            responder: None,
        }
    }

    pub fn new(flow: impl Into<Arc<Flow>>, settings: impl Into<Arc<Settings>>) -> Self {
        Self::builder(flow).settings(settings).build()
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.inner.handle
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.handle.subscribe()
    }

    /// Render the start block. Only the first successful call does anything.
    pub async fn start(&self) -> Result<(), FlowError> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _turn = self.inner.turn.lock().await;
        let handle = &self.inner.handle;
        let start = handle.flow().start().clone();
        let voice_on = handle.ui().voice_on;

        async {
            if let Err(error) = render::enter_block(handle, &start, "", Vec::new()).await {
                self.inner.started.store(false, Ordering::SeqCst);
                return Err(error);
            }
            self.reconcile(voice_on, "").await?;
            self.schedule_transition(&start);
            Ok::<(), FlowError>(())
        }
        .instrument(tracing::info_span!("start", block = %start))
        .await
        .inspect_err(|error| {
            tracing::warn!(%error, "start failed");
            self.recover(voice_on);
        })
    }

    /// Submit text typed by the user. `echo` controls whether it is added to
    /// the transcript as a user message.
    pub async fn submit(&self, input: &str, echo: bool) -> Result<SubmitOutcome, FlowError> {
        self.submit_turn(input, Vec::new(), echo).await
    }

    /// Submit attachments. The file names, joined with ", ", stand in as the
    /// user input.
    pub async fn submit_files(&self, files: Vec<Attachment>) -> Result<SubmitOutcome, FlowError> {
        let names = files
            .iter()
            .map(|f| f.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        self.submit_turn(&names, files, true).await
    }

    /// Pick one of the current block's options.
    pub async fn select_option(&self, value: &str) -> Result<SubmitOutcome, FlowError> {
        let offered = self.with_current_block(|block| {
            block
                .options
                .as_ref()
                .is_some_and(|options| options.contains(value))
        });
        if !offered {
            tracing::debug!(value, "option not offered by current block");
            return Ok(SubmitOutcome::Ignored(IgnoreReason::UnknownChoice));
        }
        self.submit(value, true).await
    }

    /// Confirm a checkbox selection of the current block.
    pub async fn submit_checkboxes(&self, values: &[String]) -> Result<SubmitOutcome, FlowError> {
        let accepted = self.with_current_block(|block| {
            block
                .checkboxes
                .as_ref()
                .is_some_and(|boxes| boxes.accepts(values))
        });
        if !accepted {
            tracing::debug!(?values, "checkbox selection rejected");
            return Ok(SubmitOutcome::Ignored(IgnoreReason::UnknownChoice));
        }
        self.submit(&values.join(", "), true).await
    }

    /// Cancel a scheduled block transition. Returns whether one was pending.
    pub fn cancel_pending_transition(&self) -> bool {
        let pending = self.inner.pending_transition.lock().take();
        match pending {
            Some(pending) => {
                pending.abort();
                true
            }
            None => false,
        }
    }

    fn with_current_block<R>(&self, f: impl FnOnce(&Block) -> R) -> R
    where
        R: Default,
    {
        let handle = &self.inner.handle;
        let flow = handle.flow().clone();
        handle
            .current_path()
            .and_then(|id| flow.get(id.as_str()).map(f))
            .unwrap_or_default()
    }

    async fn submit_turn(
        &self,
        raw: &str,
        files: Vec<Attachment>,
        echo: bool,
    ) -> Result<SubmitOutcome, FlowError> {
        let input = raw.trim();
        if input.is_empty() {
            return Ok(SubmitOutcome::Ignored(IgnoreReason::EmptyInput));
        }
        let Ok(_turn) = self.inner.turn.try_lock() else {
            tracing::debug!("submission ignored, another one is in flight");
            return Ok(SubmitOutcome::Ignored(IgnoreReason::Busy));
        };
        let Some(current) = self.inner.handle.current_path() else {
            return Ok(SubmitOutcome::Ignored(IgnoreReason::NoCurrentBlock));
        };

        let span = tracing::info_span!("submit", block = %current, input_len = input.len());
        self.run_turn(current, raw, files, echo).instrument(span).await
    }

    async fn run_turn(
        &self,
        current: BlockId,
        raw: &str,
        files: Vec<Attachment>,
        echo: bool,
    ) -> Result<SubmitOutcome, FlowError> {
        let handle = &self.inner.handle;
        let settings = handle.settings();
        let input = raw.trim();

        if settings.event.user_submit_text && self.inner.hooks.user_submit_text(raw, echo).await.is_veto() {
            tracing::debug!("submit hook vetoed input");
            return Ok(SubmitOutcome::Vetoed);
        }

        let voice_on = handle.ui().voice_on;
        if echo {
            if let Err(error) = self.echo(input).await {
                tracing::warn!(%error, "echo failed");
                self.recover(voice_on);
                return Err(error);
            }
        }

        self.cancel_pending_transition();
        handle.set_text_area_value("");

        let flow = handle.flow().clone();
        let Some(block) = flow.get(current.as_str()) else {
            tracing::warn!("current block is not registered");
            return Ok(SubmitOutcome::Ignored(IgnoreReason::NoCurrentBlock));
        };

        if self.inner.pipeline.pre_process(&current, block).await.is_veto() {
            return Ok(SubmitOutcome::Vetoed);
        }

        handle.update_ui(|ui| {
            if settings.chat_input.block_spam {
                ui.text_area_disabled = true;
            }
            ui.voice_on = false;
            ui.sensitive_mode = false;
        });

        let turn = async {
            let outcome = self.advance(&current, block, input, files).await?;
            self.reconcile(voice_on, input).await?;
            Ok::<SubmitOutcome, FlowError>(outcome)
        };
        match turn.await {
            Ok(outcome) => {
                if let SubmitOutcome::Advanced { to, .. } = &outcome {
                    self.schedule_transition(to);
                }
                Ok(outcome)
            }
            Err(error) => {
                tracing::warn!(%error, "turn failed");
                self.recover(voice_on);
                Err(error)
            }
        }
    }

    async fn advance(
        &self,
        current: &BlockId,
        block: &Block,
        input: &str,
        files: Vec<Attachment>,
    ) -> Result<SubmitOutcome, FlowError> {
        let handle = &self.inner.handle;
        let settings = handle.settings();

        let delay = settings.chat_input.bot_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        handle.update_ui(|ui| ui.bot_typing = true);

        let params = Parameters::new(handle, input, files);
        let outcome = self.inner.pipeline.run_effects(current, block, &params).await?;
        close_callback_stream(handle);
        match outcome {
            Outcome::Advanced { to } => {
                render::enter_block(handle, &to, input, params.files.clone()).await?;
                Ok(SubmitOutcome::Advanced {
                    from: current.clone(),
                    to,
                })
            }
            Outcome::Stayed | Outcome::Vetoed => match &self.inner.responder {
                Some(responder) if settings.responder.fallback_on_stay => {
                    merger::stream_from(handle, responder.as_ref(), input).await;
                    Ok(SubmitOutcome::Streamed)
                }
                _ => Ok(SubmitOutcome::Stayed),
            },
        }
    }

    async fn echo(&self, input: &str) -> Result<(), FlowError> {
        let handle = &self.inner.handle;
        let settings = handle.settings();
        let sensitive_mode = handle.ui().sensitive_mode;
        let Some(text) = sensitivity::echo_text(&settings.sensitive_input, sensitive_mode, input) else {
            tracing::trace!("sensitive input hidden from transcript");
            return Ok(());
        };

        if settings.user_bubble.simulate_stream {
            handle
                .simulate_stream_message(&text, Sender::User, settings.user_bubble.stream_speed())
                .await?;
        } else {
            handle.inject_message(text, Sender::User);
        }
        Ok(())
    }

    /// Present the input area for whichever block is current now.
    async fn reconcile(&self, voice_on: bool, input: &str) -> Result<(), FlowError> {
        let handle = &self.inner.handle;
        let Some(current) = handle.current_path() else {
            return Ok(());
        };
        let flow = handle.flow().clone();
        let Some(block) = flow.get(current.as_str()) else {
            return Ok(());
        };

        let params = Parameters::new(handle, input, Vec::new());
        sensitivity::evaluate(&current, block, &params, |on| {
            handle.update_ui(|ui| ui.sensitive_mode = on);
        })
        .await?;

        let disabled = block.chat_disabled.unwrap_or(handle.settings().chat_input.disabled);
        handle.update_ui(|ui| {
            ui.text_area_disabled = disabled;
            ui.allows_attachment = block.allows_attachment();
            ui.voice_on = voice_on;
            ui.bot_typing = false;
        });
        Ok(())
    }

    /// Leave the input usable after a failed turn.
    fn recover(&self, voice_on: bool) {
        let handle = &self.inner.handle;
        handle.end_any_stream();
        let flow = handle.flow().clone();
        let disabled = handle
            .current_path()
            .and_then(|id| flow.get(id.as_str()).and_then(|b| b.chat_disabled))
            .unwrap_or(handle.settings().chat_input.disabled);
        handle.update_ui(|ui| {
            ui.text_area_disabled = disabled;
            ui.voice_on = voice_on;
            ui.bot_typing = false;
        });
    }

    fn schedule_transition(&self, id: &BlockId) {
        let flow = self.inner.handle.flow().clone();
        let Some(spec) = flow.get(id.as_str()).and_then(|b| b.transition) else {
            return;
        };

        let inner = Arc::downgrade(&self.inner);
        let target = id.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(spec.duration).await;
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let session = Session { inner };
            if let Err(error) = session.fire_transition(&target).await {
                tracing::warn!(%error, block = %target, "scheduled transition failed");
            }
        });
        tracing::debug!(block = %id, delay_ms = spec.duration.as_millis() as u64, "transition scheduled");

        let previous = self.inner.pending_transition.lock().replace(task.abort_handle());
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Run the block's side effects with empty input, as if the user had
    /// submitted without echo, but never falling back to the responder.
    async fn fire_transition(&self, id: &BlockId) -> Result<(), FlowError> {
        let _turn = self.inner.turn.lock().await;
        self.inner.pending_transition.lock().take();

        let handle = &self.inner.handle;
        if handle.current_path().as_ref() != Some(id) {
            tracing::debug!(block = %id, "block changed before its transition fired");
            return Ok(());
        }
        let flow = handle.flow().clone();
        let block = flow
            .get(id.as_str())
            .ok_or_else(|| FlowError::UnknownBlock(id.clone()))?;

        let voice_on = handle.ui().voice_on;
        async {
            let params = Parameters::new(handle, "", Vec::new());
            let outcome = self.inner.pipeline.process(id, block, &params).await?;
            close_callback_stream(handle);
            if let Outcome::Advanced { to } = outcome {
                render::enter_block(handle, &to, "", Vec::new()).await?;
                self.reconcile(voice_on, "").await?;
                self.schedule_transition(&to);
            }
            Ok::<(), FlowError>(())
        }
        .instrument(tracing::info_span!("transition", block = %id))
        .await
        .inspect_err(|_| self.recover(voice_on))
    }
}

/// Finalize a message a block callback began streaming but never ended.
fn close_callback_stream(handle: &SessionHandle) {
    if let Some(id) = handle.end_any_stream() {
        tracing::debug!(message = %id, "closed stream left open by a callback");
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("handle", &self.inner.handle)
            .field("responder", &self.inner.responder.is_some())
            .field("started", &self.inner.started.load(Ordering::Relaxed))
            .finish()
    }
}
