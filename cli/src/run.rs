//! Interactive terminal chat

use anyhow::{Context, Result};
use async_trait::async_trait;
use chatflow_core::event::forward_events;
use chatflow_core::responder::from_chunks;
use chatflow_core::{
    ChunkStream, EngineEvent, EventSink, FlowDocument, Responder, ResponderError, Sender, Settings,
    SubmitOutcome, TranscriptEvent,
};
use chatflow_runtime::Session;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

/// Answers by repeating the prompt word by word.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoResponder;

#[async_trait]
impl Responder for EchoResponder {
    async fn send(&self, prompt: &str) -> Result<ChunkStream, ResponderError> {
        let mut chunks = vec!["You said: ".to_string()];
        chunks.extend(prompt.split_inclusive(' ').map(str::to_string));
        Ok(from_chunks(chunks))
    }
}

/// Prints bot messages and block affordances to stdout. User messages are
/// not printed; the terminal already shows what was typed.
#[derive(Default)]
struct TerminalSink {
    open: Mutex<HashSet<Uuid>>,
}

impl TerminalSink {
    fn render(&self, event: &EngineEvent) -> Option<String> {
        match event {
            EngineEvent::Transcript(TranscriptEvent::Inserted(message)) => {
                if message.sender == Sender::User {
                    return None;
                }
                let body = match message.text() {
                    Some(text) => text.to_string(),
                    None => "[component]".to_string(),
                };
                if message.is_streaming {
                    self.open.lock().insert(message.id);
                    Some(format!("bot> {body}"))
                } else {
                    Some(format!("bot> {body}\n"))
                }
            }
            EngineEvent::Transcript(TranscriptEvent::Appended { id, chunk }) => {
                self.open.lock().contains(id).then(|| chunk.clone())
            }
            EngineEvent::Transcript(TranscriptEvent::Finalized { id })
            | EngineEvent::Transcript(TranscriptEvent::Removed { id }) => {
                self.open.lock().remove(id).then(|| "\n".to_string())
            }
            EngineEvent::BlockEntered {
                options, checkboxes, ..
            } => {
                let mut out = String::new();
                if let Some(options) = options {
                    let values: Vec<&str> = options.items.iter().map(|c| c.value.as_str()).collect();
                    out.push_str(&format!("     options: {}  (/option <value>)\n", values.join(" | ")));
                }
                if let Some(boxes) = checkboxes {
                    let values: Vec<&str> = boxes.items.iter().map(|c| c.value.as_str()).collect();
                    out.push_str(&format!("     choose: {}  (/check a, b)\n", values.join(" | ")));
                }
                (!out.is_empty()).then_some(out)
            }
            EngineEvent::ToastShown(toast) => Some(format!("     [{}]\n", toast.content)),
            _ => None,
        }
    }
}

#[async_trait]
impl EventSink for TerminalSink {
    type Error = std::io::Error;

    async fn send_event(&self, event: EngineEvent) -> Result<(), Self::Error> {
        if let Some(text) = self.render(&event) {
            let mut out = std::io::stdout().lock();
            out.write_all(text.as_bytes())?;
            out.flush()?;
        }
        Ok(())
    }
}

/// Load the flow and settings, then read turns from stdin until EOF or `/quit`.
pub async fn run_chat_command(
    flow_path: &Path,
    settings_path: Option<&Path>,
    echo_responder: bool,
) -> Result<()> {
    let flow = FlowDocument::load(flow_path)
        .with_context(|| format!("Failed to read flow document: {}", flow_path.display()))?
        .into_flow()
        .context("Flow is invalid")?;
    let settings = match settings_path {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings: {}", path.display()))?,
        None => Settings::default(),
    };

    let mut builder = Session::builder(flow).settings(settings);
    if echo_responder {
        builder = builder.responder(EchoResponder);
    }
    let session = builder.build();

    let logger = chatflow_observe::spawn_event_logger(session.subscribe());
    let printer = {
        let rx = session.subscribe();
        tokio::spawn(async move { forward_events(rx, &TerminalSink::default()).await })
    };

    session.start().await.context("Failed to render the start block")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let outcome = if line == "/quit" {
            break;
        } else if let Some(value) = line.strip_prefix("/option ") {
            session.select_option(value.trim()).await
        } else if let Some(values) = line.strip_prefix("/check ") {
            let values: Vec<String> = values
                .split(',')
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect();
            session.submit_checkboxes(&values).await
        } else {
            session.submit(line, true).await
        };

        match outcome {
            Ok(SubmitOutcome::Ignored(reason)) => eprintln!("     (ignored: {reason:?})"),
            Ok(outcome) => tracing::debug!(?outcome, "turn finished"),
            Err(error) => eprintln!("error: {:#}", anyhow::Error::from(error)),
        }
    }

    drop(session);
    let printed = printer.await.context("printer task failed")?;
    let logged = logger.await.context("logger task failed")?;
    tracing::debug!(printed, logged, "session closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatflow_core::{Block, Flow, Message, Options};

    #[test]
    fn test_streamed_message_rendering() {
        let sink = TerminalSink::default();
        let mut message = Message::streaming(Sender::Bot);
        let id = message.id;

        assert_eq!(
            sink.render(&EngineEvent::Transcript(TranscriptEvent::Inserted(message.clone()))),
            Some("bot> ".to_string())
        );
        assert_eq!(
            sink.render(&EngineEvent::Transcript(TranscriptEvent::Appended {
                id,
                chunk: "hi".into()
            })),
            Some("hi".to_string())
        );
        assert_eq!(
            sink.render(&EngineEvent::Transcript(TranscriptEvent::Finalized { id })),
            Some("\n".to_string())
        );

        message.sender = Sender::User;
        message.id = Uuid::new_v4();
        assert_eq!(
            sink.render(&EngineEvent::Transcript(TranscriptEvent::Inserted(message))),
            None
        );
    }

    #[tokio::test]
    async fn test_echo_responder_through_session() {
        let flow = Flow::builder("chat")
            .block("chat", Block::new().options(Options::new(["a"])))
            .build()
            .unwrap();
        let mut settings = Settings::default();
        settings.chat_input.bot_delay_ms = 0;
        let session = Session::builder(flow)
            .settings(settings)
            .responder(EchoResponder)
            .build();

        session.submit("hello there", true).await.unwrap();
        let last = session
            .handle()
            .read(|s| s.transcript.last().and_then(|m| m.text().map(str::to_string)));
        assert_eq!(last.as_deref(), Some("You said: hello there"));
    }
}
