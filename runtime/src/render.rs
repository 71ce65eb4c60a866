//! Entering a block: rendering its message and component and announcing
//! its affordances.

use chatflow_core::{Attachment, BlockId, EngineEvent, FlowError, Parameters, Sender, SessionHandle};

/// Render `id` as the newly current block.
///
/// Message resolvers see the input of the turn that led here, so a block can
/// greet the user with what they just typed.
pub async fn enter_block(
    session: &SessionHandle,
    id: &BlockId,
    user_input: &str,
    files: Vec<Attachment>,
) -> Result<(), FlowError> {
    let flow = session.flow().clone();
    let block = flow
        .get(id.as_str())
        .ok_or_else(|| FlowError::UnknownBlock(id.clone()))?;
    let params = Parameters::new(session, user_input, files);

    if let Some(message) = &block.message {
        let text = message
            .resolve(&params)
            .await
            .map_err(|source| FlowError::Callback {
                block: id.clone(),
                source,
            })?;
        match text {
            Some(text) if !text.trim().is_empty() => {
                let bubble = &session.settings().bot_bubble;
                if bubble.simulate_stream {
                    session
                        .simulate_stream_message(&text, Sender::Bot, bubble.stream_speed())
                        .await?;
                } else {
                    session.inject_message(text, Sender::Bot);
                }
            }
            _ => tracing::trace!(block = %id, "block has no message to render"),
        }
    }

    if let Some(component) = &block.component {
        session.inject_message(component.clone(), Sender::Bot);
    }

    session.publish(EngineEvent::BlockEntered {
        id: id.clone(),
        options: block.options.clone(),
        checkboxes: block.checkboxes.clone(),
    });
    tracing::info!(block = %id, "entered block");
    Ok(())
}
