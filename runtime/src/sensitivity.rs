//! Sensitive input handling.
//!
//! [`evaluate`] decides whether the input of the current block must be
//! protected; [`echo_text`] decides what of a protected input reaches the
//! transcript.

use chatflow_core::settings::{SensitiveEcho, SensitiveInputSettings};
use chatflow_core::{Block, BlockId, FlowError, Parameters};

/// Resolve `is_sensitive` for `block` and report it through `set_mode`.
///
/// A block without the field, or whose resolver yields nothing, is not
/// sensitive.
pub async fn evaluate<F>(
    id: &BlockId,
    block: &Block,
    params: &Parameters,
    set_mode: F,
) -> Result<bool, FlowError>
where
    F: FnOnce(bool),
{
    let sensitive = match &block.is_sensitive {
        Some(field) => field
            .resolve(params)
            .await
            .map_err(|source| FlowError::Callback {
                block: id.clone(),
                source,
            })?
            .unwrap_or(false),
        None => false,
    };
    set_mode(sensitive);
    Ok(sensitive)
}

/// Text to echo for `input`, or `None` when nothing should be echoed.
pub fn echo_text(settings: &SensitiveInputSettings, sensitive_mode: bool, input: &str) -> Option<String> {
    if !sensitive_mode {
        return Some(input.to_string());
    }
    match settings.echo_mode() {
        SensitiveEcho::Hide => None,
        SensitiveEcho::Mask(count) => Some("*".repeat(count)),
        SensitiveEcho::Verbatim => Some(input.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatflow_core::{Flow, SessionHandle, Settings};
    use std::sync::Arc;

    fn settings(mask: bool, hide: bool, count: usize) -> SensitiveInputSettings {
        SensitiveInputSettings {
            mask_in_transcript: mask,
            hide_in_transcript: hide,
            asterisks_count: count,
        }
    }

    #[test]
    fn test_mask_length_is_independent_of_input() {
        let mask = settings(true, false, 6);
        assert_eq!(echo_text(&mask, true, "hunter2").as_deref(), Some("******"));
        assert_eq!(echo_text(&mask, true, "x").as_deref(), Some("******"));
        assert_eq!(echo_text(&mask, false, "plain").as_deref(), Some("plain"));
    }

    #[test]
    fn test_hide_wins_over_mask() {
        assert_eq!(echo_text(&settings(true, true, 6), true, "secret"), None);
        assert_eq!(
            echo_text(&settings(false, false, 6), true, "secret").as_deref(),
            Some("secret")
        );
    }

    #[tokio::test]
    async fn test_evaluate_resolves_field() {
        let flow = Flow::builder("start")
            .block("start", Block::new())
            .block("pin", Block::new().sensitive(true))
            .block("maybe", Block::new().sensitive_fn(|p| Some(p.user_input == "yes")))
            .build()
            .unwrap();
        let handle = SessionHandle::new(Arc::new(flow), Arc::new(Settings::default()));
        let flow = handle.flow().clone();

        let params = Parameters::new(&handle, "yes", Vec::new());
        let mut reported = None;
        let on = evaluate(&"pin".into(), flow.get("pin").unwrap(), &params, |m| reported = Some(m))
            .await
            .unwrap();
        assert!(on);
        assert_eq!(reported, Some(true));

        let plain = evaluate(&"start".into(), flow.get("start").unwrap(), &params, |_| {})
            .await
            .unwrap();
        assert!(!plain);

        assert!(evaluate(&"maybe".into(), flow.get("maybe").unwrap(), &params, |_| {})
            .await
            .unwrap());
        let no = Parameters::new(&handle, "no", Vec::new());
        assert!(!evaluate(&"maybe".into(), flow.get("maybe").unwrap(), &no, |_| {})
            .await
            .unwrap());
    }
}
