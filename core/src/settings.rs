//! Engine configuration.
//!
//! Every section defaults independently, so a TOML file only needs the keys it
//! changes.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chat_input: ChatInputSettings,
    pub sensitive_input: SensitiveInputSettings,
    pub user_bubble: BubbleSettings,
    pub bot_bubble: BubbleSettings,
    pub event: EventSettings,
    pub toast: ToastSettings,
    pub responder: ResponderSettings,
}

impl Settings {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(input)?;
        settings.check()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.sensitive_input.mask_in_transcript && self.sensitive_input.asterisks_count == 0 {
            return Err(ConfigError::Invalid(
                "sensitive_input.asterisks_count must be positive when masking".to_string(),
            ));
        }
        if self.toast.max_count == 0 {
            return Err(ConfigError::Invalid(
                "toast.max_count must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatInputSettings {
    /// Input disabled for blocks that do not say otherwise.
    pub disabled: bool,
    /// Disable input as soon as a submission is accepted.
    pub block_spam: bool,
    /// Delay before a submitted block's side effects run.
    pub bot_delay_ms: u64,
}

impl Default for ChatInputSettings {
    fn default() -> Self {
        Self {
            disabled: false,
            block_spam: true,
            bot_delay_ms: 1000,
        }
    }
}

impl ChatInputSettings {
    pub fn bot_delay(&self) -> Duration {
        Duration::from_millis(self.bot_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitiveInputSettings {
    pub mask_in_transcript: bool,
    pub hide_in_transcript: bool,
    pub asterisks_count: usize,
}

impl Default for SensitiveInputSettings {
    fn default() -> Self {
        Self {
            mask_in_transcript: true,
            hide_in_transcript: false,
            asterisks_count: 10,
        }
    }
}

/// How sensitive input is echoed into the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensitiveEcho {
    Hide,
    Mask(usize),
    Verbatim,
}

impl SensitiveInputSettings {
    /// Hiding wins over masking when both are set.
    pub fn echo_mode(&self) -> SensitiveEcho {
        if self.hide_in_transcript {
            SensitiveEcho::Hide
        } else if self.mask_in_transcript {
            SensitiveEcho::Mask(self.asterisks_count)
        } else {
            SensitiveEcho::Verbatim
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BubbleSettings {
    /// Reveal messages character by character instead of at once.
    pub simulate_stream: bool,
    pub stream_speed_ms: u64,
}

impl Default for BubbleSettings {
    fn default() -> Self {
        Self {
            simulate_stream: false,
            stream_speed_ms: 30,
        }
    }
}

impl BubbleSettings {
    pub fn stream_speed(&self) -> Duration {
        Duration::from_millis(self.stream_speed_ms)
    }
}

/// Which hook events are dispatched to the hooks collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSettings {
    pub user_submit_text: bool,
    pub pre_process_block: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToastSettings {
    pub max_count: usize,
    /// Refuse new toasts at `max_count` instead of evicting the oldest.
    pub forbid_on_max: bool,
}

impl Default for ToastSettings {
    fn default() -> Self {
        Self {
            max_count: 3,
            forbid_on_max: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderSettings {
    /// Ask the responder when a submitted block does not transition.
    pub fallback_on_stay: bool,
}

impl Default for ResponderSettings {
    fn default() -> Self {
        Self {
            fallback_on_stay: true,
        }
    }
}
