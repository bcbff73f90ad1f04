// Configuration for the reader, read from the environment

use std::str::FromStr;
use std::time::Duration;

use speech_client::{SpeechClientConfig, DEFAULT_API_BASE, DEFAULT_MODEL, DEFAULT_VOICE};

/// Where decoded speech is played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputKind {
    /// The sound card
    Device,
    /// A silent output that only keeps time
    #[value(alias = "none")]
    Null,
}

impl OutputKind {
    fn default_for_build() -> Self {
        if cfg!(feature = "device") {
            OutputKind::Device
        } else {
            OutputKind::Null
        }
    }
}

impl FromStr for OutputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "device" => Ok(OutputKind::Device),
            "null" | "none" => Ok(OutputKind::Null),
            other => Err(format!("unknown audio output: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReaderConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub voice: String,
    pub api_base: String,
    pub timeout_secs: u64,
    pub audio_output: OutputKind,
    pub audio_device: Option<String>,
    pub prefetch: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_secs: 30,
            audio_output: OutputKind::default_for_build(),
            audio_device: None,
            prefetch: true,
        }
    }
}

impl ReaderConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let timeout_secs = var("SPEECH_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.timeout_secs);

        let audio_output = var("AUDIO_OUTPUT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.audio_output);

        Self {
            api_key: var("GEMINI_API_KEY"),
            model: var("SPEECH_MODEL").unwrap_or(defaults.model),
            voice: var("SPEECH_VOICE").unwrap_or(defaults.voice),
            api_base: var("SPEECH_API_BASE").unwrap_or(defaults.api_base),
            timeout_secs,
            audio_output,
            audio_device: var("AUDIO_DEVICE"),
            prefetch: defaults.prefetch,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn speech_client_config(&self) -> SpeechClientConfig {
        SpeechClientConfig {
            api_key: self.api_key.clone(),
            api_base: self.api_base.clone(),
            model: self.model.clone(),
            voice: self.voice.clone(),
            timeout: self.timeout(),
        }
    }
}
