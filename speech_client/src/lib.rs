use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use speech_core::{EncodedAudio, FetchError, SpeechSource};
use tracing::debug;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const DEFAULT_VOICE: &str = "Kore";

/// Connection settings for the speech service.
#[derive(Debug, Clone)]
pub struct SpeechClientConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub voice: String,
    pub timeout: Duration,
}

impl Default for SpeechClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Structure for the generateContent request
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<TextPart<'a>>,
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_modalities: [&'a str; 1],
    speech_config: SpeechConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig<'a> {
    voice_config: VoiceConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig<'a> {
    prebuilt_voice_config: PrebuiltVoice<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoice<'a> {
    voice_name: &'a str,
}

/// Structure for the generateContent response
#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

fn build_request<'a>(text: &'a str, voice: &'a str) -> GenerateRequest<'a> {
    GenerateRequest {
        contents: vec![Content {
            parts: vec![TextPart { text }],
        }],
        generation_config: GenerationConfig {
            response_modalities: ["AUDIO"],
            speech_config: SpeechConfig {
                voice_config: VoiceConfig {
                    prebuilt_voice_config: PrebuiltVoice { voice_name: voice },
                },
            },
        },
    }
}

/// Pull the first audio part out of a response body.
fn extract_audio(body: &str) -> Result<EncodedAudio, FetchError> {
    let response: GenerateResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    let inline = response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .find_map(|p| p.inline_data)
        .ok_or(FetchError::Empty)?;

    if inline.data.is_empty() {
        return Err(FetchError::Empty);
    }
    // Reject garbage here so it is never cached
    base64::engine::general_purpose::STANDARD
        .decode(&inline.data)
        .map_err(|e| FetchError::Malformed(format!("audio is not base64: {e}")))?;
    debug!("Received {} base64 chars of {}", inline.data.len(), inline.mime_type);

    Ok(EncodedAudio::new(inline.data))
}

/// Client for the generative speech endpoint.
pub struct SpeechClient {
    config: SpeechClientConfig,
    client: Client,
}

impl SpeechClient {
    /// Create a new client. Without an API key every fetch reports the
    /// service as unavailable.
    pub fn new(config: SpeechClientConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &SpeechClientConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Synthesize `text` and return the base64 PCM payload.
    pub async fn synthesize(&self, text: &str) -> Result<EncodedAudio, FetchError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| FetchError::Unavailable("GEMINI_API_KEY is not set".to_string()))?;

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&build_request(text, &self.config.voice))
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        extract_audio(&body)
    }
}

#[async_trait]
impl SpeechSource for SpeechClient {
    async fn fetch_speech(&self, text: &str) -> Result<EncodedAudio, FetchError> {
        self.synthesize(text).await
    }
}
