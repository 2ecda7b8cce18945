use crate::config::OpenAiConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use callbridge_core::{PipelineError, SpeechSynthesizer};
use serde::Serialize;

const SERVICE: &str = "speech";

/// Longest input the speech endpoint accepts, in characters.
pub const MAX_TTS_INPUT_CHARS: usize = 4096;

/// Smallest buffer that can hold the RIFF and WAVE tags.
const WAV_TAG_LEN: usize = 12;

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'static str,
}

/// Checks that a synthesis response is a WAV file: an `audio/*` content type
/// when one is given, `RIFF` at offset 0 and `WAVE` at offset 8.
pub fn validate_wav(content_type: Option<&str>, bytes: &[u8]) -> Result<(), VoiceError> {
    if let Some(ct) = content_type {
        if !ct.trim().to_ascii_lowercase().starts_with("audio/") {
            return Err(VoiceError::malformed(
                SERVICE,
                format!("unexpected content type: {}", ct),
            ));
        }
    }

    if bytes.len() < WAV_TAG_LEN {
        return Err(VoiceError::malformed(
            SERVICE,
            format!("audio too short: {} bytes", bytes.len()),
        ));
    }

    if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(VoiceError::malformed(SERVICE, "audio is not a WAV container"));
    }

    Ok(())
}

/// Rejects text longer than [`MAX_TTS_INPUT_CHARS`] characters.
pub fn check_input(text: &str) -> Result<(), VoiceError> {
    let chars = text.chars().count();
    if chars > MAX_TTS_INPUT_CHARS {
        return Err(VoiceError::InputTooLong {
            chars,
            limit: MAX_TTS_INPUT_CHARS,
        });
    }
    Ok(())
}

/// Client for an OpenAI-compatible speech endpoint, always requesting WAV.
#[derive(Debug, Clone)]
pub struct SpeechClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    voice: String,
}

impl SpeechClient {
    pub fn new(config: &OpenAiConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            endpoint: format!("{}/v1/audio/speech", config.api_base.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.tts_model.clone(),
            voice: config.voice.clone(),
        }
    }

    /// Synthesizes `text` and returns the validated WAV bytes.
    pub async fn speak(&self, text: &str) -> Result<Vec<u8>, VoiceError> {
        if self.api_key.is_empty() {
            return Err(VoiceError::Config("speech API key is not set".to_string()));
        }
        check_input(text)?;

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&SpeechRequest {
                model: &self.model,
                voice: &self.voice,
                input: text,
                response_format: "wav",
            })
            .send()
            .await
            .map_err(VoiceError::transport(SERVICE))?;

        if !response.status().is_success() {
            let err = VoiceError::from_response(SERVICE, response).await;
            tracing::warn!("speech synthesis rejected: {}", err);
            return Err(err);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(VoiceError::transport(SERVICE))?;

        validate_wav(content_type.as_deref(), &bytes)?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for SpeechClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, PipelineError> {
        Ok(self.speak(text).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav() -> Vec<u8> {
        let mut bytes = b"RIFF".to_vec();
        bytes.extend_from_slice(&36u32.to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes
    }

    #[test]
    fn accepts_wav_with_audio_content_type() {
        assert!(validate_wav(Some("audio/wav"), &wav()).is_ok());
        assert!(validate_wav(Some("Audio/x-wav"), &wav()).is_ok());
        assert!(validate_wav(None, &wav()).is_ok());
    }

    #[test]
    fn rejects_non_wav_even_with_audio_content_type() {
        let mut mp3 = b"ID3\x04".to_vec();
        mp3.extend_from_slice(&[0; 12]);
        assert!(matches!(
            validate_wav(Some("audio/wav"), &mp3),
            Err(VoiceError::Malformed { .. })
        ));

        let mut wrong_format = wav();
        wrong_format[8..12].copy_from_slice(b"AVI ");
        assert!(validate_wav(Some("audio/wav"), &wrong_format).is_err());
    }

    #[test]
    fn rejects_non_audio_content_type() {
        let result = validate_wav(Some("application/json"), &wav());
        match result {
            Err(VoiceError::Malformed { message, .. }) => {
                assert!(message.contains("application/json"))
            }
            other => panic!("Expected Malformed error, got {:?}", other),
        }
    }

    #[test]
    fn input_limit_counts_characters_not_bytes() {
        let multibyte = "日".repeat(1500);
        assert!(multibyte.len() > MAX_TTS_INPUT_CHARS);
        assert!(check_input(&multibyte).is_ok());
        assert!(check_input(&"日".repeat(MAX_TTS_INPUT_CHARS)).is_ok());

        match check_input(&"a".repeat(MAX_TTS_INPUT_CHARS + 1)) {
            Err(VoiceError::InputTooLong { chars, limit }) => {
                assert_eq!(chars, MAX_TTS_INPUT_CHARS + 1);
                assert_eq!(limit, MAX_TTS_INPUT_CHARS);
            }
            other => panic!("Expected InputTooLong error, got {:?}", other),
        }
    }

    #[test]
    fn rejects_truncated_audio() {
        assert!(validate_wav(Some("audio/wav"), b"RIFF\0\0").is_err());
    }
}
