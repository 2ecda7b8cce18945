use crate::error::PipelineError;
use crate::pipeline::SpeechSynthesizer;
use crate::store::AudioStore;
use std::sync::Arc;

/// File name of the shared greeting clip.
pub const GREETING_FILE: &str = "greeting.wav";

/// Lazily synthesizes the greeting clip and reuses it afterwards.
///
/// Two calls arriving before the first clip is stored may both synthesize it.
/// Each write is atomic, so whichever lands last is a complete file.
#[derive(Clone)]
pub struct GreetingCache {
    store: AudioStore,
    tts: Arc<dyn SpeechSynthesizer>,
    phrase: String,
}

impl GreetingCache {
    pub fn new(store: AudioStore, tts: Arc<dyn SpeechSynthesizer>, phrase: impl Into<String>) -> Self {
        Self {
            store,
            tts,
            phrase: phrase.into(),
        }
    }

    /// Returns the absolute URL of the greeting clip, generating it first if
    /// it is not stored yet.
    pub async fn ensure_greeting(&self, host: &str) -> Result<String, PipelineError> {
        if !self.store.exists(GREETING_FILE).await {
            tracing::info!("greeting audio missing, synthesizing");
            let audio = self.tts.synthesize(&self.phrase).await?;
            self.store.write_atomic(GREETING_FILE, &audio).await?;
            tracing::info!(bytes = audio.len(), "greeting audio stored");
        }

        Ok(AudioStore::url_for(host, GREETING_FILE))
    }
}
