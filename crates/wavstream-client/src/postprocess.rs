use serde::Deserialize;
use std::collections::HashSet;
use wavstream_core::config::{default_punctuation, PostprocessConfig};
use wavstream_core::ExchangeError;

#[derive(Debug, Deserialize)]
struct RecognitionPayload {
    text: String,
}

/// Turns the service's final JSON message into the text written to the result file.
#[derive(Debug, Clone)]
pub struct PostProcessor {
    silence_token: String,
    punctuation: HashSet<char>,
}

impl PostProcessor {
    pub fn new(silence_token: impl Into<String>, punctuation: &str) -> Self {
        Self {
            silence_token: silence_token.into(),
            punctuation: punctuation.chars().collect(),
        }
    }

    pub fn from_config(config: &PostprocessConfig) -> Self {
        Self::new(config.silence_token.clone(), &config.punctuation)
    }

    /// Pull the `text` field out of a result message.
    pub fn extract_text(message: &str) -> Result<String, ExchangeError> {
        serde_json::from_str::<RecognitionPayload>(message)
            .map(|payload| payload.text)
            .map_err(|e| ExchangeError::MalformedResult(format!("{e}: {message:?}")))
    }

    /// Strip the silence token, then whitespace, then punctuation.
    pub fn normalize(&self, text: &str) -> String {
        let without_silence = if self.silence_token.is_empty() {
            text.to_string()
        } else {
            text.replace(&self.silence_token, "")
        };
        without_silence
            .chars()
            .filter(|c| !c.is_whitespace())
            .filter(|c| !self.punctuation.contains(c))
            .collect()
    }

    pub fn process(&self, message: &str) -> Result<String, ExchangeError> {
        let text = Self::extract_text(message)?;
        Ok(self.normalize(&text))
    }
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self::new("<sil>", &default_punctuation())
    }
}
