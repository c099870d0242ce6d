//! Remote text-to-speech client

use super::SpeechSynthesizer;
use crate::error::{Error, Result};
use async_trait::async_trait;
use lessonplay_common::config::VoiceConfig;
use serde::Serialize;
use std::time::Duration;

const USER_AGENT: &str = concat!("lessonplay/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    voice: &'a str,
}

/// HTTP client for a remote synthesis endpoint
///
/// Posts `{"text", "voice"}` as JSON and expects an audio body back.
pub struct HttpSynthesizer {
    http_client: reqwest::Client,
    endpoint: String,
    voice: String,
}

impl HttpSynthesizer {
    pub fn new(endpoint: impl Into<String>, voice: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Synthesis(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
            voice: voice.into(),
        })
    }

    /// Build from configuration; `None` when no endpoint is configured
    pub fn from_config(config: &VoiceConfig) -> Result<Option<Self>> {
        match config.endpoint.as_deref().map(str::trim) {
            Some(endpoint) if !endpoint.is_empty() => Ok(Some(Self::new(
                endpoint,
                config.voice.clone(),
                Duration::from_millis(config.timeout_ms),
            )?)),
            _ => Ok(None),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        tracing::debug!(endpoint = %self.endpoint, chars = text.len(), "Requesting remote synthesis");

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&SynthesisRequest {
                text,
                voice: &self.voice,
            })
            .send()
            .await
            .map_err(|e| Error::Synthesis(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Synthesis(format!("HTTP {}: {}", status.as_u16(), error_text)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Synthesis(e.to_string()))?;

        if body.is_empty() {
            return Err(Error::Synthesis("empty response body".to_string()));
        }

        Ok(body.to_vec())
    }
}
