//! Streaming synthesis request

use bytes::Bytes;
use futures::Stream;
use serde::Serialize;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ClientError;

/// JSON body of a streaming synthesis request.
#[derive(Debug, Serialize)]
pub struct SpeechRequest<'a> {
    pub text: &'a str,
    pub language: &'a str,
    pub speaker_idx: &'a str,
    pub temperature: f32,
    pub speed: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub repetition_penalty: f32,
    pub stream: bool,
    pub output_format: &'static str,
}

impl<'a> SpeechRequest<'a> {
    /// Raw 16-bit little-endian PCM, streamed as it is generated.
    ///
    /// The server picks the output rate; it is not part of the request.
    pub fn streaming_pcm(config: &'a ClientConfig, text: &'a str) -> Self {
        Self {
            text,
            language: &config.language,
            speaker_idx: &config.speaker,
            temperature: config.temperature,
            speed: config.speed,
            top_k: config.top_k,
            top_p: config.top_p,
            repetition_penalty: config.repetition_penalty,
            stream: true,
            output_format: "pcm",
        }
    }
}

/// Send the request and hand back the response body as a byte stream.
///
/// Non-success statuses are turned into [`ClientError::Status`] before any
/// audio is read.
pub async fn open_stream(
    client: &reqwest::Client,
    config: &ClientConfig,
    text: &str,
) -> Result<impl Stream<Item = reqwest::Result<Bytes>>, ClientError> {
    let url = config.endpoint_url();
    debug!("POST {}", url);

    let response = client
        .post(&url)
        .json(&SpeechRequest::streaming_pcm(config, text))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::status(status, &body));
    }

    Ok(response.bytes_stream())
}
