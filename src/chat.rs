use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;

const SYSTEM_INSTRUCTION: &str =
    "You are a farmer assistance helper. Help with agriculture practices.";

/// Returned to the user whenever the upstream call fails for any reason.
pub const FALLBACK_REPLY: &str = "Sorry, I couldn't process your request.";

const CHAT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
enum ChatError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned status {0}")]
    Status(u16),
}

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

/// Client for the hosted generative-AI chat endpoint. The streamed response
/// arrives as a JSON array of chunks whose text parts are concatenated into
/// one reply string.
pub struct ChatClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl ChatClient {
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(CHAT_TIMEOUT)
            .build()
            .expect("Failed to build chat HTTP client");

        Self {
            http,
            api_url: config.gemini_api_url.clone(),
            api_key: config.gemini_api_key.clone(),
        }
    }

    /// Answers `query`, or the fixed apology when anything goes wrong.
    pub async fn respond(&self, query: &str) -> String {
        match self.generate(query).await {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("Error in chat response: {e}");
                FALLBACK_REPLY.to_string()
            }
        }
    }

    async fn generate(&self, query: &str) -> Result<String, ChatError> {
        let payload = json!({
            "contents": [
                {"role": "user", "parts": [{"text": query}]}
            ],
            "systemInstruction": {"parts": [{"text": SYSTEM_INSTRUCTION}]},
            "generationConfig": {
                "temperature": 1,
                "topP": 0.95,
                "topK": 40,
                "maxOutputTokens": 8192,
                "responseMimeType": "text/plain"
            }
        });

        let resp = self
            .http
            .post(&self.api_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ChatError::Status(status.as_u16()));
        }

        let chunks: Vec<GenerateChunk> = resp.json().await?;
        Ok(concat_chunks(&chunks))
    }
}

fn concat_chunks(chunks: &[GenerateChunk]) -> String {
    let mut reply = String::new();
    for chunk in chunks {
        for candidate in &chunk.candidates {
            let Some(content) = &candidate.content else {
                continue;
            };
            for part in &content.parts {
                if let Some(text) = &part.text {
                    reply.push_str(text);
                }
            }
        }
    }
    reply
}
