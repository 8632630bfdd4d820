//! The GreenOracle assistant: a pass-through to a generative-language API.
//!
//! The service holds no conversation state and applies no caching, retry, or
//! rate limiting. A fixed persona instruction is prepended to every question
//! and the upstream's text output is returned verbatim.

use anyhow::{anyhow, Context as _, Result};
use serde::{Deserialize, Serialize};

use crate::config::OracleConfig;

/// The fixed persona/system instruction prepended to every prompt.
const PERSONA: &str = "You are 'GreenOracle', an AI assistant for the Green Future Connect platform in Nigeria. \
Your purpose is to answer questions about environmental sustainability, LGA governance, waste management, and civic duties in Nigeria. \
Be helpful, concise, and encourage positive civic action. \
If asked about things outside this scope, politely pivot back to environmental or civic topics.";

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

/// Handle to the upstream generative-language model. Constructed once at
/// startup and shared through the application state; there is no module-level
/// mutable singleton to initialize lazily.
#[derive(Clone)]
pub struct Oracle {
    client: reqwest::Client,
    config: OracleConfig,
    test: bool,
}

impl Oracle {
    pub fn new(client: reqwest::Client, config: OracleConfig, test: bool) -> Self {
        Self {
            client,
            config,
            test,
        }
    }

    /// Forward a free-text question to the model and return its text answer.
    pub async fn ask(&self, prompt: &str) -> Result<String> {
        if self.test {
            return Ok(format!("[test mode] GreenOracle heard: {prompt}"));
        }

        let api_key = self
            .config
            .api_key
            .as_deref()
            .context("oracle api key is not configured")?;

        let url = self
            .config
            .endpoint
            .join(&format!("models/{}:generateContent", self.config.model))
            .context("failed to construct oracle url")?;

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: format!("{PERSONA}\n\nUser Question: {prompt}"),
                }],
            }],
        };

        let response = self
            .client
            .post(url)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .context("failed to reach the generative-language API")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("upstream returned {status}: {detail}"));
        }

        let response: GenerateResponse = response
            .json()
            .await
            .context("failed to parse the generative-language response")?;

        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .context("upstream returned no candidates")
    }
}
