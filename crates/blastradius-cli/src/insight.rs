use async_trait::async_trait;
use blastradius_core::{
    BlastRadiusError, InsightProvider, InsightSettings, InsightSnapshot, Result,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

const API_BASE: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT_SECS: u64 = 120;
const MAX_RETRIES: u32 = 2;

/// HTTP client for the narrative-insight collaborator. A failed or slow
/// annotation never blocks the analysis cycle; callers treat the result as
/// best-effort decoration.
pub struct InsightClient {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl InsightClient {
    /// Build a client from settings plus the `ANTHROPIC_API_KEY`
    /// environment variable. Returns `None` when no key is configured so
    /// the engine runs without annotation.
    pub fn from_env(settings: &InsightSettings) -> Result<Option<Self>> {
        let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") else {
            return Ok(None);
        };
        if api_key.is_empty() {
            return Ok(None);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| BlastRadiusError::Insight(e.to_string()))?;

        Ok(Some(Self {
            client,
            api_key,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
        }))
    }

    fn build_prompt(snapshot: &InsightSnapshot) -> String {
        let mut sections = Vec::new();
        sections.push(format!("FILE: {}", snapshot.file));
        sections.push(format!("CHANGED LINES: {:?}", snapshot.changed_lines));

        let names = |set: &std::collections::BTreeSet<blastradius_core::QualifiedName>| {
            if set.is_empty() {
                "None".to_string()
            } else {
                set.iter()
                    .map(|n| n.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        };
        sections.push(format!(
            "CHANGE SUMMARY:\n- Added: {}\n- Deleted: {}\n- Modified: {}",
            names(&snapshot.change_set.added),
            names(&snapshot.change_set.deleted),
            names(&snapshot.change_set.modified),
        ));

        let impacted: Vec<String> = snapshot
            .impacted
            .iter()
            .map(|s| format!("- {} ({:?}, {})", s.name.as_str(), s.kind, s.severity))
            .collect();
        sections.push(format!("IMPACTED SYMBOLS:\n{}", impacted.join("\n")));

        sections.push(
            "TASK: Summarize the blast radius of this edit for a reviewer in a short \
             paragraph. Call out the highest-severity symbols and any ripple effects \
             worth re-testing. Plain text only."
                .to_string(),
        );
        sections.join("\n\n")
    }

    async fn send(&self, prompt: &str) -> Result<String> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let mut last_error = None;
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_secs(2u64.pow(attempt - 1))).await;
                warn!(attempt, "retrying insight request");
            }
            match self.try_send(&request).await {
                Ok(text) => return Ok(text),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error
            .unwrap_or_else(|| BlastRadiusError::Insight("all retries failed".to_string())))
    }

    async fn try_send(&self, request: &MessagesRequest) -> Result<String> {
        let response = self
            .client
            .post(format!("{API_BASE}/messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| BlastRadiusError::Insight(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(BlastRadiusError::Insight(format!(
                "insight API error ({status}): {body}"
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| BlastRadiusError::Insight(e.to_string()))?;

        Ok(parsed
            .content
            .iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join(""))
    }
}

#[async_trait]
impl InsightProvider for InsightClient {
    async fn annotate(&self, snapshot: &InsightSnapshot) -> Result<String> {
        let prompt = Self::build_prompt(snapshot);
        self.send(&prompt).await
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}
