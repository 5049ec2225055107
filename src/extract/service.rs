//! Client for the external extraction service.
//!
//! The service is an OpenAI-compatible chat-completions endpoint (a local
//! Ollama instance by default). It is treated as an opaque, possibly
//! unreliable collaborator: every response is fence-stripped and parsed
//! strictly, and parse failures surface as errors for the caller to degrade.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::model::Assertion;

/// Fixed system instruction for turning one documentation page into
/// structured assertions.
pub const EXTRACTION_INSTRUCTION: &str = "\
You extract testable claims from product documentation for the Breeze RMM \
platform and emit them as JSON assertions.

Respond with a raw JSON array (no markdown, no commentary). Each element:
  {\"id\": \"<unique-per-page slug>\", \"claim\": \"<the documented behavior>\",
   \"severity\": \"critical\"|\"warning\"|\"info\",
   \"kind\": \"api\"|\"sql\"|\"ui\", \"test\": {...}}

Test shapes by kind:
- api: {\"method\", \"path\", \"body\"?, \"headers\"?, \"auth\"?, \"expect\":
  {\"status\"?, \"bodyContains\"?: [..], \"bodyNotContains\"?: [..],
   \"contentType\"?}} - path is relative to the API base URL.
- sql: {\"query\": \"<informal description of what to look up>\",
  \"expect\": \"<expected-result description>\"}
- ui: {\"navigate\": \"<path under the admin UI>\",
  \"setup\"?: [\"click <css>\" | \"fill <css> <value>\" | \"wait <ms>\"],
  \"verify\": \"<what must be visible on the page>\"}

Rules: skip claims that depend on external services or a specific operating \
system. Assign severity by user impact. Ids must be unique within the page \
and stable slugs of the claim. Emit an empty array if the page makes no \
testable claims.";

const SQL_INSTRUCTION: &str = "\
Translate the user's description into exactly one read-only SQLite SELECT \
statement against the Breeze database. Respond with the raw SQL only - no \
markdown, no explanation, no trailing semicolon.";

const VERDICT_INSTRUCTION: &str = "\
You judge whether evidence satisfies an expectation. Respond with raw JSON \
only: {\"pass\": true|false, \"reason\": \"<one sentence>\"}. The reason must \
cite the evidence.";

/// Outcome of a delegated expectation check.
#[derive(Debug, Clone, Deserialize)]
pub struct Verdict {
    pub pass: bool,
    #[serde(default)]
    pub reason: String,
}

/// The seam the coordinator and runner depend on, so both can be exercised
/// against stubs.
pub trait ClaimExtractor {
    /// Derive assertions from one page's full text.
    fn extract_assertions(&self, source: &str, text: &str) -> Result<Vec<Assertion>>;

    /// Resolve an informal query description into a single SELECT statement.
    fn resolve_query(&self, description: &str) -> Result<String>;

    /// Judge evidence against a natural-language expectation.
    fn verdict(&self, instruction: &str, evidence: &str) -> Result<Verdict>;
}

pub struct ExtractionClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl ExtractionClient {
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(180)) // model calls over large pages are slow
            .build()
            .context("Failed to create HTTP client for extraction service")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        })
    }

    fn complete(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .with_context(|| format!("Extraction service unreachable at {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            anyhow::bail!("Extraction service returned {}: {}", status, body);
        }

        let parsed: ChatResponse = response
            .json()
            .context("Extraction service returned a non-JSON completion")?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .context("Extraction service returned no choices")?;

        Ok(choice.message.content)
    }
}

impl ClaimExtractor for ExtractionClient {
    fn extract_assertions(&self, source: &str, text: &str) -> Result<Vec<Assertion>> {
        let user = format!("Source page: {}\n\n{}", source, text);
        let content = self.complete(EXTRACTION_INSTRUCTION, &user)?;
        parse_assertions(&content)
    }

    fn resolve_query(&self, description: &str) -> Result<String> {
        let content = self.complete(SQL_INSTRUCTION, description)?;
        let sql = strip_code_fence(&content).trim().to_string();
        if sql.is_empty() {
            anyhow::bail!("Extraction service resolved '{}' to an empty query", description);
        }
        Ok(sql)
    }

    fn verdict(&self, instruction: &str, evidence: &str) -> Result<Verdict> {
        let user = format!("Expectation: {}\n\nEvidence:\n{}", instruction, evidence);
        let content = self.complete(VERDICT_INSTRUCTION, &user)?;
        serde_json::from_str(strip_code_fence(&content))
            .context("Extraction service returned a malformed verdict")
    }
}

/// Parse a service response as an assertion list, tolerating markdown fences.
pub fn parse_assertions(content: &str) -> Result<Vec<Assertion>> {
    serde_json::from_str(strip_code_fence(content))
        .context("Extraction service returned malformed assertions")
}

/// Models wrap JSON in ``` fences despite instructions; strip one layer.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info-string line (```json), then the closing fence.
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    let body = body.trim_end();
    body.strip_suffix("```").map(str::trim_end).unwrap_or(body)
}
