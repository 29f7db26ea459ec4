//! Reasoning oracle boundary.
//!
//! Code analysis and symptom triage need automotive reasoning the engine
//! does not perform itself. `ReasoningOracle` is the seam: callers hand
//! over a JSON context, implementations return a JSON result, and the
//! calling component validates the shape. `HttpOracle` talks to an
//! Ollama-style `/api/chat` endpoint; `ScriptedOracle` is the test double.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::{EngineError, EngineResult};

/// Which reasoning task is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    DtcAnalysis,
    SymptomTriage,
}

/// Trait for reasoning oracle implementations.
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    /// Run one inference. `input` is the task context; the result is the
    /// oracle's raw JSON, shape-validated by the caller.
    async fn infer(&self, kind: PromptKind, input: &serde_json::Value)
        -> EngineResult<serde_json::Value>;
}

const DTC_ANALYSIS_PROMPT: &str = r#"You are an automotive diagnostic expert. You receive a JSON object describing a diagnostic trouble code and the vehicle it was read from (code, description, make, model, year, mileage_km, freeze_frame when available).

Respond with ONLY a JSON object (no markdown, no explanation):
{
  "urgency": "<low|moderate|high|immediate>",
  "cost_min_usd": <integer>,
  "cost_max_usd": <integer>,
  "labor_cost_usd": <integer>,
  "parts_cost_usd": <integer>,
  "difficulty": "<easy|moderate|hard|specialist>",
  "probable_causes": [{"cause": "<text>", "likelihood_pct": <0-100>}, ...],
  "venue": "<diy|shop>",
  "venue_rationale": "<one sentence>",
  "explanation": "<plain-language explanation for a non-mechanic owner>"
}

Rank probable_causes most-likely first. Cost estimates are for this specific make, model, year, and mileage. Be honest about urgency — do not alarm owners over cosmetic faults, and do not downplay safety issues."#;

const SYMPTOM_TRIAGE_PROMPT: &str = r#"You are an automotive diagnostic expert helping a vehicle owner triage a symptom. You receive a JSON object with the owner's description, the vehicle (make, model, year, trim, mileage_km), and any trouble codes currently stored.

Respond with ONLY a JSON object (no markdown, no explanation):
{
  "analysis_text": "<plain-language assessment>",
  "suggested_codes": ["<code>", ...],
  "probable_causes": ["<text>", ...],
  "urgency": "<low|moderate|high|immediate>",
  "related_recalls": ["<campaign>", ...],
  "flowchart": [
    {"step": 1, "instruction": "<what to do>", "check": "<yes/no question>", "if_yes": "<step N or recommendation>", "if_no": "<step N or recommendation>"},
    ...
  ]
}

The flowchart must contain at least one step and walk the owner from the easiest observable check to a final recommendation. Use empty arrays when nothing applies. Never invent recall campaigns."#;

/// Configuration for the HTTP reasoning oracle endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    /// Chat API base URL.
    #[serde(default = "default_host")]
    pub host: String,
    /// Model to use for inference.
    #[serde(default = "default_model")]
    pub model: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "llama3:8b".into()
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Chat API request body.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    format: &'a str,
    stream: bool,
}

/// A single message in the chat request.
#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Chat API response (only fields we need).
#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Client for an Ollama-style chat endpoint.
pub struct HttpOracle {
    client: reqwest::Client,
    config: OracleConfig,
}

impl HttpOracle {
    pub fn new(config: OracleConfig) -> EngineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::AnalysisUnavailable(format!("http client build: {e}")))?;
        Ok(Self { client, config })
    }

    fn system_prompt(kind: PromptKind) -> &'static str {
        match kind {
            PromptKind::DtcAnalysis => DTC_ANALYSIS_PROMPT,
            PromptKind::SymptomTriage => SYMPTOM_TRIAGE_PROMPT,
        }
    }
}

#[async_trait]
impl ReasoningOracle for HttpOracle {
    async fn infer(
        &self,
        kind: PromptKind,
        input: &serde_json::Value,
    ) -> EngineResult<serde_json::Value> {
        let url = format!("{}/api/chat", self.config.host);
        let user_content = input.to_string();

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: Self::system_prompt(kind),
                },
                ChatMessage {
                    role: "user",
                    content: &user_content,
                },
            ],
            format: "json",
            stream: false,
        };

        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            tracing::warn!(error = %e, kind = ?kind, "oracle request failed");
            EngineError::AnalysisUnavailable(format!("oracle request failed: {e}"))
        })?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), kind = ?kind, "oracle returned non-200");
            return Err(EngineError::AnalysisUnavailable(format!(
                "oracle returned {}",
                response.status()
            )));
        }

        let chat_resp: ChatResponse = response.json().await.map_err(|e| {
            tracing::warn!(error = %e, "failed to parse oracle response body");
            EngineError::AnalysisUnavailable(format!("bad oracle response body: {e}"))
        })?;

        let content = chat_resp
            .message
            .map(|m| m.content)
            .ok_or_else(|| EngineError::AnalysisUnavailable("oracle returned no message".into()))?;

        let json_str = extract_json(&content);
        serde_json::from_str(json_str).map_err(|e| {
            tracing::warn!(error = %e, content = %content, "oracle returned invalid JSON");
            EngineError::AnalysisUnavailable(format!("oracle returned invalid JSON: {e}"))
        })
    }
}

/// Extract JSON from LLM output that may be wrapped in markdown code blocks.
fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();

    // Try ```json ... ``` first
    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }

    // Try ``` ... ```
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }

    // Assume raw JSON
    trimmed
}

/// Deterministic oracle for tests: per-kind canned responses, an optional
/// FIFO override queue, failure injection, and recorded calls.
#[derive(Default)]
pub struct ScriptedOracle {
    canned: Mutex<HashMap<PromptKind, serde_json::Value>>,
    queue: Mutex<Vec<serde_json::Value>>,
    fail: AtomicBool,
    calls: AtomicU64,
    inputs: Mutex<Vec<(PromptKind, serde_json::Value)>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the response returned for every call of `kind`.
    pub fn set_response(&self, kind: PromptKind, response: serde_json::Value) {
        self.canned.lock().unwrap().insert(kind, response);
    }

    /// Queue a one-shot response consumed before any canned response.
    pub fn queue_response(&self, response: serde_json::Value) {
        self.queue.lock().unwrap().push(response);
    }

    /// Make every subsequent call fail.
    pub fn fail_always(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Total `infer` calls observed.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Copies of every `(kind, input)` passed to `infer`.
    pub fn inputs(&self) -> Vec<(PromptKind, serde_json::Value)> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningOracle for ScriptedOracle {
    async fn infer(
        &self,
        kind: PromptKind,
        input: &serde_json::Value,
    ) -> EngineResult<serde_json::Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().push((kind, input.clone()));

        if self.fail.load(Ordering::SeqCst) {
            return Err(EngineError::AnalysisUnavailable("scripted failure".into()));
        }

        let mut queue = self.queue.lock().unwrap();
        if !queue.is_empty() {
            return Ok(queue.remove(0));
        }
        drop(queue);

        self.canned
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .ok_or_else(|| {
                EngineError::AnalysisUnavailable(format!("no scripted response for {kind:?}"))
            })
    }
}
