/// LLM Client — the single point of entry for all model calls in the planner.
///
/// No other module talks to the model service directly. Callers depend on the
/// [`PlanModel`] trait so the pipeline can be exercised without the network.
///
/// The client speaks the OpenAI-compatible chat completions API and always
/// requests a JSON-object reply. Exactly one attempt is made per call.
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ModelConfig;

pub mod prompts;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid JSON response from AI: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub total_tokens: u32,
}

impl ChatResponse {
    /// Text of the first choice, if any.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|t| !t.trim().is_empty())
    }

    pub fn total_tokens(&self) -> u32 {
        self.usage.as_ref().map_or(0, |u| u.total_tokens)
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// A successful model call: the raw reply, its decoded JSON, and usage.
#[derive(Debug, Clone)]
pub struct ModelReply {
    pub raw_text: String,
    pub document: Value,
    pub tokens_used: u32,
    pub elapsed: Duration,
}

/// A failed model call. Token usage is always reported as zero.
#[derive(Debug)]
pub struct InvokeFailure {
    pub error: LlmError,
    pub elapsed: Duration,
}

pub type InvokeOutcome = Result<ModelReply, InvokeFailure>;

/// Anything that can turn a prompt into a JSON document.
///
/// Implementations never panic or propagate: every failure comes back as an
/// [`InvokeFailure`] carrying the time spent so far.
#[async_trait]
pub trait PlanModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete_json(&self, prompt: &str) -> InvokeOutcome;
}

/// The model client used by the planning pipeline.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    config: ModelConfig,
}

impl LlmClient {
    pub fn new(config: ModelConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Makes one raw call to the chat completions endpoint.
    pub async fn call(&self, prompt: &str) -> Result<ChatResponse, LlmError> {
        let request_body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.config.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Model API returned {}: {}", status, body);
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let chat: ChatResponse = response.json().await?;
        debug!("Model call succeeded: total_tokens={}", chat.total_tokens());
        Ok(chat)
    }

    async fn call_json(&self, prompt: &str) -> Result<(String, Value, u32), LlmError> {
        let response = self.call(prompt).await?;
        let text = response.text().ok_or(LlmError::EmptyContent)?;
        let document = serde_json::from_str(strip_json_fences(text))?;
        Ok((text.to_string(), document, response.total_tokens()))
    }
}

#[async_trait]
impl PlanModel for LlmClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn complete_json(&self, prompt: &str) -> InvokeOutcome {
        let started = Instant::now();
        match self.call_json(prompt).await {
            Ok((raw_text, document, tokens_used)) => Ok(ModelReply {
                raw_text,
                document,
                tokens_used,
                elapsed: started.elapsed(),
            }),
            Err(error) => {
                warn!("Model call failed after {:?}: {error}", started.elapsed());
                Err(InvokeFailure {
                    error,
                    elapsed: started.elapsed(),
                })
            }
        }
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    enum Script {
        Reply(Value, u32),
        RawText(String),
        NetworkError,
    }

    /// `PlanModel` double that answers every call the same way and counts calls.
    pub struct ScriptedModel {
        script: Script,
        calls: AtomicUsize,
        prompts: std::sync::Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(script: Script) -> Self {
            Self {
                script,
                calls: AtomicUsize::new(0),
                prompts: std::sync::Mutex::new(Vec::new()),
            }
        }

        pub fn replying(document: Value, tokens_used: u32) -> Self {
            Self::new(Script::Reply(document, tokens_used))
        }

        /// Replies with text that is not JSON.
        pub fn replying_text(text: &str) -> Self {
            Self::new(Script::RawText(text.to_string()))
        }

        pub fn network_error() -> Self {
            Self::new(Script::NetworkError)
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn last_prompt(&self) -> Option<String> {
            self.prompts.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl PlanModel for ScriptedModel {
        fn model_name(&self) -> &str {
            "scripted-model"
        }

        async fn complete_json(&self, prompt: &str) -> InvokeOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            let elapsed = Duration::from_millis(25);
            match &self.script {
                Script::Reply(document, tokens_used) => Ok(ModelReply {
                    raw_text: document.to_string(),
                    document: document.clone(),
                    tokens_used: *tokens_used,
                    elapsed,
                }),
                Script::RawText(text) => Err(InvokeFailure {
                    error: serde_json::from_str::<Value>(text)
                        .err()
                        .map(LlmError::Parse)
                        .unwrap_or(LlmError::EmptyContent),
                    elapsed,
                }),
                Script::NetworkError => {
                    // An unparseable URL yields a genuine reqwest::Error without I/O.
                    let error = Client::new()
                        .get("http://[bad-host")
                        .build()
                        .expect_err("malformed URL must fail to build");
                    Err(InvokeFailure {
                        error: LlmError::Http(error),
                        elapsed,
                    })
                }
            }
        }
    }
}
