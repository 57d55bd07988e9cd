//! OpenAI-compatible chat-completions transport for the [`Oracle`] trait.

use std::time::Duration;

use anyhow::{Result, anyhow};
use minijinja::{Environment, context};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::core::budget::attempt_timeout;
use crate::core::types::TransformResult;
use crate::io::config::OracleConfig;
use crate::io::oracle::{Oracle, OracleError, OracleRequest};

const SYSTEM_PROMPT: &str = "You are a code cleanup engine. Execute one cleanup task across multiple files. Return strict JSON with keys: changed, summary, files. files is an array of {path, content} for modified files only.";
const TASK_TEMPLATE: &str = include_str!("prompts/oracle_task.md");

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct CleanupOutput {
    #[serde(default)]
    changed: bool,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    files: Vec<CleanupOutputFile>,
}

#[derive(Debug, Deserialize)]
struct CleanupOutputFile {
    path: String,
    #[serde(default)]
    content: String,
}

/// Blocking HTTP oracle.
pub struct HttpOracle {
    client: Client,
    api_url: String,
    model: String,
    api_key: String,
    request_timeout: Duration,
    error_preview_bytes: usize,
    prompts: Environment<'static>,
}

impl HttpOracle {
    pub fn new(
        api_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        request_timeout: Duration,
        error_preview_bytes: usize,
    ) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|err| anyhow!("build http client: {err}"))?;
        let mut prompts = Environment::new();
        prompts.add_template("oracle_task", TASK_TEMPLATE)?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            model: model.into(),
            api_key: api_key.into(),
            request_timeout,
            error_preview_bytes,
            prompts,
        })
    }

    /// Build from config, reading the bearer token from `api_key_env`.
    pub fn from_config(cfg: &OracleConfig) -> Result<Self> {
        let env_name = cfg.api_key_env.trim();
        let api_key = std::env::var(env_name)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| anyhow!("missing oracle API key; set {env_name}"))?;
        Self::new(
            cfg.api_url.trim(),
            cfg.model.trim(),
            api_key,
            Duration::from_secs(cfg.request_timeout_secs),
            cfg.error_preview_bytes,
        )
    }

    fn render_prompt(&self, request: &OracleRequest<'_>) -> Result<String, OracleError> {
        let template = self
            .prompts
            .get_template("oracle_task")
            .map_err(|err| OracleError::Request(err.to_string()))?;
        template
            .render(context! {
                safety => request.safety.label(),
                task_json => to_json(request.task)?,
                rules_json => to_json(request.rules)?,
                files_json => to_json(request.files)?,
            })
            .map_err(|err| OracleError::Request(err.to_string()))
    }
}

impl Oracle for HttpOracle {
    #[instrument(skip_all, fields(task_id = %request.task.id, files = request.files.len()))]
    fn transform(&self, request: &OracleRequest<'_>) -> Result<TransformResult, OracleError> {
        let timeout = attempt_timeout(self.request_timeout, request.deadline)
            .ok_or(OracleError::DeadlineExceeded)?;
        let prompt = self.render_prompt(request)?;
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        debug!(timeout_ms = timeout.as_millis() as u64, "posting chat completion");
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&body)
            .send()
            .map_err(transport_error)?;
        let status = response.status();
        let text = response.text().map_err(transport_error)?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "oracle returned non-success status");
            return Err(status_error(status, &text, self.error_preview_bytes));
        }
        interpret_completion(&text)
    }
}

fn transport_error(err: reqwest::Error) -> OracleError {
    let timeout_or_connect = err.is_timeout() || err.is_connect();
    OracleError::transport(format!("{err:#}"), timeout_or_connect)
}

/// Fold a non-2xx response into an error with a bounded body preview.
pub fn status_error(status: StatusCode, body: &str, preview_bytes: usize) -> OracleError {
    let trimmed = body.trim();
    let body = if trimmed.is_empty() {
        status.canonical_reason().unwrap_or("unknown status").to_string()
    } else {
        preview(trimmed, preview_bytes)
    };
    OracleError::Status {
        status: status.as_u16(),
        body,
    }
}

/// Truncate to at most `max_bytes` on a char boundary, appending `...` when cut.
pub fn preview(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Interpret a chat-completion envelope into a transform result.
pub fn interpret_completion(body: &str) -> Result<TransformResult, OracleError> {
    let envelope: ChatResponse = serde_json::from_str(body)
        .map_err(|err| OracleError::Parse(format!("decode completion envelope: {err}")))?;
    if let Some(error) = envelope.error {
        return Err(OracleError::Api(error.message));
    }
    let content = envelope
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| OracleError::Api("response contained no choices".to_string()))?
        .message
        .content
        .unwrap_or_default();
    interpret_output(content.trim())
}

/// Parse the strict `{changed, summary, files}` payload.
pub fn interpret_output(content: &str) -> Result<TransformResult, OracleError> {
    let output: CleanupOutput = serde_json::from_str(content)
        .map_err(|err| OracleError::Parse(format!("decode cleanup output: {err}")))?;
    let changed_files = output
        .files
        .into_iter()
        .filter_map(|file| {
            let path = file.path.trim();
            (!path.is_empty()).then(|| (path.to_string(), file.content))
        })
        .collect();
    Ok(TransformResult {
        changed: output.changed,
        summary: output.summary.trim().to_string(),
        changed_files,
    })
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, OracleError> {
    serde_json::to_string(value).map_err(|err| OracleError::Request(err.to_string()))
}
