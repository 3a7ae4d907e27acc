use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("HTTP {status} client error: {message}")]
    Http4xx { status: u16, message: String },

    #[error("HTTP {status} server error: {message}")]
    Http5xx { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Other error: {0}")]
    Other(String),
}

/// A backend that answers one non-streaming chat request at a time.
///
/// [`OllamaClient`] is the production implementation; the benchmark only
/// depends on this trait so it can be driven by any chat backend.
pub trait ChatClient {
    fn chat(&self, request: ChatRequest) -> impl Future<Output = Result<ChatResponse>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

// Request body for Ollama's native /api/chat endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
        }
    }
}

/// Non-streaming /api/chat response. Durations are in nanoseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub message: Message,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub total_duration: u64,
    #[serde(default)]
    pub load_duration: u64,
    #[serde(default)]
    pub prompt_eval_count: u64,
    #[serde(default)]
    pub prompt_eval_duration: u64,
    #[serde(default)]
    pub eval_count: u64,
    #[serde(default)]
    pub eval_duration: u64,
}

// Installed models, as listed by /api/tags
#[derive(Debug, Clone, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<Model>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Model {
    pub name: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Configuration for creating an Ollama client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the Ollama server, e.g. `http://localhost:11434`
    pub host: String,
    /// Per-request timeout; `None` waits for the server indefinitely
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    host: String,
    timeout: Option<Duration>,
}

impl OllamaClient {
    /// Creates a client for Ollama's native chat API.
    ///
    /// Requests are never retried. A local server with a single loaded model
    /// answers one request at a time, so the pool keeps one idle connection.
    ///
    /// ```no_run
    /// use ollama_bench::client::{ClientConfig, OllamaClient};
    ///
    /// let client = OllamaClient::new(ClientConfig {
    ///     host: "http://localhost:11434".to_string(),
    ///     timeout: None,
    /// })
    /// .unwrap();
    /// ```
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .pool_max_idle_per_host(1)
            .pool_idle_timeout(Duration::from_secs(300))
            .tcp_keepalive(Duration::from_secs(60));

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            host: config.host.trim_end_matches('/').to_string(),
            timeout: config.timeout,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    async fn chat_internal(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/api/chat", self.host);

        let response = match self.client.post(&url).json(request).send().await {
            Ok(resp) => resp,
            Err(e) => return Err(self.transport_error(e).into()),
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            return Err(status_error(status, text).into());
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;

        let completion: ChatResponse =
            serde_json::from_slice(&body).map_err(|e| ClientError::Parse(e.to_string()))?;
        Ok(completion)
    }

    fn transport_error(&self, e: reqwest::Error) -> ClientError {
        if e.is_connect() {
            ClientError::Connection(e.to_string())
        } else if e.is_timeout() {
            ClientError::Timeout(self.timeout.unwrap_or_default())
        } else if e.is_request() {
            let err_msg = e.to_string();
            if err_msg.contains("connection closed")
                || err_msg.contains("connection reset")
                || err_msg.contains("broken pipe")
                || err_msg.contains("connection refused")
            {
                ClientError::Connection(format!("Request error: {}", e))
            } else {
                ClientError::Other(format!("Request error: {}", e))
            }
        } else {
            ClientError::Other(e.to_string())
        }
    }
}

impl ChatClient for OllamaClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        log::debug!(
            "POST {}/api/chat model={} messages={}",
            self.host,
            request.model,
            request.messages.len()
        );
        self.chat_internal(&request).await
    }
}

/// Map a non-success status to a `ClientError`, preferring Ollama's
/// `{"error": "..."}` message over the raw body.
fn status_error(status: u16, body: String) -> ClientError {
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or(body);

    if (400..500).contains(&status) {
        ClientError::Http4xx { status, message }
    } else if (500..600).contains(&status) {
        ClientError::Http5xx { status, message }
    } else {
        ClientError::Other(format!("HTTP {}: {}", status, message))
    }
}

/// Wait for the server to answer `GET /api/tags`.
///
/// Useful when the Ollama container is started together with the benchmark
/// and still loading. Gives up once `total_timeout` has elapsed.
pub async fn check_server_ready(
    host: &str,
    total_timeout: Duration,
    retry_interval: Duration,
) -> Result<()> {
    let start_time = Instant::now();
    let mut attempt = 0;

    log::info!("Waiting for server to be ready at {}...", host);

    loop {
        attempt += 1;

        log::debug!("Server readiness check attempt {}: GET {}/api/tags", attempt, host);

        match tokio::time::timeout(
            Duration::from_secs(10),
            list_models(host, Duration::from_secs(10)),
        )
        .await
        {
            Ok(Ok(models)) => {
                log::info!(
                    "Server is ready ({} model{} installed after {:.1}s)",
                    models.len(),
                    if models.len() == 1 { "" } else { "s" },
                    start_time.elapsed().as_secs_f64()
                );
                return Ok(());
            }
            Ok(Err(e)) => {
                log::debug!("Tags endpoint returned error: {}", e);
            }
            Err(_) => {
                log::debug!("Tags endpoint request timed out");
            }
        }

        let elapsed = start_time.elapsed();
        let remaining = total_timeout.saturating_sub(elapsed);

        if remaining.is_zero() {
            anyhow::bail!(
                "Server readiness timeout after {:.1}s. Server at {} did not become ready.",
                total_timeout.as_secs_f64(),
                host
            );
        }

        if attempt % 6 == 0 {
            log::info!(
                "Still waiting for server (elapsed: {:.0}s, timeout: {:.0}s)...",
                elapsed.as_secs_f64(),
                total_timeout.as_secs_f64()
            );
        }

        tokio::time::sleep(retry_interval.min(remaining)).await;
    }
}

/// List the models installed on the server.
pub async fn list_models(host: &str, timeout: Duration) -> Result<Vec<Model>> {
    let client = Client::builder().timeout(timeout).build()?;

    let url = format!("{}/api/tags", host.trim_end_matches('/'));

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to query tags endpoint: {}", e))?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response".to_string());
        anyhow::bail!("Tags endpoint returned {}: {}", status, text);
    }

    let tags: TagsResponse = response
        .json()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to parse tags response: {}", e))?;

    Ok(tags.models)
}
