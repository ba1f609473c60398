//! Text-generation service clients.
//!
//! The pipeline only needs "prompt in, text out", so the seam is a small
//! blocking trait. [`OpenAiClient`] talks to any OpenAI-compatible
//! chat-completions endpoint; [`StaticClient`] and [`FnClient`] serve
//! canned answers for tests and offline use.

use super::config::ErinConfig;
use crate::error::GenerationError;
use parking_lot::Mutex;
use serde_json::json;
use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, error, info};

pub trait GenerationClient: Send + Sync {
    /// Send one prompt and return the completion text.
    fn complete(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String, GenerationError>;
}

/// Call `client` and reject blank completions, whatever the client reported.
pub fn complete_non_empty(
    client: &dyn GenerationClient,
    prompt: &str,
    system_prompt: Option<&str>,
) -> Result<String, GenerationError> {
    let text = client.complete(prompt, system_prompt)?;
    if text.trim().is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    Ok(text)
}

static SHARED_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Process-wide runtime for HTTP calls. It is never dropped, so clients can
/// be created and dropped from inside async code.
fn shared_runtime() -> Result<&'static Runtime, GenerationError> {
    if let Some(runtime) = SHARED_RUNTIME.get() {
        return Ok(runtime);
    }
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .map_err(|e| GenerationError::Configuration(e.to_string()))?;
    if let Err(extra) = SHARED_RUNTIME.set(runtime) {
        // Lost the race to another thread.
        extra.shutdown_background();
    }
    SHARED_RUNTIME
        .get()
        .ok_or_else(|| GenerationError::Configuration("runtime unavailable".to_string()))
}

/// Chat-completions client on a shared runtime, so callers stay synchronous.
pub struct OpenAiClient {
    config: ErinConfig,
    http: reqwest::Client,
    runtime: &'static Runtime,
}

impl OpenAiClient {
    pub fn new(config: ErinConfig) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| GenerationError::Configuration(e.to_string()))?;
        let runtime = shared_runtime()?;
        info!(
            "🌐 [Client] Using {} with model {}",
            config.base_url, config.model
        );
        Ok(OpenAiClient {
            config,
            http,
            runtime,
        })
    }

    pub fn from_env() -> Result<Self, GenerationError> {
        Self::new(ErinConfig::from_env())
    }

    pub fn config(&self) -> &ErinConfig {
        &self.config
    }

    /// Block on `fut`, hopping to a helper thread when already inside a runtime.
    fn block_on<F>(&self, fut: F) -> Result<String, GenerationError>
    where
        F: Future<Output = Result<String, GenerationError>> + Send,
    {
        if tokio::runtime::Handle::try_current().is_err() {
            return self.runtime.block_on(fut);
        }
        let runtime = self.runtime;
        std::thread::scope(|scope| {
            scope
                .spawn(move || runtime.block_on(fut))
                .join()
                .unwrap_or_else(|_| {
                    Err(GenerationError::Network("request thread panicked".to_string()))
                })
        })
    }

    async fn request(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String, GenerationError> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            GenerationError::Configuration("OPENAI_API_KEY is not set".to_string())
        })?;

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": prompt}));
        let body = json!({
            "model": self.config.model,
            "messages": messages,
        });

        let resp = self
            .http
            .post(self.config.chat_completions_url())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let text: String = text.chars().take(500).collect();
            return Err(match status.as_u16() {
                401 | 403 => GenerationError::Authentication(text),
                code => GenerationError::Service { status: code, body: text },
            });
        }

        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;
        parse_completion(&payload)
    }
}

impl GenerationClient for OpenAiClient {
    fn complete(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String, GenerationError> {
        debug!("🌐 [Client] Sending prompt ({} chars)", prompt.len());
        let result = self.block_on(self.request(prompt, system_prompt));
        match &result {
            Ok(text) => debug!("🌐 [Client] Received {} chars", text.len()),
            Err(e) => error!("❌ [Client] Request failed: {}", e),
        }
        result
    }
}

/// Pull `choices[0].message.content` out of a chat-completions response.
fn parse_completion(payload: &serde_json::Value) -> Result<String, GenerationError> {
    let content = payload
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"));
    match content {
        Some(serde_json::Value::String(text)) if text.trim().is_empty() => {
            Err(GenerationError::EmptyResponse)
        }
        Some(serde_json::Value::String(text)) => Ok(text.clone()),
        Some(serde_json::Value::Null) => Err(GenerationError::EmptyResponse),
        _ => Err(GenerationError::InvalidResponse(
            "missing choices[0].message.content".to_string(),
        )),
    }
}

/// Replays fixed completions in order, repeating the last one, and records
/// every prompt it was sent.
pub struct StaticClient {
    responses: Vec<Result<String, GenerationError>>,
    prompts: Mutex<Vec<String>>,
}

impl StaticClient {
    pub fn new(response: impl Into<String>) -> Self {
        Self::sequence(vec![response.into()])
    }

    pub fn sequence(responses: Vec<String>) -> Self {
        StaticClient {
            responses: responses.into_iter().map(Ok).collect(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: GenerationError) -> Self {
        StaticClient {
            responses: vec![Err(error)],
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }
}

impl GenerationClient for StaticClient {
    fn complete(&self, prompt: &str, _system_prompt: Option<&str>) -> Result<String, GenerationError> {
        let mut prompts = self.prompts.lock();
        let index = prompts.len().min(self.responses.len().saturating_sub(1));
        prompts.push(prompt.to_string());
        self.responses
            .get(index)
            .cloned()
            .unwrap_or(Err(GenerationError::EmptyResponse))
    }
}

type CompleteFn = dyn Fn(&str, Option<&str>) -> Result<String, GenerationError> + Send + Sync;

/// Adapts a closure into a client.
pub struct FnClient {
    func: Box<CompleteFn>,
}

impl FnClient {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&str, Option<&str>) -> Result<String, GenerationError> + Send + Sync + 'static,
    {
        FnClient {
            func: Box::new(func),
        }
    }
}

impl GenerationClient for FnClient {
    fn complete(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String, GenerationError> {
        (self.func)(prompt, system_prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion() {
        let ok = json!({"choices": [{"message": {"role": "assistant", "content": "def f(): pass"}}]});
        assert_eq!(parse_completion(&ok).unwrap(), "def f(): pass");

        let blank = json!({"choices": [{"message": {"content": "  \n"}}]});
        assert_eq!(parse_completion(&blank), Err(GenerationError::EmptyResponse));

        let null = json!({"choices": [{"message": {"content": null}}]});
        assert_eq!(parse_completion(&null), Err(GenerationError::EmptyResponse));

        let junk = json!({"error": "nope"});
        assert!(matches!(parse_completion(&junk), Err(GenerationError::InvalidResponse(_))));
    }

    #[test]
    fn test_static_client_sequence_and_recording() {
        let client = StaticClient::sequence(vec!["one".into(), "two".into()]);
        assert_eq!(client.complete("a", None).unwrap(), "one");
        assert_eq!(client.complete("b", None).unwrap(), "two");
        assert_eq!(client.complete("c", None).unwrap(), "two");
        assert_eq!(client.prompts(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_blank_completion_is_an_error() {
        let client = FnClient::new(|_, _| Ok("   ".to_string()));
        assert_eq!(
            complete_non_empty(&client, "p", None),
            Err(GenerationError::EmptyResponse)
        );
    }

    #[tokio::test]
    async fn test_client_lives_and_dies_inside_async_code() {
        let config = ErinConfig::default()
            .with_api_key("sk-test")
            .with_base_url("http://127.0.0.1:9");
        let client = OpenAiClient::new(config).unwrap();
        assert!(matches!(
            client.complete("hello", None),
            Err(GenerationError::Network(_))
        ));
        drop(client);

        let erin = crate::Erin::new(std::sync::Arc::new(
            OpenAiClient::new(ErinConfig::default()).unwrap(),
        ));
        assert!(erin.call("f", vec![]).is_err());
        drop(erin);
    }

    #[test]
    fn test_missing_api_key_is_configuration_error() {
        let client = OpenAiClient::new(ErinConfig::default()).unwrap();
        assert!(matches!(
            client.complete("hello", None),
            Err(GenerationError::Configuration(_))
        ));
    }
}
