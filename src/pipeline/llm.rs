//! Text-completion seam: one user message in, rewritten text out.
//!
//! The rewriter only ever talks to [`CompletionProvider`], so tests can inject
//! a stub and production can route to any `edgequake-llm` backend through
//! [`LlmCompletion`]. Retry, backoff and timeout handling live here, not in
//! the rewriter, so the section/cost bookkeeping stays free of I/O concerns.
//!
//! ## Retry Strategy
//!
//! Exponential backoff (`retry_backoff_ms * 2^(attempt-1)`). The default is
//! zero retries: a failing paragraph degrades immediately and the rest of the
//! petition carries on.

use crate::config::RewriterConfig;
use crate::error::{CompletionError, PetitionError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// One rewrite call: model, single user message, temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f32,
}

/// Anything that can turn a prompt into generated text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

/// Run `request` against `provider`, honouring the timeout and retry policy
/// in `config`. Returns the trimmed completion.
pub async fn complete_with_retry(
    provider: &dyn CompletionProvider,
    request: &CompletionRequest,
    config: &RewriterConfig,
) -> Result<String, CompletionError> {
    let mut last_err: Option<CompletionError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config
                .retry_backoff_ms
                .saturating_mul(2u64.saturating_pow(attempt - 1));
            warn!(
                "model {}: retry {}/{} after {}ms",
                request.model, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let call = provider.complete(request);
        let result = match timeout(Duration::from_secs(config.api_timeout_secs), call).await {
            Ok(r) => r,
            Err(_) => Err(CompletionError::Timeout {
                model: request.model.clone(),
                secs: config.api_timeout_secs,
            }),
        };

        match result {
            Ok(content) => {
                let text = content.trim();
                if text.is_empty() {
                    warn!("model {}: attempt {} returned no text", request.model, attempt + 1);
                    last_err = Some(CompletionError::EmptyResponse {
                        model: request.model.clone(),
                    });
                    continue;
                }
                return Ok(text.to_string());
            }
            Err(e) => {
                warn!("model {}: attempt {} failed: {}", request.model, attempt + 1, e);
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| CompletionError::Provider {
        model: request.model.clone(),
        detail: "Unknown error".to_string(),
    }))
}

// ── edgequake-llm adapter ────────────────────────────────────────────────

/// Routes completion requests to `edgequake-llm` providers, one per model id.
///
/// Providers are created lazily with [`ProviderFactory::create_llm_provider`]
/// the first time a model is requested and reused afterwards, so a petition
/// that mixes tiers builds at most two clients.
pub struct LlmCompletion {
    provider_name: String,
    providers: Mutex<HashMap<String, Arc<dyn LLMProvider>>>,
}

impl LlmCompletion {
    /// Use the named provider (`"openai"`, `"anthropic"`, …).
    pub fn new(provider_name: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            providers: Mutex::new(HashMap::new()),
        }
    }

    /// Pick the provider from the environment.
    ///
    /// 1. `provider_name` if given.
    /// 2. `EDGEQUAKE_LLM_PROVIDER`.
    /// 3. `openai` when `OPENAI_API_KEY` is set.
    /// 4. Whatever [`ProviderFactory::from_env`] detects (Anthropic, Gemini,
    ///    Ollama, …). Only its provider name is kept; tier models are still
    ///    created per model id.
    pub fn from_env(provider_name: Option<&str>) -> Result<Self, PetitionError> {
        let name = resolve_provider_name(
            provider_name,
            |var| std::env::var(var).ok(),
            || {
                ProviderFactory::from_env()
                    .map(|(llm, _embedding)| llm.name().to_string())
                    .map_err(|e| e.to_string())
            },
        )?;
        Ok(Self::new(name))
    }

    /// Register a pre-built provider for `model`, bypassing the factory.
    pub fn with_provider(self, model: impl Into<String>, provider: Arc<dyn LLMProvider>) -> Self {
        self.lock().insert(model.into(), provider);
        self
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<dyn LLMProvider>>> {
        self.providers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn provider_for(&self, model: &str) -> Result<Arc<dyn LLMProvider>, CompletionError> {
        let mut providers = self.lock();
        if let Some(p) = providers.get(model) {
            return Ok(Arc::clone(p));
        }
        let provider = ProviderFactory::create_llm_provider(&self.provider_name, model).map_err(
            |e| CompletionError::Provider {
                model: model.to_string(),
                detail: format!("provider '{}' unavailable: {e}", self.provider_name),
            },
        )?;
        debug!("created {} provider for model {}", self.provider_name, model);
        providers.insert(model.to_string(), Arc::clone(&provider));
        Ok(provider)
    }
}

#[async_trait]
impl CompletionProvider for LlmCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let provider = self.provider_for(&request.model)?;
        let messages = vec![ChatMessage::user(request.prompt.as_str())];
        let options = build_options(request);

        let response = provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| CompletionError::Provider {
                model: request.model.clone(),
                detail: e.to_string(),
            })?;

        debug!(
            "model {}: {} prompt tokens, {} completion tokens (provider-reported)",
            request.model, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Provider-name fallback chain behind [`LlmCompletion::from_env`].
///
/// `env` looks up a variable; `detect` runs full auto-detection and is only
/// called when nothing more specific is set.
fn resolve_provider_name(
    explicit: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
    detect: impl FnOnce() -> Result<String, String>,
) -> Result<String, PetitionError> {
    if let Some(name) = explicit.filter(|n| !n.is_empty()) {
        return Ok(name.to_string());
    }
    if let Some(name) = env("EDGEQUAKE_LLM_PROVIDER").filter(|n| !n.is_empty()) {
        return Ok(name);
    }
    if env("OPENAI_API_KEY").is_some_and(|k| !k.is_empty()) {
        return Ok("openai".to_string());
    }

    let name = detect().map_err(|e| PetitionError::ProviderNotConfigured {
        provider: "auto".to_string(),
        hint: format!(
            "No LLM provider could be auto-detected from environment.\n\
             Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or EDGEQUAKE_LLM_PROVIDER.\n\
             Error: {e}"
        ),
    })?;
    let name = name.to_lowercase();
    debug!("auto-detected LLM provider '{}'", name);
    Ok(name)
}

/// Build `CompletionOptions` for a rewrite request.
fn build_options(request: &CompletionRequest) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(request.temperature),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        calls: AtomicUsize,
        fail_first: usize,
        answer: &'static str,
    }

    #[async_trait]
    impl CompletionProvider for Scripted {
        async fn complete(&self, r: &CompletionRequest) -> Result<String, CompletionError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(CompletionError::Provider {
                    model: r.model.clone(),
                    detail: "503".into(),
                })
            } else {
                Ok(self.answer.to_string())
            }
        }
    }

    struct Hangs;

    #[async_trait]
    impl CompletionProvider for Hangs {
        async fn complete(&self, _r: &CompletionRequest) -> Result<String, CompletionError> {
            sleep(Duration::from_secs(3600)).await;
            Ok("never".into())
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "gpt-4".into(),
            prompt: "p".into(),
            temperature: 0.4,
        }
    }

    #[test]
    fn build_options_uses_request_temperature() {
        let opts = build_options(&request());
        assert_eq!(opts.temperature, Some(0.4));
    }

    #[tokio::test]
    async fn success_is_trimmed() {
        let p = Scripted {
            calls: AtomicUsize::new(0),
            fail_first: 0,
            answer: "  Texto revisado.\n",
        };
        let out = complete_with_retry(&p, &request(), &RewriterConfig::default()).await;
        assert_eq!(out.unwrap(), "Texto revisado.");
    }

    #[tokio::test]
    async fn no_retry_by_default() {
        let p = Scripted {
            calls: AtomicUsize::new(0),
            fail_first: 1,
            answer: "ok",
        };
        let out = complete_with_retry(&p, &request(), &RewriterConfig::default()).await;
        assert!(matches!(out, Err(CompletionError::Provider { .. })));
        assert_eq!(p.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let p = Scripted {
            calls: AtomicUsize::new(0),
            fail_first: 2,
            answer: "ok",
        };
        let config = RewriterConfig::builder()
            .max_retries(2)
            .retry_backoff_ms(1)
            .build()
            .unwrap();
        let out = complete_with_retry(&p, &request(), &config).await;
        assert_eq!(out.unwrap(), "ok");
        assert_eq!(p.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn empty_completion_is_an_error() {
        let p = Scripted {
            calls: AtomicUsize::new(0),
            fail_first: 0,
            answer: "   ",
        };
        let out = complete_with_retry(&p, &request(), &RewriterConfig::default()).await;
        assert_eq!(
            out,
            Err(CompletionError::EmptyResponse {
                model: "gpt-4".into()
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_reported() {
        let config = RewriterConfig::builder().api_timeout_secs(5).build().unwrap();
        let out = complete_with_retry(&Hangs, &request(), &config).await;
        assert_eq!(
            out,
            Err(CompletionError::Timeout {
                model: "gpt-4".into(),
                secs: 5
            })
        );
    }

    #[test]
    fn explicit_provider_name_wins() {
        let c = LlmCompletion::from_env(Some("anthropic")).unwrap();
        assert_eq!(c.provider_name(), "anthropic");
    }

    fn no_detect() -> Result<String, String> {
        panic!("auto-detection must not run")
    }

    #[test]
    fn provider_env_var_before_openai_key() {
        let env = |var: &str| match var {
            "EDGEQUAKE_LLM_PROVIDER" => Some("gemini".to_string()),
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            _ => None,
        };
        assert_eq!(resolve_provider_name(None, env, no_detect).unwrap(), "gemini");
    }

    #[test]
    fn openai_key_selects_openai() {
        let env = |var: &str| (var == "OPENAI_API_KEY").then(|| "sk-test".to_string());
        assert_eq!(resolve_provider_name(None, env, no_detect).unwrap(), "openai");
    }

    #[test]
    fn without_hints_factory_detection_is_used() {
        let env = |var: &str| (var == "EDGEQUAKE_LLM_PROVIDER").then(String::new);
        let name = resolve_provider_name(None, env, || Ok("Anthropic".to_string())).unwrap();
        assert_eq!(name, "anthropic");
    }

    #[test]
    fn failed_detection_is_not_configured() {
        let err = resolve_provider_name(Some(""), |_| None, || Err("no API key found".into()))
            .unwrap_err();
        match err {
            PetitionError::ProviderNotConfigured { provider, hint } => {
                assert_eq!(provider, "auto");
                assert!(hint.contains("ANTHROPIC_API_KEY"));
                assert!(hint.contains("no API key found"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
