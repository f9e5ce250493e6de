//! Configuration types for petition rewriting and formatting.
//!
//! Rewriting behaviour is controlled through [`RewriterConfig`], built via
//! its [`RewriterConfigBuilder`]; DOCX typography through [`FormatterConfig`].
//! Keeping every knob in one struct makes it trivial to share configs across
//! requests, log them, and diff two runs to understand why their costs differ.

use crate::error::PetitionError;
use crate::progress::RewriteProgressCallback;
use crate::prompts::FALLBACK_MARKER;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default trigger keywords for the high tier: facts, legal grounds, requests.
pub const DEFAULT_HIGH_TIER_KEYWORDS: [&str; 3] = ["FATOS", "FUNDAMENTAÇÃO", "PEDIDOS"];

/// Default footer printed on every page.
pub const DEFAULT_FOOTER: &str =
    "IBOTI ADVOCACIA – OAB/RS 65.382 | www.ibotiadvogados.com.br | (51) 98418-2882";

// ── Tiers ────────────────────────────────────────────────────────────────

/// Cost/quality level of the model used for one paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewriteTier {
    /// Cheap model for captions, addresses and boilerplate. (default)
    #[default]
    Standard,
    /// Expensive model for the legally substantive sections.
    High,
}

/// Model identifier and USD rates (per 1 000 tokens) for one tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierProfile {
    pub model: String,
    pub input_rate_per_1k: f64,
    pub output_rate_per_1k: f64,
}

impl TierProfile {
    pub fn new(model: impl Into<String>, input_rate_per_1k: f64, output_rate_per_1k: f64) -> Self {
        Self {
            model: model.into(),
            input_rate_per_1k,
            output_rate_per_1k,
        }
    }

    /// `gpt-3.5-turbo` at $0.0005 / $0.0015 per 1K tokens.
    pub fn standard_default() -> Self {
        Self::new("gpt-3.5-turbo", 0.0005, 0.0015)
    }

    /// `gpt-4` at $0.01 / $0.03 per 1K tokens.
    pub fn high_default() -> Self {
        Self::new("gpt-4", 0.01, 0.03)
    }
}

// ── Rewriter ─────────────────────────────────────────────────────────────

/// Configuration for the section-aware rewriter.
///
/// # Example
/// ```rust
/// use edgequake_petition::RewriterConfig;
///
/// let config = RewriterConfig::builder()
///     .temperature(0.4)
///     .api_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.high.model, "gpt-4");
/// ```
#[derive(Clone)]
pub struct RewriterConfig {
    /// Model and rates for paragraphs outside the trigger sections.
    pub standard: TierProfile,

    /// Model and rates for paragraphs inside a trigger section.
    pub high: TierProfile,

    /// Case-sensitive substrings of the current section name that select the
    /// high tier. Any match wins.
    pub high_tier_keywords: Vec<String>,

    /// Sampling temperature. Default: 0.4.
    ///
    /// Low enough to keep the legal register stable between runs, high
    /// enough that the model actually rephrases instead of copying.
    pub temperature: f32,

    /// Prefix of the degraded paragraph when a completion fails. Default: `"[ERRO IA]"`.
    pub fallback_marker: String,

    /// Overrides the first line of the rewrite prompt (the role framing).
    pub role_prompt: Option<String>,

    /// Maximum retry attempts per paragraph. Default: 0 (one attempt).
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-completion timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Optional progress events.
    pub progress_callback: Option<Arc<dyn RewriteProgressCallback>>,
}

impl Default for RewriterConfig {
    fn default() -> Self {
        Self {
            standard: TierProfile::standard_default(),
            high: TierProfile::high_default(),
            high_tier_keywords: DEFAULT_HIGH_TIER_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            temperature: 0.4,
            fallback_marker: FALLBACK_MARKER.to_string(),
            role_prompt: None,
            max_retries: 0,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RewriterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewriterConfig")
            .field("standard", &self.standard)
            .field("high", &self.high)
            .field("high_tier_keywords", &self.high_tier_keywords)
            .field("temperature", &self.temperature)
            .field("fallback_marker", &self.fallback_marker)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn RewriteProgressCallback>"),
            )
            .finish()
    }
}

impl RewriterConfig {
    /// Create a new builder for `RewriterConfig`.
    pub fn builder() -> RewriterConfigBuilder {
        RewriterConfigBuilder {
            config: Self::default(),
        }
    }

    /// Tier for a paragraph written under `section`.
    pub fn tier_for(&self, section: &str) -> RewriteTier {
        if self
            .high_tier_keywords
            .iter()
            .any(|k| !k.is_empty() && section.contains(k.as_str()))
        {
            RewriteTier::High
        } else {
            RewriteTier::Standard
        }
    }

    pub fn profile(&self, tier: RewriteTier) -> &TierProfile {
        match tier {
            RewriteTier::Standard => &self.standard,
            RewriteTier::High => &self.high,
        }
    }
}

/// Builder for [`RewriterConfig`].
pub struct RewriterConfigBuilder {
    config: RewriterConfig,
}

impl RewriterConfigBuilder {
    pub fn standard(mut self, profile: TierProfile) -> Self {
        self.config.standard = profile;
        self
    }

    pub fn high(mut self, profile: TierProfile) -> Self {
        self.config.high = profile;
        self
    }

    pub fn standard_model(mut self, model: impl Into<String>) -> Self {
        self.config.standard.model = model.into();
        self
    }

    pub fn high_model(mut self, model: impl Into<String>) -> Self {
        self.config.high.model = model.into();
        self
    }

    pub fn high_tier_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.high_tier_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn fallback_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.fallback_marker = marker.into();
        self
    }

    pub fn role_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.role_prompt = Some(prompt.into());
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn RewriteProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RewriterConfig, PetitionError> {
        let c = &self.config;
        for (name, p) in [("standard", &c.standard), ("high", &c.high)] {
            if p.model.trim().is_empty() {
                return Err(PetitionError::InvalidConfig(format!(
                    "{name} tier model must not be empty"
                )));
            }
            if !(p.input_rate_per_1k >= 0.0 && p.output_rate_per_1k >= 0.0) {
                return Err(PetitionError::InvalidConfig(format!(
                    "{name} tier rates must be non-negative, got {}/{}",
                    p.input_rate_per_1k, p.output_rate_per_1k
                )));
            }
        }
        if c.api_timeout_secs == 0 {
            return Err(PetitionError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Formatter ────────────────────────────────────────────────────────────

/// Typography and page furniture for the generated DOCX.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatterConfig {
    /// Font family for every run. Default: Times New Roman.
    pub font_family: String,
    /// Heading size in points. Default: 14.
    pub heading_size_pt: u32,
    /// Body size in points. Default: 12.
    pub body_size_pt: u32,
    /// Centered footer text on every page.
    pub footer_text: String,
    /// Header image width in inches; height follows the aspect ratio. Default: 6.
    pub header_image_width_in: f64,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            font_family: "Times New Roman".to_string(),
            heading_size_pt: 14,
            body_size_pt: 12,
            footer_text: DEFAULT_FOOTER.to_string(),
            header_image_width_in: 6.0,
        }
    }
}
