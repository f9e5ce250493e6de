//! Result types produced by the rewriter and the end-to-end generator.

use crate::config::RewriteTier;
use crate::error::CompletionError;
use crate::pipeline::classify::ParagraphKind;
use serde::{Deserialize, Serialize};

/// How a body paragraph's rewrite turned out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ParagraphOutcome {
    /// The model answered; the record's text is its trimmed answer.
    Rewritten,
    /// The model failed; the record's text is the fallback marker plus the
    /// original paragraph.
    Degraded { error: CompletionError },
}

/// Per-paragraph details for a body paragraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyRewrite {
    pub tier: RewriteTier,
    pub model: String,
    pub outcome: ParagraphOutcome,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub cost_usd: f64,
}

/// One input paragraph and what the rewriter emitted for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParagraphRecord {
    /// 0-based position in the input sequence.
    pub index: usize,
    pub kind: ParagraphKind,
    /// Section in force when the paragraph was processed (empty = general).
    /// For a section marker this is the marker itself.
    pub section: String,
    /// Emitted text, without the trailing blank line. Empty for blanks.
    pub text: String,
    /// Present only for [`ParagraphKind::Body`].
    pub rewrite: Option<BodyRewrite>,
}

impl ParagraphRecord {
    pub fn is_degraded(&self) -> bool {
        matches!(
            self.rewrite,
            Some(BodyRewrite {
                outcome: ParagraphOutcome::Degraded { .. },
                ..
            })
        )
    }
}

/// Aggregate counters for one rewrite run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewriteStats {
    pub blank_paragraphs: usize,
    pub section_markers: usize,
    pub body_paragraphs: usize,
    pub degraded_paragraphs: usize,
    pub high_tier_paragraphs: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub duration_ms: u64,
}

/// Everything the rewriter produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriteOutput {
    /// Concatenated output, trailing whitespace trimmed.
    pub text: String,
    /// Estimated cost in USD.
    pub total_cost: f64,
    pub paragraphs: Vec<ParagraphRecord>,
    pub stats: RewriteStats,
}

impl RewriteOutput {
    /// Indices of paragraphs that fell back to the degraded marker.
    pub fn degraded_indices(&self) -> Vec<usize> {
        self.paragraphs
            .iter()
            .filter(|p| p.is_degraded())
            .map(|p| p.index)
            .collect()
    }
}

/// Payload returned to the client once a petition is published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetitionResponse {
    /// Generated file name.
    pub arquivo: String,
    /// Public download URL.
    pub url_download: String,
    /// Estimated cost in USD, rounded to 4 decimals.
    pub custo_estimado_usd: f64,
}

impl PetitionResponse {
    pub fn new(arquivo: impl Into<String>, url_download: impl Into<String>, cost: f64) -> Self {
        Self {
            arquivo: arquivo.into(),
            url_download: url_download.into(),
            custo_estimado_usd: round_cost(cost),
        }
    }
}

/// Structured error body: `{"erro": message}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub erro: String,
}

/// Round a USD amount to 4 decimal places.
pub fn round_cost(cost: f64) -> f64 {
    (cost * 10_000.0).round() / 10_000.0
}
