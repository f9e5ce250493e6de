//! Section-aware rewriting with cost accounting.
//!
//! Paragraphs are processed strictly in order, one completion at a time:
//! the current section and the running cost are both order-dependent state,
//! so there is no safe way to fan the calls out without re-deriving each
//! paragraph's section first.
//!
//! ```text
//! blank    ──▶ "\n"                    no call, no cost
//! MARKER   ──▶ "MARKER\n\n"            sets current section, no cost
//! body     ──▶ "<rewritten>\n\n"       one call, one cost increment
//! ```
//!
//! A failed completion never aborts the run. The paragraph is emitted as
//! `"[ERRO IA] <original>"`, recorded as [`ParagraphOutcome::Degraded`], and
//! its cost is still computed from the text actually emitted.

use crate::config::{RewriteTier, RewriterConfig};
use crate::context::Context;
use crate::output::{
    BodyRewrite, ParagraphOutcome, ParagraphRecord, RewriteOutput, RewriteStats,
};
use crate::pipeline::classify::{classify, ParagraphKind};
use crate::pipeline::cost::{completion_cost, CostAccumulator, TokenCounter, WhitespaceTokenCounter};
use crate::pipeline::llm::{complete_with_retry, CompletionProvider, CompletionRequest};
use crate::prompts::{fallback_text, rewrite_prompt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Characters of each rewritten paragraph echoed to the debug log.
const PREVIEW_CHARS: usize = 100;

/// Rewrites petitions paragraph by paragraph.
///
/// Dependencies are injected: the completion provider and token counter are
/// shared (`Arc`) so one `Rewriter` can serve many requests.
#[derive(Clone)]
pub struct Rewriter {
    provider: Arc<dyn CompletionProvider>,
    counter: Arc<dyn TokenCounter>,
    config: RewriterConfig,
}

impl Rewriter {
    /// A rewriter using the whitespace token approximation.
    pub fn new(provider: Arc<dyn CompletionProvider>, config: RewriterConfig) -> Self {
        Self {
            provider,
            counter: Arc::new(WhitespaceTokenCounter),
            config,
        }
    }

    /// Replace the token counter used for cost estimation.
    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    pub fn config(&self) -> &RewriterConfig {
        &self.config
    }

    /// Rewrite `paragraphs` in order under `context`.
    pub async fn rewrite<S: AsRef<str>>(&self, paragraphs: &[S], context: &Context) -> RewriteOutput {
        let start = Instant::now();
        let context_block = context.render();
        let total_body = paragraphs
            .iter()
            .filter(|p| classify(p.as_ref()) == ParagraphKind::Body)
            .count();
        let callback = self.config.progress_callback.as_ref();

        info!(
            "Rewriting {} paragraphs ({} to the model)",
            paragraphs.len(),
            total_body
        );
        if let Some(cb) = callback {
            cb.on_rewrite_start(total_body);
        }

        let mut text = String::new();
        let mut section = String::new();
        let mut cost = CostAccumulator::new();
        let mut records = Vec::with_capacity(paragraphs.len());
        let mut stats = RewriteStats::default();

        for (index, raw) in paragraphs.iter().enumerate() {
            let raw = raw.as_ref();
            let trimmed = raw.trim();

            match classify(raw) {
                ParagraphKind::Blank => {
                    text.push('\n');
                    stats.blank_paragraphs += 1;
                    records.push(ParagraphRecord {
                        index,
                        kind: ParagraphKind::Blank,
                        section: section.clone(),
                        text: String::new(),
                        rewrite: None,
                    });
                }
                ParagraphKind::SectionMarker => {
                    section = trimmed.to_string();
                    text.push_str(trimmed);
                    text.push_str("\n\n");
                    stats.section_markers += 1;
                    debug!("Section: {}", section);
                    records.push(ParagraphRecord {
                        index,
                        kind: ParagraphKind::SectionMarker,
                        section: section.clone(),
                        text: trimmed.to_string(),
                        rewrite: None,
                    });
                }
                ParagraphKind::Body => {
                    if let Some(cb) = callback {
                        cb.on_paragraph_start(index, total_body, &section);
                    }

                    let (rewritten, body) = self
                        .rewrite_body(raw, &section, &context_block)
                        .await;

                    text.push_str(&rewritten);
                    text.push_str("\n\n");
                    cost.add(body.cost_usd);

                    stats.body_paragraphs += 1;
                    stats.total_input_tokens += body.input_tokens as u64;
                    stats.total_output_tokens += body.output_tokens as u64;
                    if body.tier == RewriteTier::High {
                        stats.high_tier_paragraphs += 1;
                    }

                    match &body.outcome {
                        ParagraphOutcome::Rewritten => {
                            if let Some(cb) = callback {
                                cb.on_paragraph_complete(index, total_body, rewritten.len());
                            }
                        }
                        ParagraphOutcome::Degraded { error } => {
                            stats.degraded_paragraphs += 1;
                            if let Some(cb) = callback {
                                cb.on_paragraph_degraded(index, total_body, &error.to_string());
                            }
                        }
                    }

                    records.push(ParagraphRecord {
                        index,
                        kind: ParagraphKind::Body,
                        section: section.clone(),
                        text: rewritten,
                        rewrite: Some(body),
                    });
                }
            }
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        let total_cost = cost.total();

        info!(
            "Rewrite complete: {}/{} paragraphs rewritten, {} degraded, ${:.4} estimated",
            stats.body_paragraphs - stats.degraded_paragraphs,
            stats.body_paragraphs,
            stats.degraded_paragraphs,
            total_cost
        );
        if let Some(cb) = callback {
            cb.on_rewrite_complete(
                total_body,
                stats.body_paragraphs - stats.degraded_paragraphs,
                total_cost,
            );
        }

        RewriteOutput {
            text: text.trim_end().to_string(),
            total_cost,
            paragraphs: records,
            stats,
        }
    }

    /// Rewrite one body paragraph; never fails.
    async fn rewrite_body(
        &self,
        paragraph: &str,
        section: &str,
        context_block: &str,
    ) -> (String, BodyRewrite) {
        let tier = self.config.tier_for(section);
        let profile = self.config.profile(tier);
        let prompt = rewrite_prompt(
            self.config.role_prompt.as_deref(),
            context_block,
            section,
            paragraph,
        );
        let request = CompletionRequest {
            model: profile.model.clone(),
            prompt,
            temperature: self.config.temperature,
        };

        let (rewritten, outcome) =
            match complete_with_retry(self.provider.as_ref(), &request, &self.config).await {
                Ok(text) => {
                    debug!(
                        "[{}] {} → {}…",
                        request.model,
                        section,
                        preview(&text, PREVIEW_CHARS)
                    );
                    (text, ParagraphOutcome::Rewritten)
                }
                Err(error) => {
                    warn!("Paragraph degraded under '{}': {}", section, error);
                    (
                        fallback_text(&self.config.fallback_marker, paragraph),
                        ParagraphOutcome::Degraded { error },
                    )
                }
            };

        let input_tokens = self.counter.count(&request.prompt);
        let output_tokens = self.counter.count(&rewritten);
        let cost_usd = completion_cost(input_tokens, output_tokens, profile);

        let body = BodyRewrite {
            tier,
            model: request.model,
            outcome,
            input_tokens,
            output_tokens,
            cost_usd,
        };
        (rewritten, body)
    }
}

fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompletionError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Returns the paragraph (last prompt block) unchanged and records requests.
    #[derive(Default)]
    struct Echo {
        seen: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl CompletionProvider for Echo {
        async fn complete(&self, r: &CompletionRequest) -> Result<String, CompletionError> {
            self.seen.lock().unwrap().push(r.clone());
            Ok(r.prompt.rsplit("\n\n").next().unwrap_or_default().to_string())
        }
    }

    struct Fixed(&'static str);

    #[async_trait]
    impl CompletionProvider for Fixed {
        async fn complete(&self, _r: &CompletionRequest) -> Result<String, CompletionError> {
            Ok(self.0.to_string())
        }
    }

    fn rewriter(provider: Arc<dyn CompletionProvider>) -> Rewriter {
        Rewriter::new(provider, RewriterConfig::default())
    }

    #[test]
    fn preview_is_char_safe() {
        assert_eq!(preview("ação", 2), "aç");
        assert_eq!(preview("abc", 10), "abc");
    }

    #[tokio::test]
    async fn markers_only_cost_nothing() {
        let r = rewriter(Arc::new(Echo::default()));
        let out = r.rewrite(&["FATOS", "PEDIDOS"], &Context::new()).await;
        assert_eq!(out.text, "FATOS\n\nPEDIDOS");
        assert_eq!(out.total_cost, 0.0);
        assert_eq!(out.stats.section_markers, 2);
    }

    #[tokio::test]
    async fn blanks_cost_nothing_and_never_call_the_model() {
        let echo = Arc::new(Echo::default());
        let r = rewriter(echo.clone());
        let out = r.rewrite(&["", "   ", "\t"], &Context::new()).await;
        assert_eq!(out.total_cost, 0.0);
        assert_eq!(out.stats.blank_paragraphs, 3);
        assert!(echo.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn marker_is_emitted_trimmed() {
        let r = rewriter(Arc::new(Echo::default()));
        let out = r.rewrite(&["  FATOS  "], &Context::new()).await;
        assert_eq!(out.text, "FATOS");
        assert_eq!(out.paragraphs[0].section, "FATOS");
    }

    #[tokio::test]
    async fn section_selects_tier_and_model() {
        let echo = Arc::new(Echo::default());
        let r = rewriter(echo.clone());
        let out = r
            .rewrite(
                &["Preâmbulo.", "DOS FATOS", "Trabalhou cinco anos."],
                &Context::new(),
            )
            .await;

        let seen = echo.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].model, "gpt-3.5-turbo");
        assert!(seen[0].prompt.contains("Seção: Geral"));
        assert_eq!(seen[1].model, "gpt-4");
        assert!(seen[1].prompt.contains("Seção: DOS FATOS"));
        assert!(seen.iter().all(|r| r.temperature == 0.4));

        assert_eq!(out.stats.high_tier_paragraphs, 1);
        let tiers: Vec<_> = out
            .paragraphs
            .iter()
            .filter_map(|p| p.rewrite.as_ref().map(|b| b.tier))
            .collect();
        assert_eq!(tiers, vec![RewriteTier::Standard, RewriteTier::High]);
    }

    #[tokio::test]
    async fn cost_uses_whitespace_counts_of_prompt_and_answer() {
        let r = rewriter(Arc::new(Fixed("um dois três")));
        let ctx: Context = [("reclamante", "Jane")].into_iter().collect();
        let out = r.rewrite(&["Texto simples."], &ctx).await;

        let body = out.paragraphs[0].rewrite.as_ref().unwrap();
        let prompt = rewrite_prompt(None, "reclamante: Jane", "", "Texto simples.");
        assert_eq!(body.input_tokens, prompt.split_whitespace().count());
        assert_eq!(body.output_tokens, 3);
        let expected = body.input_tokens as f64 / 1000.0 * 0.0005 + 3.0 / 1000.0 * 0.0015;
        assert!((out.total_cost - expected).abs() < 1e-15);
    }

    #[tokio::test]
    async fn custom_token_counter_is_used() {
        struct Chars;
        impl TokenCounter for Chars {
            fn count(&self, text: &str) -> usize {
                text.chars().count()
            }
        }
        let r = rewriter(Arc::new(Fixed("abcd"))).with_token_counter(Arc::new(Chars));
        let out = r.rewrite(&["x y"], &Context::new()).await;
        assert_eq!(out.paragraphs[0].rewrite.as_ref().unwrap().output_tokens, 4);
    }

    #[tokio::test]
    async fn custom_fallback_marker() {
        struct Down;
        #[async_trait]
        impl CompletionProvider for Down {
            async fn complete(&self, r: &CompletionRequest) -> Result<String, CompletionError> {
                Err(CompletionError::Provider {
                    model: r.model.clone(),
                    detail: "down".into(),
                })
            }
        }
        let config = RewriterConfig::builder()
            .fallback_marker("[REVISAR]")
            .build()
            .unwrap();
        let out = Rewriter::new(Arc::new(Down), config)
            .rewrite(&["Texto."], &Context::new())
            .await;
        assert_eq!(out.text, "[REVISAR] Texto.");
        assert_eq!(out.degraded_indices(), vec![0]);
    }
}
