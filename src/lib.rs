//! # edgequake-petition
//!
//! Rewrite a labour-law petition paragraph by paragraph with an LLM, render
//! the result as a styled DOCX and publish it to storage.
//!
//! ## Why this crate?
//!
//! A petition skeleton is mostly boilerplate with a few load-bearing
//! sections. Rewriting every paragraph with the most capable model is
//! wasteful, and a single failed call should not lose the whole document.
//! This crate tracks which section each paragraph belongs to, routes the
//! paragraphs under FATOS, FUNDAMENTAÇÃO and PEDIDOS to the high tier, keeps
//! everything else on the cheap tier and degrades failed paragraphs in place
//! instead of aborting.
//!
//! ## Pipeline Overview
//!
//! ```text
//! context (JSON object)
//!  │
//!  ├─ 1. Source   built-in paragraphs or a .docx / text template
//!  ├─ 2. Rewrite  blank → "\n", MARKER → section, body → completion (tiered)
//!  ├─ 3. Cost     whitespace token estimate × tier rate, accumulated in USD
//!  ├─ 4. Format   headings centered/bold/14pt, body justified/12pt, footer
//!  └─ 5. Publish  Supabase storage or a local directory
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_petition::{Context, LlmCompletion, Rewriter, RewriterConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from EDGEQUAKE_LLM_PROVIDER / OPENAI_API_KEY
//!     let provider = Arc::new(LlmCompletion::from_env(None)?);
//!     let rewriter = Rewriter::new(provider, RewriterConfig::default());
//!
//!     let context: Context = [("reclamante", "Maria"), ("empresa", "ACME")]
//!         .into_iter()
//!         .collect();
//!     let paragraphs = ["FATOS", "A reclamante trabalhou 3 anos sem registro."];
//!     let output = rewriter.rewrite(&paragraphs, &context).await;
//!     println!("{}", output.text);
//!     eprintln!("estimated cost: ${:.4}", output.total_cost);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | axum HTTP service (`POST /gerar-peticao`) |
//! | `cli`    | on      | the `petition` binary (clap + anyhow + tracing-subscriber) |
//!
//! ## Tiers
//!
//! | Tier     | Model           | $/1K in | $/1K out |
//! |----------|-----------------|---------|----------|
//! | standard | `gpt-3.5-turbo` | 0.0005  | 0.0015   |
//! | high     | `gpt-4`         | 0.01    | 0.03     |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod context;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod publish;
pub mod rewrite;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{FormatterConfig, RewriteTier, RewriterConfig, RewriterConfigBuilder, TierProfile};
pub use context::Context;
pub use error::{CompletionError, PetitionError};
pub use generate::{GeneratedPetition, PetitionGenerator, PetitionRequest};
pub use output::{
    ErrorResponse, ParagraphOutcome, ParagraphRecord, PetitionResponse, RewriteOutput, RewriteStats,
};
pub use pipeline::classify::{classify, is_heading, ParagraphKind};
pub use pipeline::cost::{TokenCounter, WhitespaceTokenCounter};
pub use pipeline::format::format_document;
pub use pipeline::llm::{CompletionProvider, CompletionRequest, LlmCompletion};
pub use pipeline::source::ParagraphSource;
pub use progress::{NoopProgressCallback, ProgressCallback, RewriteProgressCallback};
pub use publish::{petition_filename, LocalDirPublisher, StoragePublisher, SupabaseConfig, SupabasePublisher};
pub use rewrite::Rewriter;
