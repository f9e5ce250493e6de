//! Pipeline stages for petition generation.
//!
//! Each submodule implements one step and is testable on its own; the
//! orchestration lives in [`crate::rewrite`] and [`crate::generate`].
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ classify ──▶ llm ──▶ cost ──▶ format
//! (paragraphs) (blank/marker/body) (completion) (USD) (.docx)
//! ```
//!
//! 1. [`source`]: built-in paragraphs or a `.docx`/text template
//! 2. [`classify`]: the section-marker predicate shared with the formatter
//! 3. [`llm`]: completion provider seam, retry/backoff and timeout; the
//!    only stage with network I/O
//! 4. [`cost`]: token counting and per-tier pricing
//! 5. [`format`]: plain text to styled DOCX; blocking, so callers run it
//!    in `spawn_blocking`

pub mod classify;
pub mod cost;
pub mod format;
pub mod llm;
pub mod source;
