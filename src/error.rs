//! Error types for the edgequake-petition library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PetitionError`]: **Fatal**: the petition cannot be produced at all
//!   (template missing, document could not be written, upload rejected,
//!   provider not configured). Returned as `Err(PetitionError)` from
//!   [`crate::generate::PetitionGenerator::generate`] and friends.
//!
//! * [`CompletionError`]: **Non-fatal**: a single paragraph could not be
//!   rewritten (transient API error, timeout, empty answer). The paragraph is
//!   degraded to a visibly-marked fallback and the error is stored inside
//!   [`crate::output::ParagraphOutcome::Degraded`] so callers can see which
//!   paragraphs need a human pass without losing the rest of the petition.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-petition library.
#[derive(Debug, Error)]
pub enum PetitionError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The template document does not exist.
    #[error("Template not found: '{path}'")]
    TemplateNotFound { path: PathBuf },

    /// The template exists but could not be read or parsed.
    #[error("Template '{path}' could not be read: {detail}")]
    TemplateUnreadable { path: PathBuf, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not assemble or write the DOCX file.
    #[error("Failed to write document '{path}': {detail}")]
    DocumentWriteFailed { path: PathBuf, detail: String },

    /// Storage rejected the upload or could not be reached.
    #[error("Failed to publish '{name}': {reason}")]
    UploadFailed { name: String, reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single paragraph rewrite.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum CompletionError {
    /// The provider returned an error (network, auth, rate limit, …).
    #[error("model '{model}' failed: {detail}")]
    Provider { model: String, detail: String },

    /// The call did not finish within the configured timeout.
    #[error("model '{model}' timed out after {secs}s")]
    Timeout { model: String, secs: u64 },

    /// The provider answered but the content was empty after trimming.
    #[error("model '{model}' returned an empty completion")]
    EmptyResponse { model: String },
}
