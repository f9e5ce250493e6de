//! End-to-end petition generation.
//!
//! ```text
//! source ──▶ rewrite ──▶ format (.docx) ──▶ publish ──▶ PetitionResponse
//! ```
//!
//! Formatting and publication only start once every paragraph has been
//! rewritten; there is no partial output. A paragraph whose rewrite fails is
//! degraded in place and does not stop the pipeline. Anything else that
//! fails (template, disk, upload) is fatal and returned as [`PetitionError`].

use crate::config::FormatterConfig;
use crate::context::Context;
use crate::error::PetitionError;
use crate::output::{PetitionResponse, RewriteOutput};
use crate::pipeline::format::format_document;
use crate::pipeline::source::ParagraphSource;
use crate::publish::{petition_filename, StoragePublisher};
use crate::rewrite::Rewriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Inputs for one petition.
#[derive(Debug, Clone, Default)]
pub struct PetitionRequest {
    pub context: Context,
    pub source: ParagraphSource,
    /// Letterhead for the page header; ignored when the file is missing.
    pub header_image: Option<PathBuf>,
}

impl PetitionRequest {
    pub fn new(context: Context) -> Self {
        Self {
            context,
            ..Default::default()
        }
    }

    pub fn source(mut self, source: ParagraphSource) -> Self {
        self.source = source;
        self
    }

    pub fn header_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.header_image = Some(path.into());
        self
    }
}

/// Result of a successful generation.
#[derive(Debug, Clone)]
pub struct GeneratedPetition {
    pub response: PetitionResponse,
    pub rewrite: RewriteOutput,
    pub duration_ms: u64,
}

/// Wires the rewriter, formatter and publisher together.
///
/// Built once at startup and shared (`Arc`) across requests.
pub struct PetitionGenerator {
    rewriter: Rewriter,
    publisher: Arc<dyn StoragePublisher>,
    formatter: FormatterConfig,
    work_dir: Option<PathBuf>,
}

impl PetitionGenerator {
    pub fn new(rewriter: Rewriter, publisher: Arc<dyn StoragePublisher>) -> Self {
        Self {
            rewriter,
            publisher,
            formatter: FormatterConfig::default(),
            work_dir: None,
        }
    }

    pub fn formatter(mut self, config: FormatterConfig) -> Self {
        self.formatter = config;
        self
    }

    /// Keep generated files in `dir` instead of a per-request temp directory
    /// that is removed after publishing.
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn rewriter(&self) -> &Rewriter {
        &self.rewriter
    }

    /// Generate, format and publish one petition.
    pub async fn generate(&self, request: PetitionRequest) -> Result<GeneratedPetition, PetitionError> {
        let start = Instant::now();

        // ── Step 1: Load paragraphs ──────────────────────────────────────────
        let paragraphs = request.source.load().await?;

        // ── Step 2: Rewrite ──────────────────────────────────────────────────
        let rewrite = self.rewriter.rewrite(&paragraphs, &request.context).await;

        // ── Step 3: Format ───────────────────────────────────────────────────
        let filename = petition_filename(&request.context, chrono::Local::now().naive_local());
        // Removed on drop, after the upload below has read the file.
        let temp_dir;
        let dir: &Path = match &self.work_dir {
            Some(d) => d.as_path(),
            None => {
                temp_dir = tempfile::tempdir()
                    .map_err(|e| PetitionError::Internal(format!("tempdir: {e}")))?;
                temp_dir.path()
            }
        };
        let output_path = dir.join(&filename);

        write_document(
            rewrite.text.clone(),
            output_path.clone(),
            request.header_image.clone(),
            self.formatter.clone(),
        )
        .await?;

        // ── Step 4: Publish ──────────────────────────────────────────────────
        let url = self.publisher.publish(&output_path, &filename).await?;
        debug!("Published {} → {}", output_path.display(), url);

        let response = PetitionResponse::new(filename, url, rewrite.total_cost);
        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Petition {} ready in {}ms, estimated ${}",
            response.arquivo, duration_ms, response.custo_estimado_usd
        );

        Ok(GeneratedPetition {
            response,
            rewrite,
            duration_ms,
        })
    }
}

/// Run the blocking DOCX serialisation off the async executor.
pub async fn write_document(
    text: String,
    output_path: PathBuf,
    header_image: Option<PathBuf>,
    config: FormatterConfig,
) -> Result<(), PetitionError> {
    tokio::task::spawn_blocking(move || {
        format_document(&text, &output_path, header_image.as_deref(), &config)
    })
    .await
    .map_err(|e| PetitionError::Internal(format!("formatter task: {e}")))?
}
