//! Publishing generated petitions and naming them.
//!
//! [`StoragePublisher`] is the seam: the generator hands it a local file and a
//! target name and gets back a URL the client can download from. Upload
//! errors propagate as [`PetitionError::UploadFailed`]; nothing here retries.

use crate::context::Context;
use crate::error::PetitionError;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// MIME type of a `.docx` file.
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Default Supabase storage bucket.
pub const DEFAULT_BUCKET: &str = "peticoesgeradas";

/// Context key holding the claimant's name.
pub const CLAIMANT_KEY: &str = "reclamante";

const ANONYMOUS: &str = "anonimo";

/// Uploads a local file and returns its public URL.
#[async_trait]
pub trait StoragePublisher: Send + Sync {
    async fn publish(&self, local_path: &Path, target_name: &str) -> Result<String, PetitionError>;
}

// ── Supabase ─────────────────────────────────────────────────────────────

/// Connection settings for [`SupabasePublisher`].
#[derive(Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://abc.supabase.co`.
    pub url: String,
    /// Service or anon key with write access to the bucket.
    pub key: String,
    pub bucket: String,
    /// Upload timeout in seconds. Default: 60.
    pub timeout_secs: u64,
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key: key.into(),
            bucket: DEFAULT_BUCKET.to_string(),
            timeout_secs: 60,
        }
    }

    /// Read `SUPABASE_URL` and `SUPABASE_KEY`.
    pub fn from_env() -> Result<Self, PetitionError> {
        let var = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| PetitionError::InvalidConfig(format!("{name} is not set")))
        };
        Ok(Self::new(var("SUPABASE_URL")?, var("SUPABASE_KEY")?))
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Uploads to a Supabase storage bucket and returns the public object URL.
pub struct SupabasePublisher {
    client: reqwest::Client,
    config: SupabaseConfig,
}

impl SupabasePublisher {
    pub fn new(config: SupabaseConfig) -> Result<Self, PetitionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PetitionError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn base(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    /// Upload endpoint for `name`.
    pub fn upload_url(&self, name: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base(),
            self.config.bucket,
            urlencoding::encode(name)
        )
    }

    /// Public download URL for `name`.
    pub fn public_url(&self, name: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base(),
            self.config.bucket,
            urlencoding::encode(name)
        )
    }
}

#[async_trait]
impl StoragePublisher for SupabasePublisher {
    async fn publish(&self, local_path: &Path, target_name: &str) -> Result<String, PetitionError> {
        let upload_err = |reason: String| PetitionError::UploadFailed {
            name: target_name.to_string(),
            reason,
        };

        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(|e| upload_err(format!("cannot read {}: {e}", local_path.display())))?;
        debug!("Uploading {} bytes as {}", bytes.len(), target_name);

        let response = self
            .client
            .post(self.upload_url(target_name))
            .bearer_auth(&self.config.key)
            .header("apikey", &self.config.key)
            .header(reqwest::header::CONTENT_TYPE, DOCX_MIME)
            .body(bytes)
            .send()
            .await
            .map_err(|e| upload_err(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(upload_err(format!("HTTP {status}: {body}")));
        }

        let url = self.public_url(target_name);
        info!("Published {}", url);
        Ok(url)
    }
}

// ── Local directory ──────────────────────────────────────────────────────

/// Copies the file into a directory and returns a `file://` URL.
///
/// Useful for the CLI and for running the server without cloud storage.
#[derive(Debug, Clone)]
pub struct LocalDirPublisher {
    dir: PathBuf,
}

impl LocalDirPublisher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl StoragePublisher for LocalDirPublisher {
    async fn publish(&self, local_path: &Path, target_name: &str) -> Result<String, PetitionError> {
        let upload_err = |reason: String| PetitionError::UploadFailed {
            name: target_name.to_string(),
            reason,
        };
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| upload_err(e.to_string()))?;
        let dest = self.dir.join(target_name);
        let source = tokio::fs::canonicalize(local_path)
            .await
            .map_err(|e| upload_err(format!("cannot read {}: {e}", local_path.display())))?;

        // Copying a file onto itself truncates it.
        if tokio::fs::canonicalize(&dest).await.ok().as_ref() == Some(&source) {
            debug!("{} is already in {}", target_name, self.dir.display());
            return Ok(format!("file://{}", source.display()));
        }

        tokio::fs::copy(&source, &dest)
            .await
            .map_err(|e| upload_err(e.to_string()))?;
        let dest = tokio::fs::canonicalize(&dest).await.unwrap_or(dest);
        Ok(format!("file://{}", dest.display()))
    }
}

// ── Naming ───────────────────────────────────────────────────────────────

static UNSAFE_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s/\\]").unwrap());

/// `peticao_{claimant}_{YYYYmmdd_HHMMSS}.docx`.
///
/// The claimant comes from the `reclamante` context key (`anonimo` when
/// absent); whitespace and path separators become `_` so the result is a
/// single path component.
pub fn petition_filename(context: &Context, now: NaiveDateTime) -> String {
    let claimant = context
        .get(CLAIMANT_KEY)
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS);
    let claimant = UNSAFE_NAME_CHARS.replace_all(claimant, "_");
    format!("peticao_{}_{}.docx", claimant, now.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap()
    }

    #[test]
    fn filename_uses_claimant() {
        let ctx: Context = [("reclamante", "Maria da Silva")].into_iter().collect();
        assert_eq!(
            petition_filename(&ctx, at()),
            "peticao_Maria_da_Silva_20240309_140507.docx"
        );
    }

    #[test]
    fn filename_without_claimant_is_anonymous() {
        assert_eq!(
            petition_filename(&Context::new(), at()),
            "peticao_anonimo_20240309_140507.docx"
        );
    }

    #[test]
    fn filename_strips_path_separators() {
        let ctx: Context = [("reclamante", "../etc/passwd")].into_iter().collect();
        let name = petition_filename(&ctx, at());
        assert!(!name.contains('/'), "got {name}");
    }

    #[test]
    fn public_url_is_percent_encoded() {
        let p = SupabasePublisher::new(SupabaseConfig::new("https://abc.supabase.co/", "k")).unwrap();
        assert_eq!(
            p.public_url("peticao_João_1.docx"),
            "https://abc.supabase.co/storage/v1/object/public/peticoesgeradas/peticao_Jo%C3%A3o_1.docx"
        );
        assert_eq!(
            p.upload_url("a b.docx"),
            "https://abc.supabase.co/storage/v1/object/peticoesgeradas/a%20b.docx"
        );
    }

    #[test]
    fn debug_redacts_key() {
        let c = SupabaseConfig::new("https://x", "secret-key");
        assert!(!format!("{c:?}").contains("secret-key"));
    }

    #[tokio::test]
    async fn local_publisher_copies_file() {
        let src_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("in.docx");
        std::fs::write(&src, b"PK").unwrap();

        let out_dir = tempfile::tempdir().unwrap();
        let publisher = LocalDirPublisher::new(out_dir.path().join("pub"));
        let url = publisher.publish(&src, "peticao_x.docx").await.unwrap();

        assert!(url.starts_with("file://"));
        assert!(url.ends_with("peticao_x.docx"));
        assert_eq!(
            std::fs::read(out_dir.path().join("pub/peticao_x.docx")).unwrap(),
            b"PK"
        );
    }

    #[tokio::test]
    async fn local_publisher_same_directory_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peticao_x.docx");
        std::fs::write(&path, b"PK\x03\x04 documento").unwrap();

        let publisher = LocalDirPublisher::new(dir.path());
        let url = publisher.publish(&path, "peticao_x.docx").await.unwrap();

        assert!(url.ends_with("peticao_x.docx"));
        assert_eq!(std::fs::read(&path).unwrap(), b"PK\x03\x04 documento");
    }

    #[tokio::test]
    async fn local_publisher_missing_source_is_upload_error() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = LocalDirPublisher::new(dir.path());
        let err = publisher
            .publish(&dir.path().join("nope.docx"), "nope.docx")
            .await
            .unwrap_err();
        assert!(matches!(err, PetitionError::UploadFailed { .. }));
    }

    #[tokio::test]
    async fn supabase_missing_file_is_upload_error() {
        let p = SupabasePublisher::new(SupabaseConfig::new("http://127.0.0.1:9", "k")).unwrap();
        let err = p
            .publish(Path::new("/nope/x.docx"), "x.docx")
            .await
            .unwrap_err();
        assert!(matches!(err, PetitionError::UploadFailed { .. }));
    }
}
