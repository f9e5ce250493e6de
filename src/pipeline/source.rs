//! Where the raw paragraphs come from.
//!
//! The rewriter does not care: it takes an ordered slice. Two sources exist,
//! the built-in illustrative labour petition and a user template (`.docx` or
//! plain text, one paragraph per structural element).

use crate::error::PetitionError;
use docx_rs::{DocumentChild, Paragraph, ParagraphChild, RunChild};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Illustrative labour petition used when no template is configured.
pub const BUILTIN_PARAGRAPHS: [&str; 7] = [
    "EXCELENTÍSSIMO SENHOR DOUTOR JUIZ DO TRABALHO DA VARA DO TRABALHO DE [CIDADE].",
    "FATOS",
    "O Reclamante laborou na empresa por mais de 5 anos, exercendo função de motorista.",
    "FUNDAMENTAÇÃO",
    "O vínculo empregatício está comprovado por meio dos documentos anexos.",
    "PEDIDOS",
    "Requer o pagamento das verbas rescisórias, horas extras e FGTS não depositado.",
];

/// Paragraph source for one petition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ParagraphSource {
    /// [`BUILTIN_PARAGRAPHS`]. (default)
    #[default]
    Builtin,
    /// A template file: `.docx`, otherwise read as UTF-8 text with one
    /// paragraph per line.
    Template(PathBuf),
}

impl ParagraphSource {
    /// Load the ordered paragraph list.
    pub async fn load(&self) -> Result<Vec<String>, PetitionError> {
        match self {
            ParagraphSource::Builtin => Ok(BUILTIN_PARAGRAPHS.iter().map(|s| s.to_string()).collect()),
            ParagraphSource::Template(path) => load_template(path).await,
        }
    }
}

async fn load_template(path: &Path) -> Result<Vec<String>, PetitionError> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(PetitionError::TemplateNotFound {
            path: path.to_path_buf(),
        });
    }
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| PetitionError::TemplateUnreadable {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

    let paragraphs = if is_docx(path) {
        docx_paragraphs(&bytes).map_err(|detail| PetitionError::TemplateUnreadable {
            path: path.to_path_buf(),
            detail,
        })?
    } else {
        let text = String::from_utf8(bytes).map_err(|e| PetitionError::TemplateUnreadable {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        text_paragraphs(&text)
    };

    info!(
        "Loaded {} paragraphs from template {}",
        paragraphs.len(),
        path.display()
    );
    Ok(paragraphs)
}

fn is_docx(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("docx"))
        .unwrap_or(false)
}

/// One paragraph per line; `\r\n` tolerated.
pub fn text_paragraphs(text: &str) -> Vec<String> {
    text.lines().map(|l| l.to_string()).collect()
}

/// Text of every top-level body paragraph of a DOCX, in document order.
///
/// Tables are skipped; each paragraph's text is the concatenation of its
/// runs, so empty paragraphs come back as empty strings and still act as
/// blank separators.
pub fn docx_paragraphs(bytes: &[u8]) -> Result<Vec<String>, String> {
    let docx = docx_rs::read_docx(bytes).map_err(|e| e.to_string())?;
    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(p) => Some(paragraph_text(p)),
            _ => None,
        })
        .collect();
    debug!("DOCX template has {} body paragraphs", paragraphs.len());
    Ok(paragraphs)
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    for child in &paragraph.children {
        if let ParagraphChild::Run(run) = child {
            for rc in &run.children {
                match rc {
                    RunChild::Text(t) => text.push_str(&t.text),
                    RunChild::Tab(_) => text.push('\t'),
                    _ => {}
                }
            }
        }
    }
    text
}
