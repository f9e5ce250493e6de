//! Document formatting: rewritten plain text → styled DOCX.
//!
//! Formatting runs in two steps so the visual grammar can be tested without
//! unzipping a DOCX:
//!
//! 1. [`layout`]: pure; one [`Block`] per input line.
//! 2. [`build_docx`]: maps blocks onto `docx-rs` paragraphs and adds the
//!    optional header image and the fixed footer.
//!
//! [`format_document`] runs both and writes the file.
//!
//! | Line                        | Block   | Alignment | Run                      |
//! |-----------------------------|---------|-----------|--------------------------|
//! | empty after trim            | blank   | -         | none                     |
//! | [`is_heading`]              | heading | center    | bold, heading size       |
//! | anything else               | body    | justify   | regular, body size       |

use crate::config::FormatterConfig;
use crate::error::PetitionError;
use crate::pipeline::classify::is_heading;
use docx_rs::{AlignmentType, Docx, Footer, Header, Paragraph, Pic, Run, RunFonts};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, warn};

/// English Metric Units per inch (DOCX drawing unit).
const EMU_PER_INCH: f64 = 914_400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Blank,
    Heading,
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Center,
    Justify,
}

/// One rendered paragraph of the output document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    /// Trimmed line text; empty for blanks.
    pub text: String,
    pub alignment: Alignment,
    pub bold: bool,
    /// Font size in points; 0 for blanks (no run).
    pub size_pt: u32,
}

/// Split `text` into lines and assign each its block style.
///
/// Splits on `\n` only, so a trailing newline yields a trailing blank block
/// and `\r\n` input is handled by the per-line trim.
pub fn layout(text: &str, config: &FormatterConfig) -> Vec<Block> {
    text.split('\n')
        .map(|line| {
            let line = line.trim();
            if line.is_empty() {
                Block {
                    kind: BlockKind::Blank,
                    text: String::new(),
                    alignment: Alignment::Left,
                    bold: false,
                    size_pt: 0,
                }
            } else if is_heading(line) {
                Block {
                    kind: BlockKind::Heading,
                    text: line.to_string(),
                    alignment: Alignment::Center,
                    bold: true,
                    size_pt: config.heading_size_pt,
                }
            } else {
                Block {
                    kind: BlockKind::Body,
                    text: line.to_string(),
                    alignment: Alignment::Justify,
                    bold: false,
                    size_pt: config.body_size_pt,
                }
            }
        })
        .collect()
}

/// A decoded header image ready to embed.
#[derive(Debug, Clone)]
pub struct HeaderImage {
    bytes: Vec<u8>,
    width_emu: u32,
    height_emu: u32,
}

impl HeaderImage {
    /// Load `path` and scale it to `width_in` inches, keeping the aspect ratio.
    ///
    /// Returns `None` (with a log line) when the file is missing or is not a
    /// decodable PNG/JPEG; a letterhead is decoration, never a reason to fail.
    pub fn load(path: &Path, width_in: f64) -> Option<Self> {
        if !path.is_file() {
            debug!("No header image at {}, skipping header", path.display());
            return None;
        }
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                warn!("Cannot read header image {}: {}", path.display(), e);
                return None;
            }
        };
        let (w, h) = match image::load_from_memory(&bytes) {
            Ok(img) => (img.width(), img.height()),
            Err(e) => {
                warn!("Cannot decode header image {}: {}", path.display(), e);
                return None;
            }
        };
        if w == 0 || h == 0 {
            return None;
        }
        let width_emu = (width_in * EMU_PER_INCH).round();
        let height_emu = (width_emu * h as f64 / w as f64).round();
        Some(Self {
            bytes,
            width_emu: width_emu as u32,
            height_emu: height_emu as u32,
        })
    }

    /// Size in EMU as `(width, height)`.
    pub fn size_emu(&self) -> (u32, u32) {
        (self.width_emu, self.height_emu)
    }
}

/// Assemble the DOCX for `blocks`.
pub fn build_docx(blocks: &[Block], header: Option<&HeaderImage>, config: &FormatterConfig) -> Docx {
    let mut docx = Docx::new();

    if let Some(img) = header {
        let pic = Pic::new(&img.bytes).size(img.width_emu, img.height_emu);
        let paragraph = Paragraph::new()
            .add_run(Run::new().add_image(pic))
            .align(AlignmentType::Center);
        docx = docx.header(Header::new().add_paragraph(paragraph));
    }

    for block in blocks {
        docx = docx.add_paragraph(block_paragraph(block, &config.font_family));
    }

    let footer = Paragraph::new()
        .add_run(Run::new().add_text(&config.footer_text))
        .align(AlignmentType::Center);
    docx.footer(Footer::new().add_paragraph(footer))
}

fn block_paragraph(block: &Block, font: &str) -> Paragraph {
    if block.kind == BlockKind::Blank {
        return Paragraph::new();
    }
    let mut run = Run::new()
        .add_text(&block.text)
        .size((block.size_pt * 2) as usize)
        .fonts(RunFonts::new().ascii(font).hi_ansi(font).cs(font));
    if block.bold {
        run = run.bold();
    }
    let align = match block.alignment {
        Alignment::Left => AlignmentType::Left,
        Alignment::Center => AlignmentType::Center,
        Alignment::Justify => AlignmentType::Both,
    };
    Paragraph::new().add_run(run).align(align)
}

/// Render `text` to a DOCX at `output_path`, overwriting any existing file.
///
/// `header_image` is optional; a path that does not exist is silently
/// ignored. Parent directories are created as needed.
pub fn format_document(
    text: &str,
    output_path: &Path,
    header_image: Option<&Path>,
    config: &FormatterConfig,
) -> Result<(), PetitionError> {
    let blocks = layout(text, config);
    let header = header_image.and_then(|p| HeaderImage::load(p, config.header_image_width_in));
    let docx = build_docx(&blocks, header.as_ref(), config);

    let write_err = |detail: String| PetitionError::DocumentWriteFailed {
        path: output_path.to_path_buf(),
        detail,
    };

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
    }
    let file = File::create(output_path).map_err(|e| write_err(e.to_string()))?;
    docx.build()
        .pack(file)
        .map_err(|e| write_err(e.to_string()))?;

    info!(
        "Wrote {} ({} blocks, header: {})",
        output_path.display(),
        blocks.len(),
        header.is_some()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::classify::{classify, ParagraphKind};

    fn cfg() -> FormatterConfig {
        FormatterConfig::default()
    }

    #[test]
    fn layout_grammar() {
        let blocks = layout("FATOS\n\nO reclamante laborou.\n", &cfg());
        let kinds: Vec<_> = blocks.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![BlockKind::Heading, BlockKind::Blank, BlockKind::Body, BlockKind::Blank]
        );

        assert_eq!(blocks[0].alignment, Alignment::Center);
        assert!(blocks[0].bold);
        assert_eq!(blocks[0].size_pt, 14);

        assert_eq!(blocks[2].alignment, Alignment::Justify);
        assert!(!blocks[2].bold);
        assert_eq!(blocks[2].size_pt, 12);
        assert_eq!(blocks[2].text, "O reclamante laborou.");
    }

    #[test]
    fn layout_trims_and_handles_crlf() {
        let blocks = layout("  PEDIDOS \r\n   \r\n", &cfg());
        assert_eq!(blocks[0].kind, BlockKind::Heading);
        assert_eq!(blocks[0].text, "PEDIDOS");
        assert_eq!(blocks[1].kind, BlockKind::Blank);
    }

    #[test]
    fn layout_empty_text_is_one_blank() {
        let blocks = layout("", &cfg());
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::Blank);
    }

    #[test]
    fn heading_agrees_with_rewriter_classification() {
        let long = "B".repeat(100);
        let samples = [
            "FATOS",
            "EXCELENTÍSSIMO SENHOR DOUTOR JUIZ DO TRABALHO DA VARA DO TRABALHO DE [CIDADE].",
            "O vínculo empregatício está comprovado.",
            "123",
            "Mixed CASE",
            long.as_str(),
        ];
        for s in samples {
            let block = &layout(s, &cfg())[0];
            let is_marker = classify(s) == ParagraphKind::SectionMarker;
            assert_eq!(block.kind == BlockKind::Heading, is_marker, "sample {s:?}");
        }
    }

    #[test]
    fn missing_header_image_is_skipped() {
        assert!(HeaderImage::load(Path::new("/definitely/not/here.png"), 6.0).is_none());
    }

    #[test]
    fn undecodable_header_image_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(HeaderImage::load(&path, 6.0).is_none());
    }

    #[test]
    fn header_image_keeps_aspect_ratio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        image::RgbImage::new(200, 50).save(&path).unwrap();

        let img = HeaderImage::load(&path, 6.0).unwrap();
        let (w, h) = img.size_emu();
        assert_eq!(w, 5_486_400);
        assert_eq!(h, 1_371_600);
    }

    #[test]
    fn writes_docx_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("peticao.docx");

        format_document("FATOS\n\nTexto longo.", &out, None, &cfg()).unwrap();
        let first = std::fs::read(&out).unwrap();
        assert_eq!(&first[..2], b"PK", "DOCX is a zip container");

        format_document("PEDIDOS", &out, Some(Path::new("/missing.png")), &cfg()).unwrap();
        let second = std::fs::read(&out).unwrap();
        assert_eq!(&second[..2], b"PK");
        assert_ne!(first, second);
    }

    #[test]
    fn writes_docx_with_header_image() {
        let dir = tempfile::tempdir().unwrap();
        let logo = dir.path().join("logo.png");
        image::RgbImage::new(40, 10).save(&logo).unwrap();
        let out = dir.path().join("com_logo.docx");

        format_document("FATOS", &out, Some(&logo), &cfg()).unwrap();
        assert!(std::fs::metadata(&out).unwrap().len() > 0);
    }
}
