//! Prompts for section-aware paragraph rewriting.
//!
//! Centralising every prompt here means changing the legal register or the
//! instruction wording requires editing exactly one place, and unit tests can
//! inspect prompts directly without calling a model.
//!
//! The prompt is Brazilian Portuguese because the petitions are.

/// First line of every rewrite prompt.
pub const ROLE_FRAMING: &str = "Você é um advogado redigindo uma petição trabalhista.";

/// Section name used before the first section marker.
pub const GENERAL_SECTION: &str = "Geral";

/// Default prefix of a paragraph whose rewrite failed.
pub const FALLBACK_MARKER: &str = "[ERRO IA]";

const CONTEXT_INTRO: &str = "Abaixo estão os dados fornecidos pelo cliente:";
const REWRITE_INSTRUCTION: &str =
    "Reescreva o seguinte parágrafo com linguagem jurídica clara, formal e adaptada:";

/// Build the single user message sent for one body paragraph.
///
/// `paragraph` is embedded raw (untrimmed), `section` empty means
/// [`GENERAL_SECTION`].
pub fn rewrite_prompt(
    role: Option<&str>,
    context_block: &str,
    section: &str,
    paragraph: &str,
) -> String {
    let section = if section.is_empty() {
        GENERAL_SECTION
    } else {
        section
    };
    format!(
        "{}\n{}\n\n{}\n\nSeção: {}\n\n{}\n\n{}",
        role.unwrap_or(ROLE_FRAMING),
        CONTEXT_INTRO,
        context_block,
        section,
        REWRITE_INSTRUCTION,
        paragraph
    )
}

/// Degraded text for a paragraph whose rewrite failed.
pub fn fallback_text(marker: &str, paragraph: &str) -> String {
    format!("{marker} {paragraph}")
}
