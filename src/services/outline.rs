//! Strict normalization of the AI outline answer.

use serde::Deserialize;

use crate::error::GenerationError;
use crate::models::{Chapter, Outline, SectionType};
use crate::utils::clean_json;

#[derive(Debug, Deserialize)]
struct RawOutline {
    #[serde(default)]
    title: String,
    #[serde(default)]
    subtitle: Option<String>,
    sections: Vec<RawSection>,
}

#[derive(Debug, Deserialize)]
struct RawSection {
    title: String,
    #[serde(rename = "type")]
    section_type: SectionType,
    points: Vec<String>,
}

/// Parse the model text into an [`Outline`], or report why it is unusable.
///
/// An empty book title falls back to `fallback_title` (the requested topic).
pub fn parse_outline(text: &str, fallback_title: &str) -> Result<Outline, GenerationError> {
    let cleaned = clean_json(text);
    let raw: RawOutline = serde_json::from_str(&cleaned).map_err(|e| {
        tracing::error!(error = %e, response = %cleaned, "Outline response is not valid outline JSON");
        GenerationError::MalformedResponse(format!("invalid outline JSON: {e}"))
    })?;

    if raw.sections.is_empty() {
        return Err(GenerationError::MalformedResponse(
            "outline has no sections".to_string(),
        ));
    }

    let chapters = raw
        .sections
        .into_iter()
        .enumerate()
        .map(|(index, section)| {
            let title = if section.title.trim().is_empty() {
                format!("Section {}", index + 1)
            } else {
                section.title
            };
            Chapter::new(
                format!("sec-{}", index + 1),
                title,
                section.section_type,
                section.points,
            )
        })
        .collect();

    Ok(Outline {
        title: if raw.title.trim().is_empty() {
            fallback_title.to_string()
        } else {
            raw.title
        },
        subtitle: raw.subtitle.unwrap_or_default(),
        chapters,
    })
}
