//! Markdown helpers: image-prompt extraction and the static HTML rendering
//! used by the exporters.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::ImageRegistry;

static IMAGE_PROMPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^>\s*\*\*\[IMAGE PROMPT\]:\*\*(.*)$").expect("valid regex"));
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.*)$").expect("valid regex"));
static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid regex"));
static ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*(.+?)\*").expect("valid regex"));

pub fn is_image_prompt(line: &str) -> bool {
    IMAGE_PROMPT.is_match(line.trim())
}

/// Every image-prompt line of a chapter, trimmed. These lines are the
/// registry keys.
pub fn extract_image_prompts(content: &str) -> Vec<String> {
    let mut prompts: Vec<String> = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if is_image_prompt(line) && !prompts.iter().any(|p| p == line) {
            prompts.push(line.to_string());
        }
    }
    prompts
}

/// The description after the marker, as sent to the image model.
pub fn image_prompt_description(line: &str) -> String {
    IMAGE_PROMPT
        .captures(line.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| line.trim().to_string())
}

/// Drop a leading `# Title` or `**Title**` line that duplicates the chapter
/// heading the exporter writes itself.
pub fn strip_leading_title(content: &str) -> &str {
    let Some((first, rest)) = content.split_once('\n') else {
        return content;
    };
    let first = first.trim_end_matches('\r');
    let is_heading = first.starts_with("# ");
    let is_bold_line = first.len() > 4 && first.starts_with("**") && first.ends_with("**");
    if is_heading || is_bold_line { rest } else { content }
}

fn inline(text: &str) -> String {
    let escaped = html_escape::encode_text(text);
    let bolded = BOLD.replace_all(&escaped, "<b>$1</b>");
    ITALIC.replace_all(&bolded, "<i>$1</i>").into_owned()
}

fn flush_paragraph(html: &mut String, lines: &mut Vec<String>) {
    if lines.is_empty() {
        return;
    }
    html.push_str("<p style=\"margin-bottom: 12px; text-align: justify; line-height: 1.6;\">");
    html.push_str(&lines.join("<br/>"));
    html.push_str("</p>\n");
    lines.clear();
}

/// Render chapter Markdown to XHTML-compatible HTML. Image-prompt lines are
/// replaced by the registered image, or dropped when none exists.
pub fn to_html(markdown: &str, images: &ImageRegistry) -> String {
    let mut html = String::new();
    let mut paragraph: Vec<String> = Vec::new();

    for raw in markdown.lines() {
        let line = raw.trim_end();

        if line.trim().is_empty() {
            flush_paragraph(&mut html, &mut paragraph);
            continue;
        }

        if is_image_prompt(line) {
            flush_paragraph(&mut html, &mut paragraph);
            if let Some(src) = images.get(line.trim()) {
                html.push_str(&format!(
                    "<div style=\"text-align: center; margin: 24px 0;\"><img src=\"{}\" alt=\"Illustration\" style=\"max-width: 100%; height: auto;\"/></div>\n",
                    html_escape::encode_double_quoted_attribute(src)
                ));
            }
            continue;
        }

        if let Some(caps) = HEADING.captures(line) {
            flush_paragraph(&mut html, &mut paragraph);
            let tag = if caps[1].len() <= 2 { "h2" } else { "h3" };
            html.push_str(&format!("<{tag}>{}</{tag}>\n", inline(&caps[2])));
            continue;
        }

        if let Some(quote) = line.strip_prefix('>') {
            flush_paragraph(&mut html, &mut paragraph);
            html.push_str(&format!(
                "<blockquote style=\"border-left: 4px solid #6366f1; padding: 12px 16px; font-style: italic;\">{}</blockquote>\n",
                inline(quote.trim())
            ));
            continue;
        }

        paragraph.push(inline(line));
    }

    flush_paragraph(&mut html, &mut paragraph);
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAPTER: &str = "# Sejarah Kopi\nKopi datang dari **Ethiopia**.\n\n> **[IMAGE PROMPT]:** A coffee plantation at dawn. Style: Photorealistic.\n\n## Penyebaran\nDibawa oleh *pedagang* <Arab>.\nBaris kedua.";

    #[test]
    fn test_extract_prompts_dedupes() {
        let content = format!("{CHAPTER}\n> **[IMAGE PROMPT]:** A coffee plantation at dawn. Style: Photorealistic.");
        let prompts = extract_image_prompts(&content);
        assert_eq!(prompts.len(), 1);
        assert_eq!(
            image_prompt_description(&prompts[0]),
            "A coffee plantation at dawn. Style: Photorealistic."
        );
    }

    #[test]
    fn test_strip_leading_title() {
        assert!(strip_leading_title(CHAPTER).starts_with("Kopi datang"));
        assert_eq!(strip_leading_title("**Bab 1**\nIsi"), "Isi");
        assert_eq!(strip_leading_title("Plain\nText"), "Plain\nText");
    }

    #[test]
    fn test_to_html_injects_registered_image() {
        let mut images = ImageRegistry::new();
        images.insert(
            "> **[IMAGE PROMPT]:** A coffee plantation at dawn. Style: Photorealistic.".to_string(),
            "data:image/png;base64,AAAA".to_string(),
        );
        let html = to_html(CHAPTER, &images);
        assert!(html.contains("<h2>Sejarah Kopi</h2>"));
        assert!(html.contains("<b>Ethiopia</b>"));
        assert!(html.contains("<img src=\"data:image/png;base64,AAAA\""));
        assert!(html.contains("<i>pedagang</i> &lt;Arab&gt;.<br/>Baris kedua."));
        assert!(!html.contains("IMAGE PROMPT"));
    }

    #[test]
    fn test_to_html_drops_unregistered_prompt() {
        let html = to_html(CHAPTER, &ImageRegistry::new());
        assert!(!html.contains("<img"));
        assert!(!html.contains("IMAGE PROMPT"));
    }

    #[test]
    fn test_marker_case_is_ignored() {
        let content = "Intro\n> **[Image Prompt]:** Terraced rice fields.\nOutro";
        let prompts = extract_image_prompts(content);
        assert_eq!(prompts, vec!["> **[Image Prompt]:** Terraced rice fields."]);
        assert_eq!(image_prompt_description(&prompts[0]), "Terraced rice fields.");

        let html = to_html(content, &ImageRegistry::new());
        assert!(!html.contains("Image Prompt"));
        assert!(html.contains("Intro"));
    }
}
