//! Export of completed chapters as a Word-compatible `.doc` or an EPUB.

use anyhow::{Result, anyhow};
use epub_builder::{EpubBuilder, EpubContent, ReferenceType, ZipLibrary};

use crate::models::{Chapter, Project};
use crate::services::markdown;
use crate::utils::sanitize_filename;

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

const DOC_STYLES: &str = r#"<style>
  body { font-family: 'Times New Roman', serif; font-size: 12pt; line-height: 1.5; color: #000; }
  .title-page { text-align: center; padding-top: 200px; page-break-after: always; }
  h1 { font-family: 'Arial', sans-serif; font-size: 24pt; color: #2E74B5; page-break-before: always; }
  h2 { font-family: 'Arial', sans-serif; font-size: 18pt; color: #2E74B5; margin-top: 24px; }
  img { display: block; margin: 20px auto; max-width: 100%; height: auto; }
  p { margin-bottom: 12px; text-align: justify; }
</style>"#;

/// A downloadable artifact.
#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub filename: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

fn exportable(project: &Project) -> impl Iterator<Item = &Chapter> {
    project.outline.iter().filter(|c| c.has_content())
}

fn chapter_body(project: &Project, chapter: &Chapter) -> String {
    let content = chapter.content.as_deref().unwrap_or_default();
    markdown::to_html(markdown::strip_leading_title(content), &project.images)
}

/// Single HTML document that word processors open as `.doc`.
pub fn export_doc(project: &Project) -> ExportedFile {
    let title = html_escape::encode_text(&project.title);
    let subtitle = html_escape::encode_text(&project.subtitle);

    let mut html = format!(
        "<html xmlns:o='urn:schemas-microsoft-com:office:office' xmlns:w='urn:schemas-microsoft-com:office:word' xmlns='http://www.w3.org/TR/REC-html40'><head><meta charset='utf-8'><title>{title}</title>{DOC_STYLES}</head><body>"
    );
    html.push_str(&format!(
        "<div class=\"title-page\"><div style=\"font-size: 32pt; font-weight: bold; margin-bottom: 24px;\">{title}</div><div style=\"font-size: 18pt; font-style: italic; color: #555;\">{subtitle}</div><p style=\"margin-top: 100px; font-size: 10pt; color: #888;\">Generated by Pro Ebook Kilat AI</p></div>\n"
    ));

    let mut chapters = 0;
    for chapter in exportable(project) {
        html.push_str(&format!(
            "<h1>{}</h1>\n{}",
            html_escape::encode_text(&chapter.title),
            chapter_body(project, chapter)
        ));
        chapters += 1;
    }
    html.push_str("</body></html>");

    tracing::info!(chapters, title = %project.title, "Exported DOC");

    let mut bytes = UTF8_BOM.to_vec();
    bytes.extend_from_slice(html.as_bytes());

    ExportedFile {
        filename: format!("{}.doc", sanitize_filename(&project.title)),
        mime_type: "application/msword",
        bytes,
    }
}

fn epub_err(e: impl std::fmt::Display) -> anyhow::Error {
    anyhow!("EPUB generation failed: {e}")
}

pub fn export_epub(project: &Project) -> Result<ExportedFile> {
    let mut builder = EpubBuilder::new(ZipLibrary::new().map_err(epub_err)?).map_err(epub_err)?;
    builder
        .metadata("title", project.title.as_str())
        .map_err(epub_err)?
        .metadata("author", "Pro Ebook Kilat AI")
        .map_err(epub_err)?;
    if !project.subtitle.is_empty() {
        builder
            .metadata("description", project.subtitle.as_str())
            .map_err(epub_err)?;
    }

    let mut chapters = 0;
    for (index, chapter) in exportable(project).enumerate() {
        let title = html_escape::encode_text(&chapter.title);
        let xhtml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<html xmlns=\"http://www.w3.org/1999/xhtml\"><head><title>{title}</title></head><body><h1>{title}</h1>\n{}</body></html>",
            chapter_body(project, chapter)
        );
        builder
            .add_content(
                EpubContent::new(format!("chapter_{}.xhtml", index + 1), xhtml.as_bytes())
                    .title(chapter.title.as_str())
                    .reftype(ReferenceType::Text),
            )
            .map_err(epub_err)?;
        chapters += 1;
    }
    builder.inline_toc();

    let mut bytes = Vec::new();
    builder.generate(&mut bytes).map_err(epub_err)?;

    tracing::info!(chapters, title = %project.title, "Exported EPUB");

    Ok(ExportedFile {
        filename: format!("{}.epub", sanitize_filename(&project.title)),
        mime_type: "application/epub+zip",
        bytes,
    })
}
