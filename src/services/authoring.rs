use crate::config::{GenerationConfig, VendorConfig};
use crate::context::AppContext;
use crate::error::GenerationError;
use crate::models::{Chapter, EbookConfig, Outline, Project};
use crate::services::backend::GenerationBackend;
use crate::services::llm::LLMClient;
use crate::services::markdown;
use crate::services::outline::parse_outline;
use crate::services::prompts;
use crate::services::retry::with_retry;

/// Lowercase title fragments that mark a table-of-contents section.
const TOC_PHRASES: &[&str] = &[
    "table of contents",
    "daftar isi",
    "mokuji",
    "目次",
    "目录",
    "目錄",
    "목차",
    "índice",
    "tabla de contenido",
    "table des matières",
    "sommaire",
    "inhaltsverzeichnis",
    "فهرس المحتويات",
];

const START_OF_BOOK: &str = "Start of the book.";

pub fn is_table_of_contents(title: &str) -> bool {
    let title = title.to_lowercase();
    TOC_PHRASES.iter().any(|phrase| title.contains(phrase))
}

/// Markdown list of every other section with its sub-points.
pub fn synthesize_table_of_contents(outline: &[Chapter], toc_chapter_id: &str) -> String {
    let mut toc = String::from("Here is the complete table of contents for this book:\n\n");
    for chapter in outline.iter().filter(|c| c.id != toc_chapter_id) {
        toc.push_str(&format!("- **{}**\n", chapter.title));
        for point in &chapter.subpoints {
            toc.push_str(&format!("  - {point}\n"));
        }
    }
    toc
}

fn previous_context(outline: &[Chapter], index: usize) -> String {
    match index.checked_sub(1).map(|i| &outline[i]) {
        Some(prev) if prev.has_content() => {
            format!("Previous section \"{}\" has been completed.", prev.title)
        }
        _ => START_OF_BOOK.to_string(),
    }
}

/// Drives outline generation, chapter drafting and illustration for a project.
pub struct AuthoringService<B> {
    backend: B,
    config: GenerationConfig,
}

impl<B: GenerationBackend> AuthoringService<B> {
    pub fn new(backend: B, config: GenerationConfig) -> Self {
        AuthoringService { backend, config }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn generate_outline(
        &self,
        ctx: &AppContext,
        config: &EbookConfig,
    ) -> Result<Outline, GenerationError> {
        ctx.require_credential()?;
        ctx.require_user()?;

        // The settings language wins over whatever the setup form carried.
        let language = ctx.language();
        let prompt = prompts::outline_prompt(config, language);
        let system = prompts::system_persona(language);
        let schema = prompts::outline_response_schema();

        tracing::info!(topic = %config.topic, chapters = config.chapter_count, "Generating outline");

        let text = with_retry(&self.config.retry, "generate_outline", || {
            self.backend.generate_outline(&prompt, &system, &schema)
        })
        .await?;

        let outline = parse_outline(&text, &config.topic)?;
        tracing::info!(sections = outline.chapters.len(), title = %outline.title, "Outline ready");
        Ok(outline)
    }

    /// Generate (or regenerate) one chapter in place.
    ///
    /// On return the chapter is `completed` with content, or `error` with its
    /// previous content untouched. It is never left `generating`.
    pub async fn generate_chapter(
        &self,
        ctx: &AppContext,
        project: &mut Project,
        chapter_id: &str,
    ) -> Result<(), GenerationError> {
        ctx.require_credential()?;
        ctx.require_user()?;
        let index = project.chapter_index(chapter_id)?;
        project.outline[index].begin_generation()?;
        let chapter = project.outline[index].clone();

        let result = if is_table_of_contents(&chapter.title) {
            tracing::info!(chapter_id, title = %chapter.title, "Synthesizing table of contents");
            tokio::time::sleep(self.config.toc_delay).await;
            Ok(synthesize_table_of_contents(&project.outline, chapter_id))
        } else {
            tracing::info!(chapter_id, title = %chapter.title, "Generating chapter");
            let language = ctx.language();
            let prev_context = previous_context(&project.outline, index);
            let prompt = prompts::section_prompt(&chapter, &project.title, &prev_context, language);
            let system = prompts::system_persona(language);
            with_retry(&self.config.retry, "generate_chapter", || {
                self.backend.generate_chapter(&prompt, &system)
            })
            .await
        };

        let slot = &mut project.outline[index];
        match result {
            Ok(content) => slot.complete(content).inspect_err(|e| {
                tracing::error!(chapter_id, error = %e, "Chapter generation returned no content");
            }),
            Err(err) => {
                tracing::error!(chapter_id, error = %err, "Chapter generation failed");
                slot.fail()?;
                Err(err)
            }
        }
    }

    /// Generate images for every image prompt in the chapter that the
    /// project registry does not hold yet. Returns how many were generated.
    pub async fn illustrate_chapter(
        &self,
        ctx: &AppContext,
        project: &mut Project,
        chapter_id: &str,
    ) -> Result<usize, GenerationError> {
        ctx.require_credential()?;
        ctx.require_user()?;
        let index = project.chapter_index(chapter_id)?;
        let content = project.outline[index].content.clone().unwrap_or_default();
        let mut generated = 0;

        for key in markdown::extract_image_prompts(&content) {
            if project.images.contains_key(&key) {
                tracing::debug!(chapter_id, "Reusing registered illustration");
                continue;
            }

            let description = markdown::image_prompt_description(&key);
            let image = with_retry(&self.config.retry, "generate_illustration", || {
                self.backend.generate_illustration(&description)
            })
            .await?;

            project.images.insert(key, image);
            generated += 1;
        }

        Ok(generated)
    }
}

impl AuthoringService<LLMClient> {
    /// Direct vendor access configured from `GEMINI_*`, `RETRY_*` and
    /// `TOC_DELAY_MS`.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vendor = VendorConfig::from_lookup(&lookup)?;
        let config = GenerationConfig::from_lookup(&lookup)?;
        Ok(Self::new(LLMClient::new(&vendor)?, config))
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let config = GenerationConfig::from_env()?;
        Ok(Self::new(LLMClient::new(&VendorConfig::from_env()?)?, config))
    }
}
