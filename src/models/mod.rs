use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// Map from the image-prompt line to a `data:` URL of the generated image.
pub type ImageRegistry = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Front,
    Body,
    Back,
}

impl SectionType {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionType::Front => "front",
            SectionType::Body => "body",
            SectionType::Back => "back",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChapterStatus {
    #[default]
    Pending,
    Generating,
    Completed,
    Error,
}

impl ChapterStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ChapterStatus::Pending => "pending",
            ChapterStatus::Generating => "generating",
            ChapterStatus::Completed => "completed",
            ChapterStatus::Error => "error",
        }
    }

    pub fn can_transition_to(self, next: ChapterStatus) -> bool {
        use ChapterStatus::*;
        matches!(
            (self, next),
            (Pending, Generating)
                | (Generating, Completed)
                | (Generating, Error)
                | (Error, Generating)
                | (Completed, Generating)
        )
    }
}

impl fmt::Display for ChapterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub section_type: SectionType,
    #[serde(default)]
    pub subpoints: Vec<String>,
    #[serde(default)]
    pub status: ChapterStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Chapter {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        section_type: SectionType,
        subpoints: Vec<String>,
    ) -> Self {
        Chapter {
            id: id.into(),
            title: title.into(),
            section_type,
            subpoints,
            status: ChapterStatus::Pending,
            content: None,
        }
    }

    pub fn has_content(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.trim().is_empty())
    }

    fn transition(&mut self, next: ChapterStatus) -> Result<(), GenerationError> {
        if !self.status.can_transition_to(next) {
            return Err(GenerationError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// pending/error/completed -> generating. Rejects a chapter already in flight.
    pub fn begin_generation(&mut self) -> Result<(), GenerationError> {
        self.transition(ChapterStatus::Generating)
    }

    /// generating -> completed. Empty content fails the chapter instead.
    pub fn complete(&mut self, content: String) -> Result<(), GenerationError> {
        if content.trim().is_empty() {
            self.fail()?;
            return Err(GenerationError::EmptyContent);
        }
        self.transition(ChapterStatus::Completed)?;
        self.content = Some(content);
        Ok(())
    }

    /// generating -> error, existing content untouched.
    pub fn fail(&mut self) -> Result<(), GenerationError> {
        self.transition(ChapterStatus::Error)
    }

    /// Manual edit from the editor.
    pub fn edit_content(&mut self, content: String) -> Result<(), GenerationError> {
        if self.status == ChapterStatus::Completed && content.trim().is_empty() {
            return Err(GenerationError::EmptyContent);
        }
        self.content = Some(content);
        Ok(())
    }

    /// Copy suitable for persistence: an in-flight chapter is stored as pending.
    pub fn settled(&self) -> Chapter {
        let mut chapter = self.clone();
        if chapter.status == ChapterStatus::Generating {
            chapter.status = ChapterStatus::Pending;
        }
        chapter
    }

    /// Copy read back from storage, which other clients may have written:
    /// nothing comes back `generating`, and `completed` needs content.
    pub fn restored(self) -> Chapter {
        let mut chapter = self.settled();
        if chapter.status == ChapterStatus::Completed && !chapter.has_content() {
            chapter.status = ChapterStatus::Pending;
        }
        chapter
    }
}

/// An ebook project as the editor sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub subtitle: String,
    #[serde(default)]
    pub outline: Vec<Chapter>,
    #[serde(default)]
    pub images: ImageRegistry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Project {
    pub fn new(title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        Project {
            id: None,
            title: title.into(),
            subtitle: subtitle.into(),
            outline: Vec::new(),
            images: ImageRegistry::new(),
            last_updated: None,
        }
    }

    pub fn chapter(&self, chapter_id: &str) -> Option<&Chapter> {
        self.outline.iter().find(|c| c.id == chapter_id)
    }

    pub fn chapter_index(&self, chapter_id: &str) -> Result<usize, GenerationError> {
        self.outline
            .iter()
            .position(|c| c.id == chapter_id)
            .ok_or_else(|| GenerationError::ChapterNotFound(chapter_id.to_string()))
    }

    pub fn update_chapter_content(
        &mut self,
        chapter_id: &str,
        content: String,
    ) -> Result<(), GenerationError> {
        let index = self.chapter_index(chapter_id)?;
        self.outline[index].edit_content(content)
    }

    /// Replace the outline with a freshly generated one.
    pub fn apply_outline(&mut self, outline: Outline) {
        self.title = outline.title;
        self.subtitle = outline.subtitle;
        self.outline = outline.chapters;
        self.images.clear();
    }

    /// True once every chapter of a non-empty outline is completed.
    pub fn is_complete(&self) -> bool {
        !self.outline.is_empty()
            && self
                .outline
                .iter()
                .all(|c| c.status == ChapterStatus::Completed)
    }

    pub fn is_local(&self) -> bool {
        self.id
            .as_deref()
            .is_some_and(crate::services::storage::is_local_id)
    }
}

/// Lifecycle marker of a stored project row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Draft,
    Active,
    Completed,
}

/// JSON blob stored in the `content_json` column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentJson {
    #[serde(default)]
    pub outline: Vec<Chapter>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub images: ImageRegistry,
}

/// Column values written on insert or update of a `projects` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectPayload {
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub content_json: ContentJson,
    pub status: ProjectStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectPayload {
    pub fn from_project(user_id: &str, project: &Project, now: DateTime<Utc>) -> Self {
        let title = if project.title.trim().is_empty() {
            "Untitled Project".to_string()
        } else {
            project.title.clone()
        };

        ProjectPayload {
            user_id: user_id.to_string(),
            title,
            description: project.subtitle.clone(),
            content_json: ContentJson {
                outline: project.outline.iter().map(Chapter::settled).collect(),
                images: project.images.clone(),
            },
            status: if project.is_complete() {
                ProjectStatus::Completed
            } else {
                ProjectStatus::Active
            },
            created_at: None,
            updated_at: now,
        }
    }

    pub fn into_row(self, id: String, is_local: bool) -> ProjectRow {
        ProjectRow {
            id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            content_json: self.content_json,
            status: self.status,
            created_at: self.created_at.unwrap_or(self.updated_at),
            updated_at: self.updated_at,
            is_local,
        }
    }
}

/// A row of the `projects` table, remote or local.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRow {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content_json: ContentJson,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_local: bool,
}

impl ProjectRow {
    pub fn into_project(self) -> Project {
        Project {
            id: Some(self.id),
            title: if self.title.is_empty() {
                "Untitled".to_string()
            } else {
                self.title
            },
            subtitle: self.description,
            outline: self
                .content_json
                .outline
                .into_iter()
                .map(Chapter::restored)
                .collect(),
            images: self.content_json.images,
            last_updated: Some(self.updated_at),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LanguageCode {
    #[default]
    #[serde(rename = "id")]
    Indonesian,
    #[serde(rename = "en-US")]
    EnglishUs,
    #[serde(rename = "en-UK")]
    EnglishUk,
    #[serde(rename = "ja")]
    Japanese,
    #[serde(rename = "ko")]
    Korean,
    #[serde(rename = "zh")]
    Chinese,
    #[serde(rename = "es")]
    Spanish,
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "de")]
    German,
    #[serde(rename = "ar")]
    Arabic,
}

impl LanguageCode {
    pub fn display_name(self) -> &'static str {
        match self {
            LanguageCode::Indonesian => "Bahasa Indonesia (Indonesian)",
            LanguageCode::EnglishUs => "English (United States)",
            LanguageCode::EnglishUk => "English (United Kingdom)",
            LanguageCode::Japanese => "Japanese (日本語)",
            LanguageCode::Korean => "Korean (한국어)",
            LanguageCode::Chinese => "Chinese Simplified (简体中文)",
            LanguageCode::Spanish => "Spanish (Español)",
            LanguageCode::French => "French (Français)",
            LanguageCode::German => "German (Deutsch)",
            LanguageCode::Arabic => "Arabic (العربية)",
        }
    }
}

/// Setup form input for outline generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EbookConfig {
    pub topic: String,
    pub chapter_count: u32,
    pub target_audience: String,
    pub tone: String,
    pub goal: String,
    #[serde(default)]
    pub language: LanguageCode,
}

/// Normalized outline produced from the AI response.
#[derive(Debug, Clone, PartialEq)]
pub struct Outline {
    pub title: String,
    pub subtitle: String,
    pub chapters: Vec<Chapter>,
}

/// Body accepted by both relay endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
}

/// `{success, text}` or `{success: false, error, code}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable error kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}
