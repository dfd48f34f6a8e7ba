use serde_json::{Value, json};

use crate::models::{Chapter, EbookConfig, LanguageCode};

/// Marker the model is asked to put in front of every illustration idea.
pub const IMAGE_PROMPT_MARKER: &str = "> **[IMAGE PROMPT]:**";

pub fn system_persona(language: LanguageCode) -> String {
    let lang = language.display_name();
    format!(
        r#"You are "Pro Ebook Kilat AI", a world-class professional ebook writing assistant.
REQUIRED OUTPUT LANGUAGE: {lang}.

GLOBAL INSTRUCTIONS:
1. Every piece of content, title, subtitle and explanation MUST be written in {lang}.
2. Use a professional, flowing style that follows the literary conventions of that language.
3. You MUST include visual illustration ideas.

VISUAL INSTRUCTIONS (IMAGE PROMPT):
In every chapter include an image prompt in exactly this format (the prompt may be in English so image generators understand it):
{IMAGE_PROMPT_MARKER} Detailed visual description relevant to the topic. Style: Minimalist/Photorealistic/Vector.

BOOK STRUCTURE:
- Front Matter
- Body Chapters
- Back Matter: Conclusion, Glossary, References
"#
    )
}

pub fn outline_prompt(config: &EbookConfig, language: LanguageCode) -> String {
    let lang = language.display_name();
    format!(
        r#"OUTPUT LANGUAGE: {lang}
BOOK TOPIC: {topic}
BOOK DETAILS:
- Number of body chapters: {count}
- Target readers: {audience}
- Writing tone: {tone}
- Goal of the book: {goal}

TASK:
Produce the COMPLETE book structure (outline) as valid JSON.
All titles and points must be written in {lang}.

The JSON must have a "title", a "subtitle" and a "sections" property (array of objects).
Every section object must have:
- "title": the section title (in {lang})
- "type": one of "front", "body" or "back"
- "points": array of strings with in-depth discussion points.

REQUIRED STRUCTURE (adapt the terms to the target language):
1. [Type: front] Title Page
2. [Type: front] Preface/Foreword
3. [Type: front] Table of Contents
4. [Type: front] Introduction
5. [Type: front] About the Author
6. [Type: body] Chapter 1 ... up to Chapter {count}
7. [Type: back] Conclusion/Closing
8. [Type: back] Glossary (required)
9. [Type: back] References/Bibliography
"#,
        topic = config.topic,
        count = config.chapter_count,
        audience = config.target_audience,
        tone = config.tone,
        goal = config.goal,
    )
}

pub fn section_prompt(
    chapter: &Chapter,
    ebook_title: &str,
    prev_context: &str,
    language: LanguageCode,
) -> String {
    let lang = language.display_name();
    format!(
        r#"OUTPUT LANGUAGE: {lang}
BOOK TITLE: {ebook_title}
CURRENT SECTION: {title}
SECTION TYPE: {section_type}
KEY POINTS: {points}

PREVIOUS CONTEXT: {prev_context}

WRITING INSTRUCTIONS:
1. Write the COMPLETE content for the section "{title}" in {lang}.
2. Use Markdown formatting (headings #, ##, bold, etc).
3. Focus ONLY on the topic of this section.
4. Include at least one **[IMAGE PROMPT]** at a relevant position.
   Format: {IMAGE_PROMPT_MARKER} [Visual description]

LANGUAGE GUIDE ({lang}):
- Grammar, spelling and technical terms must follow the rules of {lang}.
- For non-Latin languages (Japanese/Korean/Arabic/Chinese) use the native script, not romanization.

Do NOT include meta commentary. Write the book content directly.
"#,
        title = chapter.title,
        section_type = chapter.section_type.as_str().to_uppercase(),
        points = chapter.subpoints.join(", "),
    )
}

/// Response schema sent with outline requests, in the vendor's schema dialect.
pub fn outline_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "subtitle": { "type": "STRING" },
            "sections": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "type": {
                            "type": "STRING",
                            "description": "One of: front, body, back"
                        },
                        "points": {
                            "type": "ARRAY",
                            "items": { "type": "STRING" }
                        }
                    },
                    "required": ["title", "type", "points"]
                }
            }
        },
        "required": ["title", "sections"]
    })
}
