use chrono::Utc;

/// Strip code fences and any chatter around the outermost JSON object.
pub fn clean_json(text: &str) -> String {
    if text.trim().is_empty() {
        return "{}".to_string();
    }

    let cleaned = text.replace("```json", "").replace("```", "");
    match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(first), Some(last)) if first < last => cleaned[first..=last].trim().to_string(),
        _ => cleaned.trim().to_string(),
    }
}

/// Lowercase title with every non-alphanumeric ASCII char replaced by `_`.
pub fn sanitize_filename(title: &str) -> String {
    let name: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    if name.trim_matches('_').is_empty() {
        "ebook".to_string()
    } else {
        name
    }
}

/// `local-<millis>-<9 random chars>`, used for records created offline.
pub fn new_local_id(prefix: &str) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}-{}", prefix, Utc::now().timestamp_millis(), &random[..9])
}
