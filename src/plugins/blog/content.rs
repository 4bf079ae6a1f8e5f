//! Field rules shared by create and update.

use crate::http_error::FieldError;
use crate::media::PLACEHOLDER_PREFIX;
use crate::plugins::blog::models::ContentBlock;

pub const DEFAULT_TAG: &str = "General";
pub const MAX_TITLE_CHARS: usize = 200;

pub fn clean_title(title: &str) -> Result<String, FieldError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(FieldError::new("title", "Title is required"));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(FieldError::new("title", format!("Title must be at most {MAX_TITLE_CHARS} characters")));
    }
    Ok(title.to_string())
}

/// Checks a full replacement body: at least one block, none blank.
pub fn check_content(blocks: &[ContentBlock]) -> Vec<FieldError> {
    if blocks.is_empty() {
        return vec![FieldError::new("content", "At least one content block is required")];
    }
    blocks
        .iter()
        .enumerate()
        .filter(|(_, b)| b.value().trim().is_empty())
        .map(|(i, b)| FieldError::new(format!("content[{i}]"), format!("{} block must not be empty", b.kind())))
        .collect()
}

/// Placeholders are only meaningful inside image blocks.
pub fn check_placeholders(blocks: &[ContentBlock]) -> Vec<FieldError> {
    blocks
        .iter()
        .enumerate()
        .filter(|(_, b)| !matches!(b, ContentBlock::Image(_)) && b.value().starts_with(PLACEHOLDER_PREFIX))
        .map(|(i, _)| FieldError::new(format!("content[{i}]"), "upload placeholders are only allowed in image blocks"))
        .collect()
}

/// Trims, drops blanks and duplicates (first occurrence wins). An empty
/// result falls back to the default tag.
pub fn normalize_tags<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tags: Vec<String> = Vec::new();
    for tag in raw {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    if tags.is_empty() {
        tags.push(DEFAULT_TAG.to_string());
    }
    tags
}

/// A `tag` form value: either a JSON array or a comma separated list.
pub fn split_tag_field(value: &str) -> Vec<String> {
    let trimmed = value.trim();
    if trimmed.starts_with('[') {
        if let Ok(list) = serde_json::from_str::<Vec<String>>(trimmed) {
            return list;
        }
    }
    trimmed.split(',').map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect()
}
