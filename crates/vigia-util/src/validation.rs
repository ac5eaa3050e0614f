use thiserror::Error;

/// Caps taken from the entry form and the message composer.
pub const MAX_NAME_LEN: usize = 50;
pub const MAX_CONTENT_LEN: usize = 500;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("value must not be empty")]
    Empty,
    #[error("value is too long (max {max}, got {got})")]
    TooLong { max: usize, got: usize },
}

pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }
    let len = trimmed.chars().count();
    if len > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            max: MAX_NAME_LEN,
            got: len,
        });
    }
    Ok(())
}

pub fn validate_neighborhood(neighborhood: &str) -> Result<(), ValidationError> {
    let trimmed = neighborhood.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }
    let len = trimmed.chars().count();
    if len > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            max: MAX_NAME_LEN,
            got: len,
        });
    }
    Ok(())
}

/// Message content must be non-empty after trimming. Oversized content is
/// not an error; it is truncated at the write path.
pub fn validate_message_content(content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::Empty);
    }
    Ok(())
}

/// Truncate message content to the storage cap on a character boundary.
pub fn truncate_content(content: &str) -> &str {
    match content.char_indices().nth(MAX_CONTENT_LEN) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}
