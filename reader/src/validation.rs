use crate::error::ReaderError;

/// Maximum text length for speech requests
pub const MAX_TEXT_LENGTH: usize = 5000;

/// Validate text sent to the speech service (edits and ad-hoc words).
pub fn validate_text(text: &str) -> Result<(), ReaderError> {
    if text.trim().is_empty() {
        return Err(ReaderError::InvalidInput("Text cannot be empty".to_string()));
    }
    let length = text.chars().count();
    if length > MAX_TEXT_LENGTH {
        return Err(ReaderError::InvalidInput(format!(
            "Text too long (max {} characters)",
            MAX_TEXT_LENGTH
        )));
    }
    Ok(())
}

/// Validate a sentence index against the loaded story's length, if any.
pub fn validate_sentence_index(index: usize, sentence_count: Option<usize>) -> Result<(), ReaderError> {
    let sentence_count =
        sentence_count.ok_or_else(|| ReaderError::InvalidInput("No story loaded".to_string()))?;
    if sentence_count == 0 {
        return Err(ReaderError::InvalidInput("Story has no sentences".to_string()));
    }
    if index >= sentence_count {
        return Err(ReaderError::InvalidInput(format!(
            "Sentence {} out of range (story has {})",
            index + 1,
            sentence_count
        )));
    }
    Ok(())
}
