use unicode_segmentation::UnicodeSegmentation;

pub const KEYWORD_MIN: usize = 2;
pub const KEYWORD_MAX: usize = 50;
pub const TASK_TEXT_MAX: usize = 500;

/// Error type for user-entered text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{what} must be at least {min} characters")]
    TooShort { what: &'static str, min: usize },
    #[error("{what} must be at most {max} characters")]
    TooLong { what: &'static str, max: usize },
}

/// Check a project keyword and return it trimmed.
pub fn validate_keyword(keyword: &str) -> Result<&str, ValidationError> {
    let trimmed = keyword.trim();
    let len = char_count(trimmed);
    if len == 0 {
        return Err(ValidationError::Empty("keyword"));
    }
    if len < KEYWORD_MIN {
        return Err(ValidationError::TooShort {
            what: "keyword",
            min: KEYWORD_MIN,
        });
    }
    if len > KEYWORD_MAX {
        return Err(ValidationError::TooLong {
            what: "keyword",
            max: KEYWORD_MAX,
        });
    }
    Ok(trimmed)
}

/// Check task input (free text or a description) and return it trimmed.
pub fn validate_task_text(text: &str) -> Result<&str, ValidationError> {
    let trimmed = text.trim();
    let len = char_count(trimmed);
    if len == 0 {
        return Err(ValidationError::Empty("task"));
    }
    if len > TASK_TEXT_MAX {
        return Err(ValidationError::TooLong {
            what: "task",
            max: TASK_TEXT_MAX,
        });
    }
    Ok(trimmed)
}

/// User-perceived characters, so "한국어" counts as 3 and an emoji as 1.
fn char_count(s: &str) -> usize {
    s.graphemes(true).count()
}
