#![forbid(unsafe_code)]

const MAX_TITLE_LEN: usize = 512;

pub fn normalize_title(value: &str) -> Result<String, TitleError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TitleError::Empty);
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(TitleError::TooLong);
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(TitleError::ContainsControl);
    }
    Ok(trimmed.to_string())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TitleError {
    Empty,
    TooLong,
    ContainsControl,
}

impl TitleError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "title must not be empty",
            Self::TooLong => "title is too long",
            Self::ContainsControl => "title contains control characters",
        }
    }
}
