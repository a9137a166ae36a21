//! Path errors and size limits.

use thiserror::Error;

/// Maximum allowed raw path length in bytes.
pub const MAX_PATH_CHARS: usize = 1024;

/// Maximum allowed path depth.
pub const MAX_PATH_LENGTH: usize = 256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("unbalanced bracket at byte {0}")]
    UnbalancedBracket(usize),
    #[error("unterminated quote at byte {0}")]
    UnterminatedQuote(usize),
    #[error("unexpected character {1:?} at byte {0}")]
    UnexpectedChar(usize, char),
    #[error("empty segment at byte {0}")]
    EmptySegment(usize),
    #[error("empty bracket at byte {0}")]
    EmptyBracket(usize),
    #[error("invalid index {0:?}")]
    InvalidIndex(String),
    #[error("path too long")]
    PathTooLong,
    #[error("path too deep")]
    PathTooDeep,
}

/// Validate the raw size of a path string before parsing.
///
/// # Example
///
/// ```
/// use mvu_path::validate_raw_path;
///
/// validate_raw_path("a.b[0]").unwrap();
/// validate_raw_path(&"a".repeat(2000)).unwrap_err();
/// ```
pub fn validate_raw_path(raw: &str) -> Result<(), PathError> {
    if raw.len() > MAX_PATH_CHARS {
        return Err(PathError::PathTooLong);
    }
    Ok(())
}

/// Validate the depth of a parsed path.
pub fn validate_depth(depth: usize) -> Result<(), PathError> {
    if depth > MAX_PATH_LENGTH {
        return Err(PathError::PathTooDeep);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_short_path() {
        assert!(validate_raw_path("").is_ok());
        assert!(validate_raw_path("好感度.value").is_ok());
    }

    #[test]
    fn test_validate_long_path() {
        let long = "a.".repeat(600);
        assert_eq!(validate_raw_path(&long), Err(PathError::PathTooLong));
    }

    #[test]
    fn test_validate_depth() {
        assert!(validate_depth(256).is_ok());
        assert_eq!(validate_depth(257), Err(PathError::PathTooDeep));
    }
}
