//! Variable path utilities for stat-data documents.
//!
//! Paths are written the way generated text writes them: dot-separated keys
//! mixed with bracketed indices or quoted keys, e.g. `a.b[0]["key with space"]`.
//! Every syntactically valid path has exactly one canonical spelling:
//!
//! - array indices are bracketed (`a[0]`, also for `a.0`),
//! - keys that read as bare identifiers are dotted (`a["b"]` becomes `a.b`),
//! - keys with whitespace, quotes, brackets, dots or only digits stay quoted.
//!
//! # Example
//!
//! ```
//! use mvu_path::{canonicalize, parse_path, get, PathStep};
//!
//! assert_eq!(canonicalize("a[\"b\"].c[0]").unwrap(), "a.b.c[0]");
//! assert_eq!(canonicalize("a['key with space']").unwrap(), "a[\"key with space\"]");
//!
//! let doc = serde_json::json!({"a": {"b": [1, 2]}});
//! let path = parse_path("a.b[1]").unwrap();
//! assert_eq!(path, vec![PathStep::from("a"), PathStep::from("b"), PathStep::Index(1)]);
//! assert_eq!(get(&doc, &path), Some(&serde_json::json!(2)));
//! ```

pub mod get;
pub mod types;
pub mod validate;

pub use get::{exists, get, get_mut, resolved_prefix_len};
pub use types::{CanonicalPath, Path, PathStep};
pub use validate::{validate_depth, validate_raw_path, PathError, MAX_PATH_CHARS, MAX_PATH_LENGTH};

/// Check if a string represents a valid non-negative integer array index.
///
/// # Example
///
/// ```
/// use mvu_path::is_valid_index;
///
/// assert!(is_valid_index("0"));
/// assert!(is_valid_index("123"));
/// assert!(!is_valid_index("-1"));
/// assert!(!is_valid_index("01"));
/// assert!(!is_valid_index("abc"));
/// ```
pub fn is_valid_index(index: &str) -> bool {
    if index.is_empty() {
        return false;
    }
    let bytes = index.as_bytes();
    // First char can't be leading zero unless it's just "0"
    if bytes.len() > 1 && bytes[0] == b'0' {
        return false;
    }
    bytes.iter().all(|&b| b.is_ascii_digit())
}

/// Check if a string consists only of ASCII digits.
pub fn is_integer(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// True when `key` can be written without brackets and quotes.
pub fn is_bare_key(key: &str) -> bool {
    !key.is_empty()
        && !is_integer(key)
        && key
            .chars()
            .all(|c| !c.is_whitespace() && !matches!(c, '.' | '[' | ']' | '"' | '\'' | '\\'))
}

/// Path parser.
///
/// Single pass over the input; quoted keys accept `\\`, `\"` and `\'` escapes.
pub struct PathParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> PathParser<'a> {
    /// Parse a raw path into steps.
    pub fn parse(input: &'a str) -> Result<Path, PathError> {
        validate_raw_path(input)?;
        let mut parser = Self {
            input: input.trim(),
            pos: 0,
        };
        parser.parse_path()
    }

    fn parse_path(&mut self) -> Result<Path, PathError> {
        let mut steps = Vec::new();
        if self.is_at_end() {
            return Ok(steps);
        }

        if self.peek() == Some('[') {
            steps.push(self.parse_bracket()?);
        } else {
            steps.push(self.parse_segment()?);
        }

        while let Some(c) = self.peek() {
            match c {
                '.' => {
                    self.advance();
                    steps.push(self.parse_segment()?);
                }
                '[' => steps.push(self.parse_bracket()?),
                ']' => return Err(PathError::UnbalancedBracket(self.pos)),
                other => return Err(PathError::UnexpectedChar(self.pos, other)),
            }
            validate_depth(steps.len())?;
        }

        Ok(steps)
    }

    /// Dotted segment: a bare key, or a quoted key such as `a.'b c'`.
    fn parse_segment(&mut self) -> Result<PathStep, PathError> {
        let start = self.pos;
        match self.peek() {
            Some(q @ ('"' | '\'')) => Ok(PathStep::Key(self.parse_quoted(q)?)),
            None | Some('.') | Some('[') => Err(PathError::EmptySegment(start)),
            Some(_) => {
                while let Some(c) = self.peek() {
                    match c {
                        '.' | '[' => break,
                        ']' => return Err(PathError::UnbalancedBracket(self.pos)),
                        '"' | '\'' => return Err(PathError::UnexpectedChar(self.pos, c)),
                        _ => self.advance(),
                    }
                }
                let text = self.input[start..self.pos].trim();
                if text.is_empty() {
                    return Err(PathError::EmptySegment(start));
                }
                Ok(bare_step(text))
            }
        }
    }

    fn parse_bracket(&mut self) -> Result<PathStep, PathError> {
        let start = self.pos;
        self.advance();
        self.skip_whitespace();

        if let Some(q @ ('"' | '\'')) = self.peek() {
            let key = self.parse_quoted(q)?;
            self.skip_whitespace();
            return match self.peek() {
                Some(']') => {
                    self.advance();
                    Ok(PathStep::Key(key))
                }
                None => Err(PathError::UnbalancedBracket(start)),
                Some(c) => Err(PathError::UnexpectedChar(self.pos, c)),
            };
        }

        let content_start = self.pos;
        loop {
            match self.peek() {
                None => return Err(PathError::UnbalancedBracket(start)),
                Some(']') => break,
                Some('[') => return Err(PathError::UnbalancedBracket(self.pos)),
                Some(c @ ('"' | '\'')) => return Err(PathError::UnexpectedChar(self.pos, c)),
                Some(_) => self.advance(),
            }
        }
        let content = self.input[content_start..self.pos].trim();
        self.advance();

        if content.is_empty() {
            return Err(PathError::EmptyBracket(start));
        }
        if is_valid_index(content) {
            let idx = content
                .parse()
                .map_err(|_| PathError::InvalidIndex(content.to_string()))?;
            return Ok(PathStep::Index(idx));
        }
        Ok(PathStep::Key(content.to_string()))
    }

    fn parse_quoted(&mut self, quote: char) -> Result<String, PathError> {
        let start = self.pos;
        self.advance();
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(PathError::UnterminatedQuote(start)),
                Some('\\') => {
                    self.advance();
                    match self.peek() {
                        None => return Err(PathError::UnterminatedQuote(start)),
                        Some(c @ ('\\' | '"' | '\'')) => out.push(c),
                        Some(c) => {
                            out.push('\\');
                            out.push(c);
                        }
                    }
                    self.advance();
                }
                Some(c) if c == quote => {
                    self.advance();
                    return Ok(out);
                }
                Some(c) => {
                    out.push(c);
                    self.advance();
                }
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }
}

fn bare_step(text: &str) -> PathStep {
    match text.parse::<usize>() {
        Ok(idx) if is_valid_index(text) => PathStep::Index(idx),
        _ => PathStep::Key(text.to_string()),
    }
}

/// Parse a raw path string into steps.
///
/// The empty string is the root path.
pub fn parse_path(raw: &str) -> Result<Path, PathError> {
    PathParser::parse(raw)
}

/// Format steps as a canonical path string.
///
/// # Example
///
/// ```
/// use mvu_path::{format_path, PathStep};
///
/// assert_eq!(format_path(&[]), "");
/// assert_eq!(format_path(&[PathStep::from("a"), PathStep::Index(0)]), "a[0]");
/// assert_eq!(format_path(&[PathStep::from("x y")]), "[\"x y\"]");
/// assert_eq!(format_path(&[PathStep::from("a"), PathStep::from("0")]), "a[\"0\"]");
/// ```
pub fn format_path(path: &[PathStep]) -> String {
    let mut out = String::new();
    for (i, step) in path.iter().enumerate() {
        match step {
            PathStep::Index(idx) => {
                out.push('[');
                out.push_str(&idx.to_string());
                out.push(']');
            }
            PathStep::Key(key) if is_bare_key(key) => {
                if i > 0 {
                    out.push('.');
                }
                out.push_str(key);
            }
            PathStep::Key(key) => {
                out.push_str("[\"");
                for c in key.chars() {
                    if c == '"' || c == '\\' {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push_str("\"]");
            }
        }
    }
    out
}

/// Normalize a raw path string into its canonical form.
pub fn canonicalize(raw: &str) -> Result<String, PathError> {
    Ok(format_path(&parse_path(raw)?))
}
