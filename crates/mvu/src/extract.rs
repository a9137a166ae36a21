//! Statement extractor.
//!
//! Finds `_.<verb>(<args>);//<reason>` statements in free-form generated text.
//! The scan is a single left-to-right pass over the bytes with depth counters
//! for `()`, `{}`, `[]` and the active quote character; there is no
//! backtracking and no recursion, so run time is linear in the input length.
//!
//! Text between statements is prose and ignored verbatim: quotes and brackets
//! only count once a statement has been opened. Statements may nest inside the
//! arguments of another statement; a nested statement belongs to the argument
//! text of its enclosing statement unless that one turns out malformed, in
//! which case the nested statement is kept on its own.
//!
//! When the text contains a wrapper block (`<UpdateVariable>...</UpdateVariable>`)
//! any analysis sub-block inside it (`<Analysis>...</Analysis>`) is skipped.

use std::ops::Range;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{ErrorKind, MvuError};

/// Byte range of a statement (or failed statement) in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }
}

/// A raw statement: verb, argument substrings and trailing reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub verb: String,
    /// Trimmed argument substrings split on top-level commas.
    pub args: Vec<String>,
    pub reason: Option<String>,
    pub span: Span,
}

/// A statement that was skipped, with the reason it was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub span: Span,
    pub message: String,
}

impl Diagnostic {
    pub fn parse_error(span: impl Into<Span>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::ParseError,
            span: span.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    /// Statements in source order.
    pub statements: Vec<Statement>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub wrapper_tag: String,
    pub analysis_tag: String,
    pub require_semicolon: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            wrapper_tag: "UpdateVariable".to_string(),
            analysis_tag: "Analysis".to_string(),
            require_semicolon: true,
        }
    }
}

impl From<&EngineConfig> for ExtractOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            wrapper_tag: config.wrapper_tag.clone(),
            analysis_tag: config.analysis_tag.clone(),
            require_semicolon: config.require_semicolon,
        }
    }
}

/// A block tag compiled into its open and close patterns.
#[derive(Debug, Clone)]
struct TagPattern {
    open: Regex,
    close: Regex,
}

impl TagPattern {
    fn new(tag: &str) -> Result<Self, MvuError> {
        let tag = regex::escape(tag);
        let open = Regex::new(&format!(r"(?i)<\s*{tag}\b[^>]*>"))
            .map_err(|e| MvuError::Config(e.to_string()))?;
        let close = Regex::new(&format!(r"(?i)<\s*/\s*{tag}\s*>"))
            .map_err(|e| MvuError::Config(e.to_string()))?;
        Ok(Self { open, close })
    }

    /// Inner ranges of the blocks within `text[range]`.
    ///
    /// An unclosed block extends to the end of `range` when `open_ended` is set
    /// and is ignored otherwise.
    fn blocks(&self, text: &str, range: Range<usize>, open_ended: bool) -> Vec<Range<usize>> {
        let mut blocks = Vec::new();
        let mut pos = range.start;
        while pos < range.end {
            let Some(open) = self.open.find_at(&text[..range.end], pos) else {
                break;
            };
            match self.close.find_at(&text[..range.end], open.end()) {
                Some(close) => {
                    blocks.push(open.end()..close.start());
                    pos = close.end();
                }
                None => {
                    if open_ended {
                        blocks.push(open.end()..range.end);
                    }
                    break;
                }
            }
        }
        blocks
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Depth {
    paren: i64,
    brace: i64,
    bracket: i64,
}

impl Depth {
    fn below(&self, base: &Depth) -> bool {
        self.paren < base.paren || self.brace < base.brace || self.bracket < base.bracket
    }
}

#[derive(Debug)]
struct Open {
    verb_end: usize,
    start: usize,
    args_start: usize,
    base: Depth,
}

#[derive(Debug)]
struct Closed {
    verb_end: usize,
    start: usize,
    args_start: usize,
    close: usize,
}

/// Scan state for one call to [`Extractor::extract`].
struct Scan<'a, 'o> {
    text: &'a str,
    options: &'o ExtractOptions,
    stack: Vec<Open>,
    pending: Vec<Closed>,
    depth: Depth,
    out: Extraction,
}

impl<'a, 'o> Scan<'a, 'o> {
    /// Apply a closing bracket at byte `pos`. Returns the position to resume
    /// from when a top-level statement was completed.
    fn settle(&mut self, pos: usize) -> Option<usize> {
        while let Some(top) = self.stack.last() {
            if self.depth == top.base {
                let open = self.stack.pop()?;
                while self.pending.last().is_some_and(|c| c.start > open.start) {
                    self.pending.pop();
                }
                let closed = Closed {
                    verb_end: open.verb_end,
                    start: open.start,
                    args_start: open.args_start,
                    close: pos,
                };
                if !self.stack.is_empty() {
                    self.pending.push(closed);
                    return None;
                }
                self.flush_pending();
                self.depth = Depth::default();
                return Some(self.finish(closed));
            }
            if !self.depth.below(&top.base) {
                return None;
            }
            let open = self.stack.pop()?;
            self.reject(open.start..pos + 1, "unbalanced brackets in statement arguments");
            if self.stack.is_empty() {
                self.depth = Depth::default();
                self.flush_pending();
            }
        }
        None
    }

    /// Discard every open statement ending at `pos`.
    fn abandon(&mut self, pos: usize, message: &str) {
        let open: Vec<Open> = self.stack.drain(..).collect();
        for statement in open {
            self.reject(statement.start..pos, message);
        }
        self.depth = Depth::default();
        self.flush_pending();
    }

    fn reject(&mut self, span: Range<usize>, message: &str) {
        tracing::warn!(start = span.start, end = span.end, message, "skipping statement");
        self.out.diagnostics.push(Diagnostic::parse_error(span, message));
    }

    fn flush_pending(&mut self) {
        let pending: Vec<Closed> = self.pending.drain(..).collect();
        for closed in pending {
            self.finish(closed);
        }
    }

    /// Check the terminator, read the reason and record the statement.
    /// Returns the byte just past the statement.
    fn finish(&mut self, closed: Closed) -> usize {
        let text = self.text;
        let mut end = closed.close + 1;
        if text[end..].starts_with(';') {
            end += 1;
        } else if self.options.require_semicolon {
            self.reject(closed.start..end, "missing ';' after statement");
            return end;
        }

        let after = &text[end..];
        let trimmed = after.trim_start_matches(|c| c == ' ' || c == '\t');
        let mut reason = None;
        if let Some(comment) = trimmed.strip_prefix("//") {
            let line_len = comment.find('\n').unwrap_or(comment.len());
            let line = comment[..line_len].trim();
            if !line.is_empty() {
                reason = Some(line.to_string());
            }
            end += after.len() - trimmed.len() + 2 + line_len;
        }

        let statement = Statement {
            verb: text[closed.start + 2..closed.verb_end].to_string(),
            args: split_arguments(&text[closed.args_start..closed.close]),
            reason,
            span: Span {
                start: closed.start,
                end,
            },
        };
        tracing::debug!(verb = %statement.verb, args = statement.args.len(), "extracted statement");
        self.out.statements.push(statement);
        end
    }
}

/// Statement extractor with compiled wrapper and analysis tag patterns.
#[derive(Debug, Clone)]
pub struct Extractor {
    options: ExtractOptions,
    wrapper: TagPattern,
    analysis: TagPattern,
}

impl Extractor {
    pub fn new(options: ExtractOptions) -> Result<Self, MvuError> {
        let wrapper = TagPattern::new(&options.wrapper_tag)?;
        let analysis = TagPattern::new(&options.analysis_tag)?;
        Ok(Self {
            options,
            wrapper,
            analysis,
        })
    }

    /// Byte ranges of analysis blocks inside wrapper blocks, in order.
    fn skipped_ranges(&self, text: &str) -> Vec<Range<usize>> {
        self.wrapper
            .blocks(text, 0..text.len(), true)
            .into_iter()
            .flat_map(|inner| self.analysis.blocks(text, inner, false))
            .collect()
    }

    /// Extract every well-formed statement from `text`.
    pub fn extract(&self, text: &str) -> Extraction {
        let bytes = text.as_bytes();
        let skipped = self.skipped_ranges(text);
        let mut next_skip = 0;
        let mut quote: Option<u8> = None;
        let mut scan = Scan {
            text,
            options: &self.options,
            stack: Vec::new(),
            pending: Vec::new(),
            depth: Depth::default(),
            out: Extraction::default(),
        };

        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];

            if let Some(q) = quote {
                match b {
                    b'\\' => {
                        i += 2;
                        continue;
                    }
                    b'\n' => {
                        quote = None;
                        scan.abandon(i, "string literal not closed before end of line");
                    }
                    _ if b == q => quote = None,
                    _ => {}
                }
                i += 1;
                continue;
            }

            if scan.stack.is_empty() {
                while skipped.get(next_skip).is_some_and(|r| r.end <= i) {
                    next_skip += 1;
                }
                if let Some(range) = skipped.get(next_skip) {
                    if range.start <= i {
                        i = range.end;
                        next_skip += 1;
                        continue;
                    }
                }
            }

            if b == b'_' {
                if let Some((verb_end, args_start)) = statement_start(bytes, i) {
                    scan.stack.push(Open {
                        verb_end,
                        start: i,
                        args_start,
                        base: scan.depth,
                    });
                    scan.depth.paren += 1;
                    i = args_start;
                    continue;
                }
            }

            if scan.stack.is_empty() {
                i += 1;
                continue;
            }

            match b {
                b'\'' | b'"' | b'`' => quote = Some(b),
                b'(' => scan.depth.paren += 1,
                b'{' => scan.depth.brace += 1,
                b'[' => scan.depth.bracket += 1,
                b')' | b'}' | b']' => {
                    match b {
                        b')' => scan.depth.paren -= 1,
                        b'}' => scan.depth.brace -= 1,
                        _ => scan.depth.bracket -= 1,
                    }
                    if let Some(resume) = scan.settle(i) {
                        i = resume;
                        continue;
                    }
                }
                _ => {}
            }
            i += 1;
        }

        scan.abandon(text.len(), "statement not closed before end of text");
        let mut out = scan.out;
        out.statements.sort_by_key(|s| s.span.start);
        out.diagnostics.sort_by_key(|d| d.span.start);
        out
    }
}

/// Match `_.<identifier>(` at byte `i`. Returns the end of the verb and the
/// first byte of the argument list.
fn statement_start(bytes: &[u8], i: usize) -> Option<(usize, usize)> {
    if i > 0 && (bytes[i - 1].is_ascii_alphanumeric() || bytes[i - 1] == b'_') {
        return None;
    }
    if bytes.get(i + 1) != Some(&b'.') {
        return None;
    }
    let verb_start = i + 2;
    if !bytes.get(verb_start)?.is_ascii_alphabetic() {
        return None;
    }
    let mut j = verb_start + 1;
    while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_') {
        j += 1;
    }
    if bytes.get(j) == Some(&b'(') {
        Some((j, j + 1))
    } else {
        None
    }
}

/// Split an argument list on commas outside quotes and brackets.
///
/// Empty arguments are kept (`a, ` yields `["a", ""]`) so a missing value
/// surfaces as a value error instead of a different arity. A blank list
/// yields no arguments.
pub fn split_arguments(src: &str) -> Vec<String> {
    if src.trim().is_empty() {
        return Vec::new();
    }
    let bytes = src.as_bytes();
    let mut args = Vec::new();
    let mut quote: Option<u8> = None;
    let mut depth = 0i64;
    let mut last = 0;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
        } else {
            match b {
                b'\'' | b'"' | b'`' => quote = Some(b),
                b'(' | b'{' | b'[' => depth += 1,
                b')' | b'}' | b']' => depth -= 1,
                b',' if depth == 0 => {
                    args.push(src[last..i].trim().to_string());
                    last = i + 1;
                }
                _ => {}
            }
        }
        i += 1;
    }
    args.push(src[last.min(src.len())..].trim().to_string());
    args
}
