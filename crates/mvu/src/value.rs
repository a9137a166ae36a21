//! Value literal parser.
//!
//! Parses one argument substring of a statement into a typed value. Rules are
//! tried in priority order:
//!
//! 1. `true` / `false` / `null` / `undefined`
//! 2. integer or decimal number (optional leading `-`)
//! 3. structured literal delimited by `{}` or `[]` (strict JSON first, then a
//!    relaxed form accepting single quotes, bare keys and trailing commas)
//! 4. double-, single- or back-quoted string
//! 5. a single binary arithmetic expression `<number> <op> <number>`
//!
//! Anything else is a [`ValueSyntaxError`].

use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueSyntaxError {
    #[error("missing value")]
    Empty,
    #[error("no value rule matches {0:?}")]
    NoMatch(String),
    #[error("invalid structured literal: {0}")]
    InvalidStructured(String),
    #[error("literal nested deeper than {0}")]
    TooDeep(usize),
    #[error("division by zero")]
    DivisionByZero,
    #[error("number is not finite")]
    NonFinite,
}

/// A parsed argument value.
///
/// `undefined` is kept apart from `null`: storing it removes the key.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Undefined,
    Value(Value),
}

impl Literal {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Literal::Undefined => None,
            Literal::Value(v) => Some(v),
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Literal::Undefined => None,
            Literal::Value(v) => Some(v),
        }
    }

    /// Serialize back into argument syntax that parses to an equal literal.
    pub fn to_source(&self) -> String {
        match self {
            Literal::Undefined => "undefined".to_string(),
            Literal::Value(v) => v.to_string(),
        }
    }
}

impl From<Value> for Literal {
    fn from(value: Value) -> Self {
        Literal::Value(value)
    }
}

#[derive(Debug, Clone)]
pub struct LiteralOptions {
    pub max_depth: usize,
    pub bare_string_fallback: bool,
}

impl Default for LiteralOptions {
    fn default() -> Self {
        Self {
            max_depth: 64,
            bare_string_fallback: false,
        }
    }
}

/// Parse an argument with default options.
pub fn parse_literal(src: &str) -> Result<Literal, ValueSyntaxError> {
    parse_literal_with(src, &LiteralOptions::default())
}

pub fn parse_literal_with(src: &str, options: &LiteralOptions) -> Result<Literal, ValueSyntaxError> {
    let trimmed = src.trim();
    if trimmed.is_empty() {
        return Err(ValueSyntaxError::Empty);
    }

    match trimmed {
        "true" => return Ok(Literal::Value(Value::Bool(true))),
        "false" => return Ok(Literal::Value(Value::Bool(false))),
        "null" => return Ok(Literal::Value(Value::Null)),
        "undefined" => return Ok(Literal::Undefined),
        _ => {}
    }

    if let Some(n) = parse_number_literal(trimmed) {
        return number_value(n).map(Literal::Value);
    }

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return parse_structured(trimmed, options.max_depth).map(Literal::Value);
    }

    if let Some(s) = parse_quoted_string(trimmed) {
        return Ok(Literal::Value(Value::String(s)));
    }

    if let Some(result) = parse_arithmetic(trimmed) {
        return result.and_then(number_value).map(Literal::Value);
    }

    if options.bare_string_fallback {
        let stripped = trimmed.trim_matches(|c| matches!(c, '"' | '\'' | '`' | '\\'));
        return Ok(Literal::Value(Value::String(stripped.to_string())));
    }

    Err(ValueSyntaxError::NoMatch(trimmed.to_string()))
}

/// Convert an `f64` into a JSON number, preferring the integer form.
pub fn number_value(n: f64) -> Result<Value, ValueSyntaxError> {
    if !n.is_finite() {
        return Err(ValueSyntaxError::NonFinite);
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return Ok(Value::from(n as i64));
    }
    Number::from_f64(n)
        .map(Value::Number)
        .ok_or(ValueSyntaxError::NonFinite)
}

/// Length in bytes of the number literal at the start of `s`, if any.
///
/// Grammar: `[+-]?digits(.digits*)?([eE][+-]?digits)?`.
fn number_prefix_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'-' | b'+')) {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == int_start {
        return None;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    Some(i)
}

fn parse_number_literal(s: &str) -> Option<f64> {
    match number_prefix_len(s) {
        Some(len) if len == s.len() => s.parse().ok(),
        _ => None,
    }
}

/// `<number> <op> <number>` with `op` one of `+ - * /`.
///
/// Returns `None` when the text is not shaped like a binary expression.
fn parse_arithmetic(s: &str) -> Option<Result<f64, ValueSyntaxError>> {
    let left_len = number_prefix_len(s)?;
    let left: f64 = s[..left_len].parse().ok()?;
    let rest = s[left_len..].trim_start();
    let op = rest.chars().next()?;
    if !matches!(op, '+' | '-' | '*' | '/') {
        return None;
    }
    let right_src = rest[1..].trim_start();
    let right = parse_number_literal(right_src)?;
    Some(match op {
        '+' => Ok(left + right),
        '-' => Ok(left - right),
        '*' => Ok(left * right),
        _ if right == 0.0 => Err(ValueSyntaxError::DivisionByZero),
        _ => Ok(left / right),
    })
}

/// A string literal spanning the whole input.
fn parse_quoted_string(s: &str) -> Option<String> {
    let quote = s.chars().next()?;
    if !matches!(quote, '"' | '\'' | '`') {
        return None;
    }
    if quote == '"' {
        if let Ok(v) = serde_json::from_str::<String>(s) {
            return Some(v);
        }
    }
    let mut parser = RelaxedParser::new(s, 0);
    let value = parser.parse_string(quote).ok()?;
    if parser.is_at_end() {
        Some(value)
    } else {
        None
    }
}

fn parse_structured(s: &str, max_depth: usize) -> Result<Value, ValueSyntaxError> {
    if let Ok(value) = serde_json::from_str::<Value>(s) {
        if nesting_depth(&value) > max_depth {
            return Err(ValueSyntaxError::TooDeep(max_depth));
        }
        return Ok(value);
    }
    let mut parser = RelaxedParser::new(s, max_depth);
    let value = parser.parse_value()?;
    parser.skip_whitespace();
    if !parser.is_at_end() {
        return Err(ValueSyntaxError::InvalidStructured(format!(
            "trailing input at byte {}",
            parser.pos
        )));
    }
    Ok(value)
}

/// Container nesting depth, computed without recursion.
fn nesting_depth(value: &Value) -> usize {
    let mut max = 0;
    let mut stack = vec![(value, 0usize)];
    while let Some((v, depth)) = stack.pop() {
        match v {
            Value::Array(arr) => {
                max = max.max(depth + 1);
                stack.extend(arr.iter().map(|c| (c, depth + 1)));
            }
            Value::Object(map) => {
                max = max.max(depth + 1);
                stack.extend(map.values().map(|c| (c, depth + 1)));
            }
            _ => {}
        }
    }
    max
}

/// Parser for JavaScript-style object and array literals.
///
/// Recursion is bounded by `max_depth`.
struct RelaxedParser<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl<'a> RelaxedParser<'a> {
    fn new(input: &'a str, max_depth: usize) -> Self {
        Self {
            input,
            pos: 0,
            depth: 0,
            max_depth,
        }
    }

    fn error(&self, msg: &str) -> ValueSyntaxError {
        ValueSyntaxError::InvalidStructured(format!("{msg} at byte {}", self.pos))
    }

    fn parse_value(&mut self) -> Result<Value, ValueSyntaxError> {
        self.skip_whitespace();
        match self.peek() {
            Some('{') => self.parse_object(),
            Some('[') => self.parse_array(),
            Some(q @ ('"' | '\'' | '`')) => self.parse_string(q).map(Value::String),
            Some(_) => self.parse_scalar(),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn enter(&mut self) -> Result<(), ValueSyntaxError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ValueSyntaxError::TooDeep(self.max_depth));
        }
        Ok(())
    }

    fn parse_object(&mut self) -> Result<Value, ValueSyntaxError> {
        self.enter()?;
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some('}') {
                self.advance();
                break;
            }
            let key = match self.peek() {
                Some(q @ ('"' | '\'' | '`')) => self.parse_string(q)?,
                Some(_) => self.parse_bare_key()?,
                None => return Err(self.error("unterminated object")),
            };
            self.skip_whitespace();
            self.expect(':')?;
            let value = self.parse_value()?;
            map.insert(key, value);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.advance(),
                Some('}') => {
                    self.advance();
                    break;
                }
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
        self.depth -= 1;
        Ok(Value::Object(map))
    }

    fn parse_array(&mut self) -> Result<Value, ValueSyntaxError> {
        self.enter()?;
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(']') {
                self.advance();
                break;
            }
            items.push(self.parse_value()?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.advance(),
                Some(']') => {
                    self.advance();
                    break;
                }
                _ => return Err(self.error("expected ',' or ']'")),
            }
        }
        self.depth -= 1;
        Ok(Value::Array(items))
    }

    fn parse_bare_key(&mut self) -> Result<String, ValueSyntaxError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == ':' || c == ',' || c == '}' || c.is_whitespace() {
                break;
            }
            self.advance();
        }
        if self.pos == start {
            return Err(self.error("expected object key"));
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_scalar(&mut self) -> Result<Value, ValueSyntaxError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, ',' | ']' | '}') || c.is_whitespace() {
                break;
            }
            self.advance();
        }
        match &self.input[start..self.pos] {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            "null" | "undefined" => Ok(Value::Null),
            token => match parse_number_literal(token) {
                Some(n) => number_value(n),
                None => Err(ValueSyntaxError::InvalidStructured(format!(
                    "unexpected token {token:?}"
                ))),
            },
        }
    }

    fn parse_string(&mut self, quote: char) -> Result<String, ValueSyntaxError> {
        self.expect(quote)?;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some('\\') => {
                    self.advance();
                    let escaped = self.peek().ok_or_else(|| self.error("unterminated string"))?;
                    self.advance();
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        'b' => out.push('\u{8}'),
                        'f' => out.push('\u{c}'),
                        'u' => out.push(self.parse_unicode_escape()?),
                        other => out.push(other),
                    }
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

    fn parse_unicode_escape(&mut self) -> Result<char, ValueSyntaxError> {
        let end = self.pos + 4;
        let hex = self
            .input
            .get(self.pos..end)
            .ok_or_else(|| self.error("truncated unicode escape"))?;
        let code = u32::from_str_radix(hex, 16).map_err(|_| self.error("invalid unicode escape"))?;
        self.pos = end;
        Ok(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
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

    fn expect(&mut self, expected: char) -> Result<(), ValueSyntaxError> {
        if self.peek() == Some(expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!("expected {expected:?}")))
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value(src: &str) -> Value {
        parse_literal(src).unwrap().into_value().unwrap()
    }

    #[test]
    fn test_keywords() {
        assert_eq!(value("true"), json!(true));
        assert_eq!(value("false"), json!(false));
        assert_eq!(value("null"), json!(null));
        assert_eq!(parse_literal("undefined").unwrap(), Literal::Undefined);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(value("42"), json!(42));
        assert_eq!(value("3.14"), json!(3.14));
        assert_eq!(value("-10"), json!(-10));
        assert_eq!(value(" 7 "), json!(7));
        assert_eq!(value("1e3"), json!(1000));
        assert_eq!(value("1."), json!(1));
        assert_eq!(value("+5"), json!(5));
        assert_eq!(value("+2.5e1"), json!(25));
        assert_eq!(value("[1., +2]"), json!([1, 2]));
    }

    #[test]
    fn test_structured() {
        assert_eq!(value("{\"a\": 1}"), json!({"a": 1}));
        assert_eq!(value("[1, 2, 3]"), json!([1, 2, 3]));
        assert_eq!(value("{\"nested\": [1, 2, 3]}"), json!({"nested": [1, 2, 3]}));
    }

    #[test]
    fn test_relaxed_structured() {
        assert_eq!(value("{a: 1, 'b': 'two',}"), json!({"a": 1, "b": "two"}));
        assert_eq!(value("['x', 'y']"), json!(["x", "y"]));
        assert_eq!(value("{名称: '剑', 数量: 1}"), json!({"名称": "剑", "数量": 1}));
        assert_eq!(value("[undefined]"), json!([null]));
    }

    #[test]
    fn test_invalid_structured() {
        assert!(matches!(
            parse_literal("[1, 2"),
            Err(ValueSyntaxError::InvalidStructured(_))
        ));
        assert!(matches!(
            parse_literal("{a: }"),
            Err(ValueSyntaxError::InvalidStructured(_))
        ));
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}{}", "[".repeat(100), "]".repeat(100));
        assert_eq!(parse_literal(&deep), Err(ValueSyntaxError::TooDeep(64)));
        let deeper = format!("{}{}", "[".repeat(10_000), "]".repeat(10_000));
        assert!(parse_literal(&deeper).is_err());
    }

    #[test]
    fn test_strings() {
        assert_eq!(value("\"hello\""), json!("hello"));
        assert_eq!(value("'world'"), json!("world"));
        assert_eq!(value("`tick`"), json!("tick"));
        assert_eq!(value("'it\\'s'"), json!("it's"));
        assert_eq!(value("\"line\\nbreak\""), json!("line\nbreak"));
        assert_eq!(value("'好感度'"), json!("好感度"));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(value("10 + 5"), json!(15));
        assert_eq!(value("100 / 4"), json!(25));
        assert_eq!(value("3 * 2.5"), json!(7.5));
        assert_eq!(value("10-15"), json!(-5));
        assert_eq!(value("-2 - -3"), json!(1));
        assert_eq!(parse_literal("1 / 0"), Err(ValueSyntaxError::DivisionByZero));
    }

    #[test]
    fn test_chained_arithmetic_is_rejected() {
        assert!(matches!(parse_literal("1 + 2 + 3"), Err(ValueSyntaxError::NoMatch(_))));
    }

    #[test]
    fn test_no_match() {
        assert_eq!(parse_literal(""), Err(ValueSyntaxError::Empty));
        assert_eq!(parse_literal("   "), Err(ValueSyntaxError::Empty));
        assert!(matches!(parse_literal("hello"), Err(ValueSyntaxError::NoMatch(_))));
        assert!(matches!(parse_literal("'a' + 'b'"), Err(ValueSyntaxError::NoMatch(_))));
    }

    #[test]
    fn test_bare_string_fallback() {
        let options = LiteralOptions {
            bare_string_fallback: true,
            ..LiteralOptions::default()
        };
        assert_eq!(
            parse_literal_with("开心", &options).unwrap(),
            Literal::Value(json!("开心"))
        );
    }

    #[test]
    fn test_to_source() {
        assert_eq!(Literal::Undefined.to_source(), "undefined");
        assert_eq!(Literal::Value(json!("a'b")).to_source(), "\"a'b\"");
        assert_eq!(Literal::Value(json!({"a": [1]})).to_source(), "{\"a\":[1]}");
    }
}
