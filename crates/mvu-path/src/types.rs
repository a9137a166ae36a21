//! Type definitions for variable paths.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A step in a variable path.
///
/// Either an object key or an array index. A numeric key that was written
/// quoted (`["0"]`) stays a [`PathStep::Key`] so it can address an object
/// property literally named `"0"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    Key(String),
    Index(usize),
}

impl PathStep {
    /// The step as an object key.
    pub fn as_key(&self) -> Cow<'_, str> {
        match self {
            PathStep::Key(key) => Cow::Borrowed(key),
            PathStep::Index(idx) => Cow::Owned(idx.to_string()),
        }
    }

    /// The step as an array index, if it can be read as one.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathStep::Index(idx) => Some(*idx),
            PathStep::Key(key) if crate::is_valid_index(key) => key.parse().ok(),
            PathStep::Key(_) => None,
        }
    }

    pub fn is_index(&self) -> bool {
        matches!(self, PathStep::Index(_))
    }
}

impl From<&str> for PathStep {
    fn from(key: &str) -> Self {
        PathStep::Key(key.to_string())
    }
}

impl From<usize> for PathStep {
    fn from(idx: usize) -> Self {
        PathStep::Index(idx)
    }
}

/// A parsed variable path.
pub type Path = Vec<PathStep>;

/// A path together with its canonical string form.
///
/// Two raw spellings of the same address (`a["b"][0]`, `a.b.0`) produce equal
/// `CanonicalPath`s.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalPath {
    text: String,
    steps: Path,
}

impl CanonicalPath {
    /// Parse and canonicalize a raw path string.
    pub fn parse(raw: &str) -> Result<Self, crate::PathError> {
        let steps = crate::parse_path(raw)?;
        Ok(Self::from_steps(steps))
    }

    pub fn from_steps(steps: Path) -> Self {
        let text = crate::format_path(&steps);
        Self { text, steps }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    /// The containing path and the final step, or `None` for the root.
    pub fn split_last(&self) -> Option<(CanonicalPath, &PathStep)> {
        let (last, parent) = self.steps.split_last()?;
        Some((CanonicalPath::from_steps(parent.to_vec()), last))
    }

    /// Append a step, returning the child path.
    pub fn child(&self, step: PathStep) -> CanonicalPath {
        let mut steps = self.steps.clone();
        steps.push(step);
        CanonicalPath::from_steps(steps)
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for CanonicalPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for CanonicalPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        CanonicalPath::parse(&raw).map_err(serde::de::Error::custom)
    }
}
