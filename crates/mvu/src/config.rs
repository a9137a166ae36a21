//! Engine configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::MvuError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Tag name of the optional wrapper block, e.g. `<UpdateVariable>`.
    #[serde(default = "default_wrapper_tag")]
    pub wrapper_tag: String,

    /// Tag name of the analysis sub-block ignored inside the wrapper.
    #[serde(default = "default_analysis_tag")]
    pub analysis_tag: String,

    /// Statements must end with `;` right after the closing parenthesis.
    #[serde(default = "default_true")]
    pub require_semicolon: bool,

    /// Keep an unparseable argument as a plain string instead of failing.
    #[serde(default)]
    pub bare_string_fallback: bool,

    /// Objects and arrays without `$meta.extensible` accept new members.
    #[serde(default = "default_true")]
    pub default_extensible: bool,

    #[serde(default = "default_max_literal_depth")]
    pub max_literal_depth: usize,

    /// Upper bound on parent hops when resolving the nearest bound ancestor.
    #[serde(default = "default_max_ancestor_walk")]
    pub max_ancestor_walk: usize,

    /// Significant digits kept when `add` produces a number.
    #[serde(default = "default_number_precision")]
    pub number_precision: usize,
}

impl EngineConfig {
    pub fn from_json_str(text: &str) -> Result<Self, MvuError> {
        serde_json::from_str(text).map_err(|e| MvuError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MvuError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| MvuError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wrapper_tag: default_wrapper_tag(),
            analysis_tag: default_analysis_tag(),
            require_semicolon: true,
            bare_string_fallback: false,
            default_extensible: true,
            max_literal_depth: default_max_literal_depth(),
            max_ancestor_walk: default_max_ancestor_walk(),
            number_precision: default_number_precision(),
        }
    }
}

fn default_wrapper_tag() -> String {
    "UpdateVariable".to_string()
}

fn default_analysis_tag() -> String {
    "Analysis".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_literal_depth() -> usize {
    64
}

fn default_max_ancestor_walk() -> usize {
    100_000
}

fn default_number_precision() -> usize {
    12
}
