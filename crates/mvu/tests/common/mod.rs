#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioFile {
    pub scenario: Vec<Scenario>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub text: String,
    pub initial: String,
    pub expected: String,
    pub outcomes: Vec<String>,
    #[serde(default)]
    pub delta: Option<String>,
    #[serde(default)]
    pub diagnostics: usize,
}

pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

pub fn load_scenarios() -> Vec<Scenario> {
    let path = fixtures_dir().join("scenarios.toml");
    let text = fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read {:?}: {e}", path));
    let file: ScenarioFile = toml::from_str(&text).unwrap_or_else(|e| panic!("failed to parse {:?}: {e}", path));
    file.scenario
}

pub fn json(name: &str, text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|e| panic!("{name}: invalid JSON {text:?}: {e}"))
}
