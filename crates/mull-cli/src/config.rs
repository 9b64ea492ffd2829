//! TOML configuration for the driver, generator, and export paths.
//!
//! Every field has a default, so a missing config file means "run with
//! defaults". A present-but-unparseable file is an error: config is
//! user-authored and silently ignoring it would mask typos.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use mull_core::{PassPolicy, ScheduleConfig};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub passes: ScheduleConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

/// Export artifact locations. Unset paths resolve under the agent's
/// storage directory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub growth_vectors: Option<PathBuf>,
    pub insights_dir: Option<PathBuf>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/api/generate".to_string(),
            model: "llama3".to_string(),
            temperature: 0.6,
            max_tokens: 700,
            timeout_ms: 45_000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            passes: default_passes(),
            export: ExportConfig::default(),
        }
    }
}

/// Built-in pass ladder: an immediate first look, then two passes an hour
/// apart.
fn default_passes() -> ScheduleConfig {
    let entries = [
        (1u8, 0u64, "Take a first open look. What makes this question interesting?"),
        (2, 3_600_000, "Probe the assumptions behind the question and look for counterexamples."),
        (3, 3_600_000, "Synthesize the prior passes into one specific insight."),
    ];
    ScheduleConfig(
        entries
            .into_iter()
            .map(|(n, delay_ms, prompt)| {
                (
                    n.to_string(),
                    PassPolicy {
                        delay_ms,
                        prompt: prompt.to_string(),
                    },
                )
            })
            .collect(),
    )
}

impl Config {
    /// Load from an explicit path, or `<base>/config.toml` when none is
    /// given. A missing file yields the defaults.
    pub fn load(path: Option<&Path>, base_dir: &Path) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| base_dir.join("config.toml"));

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };

        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Growth-vector document path, defaulting under the agent directory.
    pub fn growth_vectors_path(&self, agent_dir: &Path) -> PathBuf {
        self.export
            .growth_vectors
            .clone()
            .unwrap_or_else(|| agent_dir.join("growth_vectors.json"))
    }

    /// Insight file directory, defaulting under the agent directory.
    pub fn insights_dir(&self, agent_dir: &Path) -> PathBuf {
        self.export
            .insights_dir
            .clone()
            .unwrap_or_else(|| agent_dir.join("insights"))
    }
}
