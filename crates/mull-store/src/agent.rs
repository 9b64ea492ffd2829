//! Agent namespace resolution.
//!
//! Each agent identifier owns a fully independent inquiry collection under
//! `<base>/agents/<agent>/inquiries.json`.

use std::env;
use std::path::{Path, PathBuf};

/// Default base directory for all mull storage.
pub fn default_base_dir() -> PathBuf {
    dirs_home().join(".mull")
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Sanitize an agent identifier for use as a directory name.
/// Empty input falls back to `main`.
pub fn sanitize_agent_id(id: &str) -> String {
    let sanitized: String = id
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        "main".to_string()
    } else {
        sanitized
    }
}

/// Directory holding one agent's collection.
pub fn agent_dir(base: &Path, agent_id: &str) -> PathBuf {
    base.join("agents").join(sanitize_agent_id(agent_id))
}
