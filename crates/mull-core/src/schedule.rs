//! Per-pass scheduling policy.
//!
//! A `ScheduleConfig` maps pass numbers to a delay and an instruction
//! string. Pure lookups only — the store consults this whenever a pass is
//! created or advanced, so delay policy can be swapped or tested without
//! touching persistence.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Configuration for a single reflective pass.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PassPolicy {
    /// Delay between the previous pass completing (or the inquiry being
    /// created, for pass 1) and this pass becoming due.
    #[serde(default)]
    pub delay_ms: u64,
    /// Instruction text handed to the generator for this pass.
    #[serde(default)]
    pub prompt: String,
}

/// Pass-number → policy map. Keys are strings (`"1"`, `"2"`, `"3"`) so the
/// same shape works as a TOML table and in persisted JSON config.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleConfig(pub BTreeMap<String, PassPolicy>);

impl ScheduleConfig {
    /// Configured delay for a pass, or 0 if absent. Never negative by type.
    pub fn delay_ms(&self, pass: u8) -> u64 {
        self.0
            .get(&pass.to_string())
            .map(|p| p.delay_ms)
            .unwrap_or(0)
    }

    /// Configured instruction for a pass, or a bare `"Pass N"` fallback.
    pub fn prompt(&self, pass: u8) -> String {
        self.0
            .get(&pass.to_string())
            .map(|p| p.prompt.clone())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| format!("Pass {pass}"))
    }

    /// Convenience constructor for tests and defaults.
    pub fn from_delays(delays: &[(u8, u64)]) -> Self {
        Self(
            delays
                .iter()
                .map(|&(n, delay_ms)| {
                    (
                        n.to_string(),
                        PassPolicy {
                            delay_ms,
                            prompt: String::new(),
                        },
                    )
                })
                .collect(),
        )
    }
}
