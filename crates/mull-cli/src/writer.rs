//! Export collaborator: externalizes completed inquiries.
//!
//! Two artifacts per inquiry: an entry appended to the agent's
//! growth-vector document (the distilled insight from pass 3) and a
//! standalone JSON file holding the full inquiry record. After both are
//! written the inquiry is flagged `persisted` in the store.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use mull_core::{Inquiry, UnixMs, unix_ms_to_iso8601};
use mull_store::InquiryStore;

/// Append-only growth-vector document: `{ "vectors": [...], "updated": ... }`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct GrowthVectorDoc {
    #[serde(default)]
    vectors: Vec<GrowthVector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrowthVector {
    id: String,
    inquiry_id: String,
    question: String,
    source: String,
    entropy: f64,
    /// Pass-3 output — the distilled result of the whole ladder.
    insight: String,
    completed: String,
    created: String,
}

impl GrowthVector {
    fn from_inquiry(inquiry: &Inquiry, now: UnixMs) -> Self {
        Self {
            id: format!("gv_{}", inquiry.id),
            inquiry_id: inquiry.id.to_string(),
            question: inquiry.question.clone(),
            source: inquiry.source.clone(),
            entropy: inquiry.entropy,
            insight: inquiry
                .pass(3)
                .and_then(|p| p.output())
                .unwrap_or_default()
                .to_string(),
            completed: unix_ms_to_iso8601(inquiry.completed.unwrap_or(now)),
            created: unix_ms_to_iso8601(inquiry.created),
        }
    }
}

/// Append one inquiry's growth vector, creating the document (and its
/// parent directory) on first use. An unparseable existing document is
/// replaced rather than failing the export.
pub fn append_growth_vector(path: &Path, inquiry: &Inquiry, now: UnixMs) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut doc = match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
        Err(_) => GrowthVectorDoc::default(),
    };

    doc.vectors.push(GrowthVector::from_inquiry(inquiry, now));
    doc.updated = Some(unix_ms_to_iso8601(now));

    let json = serde_json::to_string_pretty(&doc)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Write the full inquiry record to `<dir>/<id>.json`.
pub fn write_insight_file(dir: &Path, inquiry: &Inquiry) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(format!("{}.json", inquiry.id));
    let json = serde_json::to_string_pretty(inquiry)?;
    fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Drain the store's export queue: write both artifacts for every
/// completed, unexported inquiry, then flag each as exported. Returns the
/// number externalized.
pub fn export_completed(
    store: &mut InquiryStore,
    growth_vectors: &Path,
    insights_dir: &Path,
    now: UnixMs,
) -> Result<usize> {
    let pending: Vec<Inquiry> = store
        .list_completed_unexported()
        .into_iter()
        .cloned()
        .collect();

    for inquiry in &pending {
        append_growth_vector(growth_vectors, inquiry, now)?;
        write_insight_file(insights_dir, inquiry)?;
        store
            .mark_exported(inquiry.id)
            .with_context(|| format!("failed to flag inquiry {} as exported", inquiry.id))?;
        tracing::info!("exported inquiry {} ({})", inquiry.id, inquiry.question);
    }

    Ok(pending.len())
}
