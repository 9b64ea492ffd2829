//! The polling driver.
//!
//! Single-threaded and cooperative: each tick asks the store for the one
//! due pass (if any), runs it through the generator, and reports the
//! result back. A failed generation is logged and dropped — the pass stays
//! due, so the system self-heals on a later poll.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use uuid::Uuid;

use mull_core::{Inquiry, now_unix_ms};
use mull_store::InquiryStore;

use crate::reflect::Generator;
use crate::writer;

/// Seam between the driver and the generation backend, so the poll logic
/// is testable without a live endpoint.
pub trait PassGenerator {
    async fn run_pass(
        &self,
        inquiry: &Inquiry,
        pass_number: u8,
        instruction: &str,
    ) -> Result<String>;
}

impl PassGenerator for Generator {
    async fn run_pass(
        &self,
        inquiry: &Inquiry,
        pass_number: u8,
        instruction: &str,
    ) -> Result<String> {
        Generator::run_pass(self, inquiry, pass_number, instruction).await
    }
}

/// Outcome of one poll step.
#[derive(Debug, PartialEq, Eq)]
pub enum Tick {
    /// Nothing due.
    Idle,
    Completed { id: Uuid, pass: u8 },
    /// Generation failed; the pass remains due.
    GenerationFailed { id: Uuid, pass: u8 },
}

/// One poll step: find the due pass, generate, record completion.
pub async fn tick(store: &mut InquiryStore, generator: &impl PassGenerator) -> Result<Tick> {
    let Some((id, pass)) = store.find_due_pass(now_unix_ms()) else {
        return Ok(Tick::Idle);
    };
    let Some(inquiry) = store.get(id).cloned() else {
        return Ok(Tick::Idle);
    };

    let instruction = store.schedule().prompt(pass);
    tracing::info!("running pass {pass} for inquiry {id}");

    match generator.run_pass(&inquiry, pass, &instruction).await {
        Ok(output) => {
            store
                .complete_pass(id, pass, &output, now_unix_ms())
                .context("failed to persist completed pass")?;
            tracing::info!("completed pass {pass} for inquiry {id}");
            Ok(Tick::Completed { id, pass })
        }
        Err(e) => {
            tracing::warn!("generation failed for inquiry {id} pass {pass}: {e:#}");
            Ok(Tick::GenerationFailed { id, pass })
        }
    }
}

/// Poll on an interval until interrupted, draining the export queue after
/// every completion.
pub async fn run(
    store: &mut InquiryStore,
    generator: &impl PassGenerator,
    growth_vectors: &Path,
    insights_dir: &Path,
    interval_secs: u64,
) -> Result<()> {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tracing::info!(
        "driver started for agent '{}' (poll every {interval_secs}s)",
        store.agent_id()
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Tick::Completed { .. } = tick(store, generator).await? {
                    writer::export_completed(
                        store,
                        growth_vectors,
                        insights_dir,
                        now_unix_ms(),
                    )?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, shutting down");
                return Ok(());
            }
        }
    }
}
