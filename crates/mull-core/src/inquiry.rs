//! Inquiry lifecycle state machine.
//!
//! An inquiry carries exactly three reflective passes that run strictly in
//! order. Each pass is a tagged state — unscheduled, scheduled, or
//! completed — so an illegal combination (completed but never scheduled,
//! output without completion) is unrepresentable. All transitions are pure:
//! the caller supplies `now`, nothing here reads a clock or touches disk.

use serde::{Deserialize, Serialize};
use serde::de::Error as _;
use uuid::Uuid;

use crate::schedule::ScheduleConfig;
use crate::time::{self, UnixMs, iso8601_to_unix_ms, unix_ms_to_iso8601};

/// Number of reflective passes per inquiry. Fixed by the lifecycle: the
/// pass skeleton is created atomically and never grows or shrinks.
pub const PASS_COUNT: u8 = 3;

/// Where a single pass is in its life.
#[derive(Clone, Debug, PartialEq)]
pub enum PassState {
    /// Predecessor has not completed yet.
    Unscheduled,
    /// Eligible to run at or after the given instant.
    Scheduled(UnixMs),
    /// Ran and produced output. Terminal for the pass.
    Completed { at: UnixMs, output: String },
}

/// One reflective processing step within an inquiry.
#[derive(Clone, Debug, PartialEq)]
pub struct Pass {
    pub number: u8,
    pub state: PassState,
}

impl Pass {
    /// Scheduled instant, if the pass is currently scheduled.
    pub fn scheduled_at(&self) -> Option<UnixMs> {
        match self.state {
            PassState::Scheduled(at) => Some(at),
            _ => None,
        }
    }

    /// Completion instant, if the pass has run.
    pub fn completed_at(&self) -> Option<UnixMs> {
        match self.state {
            PassState::Completed { at, .. } => Some(at),
            _ => None,
        }
    }

    /// Output text, if the pass has run.
    pub fn output(&self) -> Option<&str> {
        match &self.state {
            PassState::Completed { output, .. } => Some(output),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InquiryStatus {
    InProgress,
    Completed,
}

/// A tracked question undergoing staged reflective processing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Inquiry {
    pub id: Uuid,
    pub question: String,
    pub source: String,
    pub entropy: f64,
    pub context: String,
    pub passes: Vec<Pass>,
    /// Reserved for external annotation; never touched by the core.
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: InquiryStatus,
    #[serde(with = "time::serde_iso")]
    pub created: UnixMs,
    #[serde(
        default,
        with = "time::serde_iso_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed: Option<UnixMs>,
    /// Set by the export collaborator after externalizing; monotonic.
    #[serde(default)]
    pub persisted: bool,
}

impl Inquiry {
    /// Build the three-pass skeleton: pass 1 scheduled at
    /// `now + delay(1)`, passes 2 and 3 unscheduled.
    ///
    /// Non-finite entropy is coerced to 0.
    pub fn new(
        question: impl Into<String>,
        source: impl Into<String>,
        entropy: f64,
        context: impl Into<String>,
        schedule: &ScheduleConfig,
        now: UnixMs,
    ) -> Self {
        let mut passes = Vec::with_capacity(PASS_COUNT as usize);
        passes.push(Pass {
            number: 1,
            // Saturating: an extreme configured delay means "never due",
            // not a wrapped-to-the-past timestamp.
            state: PassState::Scheduled(now.saturating_add(schedule.delay_ms(1))),
        });
        for number in 2..=PASS_COUNT {
            passes.push(Pass {
                number,
                state: PassState::Unscheduled,
            });
        }

        Self {
            id: Uuid::new_v4(),
            question: question.into(),
            source: source.into(),
            entropy: if entropy.is_finite() { entropy } else { 0.0 },
            context: context.into(),
            passes,
            tags: Vec::new(),
            status: InquiryStatus::InProgress,
            created: now,
            completed: None,
            persisted: false,
        }
    }

    pub fn pass(&self, number: u8) -> Option<&Pass> {
        self.passes.iter().find(|p| p.number == number)
    }

    /// Lowest-numbered pass whose scheduled time has arrived.
    ///
    /// Never reports a pass of a completed inquiry, an unscheduled pass, or
    /// one already completed. Because passes schedule strictly in sequence,
    /// at most one pass per inquiry can ever be due.
    pub fn due_pass(&self, now: UnixMs) -> Option<u8> {
        if self.status != InquiryStatus::InProgress {
            return None;
        }
        self.passes.iter().find_map(|p| match p.state {
            PassState::Scheduled(at) if at <= now => Some(p.number),
            _ => None,
        })
    }

    /// Record a pass's output and advance the state machine.
    ///
    /// Stamps the pass `Completed` at `now`. If a successor pass exists it
    /// becomes `Scheduled(now + delay(successor))`; otherwise the whole
    /// inquiry flips to `Completed` and its completion timestamp is set.
    ///
    /// Returns false — with no mutation — for an unknown pass number or a
    /// pass that already completed (a completed pass is never re-stamped).
    pub fn complete_pass(
        &mut self,
        number: u8,
        output: impl Into<String>,
        schedule: &ScheduleConfig,
        now: UnixMs,
    ) -> bool {
        let Some(pass) = self.passes.iter_mut().find(|p| p.number == number) else {
            return false;
        };
        if matches!(pass.state, PassState::Completed { .. }) {
            return false;
        }
        pass.state = PassState::Completed {
            at: now,
            output: output.into(),
        };

        let next = number + 1;
        if let Some(next_pass) = self.passes.iter_mut().find(|p| p.number == next) {
            next_pass.state = PassState::Scheduled(now.saturating_add(schedule.delay_ms(next)));
        } else {
            self.status = InquiryStatus::Completed;
            self.completed = Some(now);
        }
        true
    }

    /// Completed pass outputs with numbers strictly below `before`, in
    /// ascending pass order. Used for prompt composition.
    pub fn prior_outputs(&self, before: u8) -> impl Iterator<Item = (u8, &str)> {
        self.passes.iter().filter_map(move |p| {
            if p.number >= before {
                return None;
            }
            p.output().map(|out| (p.number, out))
        })
    }
}

// --- Wire shape ---
//
// Persisted JSON keeps the nullable-field layout of the stored document:
// `{ number, scheduled, completed, output }` with ISO-8601 strings. The
// tagged PassState maps to and from that shape here.

#[derive(Serialize, Deserialize)]
struct WirePass {
    number: u8,
    scheduled: Option<String>,
    completed: Option<String>,
    output: Option<String>,
}

impl Serialize for Pass {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match &self.state {
            PassState::Unscheduled => WirePass {
                number: self.number,
                scheduled: None,
                completed: None,
                output: None,
            },
            PassState::Scheduled(at) => WirePass {
                number: self.number,
                scheduled: Some(unix_ms_to_iso8601(*at)),
                completed: None,
                output: None,
            },
            PassState::Completed { at, output } => WirePass {
                number: self.number,
                // A completed pass keeps no meaningful schedule; the
                // completion timestamp alone describes its state.
                scheduled: None,
                completed: Some(unix_ms_to_iso8601(*at)),
                output: Some(output.clone()),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Pass {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WirePass::deserialize(deserializer)?;
        let parse = |s: &str| {
            iso8601_to_unix_ms(s)
                .ok_or_else(|| D::Error::custom(format!("invalid ISO-8601 timestamp: {s}")))
        };

        let state = if let Some(at) = &wire.completed {
            PassState::Completed {
                at: parse(at)?,
                output: wire.output.unwrap_or_default(),
            }
        } else if let Some(at) = &wire.scheduled {
            PassState::Scheduled(parse(at)?)
        } else {
            PassState::Unscheduled
        };

        Ok(Pass {
            number: wire.number,
            state,
        })
    }
}
