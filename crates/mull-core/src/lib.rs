//! Inquiry lifecycle engine.
//!
//! Tracks open-ended inquiries through a fixed sequence of three delayed
//! reflective passes: create, wait for the configured delay, run the pass,
//! schedule the next one, mark terminal after pass 3. Pass state is a
//! tagged variant so illegal combinations cannot be represented.
//!
//! Zero I/O — pure state machine with no opinions about transport or
//! persistence. Callers supply every `now`.

pub mod inquiry;
pub mod prompt;
pub mod schedule;
pub mod time;

pub use inquiry::{Inquiry, InquiryStatus, PASS_COUNT, Pass, PassState};
pub use prompt::build_prompt;
pub use schedule::{PassPolicy, ScheduleConfig};
pub use time::{UnixMs, iso8601_to_unix_ms, now_unix_ms, unix_ms_to_iso8601};
