//! Generator prompt composition.
//!
//! Pure string building: the preamble, the pass instruction, the inquiry
//! itself, and every prior completed pass output, joined by blank lines.
//! Zero I/O — the CLI hands the result to the generation backend.

use crate::inquiry::Inquiry;

const PREAMBLE: &str = "You are running a contemplative pass over a single inquiry.";
const CLOSING: &str = "Return concise but specific reflection text only.";

/// Build the full prompt for one pass over one inquiry.
///
/// Empty context renders as a literal `(none)` placeholder, and so does the
/// prior-passes section when no earlier pass has completed. Prior outputs
/// appear in ascending pass-number order.
pub fn build_prompt(inquiry: &Inquiry, pass_number: u8, instruction: &str) -> String {
    let prior: Vec<String> = inquiry
        .prior_outputs(pass_number)
        .map(|(number, output)| format!("Pass {number} output:\n{output}"))
        .collect();

    let context = if inquiry.context.is_empty() {
        "(none)"
    } else {
        &inquiry.context
    };

    let prior_section = if prior.is_empty() {
        "Prior passes: (none)".to_string()
    } else {
        format!("Prior passes:\n{}", prior.join("\n\n"))
    };

    [
        PREAMBLE.to_string(),
        format!("Pass: {pass_number}"),
        format!("Instruction: {instruction}"),
        format!("Inquiry: {}", inquiry.question),
        format!("Source: {}", inquiry.source),
        format!("Context:\n{context}"),
        prior_section,
        CLOSING.to_string(),
    ]
    .join("\n\n")
}
