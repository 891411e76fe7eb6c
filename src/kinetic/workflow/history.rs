// SPDX-License-Identifier: MIT

//! Workflow history rendering
//!
//! Completed runs of a session are flattened into `HistoryEntry` values and
//! rendered as a tagged text block that a step can hand to its agent:
//!
//! ```text
//! <workflow_history_context>
//! [run-1]
//! input: Hello, my name is Alice
//! output: Echo: Hello, my name is Alice
//!
//! </workflow_history_context>
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_HISTORY_HEADER: &str = "<workflow_history_context>";
pub const DEFAULT_HISTORY_FOOTER: &str = "</workflow_history_context>";

/// One completed run, as seen by later runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub input: String,
    pub output: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(input: impl Into<String>, output: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            timestamp,
        }
    }
}

/// Controls how history entries are rendered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryFormatOptions {
    /// Opening line of the block
    pub header: String,
    /// Closing line of the block
    pub footer: String,
    pub include_input: bool,
    pub include_output: bool,
    /// Append `(YYYY-MM-DD HH:MM:SS)` to every `[run-k]` line
    pub include_timestamp: bool,
    pub input_label: String,
    pub output_label: String,
}

impl Default for HistoryFormatOptions {
    fn default() -> Self {
        Self {
            header: DEFAULT_HISTORY_HEADER.to_string(),
            footer: DEFAULT_HISTORY_FOOTER.to_string(),
            include_input: true,
            include_output: true,
            include_timestamp: false,
            input_label: "input".to_string(),
            output_label: "output".to_string(),
        }
    }
}

/// Render history entries; an empty slice renders as an empty string.
///
/// Runs are numbered from 1 in the order given. Empty inputs or outputs are
/// omitted, and every run is followed by a blank line.
pub fn format_history(history: &[HistoryEntry], options: &HistoryFormatOptions) -> String {
    if history.is_empty() {
        return String::new();
    }

    let mut context = format!("{}\n", options.header);
    for (i, entry) in history.iter().enumerate() {
        let run_num = i + 1;
        if options.include_timestamp {
            context.push_str(&format!(
                "[run-{}] ({})\n",
                run_num,
                entry.timestamp.format("%Y-%m-%d %H:%M:%S")
            ));
        } else {
            context.push_str(&format!("[run-{}]\n", run_num));
        }

        if options.include_input && !entry.input.is_empty() {
            context.push_str(&format!("{}: {}\n", options.input_label, entry.input));
        }
        if options.include_output && !entry.output.is_empty() {
            context.push_str(&format!("{}: {}\n", options.output_label, entry.output));
        }
        context.push('\n');
    }
    context.push_str(&options.footer);
    context
}

/// Combine agent instructions with a rendered history block
pub fn build_enhanced_instructions(original: &str, history_context: &str) -> String {
    if history_context.is_empty() {
        return original.to_string();
    }
    if original.is_empty() {
        return history_context.to_string();
    }
    format!("{}\n\n{}", original, history_context)
}
