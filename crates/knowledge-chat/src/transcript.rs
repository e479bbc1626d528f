//! Plain-text rendering of a conversation for line-oriented front ends.

use std::fmt::Write;

use knowledge_core::config::ChatConfig;

use crate::turn::{Turn, TurnStatus};

pub const WELCOME_TEXT: &str = "Ask me anything about your studies!";
pub const THINKING_MARKER: &str = "thinking...";

/// Render every turn in order, or the welcome text when there are none.
pub fn render_transcript(turns: &[Turn], config: &ChatConfig) -> String {
    if turns.is_empty() {
        return format!("{WELCOME_TEXT}\n");
    }

    let mut out = String::new();
    for (index, turn) in turns.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        out.push_str(&render_turn(index + 1, turn, config));
    }
    out
}

/// Render a single turn. `number` is the one-based label used by `/regen N`.
pub fn render_turn(number: usize, turn: &Turn, config: &ChatConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "[{number}] You asked: {}", turn.query());

    match turn.status() {
        TurnStatus::Pending => {
            let _ = writeln!(out, "    {THINKING_MARKER}");
        }
        TurnStatus::Resolved => {
            for line in turn.answer().unwrap_or_default().lines() {
                let _ = writeln!(out, "    {line}");
            }
        }
        TurnStatus::Failed => {
            let message = turn.failure_message(config);
            let _ = writeln!(out, "    {message} (/regen {number} to retry)");
        }
    }
    out
}
