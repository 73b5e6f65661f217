//! Result extraction from captured kernel logs.
//!
//! The kernel binary reports through its log alone: a `Time= <value> <unit>`
//! line carrying the measured latency, and a `Pass` marker when its own
//! verification succeeded.

use crate::error::ParseError;

pub const LATENCY_MARKER: &str = "Time=";
pub const SUCCESS_MARKER: &str = "Pass";

/// Latency from the first line containing [`LATENCY_MARKER`].
///
/// The value is the second-to-last whitespace-separated field, so
/// `"... Time= 12.34 ms"` yields `12.34`.
pub fn extract_latency(log: &str) -> Result<f64, ParseError> {
    let line = log
        .lines()
        .find(|line| line.contains(LATENCY_MARKER))
        .ok_or(ParseError::MissingLatency {
            marker: LATENCY_MARKER,
        })?;

    let fields: Vec<&str> = line.split_whitespace().collect();
    fields
        .len()
        .checked_sub(2)
        .and_then(|idx| fields[idx].parse::<f64>().ok())
        .ok_or_else(|| ParseError::MalformedLatency {
            line: line.trim().to_string(),
        })
}

/// Whether the kernel reported a passing self-check anywhere in its log.
pub fn extract_success(log: &str) -> bool {
    log.contains(SUCCESS_MARKER)
}
