//! Utility functions that don't have one place that they should live.

use miette::Report;
use serial_line::Config;

/// Add context to a specific error, where you can have like a list of
/// suggestions.
///
/// NOTE: we cannot reassign a reports severity, so your last items severity
///       is where the real severity gets taken.
pub fn add_context_to(
	original_error: Report,
	suggestions: impl DoubleEndedIterator<Item = Report>,
) -> Report {
	let mut latest_error: Option<Report> = None;

	for suggestion in suggestions.rev() {
		if let Some(last_error) = latest_error {
			latest_error = Some(last_error.wrap_err(suggestion));
		} else {
			latest_error = Some(suggestion);
		}
	}

	if let Some(latest) = latest_error {
		latest.wrap_err(original_error)
	} else {
		original_error
	}
}

/// Render bytes as space separated hex pairs.
pub fn hex_line(bytes: &[u8]) -> String {
	bytes
		.iter()
		.map(|byte| format!("{byte:02x}"))
		.collect::<Vec<_>>()
		.join(" ")
}

/// If reads with this configuration never wait for data.
///
/// With no minimum byte count, and no read timeout, POSIX reads return
/// immediately (and Windows clamps to a 1ms wait), so a read loop would spin.
pub fn reads_never_wait(config: &Config) -> bool {
	config.min_bytes == 0 && config.read_timeout.is_zero()
}
