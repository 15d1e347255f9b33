//! Info report decoding
//!
//! The `info` command answers with a bulk payload of `key:value` lines,
//! grouped under `# Section` comment lines.

use std::collections::BTreeMap;

/// Command text that triggers structured decoding (exact, case-sensitive)
pub const INFO_COMMAND: &str = "info";

/// Whether a command's reply should be decoded as an info report
pub fn is_info_command(command: &str) -> bool {
    command == INFO_COMMAND
}

/// Parse an info report into its fields
///
/// Empty lines, `#` comment lines and lines without a `:` are skipped. Each
/// line is split at its first `:`; the value is kept as-is.
pub fn decode_info(payload: &str) -> BTreeMap<String, String> {
    payload
        .lines()
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
