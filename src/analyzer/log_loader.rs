//! Reading saved event logs from disk or any buffered reader.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::log_parser::parse_log_line;
use super::types::ParsedLog;

/// Buffer size for reading log files (8KB).
const BUFFER_SIZE: usize = 8 * 1024;

/// Read and parse every line of the log file at `path`.
///
/// Blank lines are ignored; lines that are not event log entries (summaries,
/// logger noise) are counted as skipped.
pub fn load_log_file(path: &Path) -> Result<ParsedLog, std::io::Error> {
    let file = File::open(path)?;
    read_log(BufReader::with_capacity(BUFFER_SIZE, file))
}

/// Parse a log from any buffered source.
pub fn read_log<R: BufRead>(reader: R) -> Result<ParsedLog, std::io::Error> {
    let mut parsed = ParsedLog::default();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        parsed.total_lines += 1;
        match parse_log_line(&line) {
            Some(entry) => parsed.entries.push(entry),
            None => {
                log::trace!("Skipping line: {}", line);
                parsed.skipped_lines += 1;
            }
        }
    }
    log::debug!("Parsed {} of {} log lines", parsed.entries.len(), parsed.total_lines);
    Ok(parsed)
}
