use crate::error::{BenchmarkError, Result};
use crate::logger::LogSink;

use regex::Regex;
use std::fs;
use std::path::Path;

/// Read a benchmark log, tolerating non-UTF-8 bytes.
pub fn read_log_file(log_file: &Path) -> Result<String> {
    let bytes = fs::read(log_file)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Extract the reported performance value and its unit from a benchmark log.
///
/// The log must contain a line of the form `performance: <value> <unit>`.
///
/// # Returns
/// The performance value and the metric unit, both as written in the log.
pub fn parse_perf_metric(log_file: &Path, log: &dyn LogSink) -> Result<(String, String)> {
    if !log_file.exists() {
        let message = format!("Log file {} does not exist", log_file.display());
        log.error(&message);
        return Err(BenchmarkError::LogParse(message));
    }
    if fs::metadata(log_file)?.len() == 0 {
        let message = format!("Log file {} is empty", log_file.display());
        log.error(&message);
        return Err(BenchmarkError::LogParse(message));
    }

    let log_content = read_log_file(log_file)?;
    let pattern = Regex::new(r"performance:\s*([+-]?\d*\.?\d*)\s*(\w*)")?;
    match pattern.captures(&log_content) {
        Some(captures) => {
            let perf = captures.get(1).map(|m| m.as_str()).unwrap_or("").to_string();
            let metric = captures.get(2).map(|m| m.as_str()).unwrap_or("").to_string();
            Ok((perf, metric))
        }
        None => {
            let message = format!(
                "Log file {} does not contain performance",
                log_file.display()
            );
            log.error(&message);
            Err(BenchmarkError::LogParse(message))
        }
    }
}
