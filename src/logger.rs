use std::sync::{Arc, Mutex};

/// Destination for harness log lines.
///
/// Every component receives its sink at construction instead of reaching for
/// process-wide state, so tests can capture output with [`MemoryLog`].
pub trait LogSink: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
    fn debug(&self, message: &str);
}

pub type Log = Arc<dyn LogSink>;

/// Sink that prints one line per message, errors to stderr.
pub struct StdoutLog;

impl LogSink for StdoutLog {
    fn info(&self, message: &str) {
        println!("{}", message);
    }

    fn error(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn debug(&self, message: &str) {
        println!("{}", message);
    }
}

/// Sink that keeps every message in memory.
#[derive(Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryLog {
    pub fn new() -> MemoryLog {
        MemoryLog::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().unwrap().iter().any(|line| line.contains(needle))
    }
}

impl LogSink for MemoryLog {
    fn info(&self, message: &str) {
        self.lines.lock().unwrap().push(format!("INFO {}", message));
    }

    fn error(&self, message: &str) {
        self.lines.lock().unwrap().push(format!("ERROR {}", message));
    }

    fn debug(&self, message: &str) {
        self.lines.lock().unwrap().push(format!("DEBUG {}", message));
    }
}
