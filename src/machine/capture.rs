//! In-memory log drain for tests.

use std::sync::{Arc, Mutex};

use slog::{o, Drain, Level, Logger, Never, OwnedKVList, Record};

/// Collects (level, message) pairs of every record it receives.
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<(Level, String)>>>);

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logger(&self) -> Logger {
        Logger::root(self.clone(), o!())
    }

    pub fn records(&self) -> Vec<(Level, String)> {
        self.0.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of records at `level` with message `msg`.
    pub fn count(&self, level: Level, msg: &str) -> usize {
        self.records()
            .iter()
            .filter(|(l, m)| *l == level && m == msg)
            .count()
    }

    pub fn count_level(&self, level: Level) -> usize {
        self.records().iter().filter(|(l, _)| *l == level).count()
    }
}

impl Drain for Capture {
    type Ok = ();
    type Err = Never;

    fn log(&self, record: &Record, _values: &OwnedKVList) -> Result<(), Never> {
        if let Ok(mut records) = self.0.lock() {
            records.push((record.level(), record.msg().to_string()));
        }
        Ok(())
    }
}
