//! Per-app build logs

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::buffer::{BuildLog, LogChunk};

/// Shared handle on one app's build log
pub type SharedBuildLog = Arc<RwLock<BuildLog>>;

/// Map from app name to its build log. The map lock is held only for lookups,
/// so apps never wait on each other's log writes.
pub struct BuildLogRegistry {
    capacity: usize,
    logs: RwLock<HashMap<String, SharedBuildLog>>,
}

impl BuildLogRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            logs: RwLock::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Log for `app_name`, created on first use
    pub fn get_or_create(&self, app_name: &str) -> SharedBuildLog {
        if let Some(log) = self.logs.read().get(app_name) {
            return log.clone();
        }
        self.logs
            .write()
            .entry(app_name.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(BuildLog::new(self.capacity))))
            .clone()
    }

    /// Writer that appends to `app_name`'s log
    pub fn writer(&self, app_name: &str) -> BuildLogWriter {
        BuildLogWriter {
            app_name: app_name.to_string(),
            log: self.get_or_create(app_name),
        }
    }

    pub fn append_lines<I, S>(&self, app_name: &str, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.get_or_create(app_name).write().append_lines(lines);
    }

    /// Lines newer than `last_line_number_seen`. An app without a log yet reads
    /// as a fresh, empty one.
    pub fn fetch_since(&self, app_name: &str, last_line_number_seen: i64) -> LogChunk {
        match self.logs.read().get(app_name) {
            Some(log) => log.read().fetch_since(last_line_number_seen),
            None => BuildLog::new(self.capacity).fetch_since(last_line_number_seen),
        }
    }

    pub fn snapshot(&self, app_name: &str) -> LogChunk {
        match self.logs.read().get(app_name) {
            Some(log) => log.read().snapshot(),
            None => BuildLog::new(self.capacity).snapshot(),
        }
    }

    /// Drop an app's log. Writers still holding it keep a detached copy.
    pub fn remove(&self, app_name: &str) -> bool {
        let removed = self.logs.write().remove(app_name).is_some();
        if removed {
            debug!("Dropped build log for {}", app_name);
        }
        removed
    }

    pub fn contains(&self, app_name: &str) -> bool {
        self.logs.read().contains_key(app_name)
    }
}

impl Default for BuildLogRegistry {
    fn default() -> Self {
        Self::new(capstan_core::DEFAULT_BUILD_LOG_SIZE)
    }
}

/// Appends lines to one app's build log
#[derive(Clone)]
pub struct BuildLogWriter {
    app_name: String,
    log: SharedBuildLog,
}

impl BuildLogWriter {
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn line(&self, line: impl Into<String>) {
        let line = line.into();
        debug!("[{}] {}", self.app_name, line);
        self.log.write().append(line);
    }

    /// Append text that may span several lines
    pub fn text(&self, text: &str) {
        let mut log = self.log.write();
        for line in text.lines() {
            log.append(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_app_reads_as_empty() {
        let registry = BuildLogRegistry::new(10);
        let chunk = registry.snapshot("ghost");
        assert_eq!(chunk.first_line_number, -10);
        assert!(!registry.contains("ghost"));
    }

    #[test]
    fn test_writer_appends_to_shared_log() {
        let registry = BuildLogRegistry::new(10);
        let writer = registry.writer("api");
        writer.line("building");
        writer.text("step 1\nstep 2");

        let chunk = registry.fetch_since("api", -1);
        assert_eq!(chunk.first_line_number, 0);
        assert_eq!(chunk.lines, vec!["building", "step 1", "step 2"]);
    }

    #[test]
    fn test_apps_are_independent() {
        let registry = BuildLogRegistry::new(10);
        registry.append_lines("a", ["one"]);
        registry.append_lines("b", ["two", "three"]);

        assert_eq!(registry.fetch_since("a", -1).lines, vec!["one"]);
        assert_eq!(registry.fetch_since("b", -1).lines, vec!["two", "three"]);
    }

    #[test]
    fn test_log_survives_new_build() {
        let registry = BuildLogRegistry::new(10);
        registry.append_lines("a", ["build 1"]);
        registry.append_lines("a", ["build 2"]);
        assert_eq!(registry.fetch_since("a", 0).lines, vec!["build 2"]);
    }

    #[test]
    fn test_remove_drops_log() {
        let registry = BuildLogRegistry::new(10);
        registry.append_lines("a", ["x"]);
        assert!(registry.remove("a"));
        assert!(!registry.remove("a"));
        assert_eq!(registry.snapshot("a").first_line_number, -10);
    }
}
