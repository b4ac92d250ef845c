//! Client-side state for polling a build log

use capstan_core::{LOG_FOLLOWER_START, TRUNCATED_MARKER};

use crate::buffer::LogChunk;

/// Tracks what a poller has printed so far and turns fetched chunks into
/// printable lines. Never fails: gaps are reported with a marker line.
#[derive(Debug, Clone)]
pub struct LogFollower {
    last_line_number_printed: i64,
}

impl Default for LogFollower {
    fn default() -> Self {
        Self::new()
    }
}

impl LogFollower {
    pub fn new() -> Self {
        Self {
            last_line_number_printed: LOG_FOLLOWER_START,
        }
    }

    /// Value for the `since` query parameter of the next poll
    pub fn since(&self) -> i64 {
        self.last_line_number_printed - 1
    }

    /// Lines to print for a freshly fetched chunk
    pub fn process(&mut self, chunk: &LogChunk) -> Vec<String> {
        let first = chunk.first_line_number;
        let mut out = Vec::new();

        let skip = if first > self.last_line_number_printed {
            if first < 0 {
                // Leading empty slots of a log that never filled up
                (-first) as usize
            } else {
                out.push(TRUNCATED_MARKER.to_string());
                0
            }
        } else {
            (self.last_line_number_printed - first) as usize
        };

        out.extend(chunk.lines.iter().skip(skip).cloned());
        self.last_line_number_printed = self
            .last_line_number_printed
            .max(chunk.next_line_number());
        out
    }
}
