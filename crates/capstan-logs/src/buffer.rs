//! Fixed-size rolling build log with absolute line numbers

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A slice of a build log. `lines[i]` has absolute index `first_line_number + i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogChunk {
    pub first_line_number: i64,
    pub lines: Vec<String>,
}

impl LogChunk {
    /// Absolute index of the line after the last one in this chunk
    pub fn next_line_number(&self) -> i64 {
        self.first_line_number + self.lines.len() as i64
    }
}

/// Rolling window of the last `capacity` lines of an app's build output.
///
/// The window starts filled with empty placeholder slots numbered
/// `-capacity..0`, so real lines are numbered from 0. Every append evicts the
/// oldest slot. Line numbers only ever grow, and a new build does not reset them.
#[derive(Debug, Clone)]
pub struct BuildLog {
    capacity: usize,
    first_line_number: i64,
    lines: VecDeque<String>,
}

impl BuildLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            first_line_number: -(capacity as i64),
            lines: std::iter::repeat(String::new()).take(capacity).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Absolute index of the oldest retained slot
    pub fn first_line_number(&self) -> i64 {
        self.first_line_number
    }

    /// Absolute index the next appended line will get
    pub fn next_line_number(&self) -> i64 {
        self.first_line_number + self.lines.len() as i64
    }

    pub fn append(&mut self, line: impl Into<String>) {
        self.lines.push_back(line.into());
        if self.lines.len() > self.capacity {
            self.lines.pop_front();
            self.first_line_number += 1;
        }
    }

    pub fn append_lines<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for line in lines {
            self.append(line);
        }
    }

    /// Lines with an absolute index greater than `last_line_number_seen`.
    ///
    /// When lines the caller never saw were already evicted, the returned
    /// `first_line_number` is greater than `last_line_number_seen + 1`.
    pub fn fetch_since(&self, last_line_number_seen: i64) -> LogChunk {
        let start = self
            .first_line_number
            .max(last_line_number_seen.saturating_add(1))
            .min(self.next_line_number());
        let offset = (start - self.first_line_number) as usize;

        LogChunk {
            first_line_number: start,
            lines: self.lines.iter().skip(offset).cloned().collect(),
        }
    }

    /// The whole retained window, placeholders included
    pub fn snapshot(&self) -> LogChunk {
        LogChunk {
            first_line_number: self.first_line_number,
            lines: self.lines.iter().cloned().collect(),
        }
    }
}

impl Default for BuildLog {
    fn default() -> Self {
        Self::new(capstan_core::DEFAULT_BUILD_LOG_SIZE)
    }
}
