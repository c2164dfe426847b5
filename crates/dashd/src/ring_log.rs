//! Bounded in-memory log with a paired on-disk file.

use std::collections::VecDeque;
use std::fs::File;
use std::io::Write;

/// Maximum number of lines retained in memory per agent.
pub const MAX_LOG_LINES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl LogStream {
    pub fn prefix(self) -> &'static str {
        match self {
            LogStream::Stdout => "[STDOUT]",
            LogStream::Stderr => "[STDERR]",
        }
    }
}

/// FIFO of prefixed log lines; the oldest line is discarded on overflow.
///
/// Every append is also written to the attached log file with a trailing
/// newline. File writes are best-effort: a failure is logged to the process
/// error stream and never fails the append.
#[derive(Debug, Default)]
pub struct RingLog {
    lines: VecDeque<String>,
    file: Option<File>,
}

impl RingLog {
    pub fn new(file: Option<File>) -> Self {
        Self {
            lines: VecDeque::new(),
            file,
        }
    }

    pub fn attach_file(&mut self, file: File) {
        self.file = Some(file);
    }

    /// Drop the file handle, closing the on-disk log.
    pub fn close_file(&mut self) {
        self.file = None;
    }

    pub fn append(&mut self, stream: LogStream, text: &str) {
        let text = text.trim_end_matches(['\r', '\n']);
        let line = format!("{} {}", stream.prefix(), text);

        if self.lines.len() == MAX_LOG_LINES {
            self.lines.pop_front();
        }
        self.lines.push_back(line.clone());

        if let Some(file) = self.file.as_mut() {
            if let Err(err) = writeln!(file, "{line}") {
                eprintln!("[supervisor] failed to append agent log line: {err}");
            }
        }
    }

    /// Copy of the trailing `count` lines (clamped to the buffer length).
    pub fn tail(&self, count: usize) -> Vec<String> {
        let skip = self.lines.len().saturating_sub(count);
        self.lines.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
