//! Human-readable status lines for each phase transition.
//!
//! The report is product output, separate from `tracing` diagnostics: every
//! line is kept for callers and tests, and optionally echoed to the terminal
//! as it happens.

use std::fmt;

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl StatusLevel {
    fn tag(self) -> &'static str {
        match self {
            StatusLevel::Info => "INFO",
            StatusLevel::Success => "OK",
            StatusLevel::Warning => "WARN",
            StatusLevel::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub level: StatusLevel,
    pub message: String,
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.level.tag(), self.message)
    }
}

#[derive(Debug, Default)]
pub struct Report {
    lines: Vec<StatusLine>,
    echo: bool,
}

impl Report {
    /// Collect lines without printing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect lines and print each one immediately (stdout for info/success,
    /// stderr for warnings and errors).
    pub fn echoing() -> Self {
        Self {
            lines: Vec::new(),
            echo: true,
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(StatusLevel::Info, message.into());
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(StatusLevel::Success, message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(StatusLevel::Warning, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(StatusLevel::Error, message.into());
    }

    pub fn lines(&self) -> &[StatusLine] {
        &self.lines
    }

    /// True if a line at `level` contains `needle`.
    pub fn contains(&self, level: StatusLevel, needle: &str) -> bool {
        self.lines
            .iter()
            .any(|line| line.level == level && line.message.contains(needle))
    }

    fn push(&mut self, level: StatusLevel, message: String) {
        match level {
            StatusLevel::Info | StatusLevel::Success => info!(target: "envsync::report", "{message}"),
            StatusLevel::Warning => warn!(target: "envsync::report", "{message}"),
            StatusLevel::Error => error!(target: "envsync::report", "{message}"),
        }
        let line = StatusLine { level, message };
        if self.echo {
            match level {
                StatusLevel::Info | StatusLevel::Success => println!("{line}"),
                StatusLevel::Warning | StatusLevel::Error => eprintln!("{line}"),
            }
        }
        self.lines.push(line);
    }
}
