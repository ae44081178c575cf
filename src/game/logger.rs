//! Game logger with verbosity levels and optional in-memory capture
//!
//! Carried by the rules engine, never stored in `GameState`. Text lines are
//! formatted in a reusable bump arena; JSON lines go through serde_json.

use crate::game::events::GameEvent;
use bumpalo::Bump;
use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefCell};
use std::fmt::Write as FmtWrite;
use std::ops::Deref;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    Silent = 0,
    Minimal = 1,
    #[default]
    Normal = 2,
    Verbose = 3,
}

impl FromStr for VerbosityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "silent" | "0" => Ok(VerbosityLevel::Silent),
            "minimal" | "1" => Ok(VerbosityLevel::Minimal),
            "normal" | "2" => Ok(VerbosityLevel::Normal),
            "verbose" | "3" => Ok(VerbosityLevel::Verbose),
            _ => Err(format!("invalid verbosity level: {}", s)),
        }
    }
}

/// Output format for log messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Output destination for log messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputMode {
    #[default]
    Stdout,
    /// Capture only to the in-memory buffer
    Memory,
    Both,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub level: VerbosityLevel,
    pub message: String,
    /// e.g. "event", "step", "resolve"
    pub category: Option<String>,
}

/// Read-only view of captured entries
pub struct LogGuard<'a> {
    guard: Ref<'a, Vec<LogEntry>>,
}

impl<'a> LogGuard<'a> {
    pub fn iter(&self) -> std::slice::Iter<'_, LogEntry> {
        self.guard.iter()
    }

    pub fn len(&self) -> usize {
        self.guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard.is_empty()
    }
}

impl<'a> Deref for LogGuard<'a> {
    type Target = [LogEntry];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

pub struct GameLogger {
    verbosity: VerbosityLevel,
    output_mode: OutputMode,
    output_format: OutputFormat,
    format_bump: RefCell<Bump>,
    log_buffer: RefCell<Vec<LogEntry>>,
}

impl GameLogger {
    pub fn new() -> Self {
        Self::with_verbosity(VerbosityLevel::default())
    }

    pub fn with_verbosity(verbosity: VerbosityLevel) -> Self {
        GameLogger {
            verbosity,
            output_mode: OutputMode::default(),
            output_format: OutputFormat::default(),
            format_bump: RefCell::new(Bump::new()),
            log_buffer: RefCell::new(Vec::new()),
        }
    }

    /// Logger that records everything in memory and prints nothing
    pub fn capturing() -> Self {
        let mut logger = Self::with_verbosity(VerbosityLevel::Verbose);
        logger.enable_capture();
        logger
    }

    pub fn set_output_mode(&mut self, mode: OutputMode) {
        self.output_mode = mode;
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output_mode
    }

    pub fn enable_capture(&mut self) {
        self.output_mode = OutputMode::Memory;
    }

    pub fn disable_capture(&mut self) {
        self.output_mode = OutputMode::Stdout;
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self.output_mode, OutputMode::Memory | OutputMode::Both)
    }

    pub fn logs(&self) -> LogGuard<'_> {
        LogGuard {
            guard: self.log_buffer.borrow(),
        }
    }

    pub fn get_logs(&self) -> Vec<LogEntry> {
        self.log_buffer.borrow().clone()
    }

    pub fn clear_logs(&mut self) {
        self.log_buffer.borrow_mut().clear();
    }

    /// Print captured entries to stdout and clear the buffer
    pub fn flush_buffer(&mut self) {
        let entries: Vec<LogEntry> = self.log_buffer.borrow_mut().drain(..).collect();
        for entry in entries {
            if entry.level <= self.verbosity {
                self.write_stdout(&entry);
            }
        }
    }

    pub fn set_output_format(&mut self, format: OutputFormat) {
        self.output_format = format;
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        self.verbosity
    }

    pub fn set_verbosity(&mut self, verbosity: VerbosityLevel) {
        self.verbosity = verbosity;
    }

    fn write_stdout(&self, entry: &LogEntry) {
        match self.output_format {
            OutputFormat::Text => {
                let mut bump = self.format_bump.borrow_mut();
                bump.reset();
                let mut line = bumpalo::collections::String::new_in(&bump);
                if let Some(category) = &entry.category {
                    let _ = write!(line, "[{}] ", category);
                }
                line.push_str(&entry.message);
                println!("{}", line);
            }
            OutputFormat::Json => match serde_json::to_string(entry) {
                Ok(json) => println!("{}", json),
                Err(_) => println!("{}", entry.message),
            },
        }
    }

    fn log(&self, level: VerbosityLevel, category: Option<&str>, message: &str) {
        let capture = self.is_capturing();
        let output = matches!(self.output_mode, OutputMode::Stdout | OutputMode::Both);
        if level > self.verbosity && !capture {
            return;
        }
        let entry = LogEntry {
            level,
            message: message.to_string(),
            category: category.map(str::to_string),
        };
        if output && level <= self.verbosity {
            self.write_stdout(&entry);
        }
        if capture {
            self.log_buffer.borrow_mut().push(entry);
        }
    }

    #[inline]
    pub fn minimal(&self, message: &str) {
        self.log(VerbosityLevel::Minimal, None, message);
    }

    #[inline]
    pub fn normal(&self, message: &str) {
        self.log(VerbosityLevel::Normal, None, message);
    }

    #[inline]
    pub fn verbose(&self, message: &str) {
        self.log(VerbosityLevel::Verbose, None, message);
    }

    pub fn categorized(&self, level: VerbosityLevel, category: &str, message: &str) {
        self.log(level, Some(category), message);
    }

    /// Log an emitted game event at Verbose
    pub fn event(&self, event: &GameEvent) {
        if VerbosityLevel::Verbose > self.verbosity && !self.is_capturing() {
            return;
        }
        let message = match self.output_format {
            OutputFormat::Text => event.to_string(),
            OutputFormat::Json => serde_json::to_string(event).unwrap_or_else(|_| event.to_string()),
        };
        self.log(VerbosityLevel::Verbose, Some("event"), &message);
    }
}

impl Default for GameLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GameLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameLogger")
            .field("verbosity", &self.verbosity)
            .field("output_mode", &self.output_mode)
            .field("output_format", &self.output_format)
            .field("buffered", &self.log_buffer.borrow().len())
            .finish()
    }
}

impl Clone for GameLogger {
    /// Clones the settings; captured entries are not copied
    fn clone(&self) -> Self {
        GameLogger {
            verbosity: self.verbosity,
            output_mode: self.output_mode,
            output_format: self.output_format,
            format_bump: RefCell::new(Bump::new()),
            log_buffer: RefCell::new(Vec::new()),
        }
    }
}
