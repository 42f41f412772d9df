// src/core/logctx.rs

//! Scoped, per-branch log context.
//!
//! A [`LogContext`] is a cheap value carrying its own verbosity stack: each
//! nested scope clones the context with one more level pushed, and leaving
//! the scope is just dropping the clone. Because every parallel branch owns
//! its clone, no branch ever sees another branch's verbosity and there is
//! nothing to unwind on early exit.

use colored::Colorize;
use log::Level;
use std::sync::Arc;

/// Destination for rendered log lines. Implementations must be shareable
/// across threads since stage execution is parallel.
pub trait LogSink: Send + Sync {
    fn write(&self, level: Level, message: &str);
}

/// Default sink: colored lines on stderr.
#[derive(Debug)]
pub struct StderrSink;

impl LogSink for StderrSink {
    fn write(&self, level: Level, message: &str) {
        let line = match level {
            Level::Error => format!("{} {}", "error:".red().bold(), message),
            Level::Warn => format!("{} {}", "warning:".yellow().bold(), message),
            Level::Info => message.to_string(),
            Level::Debug | Level::Trace => message.dimmed().to_string(),
        };
        eprintln!("{line}");
    }
}

#[derive(Clone)]
pub struct LogContext {
    sink: Arc<dyn LogSink>,
    /// Verbosity thresholds, innermost last. Never empty.
    stack: Vec<Level>,
}

impl std::fmt::Debug for LogContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogContext")
            .field("stack", &self.stack)
            .finish_non_exhaustive()
    }
}

impl LogContext {
    pub fn new(sink: Arc<dyn LogSink>, level: Level) -> Self {
        Self {
            sink,
            stack: vec![level],
        }
    }

    pub fn stderr(level: Level) -> Self {
        Self::new(Arc::new(StderrSink), level)
    }

    /// The active verbosity threshold (the innermost scope's).
    pub fn level(&self) -> Level {
        self.stack.last().copied().unwrap_or(Level::Info)
    }

    /// A child context with `level` pushed. The parent is untouched, so
    /// sibling scopes, parallel or not, never affect each other.
    pub fn scoped(&self, level: Level) -> Self {
        let mut child = self.clone();
        child.stack.push(level);
        child
    }

    /// Emits `message` if `level` is within the active threshold.
    pub fn log(&self, level: Level, message: &str) {
        if level <= self.level() {
            self.sink.write(level, message);
        }
    }

    pub fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }
}
