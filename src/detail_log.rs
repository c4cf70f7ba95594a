//! Structured per-match detail log.
//!
//! Entries are appended synchronously under a mutex and also forwarded to the
//! `log` facade at debug level. Sections are opened with
//! [`DetailLogger::begin_scope`]; the returned guard closes the section when
//! it is dropped, so nesting follows the enclosing operation exactly.

use rocket::serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(crate = "rocket::serde")]
pub enum DetailLogKind {
    Phase,
    Event,
    Skill,
    Mutation,
    Request,
    Io,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct DetailLogEntry {
    pub seq: u64,
    pub kind: DetailLogKind,
    pub message: String,
    pub depth: u64,
}

#[derive(Debug)]
struct Inner {
    entries: Mutex<Vec<DetailLogEntry>>,
    seq: AtomicU64,
    depth: AtomicU64,
    enabled: AtomicBool,
}

/// Cheap to clone; clones share the same entries.
#[derive(Debug, Clone)]
pub struct DetailLogger {
    inner: Arc<Inner>,
}

impl Default for DetailLogger {
    fn default() -> Self {
        DetailLogger::new()
    }
}

impl DetailLogger {
    pub fn new() -> Self {
        DetailLogger {
            inner: Arc::new(Inner {
                entries: Mutex::new(Vec::new()),
                seq: AtomicU64::new(0),
                depth: AtomicU64::new(0),
                enabled: AtomicBool::new(true),
            }),
        }
    }

    /// A logger that records nothing; used by previews.
    pub fn disabled() -> Self {
        let logger = DetailLogger::new();
        logger.inner.enabled.store(false, Ordering::SeqCst);
        logger
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    pub fn log(&self, kind: DetailLogKind, message: impl Into<String>) {
        if !self.is_enabled() {
            return;
        }
        let message = message.into();
        let depth = self.inner.depth.load(Ordering::SeqCst);
        let seq = self.inner.seq.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("[{:?}] {}{}", kind, "  ".repeat(depth as usize), message);
        let entry = DetailLogEntry {
            seq,
            kind,
            message,
            depth,
        };
        match self.inner.entries.lock() {
            Ok(mut g) => g.push(entry),
            Err(e) => e.into_inner().push(entry),
        }
    }

    /// Open a section; everything logged until the guard drops is nested under it.
    pub fn begin_scope(&self, kind: DetailLogKind, message: impl Into<String>) -> LogScope {
        self.log(kind, message);
        if self.is_enabled() {
            self.inner.depth.fetch_add(1, Ordering::SeqCst);
        }
        LogScope {
            inner: Arc::clone(&self.inner),
            active: self.is_enabled(),
        }
    }

    pub fn entries(&self) -> Vec<DetailLogEntry> {
        match self.inner.entries.lock() {
            Ok(g) => g.clone(),
            Err(e) => e.into_inner().clone(),
        }
    }
}

/// Closes its section on drop.
#[must_use]
pub struct LogScope {
    inner: Arc<Inner>,
    active: bool,
}

impl Drop for LogScope {
    fn drop(&mut self) {
        if self.active {
            self.inner.depth.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_nest_and_unwind() {
        let logger = DetailLogger::new();
        {
            let _outer = logger.begin_scope(DetailLogKind::Phase, "roll");
            logger.log(DetailLogKind::Event, "inside");
            {
                let _inner = logger.begin_scope(DetailLogKind::Skill, "skill");
                logger.log(DetailLogKind::Mutation, "deep");
            }
            logger.log(DetailLogKind::Event, "back");
        }
        logger.log(DetailLogKind::Other, "top");
        let depths: Vec<u64> = logger.entries().iter().map(|e| e.depth).collect();
        assert_eq!(depths, vec![0, 1, 1, 2, 1, 0]);
        let seqs: Vec<u64> = logger.entries().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn disabled_logger_records_nothing() {
        let logger = DetailLogger::disabled();
        let _scope = logger.begin_scope(DetailLogKind::Phase, "x");
        logger.log(DetailLogKind::Other, "y");
        assert!(logger.entries().is_empty());
    }
}
