use crate::error::{EngineError, EngineResult};
use crate::state::mutation::{apply_mutation, Mutation};
use crate::state::GameState;
use rocket::serde::json::serde_json;
use rocket::serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct MutationLogEntry {
    pub seq: u64,
    pub mutation: Mutation,
}

/// Ordered record of every primitive mutation applied to a match.
#[derive(Debug)]
pub struct MutationLog {
    pub entries: Arc<Mutex<Vec<MutationLogEntry>>>,
    pub seq: AtomicU64,
}

impl Clone for MutationLog {
    fn clone(&self) -> Self {
        let entries_vec = self.entries();
        MutationLog {
            entries: Arc::new(Mutex::new(entries_vec)),
            seq: AtomicU64::new(self.seq.load(Ordering::SeqCst)),
        }
    }
}

impl Default for MutationLog {
    fn default() -> Self {
        MutationLog::new()
    }
}

impl MutationLog {
    pub fn new() -> Self {
        MutationLog {
            entries: Arc::new(Mutex::new(Vec::new())),
            seq: AtomicU64::new(0),
        }
    }

    /// Append a mutation, assigning the next sequence number.
    pub fn append(&self, mutation: Mutation) -> MutationLogEntry {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let entry = MutationLogEntry { seq, mutation };
        match self.entries.lock() {
            Ok(mut g) => g.push(entry.clone()),
            Err(e) => e.into_inner().push(entry.clone()),
        }
        entry
    }

    pub fn entries(&self) -> Vec<MutationLogEntry> {
        match self.entries.lock() {
            Ok(g) => g.clone(),
            Err(e) => e.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(g) => g.len(),
            Err(e) => e.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One JSON object per line, in sequence order.
    pub fn to_json_lines(&self) -> EngineResult<String> {
        let mut out = String::new();
        for entry in self.entries() {
            let line = serde_json::to_string(&entry)
                .map_err(|e| EngineError::internal(format!("cannot encode mutation: {}", e)))?;
            out.push_str(&line);
            out.push('\n');
        }
        Ok(out)
    }

    pub fn from_json_lines(raw: &str) -> EngineResult<MutationLog> {
        let log = MutationLog::new();
        let mut max_seq = 0u64;
        let mut entries = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: MutationLogEntry = serde_json::from_str(line)
                .map_err(|e| EngineError::data(format!("invalid mutation log line: {}", e)))?;
            max_seq = max_seq.max(entry.seq);
            entries.push(entry);
        }
        match log.entries.lock() {
            Ok(mut g) => *g = entries,
            Err(e) => *e.into_inner() = entries,
        }
        log.seq.store(max_seq, Ordering::SeqCst);
        Ok(log)
    }

    /// Re-apply every recorded mutation on top of `initial`.
    pub fn replay(&self, initial: &GameState) -> EngineResult<GameState> {
        self.entries()
            .iter()
            .try_fold(initial.clone(), |state, entry| {
                apply_mutation(&state, &entry.mutation)
            })
    }
}
