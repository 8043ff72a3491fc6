//! Non-blocking, keyed claims that keep two runs off the same resource.
//!
//! A claim either succeeds immediately or reports contention; nothing here
//! waits or retries. Claims are released when their guard is dropped.

use std::{
    collections::HashSet,
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::book::{BookId, FieldId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKey {
    Book(BookId),
    Field(FieldId),
    Geodata(FieldId),
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKey::Book(id) => write!(f, "tabular_extract_book_{id}"),
            LockKey::Field(id) => write!(f, "tabular_process_field_{id}"),
            LockKey::Geodata(id) => write!(f, "tabular_extract_geo_{id}"),
        }
    }
}

#[derive(Debug, Default)]
pub struct ProcessingLocks {
    held: Mutex<HashSet<LockKey>>,
}

impl ProcessingLocks {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the set cannot leave it half-updated.
    fn held(&self) -> MutexGuard<'_, HashSet<LockKey>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims `key`, or returns `None` when another run holds it.
    pub fn try_acquire(&self, key: LockKey) -> Option<LockGuard<'_>> {
        self.try_acquire_all(&[key])
    }

    /// Claims every key or none of them.
    pub fn try_acquire_all(&self, keys: &[LockKey]) -> Option<LockGuard<'_>> {
        let mut held = self.held();
        if keys.iter().any(|key| held.contains(key)) {
            return None;
        }
        held.extend(keys.iter().copied());
        Some(LockGuard {
            locks: self,
            keys: keys.to_vec(),
        })
    }

    pub fn is_held(&self, key: LockKey) -> bool {
        self.held().contains(&key)
    }
}

#[derive(Debug)]
pub struct LockGuard<'a> {
    locks: &'a ProcessingLocks,
    keys: Vec<LockKey>,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        let mut held = self.locks.held();
        for key in &self.keys {
            held.remove(key);
        }
    }
}
