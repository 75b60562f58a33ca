//! Process-wide symbol interning registry (§3, §9).
//!
//! Ids are dense, monotonically assigned `u32`s; `0` is reserved/unset.
//! The registry is a plain mutex-guarded bidirectional map, matching the
//! single-mutex style the design doc calls for in §5 ("Symbol registry:
//! guarded by a single mutex; read-only after warm-up in practice") — a
//! shared `Arc<SymbolRegistry>` handle is threaded through the engine
//! rather than reached for as a global singleton.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Dense interned symbol identifier. `0` means "unset".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SymbolId(u32);

impl SymbolId {
    pub const UNSET: SymbolId = SymbolId(0);

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn is_unset(self) -> bool {
        self.0 == 0
    }
}

#[derive(Default)]
struct Inner {
    by_name: HashMap<String, SymbolId>,
    by_id: Vec<String>,
}

/// Thread-safe string <-> id registry, intended to live for the process
/// (or for the lifetime of one engine run) behind an `Arc`.
#[derive(Clone)]
pub struct SymbolRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        // index 0 is reserved, so `by_id[0]` is a sentinel placeholder.
        let inner = Inner {
            by_name: HashMap::new(),
            by_id: vec![String::new()],
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Return the id for `name`, assigning a new one if unseen.
    pub fn intern(&self, name: &str) -> SymbolId {
        let mut guard = self.inner.lock();
        if let Some(id) = guard.by_name.get(name) {
            return *id;
        }
        let id = SymbolId(guard.by_id.len() as u32);
        guard.by_id.push(name.to_string());
        guard.by_name.insert(name.to_string(), id);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.inner.lock().by_name.get(name).copied()
    }

    pub fn name(&self, id: SymbolId) -> Option<String> {
        let guard = self.inner.lock();
        guard.by_id.get(id.0 as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().by_id.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SymbolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
