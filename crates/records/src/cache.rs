use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::backend::Record;
use crate::models::EntityKind;

/// Listing cache shared by every view of a session, keyed by table.
///
/// Entries are only ever replaced wholesale by a fresh fetch or dropped by
/// [`QueryCache::invalidate`]; nothing edits cached rows in place.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: Mutex<HashMap<EntityKind, Vec<Record>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EntityKind, Vec<Record>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, kind: EntityKind) -> Option<Vec<Record>> {
        self.lock().get(&kind).cloned()
    }

    pub fn put(&self, kind: EntityKind, rows: Vec<Record>) {
        self.lock().insert(kind, rows);
    }

    /// Drops the entry so the next read goes to the backend.
    /// Returns true if something was cached.
    pub fn invalidate(&self, kind: EntityKind) -> bool {
        let dropped = self.lock().remove(&kind).is_some();
        if dropped {
            debug!("Invalidated cached {} listing", kind);
        }
        dropped
    }

    pub fn is_cached(&self, kind: EntityKind) -> bool {
        self.lock().contains_key(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_put_get_invalidate() {
        let cache = QueryCache::new();
        assert!(cache.get(EntityKind::Posts).is_none());

        let mut row = Record::new();
        row.insert("id".into(), json!(1));
        cache.put(EntityKind::Posts, vec![row]);
        assert!(cache.is_cached(EntityKind::Posts));
        assert!(!cache.is_cached(EntityKind::Users));
        assert_eq!(cache.get(EntityKind::Posts).unwrap().len(), 1);

        assert!(cache.invalidate(EntityKind::Posts));
        assert!(!cache.invalidate(EntityKind::Posts));
        assert!(cache.get(EntityKind::Posts).is_none());
    }
}
