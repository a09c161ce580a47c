//! # Record Store
//!
//! The in-memory table behind documents, configurations and receipts,
//! keyed by uuid. When a pool is attached it acts as the read side of the
//! PostgreSQL write-through and is rebuilt by [`crate::SubmissionEngine::load`].
//!
//! Locks are `parking_lot` and never held across `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

/// Uuid-keyed records. Clones share the same table.
#[derive(Debug)]
pub struct Store<T: Clone + Send + Sync> {
    rows: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T: Clone + Send + Sync> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<T: Clone + Send + Sync> Default for Store<T> {
    fn default() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<T: Clone + Send + Sync> Store<T> {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a row.
    pub fn insert(&self, id: Uuid, row: T) -> Option<T> {
        self.rows.write().insert(id, row)
    }

    /// Insert a row only if `id` is vacant. An existing row is left as is
    /// and `false` is returned.
    pub fn insert_new(&self, id: Uuid, row: T) -> bool {
        let mut rows = self.rows.write();
        if rows.contains_key(&id) {
            return false;
        }
        rows.insert(id, row);
        true
    }

    /// A copy of one row.
    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.rows.read().get(id).cloned()
    }

    /// Copies of every row, in no particular order.
    pub fn list(&self) -> Vec<T> {
        self.rows.read().values().cloned().collect()
    }

    /// Copies of the rows matching `pred`.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.rows
            .read()
            .values()
            .filter(|row| pred(row))
            .cloned()
            .collect()
    }

    /// Check and mutate one row under a single write lock. `None` when the
    /// row does not exist.
    pub fn try_update<R, E>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.rows.write().get_mut(id).map(f)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}
