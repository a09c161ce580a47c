//! # Sequence Allocator
//!
//! Gapless, concurrency-safe authority sequence numbers per
//! (taxpayer, branch) scope.
//!
//! `allocate` computes `max(numbers issued in scope, scope floor) + 1` and
//! reserves it for the document in one critical section. Callers in the
//! same scope are serialised; callers in different scopes never contend.
//! A number already assigned to the document is returned unchanged.
//!
//! Two implementations:
//!
//! - [`MemoryAllocator`]: one `parking_lot::Mutex` per scope, held across
//!   read-max-then-write. The scope map is a `DashMap`.
//! - [`PgAllocator`]: one transaction holding
//!   `pg_advisory_xact_lock(hashtext(scope_key))`; see
//!   [`crate::db::sequences`].
//!
//! [`AllocationError::Conflict`] means storage caught a write-write race
//! the lock should have prevented. It is a bug signal and is never retried.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use sqlx::PgPool;

use fisc_core::{DocumentId, SequenceNumber, SequenceScope};

use crate::db;

/// Allocation failures.
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    /// Storage detected a duplicate number in the scope.
    #[error("allocation conflict in scope {scope}: number {number} already issued")]
    Conflict {
        /// The scope.
        scope: String,
        /// The number that was issued twice.
        number: u64,
    },

    /// The scope has no numbers left.
    #[error("sequence exhausted in scope {scope}")]
    Exhausted {
        /// The scope.
        scope: String,
    },

    /// The document is not persisted, so no number can be attached to it.
    #[error("document {document_id} is not persisted")]
    UnknownDocument {
        /// The document.
        document_id: DocumentId,
    },

    /// Database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Reserves sequence numbers.
pub trait SequenceAllocator: Send + Sync {
    /// The document's number, allocating the next one in scope if it has
    /// none yet.
    fn allocate(
        &self,
        scope: &SequenceScope,
        document: DocumentId,
    ) -> impl Future<Output = Result<SequenceNumber, AllocationError>> + Send;

    /// Register numbers issued outside the engine. The floor never moves
    /// down.
    fn seed_floor(
        &self,
        scope: &SequenceScope,
        last_issued: u64,
    ) -> impl Future<Output = Result<(), AllocationError>> + Send;

    /// Highest number issued or floored in scope.
    fn current(
        &self,
        scope: &SequenceScope,
    ) -> impl Future<Output = Result<u64, AllocationError>> + Send;
}

// ─── In-memory ──────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct ScopeState {
    max_issued: u64,
    floor: u64,
    assigned: HashMap<DocumentId, SequenceNumber>,
    issued: HashSet<u64>,
}

impl ScopeState {
    fn current(&self) -> u64 {
        self.max_issued.max(self.floor)
    }
}

/// Process-local allocator.
#[derive(Debug, Default)]
pub struct MemoryAllocator {
    scopes: DashMap<SequenceScope, Arc<Mutex<ScopeState>>>,
}

impl MemoryAllocator {
    /// Empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    fn scope(&self, scope: &SequenceScope) -> Arc<Mutex<ScopeState>> {
        // Clone the Arc out so the DashMap shard lock is released before
        // the scope mutex is taken.
        self.scopes.entry(scope.clone()).or_default().value().clone()
    }

    /// Re-register a number loaded from storage.
    pub fn restore(
        &self,
        scope: &SequenceScope,
        document: DocumentId,
        number: SequenceNumber,
    ) -> Result<(), AllocationError> {
        let state = self.scope(scope);
        let mut st = state.lock();
        if !st.issued.insert(number.value()) {
            return Err(AllocationError::Conflict {
                scope: scope.to_string(),
                number: number.value(),
            });
        }
        st.max_issued = st.max_issued.max(number.value());
        st.assigned.insert(document, number);
        Ok(())
    }

    fn allocate_sync(
        &self,
        scope: &SequenceScope,
        document: DocumentId,
    ) -> Result<SequenceNumber, AllocationError> {
        let state = self.scope(scope);
        let mut st = state.lock();
        if let Some(existing) = st.assigned.get(&document) {
            return Ok(*existing);
        }
        let next = SequenceNumber::after(st.current()).ok_or_else(|| AllocationError::Exhausted {
            scope: scope.to_string(),
        })?;
        if !st.issued.insert(next.value()) {
            return Err(AllocationError::Conflict {
                scope: scope.to_string(),
                number: next.value(),
            });
        }
        st.max_issued = next.value();
        st.assigned.insert(document, next);
        tracing::debug!(scope = %scope, document_id = %document, number = next.value(), "sequence number allocated");
        Ok(next)
    }
}

impl SequenceAllocator for MemoryAllocator {
    async fn allocate(
        &self,
        scope: &SequenceScope,
        document: DocumentId,
    ) -> Result<SequenceNumber, AllocationError> {
        self.allocate_sync(scope, document)
    }

    async fn seed_floor(&self, scope: &SequenceScope, last_issued: u64) -> Result<(), AllocationError> {
        let state = self.scope(scope);
        let mut st = state.lock();
        st.floor = st.floor.max(last_issued);
        tracing::info!(scope = %scope, floor = st.floor, "sequence floor seeded");
        Ok(())
    }

    async fn current(&self, scope: &SequenceScope) -> Result<u64, AllocationError> {
        Ok(self.scope(scope).lock().current())
    }
}

// ─── PostgreSQL ─────────────────────────────────────────────────────────

/// Allocator backed by `fiscal_documents` and `sequence_floors`.
#[derive(Debug, Clone)]
pub struct PgAllocator {
    pool: PgPool,
}

impl PgAllocator {
    /// Allocator over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SequenceAllocator for PgAllocator {
    async fn allocate(
        &self,
        scope: &SequenceScope,
        document: DocumentId,
    ) -> Result<SequenceNumber, AllocationError> {
        db::sequences::allocate(&self.pool, scope, document).await
    }

    async fn seed_floor(&self, scope: &SequenceScope, last_issued: u64) -> Result<(), AllocationError> {
        db::sequences::seed_floor(&self.pool, scope, last_issued).await
    }

    async fn current(&self, scope: &SequenceScope) -> Result<u64, AllocationError> {
        db::sequences::current(&self.pool, scope).await
    }
}

// ─── Runtime selection ──────────────────────────────────────────────────

/// Allocator chosen at startup.
#[derive(Debug)]
pub enum AnyAllocator {
    /// Process-local.
    Memory(MemoryAllocator),
    /// PostgreSQL advisory lock.
    Postgres(PgAllocator),
}

impl Default for AnyAllocator {
    fn default() -> Self {
        Self::Memory(MemoryAllocator::new())
    }
}

impl SequenceAllocator for AnyAllocator {
    async fn allocate(
        &self,
        scope: &SequenceScope,
        document: DocumentId,
    ) -> Result<SequenceNumber, AllocationError> {
        match self {
            Self::Memory(a) => a.allocate(scope, document).await,
            Self::Postgres(a) => a.allocate(scope, document).await,
        }
    }

    async fn seed_floor(&self, scope: &SequenceScope, last_issued: u64) -> Result<(), AllocationError> {
        match self {
            Self::Memory(a) => a.seed_floor(scope, last_issued).await,
            Self::Postgres(a) => a.seed_floor(scope, last_issued).await,
        }
    }

    async fn current(&self, scope: &SequenceScope) -> Result<u64, AllocationError> {
        match self {
            Self::Memory(a) => a.current(scope).await,
            Self::Postgres(a) => a.current(scope).await,
        }
    }
}
