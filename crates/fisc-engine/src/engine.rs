//! # Submission Engine
//!
//! Drives a registered document through
//! `draft → sequencing → built → submitting → accepted`, or into
//! `rejected` / `permanently_rejected`, against one [`Transport`].
//!
//! ## Submit Flow
//!
//! 1. Refuse terminal documents (`AlreadySubmitted`, `AlreadyFinalized`)
//!    without touching the transport.
//! 2. Claim the per-document in-flight guard. A second concurrent
//!    `submit`/`retry` for the same document gets `NotReady`.
//! 3. Resolve the taxpayer's active configuration. A document already
//!    bound to a configuration may move to its replacement only when the
//!    authority, environment and branch are unchanged.
//! 4. Credit notes: the original must be `accepted` and numbered.
//! 5. Map every line to an authority tax code and freeze the lines
//!    (`draft → sequencing`).
//! 6. Allocate the sequence number (write-once), build the payload, and
//!    freeze its bytes (`sequencing → built`). A totals mismatch stops here,
//!    before any network call, with the number kept reserved.
//! 7. Dispatch: record a [`SubmissionAttempt`], send, classify, and apply
//!    the outcome.
//!
//! Retries resend the frozen payload byte for byte. Once the request is
//! sent the outcome is always recorded; anything ambiguous leaves the
//! document `rejected` and retryable.
//!
//! A credential refusal (HTTP 401/403) is the configuration's fault, not
//! the document's. The document stays `rejected` and retryable but is held
//! out of sweeps, the configuration is marked `error`, and the caller gets
//! [`EngineError::InvalidCredentials`]. A passing connection test for the
//! taxpayer releases the hold; an explicit retry is always allowed.
//!
//! ## Persistence
//!
//! With a pool attached every mutation is written through to PostgreSQL.
//! Writes before dispatch propagate their error. Writes after dispatch are
//! logged and the in-memory outcome stands, since the authority has
//! already seen the request.

use std::collections::HashSet;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use fisc_client::{
    classify_result, submit_request, AnyTransport, Classification, Delivery, Transport,
};
use fisc_core::{
    DocumentDraft, DocumentId, DocumentKind, FiscalConfig, Receipt, SequenceNumber,
    SequenceScope, Timestamp,
};
use fisc_payload::PreparedDocument;
use fisc_state::SubmissionState;
use fisc_tax::{map_document, mapper_for};

use crate::allocator::{AllocationError, AnyAllocator, PgAllocator, SequenceAllocator};
use crate::attempts::{AttemptLog, ChainIntegrity, NewAttempt, SubmissionAttempt};
use crate::db;
use crate::document::FiscalDocument;
use crate::error::EngineError;
use crate::receipts::ReceiptStore;
use crate::registry::ConfigRegistry;
use crate::retry::RetryPolicy;
use crate::store::Store;

/// Transition reason recorded when the sweep recovers an interrupted
/// submission.
pub const INTERRUPTED_REASON: &str = "submission interrupted before the outcome was recorded";

// ─── Results ────────────────────────────────────────────────────────────

/// Outcome of one `submit` or `retry`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResult {
    /// The document.
    pub document_id: DocumentId,
    /// Internal reference.
    pub reference: String,
    /// State after the attempt.
    pub status: SubmissionState,
    /// Whether a rejection may be retried.
    pub retryable: bool,
    /// Authority sequence number.
    pub sequence_number: Option<SequenceNumber>,
    /// Attempt number of this submission.
    pub attempt: u32,
    /// Receipt, when accepted.
    pub receipt: Option<Receipt>,
    /// Authority result code, when rejected.
    pub code: Option<String>,
    /// Authority message or transport error, verbatim.
    pub error: Option<String>,
}

impl SubmissionResult {
    /// Whether the authority accepted the document.
    pub fn is_accepted(&self) -> bool {
        self.status == SubmissionState::Accepted
    }
}

/// One entry of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    /// The document.
    pub document_id: DocumentId,
    /// The submission outcome, when the authority was reached.
    pub result: Option<SubmissionResult>,
    /// Error code, when the document was not submitted.
    pub error_code: Option<String>,
    /// Error message, when the document was not submitted.
    pub error: Option<String>,
}

/// Per-document summary of a batch submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Documents accepted.
    pub succeeded: usize,
    /// Documents rejected or not submitted.
    pub failed: usize,
    /// Documents already accepted before the batch ran.
    pub skipped: usize,
    /// Outcomes in request order.
    pub results: Vec<BatchItem>,
}

/// What a retry sweep did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Interrupted submissions moved back to `rejected`.
    pub recovered: usize,
    /// Retry outcomes.
    pub retried: Vec<SubmissionResult>,
    /// Due documents that could not be retried.
    pub errors: Vec<BatchItem>,
    /// Retryable documents whose attempt budget is spent.
    pub exhausted: usize,
    /// Documents waiting on a configuration whose credentials were refused.
    #[serde(default)]
    pub held: usize,
}

// ─── In-flight guard ────────────────────────────────────────────────────

struct InFlight<'a> {
    set: &'a Mutex<HashSet<DocumentId>>,
    id: DocumentId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.id);
    }
}

// ─── Engine ─────────────────────────────────────────────────────────────

/// The submission engine.
pub struct SubmissionEngine<T: Transport = AnyTransport> {
    transport: T,
    registry: ConfigRegistry,
    allocator: AnyAllocator,
    documents: Store<FiscalDocument>,
    receipts: ReceiptStore,
    attempts: AttemptLog,
    retry_policy: RetryPolicy,
    in_flight: Mutex<HashSet<DocumentId>>,
    pool: Option<PgPool>,
}

impl<T: Transport> std::fmt::Debug for SubmissionEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionEngine")
            .field("documents", &self.documents.len())
            .field("receipts", &self.receipts.len())
            .field("retry_policy", &self.retry_policy)
            .field("persistent", &self.pool.is_some())
            .finish()
    }
}

impl<T: Transport> SubmissionEngine<T> {
    /// In-memory engine over `transport`.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            registry: ConfigRegistry::new(),
            allocator: AnyAllocator::default(),
            documents: Store::new(),
            receipts: ReceiptStore::new(),
            attempts: AttemptLog::new(),
            retry_policy: RetryPolicy::default(),
            in_flight: Mutex::new(HashSet::new()),
            pool: None,
        }
    }

    /// Replace the sequence allocator.
    pub fn with_allocator(mut self, allocator: AnyAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Write through to PostgreSQL and allocate under its advisory lock.
    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.allocator = AnyAllocator::Postgres(PgAllocator::new(pool.clone()));
        self.pool = Some(pool);
        self
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The configuration registry.
    pub fn registry(&self) -> &ConfigRegistry {
        &self.registry
    }

    /// The retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    /// Load configurations, documents, attempts and receipts from the pool.
    pub async fn load(&self) -> Result<(), EngineError> {
        let Some(pool) = &self.pool else {
            return Ok(());
        };
        let configs = db::configs::load_all(pool).await?;
        let documents = db::documents::load_all(pool).await?;
        let attempts = db::attempts::load_all(pool).await?;
        let receipts = db::receipts::load_all(pool).await?;
        tracing::info!(
            configs = configs.len(),
            documents = documents.len(),
            attempts = attempts.len(),
            receipts = receipts.len(),
            "restored fiscal state from database"
        );

        self.registry.restore(configs);
        for doc in documents {
            if let (AnyAllocator::Memory(memory), Some(number)) = (&self.allocator, doc.sequence_number) {
                memory.restore(&doc.draft.scope(), doc.id, number)?;
            }
            self.documents.insert(*doc.id.as_uuid(), doc);
        }
        self.attempts.restore(attempts);
        for receipt in receipts {
            if let Err(conflict) = self.receipts.record(receipt) {
                tracing::warn!(document_id = %conflict.document_id, "duplicate receipt row ignored");
            }
        }
        let integrity = self.attempts.verify();
        if !integrity.chain_valid {
            tracing::error!(
                total_attempts = integrity.total_attempts,
                broken_links = integrity.broken_links,
                "submission attempt hash chain is broken"
            );
        }
        Ok(())
    }

    // ── Configuration ───────────────────────────────────────────────────

    /// Register a configuration.
    pub async fn register_config(&self, config: FiscalConfig) -> Result<FiscalConfig, EngineError> {
        let config = self.registry.register(config)?;
        self.persist_config(&config).await?;
        Ok(config)
    }

    /// Activate a configuration.
    pub async fn activate_config(&self, id: Uuid) -> Result<FiscalConfig, EngineError> {
        let config = self.registry.activate(id)?;
        self.persist_config(&config).await?;
        Ok(config)
    }

    /// Deactivate a configuration.
    pub async fn deactivate_config(&self, id: Uuid) -> Result<FiscalConfig, EngineError> {
        let config = self.registry.deactivate(id)?;
        self.persist_config(&config).await?;
        Ok(config)
    }

    /// Check the authority accepts a configuration's credentials and record
    /// the outcome on it. A failed check is not an error: the returned
    /// configuration carries status `error` and the message. A passing
    /// check releases the taxpayer's documents held on refused credentials.
    pub async fn test_connection(&self, config_id: Uuid) -> Result<FiscalConfig, EngineError> {
        let config = self.registry.get(config_id)?;
        let outcome = fisc_client::test_connection(&self.transport, &config)
            .await
            .map_err(|e| e.to_string());
        match &outcome {
            Ok(()) => tracing::info!(config_id = %config_id, "connection test passed"),
            Err(e) => tracing::warn!(config_id = %config_id, error = %e, "connection test failed"),
        }
        let passed = outcome.is_ok();
        let config = self.registry.record_connection_test(config_id, outcome)?;
        self.persist_config(&config).await?;
        if passed {
            self.release_credential_holds(&config).await?;
        }
        Ok(config)
    }

    /// Return the taxpayer's documents held on refused credentials to the
    /// retry sweep.
    async fn release_credential_holds(&self, config: &FiscalConfig) -> Result<(), EngineError> {
        let held = self.documents.filter(|d| {
            d.draft.taxpayer == config.taxpayer && d.lifecycle.held_for_credentials
        });
        for doc in held {
            let doc = self.update(doc.id, |d| {
                d.lifecycle.release_credential_hold();
                Ok(())
            })?;
            self.persist_document(&doc).await?;
            tracing::info!(document_id = %doc.id, config_id = %config.id, "credential hold released");
        }
        Ok(())
    }

    async fn persist_config(&self, config: &FiscalConfig) -> Result<(), EngineError> {
        if let Some(pool) = &self.pool {
            db::configs::upsert(pool, config).await?;
        }
        Ok(())
    }

    // ── Sequence floors ─────────────────────────────────────────────────

    /// Register numbers issued outside the engine for `scope`.
    pub async fn seed_floor(&self, scope: &SequenceScope, last_issued: u64) -> Result<(), EngineError> {
        self.allocator.seed_floor(scope, last_issued).await?;
        Ok(())
    }

    /// Highest number issued or floored in `scope`.
    pub async fn current_sequence(&self, scope: &SequenceScope) -> Result<u64, EngineError> {
        Ok(self.allocator.current(scope).await?)
    }

    // ── Documents ───────────────────────────────────────────────────────

    /// Register a draft document.
    ///
    /// A credit note's original must already be registered for the same
    /// taxpayer and be a sale. Whether it is accepted is checked at submit.
    pub async fn register_document(&self, draft: DocumentDraft) -> Result<FiscalDocument, EngineError> {
        draft.validate()?;
        let doc = FiscalDocument::new(draft);
        if doc.is_credit_note() {
            let original = self.original_of(&doc)?;
            if original.draft.kind != DocumentKind::Sale {
                return Err(EngineError::not_ready(doc.id, "a credit note must reference a sale"));
            }
            if original.draft.taxpayer != doc.draft.taxpayer {
                return Err(EngineError::not_ready(
                    doc.id,
                    "a credit note must belong to the taxpayer of its original",
                ));
            }
        }
        self.persist_document(&doc).await?;
        self.documents.insert(*doc.id.as_uuid(), doc.clone());
        tracing::info!(
            document_id = %doc.id,
            reference = %doc.draft.reference,
            kind = doc.draft.kind.as_str(),
            source = doc.draft.source.as_str(),
            "fiscal document registered"
        );
        Ok(doc)
    }

    /// A document by id.
    pub fn get_document(&self, id: DocumentId) -> Result<FiscalDocument, EngineError> {
        self.documents
            .get(id.as_uuid())
            .ok_or(EngineError::NotFound { document_id: id })
    }

    /// Every document, optionally restricted to one state, oldest first.
    pub fn list_documents(&self, state: Option<SubmissionState>) -> Vec<FiscalDocument> {
        let mut docs = self
            .documents
            .filter(|d| state.map_or(true, |s| d.state() == s));
        docs.sort_by_key(|d| d.created_at);
        docs
    }

    /// The receipt of an accepted document.
    pub fn get_receipt(&self, id: DocumentId) -> Result<Receipt, EngineError> {
        self.get_document(id)?;
        self.receipts
            .get(&id)
            .ok_or(EngineError::ReceiptNotFound { document_id: id })
    }

    /// Every attempt for a document, oldest first.
    pub fn attempts(&self, id: DocumentId) -> Result<Vec<SubmissionAttempt>, EngineError> {
        self.get_document(id)?;
        Ok(self.attempts.for_document(&id))
    }

    /// Recompute the attempt hash chain.
    pub fn verify_attempt_chain(&self) -> ChainIntegrity {
        self.attempts.verify()
    }

    // ── Submission ──────────────────────────────────────────────────────

    /// Number, build and send a document.
    pub async fn submit(&self, id: DocumentId) -> Result<SubmissionResult, EngineError> {
        Self::check_submittable(&self.get_document(id)?)?;
        let _guard = self.claim(id)?;
        let mut doc = self.get_document(id)?;
        Self::check_submittable(&doc)?;

        let config = self.config_for(&doc)?;
        let original_sequence = self.check_original(&doc)?;

        if doc.state() == SubmissionState::Draft {
            let mapper = mapper_for(&config)?;
            let mapped = map_document(&doc.draft, mapper.as_ref())?;
            let config_id = config.id;
            doc = self.update(id, |d| {
                d.mapped = Some(mapped);
                d.config_id = Some(config_id);
                let frozen = d.lines_frozen();
                d.lifecycle.begin_sequencing(frozen)?;
                Ok(())
            })?;
            self.persist_document(&doc).await?;
        }

        if doc.state() == SubmissionState::Sequencing {
            doc = self.build(doc, &config, original_sequence).await?;
        }

        self.dispatch(doc, &config).await
    }

    /// Resend a retryable rejection with its frozen payload.
    pub async fn retry(&self, id: DocumentId) -> Result<SubmissionResult, EngineError> {
        Self::check_retryable(&self.get_document(id)?)?;
        let _guard = self.claim(id)?;
        let doc = self.get_document(id)?;
        Self::check_retryable(&doc)?;
        let config = self.config_for(&doc)?;
        self.dispatch(doc, &config).await
    }

    /// Give up on a retryable rejection.
    pub async fn abandon(&self, id: DocumentId, reason: &str) -> Result<FiscalDocument, EngineError> {
        let doc = self.get_document(id)?;
        Self::check_terminal(&doc)?;
        let _guard = self.claim(id)?;
        let doc = self.update(id, |d| {
            Self::check_terminal(d)?;
            if d.state() != SubmissionState::Rejected {
                return Err(EngineError::not_ready(
                    d.id,
                    format!("only rejected documents can be abandoned (state {})", d.state()),
                ));
            }
            d.lifecycle.abandon(reason)?;
            Ok(())
        })?;
        self.persist_document(&doc).await?;
        tracing::info!(
            document_id = %id,
            reference = %doc.draft.reference,
            reason,
            outcome = "abandoned",
            "fiscal document abandoned"
        );
        Ok(doc)
    }

    /// Submit documents in order. A failure never stops the batch.
    pub async fn submit_batch(&self, ids: &[DocumentId]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for &id in ids {
            let item = match self.submit(id).await {
                Ok(result) => {
                    if result.is_accepted() {
                        summary.succeeded += 1;
                    } else {
                        summary.failed += 1;
                    }
                    BatchItem {
                        document_id: id,
                        result: Some(result),
                        error_code: None,
                        error: None,
                    }
                }
                Err(e) => {
                    if matches!(e, EngineError::AlreadySubmitted { .. }) {
                        summary.skipped += 1;
                    } else {
                        summary.failed += 1;
                    }
                    Self::failed_item(id, &e)
                }
            };
            summary.results.push(item);
        }
        tracing::info!(
            documents = ids.len(),
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "batch submission finished"
        );
        summary
    }

    /// Recover interrupted submissions, then retry every retryable
    /// rejection that is due and within the attempt budget.
    pub async fn sweep_retryable(&self, now: Timestamp) -> SweepReport {
        let mut report = SweepReport {
            recovered: self.recover_interrupted(now).await,
            ..SweepReport::default()
        };

        let mut due = Vec::new();
        for doc in self.list_documents(Some(SubmissionState::Rejected)) {
            if !doc.retryable() {
                continue;
            }
            if doc.lifecycle.held_for_credentials {
                report.held += 1;
                continue;
            }
            if !self.retry_policy.allows(doc.lifecycle.attempts) {
                report.exhausted += 1;
                continue;
            }
            if doc.lifecycle.is_retry_due(now) {
                due.push(doc);
            }
        }
        due.sort_by_key(|d| (d.draft.scope(), d.sequence_number));

        for doc in due {
            match self.retry(doc.id).await {
                Ok(result) => report.retried.push(result),
                Err(e) => report.errors.push(Self::failed_item(doc.id, &e)),
            }
        }
        tracing::info!(
            recovered = report.recovered,
            retried = report.retried.len(),
            accepted = report.retried.iter().filter(|r| r.is_accepted()).count(),
            errors = report.errors.len(),
            exhausted = report.exhausted,
            held = report.held,
            "retry sweep finished"
        );
        report
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn check_terminal(doc: &FiscalDocument) -> Result<(), EngineError> {
        match doc.state() {
            SubmissionState::Accepted => Err(EngineError::AlreadySubmitted { document_id: doc.id }),
            SubmissionState::PermanentlyRejected => {
                Err(EngineError::AlreadyFinalized { document_id: doc.id })
            }
            _ => Ok(()),
        }
    }

    fn check_submittable(doc: &FiscalDocument) -> Result<(), EngineError> {
        Self::check_terminal(doc)?;
        match doc.state() {
            SubmissionState::Draft | SubmissionState::Sequencing | SubmissionState::Built => Ok(()),
            SubmissionState::Rejected => Err(EngineError::not_ready(
                doc.id,
                "document was rejected; use retry to resend it",
            )),
            state => Err(EngineError::not_ready(doc.id, format!("document is {state}"))),
        }
    }

    fn check_retryable(doc: &FiscalDocument) -> Result<(), EngineError> {
        Self::check_terminal(doc)?;
        if doc.state() != SubmissionState::Rejected {
            return Err(EngineError::not_ready(
                doc.id,
                format!("only rejected documents can be retried (state {})", doc.state()),
            ));
        }
        if !doc.retryable() {
            return Err(EngineError::not_ready(doc.id, "rejection is not retryable"));
        }
        Ok(())
    }

    fn claim(&self, id: DocumentId) -> Result<InFlight<'_>, EngineError> {
        if !self.in_flight.lock().insert(id) {
            return Err(EngineError::not_ready(id, "a submission is already in progress"));
        }
        Ok(InFlight {
            set: &self.in_flight,
            id,
        })
    }

    fn failed_item(id: DocumentId, error: &EngineError) -> BatchItem {
        BatchItem {
            document_id: id,
            result: None,
            error_code: Some(error.code().to_string()),
            error: Some(error.to_string()),
        }
    }

    /// The taxpayer's active configuration. Inactive configurations are
    /// never used, even for a document mapped under one: its replacement
    /// must serve the same authority, environment and branch the payload
    /// was frozen for.
    fn config_for(&self, doc: &FiscalDocument) -> Result<FiscalConfig, EngineError> {
        let active = self.registry.resolve(&doc.draft.taxpayer)?;
        let Some(bound_id) = doc.config_id else {
            return Ok(active);
        };
        if active.id == bound_id {
            return Ok(active);
        }
        let bound = self.registry.get(bound_id)?;
        if bound.authority != active.authority
            || bound.environment != active.environment
            || bound.branch != active.branch
        {
            return Err(EngineError::not_ready(
                doc.id,
                format!(
                    "configuration {bound_id} is no longer active and {} does not serve the same authority, environment and branch",
                    active.id
                ),
            ));
        }
        Ok(active)
    }

    fn original_of(&self, doc: &FiscalDocument) -> Result<FiscalDocument, EngineError> {
        let original_id = doc
            .draft
            .original
            .ok_or_else(|| EngineError::not_ready(doc.id, "credit note has no original document"))?;
        self.documents.get(original_id.as_uuid()).ok_or_else(|| {
            EngineError::not_ready(doc.id, format!("original document {original_id} is not registered"))
        })
    }

    /// For a credit note, the original's authority number. The original
    /// must be accepted.
    fn check_original(&self, doc: &FiscalDocument) -> Result<Option<SequenceNumber>, EngineError> {
        if !doc.is_credit_note() {
            return Ok(None);
        }
        let original = self.original_of(doc)?;
        if original.state() != SubmissionState::Accepted {
            return Err(EngineError::not_ready(
                doc.id,
                format!(
                    "original document {} is {}, not accepted",
                    original.draft.reference,
                    original.state()
                ),
            ));
        }
        let number = original.sequence_number.ok_or_else(|| {
            EngineError::not_ready(
                doc.id,
                format!("original document {} has no sequence number", original.draft.reference),
            )
        })?;
        Ok(Some(number))
    }

    /// SEQUENCING → BUILT.
    async fn build(
        &self,
        doc: FiscalDocument,
        config: &FiscalConfig,
        original_sequence: Option<SequenceNumber>,
    ) -> Result<FiscalDocument, EngineError> {
        let id = doc.id;
        let scope = doc.draft.scope();
        let number = self.allocator.allocate(&scope, id).await?;
        let doc = self.update(id, |d| {
            match d.sequence_number {
                None => d.sequence_number = Some(number),
                Some(existing) if existing == number => {}
                Some(existing) => {
                    return Err(AllocationError::Conflict {
                        scope: scope.to_string(),
                        number: existing.value(),
                    }
                    .into())
                }
            }
            Ok(())
        })?;

        let mapped = doc
            .mapped
            .clone()
            .ok_or_else(|| EngineError::not_ready(id, "document lines are not mapped"))?;
        let prepared = PreparedDocument {
            document_id: id,
            draft: doc.draft.clone(),
            mapped,
            sequence_number: number,
            original_sequence,
        };
        let payload = match fisc_payload::build(&prepared, config) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(
                    document_id = %id,
                    scope = %scope,
                    sequence_number = number.value(),
                    error = %e,
                    "payload build failed; sequence number stays reserved"
                );
                self.persist_document(&doc).await?;
                return Err(e.into());
            }
        };

        let doc = self.update(id, |d| {
            if d.payload.is_none() {
                d.payload = Some(payload);
            }
            d.lifecycle
                .mark_built(&format!("sequence number {number}, payload frozen"))?;
            Ok(())
        })?;
        self.persist_document(&doc).await?;
        tracing::debug!(document_id = %id, scope = %scope, sequence_number = number.value(), "payload frozen");
        Ok(doc)
    }

    /// BUILT/REJECTED → SUBMITTING → outcome.
    async fn dispatch(
        &self,
        doc: FiscalDocument,
        config: &FiscalConfig,
    ) -> Result<SubmissionResult, EngineError> {
        let id = doc.id;
        let payload = doc
            .payload
            .clone()
            .ok_or_else(|| EngineError::not_ready(id, "document has no frozen payload"))?;
        if !payload.verify() {
            return Err(EngineError::not_ready(id, "frozen payload does not match its digest"));
        }
        let request = submit_request(config, &payload)?;

        let previous_config = doc.config_id;
        let doc = self.update(id, |d| {
            d.lifecycle.begin_submission()?;
            d.config_id = Some(config.id);
            Ok(())
        })?;
        self.persist_document(&doc).await?;
        if previous_config.is_some_and(|prev| prev != config.id) {
            tracing::info!(document_id = %id, config_id = %config.id, "document moved to the active configuration");
        }
        let attempt_number = doc.lifecycle.attempts;
        let scope = doc.draft.scope();

        let attempted_at = Timestamp::now();
        let started = Instant::now();
        let response = self.transport.send(request).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let classification = classify_result(config, &response);
        let attempt = self.attempts.append(NewAttempt {
            document_id: id,
            attempt_number,
            attempted_at,
            payload_digest: payload.digest.clone(),
            delivery: Delivery::of(&response),
            result_code: classification.code().map(str::to_string),
            message: classification.message().map(str::to_string),
            classification: classification.label().to_string(),
            duration_ms,
        });
        if let Some(pool) = &self.pool {
            if let Err(e) = db::attempts::insert(pool, &attempt).await {
                tracing::error!(document_id = %id, attempt = attempt_number, error = %e, "failed to persist submission attempt");
            }
        }

        let code = classification.code().map(str::to_string);
        let message = classification.message().map(str::to_string);
        let mut refused = false;
        let (doc, receipt) = match classification {
            Classification::Accepted(data) => {
                let receipt = data.into_receipt(id, config.authority, doc.draft.issued_at, Timestamp::now());
                let receipt = self.record_receipt(receipt).await;
                let reason = format!("receipt {}", receipt.cu_invoice_number);
                let doc = self.update(id, |d| Ok(d.lifecycle.accept(&reason)?))?;
                (doc, Some(receipt))
            }
            Classification::Rejected { message, .. } => {
                let doc = self.update(id, |d| Ok(d.lifecycle.reject_permanently(&message)?))?;
                (doc, None)
            }
            Classification::Transient { message, .. } => {
                let next = self.retry_policy.next_retry_at(Timestamp::now(), attempt_number);
                let doc = self.update(id, |d| Ok(d.lifecycle.reject_retryable(&message, next)?))?;
                (doc, None)
            }
            Classification::Unauthorized { message, .. } => {
                refused = true;
                let doc = self.update(id, |d| Ok(d.lifecycle.reject_unauthorized(&message)?))?;
                match self.registry.record_credential_refusal(config.id, &message) {
                    Ok(refused_config) => {
                        if let Err(e) = self.persist_config(&refused_config).await {
                            tracing::error!(config_id = %config.id, error = %e, "failed to persist credential refusal");
                        }
                    }
                    Err(e) => tracing::error!(config_id = %config.id, error = %e, "could not mark configuration"),
                }
                (doc, None)
            }
        };
        if let Some(pool) = &self.pool {
            if let Err(e) = db::documents::upsert(pool, &doc).await {
                tracing::error!(document_id = %id, error = %e, "failed to persist submission outcome");
            }
        }

        let result = SubmissionResult {
            document_id: id,
            reference: doc.draft.reference.clone(),
            status: doc.state(),
            retryable: doc.retryable(),
            sequence_number: doc.sequence_number,
            attempt: attempt_number,
            receipt,
            code,
            error: message,
        };
        match result.status {
            SubmissionState::Accepted => tracing::info!(
                document_id = %id,
                scope = %scope,
                attempt = attempt_number,
                outcome = "accepted",
                duration_ms,
                "fiscal document accepted"
            ),
            _ => tracing::warn!(
                document_id = %id,
                scope = %scope,
                attempt = attempt_number,
                outcome = attempt.classification.as_str(),
                retryable = result.retryable,
                code = result.code.as_deref().unwrap_or(""),
                error = result.error.as_deref().unwrap_or(""),
                duration_ms,
                "fiscal document rejected"
            ),
        }
        if refused {
            return Err(EngineError::InvalidCredentials {
                document_id: id,
                config_id: config.id,
                code: result.code.unwrap_or_default(),
                message: result.error.unwrap_or_default(),
            });
        }
        Ok(result)
    }

    /// Store a receipt. If one already exists for the document, the stored
    /// one wins.
    async fn record_receipt(&self, receipt: Receipt) -> Receipt {
        let document_id = receipt.document_id;
        match self.receipts.record(receipt.clone()) {
            Ok(()) => {
                if let Some(pool) = &self.pool {
                    if let Err(e) = db::receipts::insert(pool, &receipt).await {
                        tracing::error!(document_id = %document_id, error = %e, "failed to persist receipt");
                    }
                }
                receipt
            }
            Err(conflict) => {
                tracing::error!(document_id = %conflict.document_id, "receipt already recorded; keeping the stored one");
                self.receipts.get(&document_id).unwrap_or(receipt)
            }
        }
    }

    /// SUBMITTING documents with no request in flight in this process were
    /// interrupted after the request may have been sent. They become
    /// retryable rejections, due immediately.
    async fn recover_interrupted(&self, now: Timestamp) -> usize {
        let mut recovered = 0;
        for doc in self.list_documents(Some(SubmissionState::Submitting)) {
            let Ok(_guard) = self.claim(doc.id) else {
                continue;
            };
            let updated = self.update(doc.id, |d| {
                if d.state() == SubmissionState::Submitting {
                    d.lifecycle.reject_retryable(INTERRUPTED_REASON, Some(now))?;
                }
                Ok(())
            });
            match updated {
                Ok(doc) => {
                    recovered += 1;
                    tracing::warn!(document_id = %doc.id, attempt = doc.lifecycle.attempts, "recovered interrupted submission");
                    if let Err(e) = self.persist_document(&doc).await {
                        tracing::error!(document_id = %doc.id, error = %e, "failed to persist recovered document");
                    }
                }
                Err(e) => tracing::error!(document_id = %doc.id, error = %e, "could not recover interrupted submission"),
            }
        }
        recovered
    }

    fn update(
        &self,
        id: DocumentId,
        f: impl FnOnce(&mut FiscalDocument) -> Result<(), EngineError>,
    ) -> Result<FiscalDocument, EngineError> {
        self.documents
            .try_update(id.as_uuid(), |d| {
                f(d)?;
                d.touch();
                Ok(d.clone())
            })
            .unwrap_or(Err(EngineError::NotFound { document_id: id }))
    }

    async fn persist_document(&self, doc: &FiscalDocument) -> Result<(), EngineError> {
        if let Some(pool) = &self.pool {
            db::documents::upsert(pool, doc).await?;
        }
        Ok(())
    }
}
