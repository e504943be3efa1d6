//! Allocation runs: plan from the current snapshot and materialize one
//! transfer document per assigned store

use chrono::{Datelike, Utc};
use serde::Serialize;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use shared::allocation::{AllocationPlan, AllocationPlanner, PlanningError, ProductExclusion};
use shared::transfer::{DocumentNumber, NumberSequence, TransferDocumentFactory};
use shared::{validate_catalog, InventorySnapshot, StoreAssignment, StoreCode};

use crate::config::AllocationConfig;
use crate::error::{AppError, AppResult};
use crate::services::creation::{
    create_documents, CreatedDocument, CreationFailure, PgDocumentWriter,
};
use crate::services::events::{TransferEvent, TransferEventKind, TransferEvents};
use crate::services::snapshot::SnapshotService;

/// Session advisory lock key serializing document numbering ("PV" in ASCII)
const NUMBERING_LOCK_KEY: i64 = 0x5056;

/// Connection that can be thrown away instead of returned to the pool
trait SessionConnection: Send {
    fn discard(self);
}

impl SessionConnection for PoolConnection<Postgres> {
    fn discard(self) {
        // Closing the session releases every lock it holds
        drop(self.detach());
    }
}

/// Holds the numbering lock's connection. Unless disarmed after a
/// successful unlock, dropping it closes the connection, so a run abandoned
/// mid-flight never hands a locked session back to the pool.
struct NumberingLock<C: SessionConnection> {
    conn: Option<C>,
}

impl<C: SessionConnection> NumberingLock<C> {
    fn new(conn: C) -> Self {
        Self { conn: Some(conn) }
    }

    fn connection(&mut self) -> AppResult<&mut C> {
        self.conn
            .as_mut()
            .ok_or_else(|| AppError::Internal("Numbering lock already released".to_string()))
    }

    fn disarm(mut self) -> Option<C> {
        self.conn.take()
    }
}

impl<C: SessionConnection> Drop for NumberingLock<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::warn!("Closing connection that may still hold the numbering lock");
            conn.discard();
        }
    }
}

#[derive(Clone)]
pub struct AllocationService {
    db: PgPool,
    config: AllocationConfig,
    events: TransferEvents,
}

/// Outcome of one allocation run
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub documents_created: usize,
    pub documents: Vec<CreatedDocument>,
    pub failures: Vec<CreationFailure>,
    pub excluded_products: Vec<ProductExclusion>,
    /// Stores with allocations but no assignee
    pub unassigned_stores: Vec<StoreCode>,
}

impl AllocationService {
    pub fn new(db: PgPool, config: AllocationConfig, events: TransferEvents) -> Self {
        Self { db, config, events }
    }

    fn planner(&self) -> AllocationPlanner {
        AllocationPlanner::new(self.config.demand_policy())
    }

    /// Current snapshot, rejected when the catalog is unusable
    async fn load_snapshot(&self) -> AppResult<InventorySnapshot> {
        let snapshot = SnapshotService::new(self.db.clone()).load().await?;
        if snapshot.is_empty() {
            return Err(PlanningError::EmptyCatalog.into());
        }
        validate_catalog(&snapshot.products).map_err(|e| AppError::Validation {
            field: "catalog".to_string(),
            message: e.to_string(),
            message_cs: "Katalog produktů je neplatný".to_string(),
        })?;
        Ok(snapshot)
    }

    /// Plan without writing anything
    pub async fn preview(&self) -> AppResult<AllocationPlan> {
        let snapshot = self.load_snapshot().await?;
        let plan = self.planner().plan(&snapshot)?;

        tracing::info!(
            products = plan.products.len(),
            excluded = plan.exclusions.len(),
            units = plan.total_allocated(),
            "Allocation preview computed"
        );
        Ok(plan)
    }

    /// Plan and create documents. Input errors reject the run before any
    /// write; persistence failures are isolated per store.
    pub async fn run(
        &self,
        created_by: Uuid,
        assignments: &[StoreAssignment],
    ) -> AppResult<RunSummary> {
        shared::transfer::index_assignments(assignments)?;

        let snapshot = self.load_snapshot().await?;
        let plan = self.planner().plan(&snapshot)?;
        let factory = TransferDocumentFactory::new(self.config.factory_settings());

        let mut lock = self.acquire_numbering_lock().await?;
        let outcome = async {
            let now = Utc::now();
            let mut sequence = self.next_sequence(lock.connection()?, now.year()).await?;
            let output = factory.build(&plan, assignments, &mut sequence, created_by, now)?;
            let writer = PgDocumentWriter::new(self.db.clone());
            let report = create_documents(&writer, output.drafts).await;
            Ok::<_, AppError>((report, output.unassigned_stores))
        }
        .await;
        self.release_numbering_lock(lock).await;
        let (report, unassigned_stores) = outcome?;

        for document in &report.created {
            self.events.publish(TransferEvent::new(
                document.id,
                document.document_number.clone(),
                TransferEventKind::Created,
            ));
        }

        tracing::info!(
            planned = plan.products.len(),
            excluded = plan.exclusions.len(),
            created = report.documents_created(),
            failed = report.failures.len(),
            unassigned = unassigned_stores.len(),
            "Allocation run finished"
        );

        Ok(RunSummary {
            documents_created: report.documents_created(),
            documents: report.created,
            failures: report.failures,
            excluded_products: plan.exclusions,
            unassigned_stores,
        })
    }

    async fn acquire_numbering_lock(&self) -> AppResult<NumberingLock<PoolConnection<Postgres>>> {
        let mut lock = NumberingLock::new(self.db.acquire().await?);
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(NUMBERING_LOCK_KEY)
            .execute(&mut **lock.connection()?)
            .await?;
        Ok(lock)
    }

    /// The connection goes back to the pool only after a confirmed unlock
    async fn release_numbering_lock(&self, mut lock: NumberingLock<PoolConnection<Postgres>>) {
        let unlocked = match lock.connection() {
            Ok(conn) => sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock($1)")
                .bind(NUMBERING_LOCK_KEY)
                .fetch_one(&mut **conn)
                .await
                .map_err(AppError::from),
            Err(e) => Err(e),
        };
        match unlocked {
            Ok(true) => drop(lock.disarm()),
            Ok(false) => tracing::error!("Numbering lock was not held at release"),
            Err(e) => tracing::error!("Failed to release numbering lock: {}", e),
        }
    }

    /// Read the highest number of the year once; the sequence issues the rest
    async fn next_sequence(
        &self,
        conn: &mut PoolConnection<Postgres>,
        year: i32,
    ) -> AppResult<NumberSequence> {
        let existing = sqlx::query_scalar::<_, String>(
            "SELECT document_number FROM transfer_documents WHERE document_number LIKE $1",
        )
        .bind(format!("{}%", DocumentNumber::year_prefix(year)))
        .fetch_all(&mut **conn)
        .await?;

        let sequence = NumberSequence::continue_from(year, existing.iter().map(String::as_str));
        tracing::debug!(next = %sequence.peek(), existing = existing.len(), "Numbering base read");
        Ok(sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingConnection {
        discarded: Arc<AtomicBool>,
    }

    impl SessionConnection for RecordingConnection {
        fn discard(self) {
            self.discarded.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_abandoned_run_discards_locked_connection() {
        let conn = RecordingConnection::default();
        let discarded = conn.discarded.clone();
        let run = async move {
            let _lock = NumberingLock::new(conn);
            futures::future::pending::<()>().await;
        };

        // The request is dropped while the run is suspended inside the lock
        assert!(run.now_or_never().is_none());
        assert!(discarded.load(Ordering::SeqCst));
    }

    #[test]
    fn test_disarmed_lock_keeps_connection() {
        let conn = RecordingConnection::default();
        let discarded = conn.discarded.clone();

        let returned = NumberingLock::new(conn).disarm();

        assert!(returned.is_some());
        assert!(!discarded.load(Ordering::SeqCst));
    }

    #[test]
    fn test_lock_dropped_without_release_discards_connection() {
        let conn = RecordingConnection::default();
        let discarded = conn.discarded.clone();

        let mut lock = NumberingLock::new(conn);
        assert!(lock.connection().is_ok());
        drop(lock);

        assert!(discarded.load(Ordering::SeqCst));
    }
}
