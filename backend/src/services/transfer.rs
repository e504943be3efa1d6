//! Transfer document queries and pick-list export

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use shared::transfer::PickList;
use shared::{
    PaginatedResponse, Pagination, PaginationMeta, StoreCode, TransferDocument, TransferLineItem,
    TransferState,
};

use crate::error::{AppError, AppResult};

/// Transfer document service
#[derive(Clone)]
pub struct TransferService {
    db: PgPool,
}

/// Listing filter
#[derive(Debug, Default, Deserialize)]
pub struct TransferFilter {
    pub state: Option<TransferState>,
    pub store: Option<String>,
}

/// One row of the document listing
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TransferSummary {
    pub id: Uuid,
    pub document_number: String,
    pub destination_store: String,
    pub state: String,
    pub assignee: Uuid,
    pub created_at: DateTime<Utc>,
    pub item_count: i64,
    pub confirmed_count: i64,
    pub total_requested: i64,
}

macro_rules! document_select {
    () => {
        "SELECT id, document_number, source_warehouse, destination_store, state, \
         assignee, created_by, task_id, note, created_at, started_at, \
         completed_at, shipped_at, received_at, cancelled_at \
         FROM transfer_documents"
    };
}

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: Uuid,
    document_number: String,
    source_warehouse: String,
    destination_store: String,
    state: String,
    assignee: Uuid,
    created_by: Uuid,
    task_id: Option<Uuid>,
    note: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    received_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct LineItemRow {
    id: Uuid,
    document_id: Uuid,
    product_code: String,
    product_name: String,
    position: Option<String>,
    requested_quantity: i32,
    actual_quantity: Option<i32>,
    confirmed: bool,
    confirmed_at: Option<DateTime<Utc>>,
    sequence_index: i32,
    ad_hoc: bool,
}

impl From<LineItemRow> for TransferLineItem {
    fn from(row: LineItemRow) -> Self {
        TransferLineItem {
            id: row.id,
            document_id: row.document_id,
            product_code: row.product_code,
            product_name: row.product_name,
            position: row.position,
            requested_quantity: row.requested_quantity,
            actual_quantity: row.actual_quantity,
            confirmed: row.confirmed,
            confirmed_at: row.confirmed_at,
            sequence_index: row.sequence_index,
            ad_hoc: row.ad_hoc,
        }
    }
}

impl DocumentRow {
    fn into_document(self, items: Vec<TransferLineItem>) -> AppResult<TransferDocument> {
        let state = TransferState::from_str(&self.state).ok_or_else(|| {
            AppError::Internal(format!(
                "Transfer document {} has unknown state {}",
                self.document_number, self.state
            ))
        })?;

        Ok(TransferDocument {
            id: self.id,
            document_number: self.document_number,
            source_warehouse: self.source_warehouse,
            destination_store: StoreCode::from(self.destination_store),
            state,
            assignee: self.assignee,
            created_by: self.created_by,
            task_id: self.task_id,
            note: self.note,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            shipped_at: self.shipped_at,
            received_at: self.received_at,
            cancelled_at: self.cancelled_at,
            items,
        })
    }
}

/// Whether the document row is locked for the rest of the transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLock {
    None,
    ForUpdate,
}

/// Load a document and its items on one connection. With
/// [`RowLock::ForUpdate`] the items are read after the lock is granted.
pub async fn load_document(
    conn: &mut PgConnection,
    document_id: Uuid,
    lock: RowLock,
) -> AppResult<TransferDocument> {
    let sql = match lock {
        RowLock::None => concat!(document_select!(), " WHERE id = $1"),
        RowLock::ForUpdate => concat!(document_select!(), " WHERE id = $1 FOR UPDATE"),
    };
    let row = sqlx::query_as::<_, DocumentRow>(sql)
        .bind(document_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Transfer document".to_string()))?;

    let items = sqlx::query_as::<_, LineItemRow>(
        r#"
        SELECT id, document_id, product_code, product_name, position,
               requested_quantity, actual_quantity, confirmed, confirmed_at,
               sequence_index, ad_hoc
        FROM transfer_line_items
        WHERE document_id = $1
        ORDER BY sequence_index
        "#,
    )
    .bind(document_id)
    .fetch_all(&mut *conn)
    .await?;

    row.into_document(items.into_iter().map(TransferLineItem::from).collect())
}

impl TransferService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get a document with its line items in presentation order
    pub async fn get(&self, document_id: Uuid) -> AppResult<TransferDocument> {
        let mut conn = self.db.acquire().await?;
        load_document(&mut conn, document_id, RowLock::None).await
    }

    /// List documents, newest first
    pub async fn list(
        &self,
        filter: &TransferFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<TransferSummary>> {
        let state = filter.state.map(|s| s.as_str());
        let store = filter.store.as_deref();

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM transfer_documents
            WHERE ($1::text IS NULL OR state = $1)
              AND ($2::text IS NULL OR destination_store = $2)
            "#,
        )
        .bind(state)
        .bind(store)
        .fetch_one(&self.db)
        .await?;

        let data = sqlx::query_as::<_, TransferSummary>(
            r#"
            SELECT d.id, d.document_number, d.destination_store, d.state, d.assignee,
                   d.created_at,
                   COUNT(li.id) AS item_count,
                   COUNT(li.id) FILTER (WHERE li.confirmed) AS confirmed_count,
                   COALESCE(SUM(li.requested_quantity), 0)::BIGINT AS total_requested
            FROM transfer_documents d
            LEFT JOIN transfer_line_items li ON li.document_id = d.id
            WHERE ($1::text IS NULL OR d.state = $1)
              AND ($2::text IS NULL OR d.destination_store = $2)
            GROUP BY d.id
            ORDER BY d.created_at DESC, d.document_number DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(state)
        .bind(store)
        .bind(i64::from(pagination.limit()))
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta::new(pagination, total.max(0) as u64),
        })
    }

    /// Export a pick list as CSV
    pub fn export_pick_list_csv(pick_list: &PickList) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for row in &pick_list.rows {
            wtr.serialize(row)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let csv_data = String::from_utf8(
            wtr.into_inner()
                .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?,
        )
        .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))?;
        Ok(csv_data)
    }
}
