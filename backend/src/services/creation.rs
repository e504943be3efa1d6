//! Per-store document creation saga
//!
//! Each draft is persisted in three steps: `CreateTask`, `InsertDocument`,
//! `InsertLineItems`. When the document insert fails the task created for
//! it is deleted again. A failed line-item insert keeps document and task
//! and is only reported. Failures are isolated per store.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use shared::transfer::{DocumentDraft, LineDraft};
use shared::{StoreCode, TaskDraft, TransferState};

use crate::error::AppResult;

/// Storage used by the saga
#[async_trait]
pub trait DocumentWriter: Send + Sync {
    async fn create_task(&self, task: &TaskDraft) -> AppResult<Uuid>;

    /// Compensation for `create_task`
    async fn delete_task(&self, task_id: Uuid) -> AppResult<()>;

    async fn insert_document(&self, draft: &DocumentDraft, task_id: Uuid) -> AppResult<Uuid>;

    async fn insert_line_items(&self, document_id: Uuid, lines: &[LineDraft]) -> AppResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaStep {
    CreateTask,
    InsertDocument,
    InsertLineItems,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum Compensation {
    NotNeeded,
    TaskDeleted,
    /// The orphaned task is still there
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedDocument {
    pub id: Uuid,
    pub document_number: String,
    pub destination_store: StoreCode,
    pub task_id: Uuid,
    pub line_count: usize,
    pub total_quantity: i64,
    /// False when line items could not be stored
    pub complete: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreationFailure {
    pub store: StoreCode,
    pub document_number: String,
    pub step: SagaStep,
    pub error: String,
    pub compensation: Compensation,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreationReport {
    pub created: Vec<CreatedDocument>,
    pub failures: Vec<CreationFailure>,
}

impl CreationReport {
    pub fn documents_created(&self) -> usize {
        self.created.len()
    }
}

/// Run the saga for every draft in order
pub async fn create_documents<W>(writer: &W, drafts: Vec<DocumentDraft>) -> CreationReport
where
    W: DocumentWriter + ?Sized,
{
    let mut report = CreationReport::default();
    for draft in drafts {
        create_one(writer, draft, &mut report).await;
    }
    report
}

async fn create_one<W>(writer: &W, draft: DocumentDraft, report: &mut CreationReport)
where
    W: DocumentWriter + ?Sized,
{
    let document_number = draft.document_number.to_string();
    let store = draft.destination_store.clone();

    let task_id = match writer.create_task(&draft.task).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(store = %store, document_number, "Task creation failed: {}", e);
            report.failures.push(CreationFailure {
                store,
                document_number,
                step: SagaStep::CreateTask,
                error: e.to_string(),
                compensation: Compensation::NotNeeded,
            });
            return;
        }
    };

    let document_id = match writer.insert_document(&draft, task_id).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(store = %store, document_number, "Document insert failed: {}", e);
            let compensation = match writer.delete_task(task_id).await {
                Ok(()) => {
                    tracing::warn!(%task_id, document_number, "Compensated: task deleted");
                    Compensation::TaskDeleted
                }
                Err(delete_err) => {
                    tracing::error!(%task_id, "Compensation failed, task left behind: {}", delete_err);
                    Compensation::Failed(delete_err.to_string())
                }
            };
            report.failures.push(CreationFailure {
                store,
                document_number,
                step: SagaStep::InsertDocument,
                error: e.to_string(),
                compensation,
            });
            return;
        }
    };

    let complete = match writer.insert_line_items(document_id, &draft.lines).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(
                %document_id,
                document_number,
                "Line items not stored, document kept without them: {}",
                e
            );
            report.failures.push(CreationFailure {
                store: store.clone(),
                document_number: document_number.clone(),
                step: SagaStep::InsertLineItems,
                error: e.to_string(),
                compensation: Compensation::NotNeeded,
            });
            false
        }
    };

    tracing::info!(%document_id, document_number, store = %store, "Transfer document created");
    report.created.push(CreatedDocument {
        id: document_id,
        document_number,
        destination_store: store,
        task_id,
        line_count: draft.lines.len(),
        total_quantity: draft.total_quantity(),
        complete,
    });
}

/// PostgreSQL-backed writer
#[derive(Clone)]
pub struct PgDocumentWriter {
    db: PgPool,
}

impl PgDocumentWriter {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DocumentWriter for PgDocumentWriter {
    async fn create_task(&self, task: &TaskDraft) -> AppResult<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO tasks (title, description, priority, due_date, assignee, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.priority.as_str())
        .bind(task.due_date)
        .bind(task.assignee)
        .bind(task.created_by)
        .fetch_one(&self.db)
        .await?;

        Ok(id)
    }

    async fn delete_task(&self, task_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(task_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn insert_document(&self, draft: &DocumentDraft, task_id: Uuid) -> AppResult<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO transfer_documents (
                document_number, source_warehouse, destination_store,
                state, assignee, created_by, task_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(draft.document_number.to_string())
        .bind(&draft.source_warehouse)
        .bind(draft.destination_store.as_str())
        .bind(TransferState::New.as_str())
        .bind(draft.assignee)
        .bind(draft.created_by)
        .bind(task_id)
        .fetch_one(&self.db)
        .await?;

        Ok(id)
    }

    async fn insert_line_items(&self, document_id: Uuid, lines: &[LineDraft]) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO transfer_line_items (
                    document_id, product_code, product_name, position,
                    requested_quantity, sequence_index
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(document_id)
            .bind(&line.product_code)
            .bind(&line.product_name)
            .bind(&line.position)
            .bind(line.requested_quantity)
            .bind(line.sequence_index)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
