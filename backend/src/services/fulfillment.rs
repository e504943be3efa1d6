//! Fulfillment actions on stored transfer documents
//!
//! Every action loads the document, runs the transition on the in-memory
//! copy and persists it with one conditional write keyed on the state (or
//! the item's confirmed flag) that was read. Zero affected rows means a
//! concurrent writer won. Ad-hoc additions instead reload the document under
//! its row lock and apply the change to that copy.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use shared::transfer::{
    AdHocItem, FulfillmentAction, FulfillmentError, ItemAddition, ScanOutcome, Transition,
};
use shared::{TransferDocument, TransferLineItem, TransferState};

use crate::error::{AppError, AppResult};
use crate::services::events::{TransferEvent, TransferEventKind, TransferEvents};
use crate::services::transfer::{load_document, RowLock};

/// Storage used by fulfillment
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn load(&self, document_id: Uuid) -> AppResult<TransferDocument>;

    /// False when the stored state is no longer the transition's origin
    async fn write_transition(
        &self,
        document: &TransferDocument,
        transition: Transition,
    ) -> AppResult<bool>;

    /// False when the item is already confirmed or the document stopped picking
    async fn write_confirmation(
        &self,
        document_id: Uuid,
        item_id: Uuid,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Apply an addition to the current document and store it atomically.
    /// Returns the document as stored.
    async fn add_item(
        &self,
        document_id: Uuid,
        item: AdHocItem,
        now: DateTime<Utc>,
    ) -> AppResult<(TransferDocument, ItemAddition)>;
}

#[derive(Clone)]
pub struct PgDocumentStore {
    db: PgPool,
}

impl PgDocumentStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn load(&self, document_id: Uuid) -> AppResult<TransferDocument> {
        let mut conn = self.db.acquire().await?;
        load_document(&mut conn, document_id, RowLock::None).await
    }

    async fn write_transition(
        &self,
        document: &TransferDocument,
        transition: Transition,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE transfer_documents
            SET state = $3, note = $4, started_at = $5, completed_at = $6,
                shipped_at = $7, received_at = $8, cancelled_at = $9
            WHERE id = $1 AND state = $2
            "#,
        )
        .bind(document.id)
        .bind(transition.expected_state().as_str())
        .bind(transition.resulting_state().as_str())
        .bind(&document.note)
        .bind(document.started_at)
        .bind(document.completed_at)
        .bind(document.shipped_at)
        .bind(document.received_at)
        .bind(document.cancelled_at)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn write_confirmation(
        &self,
        document_id: Uuid,
        item_id: Uuid,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE transfer_line_items li
            SET confirmed = true, actual_quantity = $3, confirmed_at = $4
            FROM transfer_documents d
            WHERE li.id = $1 AND li.document_id = $2 AND li.confirmed = false
              AND d.id = li.document_id AND d.state = $5
            "#,
        )
        .bind(item_id)
        .bind(document_id)
        .bind(quantity)
        .bind(now)
        .bind(TransferState::Picking.as_str())
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn add_item(
        &self,
        document_id: Uuid,
        item: AdHocItem,
        now: DateTime<Utc>,
    ) -> AppResult<(TransferDocument, ItemAddition)> {
        let quantity = item.quantity;
        let mut tx = self.db.begin().await?;

        // The row lock keeps ship, cancel and other additions out until commit
        let mut document = load_document(&mut *tx, document_id, RowLock::ForUpdate).await?;
        let addition = document.add_item(item, now)?;

        if addition.created {
            let line = document
                .item(addition.item_id)
                .ok_or(FulfillmentError::ItemNotFound(addition.item_id))?;
            sqlx::query(
                r#"
                INSERT INTO transfer_line_items (
                    id, document_id, product_code, product_name, position,
                    requested_quantity, actual_quantity, confirmed, confirmed_at,
                    sequence_index, ad_hoc
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, true)
                "#,
            )
            .bind(line.id)
            .bind(document_id)
            .bind(&line.product_code)
            .bind(&line.product_name)
            .bind(&line.position)
            .bind(line.requested_quantity)
            .bind(line.actual_quantity)
            .bind(line.confirmed)
            .bind(line.confirmed_at)
            .bind(line.sequence_index)
            .execute(&mut *tx)
            .await?;
        } else {
            // Confirmations do not take the document lock, so the line may
            // have been confirmed since it was read
            let stored = sqlx::query_as::<_, (i32, Option<i32>, bool, Option<DateTime<Utc>>)>(
                r#"
                UPDATE transfer_line_items
                SET requested_quantity = requested_quantity + $2,
                    actual_quantity = CASE WHEN confirmed THEN actual_quantity + $2
                                           ELSE actual_quantity END
                WHERE id = $1
                RETURNING requested_quantity, actual_quantity, confirmed, confirmed_at
                "#,
            )
            .bind(addition.item_id)
            .bind(quantity)
            .fetch_one(&mut *tx)
            .await?;

            if let Some(line) = document
                .items
                .iter_mut()
                .find(|line| line.id == addition.item_id)
            {
                (
                    line.requested_quantity,
                    line.actual_quantity,
                    line.confirmed,
                    line.confirmed_at,
                ) = stored;
            }
        }

        tx.commit().await?;
        Ok((document, addition))
    }
}

#[derive(Clone)]
pub struct FulfillmentService<S = PgDocumentStore> {
    store: S,
    events: TransferEvents,
}

/// Scan outcome together with the document as it is after the scan
#[derive(Debug, Serialize)]
pub struct ScanResult {
    #[serde(flatten)]
    pub outcome: ScanOutcome,
    pub document: TransferDocument,
}

#[derive(Debug, Serialize)]
pub struct AddItemResult {
    pub item: TransferLineItem,
    /// The code was already on the document and its quantity was raised
    pub duplicate_code: bool,
    pub document: TransferDocument,
}

impl FulfillmentService {
    pub fn new(db: PgPool, events: TransferEvents) -> Self {
        Self::with_store(PgDocumentStore::new(db), events)
    }
}

impl<S: DocumentStore> FulfillmentService<S> {
    pub fn with_store(store: S, events: TransferEvents) -> Self {
        Self { store, events }
    }

    /// `new → picking`. Repeats, including a lost race against another
    /// starter, return the document unchanged.
    pub async fn start_picking(&self, document_id: Uuid) -> AppResult<TransferDocument> {
        let mut document = self.store.load(document_id).await?;
        let transition = document.start_picking(Utc::now())?;
        if !transition.is_moved() {
            tracing::debug!(document_number = %document.document_number, "Picking already started");
            return Ok(document);
        }

        if self.write_transition(&document, transition).await? {
            return Ok(document);
        }

        let current = self.store.load(document_id).await?;
        match current.state.start_picking()? {
            Transition::Unchanged { .. } => Ok(current),
            Transition::Moved { .. } => Err(AppError::stale_document(&current.document_number)),
        }
    }

    pub async fn scan(&self, document_id: Uuid, token: &str) -> AppResult<ScanResult> {
        let mut document = self.store.load(document_id).await?;
        let now = Utc::now();
        let outcome = document.scan(token, now)?;

        if let ScanOutcome::AutoConfirmed { item_id, .. } = &outcome {
            self.write_confirmation(&document, *item_id, 1, now).await?;
        }

        tracing::debug!(document_number = %document.document_number, ?outcome, "Scan handled");
        Ok(ScanResult { outcome, document })
    }

    /// Record the picked quantity of one line
    pub async fn confirm_item(
        &self,
        document_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> AppResult<TransferDocument> {
        let mut document = self.store.load(document_id).await?;
        let now = Utc::now();
        document.confirm_item(item_id, quantity, now)?;
        self.write_confirmation(&document, item_id, quantity, now).await?;
        Ok(document)
    }

    /// `picking → picked`
    pub async fn finish_picking(
        &self,
        document_id: Uuid,
        note: Option<&str>,
    ) -> AppResult<TransferDocument> {
        let mut document = self.store.load(document_id).await?;
        let transition = document.finish_picking(note, Utc::now())?;
        self.require_transition(&document, transition).await?;
        if document.unconfirmed_count() > 0 {
            tracing::warn!(
                document_number = %document.document_number,
                unconfirmed = document.unconfirmed_count(),
                "Picking finished partially"
            );
        }
        Ok(document)
    }

    /// `picked → shipped`
    pub async fn ship(&self, document_id: Uuid) -> AppResult<TransferDocument> {
        let mut document = self.store.load(document_id).await?;
        let transition = document.ship(Utc::now())?;
        self.require_transition(&document, transition).await?;
        Ok(document)
    }

    /// `shipped → confirmed`
    pub async fn confirm_receipt(&self, document_id: Uuid) -> AppResult<TransferDocument> {
        let mut document = self.store.load(document_id).await?;
        let transition = document.confirm_receipt(Utc::now())?;
        self.require_transition(&document, transition).await?;
        Ok(document)
    }

    /// `{new, picking} → cancelled`
    pub async fn cancel(&self, document_id: Uuid) -> AppResult<TransferDocument> {
        let mut document = self.store.load(document_id).await?;
        let transition = document.cancel(Utc::now())?;
        self.require_transition(&document, transition).await?;
        Ok(document)
    }

    /// Add an ad-hoc line or raise the quantity of an existing one
    pub async fn add_item(&self, document_id: Uuid, item: AdHocItem) -> AppResult<AddItemResult> {
        let (document, addition) = self.store.add_item(document_id, item, Utc::now()).await?;
        let line = document
            .item(addition.item_id)
            .cloned()
            .ok_or(FulfillmentError::ItemNotFound(addition.item_id))?;

        if addition.duplicate_code {
            tracing::warn!(
                document_number = %document.document_number,
                product_code = %line.product_code,
                "Ad-hoc item already on document, quantity raised"
            );
        } else {
            tracing::info!(
                document_number = %document.document_number,
                product_code = %line.product_code,
                "Ad-hoc item added"
            );
        }
        self.events.publish(TransferEvent::new(
            document.id,
            document.document_number.clone(),
            TransferEventKind::ItemAdded {
                item_id: line.id,
                duplicate_code: addition.duplicate_code,
            },
        ));

        Ok(AddItemResult {
            item: line,
            duplicate_code: addition.duplicate_code,
            document,
        })
    }

    /// Persist a transition that must not race
    async fn require_transition(
        &self,
        document: &TransferDocument,
        transition: Transition,
    ) -> AppResult<()> {
        if self.write_transition(document, transition).await? {
            Ok(())
        } else {
            Err(AppError::stale_document(&document.document_number))
        }
    }

    async fn write_transition(
        &self,
        document: &TransferDocument,
        transition: Transition,
    ) -> AppResult<bool> {
        if !self.store.write_transition(document, transition).await? {
            tracing::warn!(
                document_number = %document.document_number,
                expected = %transition.expected_state(),
                "State changed concurrently, transition not applied"
            );
            return Ok(false);
        }

        tracing::info!(
            document_number = %document.document_number,
            from = %transition.expected_state(),
            to = %transition.resulting_state(),
            "Transfer document state changed"
        );
        self.events.publish(TransferEvent::new(
            document.id,
            document.document_number.clone(),
            TransferEventKind::StateChanged {
                from: transition.expected_state(),
                to: transition.resulting_state(),
            },
        ));
        Ok(true)
    }

    /// A lost confirmation is explained from the document as it is now
    async fn write_confirmation(
        &self,
        document: &TransferDocument,
        item_id: Uuid,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if !self
            .store
            .write_confirmation(document.id, item_id, quantity, now)
            .await?
        {
            let current = self.store.load(document.id).await?;
            tracing::warn!(
                document_number = %current.document_number,
                %item_id,
                "Item confirmation lost a concurrent update"
            );
            return Err(match current.item(item_id) {
                Some(item) if item.confirmed => FulfillmentError::AlreadyPicked {
                    product_code: item.product_code.clone(),
                }
                .into(),
                Some(_) if !current.state.accepts_scans() => FulfillmentError::InvalidTransition {
                    action: FulfillmentAction::ConfirmItem,
                    state: current.state,
                }
                .into(),
                Some(_) => AppError::stale_document(&current.document_number),
                None => FulfillmentError::ItemNotFound(item_id).into(),
            });
        }

        tracing::info!(
            document_number = %document.document_number,
            %item_id,
            quantity,
            "Line item confirmed"
        );
        self.events.publish(TransferEvent::new(
            document.id,
            document.document_number.clone(),
            TransferEventKind::ItemConfirmed {
                item_id,
                actual_quantity: quantity,
            },
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tokio::sync::broadcast::error::TryRecvError;

    type Interleave = Box<dyn FnOnce(&mut TransferDocument) + Send>;

    /// In-memory store. `interleave` runs once against the stored copy right
    /// before the next write, as a competing client would.
    #[derive(Default)]
    struct MemoryStore {
        documents: Mutex<HashMap<Uuid, TransferDocument>>,
        interleave: Mutex<Option<Interleave>>,
        drop_next_confirmation: AtomicBool,
    }

    impl MemoryStore {
        fn with_document(document: TransferDocument) -> Self {
            let store = Self::default();
            store.documents.lock().unwrap().insert(document.id, document);
            store
        }

        fn before_next_write(&self, change: impl FnOnce(&mut TransferDocument) + Send + 'static) {
            *self.interleave.lock().unwrap() = Some(Box::new(change));
        }

        fn stored(&self, document_id: Uuid) -> TransferDocument {
            self.documents.lock().unwrap()[&document_id].clone()
        }

        fn run_interleave(&self, document: &mut TransferDocument) {
            if let Some(change) = self.interleave.lock().unwrap().take() {
                change(document);
            }
        }
    }

    #[async_trait]
    impl DocumentStore for MemoryStore {
        async fn load(&self, document_id: Uuid) -> AppResult<TransferDocument> {
            self.documents
                .lock()
                .unwrap()
                .get(&document_id)
                .cloned()
                .ok_or_else(|| AppError::NotFound("Transfer document".into()))
        }

        async fn write_transition(
            &self,
            document: &TransferDocument,
            transition: Transition,
        ) -> AppResult<bool> {
            let mut documents = self.documents.lock().unwrap();
            let stored = documents.get_mut(&document.id).unwrap();
            self.run_interleave(stored);
            if stored.state != transition.expected_state() {
                return Ok(false);
            }
            stored.state = transition.resulting_state();
            stored.note = document.note.clone();
            stored.started_at = document.started_at;
            stored.completed_at = document.completed_at;
            stored.shipped_at = document.shipped_at;
            stored.received_at = document.received_at;
            stored.cancelled_at = document.cancelled_at;
            Ok(true)
        }

        async fn write_confirmation(
            &self,
            document_id: Uuid,
            item_id: Uuid,
            quantity: i32,
            now: DateTime<Utc>,
        ) -> AppResult<bool> {
            let mut documents = self.documents.lock().unwrap();
            let stored = documents.get_mut(&document_id).unwrap();
            self.run_interleave(stored);
            if self.drop_next_confirmation.swap(false, Ordering::SeqCst)
                || stored.state != TransferState::Picking
            {
                return Ok(false);
            }
            match stored.items.iter_mut().find(|line| line.id == item_id) {
                Some(line) if !line.confirmed => {
                    line.confirmed = true;
                    line.actual_quantity = Some(quantity);
                    line.confirmed_at = Some(now);
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn add_item(
            &self,
            document_id: Uuid,
            item: AdHocItem,
            now: DateTime<Utc>,
        ) -> AppResult<(TransferDocument, ItemAddition)> {
            let mut documents = self.documents.lock().unwrap();
            let stored = documents
                .get_mut(&document_id)
                .ok_or_else(|| AppError::NotFound("Transfer document".into()))?;
            self.run_interleave(stored);
            let mut document = stored.clone();
            let addition = document.add_item(item, now)?;
            *stored = document.clone();
            Ok((document, addition))
        }
    }

    fn document(state: TransferState) -> TransferDocument {
        let id = Uuid::new_v4();
        let line = |code: &str, requested: i32, index: i32| TransferLineItem {
            id: Uuid::new_v4(),
            document_id: id,
            product_code: code.to_string(),
            product_name: format!("Produkt {code}"),
            position: Some(format!("A-{}", index + 1)),
            requested_quantity: requested,
            actual_quantity: None,
            confirmed: false,
            confirmed_at: None,
            sequence_index: index,
            ad_hoc: false,
        };
        TransferDocument {
            id,
            document_number: "PV-2026-021".to_string(),
            source_warehouse: "CENTRAL".to_string(),
            destination_store: "BRNO".into(),
            state,
            assignee: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            task_id: None,
            note: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            shipped_at: None,
            received_at: None,
            cancelled_at: None,
            items: vec![line("KAVA01", 5, 0), line("MLYNEK", 1, 1)],
        }
    }

    fn ad_hoc(code: &str, quantity: i32) -> AdHocItem {
        AdHocItem {
            product_code: code.to_string(),
            product_name: format!("Produkt {code}"),
            position: None,
            quantity,
        }
    }

    fn service(document: TransferDocument) -> (FulfillmentService<MemoryStore>, Uuid) {
        let id = document.id;
        let service =
            FulfillmentService::with_store(MemoryStore::with_document(document), TransferEvents::new(16));
        (service, id)
    }

    fn confirm_line(code: &'static str, quantity: i32) -> impl FnOnce(&mut TransferDocument) + Send {
        move |doc: &mut TransferDocument| {
            let line = doc.items.iter_mut().find(|l| l.product_code == code).unwrap();
            line.confirmed = true;
            line.actual_quantity = Some(quantity);
            line.confirmed_at = Some(Utc::now());
        }
    }

    #[tokio::test]
    async fn test_start_picking_lost_to_other_starter_returns_current() {
        let (service, id) = service(document(TransferState::New));
        let mut events = service.events.subscribe();
        service
            .store
            .before_next_write(|doc| doc.state = TransferState::Picking);

        let document = service.start_picking(id).await.unwrap();

        assert_eq!(document.state, TransferState::Picking);
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_start_picking_lost_to_cancel_is_rejected() {
        let (service, id) = service(document(TransferState::New));
        service
            .store
            .before_next_write(|doc| doc.state = TransferState::Cancelled);

        let err = service.start_picking(id).await.unwrap_err();

        assert!(matches!(
            err,
            AppError::Fulfillment(FulfillmentError::InvalidTransition {
                state: TransferState::Cancelled,
                ..
            })
        ));
        assert_eq!(service.store.stored(id).state, TransferState::Cancelled);
    }

    #[tokio::test]
    async fn test_start_picking_publishes_state_change() {
        let (service, id) = service(document(TransferState::New));
        let mut events = service.events.subscribe();

        service.start_picking(id).await.unwrap();

        let event = events.try_recv().unwrap();
        assert_eq!(
            event.kind,
            TransferEventKind::StateChanged {
                from: TransferState::New,
                to: TransferState::Picking,
            }
        );
        assert!(service.store.stored(id).started_at.is_some());
    }

    #[tokio::test]
    async fn test_confirmation_lost_to_other_picker_is_already_picked() {
        let doc = document(TransferState::Picking);
        let item_id = doc.items[0].id;
        let (service, id) = service(doc);
        service.store.before_next_write(confirm_line("KAVA01", 4));

        let err = service.confirm_item(id, item_id, 5).await.unwrap_err();

        assert!(matches!(
            err,
            AppError::Fulfillment(FulfillmentError::AlreadyPicked { ref product_code })
                if product_code == "KAVA01"
        ));
        assert_eq!(service.store.stored(id).items[0].actual_quantity, Some(4));
    }

    #[tokio::test]
    async fn test_confirmation_after_cancel_is_invalid_transition() {
        let doc = document(TransferState::Picking);
        let item_id = doc.items[0].id;
        let (service, id) = service(doc);
        service
            .store
            .before_next_write(|doc| doc.state = TransferState::Cancelled);

        let err = service.confirm_item(id, item_id, 5).await.unwrap_err();

        assert!(matches!(
            err,
            AppError::Fulfillment(FulfillmentError::InvalidTransition {
                action: FulfillmentAction::ConfirmItem,
                state: TransferState::Cancelled,
            })
        ));
    }

    #[tokio::test]
    async fn test_unexplained_lost_confirmation_is_conflict() {
        let doc = document(TransferState::Picking);
        let item_id = doc.items[1].id;
        let (service, id) = service(doc);
        service
            .store
            .drop_next_confirmation
            .store(true, Ordering::SeqCst);

        let err = service.confirm_item(id, item_id, 1).await.unwrap_err();

        assert!(matches!(err, AppError::Conflict { .. }));
        assert!(!service.store.stored(id).items[1].confirmed);
    }

    #[tokio::test]
    async fn test_scan_auto_confirm_is_stored() {
        let doc = document(TransferState::Picking);
        let (service, id) = service(doc);
        let mut events = service.events.subscribe();

        let result = service.scan(id, "MLYNEK").await.unwrap();

        assert!(matches!(result.outcome, ScanOutcome::AutoConfirmed { .. }));
        assert!(service.store.stored(id).items[1].confirmed);
        assert!(matches!(
            events.try_recv().unwrap().kind,
            TransferEventKind::ItemConfirmed { actual_quantity: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_add_item_tops_up_line_confirmed_meanwhile() {
        let (service, id) = service(document(TransferState::Picking));
        // Another picker confirms 5 between the request and the addition
        service.store.before_next_write(confirm_line("KAVA01", 5));

        let result = service.add_item(id, ad_hoc("KAVA01", 2)).await.unwrap();

        assert!(result.duplicate_code);
        assert!(result.item.confirmed);
        assert_eq!(result.item.requested_quantity, 7);
        assert_eq!(result.item.actual_quantity, Some(7));

        let stored = service.store.stored(id);
        assert_eq!(stored.items.len(), 2);
        assert_eq!(stored.items[0].actual_quantity, Some(7));
    }

    #[tokio::test]
    async fn test_repeated_new_code_gets_one_line() {
        let (service, id) = service(document(TransferState::Picking));

        let first = service.add_item(id, ad_hoc("SIRUP", 2)).await.unwrap();
        let second = service.add_item(id, ad_hoc("SIRUP", 3)).await.unwrap();

        assert!(!first.duplicate_code);
        assert!(second.duplicate_code);
        assert_eq!(first.item.id, second.item.id);

        let stored = service.store.stored(id);
        let sirup: Vec<_> = stored
            .items
            .iter()
            .filter(|line| line.product_code == "SIRUP")
            .collect();
        assert_eq!(sirup.len(), 1);
        assert_eq!(sirup[0].requested_quantity, 5);
        assert_eq!(sirup[0].actual_quantity, Some(5));
    }

    #[tokio::test]
    async fn test_add_item_after_ship_is_rejected_without_write() {
        let (service, id) = service(document(TransferState::Picking));
        let mut events = service.events.subscribe();
        service
            .store
            .before_next_write(|doc| doc.state = TransferState::Shipped);

        let err = service.add_item(id, ad_hoc("SIRUP", 1)).await.unwrap_err();

        assert!(matches!(
            err,
            AppError::Fulfillment(FulfillmentError::InvalidTransition {
                action: FulfillmentAction::AddItem,
                ..
            })
        ));
        assert_eq!(service.store.stored(id).items.len(), 2);
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }
}
