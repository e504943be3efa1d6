//! Transfer document ("převodka") and line item models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::StoreCode;

/// Lifecycle state of a transfer document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    /// Created, nobody is picking yet
    New,
    /// An assignee is scanning and confirming items
    Picking,
    /// Picking session closed, fully or partially
    Picked,
    /// Dispatched to the destination store
    Shipped,
    /// Destination acknowledged receipt. Terminal.
    Confirmed,
    /// Terminal.
    Cancelled,
}

impl TransferState {
    pub const ALL: [TransferState; 6] = [
        TransferState::New,
        TransferState::Picking,
        TransferState::Picked,
        TransferState::Shipped,
        TransferState::Confirmed,
        TransferState::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::New => "new",
            TransferState::Picking => "picking",
            TransferState::Picked => "picked",
            TransferState::Shipped => "shipped",
            TransferState::Confirmed => "confirmed",
            TransferState::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new" => Some(TransferState::New),
            "picking" => Some(TransferState::Picking),
            "picked" => Some(TransferState::Picked),
            "shipped" => Some(TransferState::Shipped),
            "confirmed" => Some(TransferState::Confirmed),
            "cancelled" => Some(TransferState::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An internal shipment order from the central warehouse to one store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferDocument {
    pub id: Uuid,
    /// `PV-<year>-<sequence>`
    pub document_number: String,
    pub source_warehouse: String,
    pub destination_store: StoreCode,
    pub state: TransferState,
    pub assignee: Uuid,
    pub created_by: Uuid,
    /// Linked task in the task subsystem
    pub task_id: Option<Uuid>,
    /// Completion note, mandatory for partial fulfillment
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Ordered by `sequence_index`
    pub items: Vec<TransferLineItem>,
}

/// One product entry within a transfer document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferLineItem {
    pub id: Uuid,
    pub document_id: Uuid,
    pub product_code: String,
    pub product_name: String,
    pub position: Option<String>,
    pub requested_quantity: i32,
    /// Set once confirmed
    pub actual_quantity: Option<i32>,
    pub confirmed: bool,
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Presentation order on the pick list
    pub sequence_index: i32,
    /// Added by an operator after the document was created
    pub ad_hoc: bool,
}

/// Difference between picked and requested quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "quantity", rename_all = "snake_case")]
pub enum Discrepancy {
    Short(i32),
    Over(i32),
}

impl TransferLineItem {
    /// `None` while unconfirmed or when the picked quantity matches
    pub fn discrepancy(&self) -> Option<Discrepancy> {
        let actual = self.actual_quantity?;
        match actual.cmp(&self.requested_quantity) {
            std::cmp::Ordering::Less => Some(Discrepancy::Short(self.requested_quantity - actual)),
            std::cmp::Ordering::Greater => Some(Discrepancy::Over(actual - self.requested_quantity)),
            std::cmp::Ordering::Equal => None,
        }
    }
}

impl TransferDocument {
    pub fn item(&self, item_id: Uuid) -> Option<&TransferLineItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn unconfirmed_count(&self) -> usize {
        self.items.iter().filter(|item| !item.confirmed).count()
    }

    pub fn is_fully_confirmed(&self) -> bool {
        self.unconfirmed_count() == 0
    }

    pub fn total_requested(&self) -> i64 {
        self.items
            .iter()
            .map(|item| i64::from(item.requested_quantity))
            .sum()
    }
}
