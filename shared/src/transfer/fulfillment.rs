//! Fulfillment state machine for transfer documents.
//!
//! ```text
//!   new ──start──► picking ──finish──► picked ──ship──► shipped ──receive──► confirmed
//!    │                │
//!    └────cancel──────┴──► cancelled
//! ```
//!
//! Every transition is a method whose `match` covers all states, so adding a
//! state forces each transition to decide about it. The backend runs these
//! checks on a loaded document and then persists the result with a single
//! conditional write keyed on the state it started from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{TransferDocument, TransferLineItem, TransferState};

/// Operator actions on a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentAction {
    StartPicking,
    Scan,
    ConfirmItem,
    FinishPicking,
    AddItem,
    Ship,
    ConfirmReceipt,
    Cancel,
}

impl FulfillmentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentAction::StartPicking => "start picking",
            FulfillmentAction::Scan => "scan",
            FulfillmentAction::ConfirmItem => "confirm an item of",
            FulfillmentAction::FinishPicking => "finish picking",
            FulfillmentAction::AddItem => "add an item to",
            FulfillmentAction::Ship => "ship",
            FulfillmentAction::ConfirmReceipt => "confirm receipt of",
            FulfillmentAction::Cancel => "cancel",
        }
    }
}

impl std::fmt::Display for FulfillmentAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected action; the document is left untouched
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FulfillmentError {
    #[error("cannot {action} a document in state {state}")]
    InvalidTransition {
        action: FulfillmentAction,
        state: TransferState,
    },

    #[error("line item {0} is not part of this document")]
    ItemNotFound(Uuid),

    #[error("product {product_code} has already been picked")]
    AlreadyPicked { product_code: String },

    #[error("{unconfirmed} items are not confirmed; a note explaining the partial fulfillment is required")]
    NoteRequired { unconfirmed: usize },

    #[error("picked quantity cannot be negative (got {0})")]
    NegativeQuantity(i32),

    #[error("added quantity must be positive (got {0})")]
    NonPositiveQuantity(i32),

    #[error("quantity of product {product_code} would exceed the supported maximum")]
    QuantityOverflow { product_code: String },
}

/// Effect of a state-changing action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    Moved {
        from: TransferState,
        to: TransferState,
    },
    /// Idempotent repeat, nothing to write
    Unchanged { state: TransferState },
}

impl Transition {
    pub fn is_moved(&self) -> bool {
        matches!(self, Transition::Moved { .. })
    }

    /// State the conditional write must still find
    pub fn expected_state(&self) -> TransferState {
        match self {
            Transition::Moved { from, .. } => *from,
            Transition::Unchanged { state } => *state,
        }
    }

    pub fn resulting_state(&self) -> TransferState {
        match self {
            Transition::Moved { to, .. } => *to,
            Transition::Unchanged { state } => *state,
        }
    }
}

fn moved(from: TransferState, to: TransferState) -> Result<Transition, FulfillmentError> {
    Ok(Transition::Moved { from, to })
}

fn rejected(action: FulfillmentAction, state: TransferState) -> Result<Transition, FulfillmentError> {
    Err(FulfillmentError::InvalidTransition { action, state })
}

impl TransferState {
    /// `new → picking`; a repeat from any later live state is a no-op
    pub fn start_picking(self) -> Result<Transition, FulfillmentError> {
        use TransferState::*;
        match self {
            New => moved(New, Picking),
            Picking | Picked | Shipped | Confirmed => Ok(Transition::Unchanged { state: self }),
            Cancelled => rejected(FulfillmentAction::StartPicking, self),
        }
    }

    /// `picking → picked`; partial completion needs a non-blank note
    pub fn finish_picking(
        self,
        unconfirmed: usize,
        note: Option<&str>,
    ) -> Result<Transition, FulfillmentError> {
        use TransferState::*;
        match self {
            Picking => {
                let has_note = note.is_some_and(|n| !n.trim().is_empty());
                if unconfirmed > 0 && !has_note {
                    return Err(FulfillmentError::NoteRequired { unconfirmed });
                }
                moved(Picking, Picked)
            }
            New | Picked | Shipped | Confirmed | Cancelled => {
                rejected(FulfillmentAction::FinishPicking, self)
            }
        }
    }

    /// `picked → shipped`
    pub fn ship(self) -> Result<Transition, FulfillmentError> {
        use TransferState::*;
        match self {
            Picked => moved(Picked, Shipped),
            New | Picking | Shipped | Confirmed | Cancelled => rejected(FulfillmentAction::Ship, self),
        }
    }

    /// `shipped → confirmed`
    pub fn confirm_receipt(self) -> Result<Transition, FulfillmentError> {
        use TransferState::*;
        match self {
            Shipped => moved(Shipped, Confirmed),
            New | Picking | Picked | Confirmed | Cancelled => {
                rejected(FulfillmentAction::ConfirmReceipt, self)
            }
        }
    }

    /// `{new, picking} → cancelled`
    pub fn cancel(self) -> Result<Transition, FulfillmentError> {
        use TransferState::*;
        match self {
            New | Picking => moved(self, Cancelled),
            Picked | Shipped | Confirmed | Cancelled => rejected(FulfillmentAction::Cancel, self),
        }
    }

    /// Scanning and item confirmation happen only inside a picking session
    pub fn accepts_scans(self) -> bool {
        matches!(self, TransferState::Picking)
    }

    /// Ad-hoc items may be added until the document leaves the warehouse
    pub fn accepts_additions(self) -> bool {
        matches!(
            self,
            TransferState::New | TransferState::Picking | TransferState::Picked
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TransferState::Confirmed | TransferState::Cancelled)
    }
}

/// Result of scanning a barcode during picking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// Single-unit line confirmed with quantity 1
    AutoConfirmed { item_id: Uuid, product_code: String },
    /// Operator must enter the picked quantity
    QuantityRequired {
        item_id: Uuid,
        product_code: String,
        default_quantity: i32,
    },
    AlreadyPicked { item_id: Uuid, product_code: String },
    NotOnDocument { product_code: String },
}

/// Product added by an operator outside the allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdHocItem {
    pub product_code: String,
    pub product_name: String,
    pub position: Option<String>,
    pub quantity: i32,
}

/// What an ad-hoc addition changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAddition {
    pub item_id: Uuid,
    /// The code already had a line; its quantity was increased
    pub duplicate_code: bool,
    /// A new line was inserted
    pub created: bool,
}

impl TransferDocument {
    fn transition(
        &mut self,
        transition: Result<Transition, FulfillmentError>,
    ) -> Result<Transition, FulfillmentError> {
        let transition = transition?;
        self.state = transition.resulting_state();
        Ok(transition)
    }

    /// Start picking; the start timestamp is written only by the first call
    pub fn start_picking(&mut self, now: DateTime<Utc>) -> Result<Transition, FulfillmentError> {
        let transition = self.transition(self.state.start_picking())?;
        if transition.is_moved() {
            self.started_at = Some(now);
        }
        Ok(transition)
    }

    /// Match a scanned code against the lines.
    ///
    /// Single-unit lines are confirmed right away with quantity 1.
    pub fn scan(&mut self, token: &str, now: DateTime<Utc>) -> Result<ScanOutcome, FulfillmentError> {
        if !self.state.accepts_scans() {
            return Err(FulfillmentError::InvalidTransition {
                action: FulfillmentAction::Scan,
                state: self.state,
            });
        }

        let code = token.trim();
        let open = self
            .items
            .iter_mut()
            .filter(|item| !item.confirmed && item.product_code == code)
            .min_by_key(|item| item.sequence_index);

        if let Some(item) = open {
            if item.requested_quantity == 1 {
                confirm_line(item, 1, now);
                return Ok(ScanOutcome::AutoConfirmed {
                    item_id: item.id,
                    product_code: item.product_code.clone(),
                });
            }
            return Ok(ScanOutcome::QuantityRequired {
                item_id: item.id,
                product_code: item.product_code.clone(),
                default_quantity: item.requested_quantity,
            });
        }

        let picked = self
            .items
            .iter()
            .find(|item| item.confirmed && item.product_code == code);
        Ok(match picked {
            Some(item) => ScanOutcome::AlreadyPicked {
                item_id: item.id,
                product_code: item.product_code.clone(),
            },
            None => ScanOutcome::NotOnDocument {
                product_code: code.to_string(),
            },
        })
    }

    /// Record the picked quantity for one line. Under- and over-picking are
    /// accepted and show up as a discrepancy.
    pub fn confirm_item(
        &mut self,
        item_id: Uuid,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<&TransferLineItem, FulfillmentError> {
        if !self.state.accepts_scans() {
            return Err(FulfillmentError::InvalidTransition {
                action: FulfillmentAction::ConfirmItem,
                state: self.state,
            });
        }
        if quantity < 0 {
            return Err(FulfillmentError::NegativeQuantity(quantity));
        }

        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or(FulfillmentError::ItemNotFound(item_id))?;
        if item.confirmed {
            return Err(FulfillmentError::AlreadyPicked {
                product_code: item.product_code.clone(),
            });
        }

        confirm_line(item, quantity, now);
        Ok(item)
    }

    /// Close the picking session. A partial pick keeps the trimmed note.
    pub fn finish_picking(
        &mut self,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Transition, FulfillmentError> {
        let unconfirmed = self.unconfirmed_count();
        let transition = self.transition(self.state.finish_picking(unconfirmed, note))?;

        if let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) {
            self.note = Some(note.to_string());
        }
        self.completed_at = Some(now);
        Ok(transition)
    }

    /// Add a product the allocation did not request, or top up an existing line.
    ///
    /// Lines added once picking has begun count as already picked.
    pub fn add_item(
        &mut self,
        item: AdHocItem,
        now: DateTime<Utc>,
    ) -> Result<ItemAddition, FulfillmentError> {
        if !self.state.accepts_additions() {
            return Err(FulfillmentError::InvalidTransition {
                action: FulfillmentAction::AddItem,
                state: self.state,
            });
        }
        if item.quantity <= 0 {
            return Err(FulfillmentError::NonPositiveQuantity(item.quantity));
        }

        let code = item.product_code.trim();
        if let Some(existing) = self.items.iter_mut().find(|line| line.product_code == code) {
            existing.top_up(item.quantity)?;
            return Ok(ItemAddition {
                item_id: existing.id,
                duplicate_code: true,
                created: false,
            });
        }

        let picked = self.state != TransferState::New;
        let sequence_index = self
            .items
            .iter()
            .map(|line| line.sequence_index)
            .max()
            .map_or(0, |max| max + 1);
        let line = TransferLineItem {
            id: Uuid::new_v4(),
            document_id: self.id,
            product_code: code.to_string(),
            product_name: item.product_name,
            position: item.position,
            requested_quantity: item.quantity,
            actual_quantity: picked.then_some(item.quantity),
            confirmed: picked,
            confirmed_at: picked.then_some(now),
            sequence_index,
            ad_hoc: true,
        };
        let item_id = line.id;
        self.items.push(line);

        Ok(ItemAddition {
            item_id,
            duplicate_code: false,
            created: true,
        })
    }

    pub fn ship(&mut self, now: DateTime<Utc>) -> Result<Transition, FulfillmentError> {
        let transition = self.transition(self.state.ship())?;
        self.shipped_at = Some(now);
        Ok(transition)
    }

    pub fn confirm_receipt(&mut self, now: DateTime<Utc>) -> Result<Transition, FulfillmentError> {
        let transition = self.transition(self.state.confirm_receipt())?;
        self.received_at = Some(now);
        Ok(transition)
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<Transition, FulfillmentError> {
        let transition = self.transition(self.state.cancel())?;
        self.cancelled_at = Some(now);
        Ok(transition)
    }
}

impl TransferLineItem {
    /// Raise the requested quantity, and the picked one for a confirmed
    /// line. Leaves the line untouched on overflow.
    pub fn top_up(&mut self, quantity: i32) -> Result<(), FulfillmentError> {
        let overflow = || FulfillmentError::QuantityOverflow {
            product_code: self.product_code.clone(),
        };
        let requested = self
            .requested_quantity
            .checked_add(quantity)
            .ok_or_else(overflow)?;
        let actual = match self.actual_quantity {
            Some(actual) if self.confirmed => Some(actual.checked_add(quantity).ok_or_else(overflow)?),
            other => other,
        };

        self.requested_quantity = requested;
        self.actual_quantity = actual;
        Ok(())
    }
}

fn confirm_line(item: &mut TransferLineItem, quantity: i32, now: DateTime<Utc>) {
    item.confirmed = true;
    item.actual_quantity = Some(quantity);
    item.confirmed_at = Some(now);
}
