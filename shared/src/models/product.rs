//! Catalog and stock models supplied by the data warehouse

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::StoreCode;

/// A catalog product with its configured target stock per store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Unique catalog code, also the barcode payload scanned while picking
    pub code: String,
    pub name: String,
    /// Desired stock level per destination store
    #[serde(default)]
    pub target_stock: BTreeMap<StoreCode, i32>,
}

impl Product {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            target_stock: BTreeMap::new(),
        }
    }

    pub fn with_target(mut self, store: impl Into<StoreCode>, target: i32) -> Self {
        self.target_stock.insert(store.into(), target);
        self
    }

    pub fn target_for(&self, store: &StoreCode) -> Option<i32> {
        self.target_stock.get(store).copied()
    }
}

/// Per-product, per-store demand input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DemandInput {
    /// Recent sales velocity at the store
    pub average_sales: Decimal,
    /// Current stock at the store; may be negative
    pub current_stock: i32,
}

/// Central-warehouse stock for one product
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CentralStockInfo {
    /// Raw central stock, negative values are kept
    pub quantity: i32,
    /// Bin/slot identifier used for picker routing
    pub position: Option<String>,
    /// Sales velocity of the central warehouse itself
    pub average_sales: Decimal,
}

impl CentralStockInfo {
    /// Half of the central sales velocity, kept back from distribution
    pub fn reserved_demand(&self) -> Decimal {
        self.average_sales / Decimal::TWO
    }
}

/// Who picks the transfer for a destination store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreAssignment {
    pub store: StoreCode,
    pub assignee_user_id: Uuid,
}
