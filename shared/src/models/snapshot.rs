//! Read-only input snapshot for one allocation run

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CentralStockInfo, DemandInput, Product};
use crate::types::StoreCode;

/// Sales velocity of a product at a store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSalesRecord {
    pub code: String,
    pub store: StoreCode,
    pub average_sales: Decimal,
}

/// Sales velocity of a product at the central warehouse
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentralSalesRecord {
    pub code: String,
    pub average_sales: Decimal,
}

/// Stock of a product at a store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStockRecord {
    pub code: String,
    pub store: StoreCode,
    pub quantity: i32,
}

/// Stock of a product at the central warehouse
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentralStockRecord {
    pub code: String,
    pub quantity: i32,
    pub position: Option<String>,
}

/// Everything an allocation run reads, keyed for constant-time lookups
#[derive(Debug, Clone, Default)]
pub struct InventorySnapshot {
    pub products: Vec<Product>,
    store_sales: HashMap<(String, StoreCode), Decimal>,
    store_stock: HashMap<(String, StoreCode), i32>,
    central: HashMap<String, CentralStockInfo>,
}

impl InventorySnapshot {
    /// Assemble a snapshot from the collaborator record sets
    pub fn from_records(
        products: Vec<Product>,
        store_sales: Vec<StoreSalesRecord>,
        central_sales: Vec<CentralSalesRecord>,
        store_stock: Vec<StoreStockRecord>,
        central_stock: Vec<CentralStockRecord>,
    ) -> Self {
        let mut snapshot = Self {
            products,
            ..Self::default()
        };

        for record in store_sales {
            snapshot
                .store_sales
                .insert((record.code, record.store), record.average_sales);
        }
        for record in store_stock {
            snapshot
                .store_stock
                .insert((record.code, record.store), record.quantity);
        }
        for record in central_stock {
            let entry = snapshot.central.entry(record.code).or_default();
            entry.quantity = record.quantity;
            entry.position = record.position;
        }
        for record in central_sales {
            snapshot
                .central
                .entry(record.code)
                .or_default()
                .average_sales = record.average_sales;
        }

        snapshot
    }

    /// Demand input for a product at a store; missing data reads as zero
    pub fn demand_input(&self, code: &str, store: &StoreCode) -> DemandInput {
        let key = (code.to_string(), store.clone());
        DemandInput {
            average_sales: self.store_sales.get(&key).copied().unwrap_or_default(),
            current_stock: self.store_stock.get(&key).copied().unwrap_or_default(),
        }
    }

    /// Central stock for a product; a product never stocked centrally has zero
    pub fn central_for(&self, code: &str) -> CentralStockInfo {
        self.central.get(code).cloned().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
