//! WebAssembly module for the store transfer platform
//!
//! Provides client-side computation for:
//! - Replenishment demand previews
//! - Scarce-stock apportionment
//! - Document number formatting
//! - Pick list position ordering and offline validation

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use wasm_bindgen::prelude::*;

use shared::allocation::{allocate, AllocationPlanner, DemandPolicy};
use shared::transfer::{compare_positions, DocumentNumber, NumberSequence};

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::log_1(&JsValue::from_str("transfer-wasm loaded"));
}

/// Everything the browser holds for an offline allocation preview
#[derive(Debug, Deserialize)]
struct PreviewInput {
    products: Vec<Product>,
    #[serde(default)]
    store_sales: Vec<StoreSalesRecord>,
    #[serde(default)]
    central_sales: Vec<CentralSalesRecord>,
    #[serde(default)]
    store_stock: Vec<StoreStockRecord>,
    #[serde(default)]
    central_stock: Vec<CentralStockRecord>,
    #[serde(default)]
    policy: DemandPolicy,
}

fn preview_plan(input_json: &str) -> Result<String, String> {
    let input: PreviewInput =
        serde_json::from_str(input_json).map_err(|e| format!("Invalid preview JSON: {}", e))?;

    let snapshot = InventorySnapshot::from_records(
        input.products,
        input.store_sales,
        input.central_sales,
        input.store_stock,
        input.central_stock,
    );
    let plan = AllocationPlanner::new(input.policy)
        .plan(&snapshot)
        .map_err(|e| e.to_string())?;

    serde_json::to_string(&plan).map_err(|e| e.to_string())
}

fn apportion(requests_json: &str, available: &str) -> Result<String, String> {
    let requested: BTreeMap<StoreCode, i32> = serde_json::from_str(requests_json)
        .map_err(|e| format!("Invalid requests JSON: {}", e))?;
    let available: Decimal = available
        .trim()
        .parse()
        .map_err(|_| format!("Invalid quantity: {}", available))?;

    serde_json::to_string(&allocate(&requested, available)).map_err(|e| e.to_string())
}

fn next_number(year: i32, existing_json: &str) -> Result<String, String> {
    let existing: Vec<String> = serde_json::from_str(existing_json)
        .map_err(|e| format!("Invalid document list JSON: {}", e))?;
    let sequence = NumberSequence::continue_from(year, existing.iter().map(String::as_str));
    Ok(sequence.peek().to_string())
}

/// Full allocation plan for a JSON snapshot, as JSON
#[wasm_bindgen]
pub fn preview_allocation(input_json: &str) -> Result<String, JsValue> {
    preview_plan(input_json).map_err(|e| JsValue::from_str(&e))
}

/// Split a decimal supply across `{store: requested}`
#[wasm_bindgen]
pub fn allocate_units(requests_json: &str, available: &str) -> Result<String, JsValue> {
    apportion(requests_json, available).map_err(|e| JsValue::from_str(&e))
}

/// Units a store would request; 0 when it asks for nothing
#[wasm_bindgen]
pub fn compute_store_demand(average_sales: f64, current_stock: i32, target_stock: i32) -> i32 {
    let input = DemandInput {
        average_sales: Decimal::try_from(average_sales).unwrap_or(Decimal::ZERO),
        current_stock,
    };
    DemandPolicy::default()
        .compute_demand(&StoreCode::from("PREVIEW"), &input, Some(target_stock))
        .unwrap_or(0)
}

/// Central quantity left for stores after the warehouse reserve
#[wasm_bindgen]
pub fn central_available(quantity: i32, central_average_sales: f64) -> f64 {
    let central = CentralStockInfo {
        quantity,
        position: None,
        average_sales: Decimal::try_from(central_average_sales).unwrap_or(Decimal::ZERO),
    };
    shared::allocation::available_for_distribution(&central)
        .to_f64()
        .unwrap_or(0.0)
}

#[wasm_bindgen]
pub fn format_document_number(year: i32, sequence: u32) -> String {
    DocumentNumber::new(year, sequence).to_string()
}

/// Number the next document of `year` would get, given existing numbers
#[wasm_bindgen]
pub fn next_document_number(year: i32, existing_json: &str) -> Result<String, JsValue> {
    next_number(year, existing_json).map_err(|e| JsValue::from_str(&e))
}

/// -1, 0 or 1; empty positions sort last
#[wasm_bindgen]
pub fn compare_bin_positions(a: &str, b: &str) -> i32 {
    let a = Some(a.trim()).filter(|p| !p.is_empty());
    let b = Some(b.trim()).filter(|p| !p.is_empty());
    compare_positions(a, b) as i32
}

#[wasm_bindgen]
pub fn is_valid_store_code(code: &str) -> bool {
    validate_store_code(code).is_ok()
}

/// Whether finishing now needs a completion note
#[wasm_bindgen]
pub fn completion_note_required(unconfirmed_items: u32, note: &str) -> bool {
    unconfirmed_items > 0 && normalize_note(Some(note)).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_store_demand() {
        assert_eq!(compute_store_demand(4.2, 1, 5), 4);
        assert_eq!(compute_store_demand(10.0, 7, 10), 0);
        assert_eq!(compute_store_demand(0.0, 0, 3), 1);
        assert_eq!(compute_store_demand(10.0, 0, 0), 0);
    }

    #[test]
    fn test_central_available() {
        assert!((central_available(10, 4.0) - 8.0).abs() < 0.001);
        assert!(central_available(1, 6.0) < 0.0);
    }

    #[test]
    fn test_apportion() {
        let json = apportion(r#"{"A":10,"B":7,"C":3}"#, "14").unwrap();
        let result: BTreeMap<String, i32> = serde_json::from_str(&json).unwrap();
        assert_eq!(result["A"], 7);
        assert_eq!(result["B"], 5);
        assert_eq!(result["C"], 2);

        assert!(apportion(r#"{"A":1}"#, "lots").is_err());
    }

    #[test]
    fn test_preview_plan() {
        let input = r#"{
            "products": [{"code": "KAVA01", "name": "Káva", "target_stock": {"BRNO": 10}}],
            "store_sales": [{"code": "KAVA01", "store": "BRNO", "average_sales": "10"}],
            "central_stock": [{"code": "KAVA01", "quantity": 4, "position": "B-1"}]
        }"#;
        let plan: serde_json::Value = serde_json::from_str(&preview_plan(input).unwrap()).unwrap();
        assert_eq!(plan["products"][0]["allocated"]["BRNO"], 4);

        assert!(preview_plan(r#"{"products": []}"#).is_err());
    }

    #[test]
    fn test_document_numbers() {
        assert_eq!(format_document_number(2026, 5), "PV-2026-005");
        assert_eq!(
            next_number(2026, r#"["PV-2026-009", "PV-2025-400"]"#).unwrap(),
            "PV-2026-010"
        );
        assert!(next_number(2026, "not json").is_err());
    }

    #[test]
    fn test_compare_bin_positions() {
        assert_eq!(compare_bin_positions("A-2", "A-10"), -1);
        assert_eq!(compare_bin_positions("A-10", "A-2"), 1);
        assert_eq!(compare_bin_positions("", "A-1"), 1);
    }

    #[test]
    fn test_completion_note_required() {
        assert!(completion_note_required(2, "  "));
        assert!(!completion_note_required(2, "Chybí zboží"));
        assert!(!completion_note_required(0, ""));
    }
}
