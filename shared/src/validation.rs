//! Validation utilities for transfer planning and picking input

use std::collections::BTreeSet;

use crate::models::{Product, StoreAssignment};

// ============================================================================
// Planning Input
// ============================================================================

/// Validate store code format (2-16 uppercase alphanumeric, `_` or `-`)
pub fn validate_store_code(code: &str) -> Result<(), &'static str> {
    if code.len() < 2 {
        return Err("Store code must be at least 2 characters");
    }
    if code.len() > 16 {
        return Err("Store code must be at most 16 characters");
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err("Store code must be uppercase alphanumeric only");
    }
    Ok(())
}

/// Validate the caller-supplied store assignments of an allocation run
pub fn validate_assignments(assignments: &[StoreAssignment]) -> Result<(), &'static str> {
    if assignments.is_empty() {
        return Err("At least one store assignment is required");
    }

    let mut seen = BTreeSet::new();
    for assignment in assignments {
        validate_store_code(assignment.store.as_str())?;
        if assignment.assignee_user_id.is_nil() {
            return Err("Assignee must be a valid user");
        }
        if !seen.insert(assignment.store.as_str()) {
            return Err("Each store can be assigned only once");
        }
    }
    Ok(())
}

/// Validate the product catalog of a snapshot
pub fn validate_catalog(products: &[Product]) -> Result<(), &'static str> {
    if products.is_empty() {
        return Err("Product catalog is empty");
    }

    let mut codes = BTreeSet::new();
    for product in products {
        if product.code.trim().is_empty() {
            return Err("Product code cannot be empty");
        }
        if !codes.insert(product.code.as_str()) {
            return Err("Product codes must be unique");
        }
    }
    Ok(())
}

// ============================================================================
// Picking Input
// ============================================================================

/// Scanned barcode payload; only emptiness is checked
pub fn validate_scan_token(token: &str) -> Result<(), &'static str> {
    if token.trim().is_empty() {
        return Err("Scanned code cannot be empty");
    }
    if token.trim().len() > 64 {
        return Err("Scanned code must be at most 64 characters");
    }
    Ok(())
}

/// Picked quantity entered by the operator
pub fn validate_picked_quantity(quantity: i32) -> Result<(), &'static str> {
    if quantity < 0 {
        return Err("Picked quantity cannot be negative");
    }
    Ok(())
}

/// Quantity of an ad-hoc line item
pub fn validate_added_quantity(quantity: i32) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Added quantity must be positive");
    }
    Ok(())
}

/// Trim a completion note; blank notes count as missing
pub fn normalize_note(note: Option<&str>) -> Option<String> {
    note.map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn assign(store: &str) -> StoreAssignment {
        StoreAssignment {
            store: store.into(),
            assignee_user_id: Uuid::new_v4(),
        }
    }

    // ========================================================================
    // Planning Input Tests
    // ========================================================================

    #[test]
    fn test_validate_store_code() {
        assert!(validate_store_code("BRNO").is_ok());
        assert!(validate_store_code("PRAHA-2").is_ok());
        assert!(validate_store_code("B").is_err());
        assert!(validate_store_code("brno").is_err());
        assert!(validate_store_code("ABCDEFGHIJKLMNOPQ").is_err());
    }

    #[test]
    fn test_validate_assignments_valid() {
        assert!(validate_assignments(&[assign("BRNO"), assign("ZLIN")]).is_ok());
    }

    #[test]
    fn test_validate_assignments_empty() {
        assert!(validate_assignments(&[]).is_err());
    }

    #[test]
    fn test_validate_assignments_duplicate_store() {
        assert!(validate_assignments(&[assign("BRNO"), assign("BRNO")]).is_err());
    }

    #[test]
    fn test_validate_assignments_nil_user() {
        let assignment = StoreAssignment {
            store: "BRNO".into(),
            assignee_user_id: Uuid::nil(),
        };
        assert!(validate_assignments(&[assignment]).is_err());
    }

    #[test]
    fn test_validate_catalog() {
        assert!(validate_catalog(&[]).is_err());
        assert!(validate_catalog(&[Product::new("A1", "Mýdlo")]).is_ok());
        assert!(validate_catalog(&[Product::new("A1", "Mýdlo"), Product::new("A1", "Jiné")]).is_err());
        assert!(validate_catalog(&[Product::new(" ", "Prázdný")]).is_err());
    }

    // ========================================================================
    // Picking Input Tests
    // ========================================================================

    #[test]
    fn test_validate_scan_token() {
        assert!(validate_scan_token("8590001234567").is_ok());
        assert!(validate_scan_token("  ").is_err());
        assert!(validate_scan_token(&"9".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_quantities() {
        assert!(validate_picked_quantity(0).is_ok());
        assert!(validate_picked_quantity(-1).is_err());
        assert!(validate_added_quantity(1).is_ok());
        assert!(validate_added_quantity(0).is_err());
    }

    #[test]
    fn test_normalize_note() {
        assert_eq!(normalize_note(Some("  rozbité  ")), Some("rozbité".to_string()));
        assert_eq!(normalize_note(Some("   ")), None);
        assert_eq!(normalize_note(None), None);
    }
}
