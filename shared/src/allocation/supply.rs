//! Central-warehouse supply net of its own reserve

use rust_decimal::Decimal;

use crate::models::CentralStockInfo;

/// Quantity the central warehouse may hand out: raw stock minus half of its
/// own sales velocity. May be zero or negative.
pub fn available_for_distribution(central: &CentralStockInfo) -> Decimal {
    Decimal::from(central.quantity) - central.reserved_demand()
}

/// Products with nothing left after the reserve sit out the whole run
pub fn is_distributable(available: Decimal) -> bool {
    available > Decimal::ZERO
}
