//! Per-store replenishment demand

use std::collections::BTreeSet;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::DemandInput;
use crate::types::StoreCode;

/// 30 %: deficits at or below this share of the target are not transferred
pub const DEFAULT_DEFICIT_THRESHOLD: Decimal = Decimal::from_parts(30, 0, 0, false, 2);

/// Rules deciding whether and how much a store asks for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandPolicy {
    pub deficit_threshold: Decimal,
    /// Stores that never receive transfers
    #[serde(default)]
    pub excluded_stores: BTreeSet<StoreCode>,
}

impl Default for DemandPolicy {
    fn default() -> Self {
        Self {
            deficit_threshold: DEFAULT_DEFICIT_THRESHOLD,
            excluded_stores: BTreeSet::new(),
        }
    }
}

impl DemandPolicy {
    pub fn with_excluded_stores<I, S>(mut self, stores: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StoreCode>,
    {
        self.excluded_stores
            .extend(stores.into_iter().map(Into::into));
        self
    }

    /// Store filter applied before any arithmetic: not excluded and a
    /// positive target configured for the product
    pub fn is_eligible(&self, store: &StoreCode, target: Option<i32>) -> bool {
        !self.excluded_stores.contains(store) && target.is_some_and(|t| t > 0)
    }

    /// Deficit filter: only shortfalls above the threshold are worth a transfer
    pub fn is_worth_transfer(&self, deficit: Decimal, effective_target: Decimal) -> bool {
        deficit > effective_target * self.deficit_threshold
    }

    /// Requested quantity for one product at one store, `None` when the
    /// store asks for nothing
    pub fn compute_demand(
        &self,
        store: &StoreCode,
        input: &DemandInput,
        target: Option<i32>,
    ) -> Option<i32> {
        if !self.is_eligible(store, target) {
            return None;
        }

        let effective = effective_target(input.average_sales);
        let deficit = deficit(effective, input.current_stock);
        if !self.is_worth_transfer(deficit, effective) {
            return None;
        }

        deficit.ceil().to_i32().filter(|quantity| *quantity > 0)
    }
}

/// Sales velocity, or one unit for items without observed sales
pub fn effective_target(average_sales: Decimal) -> Decimal {
    if average_sales > Decimal::ZERO {
        average_sales
    } else {
        Decimal::ONE
    }
}

/// Shortfall against the effective target; negative store stock counts as zero
pub fn deficit(effective_target: Decimal, current_stock: i32) -> Decimal {
    effective_target - Decimal::from(current_stock.max(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn input(average_sales: Decimal, current_stock: i32) -> DemandInput {
        DemandInput {
            average_sales,
            current_stock,
        }
    }

    fn brno() -> StoreCode {
        StoreCode::from("BRNO")
    }

    #[test]
    fn test_small_deficit_is_ignored() {
        // T=10, stock 8 -> deficit 2 <= 3
        let policy = DemandPolicy::default();
        assert_eq!(policy.compute_demand(&brno(), &input(dec!(10), 8), Some(5)), None);
    }

    #[test]
    fn test_deficit_exactly_at_threshold_is_ignored() {
        let policy = DemandPolicy::default();
        assert_eq!(policy.compute_demand(&brno(), &input(dec!(10), 7), Some(5)), None);
    }

    #[test]
    fn test_large_deficit_is_requested() {
        // T=10, stock 6 -> deficit 4 > 3
        let policy = DemandPolicy::default();
        assert_eq!(
            policy.compute_demand(&brno(), &input(dec!(10), 6), Some(5)),
            Some(4)
        );
    }

    #[test]
    fn test_fractional_deficit_rounds_up() {
        let policy = DemandPolicy::default();
        assert_eq!(
            policy.compute_demand(&brno(), &input(dec!(4.5), 1), Some(5)),
            Some(4)
        );
    }

    #[test]
    fn test_no_sales_still_requests_one_unit() {
        let policy = DemandPolicy::default();
        assert_eq!(
            policy.compute_demand(&brno(), &input(Decimal::ZERO, 0), Some(1)),
            Some(1)
        );
    }

    #[test]
    fn test_negative_stock_is_floored() {
        let policy = DemandPolicy::default();
        assert_eq!(
            policy.compute_demand(&brno(), &input(dec!(3), -12), Some(2)),
            Some(3)
        );
    }

    #[test]
    fn test_missing_or_zero_target_skips_store() {
        let policy = DemandPolicy::default();
        assert_eq!(policy.compute_demand(&brno(), &input(dec!(10), 0), None), None);
        assert_eq!(policy.compute_demand(&brno(), &input(dec!(10), 0), Some(0)), None);
        assert_eq!(policy.compute_demand(&brno(), &input(dec!(10), 0), Some(-2)), None);
    }

    #[test]
    fn test_excluded_store_is_skipped() {
        let policy = DemandPolicy::default().with_excluded_stores(["BRNO"]);
        assert_eq!(policy.compute_demand(&brno(), &input(dec!(10), 0), Some(5)), None);
        assert_eq!(
            policy.compute_demand(&"PRAHA".into(), &input(dec!(10), 0), Some(5)),
            Some(10)
        );
    }

    #[test]
    fn test_overstocked_store_asks_nothing() {
        let policy = DemandPolicy::default();
        assert_eq!(policy.compute_demand(&brno(), &input(dec!(2), 9), Some(5)), None);
    }
}
