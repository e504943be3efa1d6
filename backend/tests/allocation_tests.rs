// Tests for demand computation and scarcity apportionment

use std::collections::BTreeMap;

use proptest::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use shared::allocation::{allocate, DemandPolicy};
use shared::{DemandInput, StoreCode};

fn requests(entries: &[(&str, i32)]) -> BTreeMap<StoreCode, i32> {
    entries
        .iter()
        .map(|(store, quantity)| (StoreCode::from(*store), *quantity))
        .collect()
}

// ============================================================================
// Unit Tests
// ============================================================================

mod unit_tests {
    use super::*;

    #[test]
    fn test_demand_rounds_deficit_up() {
        let policy = DemandPolicy::default();
        let input = DemandInput {
            average_sales: dec!(4.2),
            current_stock: 1,
        };
        assert_eq!(policy.compute_demand(&"BRNO".into(), &input, Some(5)), Some(4));
    }

    #[test]
    fn test_demand_without_sales_targets_one_unit() {
        let policy = DemandPolicy::default();
        let input = DemandInput {
            average_sales: Decimal::ZERO,
            current_stock: 0,
        };
        assert_eq!(policy.compute_demand(&"BRNO".into(), &input, Some(3)), Some(1));
    }

    #[test]
    fn test_negative_store_stock_counts_as_zero() {
        let policy = DemandPolicy::default();
        let input = DemandInput {
            average_sales: dec!(3),
            current_stock: -7,
        };
        assert_eq!(policy.compute_demand(&"BRNO".into(), &input, Some(1)), Some(3));
    }

    #[test]
    fn test_deficit_at_threshold_is_skipped() {
        let policy = DemandPolicy::default();
        // deficit 3 of target 10 is exactly 30 %
        let input = DemandInput {
            average_sales: dec!(10),
            current_stock: 7,
        };
        assert_eq!(policy.compute_demand(&"BRNO".into(), &input, Some(10)), None);
    }

    #[test]
    fn test_store_without_target_is_ineligible() {
        let policy = DemandPolicy::default();
        let input = DemandInput {
            average_sales: dec!(10),
            current_stock: 0,
        };
        assert_eq!(policy.compute_demand(&"BRNO".into(), &input, None), None);
        assert_eq!(policy.compute_demand(&"BRNO".into(), &input, Some(0)), None);
    }

    #[test]
    fn test_excluded_store_never_asks() {
        let policy = DemandPolicy::default().with_excluded_stores(["OUTLET"]);
        let input = DemandInput {
            average_sales: dec!(10),
            current_stock: 0,
        };
        assert_eq!(policy.compute_demand(&"OUTLET".into(), &input, Some(10)), None);
        assert_eq!(policy.compute_demand(&"BRNO".into(), &input, Some(10)), Some(10));
    }

    #[test]
    fn test_largest_remainder_example() {
        let allocated = allocate(&requests(&[("A", 10), ("B", 7), ("C", 3)]), dec!(14));
        assert_eq!(allocated, requests(&[("A", 7), ("B", 5), ("C", 2)]));
    }

    #[test]
    fn test_ties_go_to_lower_store_code() {
        // each ideal share is 0.5, one unit to distribute
        let allocated = allocate(&requests(&[("ZLIN", 1), ("BRNO", 1)]), dec!(1));
        assert_eq!(allocated, requests(&[("BRNO", 1)]));
    }

    #[test]
    fn test_fractional_supply_is_floored() {
        let allocated = allocate(&requests(&[("A", 5), ("B", 5)]), dec!(3.9));
        assert_eq!(allocated.values().sum::<i32>(), 3);
    }

    #[test]
    fn test_zero_supply_allocates_nothing() {
        assert!(allocate(&requests(&[("A", 5), ("B", 5)]), Decimal::ZERO).is_empty());
        assert!(allocate(&requests(&[("A", 5)]), dec!(-2)).is_empty());
    }

    #[test]
    fn test_enough_supply_returns_requests() {
        let requested = requests(&[("A", 4), ("B", 6)]);
        assert_eq!(allocate(&requested, dec!(10)), requested);
        assert_eq!(allocate(&requested, dec!(250.5)), requested);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn store_strategy() -> impl Strategy<Value = String> {
        "[A-Z]{2,6}"
    }

    fn requests_strategy() -> impl Strategy<Value = BTreeMap<StoreCode, i32>> {
        prop::collection::btree_map(store_strategy().prop_map(StoreCode::from), 1i32..200, 1..12)
    }

    fn supply_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..300_000).prop_map(|cents| Decimal::new(cents, 2))
    }

    fn sales_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..50_000).prop_map(|hundredths| Decimal::new(hundredths, 2))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Allocation never exceeds what a store asked for
        #[test]
        fn prop_allocation_capped_by_request(
            requested in requests_strategy(),
            supply in supply_strategy(),
        ) {
            let allocated = allocate(&requested, supply);
            for (store, quantity) in &allocated {
                prop_assert!(*quantity > 0);
                prop_assert!(*quantity <= requested[store]);
            }
        }

        /// Under scarcity the whole integer part of the supply is handed out
        #[test]
        fn prop_scarcity_distributes_floor_of_supply(
            requested in requests_strategy(),
            supply in supply_strategy(),
        ) {
            let total: i64 = requested.values().map(|q| i64::from(*q)).sum();
            let allocated = allocate(&requested, supply);
            let handed_out: i64 = allocated.values().map(|q| i64::from(*q)).sum();

            if supply >= Decimal::from(total) {
                prop_assert_eq!(&allocated, &requested);
            } else {
                let floor = supply.floor().to_i64().unwrap_or(0);
                prop_assert_eq!(handed_out, floor);
            }
        }

        /// The same inputs always produce the same allocation
        #[test]
        fn prop_allocation_deterministic(
            requested in requests_strategy(),
            supply in supply_strategy(),
        ) {
            prop_assert_eq!(allocate(&requested, supply), allocate(&requested, supply));
        }

        /// A store asks only when the deficit exceeds 30 % of its effective
        /// target, and then for the rounded-up deficit
        #[test]
        fn prop_demand_follows_threshold(
            average_sales in sales_strategy(),
            current_stock in -20i32..500,
        ) {
            let policy = DemandPolicy::default();
            let input = DemandInput { average_sales, current_stock };
            let effective = if average_sales > Decimal::ZERO { average_sales } else { Decimal::ONE };
            let deficit = effective - Decimal::from(current_stock.max(0));

            match policy.compute_demand(&"BRNO".into(), &input, Some(1)) {
                Some(quantity) => {
                    prop_assert!(deficit > effective * dec!(0.3));
                    prop_assert_eq!(Decimal::from(quantity), deficit.ceil());
                }
                None => prop_assert!(deficit <= effective * dec!(0.3)),
            }
        }
    }
}
