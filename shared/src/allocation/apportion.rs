//! Largest-remainder (Hamilton) apportionment of scarce central stock

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::types::StoreCode;

struct Share<'a> {
    store: &'a StoreCode,
    requested: i32,
    allocated: i32,
    /// Ideal real-valued share minus its floor
    loss: Decimal,
}

/// Distribute `available` units across the requesting stores.
///
/// Guarantees `sum(result) <= floor(available)` and `result[s] <= requested[s]`.
/// Under scarcity the sum equals `floor(available)` exactly. Stores left with
/// zero units are absent from the result.
///
/// Equal fractional losses are broken by store code, ascending.
pub fn allocate(requested: &BTreeMap<StoreCode, i32>, available: Decimal) -> BTreeMap<StoreCode, i32> {
    let demand: Vec<(&StoreCode, i32)> = requested
        .iter()
        .filter(|(_, quantity)| **quantity > 0)
        .map(|(store, quantity)| (store, *quantity))
        .collect();

    let total_demand: i64 = demand.iter().map(|(_, q)| i64::from(*q)).sum();
    if total_demand == 0 || available <= Decimal::ZERO {
        return BTreeMap::new();
    }

    let total = Decimal::from(total_demand);
    if available >= total {
        return demand
            .into_iter()
            .map(|(store, quantity)| (store.clone(), quantity))
            .collect();
    }

    let mut shares: Vec<Share<'_>> = demand
        .into_iter()
        .map(|(store, quantity)| {
            // multiply before dividing to keep the ideal share exact
            let ideal = Decimal::from(quantity) * available / total;
            let floor = ideal.floor();
            Share {
                store,
                requested: quantity,
                allocated: floor.to_i32().unwrap_or(0),
                loss: ideal - floor,
            }
        })
        .collect();

    let provisional: i64 = shares.iter().map(|s| i64::from(s.allocated)).sum();
    let mut remaining = available.floor().to_i64().unwrap_or(0) - provisional;

    shares.sort_by(|a, b| b.loss.cmp(&a.loss).then_with(|| a.store.cmp(b.store)));
    for share in shares.iter_mut() {
        if remaining <= 0 {
            break;
        }
        if share.allocated < share.requested {
            share.allocated += 1;
            remaining -= 1;
        }
    }

    shares
        .into_iter()
        .filter(|share| share.allocated > 0)
        .map(|share| (share.store.clone(), share.allocated))
        .collect()
}
