//! Whole-run planning across the catalog

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{allocate, available_for_distribution, is_distributable, DemandPolicy, PlanningError};
use crate::models::{InventorySnapshot, Product};
use crate::types::StoreCode;

/// Allocation outcome for one product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductAllocation {
    pub product_code: String,
    pub product_name: String,
    /// Central bin, copied onto line items
    pub position: Option<String>,
    pub available: Decimal,
    pub requested: BTreeMap<StoreCode, i32>,
    pub allocated: BTreeMap<StoreCode, i32>,
}

impl ProductAllocation {
    pub fn total_requested(&self) -> i64 {
        self.requested.values().map(|q| i64::from(*q)).sum()
    }

    pub fn total_allocated(&self) -> i64 {
        self.allocated.values().map(|q| i64::from(*q)).sum()
    }

    pub fn is_scarce(&self) -> bool {
        self.available < Decimal::from(self.total_requested())
    }
}

/// Why a product produced no allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ExclusionReason {
    /// No eligible store has a deficit above the threshold
    NoDemand,
    /// Central stock net of reserve is zero or negative
    NoCentralSupply { available: Decimal },
    /// Supply was positive but below one whole unit per store
    NothingAllocated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductExclusion {
    pub product_code: String,
    #[serde(flatten)]
    pub reason: ExclusionReason,
}

/// One allocated product as seen from a destination store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatedLine {
    pub product_code: String,
    pub product_name: String,
    pub position: Option<String>,
    pub quantity: i32,
}

/// Result of one allocation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub products: Vec<ProductAllocation>,
    pub exclusions: Vec<ProductExclusion>,
}

impl AllocationPlan {
    /// Regroup allocations by destination store, stores in code order
    pub fn by_store(&self) -> BTreeMap<StoreCode, Vec<AllocatedLine>> {
        let mut grouped: BTreeMap<StoreCode, Vec<AllocatedLine>> = BTreeMap::new();
        for product in &self.products {
            for (store, quantity) in &product.allocated {
                if *quantity <= 0 {
                    continue;
                }
                grouped.entry(store.clone()).or_default().push(AllocatedLine {
                    product_code: product.product_code.clone(),
                    product_name: product.product_name.clone(),
                    position: product.position.clone(),
                    quantity: *quantity,
                });
            }
        }
        grouped
    }

    pub fn total_allocated(&self) -> i64 {
        self.products.iter().map(ProductAllocation::total_allocated).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

enum ProductPlan {
    Allocated(ProductAllocation),
    Excluded(ExclusionReason),
}

/// Runs demand, supply and apportionment over a snapshot
#[derive(Debug, Clone, Default)]
pub struct AllocationPlanner {
    policy: DemandPolicy,
}

impl AllocationPlanner {
    pub fn new(policy: DemandPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &DemandPolicy {
        &self.policy
    }

    /// Plan every product in the snapshot. Products come out in code order.
    pub fn plan(&self, snapshot: &InventorySnapshot) -> Result<AllocationPlan, PlanningError> {
        if snapshot.is_empty() {
            return Err(PlanningError::EmptyCatalog);
        }

        let mut products: Vec<&Product> = snapshot.products.iter().collect();
        products.sort_by(|a, b| a.code.cmp(&b.code));

        let mut plan = AllocationPlan::default();
        for product in products {
            match self.plan_product(product, snapshot) {
                ProductPlan::Allocated(allocation) => plan.products.push(allocation),
                ProductPlan::Excluded(reason) => plan.exclusions.push(ProductExclusion {
                    product_code: product.code.clone(),
                    reason,
                }),
            }
        }

        Ok(plan)
    }

    /// Requested quantity per eligible store for one product
    pub fn requested_for(
        &self,
        product: &Product,
        snapshot: &InventorySnapshot,
    ) -> BTreeMap<StoreCode, i32> {
        product
            .target_stock
            .iter()
            .filter(|(store, target)| self.policy.is_eligible(store, Some(**target)))
            .filter_map(|(store, target)| {
                let input = snapshot.demand_input(&product.code, store);
                self.policy
                    .compute_demand(store, &input, Some(*target))
                    .map(|quantity| (store.clone(), quantity))
            })
            .collect()
    }

    fn plan_product(&self, product: &Product, snapshot: &InventorySnapshot) -> ProductPlan {
        let central = snapshot.central_for(&product.code);
        let available = available_for_distribution(&central);
        if !is_distributable(available) {
            return ProductPlan::Excluded(ExclusionReason::NoCentralSupply { available });
        }

        let requested = self.requested_for(product, snapshot);
        if requested.is_empty() {
            return ProductPlan::Excluded(ExclusionReason::NoDemand);
        }

        let allocated = allocate(&requested, available);
        if allocated.is_empty() {
            return ProductPlan::Excluded(ExclusionReason::NothingAllocated);
        }

        ProductPlan::Allocated(ProductAllocation {
            product_code: product.code.clone(),
            product_name: product.name.clone(),
            position: central.position,
            available,
            requested,
            allocated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CentralSalesRecord, CentralStockRecord, StoreSalesRecord, StoreStockRecord};
    use rust_decimal_macros::dec;

    fn sales(code: &str, store: &str, average: Decimal) -> StoreSalesRecord {
        StoreSalesRecord {
            code: code.into(),
            store: store.into(),
            average_sales: average,
        }
    }

    fn stock(code: &str, store: &str, quantity: i32) -> StoreStockRecord {
        StoreStockRecord {
            code: code.into(),
            store: store.into(),
            quantity,
        }
    }

    fn central(code: &str, quantity: i32) -> CentralStockRecord {
        CentralStockRecord {
            code: code.into(),
            quantity,
            position: Some(format!("R-{code}")),
        }
    }

    fn snapshot() -> InventorySnapshot {
        let products = vec![
            Product::new("B2", "Šampon")
                .with_target("BRNO", 10)
                .with_target("PRAHA", 10),
            Product::new("A1", "Mýdlo")
                .with_target("BRNO", 10)
                .with_target("PRAHA", 10)
                .with_target("ZLIN", 10),
            Product::new("C3", "Krém").with_target("BRNO", 4),
        ];

        InventorySnapshot::from_records(
            products,
            vec![
                sales("A1", "BRNO", dec!(10)),
                sales("A1", "PRAHA", dec!(7)),
                sales("A1", "ZLIN", dec!(3)),
                sales("B2", "BRNO", dec!(5)),
                sales("B2", "PRAHA", dec!(5)),
                sales("C3", "BRNO", dec!(2)),
            ],
            vec![CentralSalesRecord {
                code: "A1".into(),
                average_sales: dec!(2),
            }],
            vec![stock("B2", "BRNO", 5), stock("B2", "PRAHA", 1)],
            vec![central("A1", 15), central("B2", 100)],
        )
    }

    #[test]
    fn test_plan_allocates_scarce_product() {
        let plan = AllocationPlanner::default().plan(&snapshot()).unwrap();

        let a1 = plan
            .products
            .iter()
            .find(|p| p.product_code == "A1")
            .unwrap();
        // 15 - 2/2 = 14 available for demand 10 + 7 + 3
        assert_eq!(a1.available, dec!(14));
        assert!(a1.is_scarce());
        assert_eq!(a1.total_allocated(), 14);
        assert_eq!(a1.allocated.get("PRAHA"), Some(&5));
        assert_eq!(a1.position.as_deref(), Some("R-A1"));
    }

    #[test]
    fn test_plan_records_exclusions() {
        let plan = AllocationPlanner::default().plan(&snapshot()).unwrap();

        let c3 = plan
            .exclusions
            .iter()
            .find(|e| e.product_code == "C3")
            .unwrap();
        assert!(matches!(c3.reason, ExclusionReason::NoCentralSupply { .. }));
    }

    #[test]
    fn test_plan_full_supply_skips_small_deficits() {
        let plan = AllocationPlanner::default().plan(&snapshot()).unwrap();

        let b2 = plan
            .products
            .iter()
            .find(|p| p.product_code == "B2")
            .unwrap();
        // BRNO is at target, PRAHA is 4 short of 5
        assert_eq!(b2.allocated.len(), 1);
        assert_eq!(b2.allocated.get("PRAHA"), Some(&4));
    }

    #[test]
    fn test_plan_products_in_code_order() {
        let plan = AllocationPlanner::default().plan(&snapshot()).unwrap();
        let codes: Vec<&str> = plan.products.iter().map(|p| p.product_code.as_str()).collect();
        assert_eq!(codes, vec!["A1", "B2"]);
    }

    #[test]
    fn test_by_store_groups_lines() {
        let plan = AllocationPlanner::default().plan(&snapshot()).unwrap();
        let grouped = plan.by_store();

        let praha = grouped.get("PRAHA").unwrap();
        assert_eq!(praha.len(), 2);
        assert_eq!(grouped.get("ZLIN").map(Vec::len), Some(1));
    }

    #[test]
    fn test_excluded_store_gets_nothing() {
        let planner = AllocationPlanner::new(DemandPolicy::default().with_excluded_stores(["PRAHA"]));
        let plan = planner.plan(&snapshot()).unwrap();
        assert!(!plan.by_store().contains_key("PRAHA"));
    }

    #[test]
    fn test_empty_catalog_is_rejected() {
        let result = AllocationPlanner::default().plan(&InventorySnapshot::default());
        assert_eq!(result.unwrap_err(), PlanningError::EmptyCatalog);
    }
}
