//! Replenishment planning: per-store demand, central supply and
//! largest-remainder apportionment of scarce stock.
//!
//! Everything here is a pure function of an [`InventorySnapshot`]; a run
//! either produces a complete [`AllocationPlan`] or fails as a whole.
//!
//! [`InventorySnapshot`]: crate::models::InventorySnapshot

mod apportion;
mod demand;
mod plan;
mod supply;

pub use apportion::allocate;
pub use demand::{deficit, effective_target, DemandPolicy, DEFAULT_DEFICIT_THRESHOLD};
pub use plan::{
    AllocationPlan, AllocationPlanner, AllocatedLine, ExclusionReason, ProductAllocation,
    ProductExclusion,
};
pub use supply::{available_for_distribution, is_distributable};

use thiserror::Error;

use crate::types::StoreCode;

/// Input problems that reject an allocation run before any computation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanningError {
    #[error("product catalog is empty")]
    EmptyCatalog,

    #[error("no store assignments were supplied")]
    NoAssignments,

    #[error("store {0} is assigned more than once")]
    DuplicateAssignment(StoreCode),
}
