//! Domain models for inter-store transfers

mod product;
mod snapshot;
mod task;
mod transfer;

pub use product::*;
pub use snapshot::*;
pub use task::*;
pub use transfer::*;
