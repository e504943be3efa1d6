//! Shared types and domain logic for inter-store transfers
//!
//! This crate contains the allocation engine, the transfer document
//! lifecycle and the types shared between the backend and the browser
//! (via WASM). Nothing here performs I/O.

pub mod allocation;
pub mod models;
pub mod transfer;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
