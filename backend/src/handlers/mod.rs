//! HTTP request handlers

pub mod allocation;
pub mod events;
pub mod fulfillment;
pub mod health;
pub mod transfer;

pub use allocation::{preview_allocation, run_allocation};
pub use events::stream_events;
pub use fulfillment::{
    add_item, cancel, confirm_item, confirm_receipt, finish_picking, scan_code, ship,
    start_picking,
};
pub use health::health_check;
pub use transfer::{get_pick_list, get_transfer, list_transfers};
