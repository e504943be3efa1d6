//! Business logic services for transfer planning and fulfillment

pub mod allocation;
pub mod creation;
pub mod events;
pub mod fulfillment;
pub mod snapshot;
pub mod transfer;

pub use allocation::AllocationService;
pub use creation::{create_documents, DocumentWriter, PgDocumentWriter};
pub use events::{TransferEvent, TransferEventKind, TransferEvents};
pub use fulfillment::{DocumentStore, FulfillmentService, PgDocumentStore};
pub use snapshot::SnapshotService;
pub use transfer::TransferService;
