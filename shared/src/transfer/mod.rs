//! Transfer documents: numbering, creation from a plan, fulfillment and printing

pub mod collation;
pub mod factory;
pub mod fulfillment;
pub mod numbering;
pub mod pick_list;

pub use collation::compare_positions;
pub use factory::{
    index_assignments, DocumentDraft, FactoryOutput, FactorySettings, LineDraft,
    TransferDocumentFactory,
};
pub use fulfillment::{
    AdHocItem, FulfillmentAction, FulfillmentError, ItemAddition, ScanOutcome, Transition,
};
pub use numbering::{DocumentNumber, NumberSequence, NumberingError, DOCUMENT_PREFIX};
pub use pick_list::{PickList, PickListRow};
