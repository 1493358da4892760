//! Post-conversion routing: recycle on success, quarantine on failure.

pub mod error_area;
pub mod recycle;
pub mod router;
pub mod undo;

pub use error_area::ErrorArea;
pub use recycle::{
    HardDelete, RecyclePolicy, Recycler, RefusingRecycler, SystemTrash,
    TrashOrDelete, UnknownRecyclePolicy,
};
pub use router::OutcomeRouter;
pub use undo::{UndoEntry, UndoLog};
