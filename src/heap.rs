//! Slotted-page heap storage: pages of fixed-width records and the
//! per-table files that hold them.

mod error;
mod file;
mod page;
mod tuple;

pub use error::{HeapError, HeapFileError};
pub use file::{DbFile, HeapFile};
pub use page::{HeapPage, PageId, RecordId, SlotId, TableId, Tuples, PAGE_SIZE};
pub use tuple::Tuple;
