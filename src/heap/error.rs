//! Error types for the heap module.

use std::fmt;

use crate::datum::{SerializationError, Type};
use crate::schema::Schema;
use crate::tx::TxError;

use super::page::{PageId, RecordId, TableId};

/// Errors from heap page operations.
#[derive(Debug)]
pub enum HeapError {
    /// Every slot on the page is occupied.
    PageFull(PageId),
    /// The addressed slot holds no record.
    SlotEmpty(RecordId),
    /// The addressed slot already holds a record.
    SlotOccupied(RecordId),
    /// Slot index beyond the page's slot count.
    SlotOutOfRange {
        /// Requested slot index.
        slot: usize,
        /// Slots on the page.
        count: usize,
    },
    /// The record's schema differs from the page's schema.
    SchemaMismatch {
        /// Schema the page was created with.
        expected: Schema,
        /// Schema carried by the record.
        actual: Schema,
    },
    /// The record's identifier points at a different page.
    ForeignRecord {
        /// Identifier carried by the record.
        rid: RecordId,
        /// Page the operation ran against.
        page_id: PageId,
    },
    /// The record carries no identifier.
    MissingRecordId,
    /// Field index beyond the record's field count.
    FieldOutOfRange {
        /// Requested field index.
        index: usize,
        /// Fields in the record.
        count: usize,
    },
    /// Value count differs from the schema's field count.
    FieldCountMismatch {
        /// Fields in the schema.
        expected: usize,
        /// Values supplied.
        actual: usize,
    },
    /// Value does not fit the declared field type.
    FieldTypeMismatch {
        /// Index of the offending field.
        index: usize,
        /// Type declared for the field.
        expected: Type,
    },
    /// Serialization error.
    Serialization(SerializationError),
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapError::PageFull(page_id) => {
                write!(f, "no empty slots on {}", page_id)
            }
            HeapError::SlotEmpty(rid) => {
                write!(f, "no record at {}", rid)
            }
            HeapError::SlotOccupied(rid) => {
                write!(f, "{} is already occupied", rid)
            }
            HeapError::SlotOutOfRange { slot, count } => {
                write!(f, "slot {} out of range for a page of {} slots", slot, count)
            }
            HeapError::SchemaMismatch { expected, actual } => {
                write!(
                    f,
                    "schema mismatch: page stores {}, record carries {}",
                    expected, actual
                )
            }
            HeapError::ForeignRecord { rid, page_id } => {
                write!(f, "record at {} does not belong to {}", rid, page_id)
            }
            HeapError::MissingRecordId => {
                write!(f, "record carries no identifier")
            }
            HeapError::FieldOutOfRange { index, count } => {
                write!(f, "field {} out of range for a record of {} fields", index, count)
            }
            HeapError::FieldCountMismatch { expected, actual } => {
                write!(
                    f,
                    "field count mismatch: schema has {} fields, got {} values",
                    expected, actual
                )
            }
            HeapError::FieldTypeMismatch { index, expected } => {
                write!(f, "field {} does not fit declared type {}", index, expected)
            }
            HeapError::Serialization(err) => {
                write!(f, "serialization error: {}", err)
            }
        }
    }
}

impl std::error::Error for HeapError {}

impl From<SerializationError> for HeapError {
    fn from(err: SerializationError) -> Self {
        HeapError::Serialization(err)
    }
}

/// Errors from heap file operations.
#[derive(Debug)]
pub enum HeapFileError {
    /// A page-level operation failed.
    Heap(HeapError),
    /// A lock could not be acquired.
    Tx(TxError),
    /// The underlying file operation failed.
    Io(std::io::Error),
    /// The page number is beyond the end of the file.
    PageNotFound(PageId),
    /// The record's identifier is beyond the end of the file.
    NotInFile(RecordId),
    /// The page or record belongs to a different table.
    WrongTable {
        /// Table this file stores.
        expected: TableId,
        /// Table the argument named.
        actual: TableId,
    },
    /// The file content is inconsistent with the page format.
    Corrupted(String),
}

impl fmt::Display for HeapFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapFileError::Heap(err) => write!(f, "{}", err),
            HeapFileError::Tx(err) => write!(f, "{}", err),
            HeapFileError::Io(err) => write!(f, "i/o error: {}", err),
            HeapFileError::PageNotFound(page_id) => {
                write!(f, "{} is beyond the end of the file", page_id)
            }
            HeapFileError::NotInFile(rid) => {
                write!(f, "{} is beyond the end of the file", rid)
            }
            HeapFileError::WrongTable { expected, actual } => {
                write!(
                    f,
                    "wrong table: this file stores table {}, got table {}",
                    expected, actual
                )
            }
            HeapFileError::Corrupted(message) => {
                write!(f, "corrupted heap file: {}", message)
            }
        }
    }
}

impl std::error::Error for HeapFileError {}

impl From<HeapError> for HeapFileError {
    fn from(err: HeapError) -> Self {
        HeapFileError::Heap(err)
    }
}

impl From<TxError> for HeapFileError {
    fn from(err: TxError) -> Self {
        HeapFileError::Tx(err)
    }
}

impl From<std::io::Error> for HeapFileError {
    fn from(err: std::io::Error) -> Self {
        HeapFileError::Io(err)
    }
}
