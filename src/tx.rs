//! Transaction identifiers and page-level two-phase locking.

pub mod error;
pub mod lock;
pub mod types;

pub use error::TxError;
pub use lock::{LockManager, LockTable, DEFAULT_LOCK_TIMEOUT};
pub use types::{LockMode, TxId};
