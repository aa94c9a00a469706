//! Transaction error types.

use crate::heap::PageId;

use super::types::{LockMode, TxId};

/// Errors that can occur during transactional page access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxError {
    /// A page lock could not be granted before the wait deadline expired.
    /// The transaction must be rolled back by the caller; retrying the
    /// single operation is not sufficient.
    LockWaitAborted {
        /// Transaction that was waiting.
        txid: TxId,
        /// Page the lock was requested on.
        page_id: PageId,
        /// Requested lock strength.
        mode: LockMode,
    },
}

impl std::fmt::Display for TxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxError::LockWaitAborted {
                txid,
                page_id,
                mode,
            } => write!(
                f,
                "transaction {} aborted: timed out waiting for {} lock on {}",
                txid, mode, page_id
            ),
        }
    }
}

impl std::error::Error for TxError {}
