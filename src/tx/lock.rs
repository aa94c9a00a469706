//! Page lock acquisition for transactional file operations.
//!
//! The file layer never implements lock policy itself: it asks a
//! [`LockManager`] for the lock it needs and propagates the abort error if
//! the request cannot be granted. In the full engine the buffer pool
//! provides the implementation; [`LockTable`] is the reference
//! implementation used by this crate's tests and by single-process callers.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::heap::PageId;

use super::error::TxError;
use super::types::{LockMode, TxId};

/// Grants and releases per-page transaction locks.
///
/// Locks are held until explicitly released; the file layer acquires them
/// on behalf of a transaction and leaves release to the transaction's
/// commit/abort handling.
pub trait LockManager: Send + Sync {
    /// Acquires a lock of the given mode on `page_id` for `txid`, waiting
    /// while conflicting transactions hold the page.
    ///
    /// Re-acquiring a lock the transaction already holds succeeds
    /// immediately, as does upgrading a sole-held shared lock to exclusive.
    ///
    /// # Errors
    ///
    /// Returns [`TxError::LockWaitAborted`] if the implementation decides
    /// the wait cannot succeed and the transaction must roll back.
    fn lock(
        &self,
        txid: TxId,
        page_id: PageId,
        mode: LockMode,
    ) -> impl Future<Output = Result<(), TxError>> + Send;

    /// Releases `txid`'s lock on `page_id`, if held.
    fn unlock(&self, txid: TxId, page_id: PageId);

    /// Releases every lock held by `txid`.
    fn unlock_all(&self, txid: TxId);
}

/// Lock wait retry interval.
const WAIT_RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// Default wait deadline before a lock request aborts its transaction.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// Lock state for a single page: any number of readers, or one writer.
#[derive(Debug, Default)]
struct PageLocks {
    readers: HashSet<TxId>,
    writer: Option<TxId>,
}

impl PageLocks {
    fn is_free(&self) -> bool {
        self.readers.is_empty() && self.writer.is_none()
    }
}

/// Shared/exclusive page lock table with deadline-based abort.
///
/// A request that cannot be granted before its deadline fails with
/// [`TxError::LockWaitAborted`], which doubles as this table's deadlock
/// resolution: one of two mutually blocked transactions always times out.
///
/// NOTE: waiters poll at a fixed interval rather than queueing. Revisit if
/// lock churn ever gets high enough for the polling to show up in profiles.
#[derive(Debug)]
pub struct LockTable {
    timeout: Duration,
    pages: Mutex<HashMap<PageId, PageLocks>>,
}

impl LockTable {
    /// Creates a lock table whose waits abort after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            pages: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true if `txid` currently holds a lock of any mode on
    /// `page_id`.
    pub fn holds(&self, txid: TxId, page_id: PageId) -> bool {
        let pages = self.pages.lock();
        pages
            .get(&page_id)
            .is_some_and(|locks| locks.readers.contains(&txid) || locks.writer == Some(txid))
    }

    /// Attempts to take the lock without waiting. Returns false on conflict.
    fn try_lock(&self, txid: TxId, page_id: PageId, mode: LockMode) -> bool {
        let mut pages = self.pages.lock();
        let locks = pages.entry(page_id).or_default();
        match mode {
            LockMode::Shared => {
                if locks.writer.is_none() || locks.writer == Some(txid) {
                    if locks.writer.is_none() {
                        locks.readers.insert(txid);
                    }
                    true
                } else {
                    false
                }
            }
            LockMode::Exclusive => {
                if locks.writer == Some(txid) {
                    true
                } else if locks.writer.is_none()
                    && (locks.readers.is_empty()
                        || (locks.readers.len() == 1 && locks.readers.contains(&txid)))
                {
                    locks.readers.remove(&txid);
                    locks.writer = Some(txid);
                    true
                } else {
                    false
                }
            }
        }
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

impl LockManager for LockTable {
    async fn lock(&self, txid: TxId, page_id: PageId, mode: LockMode) -> Result<(), TxError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if self.try_lock(txid, page_id, mode) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(TxError::LockWaitAborted {
                    txid,
                    page_id,
                    mode,
                });
            }
            tokio::time::sleep(WAIT_RETRY_INTERVAL).await;
        }
    }

    fn unlock(&self, txid: TxId, page_id: PageId) {
        let mut pages = self.pages.lock();
        if let Some(locks) = pages.get_mut(&page_id) {
            locks.readers.remove(&txid);
            if locks.writer == Some(txid) {
                locks.writer = None;
            }
            if locks.is_free() {
                pages.remove(&page_id);
            }
        }
    }

    fn unlock_all(&self, txid: TxId) {
        let mut pages = self.pages.lock();
        pages.retain(|_, locks| {
            locks.readers.remove(&txid);
            if locks.writer == Some(txid) {
                locks.writer = None;
            }
            !locks.is_free()
        });
    }
}
