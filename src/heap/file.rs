//! Heap files: one file of slotted pages per table.
//!
//! A heap file stores the pages of a single table back to back, so the
//! file offset of page `n` is `n * stored_size`. Mutating operations
//! take page locks through a [`LockManager`] and hold them for the rest
//! of the transaction; releasing is the transaction driver's job via
//! `unlock_all`.
//!
//! Only [`DbFile::add_tuple`] persists the page it touched before
//! returning. Deletes and updates hand the modified page back to the
//! caller, who decides when to flush it with [`DbFile::write_page`].

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::schema::Schema;
use crate::tx::{LockManager, LockMode, TxId};

use super::error::{HeapError, HeapFileError};
use super::page::{HeapPage, PageId, RecordId, TableId};
use super::tuple::Tuple;

/// Interface of a table's paged file.
///
/// Implementations are shared behind `Arc` across tasks; every method
/// takes `&self`.
pub trait DbFile: Send + Sync {
    /// Returns the table this file stores.
    fn id(&self) -> TableId;

    /// Returns the number of pages currently in the file.
    fn num_pages(&self) -> impl std::future::Future<Output = u64> + Send;

    /// Reads the page `page_id` names. No lock is taken; callers manage
    /// locking themselves when they bypass the record operations.
    ///
    /// # Errors
    ///
    /// Returns `WrongTable` if `page_id` names a different table,
    /// `PageNotFound` if it is beyond the end of the file, or `Io` /
    /// `Heap` if reading or decoding fails.
    fn read_page(
        &self,
        page_id: PageId,
    ) -> impl std::future::Future<Output = Result<HeapPage, HeapFileError>> + Send;

    /// Writes a page's current content at its file offset. The page's
    /// dirty flag is left as is; clearing it is the caller's decision.
    ///
    /// # Errors
    ///
    /// Returns `WrongTable` if the page names a different table,
    /// `PageNotFound` if it is beyond the end of the file, or `Io` if
    /// writing fails.
    fn write_page(
        &self,
        page: &HeapPage,
    ) -> impl std::future::Future<Output = Result<(), HeapFileError>> + Send;

    /// Places a record in the first page with a free slot, extending
    /// the file by one page if every page is full. The page that took
    /// the record is persisted before this returns.
    ///
    /// Takes an exclusive lock for `txid` on the page that takes the
    /// record and keeps it; locks on full pages probed along the way
    /// are released.
    ///
    /// # Errors
    ///
    /// Returns `Heap(SchemaMismatch)` if the record does not conform to
    /// the file's schema, `Heap(PageFull)` if the schema's records are
    /// too wide to ever fit a page, `Tx` if the lock wait aborts, or
    /// `Io` on file errors.
    fn add_tuple(
        &self,
        txid: TxId,
        tuple: &Tuple,
    ) -> impl std::future::Future<Output = Result<RecordId, HeapFileError>> + Send;

    /// Removes the record `tuple`'s identifier points at, under an
    /// exclusive lock for `txid`, and returns the modified page without
    /// persisting it.
    ///
    /// # Errors
    ///
    /// Returns `Heap(MissingRecordId)` if the tuple was never placed,
    /// `WrongTable` / `NotInFile` if its identifier does not name a
    /// record of this file, `Heap` if the slot is empty, or `Tx` if the
    /// lock wait aborts.
    fn delete_tuple(
        &self,
        txid: TxId,
        tuple: &Tuple,
    ) -> impl std::future::Future<Output = Result<HeapPage, HeapFileError>> + Send;

    /// Replaces the record at `rid` with `f` applied to its current
    /// value, under an exclusive lock for `txid`, and returns the
    /// modified page without persisting it.
    ///
    /// # Errors
    ///
    /// Returns `WrongTable` / `NotInFile` if `rid` does not name a
    /// record of this file, `Heap` if the slot is empty or the
    /// replacement does not conform to the schema, or `Tx` if the lock
    /// wait aborts.
    fn update_tuple<F>(
        &self,
        txid: TxId,
        rid: RecordId,
        f: F,
    ) -> impl std::future::Future<Output = Result<HeapPage, HeapFileError>> + Send
    where
        F: FnOnce(&Tuple) -> Tuple + Send;
}

/// A [`DbFile`] backed by a file on disk.
#[derive(Debug)]
pub struct HeapFile<L> {
    table: TableId,
    schema: Schema,
    path: PathBuf,
    file: Mutex<File>,
    page_count: AtomicU64,
    locks: Arc<L>,
}

impl<L: LockManager> HeapFile<L> {
    /// Opens the heap file at `path`, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be opened, or `Corrupted` if its
    /// length is not a multiple of the stored page size for `schema`.
    pub async fn open(
        table: TableId,
        schema: Schema,
        path: impl AsRef<Path>,
        locks: Arc<L>,
    ) -> Result<Self, HeapFileError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await?;

        let len = file.metadata().await?.len();
        let stored_size = HeapPage::stored_size(&schema) as u64;
        if len % stored_size != 0 {
            return Err(HeapFileError::Corrupted(format!(
                "file size {} is not a multiple of the stored page size {}",
                len, stored_size
            )));
        }

        Ok(HeapFile {
            table,
            schema,
            path,
            file: Mutex::new(file),
            page_count: AtomicU64::new(len / stored_size),
            locks,
        })
    }

    /// Returns the schema this file stores records of.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads a page under a shared lock for `txid` and returns its
    /// records in slot order.
    ///
    /// # Errors
    ///
    /// Returns `PageNotFound` if `page_no` is beyond the end of the
    /// file, `Tx` if the lock wait aborts, or `Io` / `Heap` if reading
    /// or decoding fails.
    pub async fn scan_page(&self, txid: TxId, page_no: u64) -> Result<Vec<Tuple>, HeapFileError> {
        let page_id = PageId::new(self.table, page_no);
        if page_no >= self.page_count.load(Ordering::Acquire) {
            return Err(HeapFileError::PageNotFound(page_id));
        }
        let page = self.lock_and_read(txid, page_id, LockMode::Shared).await?;
        Ok(page.tuples().collect())
    }

    /// Flushes file content and metadata to disk.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the sync fails.
    pub async fn sync_all(&self) -> Result<(), HeapFileError> {
        let file = self.file.lock().await;
        file.sync_all().await?;
        Ok(())
    }

    fn stored_size(&self) -> u64 {
        HeapPage::stored_size(&self.schema) as u64
    }

    fn check_table(&self, table: TableId) -> Result<(), HeapFileError> {
        if table != self.table {
            return Err(HeapFileError::WrongTable {
                expected: self.table,
                actual: table,
            });
        }
        Ok(())
    }

    async fn read_page_at(&self, page_no: u64) -> Result<HeapPage, HeapFileError> {
        let stored_size = self.stored_size();
        let mut data = vec![0u8; stored_size as usize];
        {
            let mut file = self.file.lock().await;
            file.seek(SeekFrom::Start(page_no * stored_size)).await?;
            file.read_exact(&mut data).await?;
        }
        let page_id = PageId::new(self.table, page_no);
        let page = HeapPage::from_bytes(page_id, self.schema.clone(), &data)?;
        Ok(page)
    }

    async fn write_page_at(&self, page: &HeapPage) -> Result<(), HeapFileError> {
        let data = page.to_bytes();
        let offset = page.page_id().page_no() * self.stored_size();
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(&data).await?;
        file.flush().await?;
        Ok(())
    }

    async fn lock_and_read(
        &self,
        txid: TxId,
        page_id: PageId,
        mode: LockMode,
    ) -> Result<HeapPage, HeapFileError> {
        self.locks.lock(txid, page_id, mode).await?;
        self.read_page_at(page_id.page_no()).await
    }

    /// Appends a zeroed page. The page is exclusively locked for `txid`
    /// before its page number becomes visible to other transactions, so
    /// no one can fill it between allocation and use.
    async fn allocate_page(&self, txid: TxId) -> Result<PageId, HeapFileError> {
        let mut file = self.file.lock().await;
        let page_no = self.page_count.load(Ordering::Acquire);
        let page_id = PageId::new(self.table, page_no);
        self.locks.lock(txid, page_id, LockMode::Exclusive).await?;

        let image = HeapPage::empty_page_image(&self.schema);
        file.seek(SeekFrom::Start(page_no * self.stored_size())).await?;
        file.write_all(&image).await?;
        file.flush().await?;
        self.page_count.store(page_no + 1, Ordering::Release);
        Ok(page_id)
    }
}

impl<L: LockManager> DbFile for HeapFile<L> {
    fn id(&self) -> TableId {
        self.table
    }

    async fn num_pages(&self) -> u64 {
        self.page_count.load(Ordering::Acquire)
    }

    async fn read_page(&self, page_id: PageId) -> Result<HeapPage, HeapFileError> {
        self.check_table(page_id.table())?;
        if page_id.page_no() >= self.page_count.load(Ordering::Acquire) {
            return Err(HeapFileError::PageNotFound(page_id));
        }
        self.read_page_at(page_id.page_no()).await
    }

    async fn write_page(&self, page: &HeapPage) -> Result<(), HeapFileError> {
        self.check_table(page.page_id().table())?;
        if page.page_id().page_no() >= self.page_count.load(Ordering::Acquire) {
            return Err(HeapFileError::PageNotFound(page.page_id()));
        }
        self.write_page_at(page).await
    }

    async fn add_tuple(&self, txid: TxId, tuple: &Tuple) -> Result<RecordId, HeapFileError> {
        if tuple.schema() != &self.schema {
            return Err(HeapError::SchemaMismatch {
                expected: self.schema.clone(),
                actual: tuple.schema().clone(),
            }
            .into());
        }
        if HeapPage::slot_count(&self.schema) == 0 {
            return Err(HeapError::PageFull(PageId::new(self.table, 0)).into());
        }

        let num_pages = self.page_count.load(Ordering::Acquire);
        for page_no in 0..num_pages {
            let page_id = PageId::new(self.table, page_no);
            let page = self
                .lock_and_read(txid, page_id, LockMode::Exclusive)
                .await?;
            if page.empty_slot_count() > 0 {
                let rid = page.add_tuple(tuple)?;
                self.write_page_at(&page).await?;
                return Ok(rid);
            }
            // NOTE: a probed page that stays unmodified does not need to
            // keep its lock until the end of the transaction.
            self.locks.unlock(txid, page_id);
        }

        let page_id = self.allocate_page(txid).await?;
        let page = self.read_page_at(page_id.page_no()).await?;
        let rid = page.add_tuple(tuple)?;
        self.write_page_at(&page).await?;
        Ok(rid)
    }

    async fn delete_tuple(&self, txid: TxId, tuple: &Tuple) -> Result<HeapPage, HeapFileError> {
        let rid = tuple.rid().ok_or(HeapError::MissingRecordId)?;
        self.check_table(rid.page().table())?;
        if rid.page().page_no() >= self.page_count.load(Ordering::Acquire) {
            return Err(HeapFileError::NotInFile(rid));
        }
        let page = self
            .lock_and_read(txid, rid.page(), LockMode::Exclusive)
            .await?;
        page.delete_tuple(tuple)?;
        Ok(page)
    }

    async fn update_tuple<F>(
        &self,
        txid: TxId,
        rid: RecordId,
        f: F,
    ) -> Result<HeapPage, HeapFileError>
    where
        F: FnOnce(&Tuple) -> Tuple + Send,
    {
        self.check_table(rid.page().table())?;
        if rid.page().page_no() >= self.page_count.load(Ordering::Acquire) {
            return Err(HeapFileError::NotInFile(rid));
        }
        let page = self
            .lock_and_read(txid, rid.page(), LockMode::Exclusive)
            .await?;
        page.update_tuple_with(rid, f)?;
        Ok(page)
    }
}
