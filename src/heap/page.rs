//! Slotted heap pages.
//!
//! A page stores fixed-width records conforming to a single schema. The
//! stored form is:
//!
//! ```text
//! +-----------------+---------------------------+--------------------+
//! | recovery marker | slot bitmap               | record region      |
//! | u64 BE          | ceil(slots / 32) u32 BE   | PAGE_SIZE bytes    |
//! +-----------------+---------------------------+--------------------+
//! ```
//!
//! Within each bitmap word the least significant bit marks the lowest
//! numbered slot of that word's range. Slot `i` holds its record at byte
//! offset `i * record_width` of the record region; space past the last
//! slot is zero padding.
//!
//! Pages use interior mutability: all operations take `&self` and lock a
//! [`parking_lot::Mutex`] around the decoded state, so a page behind an
//! `Arc` can be shared across tasks.

use std::fmt;
use std::mem;

use bytes::{Buf, BufMut, BytesMut};
use parking_lot::Mutex;

use crate::datum::{SerializationError, Value};
use crate::schema::Schema;

use super::error::HeapError;
use super::tuple::Tuple;

/// Bytes of record storage per page, excluding the recovery marker and
/// the slot bitmap.
pub const PAGE_SIZE: usize = 8192;

/// Identifies a table within the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(u32);

impl TableId {
    /// Creates a table identifier.
    pub const fn new(id: u32) -> Self {
        TableId(id)
    }

    /// Returns the raw identifier.
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Slot index within a page.
pub type SlotId = u16;

/// Identifies a page: the table it belongs to plus its zero-based page
/// number within that table's file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    table: TableId,
    page_no: u64,
}

impl PageId {
    /// Creates a page identifier.
    pub const fn new(table: TableId, page_no: u64) -> Self {
        PageId { table, page_no }
    }

    /// Returns the owning table.
    pub const fn table(self) -> TableId {
        self.table
    }

    /// Returns the zero-based page number.
    pub const fn page_no(self) -> u64 {
        self.page_no
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {} of table {}", self.page_no, self.table)
    }
}

/// Identifies a record: the page holding it plus its slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    page: PageId,
    slot: SlotId,
}

impl RecordId {
    /// Creates a record identifier.
    pub const fn new(page: PageId, slot: SlotId) -> Self {
        RecordId { page, slot }
    }

    /// Returns the page holding the record.
    pub const fn page(self) -> PageId {
        self.page
    }

    /// Returns the slot index within the page.
    pub const fn slot(self) -> SlotId {
        self.slot
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {} on {}", self.slot, self.page)
    }
}

/// Decoded page state guarded by the page mutex.
#[derive(Debug)]
struct PageState {
    lsn: u64,
    /// Raw bitmap words as stored. Bits at or above the slot count are
    /// preserved across a decode/encode cycle but never consulted.
    bitmap: Vec<u32>,
    slots: Vec<Option<Tuple>>,
    dirty: bool,
    /// Advisory allocation cursor. No slot below it is free.
    cursor: usize,
    before_image: Vec<u8>,
}

impl PageState {
    fn occupied(&self, slot: usize) -> bool {
        self.bitmap[slot / 32] & (1u32 << (slot % 32)) != 0
    }

    fn set_occupied(&mut self, slot: usize, occupied: bool) {
        let mask = 1u32 << (slot % 32);
        if occupied {
            self.bitmap[slot / 32] |= mask;
        } else {
            self.bitmap[slot / 32] &= !mask;
        }
    }

    fn next_free_at_or_after(&self, from: usize) -> usize {
        let mut slot = from;
        while slot < self.slots.len() && self.occupied(slot) {
            slot += 1;
        }
        slot
    }
}

/// A slotted page of fixed-width records.
#[derive(Debug)]
pub struct HeapPage {
    page_id: PageId,
    schema: Schema,
    state: Mutex<PageState>,
}

impl HeapPage {
    /// Records a page of this schema can hold.
    pub fn slot_count(schema: &Schema) -> usize {
        PAGE_SIZE / schema.record_width()
    }

    /// 32-bit words in the slot bitmap.
    pub fn bitmap_words(schema: &Schema) -> usize {
        Self::slot_count(schema).div_ceil(32)
    }

    /// Total stored bytes for a page of this schema: recovery marker,
    /// bitmap, record region.
    pub fn stored_size(schema: &Schema) -> usize {
        8 + 4 * Self::bitmap_words(schema) + PAGE_SIZE
    }

    /// A zeroed stored image: no records, marker zero.
    pub fn empty_page_image(schema: &Schema) -> Vec<u8> {
        vec![0; Self::stored_size(schema)]
    }

    /// Decodes a page from its stored form.
    ///
    /// Records are deserialized for every set bitmap bit and stamped
    /// with their record identifiers. The decoded content also becomes
    /// the page's initial before-image.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if `data` is shorter than the stored size
    /// for `schema` or any occupied slot holds malformed bytes.
    pub fn from_bytes(page_id: PageId, schema: Schema, data: &[u8]) -> Result<Self, HeapError> {
        let required = Self::stored_size(&schema);
        if data.len() < required {
            return Err(HeapError::Serialization(SerializationError::BufferTooSmall {
                required,
                available: data.len(),
            }));
        }
        let width = schema.record_width();
        let slot_count = Self::slot_count(&schema);

        let mut buf = &data[..required];
        let lsn = buf.get_u64();
        let mut bitmap = Vec::with_capacity(Self::bitmap_words(&schema));
        for _ in 0..Self::bitmap_words(&schema) {
            bitmap.push(buf.get_u32());
        }
        let mut slots = Vec::with_capacity(slot_count);
        for slot in 0..slot_count {
            if bitmap[slot / 32] & (1u32 << (slot % 32)) != 0 {
                let mut tuple = Tuple::deserialize(&schema, &buf[slot * width..(slot + 1) * width])?;
                tuple.set_rid(RecordId::new(page_id, slot as SlotId));
                slots.push(Some(tuple));
            } else {
                slots.push(None);
            }
        }

        let mut state = PageState {
            lsn,
            bitmap,
            slots,
            dirty: false,
            cursor: 0,
            before_image: Vec::new(),
        };
        state.before_image = Self::encode(&schema, &state);
        Ok(HeapPage {
            page_id,
            schema,
            state: Mutex::new(state),
        })
    }

    /// Encodes the page into its stored form.
    pub fn to_bytes(&self) -> Vec<u8> {
        Self::encode(&self.schema, &self.state.lock())
    }

    fn encode(schema: &Schema, state: &PageState) -> Vec<u8> {
        let width = schema.record_width();
        let mut buf = BytesMut::with_capacity(Self::stored_size(schema));
        buf.put_u64(state.lsn);
        for word in &state.bitmap {
            buf.put_u32(*word);
        }
        let mut scratch = vec![0u8; width];
        for slot in &state.slots {
            match slot {
                Some(tuple) => {
                    // Every serialize covers the full record width, so the
                    // scratch buffer needs no re-zeroing between slots.
                    tuple
                        .serialize(&mut scratch)
                        .expect("occupied slot holds record incompatible with page schema");
                    buf.put_slice(&scratch);
                }
                None => buf.put_bytes(0, width),
            }
        }
        buf.put_bytes(0, PAGE_SIZE - width * state.slots.len());
        buf.to_vec()
    }

    /// Returns this page's identifier.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the schema this page stores records of.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the recovery marker.
    pub fn lsn(&self) -> u64 {
        self.state.lock().lsn
    }

    /// Sets the recovery marker. Does not mark the page dirty; callers
    /// stamp markers on pages they are already flushing.
    pub fn set_lsn(&self, lsn: u64) {
        self.state.lock().lsn = lsn;
    }

    /// Returns whether the page has unflushed modifications.
    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// Sets or clears the dirty flag.
    pub fn mark_dirty(&self, dirty: bool) {
        self.state.lock().dirty = dirty;
    }

    /// Counts free slots on the page.
    pub fn empty_slot_count(&self) -> usize {
        self.state
            .lock()
            .slots
            .iter()
            .filter(|slot| slot.is_none())
            .count()
    }

    /// Places a record in the lowest numbered free slot.
    ///
    /// The page stores a copy stamped with the new record identifier;
    /// the argument is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `SchemaMismatch` if the record's schema differs from the
    /// page's, or `PageFull` if every slot is occupied. The page is
    /// unchanged on error.
    pub fn add_tuple(&self, tuple: &Tuple) -> Result<RecordId, HeapError> {
        self.check_schema(tuple)?;
        let mut state = self.state.lock();
        // The cursor is advisory: a log replay may have filled the slot
        // it points at, so always re-verify from the cursor onward.
        let slot = state.next_free_at_or_after(state.cursor);
        if slot >= state.slots.len() {
            return Err(HeapError::PageFull(self.page_id));
        }
        let rid = RecordId::new(self.page_id, slot as SlotId);
        let mut stored = tuple.clone();
        stored.set_rid(rid);
        state.slots[slot] = Some(stored);
        state.set_occupied(slot, true);
        state.cursor = state.next_free_at_or_after(slot + 1);
        state.dirty = true;
        Ok(rid)
    }

    /// Removes the record the tuple's identifier points at.
    ///
    /// # Errors
    ///
    /// Returns `MissingRecordId` if the tuple was never placed,
    /// `ForeignRecord` if its identifier names a different page,
    /// `SlotOutOfRange` if the slot index is invalid, or `SlotEmpty` if
    /// the slot holds no record. The page is unchanged on error.
    pub fn delete_tuple(&self, tuple: &Tuple) -> Result<(), HeapError> {
        let rid = tuple.rid().ok_or(HeapError::MissingRecordId)?;
        let slot = self.check_owned(rid)?;
        let mut state = self.state.lock();
        if slot >= state.slots.len() {
            return Err(HeapError::SlotOutOfRange {
                slot,
                count: state.slots.len(),
            });
        }
        if !state.occupied(slot) {
            return Err(HeapError::SlotEmpty(rid));
        }
        state.slots[slot] = None;
        state.set_occupied(slot, false);
        if slot < state.cursor {
            state.cursor = slot;
        }
        state.dirty = true;
        Ok(())
    }

    /// Replaces the record at `rid` with a copy of `tuple`.
    ///
    /// The stored copy keeps the identifier `rid` regardless of what the
    /// argument carries. Returns the record that was replaced.
    ///
    /// # Errors
    ///
    /// Returns `ForeignRecord`, `SlotOutOfRange` or `SlotEmpty` if `rid`
    /// does not name an occupied slot of this page, or `SchemaMismatch`
    /// if the replacement's schema differs from the page's. The page is
    /// unchanged on error.
    pub fn update_tuple(&self, rid: RecordId, tuple: &Tuple) -> Result<Tuple, HeapError> {
        self.transform_slot(rid, |_| Ok(tuple.clone()))
    }

    /// Replaces the record at `rid` with a transformation of its current
    /// value. Same contract as [`HeapPage::update_tuple`].
    ///
    /// # Errors
    ///
    /// See [`HeapPage::update_tuple`].
    pub fn update_tuple_with<F>(&self, rid: RecordId, f: F) -> Result<Tuple, HeapError>
    where
        F: FnOnce(&Tuple) -> Tuple,
    {
        self.transform_slot(rid, |current| Ok(f(current)))
    }

    /// Overwrites a single field of the record at `rid`.
    ///
    /// # Errors
    ///
    /// Returns the slot errors of [`HeapPage::update_tuple`], or
    /// `FieldOutOfRange` / `FieldTypeMismatch` if the field index or
    /// value does not fit the schema. The page is unchanged on error.
    pub fn set_field(&self, rid: RecordId, index: usize, value: Value) -> Result<(), HeapError> {
        self.transform_slot(rid, |current| {
            let mut updated = current.clone();
            updated.set_value(index, value)?;
            Ok(updated)
        })
        .map(|_| ())
    }

    /// Places a record in the exact slot `rid` names, for log replay.
    ///
    /// Unlike [`HeapPage::add_tuple`] this does not pick a slot; redoing
    /// an insert must land the record where the log says it went.
    ///
    /// # Errors
    ///
    /// Returns `SchemaMismatch`, `ForeignRecord` or `SlotOutOfRange` for
    /// an invalid record or slot, or `SlotOccupied` if the slot already
    /// holds a record. The page is unchanged on error.
    pub fn add_tuple_from_log(&self, rid: RecordId, tuple: &Tuple) -> Result<(), HeapError> {
        self.check_schema(tuple)?;
        let slot = self.check_owned(rid)?;
        let mut state = self.state.lock();
        if slot >= state.slots.len() {
            return Err(HeapError::SlotOutOfRange {
                slot,
                count: state.slots.len(),
            });
        }
        if state.occupied(slot) {
            return Err(HeapError::SlotOccupied(rid));
        }
        let mut stored = tuple.clone();
        stored.set_rid(rid);
        state.slots[slot] = Some(stored);
        state.set_occupied(slot, true);
        state.dirty = true;
        Ok(())
    }

    /// Decodes the page as it looked when the before-image was last
    /// captured.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the stored image fails to decode.
    pub fn before_image(&self) -> Result<HeapPage, HeapError> {
        let state = self.state.lock();
        HeapPage::from_bytes(self.page_id, self.schema.clone(), &state.before_image)
    }

    /// Captures the current content as the new before-image.
    pub fn set_before_image(&self) {
        let mut state = self.state.lock();
        let image = Self::encode(&self.schema, &state);
        state.before_image = image;
    }

    /// Returns an iterator over the occupied slots in slot order.
    ///
    /// Each step re-locks the page, so records may be added or removed
    /// between steps.
    ///
    /// # Panics
    ///
    /// The iterator panics if the slot it is about to yield was emptied
    /// after being scheduled.
    pub fn tuples(&self) -> Tuples<'_> {
        let state = self.state.lock();
        let next = Self::next_occupied(&state, 0);
        Tuples { page: self, next }
    }

    fn next_occupied(state: &PageState, from: usize) -> Option<usize> {
        (from..state.slots.len()).find(|&slot| state.occupied(slot))
    }

    fn check_schema(&self, tuple: &Tuple) -> Result<(), HeapError> {
        if tuple.schema() != &self.schema {
            return Err(HeapError::SchemaMismatch {
                expected: self.schema.clone(),
                actual: tuple.schema().clone(),
            });
        }
        Ok(())
    }

    fn check_owned(&self, rid: RecordId) -> Result<usize, HeapError> {
        if rid.page() != self.page_id {
            return Err(HeapError::ForeignRecord {
                rid,
                page_id: self.page_id,
            });
        }
        Ok(rid.slot() as usize)
    }

    /// Replaces the occupied slot `rid` names with `f` applied to its
    /// current record, returning the old record. The replacement is
    /// schema-checked and stamped with `rid` before it is stored.
    fn transform_slot<F>(&self, rid: RecordId, f: F) -> Result<Tuple, HeapError>
    where
        F: FnOnce(&Tuple) -> Result<Tuple, HeapError>,
    {
        let slot = self.check_owned(rid)?;
        let mut state = self.state.lock();
        if slot >= state.slots.len() {
            return Err(HeapError::SlotOutOfRange {
                slot,
                count: state.slots.len(),
            });
        }
        let current = match &state.slots[slot] {
            Some(tuple) => tuple,
            None => return Err(HeapError::SlotEmpty(rid)),
        };
        let mut replacement = f(current)?;
        if replacement.schema() != &self.schema {
            return Err(HeapError::SchemaMismatch {
                expected: self.schema.clone(),
                actual: replacement.schema().clone(),
            });
        }
        replacement.set_rid(rid);
        let old = mem::replace(&mut state.slots[slot], Some(replacement));
        state.dirty = true;
        Ok(old.expect("slot occupancy checked above"))
    }
}

/// Iterator over a page's occupied slots. Created by
/// [`HeapPage::tuples`].
pub struct Tuples<'a> {
    page: &'a HeapPage,
    next: Option<usize>,
}

impl Iterator for Tuples<'_> {
    type Item = Tuple;

    fn next(&mut self) -> Option<Tuple> {
        let slot = self.next?;
        let state = self.page.state.lock();
        let mut tuple = match &state.slots[slot] {
            Some(tuple) => tuple.clone(),
            None => panic!(
                "slot {} of {} emptied during traversal",
                slot, self.page.page_id
            ),
        };
        tuple.set_rid(RecordId::new(self.page.page_id, slot as SlotId));
        self.next = HeapPage::next_occupied(&state, slot + 1);
        Some(tuple)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::Type;

    fn page_id() -> PageId {
        PageId::new(TableId::new(7), 3)
    }

    fn int_schema() -> Schema {
        Schema::new(vec![Type::Int4]).unwrap()
    }

    // 800-byte records, ten slots per page.
    fn wide_schema() -> Schema {
        Schema::new(vec![Type::Int4, Type::Varchar(792)]).unwrap()
    }

    fn empty_page(schema: &Schema) -> HeapPage {
        HeapPage::from_bytes(page_id(), schema.clone(), &HeapPage::empty_page_image(schema))
            .unwrap()
    }

    fn int_tuple(i: i32) -> Tuple {
        Tuple::new(int_schema(), vec![Value::Int32(i)]).unwrap()
    }

    fn wide_tuple(i: i32) -> Tuple {
        Tuple::new(
            wide_schema(),
            vec![Value::Int32(i), Value::Text(format!("record {}", i))],
        )
        .unwrap()
    }

    fn placed(page: &HeapPage, tuple: &Tuple) -> Tuple {
        let rid = page.add_tuple(tuple).unwrap();
        let mut owned = tuple.clone();
        owned.set_rid(rid);
        owned
    }

    #[test]
    fn test_layout_exact_multiple() {
        // 256-byte records divide the region exactly: 32 slots, one word.
        let schema = Schema::new(vec![Type::Varchar(252)]).unwrap();
        assert_eq!(HeapPage::slot_count(&schema), 32);
        assert_eq!(HeapPage::bitmap_words(&schema), 1);
        assert_eq!(HeapPage::stored_size(&schema), 8 + 4 + PAGE_SIZE);
    }

    #[test]
    fn test_layout_rounds_bitmap_words_up() {
        // 248-byte records give 33 slots, spilling into a second word.
        let schema = Schema::new(vec![Type::Varchar(244)]).unwrap();
        assert_eq!(HeapPage::slot_count(&schema), 33);
        assert_eq!(HeapPage::bitmap_words(&schema), 2);
        assert_eq!(HeapPage::stored_size(&schema), 8 + 8 + PAGE_SIZE);
    }

    #[test]
    fn test_layout_truncates_slot_count() {
        assert_eq!(HeapPage::slot_count(&wide_schema()), 10);
        assert_eq!(HeapPage::bitmap_words(&wide_schema()), 1);
    }

    #[test]
    fn test_display_formats() {
        assert_eq!(page_id().to_string(), "page 3 of table 7");
        assert_eq!(
            RecordId::new(page_id(), 2).to_string(),
            "slot 2 on page 3 of table 7"
        );
    }

    #[test]
    fn test_empty_page() {
        let page = empty_page(&int_schema());
        assert_eq!(page.page_id(), page_id());
        assert_eq!(page.lsn(), 0);
        assert!(!page.is_dirty());
        assert_eq!(page.empty_slot_count(), HeapPage::slot_count(&int_schema()));
        assert_eq!(page.tuples().count(), 0);
    }

    #[test]
    fn test_add_assigns_first_fit_slots() {
        let page = empty_page(&int_schema());
        for slot in 0..3 {
            let rid = page.add_tuple(&int_tuple(slot as i32)).unwrap();
            assert_eq!(rid, RecordId::new(page_id(), slot));
        }
        let rids: Vec<_> = page.tuples().map(|t| t.rid().unwrap()).collect();
        assert_eq!(
            rids,
            vec![
                RecordId::new(page_id(), 0),
                RecordId::new(page_id(), 1),
                RecordId::new(page_id(), 2)
            ]
        );
    }

    #[test]
    fn test_add_stores_a_copy() {
        let page = empty_page(&int_schema());
        let mut tuple = int_tuple(1);
        page.add_tuple(&tuple).unwrap();
        tuple.set_value(0, Value::Int32(99)).unwrap();

        let stored = page.tuples().next().unwrap();
        assert_eq!(stored.value(0), Some(&Value::Int32(1)));
    }

    #[test]
    fn test_add_rejects_schema_mismatch() {
        let page = empty_page(&int_schema());
        let result = page.add_tuple(&wide_tuple(1));
        assert!(matches!(result, Err(HeapError::SchemaMismatch { .. })));
        assert_eq!(page.empty_slot_count(), HeapPage::slot_count(&int_schema()));
        assert!(!page.is_dirty());
    }

    #[test]
    fn test_page_full_leaves_page_unchanged() {
        let page = empty_page(&wide_schema());
        for i in 0..10 {
            page.add_tuple(&wide_tuple(i)).unwrap();
        }
        assert_eq!(page.empty_slot_count(), 0);

        let before = page.to_bytes();
        let result = page.add_tuple(&wide_tuple(10));
        assert!(matches!(result, Err(HeapError::PageFull(id)) if id == page_id()));
        assert_eq!(page.to_bytes(), before);
    }

    #[test]
    fn test_delete_frees_slot_for_reuse() {
        let page = empty_page(&wide_schema());
        let mut stored = Vec::new();
        for i in 0..5 {
            stored.push(placed(&page, &wide_tuple(i)));
        }
        page.delete_tuple(&stored[2]).unwrap();
        assert_eq!(page.empty_slot_count(), 6);

        // First fit reuses the freed slot before touching fresh ones.
        let rid = page.add_tuple(&wide_tuple(20)).unwrap();
        assert_eq!(rid, RecordId::new(page_id(), 2));
        let rid = page.add_tuple(&wide_tuple(21)).unwrap();
        assert_eq!(rid, RecordId::new(page_id(), 5));
    }

    #[test]
    fn test_delete_requires_record_id() {
        let page = empty_page(&int_schema());
        page.add_tuple(&int_tuple(1)).unwrap();
        let result = page.delete_tuple(&int_tuple(1));
        assert!(matches!(result, Err(HeapError::MissingRecordId)));
    }

    #[test]
    fn test_delete_rejects_foreign_record() {
        let page = empty_page(&int_schema());
        let mut tuple = int_tuple(1);
        tuple.set_rid(RecordId::new(PageId::new(TableId::new(7), 4), 0));
        let result = page.delete_tuple(&tuple);
        assert!(matches!(result, Err(HeapError::ForeignRecord { .. })));
    }

    #[test]
    fn test_delete_rejects_empty_slot() {
        let page = empty_page(&wide_schema());
        let mut tuple = wide_tuple(1);
        tuple.set_rid(RecordId::new(page_id(), 9));
        let result = page.delete_tuple(&tuple);
        assert!(matches!(result, Err(HeapError::SlotEmpty(_))));
    }

    #[test]
    fn test_delete_rejects_out_of_range_slot() {
        let page = empty_page(&wide_schema());
        let mut tuple = wide_tuple(1);
        tuple.set_rid(RecordId::new(page_id(), 10));
        let result = page.delete_tuple(&tuple);
        assert!(matches!(
            result,
            Err(HeapError::SlotOutOfRange { slot: 10, count: 10 })
        ));
    }

    #[test]
    fn test_update_keeps_identifier() {
        let page = empty_page(&int_schema());
        let rid = page.add_tuple(&int_tuple(1)).unwrap();

        let old = page.update_tuple(rid, &int_tuple(2)).unwrap();
        assert_eq!(old.value(0), Some(&Value::Int32(1)));
        assert_eq!(old.rid(), Some(rid));

        let stored = page.tuples().next().unwrap();
        assert_eq!(stored.value(0), Some(&Value::Int32(2)));
        assert_eq!(stored.rid(), Some(rid));
    }

    #[test]
    fn test_update_schema_mismatch_leaves_slot_unchanged() {
        let page = empty_page(&int_schema());
        let rid = page.add_tuple(&int_tuple(1)).unwrap();

        let result = page.update_tuple(rid, &wide_tuple(2));
        assert!(matches!(result, Err(HeapError::SchemaMismatch { .. })));
        let stored = page.tuples().next().unwrap();
        assert_eq!(stored.value(0), Some(&Value::Int32(1)));
    }

    #[test]
    fn test_update_rejects_empty_slot() {
        let page = empty_page(&int_schema());
        let result = page.update_tuple(RecordId::new(page_id(), 0), &int_tuple(1));
        assert!(matches!(result, Err(HeapError::SlotEmpty(_))));
    }

    #[test]
    fn test_update_tuple_with() {
        let page = empty_page(&int_schema());
        let rid = page.add_tuple(&int_tuple(41)).unwrap();

        page.update_tuple_with(rid, |current| {
            let mut updated = current.clone();
            match current.value(0) {
                Some(Value::Int32(i)) => updated.set_value(0, Value::Int32(i + 1)).unwrap(),
                other => panic!("unexpected field: {:?}", other),
            }
            updated
        })
        .unwrap();

        let stored = page.tuples().next().unwrap();
        assert_eq!(stored.value(0), Some(&Value::Int32(42)));
    }

    #[test]
    fn test_set_field() {
        let page = empty_page(&wide_schema());
        let rid = page.add_tuple(&wide_tuple(1)).unwrap();

        page.set_field(rid, 0, Value::Int32(99)).unwrap();
        let stored = page.tuples().next().unwrap();
        assert_eq!(stored.value(0), Some(&Value::Int32(99)));
        assert_eq!(stored.value(1), Some(&Value::Text("record 1".to_string())));
    }

    #[test]
    fn test_set_field_rejects_bad_field() {
        let page = empty_page(&wide_schema());
        let rid = page.add_tuple(&wide_tuple(1)).unwrap();

        let result = page.set_field(rid, 2, Value::Int32(0));
        assert!(matches!(
            result,
            Err(HeapError::FieldOutOfRange { index: 2, count: 2 })
        ));
        let result = page.set_field(rid, 1, Value::Int32(0));
        assert!(matches!(
            result,
            Err(HeapError::FieldTypeMismatch { index: 1, .. })
        ));

        let stored = page.tuples().next().unwrap();
        assert_eq!(stored.value(0), Some(&Value::Int32(1)));
        assert_eq!(stored.value(1), Some(&Value::Text("record 1".to_string())));
    }

    #[test]
    fn test_set_field_rejects_empty_slot() {
        let page = empty_page(&wide_schema());
        let result = page.set_field(RecordId::new(page_id(), 0), 0, Value::Int32(0));
        assert!(matches!(result, Err(HeapError::SlotEmpty(_))));
    }

    #[test]
    fn test_add_from_log_places_at_exact_slot() {
        let page = empty_page(&wide_schema());
        let rid = RecordId::new(page_id(), 4);
        page.add_tuple_from_log(rid, &wide_tuple(1)).unwrap();

        let rids: Vec<_> = page.tuples().map(|t| t.rid().unwrap()).collect();
        assert_eq!(rids, vec![rid]);
        assert_eq!(page.empty_slot_count(), 9);
    }

    #[test]
    fn test_add_from_log_rejects_occupied_slot() {
        let page = empty_page(&int_schema());
        let rid = page.add_tuple(&int_tuple(1)).unwrap();

        let result = page.add_tuple_from_log(rid, &int_tuple(2));
        assert!(matches!(result, Err(HeapError::SlotOccupied(id)) if id == rid));
        let stored = page.tuples().next().unwrap();
        assert_eq!(stored.value(0), Some(&Value::Int32(1)));
    }

    #[test]
    fn test_add_from_log_rejects_out_of_range_slot() {
        let page = empty_page(&wide_schema());
        let result = page.add_tuple_from_log(RecordId::new(page_id(), 10), &wide_tuple(1));
        assert!(matches!(result, Err(HeapError::SlotOutOfRange { .. })));
    }

    #[test]
    fn test_add_skips_slot_filled_by_log_replay() {
        let page = empty_page(&wide_schema());
        page.add_tuple(&wide_tuple(0)).unwrap();
        page.add_tuple(&wide_tuple(1)).unwrap();
        page.add_tuple_from_log(RecordId::new(page_id(), 2), &wide_tuple(2))
            .unwrap();

        let rid = page.add_tuple(&wide_tuple(3)).unwrap();
        assert_eq!(rid, RecordId::new(page_id(), 3));
    }

    #[test]
    fn test_empty_slot_count_ignores_bits_beyond_capacity() {
        // Ten slots fit, so bits 10..31 of the word are stray. They must
        // survive a decode/encode cycle without being counted.
        let schema = wide_schema();
        let mut image = HeapPage::empty_page_image(&schema);
        image[8..12].copy_from_slice(&0xFFFF_FC00u32.to_be_bytes());

        let page = HeapPage::from_bytes(page_id(), schema, &image).unwrap();
        assert_eq!(page.empty_slot_count(), 10);
        assert_eq!(page.tuples().count(), 0);
        assert_eq!(page.to_bytes(), image);
    }

    #[test]
    fn test_round_trip_preserves_content() {
        let page = empty_page(&wide_schema());
        let mut stored = Vec::new();
        for i in 0..3 {
            stored.push(placed(&page, &wide_tuple(i)));
        }
        page.delete_tuple(&stored[1]).unwrap();
        page.update_tuple(stored[2].rid().unwrap(), &wide_tuple(20))
            .unwrap();
        page.set_lsn(42);

        let bytes = page.to_bytes();
        assert_eq!(bytes.len(), HeapPage::stored_size(&wide_schema()));

        let decoded = HeapPage::from_bytes(page_id(), wide_schema(), &bytes).unwrap();
        assert_eq!(decoded.lsn(), 42);
        assert_eq!(decoded.empty_slot_count(), 8);
        let tuples: Vec<_> = decoded.tuples().collect();
        assert_eq!(tuples.len(), 2);
        assert_eq!(tuples[0].value(0), Some(&Value::Int32(0)));
        assert_eq!(tuples[0].rid(), Some(RecordId::new(page_id(), 0)));
        assert_eq!(tuples[1].value(0), Some(&Value::Int32(20)));
        assert_eq!(tuples[1].rid(), Some(RecordId::new(page_id(), 2)));
        assert_eq!(decoded.to_bytes(), bytes);
    }

    #[test]
    fn test_dirty_tracking() {
        let page = empty_page(&int_schema());
        assert!(!page.is_dirty());

        page.set_lsn(9);
        assert!(!page.is_dirty());

        let rid = page.add_tuple(&int_tuple(1)).unwrap();
        assert!(page.is_dirty());
        page.mark_dirty(false);

        page.update_tuple(rid, &int_tuple(2)).unwrap();
        assert!(page.is_dirty());
        page.mark_dirty(false);

        page.set_field(rid, 0, Value::Int32(3)).unwrap();
        assert!(page.is_dirty());
        page.mark_dirty(false);

        let mut owned = int_tuple(3);
        owned.set_rid(rid);
        page.delete_tuple(&owned).unwrap();
        assert!(page.is_dirty());
    }

    #[test]
    fn test_before_image_tracks_last_capture() {
        let page = empty_page(&int_schema());
        page.add_tuple(&int_tuple(1)).unwrap();

        // The image captured at decode time is the empty page.
        let before = page.before_image().unwrap();
        assert_eq!(before.tuples().count(), 0);

        page.set_before_image();
        page.add_tuple(&int_tuple(2)).unwrap();

        let before = page.before_image().unwrap();
        let tuples: Vec<_> = before.tuples().collect();
        assert_eq!(tuples.len(), 1);
        assert_eq!(tuples[0].value(0), Some(&Value::Int32(1)));
    }

    #[test]
    fn test_tuples_skips_gaps() {
        let page = empty_page(&wide_schema());
        let mut stored = Vec::new();
        for i in 0..5 {
            stored.push(placed(&page, &wide_tuple(i)));
        }
        page.delete_tuple(&stored[1]).unwrap();
        page.delete_tuple(&stored[3]).unwrap();

        let slots: Vec<_> = page.tuples().map(|t| t.rid().unwrap().slot()).collect();
        assert_eq!(slots, vec![0, 2, 4]);
    }

    #[test]
    #[should_panic(expected = "emptied during traversal")]
    fn test_tuples_panics_if_slot_emptied_mid_scan() {
        let page = empty_page(&int_schema());
        let first = placed(&page, &int_tuple(1));
        placed(&page, &int_tuple(2));

        let mut tuples = page.tuples();
        page.delete_tuple(&first).unwrap();
        tuples.next();
    }

    #[test]
    fn test_from_bytes_rejects_short_buffer() {
        let schema = int_schema();
        let image = vec![0; HeapPage::stored_size(&schema) - 1];
        let result = HeapPage::from_bytes(page_id(), schema, &image);
        assert!(matches!(
            result,
            Err(HeapError::Serialization(SerializationError::BufferTooSmall { .. }))
        ));
    }

    #[test]
    fn test_from_bytes_rejects_corrupt_record() {
        // Mark slot 0 occupied but leave an invalid boolean byte in its
        // record region.
        let schema = Schema::new(vec![Type::Bool]).unwrap();
        let mut image = HeapPage::empty_page_image(&schema);
        let words = HeapPage::bitmap_words(&schema);
        image[8..12].copy_from_slice(&1u32.to_be_bytes());
        image[8 + 4 * words] = 7;

        let result = HeapPage::from_bytes(page_id(), schema, &image);
        assert!(matches!(
            result,
            Err(HeapError::Serialization(SerializationError::InvalidFormat(_)))
        ));
    }
}
