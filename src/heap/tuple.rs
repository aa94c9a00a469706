//! Records stored on heap pages.
//!
//! A [`Tuple`] is an ordered list of values conforming to a [`Schema`].
//! On disk it occupies exactly `schema.record_width()` bytes: each field
//! serialized at its cumulative offset, with no per-record header. The
//! record identifier is not part of the serialized form; pages stamp it
//! when a tuple is placed in a slot.

use crate::datum::{SerializationError, Value};
use crate::ensure_buf_len;
use crate::schema::Schema;

use super::error::HeapError;
use super::page::RecordId;

/// A fixed-width record: values typed by a schema, plus the identifier
/// of the slot holding it (if any).
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    schema: Schema,
    values: Vec<Value>,
    rid: Option<RecordId>,
}

impl Tuple {
    /// Creates a tuple from a schema and matching values.
    ///
    /// # Errors
    ///
    /// Returns `FieldCountMismatch` if the value count differs from the
    /// schema's field count, or `FieldTypeMismatch` if any value does
    /// not fit its declared type.
    pub fn new(schema: Schema, values: Vec<Value>) -> Result<Self, HeapError> {
        if values.len() != schema.field_count() {
            return Err(HeapError::FieldCountMismatch {
                expected: schema.field_count(),
                actual: values.len(),
            });
        }
        for (index, (value, ty)) in values.iter().zip(schema.types()).enumerate() {
            if !value.matches(*ty) {
                return Err(HeapError::FieldTypeMismatch {
                    index,
                    expected: *ty,
                });
            }
        }
        Ok(Tuple {
            schema,
            values,
            rid: None,
        })
    }

    /// Returns the schema this tuple conforms to.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns all field values in schema order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the value of field `index`, or `None` if out of range.
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns the identifier of the slot holding this tuple, if placed.
    pub fn rid(&self) -> Option<RecordId> {
        self.rid
    }

    /// Stamps the identifier of the slot holding this tuple.
    pub fn set_rid(&mut self, rid: RecordId) {
        self.rid = Some(rid);
    }

    /// Replaces the value of field `index`.
    ///
    /// # Errors
    ///
    /// Returns `FieldOutOfRange` if `index` is beyond the field count,
    /// or `FieldTypeMismatch` if the value does not fit the field's
    /// declared type. The tuple is unchanged on error.
    pub fn set_value(&mut self, index: usize, value: Value) -> Result<(), HeapError> {
        let ty = self
            .schema
            .field_type(index)
            .ok_or(HeapError::FieldOutOfRange {
                index,
                count: self.schema.field_count(),
            })?;
        if !value.matches(ty) {
            return Err(HeapError::FieldTypeMismatch {
                index,
                expected: ty,
            });
        }
        self.values[index] = value;
        Ok(())
    }

    /// Serializes all fields into `buf` at their cumulative offsets.
    ///
    /// Writes exactly `schema.record_width()` bytes and returns that
    /// count.
    ///
    /// # Errors
    ///
    /// Returns `BufferTooSmall` if `buf` is shorter than the record
    /// width.
    pub fn serialize(&self, buf: &mut [u8]) -> Result<usize, SerializationError> {
        ensure_buf_len!(buf, self.schema.record_width());
        let mut offset = 0;
        for (value, ty) in self.values.iter().zip(self.schema.types()) {
            offset += value.serialize(*ty, &mut buf[offset..])?;
        }
        Ok(offset)
    }

    /// Deserializes a record of `schema` from the start of `buf`.
    ///
    /// The returned tuple carries no record identifier.
    ///
    /// # Errors
    ///
    /// Returns `BufferTooSmall` if `buf` is shorter than the record
    /// width, or `InvalidFormat` if any field's bytes are malformed.
    pub fn deserialize(schema: &Schema, buf: &[u8]) -> Result<Self, SerializationError> {
        let mut values = Vec::with_capacity(schema.field_count());
        let mut offset = 0;
        for ty in schema.types() {
            let (value, read) = Value::deserialize(&buf[offset..], *ty)?;
            values.push(value);
            offset += read;
        }
        Ok(Tuple {
            schema: schema.clone(),
            values,
            rid: None,
        })
    }
}
