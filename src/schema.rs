//! Record schema descriptors.
//!
//! A [`Schema`] is the ordered list of field types for one table. Because
//! every [`Type`](crate::datum::Type) has a fixed storage width, a schema
//! fully determines the byte width of its records, and with it the slot
//! layout of every heap page that stores them. Schemas are supplied by the
//! caller and never mutated by storage code.

use std::fmt;

use crate::datum::Type;

/// Errors from schema construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A schema must describe at least one field.
    NoFields,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::NoFields => write!(f, "schema must have at least one field"),
        }
    }
}

impl std::error::Error for SchemaError {}

/// An ordered, immutable sequence of field types.
///
/// Two schemas are equal iff their field types are equal in order, which is
/// the comparison used to reject cross-schema record updates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Schema {
    fields: Vec<Type>,
}

impl Schema {
    /// Creates a schema from an ordered field type list.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::NoFields` if the list is empty: a record with
    /// zero fields has zero width and cannot be slotted.
    pub fn new(fields: Vec<Type>) -> Result<Self, SchemaError> {
        if fields.is_empty() {
            return Err(SchemaError::NoFields);
        }
        Ok(Self { fields })
    }

    /// Returns the number of fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Returns the type of field `i`, or `None` if out of range.
    pub fn field_type(&self, i: usize) -> Option<Type> {
        self.fields.get(i).copied()
    }

    /// Returns the field types in order.
    pub fn types(&self) -> &[Type] {
        &self.fields
    }

    /// Returns the fixed byte width of one record under this schema.
    ///
    /// Always at least 1, since a schema has at least one field and every
    /// type is at least one byte wide.
    pub fn record_width(&self) -> usize {
        self.fields.iter().map(|ty| ty.width()).sum()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, ty) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", ty)?;
        }
        write!(f, ")")
    }
}
