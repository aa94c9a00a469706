//! Storage data types and values.
//!
//! This module defines the type system and value representation for the
//! heap storage layer. [`Type`] names a field type together with its fixed
//! storage width, and [`Value`] represents a single typed field value with
//! big-endian serialization support.
//!
//! Every type occupies a fixed number of bytes on disk, so a record's byte
//! width is fully determined by its schema. Variable-length strings are
//! stored as [`Type::Varchar`] with a declared capacity: a 4-byte length
//! prefix followed by the payload, zero-padded out to the capacity.

use std::fmt;

/// Errors from field serialization/deserialization.
#[derive(Debug)]
pub enum SerializationError {
    /// Buffer too small for the operation.
    BufferTooSmall {
        /// Bytes required.
        required: usize,
        /// Bytes available.
        available: usize,
    },
    /// Invalid data format.
    InvalidFormat(String),
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializationError::BufferTooSmall {
                required,
                available,
            } => {
                write!(
                    f,
                    "buffer too small: need {} bytes, have {}",
                    required, available
                )
            }
            SerializationError::InvalidFormat(msg) => {
                write!(f, "invalid format: {}", msg)
            }
        }
    }
}

impl std::error::Error for SerializationError {}

/// Returns `SerializationError::BufferTooSmall` if the buffer is too small.
#[macro_export]
macro_rules! ensure_buf_len {
    ($buf:expr, $required:expr) => {
        if $buf.len() < $required {
            return Err($crate::datum::SerializationError::BufferTooSmall {
                required: $required,
                available: $buf.len(),
            });
        }
    };
}

/// Field type identifier.
///
/// Each variant has a fixed storage width given by [`width()`](Type::width),
/// so a schema fully determines the byte layout of its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// Boolean type.
    Bool,
    /// 2-byte integer.
    Int2,
    /// 4-byte integer.
    Int4,
    /// 8-byte integer.
    Int8,
    /// Single-precision floating-point.
    Float4,
    /// Double-precision floating-point.
    Float8,
    /// String with a fixed byte capacity.
    Varchar(u16),
}

impl Type {
    /// Returns the storage width in bytes.
    ///
    /// For `Varchar(n)` this is `4 + n`: a 4-byte length prefix plus the
    /// declared capacity.
    pub const fn width(self) -> usize {
        match self {
            Type::Bool => 1,
            Type::Int2 => 2,
            Type::Int4 => 4,
            Type::Int8 => 8,
            Type::Float4 => 4,
            Type::Float8 => 8,
            Type::Varchar(n) => 4 + n as usize,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "boolean"),
            Type::Int2 => write!(f, "smallint"),
            Type::Int4 => write!(f, "integer"),
            Type::Int8 => write!(f, "bigint"),
            Type::Float4 => write!(f, "real"),
            Type::Float8 => write!(f, "double precision"),
            Type::Varchar(n) => write!(f, "character varying({})", n),
        }
    }
}

/// A typed field value.
///
/// Represents a single field of a record. [`Text`](Value::Text) is the value
/// form of `Varchar(n)` columns; whether a given string fits a given column
/// is a property of the pair, checked by [`matches()`](Value::matches).
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum Value {
    /// Boolean (true/false).
    Boolean(bool),
    /// 16-bit signed integer (SMALLINT).
    Int16(i16),
    /// 32-bit signed integer (INTEGER).
    Int32(i32),
    /// 64-bit signed integer (BIGINT).
    Int64(i64),
    /// 32-bit floating point (REAL).
    Float32(f32),
    /// 64-bit floating point (DOUBLE PRECISION).
    Float64(f64),
    /// String payload for a varchar column.
    Text(String),
}

impl Value {
    /// Returns true if this value can be stored in a field of type `ty`.
    ///
    /// A `Text` value fits a `Varchar(n)` column only if its UTF-8 byte
    /// length does not exceed `n`.
    pub fn matches(&self, ty: Type) -> bool {
        match (self, ty) {
            (Value::Boolean(_), Type::Bool) => true,
            (Value::Int16(_), Type::Int2) => true,
            (Value::Int32(_), Type::Int4) => true,
            (Value::Int64(_), Type::Int8) => true,
            (Value::Float32(_), Type::Float4) => true,
            (Value::Float64(_), Type::Float8) => true,
            (Value::Text(s), Type::Varchar(n)) => s.len() <= n as usize,
            _ => false,
        }
    }

    /// Serializes this value as a field of type `ty`, big-endian.
    ///
    /// Writes exactly [`ty.width()`](Type::width) bytes and returns that
    /// count. Varchar payloads shorter than the capacity are zero-padded.
    ///
    /// # Errors
    ///
    /// Returns `SerializationError::BufferTooSmall` if the buffer is too
    /// small, or `SerializationError::InvalidFormat` if the value does not
    /// match `ty`.
    pub fn serialize(&self, ty: Type, buf: &mut [u8]) -> Result<usize, SerializationError> {
        if !self.matches(ty) {
            return Err(SerializationError::InvalidFormat(format!(
                "value {:?} does not encode as {}",
                self, ty
            )));
        }
        let width = ty.width();
        ensure_buf_len!(buf, width);
        match self {
            Value::Boolean(b) => buf[0] = u8::from(*b),
            Value::Int16(n) => buf[0..2].copy_from_slice(&n.to_be_bytes()),
            Value::Int32(n) => buf[0..4].copy_from_slice(&n.to_be_bytes()),
            Value::Int64(n) => buf[0..8].copy_from_slice(&n.to_be_bytes()),
            Value::Float32(n) => buf[0..4].copy_from_slice(&n.to_be_bytes()),
            Value::Float64(n) => buf[0..8].copy_from_slice(&n.to_be_bytes()),
            Value::Text(s) => {
                let data = s.as_bytes();
                buf[0..4].copy_from_slice(&(data.len() as u32).to_be_bytes());
                buf[4..4 + data.len()].copy_from_slice(data);
                buf[4 + data.len()..width].fill(0);
            }
        }
        Ok(width)
    }

    /// Deserializes a field of type `ty` from a buffer, big-endian.
    ///
    /// Consumes exactly [`ty.width()`](Type::width) bytes (including varchar
    /// padding) and returns the value together with that count.
    ///
    /// # Errors
    ///
    /// Returns `SerializationError::BufferTooSmall` if the buffer is too
    /// small. Returns `SerializationError::InvalidFormat` for malformed
    /// data: a boolean byte other than 0 or 1, a varchar length prefix
    /// exceeding the capacity, or a non-UTF-8 varchar payload.
    pub fn deserialize(buf: &[u8], ty: Type) -> Result<(Self, usize), SerializationError> {
        let width = ty.width();
        ensure_buf_len!(buf, width);
        let value = match ty {
            Type::Bool => match buf[0] {
                0 => Value::Boolean(false),
                1 => Value::Boolean(true),
                b => {
                    return Err(SerializationError::InvalidFormat(format!(
                        "invalid boolean byte 0x{:02x}",
                        b
                    )))
                }
            },
            Type::Int2 => Value::Int16(i16::from_be_bytes([buf[0], buf[1]])),
            Type::Int4 => Value::Int32(i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])),
            Type::Int8 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&buf[0..8]);
                Value::Int64(i64::from_be_bytes(raw))
            }
            Type::Float4 => Value::Float32(f32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])),
            Type::Float8 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&buf[0..8]);
                Value::Float64(f64::from_be_bytes(raw))
            }
            Type::Varchar(n) => {
                let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
                if len > n as usize {
                    return Err(SerializationError::InvalidFormat(format!(
                        "varchar length {} exceeds capacity {}",
                        len, n
                    )));
                }
                let s = String::from_utf8(buf[4..4 + len].to_vec())
                    .map_err(|e| SerializationError::InvalidFormat(e.to_string()))?;
                Value::Text(s)
            }
        };
        Ok((value, width))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int16(n) => write!(f, "{}", n),
            Value::Int32(n) => write!(f, "{}", n),
            Value::Int64(n) => write!(f, "{}", n),
            Value::Float32(n) => write!(f, "{}", n),
            Value::Float64(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}
