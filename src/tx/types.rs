//! Core transaction types: TxId and LockMode.

use std::fmt;

/// Transaction ID (64-bit).
///
/// TxIds are allocated sequentially starting from 1 by the transaction
/// layer. TxId 0 is reserved as INVALID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxId(u64);

impl TxId {
    /// Invalid transaction ID (0).
    pub const INVALID: Self = Self(0);

    /// Create a new transaction ID.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw u64 value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Check if this is an invalid transaction ID.
    pub const fn is_invalid(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strength of a page lock request.
///
/// `Shared` admits any number of concurrent readers; `Exclusive` admits a
/// single writer and excludes all readers. A transaction holding `Shared`
/// as the sole holder may upgrade to `Exclusive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Read lock, shared among transactions.
    Shared,
    /// Write lock, held by one transaction at a time.
    Exclusive,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Shared => write!(f, "shared"),
            LockMode::Exclusive => write!(f, "exclusive"),
        }
    }
}
