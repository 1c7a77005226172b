use std::fmt;

use thiserror::Error;

use crate::{MAX_SEALED_COUNT, U28_MAX};

/// Which of the three reference tables a dangling reference pointed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceTable {
    Strings,
    Complexes,
    Traits,
}

impl fmt::Display for ReferenceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceTable::Strings => write!(f, "String"),
            ReferenceTable::Complexes => write!(f, "Complex value"),
            ReferenceTable::Traits => write!(f, "Trait"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Amf3DecodingError {
    #[error("Unknown type marker: {0}")]
    UnknownMarker(u8),

    #[error("Insufficient data")]
    TruncatedInput,

    #[error("Invalid UTF-8 string")]
    InvalidUtf8,

    #[error("{table} reference out of bounds: {index}")]
    ReferenceNotFound {
        table: ReferenceTable,
        index: usize,
    },

    #[error("Handling of externalizable object traits is not implemented")]
    ExternalizableTrait,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Amf3EncodingError {
    #[error("Value does not fit in 29 bits: {0}")]
    OutOfRangeU29(u32),

    #[error("String too long: {0} bytes (max {})", U28_MAX)]
    StringTooLong(usize),

    #[error("Array too long: {0} elements (max {})", U28_MAX)]
    ArrayTooLong(usize),

    #[error("Vector too long: {0} elements (max {})", U28_MAX)]
    VectorTooLong(usize),

    #[error("Dictionary too long: {0} entries (max {})", U28_MAX)]
    DictionaryTooLong(usize),

    #[error("Too many sealed members: {0} (max {})", MAX_SEALED_COUNT)]
    TooManySealedMembers(usize),

    #[error("Sealed member count {sealed_count} exceeds actual member count {actual_members}")]
    SealedCountTooLarge {
        sealed_count: usize,
        actual_members: usize,
    },
}
