//! Codec for AMF3 (Action Message Format 3) encoded data.
//!
//! Each top-level value is decoded from (or encoded into) a byte sequence
//! with its own string, complex-value and trait reference tables, so calls
//! are fully independent. [`decode_amf3_value`] returns the unconsumed tail
//! of its input, which callers feed back in to walk a stream of
//! concatenated values.

use bytes::Bytes;

pub mod error;

mod decoding;
mod encoding;

#[cfg(test)]
mod amf3_tests;

pub use decoding::{decode_amf3_value, decode_amf3_values};
pub use encoding::{encode_amf3_value, encode_amf3_values};

const UNDEFINED: u8 = 0x00;
const NULL: u8 = 0x01;
const FALSE: u8 = 0x02;
const TRUE: u8 = 0x03;
const INTEGER: u8 = 0x04;
const DOUBLE: u8 = 0x05;
const STRING: u8 = 0x06;
const XML_DOC: u8 = 0x07;
const DATE: u8 = 0x08;
const ARRAY: u8 = 0x09;
const OBJECT: u8 = 0x0A;
const XML: u8 = 0x0B;
const BYTE_ARRAY: u8 = 0x0C;
const VECTOR_INT: u8 = 0x0D;
const VECTOR_UINT: u8 = 0x0E;
const VECTOR_DOUBLE: u8 = 0x0F;
const VECTOR_OBJECT: u8 = 0x10;
const DICTIONARY: u8 = 0x11;

/// Largest length or index that fits next to the value/reference bit of a
/// U29 header.
pub(crate) const U28_MAX: u32 = (1 << 28) - 1;

/// Sealed member counts share the object header with four flag bits.
pub(crate) const MAX_SEALED_COUNT: usize = (1 << 25) - 1;

/// Canonical wire pattern for NaN. Infinities already map onto the two
/// reserved patterns through `f64::to_bits`.
pub(crate) const NAN_BITS: u64 = 0xFFF8_0000_0000_0000;

#[derive(Debug, Clone, PartialEq)]
pub enum Amf3Value {
    Undefined,
    Null,
    Boolean(bool),
    Integer(i32),
    Double(f64),
    String(String),
    XmlDoc(String),
    Date(f64),
    Array {
        /// Named entries in encounter order.
        associative: Vec<(String, Amf3Value)>,
        /// Positional entries; their count is carried in the type header.
        dense: Vec<Amf3Value>,
    },
    Object {
        class_name: Option<String>,
        /// Whether the trait accepts members beyond the sealed set. Kept
        /// explicitly so a dynamic object with no dynamic members survives a
        /// round trip.
        dynamic: bool,
        /// The first `sealed_count` entries of `values` are the sealed
        /// members, in trait declaration order.
        sealed_count: usize,
        values: Vec<(String, Amf3Value)>,
    },
    Xml(String),
    ByteArray(Bytes),
    VectorInt {
        fixed_length: bool,
        values: Vec<i32>,
    },
    VectorUInt {
        fixed_length: bool,
        values: Vec<u32>,
    },
    VectorDouble {
        fixed_length: bool,
        values: Vec<f64>,
    },
    VectorObject {
        fixed_length: bool,
        class_name: Option<String>,
        values: Vec<Amf3Value>,
    },
    Dictionary {
        weak_references: bool,
        entries: Vec<(Amf3Value, Amf3Value)>,
    },
}

/// Object metadata shared by every instance of a class: its name, whether
/// instances take dynamic members, and the ordered sealed member names.
/// These are the entries of the trait reference table.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Trait {
    pub(crate) class_name: Option<String>,
    pub(crate) dynamic: bool,
    pub(crate) field_names: Vec<String>,
}
