use bytes::{Buf, Bytes};
use tracing::warn;

use crate::error::{Amf3DecodingError, ReferenceTable};
use crate::*;

/// Decode one AMF3 value from the front of `amf_bytes`.
///
/// Returns the value together with the unconsumed remainder of the input.
/// Callers decode a stream of concatenated values by feeding the remainder
/// back in; every call works with fresh reference tables.
pub fn decode_amf3_value(amf_bytes: Bytes) -> Result<(Amf3Value, Bytes), Amf3DecodingError> {
    let mut decoder = Amf3DecoderState::new(amf_bytes);
    let amf_value = decoder.decode_value()?;
    Ok((amf_value, decoder.buf))
}

/// Decode a whole buffer of concatenated AMF3 values.
///
/// `amf_bytes` must contain whole AMF3 values, e.g. the payload of an `rtmp`
/// Data or Command message.
pub fn decode_amf3_values(amf_bytes: Bytes) -> Result<Vec<Amf3Value>, Amf3DecodingError> {
    let mut amf_values = vec![];
    let mut remaining = amf_bytes;
    while remaining.has_remaining() {
        let (amf_value, rest) = decode_amf3_value(remaining)?;
        amf_values.push(amf_value);
        remaining = rest;
    }
    Ok(amf_values)
}

pub(crate) struct Amf3DecoderState {
    buf: Bytes,
    strings: Vec<String>,
    traits: Vec<Trait>,
    complexes: Vec<Amf3Value>,
}

impl Amf3DecoderState {
    pub(crate) fn new(amf_bytes: Bytes) -> Self {
        Self {
            buf: amf_bytes,
            strings: vec![],
            traits: vec![],
            complexes: vec![],
        }
    }

    pub(crate) fn decode_value(&mut self) -> Result<Amf3Value, Amf3DecodingError> {
        if !self.buf.has_remaining() {
            return Err(Amf3DecodingError::TruncatedInput);
        }

        let marker = self.buf.get_u8();

        match marker {
            UNDEFINED => Ok(Amf3Value::Undefined),
            NULL => Ok(Amf3Value::Null),
            FALSE => Ok(Amf3Value::Boolean(false)),
            TRUE => Ok(Amf3Value::Boolean(true)),
            INTEGER => Ok(Amf3Value::Integer(self.decode_i29()?)),
            DOUBLE => Ok(Amf3Value::Double(self.decode_f64()?)),
            STRING => Ok(Amf3Value::String(self.decode_string_raw()?)),
            XML_DOC => self.decode_xml_doc(),
            DATE => self.decode_date(),
            ARRAY => self.decode_array(),
            OBJECT => self.decode_object(),
            XML => self.decode_xml(),
            BYTE_ARRAY => self.decode_byte_array(),
            VECTOR_INT => self.decode_vector_int(),
            VECTOR_UINT => self.decode_vector_uint(),
            VECTOR_DOUBLE => self.decode_vector_double(),
            VECTOR_OBJECT => self.decode_vector_object(),
            DICTIONARY => self.decode_dictionary(),
            _ => Err(Amf3DecodingError::UnknownMarker(marker)),
        }
    }

    fn decode_xml_doc(&mut self) -> Result<Amf3Value, Amf3DecodingError> {
        let decode = |decoder: &mut Self, size: usize| {
            Ok(Amf3Value::XmlDoc(decoder.decode_utf8_body(size)?))
        };

        self.decode_complex(decode)
    }

    fn decode_date(&mut self) -> Result<Amf3Value, Amf3DecodingError> {
        let decode = |decoder: &mut Self, u28: usize| {
            // Only the value/reference bit of a date header is meaningful.
            if u28 != 0 {
                warn!("Non-zero bits in date header.");
            }
            Ok(Amf3Value::Date(decoder.decode_f64()?))
        };

        self.decode_complex(decode)
    }

    fn decode_array(&mut self) -> Result<Amf3Value, Amf3DecodingError> {
        let decode = |decoder: &mut Self, dense_count: usize| {
            let associative = decoder.decode_pairs()?;
            let dense = (0..dense_count)
                .map(|_| decoder.decode_value())
                .collect::<Result<_, _>>()?;

            Ok(Amf3Value::Array { associative, dense })
        };

        self.decode_complex(decode)
    }

    fn decode_object(&mut self) -> Result<Amf3Value, Amf3DecodingError> {
        let decode = |decoder: &mut Self, u28: usize| {
            let Trait {
                class_name,
                dynamic,
                field_names,
            } = decoder.decode_object_trait(u28)?;

            let sealed_count = field_names.len();
            let mut values: Vec<(String, Amf3Value)> = field_names
                .into_iter()
                .map(|key| Ok((key, decoder.decode_value()?)))
                .collect::<Result<_, _>>()?;

            if dynamic {
                values.extend(decoder.decode_pairs()?);
            }

            Ok(Amf3Value::Object {
                class_name,
                dynamic,
                sealed_count,
                values,
            })
        };

        self.decode_complex(decode)
    }

    fn decode_xml(&mut self) -> Result<Amf3Value, Amf3DecodingError> {
        let decode =
            |decoder: &mut Self, size: usize| Ok(Amf3Value::Xml(decoder.decode_utf8_body(size)?));

        self.decode_complex(decode)
    }

    fn decode_byte_array(&mut self) -> Result<Amf3Value, Amf3DecodingError> {
        let decode = |decoder: &mut Self, size: usize| {
            if decoder.buf.remaining() < size {
                return Err(Amf3DecodingError::TruncatedInput);
            }

            Ok(Amf3Value::ByteArray(decoder.buf.copy_to_bytes(size)))
        };

        self.decode_complex(decode)
    }

    fn decode_vector_int(&mut self) -> Result<Amf3Value, Amf3DecodingError> {
        let decode = |decoder: &mut Self, item_count: usize| {
            let fixed_length = decoder.decode_vector_flag(item_count, 4)?;
            let values = (0..item_count).map(|_| decoder.buf.get_i32()).collect();

            Ok(Amf3Value::VectorInt {
                fixed_length,
                values,
            })
        };

        self.decode_complex(decode)
    }

    fn decode_vector_uint(&mut self) -> Result<Amf3Value, Amf3DecodingError> {
        let decode = |decoder: &mut Self, item_count: usize| {
            let fixed_length = decoder.decode_vector_flag(item_count, 4)?;
            let values = (0..item_count).map(|_| decoder.buf.get_u32()).collect();

            Ok(Amf3Value::VectorUInt {
                fixed_length,
                values,
            })
        };

        self.decode_complex(decode)
    }

    fn decode_vector_double(&mut self) -> Result<Amf3Value, Amf3DecodingError> {
        let decode = |decoder: &mut Self, item_count: usize| {
            let fixed_length = decoder.decode_vector_flag(item_count, 8)?;
            let values = (0..item_count).map(|_| decoder.buf.get_f64()).collect();

            Ok(Amf3Value::VectorDouble {
                fixed_length,
                values,
            })
        };

        self.decode_complex(decode)
    }

    fn decode_vector_object(&mut self) -> Result<Amf3Value, Amf3DecodingError> {
        let decode = |decoder: &mut Self, item_count: usize| {
            let fixed_length = decoder.decode_vector_flag(0, 0)?;

            // "*" on the wire stands for an untyped vector.
            let class_name = decoder.decode_string_raw()?;
            let class_name = (class_name != "*").then_some(class_name);

            let values = (0..item_count)
                .map(|_| decoder.decode_value())
                .collect::<Result<_, _>>()?;

            Ok(Amf3Value::VectorObject {
                fixed_length,
                class_name,
                values,
            })
        };

        self.decode_complex(decode)
    }

    fn decode_dictionary(&mut self) -> Result<Amf3Value, Amf3DecodingError> {
        let decode = |decoder: &mut Self, entry_count: usize| {
            if !decoder.buf.has_remaining() {
                return Err(Amf3DecodingError::TruncatedInput);
            }
            let weak_references = decoder.buf.get_u8() == 0x01;

            let entries = (0..entry_count)
                .map(|_| {
                    let key = decoder.decode_value()?;
                    let value = decoder.decode_value()?;
                    Ok((key, value))
                })
                .collect::<Result<_, _>>()?;

            Ok(Amf3Value::Dictionary {
                weak_references,
                entries,
            })
        };

        self.decode_complex(decode)
    }

    /// Reads the flag byte shared by the vector types, after checking that
    /// the fixed-width items declared in the header actually fit in the
    /// remaining input.
    fn decode_vector_flag(
        &mut self,
        item_count: usize,
        item_size: usize,
    ) -> Result<bool, Amf3DecodingError> {
        if self.buf.remaining() < item_count * item_size + 1 {
            return Err(Amf3DecodingError::TruncatedInput);
        }
        Ok(self.buf.get_u8() == 0x01)
    }

    /// Shared ref-header handling for every complex type: either resolve a
    /// back-reference into the complex-value table, or let `decode` parse a
    /// body from the header's payload bits.
    fn decode_complex<F>(&mut self, decode: F) -> Result<Amf3Value, Amf3DecodingError>
    where
        F: FnOnce(&mut Self, usize) -> Result<Amf3Value, Amf3DecodingError>,
    {
        let u29 = self.decode_u29()?;
        if u29 & 0b1 == 0 {
            let index = (u29 >> 1) as usize;
            return self.complexes.get(index).cloned().ok_or(
                Amf3DecodingError::ReferenceNotFound {
                    table: ReferenceTable::Complexes,
                    index,
                },
            );
        }

        // Reserve the slot before the body is parsed so complex values
        // nested inside it land on the same indices the writer assigned.
        let slot = self.complexes.len();
        self.complexes.push(Amf3Value::Null);

        let amf_value = decode(self, (u29 >> 1) as usize)?;
        self.complexes[slot] = amf_value.clone();
        Ok(amf_value)
    }

    // Unsigned 29-bit integer, 1-4 bytes. The high bit of the first three
    // bytes is a continuation flag; a fourth byte contributes all eight bits.
    fn decode_u29(&mut self) -> Result<u32, Amf3DecodingError> {
        let mut result: u32 = 0;

        for _ in 0..3 {
            if !self.buf.has_remaining() {
                return Err(Amf3DecodingError::TruncatedInput);
            }
            let byte = self.buf.get_u8();
            result = (result << 7) | (byte & 0x7F) as u32;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }

        if !self.buf.has_remaining() {
            return Err(Amf3DecodingError::TruncatedInput);
        }
        Ok((result << 8) | self.buf.get_u8() as u32)
    }

    fn decode_i29(&mut self) -> Result<i32, Amf3DecodingError> {
        let u29 = self.decode_u29()?;
        if u29 & (1 << 28) != 0 {
            Ok((u29 as i32) - (1 << 29))
        } else {
            Ok(u29 as i32)
        }
    }

    fn decode_f64(&mut self) -> Result<f64, Amf3DecodingError> {
        if self.buf.remaining() < 8 {
            return Err(Amf3DecodingError::TruncatedInput);
        }
        // The reserved infinity and NaN patterns fall out of `from_bits`.
        Ok(f64::from_bits(self.buf.get_u64()))
    }

    fn decode_utf8_body(&mut self, size: usize) -> Result<String, Amf3DecodingError> {
        if self.buf.remaining() < size {
            return Err(Amf3DecodingError::TruncatedInput);
        }
        let utf8 = self.buf.copy_to_bytes(size);
        String::from_utf8(utf8.to_vec()).map_err(|_| Amf3DecodingError::InvalidUtf8)
    }

    fn decode_string_raw(&mut self) -> Result<String, Amf3DecodingError> {
        let u29 = self.decode_u29()?;
        if u29 & 0b1 == 0 {
            let index = (u29 >> 1) as usize;
            return self.strings.get(index).cloned().ok_or(
                Amf3DecodingError::ReferenceNotFound {
                    table: ReferenceTable::Strings,
                    index,
                },
            );
        }

        let size = (u29 >> 1) as usize;
        if size == 0 {
            // The empty string is always inline and never enters the table.
            return Ok(String::new());
        }

        let string = self.decode_utf8_body(size)?;
        self.strings.push(string.clone());
        Ok(string)
    }

    fn decode_pairs(&mut self) -> Result<Vec<(String, Amf3Value)>, Amf3DecodingError> {
        let mut pairs = vec![];
        loop {
            let key = self.decode_string_raw()?;
            if key.is_empty() {
                return Ok(pairs);
            }

            let value = self.decode_value()?;
            pairs.push((key, value));
        }
    }

    fn decode_object_trait(&mut self, u28: usize) -> Result<Trait, Amf3DecodingError> {
        // Low bits of the header (the value/reference bit is already gone):
        // trait value/reference, externalizable, dynamic, then the sealed
        // member count.
        if u28 & 0b1 == 0 {
            let index = u28 >> 1;
            return self.traits.get(index).cloned().ok_or(
                Amf3DecodingError::ReferenceNotFound {
                    table: ReferenceTable::Traits,
                    index,
                },
            );
        }

        if (u28 >> 1) & 0b1 == 1 {
            // Externalizable bodies use class-specific layouts this codec
            // cannot know about.
            return Err(Amf3DecodingError::ExternalizableTrait);
        }

        let dynamic = (u28 >> 2) & 0b1 == 1;
        let sealed_members = u28 >> 3;

        let class_name = self.decode_string_raw()?;
        let class_name = (!class_name.is_empty()).then_some(class_name);

        let field_names = (0..sealed_members)
            .map(|_| self.decode_string_raw())
            .collect::<Result<_, _>>()?;

        let amf_trait = Trait {
            class_name,
            dynamic,
            field_names,
        };

        self.traits.push(amf_trait.clone());
        Ok(amf_trait)
    }
}
