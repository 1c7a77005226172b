use bytes::{BufMut, Bytes, BytesMut};

use crate::error::Amf3EncodingError;
use crate::*;

const I29_MAX: i32 = (1 << 28) - 1;
const I29_MIN: i32 = -(1 << 28);

/// Encode one AMF3 value into a fresh byte buffer.
pub fn encode_amf3_value(amf_value: &Amf3Value) -> Result<Bytes, Amf3EncodingError> {
    let mut encoder = Amf3EncoderState::new(BytesMut::new());
    encoder.put_value(amf_value)?;
    Ok(encoder.buf.freeze())
}

/// Encode a sequence of top-level AMF3 values back to back.
///
/// Each value is written with fresh reference tables, matching how the
/// decode side is chained over the remainder of its input.
pub fn encode_amf3_values(amf_values: &[Amf3Value]) -> Result<Bytes, Amf3EncodingError> {
    let mut buf = BytesMut::new();
    for amf_value in amf_values {
        buf.put_slice(&encode_amf3_value(amf_value)?);
    }
    Ok(buf.freeze())
}

pub(crate) struct Amf3EncoderState {
    pub(super) buf: BytesMut,
    strings: Vec<String>,
    traits: Vec<Trait>,
    complexes: Vec<Amf3Value>,
}

impl Amf3EncoderState {
    pub(crate) fn new(buf: BytesMut) -> Self {
        Self {
            buf,
            strings: vec![],
            traits: vec![],
            complexes: vec![],
        }
    }

    pub(crate) fn put_value(&mut self, amf_value: &Amf3Value) -> Result<(), Amf3EncodingError> {
        match amf_value {
            Amf3Value::Undefined => self.put_marker(UNDEFINED),
            Amf3Value::Null => self.put_marker(NULL),
            Amf3Value::Boolean(false) => self.put_marker(FALSE),
            Amf3Value::Boolean(true) => self.put_marker(TRUE),
            Amf3Value::Integer(i) => self.put_integer(*i)?,
            Amf3Value::Double(d) => self.put_double(*d),
            Amf3Value::String(s) => self.put_string(s)?,
            complex => self.put_complex(complex)?,
        }
        Ok(())
    }

    fn put_marker(&mut self, marker: u8) {
        self.buf.put_u8(marker);
    }

    fn put_integer(&mut self, i29: i32) -> Result<(), Amf3EncodingError> {
        if !(I29_MIN..=I29_MAX).contains(&i29) {
            // AMF3 demotes integers outside the 29-bit range to doubles
            // rather than failing.
            self.put_double(i29 as f64);
            return Ok(());
        }

        self.put_marker(INTEGER);
        if i29 >= 0 {
            self.put_u29(i29 as u32)
        } else {
            self.put_u29(((i29 as u32) & 0x0FFF_FFFF) | 0x1000_0000)
        }
    }

    fn put_double(&mut self, d: f64) {
        self.put_marker(DOUBLE);
        self.put_f64(d);
    }

    fn put_f64(&mut self, d: f64) {
        // Canonicalize NaN; infinities already carry the reserved patterns.
        let bits = if d.is_nan() { NAN_BITS } else { d.to_bits() };
        self.buf.put_u64(bits);
    }

    fn put_string(&mut self, s: &str) -> Result<(), Amf3EncodingError> {
        self.put_marker(STRING);
        self.put_string_raw(s)
    }

    fn put_string_raw(&mut self, s: &str) -> Result<(), Amf3EncodingError> {
        if s.is_empty() {
            // The empty string is always inline and never enters the table.
            return self.put_u29(0b1);
        }

        if let Some(index) = self.strings.iter().position(|seen| seen == s) {
            return self.put_u29((index as u32) << 1);
        }

        if s.len() > U28_MAX as usize {
            return Err(Amf3EncodingError::StringTooLong(s.len()));
        }
        self.put_u29(((s.len() as u32) << 1) | 0b1)?;
        self.buf.put_slice(s.as_bytes());
        self.strings.push(s.to_string());
        Ok(())
    }

    /// Writes a complex value: the marker, then either a back-reference into
    /// the complex-value table or the full by-value body.
    fn put_complex(&mut self, amf_value: &Amf3Value) -> Result<(), Amf3EncodingError> {
        let marker = match amf_value {
            Amf3Value::XmlDoc(_) => XML_DOC,
            Amf3Value::Date(_) => DATE,
            Amf3Value::Array { .. } => ARRAY,
            Amf3Value::Object { .. } => OBJECT,
            Amf3Value::Xml(_) => XML,
            Amf3Value::ByteArray(_) => BYTE_ARRAY,
            Amf3Value::VectorInt { .. } => VECTOR_INT,
            Amf3Value::VectorUInt { .. } => VECTOR_UINT,
            Amf3Value::VectorDouble { .. } => VECTOR_DOUBLE,
            Amf3Value::VectorObject { .. } => VECTOR_OBJECT,
            Amf3Value::Dictionary { .. } => DICTIONARY,
            _ => unreachable!("put_complex called with a scalar value"),
        };
        self.put_marker(marker);

        // Byte arrays are always written in full, but still take a table
        // slot so later indices agree with the reader's table.
        if !matches!(amf_value, Amf3Value::ByteArray(_)) {
            if let Some(index) = self.complexes.iter().position(|seen| seen == amf_value) {
                return self.put_u29((index as u32) << 1);
            }
        }
        // Recorded before the body is written so complex values nested
        // inside it get the following indices, mirroring the reader.
        self.complexes.push(amf_value.clone());

        match amf_value {
            Amf3Value::XmlDoc(x) | Amf3Value::Xml(x) => self.put_utf8_body(x),
            Amf3Value::Date(d) => self.put_date_body(*d),
            Amf3Value::Array { associative, dense } => self.put_array_body(associative, dense),
            Amf3Value::Object {
                class_name,
                dynamic,
                sealed_count,
                values,
            } => self.put_object_body(class_name.as_deref(), *dynamic, *sealed_count, values),
            Amf3Value::ByteArray(ba) => self.put_byte_array_body(ba),
            Amf3Value::VectorInt {
                fixed_length,
                values,
            } => self.put_vector_int_body(*fixed_length, values),
            Amf3Value::VectorUInt {
                fixed_length,
                values,
            } => self.put_vector_uint_body(*fixed_length, values),
            Amf3Value::VectorDouble {
                fixed_length,
                values,
            } => self.put_vector_double_body(*fixed_length, values),
            Amf3Value::VectorObject {
                fixed_length,
                class_name,
                values,
            } => self.put_vector_object_body(*fixed_length, class_name.as_deref(), values),
            Amf3Value::Dictionary {
                weak_references,
                entries,
            } => self.put_dictionary_body(*weak_references, entries),
            _ => unreachable!(),
        }
    }

    fn put_utf8_body(&mut self, s: &str) -> Result<(), Amf3EncodingError> {
        if s.len() > U28_MAX as usize {
            return Err(Amf3EncodingError::StringTooLong(s.len()));
        }
        self.put_u29(((s.len() as u32) << 1) | 0b1)?;
        self.buf.put_slice(s.as_bytes());
        Ok(())
    }

    fn put_date_body(&mut self, d: f64) -> Result<(), Amf3EncodingError> {
        // Only the value/reference bit of a date header is meaningful; the
        // remaining bits are left zero so the header fits in one byte.
        self.put_u29(0b1)?;
        self.put_f64(d);
        Ok(())
    }

    fn put_array_body(
        &mut self,
        associative: &[(String, Amf3Value)],
        dense: &[Amf3Value],
    ) -> Result<(), Amf3EncodingError> {
        if dense.len() > U28_MAX as usize {
            return Err(Amf3EncodingError::ArrayTooLong(dense.len()));
        }

        self.put_u29(((dense.len() as u32) << 1) | 0b1)?;
        for (key, value) in associative {
            self.put_string_raw(key)?;
            self.put_value(value)?;
        }
        self.buf.put_u8(0x01);
        for value in dense {
            self.put_value(value)?;
        }
        Ok(())
    }

    fn put_object_body(
        &mut self,
        class_name: Option<&str>,
        dynamic: bool,
        sealed_count: usize,
        values: &[(String, Amf3Value)],
    ) -> Result<(), Amf3EncodingError> {
        if sealed_count > values.len() {
            return Err(Amf3EncodingError::SealedCountTooLarge {
                sealed_count,
                actual_members: values.len(),
            });
        }
        if sealed_count > MAX_SEALED_COUNT {
            return Err(Amf3EncodingError::TooManySealedMembers(sealed_count));
        }

        // A trait with members beyond the sealed set is dynamic whether or
        // not it was flagged as such.
        let dynamic = dynamic || sealed_count < values.len();
        let (sealed, dynamic_members) = values.split_at(sealed_count);

        let amf_trait = Trait {
            class_name: class_name.map(str::to_string),
            dynamic,
            field_names: sealed.iter().map(|(key, _)| key.clone()).collect(),
        };

        match self.traits.iter().position(|seen| *seen == amf_trait) {
            Some(index) => {
                self.put_u29(((index as u32) << 2) | 0b01)?;
            }
            None => {
                let u29o = ((sealed_count as u32) << 4) | ((dynamic as u32) << 3) | 0b011;
                self.put_u29(u29o)?;
                self.put_string_raw(class_name.unwrap_or(""))?;
                for (key, _) in sealed {
                    self.put_string_raw(key)?;
                }
                self.traits.push(amf_trait);
            }
        }

        for (_, value) in sealed {
            self.put_value(value)?;
        }

        if dynamic {
            for (key, value) in dynamic_members {
                self.put_string_raw(key)?;
                self.put_value(value)?;
            }
            self.buf.put_u8(0x01);
        }

        Ok(())
    }

    fn put_byte_array_body(&mut self, ba: &Bytes) -> Result<(), Amf3EncodingError> {
        if ba.len() > U28_MAX as usize {
            return Err(Amf3EncodingError::ArrayTooLong(ba.len()));
        }

        self.put_u29(((ba.len() as u32) << 1) | 0b1)?;
        self.buf.put_slice(ba);
        Ok(())
    }

    fn put_vector_header(
        &mut self,
        item_count: usize,
        fixed_length: bool,
    ) -> Result<(), Amf3EncodingError> {
        if item_count > U28_MAX as usize {
            return Err(Amf3EncodingError::VectorTooLong(item_count));
        }

        self.put_u29(((item_count as u32) << 1) | 0b1)?;
        self.buf.put_u8(fixed_length.into());
        Ok(())
    }

    fn put_vector_int_body(
        &mut self,
        fixed_length: bool,
        values: &[i32],
    ) -> Result<(), Amf3EncodingError> {
        self.put_vector_header(values.len(), fixed_length)?;
        for item in values {
            self.buf.put_i32(*item);
        }
        Ok(())
    }

    fn put_vector_uint_body(
        &mut self,
        fixed_length: bool,
        values: &[u32],
    ) -> Result<(), Amf3EncodingError> {
        self.put_vector_header(values.len(), fixed_length)?;
        for item in values {
            self.buf.put_u32(*item);
        }
        Ok(())
    }

    fn put_vector_double_body(
        &mut self,
        fixed_length: bool,
        values: &[f64],
    ) -> Result<(), Amf3EncodingError> {
        self.put_vector_header(values.len(), fixed_length)?;
        for item in values {
            self.put_f64(*item);
        }
        Ok(())
    }

    fn put_vector_object_body(
        &mut self,
        fixed_length: bool,
        class_name: Option<&str>,
        values: &[Amf3Value],
    ) -> Result<(), Amf3EncodingError> {
        self.put_vector_header(values.len(), fixed_length)?;
        self.put_string_raw(class_name.unwrap_or("*"))?;
        for value in values {
            self.put_value(value)?;
        }
        Ok(())
    }

    fn put_dictionary_body(
        &mut self,
        weak_references: bool,
        entries: &[(Amf3Value, Amf3Value)],
    ) -> Result<(), Amf3EncodingError> {
        if entries.len() > U28_MAX as usize {
            return Err(Amf3EncodingError::DictionaryTooLong(entries.len()));
        }

        self.put_u29(((entries.len() as u32) << 1) | 0b1)?;
        self.buf.put_u8(weak_references.into());
        for (key, value) in entries {
            self.put_value(key)?;
            self.put_value(value)?;
        }
        Ok(())
    }

    // Shortest 1-4 byte representation; the fourth byte, when present,
    // contributes all eight bits.
    fn put_u29(&mut self, u29: u32) -> Result<(), Amf3EncodingError> {
        match u29 {
            0..=0x7F => self.buf.put_u8(u29 as u8),
            0x80..=0x3FFF => {
                self.buf.put_u8(0x80 | (u29 >> 7) as u8);
                self.buf.put_u8((u29 & 0x7F) as u8);
            }
            0x4000..=0x001F_FFFF => {
                self.buf.put_u8(0x80 | (u29 >> 14) as u8);
                self.buf.put_u8(0x80 | ((u29 >> 7) & 0x7F) as u8);
                self.buf.put_u8((u29 & 0x7F) as u8);
            }
            0x0020_0000..=0x1FFF_FFFF => {
                self.buf.put_u8(0x80 | (u29 >> 22) as u8);
                self.buf.put_u8(0x80 | ((u29 >> 15) & 0x7F) as u8);
                self.buf.put_u8(0x80 | ((u29 >> 8) & 0x7F) as u8);
                self.buf.put_u8((u29 & 0xFF) as u8);
            }
            _ => return Err(Amf3EncodingError::OutOfRangeU29(u29)),
        }
        Ok(())
    }
}
