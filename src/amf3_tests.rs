use bytes::Bytes;

use crate::error::{Amf3DecodingError, ReferenceTable};
use crate::*;

fn round_trip(amf_value: &Amf3Value) -> Amf3Value {
    let encoded = encode_amf3_value(amf_value).unwrap();
    let (decoded, rest) = decode_amf3_value(encoded).unwrap();
    assert!(rest.is_empty());
    decoded
}

#[test]
fn test_scalars() {
    assert_eq!(
        encode_amf3_value(&Amf3Value::Undefined).unwrap(),
        Bytes::from_iter([UNDEFINED])
    );
    assert_eq!(
        encode_amf3_value(&Amf3Value::Null).unwrap(),
        Bytes::from_iter([NULL])
    );
    assert_eq!(
        encode_amf3_value(&Amf3Value::Boolean(false)).unwrap(),
        Bytes::from_iter([FALSE])
    );
    assert_eq!(
        encode_amf3_value(&Amf3Value::Boolean(true)).unwrap(),
        Bytes::from_iter([TRUE])
    );

    for amf_value in [
        Amf3Value::Undefined,
        Amf3Value::Null,
        Amf3Value::Boolean(false),
        Amf3Value::Boolean(true),
    ] {
        assert_eq!(round_trip(&amf_value), amf_value);
    }
}

#[test]
fn test_string() {
    assert_eq!(
        encode_amf3_value(&Amf3Value::String("foo".to_string())).unwrap(),
        Bytes::from_iter([STRING, 0x07, b'f', b'o', b'o'])
    );

    let sample = Amf3Value::String("naïve jalapeño".to_string());
    assert_eq!(round_trip(&sample), sample);

    let empty = Amf3Value::String(String::new());
    assert_eq!(
        encode_amf3_value(&empty).unwrap(),
        Bytes::from_iter([STRING, 0x01])
    );
    assert_eq!(round_trip(&empty), empty);
}

#[test]
fn test_integer_boundaries() {
    for int in [0, 1, -1, (1 << 28) - 1, -(1 << 28)] {
        let amf_value = Amf3Value::Integer(int);
        assert_eq!(round_trip(&amf_value), amf_value);
    }
}

#[test]
fn test_integer_out_of_range_decodes_as_double() {
    assert_eq!(
        round_trip(&Amf3Value::Integer(1 << 28)),
        Amf3Value::Double((1u32 << 28) as f64)
    );
    assert_eq!(
        round_trip(&Amf3Value::Integer(i32::MIN)),
        Amf3Value::Double(i32::MIN as f64)
    );
}

#[test]
fn test_double() {
    let sample = Amf3Value::Double(1234.5678);
    assert_eq!(round_trip(&sample), sample);
}

#[test]
fn test_double_sentinels() {
    let mut expected = vec![DOUBLE, 0x7F, 0xF0];
    expected.extend_from_slice(&[0x00; 6]);
    assert_eq!(
        encode_amf3_value(&Amf3Value::Double(f64::INFINITY)).unwrap(),
        Bytes::from(expected)
    );

    let mut expected = vec![DOUBLE, 0xFF, 0xF0];
    expected.extend_from_slice(&[0x00; 6]);
    assert_eq!(
        encode_amf3_value(&Amf3Value::Double(f64::NEG_INFINITY)).unwrap(),
        Bytes::from(expected)
    );

    let mut expected = vec![DOUBLE, 0xFF, 0xF8];
    expected.extend_from_slice(&[0x00; 6]);
    assert_eq!(
        encode_amf3_value(&Amf3Value::Double(f64::NAN)).unwrap(),
        Bytes::from(expected)
    );

    assert_eq!(
        round_trip(&Amf3Value::Double(f64::INFINITY)),
        Amf3Value::Double(f64::INFINITY)
    );
    assert_eq!(
        round_trip(&Amf3Value::Double(f64::NEG_INFINITY)),
        Amf3Value::Double(f64::NEG_INFINITY)
    );
    match round_trip(&Amf3Value::Double(f64::NAN)) {
        Amf3Value::Double(d) => assert!(d.is_nan()),
        other => panic!("expected a double, got {other:?}"),
    }
}

#[test]
fn test_date() {
    let sample = Amf3Value::Date(1_700_000_000_000.0);
    let mut expected = vec![DATE, 0x01];
    expected.extend_from_slice(&1_700_000_000_000.0_f64.to_be_bytes());
    assert_eq!(encode_amf3_value(&sample).unwrap(), Bytes::from(expected));
    assert_eq!(round_trip(&sample), sample);
}

#[test]
fn test_xml_and_xml_doc() {
    let xml = Amf3Value::Xml("<a b=\"c\"/>".to_string());
    let xml_doc = Amf3Value::XmlDoc("<?xml version=\"1.0\"?><a/>".to_string());

    assert_eq!(encode_amf3_value(&xml).unwrap()[0], XML);
    assert_eq!(encode_amf3_value(&xml_doc).unwrap()[0], XML_DOC);

    assert_eq!(round_trip(&xml), xml);
    assert_eq!(round_trip(&xml_doc), xml_doc);
}

#[test]
fn test_array_shape() {
    // Associative part {a: 1}, dense part [10, 20].
    let wire = Bytes::from_iter([
        ARRAY, 0x05, 0x03, b'a', INTEGER, 0x01, 0x01, INTEGER, 0x0A, INTEGER, 0x14,
    ]);
    let expected = Amf3Value::Array {
        associative: vec![("a".to_string(), Amf3Value::Integer(1))],
        dense: vec![Amf3Value::Integer(10), Amf3Value::Integer(20)],
    };

    let (decoded, rest) = decode_amf3_value(wire.clone()).unwrap();
    assert!(rest.is_empty());
    assert_eq!(decoded, expected);
    assert_eq!(encode_amf3_value(&expected).unwrap(), wire);
}

#[test]
fn test_empty_array() {
    let empty = Amf3Value::Array {
        associative: vec![],
        dense: vec![],
    };
    assert_eq!(
        encode_amf3_value(&empty).unwrap(),
        Bytes::from_iter([ARRAY, 0x01, 0x01])
    );
    assert_eq!(round_trip(&empty), empty);
}

#[test]
fn test_string_reference_dedup() {
    let sample = Amf3Value::Array {
        associative: vec![],
        dense: vec![
            Amf3Value::String("spam".to_string()),
            Amf3Value::String("spam".to_string()),
            Amf3Value::String(String::new()),
        ],
    };

    // The second occurrence is a 2-byte reference; the empty string stays
    // inline and never enters the table.
    let expected = Bytes::from_iter([
        ARRAY, 0x07, 0x01, STRING, 0x09, b's', b'p', b'a', b'm', STRING, 0x00, STRING, 0x01,
    ]);
    assert_eq!(encode_amf3_value(&sample).unwrap(), expected);
    assert_eq!(round_trip(&sample), sample);
}

#[test]
fn test_string_table_spans_names_and_values() {
    // The class name, a member name and a member value all share one table
    // entry.
    let sample = Amf3Value::Object {
        class_name: Some("id".to_string()),
        dynamic: true,
        sealed_count: 0,
        values: vec![("id".to_string(), Amf3Value::String("id".to_string()))],
    };

    let expected = Bytes::from_iter([
        OBJECT, 0x0B, 0x05, b'i', b'd', 0x00, STRING, 0x00, 0x01,
    ]);
    assert_eq!(encode_amf3_value(&sample).unwrap(), expected);
    assert_eq!(round_trip(&sample), sample);
}

#[test]
fn test_object_round_trip() {
    let sealed_and_dynamic = Amf3Value::Object {
        class_name: Some("Player".to_string()),
        dynamic: true,
        sealed_count: 2,
        values: vec![
            (
                "name".to_string(),
                Amf3Value::String("kremówki".to_string()),
            ),
            ("score".to_string(), Amf3Value::Integer(2137)),
            ("extra".to_string(), Amf3Value::Double(0.5)),
        ],
    };
    assert_eq!(round_trip(&sealed_and_dynamic), sealed_and_dynamic);

    let anonymous_sealed = Amf3Value::Object {
        class_name: None,
        dynamic: false,
        sealed_count: 1,
        values: vec![("x".to_string(), Amf3Value::Null)],
    };
    assert_eq!(round_trip(&anonymous_sealed), anonymous_sealed);
}

#[test]
fn test_dynamic_flag_survives_without_dynamic_members() {
    let sample = Amf3Value::Object {
        class_name: Some("Bag".to_string()),
        dynamic: true,
        sealed_count: 1,
        values: vec![("x".to_string(), Amf3Value::Integer(1))],
    };
    assert_eq!(round_trip(&sample), sample);
}

#[test]
fn test_trait_reference_on_repeated_class() {
    let point = |x: i32, y: i32| Amf3Value::Object {
        class_name: Some("Point".to_string()),
        dynamic: false,
        sealed_count: 2,
        values: vec![
            ("x".to_string(), Amf3Value::Integer(x)),
            ("y".to_string(), Amf3Value::Integer(y)),
        ],
    };
    let sample = Amf3Value::Array {
        associative: vec![],
        dense: vec![point(1, 2), point(3, 4)],
    };

    // The second object writes a 1-byte trait reference instead of the
    // class name and member names.
    let expected = Bytes::from_iter([
        ARRAY, 0x05, 0x01, //
        OBJECT, 0x23, 0x0B, b'P', b'o', b'i', b'n', b't', 0x03, b'x', 0x03, b'y', INTEGER, 0x01,
        INTEGER, 0x02, //
        OBJECT, 0x01, INTEGER, 0x03, INTEGER, 0x04,
    ]);
    assert_eq!(encode_amf3_value(&sample).unwrap(), expected);
    assert_eq!(round_trip(&sample), sample);
}

#[test]
fn test_repeated_complex_value_becomes_reference() {
    let object = Amf3Value::Object {
        class_name: None,
        dynamic: true,
        sealed_count: 0,
        values: vec![("a".to_string(), Amf3Value::Integer(1))],
    };
    let sample = Amf3Value::Array {
        associative: vec![],
        dense: vec![object.clone(), object],
    };

    let expected = Bytes::from_iter([
        ARRAY, 0x05, 0x01, //
        OBJECT, 0x0B, 0x01, 0x03, b'a', INTEGER, 0x01, 0x01, //
        OBJECT, 0x02,
    ]);
    assert_eq!(encode_amf3_value(&sample).unwrap(), expected);
    assert_eq!(round_trip(&sample), sample);
}

#[test]
fn test_nested_array_reference_indices() {
    let inner = Amf3Value::Array {
        associative: vec![],
        dense: vec![Amf3Value::Integer(1)],
    };
    let sample = Amf3Value::Array {
        associative: vec![],
        dense: vec![inner.clone(), inner],
    };

    // The outer array takes slot 0, the first inner array slot 1; the
    // second inner array resolves to slot 1.
    let expected = Bytes::from_iter([
        ARRAY, 0x05, 0x01, ARRAY, 0x03, 0x01, INTEGER, 0x01, ARRAY, 0x02,
    ]);
    assert_eq!(encode_amf3_value(&sample).unwrap(), expected);
    assert_eq!(round_trip(&sample), sample);
}

#[test]
fn test_byte_array_written_in_full_but_keeps_its_slot() {
    let byte_array = Amf3Value::ByteArray(Bytes::from_iter([1, 2, 3]));
    let inner = Amf3Value::Array {
        associative: vec![],
        dense: vec![Amf3Value::Integer(7)],
    };
    let sample = Amf3Value::Array {
        associative: vec![],
        dense: vec![byte_array.clone(), byte_array, inner.clone(), inner],
    };

    // Both byte arrays are written in full, yet each occupies a table slot,
    // so the repeated inner array references slot 3.
    let expected = Bytes::from_iter([
        ARRAY, 0x09, 0x01, //
        BYTE_ARRAY, 0x07, 1, 2, 3, //
        BYTE_ARRAY, 0x07, 1, 2, 3, //
        ARRAY, 0x03, 0x01, INTEGER, 0x07, //
        ARRAY, 0x06,
    ]);
    assert_eq!(encode_amf3_value(&sample).unwrap(), expected);
    assert_eq!(round_trip(&sample), sample);
}

#[test]
fn test_vector_int_wire_layout() {
    let sample = Amf3Value::VectorInt {
        fixed_length: true,
        values: vec![-1, 2],
    };
    let expected = Bytes::from_iter([
        VECTOR_INT, 0x05, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x02,
    ]);
    assert_eq!(encode_amf3_value(&sample).unwrap(), expected);
    assert_eq!(round_trip(&sample), sample);
}

#[test]
fn test_vectors_round_trip() {
    let samples = [
        Amf3Value::VectorUInt {
            fixed_length: false,
            values: vec![0, u32::MAX],
        },
        Amf3Value::VectorDouble {
            fixed_length: true,
            values: vec![0.25, -1.5],
        },
        Amf3Value::VectorObject {
            fixed_length: false,
            class_name: None,
            values: vec![Amf3Value::String("a".to_string()), Amf3Value::Null],
        },
        Amf3Value::VectorObject {
            fixed_length: true,
            class_name: Some("Thing".to_string()),
            values: vec![Amf3Value::Integer(5)],
        },
    ];

    for sample in samples {
        assert_eq!(round_trip(&sample), sample);
    }
}

#[test]
fn test_dictionary() {
    let sample = Amf3Value::Dictionary {
        weak_references: false,
        entries: vec![
            (
                Amf3Value::String("k".to_string()),
                Amf3Value::Integer(1),
            ),
            (Amf3Value::Integer(2), Amf3Value::Boolean(true)),
        ],
    };
    let expected = Bytes::from_iter([
        DICTIONARY, 0x05, 0x00, STRING, 0x03, b'k', INTEGER, 0x01, INTEGER, 0x02, TRUE,
    ]);
    assert_eq!(encode_amf3_value(&sample).unwrap(), expected);
    assert_eq!(round_trip(&sample), sample);
}

#[test]
fn test_remainder_chaining() {
    let stream = encode_amf3_values(&[
        Amf3Value::Boolean(true),
        Amf3Value::Integer(7),
        Amf3Value::String("tail".to_string()),
    ])
    .unwrap();

    let (first, rest) = decode_amf3_value(stream).unwrap();
    assert_eq!(first, Amf3Value::Boolean(true));

    let (second, rest) = decode_amf3_value(rest).unwrap();
    assert_eq!(second, Amf3Value::Integer(7));

    let (third, rest) = decode_amf3_value(rest).unwrap();
    assert_eq!(third, Amf3Value::String("tail".to_string()));
    assert!(rest.is_empty());
}

#[test]
fn test_tables_reset_between_top_level_values() {
    // Top-level values are independent: the second "x" is written in full,
    // not as a reference into the first value's table.
    let stream = encode_amf3_values(&[
        Amf3Value::String("x".to_string()),
        Amf3Value::String("x".to_string()),
    ])
    .unwrap();
    assert_eq!(
        stream,
        Bytes::from_iter([STRING, 0x03, b'x', STRING, 0x03, b'x'])
    );

    let decoded = decode_amf3_values(stream).unwrap();
    assert_eq!(
        decoded,
        vec![
            Amf3Value::String("x".to_string()),
            Amf3Value::String("x".to_string()),
        ]
    );
}

#[test]
fn test_dangling_references() {
    assert_eq!(
        decode_amf3_value(Bytes::from_iter([STRING, 0x02])),
        Err(Amf3DecodingError::ReferenceNotFound {
            table: ReferenceTable::Strings,
            index: 1,
        })
    );
    assert_eq!(
        decode_amf3_value(Bytes::from_iter([ARRAY, 0x04])),
        Err(Amf3DecodingError::ReferenceNotFound {
            table: ReferenceTable::Complexes,
            index: 2,
        })
    );
    assert_eq!(
        decode_amf3_value(Bytes::from_iter([OBJECT, 0x05])),
        Err(Amf3DecodingError::ReferenceNotFound {
            table: ReferenceTable::Traits,
            index: 1,
        })
    );
}

#[test]
fn test_truncated_input() {
    let cases: [&[u8]; 4] = [
        &[INTEGER],
        &[DOUBLE, 0x00],
        &[STRING, 0x0B, b'a'],
        &[BYTE_ARRAY, 0x09, 0x01],
    ];
    for bytes in cases {
        assert_eq!(
            decode_amf3_value(Bytes::copy_from_slice(bytes)),
            Err(Amf3DecodingError::TruncatedInput)
        );
    }
}

#[test]
fn test_externalizable_trait_is_rejected() {
    assert_eq!(
        decode_amf3_value(Bytes::from_iter([OBJECT, 0x07])),
        Err(Amf3DecodingError::ExternalizableTrait)
    );
}

#[test]
fn test_unknown_marker() {
    assert_eq!(
        decode_amf3_value(Bytes::from_iter([0x42])),
        Err(Amf3DecodingError::UnknownMarker(0x42))
    );
}
