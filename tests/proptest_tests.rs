//! Property-based tests: value serialization identity and stream codec
//! round-trips under arbitrary inputs.

use proptest::prelude::*;

use pdfkern::object::{Dictionary, Name, ObjectId, Value};
use pdfkern::syntax::format_real;
use pdfkern::{DecodeParms, Document, Filter};

/// Reals limited to what six significant digits represent exactly, so
/// the round-trip is equality rather than approximation.
fn real_strategy() -> impl Strategy<Value = f64> {
    (-99_999i32..=99_999).prop_map(|n| n as f64 / 100.0)
}

fn name_strategy() -> impl Strategy<Value = Name> {
    proptest::collection::vec(any::<u8>(), 1..24).prop_map(Name::new)
}

/// Literal strings: NUL-free (a NUL legally re-emits the token in hex
/// form, changing the variant), and not shaped like a date.
fn literal_string_strategy() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(1u8..=255, 0..48)
        .prop_filter("date-shaped strings parse as dates", |bytes| {
            !bytes.starts_with(b"D:")
        })
}

fn leaf_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Boolean),
        any::<i64>().prop_map(Value::Integer),
        real_strategy().prop_map(Value::Real),
        name_strategy().prop_map(Value::Name),
        literal_string_strategy().prop_map(Value::string),
        proptest::collection::vec(any::<u8>(), 0..48).prop_map(Value::binary),
        (1u32..100_000, 0u16..100).prop_map(|(n, g)| Value::Reference(ObjectId::new(n, g))),
    ]
}

fn value_strategy() -> impl Strategy<Value = Value> {
    leaf_value_strategy().prop_recursive(3, 48, 6, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            proptest::collection::vec((name_strategy(), inner), 0..6).prop_map(|entries| {
                let mut dict = Dictionary::new();
                for (key, value) in entries {
                    dict.set(key, value);
                }
                Value::Dictionary(dict)
            }),
        ]
    })
}

proptest! {
    /// Values survive a full trip through a saved document body.
    #[test]
    fn serialize_then_parse_is_identity(value in value_strategy()) {
        let mut doc = Document::with_version("1.4");
        let id = doc.add_object(value.clone());
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        let mut reopened = Document::load_mem(bytes).unwrap();
        prop_assert_eq!(reopened.object(id.number).unwrap(), &value);
    }

    #[test]
    fn real_formatting_reparses_exactly(r in real_strategy()) {
        let rendered = format_real(r);
        prop_assert!(!rendered.contains('e') && !rendered.contains('E'));
        let parsed: f64 = rendered.parse().unwrap();
        prop_assert_eq!(parsed, r);
    }

    #[test]
    fn flate_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let mut doc = Document::new();
        let obj = doc.add_object(Dictionary::new());
        doc.set_stream_data(obj, &data, Filter::Flate, None).unwrap();
        prop_assert_eq!(doc.stream_data(obj.number).unwrap(), data);
    }

    #[test]
    fn predictor_roundtrip(
        predictor in prop_oneof![Just(2u8), (10u8..=15)],
        colors in 1u8..=4,
        columns in 1usize..=48,
        rows in 1usize..=8,
        seed in any::<u64>(),
    ) {
        let parms = DecodeParms { predictor, colors, bits_per_component: 8, columns };
        let len = parms.bytes_per_row() * rows;
        let data: Vec<u8> = (0..len)
            .map(|i| (seed.wrapping_mul(i as u64 + 1) >> 13) as u8)
            .collect();
        let mut doc = Document::new();
        let obj = doc.add_object(Dictionary::new());
        doc.set_stream_data(obj, &data, Filter::Flate, Some(parms)).unwrap();
        prop_assert_eq!(doc.stream_data(obj.number).unwrap(), data);
    }
}
