use std::collections::{BTreeMap, HashMap};

use brisk_json::{from_slice, from_slice_into, from_str, Error, Shaped, Value};

#[derive(Shaped, Debug, PartialEq, Default)]
struct Pair {
    #[json(rename = "A")]
    a: i32,
    #[json(rename = "B")]
    b: String,
}

#[test]
fn exact_and_case_insensitive_keys() {
    // "A" matches exactly; "b" only through the case-folded table.
    let pair: Pair = from_slice(br#"{"A":1,"b":"x"}"#).unwrap();
    assert_eq!(
        pair,
        Pair {
            a: 1,
            b: "x".to_owned()
        }
    );
}

#[derive(Shaped, Debug, PartialEq, Default)]
struct CaseClash {
    #[json(rename = "Key")]
    first: i32,
    #[json(rename = "key")]
    second: i32,
}

#[test]
fn exact_match_wins_over_fold() {
    let clash: CaseClash = from_str(r#"{"Key":1,"key":2}"#).unwrap();
    assert_eq!(clash.first, 1);
    assert_eq!(clash.second, 2);

    // No exact match: the fold table resolves to the first field in plan
    // order.
    let clash: CaseClash = from_str(r#"{"KEY":9}"#).unwrap();
    assert_eq!(clash.first, 9);
    assert_eq!(clash.second, 0);
}

#[test]
fn unknown_fields_are_skipped() {
    let pair: Pair = from_str(r#"{"garbage":[{"deep":[1,2,{}]}],"A":3,"other":null}"#).unwrap();
    assert_eq!(pair.a, 3);
}

#[test]
fn absent_fields_leave_destination_untouched() {
    let mut pair = Pair {
        a: 41,
        b: "kept".to_owned(),
    };
    from_slice_into(br#"{"A":42}"#, &mut pair).unwrap();
    assert_eq!(pair.a, 42);
    assert_eq!(pair.b, "kept");
}

#[test]
fn null_is_a_no_op_for_scalars() {
    let mut pair = Pair {
        a: 5,
        b: "still".to_owned(),
    };
    from_slice_into(br#"{"A":null,"B":null}"#, &mut pair).unwrap();
    assert_eq!(pair.a, 5);
    assert_eq!(pair.b, "still");
}

#[derive(Shaped, Debug, PartialEq, Default)]
struct Base {
    id: u64,
    label: String,
}

#[derive(Shaped, Debug, PartialEq, Default)]
struct Derived {
    #[json(embed)]
    base: Base,
    // Shadows the embedded field of the same name.
    label: String,
}

#[test]
fn embedded_fields_promote_with_dominance() {
    let derived: Derived = from_str(r#"{"id":7,"label":"outer"}"#).unwrap();
    assert_eq!(derived.base.id, 7);
    assert_eq!(derived.label, "outer");
    assert_eq!(derived.base.label, "");
}

#[derive(Shaped, Debug, PartialEq, Default)]
struct LazyOuter {
    #[json(embed)]
    inner: Option<Box<Base>>,
    note: String,
}

#[test]
fn embedded_indirections_allocate_on_demand() {
    let outer: LazyOuter = from_str(r#"{"id":3,"note":"n"}"#).unwrap();
    assert_eq!(outer.inner.as_ref().map(|b| b.id), Some(3));
    assert_eq!(outer.note, "n");

    let untouched: LazyOuter = from_str(r#"{"note":"only"}"#).unwrap();
    assert_eq!(untouched.inner, None);
}

#[derive(Shaped, Debug, PartialEq, Default)]
struct Quoted {
    #[json(string)]
    count: i64,
    #[json(string)]
    ratio: f64,
    #[json(string)]
    on: bool,
    #[json(string)]
    name: String,
}

#[test]
fn string_option_unwraps_quoted_scalars() {
    let quoted: Quoted =
        from_str(r#"{"count":"-42","ratio":"2.5","on":"true","name":"\"deep\""}"#).unwrap();
    assert_eq!(quoted.count, -42);
    assert_eq!(quoted.ratio, 2.5);
    assert!(quoted.on);
    assert_eq!(quoted.name, "deep");
}

#[test]
fn string_option_rejects_bare_values() {
    let err = from_str::<Quoted>(r#"{"count":42}"#).unwrap_err();
    assert!(matches!(err, Error::UnmarshalType(_)));
}

#[test]
fn integer_bounds_are_enforced() {
    assert_eq!(from_slice::<i8>(b"-128").unwrap(), -128);
    assert!(from_slice::<i8>(b"128").is_err());
    assert_eq!(from_slice::<u16>(b"65535").unwrap(), 65535);
    assert!(from_slice::<u16>(b"65536").is_err());
    assert_eq!(from_slice::<i64>(b"-9223372036854775808").unwrap(), i64::MIN);
    assert!(from_slice::<i64>(b"-9223372036854775809").is_err());
    assert!(from_slice::<u32>(b"-1").is_err());
}

#[test]
fn float_literal_into_integer_is_a_type_error() {
    let err = from_slice::<i32>(b"1.5").unwrap_err();
    match err {
        Error::UnmarshalType(err) => assert_eq!(err.value, "number 1.5"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn float_range_overflow_reports_the_literal() {
    let mut value = 7.0f64;
    let err = from_slice_into(b"1e400", &mut value).unwrap_err();
    match err {
        Error::UnmarshalType(err) => assert_eq!(err.value, "1e400"),
        other => panic!("unexpected error: {other}"),
    }
    // The destination is untouched on a range failure.
    assert_eq!(value, 7.0);

    assert!(from_slice::<f32>(b"1e39").is_err());
    assert_eq!(from_slice::<f32>(b"0.25").unwrap(), 0.25);
}

#[test]
fn surrogate_pairs_decode_to_astral_runes() {
    let text: String = from_slice(br#""\uD834\uDD1E""#).unwrap();
    assert_eq!(text, "\u{1D11E}");
    assert_eq!(text.as_bytes(), &[0xF0, 0x9D, 0x84, 0x9E]);
}

#[test]
fn arrays_fill_and_discard() {
    let exact: [i32; 3] = from_slice(b"[1,2,3]").unwrap();
    assert_eq!(exact, [1, 2, 3]);

    let mut partial = [9i32; 3];
    from_slice_into(b"[1,2]", &mut partial).unwrap();
    assert_eq!(partial, [1, 2, 0]);

    let overfull: [i32; 2] = from_slice(b"[1,2,3,4]").unwrap();
    assert_eq!(overfull, [1, 2]);
}

#[test]
fn slices_replace_existing_content() {
    let mut items = vec![9i64, 9, 9, 9];
    from_slice_into(b"[1,2]", &mut items).unwrap();
    assert_eq!(items, vec![1, 2]);

    from_slice_into(b"null", &mut items).unwrap();
    assert_eq!(items, vec![1, 2]);
}

#[test]
fn maps_decode_with_typed_keys() {
    let by_name: HashMap<String, i32> = from_slice(br#"{"a":1,"b":2}"#).unwrap();
    assert_eq!(by_name["a"], 1);
    assert_eq!(by_name["b"], 2);

    let by_id: BTreeMap<i32, String> = from_slice(br#"{"-3":"neg","10":"ten"}"#).unwrap();
    assert_eq!(by_id[&-3], "neg");
    assert_eq!(by_id[&10], "ten");
}

#[test]
fn malformed_map_keys_point_at_the_literal() {
    let err = from_slice::<HashMap<u8, i32>>(br#"{"300":1}"#).unwrap_err();
    match err {
        Error::UnmarshalType(err) => {
            assert_eq!(err.offset, 1);
            assert!(err.value.contains("300"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(from_slice::<HashMap<i32, i32>>(br#"{"1x":1}"#).is_err());
}

#[derive(Shaped, Debug, PartialEq, Default)]
struct Inner {
    count: i32,
}

#[derive(Shaped, Debug, PartialEq, Default)]
struct Outer {
    inner: Inner,
}

#[test]
fn type_errors_carry_struct_context() {
    let err = from_str::<Outer>(r#"{"inner":{"count":"not a number"}}"#).unwrap_err();
    match err {
        Error::UnmarshalType(err) => {
            assert_eq!(err.struct_name, "Outer");
            assert_eq!(err.field, "inner.count");
            assert_eq!(err.type_name, "i32");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[derive(Shaped, Debug, PartialEq, Default)]
struct Node {
    value: i32,
    next: Option<Box<Node>>,
}

#[test]
fn recursive_types_decode() {
    let list: Node = from_str(r#"{"value":1,"next":{"value":2,"next":{"value":3}}}"#).unwrap();
    assert_eq!(list.value, 1);
    let second = list.next.as_deref().unwrap();
    assert_eq!(second.value, 2);
    assert_eq!(second.next.as_deref().map(|n| n.value), Some(3));
}

#[test]
fn dynamic_values_preserve_member_order() {
    let value: Value = from_str(r#"{"z":1,"a":[true,null],"m":"s"}"#).unwrap();
    match &value {
        Value::Object(members) => {
            let keys: Vec<&str> = members.keys().map(String::as_str).collect();
            assert_eq!(keys, ["z", "a", "m"]);
        }
        other => panic!("expected an object, got {other:?}"),
    }
    assert_eq!(value.get("a").and_then(|a| a.at(1)), Some(&Value::Null));
    assert_eq!(value.get("m"), Some(&Value::String("s".to_owned())));
}

#[test]
fn trailing_data_is_rejected() {
    assert!(from_slice::<bool>(b"true ").is_ok());
    assert!(from_slice::<bool>(b"true x").is_err());
    assert!(from_slice::<Value>(b"1 2").is_err());
}

#[test]
fn base64_byte_slices() {
    let bytes: Vec<u8> = from_slice(br#""3q2+7w==""#).unwrap();
    assert_eq!(bytes, vec![0xDE, 0xAD, 0xBE, 0xEF]);

    // Array fallback still works.
    let bytes: Vec<u8> = from_slice(b"[1,2,255]").unwrap();
    assert_eq!(bytes, vec![1, 2, 255]);

    assert!(from_slice::<Vec<u8>>(br#""not base64!""#).is_err());
}
