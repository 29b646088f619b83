use std::collections::{BTreeMap, HashMap};

use brisk_json::{to_string, to_vec, to_vec_indent, Encoder, Error, Number, Shaped, Value};
use indexmap::IndexMap;

#[test]
fn map_keys_sort_lexicographically() {
    let mut counts = HashMap::new();
    counts.insert("b".to_owned(), 2);
    counts.insert("a".to_owned(), 1);
    assert_eq!(to_string(&counts).unwrap(), r#"{"a":1,"b":2}"#);
}

#[test]
fn integer_map_keys_sort_numerically() {
    let mut by_id: HashMap<i32, String> = HashMap::new();
    for (key, name) in [(10, "ten"), (-5, "neg"), (2, "two")] {
        by_id.insert(key, name.to_owned());
    }
    assert_eq!(
        to_string(&by_id).unwrap(),
        r#"{"-5":"neg","2":"two","10":"ten"}"#
    );
}

#[test]
fn html_escaping_is_on_by_default() {
    assert_eq!(
        to_string(&"<tag>".to_owned()).unwrap(),
        r#""\u003ctag\u003e""#
    );

    let mut plain = Vec::new();
    {
        let mut enc = Encoder::new(&mut plain);
        enc.set_escape_html(false);
        enc.encode(&"<tag>".to_owned()).unwrap();
    }
    assert_eq!(plain, b"\"<tag>\"\n");
}

#[test]
fn byte_slices_encode_as_base64() {
    let bytes: Vec<u8> = vec![0xDE, 0xAD, 0xBE, 0xEF];
    assert_eq!(to_string(&bytes).unwrap(), r#""3q2+7w==""#);
    assert_eq!(to_string(&Vec::<u8>::new()).unwrap(), r#""""#);
}

#[derive(Shaped, Default)]
struct Record {
    id: u64,
    #[json(rename = "display_name")]
    name: String,
    #[json(omitempty)]
    tags: Vec<String>,
    #[json(omitempty)]
    parent: Option<u32>,
    #[json(omitempty)]
    score: f64,
    #[json(skip)]
    secret: String,
}

#[test]
fn struct_fields_emit_in_declaration_order() {
    let record = Record {
        id: 12,
        name: "x".to_owned(),
        tags: vec!["a".to_owned()],
        parent: Some(3),
        score: 1.5,
        secret: "hidden".to_owned(),
    };
    assert_eq!(
        to_string(&record).unwrap(),
        r#"{"id":12,"display_name":"x","tags":["a"],"parent":3,"score":1.5}"#
    );
}

#[test]
fn omitempty_drops_zero_values() {
    let record = Record {
        id: 0,
        name: String::new(),
        ..Record::default()
    };
    assert_eq!(to_string(&record).unwrap(), r#"{"id":0,"display_name":""}"#);
}

#[derive(Shaped, Default)]
struct QuotedOut {
    #[json(string)]
    count: i64,
    #[json(string)]
    label: String,
}

#[test]
fn string_option_quotes_primitives() {
    let out = QuotedOut {
        count: -7,
        label: "a\"b".to_owned(),
    };
    assert_eq!(
        to_string(&out).unwrap(),
        r#"{"count":"-7","label":"\"a\\\"b\""}"#
    );
}

#[test]
fn float_notation_follows_the_wire_contract() {
    assert_eq!(to_string(&1e20f64).unwrap(), "100000000000000000000");
    assert_eq!(to_string(&1e21f64).unwrap(), "1e+21");
    assert_eq!(to_string(&1e-7f64).unwrap(), "1e-7");
    assert_eq!(to_string(&0.000001f64).unwrap(), "0.000001");
    assert_eq!(to_string(&-2.5f32).unwrap(), "-2.5");

    match to_vec(&f64::NAN).unwrap_err() {
        Error::UnsupportedValue(err) => assert!(err.to_string().contains("NaN")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(to_vec(&f64::INFINITY).is_err());
}

#[test]
fn options_and_empty_containers() {
    assert_eq!(to_string(&Option::<i32>::None).unwrap(), "null");
    assert_eq!(to_string(&Some(4i32)).unwrap(), "4");
    assert_eq!(to_string(&Vec::<i32>::new()).unwrap(), "[]");
    assert_eq!(
        to_string(&BTreeMap::<String, i32>::new()).unwrap(),
        "{}"
    );
    assert_eq!(to_string(&Box::new(9u8)).unwrap(), "9");
}

#[test]
fn indent_reflow() {
    let mut items = BTreeMap::new();
    items.insert("a".to_owned(), vec![1, 2]);
    let pretty = to_vec_indent(&items, "", "  ").unwrap();
    assert_eq!(
        String::from_utf8_lossy(&pretty),
        "{\n  \"a\": [\n    1,\n    2\n  ]\n}"
    );
}

#[test]
fn dynamic_values_encode_sorted() {
    let mut members = IndexMap::new();
    members.insert("z".to_owned(), Value::Float(1.0));
    members.insert("a".to_owned(), Value::Bool(true));
    members.insert("n".to_owned(), Value::Number(Number::new("12.50").unwrap()));
    let value = Value::Object(members);
    assert_eq!(to_string(&value).unwrap(), r#"{"a":true,"n":12.50,"z":1}"#);

    assert!(to_vec(&Value::Number(Number::default())).is_err());
}

#[test]
fn nested_structs_round_out() {
    #[derive(Shaped, Default)]
    struct Wheel {
        radius: f32,
    }
    #[derive(Shaped, Default)]
    struct Cart {
        wheels: Vec<Wheel>,
        name: String,
    }
    let cart = Cart {
        wheels: vec![Wheel { radius: 0.5 }, Wheel { radius: 0.75 }],
        name: "wagon".to_owned(),
    };
    assert_eq!(
        to_string(&cart).unwrap(),
        r#"{"wheels":[{"radius":0.5},{"radius":0.75}],"name":"wagon"}"#
    );
}
