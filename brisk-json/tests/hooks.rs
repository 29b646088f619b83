use brisk_json::{
    from_slice, from_str, to_string, to_vec, BoxError, Error, JsonMarshaler, JsonUnmarshaler,
    Number, RawMessage, Shaped, TextMarshaler, TextUnmarshaler, Value,
};

/// A version stamp that owns its own wire form: "major.minor" as a JSON
/// array of two numbers.
#[derive(Shaped, Debug, PartialEq, Default)]
#[json(marshaler, unmarshaler)]
struct Version {
    major: u8,
    minor: u8,
}

impl JsonMarshaler for Version {
    fn marshal_json(&self) -> Result<Vec<u8>, BoxError> {
        // Deliberately spaced: the compactor must strip it.
        Ok(format!("[ {} , {} ]", self.major, self.minor).into_bytes())
    }
}

impl JsonUnmarshaler for Version {
    fn unmarshal_json(&mut self, data: &[u8]) -> Result<(), BoxError> {
        let pair: Vec<u8> = from_slice(data).map_err(BoxError::from)?;
        match pair.as_slice() {
            [major, minor] => {
                self.major = *major;
                self.minor = *minor;
                Ok(())
            }
            _ => Err("expected [major, minor]".into()),
        }
    }
}

#[test]
fn json_hooks_take_over_both_directions() {
    let version = Version { major: 1, minor: 9 };
    assert_eq!(to_string(&version).unwrap(), "[1,9]");

    let parsed: Version = from_str(" [ 2 ,  3 ] ").unwrap();
    assert_eq!(parsed, Version { major: 2, minor: 3 });
}

#[derive(Shaped, Debug, PartialEq, Default)]
struct Release {
    name: String,
    version: Version,
}

#[test]
fn hooks_receive_the_exact_token_extent() {
    let release: Release = from_str(r#"{"version":[4,5],"name":"r"}"#).unwrap();
    assert_eq!(release.version, Version { major: 4, minor: 5 });
    assert_eq!(release.name, "r");
}

#[test]
fn hook_failures_surface() {
    let err = from_str::<Version>("[1,2,3]").unwrap_err();
    assert!(matches!(err, Error::Unmarshaler(_)));
}

#[derive(Shaped, Debug, PartialEq, Default)]
#[json(marshaler)]
struct Broken;

impl JsonMarshaler for Broken {
    fn marshal_json(&self) -> Result<Vec<u8>, BoxError> {
        Err("refused".into())
    }
}

#[test]
fn marshaler_errors_name_the_source_fn() {
    let err = to_vec(&Broken).unwrap_err();
    match err {
        Error::Marshaler(err) => {
            assert_eq!(err.source_fn, "marshal_json");
            assert_eq!(err.type_name, "Broken");
            assert!(err.to_string().contains("refused"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[derive(Shaped, Debug, PartialEq, Default)]
#[json(marshaler)]
struct BadOutput;

impl JsonMarshaler for BadOutput {
    fn marshal_json(&self) -> Result<Vec<u8>, BoxError> {
        Ok(b"{not json".to_vec())
    }
}

#[test]
fn invalid_marshaler_output_is_wrapped() {
    let err = to_vec(&BadOutput).unwrap_err();
    assert!(matches!(err, Error::Marshaler(_)));
}

/// Celsius temperature with a text form like "21.5C".
#[derive(Shaped, Debug, PartialEq, Default)]
#[json(text_marshaler, text_unmarshaler)]
struct Celsius {
    degrees: f64,
}

impl TextMarshaler for Celsius {
    fn marshal_text(&self) -> Result<String, BoxError> {
        Ok(format!("{}C", self.degrees))
    }
}

impl TextUnmarshaler for Celsius {
    fn unmarshal_text(&mut self, text: &str) -> Result<(), BoxError> {
        let digits = text.strip_suffix('C').ok_or("missing C suffix")?;
        self.degrees = digits.parse()?;
        Ok(())
    }
}

#[test]
fn text_hooks_render_as_json_strings() {
    let temp = Celsius { degrees: 21.5 };
    assert_eq!(to_string(&temp).unwrap(), r#""21.5C""#);

    let parsed: Celsius = from_str(r#""-4C""#).unwrap();
    assert_eq!(parsed.degrees, -4.0);

    assert!(from_str::<Celsius>("21.5").is_err());
    assert!(from_str::<Celsius>(r#""21.5F""#).is_err());
}

#[test]
fn null_is_a_no_op_for_text_hooks() {
    let mut temp = Celsius { degrees: 3.0 };
    brisk_json::from_slice_into(b"null", &mut temp).unwrap();
    assert_eq!(temp.degrees, 3.0);
}

#[test]
fn raw_message_round_trips_byte_ranges() {
    #[derive(Shaped, Debug, PartialEq, Default)]
    struct Envelope {
        kind: String,
        payload: RawMessage,
    }

    let envelope: Envelope =
        from_str(r#"{"kind":"evt","payload":{"nested": [1, 2, {"deep": null}]}}"#).unwrap();
    assert_eq!(
        String::from_utf8_lossy(envelope.payload.as_bytes()),
        r#"{"nested": [1, 2, {"deep": null}]}"#
    );

    let re_encoded = to_string(&envelope).unwrap();
    assert_eq!(
        re_encoded,
        r#"{"kind":"evt","payload":{"nested":[1,2,{"deep":null}]}}"#
    );

    // The empty default encodes as null.
    assert_eq!(to_string(&RawMessage::default()).unwrap(), "null");
}

#[test]
fn number_round_trips_literals() {
    let literal: Number = from_slice(b"123456789012345678901234567890.5e-1").unwrap();
    assert_eq!(literal.as_str(), "123456789012345678901234567890.5e-1");
    assert_eq!(
        to_string(&literal).unwrap(),
        "123456789012345678901234567890.5e-1"
    );

    let small: Number = from_slice(b"-42").unwrap();
    assert_eq!(small.as_i64().unwrap(), -42);

    let err = from_slice::<Number>(b"\"1\"").unwrap_err();
    assert!(matches!(err, Error::UnmarshalType(_)));
}

#[test]
fn numbers_inside_values_stay_floats_by_default() {
    let value: Value = from_slice(b"[1.5, 2]").unwrap();
    assert_eq!(value.at(0), Some(&Value::Float(1.5)));
    assert_eq!(value.at(1), Some(&Value::Float(2.0)));
}
