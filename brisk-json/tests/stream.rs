use std::io;

use brisk_json::{Decoder, Encoder, Number, Shaped, Token, Value};

#[derive(Shaped, Debug, PartialEq, Default)]
struct Event {
    seq: u64,
    kind: String,
}

#[test]
fn encoder_writes_newline_terminated_documents() {
    let mut out = Vec::new();
    {
        let mut enc = Encoder::new(&mut out);
        enc.encode(&Event {
            seq: 1,
            kind: "open".to_owned(),
        })
        .unwrap();
        enc.encode(&Event {
            seq: 2,
            kind: "close".to_owned(),
        })
        .unwrap();
    }
    assert_eq!(
        String::from_utf8_lossy(&out),
        "{\"seq\":1,\"kind\":\"open\"}\n{\"seq\":2,\"kind\":\"close\"}\n"
    );
}

#[test]
fn encoder_set_indent_reflows_each_document() {
    let mut out = Vec::new();
    {
        let mut enc = Encoder::new(&mut out);
        enc.set_indent("", "  ");
        enc.encode(&vec![1, 2]).unwrap();
    }
    assert_eq!(String::from_utf8_lossy(&out), "[\n  1,\n  2\n]\n");
}

/// A reader that hands out one byte at a time, forcing refills.
struct OneByte<'a>(&'a [u8]);

impl io::Read for OneByte<'_> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.0.is_empty() || out.is_empty() {
            return Ok(0);
        }
        out[0] = self.0[0];
        self.0 = &self.0[1..];
        Ok(1)
    }
}

#[test]
fn decoder_streams_multiple_values() {
    let payload = b" {\"seq\":1,\"kind\":\"a\"} {\"seq\":2,\"kind\":\"b\"} ";
    let mut dec = Decoder::new(OneByte(payload));

    let mut event = Event::default();
    dec.decode(&mut event).unwrap();
    assert_eq!(event.seq, 1);
    dec.decode(&mut event).unwrap();
    assert_eq!(event.seq, 2);
    assert_eq!(event.kind, "b");
    assert!(dec.decode(&mut event).is_err());
}

#[test]
fn decoder_reports_input_offset() {
    let payload = b"[1,2]   true";
    let mut dec = Decoder::new(&payload[..]);
    let mut items: Vec<i32> = Vec::new();
    dec.decode(&mut items).unwrap();
    assert_eq!(dec.input_offset(), 5);

    let mut flag = false;
    dec.decode(&mut flag).unwrap();
    assert!(flag);
    assert_eq!(dec.input_offset(), payload.len() as u64);
}

#[test]
fn decoder_buffered_returns_the_remainder() {
    let payload = b"[1] {\"rest\":true}";
    let mut dec = Decoder::new(&payload[..]);
    let mut items: Vec<i32> = Vec::new();
    dec.decode(&mut items).unwrap();
    assert_eq!(dec.buffered(), b" {\"rest\":true}");
}

#[test]
fn token_mode_walks_the_stream() {
    let payload = br#"{"list":[true,null,-2.5],"n":7}"#;
    let mut dec = Decoder::new(&payload[..]);
    let mut tokens = Vec::new();
    while let Some(token) = dec.token().unwrap() {
        tokens.push(token);
    }
    assert_eq!(
        tokens,
        vec![
            Token::Delim('{'),
            Token::String("list".to_owned()),
            Token::Delim('['),
            Token::Bool(true),
            Token::Null,
            Token::Float(-2.5),
            Token::Delim(']'),
            Token::String("n".to_owned()),
            Token::Float(7.0),
            Token::Delim('}'),
        ]
    );
}

#[test]
fn token_mode_honors_use_number() {
    let mut dec = Decoder::new(&b"[1.25]"[..]);
    dec.use_number();
    assert_eq!(dec.token().unwrap(), Some(Token::Delim('[')));
    assert_eq!(
        dec.token().unwrap(),
        Some(Token::Number(Number::new("1.25").unwrap()))
    );
}

#[test]
fn more_reports_remaining_elements() {
    let mut dec = Decoder::new(&b"[1,2]"[..]);
    assert_eq!(dec.token().unwrap(), Some(Token::Delim('[')));
    assert!(dec.more());
    assert_eq!(dec.token().unwrap(), Some(Token::Float(1.0)));
    assert!(dec.more());
    assert_eq!(dec.token().unwrap(), Some(Token::Float(2.0)));
    assert!(!dec.more());
}

#[test]
fn use_number_keeps_literals_in_dynamic_values() {
    let mut dec = Decoder::new(&b"{\"big\":12345678901234567890123}"[..]);
    dec.use_number();
    let mut value = Value::Null;
    dec.decode(&mut value).unwrap();
    match value.get("big") {
        Some(Value::Number(literal)) => {
            assert_eq!(literal.as_str(), "12345678901234567890123")
        }
        other => panic!("expected a literal, got {other:?}"),
    }
}

#[test]
fn io_errors_propagate() {
    struct Failing;
    impl io::Read for Failing {
        fn read(&mut self, _out: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "dropped"))
        }
    }
    let mut dec = Decoder::new(Failing);
    let mut value = Value::Null;
    let err = dec.decode(&mut value).unwrap_err();
    assert!(matches!(err, brisk_json::Error::Io(_)));
}
