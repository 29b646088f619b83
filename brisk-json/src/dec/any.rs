//! The dynamic-value decoder: any JSON value into a [`Value`] tree.
//! Object member order is preserved.

use indexmap::IndexMap;

use crate::error::{syntax, Error};
use crate::float;
use crate::reader::DecSession;
use crate::value::{Number, Value};

pub(crate) fn decode_value(head: u8, sess: &mut DecSession<'_, '_>) -> Result<Value, Error> {
    match head {
        b'{' => decode_object(sess),
        b'[' => decode_array(sess),
        b'"' => {
            let bytes = sess.read_string()?;
            Ok(Value::String(String::from_utf8_lossy(bytes).into_owned()))
        }
        b't' => {
            sess.expect_keyword(b't', "rue")?;
            Ok(Value::Bool(true))
        }
        b'f' => {
            sess.expect_keyword(b'f', "alse")?;
            Ok(Value::Bool(false))
        }
        b'n' => {
            sess.expect_null()?;
            Ok(Value::Null)
        }
        b'0'..=b'9' | b'-' => {
            let start = sess.keep_from_head();
            sess.consume_number(head)?;
            if sess.use_number {
                let literal = String::from_utf8_lossy(sess.take_kept(start)).into_owned();
                Ok(Value::Number(Number(literal)))
            } else {
                Ok(Value::Float(float::parse_f64(sess.take_kept(start))))
            }
        }
        other => Err(syntax(
            format!("unhandled token: {:?}", other as char),
            sess.input_offset(),
        )),
    }
}

fn decode_object(sess: &mut DecSession<'_, '_>) -> Result<Value, Error> {
    let mut members: IndexMap<String, Value> = IndexMap::new();
    loop {
        let head = sess.read_byte()?;
        if head == b'}' && members.is_empty() {
            return Ok(Value::Object(members));
        }
        if head != b'"' {
            return Err(syntax(
                "expected a string for an object key",
                sess.offset_of_last(),
            ));
        }
        let key = String::from_utf8_lossy(sess.read_string()?).into_owned();

        let head = sess.read_byte()?;
        if head != b':' {
            return Err(syntax(
                format!("expected a colon, got: {:?}", head as char),
                sess.offset_of_last(),
            ));
        }

        let head = sess.read_byte()?;
        let value = decode_value(head, sess)?;
        members.insert(key, value);

        let head = sess.read_byte()?;
        if head == b'}' {
            return Ok(Value::Object(members));
        }
        if head != b',' {
            return Err(syntax(
                format!("expected a comma or a closing }}, got: {:?}", head as char),
                sess.offset_of_last(),
            ));
        }
    }
}

fn decode_array(sess: &mut DecSession<'_, '_>) -> Result<Value, Error> {
    let mut items = Vec::new();
    loop {
        let head = sess.read_byte()?;
        if head == b']' && items.is_empty() {
            return Ok(Value::Array(items));
        }
        items.push(decode_value(head, sess)?);

        let head = sess.read_byte()?;
        if head == b']' {
            return Ok(Value::Array(items));
        }
        if head != b',' {
            return Err(syntax(
                format!("expected a comma or a closing ], got: {:?}", head as char),
                sess.offset_of_last(),
            ));
        }
    }
}
