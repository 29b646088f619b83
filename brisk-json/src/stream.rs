//! Streaming entry points: an encoder over any writer and a decoder over
//! any reader, plus token-mode iteration.

use std::io;

use brisk_core::Shaped;

use crate::cache::cell_for;
use crate::dec::decode_into;
use crate::enc::{encode_from, EncSession};
use crate::error::Error;
use crate::float;
use crate::pool;
use crate::reader::{DecSession, ReaderBuf};
use crate::value::Number;

/// One JSON token, as surfaced by [`Decoder::token`].
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// One of `{ } [ ]`.
    Delim(char),
    Bool(bool),
    /// A number, parsed to a double (the default).
    Float(f64),
    /// A number kept as its literal, under use-number mode.
    Number(Number),
    String(String),
    Null,
}

/// Writes newline-terminated JSON documents to an inner writer.
pub struct Encoder<W: io::Write> {
    writer: W,
    prefix: String,
    indent: String,
    html: bool,
}

impl<W: io::Write> Encoder<W> {
    pub fn new(writer: W) -> Self {
        Encoder {
            writer,
            prefix: String::new(),
            indent: String::new(),
            html: true,
        }
    }

    /// Write the JSON encoding of `value`, followed by a newline.
    pub fn encode<T: Shaped>(&mut self, value: &T) -> Result<(), Error> {
        let cell = cell_for(T::SHAPE);
        let mut buf = pool::get(0);
        let mut sess = EncSession::new(self.html);
        let result = encode_from(&cell, value as *const T as *const u8, &mut buf, &mut sess);
        let result = result.and_then(|()| {
            buf.push(b'\n');
            if self.prefix.is_empty() && self.indent.is_empty() {
                self.writer.write_all(&buf)?;
            } else {
                let mut pretty = pool::get(buf.len() * 2);
                let reflowed = crate::compact::indent(&mut pretty, &buf, &self.prefix, &self.indent);
                let write = reflowed.and_then(|()| Ok(self.writer.write_all(&pretty)?));
                pool::put(pretty);
                write?;
            }
            Ok(())
        });
        pool::put(buf);
        result
    }

    /// Default behavior escapes `&`, `<` and `>` inside strings; turn it
    /// off where the output never reaches HTML.
    pub fn set_escape_html(&mut self, html: bool) {
        self.html = html;
    }

    /// Indent each subsequent document like [`indent`](crate::indent);
    /// empty strings disable indentation.
    pub fn set_indent(&mut self, prefix: &str, indent: &str) {
        self.prefix = prefix.to_owned();
        self.indent = indent.to_owned();
    }
}

/// Reads JSON values from an inner reader through a refillable buffer.
pub struct Decoder<R: io::Read> {
    input: R,
    rd: ReaderBuf<'static>,
    disallow_unknown: bool,
    use_number: bool,
}

impl<R: io::Read> Decoder<R> {
    pub fn new(input: R) -> Self {
        Decoder {
            input,
            rd: ReaderBuf::streaming(),
            disallow_unknown: false,
            use_number: false,
        }
    }

    fn session(&mut self) -> DecSession<'_, 'static> {
        let mut sess = DecSession::new(&mut self.rd, Some(&mut self.input));
        sess.disallow_unknown = self.disallow_unknown;
        sess.use_number = self.use_number;
        sess
    }

    /// Decode the next value from the stream into `dest`.
    pub fn decode<T: Shaped>(&mut self, dest: &mut T) -> Result<(), Error> {
        let cell = cell_for(T::SHAPE);
        let mut sess = self.session();
        let head = sess.read_byte()?;
        decode_into(&cell, head, dest as *mut T as *mut u8, &mut sess)
    }

    /// The next token in the stream, skipping commas and colons. `None`
    /// at end of input.
    pub fn token(&mut self) -> Result<Option<Token>, Error> {
        let mut sess = self.session();
        loop {
            if sess.peek()?.is_none() {
                return Ok(None);
            }
            let head = sess.read_byte()?;
            return Ok(Some(match head {
                b',' | b':' => continue,
                b'{' | b'}' | b'[' | b']' => Token::Delim(head as char),
                b't' => {
                    sess.expect_keyword(b't', "rue")?;
                    Token::Bool(true)
                }
                b'f' => {
                    sess.expect_keyword(b'f', "alse")?;
                    Token::Bool(false)
                }
                b'n' => {
                    sess.expect_null()?;
                    Token::Null
                }
                b'"' => {
                    let bytes = sess.read_string()?;
                    Token::String(String::from_utf8_lossy(bytes).into_owned())
                }
                b'0'..=b'9' | b'-' => {
                    let start = sess.keep_from_head();
                    sess.consume_number(head)?;
                    if sess.use_number {
                        let literal =
                            String::from_utf8_lossy(sess.take_kept(start)).into_owned();
                        Token::Number(Number(literal))
                    } else {
                        Token::Float(float::parse_f64(sess.take_kept(start)))
                    }
                }
                other => {
                    return Err(crate::error::syntax(
                        format!("unhandled token: {:?}", other as char),
                        sess.input_offset(),
                    ))
                }
            }));
        }
    }

    /// True when the current array or object has another element.
    pub fn more(&mut self) -> bool {
        self.session().more().unwrap_or(false)
    }

    /// Reject object keys that match no struct field.
    pub fn disallow_unknown_fields(&mut self) {
        self.disallow_unknown = true;
    }

    /// Decode numbers in dynamic values as [`Number`] literals instead of
    /// doubles.
    pub fn use_number(&mut self) {
        self.use_number = true;
    }

    /// The number of input bytes consumed so far.
    pub fn input_offset(&self) -> u64 {
        self.rd.input_offset()
    }

    /// The data remaining in the decoder's buffer.
    pub fn buffered(&self) -> &[u8] {
        self.rd.buffered()
    }
}

impl<R: io::Read> Drop for Decoder<R> {
    fn drop(&mut self) {
        self.rd.release();
    }
}
