//! Skip-over-value: consume one JSON value without materializing it, for
//! unknown fields and for extracting raw literal extents.

use crate::error::{syntax, Error};
use crate::reader::DecSession;

impl DecSession<'_, '_> {
    /// Consume the value whose head byte was just read.
    pub(crate) fn skip(&mut self, head: u8) -> Result<(), Error> {
        match head {
            b'{' => self.skip_object(),
            b'[' => self.skip_array(),
            b'"' => self.consume_string(),
            b't' => self.expect_keyword(b't', "rue"),
            b'f' => self.expect_keyword(b'f', "alse"),
            b'n' => self.expect_null(),
            b'0'..=b'9' | b'-' => self.consume_number(head),
            other => Err(syntax(
                format!("unhandled token: {:?}", other as char),
                self.offset_of_last(),
            )),
        }
    }

    fn skip_array(&mut self) -> Result<(), Error> {
        let mut first = true;
        loop {
            let head = self.read_byte()?;
            if head == b']' && first {
                return Ok(());
            }
            self.skip(head)?;

            let head = self.read_byte()?;
            if head == b']' {
                return Ok(());
            }
            if head != b',' {
                return Err(syntax(
                    format!("expected a comma or a closing ], got: {:?}", head as char),
                    self.offset_of_last(),
                ));
            }
            first = false;
        }
    }

    fn skip_object(&mut self) -> Result<(), Error> {
        let mut first = true;
        loop {
            let head = self.read_byte()?;
            if head == b'}' && first {
                return Ok(());
            }
            if head != b'"' {
                return Err(syntax(
                    "expected a string for an object key",
                    self.offset_of_last(),
                ));
            }
            self.consume_string()?;

            let head = self.read_byte()?;
            if head != b':' {
                return Err(syntax(
                    format!("expected a colon, got: {:?}", head as char),
                    self.offset_of_last(),
                ));
            }

            let head = self.read_byte()?;
            self.skip(head)?;

            let head = self.read_byte()?;
            if head == b'}' {
                return Ok(());
            }
            if head != b',' {
                return Err(syntax(
                    format!("expected a comma or a closing }}, got: {:?}", head as char),
                    self.offset_of_last(),
                ));
            }
            first = false;
        }
    }
}
