//! Whitespace-stripping, indentation reflow and HTML escaping over raw
//! JSON bytes.
//!
//! The walker copies the source through a write watermark: boring spans
//! are appended wholesale, and only whitespace boundaries, inserted
//! indentation and escaped bytes break a span.

use crate::arith;
use crate::error::{syntax, Error, SyntaxError};
use crate::reader::MAX_DEPTH;

const HEX: &[u8; 16] = b"0123456789abcdef";

enum Style {
    Compact,
    Indent { prefix: String, indent: String },
}

struct Compactor<'a> {
    src: &'a [u8],
    dst: &'a mut Vec<u8>,
    read: usize,
    write: usize,
    depth: usize,
    html: bool,
    style: Style,
}

/// Append to `dst` the JSON-encoded `src` with insignificant space
/// characters elided.
pub fn compact(dst: &mut Vec<u8>, src: &[u8]) -> Result<(), Error> {
    run(dst, src, false, Style::Compact)
}

/// Compact with optional HTML-safe re-escaping; the marshaler adapter's
/// entry point.
pub(crate) fn compact_escaped(dst: &mut Vec<u8>, src: &[u8], html: bool) -> Result<(), Error> {
    run(dst, src, html, Style::Compact)
}

/// Append to `dst` an indented form of the JSON-encoded `src`. Each
/// element begins on a new line starting with `prefix` followed by one
/// copy of `indent` per nesting level.
pub fn indent(dst: &mut Vec<u8>, src: &[u8], prefix: &str, indent: &str) -> Result<(), Error> {
    run(
        dst,
        src,
        false,
        Style::Indent {
            prefix: prefix.to_owned(),
            indent: indent.to_owned(),
        },
    )
}

fn run(dst: &mut Vec<u8>, src: &[u8], html: bool, style: Style) -> Result<(), Error> {
    let reset = dst.len();
    let mut comp = Compactor {
        src,
        dst,
        read: 0,
        write: 0,
        depth: 0,
        html,
        style,
    };
    let result = comp.value_at_top();
    let trailing = comp.read;
    let keeps_tail = matches!(comp.style, Style::Indent { .. });
    match result {
        Ok(()) => {
            // Trailing whitespace is preserved by indent, dropped by
            // compact; anything else is an error.
            for idx in trailing..src.len() {
                if !matches!(src[idx], b' ' | b'\t' | b'\n' | b'\r') {
                    dst.truncate(reset);
                    return Err(syntax(
                        format!(
                            "invalid character {:?} after top-level value",
                            src[idx] as char
                        ),
                        idx as u64,
                    ));
                }
            }
            if keeps_tail {
                dst.extend_from_slice(&src[trailing..]);
            }
            Ok(())
        }
        Err(err) => {
            dst.truncate(reset);
            Err(err)
        }
    }
}

impl Compactor<'_> {
    fn value_at_top(&mut self) -> Result<(), Error> {
        self.eat_spaces();
        self.write = self.read;
        let head = self.next_byte()?;
        self.value(head)?;
        self.flush();
        Ok(())
    }

    fn value(&mut self, head: u8) -> Result<(), Error> {
        match head {
            b'{' => self.object(),
            b'[' => self.array(),
            b'"' => self.string(),
            b't' => self.keyword("true"),
            b'f' => self.keyword("false"),
            b'n' => self.keyword("null"),
            b'0'..=b'9' | b'-' => self.number(head),
            other => Err(self.err_prev(format!(
                "invalid character {:?} looking for beginning of value",
                other as char
            ))),
        }
    }

    fn array(&mut self) -> Result<(), Error> {
        self.enter()?;
        let mut mid = false;
        loop {
            self.eat_spaces();
            let head = self.next_byte()?;
            if head == b']' && !mid {
                self.depth -= 1;
                return Ok(());
            }
            self.newline();

            self.value(head)?;

            self.eat_spaces();
            let head = self.next_byte()?;
            if head == b']' {
                self.depth -= 1;
                self.newline();
                return Ok(());
            }
            if head != b',' {
                return Err(self.err_prev(format!(
                    "invalid character {:?} after array element",
                    head as char
                )));
            }
            mid = true;
        }
    }

    fn object(&mut self) -> Result<(), Error> {
        self.enter()?;
        let mut mid = false;
        loop {
            self.eat_spaces();
            let head = self.next_byte()?;
            if head == b'}' && !mid {
                self.depth -= 1;
                return Ok(());
            }
            self.newline();
            if head != b'"' {
                return Err(self.err_prev(format!(
                    "invalid character {:?} looking for beginning of object key string",
                    head as char
                )));
            }
            self.string()?;

            self.eat_spaces();
            let head = self.next_byte()?;
            if head != b':' {
                return Err(self.err_prev(format!(
                    "invalid character {:?} after object key",
                    head as char
                )));
            }
            self.space_after_colon();

            self.eat_spaces();
            let head = self.next_byte()?;
            self.value(head)?;

            self.eat_spaces();
            let head = self.next_byte()?;
            if head == b'}' {
                self.depth -= 1;
                self.newline();
                return Ok(());
            }
            if head != b',' {
                return Err(self.err_prev(format!(
                    "invalid character {:?} after object key:value pair",
                    head as char
                )));
            }
            mid = true;
        }
    }

    fn string(&mut self) -> Result<(), Error> {
        // SWAR skip across boring runs; escaping happens bytewise.
        while self.src.len() - self.read >= 8 {
            let word = arith::load8(&self.src[self.read..]);
            let stop = if self.html {
                arith::escape_html_index(word)
            } else {
                arith::string_stop_index(word)
            };
            self.read += stop;
            if stop != 8 {
                break;
            }
        }
        let mut esc = false;
        loop {
            if self.read >= self.src.len() {
                return Err(self.err("string literal not terminated".to_owned()));
            }
            let byte = self.src[self.read];
            if self.html && !esc && matches!(byte, b'<' | b'>' | b'&') {
                self.flush();
                self.dst.extend_from_slice(&[
                    b'\\',
                    b'u',
                    b'0',
                    b'0',
                    HEX[(byte >> 4) as usize],
                    HEX[(byte & 0xf) as usize],
                ]);
                self.read += 1;
                self.write = self.read;
                continue;
            }
            if self.html && byte == 0xe2 && self.read + 2 < self.src.len() {
                let (second, third) = (self.src[self.read + 1], self.src[self.read + 2]);
                if second == 0x80 && third & !1 == 0xa8 {
                    self.flush();
                    self.dst.extend_from_slice(&[
                        b'\\',
                        b'u',
                        b'2',
                        b'0',
                        b'2',
                        HEX[(third & 0xf) as usize],
                    ]);
                    self.read += 3;
                    self.write = self.read;
                    continue;
                }
            }
            self.read += 1;
            if esc {
                esc = false;
            } else if byte == b'"' {
                return Ok(());
            } else if byte == b'\\' {
                esc = true;
            }
        }
    }

    fn keyword(&mut self, word: &'static str) -> Result<(), Error> {
        let rest = &word.as_bytes()[1..];
        if self.read + rest.len() > self.src.len() {
            return Err(self.err("unexpected EOF reading a keyword".to_owned()));
        }
        let got = &self.src[self.read..self.read + rest.len()];
        if got != rest {
            return Err(self.err(format!("invalid characters in literal {}", word)));
        }
        self.read += rest.len();
        Ok(())
    }

    fn number(&mut self, head: u8) -> Result<(), Error> {
        let mut first = head;
        if head == b'-' {
            first = match self.src.get(self.read) {
                Some(byte) if byte.is_ascii_digit() => {
                    self.read += 1;
                    *byte
                }
                _ => return Err(self.err("JSON number ended with '-'".to_owned())),
            };
        }
        if first != b'0' {
            while self.src.get(self.read).is_some_and(u8::is_ascii_digit) {
                self.read += 1;
            }
        }
        if self.src.get(self.read) == Some(&b'.')
            && self.src.get(self.read + 1).is_some_and(u8::is_ascii_digit)
        {
            self.read += 2;
            while self.src.get(self.read).is_some_and(u8::is_ascii_digit) {
                self.read += 1;
            }
        }
        if matches!(self.src.get(self.read), Some(b'e') | Some(b'E')) {
            self.read += 1;
            if matches!(self.src.get(self.read), Some(b'+') | Some(b'-')) {
                self.read += 1;
            }
            let mut exp_digits = 0;
            while self.src.get(self.read).is_some_and(u8::is_ascii_digit) {
                self.read += 1;
                exp_digits += 1;
            }
            if exp_digits == 0 {
                return Err(self.err("JSON number ended with 'e' or 'E'".to_owned()));
            }
        }
        Ok(())
    }

    fn next_byte(&mut self) -> Result<u8, Error> {
        if self.read >= self.src.len() {
            return Err(self.err("unexpected EOF reading a byte".to_owned()));
        }
        let head = self.src[self.read];
        self.read += 1;
        Ok(head)
    }

    fn enter(&mut self) -> Result<(), Error> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.err("exceeded max depth".to_owned()));
        }
        Ok(())
    }

    fn eat_spaces(&mut self) {
        if self
            .src
            .get(self.read)
            .is_some_and(|byte| matches!(byte, b' ' | b'\t' | b'\n' | b'\r'))
        {
            self.flush();
            while self.src.len() - self.read >= 8 {
                let skip = arith::non_space_index(arith::load8(&self.src[self.read..]));
                self.read += skip;
                if skip != 8 {
                    self.write = self.read;
                    return;
                }
            }
            while self
                .src
                .get(self.read)
                .is_some_and(|byte| matches!(byte, b' ' | b'\t' | b'\n' | b'\r'))
            {
                self.read += 1;
            }
            self.write = self.read;
        }
    }

    fn flush(&mut self) {
        self.dst.extend_from_slice(&self.src[self.write..self.read]);
        self.write = self.read;
    }

    /// Break the line before the value head that was just consumed.
    fn newline(&mut self) {
        let Style::Indent { prefix, indent } = &self.style else {
            return;
        };
        self.read -= 1;
        self.dst.extend_from_slice(&self.src[self.write..self.read]);
        self.dst.push(b'\n');
        self.dst.extend_from_slice(prefix.as_bytes());
        for _ in 0..self.depth {
            self.dst.extend_from_slice(indent.as_bytes());
        }
        self.write = self.read;
        self.read += 1;
    }

    fn space_after_colon(&mut self) {
        if matches!(self.style, Style::Indent { .. }) {
            self.flush();
            self.dst.push(b' ');
        }
    }

    fn err(&self, msg: String) -> Error {
        Error::Syntax(SyntaxError::new(msg, self.read as u64))
    }

    /// An error pointing at the byte `next_byte` just consumed.
    fn err_prev(&self, msg: String) -> Error {
        Error::Syntax(SyntaxError::new(msg, self.read.saturating_sub(1) as u64))
    }
}

/// Append `src` to `dst` with `<`, `>`, `&`, U+2028 and U+2029 inside
/// string literals escaped, so the JSON is safe inside a `<script>` tag.
/// Formatting is preserved; the input is not validated.
pub fn html_escape(dst: &mut Vec<u8>, src: &[u8]) {
    let mut in_string = false;
    let mut esc = false;
    let mut write = 0;
    let mut read = 0;
    while read < src.len() {
        let byte = src[read];
        if in_string {
            if esc {
                esc = false;
            } else if byte == b'\\' {
                esc = true;
            } else if byte == b'"' {
                in_string = false;
            } else if matches!(byte, b'<' | b'>' | b'&') {
                dst.extend_from_slice(&src[write..read]);
                dst.extend_from_slice(&[
                    b'\\',
                    b'u',
                    b'0',
                    b'0',
                    HEX[(byte >> 4) as usize],
                    HEX[(byte & 0xf) as usize],
                ]);
                read += 1;
                write = read;
                continue;
            } else if byte == 0xe2
                && read + 2 < src.len()
                && src[read + 1] == 0x80
                && src[read + 2] & !1 == 0xa8
            {
                dst.extend_from_slice(&src[write..read]);
                dst.extend_from_slice(&[
                    b'\\',
                    b'u',
                    b'2',
                    b'0',
                    b'2',
                    HEX[(src[read + 2] & 0xf) as usize],
                ]);
                read += 3;
                write = read;
                continue;
            }
        } else if byte == b'"' {
            in_string = true;
        }
        read += 1;
    }
    dst.extend_from_slice(&src[write..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compacted(src: &str) -> String {
        let mut dst = Vec::new();
        compact(&mut dst, src.as_bytes()).map(|()| String::from_utf8_lossy(&dst).into_owned()).unwrap_or_else(|err| panic!("compact({src}): {err}"))
    }

    fn indented(src: &str, prefix: &str, ind: &str) -> String {
        let mut dst = Vec::new();
        indent(&mut dst, src.as_bytes(), prefix, ind).expect("indent failed");
        String::from_utf8_lossy(&dst).into_owned()
    }

    #[test]
    fn strips_insignificant_whitespace() {
        assert_eq!(
            compacted(" { \"a\" : [ 1 , 2.5 ,\ttrue, null ] } "),
            r#"{"a":[1,2.5,true,null]}"#
        );
        assert_eq!(compacted("\"spaces  kept\""), "\"spaces  kept\"");
    }

    #[test]
    fn compact_is_idempotent() {
        let once = compacted("{ \"k\" : [ \"v\" , {} , [ ] ] }");
        assert_eq!(compacted(&once), once);
    }

    #[test]
    fn indent_then_compact_round_trips() {
        let src = r#"{"a":[1,{"b":"x"}],"c":{}}"#;
        let pretty = indented(src, "", "\t");
        let mut back = Vec::new();
        compact(&mut back, pretty.as_bytes()).expect("recompact failed");
        assert_eq!(String::from_utf8_lossy(&back), src);
    }

    #[test]
    fn indent_layout_matches_contract() {
        assert_eq!(
            indented(r#"{"a":1,"b":[true]}"#, "", "\t"),
            "{\n\t\"a\": 1,\n\t\"b\": [\n\t\ttrue\n\t]\n}"
        );
        assert_eq!(indented("{}", "", "\t"), "{}");
        assert_eq!(indented("[]", "", "\t"), "[]");
    }

    #[test]
    fn rejects_trailing_garbage() {
        let mut dst = Vec::new();
        let err = compact(&mut dst, b"{} x").expect_err("trailing data");
        assert!(err.to_string().contains("after top-level value"));
        assert!(dst.is_empty());
    }

    #[test]
    fn rejects_malformed_nesting() {
        for bad in ["{", "[1,", "{\"a\"}", "[1 2]", "tru", "01", "-", "1e"] {
            let mut dst = Vec::new();
            assert!(compact(&mut dst, bad.as_bytes()).is_err(), "{}", bad);
        }
    }

    #[test]
    fn html_escape_rewrites_strings_only() {
        let mut dst = Vec::new();
        html_escape(&mut dst, br#"{"k<":"a<b>&c"}"#);
        assert_eq!(
            String::from_utf8_lossy(&dst),
            r#"{"k\u003c":"a\u003cb\u003e\u0026c"}"#
        );

        let mut dst = Vec::new();
        html_escape(&mut dst, "[\"\u{2028}\"]".as_bytes());
        assert_eq!(String::from_utf8_lossy(&dst), r#"["\u2028"]"#);
    }

    #[test]
    fn compact_reescapes_html_when_asked() {
        let mut dst = Vec::new();
        compact_escaped(&mut dst, br#"{"k": "<b>"}"#, true).expect("compact");
        assert_eq!(String::from_utf8_lossy(&dst), r#"{"k":"\u003cb\u003e"}"#);
    }
}
