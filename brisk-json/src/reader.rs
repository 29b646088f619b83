//! Buffered input with SWAR whitespace skipping, string and number lexing,
//! and nesting-depth accounting.
//!
//! The buffer either borrows the caller's slice (in-memory decoding) or
//! owns a pooled, growable allocation refilled from an `io::Read`. All
//! offsets reported in errors are stream-absolute: `total` counts bytes
//! discarded before the buffer start, so `total + pos` is the input
//! offset. While `keep` is set, refills never discard the prefix, keeping
//! literal byte ranges contiguous for raw capture and the float slow path.

use std::borrow::Cow;
use std::io;

use crate::arith;
use crate::error::{syntax, Error};
use crate::pool;

/// Nesting bound, as permitted by RFC 8259 §9.
pub(crate) const MAX_DEPTH: usize = 10_000;

/// Minimum free space demanded before issuing a read.
const MIN_FILL: usize = pool::MIN;

pub(crate) struct ReaderBuf<'de> {
    buf: Cow<'de, [u8]>,
    pub(crate) pos: usize,
    total: usize,
    keep: bool,
    depth: usize,
    eof: bool,
    pooled: bool,
}

impl<'de> ReaderBuf<'de> {
    pub(crate) fn from_slice(data: &'de [u8]) -> Self {
        ReaderBuf {
            buf: Cow::Borrowed(data),
            pos: 0,
            total: 0,
            keep: false,
            depth: 0,
            eof: true,
            pooled: false,
        }
    }

    pub(crate) fn streaming() -> Self {
        ReaderBuf {
            buf: Cow::Owned(pool::get(MIN_FILL)),
            pos: 0,
            total: 0,
            keep: false,
            depth: 0,
            eof: false,
            pooled: true,
        }
    }

    #[inline]
    pub(crate) fn input_offset(&self) -> u64 {
        (self.total + self.pos) as u64
    }

    #[inline]
    pub(crate) fn buffered(&self) -> &[u8] {
        &self.buf[self.pos.min(self.buf.len())..]
    }

    /// Hand the owned buffer back to the pool. Call once, when the stream
    /// owner is done with it.
    pub(crate) fn release(&mut self) {
        if self.pooled {
            self.pooled = false;
            if let Cow::Owned(buf) = std::mem::replace(&mut self.buf, Cow::Borrowed(&[])) {
                pool::put(buf);
            }
        }
    }
}

pub(crate) struct DecSession<'r, 'de> {
    pub(crate) rd: &'r mut ReaderBuf<'de>,
    input: Option<&'r mut dyn io::Read>,
    pub(crate) disallow_unknown: bool,
    pub(crate) use_number: bool,
    scratch: Vec<u8>,
}

impl<'r, 'de> DecSession<'r, 'de> {
    pub(crate) fn new(rd: &'r mut ReaderBuf<'de>, input: Option<&'r mut dyn io::Read>) -> Self {
        DecSession {
            rd,
            input,
            disallow_unknown: false,
            use_number: false,
            scratch: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn input_offset(&self) -> u64 {
        self.rd.input_offset()
    }

    /// Offset of the byte a read operation just consumed. Syntax errors
    /// point at the offending byte itself.
    #[inline]
    pub(crate) fn offset_of_last(&self) -> u64 {
        self.rd.input_offset().saturating_sub(1)
    }

    /// Pull more bytes from the input. Returns the number read; zero means
    /// the source is exhausted.
    fn fill(&mut self) -> Result<usize, Error> {
        if self.rd.eof {
            return Ok(0);
        }
        let Some(input) = self.input.as_mut() else {
            self.rd.eof = true;
            return Ok(0);
        };
        let buf = match &mut self.rd.buf {
            Cow::Owned(buf) => buf,
            Cow::Borrowed(_) => {
                self.rd.eof = true;
                return Ok(0);
            }
        };

        let discard = if self.rd.keep { 0 } else { self.rd.pos };
        if discard > 0 && buf.capacity() - (buf.len() - discard) >= MIN_FILL {
            // The prefix is dead: slide the live bytes to the front.
            buf.drain(..discard);
            self.rd.total += discard;
            self.rd.pos -= discard;
        } else if buf.capacity() - buf.len() < MIN_FILL {
            // Grow through the pool, dropping the dead prefix on the way.
            let mut bigger = pool::get((buf.capacity() + 1) * 2);
            bigger.extend_from_slice(&buf[discard..]);
            let old = std::mem::replace(buf, bigger);
            pool::put(old);
            self.rd.total += discard;
            self.rd.pos -= discard;
        }

        let len = buf.len();
        buf.resize(buf.capacity(), 0);
        let read = match input.read(&mut buf[len..]) {
            Ok(read) => read,
            Err(err) => {
                buf.truncate(len);
                return Err(Error::Io(err));
            }
        };
        buf.truncate(len + read);
        if read == 0 {
            self.rd.eof = true;
        }
        Ok(read)
    }

    /// Next non-space byte, consumed, with depth accounting on `{ [ ] }`.
    pub(crate) fn read_byte(&mut self) -> Result<u8, Error> {
        loop {
            let buf = self.rd.buf.as_ref();
            let mut pos = self.rd.pos;
            while pos + 8 <= buf.len() {
                let skip = arith::non_space_index(arith::load8(&buf[pos..]));
                pos += skip;
                if skip < 8 {
                    break;
                }
            }
            while pos < buf.len() {
                let head = buf[pos];
                if matches!(head, b' ' | b'\t' | b'\n' | b'\r') {
                    pos += 1;
                    continue;
                }
                self.rd.pos = pos + 1;
                match head {
                    b'[' | b'{' => {
                        self.rd.depth += 1;
                        if self.rd.depth > MAX_DEPTH {
                            return Err(syntax("exceeded max depth", self.offset_of_last()));
                        }
                    }
                    b']' | b'}' => self.rd.depth = self.rd.depth.saturating_sub(1),
                    _ => {}
                }
                return Ok(head);
            }
            self.rd.pos = pos;
            if self.fill()? == 0 {
                return Err(syntax(
                    "unexpected EOF; tried to read a byte",
                    self.input_offset(),
                ));
            }
        }
    }

    /// Next non-space byte without consuming it. `None` at EOF.
    pub(crate) fn peek(&mut self) -> Result<Option<u8>, Error> {
        loop {
            let buf = self.rd.buf.as_ref();
            let mut pos = self.rd.pos;
            while pos < buf.len() {
                let head = buf[pos];
                if matches!(head, b' ' | b'\t' | b'\n' | b'\r') {
                    pos += 1;
                    continue;
                }
                self.rd.pos = pos;
                return Ok(Some(head));
            }
            self.rd.pos = pos;
            if self.fill()? == 0 {
                return Ok(None);
            }
        }
    }

    /// Next raw byte without consuming and without space skipping.
    pub(crate) fn peek_raw(&mut self) -> Result<Option<u8>, Error> {
        loop {
            if self.rd.pos < self.rd.buf.len() {
                return Ok(Some(self.rd.buf[self.rd.pos]));
            }
            if self.fill()? == 0 {
                return Ok(None);
            }
        }
    }

    /// Read exactly `n` bytes with no space skipping, for keyword tails.
    pub(crate) fn read_n(&mut self, n: usize) -> Result<&[u8], Error> {
        loop {
            if self.rd.buf.len() - self.rd.pos >= n {
                let start = self.rd.pos;
                self.rd.pos += n;
                return Ok(&self.rd.buf[start..start + n]);
            }
            if self.fill()? == 0 {
                return Err(syntax(
                    "unexpected EOF; tried to read a keyword",
                    self.input_offset(),
                ));
            }
        }
    }

    /// Consume the tail of a keyword whose head byte was already read.
    /// The reported offset is the first divergent byte.
    pub(crate) fn expect_keyword(&mut self, head: u8, tail: &'static str) -> Result<(), Error> {
        let offset = self.input_offset();
        let got = self.read_n(tail.len())?;
        if got != tail.as_bytes() {
            let diverged = got
                .iter()
                .zip(tail.as_bytes())
                .take_while(|(a, b)| a == b)
                .count();
            let got = String::from_utf8_lossy(got).into_owned();
            return Err(syntax(
                format!("expected {}{}, got: {}{}", head as char, tail, head as char, got),
                offset + diverged as u64,
            ));
        }
        Ok(())
    }

    /// Consume `ull` after an `n` head.
    pub(crate) fn expect_null(&mut self) -> Result<(), Error> {
        self.expect_keyword(b'n', "ull")
    }

    /// Begin keeping bytes from the already-consumed head onward.
    pub(crate) fn keep_from_head(&mut self) -> usize {
        self.rd.keep = true;
        self.rd.pos - 1
    }

    /// Stop keeping and return the kept literal range.
    pub(crate) fn take_kept(&mut self, start: usize) -> &[u8] {
        self.rd.keep = false;
        &self.rd.buf[start..self.rd.pos]
    }

    /// Stop keeping without taking the range.
    pub(crate) fn end_keep(&mut self) {
        self.rd.keep = false;
    }

    /// Re-borrow a literal range captured under keep mode. Valid until the
    /// next read operation.
    pub(crate) fn literal(&self, start: usize) -> &[u8] {
        &self.rd.buf[start..self.rd.pos]
    }

    /// Locate the closing quote of the string whose opening quote was just
    /// consumed. Returns the absolute end index and whether the content
    /// needs escape processing. The scan leaves `pos` untouched.
    fn scan_string_end(&mut self) -> Result<(usize, bool), Error> {
        let mut rel = 0usize;
        let mut special = false;
        let mut esc = false;
        loop {
            let buf = self.rd.buf.as_ref();
            let start = self.rd.pos;
            let mut idx = start + rel;
            if !esc && !special {
                while idx + 8 <= buf.len() {
                    let stop = arith::string_stop_index(arith::load8(&buf[idx..]));
                    idx += stop;
                    if stop < 8 {
                        break;
                    }
                }
            }
            while idx < buf.len() {
                let byte = buf[idx];
                if esc {
                    esc = false;
                } else if byte == b'"' {
                    return Ok((idx, special));
                } else if byte == b'\\' {
                    esc = true;
                    special = true;
                } else if byte < 0x20 {
                    special = true;
                }
                idx += 1;
            }
            rel = idx - start;
            if self.fill()? == 0 {
                return Err(syntax(
                    "string literal not terminated",
                    self.input_offset(),
                ));
            }
        }
    }

    /// Read a string body (opening quote already consumed) and return its
    /// unescaped bytes. The fast path aliases the read buffer; escaped
    /// strings are decoded into the session scratch. Bytes are coerced to
    /// well-formed UTF-8 at materialization.
    pub(crate) fn read_string(&mut self) -> Result<&[u8], Error> {
        let (end, special) = self.scan_string_end()?;
        let start = self.rd.pos;
        if !special {
            self.rd.pos = end + 1;
            return Ok(&self.rd.buf[start..end]);
        }
        self.unescape_into_scratch(start, end)?;
        self.rd.pos = end + 1;
        Ok(&self.scratch)
    }

    /// Skip over a string body without materializing it.
    pub(crate) fn consume_string(&mut self) -> Result<(), Error> {
        let (end, _) = self.scan_string_end()?;
        self.rd.pos = end + 1;
        Ok(())
    }

    fn unescape_into_scratch(&mut self, start: usize, end: usize) -> Result<(), Error> {
        let base = (self.rd.total + start) as u64;
        let src = &self.rd.buf[start..end];
        self.scratch.clear();
        self.scratch.reserve(src.len());
        let dst = &mut self.scratch;

        let mut idx = 0;
        while idx < src.len() {
            let byte = src[idx];
            if byte == b'\\' {
                idx += 1;
                if idx >= src.len() {
                    return Err(syntax("JSON string ended with \\", base + idx as u64));
                }
                match src[idx] {
                    b'"' => dst.push(b'"'),
                    b'\\' => dst.push(b'\\'),
                    b'/' => dst.push(b'/'),
                    b'b' => dst.push(0x08),
                    b'f' => dst.push(0x0c),
                    b'n' => dst.push(b'\n'),
                    b'r' => dst.push(b'\r'),
                    b't' => dst.push(b'\t'),
                    b'u' => {
                        let unit = parse_hex4(&src[idx + 1..], base + idx as u64)?;
                        idx += 4;
                        let rune = if (0xD800..0xDC00).contains(&unit) {
                            // High surrogate; pair with a following \uXXXX
                            // low surrogate or fall back to U+FFFD.
                            if src[idx + 1..].starts_with(b"\\u") {
                                let low = parse_hex4(&src[idx + 3..], base + idx as u64)?;
                                if (0xDC00..0xE000).contains(&low) {
                                    idx += 6;
                                    let high = (unit - 0xD800) as u32;
                                    let low = (low - 0xDC00) as u32;
                                    char::from_u32(0x10000 + (high << 10) + low)
                                        .unwrap_or(char::REPLACEMENT_CHARACTER)
                                } else {
                                    char::REPLACEMENT_CHARACTER
                                }
                            } else {
                                char::REPLACEMENT_CHARACTER
                            }
                        } else {
                            char::from_u32(unit as u32).unwrap_or(char::REPLACEMENT_CHARACTER)
                        };
                        let mut utf8 = [0u8; 4];
                        dst.extend_from_slice(rune.encode_utf8(&mut utf8).as_bytes());
                    }
                    other => {
                        return Err(syntax(
                            format!("invalid escape sequence: \\{}", other as char),
                            base + idx as u64,
                        ));
                    }
                }
                idx += 1;
            } else if byte < 0x20 {
                return Err(syntax(
                    format!("invalid control character {:?} in string", byte as char),
                    base + idx as u64,
                ));
            } else if byte < 0x80 {
                dst.push(byte);
                idx += 1;
            } else {
                // Coerce to well-formed UTF-8.
                let (rune, size) = decode_rune(&src[idx..]);
                let mut utf8 = [0u8; 4];
                dst.extend_from_slice(rune.encode_utf8(&mut utf8).as_bytes());
                idx += size;
            }
        }
        Ok(())
    }

    /// Consume a run of decimal digits into `acc`. Returns `None` when the
    /// accumulator overflows; the run is consumed either way.
    pub(crate) fn read_digits(&mut self, mut acc: u64) -> Result<Option<u64>, Error> {
        let mut overflow = false;
        loop {
            let buf = self.rd.buf.as_ref();
            let mut pos = self.rd.pos;
            while pos + 8 <= buf.len() {
                let word = arith::load8(&buf[pos..]);
                if !arith::is_8_digits(word) {
                    break;
                }
                if !overflow {
                    match acc
                        .checked_mul(100_000_000)
                        .and_then(|wide| wide.checked_add(arith::parse_8_digits(word)))
                    {
                        Some(next) => acc = next,
                        None => overflow = true,
                    }
                }
                pos += 8;
            }
            while pos < buf.len() {
                let byte = buf[pos];
                if !byte.is_ascii_digit() {
                    self.rd.pos = pos;
                    return Ok((!overflow).then_some(acc));
                }
                if !overflow {
                    match acc
                        .checked_mul(10)
                        .and_then(|wide| wide.checked_add((byte - b'0') as u64))
                    {
                        Some(next) => acc = next,
                        None => overflow = true,
                    }
                }
                pos += 1;
            }
            self.rd.pos = pos;
            if self.fill()? == 0 {
                return Ok((!overflow).then_some(acc));
            }
        }
    }

    /// Validate and consume the rest of a number literal whose head byte
    /// was already read. RFC 8259 grammar: optional minus, `0` or a
    /// non-zero digit run, optional fraction, optional exponent.
    pub(crate) fn consume_number(&mut self, head: u8) -> Result<(), Error> {
        let mut first = head;
        if head == b'-' {
            first = match self.peek_raw()? {
                Some(byte) if byte.is_ascii_digit() => {
                    self.rd.pos += 1;
                    byte
                }
                _ => {
                    return Err(syntax(
                        "JSON number ended with '-'",
                        self.input_offset(),
                    ))
                }
            };
        }
        if first != b'0' {
            self.skip_digit_run()?;
        }

        if self.peek_raw()? == Some(b'.') {
            self.rd.pos += 1;
            match self.peek_raw()? {
                Some(byte) if byte.is_ascii_digit() => self.skip_digit_run()?,
                _ => {
                    return Err(syntax(
                        "number literal ended with .",
                        self.input_offset(),
                    ))
                }
            }
        }

        if matches!(self.peek_raw()?, Some(b'e') | Some(b'E')) {
            self.rd.pos += 1;
            if matches!(self.peek_raw()?, Some(b'+') | Some(b'-')) {
                self.rd.pos += 1;
            }
            match self.peek_raw()? {
                Some(byte) if byte.is_ascii_digit() => self.skip_digit_run()?,
                _ => {
                    return Err(syntax(
                        "number literal ended with e or E",
                        self.input_offset(),
                    ))
                }
            }
        }
        Ok(())
    }

    fn skip_digit_run(&mut self) -> Result<(), Error> {
        loop {
            let buf = self.rd.buf.as_ref();
            let mut pos = self.rd.pos;
            while pos < buf.len() && buf[pos].is_ascii_digit() {
                pos += 1;
            }
            if pos < buf.len() {
                self.rd.pos = pos;
                return Ok(());
            }
            self.rd.pos = pos;
            if self.fill()? == 0 {
                return Ok(());
            }
        }
    }

    /// True when the next value in the current container is a digit head,
    /// keyword head, or punctuation that begins a value.
    pub(crate) fn more(&mut self) -> Result<bool, Error> {
        Ok(matches!(self.peek()?, Some(byte) if byte != b']' && byte != b'}'))
    }
}

fn parse_hex4(src: &[u8], offset: u64) -> Result<u16, Error> {
    if src.len() < 4 {
        return Err(syntax("not enough space to create a rune", offset));
    }
    let mut unit = 0u16;
    for &byte in &src[..4] {
        let digit = match byte {
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte - b'a' + 10,
            b'A'..=b'F' => byte - b'A' + 10,
            _ => {
                return Err(syntax(
                    format!("invalid character {:?} in \\u escape", byte as char),
                    offset,
                ))
            }
        };
        unit = unit << 4 | digit as u16;
    }
    Ok(unit)
}

/// Decode one rune from the head of `src`, coercing malformed UTF-8 to
/// U+FFFD with the length std's lossy conversion would use.
fn decode_rune(src: &[u8]) -> (char, usize) {
    let window = &src[..src.len().min(4)];
    match core::str::from_utf8(window) {
        Ok(text) => match text.chars().next() {
            Some(rune) => (rune, rune.len_utf8()),
            None => (char::REPLACEMENT_CHARACTER, 1),
        },
        Err(err) if err.valid_up_to() > 0 => {
            let rune = match core::str::from_utf8(&window[..err.valid_up_to()]) {
                Ok(text) => text.chars().next().unwrap_or(char::REPLACEMENT_CHARACTER),
                Err(_) => char::REPLACEMENT_CHARACTER,
            };
            (rune, rune.len_utf8())
        }
        Err(err) => (
            char::REPLACEMENT_CHARACTER,
            err.error_len().unwrap_or(1).max(1),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_over<'r, 'de>(rd: &'r mut ReaderBuf<'de>) -> DecSession<'r, 'de> {
        DecSession::new(rd, None)
    }

    #[test]
    fn read_byte_skips_whitespace_and_counts_depth() {
        let mut rd = ReaderBuf::from_slice(b"   \t\n {  \"k\" ");
        let mut sess = session_over(&mut rd);
        assert_eq!(sess.read_byte().unwrap(), b'{');
        assert_eq!(sess.read_byte().unwrap(), b'"');
        assert_eq!(sess.input_offset(), 8);
    }

    #[test]
    fn strings_fast_path_aliases_buffer() {
        let mut rd = ReaderBuf::from_slice(b"\"hello world\" tail");
        let mut sess = session_over(&mut rd);
        assert_eq!(sess.read_byte().unwrap(), b'"');
        assert_eq!(sess.read_string().unwrap(), b"hello world");
        assert_eq!(sess.read_byte().unwrap(), b't');
    }

    #[test]
    fn strings_decode_escapes() {
        let mut rd = ReaderBuf::from_slice(br#""a\nb\tA\\""#);
        let mut sess = session_over(&mut rd);
        sess.read_byte().unwrap();
        assert_eq!(sess.read_string().unwrap(), b"a\nb\tA\\");
    }

    #[test]
    fn surrogate_pairs_combine() {
        let mut rd = ReaderBuf::from_slice(br#""\uD834\uDD1E""#);
        let mut sess = session_over(&mut rd);
        sess.read_byte().unwrap();
        assert_eq!(sess.read_string().unwrap(), "\u{1D11E}".as_bytes());
        assert_eq!("\u{1D11E}".as_bytes(), &[0xF0, 0x9D, 0x84, 0x9E]);
    }

    #[test]
    fn lone_surrogates_become_replacement() {
        let mut rd = ReaderBuf::from_slice(br#""\uD834x""#);
        let mut sess = session_over(&mut rd);
        sess.read_byte().unwrap();
        assert_eq!(sess.read_string().unwrap(), "\u{FFFD}x".as_bytes());
    }

    #[test]
    fn control_bytes_are_syntax_errors() {
        let mut rd = ReaderBuf::from_slice(b"\"a\x01b\"");
        let mut sess = session_over(&mut rd);
        sess.read_byte().unwrap();
        assert!(matches!(sess.read_string(), Err(Error::Syntax(_))));
    }

    #[test]
    fn digits_gulp_eight_at_a_time() {
        let mut rd = ReaderBuf::from_slice(b"123456789012345,");
        let mut sess = session_over(&mut rd);
        assert_eq!(sess.read_digits(0).unwrap(), Some(123_456_789_012_345));
        assert_eq!(sess.read_byte().unwrap(), b',');
    }

    #[test]
    fn digits_detect_overflow() {
        let mut rd = ReaderBuf::from_slice(b"99999999999999999999999999]");
        let mut sess = session_over(&mut rd);
        assert_eq!(sess.read_digits(0).unwrap(), None);
        assert_eq!(sess.read_byte().unwrap(), b']');
    }

    #[test]
    fn number_grammar_is_validated() {
        for ok in ["0", "-1", "1.25", "20e2", "3E-4", "0.5e+6"] {
            let text = format!("{} ", ok);
            let mut rd = ReaderBuf::from_slice(text.as_bytes());
            let mut sess = session_over(&mut rd);
            let head = sess.read_byte().unwrap();
            assert!(sess.consume_number(head).is_ok(), "{}", ok);
        }
        for bad in ["-", "1.", "2e", "3e+"] {
            let text = format!("{} ", bad);
            let mut rd = ReaderBuf::from_slice(text.as_bytes());
            let mut sess = session_over(&mut rd);
            let head = sess.read_byte().unwrap();
            assert!(sess.consume_number(head).is_err(), "{}", bad);
        }
    }

    #[test]
    fn streaming_refills_across_chunks() {
        struct Trickle<'a>(&'a [u8]);
        impl io::Read for Trickle<'_> {
            fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
                let n = self.0.len().min(3).min(out.len());
                out[..n].copy_from_slice(&self.0[..n]);
                self.0 = &self.0[n..];
                Ok(n)
            }
        }
        let mut source = Trickle(b"  \"streamed across reads\"  ");
        let mut rd = ReaderBuf::streaming();
        let mut sess = DecSession::new(&mut rd, Some(&mut source));
        assert_eq!(sess.read_byte().unwrap(), b'"');
        assert_eq!(sess.read_string().unwrap(), b"streamed across reads");
        rd.release();
    }

    #[test]
    fn keep_mode_retains_literal_ranges() {
        let mut rd = ReaderBuf::from_slice(b"12.5e3,");
        let mut sess = session_over(&mut rd);
        let head = sess.read_byte().unwrap();
        let start = sess.keep_from_head();
        sess.consume_number(head).unwrap();
        assert_eq!(sess.take_kept(start), b"12.5e3");
    }

    #[test]
    fn depth_bound_is_enforced() {
        let mut nested = Vec::new();
        nested.extend(std::iter::repeat(b'[').take(MAX_DEPTH + 1));
        let mut rd = ReaderBuf::from_slice(&nested);
        let mut sess = session_over(&mut rd);
        let mut result = Ok(0u8);
        for _ in 0..=MAX_DEPTH {
            result = sess.read_byte();
            if result.is_err() {
                break;
            }
        }
        match result {
            Err(Error::Syntax(err)) => assert!(err.to_string().contains("max depth")),
            other => panic!("expected depth error, got {:?}", other.map(|b| b as char)),
        }
    }
}
