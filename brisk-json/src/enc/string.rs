//! Escape emission. The scan walks 8 bytes at a time with a SWAR
//! predicate; runs that need no attention are copied wholesale.

use crate::arith;

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Append `text` as a quoted JSON string.
///
/// Escapes `"`, `\` and control bytes with the short names where they
/// exist, `\u00XX` otherwise. U+2028 and U+2029 are escaped
/// unconditionally: they are valid JSON but break JavaScript embedding.
/// `html` additionally escapes `<`, `>` and `&`.
pub(crate) fn append_string(out: &mut Vec<u8>, text: &str, html: bool) {
    out.push(b'"');
    let src = text.as_bytes();
    let idx = first_escape(src, html);
    if idx == src.len() {
        out.extend_from_slice(src);
        out.push(b'"');
        return;
    }
    append_escaped_slow(out, text, html, idx);
    out.push(b'"');
}

fn first_escape(src: &[u8], html: bool) -> usize {
    let mut idx = 0;
    while idx + 8 <= src.len() {
        let word = arith::load8(&src[idx..]);
        let stop = if html {
            arith::escape_html_index(word)
        } else {
            arith::escape_index(word)
        };
        idx += stop;
        if stop < 8 {
            return idx;
        }
    }
    while idx < src.len() {
        if needs_escape(src[idx], html) {
            return idx;
        }
        idx += 1;
    }
    idx
}

#[inline]
fn needs_escape(byte: u8, html: bool) -> bool {
    byte == b'"'
        || byte == b'\\'
        || byte < 0x20
        || byte >= 0x80
        || (html && matches!(byte, b'<' | b'>' | b'&'))
}

fn append_escaped_slow(out: &mut Vec<u8>, text: &str, html: bool, first: usize) {
    out.extend_from_slice(&text.as_bytes()[..first]);
    let mut rest = &text[first..];
    while let Some(rune) = rest.chars().next() {
        let size = rune.len_utf8();
        match rune {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            '<' | '>' | '&' if html => {
                let byte = rune as u8;
                out.extend_from_slice(&[b'\\', b'u', b'0', b'0', HEX[(byte >> 4) as usize], HEX[(byte & 0xf) as usize]]);
            }
            rune if (rune as u32) < 0x20 => {
                let byte = rune as u8;
                out.extend_from_slice(&[b'\\', b'u', b'0', b'0', HEX[(byte >> 4) as usize], HEX[(byte & 0xf) as usize]]);
            }
            '\u{2028}' | '\u{2029}' => {
                let low = (rune as u32) & 0xf;
                out.extend_from_slice(&[b'\\', b'u', b'2', b'0', b'2', HEX[low as usize]]);
            }
            rune => {
                let mut utf8 = [0u8; 4];
                out.extend_from_slice(rune.encode_utf8(&mut utf8).as_bytes());
            }
        }
        rest = &rest[size..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quoted(text: &str, html: bool) -> String {
        let mut out = Vec::new();
        append_string(&mut out, text, html);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn plain_strings_copy_through() {
        assert_eq!(quoted("hello world", true), r#""hello world""#);
        assert_eq!(quoted("", true), r#""""#);
    }

    #[test]
    fn short_escapes_win() {
        assert_eq!(quoted("a\"b\\c\nd\te\r", false), r#""a\"b\\c\nd\te\r""#);
        assert_eq!(
            quoted("\u{8}\u{c}\u{1f}", false),
            r#""\u0008\u000c\u001f""#
        );
    }

    #[test]
    fn html_set_is_optional() {
        assert_eq!(quoted("<tag>", true), r#""\u003ctag\u003e""#);
        assert_eq!(quoted("<tag>", false), r#""<tag>""#);
        assert_eq!(quoted("a&b", true), r#""a\u0026b""#);
    }

    #[test]
    fn line_separators_always_escape() {
        assert_eq!(quoted("x\u{2028}y\u{2029}", false), r#""x\u2028y\u2029""#);
        assert_eq!(quoted("x\u{2028}", true), r#""x\u2028""#);
    }

    #[test]
    fn multibyte_passes_through() {
        assert_eq!(quoted("héllo", false), "\"héllo\"");
        assert_eq!(quoted("日本語", true), "\"日本語\"");
    }
}
