//! SWAR predicates over 8 packed bytes.
//!
//! Words are loaded little-endian, so the lowest byte of the word is the
//! first byte of the chunk and `trailing_zeros >> 3` recovers the index of
//! the first flagged byte. Every predicate confines its result to the high
//! bit of each lane.

const X01: u64 = 0x0101_0101_0101_0101;
const X80: u64 = 0x8080_8080_8080_8080;

/// Load an 8-byte chunk.
#[inline]
pub(crate) fn load8(src: &[u8]) -> u64 {
    let mut chunk = [0u8; 8];
    chunk.copy_from_slice(&src[..8]);
    u64::from_le_bytes(chunk)
}

/// High bit set in every lane whose byte is zero.
#[inline]
const fn zero_lanes(word: u64) -> u64 {
    word.wrapping_sub(X01) & !word & X80
}

/// High bit set in every lane equal to `byte`.
#[inline]
const fn eq_lanes(word: u64, byte: u8) -> u64 {
    zero_lanes(word ^ (X01 * byte as u64))
}

/// High bit set in every lane strictly below `limit` (`limit` ≤ 0x80).
#[inline]
const fn lt_lanes(word: u64, limit: u8) -> u64 {
    word.wrapping_sub(X01 * limit as u64) & !word & X80
}

#[inline]
const fn first_lane(mask: u64) -> usize {
    (mask.trailing_zeros() >> 3) as usize
}

/// Index of the first byte an encoded string must escape: `"`, `\`,
/// control bytes below 0x20, or any byte ≥ 0x80 (multibyte sequences are
/// inspected by the slow path). Returns 8 when the chunk is clean.
#[inline]
pub(crate) const fn escape_index(word: u64) -> usize {
    let mask = eq_lanes(word, b'"') | eq_lanes(word, b'\\') | lt_lanes(word, 0x20) | (word & X80);
    first_lane(mask)
}

/// Like [`escape_index`], with the HTML-safe additions `<`, `>`, `&`.
#[inline]
pub(crate) const fn escape_html_index(word: u64) -> usize {
    let mask = eq_lanes(word, b'"')
        | eq_lanes(word, b'\\')
        | lt_lanes(word, 0x20)
        | (word & X80)
        | eq_lanes(word, b'<')
        | eq_lanes(word, b'>')
        | eq_lanes(word, b'&');
    first_lane(mask)
}

/// Index of the first byte that is not JSON whitespace. Returns 8 for an
/// all-space chunk.
#[inline]
pub(crate) const fn non_space_index(word: u64) -> usize {
    let space = eq_lanes(word, b' ')
        | eq_lanes(word, b'\t')
        | eq_lanes(word, b'\n')
        | eq_lanes(word, b'\r');
    first_lane(!space & X80)
}

/// Index of the first byte that stops a raw string scan: `"`, `\`, or a
/// control byte. Returns 8 for a boring chunk.
#[inline]
pub(crate) const fn string_stop_index(word: u64) -> usize {
    let mask = eq_lanes(word, b'"') | eq_lanes(word, b'\\') | lt_lanes(word, 0x20);
    first_lane(mask)
}

/// True when all 8 bytes are ASCII digits.
#[inline]
pub(crate) const fn is_8_digits(word: u64) -> bool {
    word & word.wrapping_add(X01 * 0x06) & (X01 * 0xf0) == X01 * 0x30
}

/// Parse 8 ASCII digits into their value. Caller guarantees
/// [`is_8_digits`].
#[inline]
pub(crate) const fn parse_8_digits(word: u64) -> u64 {
    let word = (word & 0x0F0F_0F0F_0F0F_0F0F).wrapping_mul(2561) >> 8;
    let word = (word & 0x00FF_00FF_00FF_00FF).wrapping_mul(6_553_601) >> 16;
    (word & 0x0000_FFFF_0000_FFFF).wrapping_mul(42_949_672_960_001) >> 32
}

/// ASCII-lowercase all 8 bytes. Caller guarantees the chunk is pure ASCII;
/// only lanes in `A..=Z` change.
#[inline]
pub(crate) const fn to_lower8(word: u64) -> u64 {
    let ge_upper = word.wrapping_add(X01 * (0x80 - b'A' as u64)) & X80;
    let gt_z = word.wrapping_add(X01 * (0x80 - (b'Z' as u64 + 1))) & X80;
    let upper = ge_upper & !gt_z;
    word + (upper >> 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(f: impl Fn(u64) -> usize, src: &[u8; 8]) -> usize {
        f(u64::from_le_bytes(*src))
    }

    #[test]
    fn escape_finds_first_offender() {
        assert_eq!(scan(escape_index, b"abcdefgh"), 8);
        assert_eq!(scan(escape_index, b"abc\"defg"), 3);
        assert_eq!(scan(escape_index, b"\\bcdefgh"), 0);
        assert_eq!(scan(escape_index, b"abcdefg\n"), 7);
        assert_eq!(scan(escape_index, "abé-fgh".as_bytes().try_into().unwrap()), 2);
        assert_eq!(scan(escape_index, b"a<b>c&de"), 8);
        assert_eq!(scan(escape_html_index, b"a<b>c&de"), 1);
    }

    #[test]
    fn non_space_stops_at_content() {
        assert_eq!(scan(non_space_index, b"        "), 8);
        assert_eq!(scan(non_space_index, b" \t\r\n  {x"), 6);
        assert_eq!(scan(non_space_index, b"x       "), 0);
    }

    #[test]
    fn digit_gulp() {
        assert!(is_8_digits(u64::from_le_bytes(*b"12345678")));
        assert!(!is_8_digits(u64::from_le_bytes(*b"1234567e")));
        assert!(!is_8_digits(u64::from_le_bytes(*b"12345 78")));
        assert_eq!(parse_8_digits(u64::from_le_bytes(*b"12345678")), 12_345_678);
        assert_eq!(parse_8_digits(u64::from_le_bytes(*b"00000000")), 0);
        assert_eq!(parse_8_digits(u64::from_le_bytes(*b"99999999")), 99_999_999);
    }

    #[test]
    fn lowercase_is_selective() {
        let folded = to_lower8(u64::from_le_bytes(*b"Az_09Zza"));
        assert_eq!(folded.to_le_bytes(), *b"az_09zza");
    }
}
