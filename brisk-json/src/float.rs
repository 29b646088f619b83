//! Float parsing: an exact power-of-ten fast path for the common case,
//! with a correctly rounded general parser behind it.
//!
//! A decimal with at most 19 significant digits, a mantissa below 2^53 and
//! a decimal exponent within ±22 converts exactly with one multiply or
//! divide. Everything else goes to `lexical-parse-float`, which implements
//! the Eisel-Lemire algorithm with a complete slow path.

use lexical_parse_float::FromLexical;

// Exact f64 powers of ten. A lookup keeps the fast path bit-exact; the
// compiler is not allowed to fold 10^n for us.
static POW10: [f64; 23] = [
    1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10, 1e11, 1e12, 1e13, 1e14, 1e15, 1e16,
    1e17, 1e18, 1e19, 1e20, 1e21, 1e22,
];

const MAX_EXACT_MANT: u64 = (1 << 53) - 1;

/// Parse a syntactically valid RFC 8259 number literal.
///
/// Overflow saturates to infinity, which the caller reports as a range
/// error; JSON has no literal spelling for infinities.
pub(crate) fn parse_f64(literal: &[u8]) -> f64 {
    match split(literal) {
        Some((neg, mant, exp10)) => {
            if mant == 0 {
                return if neg { -0.0 } else { 0.0 };
            }
            if mant <= MAX_EXACT_MANT && (-22..=22).contains(&exp10) {
                let unsigned = if exp10 < 0 {
                    mant as f64 / POW10[(-exp10) as usize]
                } else {
                    mant as f64 * POW10[exp10 as usize]
                };
                return if neg { -unsigned } else { unsigned };
            }
            slow_parse(literal)
        }
        None => slow_parse(literal),
    }
}

fn slow_parse(literal: &[u8]) -> f64 {
    // The literal was validated by the scanner; a parse failure here would
    // mean the two grammars disagree, so fail closed with an overflow.
    f64::from_lexical(literal).unwrap_or(f64::INFINITY)
}

/// Split a literal into sign, integral mantissa and decimal exponent.
/// Returns `None` when the mantissa has too many significant digits to
/// hold exactly.
fn split(literal: &[u8]) -> Option<(bool, u64, i32)> {
    let mut idx = 0;
    let neg = literal.first() == Some(&b'-');
    if neg {
        idx += 1;
    }

    let mut mant = 0u64;
    let mut digits = 0u32;
    let mut exp10 = 0i32;

    while idx < literal.len() && literal[idx].is_ascii_digit() {
        if digits >= 19 {
            return None;
        }
        let digit = (literal[idx] - b'0') as u64;
        if mant != 0 || digit != 0 {
            mant = mant * 10 + digit;
            digits += 1;
        }
        idx += 1;
    }

    if idx < literal.len() && literal[idx] == b'.' {
        idx += 1;
        while idx < literal.len() && literal[idx].is_ascii_digit() {
            if digits >= 19 {
                return None;
            }
            let digit = (literal[idx] - b'0') as u64;
            if mant != 0 || digit != 0 {
                mant = mant * 10 + digit;
                digits += 1;
            }
            exp10 -= 1;
            idx += 1;
        }
    }

    if idx < literal.len() && (literal[idx] | 0x20) == b'e' {
        idx += 1;
        let exp_neg = match literal.get(idx) {
            Some(&b'-') => {
                idx += 1;
                true
            }
            Some(&b'+') => {
                idx += 1;
                false
            }
            _ => false,
        };
        let mut exp = 0i32;
        while idx < literal.len() && literal[idx].is_ascii_digit() {
            exp = exp.saturating_mul(10).saturating_add((literal[idx] - b'0') as i32);
            idx += 1;
        }
        exp10 = exp10.saturating_add(if exp_neg { -exp } else { exp });
    }

    Some((neg, mant, exp10))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_fast_path() {
        assert_eq!(parse_f64(b"0"), 0.0);
        assert_eq!(parse_f64(b"-0"), -0.0);
        assert!(parse_f64(b"-0").is_sign_negative());
        assert_eq!(parse_f64(b"1"), 1.0);
        assert_eq!(parse_f64(b"12.5"), 12.5);
        assert_eq!(parse_f64(b"-3.25e2"), -325.0);
        assert_eq!(parse_f64(b"1e22"), 1e22);
        assert_eq!(parse_f64(b"2.5e-22"), 2.5e-22);
    }

    #[test]
    fn slow_path_agrees_with_shortest_round_trip() {
        for text in [
            "2.2250738585072014e-308",
            "1.7976931348623157e308",
            "123456789012345678901234567890",
            "0.1",
            "3.141592653589793",
            "5e-324",
        ] {
            let via_std: f64 = text.parse().unwrap();
            assert_eq!(parse_f64(text.as_bytes()), via_std, "{}", text);
        }
    }

    #[test]
    fn overflow_saturates_to_infinity() {
        assert!(parse_f64(b"1e400").is_infinite());
        assert!(parse_f64(b"-1e400").is_infinite());
        assert!(parse_f64(b"-1e400") < 0.0);
    }

    #[test]
    fn long_zero_runs_stay_exact() {
        assert_eq!(parse_f64(b"0.00000000000000000000001"), 1e-23);
        assert_eq!(parse_f64(b"10000000000000000000000"), 1e22);
    }
}
