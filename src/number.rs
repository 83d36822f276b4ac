use crate::cell::{Wflt, Wint};

/// One numeric literal. Doubles keep the ANS cell order, low half first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    Single(Wint),
    Double(Wint, Wint),
    Float(Wflt),
}

/// Convert one token under the current base. Syntax: optional sign, then
/// a radix prefix `$` (16) `#` (10) `%` (2), or `'c'` for a char code, or
/// digits with a trailing `.` for a double pair, or a decimal float when
/// the base is ten. Anything else is not a number.
pub fn parse_number(tok: &str, base: u32) -> Option<Number> {
    let (neg, rest) = match tok.as_bytes().first() {
        Some(b'-') => (true, &tok[1..]),
        Some(b'+') => (false, &tok[1..]),
        _ => (false, tok),
    };
    if let Some(inner) = rest.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
        let mut chars = inner.chars();
        let c = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        let n = c as Wint;
        return Some(Number::Single(if neg { -n } else { n }));
    }
    let (radix, prefixed, digits) = match rest.as_bytes().first() {
        Some(b'$') => (16, true, &rest[1..]),
        Some(b'#') => (10, true, &rest[1..]),
        Some(b'%') => (2, true, &rest[1..]),
        _ => (base, false, rest),
    };
    if digits.is_empty() {
        return None;
    }
    if let Some(d) = digits.strip_suffix('.') {
        return parse_double(d, radix, neg);
    }
    if radix == 10 && !prefixed && looks_float(digits) {
        let f: Wflt = digits.parse().ok()?;
        return Some(Number::Float(if neg { -f } else { f }));
    }
    // unsigned view so the full 64-bit pattern is writable in any base
    let u = u64::from_str_radix(digits, radix).ok()?;
    let n = if neg {
        (u as Wint).wrapping_neg()
    } else {
        u as Wint
    };
    Some(Number::Single(n))
}

fn parse_double(digits: &str, radix: u32, neg: bool) -> Option<Number> {
    if digits.is_empty() {
        return None;
    }
    let u = u128::from_str_radix(digits, radix).ok()?;
    let v = if neg { u.wrapping_neg() } else { u };
    Some(Number::Double(v as Wint, (v >> 64) as Wint))
}

// mantissa with an optional fraction and exponent; a leading digit keeps
// plain words like `.s` or `e` out of the numeric path
fn looks_float(s: &str) -> bool {
    let bytes = s.as_bytes();
    if !bytes[0].is_ascii_digit() {
        return false;
    }
    let mut seen_marker = false;
    for b in bytes {
        match b {
            b'0'..=b'9' => {}
            b'.' | b'e' | b'E' => seen_marker = true,
            b'+' | b'-' => {}
            _ => return false,
        }
    }
    seen_marker
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singles() {
        assert_eq!(Some(Number::Single(123)), parse_number("123", 10));
        assert_eq!(Some(Number::Single(-45)), parse_number("-45", 10));
        assert_eq!(Some(Number::Single(45)), parse_number("+45", 10));
        assert_eq!(Some(Number::Single(255)), parse_number("ff", 16));
        assert_eq!(Some(Number::Single(255)), parse_number("$FF", 10));
        assert_eq!(Some(Number::Single(10)), parse_number("#10", 16));
        assert_eq!(Some(Number::Single(5)), parse_number("%101", 10));
        assert_eq!(Some(Number::Single(-1)), parse_number("$ffffffffffffffff", 10));
    }

    #[test]
    fn test_char_literal() {
        assert_eq!(Some(Number::Single(65)), parse_number("'A'", 10));
        assert_eq!(Some(Number::Single(0x44e)), parse_number("'ю'", 10));
        assert_eq!(None, parse_number("'ab'", 10));
        assert_eq!(None, parse_number("''", 10));
    }

    #[test]
    fn test_doubles() {
        assert_eq!(Some(Number::Double(7, 0)), parse_number("7.", 10));
        assert_eq!(Some(Number::Double(-7, -1)), parse_number("-7.", 10));
        assert_eq!(Some(Number::Double(0, 1)), parse_number("18446744073709551616.", 10));
        assert_eq!(Some(Number::Double(0x123, 0)), parse_number("$123.", 10));
    }

    #[test]
    fn test_floats() {
        assert_eq!(Some(Number::Float(1.5)), parse_number("1.5", 10));
        assert_eq!(Some(Number::Float(-0.25)), parse_number("-0.25", 10));
        assert_eq!(Some(Number::Float(1e5)), parse_number("1e5", 10));
        assert_eq!(Some(Number::Float(2.5e-3)), parse_number("2.5e-3", 10));
        // hex base: e is a digit, not an exponent
        assert_eq!(Some(Number::Single(0x1e5)), parse_number("1e5", 16));
        // explicit decimal prefix stays integral
        assert_eq!(None, parse_number("#1e5", 10));
    }

    #[test]
    fn test_rejects() {
        assert_eq!(None, parse_number("", 10));
        assert_eq!(None, parse_number("-", 10));
        assert_eq!(None, parse_number("+", 10));
        assert_eq!(None, parse_number("$", 10));
        assert_eq!(None, parse_number("swap", 10));
        assert_eq!(None, parse_number("1_000", 10));
        assert_eq!(None, parse_number("1.2.3", 10));
        assert_eq!(None, parse_number(".5", 10));
        assert_eq!(None, parse_number("e", 10));
        assert_eq!(None, parse_number("ff", 10));
    }
}
