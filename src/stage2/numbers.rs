/*!
Number parsing.

The grammar is validated by hand so malformed numbers fail with
[`Error::Number`], then the value takes one of two routes: integers that fit
are accumulated directly, and everything else goes through the standard
library's decimal-to-double conversion, which produces the correctly-rounded
nearest `f64`.
*/

use crate::{
    error::{Error, Result},
    stage1,
};

/**
A parsed JSON number.

Integers that fit in an `i64` are always `I64`; positive integers that only
fit in a `u64` are `U64`; everything else (fractions, exponents, and integers
wider than 64 bits) is `F64`.
*/
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Number {
    I64(i64),
    U64(u64),
    F64(f64),
}

/**
Parse the number starting at `input[start]`.

`limit` is the offset of the next structural token (or the end of the input)
and just bounds the scan; the number itself ends at the first byte outside
the number grammar, which must be a structural character or whitespace.
*/
pub(crate) fn parse(input: &[u8], start: usize, limit: usize) -> Result<Number> {
    let bytes = get_unchecked!(input, start..limit.min(input.len()));

    let mut i = 0;

    let negative = bytes.first() == Some(&b'-');
    if negative {
        i += 1;
    }

    // integer part: either a lone `0` or a non-zero digit run
    let mut mantissa = 0u64;
    let mut overflow = false;

    match bytes.get(i) {
        Some(&b'0') => {
            i += 1;

            if let Some(b'0'..=b'9') = bytes.get(i) {
                // leading zeros are not allowed
                return Err(Error::Number);
            }
        }
        Some(&(b'1'..=b'9')) => {
            while let Some(&b @ b'0'..=b'9') = bytes.get(i) {
                mantissa = match mantissa
                    .checked_mul(10)
                    .and_then(|m| m.checked_add((b - b'0') as u64))
                {
                    Some(mantissa) => mantissa,
                    None => {
                        overflow = true;
                        0
                    }
                };
                i += 1;
            }
        }
        _ => return Err(Error::Number),
    }

    let mut is_float = false;

    if bytes.get(i) == Some(&b'.') {
        is_float = true;
        i += 1;

        // at least one fraction digit
        match bytes.get(i) {
            Some(b'0'..=b'9') => i += 1,
            _ => return Err(Error::Number),
        }

        while let Some(b'0'..=b'9') = bytes.get(i) {
            i += 1;
        }
    }

    if let Some(b'e' | b'E') = bytes.get(i) {
        is_float = true;
        i += 1;

        if let Some(b'+' | b'-') = bytes.get(i) {
            i += 1;
        }

        // at least one exponent digit
        match bytes.get(i) {
            Some(b'0'..=b'9') => i += 1,
            _ => return Err(Error::Number),
        }

        while let Some(b'0'..=b'9') = bytes.get(i) {
            i += 1;
        }
    }

    // the token must end cleanly: `123abc` and `1.2.3` are not numbers
    if let Some(&b) = bytes.get(i) {
        if !stage1::is_structural_or_ws(b) {
            return Err(Error::Number);
        }
    }

    if !is_float && !overflow {
        return Ok(if negative {
            // two's complement gives `-i64::MIN` one more value than
            // `i64::MAX`, so compare against the magnitude
            const MIN_MAGNITUDE: u64 = i64::MAX as u64 + 1;

            match mantissa {
                MIN_MAGNITUDE => Number::I64(i64::MIN),
                m if m < MIN_MAGNITUDE => Number::I64(-(m as i64)),
                _ => return parse_f64(bytes, i),
            }
        } else if mantissa <= i64::MAX as u64 {
            Number::I64(mantissa as i64)
        } else {
            Number::U64(mantissa)
        });
    }

    parse_f64(bytes, i)
}

#[cold]
fn parse_f64(bytes: &[u8], len: usize) -> Result<Number> {
    let text = from_utf8_unchecked!(get_unchecked!(bytes, ..len));

    // the grammar was already checked, so this only fails on shapes `f64`
    // itself can't represent, which JSON doesn't have
    text.parse().map(Number::F64).map_err(|_| Error::Number)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(input: &[u8]) -> Result<Number> {
        parse(input, 0, input.len())
    }

    #[test]
    fn integers() {
        assert_eq!(Ok(Number::I64(0)), num(b"0"));
        assert_eq!(Ok(Number::I64(0)), num(b"-0"));
        assert_eq!(Ok(Number::I64(42)), num(b"42"));
        assert_eq!(Ok(Number::I64(-17)), num(b"-17"));
        assert_eq!(Ok(Number::I64(i64::MAX)), num(b"9223372036854775807"));
        assert_eq!(Ok(Number::I64(i64::MIN)), num(b"-9223372036854775808"));
    }

    #[test]
    fn unsigned_integers() {
        assert_eq!(Ok(Number::U64(9223372036854775808)), num(b"9223372036854775808"));
        assert_eq!(Ok(Number::U64(u64::MAX)), num(b"18446744073709551615"));
    }

    #[test]
    fn doubles() {
        assert_eq!(Ok(Number::F64(1.5)), num(b"1.5"));
        assert_eq!(Ok(Number::F64(-0.25)), num(b"-0.25"));
        assert_eq!(Ok(Number::F64(1e10)), num(b"1e10"));
        assert_eq!(Ok(Number::F64(1.5e-3)), num(b"1.5e-3"));
        assert_eq!(Ok(Number::F64(2e2)), num(b"2E+2"));

        // integers wider than 64 bits round to the nearest double
        assert_eq!(Ok(Number::F64(1e20)), num(b"100000000000000000000"));
        assert_eq!(Ok(Number::F64(-1e20)), num(b"-100000000000000000000"));
    }

    #[test]
    fn rounding_is_exact() {
        // the classic halfway cases the conversion has to get right
        assert_eq!(Ok(Number::F64(7.2057594037927933e16)), num(b"7.2057594037927933e16"));
        assert_eq!(Ok(Number::F64(2.2250738585072011e-308)), num(b"2.2250738585072011e-308"));
    }

    #[test]
    fn malformed() {
        assert_eq!(Err(Error::Number), num(b"-"));
        assert_eq!(Err(Error::Number), num(b"01"));
        assert_eq!(Err(Error::Number), num(b"1."));
        assert_eq!(Err(Error::Number), num(b".5"));
        assert_eq!(Err(Error::Number), num(b"1e"));
        assert_eq!(Err(Error::Number), num(b"1e+"));
        assert_eq!(Err(Error::Number), num(b"1.2.3"));
        assert_eq!(Err(Error::Number), num(b"123abc"));
        assert_eq!(Err(Error::Number), num(b"+1"));
    }

    #[test]
    fn terminated_by_structurals() {
        assert_eq!(Ok(Number::I64(1)), parse(b"1,2", 0, 3));
        assert_eq!(Ok(Number::I64(2)), parse(b"1,2", 2, 3));
        assert_eq!(Ok(Number::I64(3)), parse(b"3]", 0, 2));
        assert_eq!(Ok(Number::I64(4)), parse(b"4 ", 0, 2));
    }
}
