/*!
String unescaping.

Escape handling is shared between the two read paths: Stage 2 unescapes into
the parser's string arena as it builds the tape, and the on-demand reader
unescapes into a fresh allocation only when a string that actually contains
escapes is read.

Unlike the rest of a string, which is copied over in whole spans, escapes are
processed one sequence at a time through [`escape_into`].
*/

use crate::{
    error::{Error, Result},
    std_ext::char as char_ext,
};

/**
Process the escape sequence starting at the `\` at `input[at]`.

The unescaped bytes are pushed onto `buf` and the offset just past the
sequence is returned. Unknown escapes and bad `\u` sequences (including
unpaired surrogates) are [`Error::String`].
*/
pub(crate) fn escape_into(input: &[u8], at: usize, buf: &mut Vec<u8>) -> Result<usize> {
    // peek the escape char
    let escape = match input.get(at + 1) {
        Some(&b) => b,
        None => return Err(Error::UnclosedString),
    };

    let unescaped = match escape {
        b'"' => b'"',
        b'\\' => b'\\',
        b'/' => b'/',
        b'n' => b'\n',
        b'r' => b'\r',
        b't' => b'\t',
        b'f' => 0x0c,
        b'b' => 0x08,
        b'u' => return escape_unicode_into(input, at, buf),
        _ => return Err(Error::String),
    };

    buf.push(unescaped);
    Ok(at + 2)
}

fn escape_unicode_into(input: &[u8], at: usize, buf: &mut Vec<u8>) -> Result<usize> {
    let code = hex4(input, at + 2)?;

    // a leading surrogate must be immediately followed by a `\u` trailing
    // surrogate; anything else can't be mapped to a character
    if (0xD800..0xDC00).contains(&code) {
        if input.get(at + 6) != Some(&b'\\') || input.get(at + 7) != Some(&b'u') {
            return Err(Error::String);
        }

        let low = hex4(input, at + 8)?;
        let c = char_ext::from_utf16_surrogate_pair(code, low).ok_or(Error::String)?;

        push_char(buf, c);
        return Ok(at + 12);
    }

    match char::try_from(code as u32) {
        Ok(c) => {
            push_char(buf, c);
            Ok(at + 6)
        }
        // a lone trailing surrogate
        Err(_) => Err(Error::String),
    }
}

fn hex4(input: &[u8], at: usize) -> Result<u16> {
    if at + 4 > input.len() {
        return Err(Error::String);
    }

    let mut code = 0u16;
    for &b in get_unchecked!(input, at..at + 4) {
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => return Err(Error::String),
        };

        code = code << 4 | digit as u16;
    }

    Ok(code)
}

#[inline]
fn push_char(buf: &mut Vec<u8>, c: char) {
    let mut bytes = [0; 4];
    buf.extend_from_slice(c.encode_utf8(&mut bytes).as_bytes());
}

/**
Unescape the raw contents of a string (quotes already stripped) into an owned
string.

Spans between escapes are copied whole.
*/
pub(crate) fn unescape(raw: &[u8]) -> Result<String> {
    let mut buf = Vec::with_capacity(raw.len());

    let mut segment = 0;
    let mut i = 0;

    while i < raw.len() {
        match *get_unchecked!(raw, i) {
            b'\\' => {
                buf.extend_from_slice(get_unchecked!(raw, segment..i));
                i = escape_into(raw, i, &mut buf)?;
                segment = i;
            }
            b if b < 0x20 => return Err(Error::UnescapedChars),
            _ => i += 1,
        }
    }

    buf.extend_from_slice(get_unchecked!(raw, segment..));

    // the input was UTF8 and escapes only push complete characters
    Ok(owned_from_utf8_unchecked!(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_escapes() {
        assert_eq!("a\nb\t\"c\"\\", unescape(br#"a\nb\t\"c\"\\"#).unwrap());
        assert_eq!("a/b", unescape(br#"a\/b"#).unwrap());
    }

    #[test]
    fn unicode_escapes() {
        assert_eq!("A", unescape(b"\\u0041").unwrap());
        assert_eq!("\u{e9}", unescape(b"\\u00e9").unwrap());
        assert_eq!("\u{20ac}", unescape(b"\\u20ac").unwrap());
        assert_eq!("\u{1f600}", unescape(b"\\ud83d\\ude00").unwrap());
        assert_eq!(
            "pass-through \u{1f600}",
            unescape("pass-through \u{1f600}".as_bytes()).unwrap()
        );
    }

    #[test]
    fn invalid_escapes() {
        assert_eq!(Err(Error::String), unescape(br#"\j"#).map(drop));
        assert_eq!(Err(Error::String), unescape(br#"\uZZZZ"#).map(drop));
        assert_eq!(Err(Error::String), unescape(br#"\u12"#).map(drop));

        // a leading surrogate needs a trailing surrogate right behind it
        assert_eq!(Err(Error::String), unescape(br#"\uD83Dx"#).map(drop));
        assert_eq!(Err(Error::String), unescape(br#"\uD83DA"#).map(drop));

        // a lone trailing surrogate can't be mapped at all
        assert_eq!(Err(Error::String), unescape(br#"\uDE00"#).map(drop));
    }
}
