use crate::Parser;

mod some;

mod stream;
mod valid;

/**
Run `f` against the input shifted through every offset within a couple of
64-byte blocks.

Stage 1 classifies in fixed-size blocks, so sliding a document through block
offsets moves every structural character across the 63/64/65 boundaries and
exercises all the carry bits. The leading padding is plain whitespace, which
doesn't change what the document means.
*/
fn test_block_shift(input: &[u8], mut f: impl FnMut(&[u8])) {
    for shift in 0..=130 {
        let mut buf = Vec::with_capacity(shift + input.len());
        buf.resize(shift, b' ');
        buf.extend_from_slice(input);

        f(&buf);
    }
}

/**
Parse through a fresh parser and compare against `serde_json`.
*/
fn assert_parses_like_serde(input: &[u8]) {
    let expected: serde_json::Value = match serde_json::from_slice(input) {
        Ok(expected) => expected,
        Err(e) => panic!("oracle rejected `{:?}`: {}", std::str::from_utf8(input), e),
    };

    let mut parser = Parser::new();
    let document = parser
        .parse(input)
        .unwrap_or_else(|e| panic!("parsing `{:?}`: {}", std::str::from_utf8(input), e));

    assert_eq!(expected, document.to_value());
}
