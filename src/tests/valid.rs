use super::*;

use crate::{minify, tests::some, Parser};

use serde_json::json;

#[test]
fn read_simple_object() {
    let input = br#"{"a":1}"#;

    let mut parser = Parser::new();
    let document = parser.parse(input).unwrap();

    let object = document.root().get_object().unwrap();
    assert_eq!(1, object.len());
    assert_eq!(1, object.find("a").unwrap().get_i64().unwrap());
    assert_eq!(1, object.find("a").unwrap().get_u64().unwrap());

    assert_eq!(json!({"a": 1}), document.to_value());
}

#[test]
fn read_kinds() {
    let input = r#"{
        "string": "with \"escapes\" and é😀",
        "int": -42,
        "uint": 18446744073709551615,
        "double": 1.5e3,
        "bools": [true, false],
        "null": null,
        "nested": {"empty": {}, "arr": []}
    }"#
    .as_bytes();

    let mut parser = Parser::new();
    let document = parser.parse(input).unwrap();
    let object = document.root().get_object().unwrap();

    assert_eq!(
        "with \"escapes\" and \u{e9}\u{1f600}",
        object.find("string").unwrap().get_str().unwrap()
    );
    assert_eq!(-42, object.find("int").unwrap().get_i64().unwrap());
    assert_eq!(u64::MAX, object.find("uint").unwrap().get_u64().unwrap());
    assert_eq!(1.5e3, object.find("double").unwrap().get_f64().unwrap());
    assert!(object.find("null").unwrap().is_null());

    let bools = object.find("bools").unwrap().get_array().unwrap();
    assert_eq!(2, bools.len());
    let bools = bools.iter().map(|v| v.get_bool().unwrap()).collect::<Vec<_>>();
    assert_eq!(vec![true, false], bools);

    let nested = object.find("nested").unwrap().get_object().unwrap();
    assert!(nested.find("empty").unwrap().get_object().unwrap().is_empty());
    assert!(nested.find("arr").unwrap().get_array().unwrap().is_empty());
}

#[test]
fn read_scalar_documents() {
    let mut parser = Parser::new();

    assert_eq!(42, parser.parse(b"42").unwrap().root().get_i64().unwrap());
    assert_eq!("x", parser.parse(b"\"x\"").unwrap().root().get_str().unwrap());
    assert!(parser.parse(b"true").unwrap().root().get_bool().unwrap());
    assert!(parser.parse(b"null").unwrap().root().is_null());
    assert_eq!(1.25, parser.parse(b"1.25").unwrap().root().get_f64().unwrap());
}

#[test]
fn read_generated() {
    // debug builds are slow, so just run a handful of cases
    let iterations = {
        #[cfg(debug)]
        {
            200
        }

        #[cfg(not(debug))]
        {
            2000
        }
    };

    for _ in 0..iterations {
        let input = some::json_document();

        assert_parses_like_serde(input.as_bytes());
    }
}

#[test]
fn structural_offsets_are_invariant_to_block_placement() {
    // slide a document through the 64-byte block grid so structurals land
    // on offsets 63, 64 and 65, and escapes/quotes straddle the boundary
    let input = r#"{"key": "val\\\"ue", "n": [1, -2.5e4, true, null], "s": "😀"}"#.as_bytes();

    let expected: serde_json::Value = serde_json::from_slice(input).unwrap();

    test_block_shift(input, |shifted| {
        let mut parser = Parser::new();
        let document = parser.parse(shifted).unwrap();

        assert_eq!(expected, document.to_value());
    });
}

#[test]
fn multibyte_characters_across_block_boundaries() {
    // a string of multi-byte characters long enough that every block
    // boundary in the shift sweep cuts one of them in half
    let mut input = String::from("\"");
    for _ in 0..64 {
        input.push('\u{1f600}');
        input.push('\u{e9}');
    }
    input.push('"');

    let expected: serde_json::Value = serde_json::from_str(&input).unwrap();

    test_block_shift(input.as_bytes(), |shifted| {
        let mut parser = Parser::new();
        let document = parser.parse(shifted).unwrap();

        assert_eq!(expected, document.to_value());
    });
}

#[test]
fn odd_backslash_run_does_not_terminate_a_string() {
    // the quote after `\\\` is escaped, so the string keeps going
    let input = br#""a\\\"b""#;

    let mut parser = Parser::new();
    let document = parser.parse(input).unwrap();

    assert_eq!("a\\\"b", document.root().get_str().unwrap());

    // and the same with the run straddling a block boundary
    test_block_shift(input, |shifted| {
        let mut parser = Parser::new();
        let document = parser.parse(shifted).unwrap();

        assert_eq!("a\\\"b", document.root().get_str().unwrap());
    });
}

#[test]
fn container_words_point_at_each_other() {
    let iterations = {
        #[cfg(debug)]
        {
            50
        }

        #[cfg(not(debug))]
        {
            500
        }
    };

    for _ in 0..iterations {
        let input = some::json_document();

        let mut parser = Parser::new();
        parser.parse(input.as_bytes()).unwrap();

        check_balanced(&parser.tape, 1);
    }
}

/**
Walk the tape from `index`, asserting every container's open and close words
carry each other's indexes. Returns the index just past the value.
*/
fn check_balanced(tape: &[u64], index: usize) -> usize {
    let word = tape[index];

    match (word >> 56) as u8 {
        open @ (b'{' | b'[') => {
            let close = (word & u32::MAX as u64) as usize;

            let close_word = tape[close];
            let close_tag = (close_word >> 56) as u8;

            assert_eq!(if open == b'{' { b'}' } else { b']' }, close_tag);
            assert_eq!(index as u64, close_word & 0x00FF_FFFF_FFFF_FFFF);

            // walk the children too
            let mut child = index + 1;
            while child < close {
                child = check_balanced(tape, child);

                // object values follow their keys directly
            }
            assert_eq!(close, child);

            close + 1
        }
        // numbers carry their raw value in a second word
        b'l' | b'u' | b'd' => index + 2,
        _ => index + 1,
    }
}

#[test]
fn minify_then_reparse_is_identical() {
    let iterations = {
        #[cfg(debug)]
        {
            50
        }

        #[cfg(not(debug))]
        {
            500
        }
    };

    for _ in 0..iterations {
        let input = some::json_document();

        let minified = minify(input.as_bytes()).unwrap();

        let mut direct = Parser::new();
        direct.parse(input.as_bytes()).unwrap();

        let mut reparsed = Parser::new();
        reparsed.parse(&minified).unwrap();

        // structurally identical tapes, not just equal values
        assert_eq!(direct.tape, reparsed.tape);
        assert_eq!(direct.string_buf, reparsed.string_buf);
    }
}

#[test]
fn minify_leaves_strings_alone() {
    let input = br#"{ "a b" : "c  d\t \" e" , "x" : [ 1 , 2 ] }"#;

    assert_eq!(
        br#"{"a b":"c  d\t \" e","x":[1,2]}"# as &[u8],
        minify(input).unwrap().as_slice()
    );
}

#[test]
fn documents_at_the_depth_limit() {
    let depth = 8;
    let mut parser = Parser::with_capacity(1024, depth).unwrap();

    let mut at_limit = String::new();
    for _ in 0..depth {
        at_limit.push('[');
    }
    for _ in 0..depth {
        at_limit.push(']');
    }

    assert!(parser.parse(at_limit.as_bytes()).is_ok());

    let too_deep = format!("[{}]", at_limit);
    assert_eq!(
        Err(crate::Error::Depth),
        parser.parse(too_deep.as_bytes()).map(drop)
    );
}

#[test]
fn buffers_are_reused_between_parses() {
    let mut parser = Parser::new();

    let first = parser.parse(br#"{"a": [1, 2, 3]}"#).unwrap().to_value();
    assert_eq!(json!({"a": [1, 2, 3]}), first);

    // a smaller follow-up document reuses the same buffers
    let second = parser.parse(br#"{"b": 2}"#).unwrap().to_value();
    assert_eq!(json!({"b": 2}), second);

    let third = parser.parse(b"[]").unwrap().to_value();
    assert_eq!(json!([]), third);
}

#[test]
fn fixed_capacity_is_respected() {
    let mut parser = Parser::with_fixed_capacity(16, 8).unwrap();

    assert!(parser.parse(br#"{"a":1}"#).is_ok());
    assert_eq!(
        Err(crate::Error::Capacity),
        parser.parse(br#"{"a":"much too big for that"}"#).map(drop)
    );
}

#[test]
fn validate_utf8_matches_std() {
    for case in [
        &b"plain ascii"[..],
        "caf\u{e9} \u{1f600}".as_bytes(),
        &[0xFF, 0xFE],
        &[0xC0, 0xAF],
        &[0xED, 0xA0, 0x80],
        &[0xF4, 0x90, 0x80, 0x80],
        &[0xE2, 0x82],
    ] {
        assert_eq!(std::str::from_utf8(case).is_ok(), crate::validate_utf8(case));
    }
}
