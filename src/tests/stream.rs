use crate::{Error, Parser};

use serde_json::json;

fn collect(input: &[u8], batch_capacity: usize) -> (Vec<serde_json::Value>, usize) {
    let mut parser = Parser::new();
    let mut stream = parser.parse_many(input, batch_capacity).unwrap();

    let mut values = Vec::new();
    while let Some(document) = stream.next() {
        values.push(document.unwrap().to_value());
    }

    let truncated = stream.truncated_bytes();
    (values, truncated)
}

#[test]
fn single_window_ndjson() {
    let input = b"{\"a\":1}\n{\"b\":2}\n{\"c\":3}\n";

    let (values, truncated) = collect(input, 1024);

    assert_eq!(
        vec![json!({"a": 1}), json!({"b": 2}), json!({"c": 3})],
        values
    );
    assert_eq!(0, truncated);
}

#[test]
fn documents_split_across_windows() {
    // 10-byte documents against a 128-byte window leave a partial document
    // at the end of every window, which must carry into the next one
    let mut input = Vec::new();
    let mut expected = Vec::new();

    for i in 0..200 {
        // space padding keeps every document exactly ten bytes
        input.extend_from_slice(format!("{{\"n\":{:>4}}}", i).as_bytes());
        expected.push(json!({ "n": i }));

        if i % 3 == 0 {
            input.push(b'\n');
        }
    }

    let (values, truncated) = collect(&input, 128);

    assert_eq!(expected, values);
    assert_eq!(0, truncated);
}

#[test]
fn batch_capacity_does_not_change_the_documents() {
    let mut input = Vec::new();
    for i in 0..100 {
        input.extend_from_slice(format!("[{}, {}]\n", i, i + 1).as_bytes());
    }

    // one big synchronous window vs many pipelined ones
    let (one_window, _) = collect(&input, input.len());
    let (many_windows, _) = collect(&input, 128);

    assert_eq!(one_window, many_windows);
}

#[test]
fn scalar_documents_stream() {
    let input = b"1 2 3";

    let (values, truncated) = collect(input, 1024);

    assert_eq!(vec![json!(1), json!(2), json!(3)], values);
    assert_eq!(0, truncated);
}

#[test]
fn truncated_final_document_is_reported() {
    let input = br#"{"a":1} {"b":"#;

    let (values, truncated) = collect(input, 1024);

    assert_eq!(vec![json!({"a": 1})], values);

    // everything after the last complete document counts, separator included
    assert_eq!(input.len() - 7, truncated);
}

#[test]
fn truncated_unclosed_string_is_reported() {
    let input = br#"{"a":1}{"b":"unfinished"#;

    let (values, truncated) = collect(input, 1024);

    assert_eq!(vec![json!({"a": 1})], values);
    assert_eq!(input.len() - 7, truncated);
}

#[test]
fn whitespace_only_input_yields_nothing() {
    let (values, truncated) = collect(b"  \n\t  ", 1024);

    assert!(values.is_empty());
    assert_eq!(0, truncated);

    let (values, truncated) = collect(b"", 1024);

    assert!(values.is_empty());
    assert_eq!(0, truncated);
}

#[test]
fn document_bigger_than_a_window_is_a_capacity_error() {
    // an array that spans several windows never completes inside one
    let mut input = Vec::new();
    input.push(b'[');
    for i in 0..100 {
        if i > 0 {
            input.push(b',');
        }
        input.extend_from_slice(b"1234567890");
    }
    input.push(b']');

    let mut parser = Parser::new();
    let mut stream = parser.parse_many(&input, 128).unwrap();

    match stream.next() {
        Some(Err(Error::Capacity)) => (),
        other => panic!("expected a capacity error, got {:?}", other.map(|r| r.map(drop))),
    }

    assert!(stream.next().is_none());
}

#[test]
fn indexing_errors_surface_after_the_documents_before_them() {
    // doc 1 is clean; doc 2 contains invalid UTF8
    let mut input = Vec::new();
    input.extend_from_slice(br#"{"a":1} {"b":""#);
    input.push(0xFF);
    input.extend_from_slice(br#""}"#);

    let mut parser = Parser::new();
    let mut stream = parser.parse_many(&input, 1024).unwrap();

    assert_eq!(
        json!({"a": 1}),
        stream.next().unwrap().unwrap().to_value()
    );

    match stream.next() {
        Some(Err(Error::Utf8)) => (),
        other => panic!("expected a utf8 error, got {:?}", other.map(|r| r.map(drop))),
    }

    assert!(stream.next().is_none());
}

#[test]
fn bad_documents_poison_the_stream() {
    let input = br#"{"a":1} [1,,2] {"c":3}"#;

    let mut parser = Parser::new();
    let mut stream = parser.parse_many(input, 1024).unwrap();

    assert_eq!(
        json!({"a": 1}),
        stream.next().unwrap().unwrap().to_value()
    );

    assert!(matches!(stream.next(), Some(Err(_))));
    assert!(stream.next().is_none());
}

#[test]
fn dropping_a_stream_early_stops_the_worker() {
    let mut input = Vec::new();
    for i in 0..500 {
        input.extend_from_slice(format!("{{\"n\":{}}}\n", i).as_bytes());
    }

    let mut parser = Parser::new();
    let mut stream = parser.parse_many(&input, 128).unwrap();

    // only read one document, then drop with the background worker mid-flight
    assert!(stream.next().is_some());
}

#[test]
fn buffers_swap_cleanly_between_windows() {
    // enough windows to cycle the foreground and background parsers a few
    // times, with strings to exercise the arena in both
    let mut input = Vec::new();
    let mut expected = Vec::new();

    for i in 0..50 {
        let text = format!("{{\"key{}\":\"value with \\\"escape\\\" {}\"}}\n", i, i);
        expected.push(serde_json::from_str::<serde_json::Value>(text.trim_end()).unwrap());
        input.extend_from_slice(text.as_bytes());
    }

    let (values, truncated) = collect(&input, 128);

    assert_eq!(expected, values);
    assert_eq!(0, truncated);
}
