use rand::Rng;

/**
Generate a random JSON document.

Fuzzing is good at finding bizarre almost-JSON but rarely produces valid
documents, so tests stampede the parser with a bunch of generated valid ones
instead and compare against the oracle.
*/
pub fn json_document() -> String {
    let mut s = String::new();
    let mut d = 0;

    write_any(&mut s, &mut d);

    s
}

fn rng(n: usize) -> usize {
    rand::thread_rng().gen_range(0..n)
}

fn maybe_ws(s: &mut String) {
    match rng(6) {
        0 => s.push(' '),
        1 => s.push_str("  "),
        2 => s.push('\n'),
        3 => s.push('\t'),
        _ => (),
    }
}

fn write_any(s: &mut String, d: &mut usize) {
    if *d < 10 {
        match rng(6) {
            0 => write_object(s, d),
            1 => write_array(s, d),
            2 => write_bool(s),
            3 => write_number(s),
            4 => write_null(s),
            5 => write_string(s),
            _ => unreachable!(),
        }
    } else {
        match rng(4) {
            0 => write_bool(s),
            1 => write_number(s),
            2 => write_null(s),
            3 => write_string(s),
            _ => unreachable!(),
        }
    }
}

fn write_object(s: &mut String, d: &mut usize) {
    *d += 1;
    s.push('{');

    let mut first = true;
    for _ in 0..rng(10) {
        if !first {
            s.push(',');
            maybe_ws(s);
        }
        first = false;

        write_string(s);
        maybe_ws(s);
        s.push(':');
        maybe_ws(s);
        write_any(s, d);
    }

    maybe_ws(s);
    s.push('}');
    *d -= 1;
}

fn write_array(s: &mut String, d: &mut usize) {
    *d += 1;
    s.push('[');

    let mut first = true;
    for _ in 0..rng(10) {
        if !first {
            s.push(',');
            maybe_ws(s);
        }
        first = false;

        write_any(s, d);
    }

    maybe_ws(s);
    s.push(']');
    *d -= 1;
}

fn write_bool(s: &mut String) {
    if rng(2) == 0 {
        s.push_str("true");
    } else {
        s.push_str("false");
    }
}

fn write_null(s: &mut String) {
    s.push_str("null");
}

fn write_number(s: &mut String) {
    // the number is built as text so the oracle parses the same bytes
    let negative = rng(4) == 0;
    if negative {
        s.push('-');
    }

    match rng(5) {
        // a lone zero (oracles disagree on the sign of `-0`, so don't
        // generate it)
        0 if !negative => s.push('0'),
        _ => {
            s.push((b'1' + rng(9) as u8) as char);
            for _ in 0..rng(18) {
                s.push((b'0' + rng(10) as u8) as char);
            }
        }
    }

    if rng(3) == 0 {
        s.push('.');
        for _ in 0..=rng(8) {
            s.push((b'0' + rng(10) as u8) as char);
        }
    }

    if rng(5) == 0 {
        s.push('e');
        match rng(3) {
            0 => s.push('+'),
            1 => s.push('-'),
            _ => (),
        }
        s.push((b'0' + rng(10) as u8) as char);
    }
}

fn write_string(s: &mut String) {
    s.push('"');

    for _ in 0..rng(12) {
        match rng(12) {
            0 => s.push_str("\\\""),
            1 => s.push_str("\\\\"),
            2 => s.push_str("\\n"),
            3 => s.push_str("\\t"),
            4 => s.push_str("\\u00e9"),
            5 => s.push_str("\\ud83d\\ude00"),
            6 => s.push('\u{1f600}'),
            7 => s.push('\u{e9}'),
            _ => s.push((b'a' + rng(26) as u8) as char),
        }
    }

    s.push('"');
}
