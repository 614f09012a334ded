/*!
Table-driven UTF8 validation.

The validator is a byte-class DFA: each byte maps to one of twelve classes,
and `(state, class)` indexes a transition table. The state is a single byte
carried across blocks, so a multi-byte character split over a block boundary
just works. Every malformed shape (overlong encodings, surrogate code
points, out-of-range code points, stray or missing continuation bytes) lands
in the reject state.

ASCII-only stretches are skipped eight bytes at a time, which is where almost
all the time goes on typical documents.
*/

const ACCEPT: u32 = 0;
const REJECT: u32 = 12;

/**
Byte classes.

`0` is ASCII. `1`, `9` and `7` split the continuation range `80..=BF` into
the thirds that overlong/surrogate/range checks care about. `2..=6`, `10` and
`11` are the lead-byte shapes, and `8` is the bytes that can't appear in UTF8
at all (`C0`, `C1`, `F5..=FF`).
*/
static CLASS: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut b = 0x80;
    while b < 0x100 {
        table[b] = match b {
            0x80..=0x8F => 1,
            0x90..=0x9F => 9,
            0xA0..=0xBF => 7,
            0xC2..=0xDF => 2,
            0xE1..=0xEC | 0xEE..=0xEF => 3,
            0xED => 4,
            0xF4 => 5,
            0xF1..=0xF3 => 6,
            0xE0 => 10,
            0xF0 => 11,
            _ => 8,
        };
        b += 1;
    }
    table
};

/**
The transition table: twelve columns (one per class) for each state.

States, in row order: accept, reject, expect one continuation, expect two
continuations, and the five constrained lead states (`E0`, `ED`, `F0`,
`F1..=F3`, `F4`) that restrict which continuation third may follow.
*/
#[rustfmt::skip]
static STATE: [u8; 108] = [
     0, 12, 24, 36, 60, 96, 84, 12, 12, 12, 48, 72,
    12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12,
    12,  0, 12, 12, 12, 12, 12,  0, 12,  0, 12, 12,
    12, 24, 12, 12, 12, 12, 12, 24, 12, 24, 12, 12,
    12, 12, 12, 12, 12, 12, 12, 24, 12, 12, 12, 12,
    12, 24, 12, 12, 12, 12, 12, 12, 12, 24, 12, 12,
    12, 12, 12, 12, 12, 12, 12, 36, 12, 36, 12, 12,
    12, 36, 12, 12, 12, 12, 12, 36, 12, 36, 12, 12,
    12, 36, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12,
];

/**
A streaming UTF8 validator.

Feed it consecutive chunks of the input with [`Validator::update`]; the DFA
state carries across calls.
*/
pub(crate) struct Validator {
    state: u32,
    err_at: Option<u32>,
}

impl Validator {
    #[inline(always)]
    pub(crate) fn new() -> Self {
        Validator {
            state: ACCEPT,
            err_at: None,
        }
    }

    /**
    Validate the next chunk of input.

    `base` is the chunk's offset within the whole input, used to report where
    the first invalid byte was.
    */
    #[inline]
    pub(crate) fn update(&mut self, bytes: &[u8], base: usize) {
        if self.err_at.is_some() {
            return;
        }

        let mut i = 0;
        while i < bytes.len() {
            // between characters, skip ASCII eight bytes at a time
            if self.state == ACCEPT && bytes.len() - i >= 8 {
                let mut chunk = [0u8; 8];
                chunk.copy_from_slice(get_unchecked!(bytes, i..i + 8));

                if u64::from_le_bytes(chunk) & 0x8080_8080_8080_8080 == 0 {
                    i += 8;
                    continue;
                }
            }

            let b = *get_unchecked!(bytes, i);
            let class = CLASS[b as usize];
            self.state = *get_unchecked!(STATE, (self.state + class as u32) as usize) as u32;

            if self.state == REJECT {
                self.err_at = Some((base + i) as u32);
                return;
            }

            i += 1;
        }
    }

    /**
    The offset of the first invalid byte, if any was seen.
    */
    #[inline]
    pub(crate) fn error(&self) -> Option<u32> {
        self.err_at
    }

    /**
    Whether the input ended partway through a multi-byte character.
    */
    #[inline]
    pub(crate) fn is_incomplete(&self) -> bool {
        self.err_at.is_none() && self.state != ACCEPT
    }
}

/**
Whether `input` is entirely valid UTF8.
*/
pub(crate) fn validate(input: &[u8]) -> bool {
    let mut validator = Validator::new();
    validator.update(input, 0);
    validator.error().is_none() && !validator.is_incomplete()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(bytes: &[u8]) -> bool {
        validate(bytes)
    }

    #[test]
    fn classes_match_std() {
        // the DFA must agree with the standard library for every 1-4 byte
        // sequence built from a representative byte of each class
        let bytes = [
            0x00, 0x41, 0x7F, 0x80, 0x8F, 0x90, 0x9F, 0xA0, 0xBF, 0xC0, 0xC1, 0xC2, 0xDF, 0xE0,
            0xE1, 0xEC, 0xED, 0xEE, 0xEF, 0xF0, 0xF1, 0xF3, 0xF4, 0xF5, 0xFF,
        ];

        for &a in &bytes {
            assert_eq!(std::str::from_utf8(&[a]).is_ok(), ok(&[a]), "{:02x}", a);

            for &b in &bytes {
                assert_eq!(
                    std::str::from_utf8(&[a, b]).is_ok(),
                    ok(&[a, b]),
                    "{:02x} {:02x}",
                    a,
                    b
                );

                for &c in &bytes {
                    assert_eq!(
                        std::str::from_utf8(&[a, b, c]).is_ok(),
                        ok(&[a, b, c]),
                        "{:02x} {:02x} {:02x}",
                        a,
                        b,
                        c
                    );

                    for &d in &bytes {
                        assert_eq!(
                            std::str::from_utf8(&[a, b, c, d]).is_ok(),
                            ok(&[a, b, c, d]),
                            "{:02x} {:02x} {:02x} {:02x}",
                            a,
                            b,
                            c,
                            d
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn state_carries_across_chunks() {
        // 😀 split at every point
        let bytes = "😀".as_bytes();

        for split in 0..=bytes.len() {
            let mut validator = Validator::new();
            validator.update(&bytes[..split], 0);
            validator.update(&bytes[split..], split);

            assert_eq!(None, validator.error());
            assert!(!validator.is_incomplete());
        }
    }

    #[test]
    fn truncated_sequence_is_incomplete() {
        let mut validator = Validator::new();
        validator.update(&[0xE2, 0x82], 0);

        assert_eq!(None, validator.error());
        assert!(validator.is_incomplete());
    }
}
