/*!
Stage 1: structural indexing.

The indexer works through the input in 64-byte blocks. Each block is turned
into a handful of 64-bit masks (one bit per byte): quotes, backslashes,
whitespace, structural operators. The masks are combined with a little carry
state from the previous block to find the bytes that delimit the document:
the `{ } [ ] : ,` operators plus the first byte of every scalar token. Those
byte offsets are flattened into the parser's structural index.

UTF8 is validated along the way, one block at a time, so a separate pass over
the input is never needed.

Strings are the interesting part. A quote only counts when it isn't escaped,
and whether a backslash escapes anything depends on the length of the run of
backslashes before it, which may have started in a previous block. Both are
solved with bit arithmetic rather than a scan: see [`Scan::find_escaped`].
*/

pub(crate) mod utf8;

use crate::{
    error::{Error, Result},
    parser::Parser,
};

/**
The number of bytes classified at a time.
*/
pub(crate) const BLOCK_SIZE: usize = 64;

/**
Extra index slots past one-per-input-byte.

[`flatten`] writes groups of eight slots unconditionally, so the index buffer
needs room for a partial group past the last real entry, plus the sentinel.
*/
pub(crate) const INDEX_SLACK: usize = 72;

const WS: u8 = 1;
const OP: u8 = 2;
const CTRL: u8 = 4;

static CLASS: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut b = 0;
    while b < 256 {
        let mut class = 0;

        if b == b' ' as usize || b == b'\t' as usize || b == b'\n' as usize || b == b'\r' as usize {
            class |= WS;
        }

        if b == b'{' as usize
            || b == b'}' as usize
            || b == b'[' as usize
            || b == b']' as usize
            || b == b':' as usize
            || b == b',' as usize
        {
            class |= OP;
        }

        if b < 0x20 {
            class |= CTRL;
        }

        table[b] = class;
        b += 1;
    }
    table
};

/**
Whether `b` terminates a scalar token.
*/
#[inline(always)]
pub(crate) fn is_structural_or_ws(b: u8) -> bool {
    CLASS[b as usize] & (WS | OP) != 0
}

/**
Whether `b` is JSON whitespace.
*/
#[inline(always)]
pub(crate) fn is_whitespace(b: u8) -> bool {
    CLASS[b as usize] & WS != 0
}

/**
The per-block masks derived from byte classification.
*/
pub(crate) struct Classified {
    pub(crate) ws: u64,
    pub(crate) op: u64,
    pub(crate) ctrl: u64,
    pub(crate) quote: u64,
    pub(crate) backslash: u64,
}

/**
Classify one block into bit masks, one bit per byte.
*/
#[inline(always)]
pub(crate) fn classify(block: &[u8; BLOCK_SIZE]) -> Classified {
    let mut ws = 0u64;
    let mut op = 0u64;
    let mut ctrl = 0u64;
    let mut quote = 0u64;
    let mut backslash = 0u64;

    for (i, &b) in block.iter().enumerate() {
        let class = CLASS[b as usize];

        ws |= ((class & WS != 0) as u64) << i;
        op |= ((class & OP != 0) as u64) << i;
        ctrl |= ((class & CTRL != 0) as u64) << i;
        quote |= ((b == b'"') as u64) << i;
        backslash |= ((b == b'\\') as u64) << i;
    }

    Classified {
        ws,
        op,
        ctrl,
        quote,
        backslash,
    }
}

/**
The cumulative XOR of every bit position up to and including each bit.

Turns a mask of unescaped quotes into a mask of "inside a string" regions:
each region runs from its opening quote up to (but not including) its closing
quote.
*/
#[inline(always)]
pub(crate) fn prefix_xor(mut x: u64) -> u64 {
    x ^= x << 1;
    x ^= x << 2;
    x ^= x << 4;
    x ^= x << 8;
    x ^= x << 16;
    x ^= x << 32;
    x
}

/**
String-tracking state carried from one block to the next.
*/
pub(crate) struct Scan {
    /**
    Whether the first byte of the next block is escaped by a backslash run
    that ended this block.
    */
    prev_escaped: u64,
    /**
    All ones when the next block starts inside a string, otherwise zero.
    */
    pub(crate) prev_in_string: u64,
    /**
    Whether the last byte of this block was a non-quote scalar character.
    */
    prev_scalar: u64,
}

impl Scan {
    #[inline(always)]
    pub(crate) fn new() -> Self {
        Scan {
            prev_escaped: 0,
            prev_in_string: 0,
            prev_scalar: 0,
        }
    }

    /**
    Which bytes of the block are escaped by a backslash.

    A backslash run escapes every second character after it, so a character
    is escaped when the run of backslashes immediately before it has odd
    length. Runs starting on even and odd bit positions are resolved
    separately with one addition each; a run that crosses the block boundary
    carries out of the addition and into `prev_escaped`.
    */
    #[inline(always)]
    pub(crate) fn find_escaped(&mut self, backslash: u64) -> u64 {
        if backslash == 0 {
            let escaped = self.prev_escaped;
            self.prev_escaped = 0;
            return escaped;
        }

        const EVEN_BITS: u64 = 0x5555_5555_5555_5555;

        let backslash = backslash & !self.prev_escaped;
        let follows_escape = backslash << 1 | self.prev_escaped;

        let odd_sequence_starts = backslash & !EVEN_BITS & !follows_escape;
        let (sequences_starting_on_even_bits, carry) =
            odd_sequence_starts.overflowing_add(backslash);
        self.prev_escaped = carry as u64;

        let invert_mask = sequences_starting_on_even_bits << 1;
        (EVEN_BITS ^ invert_mask) & follows_escape
    }

    /**
    Resolve the block's string structure: unescaped quotes and the bytes that
    are string content.

    Returns `(quote, in_string)` where `in_string` covers each string from
    its opening quote up to (but not including) its closing quote.
    */
    #[inline(always)]
    pub(crate) fn strings(&mut self, classified: &Classified) -> (u64, u64) {
        let escaped = self.find_escaped(classified.backslash);
        let quote = classified.quote & !escaped;

        let in_string = prefix_xor(quote) ^ self.prev_in_string;
        self.prev_in_string = ((in_string as i64) >> 63) as u64;

        (quote, in_string)
    }
}

/**
Index the structural characters of `input` into the parser.

The parser's buffers must already be sized for the input (see
[`Parser::ensure_capacity`]).

In streaming mode the trailing checks are relaxed and indexing errors are
recorded on the parser instead of returned, so a multi-document window can
still serve the documents before the error.
*/
pub(crate) fn index(input: &[u8], parser: &mut Parser, streaming: bool) -> Result<()> {
    parser.n_structural_indexes = 0;
    parser.next_structural = 0;
    parser.stage1_err = None;
    parser.unclosed_at_end = false;

    let mut scan = Scan::new();
    let mut validator = utf8::Validator::new();
    let mut err: Option<(u32, Error)> = None;
    let mut n = 0usize;

    let whole_blocks = input.len() / BLOCK_SIZE;

    for block_index in 0..whole_blocks {
        let base = block_index * BLOCK_SIZE;

        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(get_unchecked!(input, base..base + BLOCK_SIZE));

        let structurals = scan_block(&block, base, &mut scan, &mut err);
        validator.update(&block, base);

        flatten(&mut parser.structural_indexes, &mut n, base, structurals);
    }

    let tail = input.len() - whole_blocks * BLOCK_SIZE;
    if tail > 0 {
        let base = whole_blocks * BLOCK_SIZE;

        // pad the trailing partial block with whitespace, which never
        // produces a structural bit or a control character error
        let mut block = [b' '; BLOCK_SIZE];
        get_unchecked_mut!(block, ..tail).copy_from_slice(get_unchecked!(input, base..));

        let structurals = scan_block(&block, base, &mut scan, &mut err);
        validator.update(get_unchecked!(block, ..tail), base);

        flatten(&mut parser.structural_indexes, &mut n, base, structurals);
    }

    // the virtual sentinel: one past the end of the input
    *get_unchecked_mut!(parser.structural_indexes, n) = input.len() as u32;
    n += 1;
    parser.n_structural_indexes = n;

    if let Some(at) = validator.error() {
        let utf8_err = (at, Error::Utf8);
        err = match err {
            Some(first) if first.0 <= at => Some(first),
            _ => Some(utf8_err),
        };
    }

    if let Some((at, e)) = err {
        if !streaming {
            return Err(e);
        }
        parser.stage1_err = Some((at, e));
    }

    if validator.is_incomplete() && !streaming {
        // the input ends in the middle of a multi-byte sequence; in
        // streaming mode those bytes belong to the truncated tail and are
        // revalidated with the next window
        return Err(Error::Utf8);
    }

    if scan.prev_in_string != 0 {
        parser.unclosed_at_end = true;
        if !streaming {
            return Err(Error::UnclosedString);
        }
    }

    if n == 1 {
        return Err(Error::Empty);
    }

    Ok(())
}

#[inline(always)]
fn scan_block(
    block: &[u8; BLOCK_SIZE],
    base: usize,
    scan: &mut Scan,
    err: &mut Option<(u32, Error)>,
) -> u64 {
    let classified = classify(block);
    let (quote, in_string) = scan.strings(&classified);

    // a string's "tail" is its content plus the closing quote; the opening
    // quote stays visible as the structural start of the string token
    let string_tail = in_string ^ quote;

    let scalar = !(classified.op | classified.ws);
    let nonquote_scalar = scalar & !quote;
    let follows_nonquote_scalar = nonquote_scalar << 1 | scan.prev_scalar;
    scan.prev_scalar = nonquote_scalar >> 63;

    // operators count wherever they appear; scalars only count on their
    // first byte, so `true` or `-1.5e2` contribute a single token each
    let structurals =
        (classified.op | (scalar & !follows_nonquote_scalar)) & !string_tail;

    // raw control characters inside a string should have been escaped
    let unescaped = classified.ctrl & in_string;
    if unescaped != 0 && err.is_none() {
        let at = base as u32 + unescaped.trailing_zeros();
        *err = Some((at, Error::UnescapedChars));
    }

    structurals
}

/**
Append the set bits of `bits` (offset by `base`) to the structural index.

Slots are written in groups of eight without branching on each bit; most
blocks have fewer than eight structurals, so the garbage slots past the real
count are simply overwritten by the next block.
*/
#[inline(always)]
fn flatten(indexes: &mut [u32], n: &mut usize, base: usize, mut bits: u64) {
    let count = bits.count_ones() as usize;
    let base = base as u32;

    let mut written = 0;
    while written < count {
        for slot in 0..8 {
            *get_unchecked_mut!(indexes, *n + written + slot) = base + bits.trailing_zeros();
            bits &= bits.wrapping_sub(1);
        }
        written += 8;
    }

    *n += count;
}
