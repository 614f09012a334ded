/*!
Whitespace removal.

Minification reuses Stage 1's string tracking: the same block classification
and in-string masks decide which whitespace is insignificant, so string
contents (quotes, escapes and all) are copied through untouched. No grammar
checking happens here; minifying is purely a byte-level operation.
*/

use crate::{
    backend,
    error::{Error, Result},
    stage1::{self, BLOCK_SIZE},
};

/**
Minify a JSON document into a new buffer.
*/
pub fn minify(input: &[u8]) -> Result<Vec<u8>> {
    let mut dst = vec![0; input.len()];
    let written = minify_to(input, &mut dst)?;

    dst.truncate(written);
    Ok(dst)
}

/**
Minify a JSON document into `dst` through the active backend, returning the
number of bytes written.

`dst` must be at least as long as `input`.
*/
pub fn minify_to(input: &[u8], dst: &mut [u8]) -> Result<usize> {
    backend::active()?.minify(input, dst)
}

pub(crate) fn minify_blocks(input: &[u8], dst: &mut [u8]) -> Result<usize> {
    if dst.len() < input.len() {
        return Err(Error::Capacity);
    }

    let mut scan = stage1::Scan::new();
    let mut written = 0usize;

    let whole_blocks = input.len() / BLOCK_SIZE;

    for block_index in 0..whole_blocks {
        let base = block_index * BLOCK_SIZE;

        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(get_unchecked!(input, base..base + BLOCK_SIZE));

        let keep = keep_mask(&block, &mut scan);
        written = copy_kept(&block, keep, dst, written);
    }

    let tail = input.len() - whole_blocks * BLOCK_SIZE;
    if tail > 0 {
        let base = whole_blocks * BLOCK_SIZE;

        let mut block = [b' '; BLOCK_SIZE];
        get_unchecked_mut!(block, ..tail).copy_from_slice(get_unchecked!(input, base..));

        // padding is whitespace so it normally drops out on its own, but an
        // unterminated string would carry `in_string` over it; mask the pad
        // bits off so `dst` can never need more room than the input
        let keep = keep_mask(&block, &mut scan) & ((1u64 << tail) - 1);
        written = copy_kept(&block, keep, dst, written);
    }

    Ok(written)
}

#[inline(always)]
fn keep_mask(block: &[u8; BLOCK_SIZE], scan: &mut stage1::Scan) -> u64 {
    let classified = stage1::classify(block);
    let (_, in_string) = scan.strings(&classified);

    // whitespace only drops outside strings
    !classified.ws | in_string
}

#[inline(always)]
fn copy_kept(block: &[u8; BLOCK_SIZE], mut keep: u64, dst: &mut [u8], mut written: usize) -> usize {
    while keep != 0 {
        let i = keep.trailing_zeros() as usize;

        *get_unchecked_mut!(dst, written) = *get_unchecked!(block, i);
        written += 1;

        keep &= keep.wrapping_sub(1);
    }

    written
}
