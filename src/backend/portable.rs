use crate::{
    error::Result,
    minify,
    parser::Parser,
    stage1,
    stage2,
};

use super::{Backend, CpuFeature};

/**
The portable kernel.

Works through the input in 64-byte blocks using plain 64-bit mask arithmetic
(SWAR) instead of vector intrinsics, so it requires no instruction sets and
runs on every target. Architecture-specific backends slot in ahead of it in
the registry and reuse the same Stage 2, which has no byte-level inner loops
worth specializing.
*/
pub(super) struct Portable;

impl Backend for Portable {
    fn name(&self) -> &'static str {
        "portable"
    }

    fn description(&self) -> &'static str {
        "64-bit SWAR kernel with no architecture requirements"
    }

    fn required_features(&self) -> &'static [CpuFeature] {
        &[]
    }

    fn stage1(&self, input: &[u8], parser: &mut Parser, streaming: bool) -> Result<()> {
        stage1::index(input, parser, streaming)
    }

    fn stage2(&self, input: &[u8], parser: &mut Parser) -> Result<()> {
        stage2::build(input, parser)
    }

    fn stage2_next(&self, input: &[u8], parser: &mut Parser) -> Result<bool> {
        stage2::build_next(input, parser)
    }

    fn minify(&self, input: &[u8], dst: &mut [u8]) -> Result<usize> {
        minify::minify_blocks(input, dst)
    }

    fn validate_utf8(&self, input: &[u8]) -> bool {
        stage1::utf8::validate(input)
    }
}
