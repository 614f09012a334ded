/*!
# `marten-json`

A two-stage, bit-parallel parser for JSON documents.

Parsing happens in two passes over the input. Stage 1 classifies bytes in
fixed-size blocks using 64-bit masks, producing an index of the byte offset of
every structural character while validating UTF8 along the way. Stage 2 walks
those offsets with a grammar state machine and builds a flat _tape_: a sequence
of tagged 64-bit words that can be navigated without touching the input again.

For workloads that only need fragments of a document there's an on-demand
reader ([`Parser::iterate`]) that works directly off the Stage 1 index and
never materializes a tape, and a document stream ([`Parser::parse_many`]) that
batches multi-document inputs and can overlap indexing of the next batch with
reading of the current one on a background thread.

## ⚠️ CAREFUL

This library contains unsafe code on its hot paths and is very performance
sensitive. Any changes need to be carefully considered and should be tested
with the `checked` cfg enabled (`MARTENJSON_CHECKED=1`), which swaps unchecked
operations for checked variants that catch UB early.
*/

#![deny(warnings)]
#![allow(clippy::missing_safety_doc, clippy::question_mark)]

#[macro_use]
mod macros;

mod std_ext;

mod error;
mod minify;
mod parser;
mod stage1;
mod stage2;
mod stream;
mod tape;
mod unescape;

pub mod backend;
pub mod ondemand;

pub use self::{
    error::{Error, Result},
    minify::{minify, minify_to},
    parser::Parser,
    stream::{DocumentStream, MINIMAL_BATCH_CAPACITY},
    tape::{
        Document, TapeArray, TapeArrayIter, TapeObject, TapeObjectIter, TapeType, TapeValue,
        COUNT_SATURATED,
    },
};

/**
Whether the input is valid UTF8, as judged by the active backend.
*/
pub fn validate_utf8(input: &[u8]) -> bool {
    match backend::active() {
        Ok(backend) => backend.validate_utf8(input),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests;
