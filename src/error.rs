use thiserror::Error;

/**
The result of any parsing operation.

Nothing in this crate panics on malformed input; every operation that can
observe it returns one of these.
*/
pub type Result<T> = std::result::Result<T, Error>;

/**
An error encountered while indexing, parsing, or reading a document.

Once a parse fails mid-document the parser's buffers are in an unspecified
(but memory-safe) state, and the document is unusable until the next
successful parse.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum Error {
    /**
    The document exceeds the parser's fixed capacity.
    */
    #[error("this parser can't support a document that big")]
    Capacity,
    /**
    A buffer couldn't be sized for the document.
    */
    #[error("error allocating memory, we're most likely out of memory")]
    Memalloc,
    /**
    The document's structure didn't follow the JSON grammar.
    */
    #[error("the JSON document has an improper structure")]
    Tape,
    /**
    The document is nested deeper than the parser's configured limit.
    */
    #[error("the JSON document was too deep (too many nested objects and arrays)")]
    Depth,
    /**
    The input is not valid UTF8.
    */
    #[error("the input is not valid UTF-8")]
    Utf8,
    /**
    A string contains a raw control character that should have been escaped.
    */
    #[error("a string contains an unescaped control character")]
    UnescapedChars,
    /**
    A string is missing its closing quote.
    */
    #[error("a string is opened but never closed")]
    UnclosedString,
    /**
    A string contains a malformed escape sequence.
    */
    #[error("problem while parsing a string")]
    String,
    /**
    A number doesn't follow the JSON number grammar.
    */
    #[error("problem while parsing a number")]
    Number,
    /**
    A value was accessed as a type it doesn't have.
    */
    #[error("the JSON element does not have the requested type")]
    IncorrectType,
    /**
    An object field lookup found no matching key at or after the cursor.
    */
    #[error("the JSON field referenced does not exist in this object")]
    NoSuchField,
    /**
    A number was accessed through a narrower type than it fits in.
    */
    #[error("the JSON number is too large or too small to fit within the requested type")]
    NumberOutOfRange,
    /**
    No structural characters were found in the input.
    */
    #[error("no structural element found")]
    Empty,
    /**
    No compiled-in backend supports the current CPU.
    */
    #[error("the backend required for this operation is not available on this CPU")]
    Unsupported,
    /**
    A value was read from a document that already failed to parse.
    */
    #[error("the document was not parsed successfully and can't be read")]
    Uninitialized,
}
