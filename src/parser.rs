use crate::{
    backend,
    error::{Error, Result},
    ondemand,
    stage1,
    stream::DocumentStream,
    tape::Document,
};

/**
The default cap on nesting depth.

It makes sure degenerate inputs like `[[[[[[[[[[[[[[[[[[[[[[[[[..` aren't
potentials for OOM, since 1 byte of input can cause a much larger scope
allocation.
*/
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/**
A reusable JSON parser.

A parser owns all the buffers a parse produces: the structural offset index,
the tape, the unescaped string arena, and the scope stack. The buffers are
overwritten, not freed, between parses, so parsing many same-or-smaller
documents through one parser doesn't allocate.

Anything a parse returns ([`Document`], [`ondemand::Document`],
[`DocumentStream`]) borrows these buffers, so it's only readable until the
next parse call. A parser can only work on one document at a time; concurrent
documents need a parser each.
*/
#[derive(Debug)]
pub struct Parser {
    pub(crate) structural_indexes: Vec<u32>,
    /**
    The number of entries of `structural_indexes` produced by Stage 1,
    including the virtual sentinel offset at the end of the input.
    */
    pub(crate) n_structural_indexes: usize,
    /**
    Where Stage 2 picks up on the next `stage2_next` call.
    */
    pub(crate) next_structural: usize,
    pub(crate) tape: Vec<u64>,
    pub(crate) string_buf: Vec<u8>,
    pub(crate) open_scopes: Vec<OpenScope>,
    /**
    The first indexing error in a streamed window, deferred so documents
    before it can still be read.
    */
    pub(crate) stage1_err: Option<(u32, Error)>,
    /**
    Whether the input ended inside an unterminated string.
    */
    pub(crate) unclosed_at_end: bool,
    capacity: usize,
    max_depth: usize,
    fixed: bool,
}

/**
An open object or array that Stage 2 hasn't seen the closing bracket for yet.
*/
#[derive(Debug, Clone, Copy)]
pub(crate) struct OpenScope {
    /**
    The tape index of the container's open word, patched when it closes.
    */
    pub(crate) tape_index: u32,
    /**
    The number of elements (or key-value pairs) seen so far.
    */
    pub(crate) count: u32,
    pub(crate) in_object: bool,
}

impl Default for Parser {
    fn default() -> Self {
        Parser::new()
    }
}

impl Parser {
    /**
    Create a parser that sizes its buffers on demand.
    */
    pub fn new() -> Self {
        Parser {
            structural_indexes: Vec::new(),
            n_structural_indexes: 0,
            next_structural: 0,
            tape: Vec::new(),
            string_buf: Vec::new(),
            open_scopes: Vec::new(),
            stage1_err: None,
            unclosed_at_end: false,
            capacity: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            fixed: false,
        }
    }

    /**
    Create a parser with its buffers pre-sized for documents up to `capacity`
    bytes and `max_depth` levels of nesting.

    The buffers still grow if a bigger document shows up.
    */
    pub fn with_capacity(capacity: usize, max_depth: usize) -> Result<Self> {
        let mut parser = Parser::new();
        parser.max_depth = max_depth;
        parser.reallocate(capacity)?;
        Ok(parser)
    }

    /**
    Create a parser with pinned buffer sizes.

    Documents over `capacity` bytes fail with [`Error::Capacity`] instead of
    growing the buffers.
    */
    pub fn with_fixed_capacity(capacity: usize, max_depth: usize) -> Result<Self> {
        let mut parser = Parser::with_capacity(capacity, max_depth)?;
        parser.fixed = true;
        Ok(parser)
    }

    /**
    The largest document this parser can currently index without reallocating.
    */
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /**
    The deepest nesting this parser accepts before [`Error::Depth`].
    */
    #[inline]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /**
    Parse a complete JSON document into a tape.

    Runs Stage 1 then Stage 2 through the active backend. The returned
    [`Document`] borrows this parser's buffers and is readable until the next
    parse.
    */
    pub fn parse<'p>(&'p mut self, input: &[u8]) -> Result<Document<'p>> {
        let backend = backend::active()?;

        self.ensure_capacity(input.len())?;
        backend.stage1(input, self, false)?;
        backend.stage2(input, self)?;

        Ok(Document::new(self))
    }

    /**
    Index a JSON document for on-demand reading.

    Only Stage 1 runs; values are located and converted lazily as the
    returned document is walked, and no tape is built.
    */
    pub fn iterate<'p, 'input>(
        &'p mut self,
        input: &'input [u8],
    ) -> Result<ondemand::Document<'p, 'input>> {
        let backend = backend::active()?;

        self.ensure_capacity(input.len())?;
        backend.stage1(input, self, false)?;

        Ok(ondemand::Document::new(
            &self.structural_indexes[..self.n_structural_indexes],
            input,
            self.max_depth,
        ))
    }

    /**
    Parse a stream of whitespace-separated JSON documents.

    The input is processed in windows of up to `batch_capacity` bytes, so
    `batch_capacity` must be at least the size of the largest single document
    in the input. When the input spans more than one window, Stage 1 of the
    next window runs on a background thread while the current window is being
    read.
    */
    pub fn parse_many<'p, 'input>(
        &'p mut self,
        input: &'input [u8],
        batch_capacity: usize,
    ) -> Result<DocumentStream<'p, 'input>> {
        DocumentStream::new(self, input, batch_capacity)
    }

    /**
    Make sure the buffers can hold a document of `len` bytes.
    */
    pub(crate) fn ensure_capacity(&mut self, len: usize) -> Result<()> {
        if len <= self.capacity && !self.structural_indexes.is_empty() {
            return Ok(());
        }

        if self.fixed {
            return Err(Error::Capacity);
        }

        self.reallocate(len)
    }

    fn reallocate(&mut self, capacity: usize) -> Result<()> {
        // offsets are stored as `u32`
        if capacity >= u32::MAX as usize {
            return Err(Error::Memalloc);
        }

        // one slot per input byte, plus slack for the unconditional
        // eight-at-a-time writes in Stage 1 and the trailing sentinel
        let indexes = match capacity.checked_add(stage1::INDEX_SLACK) {
            Some(indexes) => indexes,
            None => return Err(Error::Memalloc),
        };

        self.structural_indexes.clear();
        self.structural_indexes.resize(indexes, 0);

        self.string_buf = Vec::with_capacity(capacity + 32);
        self.open_scopes = Vec::with_capacity(self.max_depth);

        self.capacity = capacity;

        Ok(())
    }
}
