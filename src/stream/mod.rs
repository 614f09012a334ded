/*!
Document streams: reading many JSON documents out of one input.

A stream processes the input in fixed-size windows ("batches"). Each window
gets one Stage 1 pass, then Stage 2 runs once per document as the stream is
pulled, so NDJSON-style inputs pay for indexing in big sequential chunks but
only materialize one document at a time.

A window usually ends mid-document. The stream finds the last complete
top-level document in the window and carries the remainder over into the next
window; at the true end of the input the remainder is reported through
[`DocumentStream::truncated_bytes`] instead of as a hard error, so callers
feeding a growing buffer know to retry with more data.

When the input spans more than one window, Stage 1 of the next window runs on
a lazily-started background thread while the current window is being read
(see [`worker`]). The two sides never touch the same parser at the same time:
the background thread owns its own parser, and the stream swaps the whole
parser in after a blocking wait for the result.
*/

pub(crate) mod worker;

use crate::{
    backend,
    error::{Error, Result},
    parser::Parser,
    stage1,
    tape::Document,
};

/**
The smallest allowed batch capacity.

Tiny windows would spend all their time on boundary handling.
*/
pub const MINIMAL_BATCH_CAPACITY: usize = 64;

/**
What one Stage 1 pass over a window produced.
*/
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Batch {
    /**
    The window length handed to Stage 1.
    */
    len: usize,
    /**
    The window bytes covered by complete documents (plus any whitespace tail
    when the window ends the input cleanly).
    */
    consumed: usize,
    /**
    An indexing error positioned after the complete documents, surfaced once
    they've been served.
    */
    err: Option<Error>,
}

/**
A lazily-produced sequence of top-level JSON documents.

Created by [`Parser::parse_many`]. Each call to [`DocumentStream::next`]
parses one document into the owning parser's tape, so a yielded [`Document`]
is readable until the next call.
*/
pub struct DocumentStream<'p, 'input> {
    parser: &'p mut Parser,
    input: &'input [u8],
    batch_capacity: usize,
    batch_start: usize,
    batch: Batch,
    started: bool,
    finished: bool,
    truncated: usize,
    threaded: bool,
    worker: Option<worker::Worker>,
    worker_busy: bool,
    spare: Option<Box<Parser>>,
}

impl<'p, 'input> DocumentStream<'p, 'input> {
    pub(crate) fn new(
        parser: &'p mut Parser,
        input: &'input [u8],
        batch_capacity: usize,
    ) -> Result<Self> {
        let batch_capacity = batch_capacity.max(MINIMAL_BATCH_CAPACITY);

        parser.ensure_capacity(batch_capacity.min(input.len()))?;

        Ok(DocumentStream {
            parser,
            input,
            batch_capacity,
            batch_start: 0,
            batch: Batch::default(),
            started: false,
            finished: false,
            truncated: 0,
            threaded: input.len() > batch_capacity,
            worker: None,
            worker_busy: false,
            spare: None,
        })
    }

    /**
    The next document in the stream.

    Yields `Some(Err(..))` once and then ends if a document fails to parse
    or a window fails to index.
    */
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<Result<Document<'_>>> {
        if self.finished {
            return None;
        }

        if !self.started {
            self.started = true;

            if self.input.is_empty() {
                self.finished = true;
                return None;
            }

            let len = self.batch_capacity.min(self.input.len());
            let window = get_unchecked!(self.input, ..len);

            match load_window(self.parser, window, len == self.input.len()) {
                Ok(batch) => self.batch = batch,
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            }

            self.start_background_index();
        }

        loop {
            // serve the next document out of the current window
            if self.parser.next_structural + 1 < self.parser.n_structural_indexes {
                let window = get_unchecked!(
                    self.input,
                    self.batch_start..self.batch_start + self.batch.len
                );

                let backend = match backend::active() {
                    Ok(backend) => backend,
                    Err(err) => {
                        self.finished = true;
                        return Some(Err(err));
                    }
                };

                match backend.stage2_next(window, self.parser) {
                    Ok(_) => return Some(Ok(Document::new(self.parser))),
                    Err(err) => {
                        // a failed document poisons the rest of the stream
                        self.finished = true;
                        return Some(Err(err));
                    }
                }
            }

            // the window is exhausted: surface a deferred indexing error...
            if let Some(err) = self.batch.err {
                self.finished = true;
                return Some(Err(err));
            }

            let next_start = self.batch_start + self.batch.consumed;

            // ...report the truncated remainder at the end of the input...
            if self.batch_start + self.batch.len >= self.input.len() {
                self.truncated = self.input.len() - next_start;
                self.finished = true;
                return None;
            }

            // ...or move to the next window
            if let Err(err) = self.advance_window(next_start) {
                self.finished = true;
                return Some(Err(err));
            }
        }
    }

    /**
    The bytes of an incomplete document left at the end of the input.

    Zero until the stream ends. Callers streaming a growing buffer can
    append more data and retry from `input.len() - truncated_bytes()`.
    */
    pub fn truncated_bytes(&self) -> usize {
        self.truncated
    }

    fn advance_window(&mut self, next_start: usize) -> Result<()> {
        self.batch_start = next_start;

        if self.worker_busy {
            // blocking wait for the background index, then swap the whole
            // parser in; the same buffers are never touched by both sides
            let (mut background, result) = match &self.worker {
                Some(worker) => worker.recv(),
                None => return Err(Error::Uninitialized),
            };
            self.worker_busy = false;

            std::mem::swap(&mut *self.parser, &mut *background);
            self.spare = Some(background);

            self.batch = result?;
        } else {
            let len = self.batch_capacity.min(self.input.len() - next_start);
            let window = get_unchecked!(self.input, next_start..next_start + len);

            self.batch = load_window(self.parser, window, next_start + len == self.input.len())?;
        }

        self.start_background_index();
        Ok(())
    }

    /**
    Hand the window after the current one to the background worker, starting
    the worker the first time it's needed.
    */
    fn start_background_index(&mut self) {
        if !self.threaded || self.worker_busy || self.batch.err.is_some() {
            return;
        }

        // nothing to index ahead once the current window reaches the end of
        // the input; the remainder there is truncation, not a new window
        if self.batch_start + self.batch.len >= self.input.len() {
            return;
        }

        let next_start = self.batch_start + self.batch.consumed;

        if self.worker.is_none() {
            self.worker = worker::Worker::spawn();

            if self.worker.is_none() {
                // couldn't spawn a thread; stay synchronous
                self.threaded = false;
                return;
            }
        }

        let background = match self.spare.take() {
            Some(parser) => parser,
            None => match Parser::with_capacity(self.batch_capacity, self.parser.max_depth()) {
                Ok(parser) => Box::new(parser),
                Err(_) => {
                    self.threaded = false;
                    return;
                }
            },
        };

        let len = self.batch_capacity.min(self.input.len() - next_start);
        let window = get_unchecked!(self.input, next_start..next_start + len);
        let final_window = next_start + len == self.input.len();

        if let Some(worker) = &self.worker {
            worker.send(background, window, final_window);
            self.worker_busy = true;
        }
    }
}

/**
Run Stage 1 over one window and work out how much of it is servable.
*/
pub(crate) fn load_window(parser: &mut Parser, window: &[u8], final_window: bool) -> Result<Batch> {
    match backend::active()?.stage1(window, parser, true) {
        Ok(()) => (),
        Err(Error::Empty) => {
            // nothing but whitespace; skip the whole window
            return Ok(Batch {
                len: window.len(),
                consumed: window.len(),
                err: None,
            });
        }
        Err(err) => return Err(err),
    }

    let (limit, err) = match parser.stage1_err {
        Some((at, err)) => (at as usize, Some(err)),
        None => (window.len(), None),
    };

    let (mut consumed, tokens) = find_docs_end(
        get_unchecked!(parser.structural_indexes, ..parser.n_structural_indexes),
        window,
        limit,
        parser.unclosed_at_end,
        final_window,
    );

    if tokens == 0 && err.is_none() && !final_window {
        // not even one complete document fits in a window
        return Err(Error::Capacity);
    }

    // a whitespace-only remainder is consumed with the window rather than
    // carried forward (or misreported as truncation at the end of the input)
    if err.is_none()
        && consumed < window.len()
        && get_unchecked!(window, consumed..)
            .iter()
            .all(|&b| stage1::is_whitespace(b))
    {
        consumed = window.len();
    }

    // drop the structurals past the last complete document and point the
    // sentinel at its end
    parser.n_structural_indexes = tokens + 1;
    *get_unchecked_mut!(parser.structural_indexes, tokens) = consumed as u32;
    parser.next_structural = 0;

    Ok(Batch {
        len: window.len(),
        consumed,
        err,
    })
}

/**
Walk the structural offsets to find where the window's last complete
top-level document ends.

Returns the end as a byte offset and a token count. Closing brackets that
return to depth zero are definite ends. A bare scalar at depth zero only
counts when another token follows it (otherwise `12` might be the front half
of `123`) or when the window ends the whole input, where nothing can follow.
*/
fn find_docs_end(
    structurals: &[u32],
    window: &[u8],
    limit: usize,
    unclosed_at_end: bool,
    final_window: bool,
) -> (usize, usize) {
    let tokens = structurals.len() - 1;

    let mut depth = 0usize;
    let mut end_bytes = 0usize;
    let mut end_tokens = 0usize;

    for i in 0..tokens {
        let offset = *get_unchecked!(structurals, i) as usize;

        if offset >= limit {
            break;
        }

        match *get_unchecked!(window, offset) {
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);

                if depth == 0 {
                    end_bytes = offset + 1;
                    end_tokens = i + 1;
                }
            }
            _ if depth == 0 => {
                let next = *get_unchecked!(structurals, i + 1) as usize;

                if i + 1 < tokens && next < limit {
                    end_bytes = next;
                    end_tokens = i + 1;
                } else if final_window && limit == window.len() && !unclosed_at_end {
                    end_bytes = window.len();
                    end_tokens = i + 1;
                }
            }
            _ => (),
        }
    }

    (end_bytes, end_tokens)
}
