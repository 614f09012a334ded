/*!
On-demand reading: lazy, forward-only access straight off the Stage 1 index.

Nothing here builds a tape. A [`Document`] wraps a cursor over the structural
offsets, and every [`Value`] is a thin move-only handle bound to the cursor's
position: reading it (as an object, array, number, string, bool or null)
consumes it exactly once, locating and converting the bytes at that moment.
Documents that are only partially read only pay for the parts they touch.

The price is that the cursor only moves forward. Iterating a container hands
out one live handle at a time (the next element can't exist until the current
one is consumed, which the borrow checker enforces), and looking up an object
field scans forward from the cursor, consuming the fields it passes, so a
key that was already passed can't be found again without re-indexing the
document. That's a deliberate trade, not a defect.

Dropping an unconsumed handle skips its content: a bracket-depth-balanced
forward scan past the value, with no semantic validation beyond bracket
matching. That's what makes "read `id` out of the third element and ignore
the rest" cheap.
*/

use std::borrow::Cow;

use crate::{
    error::{Error, Result},
    stage2::numbers::{self, Number},
    unescape,
};

/**
A document indexed for on-demand reading.

Created by [`crate::Parser::iterate`]. The document borrows the parser's
structural index, so it's readable until the parser's next parse.
*/
pub struct Document<'p, 'input> {
    iter: JsonIterator<'p, 'input>,
}

impl<'p, 'input> Document<'p, 'input> {
    pub(crate) fn new(structurals: &'p [u32], input: &'input [u8], max_depth: usize) -> Self {
        Document {
            iter: JsonIterator {
                input,
                structurals,
                token: 0,
                depth: 1,
                max_depth,
                err: None,
            },
        }
    }

    /**
    The document's root value.

    Like every on-demand value it can be consumed once; re-reading a
    document means re-indexing it.
    */
    pub fn root(&mut self) -> Result<Value<'_, 'p, 'input>> {
        if let Some(err) = self.iter.err {
            return Err(err);
        }

        Ok(Value::new(&mut self.iter))
    }
}

/**
The cursor state shared by every handle derived from one document.
*/
pub(crate) struct JsonIterator<'p, 'input> {
    input: &'input [u8],
    /**
    The structural offsets, including the trailing sentinel.
    */
    structurals: &'p [u32],
    /**
    The index of the next token to consume.
    */
    token: usize,
    /**
    The current nesting depth; the root value sits at depth 1.
    */
    depth: usize,
    max_depth: usize,
    /**
    The first structural error seen, latched; everything downstream of it
    reports rather than reads.
    */
    err: Option<Error>,
}

impl<'p, 'input> JsonIterator<'p, 'input> {
    #[inline(always)]
    fn tokens(&self) -> usize {
        self.structurals.len() - 1
    }

    /**
    The byte offset of a token (or the sentinel, one past the last token).
    */
    #[inline(always)]
    fn offset(&self, token: usize) -> usize {
        *get_unchecked!(self.structurals, token) as usize
    }

    #[inline(always)]
    fn peek(&self) -> Result<u8> {
        if self.token >= self.tokens() {
            // the document ran out where a token was required
            return Err(Error::Tape);
        }

        Ok(*get_unchecked!(self.input, self.offset(self.token)))
    }

    #[inline(always)]
    fn advance(&mut self) -> Result<(usize, u8)> {
        if self.token >= self.tokens() {
            return Err(Error::Tape);
        }

        let offset = self.offset(self.token);
        self.token += 1;

        Ok((offset, *get_unchecked!(self.input, offset)))
    }

    /**
    Latch the first structural error; later reads keep reporting it.
    */
    #[cold]
    fn fail(&mut self, err: Error) -> Error {
        match self.err {
            Some(first) => first,
            None => {
                self.err = Some(err);
                err
            }
        }
    }

    /**
    Skip one whole value starting at the cursor.
    */
    fn skip_value(&mut self, at_depth: usize) -> Result<()> {
        test_assert_eq!(self.depth, at_depth);

        match self.advance()? {
            (_, b'{') | (_, b'[') => {
                self.depth += 1;
                self.skip_to(at_depth)
            }
            // scalars are a single token
            _ => Ok(()),
        }
    }

    /**
    The bracket-depth-balanced forward scan: consume tokens until the cursor
    returns to `depth`.

    No validation happens beyond bracket matching.
    */
    fn skip_to(&mut self, depth: usize) -> Result<()> {
        while self.depth > depth {
            let (_, byte) = self.advance()?;

            match byte {
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' => self.depth -= 1,
                _ => (),
            }
        }

        Ok(())
    }

    /**
    Reject a token that can't start a value.

    Catches shapes like `[1,]` and `{"a":}` before a handle is built over
    the non-value.
    */
    fn check_value_start(&mut self) -> Result<()> {
        match self.peek() {
            Ok(b']') | Ok(b'}') | Ok(b',') | Ok(b':') => Err(self.fail(Error::Tape)),
            Ok(_) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }
}

/**
A single lazy value.

A value is bound to the cursor position it was created at and can be
consumed exactly once through one of the `get_*` readers (a failed
[`Error::IncorrectType`] read doesn't consume). Dropping an unconsumed value
skips its content so the parent iterator stays aligned.
*/
pub struct Value<'a, 'p, 'input> {
    iter: &'a mut JsonIterator<'p, 'input>,
    /**
    The nesting depth this value sits at.
    */
    depth: usize,
    consumed: bool,
}

impl<'a, 'p, 'input> Drop for Value<'a, 'p, 'input> {
    fn drop(&mut self) {
        if self.consumed || self.iter.err.is_some() {
            return;
        }

        let _ = self.iter.skip_value(self.depth);
    }
}

impl<'a, 'p, 'input> Value<'a, 'p, 'input> {
    fn new(iter: &'a mut JsonIterator<'p, 'input>) -> Self {
        let depth = iter.depth;

        Value {
            iter,
            depth,
            consumed: false,
        }
    }

    /**
    Fail any read of a document that already failed.
    */
    #[inline(always)]
    fn live(&self) -> Result<()> {
        if self.iter.err.is_some() {
            return Err(Error::Uninitialized);
        }

        Ok(())
    }

    /**
    Read this value as an object and iterate its fields.
    */
    pub fn get_object(&mut self) -> Result<Object<'_, 'p, 'input>> {
        self.start_container(b'{')?;

        Ok(Object {
            iter: &mut *self.iter,
            depth: self.depth + 1,
            state: IterState::Start,
        })
    }

    /**
    Read this value as an array and iterate its elements.
    */
    pub fn get_array(&mut self) -> Result<Array<'_, 'p, 'input>> {
        self.start_container(b'[')?;

        Ok(Array {
            iter: &mut *self.iter,
            depth: self.depth + 1,
            state: IterState::Start,
        })
    }

    fn start_container(&mut self, open: u8) -> Result<()> {
        self.live()?;

        if self.iter.peek().map_err(|e| self.iter.fail(e))? != open {
            return Err(Error::IncorrectType);
        }

        // the root value sits at depth 1, so `max_depth` containers are
        // allowed before the check trips, same as the tape builder
        if self.iter.depth > self.iter.max_depth {
            return Err(self.iter.fail(Error::Depth));
        }

        self.iter.advance().map_err(|e| self.iter.fail(e))?;
        self.iter.depth += 1;
        self.consumed = true;

        Ok(())
    }

    pub fn get_bool(&mut self) -> Result<bool> {
        self.live()?;

        match self.iter.peek().map_err(|e| self.iter.fail(e))? {
            b't' => {
                self.consume_atom(b"true")?;
                Ok(true)
            }
            b'f' => {
                self.consume_atom(b"false")?;
                Ok(false)
            }
            _ => Err(Error::IncorrectType),
        }
    }

    /**
    Whether this value is `null`, consuming it if it is.
    */
    pub fn is_null(&mut self) -> Result<bool> {
        self.live()?;

        match self.iter.peek().map_err(|e| self.iter.fail(e))? {
            b'n' => {
                self.consume_atom(b"null")?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn consume_atom(&mut self, atom: &[u8]) -> Result<()> {
        let (offset, _) = self.iter.advance().map_err(|e| self.iter.fail(e))?;
        let end = offset + atom.len();

        let matches = end <= self.iter.input.len()
            && get_unchecked!(self.iter.input, offset..end) == atom
            && match self.iter.input.get(end) {
                Some(&b) => crate::stage1::is_structural_or_ws(b),
                None => true,
            };

        if !matches {
            return Err(self.iter.fail(Error::Tape));
        }

        self.consumed = true;
        Ok(())
    }

    fn number(&mut self) -> Result<Number> {
        self.live()?;

        match self.iter.peek().map_err(|e| self.iter.fail(e))? {
            b'-' | b'0'..=b'9' => (),
            _ => return Err(Error::IncorrectType),
        }

        let (offset, _) = self.iter.advance().map_err(|e| self.iter.fail(e))?;
        self.consumed = true;

        let limit = self.iter.offset(self.iter.token);

        numbers::parse(self.iter.input, offset, limit).map_err(|e| self.iter.fail(e))
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        match self.number()? {
            Number::I64(v) if v >= 0 => Ok(v as u64),
            Number::I64(_) => Err(Error::NumberOutOfRange),
            Number::U64(v) => Ok(v),
            Number::F64(_) => Err(Error::IncorrectType),
        }
    }

    pub fn get_i64(&mut self) -> Result<i64> {
        match self.number()? {
            Number::I64(v) => Ok(v),
            // only numbers wider than `i64` come out tagged unsigned
            Number::U64(_) => Err(Error::NumberOutOfRange),
            Number::F64(_) => Err(Error::IncorrectType),
        }
    }

    /**
    Read this value as a double.

    Any JSON number reads as a double; integers convert.
    */
    pub fn get_f64(&mut self) -> Result<f64> {
        match self.number()? {
            Number::I64(v) => Ok(v as f64),
            Number::U64(v) => Ok(v as f64),
            Number::F64(v) => Ok(v),
        }
    }

    /**
    Read this value as a string without unescaping: the raw bytes between
    the quotes.
    */
    pub fn get_raw_str(&mut self) -> Result<&'input str> {
        let (raw, _) = self.string_contents()?;

        Ok(from_utf8_unchecked!(raw))
    }

    /**
    Read this value as a string.

    Only strings that actually contain escapes allocate; the rest borrow
    the input.
    */
    pub fn get_string(&mut self) -> Result<Cow<'input, str>> {
        let (raw, escaped) = self.string_contents()?;

        if escaped {
            let unescaped = unescape::unescape(raw).map_err(|e| self.iter.fail(e))?;
            Ok(Cow::Owned(unescaped))
        } else {
            Ok(Cow::Borrowed(from_utf8_unchecked!(raw)))
        }
    }

    fn string_contents(&mut self) -> Result<(&'input [u8], bool)> {
        self.live()?;

        if self.iter.peek().map_err(|e| self.iter.fail(e))? != b'"' {
            return Err(Error::IncorrectType);
        }

        let (offset, _) = self.iter.advance().map_err(|e| self.iter.fail(e))?;
        self.consumed = true;

        raw_string_contents(self.iter.input, offset + 1).map_err(|e| self.iter.fail(e))
    }
}

/**
The contents of the string whose opening quote sits at `start - 1`, along
with whether it contains any escapes.
*/
fn raw_string_contents(input: &[u8], start: usize) -> Result<(&[u8], bool)> {
    let mut escaped = false;
    let mut i = start;

    loop {
        match input.get(i) {
            None => return Err(Error::UnclosedString),
            Some(&b'"') => return Ok((get_unchecked!(input, start..i), escaped)),
            Some(&b'\\') => {
                escaped = true;
                // the escaped byte can't close the string
                i += 2;
            }
            Some(&b) if b < 0x20 => return Err(Error::UnescapedChars),
            Some(_) => i += 1,
        }
    }
}

/**
Where a container iterator is in its element sequence.
*/
#[derive(Debug, Clone, Copy, PartialEq)]
enum IterState {
    /**
    Just past the opening bracket, before the first element.
    */
    Start,
    /**
    Between elements: the next token is a separator or the closing bracket.
    */
    Next,
    /**
    A child value wasn't fully consumed, leaving the cursor deeper than the
    iterator; resolved by a skip before anything else happens.
    */
    UnfinishedBusiness,
    /**
    An upstream error, to surface exactly once before finishing.
    */
    ChainedError(Error),
    /**
    The separator between two elements was missing; surfaced exactly once.
    */
    MissingComma,
    /**
    Fully consumed, closing bracket included.
    */
    Finished,
}

/**
An iterator over a JSON array's elements.

Elements come out one at a time through [`Array::next`]; each handed-out
[`Value`] borrows the iterator, so it has to be consumed (or dropped, which
skips it) before the next one. Dropping the iterator itself skips whatever
remains of the array.
*/
pub struct Array<'a, 'p, 'input> {
    iter: &'a mut JsonIterator<'p, 'input>,
    /**
    The depth of the array's elements.
    */
    depth: usize,
    state: IterState,
}

impl<'a, 'p, 'input> Drop for Array<'a, 'p, 'input> {
    fn drop(&mut self) {
        if self.state == IterState::Finished || self.iter.err.is_some() {
            return;
        }

        // consume through the closing bracket
        let _ = self.iter.skip_to(self.depth - 1);
    }
}

impl<'a, 'p, 'input> Array<'a, 'p, 'input> {
    /**
    The next element, or `None` once the closing bracket is consumed.
    */
    pub fn next(&mut self) -> Option<Result<Value<'_, 'p, 'input>>> {
        loop {
            match self.state {
                IterState::Start => {
                    if let Some(err) = self.iter.err {
                        self.state = IterState::ChainedError(err);
                        continue;
                    }

                    match self.iter.peek() {
                        Ok(b']') => {
                            // the empty array
                            let _ = self.iter.advance();
                            self.iter.depth -= 1;
                            self.state = IterState::Finished;
                            return None;
                        }
                        Ok(_) => {
                            if let Err(err) = self.iter.check_value_start() {
                                self.state = IterState::ChainedError(err);
                                continue;
                            }

                            self.state = IterState::Next;
                            return Some(Ok(Value::new(&mut *self.iter)));
                        }
                        Err(err) => {
                            self.state = IterState::ChainedError(self.iter.fail(err));
                        }
                    }
                }
                IterState::Next => {
                    if let Some(err) = self.iter.err {
                        self.state = IterState::ChainedError(err);
                        continue;
                    }

                    if self.iter.depth > self.depth {
                        self.state = IterState::UnfinishedBusiness;
                        continue;
                    }

                    match self.iter.advance() {
                        Ok((_, b',')) => {
                            if let Err(err) = self.iter.check_value_start() {
                                self.state = IterState::ChainedError(err);
                                continue;
                            }

                            self.state = IterState::Next;
                            return Some(Ok(Value::new(&mut *self.iter)));
                        }
                        Ok((_, b']')) => {
                            self.iter.depth -= 1;
                            self.state = IterState::Finished;
                            return None;
                        }
                        Ok(_) => {
                            self.state = IterState::MissingComma;
                        }
                        Err(err) => {
                            self.state = IterState::ChainedError(self.iter.fail(err));
                        }
                    }
                }
                IterState::UnfinishedBusiness => {
                    match self.iter.skip_to(self.depth) {
                        Ok(()) => self.state = IterState::Next,
                        Err(err) => self.state = IterState::ChainedError(self.iter.fail(err)),
                    }
                }
                IterState::ChainedError(err) => {
                    self.state = IterState::Finished;
                    return Some(Err(err));
                }
                IterState::MissingComma => {
                    self.state = IterState::Finished;
                    return Some(Err(self.iter.fail(Error::Tape)));
                }
                IterState::Finished => return None,
            }
        }
    }
}

/**
An iterator over a JSON object's fields.

Same single-live-handle rules as [`Array`]. [`Object::find_field`] scans
forward for a key, consuming and discarding the fields it passes; a key
positioned before the cursor is [`Error::NoSuchField`], not a rewind.
*/
pub struct Object<'a, 'p, 'input> {
    iter: &'a mut JsonIterator<'p, 'input>,
    /**
    The depth of the object's fields.
    */
    depth: usize,
    state: IterState,
}

impl<'a, 'p, 'input> Drop for Object<'a, 'p, 'input> {
    fn drop(&mut self) {
        if self.state == IterState::Finished || self.iter.err.is_some() {
            return;
        }

        let _ = self.iter.skip_to(self.depth - 1);
    }
}

/**
One field of an object: its raw key plus the value handle.
*/
pub struct Field<'a, 'p, 'input> {
    name: &'input [u8],
    name_escaped: bool,
    /**
    The field's value; taking it consumes the field.
    */
    pub value: Value<'a, 'p, 'input>,
}

impl<'a, 'p, 'input> Field<'a, 'p, 'input> {
    /**
    The key without unescaping: the raw bytes between the quotes.
    */
    pub fn raw_name(&self) -> &'input str {
        from_utf8_unchecked!(self.name)
    }

    /**
    The key, unescaped if it needs to be.
    */
    pub fn name(&self) -> Result<Cow<'input, str>> {
        if self.name_escaped {
            Ok(Cow::Owned(unescape::unescape(self.name)?))
        } else {
            Ok(Cow::Borrowed(from_utf8_unchecked!(self.name)))
        }
    }
}

impl<'a, 'p, 'input> Object<'a, 'p, 'input> {
    /**
    The next field, or `None` once the closing brace is consumed.
    */
    pub fn next_field(&mut self) -> Option<Result<Field<'_, 'p, 'input>>> {
        match self.field_start() {
            Ok(Some((name, name_escaped))) => Some(Ok(Field {
                name,
                name_escaped,
                value: Value::new(&mut *self.iter),
            })),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }

    /**
    Scan forward for the first field named `key` and return its value.

    Fields before the match are consumed and discarded. A key the cursor
    already passed is [`Error::NoSuchField`]; so is a key the object simply
    doesn't have, with the whole object consumed as a side effect.
    */
    pub fn find_field(&mut self, key: &str) -> Result<Value<'_, 'p, 'input>> {
        loop {
            let (name, name_escaped) = match self.field_start()? {
                Some(field) => field,
                None => return Err(Error::NoSuchField),
            };

            let matched = if name_escaped {
                let unescaped = unescape::unescape(name).map_err(|e| self.iter.fail(e))?;
                unescaped == key
            } else {
                name == key.as_bytes()
            };

            if matched {
                return Ok(Value::new(&mut *self.iter));
            }

            // not this one: discard the value and keep scanning
            if let Err(err) = self.iter.skip_value(self.depth) {
                return Err(self.iter.fail(err));
            }
        }
    }

    /**
    Drive the field state machine up to the start of the next field's value,
    returning the raw key.
    */
    fn field_start(&mut self) -> Result<Option<(&'input [u8], bool)>> {
        loop {
            match self.state {
                IterState::Start => {
                    if let Some(err) = self.iter.err {
                        self.state = IterState::ChainedError(err);
                        continue;
                    }

                    match self.iter.peek() {
                        Ok(b'}') => {
                            // the empty object
                            let _ = self.iter.advance();
                            self.iter.depth -= 1;
                            self.state = IterState::Finished;
                            return Ok(None);
                        }
                        Ok(b'"') => return self.read_key(),
                        Ok(_) => {
                            // keys can only be strings
                            self.state = IterState::ChainedError(self.iter.fail(Error::Tape));
                        }
                        Err(err) => {
                            self.state = IterState::ChainedError(self.iter.fail(err));
                        }
                    }
                }
                IterState::Next => {
                    if let Some(err) = self.iter.err {
                        self.state = IterState::ChainedError(err);
                        continue;
                    }

                    if self.iter.depth > self.depth {
                        self.state = IterState::UnfinishedBusiness;
                        continue;
                    }

                    match self.iter.advance() {
                        Ok((_, b',')) => match self.iter.peek() {
                            Ok(b'"') => return self.read_key(),
                            Ok(_) => {
                                self.state = IterState::ChainedError(self.iter.fail(Error::Tape));
                            }
                            Err(err) => {
                                self.state = IterState::ChainedError(self.iter.fail(err));
                            }
                        },
                        Ok((_, b'}')) => {
                            self.iter.depth -= 1;
                            self.state = IterState::Finished;
                            return Ok(None);
                        }
                        Ok(_) => {
                            self.state = IterState::MissingComma;
                        }
                        Err(err) => {
                            self.state = IterState::ChainedError(self.iter.fail(err));
                        }
                    }
                }
                IterState::UnfinishedBusiness => {
                    match self.iter.skip_to(self.depth) {
                        Ok(()) => self.state = IterState::Next,
                        Err(err) => self.state = IterState::ChainedError(self.iter.fail(err)),
                    }
                }
                IterState::ChainedError(err) => {
                    self.state = IterState::Finished;
                    return Err(err);
                }
                IterState::MissingComma => {
                    self.state = IterState::Finished;
                    return Err(self.iter.fail(Error::Tape));
                }
                IterState::Finished => return Ok(None),
            }
        }
    }

    /**
    Consume a key (the cursor is at its opening quote), the `:` after it,
    and leave the cursor at the value.
    */
    fn read_key(&mut self) -> Result<Option<(&'input [u8], bool)>> {
        let result = (|| {
            let (offset, _) = self.iter.advance()?;
            let (name, name_escaped) = raw_string_contents(self.iter.input, offset + 1)?;

            match self.iter.advance()? {
                (_, b':') => (),
                _ => return Err(Error::Tape),
            }

            self.iter.check_value_start()?;

            Ok((name, name_escaped))
        })();

        match result {
            Ok(field) => {
                self.state = IterState::Next;
                Ok(Some(field))
            }
            Err(err) => {
                let err = self.iter.fail(err);
                self.state = IterState::Finished;
                Err(err)
            }
        }
    }
}
