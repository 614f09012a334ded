/*!
Stage 2: tape building.

A grammar state machine walks the structural offsets Stage 1 produced and
writes the tape. There's no token stream and no recursion: the machine is an
explicit [`State`] plus a stack of [`OpenScope`]s, and every transition is
driven by the single byte at the next structural offset.

Failure is immediate and non-recoverable; once a transition is rejected the
parser's document state is unusable until the next full parse. The one
non-error early exit is [`build_next`], which stops after a complete
top-level document and reports whether more structurals remain in the window,
which is what document streams use to hand out NDJSON documents one at a
time.
*/

pub(crate) mod numbers;
pub(crate) mod strings;

use crate::{
    error::{Error, Result},
    parser::{OpenScope, Parser},
    stage1,
    tape::{self, TapeType},
};

use numbers::Number;

/**
Build the tape for a window that must contain exactly one document.
*/
pub(crate) fn build(input: &[u8], parser: &mut Parser) -> Result<()> {
    let more = build_one(input, parser, 0)?;

    if more {
        // trailing content after the document
        return Err(Error::Tape);
    }

    Ok(())
}

/**
Build the tape for the next document in the current window.

Returns `true` when unconsumed structurals remain after the document, in
which case calling again parses the next one.
*/
pub(crate) fn build_next(input: &[u8], parser: &mut Parser) -> Result<bool> {
    let start = parser.next_structural;
    build_one(input, parser, start)
}

fn build_one(input: &[u8], parser: &mut Parser, start: usize) -> Result<bool> {
    let tokens = parser.n_structural_indexes.saturating_sub(1);
    let max_depth = parser.max_depth();

    let mut builder = TapeBuilder {
        input,
        structurals: get_unchecked!(parser.structural_indexes, ..parser.n_structural_indexes),
        tokens,
        pos: start,
        tape: &mut parser.tape,
        string_buf: &mut parser.string_buf,
        scopes: &mut parser.open_scopes,
        max_depth,
    };

    builder.run()?;
    let pos = builder.pos;

    parser.next_structural = pos;

    Ok(pos < tokens)
}

/**
The tape builder's position in the document grammar.

The container states mirror the places a `,`, `:` or closing bracket may
appear; scalars never get a state of their own because they're written in
full as part of the transition that sees their first byte.
*/
#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    /**
    Inside a just-opened object: the next token is the first key or `}`.
    */
    ObjectBegin,
    /**
    After an object key: the next tokens are `:` and a value.
    */
    ObjectField,
    /**
    After an object value: the next token is `,` or `}`.
    */
    ObjectContinue,
    /**
    Inside a just-opened array: the next token is the first value or `]`.
    */
    ArrayBegin,
    /**
    After an array `,`: the next token must be a value.
    */
    ArrayValue,
    /**
    After an array value: the next token is `,` or `]`.
    */
    ArrayContinue,
    /**
    The document's root value is complete.
    */
    End,
}

struct TapeBuilder<'a, 'input> {
    input: &'input [u8],
    /**
    The structural offsets for the window, including the trailing sentinel.
    */
    structurals: &'a [u32],
    /**
    The number of real tokens (the sentinel excluded).
    */
    tokens: usize,
    pos: usize,
    tape: &'a mut Vec<u64>,
    string_buf: &'a mut Vec<u8>,
    scopes: &'a mut Vec<OpenScope>,
    max_depth: usize,
}

impl<'a, 'input> TapeBuilder<'a, 'input> {
    fn run(&mut self) -> Result<()> {
        self.tape.clear();
        self.string_buf.clear();
        self.scopes.clear();

        if self.pos >= self.tokens {
            return Err(Error::Empty);
        }

        // tape[0] is the root word, patched once the document completes
        self.tape.push(0);

        let (offset, byte) = self.advance();
        let mut state = match byte {
            b'{' => self.begin_scope(true)?,
            b'[' => self.begin_scope(false)?,
            _ => {
                // a bare scalar document
                self.scalar(offset, byte)?;
                State::End
            }
        };

        loop {
            state = match state {
                State::ObjectBegin => {
                    let (offset, byte) = self.advance_checked()?;
                    match byte {
                        b'}' => self.end_scope(byte)?,
                        b'"' => {
                            self.bump_count();
                            self.string_value(offset)?;
                            State::ObjectField
                        }
                        _ => return Err(Error::Tape),
                    }
                }
                State::ObjectField => {
                    match self.advance_checked()? {
                        (_, b':') => (),
                        _ => return Err(Error::Tape),
                    }

                    let (offset, byte) = self.advance_checked()?;
                    match byte {
                        b'{' => self.begin_scope(true)?,
                        b'[' => self.begin_scope(false)?,
                        _ => {
                            self.scalar(offset, byte)?;
                            State::ObjectContinue
                        }
                    }
                }
                State::ObjectContinue => {
                    let (_, byte) = self.advance_checked()?;
                    match byte {
                        b',' => match self.advance_checked()? {
                            (offset, b'"') => {
                                self.bump_count();
                                self.string_value(offset)?;
                                State::ObjectField
                            }
                            _ => return Err(Error::Tape),
                        },
                        b'}' => self.end_scope(byte)?,
                        _ => return Err(Error::Tape),
                    }
                }
                State::ArrayBegin => {
                    let (offset, byte) = self.advance_checked()?;
                    match byte {
                        b']' => self.end_scope(byte)?,
                        _ => {
                            self.bump_count();
                            self.array_value(offset, byte)?
                        }
                    }
                }
                State::ArrayValue => {
                    let (offset, byte) = self.advance_checked()?;
                    self.bump_count();
                    self.array_value(offset, byte)?
                }
                State::ArrayContinue => {
                    let (_, byte) = self.advance_checked()?;
                    match byte {
                        b',' => State::ArrayValue,
                        b']' => self.end_scope(byte)?,
                        _ => return Err(Error::Tape),
                    }
                }
                State::End => {
                    let end = self.tape.len() as u64 + 1;

                    self.tape.push(tape::word(TapeType::Root, 0));
                    *get_unchecked_mut!(self.tape, 0) = tape::word(TapeType::Root, end);

                    return Ok(());
                }
            };
        }
    }

    /**
    Consume the token at the cursor.

    Only legal when a token is known to remain.
    */
    #[inline(always)]
    fn advance(&mut self) -> (usize, u8) {
        test_assert!(self.pos < self.tokens);

        let offset = *get_unchecked!(self.structurals, self.pos) as usize;
        self.pos += 1;

        (offset, *get_unchecked!(self.input, offset))
    }

    /**
    Consume the next token, failing if the document ends first.
    */
    #[inline(always)]
    fn advance_checked(&mut self) -> Result<(usize, u8)> {
        if self.pos >= self.tokens {
            // the window ran out mid-document
            return Err(Error::Tape);
        }

        Ok(self.advance())
    }

    /**
    The offset that bounds a scalar starting at the previous token: the next
    token's offset, or the sentinel at the end of the window.
    */
    #[inline(always)]
    fn scalar_limit(&self) -> usize {
        *get_unchecked!(self.structurals, self.pos) as usize
    }

    #[inline(always)]
    fn bump_count(&mut self) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.count += 1;
        }
    }

    fn begin_scope(&mut self, in_object: bool) -> Result<State> {
        if self.scopes.len() >= self.max_depth {
            return Err(Error::Depth);
        }

        self.scopes.push(OpenScope {
            tape_index: self.tape.len() as u32,
            count: 0,
            in_object,
        });

        // patched with the close index and count when the scope ends
        self.tape.push(0);

        Ok(if in_object {
            State::ObjectBegin
        } else {
            State::ArrayBegin
        })
    }

    fn end_scope(&mut self, close: u8) -> Result<State> {
        let scope = match self.scopes.pop() {
            Some(scope) => scope,
            None => return Err(Error::Tape),
        };

        // `{` closed by `]` or `[` closed by `}`
        if scope.in_object != (close == b'}') {
            return Err(Error::Tape);
        }

        let close_index = self.tape.len() as u32;
        let (open_tag, close_tag) = if scope.in_object {
            (TapeType::StartObject, TapeType::EndObject)
        } else {
            (TapeType::StartArray, TapeType::EndArray)
        };

        // open and close point at each other; the open word also carries a
        // saturating element count in its upper payload bits
        self.tape.push(tape::word(close_tag, scope.tape_index as u64));

        let count = scope.count.min(tape::COUNT_SATURATED) as u64;
        *get_unchecked_mut!(self.tape, scope.tape_index as usize) =
            tape::word(open_tag, count << 32 | close_index as u64);

        Ok(match self.scopes.last() {
            None => State::End,
            Some(parent) if parent.in_object => State::ObjectContinue,
            Some(_) => State::ArrayContinue,
        })
    }

    fn array_value(&mut self, offset: usize, byte: u8) -> Result<State> {
        match byte {
            b'{' => self.begin_scope(true),
            b'[' => self.begin_scope(false),
            _ => {
                self.scalar(offset, byte)?;
                Ok(State::ArrayContinue)
            }
        }
    }

    fn scalar(&mut self, offset: usize, byte: u8) -> Result<()> {
        match byte {
            b'"' => self.string_value(offset),
            b'-' | b'0'..=b'9' => {
                let number = numbers::parse(self.input, offset, self.scalar_limit())?;

                match number {
                    Number::I64(v) => {
                        self.tape.push(tape::word(TapeType::Int64, 0));
                        self.tape.push(v as u64);
                    }
                    Number::U64(v) => {
                        self.tape.push(tape::word(TapeType::UInt64, 0));
                        self.tape.push(v);
                    }
                    Number::F64(v) => {
                        self.tape.push(tape::word(TapeType::Double, 0));
                        self.tape.push(v.to_bits());
                    }
                }

                Ok(())
            }
            b't' => {
                self.check_atom(offset, b"true")?;
                self.tape.push(tape::word(TapeType::True, 0));
                Ok(())
            }
            b'f' => {
                self.check_atom(offset, b"false")?;
                self.tape.push(tape::word(TapeType::False, 0));
                Ok(())
            }
            b'n' => {
                self.check_atom(offset, b"null")?;
                self.tape.push(tape::word(TapeType::Null, 0));
                Ok(())
            }
            _ => Err(Error::Tape),
        }
    }

    fn string_value(&mut self, offset: usize) -> Result<()> {
        let location = strings::parse_into(self.input, offset + 1, self.string_buf)?;
        self.tape.push(tape::word(TapeType::String, location as u64));
        Ok(())
    }

    fn check_atom(&mut self, offset: usize, atom: &[u8]) -> Result<()> {
        let end = offset + atom.len();

        if end > self.input.len() || get_unchecked!(self.input, offset..end) != atom {
            return Err(Error::Tape);
        }

        // the token must end with the atom: `nullx` is not `null`
        if let Some(&b) = self.input.get(end) {
            if !stage1::is_structural_or_ws(b) {
                return Err(Error::Tape);
            }
        }

        Ok(())
    }
}
