/*!
The tape: a parsed document as a flat sequence of tagged 64-bit words.

Each word carries a type tag in its high byte and a 56-bit payload. Scalars
are one word (numbers two: the tag word then the raw 64-bit value), and
containers are a pair of words whose payloads point at each other, so a
reader can hop over a whole container in one step. Strings live in the
parser's string arena; their words carry the arena offset.

The tape is an in-memory artifact only. Its layout isn't stable across
versions and it never leaves the parser that built it.
*/

use std::fmt;

use crate::{
    error::{Error, Result},
    parser::Parser,
    stage2::strings,
};

/**
The low 56 bits of a tape word.
*/
pub(crate) const VALUE_MASK: u64 = 0x00FF_FFFF_FFFF_FFFF;

/**
The saturation point for a container's element count.

Containers with more elements than this still parse; only the count hint
stored in the open word stops growing.
*/
pub const COUNT_SATURATED: u32 = 0xFF_FFFF;

/**
The type tag in a tape word's high byte.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TapeType {
    Root = b'r',
    StartObject = b'{',
    EndObject = b'}',
    StartArray = b'[',
    EndArray = b']',
    String = b'"',
    Int64 = b'l',
    UInt64 = b'u',
    Double = b'd',
    True = b't',
    False = b'f',
    Null = b'n',
}

#[inline(always)]
pub(crate) fn word(tag: TapeType, payload: u64) -> u64 {
    test_assert_eq!(0, payload & !VALUE_MASK);

    (tag as u64) << 56 | payload
}

#[inline(always)]
fn tag_of(word: u64) -> TapeType {
    match (word >> 56) as u8 {
        b'{' => TapeType::StartObject,
        b'}' => TapeType::EndObject,
        b'[' => TapeType::StartArray,
        b']' => TapeType::EndArray,
        b'"' => TapeType::String,
        b'l' => TapeType::Int64,
        b'u' => TapeType::UInt64,
        b'd' => TapeType::Double,
        b't' => TapeType::True,
        b'f' => TapeType::False,
        b'n' => TapeType::Null,
        _ => TapeType::Root,
    }
}

#[inline(always)]
fn payload_of(word: u64) -> u64 {
    word & VALUE_MASK
}

/**
A parsed JSON document backed by its parser's tape.

A document is a pair of borrowed views (the tape and the string arena), so
it's `Copy` and free to hand around, but it only lives until the next parse
on the owning [`Parser`].
*/
#[derive(Clone, Copy)]
pub struct Document<'p> {
    pub(crate) tape: &'p [u64],
    pub(crate) strings: &'p [u8],
}

impl<'p> Document<'p> {
    #[inline]
    pub(crate) fn new(parser: &'p Parser) -> Self {
        Document {
            tape: &parser.tape,
            strings: &parser.string_buf,
        }
    }

    /**
    The document's root value.
    */
    #[inline]
    pub fn root(&self) -> TapeValue<'p> {
        // tape[0] is the root word; the value starts right behind it
        TapeValue {
            doc: *self,
            index: 1,
        }
    }
}

impl<'p> fmt::Debug for Document<'p> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        struct Words<'brw, 'p>(&'brw Document<'p>);

        impl<'brw, 'p> fmt::Debug for Words<'brw, 'p> {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                let mut list = f.debug_list();

                for (i, &word) in self.0.tape.iter().enumerate() {
                    list.entry(&(i, tag_of(word), payload_of(word)));
                }

                list.finish()
            }
        }

        f.debug_struct("Document")
            .field("words", &Words(self))
            .finish()
    }
}

/**
A single value on the tape.

Values are thin non-owning views; the typed getters return
[`Error::IncorrectType`] rather than coercing.
*/
#[derive(Debug, Clone, Copy)]
pub struct TapeValue<'p> {
    doc: Document<'p>,
    index: usize,
}

impl<'p> TapeValue<'p> {
    #[inline(always)]
    fn word(&self) -> u64 {
        *get_unchecked!(self.doc.tape, self.index)
    }

    /**
    The raw word behind a number value.
    */
    #[inline(always)]
    fn raw(&self) -> u64 {
        *get_unchecked!(self.doc.tape, self.index + 1)
    }

    /**
    The value's type tag.
    */
    #[inline]
    pub fn tape_type(&self) -> TapeType {
        tag_of(self.word())
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.tape_type() == TapeType::Null
    }

    pub fn get_bool(&self) -> Result<bool> {
        match self.tape_type() {
            TapeType::True => Ok(true),
            TapeType::False => Ok(false),
            _ => Err(Error::IncorrectType),
        }
    }

    pub fn get_i64(&self) -> Result<i64> {
        match self.tape_type() {
            TapeType::Int64 => Ok(self.raw() as i64),
            // only numbers wider than `i64` are tagged unsigned
            TapeType::UInt64 => Err(Error::NumberOutOfRange),
            _ => Err(Error::IncorrectType),
        }
    }

    pub fn get_u64(&self) -> Result<u64> {
        match self.tape_type() {
            TapeType::Int64 => {
                let v = self.raw() as i64;
                if v < 0 {
                    return Err(Error::NumberOutOfRange);
                }
                Ok(v as u64)
            }
            TapeType::UInt64 => Ok(self.raw()),
            _ => Err(Error::IncorrectType),
        }
    }

    pub fn get_f64(&self) -> Result<f64> {
        match self.tape_type() {
            TapeType::Double => Ok(f64::from_bits(self.raw())),
            _ => Err(Error::IncorrectType),
        }
    }

    pub fn get_str(&self) -> Result<&'p str> {
        match self.tape_type() {
            TapeType::String => Ok(strings::get(
                self.doc.strings,
                payload_of(self.word()) as u32,
            )),
            _ => Err(Error::IncorrectType),
        }
    }

    pub fn get_object(&self) -> Result<TapeObject<'p>> {
        match self.tape_type() {
            TapeType::StartObject => Ok(TapeObject {
                doc: self.doc,
                open: self.index,
                close: (payload_of(self.word()) & u32::MAX as u64) as usize,
                count: (payload_of(self.word()) >> 32) as u32,
            }),
            _ => Err(Error::IncorrectType),
        }
    }

    pub fn get_array(&self) -> Result<TapeArray<'p>> {
        match self.tape_type() {
            TapeType::StartArray => Ok(TapeArray {
                doc: self.doc,
                open: self.index,
                close: (payload_of(self.word()) & u32::MAX as u64) as usize,
                count: (payload_of(self.word()) >> 32) as u32,
            }),
            _ => Err(Error::IncorrectType),
        }
    }

    /**
    The tape index just past this value, containers included.
    */
    #[inline]
    pub(crate) fn next_index(&self) -> usize {
        match self.tape_type() {
            TapeType::Int64 | TapeType::UInt64 | TapeType::Double => self.index + 2,
            TapeType::StartObject | TapeType::StartArray => {
                (payload_of(self.word()) & u32::MAX as u64) as usize + 1
            }
            _ => self.index + 1,
        }
    }
}

/**
An object on the tape.

Fields iterate in input order.
*/
#[derive(Debug, Clone, Copy)]
pub struct TapeObject<'p> {
    doc: Document<'p>,
    open: usize,
    close: usize,
    count: u32,
}

impl<'p> TapeObject<'p> {
    /**
    The number of fields, saturating at [`COUNT_SATURATED`].
    */
    #[inline]
    pub fn len(&self) -> usize {
        self.count as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.open + 1 == self.close
    }

    /**
    Iterate the object's fields in input order.
    */
    #[inline]
    pub fn iter(&self) -> TapeObjectIter<'p> {
        TapeObjectIter {
            doc: self.doc,
            at: self.open + 1,
            close: self.close,
        }
    }

    /**
    The value of the first field named `key`, scanning in input order.
    */
    pub fn find(&self, key: &str) -> Option<TapeValue<'p>> {
        self.iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value)
    }
}

pub struct TapeObjectIter<'p> {
    doc: Document<'p>,
    at: usize,
    close: usize,
}

impl<'p> Iterator for TapeObjectIter<'p> {
    type Item = (&'p str, TapeValue<'p>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.at >= self.close {
            return None;
        }

        let key = TapeValue {
            doc: self.doc,
            index: self.at,
        };

        // keys are always strings; the tape was built by the grammar
        let name = strings::get(self.doc.strings, payload_of(key.word()) as u32);

        let value = TapeValue {
            doc: self.doc,
            index: self.at + 1,
        };

        self.at = value.next_index();

        Some((name, value))
    }
}

/**
An array on the tape.

Elements iterate in input order.
*/
#[derive(Debug, Clone, Copy)]
pub struct TapeArray<'p> {
    doc: Document<'p>,
    open: usize,
    close: usize,
    count: u32,
}

impl<'p> TapeArray<'p> {
    /**
    The number of elements, saturating at [`COUNT_SATURATED`].
    */
    #[inline]
    pub fn len(&self) -> usize {
        self.count as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.open + 1 == self.close
    }

    /**
    Iterate the array's elements in input order.
    */
    #[inline]
    pub fn iter(&self) -> TapeArrayIter<'p> {
        TapeArrayIter {
            doc: self.doc,
            at: self.open + 1,
            close: self.close,
        }
    }
}

pub struct TapeArrayIter<'p> {
    doc: Document<'p>,
    at: usize,
    close: usize,
}

impl<'p> Iterator for TapeArrayIter<'p> {
    type Item = TapeValue<'p>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.at >= self.close {
            return None;
        }

        let value = TapeValue {
            doc: self.doc,
            index: self.at,
        };

        self.at = value.next_index();

        Some(value)
    }
}

#[cfg(any(test, feature = "serde_json"))]
impl<'p> Document<'p> {
    /**
    Convert the document into a [`serde_json::Value`].
    */
    pub fn to_value(&self) -> serde_json::Value {
        fn value_of(v: TapeValue) -> serde_json::Value {
            match v.tape_type() {
                TapeType::Null => serde_json::Value::Null,
                TapeType::True => serde_json::Value::Bool(true),
                TapeType::False => serde_json::Value::Bool(false),
                TapeType::Int64 => serde_json::Value::from(v.raw() as i64),
                TapeType::UInt64 => serde_json::Value::from(v.raw()),
                TapeType::Double => serde_json::Value::from(f64::from_bits(v.raw())),
                TapeType::String => match v.get_str() {
                    Ok(s) => serde_json::Value::from(s),
                    Err(_) => serde_json::Value::Null,
                },
                TapeType::StartObject => {
                    let mut map = serde_json::Map::new();

                    if let Ok(object) = v.get_object() {
                        for (name, value) in object.iter() {
                            map.insert(name.to_owned(), value_of(value));
                        }
                    }

                    serde_json::Value::Object(map)
                }
                TapeType::StartArray => {
                    let mut values = Vec::new();

                    if let Ok(array) = v.get_array() {
                        for value in array.iter() {
                            values.push(value_of(value));
                        }
                    }

                    serde_json::Value::Array(values)
                }
                TapeType::Root | TapeType::EndObject | TapeType::EndArray => {
                    serde_json::Value::Null
                }
            }
        }

        value_of(self.root())
    }
}
