//! Data elements and data element groups.
//!
//! A segment is a run of data elements separated by `+`, each of which is a
//! run of group items separated by `:`. Typed values implement
//! [`DataElement`], consuming a fixed number of items from a
//! [`GroupReader`] and producing them into a [`GroupWriter`]. Nested groups
//! flatten into the items of their enclosing data element.
//!
//! Structs of data elements implement the trait through the
//! [`DataElementGroup`](macro@DataElementGroup) derive macro.

use std::{borrow::Cow, ops::Deref};

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

use super::{
    lexer::{
        BINARY_IDENTIFIER, ESCAPE_CHARACTER, GROUP_DATA_ELEMENT_SEPARATOR, LexError, TokenKind,
        is_escapable,
    },
    segment::{SegmentReader, SegmentWriter, VersionedSegmentId},
};

/// Derive [`DataElement`] for a struct of group members.
///
/// Every field is a member, in declaration order.
///
/// ```
/// #[derive(Debug, Clone, PartialEq, DataElementGroup)]
/// pub struct BankId {
///     pub country_code: u16,
///     pub bank_code: String,
/// }
/// ```
pub use hbci_derive::DataElementGroup;

/// An error decoding a segment or one of its data elements.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The segment violates the wire grammar.
    #[error("Syntax error at position {position}: {error}")]
    Syntax { error: LexError, position: usize },
    /// The segment is not closed by an end marker.
    #[error("Segment is not terminated")]
    Unterminated,
    /// Content follows the segment end marker.
    #[error("Unexpected data after segment end")]
    TrailingData,
    /// A mandatory value is absent.
    #[error("Missing value at data element {element}, item {item}")]
    Missing { element: usize, item: usize },
    /// A value cannot be read as the expected type.
    #[error("Invalid {expected} {value:?} at data element {element}, item {item}")]
    Invalid {
        expected: &'static str,
        value: String,
        element: usize,
        item: usize,
    },
    #[error(transparent)]
    Cardinality(#[from] CardinalityError),
    /// No decoder is registered for the segment.
    #[error("Segment not in index: {0}")]
    NotIndexed(VersionedSegmentId),
    /// A versioned segment has no variant for the found version.
    #[error("Unknown segment version: {0}")]
    UnsupportedVersion(VersionedSegmentId),
    /// A typed decoder was handed a different segment.
    #[error("Expected segment {expected}, found {found}")]
    UnexpectedSegment {
        expected: VersionedSegmentId,
        found: VersionedSegmentId,
    },
    /// An error inside a segment, with the segment it was found in.
    #[error("In segment {id} (number {number}): {source}")]
    InSegment {
        id: VersionedSegmentId,
        number: u32,
        source: Box<DecodeError>,
    },
}

/// A repeated data element holding too few or too many items.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Array holds {found} items, expected between {min} and {max}")]
pub struct CardinalityError {
    pub min: usize,
    pub max: usize,
    pub found: usize,
}

/// A single non-empty group item, as found on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    kind: TokenKind,
    raw: Vec<u8>,
}

impl Item {
    pub fn new(kind: TokenKind, raw: &[u8]) -> Self {
        Self {
            kind,
            raw: raw.to_vec(),
        }
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// The item's bytes, escapes and binary framing included.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The item's content with escapes resolved and binary framing removed.
    pub fn content(&self) -> Cow<'_, [u8]> {
        match self.kind {
            TokenKind::BinaryData => {
                let payload = self
                    .raw
                    .iter()
                    .skip(1)
                    .position(|&b| b == BINARY_IDENTIFIER)
                    .and_then(|i| self.raw.get(i + 2..))
                    .unwrap_or_default();

                Cow::Borrowed(payload)
            }
            TokenKind::AlphaNumeric | TokenKind::Text => Cow::Owned(unescape(&self.raw)),
            _ => Cow::Borrowed(&self.raw),
        }
    }

    pub fn text(&self) -> String {
        decode_text(&self.content())
    }
}

/// A cursor over the items of one data element.
#[derive(Debug)]
pub struct GroupReader<'r> {
    items: &'r [Option<Item>],
    element: usize,
    position: usize,
}

impl<'r> GroupReader<'r> {
    /// Read the items of the data element at index `element` of a segment,
    /// where the segment header is element 0.
    pub fn new(items: &'r [Option<Item>], element: usize) -> Self {
        Self {
            items,
            element,
            position: 0,
        }
    }

    /// Take the next slot, returning its item if not empty.
    pub fn next_item(&mut self) -> Option<&'r Item> {
        let item = self.items.get(self.position)?.as_ref();
        self.position += 1;
        item
    }

    /// Take the next slot, failing if it is empty or absent.
    pub fn require(&mut self) -> Result<&'r Item, DecodeError> {
        let item = self.position;

        self.next_item().ok_or(DecodeError::Missing {
            element: self.element,
            item,
        })
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.items.len()
    }

    /// Whether the next `n` slots (or all remaining, if fewer) are empty.
    pub fn is_empty_run(&self, n: usize) -> bool {
        self.items
            .iter()
            .skip(self.position)
            .take(n)
            .all(Option::is_none)
    }

    pub fn skip(&mut self, n: usize) {
        self.position = (self.position + n).min(self.items.len());
    }

    /// An error for the item most recently taken.
    pub fn invalid(&self, expected: &'static str, item: &Item) -> DecodeError {
        DecodeError::Invalid {
            expected,
            value: String::from_utf8_lossy(item.raw()).into_owned(),
            element: self.element,
            item: self.position.saturating_sub(1),
        }
    }
}

/// Collects the encoded items of one data element.
#[derive(Debug, Default)]
pub struct GroupWriter {
    items: Vec<Vec<u8>>,
}

impl GroupWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item already in wire form.
    pub fn push(&mut self, item: Vec<u8>) {
        self.items.push(item);
    }

    /// Append escaped text.
    pub fn push_text(&mut self, text: &str) {
        self.items.push(escape(&encode_text(text)));
    }

    pub fn push_empty(&mut self, n: usize) {
        self.items.extend((0..n).map(|_| Vec::new()));
    }

    /// Join the items into a data element, trimming trailing empty items.
    pub fn finish(mut self) -> Vec<u8> {
        while self.items.last().is_some_and(Vec::is_empty) {
            self.items.pop();
        }

        self.items.join(&GROUP_DATA_ELEMENT_SEPARATOR)
    }
}

/// A typed value occupying a fixed run of group items.
pub trait DataElement: Sized {
    /// The number of group items this value occupies.
    const WIDTH: usize = 1;

    fn decode(r: &mut GroupReader<'_>) -> Result<Self, DecodeError>;

    fn encode(&self, w: &mut GroupWriter);
}

/// A value spanning all remaining data elements of a segment.
pub trait Repeated: Sized {
    fn decode_repeated(r: &mut SegmentReader<'_>) -> Result<Self, DecodeError>;

    fn encode_repeated(&self, w: &mut SegmentWriter);
}

impl DataElement for String {
    fn decode(r: &mut GroupReader<'_>) -> Result<Self, DecodeError> {
        Ok(r.require()?.text())
    }

    fn encode(&self, w: &mut GroupWriter) {
        w.push_text(self);
    }
}

macro_rules! numeric_element {
    ($($t:ty),+) => {
        $(
            impl DataElement for $t {
                fn decode(r: &mut GroupReader<'_>) -> Result<Self, DecodeError> {
                    let item = r.require()?;

                    core::str::from_utf8(item.raw())
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .ok_or_else(|| r.invalid(stringify!($t), item))
                }

                fn encode(&self, w: &mut GroupWriter) {
                    w.push(self.to_string().into_bytes());
                }
            }
        )+
    };
}

numeric_element!(u8, u16, u32, u64);

/// `J` for yes, `N` for no.
impl DataElement for bool {
    fn decode(r: &mut GroupReader<'_>) -> Result<Self, DecodeError> {
        let item = r.require()?;

        match item.raw() {
            b"J" => Ok(true),
            b"N" => Ok(false),
            _ => Err(r.invalid("yes/no flag", item)),
        }
    }

    fn encode(&self, w: &mut GroupWriter) {
        w.push(if *self { b"J".to_vec() } else { b"N".to_vec() });
    }
}

/// A number written with exactly `N` digits, zero padded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digits<const N: usize>(pub u64);

impl<const N: usize> DataElement for Digits<N> {
    fn decode(r: &mut GroupReader<'_>) -> Result<Self, DecodeError> {
        let item = r.require()?;

        core::str::from_utf8(item.raw())
            .ok()
            .filter(|v| v.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|v| v.parse().ok())
            .map(Self)
            .ok_or_else(|| r.invalid("digits", item))
    }

    fn encode(&self, w: &mut GroupWriter) {
        w.push(format!("{:0width$}", self.0, width = N).into_bytes());
    }
}

/// A decimal number written with a decimal comma.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Float(pub f64);

impl DataElement for Float {
    fn decode(r: &mut GroupReader<'_>) -> Result<Self, DecodeError> {
        let item = r.require()?;

        let mut value = String::from_utf8_lossy(item.raw()).replace(',', ".");
        if value.ends_with('.') {
            value.push('0');
        }

        value
            .parse()
            .map(Self)
            .map_err(|_| r.invalid("float", item))
    }

    fn encode(&self, w: &mut GroupWriter) {
        let mut value = self.0.to_string().replace('.', ",");
        if !value.contains(',') {
            value.push(',');
        }

        w.push(value.into_bytes());
    }
}

/// Opaque bytes, framed as `@len@bytes` on the wire.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Binary(pub Vec<u8>);

impl core::fmt::Debug for Binary {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Binary({} bytes)", self.0.len())
    }
}

impl DataElement for Binary {
    fn decode(r: &mut GroupReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self(r.require()?.content().into_owned()))
    }

    fn encode(&self, w: &mut GroupWriter) {
        let mut item = format!("@{}@", self.0.len()).into_bytes();
        item.extend_from_slice(&self.0);
        w.push(item);
    }
}

/// `YYYYMMDD`.
impl DataElement for NaiveDate {
    fn decode(r: &mut GroupReader<'_>) -> Result<Self, DecodeError> {
        let item = r.require()?;

        NaiveDate::parse_from_str(&item.text(), "%Y%m%d").map_err(|_| r.invalid("date", item))
    }

    fn encode(&self, w: &mut GroupWriter) {
        w.push(self.format("%Y%m%d").to_string().into_bytes());
    }
}

/// `HHMMSS`.
impl DataElement for NaiveTime {
    fn decode(r: &mut GroupReader<'_>) -> Result<Self, DecodeError> {
        let item = r.require()?;

        NaiveTime::parse_from_str(&item.text(), "%H%M%S").map_err(|_| r.invalid("time", item))
    }

    fn encode(&self, w: &mut GroupWriter) {
        w.push(self.format("%H%M%S").to_string().into_bytes());
    }
}

/// Absent when all of its items are empty.
impl<T: DataElement> DataElement for Option<T> {
    const WIDTH: usize = T::WIDTH;

    fn decode(r: &mut GroupReader<'_>) -> Result<Self, DecodeError> {
        let width = T::WIDTH.max(1);

        if r.is_exhausted() || r.is_empty_run(width) {
            r.skip(width);
            Ok(None)
        } else {
            T::decode(r).map(Some)
        }
    }

    fn encode(&self, w: &mut GroupWriter) {
        match self {
            Some(value) => value.encode(w),
            None => w.push_empty(T::WIDTH.max(1)),
        }
    }
}

/// A homogeneous list holding between `MIN` and `MAX` items.
///
/// As a group member, an array spans the remaining items of its data element.
/// Marked `#[element(repeated)]` in a segment, it spans the remaining data
/// elements instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Array<T, const MIN: usize, const MAX: usize>(Vec<T>);

impl<T, const MIN: usize, const MAX: usize> Array<T, MIN, MAX> {
    pub fn new(items: Vec<T>) -> Result<Self, CardinalityError> {
        if (MIN..=MAX).contains(&items.len()) {
            Ok(Self(items))
        } else {
            Err(CardinalityError {
                min: MIN,
                max: MAX,
                found: items.len(),
            })
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        self.0
    }
}

impl<T, const MIN: usize, const MAX: usize> Deref for Array<T, MIN, MAX> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T, const MIN: usize, const MAX: usize> TryFrom<Vec<T>> for Array<T, MIN, MAX> {
    type Error = CardinalityError;

    fn try_from(items: Vec<T>) -> Result<Self, Self::Error> {
        Self::new(items)
    }
}

impl<T: DataElement, const MIN: usize, const MAX: usize> DataElement for Array<T, MIN, MAX> {
    const WIDTH: usize = T::WIDTH * MIN;

    fn decode(r: &mut GroupReader<'_>) -> Result<Self, DecodeError> {
        let mut items = Vec::new();

        // Read everything; the count is checked, never truncated.
        while !r.is_exhausted() {
            items.push(T::decode(r)?);
        }

        Ok(Self::new(items)?)
    }

    fn encode(&self, w: &mut GroupWriter) {
        for item in &self.0 {
            item.encode(w);
        }
    }
}

impl<T: DataElement, const MIN: usize, const MAX: usize> Repeated for Array<T, MIN, MAX> {
    fn decode_repeated(r: &mut SegmentReader<'_>) -> Result<Self, DecodeError> {
        let mut items = Vec::new();

        while r.has_remaining() {
            items.push(r.element::<T>()?);
        }

        Ok(Self::new(items)?)
    }

    fn encode_repeated(&self, w: &mut SegmentWriter) {
        for item in &self.0 {
            w.element(item);
        }
    }
}

/// Prefix every syntax symbol with the escape character.
pub fn escape(content: &[u8]) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(content.len());

    for &b in content {
        if is_escapable(b) {
            escaped.push(ESCAPE_CHARACTER);
        }

        escaped.push(b);
    }

    escaped
}

/// Resolve escape characters, keeping the byte each one precedes.
pub fn unescape(raw: &[u8]) -> Vec<u8> {
    let mut content = Vec::with_capacity(raw.len());
    let mut bytes = raw.iter().copied();

    while let Some(b) = bytes.next() {
        if b == ESCAPE_CHARACTER {
            content.extend(bytes.next());
        } else {
            content.push(b);
        }
    }

    content
}

/// Read text sent as UTF-8, falling back to the protocol's ISO-8859-1.
pub fn decode_text(content: &[u8]) -> String {
    match core::str::from_utf8(content) {
        Ok(text) => text.to_owned(),
        Err(_) => content.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Write text as ISO-8859-1, replacing characters it cannot represent.
pub fn encode_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'_'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escaping_is_reversible() {
        let content = b"a+b:c'd?e@f";
        let escaped = escape(content);

        assert_eq!(escaped, b"a?+b?:c?'d??e?@f");
        assert_eq!(unescape(&escaped), content);
    }

    #[test]
    fn text_falls_back_to_latin1() {
        assert_eq!(decode_text(&encode_text("enthält")), "enthält");
        assert_eq!(decode_text("enthält".as_bytes()), "enthält");
    }

    #[test]
    fn float_with_empty_fraction() {
        let items = [Some(Item::new(TokenKind::Float, b"100,"))];
        let value = Float::decode(&mut GroupReader::new(&items, 1)).unwrap();

        assert_eq!(value, Float(100.0));
    }

    #[test]
    fn finish_trims_trailing_empty_items() {
        let mut w = GroupWriter::new();
        w.push(b"1".to_vec());
        w.push_empty(1);
        w.push(b"2".to_vec());
        w.push_empty(3);

        assert_eq!(w.finish(), b"1::2");
    }
}
