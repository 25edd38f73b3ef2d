//! Segments: headers, raw parsing, and the traits typed segments implement.
//!
//! A typed segment is a struct deriving [`Segment`](macro@Segment). Segments
//! existing in several versions are wrapped in an enum declared with
//! [`versioned_segment!`], which dispatches on the header's version.

use std::{any::Any, fmt};

use super::{
    element::{DataElement, DecodeError, GroupReader, GroupWriter, Item},
    lexer::{DATA_ELEMENT_SEPARATOR, Lexer, SEGMENT_END_MARKER, TokenKind},
};

/// Derive the segment traits for a struct of data elements.
///
/// The struct carries a `#[segment("ID", version)]` attribute. One field,
/// marked `#[header]`, holds the [`SegmentHeader`]. Fields marked
/// `#[element]` are data elements in declaration order; a final field marked
/// `#[element(repeated)]` spans all remaining data elements. Other fields are
/// left at their default when decoding.
///
/// ```
/// #[derive(Debug, Clone, PartialEq, Segment)]
/// #[segment("HNHBS", 1)]
/// pub struct MessageEnd {
///     #[header]
///     pub header: SegmentHeader,
///     #[element]
///     pub message_number: u32,
/// }
/// ```
pub use hbci_derive::Segment;

/// The key distinguishing segments sharing an identifier across protocol
/// revisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionedSegmentId {
    pub id: String,
    pub version: u16,
}

impl VersionedSegmentId {
    pub fn new(id: impl Into<String>, version: u16) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }
}

impl fmt::Display for VersionedSegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.id, self.version)
    }
}

/// The first data element of every segment: `ID:number:version[:reference]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentHeader {
    pub id: String,
    /// Position in the enclosing message, assigned when it is marshaled.
    pub number: u32,
    pub version: u16,
    /// Number of the segment this one answers.
    pub reference: Option<u32>,
}

impl SegmentHeader {
    pub fn new(id: impl Into<String>, version: u16) -> Self {
        Self {
            id: id.into(),
            number: 0,
            version,
            reference: None,
        }
    }

    /// A fresh header for a typed segment.
    pub fn of<T: SegmentType>() -> Self {
        Self::new(T::ID, T::VERSION)
    }

    pub fn versioned_id(&self) -> VersionedSegmentId {
        VersionedSegmentId::new(self.id.clone(), self.version)
    }

    /// Decode only the header of a raw segment.
    pub fn peek(raw: &[u8]) -> Result<Self, DecodeError> {
        Ok(RawSegment::parse(raw)?.header)
    }
}

impl DataElement for SegmentHeader {
    const WIDTH: usize = 4;

    fn decode(r: &mut GroupReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            id: String::decode(r)?,
            number: u32::decode(r)?,
            version: u16::decode(r)?,
            reference: Option::<u32>::decode(r)?,
        })
    }

    fn encode(&self, w: &mut GroupWriter) {
        self.id.encode(w);
        self.number.encode(w);
        self.version.encode(w);
        self.reference.encode(w);
    }
}

/// A segment split into its header and the items of its data elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSegment {
    header: SegmentHeader,
    elements: Vec<Vec<Option<Item>>>,
}

impl RawSegment {
    /// Parse the bytes of exactly one segment, end marker included.
    pub fn parse(raw: &[u8]) -> Result<Self, DecodeError> {
        // The first slot of the first element is already open.
        let mut elements: Vec<Vec<Option<Item>>> = vec![vec![None]];
        let mut terminated = false;

        for token in Lexer::new(raw) {
            if terminated {
                match token.kind() {
                    TokenKind::Eof => break,
                    _ => Err(DecodeError::TrailingData)?,
                }
            }

            match token.kind() {
                TokenKind::Error(error) => Err(DecodeError::Syntax {
                    error,
                    position: token.position(),
                })?,
                TokenKind::Eof => break,
                TokenKind::SegmentEndMarker => terminated = true,
                TokenKind::DataElementSeparator => elements.push(vec![None]),
                TokenKind::GroupDataElementSeparator => {
                    if let Some(element) = elements.last_mut() {
                        element.push(None);
                    }
                }
                kind => {
                    if let Some(slot) = elements.last_mut().and_then(|e| e.last_mut()) {
                        *slot = Some(Item::new(kind, token.value()));
                    }
                }
            }
        }

        if !terminated {
            Err(DecodeError::Unterminated)?;
        }

        let mut elements = elements.into_iter();
        let header_items = elements.next().unwrap_or_default();
        let header = SegmentHeader::decode(&mut GroupReader::new(&header_items, 0))?;

        Ok(Self {
            header,
            elements: elements.collect(),
        })
    }

    pub fn header(&self) -> &SegmentHeader {
        &self.header
    }

    /// A reader over the data elements following the header.
    pub fn reader(&self) -> SegmentReader<'_> {
        SegmentReader {
            elements: &self.elements,
            position: 0,
        }
    }
}

/// A cursor over the data elements of a segment.
#[derive(Debug)]
pub struct SegmentReader<'r> {
    elements: &'r [Vec<Option<Item>>],
    position: usize,
}

impl SegmentReader<'_> {
    pub fn has_remaining(&self) -> bool {
        self.position < self.elements.len()
    }

    /// Decode the next data element. An absent element reads as empty.
    pub fn element<T: DataElement>(&mut self) -> Result<T, DecodeError> {
        let items = self
            .elements
            .get(self.position)
            .map(Vec::as_slice)
            .unwrap_or_default();

        // Element 0 is the header.
        let mut r = GroupReader::new(items, self.position + 1);
        self.position += 1;

        T::decode(&mut r)
    }
}

/// Collects the encoded data elements of a segment.
#[derive(Debug, Default)]
pub struct SegmentWriter {
    elements: Vec<Vec<u8>>,
}

impl SegmentWriter {
    pub fn element<T: DataElement>(&mut self, value: &T) {
        let mut w = GroupWriter::new();
        value.encode(&mut w);
        self.elements.push(w.finish());
    }

    /// Join the data elements, trimming trailing empty ones, and terminate
    /// the segment.
    pub fn finish(mut self) -> Vec<u8> {
        while self.elements.last().is_some_and(Vec::is_empty) {
            self.elements.pop();
        }

        let mut segment = self.elements.join(&DATA_ELEMENT_SEPARATOR);
        segment.push(SEGMENT_END_MARKER);
        segment
    }
}

/// A typed segment.
pub trait Segment: Any + fmt::Debug + Send {
    fn header(&self) -> &SegmentHeader;

    fn header_mut(&mut self) -> &mut SegmentHeader;

    /// Write the data elements following the header.
    fn encode_elements(&self, w: &mut SegmentWriter);

    fn as_any(&self) -> &dyn Any;

    /// Serialize the segment, header included.
    fn encode(&self) -> Vec<u8> {
        let mut w = SegmentWriter::default();
        w.element(self.header());
        self.encode_elements(&mut w);
        w.finish()
    }
}

impl dyn Segment {
    pub fn downcast_ref<T: Segment>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    pub fn is<T: Segment>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// A segment of a single identifier and version.
pub trait SegmentType: Segment + Sized {
    const ID: &'static str;
    const VERSION: u16;

    /// Decode the data elements following an already decoded header.
    fn decode_elements(
        header: SegmentHeader,
        r: &mut SegmentReader<'_>,
    ) -> Result<Self, DecodeError>;
}

/// A segment decodable from raw bytes, under the identifiers and versions it
/// lists.
pub trait DecodeSegment: Segment + Sized {
    const INDEX: &'static [(&'static str, u16)];

    fn decode_segment(raw: &[u8]) -> Result<Self, DecodeError>;
}

/// Decode a segment of a single identifier and version.
pub fn decode_typed<T: SegmentType>(raw: &[u8]) -> Result<T, DecodeError> {
    let segment = RawSegment::parse(raw)?;
    let header = segment.header().clone();

    let expected = VersionedSegmentId::new(T::ID, T::VERSION);
    let found = header.versioned_id();

    if found != expected {
        return Err(DecodeError::UnexpectedSegment { expected, found });
    }

    let number = header.number;

    T::decode_elements(header, &mut segment.reader()).map_err(|err| DecodeError::InSegment {
        id: found,
        number,
        source: Box::new(err),
    })
}

/// Declare an enum over the versions of a segment, dispatching on the
/// header's version when decoding.
macro_rules! versioned_segment {
    (
        $(#[$attr:meta])*
        $vis:vis enum $name:ident($id:literal) {
            $($version:literal => $variant:ident($inner:ty)),+ $(,)?
        }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq)]
        $vis enum $name {
            $($variant($inner)),+
        }

        impl $crate::sans::segment::Segment for $name {
            fn header(&self) -> &$crate::sans::segment::SegmentHeader {
                match self {
                    $(Self::$variant(s) => $crate::sans::segment::Segment::header(s)),+
                }
            }

            fn header_mut(&mut self) -> &mut $crate::sans::segment::SegmentHeader {
                match self {
                    $(Self::$variant(s) => $crate::sans::segment::Segment::header_mut(s)),+
                }
            }

            fn encode_elements(&self, w: &mut $crate::sans::segment::SegmentWriter) {
                match self {
                    $(Self::$variant(s) => $crate::sans::segment::Segment::encode_elements(s, w)),+
                }
            }

            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }
        }

        impl $crate::sans::segment::DecodeSegment for $name {
            const INDEX: &'static [(&'static str, u16)] = &[$(($id, $version)),+];

            fn decode_segment(
                raw: &[u8],
            ) -> ::core::result::Result<Self, $crate::sans::element::DecodeError> {
                let header = $crate::sans::segment::SegmentHeader::peek(raw)?;

                match header.version {
                    $(
                        $version => Ok(Self::$variant(
                            <$inner as $crate::sans::segment::DecodeSegment>::decode_segment(raw)?,
                        )),
                    )+
                    _ => Err($crate::sans::element::DecodeError::UnsupportedVersion(
                        header.versioned_id(),
                    )),
                }
            }
        }
    };
}

pub(crate) use versioned_segment;
