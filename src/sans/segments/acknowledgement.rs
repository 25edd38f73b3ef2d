//! Acknowledgements: the status codes a bank returns for a message and for
//! each of its segments.
//!
//! Codes are classified by their first digit: `0xxx` reports success,
//! `3xxx` a warning, and `9xxx` an error.

use std::fmt;

use crate::sans::{
    element::{Array, DataElementGroup, Digits},
    segment::{Segment, SegmentHeader},
};

/// Code under which a bank lists the security functions it supports.
pub const SUPPORTED_SECURITY_FUNCTIONS: u16 = 3920;

/// One acknowledgement as found on the wire.
#[derive(Debug, Clone, PartialEq, DataElementGroup)]
pub struct AcknowledgementElement {
    pub code: Digits<4>,
    /// The data element the acknowledgement refers to.
    pub reference: Option<String>,
    pub text: String,
    pub params: Array<String, 0, 10>,
}

/// `HIRMG`, acknowledgements of a whole message.
#[derive(Debug, Clone, PartialEq, Segment)]
#[segment("HIRMG", 2)]
pub struct MessageAcknowledgement {
    #[header]
    pub header: SegmentHeader,
    #[element(repeated)]
    pub acknowledgements: Array<AcknowledgementElement, 1, 99>,
}

/// `HIRMS`, acknowledgements of the segment named by the header's reference.
#[derive(Debug, Clone, PartialEq, Segment)]
#[segment("HIRMS", 2)]
pub struct SegmentAcknowledgement {
    #[header]
    pub header: SegmentHeader,
    #[element(repeated)]
    pub acknowledgements: Array<AcknowledgementElement, 1, 99>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcknowledgementKind {
    Message,
    Segment,
}

impl fmt::Display for AcknowledgementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message => f.write_str("MessageAcknowledgement"),
            Self::Segment => f.write_str("SegmentAcknowledgement"),
        }
    }
}

/// A classified acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    pub kind: AcknowledgementKind,
    pub code: u16,
    pub reference: String,
    pub text: String,
    pub params: Vec<String>,
    /// Number of the request segment a segment acknowledgement refers to.
    pub segment_reference: Option<u32>,
}

impl Acknowledgement {
    fn new(
        kind: AcknowledgementKind,
        element: &AcknowledgementElement,
        segment_reference: Option<u32>,
    ) -> Self {
        Self {
            kind,
            // Four digits always fit.
            code: u16::try_from(element.code.0).unwrap_or(u16::MAX),
            reference: element.reference.clone().unwrap_or_default(),
            text: element.text.clone(),
            params: element.params.to_vec(),
            segment_reference,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code < 3000
    }

    pub fn is_warning(&self) -> bool {
        (3000..4000).contains(&self.code)
    }

    pub fn is_error(&self) -> bool {
        self.code >= 9000
    }
}

impl fmt::Display for Acknowledgement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: Code: {:04}, Position: {}, Text: {}, Parameter: {}",
            self.kind,
            self.code,
            self.reference,
            self.text,
            self.params.join(", ")
        )
    }
}

impl MessageAcknowledgement {
    pub fn classified(&self) -> impl Iterator<Item = Acknowledgement> + '_ {
        self.acknowledgements
            .iter()
            .map(|a| Acknowledgement::new(AcknowledgementKind::Message, a, None))
    }
}

impl SegmentAcknowledgement {
    pub fn classified(&self) -> impl Iterator<Item = Acknowledgement> + '_ {
        let reference = self.header.reference;

        self.acknowledgements
            .iter()
            .map(move |a| Acknowledgement::new(AcknowledgementKind::Segment, a, reference))
    }
}

/// Error-class acknowledgements returned for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcknowledgementError {
    pub errors: Vec<Acknowledgement>,
}

impl AcknowledgementError {
    /// Collect the errors among `acknowledgements`, if there are any.
    pub fn from_acknowledgements<'a>(
        acknowledgements: impl IntoIterator<Item = &'a Acknowledgement>,
    ) -> Option<Self> {
        let errors = acknowledgements
            .into_iter()
            .filter(|a| a.is_error())
            .cloned()
            .collect::<Vec<_>>();

        (!errors.is_empty()).then_some(Self { errors })
    }
}

impl fmt::Display for AcknowledgementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Institute returned errors:")?;

        for error in &self.errors {
            write!(f, "\n{error}")?;
        }

        Ok(())
    }
}

impl std::error::Error for AcknowledgementError {}
