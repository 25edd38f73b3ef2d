use crate::sans::{
    element::{DataElementGroup, Digits},
    segment::{Segment, SegmentHeader},
};

/// The protocol version written into every message header.
pub const HBCI_VERSION: u16 = 300;

/// Dialog id of a message opening a new dialog.
pub const INITIAL_DIALOG_ID: &str = "0";

/// A message this one refers to.
#[derive(Debug, Clone, PartialEq, Eq, DataElementGroup)]
pub struct ReferenceMessage {
    pub dialog_id: String,
    pub message_number: u32,
}

/// `HNHBK`, the first segment of every message.
#[derive(Debug, Clone, PartialEq, Segment)]
#[segment("HNHBK", 3)]
pub struct MessageHeader {
    #[header]
    pub header: SegmentHeader,
    /// Size of the whole message in bytes, this segment included.
    #[element]
    pub size: Digits<12>,
    #[element]
    pub hbci_version: u16,
    #[element]
    pub dialog_id: String,
    #[element]
    pub message_number: u32,
    #[element]
    pub reference: Option<ReferenceMessage>,
}

impl MessageHeader {
    pub fn new(dialog_id: impl Into<String>, message_number: u32) -> Self {
        Self {
            header: SegmentHeader::of::<Self>(),
            size: Digits(0),
            hbci_version: HBCI_VERSION,
            dialog_id: dialog_id.into(),
            message_number,
            reference: None,
        }
    }
}

/// `HNHBS`, the last segment of every message.
#[derive(Debug, Clone, PartialEq, Segment)]
#[segment("HNHBS", 1)]
pub struct MessageEnd {
    #[header]
    pub header: SegmentHeader,
    #[element]
    pub message_number: u32,
}

impl MessageEnd {
    pub fn new(message_number: u32) -> Self {
        Self {
            header: SegmentHeader::of::<Self>(),
            message_number,
        }
    }
}
