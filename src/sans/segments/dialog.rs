//! Segments opening, synchronising and closing a dialog.

use crate::sans::{
    segment::{Segment, SegmentHeader, versioned_segment},
    segments::parameters::BankId,
};

/// Language of a dialog, as negotiated with the bank.
pub const DEFAULT_LANGUAGE: u8 = 0;

/// `HKIDN`, identifying the customer.
#[derive(Debug, Clone, PartialEq, Segment)]
#[segment("HKIDN", 2)]
pub struct Identification {
    #[header]
    pub header: SegmentHeader,
    #[element]
    pub bank: BankId,
    #[element]
    pub customer_id: String,
    #[element]
    pub client_system_id: String,
    /// `1` if the client system id is required, `0` for anonymous access.
    #[element]
    pub client_system_status: u8,
}

impl Identification {
    pub fn new(
        bank: BankId,
        customer_id: impl Into<String>,
        client_system_id: impl Into<String>,
        client_system_required: bool,
    ) -> Self {
        Self {
            header: SegmentHeader::of::<Self>(),
            bank,
            customer_id: customer_id.into(),
            client_system_id: client_system_id.into(),
            client_system_status: u8::from(client_system_required),
        }
    }
}

/// `HKVVB`, announcing the parameter data the client holds.
#[derive(Debug, Clone, PartialEq, Segment)]
#[segment("HKVVB", 3)]
pub struct ProcessingPreparation {
    #[header]
    pub header: SegmentHeader,
    #[element]
    pub bpd_version: u32,
    #[element]
    pub upd_version: u32,
    #[element]
    pub language: u8,
    #[element]
    pub product_name: String,
    #[element]
    pub product_version: String,
}

impl ProcessingPreparation {
    pub fn new(
        bpd_version: u32,
        upd_version: u32,
        language: u8,
        product_name: impl Into<String>,
        product_version: impl Into<String>,
    ) -> Self {
        Self {
            header: SegmentHeader::of::<Self>(),
            bpd_version,
            upd_version,
            language,
            product_name: product_name.into(),
            product_version: product_version.into(),
        }
    }
}

/// `HKSYN`, requesting synchronisation.
#[derive(Debug, Clone, PartialEq, Segment)]
#[segment("HKSYN", 3)]
pub struct Synchronisation {
    #[header]
    pub header: SegmentHeader,
    /// `0` to request a new client system id.
    #[element]
    pub mode: u8,
}

impl Synchronisation {
    pub fn new_client_system_id() -> Self {
        Self {
            header: SegmentHeader::of::<Self>(),
            mode: 0,
        }
    }
}

/// `HKEND`, closing a dialog.
#[derive(Debug, Clone, PartialEq, Segment)]
#[segment("HKEND", 1)]
pub struct DialogEnd {
    #[header]
    pub header: SegmentHeader,
    #[element]
    pub dialog_id: String,
}

impl DialogEnd {
    pub fn new(dialog_id: impl Into<String>) -> Self {
        Self {
            header: SegmentHeader::of::<Self>(),
            dialog_id: dialog_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Segment)]
#[segment("HISYN", 3)]
pub struct SynchronisationResponseV3 {
    #[header]
    pub header: SegmentHeader,
    #[element]
    pub client_system_id: Option<String>,
    #[element]
    pub message_number: Option<u32>,
    #[element]
    pub security_reference: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Segment)]
#[segment("HISYN", 4)]
pub struct SynchronisationResponseV4 {
    #[header]
    pub header: SegmentHeader,
    #[element]
    pub client_system_id: Option<String>,
    #[element]
    pub message_number: Option<u32>,
    #[element]
    pub security_reference: Option<u32>,
    #[element]
    pub signature_id: Option<u32>,
}

versioned_segment! {
    /// `HISYN`, the answer to a synchronisation request.
    pub enum SynchronisationResponse("HISYN") {
        3 => V3(SynchronisationResponseV3),
        4 => V4(SynchronisationResponseV4),
    }
}

impl SynchronisationResponse {
    pub fn client_system_id(&self) -> Option<&str> {
        match self {
            Self::V3(s) => s.client_system_id.as_deref(),
            Self::V4(s) => s.client_system_id.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sans::segment::DecodeSegment;

    #[test]
    fn identification_layout() {
        let mut identification =
            Identification::new(BankId::new(280, "12345678"), "user", "0", true);
        identification.header.number = 3;

        assert_eq!(identification.encode(), b"HKIDN:3:2+280:12345678+user+0+1'");
    }

    #[test]
    fn synchronisation_response_without_id() {
        let response = SynchronisationResponse::decode_segment(b"HISYN:5:4:3++42'").unwrap();

        assert_eq!(response.client_system_id(), None);
        assert!(matches!(
            response,
            SynchronisationResponse::V4(SynchronisationResponseV4 {
                message_number: Some(42),
                ..
            })
        ));
    }
}
