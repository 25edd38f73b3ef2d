use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::sans::{
    element::{Binary, DataElementGroup},
    segment::{Segment, SegmentHeader},
    segments::parameters::BankId,
};

/// Security function of a single-step PIN/TAN dialog.
pub const SECURITY_FUNCTION_PIN_TAN: &str = "999";

/// Security function written into encryption headers of PIN/TAN messages.
pub const SECURITY_FUNCTION_ENCRYPTION: &str = "998";

/// Segment number of the encryption header.
pub const ENCRYPTION_HEADER_NUMBER: u32 = 998;

/// Segment number of the encrypted data.
pub const ENCRYPTED_DATA_NUMBER: u32 = 999;

/// Client system id of a client not yet synchronised.
pub const INITIAL_CLIENT_SYSTEM_ID: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq, DataElementGroup)]
pub struct SecurityProfile {
    pub method: String,
    pub version: u8,
}

impl SecurityProfile {
    pub fn pin_tan() -> Self {
        Self {
            method: "PIN".into(),
            version: 1,
        }
    }
}

/// Identifies the party performing a security function.
#[derive(Debug, Clone, PartialEq, Eq, DataElementGroup)]
pub struct SecurityIdentification {
    /// `1` for the message sender.
    pub party: u8,
    pub cid: Option<String>,
    pub client_system_id: String,
}

impl SecurityIdentification {
    pub fn sender(client_system_id: impl Into<String>) -> Self {
        Self {
            party: 1,
            cid: None,
            client_system_id: client_system_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, DataElementGroup)]
pub struct SecurityDate {
    /// `1` for a security timestamp.
    pub kind: u8,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
}

impl SecurityDate {
    pub fn timestamp(at: NaiveDateTime) -> Self {
        Self {
            kind: 1,
            date: at.date(),
            time: Some(at.time()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, DataElementGroup)]
pub struct HashAlgorithm {
    pub usage: u8,
    pub algorithm: u16,
    pub parameter_designation: u8,
}

impl Default for HashAlgorithm {
    /// `1:999:1`, a hash not applicable to PIN/TAN.
    fn default() -> Self {
        Self {
            usage: 1,
            algorithm: 999,
            parameter_designation: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, DataElementGroup)]
pub struct SignatureAlgorithm {
    pub usage: u8,
    pub algorithm: u8,
    pub mode: u8,
}

impl Default for SignatureAlgorithm {
    /// `6:10:16`.
    fn default() -> Self {
        Self {
            usage: 6,
            algorithm: 10,
            mode: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, DataElementGroup)]
pub struct KeyName {
    pub bank: BankId,
    pub user_id: String,
    /// `S` for a signing key, `V` for an encryption key.
    pub kind: String,
    pub number: u32,
    pub version: u32,
}

impl KeyName {
    pub fn signing(bank: BankId, user_id: impl Into<String>) -> Self {
        Self::new(bank, user_id, "S")
    }

    pub fn encryption(bank: BankId, user_id: impl Into<String>) -> Self {
        Self::new(bank, user_id, "V")
    }

    fn new(bank: BankId, user_id: impl Into<String>, kind: &str) -> Self {
        Self {
            bank,
            user_id: user_id.into(),
            kind: kind.into(),
            number: 0,
            version: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, DataElementGroup)]
pub struct EncryptionAlgorithm {
    pub usage: u8,
    pub mode: u8,
    pub algorithm: u8,
    pub key: Binary,
    pub key_designation: u8,
    pub iv_designation: u8,
}

impl Default for EncryptionAlgorithm {
    /// `2:2:13:@8@00000000:5:1`, with the dummy key PIN/TAN uses.
    fn default() -> Self {
        Self {
            usage: 2,
            mode: 2,
            algorithm: 13,
            key: Binary(b"00000000".to_vec()),
            key_designation: 5,
            iv_designation: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, DataElementGroup)]
pub struct UserDefinedSignature {
    pub pin: String,
    pub tan: Option<String>,
}

/// `HNSHK`, opening the signed part of a message.
#[derive(Debug, Clone, PartialEq, Segment)]
#[segment("HNSHK", 4)]
pub struct SignatureHeader {
    #[header]
    pub header: SegmentHeader,
    #[element]
    pub profile: SecurityProfile,
    #[element]
    pub security_function: String,
    /// Pairs this header with its [`SignatureEnd`].
    #[element]
    pub control_reference: String,
    /// `1` for signing the segments between header and end.
    #[element]
    pub area: u8,
    /// `1` for the issuer.
    #[element]
    pub role: u8,
    #[element]
    pub identification: SecurityIdentification,
    #[element]
    pub reference_number: u32,
    #[element]
    pub date: SecurityDate,
    #[element]
    pub hash_algorithm: HashAlgorithm,
    #[element]
    pub signature_algorithm: SignatureAlgorithm,
    #[element]
    pub key_name: KeyName,
}

impl SignatureHeader {
    pub fn pin_tan(
        security_function: impl Into<String>,
        control_reference: impl Into<String>,
        client_system_id: impl Into<String>,
        key_name: KeyName,
        at: NaiveDateTime,
    ) -> Self {
        Self {
            header: SegmentHeader::of::<Self>(),
            profile: SecurityProfile::pin_tan(),
            security_function: security_function.into(),
            control_reference: control_reference.into(),
            area: 1,
            role: 1,
            identification: SecurityIdentification::sender(client_system_id),
            reference_number: 1,
            date: SecurityDate::timestamp(at),
            hash_algorithm: HashAlgorithm::default(),
            signature_algorithm: SignatureAlgorithm::default(),
            key_name,
        }
    }
}

/// `HNSHA`, closing the signed part of a message.
#[derive(Debug, Clone, PartialEq, Segment)]
#[segment("HNSHA", 2)]
pub struct SignatureEnd {
    #[header]
    pub header: SegmentHeader,
    #[element]
    pub control_reference: String,
    #[element]
    pub validation_result: Option<String>,
    #[element]
    pub signature: Option<UserDefinedSignature>,
}

impl SignatureEnd {
    pub fn new(control_reference: impl Into<String>, signature: UserDefinedSignature) -> Self {
        Self {
            header: SegmentHeader::of::<Self>(),
            control_reference: control_reference.into(),
            validation_result: None,
            signature: Some(signature),
        }
    }
}

/// `HNVSK`, describing how the encrypted data was encrypted.
#[derive(Debug, Clone, PartialEq, Segment)]
#[segment("HNVSK", 3)]
pub struct EncryptionHeader {
    #[header]
    pub header: SegmentHeader,
    #[element]
    pub profile: SecurityProfile,
    #[element]
    pub security_function: String,
    /// `1` for the issuer.
    #[element]
    pub role: u8,
    #[element]
    pub identification: SecurityIdentification,
    #[element]
    pub date: SecurityDate,
    #[element]
    pub algorithm: EncryptionAlgorithm,
    #[element]
    pub key_name: KeyName,
    /// `0` for no compression.
    #[element]
    pub compression: u8,
}

impl EncryptionHeader {
    pub fn pin_tan(
        client_system_id: impl Into<String>,
        key_name: KeyName,
        at: NaiveDateTime,
    ) -> Self {
        let mut header = SegmentHeader::of::<Self>();
        header.number = ENCRYPTION_HEADER_NUMBER;

        Self {
            header,
            profile: SecurityProfile::pin_tan(),
            security_function: SECURITY_FUNCTION_ENCRYPTION.into(),
            role: 1,
            identification: SecurityIdentification::sender(client_system_id),
            date: SecurityDate::timestamp(at),
            algorithm: EncryptionAlgorithm::default(),
            key_name,
            compression: 0,
        }
    }
}

/// `HNVSD`, carrying an encrypted message.
#[derive(Debug, Clone, PartialEq, Segment)]
#[segment("HNVSD", 1)]
pub struct EncryptedData {
    #[header]
    pub header: SegmentHeader,
    #[element]
    pub data: Binary,
}

impl EncryptedData {
    pub fn new(data: Vec<u8>) -> Self {
        let mut header = SegmentHeader::of::<Self>();
        header.number = ENCRYPTED_DATA_NUMBER;

        Self {
            header,
            data: Binary(data),
        }
    }
}
