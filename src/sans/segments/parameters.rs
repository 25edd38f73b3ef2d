//! Bank and user parameter data.

use crate::sans::{
    element::{Array, DataElementGroup, Float},
    segment::{Segment, SegmentHeader, versioned_segment},
};

/// Identifies a bank by country and national bank code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, DataElementGroup)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct BankId {
    /// ISO 3166 numeric country code, `280` for Germany.
    pub country_code: u16,
    pub bank_code: String,
}

impl BankId {
    pub fn new(country_code: u16, bank_code: impl Into<String>) -> Self {
        Self {
            country_code,
            bank_code: bank_code.into(),
        }
    }
}

/// An account at a bank.
#[derive(Debug, Clone, PartialEq, Eq, DataElementGroup)]
pub struct AccountConnection {
    pub number: String,
    pub subaccount: Option<String>,
    pub bank: BankId,
}

#[derive(Debug, Clone, PartialEq, DataElementGroup)]
pub struct Amount {
    pub value: Float,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, DataElementGroup)]
pub struct AccountLimit {
    /// `E` per transaction, `T` per day, `W` per week, `M` per month,
    /// `Z` per period.
    pub kind: String,
    pub amount: Option<Amount>,
    pub days: Option<u32>,
}

/// A business transaction an account permits.
#[derive(Debug, Clone, PartialEq, DataElementGroup)]
pub struct AllowedTransaction {
    /// Identifier of the request segment, such as `HKSAK`.
    pub id: String,
    pub required_signatures: Option<u8>,
    pub limit: Option<AccountLimit>,
}

#[derive(Debug, Clone, PartialEq, Segment)]
#[segment("HIBPA", 2)]
pub struct BankParametersV2 {
    #[header]
    pub header: SegmentHeader,
    #[element]
    pub bpd_version: u32,
    #[element]
    pub bank: BankId,
    #[element]
    pub bank_name: String,
    #[element]
    pub max_transactions: u32,
    #[element]
    pub languages: Array<u8, 1, 9>,
    #[element]
    pub hbci_versions: Array<u16, 1, 9>,
    #[element]
    pub max_message_size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Segment)]
#[segment("HIBPA", 3)]
pub struct BankParametersV3 {
    #[header]
    pub header: SegmentHeader,
    #[element]
    pub bpd_version: u32,
    #[element]
    pub bank: BankId,
    #[element]
    pub bank_name: String,
    #[element]
    pub max_transactions: u32,
    #[element]
    pub languages: Array<u8, 1, 9>,
    #[element]
    pub hbci_versions: Array<u16, 1, 9>,
    #[element]
    pub max_message_size: Option<u32>,
    #[element]
    pub min_timeout: Option<u32>,
    #[element]
    pub max_timeout: Option<u32>,
}

versioned_segment! {
    /// `HIBPA`, general bank parameters.
    pub enum BankParameters("HIBPA") {
        2 => V2(BankParametersV2),
        3 => V3(BankParametersV3),
    }
}

impl BankParameters {
    pub fn bpd_version(&self) -> u32 {
        match self {
            Self::V2(s) => s.bpd_version,
            Self::V3(s) => s.bpd_version,
        }
    }

    pub fn bank(&self) -> &BankId {
        match self {
            Self::V2(s) => &s.bank,
            Self::V3(s) => &s.bank,
        }
    }

    pub fn bank_name(&self) -> &str {
        match self {
            Self::V2(s) => &s.bank_name,
            Self::V3(s) => &s.bank_name,
        }
    }

    pub fn max_transactions(&self) -> u32 {
        match self {
            Self::V2(s) => s.max_transactions,
            Self::V3(s) => s.max_transactions,
        }
    }

    pub fn languages(&self) -> &[u8] {
        match self {
            Self::V2(s) => &s.languages,
            Self::V3(s) => &s.languages,
        }
    }

    pub fn hbci_versions(&self) -> &[u16] {
        match self {
            Self::V2(s) => &s.hbci_versions,
            Self::V3(s) => &s.hbci_versions,
        }
    }

    pub fn max_message_size(&self) -> Option<u32> {
        match self {
            Self::V2(s) => s.max_message_size,
            Self::V3(s) => s.max_message_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Segment)]
#[segment("HIUPA", 2)]
pub struct UserParametersV2 {
    #[header]
    pub header: SegmentHeader,
    #[element]
    pub user_id: String,
    #[element]
    pub upd_version: u32,
    /// `0` if only the listed transactions are allowed.
    #[element]
    pub usage: u8,
}

#[derive(Debug, Clone, PartialEq, Segment)]
#[segment("HIUPA", 3)]
pub struct UserParametersV3 {
    #[header]
    pub header: SegmentHeader,
    #[element]
    pub user_id: String,
    #[element]
    pub upd_version: u32,
    #[element]
    pub usage: u8,
}

#[derive(Debug, Clone, PartialEq, Segment)]
#[segment("HIUPA", 4)]
pub struct UserParametersV4 {
    #[header]
    pub header: SegmentHeader,
    #[element]
    pub user_id: String,
    #[element]
    pub upd_version: u32,
    #[element]
    pub usage: u8,
    #[element]
    pub user_name: Option<String>,
    #[element]
    pub extension: Option<String>,
}

versioned_segment! {
    /// `HIUPA`, general user parameters.
    pub enum UserParameters("HIUPA") {
        2 => V2(UserParametersV2),
        3 => V3(UserParametersV3),
        4 => V4(UserParametersV4),
    }
}

impl UserParameters {
    pub fn user_id(&self) -> &str {
        match self {
            Self::V2(s) => &s.user_id,
            Self::V3(s) => &s.user_id,
            Self::V4(s) => &s.user_id,
        }
    }

    pub fn upd_version(&self) -> u32 {
        match self {
            Self::V2(s) => s.upd_version,
            Self::V3(s) => s.upd_version,
            Self::V4(s) => s.upd_version,
        }
    }

    pub fn usage(&self) -> u8 {
        match self {
            Self::V2(s) => s.usage,
            Self::V3(s) => s.usage,
            Self::V4(s) => s.usage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Segment)]
#[segment("HIUPD", 4)]
pub struct AccountInformationV4 {
    #[header]
    pub header: SegmentHeader,
    #[element]
    pub account: AccountConnection,
    #[element]
    pub customer_id: String,
    #[element]
    pub currency: Option<String>,
    #[element]
    pub name: String,
    #[element]
    pub name_extension: Option<String>,
    #[element]
    pub product_name: Option<String>,
    #[element]
    pub limit: Option<AccountLimit>,
    #[element(repeated)]
    pub allowed_transactions: Array<AllowedTransaction, 0, 999>,
}

#[derive(Debug, Clone, PartialEq, Segment)]
#[segment("HIUPD", 5)]
pub struct AccountInformationV5 {
    #[header]
    pub header: SegmentHeader,
    #[element]
    pub account: AccountConnection,
    #[element]
    pub customer_id: String,
    #[element]
    pub account_kind: Option<u8>,
    #[element]
    pub currency: Option<String>,
    #[element]
    pub name: String,
    #[element]
    pub name_extension: Option<String>,
    #[element]
    pub product_name: Option<String>,
    #[element]
    pub limit: Option<AccountLimit>,
    #[element(repeated)]
    pub allowed_transactions: Array<AllowedTransaction, 0, 999>,
}

#[derive(Debug, Clone, PartialEq, Segment)]
#[segment("HIUPD", 6)]
pub struct AccountInformationV6 {
    #[header]
    pub header: SegmentHeader,
    #[element]
    pub account: AccountConnection,
    #[element]
    pub iban: Option<String>,
    #[element]
    pub customer_id: String,
    #[element]
    pub account_kind: Option<u8>,
    #[element]
    pub currency: Option<String>,
    #[element]
    pub name: String,
    #[element]
    pub name_extension: Option<String>,
    #[element]
    pub product_name: Option<String>,
    #[element]
    pub limit: Option<AccountLimit>,
    #[element(repeated)]
    pub allowed_transactions: Array<AllowedTransaction, 0, 999>,
}

versioned_segment! {
    /// `HIUPD`, the parameters of one account.
    pub enum AccountInformation("HIUPD") {
        4 => V4(AccountInformationV4),
        5 => V5(AccountInformationV5),
        6 => V6(AccountInformationV6),
    }
}

impl AccountInformation {
    pub fn account(&self) -> &AccountConnection {
        match self {
            Self::V4(s) => &s.account,
            Self::V5(s) => &s.account,
            Self::V6(s) => &s.account,
        }
    }

    pub fn iban(&self) -> Option<&str> {
        match self {
            Self::V6(s) => s.iban.as_deref(),
            _ => None,
        }
    }

    pub fn customer_id(&self) -> &str {
        match self {
            Self::V4(s) => &s.customer_id,
            Self::V5(s) => &s.customer_id,
            Self::V6(s) => &s.customer_id,
        }
    }

    pub fn currency(&self) -> Option<&str> {
        match self {
            Self::V4(s) => s.currency.as_deref(),
            Self::V5(s) => s.currency.as_deref(),
            Self::V6(s) => s.currency.as_deref(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::V4(s) => &s.name,
            Self::V5(s) => &s.name,
            Self::V6(s) => &s.name,
        }
    }

    pub fn product_name(&self) -> Option<&str> {
        match self {
            Self::V4(s) => s.product_name.as_deref(),
            Self::V5(s) => s.product_name.as_deref(),
            Self::V6(s) => s.product_name.as_deref(),
        }
    }

    pub fn allowed_transactions(&self) -> &[AllowedTransaction] {
        match self {
            Self::V4(s) => &s.allowed_transactions,
            Self::V5(s) => &s.allowed_transactions,
            Self::V6(s) => &s.allowed_transactions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sans::segment::DecodeSegment;

    #[test]
    fn account_information_dispatches_on_version() {
        let raw = b"HIUPD:7:6:4+1234567::280:12345678+DE02123456780001234567+user+1+EUR+Erika Mustermann++Girokonto+T:1000,:EUR:1+HKSAK:1+HKKAZ:1'";
        let info = AccountInformation::decode_segment(raw).unwrap();

        let AccountInformation::V6(v6) = &info else {
            panic!("expected version 6, found {info:?}");
        };

        assert_eq!(v6.header.reference, Some(4));
        assert_eq!(info.account().number, "1234567");
        assert_eq!(info.account().subaccount, None);
        assert_eq!(info.iban(), Some("DE02123456780001234567"));
        assert_eq!(info.name(), "Erika Mustermann");
        assert_eq!(
            v6.limit.as_ref().and_then(|l| l.amount.as_ref()),
            Some(&Amount {
                value: Float(1000.0),
                currency: "EUR".into(),
            })
        );
        assert_eq!(info.allowed_transactions().len(), 2);
        assert_eq!(info.allowed_transactions()[1].id, "HKKAZ");
    }
}
