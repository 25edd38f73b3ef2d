//! State kept across the messages and dialogs of one client.

use crate::sans::{
    message::BankMessage,
    segment::VersionedSegmentId,
    segments::{
        dialog::SynchronisationResponse,
        envelope::INITIAL_DIALOG_ID,
        parameters::{AccountInformation, BankId, BankParameters, UserParameters},
        security::INITIAL_CLIENT_SYSTEM_ID,
    },
};

use super::config::DialogConfig;

/// Bank parameter data, as last received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BankParameterData {
    /// `0` until the bank has sent parameters.
    pub version: u32,
    pub bank: Option<BankId>,
    pub bank_name: String,
    pub max_transactions: u32,
    pub languages: Vec<u8>,
    pub hbci_versions: Vec<u16>,
    pub max_message_size: Option<u32>,
    /// Business transactions the bank supports, by their parameter
    /// segments.
    pub transactions: Vec<VersionedSegmentId>,
}

impl BankParameterData {
    /// Replace the data with that of a response carrying bank parameters.
    pub fn update(&mut self, message: &BankMessage) {
        let Some(parameters) = message.find::<BankParameters>() else {
            return;
        };

        *self = Self {
            version: parameters.bpd_version(),
            bank: Some(parameters.bank().clone()),
            bank_name: parameters.bank_name().into(),
            max_transactions: parameters.max_transactions(),
            languages: parameters.languages().to_vec(),
            hbci_versions: parameters.hbci_versions().to_vec(),
            max_message_size: parameters.max_message_size(),
            transactions: message
                .decoded
                .seen()
                .iter()
                .filter(|id| is_transaction_parameters(&id.id))
                .cloned()
                .collect(),
        };
    }
}

/// Whether `id` names the parameters of a business transaction, `HI..S`.
fn is_transaction_parameters(id: &str) -> bool {
    id.len() == 6 && id.starts_with("HI") && id.ends_with('S')
}

/// An account, as listed in the user parameter data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub number: String,
    pub subaccount: Option<String>,
    pub bank: BankId,
    pub iban: Option<String>,
    pub customer_id: String,
    pub currency: Option<String>,
    pub name: String,
    pub product_name: Option<String>,
    /// Identifiers of the request segments allowed for this account.
    pub allowed_transactions: Vec<String>,
}

impl From<&AccountInformation> for Account {
    fn from(info: &AccountInformation) -> Self {
        let account = info.account();

        Self {
            number: account.number.clone(),
            subaccount: account.subaccount.clone(),
            bank: account.bank.clone(),
            iban: info.iban().map(Into::into),
            customer_id: info.customer_id().into(),
            currency: info.currency().map(Into::into),
            name: info.name().into(),
            product_name: info.product_name().map(Into::into),
            allowed_transactions: info
                .allowed_transactions()
                .iter()
                .map(|t| t.id.clone())
                .collect(),
        }
    }
}

/// User parameter data, as last received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserParameterData {
    /// `0` until the bank has sent parameters.
    pub version: u32,
    pub user_id: String,
    /// `0` if only the listed transactions are allowed.
    pub usage: u8,
    pub accounts: Vec<Account>,
}

impl UserParameterData {
    /// Replace the data with that of a response carrying user parameters.
    pub fn update(&mut self, message: &BankMessage) {
        let Some(parameters) = message.find::<UserParameters>() else {
            return;
        };

        *self = Self {
            version: parameters.upd_version(),
            user_id: parameters.user_id().into(),
            usage: parameters.usage(),
            accounts: message
                .find_all::<AccountInformation>()
                .map(Account::from)
                .collect(),
        };
    }
}

/// The state a [`Dialog`](super::Dialog) carries between round trips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub bank: BankId,
    pub user_id: String,
    pub customer_id: String,
    /// [`INITIAL_CLIENT_SYSTEM_ID`] until synchronised.
    pub client_system_id: String,
    /// [`INITIAL_DIALOG_ID`] outside of a dialog.
    pub dialog_id: String,
    /// Number of the last message sent in the current dialog.
    pub message_number: u32,
    pub security_function: String,
    pub language: u8,
    pub product_name: String,
    pub product_version: String,
    pub bpd: BankParameterData,
    pub upd: UserParameterData,
}

impl Session {
    pub fn new(config: &DialogConfig) -> Self {
        Self {
            bank: config.bank.clone(),
            user_id: config.user_id.clone(),
            customer_id: config.customer_id().into(),
            client_system_id: config
                .client_system_id
                .clone()
                .unwrap_or_else(|| INITIAL_CLIENT_SYSTEM_ID.into()),
            dialog_id: INITIAL_DIALOG_ID.into(),
            message_number: 0,
            security_function: config.security_function.clone(),
            language: config.language,
            product_name: config.product_name.clone(),
            product_version: config.product_version.clone(),
            bpd: BankParameterData::default(),
            upd: UserParameterData::default(),
        }
    }

    pub fn is_synchronised(&self) -> bool {
        self.client_system_id != INITIAL_CLIENT_SYSTEM_ID
    }

    pub fn in_dialog(&self) -> bool {
        self.dialog_id != INITIAL_DIALOG_ID
    }

    /// Advance the message counter of the current dialog.
    pub fn next_message_number(&mut self) -> u32 {
        self.message_number += 1;
        self.message_number
    }

    /// Leave the current dialog, keeping the client system id.
    pub fn reset_dialog(&mut self) {
        self.dialog_id = INITIAL_DIALOG_ID.into();
        self.message_number = 0;
    }

    /// Take over the parameter data a response carries.
    pub fn update_parameters(&mut self, message: &BankMessage) {
        self.bpd.update(message);
        self.upd.update(message);
    }

    /// The client system id a synchronisation response assigns.
    pub fn synchronised_id(message: &BankMessage) -> Option<&str> {
        message
            .find::<SynchronisationResponse>()
            .and_then(SynchronisationResponse::client_system_id)
    }
}
