#![allow(dead_code)]

use std::{collections::VecDeque, path::Path};

use chrono::NaiveDate;
use hbci::{
    avec::{
        Dialog, DialogConfig, PinTanCryptoProvider, PinTanSignatureProvider, Request, Response,
        Transport, TransportError,
    },
    sans::{
        message::{DecodedMessage, EncryptedMessage, unmarshal},
        registry::Registry,
        segments::{
            envelope::{MessageEnd, MessageHeader},
            parameters::BankId,
            security::{EncryptedData, EncryptionHeader, KeyName},
        },
    },
};

pub const URL: &str = "banking.example:3000";
pub const USER_ID: &str = "user";
pub const PIN: &str = "12345";

pub type TestDialog<'r> = Dialog<'r, PinTanSignatureProvider, PinTanCryptoProvider, MockTransport>;

pub fn bank() -> BankId {
    BankId::new(280, "12345678")
}

pub fn config() -> DialogConfig {
    DialogConfig::new(URL, bank(), USER_ID).with_product("hbci-tests", "1.0")
}

/// A dialog whose client system id is already known.
pub fn established(registry: &Registry, transport: MockTransport) -> TestDialog<'_> {
    dialog(registry, config().with_client_system_id("KNOWNID"), transport)
}

pub fn dialog(registry: &Registry, config: DialogConfig, transport: MockTransport) -> TestDialog<'_> {
    let signer = PinTanSignatureProvider::new(bank(), USER_ID).with_pin(PIN);
    let crypto = PinTanCryptoProvider::new(bank(), USER_ID);

    Dialog::new(config, registry, signer, crypto, transport)
}

/// Read a plaintext bank response.
pub fn fixture(name: &str) -> Vec<u8> {
    let data = std::fs::read(Path::new("fixtures").join(name)).unwrap();
    data.trim_ascii_end().to_vec()
}

/// Wrap a plaintext response into an encrypted message, as a PIN/TAN bank
/// sends it.
pub fn envelope(inner: &[u8], dialog_id: &str) -> Vec<u8> {
    let at = NaiveDate::from_ymd_opt(2020, 1, 2)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .unwrap();

    let mut end = MessageEnd::new(1);
    end.header.number = 10;

    EncryptedMessage::new(
        MessageHeader::new(dialog_id, 1),
        EncryptionHeader::pin_tan("0", KeyName::encryption(bank(), USER_ID), at),
        EncryptedData::new(inner.to_vec()),
        end,
    )
    .marshal()
    .to_vec()
}

/// Frame a plaintext response without encryption.
pub fn plain(inner: &[u8], dialog_id: &str) -> Vec<u8> {
    let end = b"HNHBS:10:1+1'";
    let header = |size: usize| format!("HNHBK:1:3+{size:012}+300+{dialog_id}+1'");

    let size = header(0).len() + inner.len() + end.len();

    let mut message = header(size).into_bytes();
    message.extend_from_slice(inner);
    message.extend_from_slice(end);
    message
}

/// Replays scripted responses and records the requests it is sent.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: VecDeque<Vec<u8>>,
    pub requests: Vec<Request>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an encrypted response wrapping a fixture.
    pub fn respond(mut self, fixture_name: &str, dialog_id: &str) -> Self {
        self.responses.push_back(envelope(&fixture(fixture_name), dialog_id));
        self
    }

    pub fn respond_raw(mut self, body: Vec<u8>) -> Self {
        self.responses.push_back(body);
        self
    }
}

impl Transport for MockTransport {
    fn send(&mut self, request: Request) -> Result<Response, TransportError> {
        self.requests.push(request);

        self.responses
            .pop_front()
            .map(|body| Response { body })
            .ok_or_else(|| TransportError::Other("no response scripted".into()))
    }
}

/// A request as the bank sees it: the outer header and the decrypted
/// segments.
pub struct SentMessage {
    pub header: MessageHeader,
    pub inner: DecodedMessage,
}

pub fn decode_request(registry: &Registry, request: &Request) -> SentMessage {
    let outer = unmarshal(registry, &request.body).unwrap();
    let header = outer.find::<MessageHeader>().unwrap().clone();

    let inner = match outer.find::<EncryptedData>() {
        Some(data) => unmarshal(registry, &data.data.0).unwrap(),
        None => outer,
    };

    SentMessage { header, inner }
}
