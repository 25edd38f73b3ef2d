use chrono::{NaiveDate, NaiveDateTime};
use hbci::sans::{
    message::{BankMessage, EncryptedMessage, Message, MessageError, unmarshal},
    registry::Registry,
    segment::{Segment, VersionedSegmentId},
    segments::{
        dialog::{DialogEnd, Identification, ProcessingPreparation},
        envelope::{MessageEnd, MessageHeader},
        parameters::BankId,
        security::{
            EncryptedData, EncryptionHeader, KeyName, SignatureEnd, SignatureHeader,
            UserDefinedSignature,
        },
    },
};

fn bank() -> BankId {
    BankId::new(280, "12345678")
}

fn at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 1, 2)
        .and_then(|d| d.and_hms_opt(12, 30, 0))
        .unwrap()
}

fn signed_message() -> Message {
    let mut message = Message::new("0", 1);
    message.push(Identification::new(bank(), "user", "0", true));
    message.push(ProcessingPreparation::new(0, 0, 0, "tests", "1.0"));

    message.sign(
        SignatureHeader::pin_tan("999", "4711", "0", KeyName::signing(bank(), "user"), at()),
        SignatureEnd::new(
            "4711",
            UserDefinedSignature {
                pin: "12345".into(),
                tan: None,
            },
        ),
    );

    message
}

fn numbers(raw: &[u8]) -> Vec<(String, u32)> {
    let registry = Registry::standard().unwrap();

    unmarshal(&registry, raw)
        .unwrap()
        .segments()
        .map(|s| (s.header().id.clone(), s.header().number))
        .collect()
}

#[test]
fn segments_are_numbered_in_order() {
    let mut message = signed_message();

    let numbers = numbers(message.marshal());

    assert_eq!(
        numbers,
        [
            ("HNHBK".to_string(), 1),
            ("HNSHK".to_string(), 2),
            ("HKIDN".to_string(), 3),
            ("HKVVB".to_string(), 4),
            ("HNSHA".to_string(), 5),
            ("HNHBS".to_string(), 6),
        ]
    );
}

#[test]
fn header_carries_total_size() {
    let registry = Registry::standard().unwrap();
    let mut message = signed_message();

    let raw = message.marshal().to_vec();
    let decoded = unmarshal(&registry, &raw).unwrap();
    let header = decoded.find::<MessageHeader>().unwrap();

    assert_eq!(header.size.0, raw.len() as u64);
    assert_eq!(header.dialog_id, "0");
    assert_eq!(header.message_number, 1);
    assert_eq!(decoded.find::<MessageEnd>().unwrap().message_number, 1);
    assert!(raw.starts_with(format!("HNHBK:1:3+{:012}+300+0+1'", raw.len()).as_bytes()));
}

#[test]
fn marshaled_bytes_are_cached_until_changed() {
    let mut message = signed_message();

    let first = message.marshal().as_ptr();
    let second = message.marshal().as_ptr();
    assert_eq!(first, second);

    let before = message.marshal().len();
    message.push(DialogEnd::new("0"));
    let raw = message.marshal().to_vec();

    assert!(raw.len() > before);

    let numbers = numbers(&raw);
    assert_eq!(numbers[4], ("HKEND".to_string(), 5));
    assert_eq!(numbers[6], ("HNHBS".to_string(), 7));
}

#[test]
fn unsigned_message_numbers_body_from_two() {
    let mut message = Message::new("DLG1", 3);
    message.push(DialogEnd::new("DLG1"));

    assert!(!message.is_signed());
    assert_eq!(
        numbers(message.marshal()),
        [
            ("HNHBK".to_string(), 1),
            ("HKEND".to_string(), 2),
            ("HNHBS".to_string(), 3),
        ]
    );
}

#[test]
fn encrypted_message_uses_fixed_numbers() {
    let registry = Registry::standard().unwrap();
    let mut message = signed_message();
    let payload = message.marshal_payload();

    let mut encrypted = EncryptedMessage::new(
        message.header().clone(),
        EncryptionHeader::pin_tan("0", KeyName::encryption(bank(), "user"), at()),
        EncryptedData::new(payload.clone()),
        message.end().clone(),
    );

    let raw = encrypted.marshal().to_vec();
    let decoded = unmarshal(&registry, &raw).unwrap();

    let numbers = decoded
        .segments()
        .map(|s| (s.header().id.as_str(), s.header().number))
        .collect::<Vec<_>>();
    assert_eq!(
        numbers,
        [("HNHBK", 1), ("HNVSK", 998), ("HNVSD", 999), ("HNHBS", 6)]
    );

    assert_eq!(decoded.find::<MessageHeader>().unwrap().size.0, raw.len() as u64);
    assert_eq!(decoded.find::<EncryptedData>().unwrap().data.0, payload);

    let inner = unmarshal(&registry, &payload).unwrap();
    assert!(inner.find::<SignatureHeader>().is_some());
    assert!(inner.find::<MessageHeader>().is_none());
}

#[test]
fn unknown_segments_are_skipped_but_seen() {
    let registry = Registry::standard().unwrap();
    let raw = b"HIRMG:2:2+0010::ok'HIXYZ:3:1+a'HISYN:4:4:5+ABC'";

    let decoded = unmarshal(&registry, raw).unwrap();

    assert_eq!(decoded.segments().count(), 2);
    assert!(decoded.segment_by_id("HIXYZ").is_none());
    assert!(decoded.segment_by_id("HISYN").is_some());
    assert_eq!(
        decoded.seen(),
        [
            VersionedSegmentId::new("HIRMG", 2),
            VersionedSegmentId::new("HIXYZ", 1),
            VersionedSegmentId::new("HISYN", 4),
        ]
    );
}

#[test]
fn malformed_segment_aborts_decoding() {
    let registry = Registry::standard().unwrap();

    let err = unmarshal(&registry, b"HIRMG:2:2+0010::ok'HIBPA:3:3+x'").unwrap_err();
    assert!(matches!(err, MessageError::Decode(_)));

    let err = unmarshal(&registry, b"HIRMG:2:2+0010::ok'HIBPA:3:3+@@x'").unwrap_err();
    assert!(matches!(err, MessageError::Extract(_)));
}

#[test]
fn response_requires_message_acknowledgement() {
    let registry = Registry::standard().unwrap();
    let decoded = unmarshal(&registry, b"HISYN:4:4:5+ABC'").unwrap();

    let err = BankMessage::new(&MessageHeader::new("0", 1), decoded).unwrap_err();

    assert_eq!(
        err,
        MessageError::MalformedResponse("missing message acknowledgement".into())
    );
}

#[test]
fn acknowledgements_are_classified() {
    let registry = Registry::standard().unwrap();
    let raw = b"HIRMG:2:2+3060::Warnungen'HIRMS:3:2:4+3920::Verfahren:942:962+0020::ok'";
    let decoded = unmarshal(&registry, raw).unwrap();

    let message = BankMessage::new(&MessageHeader::new("DLG1", 2), decoded).unwrap();

    assert_eq!(message.dialog_id, "DLG1");
    assert_eq!(message.message_number, 2);
    assert_eq!(message.acknowledgements.len(), 3);
    assert_eq!(message.warnings().count(), 2);
    assert!(message.errors().is_none());
    assert_eq!(message.supported_security_functions(), ["942", "962"]);
    assert_eq!(message.acknowledgements[1].segment_reference, Some(4));
}
