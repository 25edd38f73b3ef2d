use chrono::NaiveDate;
use hbci::sans::{
    element::{Array, CardinalityError, DataElementGroup, DecodeError, Float},
    registry::Registry,
    segment::{DecodeSegment, Segment, SegmentHeader, VersionedSegmentId},
    segments::{
        acknowledgement::MessageAcknowledgement,
        envelope::{MessageHeader, ReferenceMessage},
        parameters::{AccountConnection, AccountInformation, BankId, BankParameters},
        security::{
            EncryptionHeader, KeyName, SignatureEnd, SignatureHeader, UserDefinedSignature,
        },
    },
};

#[derive(Debug, Clone, PartialEq, DataElementGroup)]
struct Balance {
    amount: Float,
    currency: String,
    date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Segment)]
#[segment("HISAL", 5)]
struct BalanceResponse {
    #[header]
    header: SegmentHeader,
    #[element]
    account: AccountConnection,
    #[element]
    product_name: String,
    #[element]
    currency: String,
    #[element]
    booked: Balance,
    #[element]
    pending: Option<Balance>,
    #[element]
    note: Option<String>,
    /// Filled in by the application, never on the wire.
    received: Option<NaiveDate>,
    #[element(repeated)]
    tags: Array<String, 1, 3>,
}

const WIRE: &[u8] =
    b"HISAL:5:5:3+1234567::280:12345678+Girokonto+EUR+1500,25:EUR:20200102++Hinweis?: neu+a+b'";

fn balance_response() -> BalanceResponse {
    BalanceResponse {
        header: SegmentHeader {
            id: "HISAL".into(),
            number: 5,
            version: 5,
            reference: Some(3),
        },
        account: AccountConnection {
            number: "1234567".into(),
            subaccount: None,
            bank: BankId::new(280, "12345678"),
        },
        product_name: "Girokonto".into(),
        currency: "EUR".into(),
        booked: Balance {
            amount: Float(1500.25),
            currency: "EUR".into(),
            date: NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
        },
        pending: None,
        note: Some("Hinweis: neu".into()),
        received: None,
        tags: Array::new(vec!["a".into(), "b".into()]).unwrap(),
    }
}

#[test]
fn derived_segment_decodes() {
    let decoded = BalanceResponse::decode_segment(WIRE).unwrap();
    assert_eq!(decoded, balance_response());
}

#[test]
fn derived_segment_encodes() {
    assert_eq!(balance_response().encode(), WIRE);
}

#[test]
fn array_cardinality_is_enforced() {
    let wire = b"HISAL:5:5:3+1234567::280:12345678+Girokonto+EUR+1500,25:EUR:20200102++Hinweis?: neu'";

    let err = BalanceResponse::decode_segment(wire).unwrap_err();

    let DecodeError::InSegment { id, number, source } = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(*id, VersionedSegmentId::new("HISAL", 5));
    assert_eq!(*number, 5);
    assert_eq!(
        **source,
        DecodeError::Cardinality(CardinalityError {
            min: 1,
            max: 3,
            found: 0
        })
    );

    assert!(Array::<String, 1, 3>::new(Vec::new()).is_err());
}

#[test]
fn missing_mandatory_element() {
    let err = BalanceResponse::decode_segment(b"HISAL:5:5:3+1234567::280:12345678'").unwrap_err();

    let DecodeError::InSegment { source, .. } = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(**source, DecodeError::Missing { element: 2, item: 0 });
}

#[test]
fn wrong_segment_is_rejected() {
    let err = BalanceResponse::decode_segment(b"HISAL:5:6:3+1'").unwrap_err();

    assert_eq!(
        err,
        DecodeError::UnexpectedSegment {
            expected: VersionedSegmentId::new("HISAL", 5),
            found: VersionedSegmentId::new("HISAL", 6),
        }
    );
}

#[test]
fn versioned_segment_dispatches_on_version() {
    let v2 = BankParameters::decode_segment(b"HIBPA:4:2:4+12+280:12345678+Testbank+3+1+300'").unwrap();
    let v3 = BankParameters::decode_segment(b"HIBPA:4:3:4+12+280:12345678+Testbank+3+1+300+0'").unwrap();

    assert!(matches!(v2, BankParameters::V2(_)));
    assert!(matches!(v3, BankParameters::V3(_)));
    assert_eq!(v3.bank_name(), "Testbank");
    assert_eq!(v3.hbci_versions(), [300]);
}

#[test]
fn unknown_version_is_named() {
    let err = BankParameters::decode_segment(b"HIBPA:4:9:4+12'").unwrap_err();

    assert_eq!(
        err,
        DecodeError::UnsupportedVersion(VersionedSegmentId::new("HIBPA", 9))
    );
    assert_eq!(err.to_string(), "Unknown segment version: HIBPA v9");
}

#[test]
fn trailing_data_is_rejected() {
    let err = BalanceResponse::decode_segment(b"HISAL:5:5'HISAL:6:5'").unwrap_err();
    assert_eq!(err, DecodeError::TrailingData);
}

#[derive(Debug, Clone, PartialEq, Segment)]
#[segment("HIXXX", 1)]
struct Tags {
    #[header]
    header: SegmentHeader,
    #[element(repeated)]
    tags: Array<String, 1, 3>,
}

fn cardinality(err: &DecodeError) -> &DecodeError {
    let DecodeError::InSegment { source, .. } = err else {
        panic!("unexpected error: {err}");
    };
    source
}

#[test]
fn surplus_repeated_elements_are_rejected() {
    let err = Tags::decode_segment(b"HIXXX:1:1+a+b+c+d+e'").unwrap_err();

    assert_eq!(
        *cardinality(&err),
        DecodeError::Cardinality(CardinalityError {
            min: 1,
            max: 3,
            found: 5
        })
    );

    let tags = Tags::decode_segment(b"HIXXX:1:1+a+b+c'").unwrap();
    assert_eq!(&*tags.tags, ["a", "b", "c"]);
}

#[test]
fn surplus_group_items_are_rejected() {
    let err = MessageAcknowledgement::decode_segment(b"HIRMG:2:2+3920::t:1:2:3:4:5:6:7:8:9:10:11'")
        .unwrap_err();

    assert_eq!(
        *cardinality(&err),
        DecodeError::Cardinality(CardinalityError {
            min: 0,
            max: 10,
            found: 11
        })
    );

    let ten = MessageAcknowledgement::decode_segment(b"HIRMG:2:2+3920::t:1:2:3:4:5:6:7:8:9:10'")
        .unwrap();
    assert_eq!(ten.acknowledgements[0].params.len(), 10);
}

#[test]
fn too_many_items_cannot_be_built() {
    let items = (0..4).map(|i| i.to_string()).collect::<Vec<_>>();

    assert_eq!(
        Array::<String, 1, 3>::new(items).unwrap_err(),
        CardinalityError {
            min: 1,
            max: 3,
            found: 4
        }
    );
}

fn at() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 1, 2)
        .and_then(|d| d.and_hms_opt(12, 30, 0))
        .unwrap()
}

/// Encode a segment, then decode it both directly and through the standard
/// registry.
fn reencode<T: DecodeSegment + PartialEq>(segment: &T) {
    let raw = segment.encode();

    assert_eq!(T::decode_segment(&raw).as_ref(), Ok(segment));

    let registry = Registry::standard().unwrap();
    let decoded = registry.decode(&raw).unwrap();
    assert_eq!(decoded.downcast_ref::<T>(), Some(segment));
}

#[test]
fn signature_header_survives_reencoding() {
    let mut header = SignatureHeader::pin_tan(
        "942",
        "4711",
        "ABCDEFGHIJ",
        KeyName::signing(BankId::new(280, "12345678"), "user"),
        at(),
    );
    header.header.number = 2;

    reencode(&header);
}

#[test]
fn encryption_header_survives_reencoding() {
    let header = EncryptionHeader::pin_tan(
        "0",
        KeyName::encryption(BankId::new(280, "12345678"), "user"),
        at(),
    );

    reencode(&header);
}

#[test]
fn message_header_with_reference_survives_reencoding() {
    let mut header = MessageHeader::new("DLG1", 2);
    header.header.number = 1;
    header.size.0 = 340;
    header.reference = Some(ReferenceMessage {
        dialog_id: "DLG0".into(),
        message_number: 7,
    });

    assert!(header.encode().ends_with(b"+DLG1+2+DLG0:7'"));
    reencode(&header);
}

#[test]
fn account_information_survives_reencoding() {
    let wire = b"HIUPD:6:6:4+1234567::280:12345678+DE02123456780001234567+user+1+EUR+Erika Mustermann++Girokonto++HKSAK:1+HKKAZ:1'";

    let account = AccountInformation::decode_segment(wire).unwrap();

    let AccountInformation::V6(v6) = &account else {
        panic!("unexpected version: {account:?}");
    };
    assert_eq!(v6.iban.as_deref(), Some("DE02123456780001234567"));
    assert_eq!(v6.name_extension, None);
    assert_eq!(v6.product_name.as_deref(), Some("Girokonto"));
    assert_eq!(v6.limit, None);
    assert_eq!(v6.allowed_transactions.len(), 2);

    reencode(&account);
}

#[test]
fn absent_element_before_present_one_keeps_its_place() {
    let mut end = SignatureEnd::new(
        "4711",
        UserDefinedSignature {
            pin: "12345".into(),
            tan: None,
        },
    );
    end.header.number = 4;

    assert_eq!(end.encode(), b"HNSHA:4:2+4711++12345'");
    reencode(&end);

    let decoded = SignatureEnd::decode_segment(b"HNSHA:4:2+4711++12345'").unwrap();
    assert_eq!(decoded.validation_result, None);
    assert_eq!(decoded.signature.map(|s| s.pin), Some("12345".into()));
}
