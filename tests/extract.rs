use hbci::sans::{
    extract::{ExtractError, SegmentExtractor},
    lexer::LexError,
};

const MESSAGE: &[u8] = b"HNHBK:1:3+000000000061+300+0+1'HIRMS:2:2+0020::ok'HIRMSX:3:1+a'HIRMS:4:2+3060::b'HNHBS:5:1+1'";

#[test]
fn extraction_is_repeatable() {
    let mut extractor = SegmentExtractor::new(MESSAGE);

    let first = extractor.extract().unwrap();
    let second = extractor.extract().unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 5);
    assert_eq!(first[0], b"HNHBK:1:3+000000000061+300+0+1'");
    assert_eq!(first.concat(), MESSAGE);
}

#[test]
fn segments_are_grouped_by_identifier() {
    let mut extractor = SegmentExtractor::new(MESSAGE);
    extractor.extract().unwrap();

    let acknowledgements = extractor.find_segments("HIRMS");
    assert_eq!(
        acknowledgements,
        [b"HIRMS:2:2+0020::ok'".to_vec(), b"HIRMS:4:2+3060::b'".to_vec()]
    );

    assert_eq!(
        extractor.find_segments("HIRMSX"),
        [b"HIRMSX:3:1+a'".to_vec()]
    );
    assert!(extractor.find_segments("HIRM").is_empty());
    assert_eq!(
        extractor.find_segment("HNHBS"),
        Some(b"HNHBS:5:1+1'".to_vec())
    );
}

#[test]
fn lookups_need_extraction_first() {
    let extractor = SegmentExtractor::new(MESSAGE);

    assert!(extractor.find_segments("HIRMS").is_empty());
    assert_eq!(extractor.find_segment("HNHBK"), None);
}

#[test]
fn escaped_delimiters_stay_in_their_segment() {
    let mut extractor = SegmentExtractor::new(b"HIRMG:2:2+9010::Fehler?' im Text'HNHBS:3:1+1'");

    let segments = extractor.extract().unwrap();

    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0], b"HIRMG:2:2+9010::Fehler?' im Text'");
}

#[test]
fn syntax_error_reports_position() {
    let mut extractor = SegmentExtractor::new(b"HNHBK:1:3+@x@ab'");

    let err = extractor.extract().unwrap_err();

    let ExtractError::Syntax {
        error, position, ..
    } = &err
    else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(*error, LexError::NonDigitBinaryLength);
    assert_eq!(*position, 10);
}

#[test]
fn unterminated_segment() {
    let mut extractor = SegmentExtractor::new(b"HNHBS:1:1+1'HNHBK:1:3+");

    assert_eq!(
        extractor.extract(),
        Err(ExtractError::UnterminatedSegment { position: 12 })
    );
}
