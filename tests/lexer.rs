use hbci::sans::lexer::{LexError, Lexer, TokenKind};

fn kinds(input: &[u8]) -> Vec<TokenKind> {
    Lexer::new(input).map(|t| t.kind()).collect()
}

fn first(input: &[u8]) -> (TokenKind, Vec<u8>) {
    let token = Lexer::new(input).next_token().unwrap();
    (token.kind(), token.value().to_vec())
}

#[test]
fn escapes_and_carriage_control() {
    use TokenKind::*;

    assert_eq!(
        kinds(b"ab??cd\ref+12345+@2@ab'"),
        [
            Text,
            DataElementSeparator,
            Numeric,
            DataElementSeparator,
            BinaryData,
            SegmentEndMarker,
            Eof,
        ]
    );
}

#[test]
fn token_positions_index_the_input() {
    let positions = Lexer::new(b"HNHBS:12+1'")
        .map(|t| (t.kind(), t.position()))
        .collect::<Vec<_>>();

    assert_eq!(
        positions,
        [
            (TokenKind::AlphaNumeric, 0),
            (TokenKind::GroupDataElementSeparator, 5),
            (TokenKind::Numeric, 6),
            (TokenKind::DataElementSeparator, 8),
            (TokenKind::Numeric, 9),
            (TokenKind::SegmentEndMarker, 10),
            (TokenKind::Eof, 11),
        ]
    );
}

#[test]
fn binary_data_keeps_its_framing() {
    assert_eq!(first(b"@2@ab'"), (TokenKind::BinaryData, b"@2@ab".to_vec()));

    // Delimiters inside the payload are content.
    assert_eq!(first(b"@3@a+'+'"), (TokenKind::BinaryData, b"@3@a+'".to_vec()));
}

#[test]
fn malformed_binary_length() {
    let token = Lexer::new(b"@@ab'").next_token().unwrap();
    assert_eq!(token.error(), Some(LexError::EmptyBinaryLength));
    assert_eq!(
        LexError::EmptyBinaryLength.to_string(),
        "Binary length can't be empty"
    );

    let token = Lexer::new(b"@2x@ab'").next_token().unwrap();
    assert_eq!(token.error(), Some(LexError::NonDigitBinaryLength));
    assert_eq!(
        LexError::NonDigitBinaryLength.to_string(),
        "Binary length must contain of digits only"
    );
}

#[test]
fn binary_payload_longer_than_input() {
    let token = Lexer::new(b"@10@ab'").next_token().unwrap();
    assert_eq!(token.error(), Some(LexError::UnexpectedEndOfInput));
}

#[test]
fn numbers_and_digits() {
    assert_eq!(first(b"0'"), (TokenKind::Numeric, b"0".to_vec()));
    assert_eq!(first(b"120'"), (TokenKind::Numeric, b"120".to_vec()));
    assert_eq!(first(b"0012'"), (TokenKind::Digit, b"0012".to_vec()));
    assert_eq!(first(b"0,123'"), (TokenKind::Float, b"0,123".to_vec()));
    assert_eq!(first(b"12,'"), (TokenKind::Float, b"12,".to_vec()));
    assert_eq!(first(b"0,'"), (TokenKind::Float, b"0,".to_vec()));
}

#[test]
fn malformed_float() {
    let token = Lexer::new(b"01,23'").next_token().unwrap();
    assert_eq!(token.error(), Some(LexError::MalformedFloat));
    assert_eq!(token.kind(), TokenKind::Error(LexError::MalformedFloat));
    assert_eq!(token.value(), b"01");
}

#[test]
fn digits_followed_by_letters_are_alphanumeric() {
    assert_eq!(first(b"12a'"), (TokenKind::AlphaNumeric, b"12a".to_vec()));
    assert_eq!(first(b"01b'"), (TokenKind::AlphaNumeric, b"01b".to_vec()));
}

#[test]
fn stray_escape_is_an_error() {
    let token = Lexer::new(b"a?b'").next_token().unwrap();
    assert_eq!(token.error(), Some(LexError::UnexpectedEscape));
}

#[test]
fn stream_ends_after_error() {
    let mut lexer = Lexer::new(b"@@ab'");

    assert!(lexer.has_next());
    assert!(lexer.next_token().unwrap().error().is_some());
    assert!(!lexer.has_next());
    assert!(lexer.next_token().is_none());
}

#[test]
fn unterminated_content() {
    let token = Lexer::new(b"abc").next_token().unwrap();
    assert_eq!(token.error(), Some(LexError::UnexpectedEndOfInput));
}
