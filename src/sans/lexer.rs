//! Tokenizer for the wire grammar.
//!
//! The lexer is a pull-based finite-state machine over an immutable byte
//! slice. Every call to [`Lexer::next_token`] runs the machine from its
//! current state until one token is emitted. Malformed input yields a single
//! [`TokenKind::Error`] token, after which the stream is exhausted.

use either::Either::{self, Left, Right};
use thiserror::Error;

/// Separates data elements within a segment.
pub const DATA_ELEMENT_SEPARATOR: u8 = b'+';
/// Separates group data elements within a data element group.
pub const GROUP_DATA_ELEMENT_SEPARATOR: u8 = b':';
/// Terminates a segment.
pub const SEGMENT_END_MARKER: u8 = b'\'';
/// Escapes the following syntax symbol.
pub const ESCAPE_CHARACTER: u8 = b'?';
/// Introduces a length-prefixed binary payload.
pub const BINARY_IDENTIFIER: u8 = b'@';

/// An error found while scanning input.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LexError {
    /// Input ended in the middle of a token.
    #[error("Unexpected end of input")]
    UnexpectedEndOfInput,
    /// An escape character preceded a byte needing no escape.
    #[error("Unexpected escape character")]
    UnexpectedEscape,
    /// A binary payload declared no length.
    #[error("Binary length can't be empty")]
    EmptyBinaryLength,
    /// A binary payload declared a length containing other bytes than digits.
    #[error("Binary length must contain of digits only")]
    NonDigitBinaryLength,
    /// A binary payload was not followed by a syntax symbol.
    #[error("Expected syntax symbol after binary data")]
    UnterminatedBinaryData,
    /// A decimal comma appeared where no float can continue.
    #[error("Malformed float")]
    MalformedFloat,
}

/// The lexical type of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    DataElementSeparator,
    GroupDataElementSeparator,
    SegmentEndMarker,
    /// Printable content without carriage control.
    AlphaNumeric,
    /// Content holding carriage control (`\n` or `\r`).
    Text,
    /// Digits with a leading zero.
    Digit,
    /// Digits without a leading zero, or a single `0`.
    Numeric,
    /// Digits with a decimal comma.
    Float,
    /// A length-prefixed payload, `@len@bytes`.
    BinaryData,
    Eof,
    Error(LexError),
}

impl TokenKind {
    /// Whether this kind is one of the three delimiters.
    pub fn is_syntax_symbol(self) -> bool {
        matches!(
            self,
            Self::DataElementSeparator | Self::GroupDataElementSeparator | Self::SegmentEndMarker
        )
    }
}

/// A lexical token, borrowing its raw (still escaped) value from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    kind: TokenKind,
    value: &'a [u8],
    position: usize,
}

impl<'a> Token<'a> {
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// The raw bytes of this token as found in the input.
    pub fn value(&self) -> &'a [u8] {
        self.value
    }

    /// The offset of this token's first byte in the input.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_syntax_symbol(&self) -> bool {
        self.kind.is_syntax_symbol()
    }

    /// The error carried by an error token.
    pub fn error(&self) -> Option<LexError> {
        match self.kind {
            TokenKind::Error(err) => Some(err),
            _ => None,
        }
    }
}

/// Whether a byte is one of the three delimiters.
pub fn is_syntax_symbol(b: u8) -> bool {
    matches!(
        b,
        DATA_ELEMENT_SEPARATOR | GROUP_DATA_ELEMENT_SEPARATOR | SEGMENT_END_MARKER
    )
}

/// Whether a byte must be escaped to appear literally in content.
pub fn is_escapable(b: u8) -> bool {
    is_syntax_symbol(b) || b == ESCAPE_CHARACTER || b == BINARY_IDENTIFIER
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    AlphaNumeric,
    Binary,
    Digit,
    Number,
}

/// Either an emitted token with the state to resume from (none once the
/// stream has ended), or a transition without output.
type Step<'a> = Either<(Token<'a>, Option<State>), State>;

/// A single-pass tokenizer over a byte slice.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    input: &'a [u8],
    start: usize,
    pos: usize,
    state: Option<State>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            start: 0,
            pos: 0,
            state: Some(State::Text),
        }
    }

    /// Whether another token can be taken. Becomes false after an end-of-input
    /// or error token has been returned.
    pub fn has_next(&self) -> bool {
        self.state.is_some()
    }

    /// Run the machine until it emits a token.
    pub fn next_token(&mut self) -> Option<Token<'a>> {
        loop {
            let step = match self.state? {
                State::Text => self.lex_text(),
                State::AlphaNumeric => self.lex_alpha_numeric(),
                State::Binary => self.lex_binary(),
                State::Digit => self.lex_digit(),
                State::Number => self.lex_number(),
            };

            match step {
                Left((token, successor)) => {
                    self.state = successor;
                    return Some(token);
                }
                Right(successor) => self.state = Some(successor),
            }
        }
    }

    fn lex_text(&mut self) -> Step<'a> {
        match self.advance() {
            None => Left((self.emit(TokenKind::Eof), None)),
            Some(DATA_ELEMENT_SEPARATOR) => self.emit_then_text(TokenKind::DataElementSeparator),
            Some(GROUP_DATA_ELEMENT_SEPARATOR) => {
                self.emit_then_text(TokenKind::GroupDataElementSeparator)
            }
            Some(SEGMENT_END_MARKER) => self.emit_then_text(TokenKind::SegmentEndMarker),
            Some(BINARY_IDENTIFIER) => {
                self.backup();
                Right(State::Binary)
            }
            Some(b'0') => Right(State::Digit),
            Some(b'1'..=b'9') => Right(State::Number),
            Some(_) => {
                // Let the alphanumeric state see a leading escape character.
                self.backup();
                Right(State::AlphaNumeric)
            }
        }
    }

    fn lex_alpha_numeric(&mut self) -> Step<'a> {
        loop {
            match self.advance() {
                None => return self.fail(LexError::UnexpectedEndOfInput),
                Some(ESCAPE_CHARACTER) => match self.peek() {
                    Some(b) if is_escapable(b) => self.pos += 1,
                    _ => return self.fail(LexError::UnexpectedEscape),
                },
                Some(b) if is_syntax_symbol(b) => {
                    self.backup();

                    let is_text = self.current().iter().any(|&b| b == b'\n' || b == b'\r');
                    let kind = if is_text {
                        TokenKind::Text
                    } else {
                        TokenKind::AlphaNumeric
                    };

                    return self.emit_then_text(kind);
                }
                Some(_) => {}
            }
        }
    }

    fn lex_binary(&mut self) -> Step<'a> {
        self.pos += 1; // Past the opening identifier.

        let digits = self.pos;
        self.accept_digits();

        if self.pos == digits {
            return match self.peek() {
                Some(BINARY_IDENTIFIER) => self.fail(LexError::EmptyBinaryLength),
                _ => self.fail(LexError::NonDigitBinaryLength),
            };
        }

        if self.peek() != Some(BINARY_IDENTIFIER) {
            return self.fail(LexError::NonDigitBinaryLength);
        }

        let length = self
            .input
            .get(digits..self.pos)
            .and_then(|d| core::str::from_utf8(d).ok())
            .and_then(|d| d.parse::<usize>().ok());

        let Some(length) = length else {
            return self.fail(LexError::NonDigitBinaryLength);
        };

        self.pos += 1; // Past the closing identifier.

        if self.input.len() - self.pos < length {
            self.pos = self.input.len();
            return self.fail(LexError::UnexpectedEndOfInput);
        }

        // Payload bytes are taken verbatim, delimiters included.
        self.pos += length;

        match self.peek() {
            Some(b) if is_syntax_symbol(b) => self.emit_then_text(TokenKind::BinaryData),
            _ => self.fail(LexError::UnterminatedBinaryData),
        }
    }

    fn lex_digit(&mut self) -> Step<'a> {
        match self.peek() {
            Some(b) if is_syntax_symbol(b) => return self.emit_then_text(TokenKind::Numeric),
            Some(b',') => {
                self.pos += 1;
                return self.lex_fraction();
            }
            _ => {}
        }

        self.accept_digits();

        match self.peek() {
            Some(b) if is_syntax_symbol(b) => self.emit_then_text(TokenKind::Digit),
            Some(b',') => self.fail(LexError::MalformedFloat),
            _ => Right(State::AlphaNumeric),
        }
    }

    fn lex_number(&mut self) -> Step<'a> {
        self.accept_digits();

        match self.peek() {
            Some(b) if is_syntax_symbol(b) => self.emit_then_text(TokenKind::Numeric),
            Some(b',') => {
                self.pos += 1;
                self.lex_fraction()
            }
            _ => Right(State::AlphaNumeric),
        }
    }

    /// Continue a float after its decimal comma. The fraction may be empty:
    /// amounts such as `100,` are floats.
    fn lex_fraction(&mut self) -> Step<'a> {
        self.accept_digits();

        match self.peek() {
            Some(b) if is_syntax_symbol(b) => self.emit_then_text(TokenKind::Float),
            Some(b',') => self.fail(LexError::MalformedFloat),
            _ => Right(State::AlphaNumeric),
        }
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.input.get(self.pos).copied()?;
        self.pos += 1;
        Some(b)
    }

    /// Step back over the byte last returned by `advance`.
    fn backup(&mut self) {
        self.pos -= 1;
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn accept_digits(&mut self) {
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
    }

    fn current(&self) -> &'a [u8] {
        &self.input[self.start..self.pos]
    }

    fn emit(&mut self, kind: TokenKind) -> Token<'a> {
        let token = Token {
            kind,
            value: self.current(),
            position: self.start,
        };

        self.start = self.pos;
        token
    }

    fn emit_then_text(&mut self, kind: TokenKind) -> Step<'a> {
        Left((self.emit(kind), Some(State::Text)))
    }

    fn fail(&mut self, err: LexError) -> Step<'a> {
        Left((self.emit(TokenKind::Error(err)), None))
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}
