//! Splitting of a message into raw segments.

use std::collections::HashMap;

use thiserror::Error;

use super::lexer::{GROUP_DATA_ELEMENT_SEPARATOR, LexError, Lexer, TokenKind};

/// Bytes of input shown on either side of a syntax error.
const SNIPPET_RADIUS: usize = 16;

/// An error extracting segments from a message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// The input violates the wire grammar.
    #[error("Syntax error at position {position}: {error} (near {snippet:?})")]
    Syntax {
        error: LexError,
        position: usize,
        snippet: String,
    },
    /// Input ended after content that was never closed by a segment end marker.
    #[error("Unterminated segment at position {position}")]
    UnterminatedSegment { position: usize },
}

/// Extracts raw segments from a message, caching the result.
#[derive(Debug, Clone)]
pub struct SegmentExtractor<'a> {
    input: &'a [u8],
    segments: Option<Vec<Vec<u8>>>,
}

impl<'a> SegmentExtractor<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            segments: None,
        }
    }

    /// Split the input into segments, each including its end marker.
    ///
    /// The input is scanned once; later calls return copies of the cached
    /// result.
    pub fn extract(&mut self) -> Result<Vec<Vec<u8>>, ExtractError> {
        if let Some(segments) = &self.segments {
            return Ok(segments.clone());
        }

        let mut segments = Vec::new();
        let mut current = Vec::new();
        let mut current_start = 0;

        for token in Lexer::new(self.input) {
            match token.kind() {
                TokenKind::Error(error) => {
                    Err(ExtractError::Syntax {
                        error,
                        position: token.position(),
                        snippet: self.snippet(token.position()),
                    })?;
                }
                TokenKind::Eof => break,
                TokenKind::SegmentEndMarker => {
                    current.extend_from_slice(token.value());
                    segments.push(core::mem::take(&mut current));
                }
                _ => {
                    if current.is_empty() {
                        current_start = token.position();
                    }

                    current.extend_from_slice(token.value());
                }
            }
        }

        if !current.is_empty() {
            Err(ExtractError::UnterminatedSegment {
                position: current_start,
            })?;
        }

        self.segments = Some(segments.clone());

        Ok(segments)
    }

    /// The first extracted segment starting with `id`.
    pub fn find_segment(&self, id: &str) -> Option<Vec<u8>> {
        self.segments
            .as_ref()?
            .iter()
            .find(|s| s.starts_with(id.as_bytes()))
            .cloned()
    }

    /// All extracted segments whose identifier, the bytes before the first
    /// group separator, equals `id`.
    pub fn find_segments(&self, id: &str) -> Vec<Vec<u8>> {
        let Some(segments) = &self.segments else {
            return Vec::new();
        };

        let mut by_id: HashMap<&[u8], Vec<Vec<u8>>> = HashMap::new();

        for segment in segments {
            let key = segment
                .split(|&b| b == GROUP_DATA_ELEMENT_SEPARATOR)
                .next()
                .unwrap_or_default();

            by_id.entry(key).or_default().push(segment.clone());
        }

        by_id.remove(id.as_bytes()).unwrap_or_default()
    }

    fn snippet(&self, position: usize) -> String {
        let start = position.saturating_sub(SNIPPET_RADIUS);
        let end = (position + SNIPPET_RADIUS).min(self.input.len());

        String::from_utf8_lossy(self.input.get(start..end).unwrap_or_default()).into_owned()
    }
}
