//! Whole messages: decoding a response into typed segments, and assembling
//! requests with numbered segments and a computed size.

use std::collections::HashMap;

use thiserror::Error;
use tracing::trace;

use super::{
    element::{DecodeError, Digits},
    extract::{ExtractError, SegmentExtractor},
    registry::Registry,
    segment::{Segment, SegmentHeader, SegmentType, VersionedSegmentId},
    segments::{
        acknowledgement::{
            Acknowledgement, AcknowledgementError, MessageAcknowledgement,
            SUPPORTED_SECURITY_FUNCTIONS, SegmentAcknowledgement,
        },
        envelope::{MessageEnd, MessageHeader},
        security::{EncryptedData, EncryptionHeader, SignatureEnd, SignatureHeader},
    },
};

/// An error decoding a message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// The message lacks a mandatory segment, or holds one of an unexpected
    /// type.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// The typed segments of a message, in wire order.
#[derive(Debug, Default)]
pub struct DecodedMessage {
    segments: Vec<Box<dyn Segment>>,
    index: HashMap<String, Vec<usize>>,
    seen: Vec<VersionedSegmentId>,
}

impl DecodedMessage {
    /// The first decoded segment with identifier `id`.
    pub fn segment_by_id(&self, id: &str) -> Option<&dyn Segment> {
        self.segments_by_id(id).next()
    }

    /// All decoded segments with identifier `id`, in wire order.
    pub fn segments_by_id<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a dyn Segment> {
        self.index
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|&i| self.segments.get(i))
            .map(Box::as_ref)
    }

    /// The first decoded segment of type `T`.
    pub fn find<T: Segment>(&self) -> Option<&T> {
        self.segments.iter().find_map(|s| s.as_ref().downcast_ref())
    }

    /// All decoded segments of type `T`, in wire order.
    pub fn find_all<T: Segment>(&self) -> impl Iterator<Item = &T> {
        self.segments.iter().filter_map(|s| s.as_ref().downcast_ref())
    }

    pub fn segments(&self) -> impl Iterator<Item = &dyn Segment> {
        self.segments.iter().map(Box::as_ref)
    }

    /// Identifiers and versions of every segment in the message, decoded or
    /// not, in wire order.
    pub fn seen(&self) -> &[VersionedSegmentId] {
        &self.seen
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Decode every segment of a message that `registry` has a decoder for.
///
/// Segments without a decoder are skipped. Any other failure aborts the
/// whole message.
pub fn unmarshal(registry: &Registry, raw: &[u8]) -> Result<DecodedMessage, MessageError> {
    let mut message = DecodedMessage::default();

    for segment in SegmentExtractor::new(raw).extract()? {
        let id = SegmentHeader::peek(&segment)?.versioned_id();
        message.seen.push(id.clone());

        if !registry.is_indexed(&id) {
            trace!(%id, "skipping segment without decoder");
            continue;
        }

        let decoded = registry.decode(&segment)?;

        message
            .index
            .entry(id.id)
            .or_default()
            .push(message.segments.len());
        message.segments.push(decoded);
    }

    Ok(message)
}

/// Serialize a header followed by the already serialized `rest`, writing
/// the total size into the header.
fn assemble(header: &mut MessageHeader, rest: Vec<u8>) -> Vec<u8> {
    // The size field has a fixed width, so the header's length does not
    // depend on its value.
    header.size = Digits(0);
    let size = header.encode().len() + rest.len();
    header.size = Digits(size as u64);

    let mut bytes = header.encode();
    bytes.extend(rest);
    bytes
}

/// A plaintext request.
///
/// Segments are numbered and the message serialized on the first call to
/// [`marshal`](Self::marshal); the result is kept until the message is
/// changed.
#[derive(Debug)]
pub struct Message {
    header: MessageHeader,
    signature_header: Option<SignatureHeader>,
    body: Vec<Box<dyn Segment>>,
    signature_end: Option<SignatureEnd>,
    end: MessageEnd,
    marshaled: Option<Vec<u8>>,
}

impl Message {
    pub fn new(dialog_id: impl Into<String>, message_number: u32) -> Self {
        Self {
            header: MessageHeader::new(dialog_id, message_number),
            signature_header: None,
            body: Vec::new(),
            signature_end: None,
            end: MessageEnd::new(message_number),
            marshaled: None,
        }
    }

    /// Append a segment to the body.
    pub fn push(&mut self, segment: impl Segment) {
        self.push_boxed(Box::new(segment));
    }

    pub fn push_boxed(&mut self, segment: Box<dyn Segment>) {
        self.body.push(segment);
        self.marshaled = None;
    }

    /// Enclose the body in a signature.
    pub fn sign(&mut self, header: SignatureHeader, end: SignatureEnd) {
        self.signature_header = Some(header);
        self.signature_end = Some(end);
        self.marshaled = None;
    }

    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    pub fn end(&self) -> &MessageEnd {
        &self.end
    }

    pub fn body(&self) -> impl Iterator<Item = &dyn Segment> {
        self.body.iter().map(Box::as_ref)
    }

    pub fn signature_header(&self) -> Option<&SignatureHeader> {
        self.signature_header.as_ref()
    }

    pub fn signature_end(&self) -> Option<&SignatureEnd> {
        self.signature_end.as_ref()
    }

    pub fn is_signed(&self) -> bool {
        self.signature_header.is_some()
    }

    pub fn message_number(&self) -> u32 {
        self.header.message_number
    }

    pub fn dialog_id(&self) -> &str {
        &self.header.dialog_id
    }

    /// Number every segment with a single running counter starting at the
    /// header.
    fn number(&mut self) {
        let mut number = 1;
        self.header.header.number = number;

        if let Some(header) = &mut self.signature_header {
            number += 1;
            header.header.number = number;
        }

        for segment in &mut self.body {
            number += 1;
            segment.header_mut().number = number;
        }

        if let Some(end) = &mut self.signature_end {
            number += 1;
            end.header.number = number;
        }

        self.end.header.number = number + 1;
    }

    fn encode_inner(&self) -> Vec<u8> {
        let mut bytes = Vec::new();

        if let Some(header) = &self.signature_header {
            bytes.extend(header.encode());
        }

        for segment in &self.body {
            bytes.extend(segment.encode());
        }

        if let Some(end) = &self.signature_end {
            bytes.extend(end.encode());
        }

        bytes
    }

    /// The serialized message.
    pub fn marshal(&mut self) -> &[u8] {
        let marshaled = match self.marshaled.take() {
            Some(marshaled) => marshaled,
            None => {
                self.number();

                let mut rest = self.encode_inner();
                rest.extend(self.end.encode());

                assemble(&mut self.header, rest)
            }
        };

        self.marshaled.insert(marshaled)
    }

    /// The numbered segments between header and end, serialized. This is
    /// the plaintext an encrypted message carries.
    pub fn marshal_payload(&mut self) -> Vec<u8> {
        self.number();
        self.encode_inner()
    }
}

/// A request whose signed part is encrypted.
#[derive(Debug)]
pub struct EncryptedMessage {
    header: MessageHeader,
    encryption_header: EncryptionHeader,
    data: EncryptedData,
    end: MessageEnd,
    marshaled: Option<Vec<u8>>,
}

impl EncryptedMessage {
    /// Wrap encrypted data. `header` and `end` are those of the plaintext
    /// message, numbered.
    pub fn new(
        header: MessageHeader,
        encryption_header: EncryptionHeader,
        data: EncryptedData,
        end: MessageEnd,
    ) -> Self {
        Self {
            header,
            encryption_header,
            data,
            end,
            marshaled: None,
        }
    }

    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    pub fn encryption_header(&self) -> &EncryptionHeader {
        &self.encryption_header
    }

    pub fn data(&self) -> &EncryptedData {
        &self.data
    }

    pub fn marshal(&mut self) -> &[u8] {
        let marshaled = match self.marshaled.take() {
            Some(marshaled) => marshaled,
            None => {
                self.header.header.number = 1;

                let mut rest = self.encryption_header.encode();
                rest.extend(self.data.encode());
                rest.extend(self.end.encode());

                assemble(&mut self.header, rest)
            }
        };

        self.marshaled.insert(marshaled)
    }
}

/// A response, decrypted and decoded, with its acknowledgements classified.
#[derive(Debug)]
pub struct BankMessage {
    pub dialog_id: String,
    pub message_number: u32,
    pub decoded: DecodedMessage,
    pub acknowledgements: Vec<Acknowledgement>,
}

impl BankMessage {
    /// Classify the acknowledgements of a decoded response. `header` is the
    /// header of the message as received, which for an encrypted response
    /// is not part of `decoded`.
    pub fn new(header: &MessageHeader, decoded: DecodedMessage) -> Result<Self, MessageError> {
        let message_acknowledgement = decoded
            .segment_by_id(MessageAcknowledgement::ID)
            .ok_or_else(|| {
                MessageError::MalformedResponse("missing message acknowledgement".into())
            })?
            .downcast_ref::<MessageAcknowledgement>()
            .ok_or_else(|| {
                MessageError::MalformedResponse("unexpected message acknowledgement type".into())
            })?;

        let mut acknowledgements = message_acknowledgement.classified().collect::<Vec<_>>();

        for segment in decoded.segments_by_id(SegmentAcknowledgement::ID) {
            let segment = segment
                .downcast_ref::<SegmentAcknowledgement>()
                .ok_or_else(|| {
                    MessageError::MalformedResponse(
                        "unexpected segment acknowledgement type".into(),
                    )
                })?;

            acknowledgements.extend(segment.classified());
        }

        Ok(Self {
            dialog_id: header.dialog_id.clone(),
            message_number: header.message_number,
            decoded,
            acknowledgements,
        })
    }

    /// Decode a response, decrypting its encrypted data if there is any.
    ///
    /// A response without encrypted data is taken as is; banks reject some
    /// messages before decrypting them.
    pub fn decode<E>(
        registry: &Registry,
        raw: &[u8],
        decrypt: impl FnOnce(&[u8]) -> Result<Vec<u8>, E>,
    ) -> Result<Self, E>
    where
        E: From<MessageError>,
    {
        let outer = unmarshal(registry, raw)?;

        let header = outer
            .find::<MessageHeader>()
            .cloned()
            .ok_or_else(|| MessageError::MalformedResponse("missing message header".into()))?;

        let decoded = match outer.find::<EncryptedData>() {
            Some(data) => unmarshal(registry, &decrypt(&data.data.0)?)?,
            None => outer,
        };

        Ok(Self::new(&header, decoded)?)
    }

    pub fn errors(&self) -> Option<AcknowledgementError> {
        AcknowledgementError::from_acknowledgements(&self.acknowledgements)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Acknowledgement> {
        self.acknowledgements.iter().filter(|a| a.is_warning())
    }

    /// The security functions the bank supports, in the order it lists them.
    pub fn supported_security_functions(&self) -> Vec<String> {
        self.acknowledgements
            .iter()
            .filter(|a| a.code == SUPPORTED_SECURITY_FUNCTIONS)
            .flat_map(|a| a.params.iter().cloned())
            .collect()
    }

    pub fn find<T: Segment>(&self) -> Option<&T> {
        self.decoded.find()
    }

    pub fn find_all<T: Segment>(&self) -> impl Iterator<Item = &T> {
        self.decoded.find_all()
    }
}
