//! Dispatch from segment identifier and version to a typed decoder.
//!
//! A [`Registry`] is assembled once through a [`RegistryBuilder`] and is
//! read-only afterwards; share it by reference.

use std::collections::HashMap;

use thiserror::Error;

use super::{
    element::DecodeError,
    segment::{DecodeSegment, Segment, SegmentHeader, VersionedSegmentId},
    segments::{
        acknowledgement::{MessageAcknowledgement, SegmentAcknowledgement},
        dialog::{
            DialogEnd, Identification, ProcessingPreparation, Synchronisation,
            SynchronisationResponse,
        },
        envelope::{MessageEnd, MessageHeader},
        parameters::{AccountInformation, BankParameters, UserParameters},
        security::{EncryptedData, EncryptionHeader, SignatureEnd, SignatureHeader},
    },
};

/// A function decoding the raw bytes of a segment.
pub type Decoder = fn(&[u8]) -> Result<Box<dyn Segment>, DecodeError>;

/// An error registering or looking up a decoder.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A decoder is already registered for this segment.
    #[error("Segment already in index: {0}")]
    Duplicate(VersionedSegmentId),
    /// No decoder is registered for this segment.
    #[error("Segment not in index: {0}")]
    NotIndexed(VersionedSegmentId),
}

impl From<RegistryError> for DecodeError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Duplicate(id) | RegistryError::NotIndexed(id) => Self::NotIndexed(id),
        }
    }
}

/// Collects decoders for a [`Registry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    decoders: HashMap<VersionedSegmentId, Decoder>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoder under every identifier and version a segment
    /// type lists. Nothing is registered if any of them is already taken.
    pub fn register<T: DecodeSegment>(&mut self) -> Result<&mut Self, RegistryError> {
        let ids = T::INDEX
            .iter()
            .map(|&(id, version)| VersionedSegmentId::new(id, version))
            .collect::<Vec<_>>();

        if let Some(id) = ids.iter().find(|id| self.decoders.contains_key(*id)) {
            Err(RegistryError::Duplicate(id.clone()))?;
        }

        for id in ids {
            self.decoders.insert(id, decode_boxed::<T>);
        }

        Ok(self)
    }

    pub fn build(self) -> Registry {
        Registry {
            decoders: self.decoders,
        }
    }
}

fn decode_boxed<T: DecodeSegment>(raw: &[u8]) -> Result<Box<dyn Segment>, DecodeError> {
    Ok(Box::new(T::decode_segment(raw)?))
}

/// A read-only table of segment decoders.
#[derive(Debug)]
pub struct Registry {
    decoders: HashMap<VersionedSegmentId, Decoder>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// A registry of every segment this crate knows.
    pub fn standard() -> Result<Self, RegistryError> {
        let mut builder = Self::builder();

        builder
            .register::<MessageHeader>()?
            .register::<MessageEnd>()?
            .register::<SignatureHeader>()?
            .register::<SignatureEnd>()?
            .register::<EncryptionHeader>()?
            .register::<EncryptedData>()?
            .register::<Identification>()?
            .register::<ProcessingPreparation>()?
            .register::<Synchronisation>()?
            .register::<DialogEnd>()?
            .register::<MessageAcknowledgement>()?
            .register::<SegmentAcknowledgement>()?
            .register::<BankParameters>()?
            .register::<UserParameters>()?
            .register::<AccountInformation>()?
            .register::<SynchronisationResponse>()?;

        Ok(builder.build())
    }

    pub fn is_indexed(&self, id: &VersionedSegmentId) -> bool {
        self.decoders.contains_key(id)
    }

    pub fn decoder(&self, id: &VersionedSegmentId) -> Result<Decoder, RegistryError> {
        self.decoders
            .get(id)
            .copied()
            .ok_or_else(|| RegistryError::NotIndexed(id.clone()))
    }

    /// Decode a raw segment with the decoder registered for its header.
    pub fn decode(&self, raw: &[u8]) -> Result<Box<dyn Segment>, DecodeError> {
        let id = SegmentHeader::peek(raw)?.versioned_id();
        let decoder = self.decoder(&id)?;

        decoder(raw)
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}
