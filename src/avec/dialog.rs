//! The dialog state machine.
//!
//! A [`Dialog`] sequences the messages of a session with a bank:
//! synchronising the client system id, opening a dialog, sending a message
//! and closing the dialog again. Each operation issues one request at a time
//! and blocks until its response arrives.

use std::fmt;

use chrono::Local;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::sans::{
    message::{BankMessage, EncryptedMessage, Message, MessageError},
    registry::Registry,
    segment::Segment,
    segments::{
        acknowledgement::AcknowledgementError,
        dialog::{DialogEnd, Identification, ProcessingPreparation, Synchronisation},
        security::{EncryptedData, EncryptionHeader, INITIAL_CLIENT_SYSTEM_ID, KeyName},
    },
};

use super::{
    config::DialogConfig,
    provider::{CryptoProvider, ProviderError, SignatureProvider},
    session::Session,
    transport::{Request, Transport, TransportError},
};

/// Number of times a dialog may switch its security function while
/// initialising.
pub const MAX_RENEGOTIATIONS: usize = 3;

/// Customer and user id of anonymous access.
pub const ANONYMOUS_CUSTOMER_ID: &str = "9999999999";

/// Where a dialog stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    /// No client system id is known.
    Unestablished,
    Synchronizing,
    /// A client system id is known and no dialog is open.
    Established,
    Initializing,
    /// A dialog is open and ready for a message.
    Active,
    Terminating,
}

/// The step of a dialog an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Synchronizing,
    Initializing,
    Sending,
    Ending,
    AnonymousInitializing,
    AnonymousEnding,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Synchronizing => "synchronizing client system id",
            Self::Initializing => "initializing dialog",
            Self::Sending => "sending message",
            Self::Ending => "ending dialog",
            Self::AnonymousInitializing => "initializing anonymous dialog",
            Self::AnonymousEnding => "ending anonymous dialog",
        })
    }
}

/// Errors occurring in a dialog.
#[derive(Debug, Error)]
pub enum DialogError {
    #[error("Transport failed while {phase}: {source}")]
    Transport {
        phase: Phase,
        source: TransportError,
    },
    #[error("Security provider failed while {phase}: {source}")]
    Provider {
        phase: Phase,
        source: ProviderError,
    },
    #[error("Malformed bank message while {phase}: {source}")]
    Message {
        phase: Phase,
        source: MessageError,
    },
    /// The bank returned error-class acknowledgements.
    #[error(transparent)]
    Acknowledgement(#[from] AcknowledgementError),
    #[error("Bank message lacks {id} while {phase}")]
    MissingSegment { phase: Phase, id: &'static str },
    /// The bank kept advertising security functions already tried.
    #[error("Security function renegotiation did not settle, tried {}", .attempted.join(", "))]
    Renegotiation { attempted: Vec<String> },
    #[error("Precondition violated: {0}")]
    PreconditionViolated(&'static str),
    /// An operation failed, and so did ending the dialog afterwards.
    #[error("{original}\nAdditionally, ending the dialog failed: {teardown}")]
    Teardown {
        original: Box<DialogError>,
        teardown: Box<DialogError>,
    },
}

/// Segments a client sends within an open dialog.
#[derive(Debug, Default)]
pub struct ClientMessage {
    segments: Vec<Box<dyn Segment>>,
}

impl ClientMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, segment: impl Segment) {
        self.segments.push(Box::new(segment));
    }

    pub fn with(mut self, segment: impl Segment) -> Self {
        self.push(segment);
        self
    }
}

/// Failures while reading a response, before the phase is known.
enum Inbound {
    Message(MessageError),
    Provider(ProviderError),
}

impl From<MessageError> for Inbound {
    fn from(err: MessageError) -> Self {
        Self::Message(err)
    }
}

impl Inbound {
    fn in_phase(self, phase: Phase) -> DialogError {
        match self {
            Self::Message(source) => DialogError::Message { phase, source },
            Self::Provider(source) => DialogError::Provider { phase, source },
        }
    }
}

/// A client's dialogs with one bank.
pub struct Dialog<'r, S, C, T> {
    config: DialogConfig,
    session: Session,
    state: DialogState,
    registry: &'r Registry,
    signer: S,
    crypto: C,
    transport: T,
}

impl<'r, S, C, T> Dialog<'r, S, C, T>
where
    S: SignatureProvider,
    C: CryptoProvider,
    T: Transport,
{
    pub fn new(
        config: DialogConfig,
        registry: &'r Registry,
        mut signer: S,
        mut crypto: C,
        transport: T,
    ) -> Self {
        let session = Session::new(&config);

        signer.set_client_system_id(&session.client_system_id);
        signer.set_security_function(&session.security_function);
        crypto.set_client_system_id(&session.client_system_id);
        crypto.set_security_function(&session.security_function);

        let state = if session.is_synchronised() {
            DialogState::Established
        } else {
            DialogState::Unestablished
        };

        Self {
            config,
            session,
            state,
            registry,
            signer,
            crypto,
            transport,
        }
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &DialogConfig {
        &self.config
    }

    pub fn signer_mut(&mut self) -> &mut S {
        &mut self.signer
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Obtain a new client system id, storing it and the parameter data the
    /// bank sends along.
    pub fn sync_client_system_id(&mut self) -> Result<String, DialogError> {
        let previous = self.session.client_system_id.clone();

        self.state = DialogState::Synchronizing;
        self.session.reset_dialog();
        self.set_client_system_id(INITIAL_CLIENT_SYSTEM_ID.into());

        let mut message = self.next_message();
        message.push(self.identification());
        message.push(self.processing_preparation());
        message.push(Synchronisation::new_client_system_id());

        let result = self
            .exchange(message, Phase::Synchronizing)
            .and_then(|response| self.synchronised(&response));

        let result = self.teardown(result);

        // The sentinel only stands in for the one exchange.
        if !self.session.is_synchronised() && previous != INITIAL_CLIENT_SYSTEM_ID {
            self.set_client_system_id(previous);
            self.closed();
        }

        result
    }

    fn synchronised(&mut self, response: &BankMessage) -> Result<String, DialogError> {
        self.session.update_parameters(response);

        let client_system_id = Session::synchronised_id(response)
            .ok_or(DialogError::MissingSegment {
                phase: Phase::Synchronizing,
                id: "HISYN",
            })?
            .to_owned();

        self.set_client_system_id(client_system_id.clone());
        info!(%client_system_id, "client system id established");

        Ok(client_system_id)
    }

    /// Open a dialog, synchronising first if no client system id is known.
    ///
    /// If the bank lists a different security function first than the one
    /// in use, the dialog is closed and opened again with that function.
    pub fn init(&mut self) -> Result<(), DialogError> {
        if self.state == DialogState::Active {
            Err(DialogError::PreconditionViolated("dialog is already initialized"))?;
        }

        let mut attempted = Vec::new();

        loop {
            if !self.session.is_synchronised() {
                self.sync_client_system_id()?;
            }

            attempted.push(self.session.security_function.clone());

            let response = self.open()?;

            let supported = response.supported_security_functions();
            let Some(advertised) = supported.first() else {
                return Ok(());
            };

            if *advertised == self.session.security_function {
                return Ok(());
            }

            info!(
                from = %self.session.security_function,
                to = %advertised,
                "renegotiating security function"
            );

            self.end()?;

            if attempted.contains(advertised) || attempted.len() > MAX_RENEGOTIATIONS {
                return Err(DialogError::Renegotiation { attempted });
            }

            self.set_security_function(advertised.clone());
        }
    }

    fn open(&mut self) -> Result<BankMessage, DialogError> {
        self.state = DialogState::Initializing;
        self.session.reset_dialog();

        let mut message = self.next_message();
        message.push(self.identification());
        message.push(self.processing_preparation());

        match self.exchange(message, Phase::Initializing) {
            Ok(response) => {
                self.session.update_parameters(&response);
                self.state = DialogState::Active;
                Ok(response)
            }
            Err(err) => self.teardown(Err(err)),
        }
    }

    /// Send a message within the open dialog, then close the dialog.
    pub fn send_message(&mut self, request: ClientMessage) -> Result<BankMessage, DialogError> {
        if self.state != DialogState::Active {
            Err(DialogError::PreconditionViolated("dialog is not initialized"))?;
        }

        let mut message = self.next_message();
        for segment in request.segments {
            message.push_boxed(segment);
        }

        let result = self.exchange(message, Phase::Sending);

        self.teardown(result)
    }

    /// Close the open dialog. Error-class acknowledgements are reported, the
    /// dialog is closed regardless.
    pub fn end(&mut self) -> Result<(), DialogError> {
        self.state = DialogState::Terminating;

        let mut message = self.next_message();
        message.push(DialogEnd::new(self.session.dialog_id.as_str()));

        let result = self.exchange(message, Phase::Ending);
        self.closed();

        result.map(|_| ())
    }

    /// Open a dialog without identifying the customer, such as for reading
    /// bank parameters.
    pub fn anonymous_init(&mut self) -> Result<BankMessage, DialogError> {
        self.state = DialogState::Initializing;
        self.session.reset_dialog();

        let mut message = self.next_message();
        message.push(Identification::new(
            self.session.bank.clone(),
            ANONYMOUS_CUSTOMER_ID,
            INITIAL_CLIENT_SYSTEM_ID,
            false,
        ));
        message.push(self.processing_preparation());

        match self.exchange_plain(message, Phase::AnonymousInitializing) {
            Ok(response) => {
                self.session.bpd.update(&response);
                self.state = DialogState::Active;
                Ok(response)
            }
            Err(err) => self.teardown_with(Err(err), Self::anonymous_end),
        }
    }

    pub fn anonymous_end(&mut self) -> Result<(), DialogError> {
        self.state = DialogState::Terminating;

        let mut message = self.next_message();
        message.push(DialogEnd::new(self.session.dialog_id.as_str()));

        let result = self.exchange_plain(message, Phase::AnonymousEnding);
        self.closed();

        result.map(|_| ())
    }

    fn closed(&mut self) {
        self.session.reset_dialog();

        self.state = if self.session.is_synchronised() {
            DialogState::Established
        } else {
            DialogState::Unestablished
        };
    }

    /// Close the dialog after an operation, if one was opened, reporting a
    /// failure to close alongside any failure of the operation.
    fn teardown<R>(&mut self, result: Result<R, DialogError>) -> Result<R, DialogError> {
        self.teardown_with(result, Self::end)
    }

    fn teardown_with<R>(
        &mut self,
        result: Result<R, DialogError>,
        end: fn(&mut Self) -> Result<(), DialogError>,
    ) -> Result<R, DialogError> {
        if !self.session.in_dialog() {
            self.closed();
            return result;
        }

        match (result, end(self)) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) | (Err(err), Ok(())) => Err(err),
            (Err(original), Err(teardown)) => Err(DialogError::Teardown {
                original: Box::new(original),
                teardown: Box::new(teardown),
            }),
        }
    }

    fn set_client_system_id(&mut self, client_system_id: String) {
        self.signer.set_client_system_id(&client_system_id);
        self.crypto.set_client_system_id(&client_system_id);
        self.session.client_system_id = client_system_id;
    }

    fn set_security_function(&mut self, security_function: String) {
        self.signer.set_security_function(&security_function);
        self.crypto.set_security_function(&security_function);
        self.session.security_function = security_function;
    }

    fn next_message(&mut self) -> Message {
        let number = self.session.next_message_number();
        Message::new(self.session.dialog_id.as_str(), number)
    }

    fn identification(&self) -> Identification {
        Identification::new(
            self.session.bank.clone(),
            self.session.customer_id.as_str(),
            self.session.client_system_id.as_str(),
            true,
        )
    }

    fn processing_preparation(&self) -> ProcessingPreparation {
        ProcessingPreparation::new(
            self.session.bpd.version,
            self.session.upd.version,
            self.session.language,
            self.session.product_name.as_str(),
            self.session.product_version.as_str(),
        )
    }

    /// Sign, encrypt and send a message, returning the decrypted response.
    fn exchange(&mut self, mut message: Message, phase: Phase) -> Result<BankMessage, DialogError> {
        self.signer
            .sign_message(&mut message)
            .map_err(|source| DialogError::Provider { phase, source })?;

        let mut encrypted = self
            .encrypt(&mut message)
            .map_err(|source| DialogError::Provider { phase, source })?;

        let body = encrypted.marshal().to_vec();

        self.round_trip(body, &message, phase)
    }

    /// Send a message unsigned and unencrypted.
    fn exchange_plain(
        &mut self,
        mut message: Message,
        phase: Phase,
    ) -> Result<BankMessage, DialogError> {
        let body = message.marshal().to_vec();

        self.round_trip(body, &message, phase)
    }

    fn encrypt(&mut self, message: &mut Message) -> Result<EncryptedMessage, ProviderError> {
        let payload = message.marshal_payload();
        let data = self.crypto.encrypt(&payload)?;

        let mut header = EncryptionHeader::pin_tan(
            self.session.client_system_id.as_str(),
            KeyName::encryption(self.session.bank.clone(), self.session.user_id.as_str()),
            Local::now().naive_local(),
        );
        self.crypto.write_encryption_header(&mut header);

        Ok(EncryptedMessage::new(
            message.header().clone(),
            header,
            EncryptedData::new(data),
            message.end().clone(),
        ))
    }

    fn round_trip(
        &mut self,
        body: Vec<u8>,
        message: &Message,
        phase: Phase,
    ) -> Result<BankMessage, DialogError> {
        debug!(
            %phase,
            dialog_id = message.dialog_id(),
            message_number = message.message_number(),
            size = body.len(),
            "sending message"
        );

        let response = self
            .transport
            .send(Request {
                url: self.config.url.clone(),
                body,
            })
            .map_err(|source| DialogError::Transport { phase, source })?;

        let crypto = &mut self.crypto;
        let response = BankMessage::decode(self.registry, &response.body, |data| {
            crypto.decrypt(data).map_err(Inbound::Provider)
        })
        .map_err(|err| err.in_phase(phase))?;

        debug!(
            %phase,
            dialog_id = %response.dialog_id,
            message_number = response.message_number,
            acknowledgements = response.acknowledgements.len(),
            "received message"
        );

        self.session.dialog_id = response.dialog_id.clone();

        for warning in response.warnings() {
            warn!(%phase, code = warning.code, text = %warning.text, "bank returned warning");
        }

        if let Some(errors) = response.errors() {
            Err(errors)?;
        }

        Ok(response)
    }
}
