//! Signing and encryption of messages.
//!
//! The dialog consumes both capabilities through the [`SignatureProvider`]
//! and [`CryptoProvider`] traits. The PIN/TAN implementations here sign by
//! placing the PIN in the signature and encrypt by framing the payload
//! unchanged, as the protocol prescribes for PIN/TAN access.

use chrono::Local;
use thiserror::Error;

use crate::sans::{
    message::Message,
    segments::{
        parameters::BankId,
        security::{
            EncryptionHeader, INITIAL_CLIENT_SYSTEM_ID, KeyName, SECURITY_FUNCTION_PIN_TAN,
            SignatureEnd, SignatureHeader, UserDefinedSignature,
        },
    },
};

/// Errors occurring while signing, encrypting or decrypting.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider is not ready for the requested operation.
    #[error("Precondition violated: {0}")]
    PreconditionViolated(&'static str),
    #[error("Signing failed: {0}")]
    Signature(String),
    #[error("Encryption failed: {0}")]
    Crypto(String),
}

/// Signs messages.
pub trait SignatureProvider {
    fn set_client_system_id(&mut self, client_system_id: &str);

    fn set_security_function(&mut self, security_function: &str);

    /// Enclose the body of `message` in a signature header and end.
    fn sign_message(&mut self, message: &mut Message) -> Result<(), ProviderError>;
}

/// Encrypts requests and decrypts responses.
pub trait CryptoProvider {
    fn set_client_system_id(&mut self, client_system_id: &str);

    fn set_security_function(&mut self, security_function: &str);

    fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, ProviderError>;

    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, ProviderError>;

    /// Describe the encryption in the header accompanying the encrypted data.
    fn write_encryption_header(&self, header: &mut EncryptionHeader);
}

/// Signs with a PIN and, for two-step security functions, a TAN.
#[derive(Debug, Clone)]
pub struct PinTanSignatureProvider {
    bank: BankId,
    user_id: String,
    pin: Option<String>,
    tan: Option<String>,
    client_system_id: String,
    security_function: String,
    control_reference: u32,
}

impl PinTanSignatureProvider {
    pub fn new(bank: BankId, user_id: impl Into<String>) -> Self {
        Self {
            bank,
            user_id: user_id.into(),
            pin: None,
            tan: None,
            client_system_id: INITIAL_CLIENT_SYSTEM_ID.into(),
            security_function: SECURITY_FUNCTION_PIN_TAN.into(),
            control_reference: 0,
        }
    }

    pub fn with_pin(mut self, pin: impl Into<String>) -> Self {
        self.pin = Some(pin.into());
        self
    }

    pub fn set_pin(&mut self, pin: impl Into<String>) {
        self.pin = Some(pin.into());
    }

    /// Use a TAN for the next signature only.
    pub fn set_tan(&mut self, tan: impl Into<String>) {
        self.tan = Some(tan.into());
    }

    pub fn security_function(&self) -> &str {
        &self.security_function
    }
}

impl SignatureProvider for PinTanSignatureProvider {
    fn set_client_system_id(&mut self, client_system_id: &str) {
        self.client_system_id = client_system_id.into();
    }

    fn set_security_function(&mut self, security_function: &str) {
        self.security_function = security_function.into();
    }

    fn sign_message(&mut self, message: &mut Message) -> Result<(), ProviderError> {
        let Some(pin) = self.pin.clone() else {
            Err(ProviderError::PreconditionViolated("no PIN configured"))?
        };

        self.control_reference = self.control_reference.wrapping_add(1);
        let control_reference = self.control_reference.to_string();

        let header = SignatureHeader::pin_tan(
            self.security_function.as_str(),
            control_reference.as_str(),
            self.client_system_id.as_str(),
            KeyName::signing(self.bank.clone(), self.user_id.as_str()),
            Local::now().naive_local(),
        );

        let end = SignatureEnd::new(
            control_reference,
            UserDefinedSignature {
                pin,
                tan: self.tan.take(),
            },
        );

        message.sign(header, end);

        Ok(())
    }
}

/// Frames payloads unchanged, with the dummy key PIN/TAN prescribes.
#[derive(Debug, Clone)]
pub struct PinTanCryptoProvider {
    bank: BankId,
    user_id: String,
    client_system_id: String,
    security_function: String,
}

impl PinTanCryptoProvider {
    pub fn new(bank: BankId, user_id: impl Into<String>) -> Self {
        Self {
            bank,
            user_id: user_id.into(),
            client_system_id: INITIAL_CLIENT_SYSTEM_ID.into(),
            security_function: SECURITY_FUNCTION_PIN_TAN.into(),
        }
    }

    pub fn security_function(&self) -> &str {
        &self.security_function
    }
}

impl CryptoProvider for PinTanCryptoProvider {
    fn set_client_system_id(&mut self, client_system_id: &str) {
        self.client_system_id = client_system_id.into();
    }

    fn set_security_function(&mut self, security_function: &str) {
        self.security_function = security_function.into();
    }

    fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, ProviderError> {
        Ok(plaintext.to_vec())
    }

    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, ProviderError> {
        Ok(ciphertext.to_vec())
    }

    fn write_encryption_header(&self, header: &mut EncryptionHeader) {
        header.identification.client_system_id = self.client_system_id.clone();
        header.key_name = KeyName::encryption(self.bank.clone(), self.user_id.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> PinTanSignatureProvider {
        PinTanSignatureProvider::new(BankId::new(280, "12345678"), "user")
    }

    #[test]
    fn signing_requires_pin() {
        let mut message = Message::new("0", 1);

        assert_eq!(
            signer().sign_message(&mut message),
            Err(ProviderError::PreconditionViolated("no PIN configured"))
        );
        assert!(!message.is_signed());
    }

    #[test]
    fn signature_pairs_header_and_end() {
        let mut signer = signer().with_pin("secret");
        signer.set_security_function("942");
        signer.set_tan("123456");

        let mut message = Message::new("0", 1);
        signer.sign_message(&mut message).unwrap();

        let header = message.signature_header().unwrap();
        let end = message.signature_end().unwrap();

        assert_eq!(header.security_function, "942");
        assert_eq!(header.control_reference, end.control_reference);
        assert_eq!(
            end.signature,
            Some(UserDefinedSignature {
                pin: "secret".into(),
                tan: Some("123456".into()),
            })
        );

        // The TAN is spent.
        signer.sign_message(&mut message).unwrap();
        assert_eq!(
            message.signature_end().and_then(|e| e.signature.as_ref()).and_then(|s| s.tan.clone()),
            None
        );
    }
}
