//! The protocol engine, with I/O.
//!
//! A [`Dialog`] drives the layers of [`crate::sans`] over a [`Transport`],
//! signing and encrypting through a [`SignatureProvider`] and a
//! [`CryptoProvider`]. The PIN/TAN providers and the raw socket transport in
//! this module cover common access; applications may supply their own.
//!
//! # Example
//!
//! ```
//! let registry = Registry::standard()?;
//! let config = DialogConfig::new("bank.example:3000", BankId::new(280, "12345678"), "user");
//!
//! let signer = PinTanSignatureProvider::new(config.bank.clone(), "user").with_pin("12345");
//! let crypto = PinTanCryptoProvider::new(config.bank.clone(), "user");
//!
//! let mut dialog = Dialog::new(config, &registry, signer, crypto, TcpTransport::new());
//! dialog.init()?;
//!
//! let response = dialog.send_message(ClientMessage::new().with(request))?;
//! ```

pub mod config;
pub mod dialog;
pub mod provider;
pub mod session;
pub mod transport;

pub use config::DialogConfig;
pub use dialog::{ClientMessage, Dialog, DialogError, DialogState};
pub use provider::{
    CryptoProvider, PinTanCryptoProvider, PinTanSignatureProvider, ProviderError,
    SignatureProvider,
};
pub use session::{Account, BankParameterData, Session, UserParameterData};
pub use transport::{Request, Response, TcpTransport, Transport, TransportError};
