//! A client for the HBCI/FinTS home-banking protocol.
//!
//! The protocol exchanges text-delimited, escape-aware messages with a bank,
//! wrapped in a signed and encrypted dialog. This crate provides the
//! protocol engine as a set of layers that can be driven without I/O, and a
//! dialog state machine running them over a transport.
//!
//! Most users should begin with [`avec::Dialog`], which synchronises a
//! client, opens dialogs and sends messages. Applications needing finer
//! control can decode and assemble messages with the [`sans`] module.
//!
//! ## Cargo Features
//!
//! The following crate feature flags are available:
//!
//! - `serde`: derive `Deserialize` for the dialog configuration.

// Derive macros refer to this crate by name.
extern crate self as hbci;

pub mod avec;
pub mod sans;
