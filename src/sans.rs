//! The protocol engine, without I/O.
//!
//! This module turns bytes into typed segments and back. It holds no
//! connection, session or clock of its own; see [`crate::avec`] for a dialog
//! driving it over a transport.
//!
//! # Architecture
//!
//! Decoding proceeds in layers, each usable on its own:
//!
//! - The [`lexer`] splits input into tokens. It is a pull-based finite-state
//! machine, and stops at the first malformed construct.
//!
//! - The [`extract`] module cuts the token stream into raw segments, each
//! ending with its end marker.
//!
//! - A [`registry`] maps the identifier and version in a segment's header to
//! a decoder for a typed segment, as defined in [`segments`]. Typed segments
//! are built from the scalars and groups of the [`element`] module.
//!
//! - The [`message`] module ties these together, decoding whole responses
//! and assembling numbered, sized requests.
//!
//! Segments the registry has no decoder for are skipped when decoding a
//! message, but are an error when decoded on their own.

pub mod element;
pub mod extract;
pub mod lexer;
pub mod message;
pub mod registry;
pub mod segment;
pub mod segments;
