//! Typed segments and the data element groups they are built from.
//!
//! Request segments (`HK..`, `HN..`) offer constructors filling in the values
//! a PIN/TAN client sends. Response segments (`HI..`) that exist in several
//! versions are enums over their versions; see
//! [`versioned_segment!`](super::segment).

pub mod acknowledgement;
pub mod dialog;
pub mod envelope;
pub mod parameters;
pub mod security;
