//! Codec module - payload serialization.
//!
//! - [`DiagnosticCodec`] - the separator-delimited diagnostic token stream
//!   carried inside `ERRORS` responses
//! - [`JsonCodec`] - JSON output for the single-shot command line mode
//!
//! # Design
//!
//! Codecs are marker structs with static methods rather than trait objects,
//! so the codec is picked at compile time.

mod diagnostics;
mod json;

pub use diagnostics::{DiagnosticCodec, NULL_VALUE};
pub use json::JsonCodec;
