//! JSON codec using `serde_json`.
//!
//! Used by the single-shot command line mode to print diagnostics as a JSON
//! array instead of a framed response line.
//!
//! # Example
//!
//! ```
//! use compile_service::codec::JsonCodec;
//! use compile_service::diagnostic::{DiagnosticKind, DiagnosticRecord};
//!
//! let records = vec![DiagnosticRecord::new(DiagnosticKind::Error, "boom")];
//! let json = JsonCodec::encode(&records).unwrap();
//! let decoded: Vec<DiagnosticRecord> = JsonCodec::decode(&json).unwrap();
//! assert_eq!(decoded, records);
//! ```

use crate::error::Result;

/// JSON codec for structured output.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(value)?)
    }

    /// Decode JSON text into a value.
    ///
    /// # Errors
    ///
    /// Returns error if the text is not valid JSON for type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
        Ok(serde_json::from_str(text)?)
    }
}
