//! Diagnostic payload codec.
//!
//! Every record is written as eight `KEY:VALUE` fields, each followed by the
//! separator. Records are concatenated with no boundary marker, and the end
//! sentinel is appended once after the last record:
//!
//! ```text
//! CODE:<c><sep>KIND:<k><sep>POSITION:<p><sep>LINE:<l><sep>START:<s><sep>
//! END:<e><sep>SOURCE:<src><sep>MESSAGE:<m><sep> ... <sentinel>
//! ```
//!
//! Missing code or source is written as `null`.
//!
//! # Example
//!
//! ```
//! use compile_service::codec::DiagnosticCodec;
//! use compile_service::config::Delimiters;
//! use compile_service::diagnostic::{DiagnosticKind, DiagnosticRecord};
//!
//! let delimiters = Delimiters::new("|").unwrap();
//! let record = DiagnosticRecord::new(DiagnosticKind::Error, "missing semicolon");
//!
//! let payload = DiagnosticCodec::encode(&[record.clone()], &delimiters);
//! assert!(payload.starts_with("CODE:null|KIND:ERROR|"));
//! assert!(payload.ends_with(delimiters.sentinel()));
//!
//! let body = payload.strip_suffix(delimiters.sentinel()).unwrap();
//! assert_eq!(DiagnosticCodec::decode(body, &delimiters).unwrap(), vec![record]);
//! ```

use std::fmt::Write;

use crate::config::Delimiters;
use crate::diagnostic::{DiagnosticKind, DiagnosticRecord};
use crate::error::{CompileServiceError, Result};

/// Text written for an absent code or source.
pub const NULL_VALUE: &str = "null";

/// Source wrapper emitted by javac's file objects.
const FILE_OBJECT_PREFIX: &str = "RegularFileObject[";

/// Fields of one record, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Code,
    Kind,
    Position,
    Line,
    Start,
    End,
    Source,
    Message,
}

impl Field {
    const ALL: [Field; 8] = [
        Field::Code,
        Field::Kind,
        Field::Position,
        Field::Line,
        Field::Start,
        Field::End,
        Field::Source,
        Field::Message,
    ];

    fn key(self) -> &'static str {
        match self {
            Field::Code => "CODE",
            Field::Kind => "KIND",
            Field::Position => "POSITION",
            Field::Line => "LINE",
            Field::Start => "START",
            Field::End => "END",
            Field::Source => "SOURCE",
            Field::Message => "MESSAGE",
        }
    }

    /// Split `KEY:value` into its field and value.
    fn split(token: &str) -> Option<(Field, &str)> {
        let (key, value) = token.split_once(':')?;
        Field::ALL
            .into_iter()
            .find(|f| f.key() == key)
            .map(|f| (f, value))
    }
}

/// Encoder/decoder for the flat diagnostic token stream.
pub struct DiagnosticCodec;

impl DiagnosticCodec {
    /// Encode records into a payload that ends with the sentinel.
    pub fn encode(records: &[DiagnosticRecord], delimiters: &Delimiters) -> String {
        let sep = delimiters.separator();
        let mut out = String::new();

        for record in records {
            push_field(&mut out, Field::Code, record.code.as_deref().unwrap_or(NULL_VALUE), sep);
            push_field(&mut out, Field::Kind, record.kind.as_str(), sep);
            push_field(&mut out, Field::Position, record.position, sep);
            push_field(&mut out, Field::Line, record.line, sep);
            push_field(&mut out, Field::Start, record.start, sep);
            push_field(&mut out, Field::End, record.end, sep);
            push_field(&mut out, Field::Source, record.source.as_deref().unwrap_or(NULL_VALUE), sep);
            push_field(&mut out, Field::Message, &record.message, sep);
        }

        out.push_str(delimiters.sentinel());
        out
    }

    /// Decode a payload body (sentinel already removed) back into records.
    ///
    /// A token without a known `KEY:` prefix continues the previous text
    /// field and is re-joined with the separator, so messages containing the
    /// separator survive. `CODE` starts a new record.
    ///
    /// # Errors
    ///
    /// Returns a protocol error for text before the first `CODE` field, an
    /// unparsable number, or a continuation of a numeric field.
    pub fn decode(body: &str, delimiters: &Delimiters) -> Result<Vec<DiagnosticRecord>> {
        let sep = delimiters.separator();
        let body = match body.strip_suffix(sep) {
            Some(b) => b,
            None if body.is_empty() => return Ok(Vec::new()),
            None => body,
        };

        let mut records: Vec<DiagnosticRecord> = Vec::new();
        let mut last: Option<Field> = None;

        for token in body.split(sep) {
            if let Some((field, value)) = Field::split(token) {
                if field == Field::Code {
                    records.push(DiagnosticRecord::new(DiagnosticKind::Other, String::new()));
                }
                let record = records.last_mut().ok_or_else(|| {
                    CompileServiceError::Protocol(format!(
                        "{} field before any CODE field",
                        field.key()
                    ))
                })?;
                set_field(record, field, value)?;
                last = Some(field);
                continue;
            }

            let (record, field) = match (records.last_mut(), last) {
                (Some(r), Some(f)) => (r, f),
                _ => {
                    return Err(CompileServiceError::Protocol(format!(
                        "Unexpected token before first record: {token:?}"
                    )))
                }
            };
            append_field(record, field, sep, token)?;
        }

        Ok(records)
    }
}

fn push_field(out: &mut String, field: Field, value: impl std::fmt::Display, sep: &str) {
    write!(out, "{}:{}{}", field.key(), value, sep).ok();
}

fn parse_number(field: Field, value: &str) -> Result<i64> {
    value.trim().parse().map_err(|_| {
        CompileServiceError::Protocol(format!("Invalid {} value: {value:?}", field.key()))
    })
}

fn optional(value: &str) -> Option<String> {
    (value != NULL_VALUE).then(|| value.to_string())
}

fn unwrap_source(value: &str) -> Option<String> {
    match value
        .strip_prefix(FILE_OBJECT_PREFIX)
        .and_then(|v| v.strip_suffix(']'))
    {
        Some(path) => Some(path.to_string()),
        None => optional(value),
    }
}

fn set_field(record: &mut DiagnosticRecord, field: Field, value: &str) -> Result<()> {
    match field {
        Field::Code => record.code = optional(value),
        Field::Kind => record.kind = value.parse().unwrap_or(DiagnosticKind::Other),
        Field::Position => record.position = parse_number(field, value)?,
        Field::Line => record.line = parse_number(field, value)?,
        Field::Start => record.start = parse_number(field, value)?,
        Field::End => record.end = parse_number(field, value)?,
        Field::Source => record.source = unwrap_source(value),
        Field::Message => record.message = value.to_string(),
    }
    Ok(())
}

fn append_field(record: &mut DiagnosticRecord, field: Field, sep: &str, token: &str) -> Result<()> {
    let target = match field {
        Field::Message => &mut record.message,
        Field::Code => record.code.get_or_insert_with(String::new),
        Field::Source => record.source.get_or_insert_with(String::new),
        _ => {
            return Err(CompileServiceError::Protocol(format!(
                "Unexpected continuation of {} field: {token:?}",
                field.key()
            )))
        }
    };
    target.push_str(sep);
    target.push_str(token);
    Ok(())
}
