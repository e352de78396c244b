//! Diagnostic records produced by a compile call.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Severity class of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticKind {
    Error,
    Warning,
    MandatoryWarning,
    Note,
    Other,
}

impl DiagnosticKind {
    /// Wire name used in the `KIND:` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::Error => "ERROR",
            DiagnosticKind::Warning => "WARNING",
            DiagnosticKind::MandatoryWarning => "MANDATORY_WARNING",
            DiagnosticKind::Note => "NOTE",
            DiagnosticKind::Other => "OTHER",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiagnosticKind {
    type Err = std::convert::Infallible;

    /// Unknown names map to `Other`, never fail.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ERROR" => DiagnosticKind::Error,
            "WARNING" => DiagnosticKind::Warning,
            "MANDATORY_WARNING" => DiagnosticKind::MandatoryWarning,
            "NOTE" => DiagnosticKind::Note,
            _ => DiagnosticKind::Other,
        })
    }
}

/// One finding reported by the compiler.
///
/// Positions use `-1` when the compiler has no position to report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub code: Option<String>,
    pub kind: DiagnosticKind,
    pub position: i64,
    pub line: i64,
    pub start: i64,
    pub end: i64,
    pub source: Option<String>,
    pub message: String,
}

/// Marker for "no position" in any of the numeric fields.
pub const NO_POSITION: i64 = -1;

impl DiagnosticRecord {
    /// Create a record with no code, no source and no position.
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            code: None,
            kind,
            position: NO_POSITION,
            line: NO_POSITION,
            start: NO_POSITION,
            end: NO_POSITION,
            source: None,
            message: message.into(),
        }
    }

    /// Set the source path and line number.
    pub fn at(mut self, source: impl Into<String>, line: i64) -> Self {
        self.source = Some(source.into());
        self.line = line;
        self
    }

    /// Set position, start and end to the same offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.position = offset;
        self.start = offset;
        self.end = offset;
        self
    }

    /// Set the diagnostic code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.kind == DiagnosticKind::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(DiagnosticKind::Error.as_str(), "ERROR");
        assert_eq!(DiagnosticKind::MandatoryWarning.to_string(), "MANDATORY_WARNING");
        assert_eq!("NOTE".parse::<DiagnosticKind>().unwrap(), DiagnosticKind::Note);
        assert_eq!("bogus".parse::<DiagnosticKind>().unwrap(), DiagnosticKind::Other);
    }

    #[test]
    fn test_builder_helpers() {
        let record = DiagnosticRecord::new(DiagnosticKind::Error, "boom")
            .at("/tmp/A.java", 3)
            .with_offset(42)
            .with_code("compiler.err.expected");

        assert_eq!(record.source.as_deref(), Some("/tmp/A.java"));
        assert_eq!(record.line, 3);
        assert_eq!((record.position, record.start, record.end), (42, 42, 42));
        assert_eq!(record.code.as_deref(), Some("compiler.err.expected"));
        assert!(record.is_error());
    }

    #[test]
    fn test_serde_uses_wire_kind_names() {
        let record = DiagnosticRecord::new(DiagnosticKind::MandatoryWarning, "x");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"MANDATORY_WARNING\""));
    }
}
