//! `javac` backend.
//!
//! Runs the configured compiler executable as a child process with
//! `options... files...` and parses its text diagnostics:
//!
//! ```text
//! /src/A.java:3: error: ';' expected
//!         int x = 1
//!                  ^
//! /src/A.java:7: error: cannot find symbol
//!         Foo f;
//!         ^
//!   symbol:   class Foo
//!   location: class A
//! Note: /src/A.java uses unchecked or unsafe operations.
//! 2 errors
//! ```
//!
//! Each call is an independent process, so concurrent calls are safe.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tracing::{debug, warn};

use super::{BoxFuture, CompileInvoker, CompileRequest, CompileResult};
use crate::diagnostic::{DiagnosticKind, DiagnosticRecord};
use crate::error::CompileServiceError;

/// Default compiler executable.
pub const DEFAULT_JAVAC: &str = "javac";

/// javac renders tabs in source excerpts at this width.
const TAB_WIDTH: usize = 8;

/// Lint categories javac reports as mandatory warnings.
const MANDATORY_LINTS: [&str; 3] = ["[deprecation]", "[removal]", "[unchecked]"];

/// Invoker that shells out to `javac`.
#[derive(Debug, Clone)]
pub struct JavacInvoker {
    program: Arc<PathBuf>,
    working_dir: Option<Arc<PathBuf>>,
}

impl JavacInvoker {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: Arc::new(program.into()),
            working_dir: None,
        }
    }

    /// Run the compiler from this directory instead of the server's.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(Arc::new(dir.into()));
        self
    }

    async fn run(
        program: Arc<PathBuf>,
        working_dir: Option<Arc<PathBuf>>,
        request: CompileRequest,
    ) -> CompileResult {
        if request.files.is_empty() {
            return Ok(Vec::new());
        }

        let mut command = Command::new(program.as_path());
        command
            .args(&request.options)
            .args(&request.files)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &working_dir {
            command.current_dir(dir.as_path());
        }

        let output = command.output().await.map_err(|e| {
            CompileServiceError::Compiler(format!(
                "Failed to run {}: {}",
                program.display(),
                e
            ))
        })?;

        let mut text = String::from_utf8_lossy(&output.stderr).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stdout));

        let parsed = parse_javac_output(&text);
        debug!(
            files = request.files.len(),
            diagnostics = parsed.len(),
            status = %output.status,
            "javac finished"
        );

        if parsed.is_empty() && !output.status.success() {
            return Err(CompileServiceError::Compiler(format!(
                "{} exited with {}",
                program.display(),
                output.status
            )));
        }

        Ok(resolve_offsets(parsed, working_dir.as_deref().map(PathBuf::as_path)).await)
    }
}

impl Default for JavacInvoker {
    fn default() -> Self {
        Self::new(DEFAULT_JAVAC)
    }
}

impl CompileInvoker for JavacInvoker {
    fn compile(&self, request: CompileRequest) -> BoxFuture<'static, CompileResult> {
        Box::pin(Self::run(
            self.program.clone(),
            self.working_dir.clone(),
            request,
        ))
    }
}

/// A diagnostic parsed from compiler output, before source offsets are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDiagnostic {
    pub record: DiagnosticRecord,
    /// Source line echoed under the header.
    pub excerpt: Option<String>,
    /// Display column of the caret under the excerpt.
    pub caret: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Excerpt,
    Caret,
    Detail,
}

/// Parse javac text output into diagnostics, in output order.
///
/// Positions stay at `-1`; see [`JavacInvoker`] for offset resolution.
pub fn parse_javac_output(output: &str) -> Vec<ParsedDiagnostic> {
    let mut diagnostics = Vec::new();
    let mut pending: Option<(ParsedDiagnostic, Stage)> = None;

    for line in output.lines() {
        if let Some(record) = parse_header(line) {
            diagnostics.extend(pending.take().map(|(d, _)| d));
            pending = Some((detached(record), Stage::Excerpt));
            continue;
        }

        if let Some(note) = line.strip_prefix("Note: ") {
            diagnostics.extend(pending.take().map(|(d, _)| d));
            diagnostics.push(detached(DiagnosticRecord::new(DiagnosticKind::Note, note)));
            continue;
        }

        if let Some(record) = parse_pathless(line) {
            diagnostics.extend(pending.take().map(|(d, _)| d));
            pending = Some((detached(record), Stage::Detail));
            continue;
        }

        if is_summary(line) {
            diagnostics.extend(pending.take().map(|(d, _)| d));
            continue;
        }

        match pending.as_mut() {
            Some((diag, stage @ Stage::Excerpt)) => {
                diag.excerpt = Some(line.to_string());
                *stage = Stage::Caret;
            }
            Some((diag, stage @ Stage::Caret)) if is_caret(line) => {
                diag.caret = line.find('^');
                *stage = Stage::Detail;
            }
            Some((diag, stage)) => {
                diag.record.message.push('\n');
                diag.record.message.push_str(line);
                *stage = Stage::Detail;
            }
            None if line.trim().is_empty() => {}
            None => diagnostics.push(detached(DiagnosticRecord::new(DiagnosticKind::Other, line))),
        }
    }

    diagnostics.extend(pending.take().map(|(d, _)| d));
    diagnostics
}

fn detached(record: DiagnosticRecord) -> ParsedDiagnostic {
    ParsedDiagnostic {
        record,
        excerpt: None,
        caret: None,
    }
}

fn warning_kind(message: &str) -> DiagnosticKind {
    if MANDATORY_LINTS.iter().any(|lint| message.starts_with(lint)) {
        DiagnosticKind::MandatoryWarning
    } else {
        DiagnosticKind::Warning
    }
}

/// `path:line: error|warning: message`
fn parse_header(line: &str) -> Option<DiagnosticRecord> {
    for marker in [": error: ", ": warning: "] {
        let Some(idx) = line.find(marker) else {
            continue;
        };
        let Some((path, number)) = line[..idx].rsplit_once(':') else {
            continue;
        };
        let Ok(number) = number.parse::<i64>() else {
            continue;
        };
        if path.is_empty() {
            continue;
        }

        let message = &line[idx + marker.len()..];
        let kind = if marker == ": error: " {
            DiagnosticKind::Error
        } else {
            warning_kind(message)
        };
        return Some(DiagnosticRecord::new(kind, message).at(path, number));
    }
    None
}

/// `error: message` / `warning: message` with no source location.
fn parse_pathless(line: &str) -> Option<DiagnosticRecord> {
    if let Some(message) = line.strip_prefix("error: ") {
        return Some(DiagnosticRecord::new(DiagnosticKind::Error, message));
    }
    line.strip_prefix("warning: ")
        .map(|message| DiagnosticRecord::new(warning_kind(message), message))
}

/// `1 error`, `3 warnings`.
fn is_summary(line: &str) -> bool {
    let mut parts = line.split_whitespace();
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(n), Some("error" | "errors" | "warning" | "warnings"), None)
            if n.bytes().all(|b| b.is_ascii_digit())
    )
}

fn is_caret(line: &str) -> bool {
    line.trim() == "^"
}

/// Fill `position`, `start` and `end` from the caret, reading each source
/// file once. Records whose file cannot be read keep `-1`.
async fn resolve_offsets(
    parsed: Vec<ParsedDiagnostic>,
    working_dir: Option<&std::path::Path>,
) -> Vec<DiagnosticRecord> {
    let mut sources: HashMap<String, Option<String>> = HashMap::new();
    let mut records = Vec::with_capacity(parsed.len());

    for diag in parsed {
        let mut record = diag.record;
        if let (Some(path), Some(caret)) = (record.source.clone(), diag.caret) {
            if !sources.contains_key(&path) {
                let full = match working_dir {
                    Some(dir) => dir.join(&path),
                    None => PathBuf::from(&path),
                };
                let content = match tokio::fs::read_to_string(&full).await {
                    Ok(content) => Some(content),
                    Err(e) => {
                        warn!(path = %full.display(), error = %e, "cannot read source for offsets");
                        None
                    }
                };
                sources.insert(path.clone(), content);
            }

            if let Some(Some(content)) = sources.get(&path) {
                if let Some(offset) = char_offset(content, record.line, caret) {
                    record = record.with_offset(offset as i64);
                }
            }
        }
        records.push(record);
    }
    records
}

/// Character offset of display column `caret` on 1-based `line`.
fn char_offset(content: &str, line: i64, caret: usize) -> Option<usize> {
    if line < 1 {
        return None;
    }

    let mut current = 1;
    let mut offset = 0;
    let mut chars = content.chars().peekable();
    while current < line {
        let ch = chars.next()?;
        offset += 1;
        match ch {
            '\n' => current += 1,
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                    offset += 1;
                }
                current += 1;
            }
            _ => {}
        }
    }

    let mut column = 0;
    for ch in chars {
        if column >= caret || ch == '\n' || ch == '\r' {
            break;
        }
        column = if ch == '\t' {
            (column / TAB_WIDTH + 1) * TAB_WIDTH
        } else {
            column + 1
        };
        offset += 1;
    }
    Some(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const OUTPUT: &str = "\
/src/A.java:3: error: ';' expected
        int x = 1
                 ^
/src/A.java:7: error: cannot find symbol
        Foo f;
        ^
  symbol:   class Foo
  location: class A
/src/A.java:9: warning: [unchecked] unchecked call to add(E) as a member of the raw type List
        l.add(1);
             ^
Note: Some input files use unchecked or unsafe operations.
2 errors
1 warning
";

    #[test]
    fn test_parse_headers_excerpts_and_carets() {
        let parsed = parse_javac_output(OUTPUT);
        assert_eq!(parsed.len(), 4);

        let first = &parsed[0];
        assert_eq!(first.record.kind, DiagnosticKind::Error);
        assert_eq!(first.record.source.as_deref(), Some("/src/A.java"));
        assert_eq!(first.record.line, 3);
        assert_eq!(first.record.message, "';' expected");
        assert_eq!(first.excerpt.as_deref(), Some("        int x = 1"));
        assert_eq!(first.caret, Some(17));
        assert_eq!(first.record.code, None);
    }

    #[test]
    fn test_detail_lines_join_message() {
        let parsed = parse_javac_output(OUTPUT);
        assert_eq!(
            parsed[1].record.message,
            "cannot find symbol\n  symbol:   class Foo\n  location: class A"
        );
    }

    #[test]
    fn test_mandatory_warning_and_note() {
        let parsed = parse_javac_output(OUTPUT);
        assert_eq!(parsed[2].record.kind, DiagnosticKind::MandatoryWarning);
        assert_eq!(parsed[3].record.kind, DiagnosticKind::Note);
        assert_eq!(parsed[3].record.source, None);
        assert_eq!(parsed[3].record.line, -1);
    }

    #[test]
    fn test_plain_warning_kind() {
        let parsed = parse_javac_output("B.java:1: warning: some lint\nclass B {}\n^\n");
        assert_eq!(parsed[0].record.kind, DiagnosticKind::Warning);
    }

    #[test]
    fn test_pathless_error_with_usage() {
        let parsed = parse_javac_output(
            "error: invalid flag: -bogus\nUsage: javac <options> <source files>\nuse --help for a list of possible options\n",
        );
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].record.kind, DiagnosticKind::Error);
        assert_eq!(parsed[0].record.source, None);
        assert!(parsed[0].record.message.starts_with("invalid flag: -bogus\nUsage:"));
    }

    #[test]
    fn test_windows_path_header() {
        let parsed = parse_javac_output("C:\\src\\A.java:12: error: oops\n");
        assert_eq!(parsed[0].record.source.as_deref(), Some("C:\\src\\A.java"));
        assert_eq!(parsed[0].record.line, 12);
    }

    #[test]
    fn test_unrecognised_line_is_other() {
        let parsed = parse_javac_output("something odd happened\n");
        assert_eq!(parsed[0].record.kind, DiagnosticKind::Other);
        assert_eq!(parsed[0].record.message, "something odd happened");
    }

    #[test]
    fn test_summary_lines() {
        assert!(is_summary("1 error"));
        assert!(is_summary("12 warnings"));
        assert!(!is_summary("1 error here"));
        assert!(!is_summary("x errors"));
    }

    #[test]
    fn test_char_offset() {
        let content = "class A {\n    int x = 1\n}\n";
        // Line 2, caret under the space after `1`.
        assert_eq!(char_offset(content, 2, 13), Some(10 + 13));
        assert_eq!(char_offset(content, 1, 0), Some(0));
        assert_eq!(char_offset(content, 9, 0), None);
        assert_eq!(char_offset(content, 0, 0), None);
    }

    #[test]
    fn test_char_offset_crlf_and_tabs() {
        let content = "class A {\r\n\tint x = 1\r\n}\r\n";
        // Tab expands to column 8; caret under `i`.
        assert_eq!(char_offset(content, 2, 8), Some(11 + 1));
    }

    #[tokio::test]
    async fn test_resolve_offsets_reads_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "class A {{\n    int x = 1\n}}\n").unwrap();
        let path = file.path().display().to_string();

        let output = format!("{path}:2: error: ';' expected\n    int x = 1\n             ^\n1 error\n");
        let records = resolve_offsets(parse_javac_output(&output), None).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].position, 23);
        assert_eq!(records[0].start, 23);
        assert_eq!(records[0].end, 23);
    }

    #[tokio::test]
    async fn test_resolve_offsets_missing_file_keeps_no_position() {
        let output = "/definitely/missing/A.java:2: error: x\n  y\n  ^\n";
        let records = resolve_offsets(parse_javac_output(output), None).await;
        assert_eq!(records[0].position, -1);
    }

    #[tokio::test]
    async fn test_empty_request_skips_process() {
        let invoker = JavacInvoker::new("/definitely/not/a/compiler");
        let records = invoker.compile(CompileRequest::default()).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_missing_compiler_is_error() {
        let invoker = JavacInvoker::new("/definitely/not/a/compiler");
        let request = CompileRequest::new(vec!["A.java".into()], vec![]);
        let err = invoker.compile(request).await.unwrap_err();
        assert!(err.to_string().contains("Failed to run"));
    }
}
