//! Request accumulator: turns an input line stream into compile requests.
//!
//! Two modes: `Files` (initial) collects file paths, `Options` collects
//! compiler options. `END` emits the accumulated request but does not clear
//! it; the lists persist until the next `START` / `STARTOPTIONS`, so a
//! client can send `END` again to recompile the same batch.

use tracing::trace;

use super::ControlLine;
use crate::invoker::CompileRequest;

/// Which list data lines are appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Files,
    Options,
}

/// Outcome of feeding one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccumulatorEvent {
    /// Line consumed, nothing to do.
    Continue,
    /// `END` received: compile this request and send one response.
    Compile(CompileRequest),
    /// `Bye.` received: close the connection without a response.
    Close,
}

/// Per-connection request state machine.
#[derive(Debug)]
pub struct RequestAccumulator {
    files: Vec<String>,
    options: Vec<String>,
    mode: Mode,
    closed: bool,
}

impl RequestAccumulator {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            options: Vec::new(),
            mode: Mode::Files,
            closed: false,
        }
    }

    /// Feed one line (terminator already stripped).
    ///
    /// After `Bye.` the accumulator is closed and every further line
    /// returns [`AccumulatorEvent::Close`].
    pub fn feed(&mut self, line: &str) -> AccumulatorEvent {
        if self.closed {
            return AccumulatorEvent::Close;
        }

        match ControlLine::parse(line) {
            Some(ControlLine::Bye) => {
                self.closed = true;
                AccumulatorEvent::Close
            }
            Some(ControlLine::Start) => {
                self.files.clear();
                AccumulatorEvent::Continue
            }
            Some(ControlLine::StartOptions) => {
                self.options.clear();
                self.mode = Mode::Options;
                AccumulatorEvent::Continue
            }
            Some(ControlLine::EndOptions) => {
                self.mode = Mode::Files;
                AccumulatorEvent::Continue
            }
            Some(ControlLine::End) => AccumulatorEvent::Compile(self.request()),
            None => {
                trace!(mode = ?self.mode, line, "data line");
                match self.mode {
                    Mode::Options => self.options.push(line.to_string()),
                    Mode::Files => self.files.push(line.to_string()),
                }
                AccumulatorEvent::Continue
            }
        }
    }

    /// Snapshot of the accumulated request.
    pub fn request(&self) -> CompileRequest {
        CompileRequest::new(self.files.clone(), self.options.clone())
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Default for RequestAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(acc: &mut RequestAccumulator, lines: &[&str]) -> Vec<AccumulatorEvent> {
        lines
            .iter()
            .map(|l| acc.feed(l))
            .filter(|e| *e != AccumulatorEvent::Continue)
            .collect()
    }

    fn compile(files: &[&str], options: &[&str]) -> AccumulatorEvent {
        AccumulatorEvent::Compile(CompileRequest::new(
            files.iter().map(|s| s.to_string()).collect(),
            options.iter().map(|s| s.to_string()).collect(),
        ))
    }

    #[test]
    fn test_files_in_order_without_options() {
        let mut acc = RequestAccumulator::new();
        let events = feed_all(&mut acc, &["START", "/a/A.java", "/a/B.java", "/a/C.java", "END"]);
        assert_eq!(events, vec![compile(&["/a/A.java", "/a/B.java", "/a/C.java"], &[])]);
    }

    #[test]
    fn test_options_block() {
        let mut acc = RequestAccumulator::new();
        let events = feed_all(
            &mut acc,
            &["STARTOPTIONS", "-g", "-classpath", "lib/x.jar", "ENDOPTIONS", "START", "A.java", "END"],
        );
        assert_eq!(events, vec![compile(&["A.java"], &["-g", "-classpath", "lib/x.jar"])]);
        assert_eq!(acc.mode(), Mode::Files);
    }

    #[test]
    fn test_options_toggle_does_not_touch_files() {
        let mut acc = RequestAccumulator::new();
        let events = feed_all(
            &mut acc,
            &["START", "A.java", "STARTOPTIONS", "-g", "ENDOPTIONS", "B.java", "END"],
        );
        assert_eq!(events, vec![compile(&["A.java", "B.java"], &["-g"])]);
    }

    #[test]
    fn test_start_inside_options_clears_files_and_stays_in_options() {
        let mut acc = RequestAccumulator::new();
        let events = feed_all(
            &mut acc,
            &["A.java", "STARTOPTIONS", "START", "-g", "ENDOPTIONS", "END"],
        );
        assert_eq!(events, vec![compile(&[], &["-g"])]);
    }

    #[test]
    fn test_end_does_not_clear_request() {
        let mut acc = RequestAccumulator::new();
        let events = feed_all(
            &mut acc,
            &["STARTOPTIONS", "-g", "ENDOPTIONS", "START", "A.java", "END", "END", "B.java", "END"],
        );
        assert_eq!(
            events,
            vec![
                compile(&["A.java"], &["-g"]),
                compile(&["A.java"], &["-g"]),
                compile(&["A.java", "B.java"], &["-g"]),
            ]
        );
    }

    #[test]
    fn test_empty_request_twice() {
        let mut acc = RequestAccumulator::new();
        let events = feed_all(&mut acc, &["START", "END", "START", "END"]);
        assert_eq!(events, vec![compile(&[], &[]), compile(&[], &[])]);
    }

    #[test]
    fn test_end_is_not_recorded_as_file() {
        let mut acc = RequestAccumulator::new();
        feed_all(&mut acc, &["START", "A.java", "END"]);
        assert_eq!(acc.request().files, vec!["A.java".to_string()]);
    }

    #[test]
    fn test_bye_closes_mid_accumulation() {
        let mut acc = RequestAccumulator::new();
        let events = feed_all(&mut acc, &["START", "A.java", "Bye.", "END"]);
        assert_eq!(events, vec![AccumulatorEvent::Close, AccumulatorEvent::Close]);
        assert!(acc.is_closed());
    }

    #[test]
    fn test_bye_in_options_mode() {
        let mut acc = RequestAccumulator::new();
        let events = feed_all(&mut acc, &["STARTOPTIONS", "-g", "Bye."]);
        assert_eq!(events, vec![AccumulatorEvent::Close]);
    }
}
