//! Control lines and the per-connection request state machine.
//!
//! Clients drive the server with reserved lines. Every other line is data:
//! a file path, or an option while between `STARTOPTIONS` and `ENDOPTIONS`.
//!
//! # Workflow
//!
//! ```text
//! STARTOPTIONS      clear options, start collecting options
//! -g                option
//! ENDOPTIONS        back to collecting files
//! START             clear files
//! /src/A.java       file
//! END               compile, one framed response is written
//! Bye.              close the connection
//! ```
//!
//! Control lines are matched exactly and case-sensitively.

mod accumulator;

pub use accumulator::{AccumulatorEvent, Mode, RequestAccumulator};

use std::fmt;

/// A protocol-reserved input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlLine {
    /// `START`: clear the file list.
    Start,
    /// `STARTOPTIONS`: clear the option list and collect options.
    StartOptions,
    /// `ENDOPTIONS`: collect files again.
    EndOptions,
    /// `END`: compile the accumulated request.
    End,
    /// `Bye.`: close the connection.
    Bye,
}

impl ControlLine {
    pub const ALL: [ControlLine; 5] = [
        ControlLine::Start,
        ControlLine::StartOptions,
        ControlLine::EndOptions,
        ControlLine::End,
        ControlLine::Bye,
    ];

    /// Exact wire text of this control line.
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlLine::Start => "START",
            ControlLine::StartOptions => "STARTOPTIONS",
            ControlLine::EndOptions => "ENDOPTIONS",
            ControlLine::End => "END",
            ControlLine::Bye => "Bye.",
        }
    }

    /// Classify a line; `None` means the line is data.
    pub fn parse(line: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == line)
    }
}

impl fmt::Display for ControlLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
