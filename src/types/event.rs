//! Error/event queue entries.

use std::fmt;

use crate::error::ParseError;

/// One entry from an instrument's error/event queue.
///
/// Returned by the error query (`SYST:ERR?`) as `<code>,"<description>"`.
/// Code 0 means the queue is empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScpiEvent {
    /// Numeric error code (negative codes are defined by the SCPI standard).
    pub code: i32,
    /// Human-readable description.
    pub description: String,
}

impl ScpiEvent {
    /// Creates a new event.
    #[must_use]
    pub fn new(code: i32, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    /// Returns true if this entry reports an empty queue.
    #[must_use]
    pub const fn is_no_error(&self) -> bool {
        self.code == 0
    }

    /// Parses an error query reply.
    ///
    /// Accepts `-113,"Undefined header"`, `+0,"No error"` and unquoted
    /// descriptions such as `-221,Settings conflict`. A bare code is accepted
    /// with an empty description.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(data)
            .map_err(|_| ParseError::invalid("error event", data))?
            .trim();

        let (code, rest) = match text.split_once(',') {
            Some((code, rest)) => (code.trim(), rest.trim()),
            None => (text, ""),
        };

        let code = code
            .parse::<i32>()
            .map_err(|_| ParseError::invalid("error event", data))?;

        let description = match rest.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
            Some(quoted) => quoted.replace("\"\"", "\""),
            None => rest.to_owned(),
        };

        Ok(Self { code, description })
    }
}

impl fmt::Display for ScpiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},\"{}\"", self.code, self.description)
    }
}
