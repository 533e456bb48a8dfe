//! Command encoding for the SCPI protocol.
//!
//! A program message is a header, optionally followed by a space and comma
//! separated parameters, and the terminator:
//! ```text
//! CONTROL:RADAR:MPLL:NINT 42\n
//! SOURCE:LIST:DATA #15hello\n
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::value::ScpiType;

/// IEEE 488.2 common commands supported by every SCPI instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommonCommand {
    /// Identification query.
    Identify,
    /// Reset to the power-on state.
    Reset,
    /// Clear status registers and the error queue.
    ClearStatus,
    /// Operation complete query, answers `1` once pending operations finish.
    OperationComplete,
    /// Wait until pending operations finish before executing further commands.
    Wait,
    /// Self-test query.
    SelfTest,
    /// Status byte query.
    StatusByte,
}

impl CommonCommand {
    /// Returns the command header.
    #[must_use]
    pub const fn header(self) -> &'static str {
        match self {
            Self::Identify => "*IDN?",
            Self::Reset => "*RST",
            Self::ClearStatus => "*CLS",
            Self::OperationComplete => "*OPC?",
            Self::Wait => "*WAI",
            Self::SelfTest => "*TST?",
            Self::StatusByte => "*STB?",
        }
    }
}

/// Returns true if the (last) command in a program message is a query.
///
/// The query form is marked by a `?` at the end of the header, before any
/// parameters: `MEAS:VOLT? (@1)` is a query, `SYST:BEEP "?"` is not.
#[must_use]
pub fn is_query(command: &str) -> bool {
    command
        .rsplit(';')
        .next()
        .and_then(|last| last.split_whitespace().next())
        .is_some_and(|header| header.ends_with('?'))
}

/// Encodes a command with parameters into a terminated program message.
#[must_use]
pub fn encode(command: &str, params: &[&dyn ScpiType], terminator: u8) -> Bytes {
    let command = command.trim_end();
    let mut buf = BytesMut::with_capacity(command.len() + 2);
    buf.put_slice(command.as_bytes());

    for (i, param) in params.iter().enumerate() {
        buf.put_u8(if i == 0 { b' ' } else { b',' });
        param.encode(&mut buf);
    }

    buf.put_u8(terminator);
    buf.freeze()
}
