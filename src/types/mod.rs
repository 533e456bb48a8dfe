//! Data types for SCPI entities.
//!
//! This module contains the value types shared across the library:
//! - Transport identification
//! - Error/event queue entries
//! - Instrument identity

pub mod event;
pub mod identity;

use std::fmt;

pub use event::ScpiEvent;
pub use identity::Identity;

/// Identifies which transport implementation can reach an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransportType {
    /// Local serial or USB-CDC port.
    Serial,
    /// SCPI-raw TCP socket.
    TcpIp,
}

impl TransportType {
    /// Returns the lowercase tag used in logs and display output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::TcpIp => "tcpip",
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
