//! Transport layer for SCPI communication.
//!
//! This module provides the byte-stream abstraction shared by all transports
//! and the static registry that [`Resource::discover`] fans out over.
//!
//! Transports are blocking: every call waits until it completes, fails, or the
//! timeout given at construction expires.
//!
//! [`Resource::discover`]: crate::Resource::discover

#[cfg(test)]
pub(crate) mod mock;
pub mod serial;
pub mod tcpip;

use std::time::Duration;

use crate::error::{Result, TransportError};
use crate::resource::Resource;
use crate::types::TransportType;

pub use serial::{SerialConfig, SerialDiscoveryFilter, SerialTransport};
pub use tcpip::{TcpIpDiscoveryFilter, TcpIpTransport};

/// Default read/connect timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Trait for transport implementations.
///
/// A transport exclusively owns one open OS handle. It only moves bytes;
/// message framing is the session's job.
pub trait Transport: Send {
    /// Reads available bytes into `buf`, blocking up to the configured timeout.
    ///
    /// Never returns `Ok(0)` for a non-empty buffer: an expired timeout is a
    /// [`TransportErrorKind::Timeout`] error and end of stream is
    /// [`TransportErrorKind::ConnectionClosed`].
    ///
    /// [`TransportErrorKind::Timeout`]: crate::TransportErrorKind::Timeout
    /// [`TransportErrorKind::ConnectionClosed`]: crate::TransportErrorKind::ConnectionClosed
    fn read(&mut self, buf: &mut [u8]) -> std::result::Result<usize, TransportError>;

    /// Writes all bytes to the device.
    fn write_all(&mut self, data: &[u8]) -> std::result::Result<(), TransportError>;

    /// Releases the OS handle. Calling it again is a no-op.
    fn close(&mut self) -> std::result::Result<(), TransportError>;

    /// Returns true until [`close`](Self::close) has been called.
    fn is_open(&self) -> bool;

    /// Returns the kind of link this transport uses.
    fn transport_type(&self) -> TransportType;

    /// Returns the read timeout set at construction.
    fn timeout(&self) -> Duration;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&mut self, buf: &mut [u8]) -> std::result::Result<usize, TransportError> {
        (**self).read(buf)
    }

    fn write_all(&mut self, data: &[u8]) -> std::result::Result<(), TransportError> {
        (**self).write_all(data)
    }

    fn close(&mut self) -> std::result::Result<(), TransportError> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn transport_type(&self) -> TransportType {
        (**self).transport_type()
    }

    fn timeout(&self) -> Duration {
        (**self).timeout()
    }
}

/// Per-transport discovery options.
///
/// Each transport only sees its own filter; `None` means that transport's
/// defaults.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryFilter {
    /// Options for serial port enumeration.
    pub serial: Option<SerialDiscoveryFilter>,
    /// Options for DNS-SD browsing.
    pub tcpip: Option<TcpIpDiscoveryFilter>,
}

impl DiscoveryFilter {
    /// Creates a filter with every transport at its defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the serial discovery options.
    #[must_use]
    pub fn serial(mut self, filter: SerialDiscoveryFilter) -> Self {
        self.serial = Some(filter);
        self
    }

    /// Sets the TCP/IP discovery options.
    #[must_use]
    pub fn tcpip(mut self, filter: TcpIpDiscoveryFilter) -> Self {
        self.tcpip = Some(filter);
        self
    }
}

/// Opens a transport to an address with a timeout.
pub type OpenFn = fn(&str, Duration) -> std::result::Result<Box<dyn Transport>, TransportError>;

/// Discovers endpoints reachable by a transport.
pub type DiscoverFn = fn(&DiscoveryFilter) -> Result<Vec<Resource>>;

/// Registry entry describing one transport implementation.
#[derive(Debug, Clone, Copy)]
pub struct TransportDescriptor {
    /// Which resources this entry handles.
    pub transport_type: TransportType,
    /// Constructor.
    pub open: OpenFn,
    /// Discovery function.
    pub discover: DiscoverFn,
}

/// All transports known to this library, in discovery order.
pub static REGISTRY: &[TransportDescriptor] = &[serial::DESCRIPTOR, tcpip::DESCRIPTOR];

/// Looks up the registry entry for a transport type.
#[must_use]
pub fn descriptor(transport_type: TransportType) -> Option<&'static TransportDescriptor> {
    REGISTRY
        .iter()
        .find(|d| d.transport_type == transport_type)
}
