//! # scpi-link
//!
//! A Rust client library for SCPI instruments.
//!
//! This library talks to instruments over a serial/USB-CDC port or a SCPI-raw
//! TCP socket, and finds them by enumerating serial ports and browsing DNS-SD.
//!
//! ## Features
//!
//! - Blocking I/O with per-transport timeouts
//! - Serial port discovery filtered by USB vendor/product ID
//! - mDNS discovery of `_scpi-raw._tcp` instruments
//! - Response framing that keeps binary arbitrary blocks intact
//! - Error queue polling with typed device errors
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use scpi_link::{DiscoveryFilter, Resource, ScpiDevice, ScpiNumber};
//!
//! fn main() -> Result<(), scpi_link::Error> {
//!     // Find instruments on USB and the local network
//!     let resources = Resource::discover(&DiscoveryFilter::new())?;
//!     let Some(resource) = resources.first() else {
//!         return Ok(());
//!     };
//!
//!     let mut device = ScpiDevice::open(resource, Duration::from_secs(1))?;
//!     let idn = device.identify()?;
//!     println!("Connected to: {} {}", idn.manufacturer, idn.model);
//!
//!     // Set a parameter, then ask the instrument whether it liked it
//!     device.write_with("SOUR:FREQ", &[&ScpiNumber::from(24e9)])?;
//!     device.check_error()?;
//!
//!     device.close()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`protocol`] - Message framing, command encoding and typed values
//! - [`types`] - Transport tags, error queue entries, identity
//! - [`transport`] - Serial and TCP/IP transports and the transport registry
//! - [`resource`] - Discovered endpoints and aggregated discovery
//! - [`client`] - The [`ScpiDevice`] session

pub mod client;
pub mod error;
pub mod protocol;
pub mod resource;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{
    DEFAULT_ERROR_QUERY, DeviceConfig, ErrorCheck, ExchangeState, ScpiDevice,
};
pub use error::{Error, ParseError, Result, TransportError, TransportErrorKind};
pub use protocol::{
    CommonCommand, ScpiArbBlock, ScpiBool, ScpiChars, ScpiNumber, ScpiNumberArray, ScpiString,
    ScpiType,
};
pub use resource::{Resource, ResourceInfo};
pub use transport::serial::DEFAULT_BAUD_RATE;
pub use transport::tcpip::{DEFAULT_DNSSD_SERVICE, DEFAULT_SCPI_PORT};
pub use transport::{
    DEFAULT_TIMEOUT, DiscoveryFilter, SerialConfig, SerialDiscoveryFilter, SerialTransport,
    TcpIpDiscoveryFilter, TcpIpTransport, Transport,
};
pub use types::{Identity, ScpiEvent, TransportType};
