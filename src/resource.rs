//! Discovered instrument endpoints.
//!
//! A [`Resource`] describes something that can be opened: a serial port or a
//! SCPI-raw socket. [`Resource::discover`] asks every registered transport for
//! the endpoints it can see.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use mdns_sd::ServiceInfo;
use tokio_serial::SerialPortInfo;

use crate::error::{Error, Result, TransportError, TransportErrorKind};
use crate::transport::{DiscoveryFilter, REGISTRY, Transport, TransportDescriptor, descriptor};
use crate::types::TransportType;

/// Transport-native record a resource was discovered from.
#[derive(Debug, Clone, Default)]
pub enum ResourceInfo {
    /// Built by hand rather than discovered.
    #[default]
    None,
    /// Serial port enumeration entry.
    Serial(SerialPortInfo),
    /// Resolved DNS-SD service.
    TcpIp(Box<ServiceInfo>),
}

/// A connectable instrument endpoint.
///
/// `transport` and `address` are enough to open it; the remaining fields are
/// advisory. Equality and hashing ignore `info`.
#[derive(Debug, Clone)]
pub struct Resource {
    /// Transport that can open this resource.
    pub transport: TransportType,
    /// Device path or `host:port`.
    pub address: String,
    /// Physical or logical location (`usb:1-1.4:1.0`, `dnssd:<fullname>`).
    pub location: Option<String>,
    /// Human readable name.
    pub name: Option<String>,
    /// Manufacturer, if reported.
    pub manufacturer: Option<String>,
    /// Model, if reported.
    pub model: Option<String>,
    /// Serial number, if reported.
    pub serialnum: Option<String>,
    /// Raw discovery record.
    pub info: ResourceInfo,
}

impl Resource {
    /// Creates a resource with only a transport and address.
    #[must_use]
    pub fn new(transport: TransportType, address: impl Into<String>) -> Self {
        Self {
            transport,
            address: address.into(),
            location: None,
            name: None,
            manufacturer: None,
            model: None,
            serialnum: None,
            info: ResourceInfo::None,
        }
    }

    /// Discovers resources on every registered transport.
    ///
    /// Results are grouped by transport in registry order (serial, then
    /// TCP/IP). A transport that fails to enumerate is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`] if a filter is invalid.
    pub fn discover(filter: &DiscoveryFilter) -> Result<Vec<Self>> {
        discover_from(REGISTRY, filter)
    }

    /// Discovers resources on the listed transports only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`] if a filter is invalid.
    pub fn discover_with(
        transports: &[TransportType],
        filter: &DiscoveryFilter,
    ) -> Result<Vec<Self>> {
        let selected: Vec<TransportDescriptor> = REGISTRY
            .iter()
            .filter(|d| transports.contains(&d.transport_type))
            .copied()
            .collect();
        discover_from(&selected, filter)
    }

    /// Opens a transport to this resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be opened.
    pub fn open(
        &self,
        timeout: Duration,
    ) -> std::result::Result<Box<dyn Transport>, TransportError> {
        let descriptor = descriptor(self.transport).ok_or_else(|| {
            TransportError::new(
                TransportErrorKind::Other,
                format!("no transport registered for {}", self.transport),
            )
        })?;
        tracing::debug!("opening {}", self);
        (descriptor.open)(&self.address, timeout)
    }
}

fn discover_from(
    registry: &[TransportDescriptor],
    filter: &DiscoveryFilter,
) -> Result<Vec<Resource>> {
    let mut resources = Vec::new();

    for descriptor in registry {
        match (descriptor.discover)(filter) {
            Ok(found) => {
                tracing::debug!(
                    "{} discovery found {} resources",
                    descriptor.transport_type,
                    found.len()
                );
                resources.extend(found);
            }
            Err(Error::Transport(e)) => {
                tracing::warn!("{} discovery failed: {}", descriptor.transport_type, e);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(resources)
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.transport, self.address)?;
        if let Some(name) = &self.name {
            write!(f, " ({name})")?;
        }
        Ok(())
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.transport == other.transport
            && self.address == other.address
            && self.location == other.location
            && self.name == other.name
            && self.manufacturer == other.manufacturer
            && self.model == other.model
            && self.serialnum == other.serialnum
    }
}

impl Eq for Resource {}

impl Hash for Resource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.transport.hash(state);
        self.address.hash(state);
        self.location.hash(state);
        self.name.hash(state);
        self.manufacturer.hash(state);
        self.model.hash(state);
        self.serialnum.hash(state);
    }
}
