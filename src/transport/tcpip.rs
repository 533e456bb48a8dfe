//! TCP/IP transport implementation.
//!
//! Instruments listen on a raw socket (port 5025 by convention) and announce
//! themselves over DNS-SD as `_scpi-raw._tcp`.

use std::collections::HashSet;
use std::io::{Read, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use regex::Regex;

use crate::error::{Error, Result, TransportError, TransportErrorKind};
use crate::resource::{Resource, ResourceInfo};
use crate::transport::{DiscoveryFilter, Transport, TransportDescriptor};
use crate::types::TransportType;

/// Default SCPI raw socket port.
pub const DEFAULT_SCPI_PORT: u16 = 5025;

/// Default DNS-SD service type browsed for instruments.
pub const DEFAULT_DNSSD_SERVICE: &str = "_scpi-raw._tcp.local.";

/// Default DNS-SD domain.
pub const DEFAULT_DNSSD_DOMAIN: &str = "local";

/// Default browse window.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(1);

const BROWSE_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Registry entry for TCP/IP sockets.
pub(crate) const DESCRIPTOR: TransportDescriptor = TransportDescriptor {
    transport_type: TransportType::TcpIp,
    open: open_boxed,
    discover: discover_resources,
};

/// TCP/IP transport for SCPI communication.
///
/// Nagle's algorithm is disabled so short commands go out immediately.
#[derive(Debug)]
pub struct TcpIpTransport {
    stream: Option<TcpStream>,
    peer: SocketAddr,
    timeout: Duration,
}

impl TcpIpTransport {
    /// Connects to `host`, `host:port` or `[ipv6]:port`.
    ///
    /// The port defaults to [`DEFAULT_SCPI_PORT`]. `timeout` bounds the connect
    /// attempt to each resolved address and every later read and write.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be parsed or resolved, or if no
    /// resolved address accepts the connection in time.
    pub fn connect(
        address: &str,
        timeout: Duration,
    ) -> std::result::Result<Self, TransportError> {
        if timeout.is_zero() {
            return Err(TransportError::new(
                TransportErrorKind::Other,
                "timeout must be non-zero",
            ));
        }

        let (host, port) = parse_address(address)?;
        let addrs: Vec<SocketAddr> = (host.as_str(), port)
            .to_socket_addrs()
            .map_err(|e| {
                TransportError::new(
                    TransportErrorKind::AddressInvalid,
                    format!("cannot resolve {host}: {e}"),
                )
            })?
            .collect();

        let mut last_err = None;
        for addr in addrs {
            tracing::debug!("connecting to {}", addr);
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    stream.set_read_timeout(Some(timeout))?;
                    stream.set_write_timeout(Some(timeout))?;
                    tracing::info!("connected to {}", addr);
                    return Ok(Self {
                        stream: Some(stream),
                        peer: addr,
                        timeout,
                    });
                }
                Err(e) => {
                    tracing::debug!("connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.map_or_else(
            || {
                TransportError::new(
                    TransportErrorKind::AddressInvalid,
                    format!("{host} resolved to no addresses"),
                )
            },
            TransportError::from,
        ))
    }

    /// Returns the address of the connected peer.
    #[must_use]
    pub const fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Returns whether `TCP_NODELAY` is set on the socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport is closed or the option cannot be read.
    pub fn nodelay(&self) -> std::result::Result<bool, TransportError> {
        let stream = self.stream.as_ref().ok_or_else(TransportError::not_open)?;
        Ok(stream.nodelay()?)
    }

    /// Browses DNS-SD for instruments.
    ///
    /// Blocks for the filter's browse window.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`] if a name pattern is not a valid regex and
    /// a transport error if the mDNS daemon cannot be started.
    pub fn discover(filter: &TcpIpDiscoveryFilter) -> Result<Vec<Resource>> {
        let patterns = compile_patterns(&filter.names)?;
        let services = browse(&filter.services, filter.timeout)?;
        tracing::debug!("resolved {} DNS-SD services", services.len());
        Ok(resources_from_services(&services, &filter.domains, &patterns))
    }

    fn stream_mut(&mut self) -> std::result::Result<&mut TcpStream, TransportError> {
        self.stream.as_mut().ok_or_else(TransportError::not_open)
    }
}

impl Transport for TcpIpTransport {
    fn read(&mut self, buf: &mut [u8]) -> std::result::Result<usize, TransportError> {
        let stream = self.stream_mut()?;
        match stream.read(buf) {
            Ok(0) if !buf.is_empty() => Err(TransportError::new(
                TransportErrorKind::ConnectionClosed,
                "peer closed the connection",
            )),
            Ok(n) => {
                tracing::trace!("received {} bytes", n);
                Ok(n)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> std::result::Result<(), TransportError> {
        let stream = self.stream_mut()?;
        tracing::trace!("sending {} bytes", data.len());
        stream.write_all(data)?;
        Ok(())
    }

    fn close(&mut self) -> std::result::Result<(), TransportError> {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                tracing::debug!("shutdown of {} failed: {}", self.peer, e);
            }
            tracing::info!("disconnected from {}", self.peer);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn transport_type(&self) -> TransportType {
        TransportType::TcpIp
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Filter for DNS-SD discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpIpDiscoveryFilter {
    /// Service types to browse, e.g. `_scpi-raw._tcp.local.`.
    pub services: Vec<String>,
    /// Domains a service's full name must end in.
    pub domains: Vec<String>,
    /// Regex patterns matched against the start of the service's full name.
    pub names: Vec<String>,
    /// How long to collect answers.
    pub timeout: Duration,
}

impl Default for TcpIpDiscoveryFilter {
    fn default() -> Self {
        Self {
            services: vec![DEFAULT_DNSSD_SERVICE.to_owned()],
            domains: vec![DEFAULT_DNSSD_DOMAIN.to_owned()],
            names: vec![".*".to_owned()],
            timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }
}

impl TcpIpDiscoveryFilter {
    /// Creates a filter with the default service, domain and window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the browsed service types.
    #[must_use]
    pub fn services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.services = services.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the accepted domains.
    #[must_use]
    pub fn domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domains = domains.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the name patterns.
    #[must_use]
    pub fn names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the browse window.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn open_boxed(
    address: &str,
    timeout: Duration,
) -> std::result::Result<Box<dyn Transport>, TransportError> {
    Ok(Box::new(TcpIpTransport::connect(address, timeout)?))
}

fn discover_resources(filter: &DiscoveryFilter) -> Result<Vec<Resource>> {
    match &filter.tcpip {
        Some(tcpip) => TcpIpTransport::discover(tcpip),
        None => TcpIpTransport::discover(&TcpIpDiscoveryFilter::default()),
    }
}

/// Splits an address into host and port.
fn parse_address(address: &str) -> std::result::Result<(String, u16), TransportError> {
    let invalid = |reason: &str| {
        TransportError::new(
            TransportErrorKind::AddressInvalid,
            format!("{reason}: {address:?}"),
        )
    };

    let address = address.trim();
    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        let (host, rest) = rest
            .split_once(']')
            .ok_or_else(|| invalid("unterminated IPv6 literal"))?;
        match rest {
            "" => (host, None),
            _ => (
                host,
                Some(
                    rest.strip_prefix(':')
                        .ok_or_else(|| invalid("unexpected text after IPv6 literal"))?,
                ),
            ),
        }
    } else if address.matches(':').count() > 1 {
        // Bare IPv6 literal without a port.
        (address, None)
    } else {
        match address.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (address, None),
        }
    };

    if host.is_empty() {
        return Err(invalid("missing host"));
    }

    let port = match port {
        Some(port) => port.parse::<u16>().map_err(|_| invalid("invalid port"))?,
        None => DEFAULT_SCPI_PORT,
    };

    Ok((host.to_owned(), port))
}

/// Compiles name patterns, anchored at the start of the full name.
fn compile_patterns(names: &[String]) -> Result<Vec<Regex>> {
    names
        .iter()
        .map(|pattern| {
            Regex::new(&format!("^(?:{pattern})")).map_err(|e| Error::Discovery {
                message: format!("invalid name pattern {pattern:?}: {e}"),
            })
        })
        .collect()
}

fn mdns_error(err: &mdns_sd::Error) -> TransportError {
    TransportError::new(TransportErrorKind::Other, format!("mDNS: {err}"))
}

/// Collects resolved services of the given types for `window`.
fn browse(service_types: &[String], window: Duration) -> Result<Vec<ServiceInfo>> {
    let daemon = ServiceDaemon::new().map_err(|e| mdns_error(&e))?;

    let mut receivers = Vec::with_capacity(service_types.len());
    for service_type in service_types {
        match daemon.browse(service_type) {
            Ok(receiver) => receivers.push(receiver),
            Err(e) => {
                let _ = daemon.shutdown();
                return Err(Error::Discovery {
                    message: format!("cannot browse {service_type:?}: {e}"),
                });
            }
        }
    }

    let deadline = Instant::now() + window;
    let mut found: Vec<ServiceInfo> = Vec::new();

    loop {
        for receiver in &receivers {
            while let Ok(event) = receiver.try_recv() {
                match event {
                    ServiceEvent::ServiceResolved(info) => {
                        tracing::trace!("resolved {}", info.get_fullname());
                        match found
                            .iter_mut()
                            .find(|s| s.get_fullname() == info.get_fullname())
                        {
                            Some(existing) => *existing = info,
                            None => found.push(info),
                        }
                    }
                    ServiceEvent::ServiceRemoved(_, fullname) => {
                        tracing::trace!("removed {}", fullname);
                        found.retain(|s| s.get_fullname() != fullname);
                    }
                    _ => {}
                }
            }
        }

        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep(BROWSE_POLL_INTERVAL.min(deadline - now));
    }

    for service_type in service_types {
        let _ = daemon.stop_browse(service_type);
    }
    if let Err(e) = daemon.shutdown() {
        tracing::debug!("mDNS daemon shutdown failed: {}", e);
    }

    Ok(found)
}

/// Picks the address to connect to: IPv4 before IPv6, lowest first.
fn pick_address(addresses: &HashSet<IpAddr>) -> Option<IpAddr> {
    addresses.iter().copied().min_by_key(|ip| (ip.is_ipv6(), *ip))
}

fn in_domain(fullname: &str, domains: &[String]) -> bool {
    domains.iter().any(|domain| {
        let domain = domain.trim_matches('.');
        fullname.ends_with(&format!(".{domain}."))
    })
}

/// Turns resolved services into resources, applying domain and name filters.
fn resources_from_services(
    services: &[ServiceInfo],
    domains: &[String],
    patterns: &[Regex],
) -> Vec<Resource> {
    let mut resources = Vec::new();

    for info in services {
        let fullname = info.get_fullname();

        if !in_domain(fullname, domains) || !patterns.iter().any(|re| re.is_match(fullname)) {
            tracing::trace!("filtered out {}", fullname);
            continue;
        }

        let Some(ip) = pick_address(info.get_addresses()) else {
            tracing::warn!("service {} has no address, skipping", fullname);
            continue;
        };

        let instance = fullname
            .strip_suffix(info.get_type())
            .map_or(fullname, |name| name.trim_end_matches('.'));

        let mut resource = Resource::new(
            TransportType::TcpIp,
            SocketAddr::new(ip, info.get_port()).to_string(),
        );
        resource.location = Some(format!("dnssd:{fullname}"));
        resource.name = Some(instance.to_owned());
        resource.manufacturer = info.get_property_val_str("Manufacturer").map(str::to_owned);
        resource.model = info.get_property_val_str("Model").map(str::to_owned);
        resource.serialnum = info.get_property_val_str("SerialNumber").map(str::to_owned);
        resource.info = ResourceInfo::TcpIp(Box::new(info.clone()));
        resources.push(resource);
    }

    resources
}
