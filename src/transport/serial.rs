//! Serial/USB transport implementation.
//!
//! This module provides serial port communication for SCPI instruments
//! connected via RS-232 or USB CDC, and enumeration of the ports present on
//! the host.

use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Duration;

use tokio_serial::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortInfo, SerialPortType,
    StopBits,
};

use crate::error::{Result, TransportError, TransportErrorKind};
use crate::resource::{Resource, ResourceInfo};
use crate::transport::{DEFAULT_TIMEOUT, DiscoveryFilter, Transport, TransportDescriptor};
use crate::types::TransportType;

/// Default baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Upper bound on stale bytes discarded when a port is opened.
const MAX_DRAIN_BYTES: usize = 1 << 20;

/// Registry entry for serial ports.
pub(crate) const DESCRIPTOR: TransportDescriptor = TransportDescriptor {
    transport_type: TransportType::Serial,
    open: open_boxed,
    discover: discover_resources,
};

/// Configuration for serial transport.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0" or "COM3").
    pub port: String,
    /// Read timeout.
    pub timeout: Duration,
    /// Baud rate.
    pub baud_rate: u32,
    /// Number of data bits.
    pub data_bits: DataBits,
    /// Parity checking.
    pub parity: Parity,
    /// Number of stop bits.
    pub stop_bits: StopBits,
    /// Flow control.
    pub flow_control: FlowControl,
}

impl SerialConfig {
    /// Creates a new serial configuration with default settings (8N1, no flow control).
    #[must_use]
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            timeout: DEFAULT_TIMEOUT,
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }

    /// Sets the read timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the baud rate.
    #[must_use]
    pub const fn baud_rate(mut self, rate: u32) -> Self {
        self.baud_rate = rate;
        self
    }

    /// Sets the number of data bits.
    #[must_use]
    pub const fn data_bits(mut self, bits: DataBits) -> Self {
        self.data_bits = bits;
        self
    }

    /// Sets the parity.
    #[must_use]
    pub const fn parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    /// Sets the number of stop bits.
    #[must_use]
    pub const fn stop_bits(mut self, bits: StopBits) -> Self {
        self.stop_bits = bits;
        self
    }

    /// Sets the flow control mode.
    #[must_use]
    pub const fn flow_control(mut self, mode: FlowControl) -> Self {
        self.flow_control = mode;
        self
    }
}

/// Serial transport for SCPI communication.
///
/// The port is opened exclusively: on Unix a second open of the same device,
/// from this or any other process, fails with
/// [`TransportErrorKind::PermissionDenied`](crate::TransportErrorKind::PermissionDenied).
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    name: String,
    timeout: Duration,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("open", &self.port.is_some())
            .finish()
    }
}

impl SerialTransport {
    /// Opens a serial port with default line settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the port does not exist, is in use, or cannot be
    /// configured.
    pub fn new(
        port: impl Into<String>,
        timeout: Duration,
    ) -> std::result::Result<Self, TransportError> {
        Self::open(SerialConfig::new(port).timeout(timeout))
    }

    /// Opens a serial port with the given configuration.
    ///
    /// Any bytes already waiting in the OS buffers are discarded before this
    /// returns, so the first read only sees data sent after the open.
    ///
    /// # Errors
    ///
    /// Returns an error if the port does not exist, is in use, or cannot be
    /// configured.
    pub fn open(config: SerialConfig) -> std::result::Result<Self, TransportError> {
        tracing::info!("opening serial port: {}", config.port);

        let mut port = tokio_serial::new(config.port.as_str(), config.baud_rate)
            .data_bits(config.data_bits)
            .parity(config.parity)
            .stop_bits(config.stop_bits)
            .flow_control(config.flow_control)
            .timeout(config.timeout)
            .open()
            .map_err(|e| open_error(e, &config.port))?;

        let drained = drain_on_open(&mut *port, config.timeout)?;
        if drained > 0 {
            tracing::debug!("drained {} stale bytes from {}", drained, config.port);
        }

        tracing::info!("opened serial port: {}", config.port);
        Ok(Self {
            port: Some(port),
            name: config.port,
            timeout: config.timeout,
        })
    }

    /// Returns the port path this transport was opened with.
    #[must_use]
    pub fn port_name(&self) -> &str {
        &self.name
    }

    /// Lists serial ports on this host as resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS port list cannot be retrieved.
    pub fn discover(filter: &SerialDiscoveryFilter) -> Result<Vec<Resource>> {
        let ports = tokio_serial::available_ports().map_err(TransportError::from)?;
        tracing::debug!("found {} serial ports", ports.len());

        Ok(ports
            .into_iter()
            .filter(|info| filter.matches(info))
            .map(|info| {
                let bus = bus_location(&info.port_name);
                resource_from_port(info, bus)
            })
            .collect())
    }

    fn port_mut(&mut self) -> std::result::Result<&mut Box<dyn SerialPort>, TransportError> {
        self.port.as_mut().ok_or_else(TransportError::not_open)
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> std::result::Result<usize, TransportError> {
        let port = self.port_mut()?;
        match port.read(buf) {
            Ok(0) if !buf.is_empty() => Err(io::Error::from(io::ErrorKind::TimedOut).into()),
            Ok(n) => {
                tracing::trace!("received {} bytes", n);
                Ok(n)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> std::result::Result<(), TransportError> {
        let port = self.port_mut()?;
        tracing::trace!("sending {} bytes", data.len());
        port.write_all(data)?;
        port.flush()?;
        Ok(())
    }

    fn close(&mut self) -> std::result::Result<(), TransportError> {
        if self.port.take().is_some() {
            tracing::info!("closed serial port: {}", self.name);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Serial
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Filter for serial discovery.
///
/// Unset fields match anything. Setting either USB field excludes ports that
/// are not USB devices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerialDiscoveryFilter {
    /// USB vendor ID.
    pub usb_vid: Option<u16>,
    /// USB product ID.
    pub usb_pid: Option<u16>,
}

impl SerialDiscoveryFilter {
    /// Creates a filter that matches every port.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            usb_vid: None,
            usb_pid: None,
        }
    }

    /// Only match USB devices with this vendor ID.
    #[must_use]
    pub const fn usb_vid(mut self, vid: u16) -> Self {
        self.usb_vid = Some(vid);
        self
    }

    /// Only match USB devices with this product ID.
    #[must_use]
    pub const fn usb_pid(mut self, pid: u16) -> Self {
        self.usb_pid = Some(pid);
        self
    }

    /// Returns true if the port passes this filter.
    #[must_use]
    pub fn matches(&self, info: &SerialPortInfo) -> bool {
        if self.usb_vid.is_none() && self.usb_pid.is_none() {
            return true;
        }
        match &info.port_type {
            SerialPortType::UsbPort(usb) => {
                self.usb_vid.is_none_or(|vid| vid == usb.vid)
                    && self.usb_pid.is_none_or(|pid| pid == usb.pid)
            }
            _ => false,
        }
    }
}

fn open_boxed(
    address: &str,
    timeout: Duration,
) -> std::result::Result<Box<dyn Transport>, TransportError> {
    Ok(Box::new(SerialTransport::new(address, timeout)?))
}

fn discover_resources(filter: &DiscoveryFilter) -> Result<Vec<Resource>> {
    SerialTransport::discover(&filter.serial.unwrap_or_default())
}

/// Maps a failed open to a transport error.
///
/// `serialport` reports a port held under `TIOCEXCL` (`EBUSY`) as
/// `NoDevice`, the same kind it uses for a missing device. A busy port is
/// one that still exists.
fn open_error(err: tokio_serial::Error, path: &str) -> TransportError {
    let busy = err.kind() == tokio_serial::ErrorKind::NoDevice
        && (Path::new(path).exists() || err.description.to_ascii_lowercase().contains("busy"));

    if busy {
        TransportError::new(
            TransportErrorKind::PermissionDenied,
            format!("{path} is in use: {}", err.description),
        )
    } else {
        err.into()
    }
}

/// Discards the OS buffers and whatever the device already sent.
fn drain_on_open(
    port: &mut dyn SerialPort,
    timeout: Duration,
) -> std::result::Result<usize, TransportError> {
    port.clear(ClearBuffer::All)?;
    port.set_timeout(Duration::ZERO)?;
    let drained = drain_stale(port);
    port.set_timeout(timeout)?;
    Ok(drained)
}

/// Reads and discards until the reader has nothing more to give.
///
/// Any read error ends the drain; a zero timeout read reports "empty" as
/// `TimedOut`.
fn drain_stale<R: Read + ?Sized>(reader: &mut R) -> usize {
    let mut buf = [0u8; 1024];
    let mut total = 0usize;

    while total < MAX_DRAIN_BYTES {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(_) => break,
        }
    }

    if total >= MAX_DRAIN_BYTES {
        tracing::warn!("device is still sending after {} bytes, giving up drain", total);
    }
    total
}

fn resource_from_port(info: SerialPortInfo, bus: Option<String>) -> Resource {
    let location = match (&info.port_type, bus) {
        (SerialPortType::UsbPort(_), Some(bus)) => Some(format!("usb:{bus}")),
        (SerialPortType::UsbPort(usb), None) => Some(format!("usb:{:04x}:{:04x}", usb.vid, usb.pid)),
        (_, Some(bus)) => Some(format!("serial:{bus}")),
        (_, None) => None,
    };

    let name = Path::new(&info.port_name)
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_owned);

    let mut resource = Resource::new(TransportType::Serial, info.port_name.clone());
    resource.location = location;
    resource.name = name;

    if let SerialPortType::UsbPort(usb) = &info.port_type {
        resource.manufacturer.clone_from(&usb.manufacturer);
        resource.model.clone_from(&usb.product);
        resource.serialnum.clone_from(&usb.serial_number);
    }

    resource.info = ResourceInfo::Serial(info);
    resource
}

/// Returns the bus path of the device behind a tty, e.g. `1-1.4:1.0`.
#[cfg(target_os = "linux")]
fn bus_location(port_name: &str) -> Option<String> {
    let tty = Path::new(port_name).file_name()?;
    let device = std::fs::canonicalize(Path::new("/sys/class/tty").join(tty).join("device")).ok()?;
    let leaf = device.file_name()?.to_str()?;

    // usb-serial converters expose the tty one level below the USB interface.
    let dir = if leaf.starts_with("tty") {
        device.parent()?.file_name()?.to_str()?
    } else {
        leaf
    };
    Some(dir.to_owned())
}

#[cfg(not(target_os = "linux"))]
fn bus_location(_port_name: &str) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use tokio_serial::UsbPortInfo;

    use super::*;

    fn usb_port(name: &str, vid: u16, pid: u16) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.into(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid,
                pid,
                serial_number: Some("0042".into()),
                manufacturer: Some("2pi Labs".into()),
                product: Some("Sense X1000".into()),
            }),
        }
    }

    fn plain_port(name: &str) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.into(),
            port_type: SerialPortType::Unknown,
        }
    }

    /// Reader that hands out queued chunks, then reports a timeout.
    struct StaleReader {
        chunks: VecDeque<Vec<u8>>,
    }

    impl Read for StaleReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.chunks.pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                None => Err(io::ErrorKind::TimedOut.into()),
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum PortCall {
        Clear(ClearBuffer),
        SetTimeout(Duration),
        Read(Duration),
    }

    /// Serial port that records configuration calls and serves stale data.
    struct RecordingPort {
        calls: RefCell<Vec<PortCall>>,
        stale: VecDeque<Vec<u8>>,
        timeout: Duration,
    }

    impl RecordingPort {
        fn new(stale: Vec<Vec<u8>>) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                stale: stale.into(),
                timeout: DEFAULT_TIMEOUT,
            }
        }

        fn calls(&self) -> Vec<PortCall> {
            self.calls.borrow().clone()
        }
    }

    impl Read for RecordingPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.calls.borrow_mut().push(PortCall::Read(self.timeout));
            match self.stale.pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                None => Err(io::ErrorKind::TimedOut.into()),
            }
        }
    }

    impl Write for RecordingPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SerialPort for RecordingPort {
        fn name(&self) -> Option<String> {
            Some("/dev/ttyFAKE0".into())
        }
        fn baud_rate(&self) -> tokio_serial::Result<u32> {
            Ok(DEFAULT_BAUD_RATE)
        }
        fn data_bits(&self) -> tokio_serial::Result<DataBits> {
            Ok(DataBits::Eight)
        }
        fn flow_control(&self) -> tokio_serial::Result<FlowControl> {
            Ok(FlowControl::None)
        }
        fn parity(&self) -> tokio_serial::Result<Parity> {
            Ok(Parity::None)
        }
        fn stop_bits(&self) -> tokio_serial::Result<StopBits> {
            Ok(StopBits::One)
        }
        fn timeout(&self) -> Duration {
            self.timeout
        }
        fn set_baud_rate(&mut self, _: u32) -> tokio_serial::Result<()> {
            Ok(())
        }
        fn set_data_bits(&mut self, _: DataBits) -> tokio_serial::Result<()> {
            Ok(())
        }
        fn set_flow_control(&mut self, _: FlowControl) -> tokio_serial::Result<()> {
            Ok(())
        }
        fn set_parity(&mut self, _: Parity) -> tokio_serial::Result<()> {
            Ok(())
        }
        fn set_stop_bits(&mut self, _: StopBits) -> tokio_serial::Result<()> {
            Ok(())
        }
        fn set_timeout(&mut self, timeout: Duration) -> tokio_serial::Result<()> {
            self.calls.borrow_mut().push(PortCall::SetTimeout(timeout));
            self.timeout = timeout;
            Ok(())
        }
        fn write_request_to_send(&mut self, _: bool) -> tokio_serial::Result<()> {
            Ok(())
        }
        fn write_data_terminal_ready(&mut self, _: bool) -> tokio_serial::Result<()> {
            Ok(())
        }
        fn read_clear_to_send(&mut self) -> tokio_serial::Result<bool> {
            Ok(false)
        }
        fn read_data_set_ready(&mut self) -> tokio_serial::Result<bool> {
            Ok(false)
        }
        fn read_ring_indicator(&mut self) -> tokio_serial::Result<bool> {
            Ok(false)
        }
        fn read_carrier_detect(&mut self) -> tokio_serial::Result<bool> {
            Ok(false)
        }
        fn bytes_to_read(&self) -> tokio_serial::Result<u32> {
            Ok(0)
        }
        fn bytes_to_write(&self) -> tokio_serial::Result<u32> {
            Ok(0)
        }
        fn clear(&self, buffer_to_clear: ClearBuffer) -> tokio_serial::Result<()> {
            self.calls.borrow_mut().push(PortCall::Clear(buffer_to_clear));
            Ok(())
        }
        fn try_clone(&self) -> tokio_serial::Result<Box<dyn SerialPort>> {
            Err(tokio_serial::Error::new(
                tokio_serial::ErrorKind::Unknown,
                "not supported",
            ))
        }
        fn set_break(&self) -> tokio_serial::Result<()> {
            Ok(())
        }
        fn clear_break(&self) -> tokio_serial::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_drain_on_open_sequence() {
        let mut port = RecordingPort::new(vec![b"stale\n".to_vec(), b"more".to_vec()]);
        let requested = Duration::from_millis(250);

        let drained = drain_on_open(&mut port, requested).unwrap();

        assert_eq!(drained, 10);
        assert_eq!(
            port.calls(),
            [
                PortCall::Clear(ClearBuffer::All),
                PortCall::SetTimeout(Duration::ZERO),
                PortCall::Read(Duration::ZERO),
                PortCall::Read(Duration::ZERO),
                PortCall::Read(Duration::ZERO),
                PortCall::SetTimeout(requested),
            ]
        );
        assert_eq!(SerialPort::timeout(&port), requested);
    }

    #[test]
    fn test_drain_on_open_idle_port() {
        let mut port = RecordingPort::new(Vec::new());

        assert_eq!(drain_on_open(&mut port, DEFAULT_TIMEOUT).unwrap(), 0);
        assert_eq!(port.calls().first(), Some(&PortCall::Clear(ClearBuffer::All)));
        assert_eq!(
            port.calls().last(),
            Some(&PortCall::SetTimeout(DEFAULT_TIMEOUT))
        );
    }

    #[test]
    fn test_serial_config_defaults() {
        let config = SerialConfig::new("/dev/ttyUSB0");
        assert_eq!(config.port, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, StopBits::One);
    }

    #[test]
    fn test_serial_config_builder() {
        let config = SerialConfig::new("/dev/ttyUSB0")
            .baud_rate(9600)
            .parity(Parity::Even)
            .timeout(Duration::from_secs(2));
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.parity, Parity::Even);
        assert_eq!(config.timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_drain_stale_discards_everything() {
        let mut reader = StaleReader {
            chunks: VecDeque::from(vec![b"ERR\n".to_vec(), b"junk".to_vec()]),
        };
        assert_eq!(drain_stale(&mut reader), 8);
        assert!(reader.chunks.is_empty());
    }

    #[test]
    fn test_drain_stale_empty() {
        let mut reader = io::Cursor::new(Vec::new());
        assert_eq!(drain_stale(&mut reader), 0);
    }

    #[test]
    fn test_filter_default_matches_all() {
        let filter = SerialDiscoveryFilter::default();
        assert!(filter.matches(&usb_port("/dev/ttyACM0", 0x0483, 0x5740)));
        assert!(filter.matches(&plain_port("/dev/ttyS0")));
    }

    #[test]
    fn test_filter_usb_ids() {
        let filter = SerialDiscoveryFilter::new().usb_vid(0x0483);
        assert!(filter.matches(&usb_port("/dev/ttyACM0", 0x0483, 0x5740)));
        assert!(!filter.matches(&usb_port("/dev/ttyACM1", 0x1234, 0x5740)));
        assert!(!filter.matches(&plain_port("/dev/ttyS0")));

        let filter = filter.usb_pid(0x5740);
        assert!(filter.matches(&usb_port("/dev/ttyACM0", 0x0483, 0x5740)));
        assert!(!filter.matches(&usb_port("/dev/ttyACM0", 0x0483, 0x0001)));
    }

    #[test]
    fn test_resource_from_usb_port() {
        let resource = resource_from_port(
            usb_port("/dev/ttyACM0", 0x0483, 0x5740),
            Some("1-1.4:1.0".into()),
        );
        assert_eq!(resource.transport, TransportType::Serial);
        assert_eq!(resource.address, "/dev/ttyACM0");
        assert_eq!(resource.location.as_deref(), Some("usb:1-1.4:1.0"));
        assert_eq!(resource.name.as_deref(), Some("ttyACM0"));
        assert_eq!(resource.manufacturer.as_deref(), Some("2pi Labs"));
        assert_eq!(resource.model.as_deref(), Some("Sense X1000"));
        assert_eq!(resource.serialnum.as_deref(), Some("0042"));
        assert!(matches!(resource.info, ResourceInfo::Serial(_)));
    }

    #[test]
    fn test_resource_location_fallbacks() {
        let resource = resource_from_port(usb_port("COM3", 0x0483, 0x5740), None);
        assert_eq!(resource.location.as_deref(), Some("usb:0483:5740"));
        assert_eq!(resource.name.as_deref(), Some("COM3"));

        let resource = resource_from_port(plain_port("/dev/ttyS0"), Some("00:01".into()));
        assert_eq!(resource.location.as_deref(), Some("serial:00:01"));
        assert!(resource.manufacturer.is_none());

        let resource = resource_from_port(plain_port("/dev/ttyS1"), None);
        assert!(resource.location.is_none());
    }

    #[test]
    fn test_open_missing_port() {
        let err = SerialTransport::new("/dev/does-not-exist-scpi", Duration::from_millis(100))
            .unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::AddressInvalid);
    }

    #[test]
    fn test_busy_port_is_permission_denied() {
        let existing = env!("CARGO_MANIFEST_DIR");
        let busy = tokio_serial::Error::new(tokio_serial::ErrorKind::NoDevice, "EBUSY");
        let err = open_error(busy, existing);
        assert_eq!(err.kind, TransportErrorKind::PermissionDenied);
        assert!(err.message.contains("in use"));

        let busy = tokio_serial::Error::new(
            tokio_serial::ErrorKind::NoDevice,
            "Device or resource busy",
        );
        let err = open_error(busy, "/dev/does-not-exist-scpi");
        assert_eq!(err.kind, TransportErrorKind::PermissionDenied);
    }

    #[test]
    fn test_missing_port_is_address_invalid() {
        let gone = tokio_serial::Error::new(tokio_serial::ErrorKind::NoDevice, "No such device");
        let err = open_error(gone, "/dev/does-not-exist-scpi");
        assert_eq!(err.kind, TransportErrorKind::AddressInvalid);

        let denied = tokio_serial::Error::new(
            tokio_serial::ErrorKind::Io(io::ErrorKind::PermissionDenied),
            "Permission denied",
        );
        let err = open_error(denied, env!("CARGO_MANIFEST_DIR"));
        assert_eq!(err.kind, TransportErrorKind::PermissionDenied);
    }

    #[test]
    #[ignore = "Requires /sys/class/tty - not available in sandboxed builds"]
    fn test_discover_ports() {
        // Just verify it doesn't panic
        let _ = SerialTransport::discover(&SerialDiscoveryFilter::default());
    }

    #[test]
    #[ignore = "Requires a serial device at SCPI_SERIAL_PORT"]
    fn test_second_open_is_refused() {
        let path = std::env::var("SCPI_SERIAL_PORT").unwrap();
        let mut first = SerialTransport::new(path.as_str(), DEFAULT_TIMEOUT).unwrap();
        let err = SerialTransport::new(path.as_str(), DEFAULT_TIMEOUT).unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::PermissionDenied);

        first.close().unwrap();
        first.close().unwrap();
        assert!(!first.is_open());
        assert!(SerialTransport::new(path, DEFAULT_TIMEOUT).is_ok());
    }
}
