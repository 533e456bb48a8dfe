//! SCPI session over a [`Transport`].
//!
//! [`ScpiDevice`] turns a byte-stream transport into command/response
//! exchanges: it terminates outgoing program messages, frames incoming
//! response messages, and polls the instrument's error queue.
//!
//! Every exchange moves through [`ExchangeState`]:
//!
//! ```text
//! Idle ──write──▶ CommandSent ──read──▶ AwaitingResponse ──▶ ResponseReceived
//!                     │ (no response expected)                   │
//!                     ▼                                          ▼
//!                   Idle ◀──────────── error query ──────▶ ErrorQueued
//! ```

use std::time::Duration;

use bytes::Bytes;

use crate::error::{Error, ParseError, Result, TransportError};
use crate::protocol::{
    CommonCommand, DEFAULT_TERMINATOR, LineDecoder, ScpiBool, ScpiNumber, ScpiType,
    encode_command, is_query,
};
use crate::resource::Resource;
use crate::transport::Transport;
use crate::types::{Identity, ScpiEvent};

/// Default error queue query.
pub const DEFAULT_ERROR_QUERY: &str = "SYST:ERR?";

/// Default upper bound on entries read by [`ScpiDevice::drain_errors`].
pub const DEFAULT_MAX_ERROR_QUEUE: usize = 32;

const READ_CHUNK: usize = 4096;

/// Longest response logged verbatim at trace level.
const TRACE_TEXT_LIMIT: usize = 256;

/// When the session polls the error queue on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorCheck {
    /// Only when [`ScpiDevice::check_error`] or friends are called.
    #[default]
    Manual,
    /// After every `write`, `query` and `execute`.
    AfterEachCommand,
}

/// Progress of the current command/response exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExchangeState {
    /// No exchange in progress.
    #[default]
    Idle,
    /// A program message was written.
    CommandSent,
    /// Waiting for the response message.
    AwaitingResponse,
    /// A complete response message was read.
    ResponseReceived,
    /// The last error query returned a non-zero entry.
    ErrorQueued,
}

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Message terminator for both directions.
    pub terminator: u8,
    /// Query that pops one error queue entry.
    pub error_query: String,
    /// Error queue polling policy.
    pub error_check: ErrorCheck,
    /// Maximum entries read by one [`ScpiDevice::drain_errors`] call.
    pub max_error_queue: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            terminator: DEFAULT_TERMINATOR,
            error_query: DEFAULT_ERROR_QUERY.to_owned(),
            error_check: ErrorCheck::Manual,
            max_error_queue: DEFAULT_MAX_ERROR_QUEUE,
        }
    }
}

impl DeviceConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the message terminator.
    #[must_use]
    pub const fn terminator(mut self, terminator: u8) -> Self {
        self.terminator = terminator;
        self
    }

    /// Sets the error queue query.
    #[must_use]
    pub fn error_query(mut self, query: impl Into<String>) -> Self {
        self.error_query = query.into();
        self
    }

    /// Sets the error queue polling policy.
    #[must_use]
    pub const fn error_check(mut self, policy: ErrorCheck) -> Self {
        self.error_check = policy;
        self
    }

    /// Sets the drain bound.
    #[must_use]
    pub const fn max_error_queue(mut self, max: usize) -> Self {
        self.max_error_queue = max;
        self
    }
}

/// An SCPI instrument reached through a transport.
///
/// Exchanges are strictly sequential: each call completes before the next one
/// starts. A transport error aborts the exchange, drops any partially received
/// data and returns the session to [`ExchangeState::Idle`]. Nothing is retried.
pub struct ScpiDevice<T = Box<dyn Transport>> {
    transport: T,
    decoder: LineDecoder,
    config: DeviceConfig,
    state: ExchangeState,
}

impl ScpiDevice<Box<dyn Transport>> {
    /// Opens a discovered resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be opened.
    pub fn open(resource: &Resource, timeout: Duration) -> Result<Self> {
        tracing::info!("opening {}", resource);
        Ok(Self::new(resource.open(timeout)?))
    }
}

impl<T: Transport> ScpiDevice<T> {
    /// Creates a session on an open transport with default settings.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, DeviceConfig::default())
    }

    /// Creates a session on an open transport.
    #[must_use]
    pub fn with_config(transport: T, config: DeviceConfig) -> Self {
        Self {
            transport,
            decoder: LineDecoder::with_terminator(config.terminator),
            config,
            state: ExchangeState::Idle,
        }
    }

    /// Returns the current exchange state.
    #[must_use]
    pub const fn state(&self) -> ExchangeState {
        self.state
    }

    /// Returns the session configuration.
    #[must_use]
    pub const fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Returns the underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the underlying transport mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Returns true while the transport is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Consumes the session and returns the transport.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Sends a command.
    ///
    /// A query's response is left for [`read_line`](Self::read_line).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails, or, with
    /// [`ErrorCheck::AfterEachCommand`], if the instrument reports an error.
    pub fn write(&mut self, command: &str) -> Result<()> {
        self.write_with(command, &[])
    }

    /// Sends a command with parameters.
    ///
    /// # Errors
    ///
    /// Same as [`write`](Self::write).
    pub fn write_with(&mut self, command: &str, params: &[&dyn ScpiType]) -> Result<()> {
        self.send(command, params)?;
        if is_query(command) {
            return Ok(());
        }
        self.state = ExchangeState::Idle;
        self.auto_check()
    }

    /// Reads one response message, without its terminator.
    ///
    /// # Errors
    ///
    /// Returns a transport error if no complete message arrives before the
    /// transport times out.
    pub fn read_line(&mut self) -> Result<Bytes> {
        let line = self.receive()?;
        self.auto_check()?;
        Ok(line)
    }

    /// Sends a query and returns the raw response message.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails.
    pub fn query_bytes(&mut self, command: &str) -> Result<Bytes> {
        self.send(command, &[])?;
        self.read_line()
    }

    /// Sends a query and returns the response as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails.
    pub fn query(&mut self, command: &str) -> Result<String> {
        let line = self.query_bytes(command)?;
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    /// Sends a query and decodes the response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the response does not decode as `R`.
    pub fn query_as<R: ScpiType>(&mut self, command: &str) -> Result<R> {
        let line = self.query_bytes(command)?;
        Ok(R::decode(&line)?)
    }

    /// Sends a command with parameters and, for queries, decodes the response.
    ///
    /// Returns `None` for commands that do not end in `?`.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails or the response does not decode.
    pub fn execute<R: ScpiType>(
        &mut self,
        command: &str,
        params: &[&dyn ScpiType],
    ) -> Result<Option<R>> {
        self.send(command, params)?;
        if !is_query(command) {
            self.state = ExchangeState::Idle;
            self.auto_check()?;
            return Ok(None);
        }

        let line = self.read_line()?;
        Ok(Some(R::decode(&line)?))
    }

    /// Pops one entry from the instrument's error queue.
    ///
    /// Returns `None` when the queue is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails or the reply is malformed.
    pub fn next_error(&mut self) -> Result<Option<ScpiEvent>> {
        let query = self.config.error_query.clone();
        self.send(&query, &[])?;
        let line = self.receive()?;
        let event = ScpiEvent::parse(&line)?;

        if event.is_no_error() {
            self.state = ExchangeState::Idle;
            return Ok(None);
        }

        tracing::debug!("instrument error {}", event);
        self.state = ExchangeState::ErrorQueued;
        Ok(Some(event))
    }

    /// Polls the error queue once and turns a pending entry into an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Scpi`] with the entry if the queue was not empty.
    pub fn check_error(&mut self) -> Result<()> {
        match self.next_error()? {
            Some(event) => Err(Error::Scpi(event)),
            None => Ok(()),
        }
    }

    /// Reads error queue entries until it is empty.
    ///
    /// Stops after [`DeviceConfig::max_error_queue`] entries.
    ///
    /// # Errors
    ///
    /// Returns an error if an exchange fails.
    pub fn drain_errors(&mut self) -> Result<Vec<ScpiEvent>> {
        let mut events = Vec::new();

        while events.len() < self.config.max_error_queue {
            match self.next_error()? {
                Some(event) => events.push(event),
                None => return Ok(events),
            }
        }

        tracing::warn!(
            "error queue still not empty after {} entries",
            self.config.max_error_queue
        );
        Ok(events)
    }

    /// Queries the instrument identification (`*IDN?`).
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails.
    pub fn identify(&mut self) -> Result<Identity> {
        let reply = self.query(CommonCommand::Identify.header())?;
        Ok(Identity::parse(&reply))
    }

    /// Resets the instrument (`*RST`).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn reset(&mut self) -> Result<()> {
        self.write(CommonCommand::Reset.header())
    }

    /// Clears status registers and the error queue (`*CLS`).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn clear_status(&mut self) -> Result<()> {
        self.write(CommonCommand::ClearStatus.header())
    }

    /// Blocks until pending operations complete (`*OPC?`).
    ///
    /// # Errors
    ///
    /// Returns a timeout error if the instrument does not answer in time.
    pub fn wait_complete(&mut self) -> Result<()> {
        let done: ScpiBool = self.query_as(CommonCommand::OperationComplete.header())?;
        if done.as_bool() {
            Ok(())
        } else {
            Err(ParseError::invalid("operation complete", b"0").into())
        }
    }

    /// Makes the instrument finish pending operations before the next command (`*WAI`).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn wait(&mut self) -> Result<()> {
        self.write(CommonCommand::Wait.header())
    }

    /// Runs the instrument self test (`*TST?`). Zero means passed.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails.
    pub fn self_test(&mut self) -> Result<i64> {
        let result: ScpiNumber = self.query_as(CommonCommand::SelfTest.header())?;
        Ok(result.as_int())
    }

    /// Reads the status byte (`*STB?`).
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails or the value is out of range.
    pub fn status_byte(&mut self) -> Result<u8> {
        let line = self.query_bytes(CommonCommand::StatusByte.header())?;
        let value = ScpiNumber::decode(&line)?.as_int();
        u8::try_from(value).map_err(|_| ParseError::invalid("status byte", &line).into())
    }

    /// Closes the transport. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails to close.
    pub fn close(&mut self) -> Result<()> {
        self.decoder.clear();
        self.state = ExchangeState::Idle;
        self.transport.close()?;
        Ok(())
    }

    fn send(&mut self, command: &str, params: &[&dyn ScpiType]) -> Result<()> {
        if !self.transport.is_open() {
            return Err(TransportError::not_open().into());
        }

        if self.decoder.buffered() > 0 {
            tracing::debug!("discarding {} unread bytes", self.decoder.buffered());
            self.decoder.clear();
        }

        let message = encode_command(command, params, self.config.terminator);
        tracing::trace!("-> {}", command.trim_end());

        self.state = ExchangeState::CommandSent;
        self.transport
            .write_all(&message)
            .map_err(|e| self.abort(e))
    }

    fn receive(&mut self) -> Result<Bytes> {
        self.state = ExchangeState::AwaitingResponse;
        let mut buf = [0u8; READ_CHUNK];

        loop {
            if let Some(line) = self.decoder.decode() {
                if line.len() <= TRACE_TEXT_LIMIT {
                    tracing::trace!("<- {}", String::from_utf8_lossy(&line));
                } else {
                    tracing::trace!("<- {} bytes", line.len());
                }
                self.state = ExchangeState::ResponseReceived;
                return Ok(line);
            }

            let n = self
                .transport
                .read(&mut buf)
                .map_err(|e| self.abort(e))?;
            self.decoder.feed(&buf[..n]);
        }
    }

    fn auto_check(&mut self) -> Result<()> {
        match self.config.error_check {
            ErrorCheck::Manual => Ok(()),
            ErrorCheck::AfterEachCommand => self.check_error(),
        }
    }

    fn abort(&mut self, err: TransportError) -> Error {
        tracing::debug!("exchange aborted: {}", err);
        self.decoder.clear();
        self.state = ExchangeState::Idle;
        Error::Transport(err)
    }
}

impl<T: Transport> std::fmt::Debug for ScpiDevice<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScpiDevice")
            .field("transport", &self.transport.transport_type())
            .field("open", &self.transport.is_open())
            .field("state", &self.state)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
