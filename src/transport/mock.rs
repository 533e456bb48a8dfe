//! Scripted in-memory instrument for session tests.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::error::{TransportError, TransportErrorKind};
use crate::protocol::{DEFAULT_TERMINATOR, is_query};
use crate::transport::{DEFAULT_TIMEOUT, Transport};
use crate::types::{ScpiEvent, TransportType};

/// Fake instrument with canned query responses and an error queue.
///
/// Unknown queries and rejected commands push an event onto the error queue
/// instead of answering, like real instruments do.
pub(crate) struct MockInstrument {
    responses: HashMap<String, Vec<u8>>,
    rejected: HashMap<String, ScpiEvent>,
    error_queue: VecDeque<ScpiEvent>,
    pending: Vec<u8>,
    output: VecDeque<u8>,
    received: Vec<String>,
    read_chunk: usize,
    fail_reads: Option<TransportErrorKind>,
    open: bool,
}

impl MockInstrument {
    pub(crate) fn new() -> Self {
        Self {
            responses: HashMap::new(),
            rejected: HashMap::new(),
            error_queue: VecDeque::new(),
            pending: Vec::new(),
            output: VecDeque::new(),
            received: Vec::new(),
            read_chunk: usize::MAX,
            fail_reads: None,
            open: true,
        }
    }

    /// Answers `header` with `response` (terminator appended).
    pub(crate) fn respond(mut self, header: &str, response: impl AsRef<[u8]>) -> Self {
        self.responses
            .insert(header.to_owned(), response.as_ref().to_vec());
        self
    }

    /// Queues an error whenever `header` is received.
    pub(crate) fn reject(mut self, header: &str, code: i32, description: &str) -> Self {
        self.rejected
            .insert(header.to_owned(), ScpiEvent::new(code, description));
        self
    }

    /// Preloads the error queue.
    pub(crate) fn queue_error(mut self, code: i32, description: &str) -> Self {
        self.error_queue.push_back(ScpiEvent::new(code, description));
        self
    }

    /// Limits how many bytes each read returns.
    pub(crate) const fn read_chunk(mut self, size: usize) -> Self {
        self.read_chunk = size;
        self
    }

    /// Makes every read fail with `kind`.
    pub(crate) fn fail_reads(&mut self, kind: Option<TransportErrorKind>) {
        self.fail_reads = kind;
    }

    /// Puts bytes on the wire as if the instrument sent them unprompted.
    pub(crate) fn inject(&mut self, data: &[u8]) {
        self.output.extend(data);
    }

    /// Program messages received so far, without terminators.
    pub(crate) fn received(&self) -> &[String] {
        &self.received
    }

    pub(crate) fn error_queue_len(&self) -> usize {
        self.error_queue.len()
    }

    fn handle(&mut self, message: &str) {
        self.received.push(message.to_owned());
        let header = message.split_whitespace().next().unwrap_or_default();

        if let Some(event) = self.rejected.get(header) {
            self.error_queue.push_back(event.clone());
            return;
        }

        match header.to_ascii_uppercase().as_str() {
            "SYST:ERR?" | "SYSTEM:ERROR?" | "SYST:ERR:NEXT?" => {
                let event = self
                    .error_queue
                    .pop_front()
                    .unwrap_or_else(|| ScpiEvent::new(0, "No error"));
                self.answer(event.to_string().as_bytes());
            }
            "*CLS" => self.error_queue.clear(),
            _ => {
                if let Some(response) = self.responses.get(header).cloned() {
                    self.answer(&response);
                } else if is_query(message) {
                    self.error_queue
                        .push_back(ScpiEvent::new(-113, "Undefined header"));
                }
            }
        }
    }

    fn answer(&mut self, response: &[u8]) {
        self.output.extend(response);
        self.output.push_back(DEFAULT_TERMINATOR);
    }
}

impl Transport for MockInstrument {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if !self.open {
            return Err(TransportError::not_open());
        }
        if let Some(kind) = self.fail_reads {
            return Err(TransportError::new(kind, "scripted failure"));
        }
        if self.output.is_empty() {
            return Err(TransportError::new(TransportErrorKind::Timeout, "no data"));
        }

        let n = buf.len().min(self.read_chunk).min(self.output.len());
        for (slot, byte) in buf.iter_mut().zip(self.output.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::not_open());
        }
        self.pending.extend_from_slice(data);

        while let Some(end) = self.pending.iter().position(|&b| b == DEFAULT_TERMINATOR) {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            let message = String::from_utf8_lossy(&line[..end]).into_owned();
            self.handle(&message);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn transport_type(&self) -> TransportType {
        TransportType::TcpIp
    }

    fn timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }
}
