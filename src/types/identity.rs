//! Instrument identification.

/// Instrument identity returned by the `*IDN?` common query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    /// Manufacturer name.
    pub manufacturer: String,
    /// Model name.
    pub model: String,
    /// Serial number (`0` when the instrument does not report one).
    pub serial: String,
    /// Firmware revision.
    pub firmware: String,
}

impl Identity {
    /// Parses an `*IDN?` reply of the form `<manufacturer>,<model>,<serial>,<firmware>`.
    ///
    /// Missing fields are left empty. The firmware field keeps any further commas.
    #[must_use]
    pub fn parse(reply: &str) -> Self {
        let mut fields = reply.trim().splitn(4, ',').map(|f| f.trim().to_owned());
        Self {
            manufacturer: fields.next().unwrap_or_default(),
            model: fields.next().unwrap_or_default(),
            serial: fields.next().unwrap_or_default(),
            firmware: fields.next().unwrap_or_default(),
        }
    }
}
