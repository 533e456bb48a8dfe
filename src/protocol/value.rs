//! Typed SCPI parameter and response values.
//!
//! Each type knows how to encode itself as a program data element and how to
//! decode itself from one response message:
//!
//! | Type              | Encodes as          | Decodes from                 |
//! |-------------------|---------------------|------------------------------|
//! | [`ScpiBool`]      | `1` / `0`           | `1`, `0`, `ON`, `OFF`        |
//! | [`ScpiNumber`]    | `42`, `1.5`, `INF`  | NR1/NR2/NR3, `#H..`, `INF`   |
//! | [`ScpiChars`]     | `READY`             | unquoted mnemonic            |
//! | [`ScpiString`]    | `"text"`            | `"text"` or `'text'`         |
//! | [`ScpiArbBlock`]  | `#15hello`          | `#<n><len><bytes>`, `#0...`  |
//! | [`ScpiNumberArray`] | `1,2.5,3`         | comma separated numbers      |

use std::fmt::Write as _;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ParseError;
use crate::protocol::parser::{
    parse_block, parse_bool, parse_chars, parse_number, parse_number_list, parse_string,
};

/// A value that can be sent as a parameter or decoded from a response.
pub trait ScpiType {
    /// Appends the program data encoding of this value.
    fn encode(&self, buf: &mut BytesMut);

    /// Decodes a value from one response message.
    fn decode(data: &Bytes) -> Result<Self, ParseError>
    where
        Self: Sized;
}

/// Boolean program/response data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScpiBool(pub bool);

impl ScpiBool {
    /// Returns the boolean value.
    #[must_use]
    pub const fn as_bool(self) -> bool {
        self.0
    }
}

impl From<bool> for ScpiBool {
    fn from(value: bool) -> Self {
        Self(value)
    }
}

impl ScpiType for ScpiBool {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(if self.0 { b'1' } else { b'0' });
    }

    fn decode(data: &Bytes) -> Result<Self, ParseError> {
        parse_bool(data).map(Self)
    }
}

/// Numeric program/response data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScpiNumber {
    /// Exact integer (NR1 or non-decimal).
    Int(i64),
    /// Decimal or exponent form (NR2/NR3) and the infinities/NaN.
    Float(f64),
}

impl ScpiNumber {
    /// Returns the value as an integer, truncating any fraction.
    ///
    /// Non-finite values saturate.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_int(self) -> i64 {
        match self {
            Self::Int(n) => n,
            Self::Float(f) => f as i64,
        }
    }

    /// Returns the value as a float.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(self) -> f64 {
        match self {
            Self::Int(n) => n as f64,
            Self::Float(f) => f,
        }
    }

    fn write_to(self, out: &mut String) {
        match self {
            Self::Int(n) => {
                let _ = write!(out, "{n}");
            }
            Self::Float(f) if f.is_nan() => out.push_str("NAN"),
            Self::Float(f) if f.is_infinite() && f.is_sign_positive() => out.push_str("INF"),
            Self::Float(f) if f.is_infinite() => out.push_str("NINF"),
            Self::Float(f) => {
                let magnitude = f.abs();
                if magnitude != 0.0 && !(1e-4..1e15).contains(&magnitude) {
                    let _ = write!(out, "{f:E}");
                } else {
                    let _ = write!(out, "{f}");
                }
            }
        }
    }
}

impl From<i64> for ScpiNumber {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ScpiNumber {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for ScpiNumber {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for ScpiNumber {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl ScpiType for ScpiNumber {
    fn encode(&self, buf: &mut BytesMut) {
        let mut out = String::new();
        self.write_to(&mut out);
        buf.put_slice(out.as_bytes());
    }

    fn decode(data: &Bytes) -> Result<Self, ParseError> {
        parse_number(data)
    }
}

/// Character program/response data (an unquoted mnemonic such as `READY`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScpiChars(pub String);

impl ScpiChars {
    /// Returns the mnemonic.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ScpiChars {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl ScpiType for ScpiChars {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_slice(self.0.as_bytes());
    }

    fn decode(data: &Bytes) -> Result<Self, ParseError> {
        parse_chars(data).map(Self)
    }
}

/// String program/response data, sent double-quoted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScpiString(pub String);

impl ScpiString {
    /// Returns the unquoted string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ScpiString {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl ScpiType for ScpiString {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(b'"');
        buf.put_slice(self.0.replace('"', "\"\"").as_bytes());
        buf.put_u8(b'"');
    }

    fn decode(data: &Bytes) -> Result<Self, ParseError> {
        parse_string(data).map(Self)
    }
}

/// Definite-length arbitrary block of binary data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScpiArbBlock(pub Bytes);

impl ScpiArbBlock {
    /// Returns the block payload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for ScpiArbBlock {
    fn from(value: Vec<u8>) -> Self {
        Self(Bytes::from(value))
    }
}

impl From<&[u8]> for ScpiArbBlock {
    fn from(value: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(value))
    }
}

impl ScpiType for ScpiArbBlock {
    fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(12 + self.0.len());
        put_block_header(buf, self.0.len());
        buf.put_slice(&self.0);
    }

    fn decode(data: &Bytes) -> Result<Self, ParseError> {
        parse_block(data).map(Self)
    }
}

/// Writes a block header for `len` payload bytes.
///
/// The digit count is a single digit, so payloads of 1e9 bytes or more use
/// the indefinite `#0` form, which must be the last element of the message.
fn put_block_header(buf: &mut BytesMut, len: usize) {
    let digits = len.to_string();
    buf.put_u8(b'#');
    if digits.len() > 9 {
        buf.put_u8(b'0');
    } else {
        buf.put_u8(b'0' + digits.len() as u8);
        buf.put_slice(digits.as_bytes());
    }
}

/// Comma separated list of numbers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScpiNumberArray(pub Vec<ScpiNumber>);

impl ScpiNumberArray {
    /// Returns the values as floats.
    #[must_use]
    pub fn as_float_list(&self) -> Vec<f64> {
        self.0.iter().map(|n| n.as_float()).collect()
    }

    /// Returns the values as integers.
    #[must_use]
    pub fn as_int_list(&self) -> Vec<i64> {
        self.0.iter().map(|n| n.as_int()).collect()
    }
}

impl From<Vec<f64>> for ScpiNumberArray {
    fn from(values: Vec<f64>) -> Self {
        Self(values.into_iter().map(ScpiNumber::Float).collect())
    }
}

impl From<Vec<i64>> for ScpiNumberArray {
    fn from(values: Vec<i64>) -> Self {
        Self(values.into_iter().map(ScpiNumber::Int).collect())
    }
}

impl ScpiType for ScpiNumberArray {
    fn encode(&self, buf: &mut BytesMut) {
        let mut out = String::new();
        for (i, number) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            number.write_to(&mut out);
        }
        buf.put_slice(out.as_bytes());
    }

    fn decode(data: &Bytes) -> Result<Self, ParseError> {
        parse_number_list(data).map(Self)
    }
}

/// Raw response text, decoded lossily as UTF-8.
impl ScpiType for String {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_slice(self.as_bytes());
    }

    fn decode(data: &Bytes) -> Result<Self, ParseError> {
        Ok(String::from_utf8_lossy(data).into_owned())
    }
}
