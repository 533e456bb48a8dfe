//! Response data parsing for the SCPI protocol.
//!
//! This module decodes individual response data elements (IEEE 488.2
//! section 8.7) from the bytes of one response message.

use bytes::Bytes;

use crate::error::ParseError;
use crate::protocol::frame::parse_ascii_len;
use crate::protocol::value::ScpiNumber;

/// Value instruments report for positive infinity (`INF`).
pub const SCPI_INF: f64 = 9.9e37;

/// Value instruments report for negative infinity (`NINF`).
pub const SCPI_NINF: f64 = -9.9e37;

/// Value instruments report for not-a-number (`NAN`).
pub const SCPI_NAN: f64 = 9.91e37;

/// Returns the data as trimmed UTF-8 text.
fn text<'a>(data: &'a [u8], expected: &'static str) -> Result<&'a str, ParseError> {
    std::str::from_utf8(data)
        .map(str::trim)
        .map_err(|_| ParseError::invalid(expected, data))
}

/// Parses boolean response data (`1`, `0`, `ON`, `OFF`, or any number).
pub fn parse_bool(data: &[u8]) -> Result<bool, ParseError> {
    let value = text(data, "boolean")?;

    if value.eq_ignore_ascii_case("ON") {
        return Ok(true);
    }
    if value.eq_ignore_ascii_case("OFF") {
        return Ok(false);
    }

    match parse_number(value.as_bytes()) {
        Ok(ScpiNumber::Int(n)) => Ok(n != 0),
        Ok(ScpiNumber::Float(f)) => Ok(f.round() != 0.0),
        Err(_) => Err(ParseError::invalid("boolean", data)),
    }
}

/// Parses numeric response data (NR1, NR2, NR3, non-decimal and mnemonics).
///
/// Integers are kept exact; anything with a fraction or exponent is a float.
/// `#H`, `#Q` and `#B` prefixed values are parsed as hexadecimal, octal and
/// binary integers.
pub fn parse_number(data: &[u8]) -> Result<ScpiNumber, ParseError> {
    let value = text(data, "number")?;

    if let Some(rest) = value.strip_prefix('#') {
        let (radix, digits) = match rest.as_bytes().first() {
            Some(b'H' | b'h') => (16, &rest[1..]),
            Some(b'Q' | b'q') => (8, &rest[1..]),
            Some(b'B' | b'b') => (2, &rest[1..]),
            _ => return Err(ParseError::invalid("number", data)),
        };
        return i64::from_str_radix(digits, radix)
            .map(ScpiNumber::Int)
            .map_err(|_| ParseError::invalid("number", data));
    }

    match value.to_ascii_uppercase().as_str() {
        "INF" | "+INF" => return Ok(ScpiNumber::Float(f64::INFINITY)),
        "NINF" | "-INF" => return Ok(ScpiNumber::Float(f64::NEG_INFINITY)),
        "NAN" => return Ok(ScpiNumber::Float(f64::NAN)),
        _ => {}
    }

    if let Ok(n) = value.parse::<i64>() {
        return Ok(ScpiNumber::Int(n));
    }

    let f = value
        .parse::<f64>()
        .map_err(|_| ParseError::invalid("number", data))?;

    // Map the reserved SCPI values back onto IEEE specials.
    #[allow(clippy::float_cmp)]
    let f = if f == SCPI_NAN {
        f64::NAN
    } else if f >= SCPI_INF {
        f64::INFINITY
    } else if f <= SCPI_NINF {
        f64::NEG_INFINITY
    } else {
        f
    };

    Ok(ScpiNumber::Float(f))
}

/// Parses character response data (unquoted mnemonics such as `READY`).
pub fn parse_chars(data: &[u8]) -> Result<String, ParseError> {
    let value = text(data, "character data")?;
    if value.is_empty() || value.contains(['"', '\'']) {
        return Err(ParseError::invalid("character data", data));
    }
    Ok(value.to_owned())
}

/// Parses string response data enclosed in double or single quotes.
///
/// Doubled quote characters inside the string are unescaped.
pub fn parse_string(data: &[u8]) -> Result<String, ParseError> {
    let value = text(data, "string")?;

    let quote = match value.chars().next() {
        Some(q @ ('"' | '\'')) => q,
        _ => return Err(ParseError::invalid("string", data)),
    };

    let inner = value
        .strip_prefix(quote)
        .and_then(|s| s.strip_suffix(quote))
        .ok_or_else(|| ParseError::invalid("string", data))?;

    let doubled = format!("{quote}{quote}");
    Ok(inner.replace(&doubled, &quote.to_string()))
}

/// Parses an arbitrary block (`#<n><len><payload>` or `#0<payload>`).
///
/// Leading whitespace is skipped; anything after a definite-length payload is
/// ignored.
pub fn parse_block(data: &Bytes) -> Result<Bytes, ParseError> {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .ok_or_else(|| ParseError::BlockHeader("empty response".into()))?;

    if data[start] != b'#' {
        return Err(ParseError::BlockHeader(format!(
            "expected '#', got {:?}",
            char::from(data[start])
        )));
    }

    let count = *data
        .get(start + 1)
        .ok_or_else(|| ParseError::BlockHeader("missing length digit count".into()))?;
    if !count.is_ascii_digit() {
        return Err(ParseError::BlockHeader(format!(
            "invalid length digit count {:?}",
            char::from(count)
        )));
    }

    let digits = usize::from(count - b'0');
    let len_start = start + 2;

    if digits == 0 {
        return Ok(data.slice(len_start..));
    }

    let len_end = len_start + digits;
    let len_field = data
        .get(len_start..len_end)
        .ok_or_else(|| ParseError::BlockHeader("truncated length field".into()))?;
    let len = parse_ascii_len(len_field).ok_or_else(|| {
        ParseError::BlockHeader(format!(
            "invalid length field {:?}",
            String::from_utf8_lossy(len_field)
        ))
    })?;

    let available = data.len() - len_end;
    if available < len {
        return Err(ParseError::IncompleteBlock {
            expected: len,
            got: available,
        });
    }

    Ok(data.slice(len_end..len_end + len))
}

/// Parses a comma separated list of numbers. An empty response is an empty list.
pub fn parse_number_list(data: &[u8]) -> Result<Vec<ScpiNumber>, ParseError> {
    let value = text(data, "number list")?;
    if value.is_empty() {
        return Ok(Vec::new());
    }

    value
        .split(',')
        .map(|item| parse_number(item.as_bytes()))
        .collect()
}
