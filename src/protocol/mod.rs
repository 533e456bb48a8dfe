//! Protocol definitions for SCPI communication.
//!
//! This module contains the low-level protocol types including:
//! - Message framing (terminator, arbitrary blocks)
//! - Command encoding and IEEE 488.2 common commands
//! - Response data parsing
//! - Typed parameter/response values

pub mod command;
pub mod frame;
pub mod parser;
pub mod value;

pub use command::{CommonCommand, encode as encode_command, is_query};
pub use frame::{DEFAULT_TERMINATOR, LineDecoder};
pub use parser::{
    parse_block, parse_bool, parse_chars, parse_number, parse_number_list, parse_string,
};
pub use value::{
    ScpiArbBlock, ScpiBool, ScpiChars, ScpiNumber, ScpiNumberArray, ScpiString, ScpiType,
};
