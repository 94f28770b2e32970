//! Value Codec
//!
//! Reversible encoding of values SQLite cannot store natively.
//!
//! A value is serialized with `bincode` inside a small frame:
//!
//! ```text
//! 0x80 0x04 <bincode body> '.'
//! ```
//!
//! The frame is then represented as text in one of two forms:
//!
//! - **raw**: every byte becomes the latin-1 character with the same code
//!   point. Used for bound parameters, which SQLite stores verbatim.
//! - **hex**: upper-case base-16. Used when the payload has to be spelled
//!   out inside SQL literal text.
//!
//! Decoding sniffs the shape of every text value read back, since SQLite
//! does not remember the declared column type. A plain string that
//! happens to look like a payload (starts with `"8004"` and ends with
//! `"2E"`, say) is treated as one. There is no type tag to tell them apart.

use crate::error::{Error, Result};
use crate::value::Value;

const PROTOCOL: [u8; 2] = [0x80, 0x04];
const STOP: u8 = b'.';

const RAW_PREFIX: &str = "\u{80}\u{4}";
const RAW_SUFFIX: char = '.';
const HEX_PREFIX: &str = "8004";
const HEX_SUFFIX: &str = "2E";

/// Serialize a value into a framed payload.
pub fn serialize(value: &Value) -> Result<Vec<u8>> {
    let mut frame = PROTOCOL.to_vec();
    bincode::serialize_into(&mut frame, value)?;
    frame.push(STOP);
    Ok(frame)
}

/// Deserialize a framed payload produced by [`serialize`].
pub fn deserialize(frame: &[u8]) -> Result<Value> {
    let body = frame
        .strip_prefix(&PROTOCOL[..])
        .and_then(|rest| rest.strip_suffix(&[STOP]))
        .ok_or_else(|| Error::Codec("payload is not framed".to_string()))?;
    Ok(bincode::deserialize(body)?)
}

/// Encode into the raw (latin-1) text form.
pub fn encode_raw(value: &Value) -> Result<String> {
    Ok(serialize(value)?.into_iter().map(char::from).collect())
}

/// Encode into the hex text form.
pub fn encode_hex(value: &Value) -> Result<String> {
    Ok(hex::encode_upper(serialize(value)?))
}

pub fn is_raw_payload(text: &str) -> bool {
    text.starts_with(RAW_PREFIX) && text.ends_with(RAW_SUFFIX)
}

pub fn is_hex_payload(text: &str) -> bool {
    text.starts_with(HEX_PREFIX) && text.ends_with(HEX_SUFFIX)
}

/// Decode a value read back from SQLite.
///
/// Non-text values and text that matches neither signature are returned
/// unchanged.
pub fn decode(value: Value) -> Result<Value> {
    match value {
        Value::Text(text) if is_raw_payload(&text) => decode_raw(&text),
        Value::Text(text) if is_hex_payload(&text) => decode_hex(&text),
        other => Ok(other),
    }
}

fn decode_raw(text: &str) -> Result<Value> {
    let frame = text
        .chars()
        .map(|c| {
            u8::try_from(u32::from(c))
                .map_err(|_| Error::Codec(format!("character {:?} is outside latin-1", c)))
        })
        .collect::<Result<Vec<u8>>>()?;
    deserialize(&frame)
}

fn decode_hex(text: &str) -> Result<Value> {
    deserialize(&hex::decode(text)?)
}
