//! Canonical CBOR encoding for CTAP maps
//!
//! CTAP requests and responses are CBOR maps keyed by small integers, and
//! authenticators require canonical key ordering: positive keys sorted
//! ascending come before negative keys sorted by ascending absolute value
//! (the order of their encoded form). [`MapBuilder`] and [`MapParser`]
//! provide that on top of `cbor4ii`; encoding goes through a stack buffer
//! since CTAP messages are bounded at 7609 bytes.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};

use serde::{Deserialize, Serialize};

/// CBOR value type used for nested structures such as COSE keys
pub type Value = cbor4ii::core::Value;

/// Maximum CTAP message size after transport reassembly
pub const MAX_MESSAGE_LEN: usize = 7609;

/// Encoding or decoding failed at the CBOR layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CborError {
    /// Value could not be encoded or exceeds the message size bound
    Encode,
    /// Input was not the expected CBOR shape
    Decode,
}

impl fmt::Display for CborError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CborError::Encode => write!(f, "CBOR encoding failed"),
            CborError::Decode => write!(f, "CBOR decoding failed"),
        }
    }
}

impl std::error::Error for CborError {}

type Result<T> = std::result::Result<T, CborError>;

/// Fixed-size stack buffer implementing `Write`
pub struct StackBuffer {
    buf: [u8; MAX_MESSAGE_LEN],
    pos: usize,
}

impl StackBuffer {
    pub const fn new() -> Self {
        Self {
            buf: [0u8; MAX_MESSAGE_LEN],
            pos: 0,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.pos]
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.buf[..self.pos].to_vec()
    }
}

impl Write for StackBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let available = self.buf.len() - self.pos;
        if data.len() > available {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "CBOR message exceeds the CTAP size bound",
            ));
        }
        self.buf[self.pos..self.pos + data.len()].copy_from_slice(data);
        self.pos += data.len();
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Default for StackBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a value to CBOR bytes
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buffer = StackBuffer::new();
    cbor4ii::serde::to_writer(&mut buffer, value).map_err(|_| CborError::Encode)?;
    Ok(buffer.to_vec())
}

/// Decode CBOR bytes to a value
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T> {
    cbor4ii::serde::from_slice(data).map_err(|_| CborError::Decode)
}

/// Rank of an integer key in CTAP canonical map order
fn canonical_rank(key: i32) -> (u8, u32) {
    if key >= 0 {
        (0, key as u32)
    } else {
        (1, (-(key as i64) - 1) as u32)
    }
}

fn write_key(buffer: &mut StackBuffer, key: i32) -> Result<()> {
    let (major, value) = if key >= 0 {
        (0x00u8, key as u32)
    } else {
        (0x20u8, (-(key as i64) - 1) as u32)
    };

    let result = match value {
        0..=23 => buffer.write_all(&[major | value as u8]),
        24..=255 => buffer.write_all(&[major | 0x18, value as u8]),
        _ => return Err(CborError::Encode),
    };
    result.map_err(|_| CborError::Encode)
}

fn write_map_header(buffer: &mut StackBuffer, entries: usize) -> Result<()> {
    let result = match entries {
        0..=23 => buffer.write_all(&[0xa0 | entries as u8]),
        24..=255 => buffer.write_all(&[0xb8, entries as u8]),
        _ => return Err(CborError::Encode),
    };
    result.map_err(|_| CborError::Encode)
}

/// Builds an integer-keyed CBOR map in canonical key order
pub struct MapBuilder {
    entries: Vec<(i32, Vec<u8>)>,
}

impl MapBuilder {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert any serializable value
    pub fn insert<T: Serialize>(mut self, key: i32, value: T) -> Result<Self> {
        let encoded = encode(&value)?;
        self.entries.push((key, encoded));
        Ok(self)
    }

    /// Insert only if the value is present
    pub fn insert_opt<T: Serialize>(self, key: i32, value: Option<T>) -> Result<Self> {
        match value {
            Some(v) => self.insert(key, v),
            None => Ok(self),
        }
    }

    /// Insert a CBOR byte string
    pub fn insert_bytes(self, key: i32, bytes: &[u8]) -> Result<Self> {
        self.insert(key, serde_bytes::Bytes::new(bytes))
    }

    /// Encode the map, keys in canonical order
    pub fn build(mut self) -> Result<Vec<u8>> {
        self.entries.sort_by_key(|(key, _)| canonical_rank(*key));

        let mut buffer = StackBuffer::new();
        write_map_header(&mut buffer, self.entries.len())?;
        for (key, value) in &self.entries {
            write_key(&mut buffer, *key)?;
            buffer.write_all(value).map_err(|_| CborError::Encode)?;
        }

        Ok(buffer.to_vec())
    }

    /// Encode the map and reparse it as a [`Value`] for nesting
    pub fn build_value(self) -> Result<Value> {
        decode(&self.build()?)
    }
}

impl Default for MapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads an integer-keyed CBOR map, field presence preserved
pub struct MapParser {
    map: BTreeMap<i32, Vec<u8>>,
}

impl MapParser {
    /// Parse map bytes; values are kept encoded and decoded on access
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let raw: BTreeMap<i32, Value> = decode(data)?;

        let mut map = BTreeMap::new();
        for (key, value) in raw {
            map.insert(key, encode(&value)?);
        }
        Ok(Self { map })
    }

    /// Decode the value under `key`, `None` if the key is absent
    pub fn get_opt<T: for<'de> Deserialize<'de>>(&self, key: i32) -> Result<Option<T>> {
        match self.map.get(&key) {
            Some(encoded) => Ok(Some(decode(encoded)?)),
            None => Ok(None),
        }
    }

    /// Decode a CBOR byte string under `key`
    pub fn get_bytes_opt(&self, key: i32) -> Result<Option<Vec<u8>>> {
        match self.get_opt::<serde_bytes::ByteBuf>(key)? {
            Some(buf) => Ok(Some(buf.into_vec())),
            None => Ok(None),
        }
    }

    pub fn contains_key(&self, key: i32) -> bool {
        self.map.contains_key(&key)
    }
}
