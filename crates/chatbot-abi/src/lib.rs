//! Minimal Solidity ABI codec for the chatbot marketplace contracts.
//!
//! Covers exactly the parameter shapes the NFT, token and factory contracts use
//! (address, uint256, bool, string, address[]), event-log decoding, and
//! fixed-point unit conversion.

#![no_std]

extern crate alloc;

mod log;
mod units;

use alloc::{string::String, vec::Vec};
use tiny_keccak::{Hasher, Keccak};

pub use log::{decode_log, DecodedEvent, EventParam, EventSpec, Interface, LogEntry};
pub use units::{format_units, parse_units, UnitsError};

/// 20-byte account or contract address.
pub type Address = [u8; 20];

pub const ZERO_ADDRESS: Address = [0u8; 20];

/// Decimal scale assumed for every fungible amount.
pub const TOKEN_DECIMALS: u32 = 18;

const WORD: usize = 32;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut keccak = Keccak::v256();
    keccak.update(data);
    let mut out = [0u8; 32];
    keccak.finalize(&mut out);
    out
}

/// Function selector: first four bytes of `keccak256(signature)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// A decoded (or to-be-encoded) ABI value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    /// A uint256 whose value fits in 128 bits.
    Uint(u128),
    Bool(bool),
    String(String),
    AddressArray(Vec<Address>),
}

impl Token {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Token::String(_) | Token::AddressArray(_))
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            Token::Address(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u128> {
        match self {
            Token::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Token::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Token::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            Token::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_address_array(self) -> Option<Vec<Address>> {
        match self {
            Token::AddressArray(v) => Some(v),
            _ => None,
        }
    }
}

/// Expected type of a value when decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamType {
    Address,
    Uint256,
    Bool,
    String,
    AddressArray,
}

impl ParamType {
    pub fn is_dynamic(self) -> bool {
        matches!(self, ParamType::String | ParamType::AddressArray)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AbiError {
    /// A read of `len` bytes at `offset` ran past the end of the buffer.
    OutOfBounds { offset: usize, len: usize },
    /// A uint256 (or an offset/length) does not fit the native integer type.
    Overflow,
    InvalidBool,
    InvalidAddress,
    InvalidUtf8,
    InvalidHex,
    /// topic0 does not match, or the topic count differs from the event's indexed inputs.
    TopicMismatch,
    MissingTopic(usize),
    UnknownEvent,
    /// Dynamic indexed parameters are stored as hashes and cannot be recovered.
    UnsupportedIndexed,
}

impl core::fmt::Display for AbiError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AbiError::OutOfBounds { offset, len } => {
                write!(f, "read of {} bytes at offset {} is out of bounds", len, offset)
            }
            AbiError::Overflow => f.write_str("integer does not fit in 128 bits"),
            AbiError::InvalidBool => f.write_str("invalid bool encoding"),
            AbiError::InvalidAddress => f.write_str("invalid address"),
            AbiError::InvalidUtf8 => f.write_str("string is not valid UTF-8"),
            AbiError::InvalidHex => f.write_str("invalid hex string"),
            AbiError::TopicMismatch => f.write_str("log topics do not match event"),
            AbiError::MissingTopic(i) => write!(f, "log is missing topic {}", i),
            AbiError::UnknownEvent => f.write_str("log does not match any known event"),
            AbiError::UnsupportedIndexed => f.write_str("dynamic indexed parameter"),
        }
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// ABI-encode a parameter tuple (head/tail layout).
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len = tokens.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            head.extend_from_slice(&uint_word((head_len + tail.len()) as u128));
            encode_tail(token, &mut tail);
        } else {
            head.extend_from_slice(&static_word(token));
        }
    }

    head.extend_from_slice(&tail);
    head
}

/// Selector followed by the encoded arguments.
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + args.len() * WORD);
    out.extend_from_slice(&selector(signature));
    out.extend_from_slice(&encode(args));
    out
}

fn uint_word(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn address_word(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address);
    word
}

fn static_word(token: &Token) -> [u8; 32] {
    match token {
        Token::Address(a) => address_word(a),
        Token::Uint(v) => uint_word(*v),
        Token::Bool(b) => uint_word(*b as u128),
        Token::String(_) | Token::AddressArray(_) => [0u8; 32],
    }
}

fn encode_tail(token: &Token, out: &mut Vec<u8>) {
    match token {
        Token::String(s) => {
            let bytes = s.as_bytes();
            out.extend_from_slice(&uint_word(bytes.len() as u128));
            out.extend_from_slice(bytes);
            let rem = bytes.len() % WORD;
            if rem != 0 {
                out.resize(out.len() + (WORD - rem), 0);
            }
        }
        Token::AddressArray(items) => {
            out.extend_from_slice(&uint_word(items.len() as u128));
            for a in items {
                out.extend_from_slice(&address_word(a));
            }
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a parameter tuple of the given types.
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, AbiError> {
    let mut out = Vec::with_capacity(types.len());
    for (i, ty) in types.iter().enumerate() {
        let head = word_at(data, i * WORD)?;
        let token = if ty.is_dynamic() {
            let offset = word_to_usize(head)?;
            decode_dynamic(*ty, data, offset)?
        } else {
            decode_static(*ty, head)?
        };
        out.push(token);
    }
    Ok(out)
}

/// Decode a single value, e.g. the return data of a view call.
pub fn decode_one(ty: ParamType, data: &[u8]) -> Result<Token, AbiError> {
    let mut tokens = decode(&[ty], data)?;
    tokens.pop().ok_or(AbiError::OutOfBounds { offset: 0, len: WORD })
}

fn word_at(data: &[u8], offset: usize) -> Result<&[u8; 32], AbiError> {
    let end = offset
        .checked_add(WORD)
        .ok_or(AbiError::OutOfBounds { offset, len: WORD })?;
    data.get(offset..end)
        .and_then(|s| s.try_into().ok())
        .ok_or(AbiError::OutOfBounds { offset, len: WORD })
}

fn word_to_u128(word: &[u8; 32]) -> Result<u128, AbiError> {
    if word[..16].iter().any(|b| *b != 0) {
        return Err(AbiError::Overflow);
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(low))
}

fn word_to_usize(word: &[u8; 32]) -> Result<usize, AbiError> {
    usize::try_from(word_to_u128(word)?).map_err(|_| AbiError::Overflow)
}

pub(crate) fn decode_static(ty: ParamType, word: &[u8; 32]) -> Result<Token, AbiError> {
    match ty {
        ParamType::Address => {
            if word[..12].iter().any(|b| *b != 0) {
                return Err(AbiError::InvalidAddress);
            }
            let mut a = ZERO_ADDRESS;
            a.copy_from_slice(&word[12..]);
            Ok(Token::Address(a))
        }
        ParamType::Uint256 => word_to_u128(word).map(Token::Uint),
        ParamType::Bool => match word_to_u128(word) {
            Ok(0) => Ok(Token::Bool(false)),
            Ok(1) => Ok(Token::Bool(true)),
            _ => Err(AbiError::InvalidBool),
        },
        ParamType::String | ParamType::AddressArray => Err(AbiError::UnsupportedIndexed),
    }
}

fn decode_dynamic(ty: ParamType, data: &[u8], offset: usize) -> Result<Token, AbiError> {
    let len = word_to_usize(word_at(data, offset)?)?;
    let start = offset + WORD;
    match ty {
        ParamType::String => {
            let end = start
                .checked_add(len)
                .ok_or(AbiError::OutOfBounds { offset: start, len })?;
            let bytes = data
                .get(start..end)
                .ok_or(AbiError::OutOfBounds { offset: start, len })?;
            String::from_utf8(bytes.to_vec())
                .map(Token::String)
                .map_err(|_| AbiError::InvalidUtf8)
        }
        ParamType::AddressArray => {
            // Reject lengths the buffer cannot possibly hold before allocating.
            if len > data.len().saturating_sub(start) / WORD {
                return Err(AbiError::OutOfBounds { offset: start, len: len.saturating_mul(WORD) });
            }
            let mut items = Vec::with_capacity(len);
            for j in 0..len {
                match decode_static(ParamType::Address, word_at(data, start + j * WORD)?)? {
                    Token::Address(a) => items.push(a),
                    _ => return Err(AbiError::InvalidAddress),
                }
            }
            Ok(Token::AddressArray(items))
        }
        _ => decode_static(ty, word_at(data, offset)?),
    }
}

// ---------------------------------------------------------------------------
// Hex helpers
// ---------------------------------------------------------------------------

/// Parse a hex string (with or without `0x`, odd length tolerated).
pub fn parse_hex(hex_str: &str) -> Result<Vec<u8>, AbiError> {
    let stripped = strip_0x(hex_str);
    if stripped.is_empty() {
        return Ok(Vec::new());
    }
    if stripped.len() % 2 == 1 {
        let padded = alloc::format!("0{}", stripped);
        return hex::decode(padded).map_err(|_| AbiError::InvalidHex);
    }
    hex::decode(stripped).map_err(|_| AbiError::InvalidHex)
}

/// `0x`-prefixed lower-case hex.
pub fn to_hex(bytes: &[u8]) -> String {
    alloc::format!("0x{}", hex::encode(bytes))
}

pub fn parse_address(hex_str: &str) -> Result<Address, AbiError> {
    let stripped = strip_0x(hex_str.trim());
    if stripped.len() != 40 {
        return Err(AbiError::InvalidAddress);
    }
    let bytes = hex::decode(stripped).map_err(|_| AbiError::InvalidAddress)?;
    let mut out = ZERO_ADDRESS;
    out.copy_from_slice(&bytes);
    Ok(out)
}

pub fn format_address(address: &Address) -> String {
    to_hex(address)
}

pub fn parse_word(hex_str: &str) -> Result<[u8; 32], AbiError> {
    let bytes = parse_hex(hex_str)?;
    bytes.as_slice().try_into().map_err(|_| AbiError::InvalidHex)
}

fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}
