//! Contract ABI: JSON descriptions, selectors, and the word-based codec.
//!
//! Covers the subset of types the registry contract uses: unsigned/signed
//! integers, `bool`, `address`, fixed and dynamic `bytes`, `string`, and
//! tuples. Arrays are rejected.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::error::LedgerError;
use crate::record::LedgerValue;
use crate::uint::LedgerUint;

const WORD: usize = 32;

/// Selector of the standard `Error(string)` revert payload.
pub const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

// ── ABI JSON ─────────────────────────────────────────────────────────────────

/// One entry of a contract ABI (function, event, constructor, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbiEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub outputs: Vec<AbiParam>,
    #[serde(default)]
    pub anonymous: bool,
}

/// A function/event parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default)]
    pub components: Vec<AbiParam>,
}

impl AbiParam {
    pub fn param_type(&self) -> Result<ParamType, LedgerError> {
        ParamType::parse(&self.ty, &self.components)
    }
}

impl AbiEntry {
    /// Canonical signature, e.g. `obtenerObra(uint256)`.
    pub fn signature(&self) -> Result<String, LedgerError> {
        let inputs = self
            .inputs
            .iter()
            .map(|p| p.param_type().map(|t| t.canonical()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(format!("{}({})", self.name, inputs.join(",")))
    }

    /// First four bytes of the signature hash.
    pub fn selector(&self) -> Result<[u8; 4], LedgerError> {
        let hash = keccak256(self.signature()?.as_bytes());
        Ok([hash[0], hash[1], hash[2], hash[3]])
    }

    /// Full signature hash; `topics[0]` of a non-anonymous event log.
    pub fn topic(&self) -> Result<[u8; 32], LedgerError> {
        Ok(keccak256(self.signature()?.as_bytes()))
    }

    pub fn input_types(&self) -> Result<Vec<ParamType>, LedgerError> {
        self.inputs.iter().map(AbiParam::param_type).collect()
    }

    pub fn output_types(&self) -> Result<Vec<ParamType>, LedgerError> {
        self.outputs.iter().map(AbiParam::param_type).collect()
    }
}

// ── Types ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Uint(usize),
    Int(usize),
    Bool,
    Address,
    FixedBytes(usize),
    String,
    Bytes,
    Tuple(Vec<ParamType>),
}

impl ParamType {
    pub fn parse(ty: &str, components: &[AbiParam]) -> Result<Self, LedgerError> {
        if ty.ends_with(']') {
            return Err(LedgerError::Config(format!(
                "abi array type '{}' is not supported",
                ty
            )));
        }
        let parsed = match ty {
            "bool" => ParamType::Bool,
            "address" => ParamType::Address,
            "string" => ParamType::String,
            "bytes" => ParamType::Bytes,
            "tuple" => ParamType::Tuple(
                components
                    .iter()
                    .map(AbiParam::param_type)
                    .collect::<Result<_, _>>()?,
            ),
            "uint" => ParamType::Uint(256),
            "int" => ParamType::Int(256),
            _ => {
                if let Some(bits) = ty.strip_prefix("uint") {
                    ParamType::Uint(parse_bits(ty, bits)?)
                } else if let Some(bits) = ty.strip_prefix("int") {
                    ParamType::Int(parse_bits(ty, bits)?)
                } else if let Some(len) = ty.strip_prefix("bytes") {
                    ParamType::FixedBytes(parse_size(ty, len, 1..=32)?)
                } else {
                    return Err(LedgerError::Config(format!("unknown abi type '{}'", ty)));
                }
            }
        };
        Ok(parsed)
    }

    pub fn is_dynamic(&self) -> bool {
        match self {
            ParamType::String | ParamType::Bytes => true,
            ParamType::Tuple(members) => members.iter().any(ParamType::is_dynamic),
            _ => false,
        }
    }

    pub fn canonical(&self) -> String {
        match self {
            ParamType::Uint(bits) => format!("uint{}", bits),
            ParamType::Int(bits) => format!("int{}", bits),
            ParamType::Bool => "bool".to_string(),
            ParamType::Address => "address".to_string(),
            ParamType::FixedBytes(len) => format!("bytes{}", len),
            ParamType::String => "string".to_string(),
            ParamType::Bytes => "bytes".to_string(),
            ParamType::Tuple(members) => {
                let inner: Vec<String> = members.iter().map(ParamType::canonical).collect();
                format!("({})", inner.join(","))
            }
        }
    }

    /// Bytes this type occupies in the head of an enclosing sequence.
    fn head_len(&self) -> usize {
        match self {
            ParamType::Tuple(members) if !self.is_dynamic() => {
                members.iter().map(ParamType::head_len).sum()
            }
            _ => WORD,
        }
    }
}

fn parse_size(
    ty: &str,
    digits: &str,
    range: std::ops::RangeInclusive<usize>,
) -> Result<usize, LedgerError> {
    Some(digits)
        .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|d| d.parse().ok())
        .filter(|n| range.contains(n))
        .ok_or_else(|| LedgerError::Config(format!("unknown abi type '{}'", ty)))
}

/// Integer widths run from 8 to 256 in steps of 8.
fn parse_bits(ty: &str, digits: &str) -> Result<usize, LedgerError> {
    let bits = parse_size(ty, digits, 8..=256)?;
    if bits % 8 != 0 {
        return Err(LedgerError::Config(format!("unknown abi type '{}'", ty)));
    }
    Ok(bits)
}

// ── Hashing and hex ──────────────────────────────────────────────────────────

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// `0x`-prefixed lowercase hex.
pub fn to_hex(bytes: &[u8]) -> String {
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!("0x{}", hex)
}

pub fn from_hex(text: &str) -> Result<Vec<u8>, LedgerError> {
    let digits = text.strip_prefix("0x").unwrap_or(text);
    if digits.len() % 2 != 0 {
        return Err(LedgerError::MalformedResponse(format!(
            "odd-length hex string '{}'",
            text
        )));
    }
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(LedgerError::MalformedResponse(format!(
            "invalid hex string '{}'",
            text
        )));
    }
    // All ASCII from here, so byte offsets are char boundaries.
    Ok((0..digits.len())
        .step_by(2)
        .filter_map(|i| u8::from_str_radix(&digits[i..i + 2], 16).ok())
        .collect())
}

// ── Encoding ─────────────────────────────────────────────────────────────────

/// ABI-encode `values` as a parameter sequence of `types`.
pub fn encode(types: &[ParamType], values: &[LedgerValue]) -> Result<Vec<u8>, LedgerError> {
    if types.len() != values.len() {
        return Err(LedgerError::Config(format!(
            "expected {} abi values, got {}",
            types.len(),
            values.len()
        )));
    }

    let head_len: usize = types.iter().map(ParamType::head_len).sum();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();
    for (ty, value) in types.iter().zip(values) {
        if ty.is_dynamic() {
            head.extend_from_slice(&usize_word(head_len + tail.len()));
            tail.extend(encode_value(ty, value)?);
        } else {
            head.extend(encode_value(ty, value)?);
        }
    }
    head.extend(tail);
    Ok(head)
}

/// Encode a full call: selector followed by the encoded arguments.
pub fn encode_call(
    selector: [u8; 4],
    types: &[ParamType],
    values: &[LedgerValue],
) -> Result<Vec<u8>, LedgerError> {
    let mut data = selector.to_vec();
    data.extend(encode(types, values)?);
    Ok(data)
}

fn encode_value(ty: &ParamType, value: &LedgerValue) -> Result<Vec<u8>, LedgerError> {
    let encoded = match (ty, value) {
        (ParamType::Uint(_) | ParamType::Int(_), LedgerValue::Uint(v)) => v.to_be_bytes().to_vec(),
        (ParamType::Bool, LedgerValue::Bool(b)) => {
            LedgerUint::from_u64(u64::from(*b)).to_be_bytes().to_vec()
        }
        (ParamType::Address, LedgerValue::Address(addr)) => {
            let raw = from_hex(addr)?;
            if raw.len() != 20 {
                return Err(LedgerError::Config(format!("invalid address '{}'", addr)));
            }
            let mut word = vec![0u8; 12];
            word.extend(raw);
            word
        }
        (ParamType::FixedBytes(len), LedgerValue::Bytes(bytes)) if bytes.len() == *len => {
            let mut word = bytes.clone();
            word.resize(WORD, 0);
            word
        }
        (ParamType::String, LedgerValue::String(s)) => encode_dynamic_bytes(s.as_bytes()),
        (ParamType::Bytes, LedgerValue::Bytes(bytes)) => encode_dynamic_bytes(bytes),
        (ParamType::Tuple(members), LedgerValue::Tuple(values)) => encode(members, values)?,
        _ => {
            return Err(LedgerError::Config(format!(
                "value {:?} does not match abi type {}",
                value,
                ty.canonical()
            )))
        }
    };
    Ok(encoded)
}

fn encode_dynamic_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut out = usize_word(bytes.len()).to_vec();
    out.extend_from_slice(bytes);
    let padded = bytes.len().div_ceil(WORD) * WORD;
    out.resize(WORD + padded, 0);
    out
}

fn usize_word(value: usize) -> [u8; 32] {
    LedgerUint::from_u64(value as u64).to_be_bytes()
}

// ── Decoding ─────────────────────────────────────────────────────────────────

/// Decode a parameter sequence of `types` from `data`.
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<LedgerValue>, LedgerError> {
    decode_sequence(types, data, 0)
}

fn decode_sequence(
    types: &[ParamType],
    data: &[u8],
    base: usize,
) -> Result<Vec<LedgerValue>, LedgerError> {
    let mut offset = base;
    let mut values = Vec::with_capacity(types.len());
    for ty in types {
        if ty.is_dynamic() {
            let relative = read_usize(data, offset)?;
            let start = base.checked_add(relative).ok_or_else(|| out_of_bounds(relative))?;
            values.push(decode_value(ty, data, start)?);
        } else {
            values.push(decode_value(ty, data, offset)?);
        }
        offset += ty.head_len();
    }
    Ok(values)
}

fn decode_value(ty: &ParamType, data: &[u8], at: usize) -> Result<LedgerValue, LedgerError> {
    let value = match ty {
        ParamType::Uint(_) | ParamType::Int(_) => {
            LedgerValue::Uint(LedgerUint::from_be_bytes(read_word(data, at)?))
        }
        ParamType::Bool => {
            let word = LedgerUint::from_be_bytes(read_word(data, at)?);
            match word.to_u64() {
                Ok(0) => LedgerValue::Bool(false),
                Ok(1) => LedgerValue::Bool(true),
                _ => {
                    return Err(LedgerError::MalformedResponse(format!(
                        "invalid bool word {}",
                        word
                    )))
                }
            }
        }
        ParamType::Address => LedgerValue::Address(to_hex(&read_word(data, at)?[12..])),
        ParamType::FixedBytes(len) => {
            let word = read_word(data, at)?;
            LedgerValue::Bytes(word[..(*len).min(WORD)].to_vec())
        }
        ParamType::String => {
            let bytes = read_dynamic_bytes(data, at)?;
            LedgerValue::String(String::from_utf8(bytes).map_err(|e| {
                LedgerError::MalformedResponse(format!("string is not utf-8: {}", e))
            })?)
        }
        ParamType::Bytes => LedgerValue::Bytes(read_dynamic_bytes(data, at)?),
        ParamType::Tuple(members) => LedgerValue::Tuple(decode_sequence(members, data, at)?),
    };
    Ok(value)
}

fn read_word(data: &[u8], at: usize) -> Result<[u8; 32], LedgerError> {
    let end = at.checked_add(WORD).ok_or_else(|| out_of_bounds(at))?;
    let slice = data.get(at..end).ok_or_else(|| out_of_bounds(at))?;
    let mut word = [0u8; 32];
    word.copy_from_slice(slice);
    Ok(word)
}

fn read_usize(data: &[u8], at: usize) -> Result<usize, LedgerError> {
    let value = LedgerUint::from_be_bytes(read_word(data, at)?).to_u64()?;
    usize::try_from(value).map_err(|_| out_of_bounds(at))
}

fn read_dynamic_bytes(data: &[u8], at: usize) -> Result<Vec<u8>, LedgerError> {
    let len = read_usize(data, at)?;
    let start = at + WORD;
    let end = start.checked_add(len).ok_or_else(|| out_of_bounds(start))?;
    data.get(start..end)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| out_of_bounds(start))
}

fn out_of_bounds(at: usize) -> LedgerError {
    LedgerError::MalformedResponse(format!("abi data truncated at offset {}", at))
}

// ── Events and reverts ───────────────────────────────────────────────────────

/// Decode an event log into named fields.
///
/// Indexed parameters come from `topics[1..]`; dynamic indexed values are
/// stored as their 32-byte hash. The rest are decoded from `data`.
pub fn decode_log(
    event: &AbiEntry,
    topics: &[Vec<u8>],
    data: &[u8],
) -> Result<BTreeMap<String, LedgerValue>, LedgerError> {
    let mut fields = BTreeMap::new();
    let topic_start = usize::from(!event.anonymous);
    let mut indexed_topics = topics.iter().skip(topic_start);

    let mut data_names = Vec::new();
    let mut data_types = Vec::new();
    for param in &event.inputs {
        let ty = param.param_type()?;
        if param.indexed {
            let topic = indexed_topics.next().ok_or_else(|| {
                LedgerError::MalformedResponse(format!(
                    "event {} is missing topic for '{}'",
                    event.name, param.name
                ))
            })?;
            let value = if ty.is_dynamic() {
                LedgerValue::Bytes(topic.clone())
            } else {
                decode_value(&ty, topic, 0)?
            };
            fields.insert(param.name.clone(), value);
        } else {
            data_names.push(param.name.clone());
            data_types.push(ty);
        }
    }

    for (name, value) in data_names.into_iter().zip(decode(&data_types, data)?) {
        fields.insert(name, value);
    }
    Ok(fields)
}

/// Extract the message of a standard `Error(string)` revert payload.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let body = data.strip_prefix(&ERROR_STRING_SELECTOR[..])?;
    match decode(&[ParamType::String], body).ok()?.pop()? {
        LedgerValue::String(reason) => Some(reason),
        _ => None,
    }
}
