//! Host side ABI values, used to encode constructor arguments and calldata for compiled contracts.

use crate::types::{IntType, Type};
use alloy_primitives::{Address, B256, I256, U256, keccak256};

/// First four bytes of the hash of a canonical signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Uint(U256),
    Int(I256),
    Bool(bool),
    Address(Address),
    /// `bytesM`, left aligned.
    FixedBytes(B256, u8),
    Bytes(Vec<u8>),
    String(String),
    /// Fixed size array.
    Array(Vec<AbiValue>),
    Tuple(Vec<AbiValue>),
}

impl AbiValue {
    pub fn uint(value: u64) -> Self {
        AbiValue::Uint(U256::from(value))
    }

    pub fn is_dynamic(&self) -> bool {
        match self {
            AbiValue::Bytes(_) | AbiValue::String(_) => true,
            AbiValue::Array(items) | AbiValue::Tuple(items) => items.iter().any(Self::is_dynamic),
            _ => false,
        }
    }

    /// Whether this value can be passed where `ty` is expected.
    pub fn matches(&self, ty: &Type) -> bool {
        match (self, ty) {
            (AbiValue::Uint(value), Type::Int(IntType { signed: false, .. })) => {
                ty_contains(ty, *value)
            }
            (AbiValue::Int(value), Type::Int(IntType { signed: true, .. })) => {
                ty_contains(ty, value.into_raw())
            }
            (AbiValue::Bool(_), Type::Bool) => true,
            (AbiValue::Address(_), Type::Address | Type::Interface(_)) => true,
            (AbiValue::FixedBytes(_, m), Type::BytesM(n)) => m == n,
            (AbiValue::Bytes(bytes), Type::Bytes(n)) => bytes.len() <= *n as usize,
            (AbiValue::String(s), Type::String(n)) => s.len() <= *n as usize,
            (AbiValue::Array(items), Type::Array(inner, n)) => {
                items.len() == *n as usize && items.iter().all(|item| item.matches(inner))
            }
            (AbiValue::Tuple(items), Type::Struct(s)) => {
                items.len() == s.fields.len()
                    && items.iter().zip(&s.fields).all(|(item, (_, ty))| item.matches(ty))
            }
            _ => false,
        }
    }

    fn head_size(&self) -> usize {
        match self {
            _ if self.is_dynamic() => 32,
            AbiValue::Array(items) | AbiValue::Tuple(items) => {
                items.iter().map(Self::head_size).sum()
            }
            _ => 32,
        }
    }

    fn word(&self) -> Option<B256> {
        Some(match self {
            AbiValue::Uint(value) => B256::from(value.to_be_bytes::<32>()),
            AbiValue::Int(value) => B256::from(value.into_raw().to_be_bytes::<32>()),
            AbiValue::Bool(value) => B256::from(U256::from(*value as u8).to_be_bytes::<32>()),
            AbiValue::Address(address) => address.into_word(),
            AbiValue::FixedBytes(bytes, _) => *bytes,
            _ => return None,
        })
    }

    /// Encoding of this value on its own: the static words, or the tail of a dynamic value.
    fn encode_into(&self, out: &mut Vec<u8>) {
        if let Some(word) = self.word() {
            out.extend_from_slice(word.as_slice());
            return;
        }
        match self {
            AbiValue::Bytes(bytes) => encode_bytes(bytes, out),
            AbiValue::String(s) => encode_bytes(s.as_bytes(), out),
            AbiValue::Array(items) | AbiValue::Tuple(items) => encode_tuple_into(items, out),
            _ => unreachable!("word values are handled above"),
        }
    }
}

fn ty_contains(ty: &Type, value: U256) -> bool {
    match ty {
        Type::Int(int) => int.contains(value),
        _ => false,
    }
}

fn encode_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(&U256::from(bytes.len()).to_be_bytes::<32>());
    out.extend_from_slice(bytes);
    let padding = bytes.len().next_multiple_of(32) - bytes.len();
    out.resize(out.len() + padding, 0);
}

fn encode_tuple_into(items: &[AbiValue], out: &mut Vec<u8>) {
    let head_size: usize = items.iter().map(AbiValue::head_size).sum();
    let mut tail = Vec::new();
    for item in items {
        if item.is_dynamic() {
            let offset = head_size + tail.len();
            out.extend_from_slice(&U256::from(offset).to_be_bytes::<32>());
            item.encode_into(&mut tail);
        } else {
            item.encode_into(out);
        }
    }
    out.extend_from_slice(&tail);
}

/// Encodes `values` as the members of a tuple, the way call and constructor arguments are laid out.
pub fn encode_params(values: &[AbiValue]) -> Vec<u8> {
    let mut out = Vec::new();
    encode_tuple_into(values, &mut out);
    out
}

/// Selector followed by the encoded arguments.
pub fn encode_call(signature: &str, args: &[AbiValue]) -> Vec<u8> {
    let mut out = selector(signature).to_vec();
    encode_tuple_into(args, &mut out);
    out
}

/// Decodes a tuple of `types` from `data`. Returns `None` on malformed input.
pub fn decode_params(types: &[Type], data: &[u8]) -> Option<Vec<AbiValue>> {
    decode_tuple(types.iter(), data)
}

fn decode_tuple<'a>(types: impl Iterator<Item = &'a Type>, data: &[u8]) -> Option<Vec<AbiValue>> {
    let mut head = 0;
    let mut values = Vec::new();
    for ty in types {
        if ty.abi_is_dynamic() {
            let offset = usize::try_from(read_word(data, head)?).ok()?;
            values.push(decode_value(ty, data.get(offset..)?)?);
            head += 32;
        } else {
            values.push(decode_value(ty, data.get(head..)?)?);
            head += ty.memory_size() as usize;
        }
    }
    Some(values)
}

fn read_word(data: &[u8], at: usize) -> Option<U256> {
    let word = data.get(at..at.checked_add(32)?)?;
    Some(U256::from_be_slice(word))
}

fn decode_value(ty: &Type, data: &[u8]) -> Option<AbiValue> {
    let value = match ty {
        Type::Int(int) => {
            let word = read_word(data, 0)?;
            if !int.contains(word) {
                return None;
            }
            if int.signed { AbiValue::Int(I256::from_raw(word)) } else { AbiValue::Uint(word) }
        }
        Type::Bool => match read_word(data, 0)? {
            w if w == U256::ZERO => AbiValue::Bool(false),
            w if w == U256::from(1) => AbiValue::Bool(true),
            _ => return None,
        },
        Type::Address | Type::Interface(_) => {
            let word = B256::from(read_word(data, 0)?.to_be_bytes::<32>());
            if word[..12].iter().any(|&b| b != 0) {
                return None;
            }
            AbiValue::Address(Address::from_word(word))
        }
        Type::BytesM(m) => {
            AbiValue::FixedBytes(B256::from(read_word(data, 0)?.to_be_bytes::<32>()), *m)
        }
        Type::Bytes(_) | Type::String(_) => {
            let len = usize::try_from(read_word(data, 0)?).ok()?;
            let bytes = data.get(32..32usize.checked_add(len)?)?.to_vec();
            match ty {
                Type::String(_) => AbiValue::String(String::from_utf8(bytes).ok()?),
                _ => AbiValue::Bytes(bytes),
            }
        }
        Type::Array(inner, n) => {
            AbiValue::Array(decode_tuple(std::iter::repeat_n(&**inner, *n as usize), data)?)
        }
        Type::Struct(s) => AbiValue::Tuple(decode_tuple(s.fields.iter().map(|(_, ty)| ty), data)?),
        Type::HashMap(..) => return None,
    };
    Some(value)
}
