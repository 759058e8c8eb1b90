//! Semantic types and their memory, storage and ABI layouts.
//!
//! Memory layout: word types take one 32-byte word. `Bytes[N]`/`String[N]` are a length word
//! followed by `N` bytes rounded up to whole words. Arrays and structs lay their members out
//! inline, one after the other. For ABI-static types this layout coincides with the ABI encoding.
//!
//! Storage layout: word types take one slot, byte arrays take a length slot followed by their
//! data words, arrays and structs are inline. `HashMap` values live at
//! `keccak256(key ++ slot)`.

use alloy_primitives::U256;
use std::{fmt, sync::Arc};

pub const WORD: u32 = 32;

pub const fn ceil32(n: u32) -> u32 {
    n.div_ceil(WORD) * WORD
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntType {
    pub signed: bool,
    /// Multiple of 8 between 8 and 256.
    pub bits: u16,
}

impl IntType {
    pub const UINT256: IntType = IntType { signed: false, bits: 256 };
    pub const INT256: IntType = IntType { signed: true, bits: 256 };
    pub const UINT8: IntType = IntType { signed: false, bits: 8 };

    /// Largest value, as raw bits.
    pub fn max(self) -> U256 {
        let value_bits = self.bits as usize - usize::from(self.signed);
        if value_bits == 256 { U256::MAX } else { (U256::from(1) << value_bits) - U256::from(1) }
    }

    /// Smallest value, in two's complement.
    pub fn min(self) -> U256 {
        if self.signed { !self.max() } else { U256::ZERO }
    }

    /// Whether the 256-bit two's complement word `value` is representable.
    pub fn contains(self, value: U256) -> bool {
        if self.signed {
            let negative = value.bit(255);
            if negative { value >= self.min() } else { value <= self.max() }
        } else {
            value <= self.max()
        }
    }
}

impl fmt::Display for IntType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}int{}", if self.signed { "" } else { "u" }, self.bits)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int(IntType),
    Bool,
    Address,
    /// `bytes1` to `bytes32`, left aligned in its word.
    BytesM(u8),
    /// `Bytes[N]`
    Bytes(u32),
    /// `String[N]`
    String(u32),
    Array(Box<Type>, u32),
    Struct(Arc<StructType>),
    Interface(Arc<InterfaceType>),
    /// Storage only.
    HashMap(Box<Type>, Box<Type>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<(String, Type)>,
}

impl StructType {
    pub fn field(&self, name: &str) -> Option<(usize, &Type)> {
        self.fields.iter().enumerate().find(|(_, (n, _))| n == name).map(|(i, (_, ty))| (i, ty))
    }

    /// Memory offset of the field at `index`.
    pub fn field_offset(&self, index: usize) -> u32 {
        self.fields[..index].iter().map(|(_, ty)| ty.memory_size()).sum()
    }

    /// Storage slot offset of the field at `index`.
    pub fn field_slot_offset(&self, index: usize) -> u64 {
        self.fields[..index].iter().map(|(_, ty)| ty.storage_slots()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mutability {
    Pure,
    View,
    Nonpayable,
    Payable,
}

impl Mutability {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pure" => Some(Mutability::Pure),
            "view" => Some(Mutability::View),
            "nonpayable" => Some(Mutability::Nonpayable),
            "payable" => Some(Mutability::Payable),
            _ => None,
        }
    }

    pub fn can_read_state(self) -> bool {
        self != Mutability::Pure
    }

    pub fn can_write_state(self) -> bool {
        self >= Mutability::Nonpayable
    }
}

/// Signature of a function callable through the ABI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalSignature {
    pub name: String,
    pub params: Vec<Type>,
    pub returns: Option<Type>,
    pub mutability: Mutability,
}

impl ExternalSignature {
    /// Canonical `name(type,...)` form hashed into the selector.
    pub fn canonical(&self) -> String {
        let params: Vec<String> = self.params.iter().map(Type::abi_name).collect();
        format!("{}({})", self.name, params.join(","))
    }

    pub fn selector(&self) -> [u8; 4] {
        crate::abi::selector(&self.canonical())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterfaceType {
    pub name: String,
    pub functions: Vec<ExternalSignature>,
}

impl InterfaceType {
    pub fn function(&self, name: &str) -> Option<&ExternalSignature> {
        self.functions.iter().find(|f| f.name == name)
    }
}

impl Type {
    pub const UINT256: Type = Type::Int(IntType::UINT256);

    /// Fits in a single stack word.
    pub fn is_word(&self) -> bool {
        matches!(
            self,
            Type::Int(_) | Type::Bool | Type::Address | Type::BytesM(_) | Type::Interface(_)
        )
    }

    pub fn is_byte_array(&self) -> bool {
        matches!(self, Type::Bytes(_) | Type::String(_))
    }

    /// Maximum length of a `Bytes`/`String` type.
    pub fn byte_capacity(&self) -> Option<u32> {
        match self {
            Type::Bytes(n) | Type::String(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether a value of this type can be held in memory (everything except `HashMap`).
    pub fn is_value_type(&self) -> bool {
        match self {
            Type::HashMap(..) => false,
            Type::Array(inner, _) => inner.is_value_type(),
            Type::Struct(s) => s.fields.iter().all(|(_, ty)| ty.is_value_type()),
            _ => true,
        }
    }

    pub fn memory_size(&self) -> u32 {
        match self {
            Type::Bytes(n) | Type::String(n) => WORD + ceil32(*n),
            Type::Array(inner, n) => inner.memory_size() * n,
            Type::Struct(s) => s.fields.iter().map(|(_, ty)| ty.memory_size()).sum(),
            Type::HashMap(..) => 0,
            _ => WORD,
        }
    }

    pub fn storage_slots(&self) -> u64 {
        match self {
            Type::Bytes(n) | Type::String(n) => 1 + u64::from(n.div_ceil(WORD)),
            Type::Array(inner, n) => inner.storage_slots() * u64::from(*n),
            Type::Struct(s) => s.fields.iter().map(|(_, ty)| ty.storage_slots()).sum(),
            _ => 1,
        }
    }

    pub fn abi_is_dynamic(&self) -> bool {
        match self {
            Type::Bytes(_) | Type::String(_) => true,
            Type::Array(inner, _) => inner.abi_is_dynamic(),
            Type::Struct(s) => s.fields.iter().any(|(_, ty)| ty.abi_is_dynamic()),
            _ => false,
        }
    }

    /// Size taken in the head of an enclosing tuple.
    pub fn abi_head_size(&self) -> u32 {
        if self.abi_is_dynamic() { WORD } else { self.memory_size() }
    }

    /// Upper bound on the size of this value's own encoding (the tail for dynamic types).
    pub fn abi_encoded_max(&self) -> u32 {
        match self {
            Type::Bytes(n) | Type::String(n) => WORD + ceil32(*n),
            Type::Array(inner, n) if self.abi_is_dynamic() => {
                (WORD + inner.abi_encoded_max()) * n
            }
            Type::Struct(s) if self.abi_is_dynamic() => {
                tuple_encoded_max(s.fields.iter().map(|(_, ty)| ty))
            }
            _ => self.memory_size(),
        }
    }

    /// Lower bound on the size of a valid encoding, the head plus empty tails.
    pub fn abi_encoded_min(&self) -> u32 {
        match self {
            Type::Bytes(_) | Type::String(_) => WORD,
            Type::Array(inner, n) if self.abi_is_dynamic() => (WORD + inner.abi_encoded_min()) * n,
            Type::Struct(s) if self.abi_is_dynamic() => s
                .fields
                .iter()
                .map(|(_, ty)| {
                    if ty.abi_is_dynamic() { WORD + ty.abi_encoded_min() } else { ty.memory_size() }
                })
                .sum(),
            _ => self.memory_size(),
        }
    }

    /// Canonical ABI type name used in signatures.
    pub fn abi_name(&self) -> String {
        match self {
            Type::Int(int) => int.to_string(),
            Type::Bool => "bool".into(),
            Type::Address | Type::Interface(_) => "address".into(),
            Type::BytesM(m) => format!("bytes{m}"),
            Type::Bytes(_) => "bytes".into(),
            Type::String(_) => "string".into(),
            Type::Array(inner, n) => format!("{}[{n}]", inner.abi_name()),
            Type::Struct(s) => {
                let fields: Vec<String> = s.fields.iter().map(|(_, ty)| ty.abi_name()).collect();
                format!("({})", fields.join(","))
            }
            Type::HashMap(..) => "mapping".into(),
        }
    }

    /// Whether a value of type `other` may be stored in a location of this type. Byte arrays
    /// accept shorter byte arrays of the same kind; anything else needs an exact match.
    pub fn accepts(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Bytes(n), Type::Bytes(m)) | (Type::String(n), Type::String(m)) => m <= n,
            _ => self == other,
        }
    }
}

/// Upper bound of the encoding of a tuple with the given member types.
pub fn tuple_encoded_max<'a>(members: impl IntoIterator<Item = &'a Type>) -> u32 {
    members
        .into_iter()
        .map(|ty| if ty.abi_is_dynamic() { WORD + ty.abi_encoded_max() } else { ty.memory_size() })
        .sum()
}

/// Lower bound of the encoding of a tuple with the given member types.
pub fn tuple_encoded_min<'a>(members: impl IntoIterator<Item = &'a Type>) -> u32 {
    members
        .into_iter()
        .map(|ty| if ty.abi_is_dynamic() { WORD + ty.abi_encoded_min() } else { ty.memory_size() })
        .sum()
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int(int) => write!(f, "{int}"),
            Type::Bool => write!(f, "bool"),
            Type::Address => write!(f, "address"),
            Type::BytesM(m) => write!(f, "bytes{m}"),
            Type::Bytes(n) => write!(f, "Bytes[{n}]"),
            Type::String(n) => write!(f, "String[{n}]"),
            Type::Array(inner, n) => write!(f, "{inner}[{n}]"),
            Type::Struct(s) => write!(f, "{}", s.name),
            Type::Interface(i) => write!(f, "{}", i.name),
            Type::HashMap(key, value) => write!(f, "HashMap[{key}, {value}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> Type {
        Type::Struct(Arc::new(StructType {
            name: "Point".into(),
            fields: vec![("x".into(), Type::UINT256), ("label".into(), Type::String(40))],
        }))
    }

    #[test]
    fn int_bounds() {
        let int8 = IntType { signed: true, bits: 8 };
        assert_eq!(int8.max(), U256::from(127));
        assert_eq!(int8.min(), U256::MAX - U256::from(127));
        assert!(int8.contains(U256::MAX));
        assert!(!int8.contains(U256::from(128)));
        assert!(!int8.contains(U256::MAX - U256::from(128)));
        assert_eq!(IntType::UINT8.max(), U256::from(255));
        assert_eq!(IntType::UINT256.max(), U256::MAX);
        assert_eq!(IntType::INT256.min(), U256::from(1) << 255);
    }

    #[test]
    fn layouts() {
        assert_eq!(Type::Bytes(1).memory_size(), 64);
        assert_eq!(Type::Bytes(64).memory_size(), 96);
        assert_eq!(Type::Bytes(65).storage_slots(), 4);
        assert_eq!(Type::Array(Box::new(Type::Address), 3).memory_size(), 96);
        assert_eq!(point().memory_size(), 32 + 32 + 64);
        assert_eq!(point().storage_slots(), 1 + 1 + 2);
        let Type::Struct(s) = point() else { unreachable!() };
        assert_eq!(s.field_offset(1), 32);
        assert_eq!(s.field_slot_offset(1), 1);
    }

    #[test]
    fn abi_properties() {
        assert!(point().abi_is_dynamic());
        assert_eq!(point().abi_name(), "(uint256,string)");
        assert_eq!(point().abi_encoded_max(), 32 + 32 + 32 + 64);
        assert_eq!(point().abi_encoded_min(), 32 + 32 + 32);
        let fixed = Type::Array(Box::new(Type::Int(IntType::INT256)), 2);
        assert!(!fixed.abi_is_dynamic());
        assert_eq!(fixed.abi_head_size(), 64);
        assert_eq!(Type::Bytes(10).abi_encoded_max(), 64);
        assert_eq!(tuple_encoded_max([&Type::Address, &Type::String(5)]), 32 + 32 + 64);
    }

    #[test]
    fn signature_selector() {
        let transfer = ExternalSignature {
            name: "transfer".into(),
            params: vec![Type::Address, Type::UINT256],
            returns: Some(Type::Bool),
            mutability: Mutability::Nonpayable,
        };
        assert_eq!(transfer.canonical(), "transfer(address,uint256)");
        assert_eq!(transfer.selector(), [0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn byte_arrays_accept_shorter() {
        assert!(Type::Bytes(10).accepts(&Type::Bytes(3)));
        assert!(!Type::Bytes(3).accepts(&Type::Bytes(10)));
        assert!(!Type::String(3).accepts(&Type::Bytes(3)));
    }
}
