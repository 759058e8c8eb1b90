//! ABI encoding of memory values and validated decoding from calldata, code or memory

use super::{Translator, constants::WORD, place::Location};
use crate::error::Result;
use alloy_primitives::U256;
use evm_glue::opcodes::Opcode;
use std::sync::Arc;
use vyc_data::{
    StructType, Type, TypedExpr,
    types::{ceil32, tuple_encoded_max},
};

/// Where encoded data is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AbiSource {
    Calldata,
    /// Constructor arguments appended to the init code
    Code,
    /// Return data copied into memory. The word at `end` holds the first address past it.
    Memory { end: u32 },
}

/// The members of an encoded tuple as a struct, which shares its memory layout.
pub(super) fn tuple_type(members: impl IntoIterator<Item = Type>) -> Type {
    let fields = members.into_iter().map(|ty| (String::new(), ty)).collect();
    Type::Struct(Arc::new(StructType { name: String::new(), fields }))
}

/// Whether some word of `ty` can hold an invalid value.
fn needs_validation(ty: &Type) -> bool {
    match ty {
        Type::Int(int) => int.bits < 256,
        Type::BytesM(m) => *m < 32,
        Type::Bool | Type::Address | Type::Interface(_) => true,
        Type::Array(inner, _) => needs_validation(inner),
        Type::Struct(def) => def.fields.iter().any(|(_, ty)| needs_validation(ty)),
        Type::Bytes(_) | Type::String(_) | Type::HashMap(..) => false,
    }
}

impl AbiSource {
    fn copy_opcode(self) -> Opcode {
        match self {
            AbiSource::Calldata => Opcode::CALLDATACOPY,
            AbiSource::Code => Opcode::CODECOPY,
            AbiSource::Memory { .. } => Opcode::MCOPY,
        }
    }
}

impl Translator<'_> {
    /// Evaluates `values` into one memory tuple. Pushes its address and returns its type.
    pub(super) fn materialize(&mut self, values: &[TypedExpr]) -> Result<Type> {
        let ty = tuple_type(values.iter().map(|value| value.ty.clone()));
        if let [value] = values {
            if !value.ty.is_word() {
                self.expr(value)?;
                return Ok(ty);
            }
        }
        let buffer = self.temp(ty.memory_size())?;
        let mut offset = 0;
        for value in values {
            self.expr(value)?;
            self.push_u32(buffer + offset);
            self.store(Location::Memory, &value.ty)?;
            offset += value.ty.memory_size();
        }
        self.push_u32(buffer);
        Ok(ty)
    }

    /// Encodes `values` as a tuple into a fresh buffer, leaving `reserved` bytes in front of the
    /// encoding. Pushes the length of the encoding and returns the buffer's address.
    pub(super) fn encode_values(&mut self, values: &[TypedExpr], reserved: u32) -> Result<u32> {
        let tuple = self.materialize(values)?;
        let max = tuple_encoded_max(values.iter().map(|value| &value.ty));
        // The padding word of a byte array may end past the encoding
        let buffer = self.temp(reserved + ceil32(max) + WORD)?;
        self.push_u32(buffer + reserved);
        self.abi_encode(&tuple)?;
        Ok(buffer)
    }

    /// Stack: [src, dst] → [encoded length]
    pub(super) fn abi_encode(&mut self, ty: &Type) -> Result<()> {
        if !ty.abi_is_dynamic() {
            let size = ty.memory_size();
            self.copy_memory(size);
            self.push_u32(size);
            return Ok(());
        }
        let src = self.temp(WORD)?;
        let dst = self.temp(WORD)?;
        self.mstore_at(dst);
        self.mstore_at(src);

        match ty {
            Type::Bytes(_) | Type::String(_) => {
                // Length word and data
                self.mload_at(src);
                self.op(Opcode::MLOAD);
                self.push_u32(WORD);
                self.op(Opcode::ADD);
                self.mload_at(src);
                self.mload_at(dst);
                self.op(Opcode::MCOPY);
                // Zero padding up to the next word
                self.op(Opcode::PUSH0);
                self.mload_at(src);
                self.op(Opcode::MLOAD);
                self.mload_at(dst);
                self.op(Opcode::ADD);
                self.push_u32(WORD);
                self.ops([Opcode::ADD, Opcode::MSTORE]);

                self.mload_at(src);
                self.op(Opcode::MLOAD);
                self.round_up_to_word();
                self.push_u32(WORD);
                self.op(Opcode::ADD);
            }
            Type::Array(inner, len) => {
                let tail = self.temp(WORD)?;
                self.push_u32(WORD * len);
                self.mstore_at(tail);
                self.push_u32(*len);
                self.counted_loop(|t, k| {
                    // Head: offset of the element's encoding
                    t.mload_at(tail);
                    t.element(dst, k, U256::from(WORD));
                    t.op(Opcode::MSTORE);
                    t.element(src, k, U256::from(inner.memory_size()));
                    t.mload_at(dst);
                    t.mload_at(tail);
                    t.op(Opcode::ADD);
                    t.abi_encode(inner)?;
                    t.mload_at(tail);
                    t.op(Opcode::ADD);
                    t.mstore_at(tail);
                    Ok(())
                })?;
                self.mload_at(tail);
            }
            Type::Struct(def) => {
                let tail = self.temp(WORD)?;
                let head_size: u32 = def.fields.iter().map(|(_, ty)| ty.abi_head_size()).sum();
                self.push_u32(head_size);
                self.mstore_at(tail);
                let mut head = 0;
                for (index, (_, field)) in def.fields.iter().enumerate() {
                    let offset = def.field_offset(index);
                    if field.abi_is_dynamic() {
                        self.mload_at(tail);
                        self.mload_at(dst);
                        self.push_u32(head);
                        self.ops([Opcode::ADD, Opcode::MSTORE]);
                        self.offset_from(src, offset);
                        self.mload_at(dst);
                        self.mload_at(tail);
                        self.op(Opcode::ADD);
                        self.abi_encode(field)?;
                        self.mload_at(tail);
                        self.op(Opcode::ADD);
                        self.mstore_at(tail);
                    } else {
                        self.offset_from(src, offset);
                        self.offset_from(dst, head);
                        self.copy_memory(field.memory_size());
                    }
                    head += field.abi_head_size();
                }
                self.mload_at(tail);
            }
            _ => self.op(Opcode::PUSH0),
        }
        Ok(())
    }

    /// Pushes `mload(slot) + offset`.
    fn offset_from(&mut self, slot: u32, offset: u32) {
        self.mload_at(slot);
        if offset != 0 {
            self.push_u32(offset);
            self.op(Opcode::ADD);
        }
    }

    /// Stack: [position] → [word]
    fn source_word(&mut self, source: AbiSource) {
        match source {
            AbiSource::Calldata => self.op(Opcode::CALLDATALOAD),
            AbiSource::Code => {
                self.push_u32(WORD);
                self.ops([Opcode::SWAP1, Opcode::PUSH0, Opcode::CODECOPY]);
                self.ops([Opcode::PUSH0, Opcode::MLOAD]);
            }
            AbiSource::Memory { .. } => self.op(Opcode::MLOAD),
        }
    }

    fn source_end(&mut self, source: AbiSource) {
        match source {
            AbiSource::Calldata => self.op(Opcode::CALLDATASIZE),
            AbiSource::Code => self.op(Opcode::CODESIZE),
            AbiSource::Memory { end } => self.mload_at(end),
        }
    }

    /// Stack: [position] → []. Reverts unless the source holds `size` bytes from position on.
    fn require_available(&mut self, size: u32, source: AbiSource) {
        if size != 0 {
            self.push_u32(size);
            self.op(Opcode::ADD);
        }
        self.source_end(source);
        // end < position + size
        self.op(Opcode::LT);
        self.panic_if();
    }

    /// Stack: [position, dst] → []. Decodes a value of `ty` whose encoding starts at
    /// `position` into memory at `dst`, reverting on malformed input.
    pub(super) fn abi_decode(&mut self, ty: &Type, source: AbiSource) -> Result<()> {
        if !ty.abi_is_dynamic() {
            let dst = self.temp(WORD)?;
            self.op(Opcode::DUP1);
            self.mstore_at(dst);
            // [position, dst] → [size, position, dst]
            self.push_u32(ty.memory_size());
            self.ops([Opcode::SWAP2, Opcode::SWAP1, source.copy_opcode()]);
            return self.validate(ty, dst);
        }
        let pos = self.temp(WORD)?;
        let dst = self.temp(WORD)?;
        self.mstore_at(dst);
        self.mstore_at(pos);

        match ty {
            Type::Bytes(capacity) | Type::String(capacity) => {
                self.mload_at(pos);
                self.source_word(source);
                // len <= capacity
                self.op(Opcode::DUP1);
                self.push_u32(*capacity);
                self.op(Opcode::LT);
                self.panic_if();
                self.mload_at(pos);
                self.op(Opcode::ADD);
                self.require_available(WORD, source);

                self.mload_at(pos);
                self.source_word(source);
                self.push_u32(WORD);
                self.op(Opcode::ADD);
                self.mload_at(pos);
                self.mload_at(dst);
                self.op(source.copy_opcode());
            }
            Type::Array(inner, len) => {
                self.push_u32(*len);
                self.counted_loop(|t, k| {
                    t.element(pos, k, U256::from(WORD));
                    t.decode_member(inner, pos, source)?;
                    t.element(dst, k, U256::from(inner.memory_size()));
                    t.abi_decode(inner, source)
                })?;
            }
            Type::Struct(def) => {
                let mut head = 0;
                for (index, (_, field)) in def.fields.iter().enumerate() {
                    self.offset_from(pos, head);
                    if field.abi_is_dynamic() {
                        self.decode_member(field, pos, source)?;
                    }
                    self.offset_from(dst, def.field_offset(index));
                    self.abi_decode(field, source)?;
                    head += field.abi_head_size();
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Stack: [head position] → [position of the member's encoding]. Follows the offset of a
    /// dynamic member of the tuple starting at `mload(base)`.
    fn decode_member(&mut self, ty: &Type, base: u32, source: AbiSource) -> Result<()> {
        self.source_word(source);
        // Offsets must fit in 32 bits so that the sum below cannot wrap
        self.op(Opcode::DUP1);
        self.push_u32(32);
        self.op(Opcode::SHR);
        self.panic_if();
        self.mload_at(base);
        self.op(Opcode::ADD);
        self.op(Opcode::DUP1);
        self.require_available(ty.abi_encoded_min(), source);
        Ok(())
    }

    /// Reverts unless every word of the `ty` value at `mload(slot)` is valid.
    fn validate(&mut self, ty: &Type, slot: u32) -> Result<()> {
        if !needs_validation(ty) {
            return Ok(());
        }
        match ty {
            Type::Array(inner, len) => {
                let element = self.temp(WORD)?;
                self.push_u32(*len);
                self.counted_loop(|t, k| {
                    t.element(slot, k, U256::from(inner.memory_size()));
                    t.mstore_at(element);
                    t.validate(inner, element)
                })
            }
            Type::Struct(def) => {
                let field_slot = self.temp(WORD)?;
                for (index, (_, field)) in def.fields.iter().enumerate() {
                    if needs_validation(field) {
                        self.offset_from(slot, def.field_offset(index));
                        self.mstore_at(field_slot);
                        self.validate(field, field_slot)?;
                    }
                }
                Ok(())
            }
            _ => {
                self.mload_at(slot);
                self.op(Opcode::MLOAD);
                self.check_word(ty);
                self.op(Opcode::POP);
                Ok(())
            }
        }
    }

    /// Reverts unless at least `size` bytes of return data are available.
    pub(super) fn require_returndata(&mut self, size: u32) {
        self.push_u32(size);
        self.op(Opcode::RETURNDATASIZE);
        self.op(Opcode::LT);
        self.panic_if();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vyc_data::IntType;

    #[test]
    fn validation_skips_full_words() {
        assert!(!needs_validation(&Type::UINT256));
        assert!(!needs_validation(&Type::BytesM(32)));
        assert!(!needs_validation(&Type::String(10)));
        assert!(needs_validation(&Type::Int(IntType::UINT8)));
        assert!(needs_validation(&Type::Array(Box::new(Type::Bool), 3)));
        assert!(needs_validation(&tuple_type([Type::UINT256, Type::Address])));
    }

    #[test]
    fn tuples_share_the_memory_layout_of_their_members() {
        let tuple = tuple_type([Type::UINT256, Type::String(40), Type::Bool]);
        assert_eq!(tuple.memory_size(), 32 + 96 + 32);
        assert!(tuple.abi_is_dynamic());
        let Type::Struct(def) = &tuple else { unreachable!() };
        assert_eq!(def.field_offset(2), 128);
        assert_eq!(tuple.abi_head_size(), 32);
    }
}
