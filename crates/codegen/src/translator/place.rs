//! Locations of values: memory, storage and the immutables appended to the runtime code

use super::{Translator, constants};
use crate::error::{CodegenError, Result};
use alloy_primitives::U256;
use evm_glue::opcodes::Opcode;
use vyc_data::{
    Type, TypedExpr,
    hir::ExprKind,
};

/// Where the address on top of the stack points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Location {
    Memory,
    Storage,
    /// Byte offset in the running code (immutables of the runtime code)
    Code,
}

impl Location {
    /// Distance between consecutive values of `ty`, in bytes or storage slots.
    fn stride(self, ty: &Type) -> U256 {
        match self {
            Location::Storage => U256::from(ty.storage_slots()),
            Location::Memory | Location::Code => U256::from(ty.memory_size()),
        }
    }
}

impl Translator<'_> {
    /// Pushes the address of the value `expr` denotes. Expressions that are not places are
    /// evaluated into memory.
    pub(super) fn location(&mut self, expr: &TypedExpr) -> Result<Location> {
        match &expr.kind {
            ExprKind::Local(local) => {
                self.push_u32(self.state.frame.local(*local));
                Ok(Location::Memory)
            }
            ExprKind::Storage(var) => {
                self.push_const(U256::from(self.contract.storage[*var].slot));
                Ok(Location::Storage)
            }
            ExprKind::Immutable(var) => {
                let offset = self.contract.immutables[*var].offset;
                match self.object {
                    super::CodeObject::Init => {
                        self.push_u32(constants::EVM_SCRATCH_SPACE_END + offset);
                        Ok(Location::Memory)
                    }
                    super::CodeObject::Runtime => {
                        self.push_mark(self.state.code_end_mark);
                        self.add_offset(U256::from(offset));
                        Ok(Location::Code)
                    }
                }
            }
            ExprKind::Index { base, index } => match &base.ty {
                Type::HashMap(..) => {
                    let location = self.location(base)?;
                    self.expr(index)?;
                    // keccak256(key ++ slot)
                    self.op(Opcode::PUSH0);
                    self.op(Opcode::MSTORE);
                    self.mstore_at(constants::WORD);
                    self.push_u32(2 * constants::WORD);
                    self.ops([Opcode::PUSH0, Opcode::SHA3]);
                    Ok(location)
                }
                Type::Array(inner, len) => {
                    let location = self.location(base)?;
                    let stride = location.stride(inner);
                    match index.as_literal() {
                        Some(index) if index < U256::from(*len) => {
                            self.add_offset(index * stride);
                        }
                        _ => {
                            self.expr(index)?;
                            // Stack: [base, index]
                            self.op(Opcode::DUP1);
                            self.push_u32(*len);
                            self.op(Opcode::GT);
                            self.panic_unless();
                            if stride != U256::from(1) {
                                self.push_const(stride);
                                self.op(Opcode::MUL);
                            }
                            self.op(Opcode::ADD);
                        }
                    }
                    Ok(location)
                }
                ty => Err(CodegenError::NotAddressable { ty: ty.to_string() }),
            },
            ExprKind::Field { base, index } => {
                let Type::Struct(def) = &base.ty else {
                    return Err(CodegenError::NotAddressable { ty: base.ty.to_string() });
                };
                let location = self.location(base)?;
                let offset = match location {
                    Location::Storage => U256::from(def.field_slot_offset(*index)),
                    Location::Memory | Location::Code => U256::from(def.field_offset(*index)),
                };
                self.add_offset(offset);
                Ok(location)
            }
            _ if expr.ty.is_word() => Err(CodegenError::NotAddressable { ty: expr.ty.to_string() }),
            _ => {
                self.expr(expr)?;
                Ok(Location::Memory)
            }
        }
    }

    fn add_offset(&mut self, offset: U256) {
        if !offset.is_zero() {
            self.push_const(offset);
            self.op(Opcode::ADD);
        }
    }

    /// Stack: [address] → [value]. Values that are not words are copied into a temporary
    /// unless they already live in memory.
    pub(super) fn load(&mut self, location: Location, ty: &Type) -> Result<()> {
        if ty.is_word() {
            match location {
                Location::Memory => self.op(Opcode::MLOAD),
                Location::Storage => self.op(Opcode::SLOAD),
                Location::Code => {
                    self.push_u32(constants::WORD);
                    self.ops([Opcode::SWAP1, Opcode::PUSH0, Opcode::CODECOPY]);
                    self.ops([Opcode::PUSH0, Opcode::MLOAD]);
                }
            }
            return Ok(());
        }

        let size = ty.memory_size();
        match location {
            Location::Memory => {}
            Location::Storage => {
                let buffer = self.temp(size)?;
                self.push_u32(buffer);
                self.copy_storage_to_memory(ty)?;
                self.push_u32(buffer);
            }
            Location::Code => {
                let buffer = self.temp(size)?;
                self.push_u32(size);
                self.op(Opcode::SWAP1);
                self.push_u32(buffer);
                self.op(Opcode::CODECOPY);
                self.push_u32(buffer);
            }
        }
        Ok(())
    }

    /// Stack: [value, address] → []. `ty` is the type of the value, which may be a shorter
    /// byte array than the location holds.
    pub(super) fn store(&mut self, location: Location, ty: &Type) -> Result<()> {
        match location {
            Location::Memory if ty.is_word() => self.op(Opcode::MSTORE),
            Location::Memory => self.copy_memory(ty.memory_size()),
            Location::Storage if ty.is_word() => self.op(Opcode::SSTORE),
            Location::Storage => self.copy_memory_to_storage(ty)?,
            Location::Code => return Err(CodegenError::Unsupported { op: "immutable assignment" }),
        }
        Ok(())
    }

    /// Stack: [src, slot] → []
    fn copy_memory_to_storage(&mut self, ty: &Type) -> Result<()> {
        if ty.is_word() {
            self.ops([Opcode::SWAP1, Opcode::MLOAD, Opcode::SWAP1, Opcode::SSTORE]);
            return Ok(());
        }
        let src = self.temp(constants::WORD)?;
        let slot = self.temp(constants::WORD)?;
        self.mstore_at(slot);
        self.mstore_at(src);

        match ty {
            Type::Bytes(_) | Type::String(_) => {
                // The length word and every data word that holds a byte
                self.mload_at(src);
                self.op(Opcode::MLOAD);
                self.push_word_count();
                self.counted_loop(|t, k| {
                    t.mload_at(src);
                    t.mload_at(k);
                    t.push_u32(5);
                    t.ops([Opcode::SHL, Opcode::ADD, Opcode::MLOAD]);
                    t.mload_at(slot);
                    t.mload_at(k);
                    t.ops([Opcode::ADD, Opcode::SSTORE]);
                    Ok(())
                })
            }
            Type::Array(inner, len) => {
                self.push_u32(*len);
                self.counted_loop(|t, k| {
                    t.element(src, k, U256::from(inner.memory_size()));
                    t.element(slot, k, U256::from(inner.storage_slots()));
                    t.copy_memory_to_storage(inner)
                })
            }
            Type::Struct(def) => {
                for (index, (_, field)) in def.fields.iter().enumerate() {
                    self.mload_at(src);
                    self.add_offset(U256::from(def.field_offset(index)));
                    self.mload_at(slot);
                    self.add_offset(U256::from(def.field_slot_offset(index)));
                    self.copy_memory_to_storage(field)?;
                }
                Ok(())
            }
            _ => Err(CodegenError::NotAddressable { ty: ty.to_string() }),
        }
    }

    /// Stack: [slot, dst] → []
    pub(super) fn copy_storage_to_memory(&mut self, ty: &Type) -> Result<()> {
        if ty.is_word() {
            self.ops([Opcode::SWAP1, Opcode::SLOAD, Opcode::SWAP1, Opcode::MSTORE]);
            return Ok(());
        }
        let slot = self.temp(constants::WORD)?;
        let dst = self.temp(constants::WORD)?;
        self.mstore_at(dst);
        self.mstore_at(slot);

        match ty {
            Type::Bytes(_) | Type::String(_) => {
                self.mload_at(slot);
                self.op(Opcode::SLOAD);
                self.push_word_count();
                self.counted_loop(|t, k| {
                    t.mload_at(slot);
                    t.mload_at(k);
                    t.ops([Opcode::ADD, Opcode::SLOAD]);
                    t.mload_at(dst);
                    t.mload_at(k);
                    t.push_u32(5);
                    t.ops([Opcode::SHL, Opcode::ADD, Opcode::MSTORE]);
                    Ok(())
                })
            }
            Type::Array(inner, len) => {
                self.push_u32(*len);
                self.counted_loop(|t, k| {
                    t.element(slot, k, U256::from(inner.storage_slots()));
                    t.element(dst, k, U256::from(inner.memory_size()));
                    t.copy_storage_to_memory(inner)
                })
            }
            Type::Struct(def) => {
                for (index, (_, field)) in def.fields.iter().enumerate() {
                    self.mload_at(slot);
                    self.add_offset(U256::from(def.field_slot_offset(index)));
                    self.mload_at(dst);
                    self.add_offset(U256::from(def.field_offset(index)));
                    self.copy_storage_to_memory(field)?;
                }
                Ok(())
            }
            _ => Err(CodegenError::NotAddressable { ty: ty.to_string() }),
        }
    }

    /// Pushes `mload(base) + mload(index) * stride`.
    pub(super) fn element(&mut self, base: u32, index: u32, stride: U256) {
        self.mload_at(base);
        self.mload_at(index);
        if stride != U256::from(1) {
            self.push_const(stride);
            self.op(Opcode::MUL);
        }
        self.op(Opcode::ADD);
    }

    /// Stack: [byte length] → [words of a byte array, length word included]
    fn push_word_count(&mut self) {
        self.round_up_to_word();
        self.push_u32(5);
        self.op(Opcode::SHR);
        self.push_u32(1);
        self.op(Opcode::ADD);
    }
}
