//! Helper methods for assembly generation

use super::{Translator, constants::WORD, marks::MarkId};
use crate::error::Result;
use alloy_primitives::U256;
use evm_glue::{
    assembly::{Asm, MarkRef, RefType},
    opcodes::Opcode,
};
use vyc_data::{IntType, Type};

macro_rules! push_n {
    ($bytes:expr, $($len:literal => $op:ident),* $(,)?) => {
        match $bytes.len() {
            $($len => {
                let mut arr = [0u8; $len];
                arr.copy_from_slice($bytes);
                Opcode::$op(arr)
            })*
            _ => Opcode::PUSH0,
        }
    };
}

/// The smallest PUSH opcode for `value`.
pub(crate) fn push_opcode(value: U256) -> Opcode {
    let trimmed = value.to_be_bytes_trimmed_vec();
    push_n!(&trimmed[..],
        1 => PUSH1, 2 => PUSH2, 3 => PUSH3, 4 => PUSH4, 5 => PUSH5, 6 => PUSH6, 7 => PUSH7,
        8 => PUSH8, 9 => PUSH9, 10 => PUSH10, 11 => PUSH11, 12 => PUSH12, 13 => PUSH13,
        14 => PUSH14, 15 => PUSH15, 16 => PUSH16, 17 => PUSH17, 18 => PUSH18, 19 => PUSH19,
        20 => PUSH20, 21 => PUSH21, 22 => PUSH22, 23 => PUSH23, 24 => PUSH24, 25 => PUSH25,
        26 => PUSH26, 27 => PUSH27, 28 => PUSH28, 29 => PUSH29, 30 => PUSH30, 31 => PUSH31,
        32 => PUSH32,
    )
}

impl Translator<'_> {
    pub(super) fn op(&mut self, op: Opcode) {
        self.state.asm.push(Asm::Op(op));
    }

    pub(super) fn ops(&mut self, ops: impl IntoIterator<Item = Opcode>) {
        self.state.asm.extend(ops.into_iter().map(Asm::Op));
    }

    /// Push a constant using the smallest PUSH opcode
    pub(super) fn push_const(&mut self, value: U256) {
        self.op(push_opcode(value));
    }

    pub(super) fn push_u32(&mut self, value: u32) {
        self.push_const(U256::from(value));
    }

    /// Push the code offset of `mark`
    pub(super) fn push_mark(&mut self, mark: MarkId) {
        self.state.asm.push(Asm::Ref(MarkRef {
            ref_type: RefType::Direct(mark),
            is_pushed: true,
            set_size: None,
        }));
    }

    /// Push the distance between two marks, `end - start`
    pub(super) fn push_delta(&mut self, end: MarkId, start: MarkId) {
        self.state.asm.push(Asm::Ref(MarkRef {
            ref_type: RefType::Delta(end, start),
            is_pushed: true,
            set_size: None,
        }));
    }

    /// Push the first address past every frame of this code object. Patched once all
    /// functions are translated.
    pub(super) fn push_dynamic_start(&mut self) {
        self.state.dynamic_refs.push(self.state.asm.len());
        self.op(Opcode::PUSH0);
    }

    /// Emit a jump destination mark
    pub(super) fn emit_mark(&mut self, mark: MarkId) {
        self.state.asm.push(Asm::Mark(mark));
        self.op(Opcode::JUMPDEST);
    }

    /// Emit an unconditional jump
    pub(super) fn emit_jump(&mut self, mark: MarkId) {
        self.push_mark(mark);
        self.op(Opcode::JUMP);
    }

    /// Emit a conditional jump (non-zero = jump)
    pub(super) fn emit_jumpi(&mut self, mark: MarkId) {
        // Stack: [condition]
        self.push_mark(mark);
        self.op(Opcode::JUMPI);
    }

    /// Reverts without data if the top of the stack is non-zero.
    pub(super) fn panic_if(&mut self) {
        let panic = self.state.panic_mark;
        self.emit_jumpi(panic);
    }

    /// Reverts without data if the top of the stack is zero.
    pub(super) fn panic_unless(&mut self) {
        self.op(Opcode::ISZERO);
        self.panic_if();
    }

    pub(super) fn mload_at(&mut self, address: u32) {
        self.push_u32(address);
        self.op(Opcode::MLOAD);
    }

    /// Stack: [value] → []
    pub(super) fn mstore_at(&mut self, address: u32) {
        self.push_u32(address);
        self.op(Opcode::MSTORE);
    }

    /// Reserves `size` bytes of the current frame until the end of the statement.
    pub(super) fn temp(&mut self, size: u32) -> Result<u32> {
        self.state.frame.alloc(size)
    }

    /// Runs `f`, then releases the temporaries it allocated.
    pub(super) fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.state.frame.save();
        let result = f(self);
        self.state.frame.release(saved);
        result
    }

    /// Stack: [src, dst] → []
    pub(super) fn copy_memory(&mut self, size: u32) {
        if size == 0 {
            self.ops([Opcode::POP, Opcode::POP]);
            return;
        }
        self.push_u32(size);
        // [src, dst, size] → [size, src, dst]
        self.ops([Opcode::SWAP2, Opcode::SWAP1, Opcode::MCOPY]);
    }

    /// Stack: [dst] → []. Calldata past its end reads as zeros.
    pub(super) fn zero_memory(&mut self, size: u32) {
        self.push_u32(size);
        self.ops([Opcode::CALLDATASIZE, Opcode::DUP3, Opcode::CALLDATACOPY, Opcode::POP]);
    }

    /// Reverts unless the word on top of the stack is a valid value of `ty`. The word stays on
    /// the stack.
    pub(super) fn check_word(&mut self, ty: &Type) {
        match ty {
            Type::Int(IntType { signed: true, bits }) if *bits < 256 => {
                // signextend(bits / 8 - 1, v) == v
                self.ops([Opcode::DUP1, Opcode::DUP1]);
                self.push_u32(u32::from(*bits / 8 - 1));
                self.ops([Opcode::SIGNEXTEND, Opcode::EQ]);
                self.panic_unless();
            }
            Type::Int(IntType { signed: false, bits }) if *bits < 256 => {
                self.high_bits_clear(u32::from(*bits));
            }
            Type::Bool => self.high_bits_clear(1),
            Type::Address | Type::Interface(_) => self.high_bits_clear(160),
            Type::BytesM(m) if *m < 32 => {
                self.op(Opcode::DUP1);
                self.push_u32(u32::from(*m) * 8);
                self.op(Opcode::SHL);
                self.panic_if();
            }
            _ => {}
        }
    }

    fn high_bits_clear(&mut self, bits: u32) {
        self.op(Opcode::DUP1);
        self.push_u32(bits);
        self.op(Opcode::SHR);
        self.panic_if();
    }

    /// Emits `for k in 0..count { body(k_slot) }` with the count on top of the stack. `body`
    /// finds the index in memory at `k_slot` and must leave the stack as it found it.
    pub(super) fn counted_loop(
        &mut self,
        body: impl FnOnce(&mut Self, u32) -> Result<()>,
    ) -> Result<()> {
        let count = self.temp(WORD)?;
        let index = self.temp(WORD)?;
        self.mstore_at(count);
        self.op(Opcode::PUSH0);
        self.mstore_at(index);

        let start = self.state.marks.allocate_mark();
        let end = self.state.marks.allocate_mark();
        self.emit_mark(start);
        self.mload_at(count);
        self.mload_at(index);
        // index < count
        self.ops([Opcode::LT, Opcode::ISZERO]);
        self.emit_jumpi(end);

        body(self, index)?;

        self.mload_at(index);
        self.push_u32(1);
        self.op(Opcode::ADD);
        self.mstore_at(index);
        self.emit_jump(start);
        self.emit_mark(end);
        Ok(())
    }

    /// Stack: [len] → [ceil32(len)]
    pub(super) fn round_up_to_word(&mut self) {
        self.push_u32(WORD - 1);
        self.op(Opcode::ADD);
        self.push_const(!U256::from(WORD - 1));
        self.op(Opcode::AND);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_opcode_widths() {
        assert!(matches!(push_opcode(U256::ZERO), Opcode::PUSH0));
        assert!(matches!(push_opcode(U256::from(0xff)), Opcode::PUSH1([0xff])));
        assert!(matches!(push_opcode(U256::from(0x100)), Opcode::PUSH2([0x01, 0x00])));
        assert!(matches!(push_opcode(U256::from(1) << 160), Opcode::PUSH21(_)));
        assert!(matches!(push_opcode(U256::MAX), Opcode::PUSH32(_)));
    }
}
