//! Checked integer arithmetic. Every operation reverts on overflow, underflow and division by
//! zero, results of narrow integer types are range checked.

use super::Translator;
use crate::error::{CodegenError, Result};
use evm_glue::opcodes::Opcode;
use vyc_data::{IntType, Type, hir::BinOp};

impl Translator<'_> {
    /// Stack: [left, right] → [left op right]
    pub(super) fn arithmetic(&mut self, op: BinOp, ty: &Type) -> Result<()> {
        let Type::Int(int) = *ty else {
            return Err(CodegenError::Unsupported { op: op.symbol() });
        };
        let wide = int.bits == 256;
        match op {
            BinOp::Add if int.signed && wide => self.signed_add(),
            BinOp::Add if wide => {
                // The sum wraps iff it is smaller than the left operand
                self.ops([Opcode::DUP2, Opcode::ADD, Opcode::DUP1, Opcode::SWAP2, Opcode::GT]);
                self.panic_if();
            }
            BinOp::Add => self.op(Opcode::ADD),
            BinOp::Sub if int.signed && wide => self.signed_sub(),
            BinOp::Sub if int.signed => self.ops([Opcode::SWAP1, Opcode::SUB]),
            BinOp::Sub => {
                self.ops([Opcode::DUP2, Opcode::DUP2, Opcode::GT]);
                self.panic_if();
                self.ops([Opcode::SWAP1, Opcode::SUB]);
            }
            BinOp::Mul => self.mul(int),
            BinOp::Div | BinOp::Mod => {
                self.op(Opcode::DUP1);
                self.op(Opcode::ISZERO);
                self.panic_if();
                if int.signed && wide && op == BinOp::Div {
                    self.min_by_minus_one();
                }
                let opcode = match (op, int.signed) {
                    (BinOp::Div, false) => Opcode::DIV,
                    (BinOp::Div, true) => Opcode::SDIV,
                    (_, false) => Opcode::MOD,
                    (_, true) => Opcode::SMOD,
                };
                self.ops([Opcode::SWAP1, opcode]);
            }
            BinOp::BitAnd => self.op(Opcode::AND),
            BinOp::BitOr => self.op(Opcode::OR),
            BinOp::BitXor => self.op(Opcode::XOR),
            // The shift amount is on top, as SHL and SHR expect
            BinOp::Shl => self.op(Opcode::SHL),
            BinOp::Shr => self.op(Opcode::SHR),
            BinOp::Pow => return Err(CodegenError::Unsupported { op: "**" }),
        }
        self.check_word(ty);
        Ok(())
    }

    fn signed_add(&mut self) {
        // [l, r, s]: overflow iff (s < l) != (r < 0)
        self.ops([Opcode::DUP2, Opcode::DUP2, Opcode::ADD]);
        self.ops([Opcode::DUP1, Opcode::DUP4, Opcode::SGT]);
        self.ops([Opcode::DUP3, Opcode::PUSH0, Opcode::SGT, Opcode::XOR]);
        self.panic_if();
        self.ops([Opcode::SWAP2, Opcode::POP, Opcode::POP]);
    }

    fn signed_sub(&mut self) {
        // [l, r, d]: overflow iff (d > l) != (r < 0)
        self.ops([Opcode::DUP1, Opcode::DUP3, Opcode::SUB]);
        self.ops([Opcode::DUP3, Opcode::DUP2, Opcode::SGT]);
        self.ops([Opcode::DUP3, Opcode::PUSH0, Opcode::SGT, Opcode::XOR]);
        self.panic_if();
        self.ops([Opcode::SWAP2, Opcode::POP, Opcode::POP]);
    }

    fn mul(&mut self, int: IntType) {
        if int.signed && int.bits == 256 {
            // -1 * MIN passes the division check below
            self.ops([Opcode::DUP2, Opcode::NOT, Opcode::ISZERO, Opcode::DUP2]);
            self.push_const(int.min());
            self.ops([Opcode::EQ, Opcode::AND]);
            self.panic_if();
        }
        let div = if int.signed { Opcode::SDIV } else { Opcode::DIV };
        // [l, r, p]: valid iff l == 0 or p / l == r
        self.ops([Opcode::DUP2, Opcode::DUP2, Opcode::MUL]);
        self.ops([Opcode::DUP3, Opcode::ISZERO]);
        self.ops([Opcode::DUP4, Opcode::DUP3, div, Opcode::DUP4, Opcode::EQ, Opcode::OR]);
        self.panic_unless();
        self.ops([Opcode::SWAP2, Opcode::POP, Opcode::POP]);
    }

    /// Reverts on `MIN / -1` with [l, r] on the stack.
    fn min_by_minus_one(&mut self) {
        self.ops([Opcode::DUP1, Opcode::NOT, Opcode::ISZERO, Opcode::DUP3]);
        self.push_const(IntType::INT256.min());
        self.ops([Opcode::EQ, Opcode::AND]);
        self.panic_if();
    }
}
