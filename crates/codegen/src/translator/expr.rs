//! Expression translation
//!
//! [`Translator::expr`] leaves exactly one value on the stack: the word itself for word types,
//! otherwise a pointer to a memory copy that stays valid until the end of the statement.

use super::{Translator, constants::WORD, place::Location};
use crate::error::{CodegenError, Result};
use alloy_primitives::{Bytes, U256};
use evm_glue::opcodes::Opcode;
use vyc_data::{
    IntType, Type, TypedExpr,
    hir::{AddressMember, BoolOp, CmpOp, EnvVar, ExprKind},
    types::ceil32,
};

impl Translator<'_> {
    pub(super) fn expr(&mut self, expr: &TypedExpr) -> Result<()> {
        match &expr.kind {
            ExprKind::Literal(value) => self.push_const(*value),
            ExprKind::BytesLiteral(bytes) => self.bytes_literal(bytes, &expr.ty)?,
            ExprKind::Local(_)
            | ExprKind::Storage(_)
            | ExprKind::Immutable(_)
            | ExprKind::Index { .. }
            | ExprKind::Field { .. } => {
                let location = self.location(expr)?;
                self.load(location, &expr.ty)?;
            }
            ExprKind::Env(var) => self.op(match var {
                EnvVar::MsgSender => Opcode::CALLER,
                EnvVar::MsgValue => Opcode::CALLVALUE,
                EnvVar::TxOrigin => Opcode::ORIGIN,
                EnvVar::BlockTimestamp => Opcode::TIMESTAMP,
                EnvVar::BlockNumber => Opcode::NUMBER,
                EnvVar::ChainId => Opcode::CHAINID,
                EnvVar::SelfAddress => Opcode::ADDRESS,
            }),
            ExprKind::AddressMember { address, member } => {
                self.expr(address)?;
                match member {
                    AddressMember::Balance => self.op(Opcode::BALANCE),
                    AddressMember::Codesize => self.op(Opcode::EXTCODESIZE),
                    AddressMember::Codehash => self.op(Opcode::EXTCODEHASH),
                    AddressMember::IsContract => {
                        self.ops([Opcode::EXTCODESIZE, Opcode::ISZERO, Opcode::ISZERO])
                    }
                }
            }
            ExprKind::Neg(value) => {
                let Type::Int(int) = value.ty else {
                    return Err(CodegenError::Unsupported { op: "negation" });
                };
                self.expr(value)?;
                self.negate(int);
            }
            ExprKind::Invert(value) => {
                self.expr(value)?;
                self.op(Opcode::NOT);
            }
            ExprKind::Not(value) => {
                self.expr(value)?;
                self.op(Opcode::ISZERO);
            }
            ExprKind::Binary { op, left, right } => {
                self.expr(left)?;
                self.expr(right)?;
                self.arithmetic(*op, &expr.ty)?;
            }
            ExprKind::Compare { op, left, right } => self.compare(*op, left, right)?,
            ExprKind::BoolOp { op, left, right } => {
                let end = self.state.marks.allocate_mark();
                self.expr(left)?;
                self.op(Opcode::DUP1);
                // `and` stops at the first false operand, `or` at the first true one
                if *op == BoolOp::And {
                    self.op(Opcode::ISZERO);
                }
                self.emit_jumpi(end);
                self.op(Opcode::POP);
                self.expr(right)?;
                self.emit_mark(end);
            }
            ExprKind::List(items) | ExprKind::Struct(items) => self.aggregate(items, &expr.ty)?,
            ExprKind::Call(call) => self.call(call, expr.ty.is_word())?,
            ExprKind::Create(creation) => self.create(creation)?,
            ExprKind::Len(value) => {
                // The length word comes first in every location
                let location = self.location(value)?;
                self.load(location, &Type::UINT256)?;
            }
            ExprKind::Empty if expr.ty.is_word() => self.op(Opcode::PUSH0),
            ExprKind::Empty => {
                let size = expr.ty.memory_size();
                let buffer = self.temp(size)?;
                self.push_u32(buffer);
                self.zero_memory(size);
                self.push_u32(buffer);
            }
            ExprKind::Keccak256(value) => {
                self.expr(value)?;
                if value.ty.is_word() {
                    self.op(Opcode::PUSH0);
                    self.op(Opcode::MSTORE);
                    self.push_u32(WORD);
                    self.ops([Opcode::PUSH0, Opcode::SHA3]);
                } else {
                    self.hash_byte_array();
                }
            }
        }
        Ok(())
    }

    /// Stack: [value] → [-value]
    fn negate(&mut self, int: IntType) {
        // The minimum has no positive counterpart
        self.op(Opcode::DUP1);
        self.push_const(int.min());
        self.op(Opcode::EQ);
        self.panic_if();
        self.ops([Opcode::PUSH0, Opcode::SUB]);
    }

    /// Stack: [pointer to a byte array] → [keccak256 of its contents]
    pub(super) fn hash_byte_array(&mut self) {
        // [ptr] → [len, ptr + 32]
        self.ops([Opcode::DUP1, Opcode::MLOAD, Opcode::SWAP1]);
        self.push_u32(WORD);
        self.ops([Opcode::ADD, Opcode::SHA3]);
    }

    fn compare(&mut self, op: CmpOp, left: &TypedExpr, right: &TypedExpr) -> Result<()> {
        self.expr(left)?;
        if left.ty.is_byte_array() {
            self.hash_byte_array();
        }
        self.expr(right)?;
        if right.ty.is_byte_array() {
            self.hash_byte_array();
        }

        // Stack: [left, right]
        let signed = matches!(left.ty, Type::Int(IntType { signed: true, .. }));
        let (lt, gt) = if signed { (Opcode::SLT, Opcode::SGT) } else { (Opcode::LT, Opcode::GT) };
        match op {
            CmpOp::Eq => self.op(Opcode::EQ),
            CmpOp::NotEq => self.ops([Opcode::EQ, Opcode::ISZERO]),
            CmpOp::Lt => self.op(gt),
            CmpOp::Gt => self.op(lt),
            CmpOp::LtEq => self.ops([lt, Opcode::ISZERO]),
            CmpOp::GtEq => self.ops([gt, Opcode::ISZERO]),
        }
        Ok(())
    }

    fn bytes_literal(&mut self, bytes: &Bytes, ty: &Type) -> Result<()> {
        let len = u32::try_from(bytes.len())
            .map_err(|_| CodegenError::Unsupported { op: "oversized literal" })?;
        let buffer = self.temp(ty.memory_size().max(WORD + ceil32(len)))?;
        self.push_u32(len);
        self.mstore_at(buffer);
        for (index, chunk) in bytes.chunks(WORD as usize).enumerate() {
            let mut word = [0u8; WORD as usize];
            word[..chunk.len()].copy_from_slice(chunk);
            self.push_const(U256::from_be_bytes(word));
            self.mstore_at(buffer + WORD * (index as u32 + 1));
        }
        self.push_u32(buffer);
        Ok(())
    }

    /// Array and struct literals, members laid out one after the other.
    fn aggregate(&mut self, members: &[TypedExpr], ty: &Type) -> Result<()> {
        let buffer = self.temp(ty.memory_size())?;
        let mut offset = 0;
        for (index, member) in members.iter().enumerate() {
            let slot_ty = match ty {
                Type::Array(inner, _) => (**inner).clone(),
                Type::Struct(def) => def.fields[index].1.clone(),
                _ => member.ty.clone(),
            };
            self.expr(member)?;
            self.push_u32(buffer + offset);
            self.store(Location::Memory, &member.ty)?;
            offset += slot_ty.memory_size();
        }
        self.push_u32(buffer);
        Ok(())
    }
}
