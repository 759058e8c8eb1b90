//! Statement translation. Statements leave the stack as they found it and release their
//! temporaries when done.

use super::{
    LoopMarks, Translator,
    constants::{ERROR_SELECTOR, SELECTOR_SIZE, WORD},
    place::Location,
};
use crate::error::{CodegenError, Result};
use alloy_primitives::U256;
use evm_glue::opcodes::Opcode;
use vyc_data::{
    EventId, IntType, LocalId, Stmt, Type, TypedExpr,
    hir::FunctionKind,
};

impl Translator<'_> {
    pub(super) fn statements(&mut self, body: &[Stmt]) -> Result<()> {
        for stmt in body {
            self.scoped(|t| t.statement(stmt))?;
        }
        Ok(())
    }

    fn statement(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Assign { target, value } => {
                self.expr(value)?;
                let location = self.location(target)?;
                self.store(location, &value.ty)
            }
            Stmt::AugAssign { target, op, value } => {
                let location = self.location(target)?;
                self.op(Opcode::DUP1);
                self.load(location, &target.ty)?;
                self.expr(value)?;
                self.arithmetic(*op, &target.ty)?;
                self.op(Opcode::SWAP1);
                self.store(location, &target.ty)
            }
            Stmt::Call(call) => self.call(call, false),
            Stmt::Expr(expr) => {
                self.expr(expr)?;
                self.op(Opcode::POP);
                Ok(())
            }
            Stmt::If { test, body, orelse } => {
                let otherwise = self.state.marks.allocate_mark();
                self.expr(test)?;
                self.op(Opcode::ISZERO);
                self.emit_jumpi(otherwise);
                self.statements(body)?;
                if orelse.is_empty() {
                    self.emit_mark(otherwise);
                } else {
                    let end = self.state.marks.allocate_mark();
                    self.emit_jump(end);
                    self.emit_mark(otherwise);
                    self.statements(orelse)?;
                    self.emit_mark(end);
                }
                Ok(())
            }
            Stmt::ForRange { var, start, end, bound, body } => {
                self.for_range(*var, start, end, *bound, body)
            }
            Stmt::ForIn { var, iter, body } => self.for_in(*var, iter, body),
            Stmt::Return(value) => self.return_from_function(value.as_ref()),
            Stmt::Assert { test, reason } => {
                let ok = self.state.marks.allocate_mark();
                self.expr(test)?;
                self.emit_jumpi(ok);
                self.revert_with(reason.as_ref())?;
                self.emit_mark(ok);
                Ok(())
            }
            Stmt::Raise(reason) => self.revert_with(reason.as_ref()),
            Stmt::Log { event, args } => self.log(*event, args),
            Stmt::Break | Stmt::Continue => {
                let is_break = matches!(stmt, Stmt::Break);
                let what = if is_break { "break" } else { "continue" };
                let Some(marks) = self.state.loops.last().copied() else {
                    return Err(CodegenError::OutsideLoop { what });
                };
                self.emit_jump(if is_break { marks.break_mark } else { marks.continue_mark });
                Ok(())
            }
            Stmt::Pass => Ok(()),
        }
    }

    /// Runs `body` once per index `0..mload(count)`, the index kept at `index`.
    fn loop_over(
        &mut self,
        count: u32,
        index: u32,
        body: &[Stmt],
        prologue: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        let start = self.state.marks.allocate_mark();
        let marks = LoopMarks {
            continue_mark: self.state.marks.allocate_mark(),
            break_mark: self.state.marks.allocate_mark(),
        };
        self.op(Opcode::PUSH0);
        self.mstore_at(index);

        self.emit_mark(start);
        self.mload_at(count);
        self.mload_at(index);
        self.ops([Opcode::LT, Opcode::ISZERO]);
        self.emit_jumpi(marks.break_mark);
        self.scoped(prologue)?;

        self.state.loops.push(marks);
        let result = self.statements(body);
        self.state.loops.pop();
        result?;

        self.emit_mark(marks.continue_mark);
        self.mload_at(index);
        self.push_u32(1);
        self.op(Opcode::ADD);
        self.mstore_at(index);
        self.emit_jump(start);
        self.emit_mark(marks.break_mark);
        Ok(())
    }

    fn for_range(
        &mut self,
        var: LocalId,
        start: &TypedExpr,
        end: &TypedExpr,
        bound: u64,
        body: &[Stmt],
    ) -> Result<()> {
        let first = self.temp(WORD)?;
        let count = self.temp(WORD)?;
        let index = self.temp(WORD)?;
        self.expr(start)?;
        self.mstore_at(first);

        // count = end > start ? end - start : 0
        let signed = matches!(start.ty, Type::Int(IntType { signed: true, .. }));
        self.expr(end)?;
        self.mload_at(first);
        self.ops([Opcode::DUP1, Opcode::DUP3, if signed { Opcode::SLT } else { Opcode::LT }]);
        self.ops([Opcode::SWAP2, Opcode::SUB, Opcode::SWAP1, Opcode::ISZERO, Opcode::MUL]);
        self.mstore_at(count);

        if start.as_literal().is_none() || end.as_literal().is_none() {
            self.push_const(U256::from(bound));
            self.mload_at(count);
            self.op(Opcode::GT);
            self.panic_if();
        }

        let var = self.state.frame.local(var);
        self.loop_over(count, index, body, |t| {
            t.mload_at(index);
            t.mload_at(first);
            t.op(Opcode::ADD);
            t.mstore_at(var);
            Ok(())
        })
    }

    fn for_in(&mut self, var: LocalId, iter: &TypedExpr, body: &[Stmt]) -> Result<()> {
        let Type::Array(element, len) = &iter.ty else {
            return Err(CodegenError::NotAddressable { ty: iter.ty.to_string() });
        };
        let base = self.temp(WORD)?;
        let count = self.temp(WORD)?;
        let index = self.temp(WORD)?;
        let location = self.location(iter)?;
        self.mstore_at(base);
        self.push_u32(*len);
        self.mstore_at(count);

        let var = self.state.frame.local(var);
        let stride = match location {
            Location::Storage => U256::from(element.storage_slots()),
            Location::Memory | Location::Code => U256::from(element.memory_size()),
        };
        self.loop_over(count, index, body, |t| {
            t.element(base, index, stride);
            t.load(location, element)?;
            t.push_u32(var);
            t.store(Location::Memory, element)
        })
    }

    fn return_from_function(&mut self, value: Option<&TypedExpr>) -> Result<()> {
        let kind = match self.state.function {
            Some(function) => self.contract.functions[function].kind,
            None => FunctionKind::External,
        };
        match (kind, value) {
            (FunctionKind::Internal, Some(value)) => {
                // [return address, value] → jump back with [value]
                self.expr(value)?;
                self.ops([Opcode::SWAP1, Opcode::JUMP]);
            }
            (FunctionKind::Internal, None) => self.op(Opcode::JUMP),
            (FunctionKind::Constructor, _) => {
                let deploy = self.state.deploy_mark;
                self.emit_jump(deploy);
            }
            (FunctionKind::External | FunctionKind::Fallback, Some(value)) => {
                let buffer = self.encode_values(std::slice::from_ref(value), 0)?;
                self.push_u32(buffer);
                self.op(Opcode::RETURN);
            }
            (FunctionKind::External | FunctionKind::Fallback, None) => self.op(Opcode::STOP),
        }
        Ok(())
    }

    /// Reverts, with `Error(string)` data if there is a reason.
    fn revert_with(&mut self, reason: Option<&TypedExpr>) -> Result<()> {
        let Some(reason) = reason else {
            self.ops([Opcode::PUSH0, Opcode::PUSH0, Opcode::REVERT]);
            return Ok(());
        };
        let buffer = self.encode_values(std::slice::from_ref(reason), SELECTOR_SIZE)?;
        self.push_const(U256::from(ERROR_SELECTOR) << 224);
        self.mstore_at(buffer);
        self.push_u32(SELECTOR_SIZE);
        self.op(Opcode::ADD);
        self.push_u32(buffer);
        self.op(Opcode::REVERT);
        Ok(())
    }

    fn log(&mut self, event: EventId, args: &[TypedExpr]) -> Result<()> {
        let contract = self.contract;
        let event = &contract.events[event];

        let mut topics = Vec::new();
        let mut data = Vec::new();
        for (field, arg) in event.fields.iter().zip(args) {
            if !field.indexed {
                data.push(arg.clone());
                continue;
            }
            // Byte arrays are logged as their hash
            let topic = self.temp(WORD)?;
            self.expr(arg)?;
            if arg.ty.is_byte_array() {
                self.hash_byte_array();
            }
            self.mstore_at(topic);
            topics.push(topic);
        }
        let opcode = match topics.len() {
            0 => Opcode::LOG1,
            1 => Opcode::LOG2,
            2 => Opcode::LOG3,
            3 => Opcode::LOG4,
            _ => return Err(CodegenError::Unsupported { op: "more than 3 indexed fields" }),
        };

        let size = self.temp(WORD)?;
        let buffer = if data.is_empty() {
            self.op(Opcode::PUSH0);
            0
        } else {
            self.encode_values(&data, 0)?
        };
        self.mstore_at(size);

        for &topic in topics.iter().rev() {
            self.mload_at(topic);
        }
        self.push_const(U256::from_be_bytes(event.topic0.0));
        self.mload_at(size);
        self.push_u32(buffer);
        self.op(opcode);
        Ok(())
    }
}
