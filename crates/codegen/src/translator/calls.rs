//! Internal and external calls
//!
//! Internal calls jump to the callee's body with the return address and the arguments on the
//! stack. The callee stores its arguments into its own frame and jumps back with its result, if
//! any, in place of the return address.

use super::{
    Translator,
    abi::{AbiSource, tuple_type},
    constants::{SELECTOR_SIZE, WORD},
};
use crate::error::{CodegenError, Result};
use alloy_primitives::U256;
use evm_glue::opcodes::Opcode;
use vyc_data::{
    Call, CallTarget, ExternalSignature, FunctionId, TypedExpr,
    types::{ceil32, tuple_encoded_max},
};

impl Translator<'_> {
    /// Pushes the call's result when `keep_result` is set and discards it otherwise.
    pub(super) fn call(&mut self, call: &Call, keep_result: bool) -> Result<()> {
        let returns = match &call.target {
            CallTarget::Internal(function) => self.call_internal(*function, &call.args)?,
            CallTarget::External { address, signature } => {
                self.call_external(address, signature, &call.args)?
            }
        };
        if returns && !keep_result {
            self.op(Opcode::POP);
        }
        Ok(())
    }

    /// Returns whether a result was pushed.
    fn call_internal(&mut self, function: FunctionId, args: &[TypedExpr]) -> Result<bool> {
        let contract = self.contract;
        let callee = &contract.functions[function];
        if args.len() != callee.params.len() {
            return Err(CodegenError::ArgumentCount {
                function,
                expected: callee.params.len(),
                found: args.len(),
            });
        }
        let (body, fresh) = self.state.marks.function_mark(function);
        if fresh {
            self.state.pending.push(function);
        }

        let back = self.state.marks.allocate_mark();
        self.push_mark(back);
        for arg in args {
            self.expr(arg)?;
        }
        self.emit_jump(body);
        self.emit_mark(back);

        let Some(returns) = &callee.returns else {
            return Ok(false);
        };
        if !returns.is_word() {
            // The result points into the callee's frame, which the next call overwrites
            let size = returns.memory_size();
            let buffer = self.temp(size)?;
            self.push_u32(buffer);
            self.copy_memory(size);
            self.push_u32(buffer);
        }
        Ok(true)
    }

    /// Returns whether a result was pushed.
    fn call_external(
        &mut self,
        address: &TypedExpr,
        signature: &ExternalSignature,
        args: &[TypedExpr],
    ) -> Result<bool> {
        let target = self.temp(WORD)?;
        self.expr(address)?;
        self.mstore_at(target);
        // Calls to accounts without code would succeed without doing anything
        self.mload_at(target);
        self.op(Opcode::EXTCODESIZE);
        self.panic_unless();

        let input = self.encode_values(args, SELECTOR_SIZE)?;
        let selector = U256::from(u32::from_be_bytes(signature.selector())) << 224;
        self.push_const(selector);
        self.mstore_at(input);
        self.push_u32(SELECTOR_SIZE);
        self.op(Opcode::ADD);

        let output_size = match &signature.returns {
            Some(ty) => ceil32(tuple_encoded_max([ty])),
            None => 0,
        };
        let output = self.temp(output_size)?;

        // [input size] → [output size, output, input size, input]
        self.push_u32(output_size);
        self.op(Opcode::SWAP1);
        self.push_u32(output);
        self.op(Opcode::SWAP1);
        self.push_u32(input);
        if signature.mutability.can_write_state() {
            self.op(Opcode::PUSH0);
            self.mload_at(target);
            self.ops([Opcode::GAS, Opcode::CALL]);
        } else {
            self.mload_at(target);
            self.ops([Opcode::GAS, Opcode::STATICCALL]);
        }
        self.op(Opcode::ISZERO);
        let bubble = self.state.bubble_revert_mark;
        self.emit_jumpi(bubble);

        let Some(returns) = &signature.returns else {
            return Ok(false);
        };
        let tuple = tuple_type([returns.clone()]);
        self.require_returndata(tuple.abi_encoded_min());

        // The call copied min(returndatasize, output size) bytes
        let end = self.temp(WORD)?;
        self.op(Opcode::RETURNDATASIZE);
        self.push_u32(output_size);
        self.ops([Opcode::DUP2, Opcode::DUP2, Opcode::GT]);
        // [rds, max, rds < max] → [min(rds, max)]
        self.ops([Opcode::DUP3, Opcode::DUP3, Opcode::XOR, Opcode::MUL]);
        self.ops([Opcode::XOR, Opcode::SWAP1, Opcode::POP]);
        self.push_u32(output);
        self.op(Opcode::ADD);
        self.mstore_at(end);

        let size = returns.memory_size();
        let value = self.temp(size)?;
        self.push_u32(output);
        self.push_u32(value);
        self.abi_decode(&tuple, AbiSource::Memory { end })?;
        self.push_u32(value);
        if returns.is_word() {
            self.op(Opcode::MLOAD);
        }
        Ok(true)
    }
}
