//! Code object layouts: the runtime dispatcher, the constructor and deployment, internal
//! function bodies

use super::{
    Translator,
    abi::{AbiSource, tuple_type},
    constants::{EVM_SCRATCH_SPACE_END, SELECTOR_SIZE},
    marks::MarkId,
    place::Location,
};
use crate::error::Result;
use alloy_primitives::U256;
use evm_glue::opcodes::Opcode;
use vyc_data::{
    Function, FunctionId, Mutability,
    abi::selector,
    types::tuple_encoded_min,
};

/// Dispatcher target for one accepted argument count of an external function.
struct EntryPoint {
    selector: [u8; 4],
    arity: usize,
    mark: MarkId,
}

impl Translator<'_> {
    pub(super) fn generate_runtime_code(&mut self) -> Result<()> {
        let contract = self.contract;
        let fallback = self.state.marks.allocate_mark();

        let mut functions = Vec::new();
        for (id, function) in contract.external_functions() {
            let entries: Vec<EntryPoint> = (function.required_params()..=function.params.len())
                .map(|arity| EntryPoint {
                    selector: selector(&canonical_prefix(function, arity)),
                    arity,
                    mark: self.state.marks.allocate_mark(),
                })
                .collect();
            functions.push((id, entries));
        }

        if !functions.is_empty() {
            // Calldata too short for a selector goes to the fallback
            self.push_u32(SELECTOR_SIZE);
            self.ops([Opcode::CALLDATASIZE, Opcode::LT]);
            self.emit_jumpi(fallback);
            self.ops([Opcode::PUSH0, Opcode::CALLDATALOAD]);
            self.push_u32(224);
            self.op(Opcode::SHR);
            for entry in functions.iter().flat_map(|(_, entries)| entries) {
                self.op(Opcode::DUP1);
                self.push_const(U256::from(u32::from_be_bytes(entry.selector)));
                self.op(Opcode::EQ);
                self.emit_jumpi(entry.mark);
            }
            self.op(Opcode::POP);
        }

        self.emit_mark(fallback);
        match contract.fallback {
            Some(id) => self.external_function(id, &[])?,
            None => self.ops([Opcode::PUSH0, Opcode::PUSH0, Opcode::REVERT]),
        }
        for (id, entries) in &functions {
            self.external_function(*id, entries)?;
        }
        tracing::debug!(
            functions = functions.len(),
            fallback = contract.fallback.is_some(),
            "generated dispatcher"
        );
        Ok(())
    }

    /// Entry points of one external function, each with the selector still on the stack, then
    /// its body.
    fn external_function(&mut self, id: FunctionId, entries: &[EntryPoint]) -> Result<()> {
        let contract = self.contract;
        let function = &contract.functions[id];
        self.begin_frame(&function.name, &function.locals)?;
        self.state.function = Some(id);
        let body = self.state.marks.allocate_mark();

        if entries.is_empty() {
            // Fallback
            self.require_no_value(function.mutability);
        }
        for entry in entries {
            self.emit_mark(entry.mark);
            self.op(Opcode::POP);
            self.require_no_value(function.mutability);

            let types: Vec<_> = function.param_types().take(entry.arity).cloned().collect();
            if !types.is_empty() {
                self.push_u32(SELECTOR_SIZE + tuple_encoded_min(&types));
                self.ops([Opcode::CALLDATASIZE, Opcode::LT]);
                self.panic_if();
                self.scoped(|t| {
                    t.push_u32(SELECTOR_SIZE);
                    t.push_u32(t.state.frame.local(function.params[0]));
                    t.abi_decode(&tuple_type(types), AbiSource::Calldata)
                })?;
            }
            self.default_params(function, entry.arity)?;
            self.emit_jump(body);
        }

        self.emit_mark(body);
        self.statements(&function.body)?;
        self.op(Opcode::STOP);
        self.end_frame();
        Ok(())
    }

    /// Evaluates the defaults of the parameters from `given` on.
    fn default_params(&mut self, function: &Function, given: usize) -> Result<()> {
        let required = function.required_params();
        for (index, &param) in function.params.iter().enumerate().skip(given) {
            let default = &function.defaults[index - required];
            self.scoped(|t| {
                t.expr(default)?;
                t.push_u32(t.state.frame.local(param));
                t.store(Location::Memory, &default.ty)
            })?;
        }
        Ok(())
    }

    fn require_no_value(&mut self, mutability: Mutability) {
        if mutability != Mutability::Payable {
            self.op(Opcode::CALLVALUE);
            self.panic_if();
        }
    }

    /// Constructor, then deployment of the runtime code with the immutables appended.
    pub(super) fn generate_init_code(&mut self) -> Result<()> {
        let contract = self.contract;
        if let Some(id) = contract.constructor {
            let function = &contract.functions[id];
            self.begin_frame(&function.name, &function.locals)?;
            self.state.function = Some(id);
            self.require_no_value(function.mutability);

            let types: Vec<_> = function.param_types().cloned().collect();
            if !types.is_empty() {
                // Arguments are appended to the init code
                let args = self.state.code_end_mark;
                self.push_u32(tuple_encoded_min(&types));
                self.push_mark(args);
                self.ops([Opcode::CODESIZE, Opcode::SUB, Opcode::LT]);
                self.panic_if();
                self.scoped(|t| {
                    t.push_mark(args);
                    t.push_u32(t.state.frame.local(function.params[0]));
                    t.abi_decode(&tuple_type(types), AbiSource::Code)
                })?;
            }
            self.statements(&function.body)?;
            self.end_frame();
        }

        let (deploy, start, end) =
            (self.state.deploy_mark, self.state.runtime_start_mark, self.state.code_end_mark);
        let immutables = contract.immutables_size();
        self.emit_mark(deploy);
        // codecopy(dynamic, runtime start, runtime size)
        self.push_delta(end, start);
        self.push_mark(start);
        self.push_dynamic_start();
        self.op(Opcode::CODECOPY);
        if immutables > 0 {
            self.push_u32(immutables);
            self.push_u32(EVM_SCRATCH_SPACE_END);
            self.push_dynamic_start();
            self.push_delta(end, start);
            self.ops([Opcode::ADD, Opcode::MCOPY]);
        }
        self.push_u32(immutables);
        self.push_delta(end, start);
        self.op(Opcode::ADD);
        self.push_dynamic_start();
        self.op(Opcode::RETURN);
        tracing::debug!(
            immutables,
            constructor = contract.constructor.is_some(),
            "generated init code"
        );
        Ok(())
    }

    /// Body of an internal function. Entered with [return address, args...] on the stack.
    pub(super) fn translate_internal_function(&mut self, id: FunctionId) -> Result<()> {
        let contract = self.contract;
        let function = &contract.functions[id];
        let (mark, _) = self.state.marks.function_mark(id);
        self.begin_frame(&function.name, &function.locals)?;
        self.state.function = Some(id);

        self.emit_mark(mark);
        for &param in function.params.iter().rev() {
            let ty = &function.locals[param].ty;
            self.push_u32(self.state.frame.local(param));
            self.store(Location::Memory, ty)?;
        }
        self.statements(&function.body)?;
        if function.returns.is_some() {
            // Every path ends in `return` or `raise`
            let panic = self.state.panic_mark;
            self.emit_jump(panic);
        } else {
            self.op(Opcode::JUMP);
        }
        self.end_frame();
        tracing::trace!(function = %function.name, "translated internal function");
        Ok(())
    }
}

/// Canonical signature of `function` called with its first `arity` parameters.
fn canonical_prefix(function: &Function, arity: usize) -> String {
    let params: Vec<String> = function.param_types().take(arity).map(|ty| ty.abi_name()).collect();
    format!("{}({})", function.name, params.join(","))
}
