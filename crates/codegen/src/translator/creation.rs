//! Contract creation builtins
//!
//! The init code of the new contract is assembled in the transient region past every frame,
//! then passed to CREATE or CREATE2. All operands are evaluated before the region is written,
//! in a fixed order: target, forwarded arguments, `value`, then `salt`. Keyword order in the
//! source does not change it.

use super::{Translator, constants::WORD};
use crate::{
    error::Result,
    templates::{MINIMAL_PROXY, RUNTIME_COPY},
};
use alloy_primitives::U256;
use evm_glue::opcodes::Opcode;
use vyc_data::{CreationCall, CreationStrategy};

/// Bits of a byte count.
const fn bits(bytes: usize) -> usize {
    bytes * 8
}

impl Translator<'_> {
    /// Pushes the address of the created contract.
    pub(super) fn create(&mut self, call: &CreationCall) -> Result<()> {
        let target = self.temp(WORD)?;
        self.expr(&call.target)?;
        self.mstore_at(target);

        let args = if call.args.is_empty() {
            None
        } else {
            let tuple_slot = self.temp(WORD)?;
            let tuple = self.materialize(&call.args)?;
            self.mstore_at(tuple_slot);
            Some((tuple_slot, tuple))
        };
        let value = call.value.as_ref().map(|value| self.word_temp(value)).transpose()?;
        let salt = call.salt.as_ref().map(|salt| self.word_temp(salt)).transpose()?;

        self.mload_at(target);
        self.op(Opcode::EXTCODESIZE);
        self.panic_unless();

        // Stack: [] → [init code size]
        match call.strategy {
            CreationStrategy::MinimalProxy => self.minimal_proxy(target),
            CreationStrategy::RuntimeCopy => self.runtime_copy(target)?,
            CreationStrategy::FactoryForward => {
                self.factory_forward(target, call.code_offset, args)?
            }
        }

        if let Some(salt) = salt {
            self.mload_at(salt);
            self.op(Opcode::SWAP1);
        }
        self.push_dynamic_start();
        match value {
            Some(value) => self.mload_at(value),
            None => self.op(Opcode::PUSH0),
        }
        self.op(if call.uses_create2() { Opcode::CREATE2 } else { Opcode::CREATE });

        if call.revert_on_failure {
            self.ops([Opcode::DUP1, Opcode::ISZERO]);
            let bubble = self.state.bubble_revert_mark;
            self.emit_jumpi(bubble);
        }
        tracing::trace!(strategy = ?call.strategy, create2 = call.uses_create2(), "creation");
        Ok(())
    }

    fn word_temp(&mut self, value: &vyc_data::TypedExpr) -> Result<u32> {
        let slot = self.temp(WORD)?;
        self.expr(value)?;
        self.mstore_at(slot);
        Ok(slot)
    }

    /// EIP-1167 forwarder to the target, written as two words.
    fn minimal_proxy(&mut self, target: u32) {
        let prefix = MINIMAL_PROXY.prefix.len();
        let suffix = MINIMAL_PROXY.suffix.len();
        // Address bytes that fit in the first word after the prefix
        let head = 32 - prefix;
        let rest = MINIMAL_PROXY.slot_len - head;

        self.mload_at(target);
        self.push_u32(bits(rest) as u32);
        self.op(Opcode::SHR);
        self.push_const(MINIMAL_PROXY.prefix_value() << bits(head));
        self.op(Opcode::OR);
        self.push_dynamic_start();
        self.op(Opcode::MSTORE);

        self.mload_at(target);
        self.push_u32(bits(32 - rest) as u32);
        self.op(Opcode::SHL);
        self.push_const(MINIMAL_PROXY.suffix_value() << bits(32 - rest - suffix));
        self.op(Opcode::OR);
        self.push_dynamic_start();
        self.push_u32(WORD);
        self.ops([Opcode::ADD, Opcode::MSTORE]);

        self.push_u32(MINIMAL_PROXY.len() as u32);
    }

    /// The target's runtime code behind a loader that returns it.
    fn runtime_copy(&mut self, target: u32) -> Result<()> {
        let size = self.temp(WORD)?;
        let header = RUNTIME_COPY.len();
        let suffix = RUNTIME_COPY.suffix.len();

        self.mload_at(target);
        self.op(Opcode::EXTCODESIZE);
        // The length slot holds 3 bytes
        self.op(Opcode::DUP1);
        self.push_u32(bits(RUNTIME_COPY.slot_len) as u32);
        self.op(Opcode::SHR);
        self.panic_if();
        self.mstore_at(size);

        let template = (RUNTIME_COPY.prefix_value() << bits(RUNTIME_COPY.slot_len + suffix))
            | RUNTIME_COPY.suffix_value();
        self.mload_at(size);
        self.push_u32(bits(suffix + 32 - header) as u32);
        self.op(Opcode::SHL);
        self.push_const(template << bits(32 - header));
        self.op(Opcode::OR);
        self.push_dynamic_start();
        self.op(Opcode::MSTORE);

        // extcodecopy(target, start + header, 0, size)
        self.mload_at(size);
        self.op(Opcode::PUSH0);
        self.push_dynamic_start();
        self.push_u32(header as u32);
        self.op(Opcode::ADD);
        self.mload_at(target);
        self.op(Opcode::EXTCODECOPY);

        self.mload_at(size);
        self.push_u32(header as u32);
        self.op(Opcode::ADD);
        Ok(())
    }

    /// The target's code from `code_offset` on, followed by the encoded arguments.
    fn factory_forward(
        &mut self,
        target: u32,
        code_offset: u32,
        args: Option<(u32, vyc_data::Type)>,
    ) -> Result<()> {
        let size = self.temp(WORD)?;
        self.mload_at(target);
        self.op(Opcode::EXTCODESIZE);
        // code_offset < codesize
        self.op(Opcode::DUP1);
        self.push_u32(code_offset);
        self.op(Opcode::LT);
        self.panic_unless();
        self.push_u32(code_offset);
        self.ops([Opcode::SWAP1, Opcode::SUB]);
        self.mstore_at(size);

        // extcodecopy(target, start, code_offset, size)
        self.mload_at(size);
        self.push_u32(code_offset);
        self.push_dynamic_start();
        self.mload_at(target);
        self.op(Opcode::EXTCODECOPY);

        self.mload_at(size);
        if let Some((tuple_slot, tuple)) = args {
            self.mload_at(tuple_slot);
            self.push_dynamic_start();
            self.mload_at(size);
            self.op(Opcode::ADD);
            self.abi_encode(&tuple)?;
            self.op(Opcode::ADD);
        }
        Ok(())
    }
}
