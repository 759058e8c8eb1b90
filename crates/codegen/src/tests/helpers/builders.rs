use crate::{Bytecode, Translator, generate};
use alloy_primitives::{Address, Bytes, U256};
use evm_glue::assembly::Asm;
use test_utils::{Chain, Failure, word};
use vyc_data::{
    AbiValue, Contract, Type,
    abi::{decode_params, encode_call, encode_params},
};
use vyc_syntax::parse_module;

/// Parses and checks `source`, panicking with the rendered diagnostic if it is rejected.
pub fn analyze(source: &str) -> Contract {
    let module = parse_module(source).unwrap_or_else(|err| panic!("{}", err.render(source)));
    vyc_sema::analyze(&module).unwrap_or_else(|err| panic!("{}", err.render(source)))
}

pub fn compile(source: &str) -> Bytecode {
    generate(&analyze(source)).unwrap_or_else(|err| panic!("code generation failed: {err}"))
}

pub fn runtime_asm(source: &str) -> Vec<Asm> {
    let contract = analyze(source);
    let mut translator = Translator::runtime(&contract).expect("translator");
    translator.translate().expect("runtime code translates");
    translator.into_asm()
}

pub fn count_opcode(asm: &[Asm], opcode: &str) -> usize {
    asm.iter()
        .filter(|&op| match op {
            Asm::Op(op_enum) => format!("{op_enum:?}") == opcode,
            _ => false,
        })
        .count()
}

pub fn assert_opcode_counts(asm: &[Asm], expected: &[(&str, usize)]) {
    for &(opcode, expected_count) in expected {
        let actual_count = count_opcode(asm, opcode);
        assert_eq!(
            actual_count, expected_count,
            "Expected {expected_count} {opcode} opcodes but found {actual_count}"
        );
    }
}

/// The message of `Error(string)` revert data.
pub fn revert_reason(failure: &Failure) -> Option<String> {
    let data = failure.revert_data()?;
    let payload = data.strip_prefix(&[0x08, 0xc3, 0x79, 0xa0])?;
    match decode_params(&[Type::String(u32::MAX)], payload)?.pop()? {
        AbiValue::String(reason) => Some(reason),
        _ => None,
    }
}

/// A compiled contract deployed on its own chain.
pub struct Deployed {
    pub chain: Chain,
    pub address: Address,
    pub bytecode: Bytecode,
}

impl Deployed {
    pub fn new(source: &str) -> Self {
        Self::with_args(source, &[])
    }

    pub fn with_args(source: &str, args: &[AbiValue]) -> Self {
        Self::try_with_args(source, args).unwrap_or_else(|err| panic!("deployment failed: {err:?}"))
    }

    pub fn try_with_args(source: &str, args: &[AbiValue]) -> Result<Self, Failure> {
        let bytecode = compile(source);
        let mut chain = Chain::new();
        let mut init = bytecode.init.clone();
        init.extend_from_slice(&encode_params(args));
        let address = chain.deploy(init)?;
        Ok(Self { chain, address, bytecode })
    }

    /// Deploys another contract on the same chain.
    pub fn deploy(&mut self, source: &str, args: &[AbiValue]) -> Address {
        let mut init = compile(source).init;
        init.extend_from_slice(&encode_params(args));
        self.chain.deploy(init).unwrap_or_else(|err| panic!("deployment failed: {err:?}"))
    }

    pub fn call(&mut self, signature: &str, args: &[AbiValue]) -> Result<Bytes, Failure> {
        self.chain.call(self.address, encode_call(signature, args))
    }

    /// Calls a function returning a single word.
    pub fn word(&mut self, signature: &str, args: &[AbiValue]) -> U256 {
        let output = self
            .call(signature, args)
            .unwrap_or_else(|err| panic!("`{signature}` failed: {err:?}"));
        word(&output).unwrap_or_else(|| panic!("`{signature}` returned {output}"))
    }

    /// Calls a function and decodes its return data as a tuple of `returns`.
    pub fn values(
        &mut self,
        signature: &str,
        args: &[AbiValue],
        returns: &[Type],
    ) -> Vec<AbiValue> {
        let output = self
            .call(signature, args)
            .unwrap_or_else(|err| panic!("`{signature}` failed: {err:?}"));
        decode_params(returns, &output)
            .unwrap_or_else(|| panic!("`{signature}` returned malformed data {output}"))
    }

    pub fn reverts(&mut self, signature: &str, args: &[AbiValue]) -> Failure {
        match self.call(signature, args) {
            Ok(output) => panic!("`{signature}` succeeded with {output}"),
            Err(failure) => failure,
        }
    }
}
