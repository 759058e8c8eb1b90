//! In-memory chain for running compiled contracts on revm.

use alloy_primitives::{Address, Bytes, U256, address};
use revm::{
    Database, Evm, InMemoryDB,
    primitives::{
        AccountInfo, Bytecode, ExecutionResult, KECCAK_EMPTY, Log, Output, SpecId, TransactTo,
        keccak256,
    },
};

pub const DEFAULT_CALLER: Address = address!("9000000000000000000000000000000000000000");
pub const DEFAULT_GAS_LIMIT: u64 = 30_000_000;
const CALLER_BALANCE: u128 = 1_000_000_000_000_000_000_000;

/// Why a transaction did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    Revert(Bytes),
    Halt(String),
    /// The transaction succeeded but did not produce the expected output kind
    Unexpected(String),
}

impl Failure {
    /// Revert data, if the transaction reverted.
    pub fn revert_data(&self) -> Option<&Bytes> {
        match self {
            Failure::Revert(data) => Some(data),
            _ => None,
        }
    }
}

/// A funded caller and an EVM with state that persists across transactions.
pub struct Chain {
    evm: Evm<'static, (), InMemoryDB>,
    pub caller: Address,
    logs: Vec<Log>,
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Chain {
    pub fn new() -> Self {
        let mut db = InMemoryDB::default();
        db.insert_account_info(
            DEFAULT_CALLER,
            AccountInfo {
                balance: U256::from(CALLER_BALANCE),
                nonce: 0,
                code_hash: KECCAK_EMPTY,
                code: None,
            },
        );
        let evm = Evm::builder()
            .with_db(db)
            .with_spec_id(SpecId::CANCUN)
            .modify_tx_env(|tx| {
                tx.caller = DEFAULT_CALLER;
                tx.gas_limit = DEFAULT_GAS_LIMIT;
                tx.gas_price = U256::ZERO;
            })
            .build();
        Self { evm, caller: DEFAULT_CALLER, logs: Vec::new() }
    }

    fn transact(
        &mut self,
        to: TransactTo,
        data: Vec<u8>,
        value: U256,
    ) -> Result<Output, Failure> {
        let tx = self.evm.tx_mut();
        tx.caller = self.caller;
        tx.transact_to = to;
        tx.data = data.into();
        tx.value = value;
        tx.nonce = None;
        self.logs.clear();

        let result = self
            .evm
            .transact_commit()
            .map_err(|e| Failure::Halt(format!("Execution error: {e:?}")))?;
        match result {
            ExecutionResult::Success { output, logs, .. } => {
                self.logs = logs;
                Ok(output)
            }
            ExecutionResult::Revert { output, .. } => Err(Failure::Revert(output)),
            ExecutionResult::Halt { reason, .. } => Err(Failure::Halt(format!("{reason:?}"))),
        }
    }

    /// Runs `init_code` in a creation transaction and returns the new contract's address.
    pub fn deploy(&mut self, init_code: Vec<u8>) -> Result<Address, Failure> {
        self.deploy_with_value(init_code, U256::ZERO)
    }

    pub fn deploy_with_value(
        &mut self,
        init_code: Vec<u8>,
        value: U256,
    ) -> Result<Address, Failure> {
        match self.transact(TransactTo::Create, init_code, value)? {
            Output::Create(_, Some(address)) => Ok(address),
            other => Err(Failure::Unexpected(format!("no address created: {other:?}"))),
        }
    }

    /// Calls `to` and returns its return data.
    pub fn call(&mut self, to: Address, calldata: Vec<u8>) -> Result<Bytes, Failure> {
        self.call_with_value(to, calldata, U256::ZERO)
    }

    pub fn call_with_value(
        &mut self,
        to: Address,
        calldata: Vec<u8>,
        value: U256,
    ) -> Result<Bytes, Failure> {
        match self.transact(TransactTo::Call(to), calldata, value)? {
            Output::Call(bytes) => Ok(bytes),
            other => Err(Failure::Unexpected(format!("unexpected output: {other:?}"))),
        }
    }

    /// Installs `code` at `address`, as if it had been deployed there.
    pub fn set_code(&mut self, address: Address, code: Vec<u8>) {
        let info = AccountInfo {
            balance: U256::ZERO,
            nonce: 1,
            code_hash: keccak256(&code),
            code: Some(Bytecode::new_raw(code.into())),
        };
        self.evm.db_mut().insert_account_info(address, info);
    }

    fn account(&mut self, address: Address) -> Option<AccountInfo> {
        self.evm.db_mut().basic(address).ok().flatten()
    }

    /// Deployed code at `address`, empty for accounts without code.
    pub fn code_at(&mut self, address: Address) -> Bytes {
        let Some(info) = self.account(address) else {
            return Bytes::new();
        };
        let code = match info.code {
            Some(code) => code,
            None => match self.evm.db_mut().code_by_hash(info.code_hash) {
                Ok(code) => code,
                Err(_) => return Bytes::new(),
            },
        };
        code.original_bytes()
    }

    /// Logs emitted by the last transaction, if it succeeded.
    pub fn logs(&self) -> &[Log] {
        &self.logs
    }

    pub fn nonce(&mut self, address: Address) -> u64 {
        self.account(address).map_or(0, |info| info.nonce)
    }

    pub fn balance(&mut self, address: Address) -> U256 {
        self.account(address).map_or(U256::ZERO, |info| info.balance)
    }
}

/// The first 32 bytes of `output` as a word.
pub fn word(output: &[u8]) -> Option<U256> {
    let bytes: [u8; 32] = output.get(..32)?.try_into().ok()?;
    Some(U256::from_be_bytes(bytes))
}
