//! Address derivation agrees with the chain

use crate::{
    address::{create_address, create2_address},
    templates::minimal_proxy_initcode,
};
use alloy_primitives::{Address, B256};
use proptest::prelude::*;
use test_utils::Chain;

/// Init code that runs CREATE2 on `initcode` with `salt` and deploys the created address as a
/// 32 byte word.
fn create2_deployer(salt: B256, initcode: &[u8]) -> Vec<u8> {
    let len = u8::try_from(initcode.len()).expect("short init code");
    let mut code = vec![
        0x60, len, // PUSH1 len
        0x80, // DUP1
        0x60, 50, // PUSH1 offset of `initcode`
        0x5f, 0x39, // PUSH0 CODECOPY
        0x7f, // PUSH32 salt
    ];
    code.extend_from_slice(salt.as_slice());
    code.extend_from_slice(&[
        0x90, 0x5f, 0x5f, 0xf5, // SWAP1 PUSH0 PUSH0 CREATE2
        0x5f, 0x52, // PUSH0 MSTORE
        0x60, 0x20, 0x5f, 0xf3, // PUSH1 32 PUSH0 RETURN
    ]);
    assert_eq!(code.len(), 50);
    code.extend_from_slice(initcode);
    code
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn create2_matches_deployment(salt in any::<[u8; 32]>(), target in any::<[u8; 20]>()) {
        let (salt, target) = (B256::from(salt), Address::from(target));
        let initcode = minimal_proxy_initcode(target);

        let mut chain = Chain::new();
        let deployer = chain.deploy(create2_deployer(salt, &initcode)).unwrap();
        let code = chain.code_at(deployer);
        let created = Address::from_slice(&code[12..32]);
        prop_assert_ne!(created, Address::ZERO);
        prop_assert_eq!(created, create2_address(deployer, salt, &initcode));
    }

    #[test]
    fn create_matches_deployment(earlier in 0u64..4) {
        let mut chain = Chain::new();
        for _ in 0..earlier {
            chain.deploy(vec![0x00]).unwrap();
        }
        let caller = chain.caller;
        let nonce = chain.nonce(caller);
        prop_assert_eq!(nonce, earlier);
        let address = chain.deploy(vec![0x00]).unwrap();
        prop_assert_eq!(address, create_address(caller, nonce));
    }
}
