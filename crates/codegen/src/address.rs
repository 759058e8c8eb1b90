//! Addresses of contracts deployed with CREATE and CREATE2.
//!
//! ```text
//! CREATE:  keccak256(rlp([deployer, nonce]))[12..]
//! CREATE2: keccak256(0xff ++ deployer ++ salt ++ keccak256(init_code))[12..]
//! ```

use alloy_primitives::{Address, B256, keccak256};

/// RLP encoding of the `[deployer, nonce]` list hashed by CREATE.
fn rlp_deployer_nonce(deployer: Address, nonce: u64) -> Vec<u8> {
    let nonce_bytes = nonce.to_be_bytes();
    let significant = &nonce_bytes[nonce.leading_zeros() as usize / 8..];

    let mut payload = Vec::with_capacity(30);
    payload.push(0x80 + 20);
    payload.extend_from_slice(deployer.as_slice());
    match significant {
        [] => payload.push(0x80),
        [byte] if *byte < 0x80 => payload.push(*byte),
        bytes => {
            payload.push(0x80 + bytes.len() as u8);
            payload.extend_from_slice(bytes);
        }
    }

    // The payload is at most 30 bytes, always a short list.
    let mut out = Vec::with_capacity(payload.len() + 1);
    out.push(0xc0 + payload.len() as u8);
    out.extend_from_slice(&payload);
    out
}

/// Address of the contract `deployer` creates with CREATE when its nonce is `nonce`.
pub fn create_address(deployer: Address, nonce: u64) -> Address {
    let hash = keccak256(rlp_deployer_nonce(deployer, nonce));
    Address::from_slice(&hash[12..])
}

/// Address of the contract `deployer` creates with CREATE2 from init code hashing to
/// `init_code_hash`.
pub fn create2_address_from_hash(deployer: Address, salt: B256, init_code_hash: B256) -> Address {
    let mut preimage = [0u8; 85];
    preimage[0] = 0xff;
    preimage[1..21].copy_from_slice(deployer.as_slice());
    preimage[21..53].copy_from_slice(salt.as_slice());
    preimage[53..].copy_from_slice(init_code_hash.as_slice());
    Address::from_slice(&keccak256(preimage)[12..])
}

/// Address of the contract `deployer` creates with CREATE2 from `init_code`.
pub fn create2_address(deployer: Address, salt: B256, init_code: &[u8]) -> Address {
    create2_address_from_hash(deployer, salt, keccak256(init_code))
}
