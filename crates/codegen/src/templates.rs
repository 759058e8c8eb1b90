//! Init code templates used by the creation builtins.
//!
//! Both templates are a fixed prefix and suffix around a slot filled in at runtime:
//!
//! ```text
//! minimal proxy: 602d3d8160093d39f3 363d3d373d3d3d363d73 <target:20> 5af43d82803e903d91602b57fd5bf3
//! runtime copy:  62 <len:3> 3d81600b3d39f3 <runtime code>
//! ```

use alloy_primitives::{Address, U256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitCodeTemplate {
    pub prefix: &'static [u8],
    /// Length of the slot between prefix and suffix.
    pub slot_len: usize,
    pub suffix: &'static [u8],
}

/// EIP-1167 forwarder. The loader returns the 45 byte runtime that starts at byte 9.
pub const MINIMAL_PROXY: InitCodeTemplate = InitCodeTemplate {
    prefix: &[
        0x60, 0x2d, 0x3d, 0x81, 0x60, 0x09, 0x3d, 0x39, 0xf3, // loader
        0x36, 0x3d, 0x3d, 0x37, 0x3d, 0x3d, 0x3d, 0x36, 0x3d, 0x73,
    ],
    slot_len: 20,
    suffix: &[
        0x5a, 0xf4, 0x3d, 0x82, 0x80, 0x3e, 0x90, 0x3d, 0x91, 0x60, 0x2b, 0x57, 0xfd, 0x5b, 0xf3,
    ],
};

/// Returns the code that follows it. The slot holds the big endian length of that code.
pub const RUNTIME_COPY: InitCodeTemplate = InitCodeTemplate {
    prefix: &[0x62],
    slot_len: 3,
    suffix: &[0x3d, 0x81, 0x60, 0x0b, 0x3d, 0x39, 0xf3],
};

impl InitCodeTemplate {
    pub const fn len(&self) -> usize {
        self.prefix.len() + self.slot_len + self.suffix.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The template with `slot` spliced in, or `None` if `slot` has the wrong length.
    pub fn fill(&self, slot: &[u8]) -> Option<Vec<u8>> {
        if slot.len() != self.slot_len {
            return None;
        }
        let mut code = Vec::with_capacity(self.len());
        code.extend_from_slice(self.prefix);
        code.extend_from_slice(slot);
        code.extend_from_slice(self.suffix);
        Some(code)
    }

    pub(crate) fn prefix_value(&self) -> U256 {
        U256::from_be_slice(self.prefix)
    }

    pub(crate) fn suffix_value(&self) -> U256 {
        U256::from_be_slice(self.suffix)
    }
}

/// Init code deploying an EIP-1167 proxy to `target`.
pub fn minimal_proxy_initcode(target: Address) -> Vec<u8> {
    let mut code = Vec::with_capacity(MINIMAL_PROXY.len());
    code.extend_from_slice(MINIMAL_PROXY.prefix);
    code.extend_from_slice(target.as_slice());
    code.extend_from_slice(MINIMAL_PROXY.suffix);
    code
}

/// Init code deploying `runtime` verbatim. `None` if `runtime` does not fit the length slot.
pub fn runtime_copy_initcode(runtime: &[u8]) -> Option<Vec<u8>> {
    let len = u32::try_from(runtime.len()).ok().filter(|len| *len < 1 << 24)?;
    let mut code = RUNTIME_COPY.fill(&len.to_be_bytes()[1..])?;
    code.extend_from_slice(runtime);
    Some(code)
}
