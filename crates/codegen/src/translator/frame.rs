//! Memory frames for locals and temporaries
//!
//! Memory layout of a code object:
//! - 0x00-0x40: hashing scratch space (mapping slots, single word hashes)
//! - 0x40-0x80: unused
//! - init code only: immutables, written by the constructor and appended to the runtime code
//! - one frame per translated function. Internal calls are never recursive so every frame gets
//!   its own addresses and nothing is saved across calls.
//! - after the last frame: transient buffers whose size is only known at runtime (init code
//!   of created contracts, the deployed code)
//!
//! A frame holds the function's locals, then temporaries. Temporaries are released at the end
//! of the statement that allocated them, the frame keeps its high-water mark.

use crate::error::{CodegenError, Result};
use vyc_data::{IndexSlice, IndexVec, LocalId, hir::Local};

pub struct Frame {
    name: String,
    locals: IndexVec<LocalId, u32>,
    top: u32,
    high: u32,
}

impl Frame {
    /// Lays out `locals` starting at `base`.
    pub fn new(name: &str, base: u32, locals: &IndexSlice<LocalId, [Local]>) -> Result<Self> {
        let mut frame =
            Self { name: name.to_owned(), locals: IndexVec::new(), top: base, high: base };
        for local in locals.iter() {
            let address = frame.alloc(local.ty.memory_size())?;
            frame.locals.push(address);
        }
        Ok(frame)
    }

    pub fn local(&self, local: LocalId) -> u32 {
        self.locals[local]
    }

    /// Reserves `size` bytes, rounded up to whole words.
    pub fn alloc(&mut self, size: u32) -> Result<u32> {
        let address = self.top;
        self.top = size
            .checked_next_multiple_of(32)
            .and_then(|size| address.checked_add(size))
            .ok_or_else(|| CodegenError::FrameOverflow {
                function: self.name.clone(),
                limit: u32::MAX,
            })?;
        self.high = self.high.max(self.top);
        Ok(address)
    }

    /// Current top, to be passed back to [`Frame::release`].
    pub fn save(&self) -> u32 {
        self.top
    }

    pub fn release(&mut self, saved: u32) {
        self.top = saved;
    }

    /// First address past everything this frame ever used.
    pub fn end(&self) -> u32 {
        self.high
    }
}
