//! Translator from the typed contract to EVM assembly
//!
//! One [`Translator`] produces one code object: the runtime code, or the init code that runs
//! the constructor and returns the runtime code with the immutables appended.
//!
//! Word typed values live on the stack while an expression is evaluated, every other value is
//! a pointer to its memory representation. Locals, parameters and temporaries live in the
//! function's memory frame (see [`frame`]). Every statement leaves the stack as it found it.

mod abi;
mod arithmetic;
mod calls;
mod creation;
mod entry;
mod expr;
mod frame;
mod helpers;
mod marks;
mod place;
mod statements;

pub(crate) use helpers::push_opcode;

/// Common constants used throughout the translator
mod constants {
    /// Initial capacity estimate multiplier for assembly instructions
    pub const ASM_INSTRUCTIONS_PER_STATEMENT: usize = 24;

    /// Additional assembly instructions for dispatch and shared blocks
    pub const ASM_INITIALIZATION_OVERHEAD: usize = 100;

    /// EVM word size in bytes
    pub const WORD: u32 = 32;

    /// EVM scratch space end address
    /// Memory from 0x00 to 0x7F is reserved for hashing
    pub const EVM_SCRATCH_SPACE_END: u32 = 0x80;

    /// Selector of `Error(string)` revert data
    pub const ERROR_SELECTOR: u32 = 0x08c3_79a0;

    /// Calldata offset of the first argument
    pub const SELECTOR_SIZE: u32 = 4;
}

use crate::error::Result;
use evm_glue::assembly::Asm;
use frame::Frame;
use marks::{MarkAllocator, MarkId};
use vyc_data::{Contract, FunctionId, IndexSlice, IndexVec, LocalId, hir::Local};

/// Which code object a translator produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeObject {
    Init,
    Runtime,
}

/// Jump targets of the innermost enclosing loop
#[derive(Debug, Clone, Copy)]
pub(crate) struct LoopMarks {
    pub(crate) continue_mark: MarkId,
    pub(crate) break_mark: MarkId,
}

/// Mutable translation state
pub(crate) struct TranslationState {
    pub(crate) asm: Vec<Asm>,
    pub(crate) marks: MarkAllocator,
    pub(crate) frame: Frame,
    /// End of the frames of every function translated so far
    pub(crate) frames_end: u32,
    pub(crate) function: Option<FunctionId>,
    pub(crate) loops: Vec<LoopMarks>,
    /// Internal functions referenced but not translated yet
    pub(crate) pending: Vec<FunctionId>,
    pub(crate) panic_mark: MarkId,
    pub(crate) bubble_revert_mark: MarkId,
    /// Constructor `return` target (init code only)
    pub(crate) deploy_mark: MarkId,
    pub(crate) runtime_start_mark: MarkId,
    /// End of this code object. The runtime code finds its immutables here, the init code its
    /// constructor arguments.
    pub(crate) code_end_mark: MarkId,
    /// Indices into `asm` of pushes patched with the start of the transient memory region
    pub(crate) dynamic_refs: Vec<usize>,
}

/// Main translator from a contract to EVM assembly
pub struct Translator<'a> {
    pub(crate) contract: &'a Contract,
    pub(crate) object: CodeObject,
    /// Assembled runtime code embedded in the init code
    pub(crate) runtime_code: Vec<u8>,
    pub(crate) state: TranslationState,
}

impl<'a> Translator<'a> {
    /// Translator for the runtime code of `contract`
    pub fn runtime(contract: &'a Contract) -> Result<Self> {
        Self::new(contract, CodeObject::Runtime, Vec::new())
    }

    /// Translator for the init code of `contract`, deploying `runtime_code`
    pub fn init(contract: &'a Contract, runtime_code: Vec<u8>) -> Result<Self> {
        Self::new(contract, CodeObject::Init, runtime_code)
    }

    fn new(contract: &'a Contract, object: CodeObject, runtime_code: Vec<u8>) -> Result<Self> {
        let mut marks = MarkAllocator::new();
        let panic_mark = marks.allocate_mark();
        let bubble_revert_mark = marks.allocate_mark();
        let deploy_mark = marks.allocate_mark();
        let runtime_start_mark = marks.allocate_mark();
        let code_end_mark = marks.allocate_mark();

        // The constructor builds the immutables right after the scratch space.
        let frames_start = match object {
            CodeObject::Init => constants::EVM_SCRATCH_SPACE_END + contract.immutables_size(),
            CodeObject::Runtime => constants::EVM_SCRATCH_SPACE_END,
        };
        let statements: usize = contract.functions.iter().map(|f| f.body.len()).sum();
        let estimated_asm_size = statements * constants::ASM_INSTRUCTIONS_PER_STATEMENT
            + constants::ASM_INITIALIZATION_OVERHEAD;

        let state = TranslationState {
            asm: Vec::with_capacity(estimated_asm_size),
            marks,
            frame: Frame::new("<entry>", frames_start, &IndexVec::<LocalId, Local>::new())?,
            frames_end: frames_start,
            function: None,
            loops: Vec::new(),
            pending: Vec::new(),
            panic_mark,
            bubble_revert_mark,
            deploy_mark,
            runtime_start_mark,
            code_end_mark,
            dynamic_refs: Vec::new(),
        };
        Ok(Self { contract, object, runtime_code, state })
    }

    /// Translate the contract into this translator's code object
    pub fn translate(&mut self) -> Result<()> {
        match self.object {
            CodeObject::Runtime => self.generate_runtime_code()?,
            CodeObject::Init => self.generate_init_code()?,
        }
        while let Some(function) = self.state.pending.pop() {
            self.translate_internal_function(function)?;
        }
        self.emit_shared_blocks();

        if self.object == CodeObject::Init {
            let runtime = std::mem::take(&mut self.runtime_code);
            self.state.asm.push(Asm::Mark(self.state.runtime_start_mark));
            self.state.asm.push(Asm::Data(runtime));
        }
        self.state.asm.push(Asm::Mark(self.state.code_end_mark));
        self.patch_dynamic_refs();

        tracing::trace!(
            object = ?self.object,
            instructions = self.state.asm.len(),
            memory = self.state.frames_end,
            "translated code object"
        );
        Ok(())
    }

    /// Starts the frame of a function whose locals are `locals`.
    pub(crate) fn begin_frame(
        &mut self,
        name: &str,
        locals: &IndexSlice<LocalId, [Local]>,
    ) -> Result<()> {
        self.state.frame = Frame::new(name, self.state.frames_end, locals)?;
        Ok(())
    }

    pub(crate) fn end_frame(&mut self) {
        self.state.frames_end = self.state.frames_end.max(self.state.frame.end());
    }

    fn emit_shared_blocks(&mut self) {
        use evm_glue::opcodes::Opcode;

        self.emit_mark(self.state.panic_mark);
        self.ops([Opcode::PUSH0, Opcode::PUSH0, Opcode::REVERT]);

        // Forwards the revert data of the last call or creation
        self.emit_mark(self.state.bubble_revert_mark);
        self.ops([
            Opcode::RETURNDATASIZE,
            Opcode::PUSH0,
            Opcode::PUSH0,
            Opcode::RETURNDATACOPY,
            Opcode::RETURNDATASIZE,
            Opcode::PUSH0,
            Opcode::REVERT,
        ]);
    }

    fn patch_dynamic_refs(&mut self) {
        let start = alloy_primitives::U256::from(self.state.frames_end);
        for &index in &self.state.dynamic_refs {
            self.state.asm[index] = Asm::Op(push_opcode(start));
        }
    }

    /// Get the generated assembly
    pub fn into_asm(self) -> Vec<Asm> {
        self.state.asm
    }
}
