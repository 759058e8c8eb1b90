pub mod builders;

pub use builders::{
    Deployed, analyze, assert_opcode_counts, compile, count_opcode, revert_reason, runtime_asm,
};
