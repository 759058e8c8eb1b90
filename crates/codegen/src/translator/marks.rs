//! Mark (jump label) management
//!
//! evm-glue uses Mark for jump destinations and code offsets. Every function body gets one
//! mark, allocated on first reference so calls can be emitted before their target.

use std::collections::HashMap;
use vyc_data::FunctionId;

/// Type alias for mark IDs used in evm-glue assembly
pub type MarkId = usize;

/// Manages allocation of marks (jump labels)
pub struct MarkAllocator {
    function_marks: HashMap<FunctionId, MarkId>,
    next_mark: MarkId,
}

impl MarkAllocator {
    pub fn new() -> Self {
        Self { function_marks: HashMap::new(), next_mark: 0 }
    }

    /// Allocate a new mark ID
    pub fn allocate_mark(&mut self) -> MarkId {
        let mark = self.next_mark;
        self.next_mark += 1;
        mark
    }

    /// Get or allocate the mark of a function's body. The second value is true if the mark
    /// was allocated by this call.
    pub fn function_mark(&mut self, function: FunctionId) -> (MarkId, bool) {
        if let Some(&mark) = self.function_marks.get(&function) {
            (mark, false)
        } else {
            let mark = self.allocate_mark();
            self.function_marks.insert(function, mark);
            (mark, true)
        }
    }
}
