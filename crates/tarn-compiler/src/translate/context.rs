//! Per-method mutable translation state.

use std::collections::BTreeMap;

/// The cursor and branch map scoped to the method currently being
/// translated.
///
/// Exactly these two pieces of state are saved and restored around a
/// speculative nested compilation, so a failed attempt leaves the
/// enclosing method's in-flight translation untouched.
#[derive(Debug, Default)]
pub(crate) struct TranslationContext {
    /// Next method-relative emission address.
    pub addr: u32,
    /// Source instruction address to emitted relative address.
    pub branch_map: BTreeMap<u32, u32>,
}

/// Saved context state for speculative compilation.
pub(crate) struct Snapshot {
    addr: u32,
    branch_map: BTreeMap<u32, u32>,
}

impl TranslationContext {
    pub fn reset(&mut self) {
        self.addr = 0;
        self.branch_map.clear();
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            addr: self.addr,
            branch_map: self.branch_map.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: Snapshot) {
        self.addr = snapshot.addr;
        self.branch_map = snapshot.branch_map;
    }
}
