//! Branch labels.
//!
//! A label is defined first and marked later (forward branches) or marked
//! first and branched to later (backward branches). Branches to a label that
//! is not marked yet are recorded and patched when it is.

/// Handle to a branch target within one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(pub(crate) u32);

#[derive(Debug, Default)]
pub struct LabelTable {
    /// Marked offset per label.
    targets: Vec<Option<usize>>,
    /// Operand offsets waiting for their label to be marked.
    pending: Vec<(Label, usize)>,
}

impl LabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self) -> Label {
        self.targets.push(None);
        Label(self.targets.len() as u32 - 1)
    }

    pub fn target(&self, label: Label) -> Option<usize> {
        self.targets.get(label.0 as usize).copied().flatten()
    }

    /// Mark `label` at `offset`, returning the operands to patch.
    ///
    /// Returns `None` if the label was already marked or never defined.
    pub fn mark(&mut self, label: Label, offset: usize) -> Option<Vec<usize>> {
        let slot = self.targets.get_mut(label.0 as usize)?;
        if slot.is_some() {
            return None;
        }
        *slot = Some(offset);
        let (ready, waiting): (Vec<_>, Vec<_>) = self.pending.drain(..).partition(|(l, _)| *l == label);
        self.pending = waiting;
        Some(ready.into_iter().map(|(_, operand)| operand).collect())
    }

    /// Record a branch operand to patch once `label` is marked.
    pub fn add_pending(&mut self, label: Label, operand: usize) {
        self.pending.push((label, operand));
    }

    /// Whether every branch found its target.
    pub fn is_resolved(&self) -> bool {
        self.pending.is_empty()
    }
}
