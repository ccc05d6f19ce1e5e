//! Operand stack of the VM.

use lantern_core::{RuntimeError, Value};

use super::Result;

#[derive(Debug, Default)]
pub struct ValueStack {
    values: Vec<Value>,
}

impl ValueStack {
    pub fn new() -> Self {
        Self {
            values: Vec::with_capacity(256),
        }
    }

    #[inline]
    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    #[inline]
    pub fn pop(&mut self) -> Result<Value> {
        self.values.pop().ok_or(RuntimeError::StackUnderflow)
    }

    /// Value `distance` slots below the top (0 is the top).
    #[inline]
    pub fn peek(&self, distance: usize) -> Result<&Value> {
        self.values
            .len()
            .checked_sub(distance + 1)
            .and_then(|index| self.values.get(index))
            .ok_or(RuntimeError::StackUnderflow)
    }

    /// Pop `n` values, oldest first.
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<Value>> {
        let start = self.values.len().checked_sub(n).ok_or(RuntimeError::StackUnderflow)?;
        Ok(self.values.drain(start..).collect())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}
