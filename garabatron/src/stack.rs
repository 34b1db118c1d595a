use crate::{NodeRef, RootProvider, VMError};

/// The operand stack. Everything on it is a GC root.
#[derive(Debug, Clone)]
pub struct OperandStack {
    stack: Vec<NodeRef>,
    capacity: usize,
}

#[derive(Debug, Clone)]
pub struct OperandStackInfo {
    pub stack_size: usize,
}

impl Default for OperandStackInfo {
    fn default() -> Self {
        Self { stack_size: 256 }
    }
}

impl OperandStack {
    #[must_use]
    pub fn new(info: &OperandStackInfo) -> Self {
        Self {
            stack: Vec::with_capacity(info.stack_size),
            capacity: info.stack_size,
        }
    }

    /// Returns the active portion of the stack, bottom first
    #[must_use]
    pub fn as_slice(&self) -> &[NodeRef] {
        &self.stack
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.stack.len() == self.capacity
    }

    /// Fails if `n` more values would not fit
    pub fn ensure_space(&self, n: usize) -> Result<(), VMError> {
        if self.stack.len() + n > self.capacity {
            return Err(VMError::StackOverflow {
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Fails unless at least `n` values are present
    pub fn ensure_depth(&self, n: usize) -> Result<(), VMError> {
        if self.stack.len() < n {
            return Err(VMError::StackUnderflow {
                required: n,
                depth: self.stack.len(),
            });
        }
        Ok(())
    }

    pub fn try_push(&mut self, value: NodeRef) -> Result<(), VMError> {
        self.ensure_space(1)?;
        self.stack.push(value);
        Ok(())
    }

    pub fn try_pop(&mut self) -> Result<NodeRef, VMError> {
        self.stack.pop().ok_or(VMError::StackUnderflow {
            required: 1,
            depth: 0,
        })
    }

    /// Gets the nth value from the top of the stack (0-indexed)
    #[must_use]
    pub fn peek_nth(&self, n: usize) -> Option<NodeRef> {
        let depth = self.stack.len();
        if n >= depth {
            return None;
        }
        self.stack.get(depth - 1 - n).copied()
    }

    /// Drops every root without touching the heap
    pub fn clear(&mut self) {
        self.stack.clear();
    }
}

impl RootProvider for OperandStack {
    fn visit_roots(&self, visitor: &mut dyn FnMut(NodeRef)) {
        self.stack.as_slice().visit_roots(visitor);
    }
}
