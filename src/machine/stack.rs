//! Bounded data stack.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Word;

/// Default maximum depth of the data stack.
pub const STACK_SIZE: usize = 64;

/// A bounded LIFO of words. The last element is the top.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    items: Vec<Word>,
    max_size: usize,
}

impl Stack {
    /// Create an empty stack holding at most `max_size` words.
    pub fn new(max_size: usize) -> Self {
        Self {
            items: Vec::with_capacity(max_size),
            max_size,
        }
    }

    /// Push a value.
    ///
    /// The depth check comes first, so pushing `None` onto a full stack is
    /// still an overflow; otherwise `None` is a no-op.
    pub fn push(&mut self, value: Option<Word>) -> Result<(), StackError> {
        if self.items.len() >= self.max_size {
            return Err(StackError::Overflow(self.max_size));
        }
        if let Some(value) = value {
            self.items.push(value);
        }
        Ok(())
    }

    /// Pop the top value, or `None` when empty.
    pub fn pop(&mut self) -> Option<Word> {
        self.items.pop()
    }

    /// Top value without removing it.
    pub fn peek(&self) -> Option<Word> {
        self.items.last().copied()
    }

    /// Current depth.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Is the stack empty?
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Depth at which `push` overflows.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Contents from bottom to top.
    pub fn as_slice(&self) -> &[Word] {
        &self.items
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new(STACK_SIZE)
    }
}

/// Errors raised by the data stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StackError {
    #[error("stack overflow (max depth {0})")]
    Overflow(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_push_pop_order() {
        let mut stack = Stack::default();
        stack.push(Some(1)).unwrap();
        stack.push(Some(2)).unwrap();
        assert_eq!(stack.peek(), Some(2));
        assert_eq!(stack.pop(), Some(2));
        assert_eq!(stack.pop(), Some(1));
    }

    #[test]
    fn test_fill_then_overflow() {
        let mut stack = Stack::default();
        for i in 0..STACK_SIZE {
            stack.push(Some(i as Word)).unwrap();
        }
        assert_eq!(stack.len(), STACK_SIZE);
        assert_eq!(stack.push(Some(0)), Err(StackError::Overflow(STACK_SIZE)));
        assert_eq!(stack.len(), STACK_SIZE);
    }

    #[test]
    fn test_push_none_is_noop() {
        let mut stack = Stack::new(2);
        stack.push(None).unwrap();
        assert!(stack.is_empty());
    }

    #[test]
    fn test_push_none_on_full_stack_overflows() {
        let mut stack = Stack::new(1);
        stack.push(Some(7)).unwrap();
        assert!(stack.push(None).is_err());
    }

    #[test]
    fn test_pop_empty() {
        let mut stack = Stack::default();
        assert_eq!(stack.pop(), None);
        assert_eq!(stack.pop(), None);
    }

    proptest! {
        #[test]
        fn prop_depth_never_exceeds_bound(max in 1usize..16, pushes in 0usize..40) {
            let mut stack = Stack::new(max);
            for i in 0..pushes {
                let result = stack.push(Some(i as Word));
                prop_assert_eq!(result.is_ok(), i < max);
            }
            prop_assert!(stack.len() <= max);
        }
    }
}
