//! Bounded LIFO of detached client-list segments (section 3, section 4.7).

use crate::client::Client;
use crate::error::{Result, WmError};

/// Fixed-capacity stack of owned client sublists. Pushing onto a full
/// stack is refused rather than evicting the oldest entry - cut/paste
/// overflow is a logged, state-unchanged rejection per section 7.
#[derive(Debug, Clone)]
pub struct DeleteRegister {
    stack: Vec<Vec<Client>>,
    capacity: usize,
}

impl DeleteRegister {
    pub fn new(capacity: usize) -> Self {
        DeleteRegister {
            stack: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.stack.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Push a detached sublist (the head of a detached sub-list, in source
    /// terms). Refused if the stack would overflow.
    pub fn push(&mut self, sublist: Vec<Client>) -> Result<()> {
        if self.is_full() {
            return Err(WmError::DeleteRegisterFull);
        }
        self.stack.push(sublist);
        Ok(())
    }

    /// Pop and return the most recently pushed sublist.
    pub fn pop(&mut self) -> Result<Vec<Client>> {
        self.stack.pop().ok_or(WmError::DeleteRegisterEmpty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;

    fn sub(window: u64) -> Vec<Client> {
        vec![Client::new(window, String::new(), String::new(), 0, 1)]
    }

    #[test]
    fn push_pop_is_lifo() {
        let mut reg = DeleteRegister::new(4);
        reg.push(sub(1)).unwrap();
        reg.push(sub(2)).unwrap();
        let top = reg.pop().unwrap();
        assert_eq!(top[0].window, 2);
        let next = reg.pop().unwrap();
        assert_eq!(next[0].window, 1);
    }

    #[test]
    fn push_refused_when_full() {
        let mut reg = DeleteRegister::new(1);
        reg.push(sub(1)).unwrap();
        assert!(matches!(reg.push(sub(2)), Err(WmError::DeleteRegisterFull)));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn pop_on_empty_is_an_error() {
        let mut reg = DeleteRegister::new(4);
        assert!(matches!(reg.pop(), Err(WmError::DeleteRegisterEmpty)));
    }

    /// Section 8 randomised-simulation invariant: pushing `windows` (up to
    /// capacity) and then popping the same number back always yields them
    /// in reverse order, regardless of how many distinct windows or what
    /// they are.
    #[quickcheck_macros::quickcheck]
    fn push_then_pop_all_is_reverse_order(windows: Vec<u64>) -> bool {
        let windows: Vec<u64> = windows.into_iter().take(16).collect();
        let mut reg = DeleteRegister::new(windows.len().max(1));
        for &w in &windows {
            if reg.push(sub(w)).is_err() {
                return false;
            }
        }
        let mut popped = Vec::with_capacity(windows.len());
        while let Ok(sublist) = reg.pop() {
            popped.push(sublist[0].window);
        }
        popped == windows.into_iter().rev().collect::<Vec<_>>()
    }
}
