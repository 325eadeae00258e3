//! A single always-present value with the same undo discipline as
//! [`crate::Table`].
//!
//! Global properties, the feed history and the reserve ratio live in
//! singletons; every frame journals at most one pre-image (first touch).

use crate::error::StoreError;

pub struct Singleton<T: Clone> {
    value: T,
    /// One entry per open frame: the pre-image if this frame touched the
    /// value, `None` otherwise.
    undo_stack: Vec<Option<T>>,
}

impl<T: Clone> Singleton<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            undo_stack: Vec::new(),
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn modify<F: FnOnce(&mut T)>(&mut self, mutate: F) {
        if let Some(slot) = self.undo_stack.last_mut() {
            if slot.is_none() {
                *slot = Some(self.value.clone());
            }
        }
        mutate(&mut self.value);
    }

    pub fn begin(&mut self) {
        self.undo_stack.push(None);
    }

    pub fn undo(&mut self) -> Result<(), StoreError> {
        let slot = self.undo_stack.pop().ok_or(StoreError::NoUndoFrame)?;
        if let Some(pre) = slot {
            self.value = pre;
        }
        Ok(())
    }

    pub fn squash(&mut self) -> Result<(), StoreError> {
        if self.undo_stack.len() < 2 {
            return Err(StoreError::NothingToSquash(self.undo_stack.len()));
        }
        let top = self.undo_stack.pop().ok_or(StoreError::NoUndoFrame)?;
        let below = self.undo_stack.last_mut().ok_or(StoreError::NoUndoFrame)?;
        if below.is_none() {
            *below = top;
        }
        Ok(())
    }

    pub fn commit_oldest(&mut self) -> Result<(), StoreError> {
        if self.undo_stack.is_empty() {
            return Err(StoreError::NoUndoFrame);
        }
        self.undo_stack.remove(0);
        Ok(())
    }
}
