//! Fixed-capacity object pool with an index free list.
//!
//! Slots are allocated once at construction. Handles carry the slot
//! generation, so a handle that was already released (or belongs to an older
//! checkout of the same slot) is rejected instead of corrupting the free list.

use crate::error::{ControlError, ControlResult};

/// Containers that can be wiped before going back to the pool.
pub trait Reusable {
    fn reset(&mut self);
}

/// Ticket for a checked-out slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    index: usize,
    generation: u32,
}

#[derive(Debug)]
struct Slot<T> {
    in_use: bool,
    generation: u32,
    payload: T,
}

#[derive(Debug)]
pub struct Pool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
}

impl<T: Reusable + Default> Pool<T> {
    pub fn new(capacity: usize) -> Self {
        Self::with_factory(capacity, T::default)
    }
}

impl<T: Reusable> Pool<T> {
    pub fn with_factory(capacity: usize, mut factory: impl FnMut() -> T) -> Self {
        let slots = (0..capacity)
            .map(|_| Slot {
                in_use: false,
                generation: 0,
                payload: factory(),
            })
            .collect();
        // Reverse so the lowest index is handed out first.
        let free = (0..capacity).rev().collect();
        Self { slots, free }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn in_use(&self) -> usize {
        self.capacity() - self.available()
    }

    pub fn acquire(&mut self) -> ControlResult<PoolHandle> {
        let index = self.free.pop().ok_or(ControlError::PoolExhausted {
            capacity: self.capacity(),
        })?;
        let slot = &mut self.slots[index];
        slot.in_use = true;
        Ok(PoolHandle {
            index,
            generation: slot.generation,
        })
    }

    /// Reset the slot payload and return it to the free list.
    pub fn release(&mut self, handle: PoolHandle) -> ControlResult<()> {
        let slot = self.checked_out_mut(handle)?;
        slot.payload.reset();
        slot.in_use = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        Ok(())
    }

    pub fn get(&self, handle: PoolHandle) -> ControlResult<&T> {
        match self.slots.get(handle.index) {
            Some(slot) if slot.in_use && slot.generation == handle.generation => {
                Ok(&slot.payload)
            }
            _ => Err(ControlError::InvalidHandle),
        }
    }

    pub fn get_mut(&mut self, handle: PoolHandle) -> ControlResult<&mut T> {
        self.checked_out_mut(handle).map(|slot| &mut slot.payload)
    }

    fn checked_out_mut(&mut self, handle: PoolHandle) -> ControlResult<&mut Slot<T>> {
        match self.slots.get_mut(handle.index) {
            Some(slot) if slot.in_use && slot.generation == handle.generation => Ok(slot),
            _ => Err(ControlError::InvalidHandle),
        }
    }
}
