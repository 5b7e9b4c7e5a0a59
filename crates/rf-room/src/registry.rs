//! ID-indexed slot registry
//!
//! IDs are slot indices, so lookup is a bounds check plus an `Option`
//! test. A new entry always takes the lowest free ID; removed IDs are
//! handed out again in ascending order.

use crate::error::{RoomError, RoomResult};

#[derive(Debug, Clone)]
pub struct Registry<T> {
    kind: &'static str,
    capacity: usize,
    slots: Vec<Option<T>>,
    len: usize,
}

impl<T> Registry<T> {
    /// Empty registry holding at most `capacity` entries
    pub fn new(kind: &'static str, capacity: usize) -> Self {
        Self {
            kind,
            capacity,
            slots: Vec::new(),
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lowest ID not currently in use
    pub fn next_id(&self) -> u32 {
        self.slots
            .iter()
            .position(Option::is_none)
            .unwrap_or(self.slots.len()) as u32
    }

    /// Insert under the lowest free ID
    pub fn insert(&mut self, value: T) -> RoomResult<u32> {
        if self.len >= self.capacity {
            log::warn!("{} registry full ({} entries)", self.kind, self.capacity);
            return Err(RoomError::CapacityExceeded {
                kind: self.kind,
                max: self.capacity,
            });
        }

        let id = self.next_id();
        match self.slots.get_mut(id as usize) {
            Some(slot) => *slot = Some(value),
            None => self.slots.push(Some(value)),
        }
        self.len += 1;
        Ok(id)
    }

    pub fn remove(&mut self, id: u32) -> RoomResult<T> {
        let value = self
            .slots
            .get_mut(id as usize)
            .and_then(Option::take)
            .ok_or(RoomError::InvalidHandle { kind: self.kind, id })?;
        self.len -= 1;

        // Keep trailing storage tight so ids() stays short
        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
        Ok(value)
    }

    #[inline]
    pub fn contains(&self, id: u32) -> bool {
        self.get(id).is_some()
    }

    #[inline]
    pub fn get(&self, id: u32) -> Option<&T> {
        self.slots.get(id as usize).and_then(Option::as_ref)
    }

    #[inline]
    pub fn get_mut(&mut self, id: u32) -> Option<&mut T> {
        self.slots.get_mut(id as usize).and_then(Option::as_mut)
    }

    /// Like `get` but with a handle error
    pub fn try_get(&self, id: u32) -> RoomResult<&T> {
        self.get(id)
            .ok_or(RoomError::InvalidHandle { kind: self.kind, id })
    }

    pub fn try_get_mut(&mut self, id: u32) -> RoomResult<&mut T> {
        let kind = self.kind;
        self.get_mut(id).ok_or(RoomError::InvalidHandle { kind, id })
    }

    /// Live entries in ascending ID order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|v| (id as u32, v)))
    }

    pub fn ids(&self) -> Vec<u32> {
        self.iter().map(|(id, _)| id).collect()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.len = 0;
    }
}
