/*!
    fixed-capacity instance registry

    Links and their parsers are allocated once at application setup and live
    for the whole run: the registry hands out copyable handles instead of
    references so the application root can own every instance in one place.
    There is no release operation; a full registry is a hard error.
*/
use heapless::Vec;

use crate::command::Status;

/// index of an instance inside a [Registry]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Handle(usize);

/// pool of at most `N` instances owned by the application root
pub struct Registry<T, const N: usize> {
    slots: Vec<T, N>,
}

impl<T, const N: usize> Registry<T, N> {
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }
    /// number of live instances
    pub fn len(&self) -> usize {
        self.slots.len()
    }
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
    /// register a new instance, handing the item back when the pool is full
    pub fn add(&mut self, item: T) -> Result<Handle, T> {
        let handle = Handle(self.slots.len());
        self.slots.push(item)?;
        Ok(handle)
    }
    /// look up an instance, [Status::InvalidInstance] for an unbound handle
    pub fn get(&self, handle: Handle) -> Result<&T, Status> {
        self.slots.get(handle.0).ok_or(Status::InvalidInstance)
    }
    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut T, Status> {
        self.slots.get_mut(handle.0).ok_or(Status::InvalidInstance)
    }
}

impl<T, const N: usize> Default for Registry<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
