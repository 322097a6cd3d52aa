use alloc::vec::Vec;

use super::handle::Handle;

/// Slot storage for tree nodes.
///
/// Freed slots are recycled before the slot vector grows, so handles stay
/// small and dense. A handle is only valid between the `insert` that returned
/// it and the matching `remove`.
#[derive(Clone)]
pub(crate) struct Arena<T> {
    slots: Vec<Option<T>>,
    free: Vec<Handle>,
}

impl<T> Arena<T> {
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Number of occupied slots.
    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub(crate) fn insert(&mut self, element: T) -> Handle {
        if let Some(handle) = self.free.pop() {
            self.slots[handle.index()] = Some(element);
            return handle;
        }

        assert!(
            self.slots.len() <= Handle::MAX,
            "`Arena::insert()` - arena is full ({} slots)",
            Handle::MAX + 1
        );
        self.slots.push(Some(element));
        Handle::new(self.slots.len() - 1)
    }

    #[inline]
    pub(crate) fn get(&self, handle: Handle) -> &T {
        self.slots[handle.index()].as_ref().expect("`Arena::get()` - `handle` is not occupied!")
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, handle: Handle) -> &mut T {
        self.slots[handle.index()].as_mut().expect("`Arena::get_mut()` - `handle` is not occupied!")
    }

    /// Returns a mutable reference to an element through a raw pointer to the arena,
    /// without creating a reference to the arena itself.
    ///
    /// # Safety
    /// - `ptr` must point to a live `Arena<T>` that is not otherwise borrowed.
    /// - No other reference to the element at `handle` may be alive for `'a`.
    /// - The arena must not be resized or cleared during `'a`.
    #[inline]
    pub(crate) unsafe fn get_mut_ptr<'a>(ptr: *mut Self, handle: Handle) -> &'a mut T {
        // SAFETY: the caller guarantees `ptr` is valid. Going through `as_mut_ptr` and
        // `add` only touches the one slot, so references into other slots stay valid.
        unsafe {
            let slots = core::ptr::addr_of_mut!((*ptr).slots);
            assert!(handle.index() < (*slots).len(), "`Arena::get_mut_ptr()` - `handle` is out of bounds!");
            let slot = &mut *(*slots).as_mut_ptr().add(handle.index());
            slot.as_mut().expect("`Arena::get_mut_ptr()` - `handle` is not occupied!")
        }
    }

    pub(crate) fn remove(&mut self, handle: Handle) -> T {
        let element = self.slots[handle.index()].take().expect("`Arena::remove()` - `handle` is not occupied!");
        self.free.push(handle);
        element
    }

    /// Drops every element in one pass.
    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}
