//! A fixed-size pool of uniformly sized slots served by a free list.
//!
//! Backs the operation cache: entries all have the same size and their
//! lifetime is governed by the LRU policy, so a general-purpose allocator
//! buys nothing here. One contiguous allocation holds every slot; a slot is
//! either free (holding the next free index) or busy (holding the entry).
//! The pool keeps no live/free count; the cache caps its inserts at the
//! pool size.

pub(crate) enum Slot<T> {
    Free { next: Option<u32> },
    Busy(T),
}

pub(crate) struct Pool<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
}

impl<T> Pool<T> {
    /// One contiguous block of `size` slots, threaded into a free list.
    pub fn new(size: usize) -> Pool<T> {
        assert!(size > 0, "pool of zero slots");
        let mut slots = Vec::with_capacity(size);
        for i in 0..size {
            let next = if i + 1 < size {
                Some((i + 1) as u32)
            } else {
                None
            };
            slots.push(Slot::Free { next });
        }
        Pool {
            slots,
            free_head: Some(0),
        }
    }

    /// Pop the free-list head and store `value` there. Running the pool dry
    /// is a contract violation.
    pub fn allocate(&mut self, value: T) -> u32 {
        let idx = self.free_head.expect("pool exhausted");
        match self.slots[idx as usize] {
            Slot::Free { next } => self.free_head = next,
            Slot::Busy(_) => unreachable!("free list points at a busy slot"),
        }
        self.slots[idx as usize] = Slot::Busy(value);
        idx
    }

    /// Return a slot to the free list, handing its value back.
    pub fn free(&mut self, idx: u32) -> T {
        let slot = std::mem::replace(
            &mut self.slots[idx as usize],
            Slot::Free {
                next: self.free_head,
            },
        );
        self.free_head = Some(idx);
        match slot {
            Slot::Busy(value) => value,
            Slot::Free { .. } => panic!("freeing a vacant slot"),
        }
    }

    #[inline]
    pub fn get(&self, idx: u32) -> &T {
        match &self.slots[idx as usize] {
            Slot::Busy(value) => value,
            Slot::Free { .. } => panic!("vacant slot"),
        }
    }

    #[inline]
    pub fn get_mut(&mut self, idx: u32) -> &mut T {
        match &mut self.slots[idx as usize] {
            Slot::Busy(value) => value,
            Slot::Free { .. } => panic!("vacant slot"),
        }
    }
}
