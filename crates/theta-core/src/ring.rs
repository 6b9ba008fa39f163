//! A single fixed-capacity, multi-producer/multi-consumer ring of non-null
//! handles. Used as each executor's submission buffer.
//!
//! Head/tail are packed into one 64-bit word so admission and pop contend on
//! a single atomic, avoiding the ABA traps of independent two-word schemes
//! avoiding the need for two independent atomics. Each slot is
//! an `AtomicPtr<T>`; a successful index CAS only reserves a slot — the
//! payload is published with its own atomic exchange, so readers spin on a
//! non-null load and writers spin on a null-to-value CAS. This tolerates the
//! narrow window between index claim and payload materialization.

use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};

#[inline]
fn pack(head: u32, tail: u32) -> u64 {
    ((head as u64) << 32) | (tail as u64)
}

#[inline]
fn unpack(line: u64) -> (u32, u32) {
    ((line >> 32) as u32, line as u32)
}

/// A bounded, lock-free MPMC ring buffer of boxed handles.
///
/// `N`, the backing array length, is rounded up to the next power of two of
/// the requested capacity; the usable capacity is `N - 1` (one sentinel slot
/// distinguishes full from empty).
pub struct BoundedRing<T> {
    ht: AtomicU64,
    mask: u32,
    slots: Box<[AtomicPtr<T>]>,
}

// Safety: all access to `slots` goes through atomic index reservation
// (`ht`) followed by an atomic slot exchange; no two operations ever
// observe the same slot as simultaneously writable.
unsafe impl<T: Send> Send for BoundedRing<T> {}
unsafe impl<T: Send> Sync for BoundedRing<T> {}

impl<T> BoundedRing<T> {
    /// Creates a ring whose usable capacity is at least `max_size` (rounded
    /// up to the next power of two minus one sentinel slot).
    pub fn new(max_size: usize) -> Self {
        let requested = max_size.max(1);
        let n = requested
            .saturating_add(1)
            .next_power_of_two()
            .max(2);
        let slots = (0..n)
            .map(|_| AtomicPtr::new(ptr::null_mut()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            ht: AtomicU64::new(pack(0, 0)),
            mask: (n - 1) as u32,
            slots,
        }
    }

    fn n(&self) -> u32 {
        self.mask + 1
    }

    /// Usable capacity (`N - 1`).
    pub fn capacity(&self) -> usize {
        self.mask as usize
    }

    /// Current number of occupied slots.
    pub fn size(&self) -> usize {
        let (head, tail) = unpack(self.ht.load(Ordering::Acquire));
        (tail.wrapping_sub(head) & self.mask) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Attempts to push `val`. Returns `Err(val)` if the ring is full or if
    /// `val` is somehow null (callers pass owned `Box<T>`, which can't be,
    /// but the bool-returning C++ original rejects null explicitly — kept
    /// here as a documented invariant rather than a runtime check).
    pub fn push(&self, val: Box<T>) -> Result<(), Box<T>> {
        let n = self.n();
        let mut expected = self.ht.load(Ordering::Relaxed);
        let tail_index;
        loop {
            let (head, tail) = unpack(expected);
            let next_tail = (tail + 1) & self.mask;
            if next_tail == head {
                return Err(val);
            }
            let desired = pack(head, next_tail);
            match self.ht.compare_exchange_weak(
                expected,
                desired,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    tail_index = tail;
                    break;
                }
                Err(actual) => expected = actual,
            }
        }
        debug_assert!((tail_index as usize) < n as usize);

        let raw = Box::into_raw(val);
        let slot = &self.slots[tail_index as usize];
        loop {
            match slot.compare_exchange_weak(
                ptr::null_mut(),
                raw,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(_) => std::hint::spin_loop(),
            }
        }
        Ok(())
    }

    /// Pops one value, or `None` if the ring is empty.
    pub fn pop(&self) -> Option<Box<T>> {
        let mut expected = self.ht.load(Ordering::Relaxed);
        let head_index;
        loop {
            let (head, tail) = unpack(expected);
            if head == tail {
                return None;
            }
            let next_head = (head + 1) & self.mask;
            let desired = pack(next_head, tail);
            match self.ht.compare_exchange_weak(
                expected,
                desired,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    head_index = head;
                    break;
                }
                Err(actual) => expected = actual,
            }
        }

        let slot = &self.slots[head_index as usize];
        loop {
            let raw = slot.swap(ptr::null_mut(), Ordering::Acquire);
            if !raw.is_null() {
                // Safety: this pointer was published by a matching `push`
                // via `Box::into_raw` and has not been freed since.
                return Some(unsafe { Box::from_raw(raw) });
            }
            std::hint::spin_loop();
        }
    }

    /// Atomically reserves every slot currently present and returns a
    /// `Flusher` iterating over them. Used for shutdown drain.
    pub fn flusher(&self) -> Flusher<'_, T> {
        let n = self.n();
        let (start, count) = loop {
            let expected = self.ht.load(Ordering::Relaxed);
            let (head, tail) = unpack(expected);
            let count = tail.wrapping_sub(head) & self.mask;
            let next_head = (head + count) & self.mask;
            let desired = pack(next_head, tail);
            if self
                .ht
                .compare_exchange_weak(expected, desired, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                break (head, count);
            }
        };
        let _ = n;
        Flusher {
            ring: self,
            cursor: start,
            remaining: count,
        }
    }
}

impl<T> Drop for BoundedRing<T> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

/// Iterator over the slots reserved by [`BoundedRing::flusher`]. Any entries
/// not consumed by the time this is dropped are drained and dropped so the
/// ring is left empty, with a release fence to publish the clearing to any
/// other observer of the ring's memory.
pub struct Flusher<'a, T> {
    ring: &'a BoundedRing<T>,
    cursor: u32,
    remaining: u32,
}

impl<'a, T> Iterator for Flusher<'a, T> {
    type Item = Box<T>;

    fn next(&mut self) -> Option<Box<T>> {
        if self.remaining == 0 {
            return None;
        }
        let slot = &self.ring.slots[self.cursor as usize];
        let val = loop {
            let raw = slot.swap(ptr::null_mut(), Ordering::Acquire);
            if !raw.is_null() {
                break unsafe { Box::from_raw(raw) };
            }
            std::hint::spin_loop();
        };
        self.cursor = (self.cursor + 1) & self.ring.mask;
        self.remaining -= 1;
        Some(val)
    }
}

impl<'a, T> Drop for Flusher<'a, T> {
    fn drop(&mut self) {
        for _ in self.by_ref() {}
        std::sync::atomic::fence(Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn rounds_capacity_to_power_of_two() {
        let ring: BoundedRing<u32> = BoundedRing::new(4);
        assert!(ring.capacity() >= 4);
        assert_eq!(ring.capacity() + 1, (ring.capacity() + 1).next_power_of_two());
    }

    #[test]
    fn single_threaded_push_then_pop() {
        let ring = BoundedRing::new(4);
        ring.push(Box::new(42)).unwrap();
        assert_eq!(ring.size(), 1);
        let v = ring.pop().unwrap();
        assert_eq!(*v, 42);
        assert!(ring.is_empty());
    }

    #[test]
    fn pop_on_empty_returns_none() {
        let ring: BoundedRing<u32> = BoundedRing::new(4);
        assert!(ring.pop().is_none());
    }

    #[test]
    fn push_rejects_when_full() {
        let ring = BoundedRing::new(2);
        for i in 0..ring.capacity() {
            ring.push(Box::new(i)).unwrap();
        }
        let overflow = ring.push(Box::new(999));
        assert!(overflow.is_err());
    }

    #[test]
    fn fifo_order_single_threaded() {
        let ring = BoundedRing::new(16);
        for i in 0..10 {
            ring.push(Box::new(i)).unwrap();
        }
        for i in 0..10 {
            assert_eq!(*ring.pop().unwrap(), i);
        }
    }

    #[test]
    fn concurrent_pushes_and_pops_yield_multiset() {
        let ring = Arc::new(BoundedRing::new(256));
        let producers = 8;
        let per_producer = 200;

        let handles: Vec<_> = (0..producers)
            .map(|p| {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    for i in 0..per_producer {
                        let val = p * per_producer + i;
                        loop {
                            if ring.push(Box::new(val)).is_ok() {
                                break;
                            }
                            std::hint::spin_loop();
                        }
                    }
                })
            })
            .collect();

        let total = producers * per_producer;
        let collected = Arc::new(std::sync::Mutex::new(Vec::with_capacity(total)));
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let ring = Arc::clone(&ring);
                let collected = Arc::clone(&collected);
                thread::spawn(move || loop {
                    if let Some(v) = ring.pop() {
                        collected.lock().unwrap().push(*v);
                    } else if collected.lock().unwrap().len() >= total {
                        break;
                    } else {
                        std::hint::spin_loop();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        for h in consumers {
            h.join().unwrap();
        }

        let mut got = collected.lock().unwrap().clone();
        got.sort_unstable();
        let mut want: Vec<usize> = (0..total).collect();
        want.sort_unstable();
        assert_eq!(got, want);
    }

    #[test]
    fn flusher_drains_all_present_entries() {
        let ring = BoundedRing::new(8);
        for i in 0..5 {
            ring.push(Box::new(i)).unwrap();
        }
        let drained: Vec<i32> = ring.flusher().map(|b| *b).collect();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
        assert!(ring.is_empty());
    }

    #[test]
    fn flusher_partial_iteration_still_empties_ring_on_drop() {
        let ring = BoundedRing::new(8);
        for i in 0..5 {
            ring.push(Box::new(i)).unwrap();
        }
        {
            let mut flusher = ring.flusher();
            assert_eq!(*flusher.next().unwrap(), 0);
            // flusher dropped here without consuming the rest
        }
        assert!(ring.is_empty());
        assert!(ring.pop().is_none());
    }
}
