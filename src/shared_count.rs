//! Reference-counted handles to a control block, without the managed pointer.
//!
//! [`SharedCount`] owns one strong reference and [`WeakCount`] owns one weak
//! reference. Both may be empty. [`Shared`][crate::Shared] and
//! [`Weak`][crate::Weak] pair these with the pointer they hand out.
use core::{fmt, mem, ptr::NonNull};

use crate::{
    block::{Counted, CountedImpl, Deleter},
    count::Atomicity,
    error::{Error, Result},
};

/// An owning handle to a control block, or nothing.
pub struct SharedCount<C: Atomicity> {
    block: Option<NonNull<Counted<C>>>,
}

/// A non-owning handle to a control block, or nothing.
pub struct WeakCount<C: Atomicity> {
    block: Option<NonNull<Counted<C>>>,
}

impl<C: Atomicity> SharedCount<C> {
    /// Allocate a new control block that will release `ptr` through
    /// `deleter` once the last `SharedCount` sharing it is dropped.
    ///
    /// # Safety
    ///
    /// Calling `deleter.delete(ptr)` once, at any later time, must be sound.
    /// If `C` is [`Atomic`][crate::Atomic], that call may happen on any thread
    /// that held a clone of the handle, so the deleter and the pointee must be
    /// safe to send there.
    pub unsafe fn new<T, D>(ptr: NonNull<T>, deleter: D) -> Self
    where
        T: ?Sized,
        D: Deleter<T> + 'static,
    {
        SharedCount {
            block: Some(CountedImpl::<T, D, C>::allocate(ptr, deleter)),
        }
    }

    /// True for a default-constructed handle that owns nothing.
    pub fn is_empty(&self) -> bool {
        self.block.is_none()
    }

    /// Number of `SharedCount`s sharing this block, or 0 for an empty handle.
    pub fn use_count(&self) -> usize {
        self.block().map_or(0, Counted::strong_count)
    }

    /// Like [`use_count`](Self::use_count), but an empty handle is an error.
    pub fn try_use_count(&self) -> Result<usize> {
        self.block()
            .map(Counted::strong_count)
            .ok_or(Error::Empty)
    }

    /// Number of weak observers of this block.
    pub fn weak_count(&self) -> usize {
        self.block().map_or(0, Counted::weak_observers)
    }

    /// True if both handles share one control block (or are both empty).
    pub fn same_block(&self, other: &Self) -> bool {
        self.block == other.block
    }

    fn block(&self) -> Option<&Counted<C>> {
        // Safety: a non-null block is alive as long as we hold our strong
        // reference.
        self.block.map(|b| unsafe { b.as_ref() })
    }
}

impl<C: Atomicity> Default for SharedCount<C> {
    fn default() -> Self {
        SharedCount { block: None }
    }
}

impl<C: Atomicity> Clone for SharedCount<C> {
    fn clone(&self) -> Self {
        if let Some(h) = self.block() {
            h.inc_strong();
        }
        SharedCount { block: self.block }
    }

    /// Assignment. Handles that already share a block are left untouched, so
    /// assigning from yourself can never drop the count to zero.
    fn clone_from(&mut self, source: &Self) {
        if source.block == self.block {
            return;
        }
        // Take the new reference and adopt it before giving up the old one,
        // so `self` is consistent even if the old object's deleter panics.
        if let Some(h) = source.block() {
            h.inc_strong();
        }
        let old = mem::replace(&mut self.block, source.block);
        if let Some(old) = old {
            unsafe { Counted::release_strong(old) }
        }
    }
}

impl<C: Atomicity> Drop for SharedCount<C> {
    fn drop(&mut self) {
        if let Some(block) = self.block {
            unsafe { Counted::release_strong(block) }
        }
    }
}

impl<C: Atomicity> fmt::Debug for SharedCount<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedCount")
            .field("block", &self.block)
            .field("use_count", &self.use_count())
            .finish()
    }
}

impl<C: Atomicity> WeakCount<C> {
    /// Number of strong references to the observed block, or 0 if empty.
    pub fn use_count(&self) -> usize {
        self.block().map_or(0, Counted::strong_count)
    }

    /// Number of weak observers of the block, including this one.
    pub fn weak_count(&self) -> usize {
        self.block().map_or(0, Counted::weak_observers)
    }

    /// True once the managed object has been disposed (or if empty).
    pub fn expired(&self) -> bool {
        self.use_count() == 0
    }

    /// Try to take a strong reference. Returns an empty `SharedCount` if the
    /// object has expired.
    pub fn lock(&self) -> SharedCount<C> {
        match self.block() {
            Some(h) if h.try_inc_strong() => SharedCount { block: self.block },
            _ => SharedCount::default(),
        }
    }

    /// True if both handles observe one control block (or are both empty).
    pub fn same_block(&self, other: &Self) -> bool {
        self.block == other.block
    }

    fn block(&self) -> Option<&Counted<C>> {
        // Safety: our weak reference keeps the block (not the object) alive.
        self.block.map(|b| unsafe { b.as_ref() })
    }
}

impl<C: Atomicity> From<&SharedCount<C>> for WeakCount<C> {
    fn from(shared: &SharedCount<C>) -> Self {
        if let Some(h) = shared.block() {
            h.inc_weak();
        }
        WeakCount {
            block: shared.block,
        }
    }
}

impl<C: Atomicity> Default for WeakCount<C> {
    fn default() -> Self {
        WeakCount { block: None }
    }
}

impl<C: Atomicity> Clone for WeakCount<C> {
    fn clone(&self) -> Self {
        if let Some(h) = self.block() {
            h.inc_weak();
        }
        WeakCount { block: self.block }
    }

    fn clone_from(&mut self, source: &Self) {
        if source.block == self.block {
            return;
        }
        if let Some(h) = source.block() {
            h.inc_weak();
        }
        let old = mem::replace(&mut self.block, source.block);
        if let Some(old) = old {
            unsafe { Counted::release_weak(old) }
        }
    }
}

impl<C: Atomicity> Drop for WeakCount<C> {
    fn drop(&mut self) {
        if let Some(block) = self.block {
            unsafe { Counted::release_weak(block) }
        }
    }
}

impl<C: Atomicity> fmt::Debug for WeakCount<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakCount")
            .field("block", &self.block)
            .field("use_count", &self.use_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{block::DefaultDelete, rc::Nonatomic};
    use std::{boxed::Box, cell::Cell, rc::Rc as StdRc};

    type Count = SharedCount<Nonatomic>;
    type Weak = WeakCount<Nonatomic>;

    struct DropCounter(StdRc<Cell<usize>>);
    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn counted(drops: &StdRc<Cell<usize>>) -> Count {
        let ptr = NonNull::from(Box::leak(Box::new(DropCounter(drops.clone()))));
        unsafe { Count::new(ptr, DefaultDelete) }
    }

    #[test]
    fn test_empty() {
        let c = Count::default();
        assert!(c.is_empty());
        assert_eq!(c.use_count(), 0);
        assert_eq!(c.try_use_count(), Err(Error::Empty));
        assert_eq!(c.weak_count(), 0);
        let d = c.clone();
        assert!(d.is_empty());
        assert!(c.same_block(&d));
    }

    #[test]
    fn test_copies_share_block() {
        let drops = StdRc::new(Cell::new(0));
        let a = counted(&drops);
        assert_eq!(a.try_use_count(), Ok(1));
        let copies: std::vec::Vec<Count> = (0..4).map(|_| a.clone()).collect();
        for c in &copies {
            assert_eq!(c.use_count(), 5);
            assert!(c.same_block(&a));
        }
        drop(copies);
        assert_eq!(a.use_count(), 1);
        assert_eq!(drops.get(), 0);
        drop(a);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_assign_self_is_noop() {
        let drops = StdRc::new(Cell::new(0));
        let mut a = counted(&drops);
        let b = a.clone();
        let alias = b.clone();
        a.clone_from(&alias);
        assert_eq!(a.use_count(), 3);
        drop(alias);
        drop(b);
        let a2 = a.clone();
        a.clone_from(&a2);
        assert_eq!(a.use_count(), 2);
        assert_eq!(drops.get(), 0);
    }

    #[test]
    fn test_assign_other_block() {
        let first = StdRc::new(Cell::new(0));
        let second = StdRc::new(Cell::new(0));
        let mut a = counted(&first);
        let b = counted(&second);
        a.clone_from(&b);
        assert_eq!(first.get(), 1);
        assert_eq!(second.get(), 0);
        assert!(a.same_block(&b));
        assert_eq!(b.use_count(), 2);
    }

    #[test]
    fn test_assign_from_empty_releases() {
        let drops = StdRc::new(Cell::new(0));
        let mut a = counted(&drops);
        a.clone_from(&Count::default());
        assert!(a.is_empty());
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_weak_survives_strong() {
        let drops = StdRc::new(Cell::new(0));
        let a = counted(&drops);
        let w = Weak::from(&a);
        assert_eq!(a.weak_count(), 1);
        assert!(!w.expired());
        let b = w.lock();
        assert_eq!(b.use_count(), 2);
        drop(b);
        drop(a);
        assert_eq!(drops.get(), 1);
        assert!(w.expired());
        assert_eq!(w.weak_count(), 1);
        assert!(w.lock().is_empty());
    }

    #[test]
    fn test_weak_assign() {
        let drops = StdRc::new(Cell::new(0));
        let a = counted(&drops);
        let b = counted(&drops);
        let mut wa = Weak::from(&a);
        let wb = Weak::from(&b);
        let copy = wa.clone();
        wa.clone_from(&copy);
        assert_eq!(a.weak_count(), 2);
        drop(copy);
        assert_eq!(a.weak_count(), 1);
        wa.clone_from(&wb);
        assert_eq!(a.weak_count(), 0);
        assert_eq!(b.weak_count(), 2);
        assert!(wa.same_block(&wb));
    }

    #[test]
    fn test_empty_weak() {
        let w = Weak::default();
        assert!(w.expired());
        assert!(w.lock().is_empty());
        assert!(Weak::from(&Count::default()).expired());
    }
}
