//! The control block shared by every handle to one managed object.
//!
//! [`Counted`] is the non-generic part: the two counts plus a pair of
//! type-erased function pointers, one to dispose of the managed object and one
//! to free the block itself. [`CountedImpl`] is the only block layout the crate
//! allocates; it appends the managed pointer and its deleter, and fills the
//! function pointers in with code that knows their concrete types.
//!
//! Strong references collectively own one unit of the weak count. So the weak
//! count starts at 1, and the last strong release disposes the object and then
//! gives that unit back, which frees the block if no weak observers remain.
use alloc::boxed::Box;
use core::{mem::ManuallyDrop, ptr::NonNull};

use crate::count::{underflow, Atomicity};

/// Something that can release the object behind a raw pointer.
///
/// Implemented by [`DefaultDelete`] and by any `FnOnce(NonNull<T>)`.
pub trait Deleter<T: ?Sized> {
    /// Release the object at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be the pointer this deleter was paired with when the owning
    /// handle was created, and the object must not be used again afterwards.
    unsafe fn delete(self, ptr: NonNull<T>);
}

/// Deleter for objects that were allocated as a `Box<T>`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DefaultDelete;

impl<T: ?Sized> Deleter<T> for DefaultDelete {
    unsafe fn delete(self, ptr: NonNull<T>) {
        drop(Box::from_raw(ptr.as_ptr()));
    }
}

impl<T: ?Sized, F: FnOnce(NonNull<T>)> Deleter<T> for F {
    unsafe fn delete(self, ptr: NonNull<T>) {
        self(ptr)
    }
}

/// Hands the object back to a callback as the `Box` it came from.
pub(crate) struct BoxDeleter<F>(pub(crate) F);

impl<T: ?Sized, F: FnOnce(Box<T>)> Deleter<T> for BoxDeleter<F> {
    unsafe fn delete(self, ptr: NonNull<T>) {
        (self.0)(Box::from_raw(ptr.as_ptr()))
    }
}

// Counts and release hooks for one managed object. Unlike the value, the block
// is not generic over what it manages, so handles to different types can share
// this one representation.
pub(crate) struct Counted<C> {
    strong: C,
    weak: C,
    dispose: unsafe fn(NonNull<Counted<C>>),
    destroy: unsafe fn(NonNull<Counted<C>>),
}

impl<C: Atomicity> Counted<C> {
    /// A fresh block header with strong=1, weak=1.
    ///
    /// `dispose` is called once, when the strong count reaches zero. `destroy`
    /// is called once, after that, when the weak count reaches zero; it must
    /// free whatever allocation holds this header.
    pub(crate) fn new(
        dispose: unsafe fn(NonNull<Counted<C>>),
        destroy: unsafe fn(NonNull<Counted<C>>),
    ) -> Self {
        Counted {
            strong: C::new(1),
            weak: C::new(1),
            dispose,
            destroy,
        }
    }

    pub(crate) fn strong_count(&self) -> usize {
        self.strong.get()
    }

    /// Raw weak count, including the unit owned by the strong references.
    pub(crate) fn weak_count(&self) -> usize {
        self.weak.get()
    }

    /// Number of weak observers, hiding the implicit unit held by the strong
    /// references while any exist.
    pub(crate) fn weak_observers(&self) -> usize {
        let weak = self.weak_count();
        if self.strong_count() != 0 {
            weak.saturating_sub(1)
        } else {
            weak
        }
    }

    pub(crate) fn inc_strong(&self) {
        let old = self.strong.inc_relaxed();
        debug_assert_ne!(old, 0, "strong ref added to a disposed object");
    }

    /// Add a strong reference unless the object has already been disposed.
    pub(crate) fn try_inc_strong(&self) -> bool {
        self.strong.inc_if_nonzero()
    }

    pub(crate) fn inc_weak(&self) {
        self.weak.inc_relaxed();
    }

    /// Drop one strong reference. The last one disposes of the object, then
    /// releases the weak unit the strong references held.
    ///
    /// # Safety
    ///
    /// `this` must be a live block and the caller must own the strong
    /// reference being released. The block may be freed before this returns.
    pub(crate) unsafe fn release_strong(this: NonNull<Self>) {
        let h = this.as_ref();
        match h.strong.dec() {
            0 => underflow(),
            1 => {}
            _ => return,
        }
        // last strong pointer was just dropped
        h.strong.acquire_fence();
        (h.dispose)(this);

        // Weak::drop may be racing us for the final weak release; the object
        // is fully gone before we give up our unit.
        Self::release_weak(this);
    }

    /// Drop one weak reference. The last one frees the block.
    ///
    /// # Safety
    ///
    /// `this` must be a live block and the caller must own the weak reference
    /// being released. The block may be freed before this returns.
    pub(crate) unsafe fn release_weak(this: NonNull<Self>) {
        let h = this.as_ref();
        match h.weak.dec() {
            0 => underflow(),
            1 => {}
            _ => return,
        }
        // If we free the block, ensure that it happens-after `dispose` has
        // completed on whichever thread ran it.
        h.weak.acquire_fence();
        (h.destroy)(this);
    }
}

/// The block layout for a managed pointer `T` released by deleter `D`.
#[repr(C)]
pub(crate) struct CountedImpl<T: ?Sized, D, C> {
    base: Counted<C>,
    ptr: NonNull<T>,
    // taken exactly once, by `dispose`
    deleter: ManuallyDrop<D>,
}

impl<T: ?Sized, D: Deleter<T>, C: Atomicity> CountedImpl<T, D, C> {
    /// Allocate a block owning `ptr`, with strong=1 and weak=1.
    ///
    /// # Safety
    ///
    /// Calling `deleter.delete(ptr)` once, at an arbitrary later time, must be
    /// sound.
    pub(crate) unsafe fn allocate(ptr: NonNull<T>, deleter: D) -> NonNull<Counted<C>> {
        let b = Box::into_raw(Box::new(CountedImpl {
            base: Counted::new(Self::dispose, Self::destroy),
            ptr,
            deleter: ManuallyDrop::new(deleter),
        }));
        // `base` is the first field of a repr(C) struct.
        NonNull::new_unchecked(b as *mut Counted<C>)
    }

    unsafe fn dispose(this: NonNull<Counted<C>>) {
        let this = this.cast::<Self>().as_ptr();
        let ptr = (*this).ptr;
        let deleter = ManuallyDrop::take(&mut (*this).deleter);
        log::trace!("disposing managed object at {:p}", ptr);
        deleter.delete(ptr);
    }

    unsafe fn destroy(this: NonNull<Counted<C>>) {
        log::trace!("destroying control block at {:p}", this);
        // The deleter was already taken by `dispose`; ManuallyDrop keeps it
        // from being dropped twice here.
        drop(Box::from_raw(this.cast::<Self>().as_ptr()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rc::Nonatomic;
    use std::{cell::RefCell, rc::Rc as StdRc, vec, vec::Vec};

    type Log = StdRc<RefCell<Vec<&'static str>>>;

    // A block with its own `destroy`, to observe both hooks and their order.
    #[repr(C)]
    struct Recorder {
        base: Counted<Nonatomic>,
        log: Log,
    }

    unsafe fn record_dispose(this: NonNull<Counted<Nonatomic>>) {
        let p = this.cast::<Recorder>().as_ref();
        p.log.borrow_mut().push("dispose");
    }

    unsafe fn record_destroy(this: NonNull<Counted<Nonatomic>>) {
        let p = Box::from_raw(this.cast::<Recorder>().as_ptr());
        p.log.borrow_mut().push("destroy");
    }

    fn recorder(log: &Log) -> NonNull<Counted<Nonatomic>> {
        let b = Box::into_raw(Box::new(Recorder {
            base: Counted::new(record_dispose, record_destroy),
            log: log.clone(),
        }));
        NonNull::new(b as *mut Counted<Nonatomic>).unwrap()
    }

    fn counts(b: NonNull<Counted<Nonatomic>>) -> (usize, usize) {
        let h = unsafe { b.as_ref() };
        (h.strong_count(), h.weak_count())
    }

    #[test]
    fn test_initial_counts() {
        let log = Log::default();
        let b = recorder(&log);
        assert_eq!(counts(b), (1, 1));
        unsafe { Counted::release_strong(b) };
        assert_eq!(*log.borrow(), ["dispose", "destroy"]);
    }

    #[test]
    fn test_dispose_only_on_last_strong() {
        let log = Log::default();
        let b = recorder(&log);
        let h = unsafe { b.as_ref() };
        h.inc_strong();
        h.inc_strong();
        assert_eq!(counts(b), (3, 1));
        unsafe { Counted::release_strong(b) };
        unsafe { Counted::release_strong(b) };
        assert!(log.borrow().is_empty());
        unsafe { Counted::release_strong(b) };
        assert_eq!(*log.borrow(), ["dispose", "destroy"]);
    }

    #[test]
    fn test_weak_keeps_block() {
        let log = Log::default();
        let b = recorder(&log);
        let h = unsafe { b.as_ref() };
        h.inc_weak();
        assert_eq!(h.weak_observers(), 1);
        unsafe { Counted::release_strong(b) };
        assert_eq!(*log.borrow(), ["dispose"]);

        let h = unsafe { b.as_ref() };
        assert_eq!(h.strong_count(), 0);
        assert_eq!(h.weak_observers(), 1);
        assert!(!h.try_inc_strong());
        assert_eq!(h.strong_count(), 0);

        unsafe { Counted::release_weak(b) };
        assert_eq!(*log.borrow(), ["dispose", "destroy"]);
    }

    #[test]
    fn test_try_inc_strong_while_alive() {
        let log = Log::default();
        let b = recorder(&log);
        let h = unsafe { b.as_ref() };
        assert!(h.try_inc_strong());
        assert_eq!(counts(b), (2, 1));
        unsafe { Counted::release_strong(b) };
        unsafe { Counted::release_strong(b) };
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn test_counted_impl_calls_deleter_once() {
        let seen: StdRc<RefCell<Vec<usize>>> = Default::default();
        let value = Box::into_raw(Box::new(10u32));
        let ptr = NonNull::new(value).unwrap();
        let s = seen.clone();
        let b = unsafe {
            CountedImpl::<u32, _, Nonatomic>::allocate(ptr, move |p: NonNull<u32>| {
                s.borrow_mut().push(p.as_ptr() as usize);
                drop(Box::from_raw(p.as_ptr()));
            })
        };
        unsafe { b.as_ref() }.inc_strong();
        unsafe { Counted::release_strong(b) };
        assert!(seen.borrow().is_empty());
        unsafe { Counted::release_strong(b) };
        assert_eq!(*seen.borrow(), vec![value as usize]);
    }

    #[test]
    #[should_panic(expected = "invariant violated")]
    fn test_double_release_panics() {
        let log = Log::default();
        let b = recorder(&log);
        unsafe { b.as_ref() }.inc_weak();
        unsafe { Counted::release_strong(b) };
        // the strong count is already zero; the block is still alive because
        // of the weak unit above
        unsafe { Counted::release_strong(b) };
    }
}
