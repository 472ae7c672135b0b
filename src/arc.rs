//! `sharedptr::arc::Arc<T>` is the thread-safe flavour of
//! [`Rc`][crate::rc::Rc]: both counts are atomic, and the last release on any
//! thread disposes of the object.
//!
//! See [`Shared`] for detailed API.
use alloc::boxed::Box;
use core::{
    ptr::NonNull,
    sync::atomic::{
        AtomicUsize,
        Ordering::{Acquire, Relaxed, Release},
    },
};

use crate::{
    block::{BoxDeleter, Deleter},
    count::{private, Atomicity},
    shared::{self, Shared},
};

/// Atomic counters, for sharing across threads.
pub struct Atomic(AtomicUsize);

impl private::Sealed for Atomic {}

unsafe impl Atomicity for Atomic {
    fn new(v: usize) -> Self {
        Atomic(AtomicUsize::new(v))
    }

    fn get(&self) -> usize {
        // relaxed ordering as this is only advisory
        self.0.load(Relaxed)
    }

    fn inc_relaxed(&self) -> usize {
        self.0.fetch_add(1, Relaxed)
    }

    fn inc_if_nonzero(&self) -> bool {
        // See std::sync::Arc<T> for explanation of atomic logic
        self.0
            .fetch_update(Acquire, Relaxed, |n| if n == 0 { None } else { Some(n + 1) })
            .is_ok()
    }

    fn dec(&self) -> usize {
        // A count at zero is left there; the caller reports the underflow.
        self.0
            .fetch_update(Release, Relaxed, |n| n.checked_sub(1))
            .unwrap_or_else(|n| n)
    }

    fn acquire_fence(&self) {
        // either `fence()` or `load()` would work here, and either may be more
        // performant depending on platform details.
        self.0.load(Acquire);
    }
}

/// Thread-safe shared pointer.
///
/// An `Arc<T>` is `Send` and `Sync` only when `T` is. Its bare
/// [`SharedCount`][crate::SharedCount] never is, since the count alone can't
/// tell what its deleter drops:
///
/// ```compile_fail
/// use sharedptr::Arc;
/// let x = Arc::new(1u32);
/// let c = Arc::shared_count(&x).clone();
/// std::thread::spawn(move || drop(c));
/// ```
pub type Arc<T> = Shared<T, Atomic>;
pub type Weak<T> = shared::Weak<T, Atomic>;

// Constructors require the deleter to be `Send`, and the default deleter only
// drops a `T`, which these bounds already cover.
unsafe impl<T: ?Sized + Send + Sync> Send for Shared<T, Atomic> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for Shared<T, Atomic> {}
unsafe impl<T: ?Sized + Send + Sync> Send for shared::Weak<T, Atomic> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for shared::Weak<T, Atomic> {}

impl<T: ?Sized> Shared<T, Atomic> {
    /// Take ownership of `ptr`, releasing it with `deleter` on whichever
    /// thread drops the last strong reference.
    ///
    /// # Safety
    ///
    /// `ptr` must stay valid for reads until the deleter runs, and calling
    /// `deleter.delete(ptr)` once, from any thread, must be sound.
    pub unsafe fn from_raw_with_deleter<D>(ptr: NonNull<T>, deleter: D) -> Self
    where
        D: Deleter<T> + Send + 'static,
    {
        Shared::from_raw_parts(ptr, deleter)
    }

    /// Take ownership of a box, handing it to `deleter` instead of dropping
    /// it when the last strong reference is dropped.
    pub fn from_box_with_deleter<F>(value: Box<T>, deleter: F) -> Self
    where
        F: FnOnce(Box<T>) + Send + 'static,
    {
        let ptr = NonNull::from(Box::leak(value));
        // Safety: BoxDeleter rebuilds the box we just leaked.
        unsafe { Shared::from_raw_parts(ptr, BoxDeleter(deleter)) }
    }
}

impl<T: ?Sized + Send + Sync + 'static> Shared<T, Atomic> {
    /// Return an `Arc<U>` for any type U contained within T. The result
    /// keeps the whole `T` alive, and whichever thread drops the last handle
    /// drops the `T`, so `T` itself must be `Send + Sync` even if `U` is.
    ///
    /// ```
    /// use sharedptr::Arc;
    /// let a: Arc<(u32, String)> = Arc::new((7, "seven".to_string()));
    /// let n: Arc<u32> = Arc::project(a, |x| &x.0);
    /// std::thread::spawn(move || assert_eq!(*n, 7)).join().unwrap();
    /// ```
    ///
    /// A root that can't leave its thread can't be smuggled out through a
    /// `Send` field:
    ///
    /// ```compile_fail
    /// use sharedptr::Arc;
    /// let a = Arc::new((1u32, std::rc::Rc::new(())));
    /// let n: Arc<u32> = Arc::project(a, |x| &x.0);
    /// std::thread::spawn(move || drop(n));
    /// ```
    pub fn project<U: ?Sized + 'static, F: FnOnce(&T) -> &U>(this: Self, f: F) -> Arc<U> {
        Shared::project_with(this, f)
    }

    /// Fallible version of `project()`.
    pub fn try_project<U: ?Sized + 'static, F: FnOnce(&T) -> Option<&U>>(
        this: Self,
        f: F,
    ) -> Option<Arc<U>> {
        Shared::try_project_with(this, f)
    }
}
