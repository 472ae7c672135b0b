//! `Shared<T, C>` implements `Rc` and `Arc` generically across the count type
//! (atomic vs. nonatomic).
//!
//! A `Shared` is the managed pointer and its [`SharedCount`] kept together:
//! every constructor sets both, and clone, assignment and drop update both.
//! The pointer need not be the one the control block releases; see
//! [`Rc::project`][crate::Rc::project].
//!
//! ## See also
//!
//! `sharedptr::arc::Arc<T>` in this crate is atomic version for sharing data
//! across threads.
//!
//! `sharedptr::rc::Rc<T>` in this crate is nonatomic version for
//! single-threaded use.
use alloc::boxed::Box;
use core::{
    borrow, cmp, fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    ops::Deref,
    ptr::{self, NonNull},
};

use crate::{
    block::{DefaultDelete, Deleter},
    count::Atomicity,
    error::{Error, Result},
    shared_count::{SharedCount, WeakCount},
};

/// Generic implementation behind [`Rc`][crate::Rc] and [`Arc`][crate::Arc].
pub struct Shared<T: ?Sized, C: Atomicity> {
    ptr: NonNull<T>,
    // never empty
    count: SharedCount<C>,
    phantom: PhantomData<T>,
}

/// Generic implementation behind `rc::Weak` and `arc::Weak`, distinguished
/// by `Atomicity`.
pub struct Weak<T: ?Sized, C: Atomicity> {
    ptr: NonNull<T>,
    // never empty
    count: WeakCount<C>,
    phantom: PhantomData<T>,
}

impl<T, C: Atomicity> Shared<T, C> {
    /// Constructs a new `Shared<T>` with the given value.
    pub fn new(value: T) -> Self {
        Shared::from_box(Box::new(value))
    }
}

impl<T: ?Sized, C: Atomicity> Shared<T, C> {
    /// Return a `Shared<T>` for a boxed value. The box allocation is kept
    /// as-is; the counts live in a separate allocation.
    pub fn from_box(value: Box<T>) -> Self {
        let ptr = NonNull::from(Box::leak(value));
        // Safety: DefaultDelete turns the pointer back into the box.
        unsafe { Shared::from_raw_parts(ptr, DefaultDelete) }
    }

    /// # Safety
    ///
    /// Same as [`SharedCount::new`]; in addition `ptr` must stay valid for
    /// reads until the deleter runs.
    pub(crate) unsafe fn from_raw_parts<D>(ptr: NonNull<T>, deleter: D) -> Self
    where
        D: Deleter<T> + 'static,
    {
        Shared {
            ptr,
            count: SharedCount::new(ptr, deleter),
            phantom: PhantomData,
        }
    }

    /// Return a [`Weak`] pointer to this object.
    pub fn downgrade(this: &Self) -> Weak<T, C> {
        Weak {
            ptr: this.ptr,
            count: WeakCount::from(&this.count),
            phantom: PhantomData,
        }
    }

    // Get the current strong count of this pointer
    pub fn strong_count(this: &Self) -> usize {
        this.count.use_count()
    }

    // Get the number of weak pointers to this object
    pub fn weak_count(this: &Self) -> usize {
        this.count.weak_count()
    }

    /// Returns true if two `Shared` pointers point to the same object. Note
    /// that this is is not the same as sharing the same control block; see
    /// [`owner_eq`](Self::owner_eq).
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        ptr::addr_eq(this.ptr.as_ptr(), other.ptr.as_ptr())
    }

    /// Returns true if two `Shared` pointers share reference counts. They may
    /// still point to different subobjects due to `project()`.
    pub fn owner_eq(this: &Self, other: &Self) -> bool {
        this.count.same_block(&other.count)
    }

    /// Raw pointer to the object this `Shared` points at.
    pub fn as_ptr(this: &Self) -> *const T {
        this.ptr.as_ptr()
    }

    /// The counting half of this pointer.
    pub fn shared_count(this: &Self) -> &SharedCount<C> {
        &this.count
    }

    fn ptr(&self) -> &T {
        // Safety: ptr is valid while we hold a strong count, there's just no
        // way to spell the lifetime in Rust.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: ?Sized + 'static, C: Atomicity> Shared<T, C> {
    // Backs `project` on `Rc` and `Arc`, which add their own bounds on `T`.
    pub(crate) fn project_with<U: ?Sized + 'static, F: FnOnce(&T) -> &U>(
        this: Self,
        f: F,
    ) -> Shared<U, C> {
        let ptr = NonNull::from(f(this.ptr()));
        Self::projected(this, ptr)
    }

    pub(crate) fn try_project_with<U: ?Sized + 'static, F: FnOnce(&T) -> Option<&U>>(
        this: Self,
        f: F,
    ) -> Option<Shared<U, C>> {
        let ptr = NonNull::from(f(this.ptr())?);
        Some(Self::projected(this, ptr))
    }

    fn projected<U: ?Sized>(this: Self, ptr: NonNull<U>) -> Shared<U, C> {
        // Move the count into the result so it doesn't adjust the refcount.
        let Shared { count, .. } = this;
        Shared {
            ptr,
            count,
            phantom: PhantomData,
        }
    }
}

impl<T: ?Sized, C: Atomicity> Weak<T, C> {
    /// Promote to a strong pointer, or `None` if the object is gone.
    pub fn upgrade(&self) -> Option<Shared<T, C>> {
        let count = self.count.lock();
        if count.is_empty() {
            None
        } else {
            Some(Shared {
                ptr: self.ptr,
                count,
                phantom: PhantomData,
            })
        }
    }

    /// Like [`upgrade`](Self::upgrade), but an expired object is an error.
    pub fn try_upgrade(&self) -> Result<Shared<T, C>> {
        self.upgrade().ok_or(Error::Expired)
    }

    // Get the current strong count of this pointer
    pub fn strong_count(&self) -> usize {
        self.count.use_count()
    }

    // Get the current number of weak pointers, including this one.
    pub fn weak_count(&self) -> usize {
        self.count.weak_count()
    }

    // Returns true if all strong pointers have been dropped,
    // so `upgrade` will return None.
    pub fn expired(&self) -> bool {
        self.count.expired()
    }

    /// Returns true if both weak pointers observe the same control block.
    pub fn owner_eq(&self, other: &Self) -> bool {
        self.count.same_block(&other.count)
    }
}

impl<T: ?Sized, C: Atomicity> AsRef<T> for Shared<T, C> {
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T: ?Sized, C: Atomicity> borrow::Borrow<T> for Shared<T, C> {
    fn borrow(&self) -> &T {
        self
    }
}

impl<T: ?Sized, C: Atomicity> Clone for Shared<T, C> {
    fn clone(&self) -> Self {
        Shared {
            ptr: self.ptr,
            count: self.count.clone(),
            phantom: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.ptr = source.ptr;
        self.count.clone_from(&source.count);
    }
}

impl<T: ?Sized, C: Atomicity> Clone for Weak<T, C> {
    fn clone(&self) -> Self {
        Weak {
            ptr: self.ptr,
            count: self.count.clone(),
            phantom: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.ptr = source.ptr;
        self.count.clone_from(&source.count);
    }
}

impl<T: Default, C: Atomicity> Default for Shared<T, C> {
    fn default() -> Self {
        Shared::new(T::default())
    }
}

impl<T, C: Atomicity> From<T> for Shared<T, C> {
    fn from(value: T) -> Self {
        Shared::new(value)
    }
}

impl<T: ?Sized, C: Atomicity> From<Box<T>> for Shared<T, C> {
    fn from(value: Box<T>) -> Self {
        Shared::from_box(value)
    }
}

impl<T: ?Sized, C: Atomicity> Deref for Shared<T, C> {
    type Target = T;

    fn deref(&self) -> &T {
        self.ptr()
    }
}

impl<T: ?Sized + PartialEq, C: Atomicity> PartialEq for Shared<T, C> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        *(*self) == *(*other)
    }
}

impl<T: ?Sized + Eq, C: Atomicity> Eq for Shared<T, C> {}

impl<T: ?Sized + PartialOrd, C: Atomicity> PartialOrd for Shared<T, C> {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        (**self).partial_cmp(&**other)
    }
}

impl<T: ?Sized + Ord, C: Atomicity> cmp::Ord for Shared<T, C> {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        (**self).cmp(&**other)
    }
}

impl<T: ?Sized + Hash, C: Atomicity> Hash for Shared<T, C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (**self).hash(state)
    }
}

impl<T: ?Sized + fmt::Display, C: Atomicity> fmt::Display for Shared<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

impl<T: ?Sized + fmt::Debug, C: Atomicity> fmt::Debug for Shared<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: ?Sized, C: Atomicity> fmt::Pointer for Shared<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&(&**self as *const T), f)
    }
}

impl<T: ?Sized, C: Atomicity> fmt::Debug for Weak<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(Weak)")
    }
}
