//! Counter storage for the control block, generic over atomicity.

/// Trait to distinguish [`Rc<T>`][crate::Rc] from [`Arc<T>`][crate::Arc]. The
/// only implementers are [`Atomic`][crate::Atomic] and [`Nonatomic`][crate::Nonatomic].
///
/// It is `pub` so you can write code that's generic over atomicity, but there's
/// no reason to implement it for any other types.
///
/// # Safety
/// Trait is sealed.
pub unsafe trait Atomicity: private::Sealed {
    #[doc(hidden)]
    fn new(v: usize) -> Self;
    /// Advisory read; does not synchronize with anything.
    #[doc(hidden)]
    fn get(&self) -> usize;
    #[doc(hidden)]
    fn inc_relaxed(&self) -> usize;
    /// Increment unless the count is zero. Returns whether it incremented.
    #[doc(hidden)]
    fn inc_if_nonzero(&self) -> bool;
    /// Decrement and return the previous value. A return of zero means the
    /// count was already zero, which callers treat as a fatal bug.
    #[doc(hidden)]
    fn dec(&self) -> usize;
    #[doc(hidden)]
    fn acquire_fence(&self);
}

#[cold]
#[inline(never)]
pub(crate) fn underflow() -> ! {
    panic!("sharedptr: reference count released below zero (invariant violated)");
}

pub(crate) mod private {
    pub trait Sealed {}
}
