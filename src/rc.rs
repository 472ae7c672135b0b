//! `sharedptr::rc::Rc<T>` is very similar to `std::rc::Rc<T>`, but with the
//! capabilities of C++'s `shared_ptr`: a custom deleter, and pointers to
//! subobjects that share ownership with the whole.
//!
//! See [`Shared`] for detailed API.
//!
//! ## See also
//!
//! `sharedptr::arc::Arc<T>` in this crate is atomic version for sharing
//! data across threads.
use alloc::boxed::Box;
use core::{cell::Cell, ptr::NonNull};

use crate::{
    block::{BoxDeleter, Deleter},
    count::{private, Atomicity},
    shared::{self, Shared},
};

/// Plain counters for single-threaded use.
pub struct Nonatomic(Cell<usize>);

impl private::Sealed for Nonatomic {}

unsafe impl Atomicity for Nonatomic {
    fn new(v: usize) -> Self {
        Nonatomic(Cell::new(v))
    }

    fn get(&self) -> usize {
        self.0.get()
    }

    fn inc_relaxed(&self) -> usize {
        let i = self.0.get();
        self.0.set(i + 1);
        i
    }

    fn inc_if_nonzero(&self) -> bool {
        let i = self.0.get();
        if i != 0 {
            self.0.set(i + 1);
            true
        } else {
            false
        }
    }

    fn dec(&self) -> usize {
        let i = self.0.get();
        if i != 0 {
            self.0.set(i - 1);
        }
        i
    }

    fn acquire_fence(&self) {}
}

pub type Rc<T> = Shared<T, Nonatomic>;
pub type Weak<T> = shared::Weak<T, Nonatomic>;

impl<T: ?Sized> Shared<T, Nonatomic> {
    /// Take ownership of `ptr`, releasing it with `deleter` when the last
    /// strong reference is dropped.
    ///
    /// # Safety
    ///
    /// `ptr` must stay valid for reads until the deleter runs, and calling
    /// `deleter.delete(ptr)` once must be sound.
    pub unsafe fn from_raw_with_deleter<D>(ptr: NonNull<T>, deleter: D) -> Self
    where
        D: Deleter<T> + 'static,
    {
        Shared::from_raw_parts(ptr, deleter)
    }

    /// Take ownership of a box, handing it to `deleter` instead of dropping
    /// it when the last strong reference is dropped.
    ///
    /// ```
    /// use sharedptr::Rc;
    /// use std::cell::RefCell;
    /// use std::rc::Rc as StdRc;
    ///
    /// let pool: StdRc<RefCell<Vec<Box<[u8]>>>> = Default::default();
    /// let p = pool.clone();
    /// let buf: Rc<[u8]> =
    ///     Rc::from_box_with_deleter(vec![0; 16].into_boxed_slice(), move |b| p.borrow_mut().push(b));
    /// drop(buf);
    /// assert_eq!(pool.borrow().len(), 1);
    /// ```
    pub fn from_box_with_deleter<F>(value: Box<T>, deleter: F) -> Self
    where
        F: FnOnce(Box<T>) + 'static,
    {
        let ptr = NonNull::from(Box::leak(value));
        // Safety: BoxDeleter rebuilds the box we just leaked.
        unsafe { Shared::from_raw_parts(ptr, BoxDeleter(deleter)) }
    }
}

impl<T: ?Sized + 'static> Shared<T, Nonatomic> {
    /// Return an `Rc<U>` for any type U contained within T, e.g. an element
    /// of a slice, or &dyn view of an object. The result shares ownership
    /// with `this`: the whole `T` stays alive until it is dropped.
    ///
    /// ```
    /// use sharedptr::Rc;
    /// let a: Rc<(i32, &str)> = Rc::new((1, "one"));
    /// let b: Rc<str> = Rc::project(a.clone(), |x| x.1);
    /// assert_eq!(&*b, "one");
    /// assert_eq!(Rc::strong_count(&a), 2);
    /// ```
    pub fn project<U: ?Sized + 'static, F: FnOnce(&T) -> &U>(this: Self, f: F) -> Rc<U> {
        Shared::project_with(this, f)
    }

    /// Fallible version of `project()`.
    pub fn try_project<U: ?Sized + 'static, F: FnOnce(&T) -> Option<&U>>(
        this: Self,
        f: F,
    ) -> Option<Rc<U>> {
        Shared::try_project_with(this, f)
    }
}
