/*!
This crate provides [`Rc`] and [`Arc`], refcounted pointers modelled on C++'s
[`shared_ptr`](https://en.cppreference.com/w/cpp/memory/shared_ptr) rather
than on [`std::rc::Rc`]: the managed object and its counts live in separate
allocations, and the object can be released by any deleter you like.

```rust
    use sharedptr::{Rc, rc::Weak};
    use std::cell::Cell;

    let a: Rc<Cell<i32>> = Rc::new(Cell::new(10));
    let b = a.clone();
    assert_eq!(Rc::strong_count(&a), 2);

    // both handles see the same object
    a.set(11);
    assert_eq!(b.get(), 11);

    let w: Weak<Cell<i32>> = Rc::downgrade(&b);
    drop(a);
    drop(b);

    // the object is gone, but the weak pointer can still ask about it
    assert!(w.expired());
    assert!(w.upgrade().is_none());
```

# The control block

Every object managed by this crate has exactly one control block, allocated
when the first handle is created. It holds:

* the strong count: the number of [`Shared`] pointers (and [`SharedCount`]s)
  keeping the object alive,
* the weak count: the number of [`Weak`] pointers, plus one unit held on
  behalf of all strong pointers together,
* the original pointer and the deleter that will release it, type-erased so
  that handles of any type can share one block representation.

When the strong count reaches zero the deleter runs, exactly once. Then the
unit owned by the strong pointers is released; when the weak count reaches
zero the block itself is freed. The object is always gone before the block is.

# Custom deleters

```
    use sharedptr::Rc;
    use std::cell::RefCell;
    use std::rc::Rc as StdRc;

    let closed: StdRc<RefCell<Vec<String>>> = Default::default();
    let log = closed.clone();

    let file: Rc<String> = Rc::from_box_with_deleter(Box::new("data.bin".to_string()), move |name| {
        log.borrow_mut().push(*name);
    });
    let again = file.clone();
    drop(file);
    assert!(closed.borrow().is_empty());
    drop(again);
    assert_eq!(*closed.borrow(), ["data.bin"]);
```

Raw pointers can be adopted with `Rc::from_raw_with_deleter`, which takes any
[`Deleter`] (including a closure over `NonNull<T>`). The default,
[`DefaultDelete`], simply drops the `Box<T>` the pointer came from.

# Subobjects

Like `shared_ptr`'s aliasing constructor, [`Rc::project`] gives you a
pointer to part of an object that keeps the whole object alive:

```
    use sharedptr::Rc;
    let a: Rc<[i32; 3]> = Rc::new([1, 2, 3]);
    let b: Rc<[i32]> = Rc::project(a.clone(), |x| &x[..]);
    let c: Rc<i32> = Rc::project(b, |x| &x[1]);
    assert_eq!(*c, 2);
    assert!(Rc::owner_eq(&Rc::project(a, |x| &x[1]), &c));
```

`Arc::project` additionally requires the whole object to be `Send + Sync`,
since the last handle to go, wherever it is, drops all of it.

# Misuse

Releasing a count that is already zero can only happen through a bug in
unsafe code built on [`SharedCount`]; it panics rather than freeing anything
twice. Asking an empty [`SharedCount`] for its count is either `0`
([`SharedCount::use_count`]) or [`Error::Empty`]
([`SharedCount::try_use_count`]). Promoting an expired weak pointer gives
`None` from [`Weak::upgrade`] or [`Error::Expired`] from [`Weak::try_upgrade`].

Unlike `std`, overflowing a count by leaking handles does not abort, because
there is no `abort()` in `no_std`.
*/
#![no_std]
#[cfg(test)]
extern crate std;

extern crate alloc;

pub mod arc;
mod block;
mod count;
mod error;
pub mod rc;
pub mod shared;
pub mod shared_count;

pub use self::arc::{Arc, Atomic};
pub use self::block::{DefaultDelete, Deleter};
pub use self::count::Atomicity;
pub use self::error::{Error, Result};
pub use self::rc::{Nonatomic, Rc};
pub use self::shared::{Shared, Weak};
pub use self::shared_count::{SharedCount, WeakCount};
