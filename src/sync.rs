//! The lock guarding the metadata cache.
//!
//! [`CacheMutex`] is a mutex with two modes:
//!
//! - [`LockMode::Recursive`] (the default): the owning thread may lock again
//!   while already holding the lock. Cache resolution needs this because a
//!   class loader called under the lock may itself load classes through the
//!   cache.
//! - [`LockMode::Plain`]: a non-reentrant mutex. Locking twice on one thread
//!   deadlocks; only suitable when no loader re-enters the cache.
//!
//! The guard never hands out a long-lived borrow of the protected value.
//! Access goes through [`CacheGuard::read`] and [`CacheGuard::write`], whose
//! borrows end with the closure, so a nested lock on the same thread can
//! borrow the value again while the outer guard is still held. Dropping the
//! guard releases the lock on every exit path, early returns and unwinding
//! included.

use std::cell::RefCell;

use parking_lot::{Mutex, MutexGuard, ReentrantMutex, ReentrantMutexGuard};

/// How a [`CacheMutex`] behaves when its owner locks it again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockMode {
    Plain,
    #[default]
    Recursive,
}

pub struct CacheMutex<T> {
    inner: Inner<T>,
}

enum Inner<T> {
    Plain(Mutex<RefCell<T>>),
    Recursive(ReentrantMutex<RefCell<T>>),
}

impl<T> CacheMutex<T> {
    pub fn new(mode: LockMode, value: T) -> Self {
        let inner = match mode {
            LockMode::Plain => Inner::Plain(Mutex::new(RefCell::new(value))),
            LockMode::Recursive => Inner::Recursive(ReentrantMutex::new(RefCell::new(value))),
        };
        CacheMutex { inner }
    }

    pub fn mode(&self) -> LockMode {
        match self.inner {
            Inner::Plain(_) => LockMode::Plain,
            Inner::Recursive(_) => LockMode::Recursive,
        }
    }

    /// Blocks until the lock is held by the calling thread.
    pub fn lock(&self) -> CacheGuard<'_, T> {
        let kind = match &self.inner {
            Inner::Plain(mutex) => GuardKind::Plain(mutex.lock()),
            Inner::Recursive(mutex) => GuardKind::Recursive(mutex.lock()),
        };
        CacheGuard { kind }
    }
}

impl<T: Default> Default for CacheMutex<T> {
    fn default() -> Self {
        CacheMutex::new(LockMode::default(), T::default())
    }
}

/// Proof that the calling thread holds a [`CacheMutex`].
pub struct CacheGuard<'a, T> {
    kind: GuardKind<'a, T>,
}

enum GuardKind<'a, T> {
    Plain(MutexGuard<'a, RefCell<T>>),
    Recursive(ReentrantMutexGuard<'a, RefCell<T>>),
}

impl<T> CacheGuard<'_, T> {
    fn cell(&self) -> &RefCell<T> {
        match &self.kind {
            GuardKind::Plain(guard) => &**guard,
            GuardKind::Recursive(guard) => &**guard,
        }
    }

    /// Runs `f` with shared access to the protected value.
    ///
    /// # Panics
    ///
    /// If `f` re-enters the same mutex and calls [`write`](Self::write).
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.cell().borrow())
    }

    /// Runs `f` with exclusive access to the protected value.
    ///
    /// # Panics
    ///
    /// If `f` re-enters the same mutex and accesses the value again.
    pub fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.cell().borrow_mut())
    }
}
