//! A module which decides which synchronization primitives to use throughout the rest of the crate
//! depending on features and configuration options

cfg_if::cfg_if! {
    if #[cfg(loom)] {
        pub(crate) use loom::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
        pub(crate) use loom::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
        pub(crate) use loom::thread;
    } else if #[cfg(feature = "shuttle")] {
        pub(crate) use shuttle::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
        pub(crate) use shuttle::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
        pub(crate) use shuttle::thread;
    } else {
        pub(crate) use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
        pub(crate) use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
        pub(crate) use std::thread;
    }
}

/// Lock `mutex`, recovering the guard if a panicking worker poisoned it.
///
/// A worker which panics aborts the whole run, so the data behind a poisoned lock is never used to
/// resume a superstep.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn read<T>(rw_lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    rw_lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn write<T>(rw_lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    rw_lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One iteration of a busy-wait loop.
///
/// The model checkers only make progress when a spinning thread yields, so they get a yield
/// instead of a pause instruction.
#[inline]
pub(crate) fn spin_loop() {
    cfg_if::cfg_if! {
        if #[cfg(any(loom, feature = "shuttle"))] {
            thread::yield_now();
        } else {
            core::hint::spin_loop();
        }
    }
}
