//! Open/closed lifecycle guarding a backend handle.
//!
//! Every operation runs under a shared read guard, so many run concurrently.
//! `close` takes the exclusive guard: it waits for in-flight operations, then
//! takes the handle out. Afterwards every operation fails fast with the
//! caller's shutdown error without touching the backend.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Errors that have a "shutting down" variant.
pub trait ShutdownError {
    fn shutdown() -> Self;
}

impl ShutdownError for crate::StoreError {
    fn shutdown() -> Self {
        crate::StoreError::Shutdown
    }
}

pub struct Lifecycle<T> {
    inner: RwLock<Option<T>>,
}

impl<T> Lifecycle<T> {
    pub fn new(handle: T) -> Self {
        Self {
            inner: RwLock::new(Some(handle)),
        }
    }

    // A panic inside an operation must not wedge the store; the handle itself
    // is never left half-updated by this type.
    fn read(&self) -> RwLockReadGuard<'_, Option<T>> {
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<T>> {
        self.inner.write().unwrap_or_else(|p| p.into_inner())
    }

    /// Runs `f` against the open handle, or returns the shutdown error.
    pub fn with<R, E, F>(&self, f: F) -> Result<R, E>
    where
        E: ShutdownError,
        F: FnOnce(&T) -> Result<R, E>,
    {
        let guard = self.read();
        match guard.as_ref() {
            Some(handle) => f(handle),
            None => Err(E::shutdown()),
        }
    }

    /// Marks the lifecycle closed and hands back the handle for release.
    /// Returns `None` if it was already closed.
    pub fn close(&self) -> Option<T> {
        self.write().take()
    }

    pub fn is_closed(&self) -> bool {
        self.read().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;

    #[test]
    fn operations_fail_after_close() {
        let lc = Lifecycle::new(5u32);
        let v: Result<u32, StoreError> = lc.with(|h| Ok(*h + 1));
        assert_eq!(v.unwrap(), 6);

        assert_eq!(lc.close(), Some(5));
        assert!(lc.is_closed());
        let after: Result<u32, StoreError> = lc.with(|h| Ok(*h));
        assert!(matches!(after, Err(StoreError::Shutdown)));
        assert_eq!(lc.close(), None);
    }
}
