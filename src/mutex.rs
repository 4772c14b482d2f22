use core::{
    cell::UnsafeCell,
    future::poll_fn,
    ops::{Deref, DerefMut},
    sync::atomic::AtomicBool,
    sync::atomic::Ordering::*,
    task::Poll,
};

/// minimal spin mutex usable from both bare-metal and std executors
pub struct BusyMutex<T> {
    value: UnsafeCell<T>,
    locked: AtomicBool,
}
unsafe impl<T: Send> Sync for BusyMutex<T> {}
unsafe impl<T: Send> Send for BusyMutex<T> {}

impl<T> BusyMutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: value.into(),
            locked: AtomicBool::new(false),
        }
    }
    pub fn try_lock(&self) -> Option<BusyMutexGuard<'_, T>> {
        BusyMutexGuard::try_new(self)
    }
    /// busy polling future until the lock is acquired
    pub async fn lock(&self) -> BusyMutexGuard<'_, T> {
        poll_fn(|context| match BusyMutexGuard::try_new(self) {
            Some(guard) => Poll::Ready(guard),
            None => {
                // reschedule immediately, the holder never keeps it long
                context.waker().wake_by_ref();
                Poll::Pending
            }
        })
        .await
    }
}
impl<T> From<T> for BusyMutex<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

pub struct BusyMutexGuard<'m, T> {
    mutex: &'m BusyMutex<T>,
}
impl<'m, T> BusyMutexGuard<'m, T> {
    fn try_new(mutex: &'m BusyMutex<T>) -> Option<Self> {
        if mutex.locked.swap(true, Acquire) {
            None
        } else {
            Some(Self { mutex })
        }
    }
}
impl<T> Deref for BusyMutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.mutex.value.get() }
    }
}
impl<T> DerefMut for BusyMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.value.get() }
    }
}
impl<T> Drop for BusyMutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.locked.store(false, Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_while_held() {
        let mutex = BusyMutex::new(0u32);
        let guard = mutex.try_lock().unwrap();
        assert!(mutex.try_lock().is_none());
        drop(guard);
        *mutex.try_lock().unwrap() = 1;
        assert_eq!(*mutex.try_lock().unwrap(), 1);
    }
}
