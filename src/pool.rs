//! Bounds on concurrently active transport calls.
//!
//! A slot is held only for the duration of one transport call and is
//! released by dropping its guard, so early returns, panics and dropped
//! futures all give it back.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Semaphore, SemaphorePermit};

use crate::{OilPriceError, Result, TransportError};

/// Connection limits owned by one client for its whole lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolLimits {
    /// Maximum simultaneously active transport calls.
    pub max_total: usize,
    /// Maximum idle keep-alive connections retained by the HTTP stack.
    pub max_idle: usize,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            max_total: 100,
            max_idle: 20,
        }
    }
}

impl PoolLimits {
    pub fn new(max_total: usize, max_idle: usize) -> Self {
        Self {
            max_total,
            max_idle,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_total == 0 {
            return Err(OilPriceError::Configuration(
                "max_total connections must be at least 1".to_owned(),
            ));
        }
        if self.max_idle > self.max_total {
            return Err(OilPriceError::Configuration(format!(
                "max_idle ({}) cannot exceed max_total ({})",
                self.max_idle, self.max_total
            )));
        }
        Ok(())
    }
}

/// Slot counter for the blocking executor.
#[derive(Debug)]
pub(crate) struct BlockingSlots {
    capacity: usize,
    in_use: Mutex<usize>,
    released: Condvar,
}

/// Returns its slot when dropped.
#[derive(Debug)]
pub(crate) struct SlotGuard<'a> {
    slots: &'a BlockingSlots,
}

impl BlockingSlots {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            in_use: Mutex::new(0),
            released: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.in_use.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks the calling thread until a slot is free.
    pub(crate) fn acquire(&self) -> SlotGuard<'_> {
        let mut in_use = self.lock();
        while *in_use >= self.capacity {
            in_use = self
                .released
                .wait(in_use)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *in_use += 1;
        SlotGuard { slots: self }
    }

    pub(crate) fn in_use(&self) -> usize {
        *self.lock()
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let mut in_use = self.slots.lock();
        *in_use = in_use.saturating_sub(1);
        drop(in_use);
        self.slots.released.notify_one();
    }
}

/// Slot semaphore for the async executor. Waiting tasks yield to the
/// runtime instead of blocking it.
#[derive(Debug)]
pub(crate) struct AsyncSlots {
    capacity: usize,
    semaphore: Semaphore,
}

impl AsyncSlots {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            semaphore: Semaphore::new(capacity),
        }
    }

    /// Fails only on a closed semaphore. Nothing in the crate closes it.
    pub(crate) async fn acquire(&self) -> std::result::Result<SemaphorePermit<'_>, TransportError> {
        self.semaphore
            .acquire()
            .await
            .map_err(|err| TransportError::Other(err.to_string()))
    }

    pub(crate) fn in_use(&self) -> usize {
        self.capacity
            .saturating_sub(self.semaphore.available_permits())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::{AsyncSlots, BlockingSlots, PoolLimits, TransportError};
    use crate::OilPriceError;

    #[test]
    fn limits_validation() {
        assert!(PoolLimits::default().validate().is_ok());
        assert!(matches!(
            PoolLimits::new(0, 0).validate(),
            Err(OilPriceError::Configuration(_))
        ));
        assert!(PoolLimits::new(5, 6).validate().is_err());
        assert!(PoolLimits::new(5, 5).validate().is_ok());
    }

    #[test]
    fn blocking_slots_never_exceed_capacity() {
        let slots = Arc::new(BlockingSlots::new(3));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let slots = Arc::clone(&slots);
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                thread::spawn(move || {
                    let _slot = slots.acquire();
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker must not panic");
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(slots.in_use(), 0);
    }

    #[test]
    fn blocking_slot_is_released_on_panic() {
        let slots = Arc::new(BlockingSlots::new(1));
        let worker = Arc::clone(&slots);
        let result = thread::spawn(move || {
            let _slot = worker.acquire();
            panic!("transport blew up");
        })
        .join();
        assert!(result.is_err());
        assert_eq!(slots.in_use(), 0);
        let _slot = slots.acquire();
        assert_eq!(slots.in_use(), 1);
    }

    #[tokio::test]
    async fn async_permit_is_returned_on_drop() {
        let slots = AsyncSlots::new(2);
        let first = slots.acquire().await.expect("permit");
        assert_eq!(slots.in_use(), 1);
        drop(first);
        assert_eq!(slots.in_use(), 0);
    }

    #[tokio::test]
    async fn closed_semaphore_is_an_unclassified_transport_failure() {
        let slots = AsyncSlots::new(1);
        slots.semaphore.close();

        let err = slots.acquire().await.expect_err("closed slots must refuse");

        assert!(matches!(err, TransportError::Other(_)));
        assert!(crate::classify::classify_transport(&err).is_none());
    }
}
