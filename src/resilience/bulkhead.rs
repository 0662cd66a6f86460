//! Concurrency gate with a bounded wait queue.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Semaphore, SemaphorePermit};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{RagError, Result, ValidationError};

/// Bounds the executions in flight against one resilience policy.
///
/// At most `max_parallelization` executions run at once and at most
/// `max_queuing_actions` wait for a slot. An execution arriving when both are
/// full is rejected immediately with [`RagError::BulkheadRejected`].
#[derive(Debug)]
pub struct Bulkhead {
    slots: Semaphore,
    max_parallelization: usize,
    capacity: usize,
    admitted: AtomicUsize,
}

impl Bulkhead {
    /// Creates a bulkhead.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `max_parallelization` is 0; such a
    /// bulkhead would never grant a slot.
    pub fn new(
        max_parallelization: usize,
        max_queuing_actions: usize,
    ) -> std::result::Result<Self, ValidationError> {
        if max_parallelization == 0 {
            return Err(ValidationError::invalid_field(
                "max_parallelization",
                "must be at least 1",
            ));
        }
        Ok(Self {
            slots: Semaphore::new(max_parallelization),
            max_parallelization,
            capacity: max_parallelization.saturating_add(max_queuing_actions),
            admitted: AtomicUsize::new(0),
        })
    }

    /// Executions allowed to run concurrently.
    #[inline]
    pub fn max_parallelization(&self) -> usize {
        self.max_parallelization
    }

    /// Running plus queued executions the bulkhead admits.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Executions currently running.
    pub fn active(&self) -> usize {
        self.max_parallelization - self.slots.available_permits()
    }

    /// Executions currently admitted (running or queued).
    pub fn admitted(&self) -> usize {
        self.admitted.load(Ordering::Acquire)
    }

    /// Admits the caller and waits for a free slot.
    ///
    /// # Errors
    ///
    /// - [`RagError::BulkheadRejected`] if the queue is full
    /// - [`RagError::Cancelled`] if `cancel` fires while waiting
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<BulkheadPermit<'_>> {
        let admission = self.admit()?;

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RagError::Cancelled),
            permit = self.slots.acquire() => permit,
        };
        // The semaphore is owned here and never closed.
        let permit = permit.map_err(|_| RagError::Cancelled)?;

        Ok(BulkheadPermit {
            _permit: permit,
            _admission: admission,
        })
    }

    fn admit(&self) -> Result<Admission<'_>> {
        self.admitted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.capacity).then_some(n + 1)
            })
            .map_err(|admitted| {
                debug!(admitted, capacity = self.capacity, "Bulkhead full");
                RagError::BulkheadRejected {
                    capacity: self.capacity,
                }
            })?;
        Ok(Admission { bulkhead: self })
    }
}

/// Releases the admission count when dropped.
#[derive(Debug)]
struct Admission<'a> {
    bulkhead: &'a Bulkhead,
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        self.bulkhead.admitted.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A running slot in a [`Bulkhead`]. Dropping it frees the slot.
#[derive(Debug)]
pub struct BulkheadPermit<'a> {
    _permit: SemaphorePermit<'a>,
    _admission: Admission<'a>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_permits_count_active_and_admitted() {
        let bulkhead = Bulkhead::new(2, 1).unwrap();
        let cancel = CancellationToken::new();

        let a = bulkhead.acquire(&cancel).await.unwrap();
        let b = bulkhead.acquire(&cancel).await.unwrap();
        assert_eq!(bulkhead.active(), 2);
        assert_eq!(bulkhead.admitted(), 2);

        drop(a);
        assert_eq!(bulkhead.active(), 1);
        assert_eq!(bulkhead.admitted(), 1);
        drop(b);
        assert_eq!(bulkhead.admitted(), 0);
    }

    #[tokio::test]
    async fn test_rejects_beyond_capacity() {
        let bulkhead = Bulkhead::new(1, 0).unwrap();
        let cancel = CancellationToken::new();

        let _held = bulkhead.acquire(&cancel).await.unwrap();
        let err = bulkhead.acquire(&cancel).await.unwrap_err();
        assert!(err.is_bulkhead_rejected());
        assert_eq!(bulkhead.admitted(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_releases_admission() {
        let bulkhead = Bulkhead::new(1, 1).unwrap();
        let cancel = CancellationToken::new();
        let _held = bulkhead.acquire(&cancel).await.unwrap();

        let waiter_cancel = CancellationToken::new();
        waiter_cancel.cancel();
        let err = bulkhead.acquire(&waiter_cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(bulkhead.admitted(), 1);
    }

    #[test]
    fn test_zero_parallelization_rejected() {
        let err = Bulkhead::new(0, 4).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidField { field, .. } if field == "max_parallelization"
        ));
    }
}
