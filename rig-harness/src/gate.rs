//! Cap on the number of test bodies running at once.

use tokio::sync::Semaphore;

/// Counting gate shared by all nodes of a run.
///
/// The suite's own sequential driver holds one slot from the start. A
/// sequential subtest runs on its parent's slot; a parallel subtest takes a
/// slot once its barrier opens and gives it back when it completes. A node
/// that waits on parallel children lends its slot out for the duration.
#[derive(Debug)]
pub struct ParallelGate {
    permits: Semaphore,
    max: usize,
}

impl ParallelGate {
    /// Allow at most `max` bodies at once (clamped to at least 1).
    ///
    /// The caller is considered to already hold one slot.
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            permits: Semaphore::new(max - 1),
            max,
        }
    }

    /// Wait for a free slot and take it.
    pub async fn acquire(&self) {
        // The semaphore is never closed, so acquire cannot fail.
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
    }

    /// Give a slot back, waking the longest waiter if any.
    pub fn release(&self) {
        self.permits.add_permits(1);
    }

    /// Configured maximum.
    pub fn max(&self) -> usize {
        self.max
    }

    /// Slots currently held.
    pub fn in_use(&self) -> usize {
        self.max.saturating_sub(self.permits.available_permits())
    }
}
