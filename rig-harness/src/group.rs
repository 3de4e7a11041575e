//! Join-group: the barrier between a node and its parallel children.
//!
//! Every node owns one group for its own children, and the suite owns one
//! for root tests. The lifecycle is:
//!
//! ```text
//! child calls parallel()  -> parent's Run returns, child parks on wait_open()
//! parent body returns     -> open(): parked children proceed
//!                         -> drain(): parent waits for every member task
//! ```
//!
//! Because a child's task only finishes after its own group has drained,
//! barriers release bottom-up through the tree.

use parking_lot::Mutex;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::gate::ParallelGate;

/// Panic payload carried out of a test task.
pub(crate) type Panic = Box<dyn Any + Send + 'static>;

/// Parallel members of one level of the test tree.
#[derive(Debug)]
pub struct JoinGroup {
    barrier: watch::Sender<bool>,
    members: Mutex<Vec<JoinHandle<()>>>,
    failed: AtomicBool,
}

impl Default for JoinGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl JoinGroup {
    /// Create a closed, empty group.
    pub fn new() -> Self {
        let (barrier, _) = watch::channel(false);
        Self {
            barrier,
            members: Mutex::new(Vec::new()),
            failed: AtomicBool::new(false),
        }
    }

    /// Register the task of a child that went parallel.
    pub(crate) fn push(&self, member: JoinHandle<()>) {
        self.members.lock().push(member);
    }

    /// Number of registered members not yet drained.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.members.lock().len()
    }

    /// Returns true if no member is waiting to be drained.
    pub fn is_empty(&self) -> bool {
        self.members.lock().is_empty()
    }

    /// Release every member parked on [`JoinGroup::wait_open`].
    pub fn open(&self) {
        self.barrier.send_replace(true);
    }

    /// Returns true once the barrier has been opened.
    pub fn is_open(&self) -> bool {
        *self.barrier.borrow()
    }

    /// Park until the barrier opens. Returns immediately if already open.
    pub async fn wait_open(&self) {
        let mut rx = self.barrier.subscribe();
        // The sender lives as long as `self`, so this cannot observe a close.
        let _ = rx.wait_for(|open| *open).await;
    }

    /// Wait for every member task to finish.
    ///
    /// If a member panicked, the first payload is returned after all members
    /// have finished so the caller can re-raise it.
    pub(crate) async fn drain(&self) -> Option<Panic> {
        let mut first_panic = None;
        loop {
            let batch = std::mem::take(&mut *self.members.lock());
            if batch.is_empty() {
                return first_panic;
            }
            for member in batch {
                if let Err(err) = member.await {
                    if err.is_panic() && first_panic.is_none() {
                        first_panic = Some(err.into_panic());
                    }
                }
            }
        }
    }

    /// Join step run when the owner's body has returned.
    ///
    /// With members present, the owner lends its gate slot out while they
    /// run and takes one back afterwards unless it is itself parallel (a
    /// parallel owner is about to finish and would release it anyway).
    pub(crate) async fn join(&self, gate: &ParallelGate, owner_parallel: bool) -> Option<Panic> {
        if self.is_empty() {
            self.open();
            if owner_parallel {
                gate.release();
            }
            return None;
        }
        gate.release();
        self.open();
        let panic = self.drain().await;
        if !owner_parallel {
            gate.acquire().await;
        }
        panic
    }

    /// Record that a member of this level finished failed.
    pub fn note_failure(&self) {
        self.failed.store(true, Ordering::SeqCst);
    }

    /// Returns true if any member of this level finished failed.
    pub fn has_failure(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }
}
