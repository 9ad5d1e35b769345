//! Round-robin fan-in over a group of queues.
//!
//! A [`QueueSet`] lets one consumer serve many client queues fairly. Every read
//! starts at the set's cursor and examines at most `member_count` queues,
//! advancing the cursor once per queue examined whether or not it yielded an
//! item. A queue with pending items is therefore never passed over more than
//! once per round, no matter how writes are distributed.
//!
//! # Locking
//!
//! The set mutex covers the membership list, the cursor and the closed flag.
//! It is held only to pick the next candidate; the read itself holds just the
//! candidate's queue mutex. The aggregate item count is an atomic shared with
//! every member, which the members update themselves.
//!
//! ```text
//!  producers            queues              set               consumer
//!  ─────────►  ┌────────────────┐
//!  ─────────►  │ Queue (client) │──┐
//!              └────────────────┘  │   ┌───────────┐
//!  ─────────►  ┌────────────────┐  ├──►│ QueueSet  │──► read_one / drain_all_one
//!              │ Queue (client) │──┘   │ cursor ─► │
//!              └────────────────┘      └───────────┘
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::notify::Notify;
use crate::queue::{Membership, Queue};
use crate::snapshot::Snapshot;
use crate::{Error, Result};

pub struct QueueSet {
    members: Mutex<Members>,
    member_count: AtomicUsize,
    pending: Arc<AtomicUsize>,
    notifier: Option<Arc<dyn Notify>>,
}

struct Members {
    queues: Vec<Arc<Queue>>,
    /// Index of the next candidate. `None` wraps to the head.
    cursor: Option<usize>,
    closed: bool,
}

impl QueueSet {
    pub fn open() -> Arc<Self> {
        Self::build(None)
    }

    /// Opens a set whose members signal `notifier` on every write, in addition
    /// to their own notifier.
    pub fn with_notifier(notifier: Arc<dyn Notify>) -> Arc<Self> {
        Self::build(Some(notifier))
    }

    fn build(notifier: Option<Arc<dyn Notify>>) -> Arc<Self> {
        Arc::new(Self {
            members: Mutex::new(Members {
                queues: Vec::new(),
                cursor: None,
                closed: false,
            }),
            member_count: AtomicUsize::new(0),
            pending: Arc::new(AtomicUsize::new(0)),
            notifier,
        })
    }

    /// Detaches every member and refuses further additions.
    ///
    /// Members keep their items and may join another set afterwards.
    pub fn close(&self) -> Result<()> {
        let queues = {
            let mut members = self.lock()?;
            members.closed = true;
            members.cursor = None;
            self.member_count.store(0, Ordering::Release);
            let queues = std::mem::take(&mut members.queues);
            // Detach while the set mutex is still held.
            for queue in &queues {
                queue.detach_from(&self.pending);
            }
            queues
        };
        log::debug!("closed queue set ({} members detached)", queues.len());
        Ok(())
    }

    /// Adds `queue` to the set.
    ///
    /// Fails with [`Error::AlreadyMember`] if the queue belongs to any set,
    /// leaving both untouched.
    pub fn add_queue(self: &Arc<Self>, queue: &Arc<Queue>) -> Result<()> {
        let mut members = self.lock()?;
        if members.closed {
            return Err(Error::Closed);
        }
        members
            .queues
            .try_reserve(1)
            .map_err(|_| Error::AllocationFailure("queue set membership"))?;
        queue.attach(Membership {
            set: Arc::downgrade(self),
            pending: Arc::clone(&self.pending),
            notifier: self.notifier.clone(),
        })?;
        members.queues.push(Arc::clone(queue));
        self.member_count
            .store(members.queues.len(), Ordering::Release);
        log::debug!(
            "queue {} joined set ({} members)",
            queue.label(),
            members.queues.len()
        );
        Ok(())
    }

    /// Removes `queue` from the set. Does nothing if it is not a member.
    ///
    /// If the cursor pointed at the removed queue it moves on to its successor.
    pub fn remove_queue(&self, queue: &Queue) -> Result<()> {
        let mut members = self.lock()?;
        let Some(index) = members
            .queues
            .iter()
            .position(|member| std::ptr::eq(member.as_ref(), queue))
        else {
            return Ok(());
        };

        let removed = members.queues.remove(index);
        let remaining = members.queues.len();
        members.cursor = match members.cursor {
            Some(cursor) if cursor > index => Some(cursor - 1),
            Some(cursor) if cursor == index => (index < remaining).then_some(index),
            other => other,
        };
        self.member_count.store(remaining, Ordering::Release);
        removed.detach_from(&self.pending);
        log::debug!(
            "queue {} left set ({remaining} members)",
            removed.label()
        );
        Ok(())
    }

    pub fn member_count(&self) -> usize {
        self.member_count.load(Ordering::Acquire)
    }

    /// Best-effort total of items across all members.
    pub fn item_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn members(&self) -> Result<Vec<Arc<Queue>>> {
        Ok(self.lock()?.queues.clone())
    }

    /// Reads one item from the next member that has one.
    ///
    /// Members whose item size differs from `out.len()` are passed over.
    /// Returns `Ok(false)` when no eligible member had anything, and
    /// [`Error::ItemSize`] when every member examined had the wrong size.
    pub fn read_one(&self, out: &mut [u8]) -> Result<bool> {
        let mut eligible = false;
        let mut mismatch = None;
        let found = self.scan(|queue| {
            if queue.item_size() != out.len() {
                mismatch.get_or_insert(queue.item_size());
                return Ok(None);
            }
            eligible = true;
            Ok(queue.read_one(&mut *out)?.then_some(()))
        })?;
        match (found, mismatch) {
            (Some(()), _) => Ok(true),
            (None, Some(expected)) if !eligible => Err(Error::ItemSize {
                expected,
                actual: out.len(),
            }),
            (None, _) => Ok(false),
        }
    }

    /// Like [`read_one`](Self::read_one), but moves the item out and reports
    /// which member served it.
    pub fn pop(&self) -> Result<Option<(Arc<Queue>, Box<[u8]>)>> {
        self.scan(|queue| Ok(queue.pop()?.map(|item| (Arc::clone(queue), item))))
    }

    /// Drains the whole backlog of the next member that has one.
    pub fn drain_all_one(&self) -> Result<Option<Snapshot>> {
        self.scan(|queue| queue.drain_all())
    }

    pub fn drain_all_one_with_source(&self) -> Result<Option<(Arc<Queue>, Snapshot)>> {
        self.scan(|queue| {
            Ok(queue
                .drain_all()?
                .map(|snapshot| (Arc::clone(queue), snapshot)))
        })
    }

    fn scan<T>(
        &self,
        mut visit: impl FnMut(&Arc<Queue>) -> Result<Option<T>>,
    ) -> Result<Option<T>> {
        let rounds = self.member_count();
        for _ in 0..rounds {
            let Some(queue) = self.next_candidate()? else {
                break;
            };
            if let Some(found) = visit(&queue)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn next_candidate(&self) -> Result<Option<Arc<Queue>>> {
        let mut members = self.lock()?;
        let len = members.queues.len();
        let index = match members.cursor {
            Some(cursor) if cursor < len => cursor,
            _ => 0,
        };
        let Some(queue) = members.queues.get(index).cloned() else {
            members.cursor = None;
            return Ok(None);
        };
        members.cursor = (index + 1 < len).then_some(index + 1);
        Ok(Some(queue))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Members>> {
        self.members
            .lock()
            .map_err(|_| Error::Poisoned("queue set mutex"))
    }
}

impl Drop for QueueSet {
    fn drop(&mut self) {
        let members = match self.members.get_mut() {
            Ok(members) => members,
            Err(poisoned) => poisoned.into_inner(),
        };
        for queue in members.queues.drain(..) {
            queue.detach_from(&self.pending);
        }
    }
}

impl std::fmt::Debug for QueueSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueSet")
            .field("member_count", &self.member_count())
            .field("item_count", &self.item_count())
            .finish()
    }
}
