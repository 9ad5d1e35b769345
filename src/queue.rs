//! Fixed-item-size FIFO guarded by a single mutex.
//!
//! # Locking
//!
//! Each [`Queue`] owns one mutex covering its item chain, its membership
//! back-reference and its closed flag. Writes and reads on a member queue only
//! take that mutex; the owning set's aggregate count is adjusted with an atomic
//! while the queue mutex is held, so the set mutex is never needed on the item
//! path.
//!
//! When both mutexes are needed (membership changes), the set mutex is always
//! taken first. [`Queue::close`] therefore drops its own guard before asking the
//! set to detach it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::config::QueueConfig;
use crate::notify::Notify;
use crate::set::QueueSet;
use crate::snapshot::Snapshot;
use crate::{Error, Result};

pub struct Queue {
    item_size: usize,
    name: Option<String>,
    notifier: Option<Arc<dyn Notify>>,
    /// Mirror of `state.items.len()`, only written under the mutex.
    count: AtomicUsize,
    state: Mutex<QueueState>,
}

struct QueueState {
    items: VecDeque<Box<[u8]>>,
    membership: Option<Membership>,
    closed: bool,
}

/// Back-reference from a member queue to its set.
pub(crate) struct Membership {
    pub(crate) set: Weak<QueueSet>,
    /// The set's aggregate item count.
    pub(crate) pending: Arc<AtomicUsize>,
    pub(crate) notifier: Option<Arc<dyn Notify>>,
}

impl Queue {
    pub fn open(item_size: usize) -> Result<Arc<Self>> {
        Self::open_with_config(item_size, QueueConfig::default())
    }

    pub fn open_with_config(item_size: usize, config: QueueConfig) -> Result<Arc<Self>> {
        if item_size == 0 {
            return Err(Error::InvalidItemSize);
        }
        let mut items = VecDeque::new();
        items
            .try_reserve_exact(config.initial_capacity)
            .map_err(|_| allocation_failure("queue slots"))?;

        log::debug!(
            "opened queue {} (item_size={item_size}, capacity={})",
            config.name.as_deref().unwrap_or("<anon>"),
            config.initial_capacity
        );
        Ok(Arc::new(Self {
            item_size,
            name: config.name,
            notifier: config.notifier,
            count: AtomicUsize::new(0),
            state: Mutex::new(QueueState {
                items,
                membership: None,
                closed: false,
            }),
        }))
    }

    /// Detaches the queue from its set, if any, and frees every resident item.
    ///
    /// Later writes fail with [`Error::Closed`]; later reads report empty.
    /// Closing an already closed queue does nothing.
    pub fn close(&self) -> Result<()> {
        let owner = {
            let mut state = self.lock()?;
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            state.membership.as_ref().map(|membership| membership.set.clone())
        };

        if let Some(set) = owner.and_then(|set| set.upgrade()) {
            set.remove_queue(self)?;
        }

        let items = {
            let mut state = self.lock()?;
            // Only reachable if the set was torn down before it got to us.
            if let Some(membership) = state.membership.take() {
                membership
                    .pending
                    .fetch_sub(state.items.len(), Ordering::AcqRel);
            }
            self.count.store(0, Ordering::Release);
            std::mem::take(&mut state.items)
        };
        log::debug!("closed queue {} ({} items dropped)", self.label(), items.len());
        Ok(())
    }

    /// Appends one item. `item` must be exactly `item_size` bytes.
    pub fn write(&self, item: &[u8]) -> Result<()> {
        self.check_size(item.len())?;
        let node = alloc_node(item)?;

        let set_notifier = {
            let mut state = self.lock()?;
            if state.closed {
                return Err(Error::Closed);
            }
            state
                .items
                .try_reserve(1)
                .map_err(|_| allocation_failure("queue slot"))?;
            state.items.push_back(node);
            self.count.store(state.items.len(), Ordering::Release);
            state.membership.as_ref().and_then(|membership| {
                membership.pending.fetch_add(1, Ordering::AcqRel);
                membership.notifier.clone()
            })
        };

        if let Some(notifier) = &self.notifier {
            notifier.notify();
        }
        if let Some(notifier) = set_notifier {
            notifier.notify();
        }
        Ok(())
    }

    /// Copies the oldest item into `out` and removes it.
    ///
    /// Returns `Ok(false)` when the queue is empty.
    pub fn read_one(&self, out: &mut [u8]) -> Result<bool> {
        self.check_size(out.len())?;
        let mut state = self.lock()?;
        let Some(node) = self.take_front(&mut state) else {
            return Ok(false);
        };
        out.copy_from_slice(&node);
        Ok(true)
    }

    /// Removes the oldest item and hands over its buffer.
    pub fn pop(&self) -> Result<Option<Box<[u8]>>> {
        let mut state = self.lock()?;
        Ok(self.take_front(&mut state))
    }

    /// Detaches every resident item into a [`Snapshot`] in one step.
    ///
    /// Returns `Ok(None)` when the queue is empty.
    pub fn drain_all(&self) -> Result<Option<Snapshot>> {
        let items = {
            let mut state = self.lock()?;
            if state.items.is_empty() {
                return Ok(None);
            }
            let items = std::mem::take(&mut state.items);
            self.count.store(0, Ordering::Release);
            if let Some(membership) = &state.membership {
                membership.pending.fetch_sub(items.len(), Ordering::AcqRel);
            }
            items
        };
        log::trace!("drained {} items from queue {}", items.len(), self.label());
        Ok(Some(Snapshot::new(self.item_size, items)))
    }

    /// Best-effort number of resident items.
    pub fn item_count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn item_size(&self) -> usize {
        self.item_size
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_member(&self) -> Result<bool> {
        Ok(self.lock()?.membership.is_some())
    }

    pub fn is_closed(&self) -> Result<bool> {
        Ok(self.lock()?.closed)
    }

    /// Links the queue to a set. Caller holds the set mutex.
    ///
    /// Adds the resident items to the set's aggregate count.
    pub(crate) fn attach(&self, membership: Membership) -> Result<()> {
        let mut state = self.lock()?;
        if state.closed {
            return Err(Error::Closed);
        }
        if state.membership.is_some() {
            return Err(Error::AlreadyMember);
        }
        membership
            .pending
            .fetch_add(state.items.len(), Ordering::AcqRel);
        state.membership = Some(membership);
        Ok(())
    }

    /// Unlinks the queue from the set owning `pending`. Caller holds the set mutex.
    ///
    /// Recovers a poisoned queue mutex: no state mutation spans a panic point,
    /// so the chain and count are still consistent.
    pub(crate) fn detach_from(&self, pending: &Arc<AtomicUsize>) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => {
                log::warn!("detaching queue {} with poisoned mutex", self.label());
                poisoned.into_inner()
            }
        };
        let owned_by_set = state
            .membership
            .as_ref()
            .is_some_and(|membership| Arc::ptr_eq(&membership.pending, pending));
        if owned_by_set {
            pending.fetch_sub(state.items.len(), Ordering::AcqRel);
            state.membership = None;
        }
    }

    pub(crate) fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<anon>")
    }

    fn take_front(&self, state: &mut QueueState) -> Option<Box<[u8]>> {
        let node = state.items.pop_front()?;
        self.count.store(state.items.len(), Ordering::Release);
        if let Some(membership) = &state.membership {
            membership.pending.fetch_sub(1, Ordering::AcqRel);
        }
        Some(node)
    }

    fn check_size(&self, len: usize) -> Result<()> {
        if len != self.item_size {
            return Err(Error::ItemSize {
                expected: self.item_size,
                actual: len,
            });
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueState>> {
        self.state
            .lock()
            .map_err(|_| Error::Poisoned("queue mutex"))
    }
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.name)
            .field("item_size", &self.item_size)
            .field("count", &self.item_count())
            .finish()
    }
}

fn alloc_node(item: &[u8]) -> Result<Box<[u8]>> {
    let mut node = Vec::new();
    node.try_reserve_exact(item.len())
        .map_err(|_| allocation_failure("queue node"))?;
    node.extend_from_slice(item);
    Ok(node.into_boxed_slice())
}

fn allocation_failure(what: &'static str) -> Error {
    log::warn!("allocation failed for {what}");
    Error::AllocationFailure(what)
}
