use std::fmt;
use std::sync::Arc;

use crate::notify::Notify;

/// Per-queue options. `item_size` is not part of the config: it is the one
/// thing every queue must be told explicitly.
#[derive(Clone, Default)]
pub struct QueueConfig {
    /// Label used in log lines. Queues are anonymous otherwise.
    pub name: Option<String>,
    /// Item slots reserved when the queue is opened.
    pub initial_capacity: usize,
    /// Signalled after every successful write.
    pub notifier: Option<Arc<dyn Notify>>,
}

impl QueueConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_initial_capacity(mut self, slots: usize) -> Self {
        self.initial_capacity = slots;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notify>) -> Self {
        self.notifier = Some(notifier);
        self
    }
}

impl fmt::Debug for QueueConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueConfig")
            .field("name", &self.name)
            .field("initial_capacity", &self.initial_capacity)
            .field("notifier", &self.notifier.is_some())
            .finish()
    }
}
