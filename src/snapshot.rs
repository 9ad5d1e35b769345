//! Detached batch of items produced by a bulk drain.
//!
//! A [`Snapshot`] owns the node chain it was handed by
//! [`Queue::drain_all`](crate::Queue::drain_all) or
//! [`QueueSet::drain_all_one`](crate::QueueSet::drain_all_one). It holds no lock
//! and has no link back to the queue it came from, so a consumer can walk a
//! whole backlog after a single lock/unlock pair on the source queue.

use std::collections::VecDeque;

use crate::{Error, Result};

pub struct Snapshot {
    item_size: usize,
    items: VecDeque<Box<[u8]>>,
    cursor: usize,
}

impl Snapshot {
    pub(crate) fn new(item_size: usize, items: VecDeque<Box<[u8]>>) -> Self {
        Self {
            item_size,
            items,
            cursor: 0,
        }
    }

    /// Copies the item under the cursor into `out` and advances.
    ///
    /// Returns `Ok(false)` once every item has been visited; call [`reset`](Self::reset)
    /// for another pass.
    pub fn next(&mut self, out: &mut [u8]) -> Result<bool> {
        if out.len() != self.item_size {
            return Err(Error::ItemSize {
                expected: self.item_size,
                actual: out.len(),
            });
        }
        let Some(item) = self.items.get(self.cursor) else {
            return Ok(false);
        };
        out.copy_from_slice(item);
        self.cursor += 1;
        Ok(true)
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Consumes the snapshot. The nodes are freed when the value drops here;
    /// letting a snapshot go out of scope is equivalent.
    pub fn release(self) {
        log::trace!("releasing snapshot of {} items", self.items.len());
    }

    /// Item count at the time of the drain.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// Items left before the cursor is exhausted.
    pub fn remaining(&self) -> usize {
        self.items.len() - self.cursor
    }

    /// Borrows every item in order, independent of the cursor.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &[u8]> + '_ {
        self.items.iter().map(|item| &item[..])
    }
}

impl IntoIterator for Snapshot {
    type Item = Box<[u8]>;
    type IntoIter = std::collections::vec_deque::IntoIter<Box<[u8]>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("item_size", &self.item_size)
            .field("len", &self.items.len())
            .field("cursor", &self.cursor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_of(values: &[u64]) -> Snapshot {
        let items = values
            .iter()
            .map(|value| value.to_le_bytes().to_vec().into_boxed_slice())
            .collect();
        Snapshot::new(8, items)
    }

    #[test]
    fn next_walks_in_order_then_reports_empty() {
        let mut snapshot = snapshot_of(&[7, 8, 9]);
        let mut buf = [0u8; 8];
        let mut seen = Vec::new();
        while snapshot.next(&mut buf).expect("next") {
            seen.push(u64::from_le_bytes(buf));
        }
        assert_eq!(seen, vec![7, 8, 9]);
        assert_eq!(snapshot.remaining(), 0);
        assert!(!snapshot.next(&mut buf).expect("exhausted"));
    }

    #[test]
    fn reset_allows_a_second_pass() {
        let mut snapshot = snapshot_of(&[1, 2]);
        let mut buf = [0u8; 8];
        assert!(snapshot.next(&mut buf).expect("first"));
        assert!(snapshot.next(&mut buf).expect("second"));
        snapshot.reset();
        assert_eq!(snapshot.remaining(), 2);
        assert!(snapshot.next(&mut buf).expect("again"));
        assert_eq!(u64::from_le_bytes(buf), 1);
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn next_rejects_wrong_buffer_size() {
        let mut snapshot = snapshot_of(&[1]);
        let mut buf = [0u8; 4];
        let err = snapshot.next(&mut buf).expect_err("short buffer");
        assert!(matches!(
            err,
            Error::ItemSize {
                expected: 8,
                actual: 4
            }
        ));
        assert_eq!(snapshot.remaining(), 1);
    }

    #[test]
    fn iter_borrows_without_moving_cursor() {
        let snapshot = snapshot_of(&[3, 4]);
        let values: Vec<u64> = snapshot
            .iter()
            .map(|item| u64::from_le_bytes(item.try_into().expect("8 bytes")))
            .collect();
        assert_eq!(values, vec![3, 4]);
        assert_eq!(snapshot.remaining(), 2);
    }

    #[test]
    fn reports_item_size_and_emptiness() {
        let snapshot = snapshot_of(&[1]);
        assert_eq!(snapshot.item_size(), 8);
        assert!(!snapshot.is_empty());

        let empty = Snapshot::new(8, VecDeque::new());
        assert!(empty.is_empty());
        assert_eq!(empty.len(), 0);
    }
}
