// Copyright (C) 2021  Anthony DeDominic <adedomin@gmail.com>

// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

//! Per-connection bounded outbound queue. `VecDeque` already is the ring
//! buffer the design calls for; this type just adds the capacity bound, the
//! mutex, and the explicit error surface for backpressure.

use std::collections::VecDeque;

use parking_lot::Mutex;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is full")]
    Full,
    #[error("allocation failure; queue left unmodified")]
    NoMem,
}

pub struct Queue {
    capacity: usize,
    inner: Mutex<VecDeque<Vec<u8>>>,
}

impl Queue {
    pub fn new(capacity: usize) -> Self {
        Queue {
            capacity,
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Copies `data` into the queue if there is room. FIFO: order of
    /// successful `enqueue` calls is the order `dequeue` returns them in.
    pub fn enqueue(&self, data: &[u8]) -> Result<(), QueueError> {
        let mut inner = self.inner.lock();
        if inner.len() >= self.capacity {
            return Err(QueueError::Full);
        }
        let mut owned = Vec::new();
        owned
            .try_reserve_exact(data.len())
            .map_err(|_| QueueError::NoMem)?;
        owned.extend_from_slice(data);
        inner.push_back(owned);
        Ok(())
    }

    /// Removes and returns the oldest entry, transferring ownership.
    pub fn dequeue(&self) -> Option<Vec<u8>> {
        self.inner.lock().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Atomically removes every queued entry and hands each to `f` in FIFO
    /// order. Used for best-effort draining on shutdown.
    pub fn drain_each<F: FnMut(Vec<u8>)>(&self, mut f: F) {
        let drained = std::mem::take(&mut *self.inner.lock());
        for item in drained {
            f(item);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fifo_order() {
        let q = Queue::new(4);
        q.enqueue(b"a").unwrap();
        q.enqueue(b"b").unwrap();
        q.enqueue(b"c").unwrap();
        assert_eq!(q.dequeue(), Some(b"a".to_vec()));
        assert_eq!(q.dequeue(), Some(b"b".to_vec()));
        assert_eq!(q.dequeue(), Some(b"c".to_vec()));
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn full_queue_rejects_without_mutating() {
        let q = Queue::new(2);
        q.enqueue(b"a").unwrap();
        q.enqueue(b"b").unwrap();
        assert_eq!(q.enqueue(b"c"), Err(QueueError::Full));
        assert_eq!(q.len(), 2);
        assert_eq!(q.dequeue(), Some(b"a".to_vec()));
        assert_eq!(q.dequeue(), Some(b"b".to_vec()));
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn is_empty_tracks_state() {
        let q = Queue::new(4);
        assert!(q.is_empty());
        q.enqueue(b"x").unwrap();
        assert!(!q.is_empty());
        q.dequeue();
        assert!(q.is_empty());
    }

    #[test]
    fn drain_each_empties_in_order() {
        let q = Queue::new(8);
        for b in [&b"1"[..], b"2", b"3"] {
            q.enqueue(b).unwrap();
        }
        let mut seen = Vec::new();
        q.drain_each(|item| seen.push(item));
        assert_eq!(seen, vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]);
        assert!(q.is_empty());
    }
}
