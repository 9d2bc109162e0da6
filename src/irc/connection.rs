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

//! The shared, cross-thread-visible half of a connection: identity strings
//! the dispatcher and registry touch, the outbound queue, and the notify
//! primitive. The reassembler and any other strictly single-threaded parse
//! state live on the worker's stack instead (see `worker::WorkerState`),
//! since nothing outside that one thread ever reads them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use mio::Waker;
use parking_lot::Mutex;

use crate::irc::queue::{Queue, QueueError};

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

pub struct Connection {
    pub id: u64,
    nickname: Mutex<Option<Vec<u8>>>,
    username: Mutex<String>,
    hostname: String,
    realname: Mutex<String>,
    write_queue: Queue,
    waker: Arc<Waker>,
}

impl Connection {
    pub fn new(hostname: String, queue_capacity: usize, waker: Arc<Waker>) -> Self {
        Connection {
            id: NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed),
            nickname: Mutex::new(None),
            username: Mutex::new(String::new()),
            hostname,
            realname: Mutex::new(String::new()),
            write_queue: Queue::new(queue_capacity),
            waker,
        }
    }

    pub fn nickname(&self) -> Option<Vec<u8>> {
        self.nickname.lock().clone()
    }

    pub fn set_nickname(&self, nick: Vec<u8>) {
        *self.nickname.lock() = Some(nick);
    }

    pub fn clear_nickname(&self) {
        *self.nickname.lock() = None;
    }

    pub fn username(&self) -> String {
        self.username.lock().clone()
    }

    pub fn set_username(&self, username: String) {
        *self.username.lock() = username;
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn realname(&self) -> String {
        self.realname.lock().clone()
    }

    pub fn set_realname(&self, realname: String) {
        *self.realname.lock() = realname;
    }

    /// Enqueues `bytes` for delivery and rings this connection's worker's
    /// doorbell. The queue, not the wakeup, is the durable record of work:
    /// a coalesced or dropped wakeup can never lose a message, only delay
    /// its delivery until the next unrelated wakeup fires.
    pub fn notify(&self, bytes: &[u8]) -> Result<(), QueueError> {
        self.write_queue.enqueue(bytes)?;
        let _ = self.waker.wake();
        Ok(())
    }

    pub fn queue(&self) -> &Queue {
        &self.write_queue
    }
}
