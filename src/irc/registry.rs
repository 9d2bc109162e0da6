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

//! Process-wide client registry: a thread-safe nickname -> connection index
//! built on top of the [`crate::irc::trie::Trie`]. Values are `Arc<Connection>`
//! handles rather than raw references, so `find_and_apply` can hand a caller
//! a live handle without holding the registry lock for the duration of the
//! callback: once cloned, the `Arc` keeps the connection alive even if
//! another thread deletes it from the index a moment later.

use std::sync::Arc;

use log::debug;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::irc::codec;
use crate::irc::connection::Connection;
use crate::irc::limits::MAX_NICK_LENGTH;
use crate::irc::trie::{Trie, TrieError};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("nickname is empty, too long, or contains a disallowed character")]
    InvalidNick,
    #[error("a client is already registered under that nickname")]
    AlreadyExists,
    #[error("allocation failure; registry left unmodified")]
    NoMem,
}

impl From<TrieError> for RegistryError {
    fn from(e: TrieError) -> Self {
        match e {
            TrieError::InvalidWord => RegistryError::InvalidNick,
            TrieError::NoMem => RegistryError::NoMem,
        }
    }
}

/// Result of [`find_and_apply`]: distinguishes "no client under that
/// nickname" from "found one, and here is what `f` returned", even when
/// `R` itself has no natural "nothing happened" value.
pub enum Lookup<R> {
    NotFound,
    Found(R),
}

impl<R> Lookup<R> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

struct Inner {
    trie: Trie<Arc<Connection>>,
}

struct Registry {
    inner: Mutex<Inner>,
    max_nick_length: usize,
}

static REGISTRY: OnceCell<Registry> = OnceCell::new();

fn registry() -> &'static Registry {
    REGISTRY
        .get()
        .expect("registry::init must run before any registry operation")
}

/// Brings up the process-wide registry with `max_nick_length` as the
/// enforced nickname length ceiling. Safe to call more than once (later
/// calls are no-ops): the accept loop calls it once at startup, and tests
/// across modules that share this process-wide table each call it too.
pub fn init(max_nick_length: usize) {
    let _ = REGISTRY.set(Registry {
        inner: Mutex::new(Inner { trie: Trie::new() }),
        max_nick_length,
    });
}

/// Clears every entry. Only sound to call once every worker thread that
/// might still touch the registry has already exited: `OnceCell` has no way
/// to un-set itself, so this empties the table in place instead.
pub fn destroy() {
    if let Some(reg) = REGISTRY.get() {
        reg.inner.lock().trie = Trie::new();
    }
}

/// Registers `client` under `nickname`. Does not mutate `client` itself;
/// on success the caller is responsible for recording the nickname on the
/// connection (see `Connection::set_nickname`).
pub fn add(client: &Arc<Connection>, nickname: &[u8]) -> Result<(), RegistryError> {
    let limit = registry().max_nick_length;
    if nickname.is_empty() || nickname.len() > limit {
        return Err(RegistryError::InvalidNick);
    }
    for &c in nickname {
        if !codec::is_valid(c) {
            return Err(RegistryError::InvalidNick);
        }
    }
    let key = codec::canonicalize(nickname);

    let mut inner = registry().inner.lock();
    if inner.trie.lookup(&key).is_some() {
        return Err(RegistryError::AlreadyExists);
    }
    inner.trie.insert(&key, Arc::clone(client))?;
    debug!(
        "registry: added client {} as {:?}",
        client.id,
        String::from_utf8_lossy(nickname)
    );
    Ok(())
}

/// Removes `client`'s current nickname from the index, if it has one.
/// Idempotent: calling this on a client with no registered nickname, or
/// whose nickname was already reassigned to someone else, is a no-op.
pub fn delete(client: &Arc<Connection>) {
    let nick = match client.nickname() {
        Some(n) => n,
        None => return,
    };
    let key = codec::canonicalize(&nick);
    let mut inner = registry().inner.lock();
    let still_owns = matches!(inner.trie.lookup(&key), Some(existing) if Arc::ptr_eq(existing, client));
    if still_owns {
        inner.trie.remove(&key);
        debug!("registry: removed client {}", client.id);
    }
}

/// Looks `nickname` up and, if present, clones its `Arc<Connection>` handle
/// and runs `f` on it after releasing the registry lock. This sidesteps the
/// re-entrancy hazard of calling back into the registry (e.g. for another
/// `NICK` or `PRIVMSG`) while still holding the lock, at the cost of `f`
/// possibly observing a connection that was deleted microseconds earlier;
/// the `Arc` guarantees it still sees a valid, if now-orphaned, value.
pub fn find_and_apply<F, R>(nickname: &[u8], f: F) -> Lookup<R>
where
    F: FnOnce(&Arc<Connection>) -> R,
{
    let key = codec::canonicalize(nickname);
    let handle = {
        let inner = registry().inner.lock();
        inner.trie.lookup(&key).cloned()
    };
    match handle {
        Some(client) => Lookup::Found(f(&client)),
        None => Lookup::NotFound,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use mio::{Poll, Waker};

    fn ensure_init() {
        init(MAX_NICK_LENGTH);
    }

    fn fresh_client() -> Arc<Connection> {
        let poll = Poll::new().unwrap();
        let waker = Arc::new(Waker::new(poll.registry(), mio::Token(0)).unwrap());
        // Leak `poll`: nothing polls it in these tests, and dropping it
        // would invalidate `waker`.
        std::mem::forget(poll);
        Arc::new(Connection::new("test-host".to_string(), 4, waker))
    }

    // These tests share one process-wide `REGISTRY`, so each uses a
    // nickname no other test in this module touches rather than resetting
    // shared state, which would race under the default parallel test runner.

    #[test]
    fn add_then_find() {
        ensure_init();
        let client = fresh_client();
        add(&client, b"zoidberg").unwrap();
        client.set_nickname(b"zoidberg".to_vec());
        let found = find_and_apply(b"ZOIDBERG", |c| c.id);
        match found {
            Lookup::Found(id) => assert_eq!(id, client.id),
            Lookup::NotFound => panic!("expected to find zoidberg"),
        }
    }

    #[test]
    fn duplicate_nick_is_rejected() {
        ensure_init();
        let a = fresh_client();
        let b = fresh_client();
        add(&a, b"fry").unwrap();
        assert_eq!(add(&b, b"fry"), Err(RegistryError::AlreadyExists));
        assert_eq!(add(&b, b"FRY"), Err(RegistryError::AlreadyExists));
    }

    #[test]
    fn invalid_nick_is_rejected() {
        ensure_init();
        let client = fresh_client();
        assert_eq!(add(&client, b""), Err(RegistryError::InvalidNick));
        assert_eq!(add(&client, b"has space"), Err(RegistryError::InvalidNick));
        assert_eq!(
            add(&client, b"waytoolongnickname"),
            Err(RegistryError::InvalidNick)
        );
    }

    #[test]
    fn delete_is_idempotent() {
        ensure_init();
        let client = fresh_client();
        delete(&client); // no nickname yet: no-op
        add(&client, b"bender").unwrap();
        client.set_nickname(b"bender".to_vec());
        delete(&client);
        delete(&client); // already gone: still a no-op
        match find_and_apply(b"bender", |c| c.id) {
            Lookup::NotFound => {}
            Lookup::Found(_) => panic!("bender should have been removed"),
        }
    }

    #[test]
    fn delete_does_not_remove_a_reused_nick() {
        ensure_init();
        let a = fresh_client();
        add(&a, b"leela").unwrap();
        a.set_nickname(b"leela".to_vec());
        delete(&a);
        let b = fresh_client();
        add(&b, b"leela").unwrap();
        b.set_nickname(b"leela".to_vec());
        // `a` no longer owns the nick; deleting it again must not evict `b`.
        delete(&a);
        match find_and_apply(b"leela", |c| c.id) {
            Lookup::Found(id) => assert_eq!(id, b.id),
            Lookup::NotFound => panic!("leela should still resolve to b"),
        }
    }

    #[test]
    fn find_and_apply_not_found() {
        ensure_init();
        match find_and_apply(b"nobodyhome", |_: &Arc<Connection>| ()) {
            Lookup::NotFound => {}
            Lookup::Found(_) => panic!("nobodyhome should not be registered"),
        }
    }
}
