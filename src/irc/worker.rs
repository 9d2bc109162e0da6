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

//! One OS thread per connection, each running its own single-threaded
//! cooperative event loop over exactly one socket plus one wakeup source.
//! Three watchers: the socket readable, the socket writable (armed only
//! while there's something queued to send), and the cross-worker wakeup.
//! The only suspension point is the `poll.poll()` call at the top of the
//! loop; everything else runs to completion before looping back to it.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use log::{debug, info, warn};
use mio::net::TcpStream;
use mio::{Events, Interest, Poll, Token, Waker};

use crate::irc::connection::Connection;
use crate::irc::dispatcher::Dispatcher;
use crate::irc::message::Message;
use crate::irc::parser;
use crate::irc::reassembler::{NextMessage, ReadOutcome, Reassembler};
use crate::irc::registry;

const SOCKET: Token = Token(0);
const WAKE: Token = Token(1);

pub struct WorkerConfig {
    pub queue_capacity: usize,
    pub reassembler_capacity: usize,
}

/// In-flight write state: a dequeued message plus how much of it already
/// made it to the socket. Lives on the worker's stack; nothing outside this
/// thread ever needs to see a partial write.
struct PendingWrite {
    buf: Vec<u8>,
    offset: usize,
}

/// Runs one connection to completion: registers its socket and wakeup with
/// a fresh `Poll`, sends the wakeup handle back to the accept loop over
/// `waker_tx` so a coordinated shutdown can ring this worker's doorbell,
/// then loops until EOF, a protocol-fatal error, or `shutdown` is raised.
pub fn run(
    mut stream: TcpStream,
    peer_host: String,
    cfg: Arc<WorkerConfig>,
    dispatcher: Arc<dyn Dispatcher>,
    shutdown: Arc<AtomicBool>,
    waker_tx: Sender<Arc<Waker>>,
) -> io::Result<()> {
    let mut poll = Poll::new()?;
    poll.registry().register(&mut stream, SOCKET, Interest::READABLE)?;

    let waker = Arc::new(Waker::new(poll.registry(), WAKE)?);
    let _ = waker_tx.send(Arc::clone(&waker));

    let conn = Arc::new(Connection::new(peer_host, cfg.queue_capacity, waker));
    let mut reassembler = Reassembler::new(cfg.reassembler_capacity);
    let mut pending: Option<PendingWrite> = None;
    let mut writable_armed = false;
    let mut events = Events::with_capacity(16);

    info!("worker {}: accepted connection from {}", conn.id, conn.hostname());

    'outer: loop {
        poll.poll(&mut events, None)?;

        for event in events.iter() {
            match event.token() {
                SOCKET => {
                    if event.is_readable()
                        && !handle_readable(&mut stream, &mut reassembler, &conn, dispatcher.as_ref())?
                    {
                        break 'outer;
                    }
                    if event.is_writable() {
                        let drained = drain_queue(&mut stream, &conn, &mut pending)?;
                        if drained && writable_armed {
                            poll.registry().reregister(&mut stream, SOCKET, Interest::READABLE)?;
                            writable_armed = false;
                        }
                    }
                }
                WAKE => {
                    if shutdown.load(Ordering::Acquire) {
                        break 'outer;
                    }
                    let drained = drain_queue(&mut stream, &conn, &mut pending)?;
                    if !drained && !writable_armed {
                        poll.registry().reregister(
                            &mut stream,
                            SOCKET,
                            Interest::READABLE | Interest::WRITABLE,
                        )?;
                        writable_armed = true;
                    } else if drained && writable_armed {
                        poll.registry().reregister(&mut stream, SOCKET, Interest::READABLE)?;
                        writable_armed = false;
                    }
                }
                _ => unreachable!("worker poll only registers SOCKET and WAKE"),
            }
        }
    }

    shutdown_connection(&mut stream, &conn, pending);
    Ok(())
}

/// Pulls everything currently available off the socket, running each
/// complete line through the parser and into the dispatcher. Returns
/// `false` on EOF (caller should tear the connection down).
fn handle_readable(
    stream: &mut TcpStream,
    reassembler: &mut Reassembler,
    conn: &Arc<Connection>,
    dispatcher: &dyn Dispatcher,
) -> io::Result<bool> {
    loop {
        let outcome = reassembler.read_more(stream)?;

        loop {
            match reassembler.next_message() {
                NextMessage::Message(raw) => {
                    let body = &raw[..raw.len().saturating_sub(2)];
                    match parser::parse(body) {
                        Ok(parsed) => {
                            let message = Message::from_raw(&parsed);
                            dispatcher.dispatch(conn, &message);
                        }
                        Err(e) => debug!("worker {}: parse error: {}", conn.id, e),
                    }
                }
                NextMessage::FinishErr => {
                    warn!("worker {}: malformed message terminator, buffer reset", conn.id);
                }
                NextMessage::Continue => break,
            }
        }

        match outcome {
            ReadOutcome::Read(_) | ReadOutcome::Overflow => continue,
            ReadOutcome::WouldBlock => return Ok(true),
            ReadOutcome::Eof => return Ok(false),
        }
    }
}

/// Writes as much of the queue to the socket as will go without blocking.
/// Returns `true` once the queue (and any carried-over partial write) is
/// fully drained, `false` if a write returned `WouldBlock` with data left.
fn drain_queue(
    stream: &mut TcpStream,
    conn: &Connection,
    pending: &mut Option<PendingWrite>,
) -> io::Result<bool> {
    loop {
        if pending.is_none() {
            match conn.queue().dequeue() {
                Some(buf) => *pending = Some(PendingWrite { buf, offset: 0 }),
                None => return Ok(true),
            }
        }
        let write = pending.as_mut().unwrap();
        match stream.write(&write.buf[write.offset..]) {
            Ok(0) => return Ok(true),
            Ok(n) => {
                write.offset += n;
                if write.offset >= write.buf.len() {
                    *pending = None;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
            Err(e) => return Err(e),
        }
    }
}

/// Cancellation sequence: stop watching for readability (implicit, since
/// `stream` and `poll` are about to be dropped), flush whatever is left to
/// send on a best-effort basis, deregister from the client registry, then
/// let `conn`'s `Arc` drop, freeing the connection record once the last
/// reference (any in-flight `find_and_apply` handle) goes away.
fn shutdown_connection(stream: &mut TcpStream, conn: &Arc<Connection>, pending: Option<PendingWrite>) {
    if let Some(write) = pending {
        let _ = stream.write_all(&write.buf[write.offset..]);
    }
    conn.queue().drain_each(|bytes| {
        let _ = stream.write_all(&bytes);
    });
    registry::delete(conn);
    info!("worker {}: connection closed", conn.id);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::irc::dispatcher::ReferenceDispatcher;
    use std::net::TcpListener as StdTcpListener;
    use std::net::TcpStream as StdTcpStream;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    /// End-to-end check of the worker loop against a real socket pair: a
    /// background thread runs `worker::run` against the server side of a
    /// loopback connection, a plain std `TcpStream` plays the client.
    #[test]
    fn ping_pong_round_trip() {
        registry::init(crate::irc::limits::MAX_NICK_LENGTH);
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (std_stream, _) = listener.accept().unwrap();
            std_stream.set_nonblocking(true).unwrap();
            let stream = TcpStream::from_std(std_stream);
            let cfg = Arc::new(WorkerConfig {
                queue_capacity: 8,
                reassembler_capacity: 512,
            });
            let dispatcher: Arc<dyn Dispatcher> = Arc::new(ReferenceDispatcher::new("irc.test".to_string()));
            let shutdown = Arc::new(AtomicBool::new(false));
            let (tx, _rx) = mpsc::channel();
            run(stream, "127.0.0.1".to_string(), cfg, dispatcher, shutdown, tx).unwrap();
        });

        let mut client = StdTcpStream::connect(addr).unwrap();
        client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        client.write_all(b"PING :hello\r\n").unwrap();

        let mut buf = [0u8; 256];
        let n = client.read(&mut buf).unwrap();
        let reply = &buf[..n];
        assert_eq!(reply, b":irc.test PONG irc.test :hello\r\n");

        drop(client);
        handle.join().unwrap();
    }
}
