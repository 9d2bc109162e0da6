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

//! Stream reassembler: turns a byte stream from a socket into a sequence of
//! complete, CRLF-terminated messages, one connection's worth of state at a
//! time. Owned by exactly one worker thread; never shared.

use std::io::{self, Read};

use log::warn;

use crate::irc::limits::MAX_MSG_SIZE;

/// Outcome of a single `read_more` call.
pub enum ReadOutcome {
    /// `n` new bytes landed in the buffer.
    Read(usize),
    /// The socket has no more data right now.
    WouldBlock,
    /// The peer closed its write half.
    Eof,
    /// The buffer filled up without ever seeing a terminator; the buffer
    /// was discarded and scanning restarts from empty.
    Overflow,
}

/// Outcome of a single `next_message` call.
#[derive(Debug, PartialEq, Eq)]
pub enum NextMessage {
    /// A complete `...\r\n` message, CRLF included.
    Message(Vec<u8>),
    /// No complete message is buffered yet; read more before calling again.
    Continue,
    /// A bare `\r` or `\n` showed up without its partner immediately
    /// adjacent. The buffer was discarded.
    FinishErr,
}

pub struct Reassembler {
    buf: Vec<u8>,
    capacity: usize,
    write_idx: usize,
    scan_idx: usize,
    msg_begin: usize,
    seen_cr: bool,
    seen_lf: bool,
}

impl Reassembler {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MAX_MSG_SIZE);
        Reassembler {
            buf: vec![0u8; capacity],
            capacity,
            write_idx: 0,
            scan_idx: 0,
            msg_begin: 0,
            seen_cr: false,
            seen_lf: false,
        }
    }

    /// Discards everything scanned so far (a malformed or oversized
    /// message), keeping any bytes already read past that point so a
    /// well-formed message immediately following isn't lost.
    fn reset(&mut self) {
        if self.scan_idx > 0 {
            self.buf.copy_within(self.scan_idx..self.write_idx, 0);
        }
        self.write_idx -= self.scan_idx;
        self.scan_idx = 0;
        self.msg_begin = 0;
        self.seen_cr = false;
        self.seen_lf = false;
    }

    /// Reads more bytes from `socket` into the buffer. Call `next_message`
    /// in a loop after every successful read until it returns `Continue`.
    pub fn read_more<R: Read>(&mut self, socket: &mut R) -> io::Result<ReadOutcome> {
        if self.write_idx == self.capacity {
            warn!("reassembler buffer full at {} bytes, discarding", self.capacity);
            self.reset();
            return Ok(ReadOutcome::Overflow);
        }
        match socket.read(&mut self.buf[self.write_idx..self.capacity]) {
            Ok(0) => Ok(ReadOutcome::Eof),
            Ok(n) => {
                self.write_idx += n;
                Ok(ReadOutcome::Read(n))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(ReadOutcome::WouldBlock),
            Err(e) => Err(e),
        }
    }

    /// Compacts the buffer so the next read has room, moving any partial,
    /// not-yet-terminated message down to offset 0.
    fn compact(&mut self) -> NextMessage {
        if self.msg_begin > 0 {
            self.buf.copy_within(self.msg_begin..self.write_idx, 0);
        }
        self.write_idx -= self.msg_begin;
        self.scan_idx = self.write_idx;
        self.msg_begin = 0;
        NextMessage::Continue
    }

    /// Scans for the next `\r\n`-terminated message in the buffer.
    pub fn next_message(&mut self) -> NextMessage {
        loop {
            if self.scan_idx >= self.write_idx {
                return self.compact();
            }
            let b = self.buf[self.scan_idx];
            self.scan_idx += 1;
            if b == b'\r' {
                self.seen_cr = true;
            }
            if b == b'\n' {
                self.seen_lf = true;
            }
            if self.seen_cr && self.seen_lf {
                let i = self.scan_idx;
                let valid = i - self.msg_begin >= 2
                    && self.buf[i - 2] == b'\r'
                    && self.buf[i - 1] == b'\n';
                if !valid {
                    self.reset();
                    return NextMessage::FinishErr;
                }
                let msg = self.buf[self.msg_begin..i].to_vec();
                self.msg_begin = i;
                self.seen_cr = false;
                self.seen_lf = false;
                return NextMessage::Message(msg);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn drain(r: &mut Reassembler, socket: &mut impl Read) -> Vec<NextMessage> {
        let mut out = Vec::new();
        loop {
            let outcome = r.read_more(socket).unwrap();
            loop {
                match r.next_message() {
                    NextMessage::Continue => break,
                    other => out.push(other),
                }
            }
            match outcome {
                ReadOutcome::Read(_) | ReadOutcome::Overflow => continue,
                ReadOutcome::WouldBlock | ReadOutcome::Eof => break,
            }
        }
        out
    }

    #[test]
    fn single_message() {
        let mut r = Reassembler::new(512);
        let mut socket = Cursor::new(b"PING :abc\r\n".to_vec());
        let msgs = drain(&mut r, &mut socket);
        assert_eq!(msgs, vec![NextMessage::Message(b"PING :abc\r\n".to_vec())]);
    }

    #[test]
    fn two_messages_one_read() {
        let mut r = Reassembler::new(512);
        let mut socket = Cursor::new(b"NICK bob\r\nUSER b 0 * :Bob\r\n".to_vec());
        let msgs = drain(&mut r, &mut socket);
        assert_eq!(
            msgs,
            vec![
                NextMessage::Message(b"NICK bob\r\n".to_vec()),
                NextMessage::Message(b"USER b 0 * :Bob\r\n".to_vec()),
            ]
        );
    }

    #[test]
    fn split_across_reads() {
        struct Chunked(Vec<Vec<u8>>);
        impl Read for Chunked {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.0.is_empty() {
                    return Ok(0);
                }
                let chunk = self.0.remove(0);
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(chunk.len())
            }
        }
        let mut socket = Chunked(vec![b"PIN".to_vec(), b"G :x\r".to_vec(), b"\n".to_vec()]);
        let mut r = Reassembler::new(512);
        let msgs = drain(&mut r, &mut socket);
        assert_eq!(msgs, vec![NextMessage::Message(b"PING :x\r\n".to_vec())]);
    }

    #[test]
    fn reversed_terminator_is_finish_err() {
        let mut r = Reassembler::new(512);
        let mut socket = Cursor::new(b"PING\n\r".to_vec());
        let msgs = drain(&mut r, &mut socket);
        assert_eq!(msgs, vec![NextMessage::FinishErr]);
    }

    #[test]
    fn lone_cr_with_no_lf_is_continue_until_more_data() {
        let mut r = Reassembler::new(512);
        let mut socket = Cursor::new(b"PING\r".to_vec());
        match r.read_more(&mut socket).unwrap() {
            ReadOutcome::Read(_) => {}
            _ => panic!("expected a read"),
        }
        assert_eq!(r.next_message(), NextMessage::Continue);
    }

    #[test]
    fn oversized_message_overflows() {
        let mut r = Reassembler::new(512);
        let mut socket = Cursor::new(vec![b'x'; 600]);
        let msgs = drain(&mut r, &mut socket);
        assert_eq!(msgs, vec![NextMessage::FinishErr]);
    }

    #[test]
    fn post_error_recovery_resumes_clean() {
        let mut r = Reassembler::new(512);
        let mut socket = Cursor::new(b"A\n\rPING :ok\r\n".to_vec());
        let msgs = drain(&mut r, &mut socket);
        assert_eq!(
            msgs,
            vec![
                NextMessage::FinishErr,
                NextMessage::Message(b"PING :ok\r\n".to_vec()),
            ]
        );
    }
}
