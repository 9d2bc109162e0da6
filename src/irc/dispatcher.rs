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

//! The seam between a parsed [`Message`] and whatever the rest of the
//! server wants to do with it. The worker event loop only knows how to call
//! `dispatch`; everything IRC-command-shaped lives on this side of that
//! boundary. `ReferenceDispatcher` implements just enough of RFC 1459 to
//! prove the core components out end to end: NICK, USER, PING, QUIT,
//! PRIVMSG/NOTICE, and an ERR_UNKNOWNCOMMAND fallback. Channels, modes and
//! operator commands are a different, larger dispatcher built on the same
//! trait.

use std::sync::Arc;

use log::debug;

use crate::irc::connection::Connection;
use crate::irc::message::Message;
use crate::irc::numerics;
use crate::irc::registry::{self, Lookup, RegistryError};

pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, conn: &Arc<Connection>, msg: &Message);
}

fn numeric_reply(server: &str, code: &str, target: &str, rest: &str) -> Vec<u8> {
    format!(":{} {} {} {}\r\n", server, code, target, rest).into_bytes()
}

fn send_numeric(server: &str, conn: &Arc<Connection>, code: &str, rest: &str) {
    let target = conn.nickname().map_or_else(|| "*".to_string(), |n| String::from_utf8_lossy(&n).into_owned());
    let line = numeric_reply(server, code, &target, rest);
    let _ = conn.notify(&line);
}

pub struct ReferenceDispatcher {
    server_name: String,
}

impl ReferenceDispatcher {
    pub fn new(server_name: String) -> Self {
        ReferenceDispatcher { server_name }
    }

    fn handle_nick(&self, conn: &Arc<Connection>, msg: &Message) {
        let nick = match msg.params.first() {
            Some(n) if !n.is_empty() => n.as_bytes(),
            _ => {
                send_numeric(&self.server_name, conn, numerics::ERR_NONICKNAMEGIVEN, ":No nickname given");
                return;
            }
        };

        let had_previous = conn.nickname();
        if had_previous.is_some() {
            registry::delete(conn);
        }
        match registry::add(conn, nick) {
            Ok(()) => conn.set_nickname(nick.to_vec()),
            Err(RegistryError::AlreadyExists) => {
                // Restore the old registration rather than leave the client
                // silently deregistered.
                if let Some(old) = had_previous {
                    let _ = registry::add(conn, &old);
                }
                send_numeric(
                    &self.server_name,
                    conn,
                    numerics::ERR_NICKNAMEINUSE,
                    &format!("{} :Nickname is already in use", String::from_utf8_lossy(nick)),
                );
            }
            Err(_) => {
                if let Some(old) = had_previous {
                    let _ = registry::add(conn, &old);
                }
                send_numeric(
                    &self.server_name,
                    conn,
                    numerics::ERR_ERRONEUSNICKNAME,
                    &format!("{} :Erroneous nickname", String::from_utf8_lossy(nick)),
                );
            }
        }
    }

    fn handle_user(&self, conn: &Arc<Connection>, msg: &Message) {
        if msg.params.len() < 4 {
            send_numeric(&self.server_name, conn, numerics::ERR_NEEDMOREPARAMS, "USER :Not enough parameters");
            return;
        }
        conn.set_username(msg.params[0].clone());
        conn.set_realname(msg.params[3].clone());
        if conn.nickname().is_some() {
            let welcome = format!(":Welcome to the Internet Relay Network {}", conn.username());
            send_numeric(&self.server_name, conn, numerics::RPL_WELCOME, &welcome);
        }
    }

    fn handle_ping(&self, conn: &Arc<Connection>, msg: &Message) {
        let token = msg.params.first().cloned().unwrap_or_default();
        let line = format!(":{} PONG {} :{}\r\n", self.server_name, self.server_name, token);
        let _ = conn.notify(line.as_bytes());
    }

    fn handle_quit(&self, conn: &Arc<Connection>, _msg: &Message) {
        debug!("connection {} sent QUIT", conn.id);
        // No explicit socket teardown here: the client closing its end
        // surfaces as EOF on the next readable poll, which is where the
        // worker runs the actual shutdown sequence.
    }

    fn handle_privmsg_or_notice(&self, conn: &Arc<Connection>, msg: &Message) {
        let target = match msg.params.first() {
            Some(t) if !t.is_empty() => t,
            _ => {
                send_numeric(&self.server_name, conn, numerics::ERR_NORECIPIENT, &format!("{} :No recipient given", msg.command));
                return;
            }
        };
        let text = match msg.params.get(1) {
            Some(t) if !t.is_empty() => t,
            _ => {
                send_numeric(&self.server_name, conn, numerics::ERR_NOTEXTTOSEND, ":No text to send");
                return;
            }
        };

        let from = conn.nickname().map_or_else(|| "*".to_string(), |n| String::from_utf8_lossy(&n).into_owned());
        let line = format!(":{} {} {} :{}\r\n", from, msg.command, target, text);

        let result = registry::find_and_apply(target.as_bytes(), |peer| peer.notify(line.as_bytes()));
        if !result.is_found() {
            send_numeric(
                &self.server_name,
                conn,
                numerics::ERR_NOSUCHNICK,
                &format!("{} :No such nick/channel", target),
            );
        }
    }

    fn handle_unknown(&self, conn: &Arc<Connection>, msg: &Message) {
        send_numeric(
            &self.server_name,
            conn,
            numerics::ERR_UNKNOWNCOMMAND,
            &format!("{} :Unknown command", msg.command),
        );
    }
}

impl Dispatcher for ReferenceDispatcher {
    fn dispatch(&self, conn: &Arc<Connection>, msg: &Message) {
        match msg.command.to_ascii_uppercase().as_str() {
            "NICK" => self.handle_nick(conn, msg),
            "USER" => self.handle_user(conn, msg),
            "PING" => self.handle_ping(conn, msg),
            "QUIT" => self.handle_quit(conn, msg),
            "PRIVMSG" | "NOTICE" => self.handle_privmsg_or_notice(conn, msg),
            _ => self.handle_unknown(conn, msg),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use mio::{Poll, Waker};

    fn test_conn(name: &str) -> Arc<Connection> {
        let poll = Poll::new().unwrap();
        let waker = Arc::new(Waker::new(poll.registry(), mio::Token(0)).unwrap());
        std::mem::forget(poll);
        Arc::new(Connection::new(name.to_string(), 8, waker))
    }

    fn msg(command: &str, params: &[&str]) -> Message {
        Message {
            prefix: None,
            command: command.to_string(),
            params: params.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn nick_registers_and_then_replies_in_use_on_conflict() {
        crate::irc::registry::init(crate::irc::limits::MAX_NICK_LENGTH);
        let d = ReferenceDispatcher::new("irc.test".to_string());
        let a = test_conn("a");
        let b = test_conn("b");
        d.dispatch(&a, &msg("NICK", &["dispatchera"]));
        assert_eq!(a.nickname(), Some(b"dispatchera".to_vec()));

        d.dispatch(&b, &msg("NICK", &["dispatchera"]));
        assert_eq!(b.nickname(), None);
        assert!(!b.queue().is_empty());
    }

    #[test]
    fn ping_replies_with_pong() {
        let d = ReferenceDispatcher::new("irc.test".to_string());
        let conn = test_conn("c");
        d.dispatch(&conn, &msg("PING", &["abc123"]));
        let reply = conn.queue().dequeue().unwrap();
        assert_eq!(reply, b":irc.test PONG irc.test :abc123\r\n".to_vec());
    }

    #[test]
    fn unknown_command_gets_421() {
        let d = ReferenceDispatcher::new("irc.test".to_string());
        let conn = test_conn("d");
        d.dispatch(&conn, &msg("FROBNICATE", &[]));
        let reply = conn.queue().dequeue().unwrap();
        assert!(reply.starts_with(b":irc.test 421 "));
    }

    #[test]
    fn privmsg_to_missing_target_gets_401() {
        crate::irc::registry::init(crate::irc::limits::MAX_NICK_LENGTH);
        let d = ReferenceDispatcher::new("irc.test".to_string());
        let conn = test_conn("e");
        d.dispatch(&conn, &msg("PRIVMSG", &["nosuchdispatchertarget", "hi"]));
        let reply = conn.queue().dequeue().unwrap();
        assert!(reply.starts_with(b":irc.test 401 "));
    }
}
