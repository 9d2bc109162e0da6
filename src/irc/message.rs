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

//! Owned copy of a parsed message. `parser::RawMessage` borrows from the
//! reassembler's buffer, which gets reused on the very next read; this is
//! the value that actually crosses into dispatch.

use crate::irc::parser::RawMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl Message {
    pub fn from_raw(raw: &RawMessage) -> Self {
        Message {
            prefix: raw.prefix.map(|p| String::from_utf8_lossy(p).into_owned()),
            command: String::from_utf8_lossy(raw.command).into_owned(),
            params: raw
                .params
                .iter()
                .map(|p| String::from_utf8_lossy(p).into_owned())
                .collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::irc::parser::parse;

    #[test]
    fn copies_every_field() {
        let raw = parse(b":a!b@c PRIVMSG #r :hi there").unwrap();
        let msg = Message::from_raw(&raw);
        assert_eq!(msg.prefix.as_deref(), Some("a!b@c"));
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["#r".to_string(), "hi there".to_string()]);
    }
}
