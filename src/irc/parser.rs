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

//! Pure tokenizer for one already-delimited IRC line (no CRLF, no I/O, no
//! allocation beyond the output `Vec`). Grammar, RFC 1459 section 2.3.1:
//!
//! ```text
//! message    = [ ":" prefix SPACE ] command [ params ] crlf
//! params     = *14( SPACE middle ) [ SPACE ":" trailing ]
//! ```
//!
//! The trailing parameter, introduced by a bare `:`, may contain spaces and
//! always runs to the end of the line.

use crate::irc::limits::MAX_IRC_PARAMS;

#[derive(Debug, PartialEq, Eq)]
pub struct RawMessage<'a> {
    pub prefix: Option<&'a [u8]>,
    pub command: &'a [u8],
    pub params: Vec<&'a [u8]>,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("prefix marker ':' not followed by a prefix")]
    EmptyPrefix,
    #[error("line has no command")]
    MissingCommand,
    #[error("command is neither a 3-digit numeric nor an alphabetic word")]
    InvalidCommand,
    #[error("line carries more than 15 parameters")]
    TooManyParams,
}

fn skip_spaces(line: &[u8], i: &mut usize) {
    while *i < line.len() && line[*i] == b' ' {
        *i += 1;
    }
}

/// Parses one line, with the trailing CRLF already stripped by the caller.
pub fn parse(line: &[u8]) -> Result<RawMessage<'_>, ParseError> {
    let len = line.len();
    let mut i = 0;
    skip_spaces(line, &mut i);

    let mut prefix = None;
    if i < len && line[i] == b':' {
        i += 1;
        let start = i;
        while i < len && line[i] != b' ' {
            i += 1;
        }
        if i == start {
            return Err(ParseError::EmptyPrefix);
        }
        prefix = Some(&line[start..i]);
        skip_spaces(line, &mut i);
    }

    let cmd_start = i;
    if i < len && line[i].is_ascii_digit() {
        let numeric_end = i + 3;
        if numeric_end <= len
            && line[i..numeric_end].iter().all(u8::is_ascii_digit)
            && (numeric_end == len || line[numeric_end] == b' ')
        {
            i = numeric_end;
        } else {
            return Err(ParseError::InvalidCommand);
        }
    } else if i < len && line[i].is_ascii_alphabetic() {
        while i < len && line[i].is_ascii_alphabetic() {
            i += 1;
        }
        if !(i == len || line[i] == b' ') {
            return Err(ParseError::InvalidCommand);
        }
    } else {
        return Err(ParseError::MissingCommand);
    }
    let command = &line[cmd_start..i];
    skip_spaces(line, &mut i);

    let mut params = Vec::new();
    while i < len {
        if line[i] == b':' {
            params.push(&line[i + 1..]);
            break;
        }
        let start = i;
        while i < len && line[i] != b' ' {
            i += 1;
        }
        params.push(&line[start..i]);
        skip_spaces(line, &mut i);
    }
    if params.len() > MAX_IRC_PARAMS {
        return Err(ParseError::TooManyParams);
    }

    Ok(RawMessage {
        prefix,
        command,
        params,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn command_only() {
        let msg = parse(b"PING").unwrap();
        assert_eq!(msg.prefix, None);
        assert_eq!(msg.command, b"PING");
        assert!(msg.params.is_empty());
    }

    #[test]
    fn command_and_params() {
        let msg = parse(b"USER guest 0 * :Ronnie Reagan").unwrap();
        assert_eq!(msg.prefix, None);
        assert_eq!(msg.command, b"USER");
        assert_eq!(msg.params, vec![&b"guest"[..], b"0", b"*", b"Ronnie Reagan"]);
    }

    #[test]
    fn prefixed_message() {
        let msg = parse(b":alice!a@host PRIVMSG #room :hi all").unwrap();
        assert_eq!(msg.prefix, Some(&b"alice!a@host"[..]));
        assert_eq!(msg.command, b"PRIVMSG");
        assert_eq!(msg.params, vec![&b"#room"[..], b"hi all"]);
    }

    #[test]
    fn numeric_command() {
        let msg = parse(b"001 bob :Welcome").unwrap();
        assert_eq!(msg.prefix, None);
        assert_eq!(msg.command, b"001");
        assert_eq!(msg.params, vec![&b"bob"[..], b"Welcome"]);
    }

    #[test]
    fn empty_prefix_is_an_error() {
        assert_eq!(parse(b":   "), Err(ParseError::EmptyPrefix));
    }

    #[test]
    fn empty_line_is_an_error() {
        assert_eq!(parse(b""), Err(ParseError::MissingCommand));
    }

    #[test]
    fn numeric_command_must_be_exactly_three_digits() {
        assert_eq!(parse(b"12 foo"), Err(ParseError::InvalidCommand));
        assert_eq!(parse(b"1234 foo"), Err(ParseError::InvalidCommand));
    }

    #[test]
    fn mixed_alnum_command_is_rejected() {
        assert_eq!(parse(b"P1NG foo"), Err(ParseError::InvalidCommand));
    }

    #[test]
    fn too_many_params_is_rejected() {
        let line = b"CMD 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16";
        assert_eq!(parse(line), Err(ParseError::TooManyParams));
    }

    #[test]
    fn too_many_params_is_rejected_even_with_trailing_param() {
        let line = b"CMD 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 :16";
        assert_eq!(parse(line), Err(ParseError::TooManyParams));
    }

    #[test]
    fn leading_whitespace_is_tolerated() {
        let msg = parse(b"   PING").unwrap();
        assert_eq!(msg.command, b"PING");
    }

    #[test]
    fn trailing_param_can_be_empty() {
        let msg = parse(b"PRIVMSG #a :").unwrap();
        assert_eq!(msg.params, vec![&b"#a"[..], b""]);
    }

    #[test]
    fn middle_param_cannot_start_with_colon_unless_trailing() {
        let msg = parse(b"CMD a b :c d e").unwrap();
        assert_eq!(msg.params, vec![&b"a"[..], b"b", b"c d e"]);
    }
}
