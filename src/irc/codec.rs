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

//! Nickname codec: maps every permitted nickname character to a dense small
//! integer and back, folding RFC 1459 (Scandinavian) case equivalence into
//! the mapping so the trie never has to know about it.
//!
//! Canonical non-letter specials, in id order after the 26 letters:
//! `- [ ] \ `` ^`. `{`, `}` and `|` are accepted input but fold onto
//! `[`, `]` and `\` respectively.

/// Size of the dense alphabet: 26 letters + 6 canonical specials.
pub const ALPHABET_SIZE: usize = 32;

const CANONICAL_SPECIALS: [u8; 6] = [b'-', b'[', b']', b'\\', b'`', b'^'];

/// True iff `c` is one of the characters RFC 1459 permits in a nickname.
pub fn is_valid(c: u8) -> bool {
    c.is_ascii_alphabetic() || matches!(c, b'-' | b'[' | b']' | b'\\' | b'`' | b'^' | b'{' | b'}' | b'|')
}

/// Maps a permitted character to its dense id in `0..ALPHABET_SIZE`.
/// Undefined (panics in debug) if `is_valid(c)` is false.
pub fn char_to_id(c: u8) -> usize {
    match c {
        b'a'..=b'z' => (c - b'a') as usize,
        b'A'..=b'Z' => (c - b'A') as usize,
        b'-' => 26,
        b'[' | b'{' => 27,
        b']' | b'}' => 28,
        b'\\' | b'|' => 29,
        b'`' => 30,
        b'^' => 31,
        _ => unreachable!("char_to_id called on an invalid nickname character: {}", c as char),
    }
}

/// Inverse of [`char_to_id`] on canonical representatives only: it never
/// produces an uppercase letter or a foldable alias (`{`, `}`, `|`).
pub fn id_to_char(id: usize) -> u8 {
    if id < 26 {
        b'a' + id as u8
    } else {
        CANONICAL_SPECIALS[id - 26]
    }
}

/// Canonicalises a single byte the way the trie sees it: lowercase ASCII
/// letters, fold `{`/`}`/`|` onto `[`/`]`/`\`, everything else unchanged.
pub fn canonical_char(c: u8) -> u8 {
    id_to_char(char_to_id(c))
}

/// Canonicalises a whole nickname in place, for comparisons or as a trie key.
pub fn canonicalize(nick: &[u8]) -> Vec<u8> {
    nick.iter().map(|&c| canonical_char(c)).collect()
}

/// Adapts a concrete character set to [`crate::irc::trie::Trie`]. The trie
/// itself never hardcodes the nickname alphabet; this is the seam the design
/// notes ask for so the same trie could index channel names or commands.
pub trait Alphabet {
    const SIZE: usize;
    fn is_valid(c: u8) -> bool;
    fn char_to_id(c: u8) -> usize;
    fn id_to_char(id: usize) -> u8;
}

/// The one alphabet this crate needs: RFC 1459 nicknames.
pub struct Nickname;

impl Alphabet for Nickname {
    const SIZE: usize = ALPHABET_SIZE;

    fn is_valid(c: u8) -> bool {
        is_valid(c)
    }

    fn char_to_id(c: u8) -> usize {
        char_to_id(c)
    }

    fn id_to_char(id: usize) -> u8 {
        id_to_char(id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip_letters() {
        for c in b'a'..=b'z' {
            assert_eq!(id_to_char(char_to_id(c)), c);
        }
        for c in b'A'..=b'Z' {
            assert_eq!(id_to_char(char_to_id(c)), c.to_ascii_lowercase());
        }
    }

    #[test]
    fn round_trip_specials() {
        for &c in &CANONICAL_SPECIALS {
            assert_eq!(id_to_char(char_to_id(c)), c);
        }
    }

    #[test]
    fn scandinavian_folding() {
        assert_eq!(canonical_char(b'{'), b'[');
        assert_eq!(canonical_char(b'}'), b']');
        assert_eq!(canonical_char(b'|'), b'\\');
    }

    #[test]
    fn invalid_rejected() {
        assert!(!is_valid(b'0'));
        assert!(!is_valid(b' '));
        assert!(!is_valid(b'\r'));
    }

    #[test]
    fn canonicalize_mixed_case_and_folds() {
        assert_eq!(canonicalize(b"Bob{"), canonicalize(b"bob["));
        assert_eq!(canonicalize(b"BOB[") , b"bob[");
    }

    #[test]
    fn ids_are_dense_and_bijective() {
        let mut seen = [false; ALPHABET_SIZE];
        for c in (b'a'..=b'z').chain(CANONICAL_SPECIALS.iter().copied()) {
            let id = char_to_id(c);
            assert!(id < ALPHABET_SIZE);
            assert!(!seen[id], "id {} assigned twice", id);
            seen[id] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }
}
