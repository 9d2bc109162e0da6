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

//! RFC 1459 wire limits shared by the reassembler, parser and registry.

/// Total message length including the trailing CRLF.
pub const MAX_MSG_SIZE: usize = 512;
/// Maximum number of space-separated parameters a message may carry.
pub const MAX_IRC_PARAMS: usize = 15;
/// Maximum nickname length; RFC 1459 servers are free to be stricter, never
/// looser, without breaking clients, so this is a hard ceiling.
pub const MAX_NICK_LENGTH: usize = 9;
/// Numeric replies are always exactly three ASCII digits.
pub const NUMERIC_WIDTH: usize = 3;
/// Default outbound queue depth (Q in the design doc).
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
/// Default reassembler buffer capacity (C in the design doc); must be >= 512.
pub const DEFAULT_REASSEMBLER_CAPACITY: usize = 512;
