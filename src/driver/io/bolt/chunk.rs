// Copyright Rouven Bauer
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::cmp;
use std::io::{Read, Result as IoResult};
use std::ops::Deref;

/// Splits a logical message into `[uint16 length][length bytes]` chunks,
/// terminated by a zero-length chunk. Chunk size is capped at `u16::MAX`.
pub(crate) struct Chunker<'a> {
    buf: &'a [u8],
    in_chunk: bool,
    ended: bool,
}

impl<'a> Chunker<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Chunker {
            buf,
            in_chunk: false,
            ended: false,
        }
    }
}

impl<'a> Iterator for Chunker<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.ended {
            return None;
        }
        if self.buf.is_empty() {
            self.ended = true;
            return Some(Chunk::Size([0, 0]));
        }
        let end = cmp::min(self.buf.len(), u16::MAX as usize);
        if self.in_chunk {
            let (chunk, rest) = self.buf.split_at(end);
            self.buf = rest;
            self.in_chunk = false;
            Some(Chunk::Buffer(chunk))
        } else {
            self.in_chunk = true;
            Some(Chunk::Size((end as u16).to_be_bytes()))
        }
    }
}

pub(crate) enum Chunk<'a> {
    Buffer(&'a [u8]),
    Size([u8; 2]),
}

impl<'a> Deref for Chunk<'a> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        match self {
            Chunk::Buffer(buf) => buf,
            Chunk::Size(size) => size,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum DechunkerState {
    AwaitHeader,
    InChunk { remaining: u16 },
    MessageReady,
}

/// Reassembles chunks written by the peer's `Chunker` into complete messages.
///
/// Implements `Read` so a PackStream deserializer can read straight through
/// it: each call consumes at most the bytes of the current chunk, pulling
/// fresh chunk headers from the underlying reader as needed, and stops
/// (returning `Ok(0)`) once the zero-length chunk terminating the message
/// has been seen.
pub(crate) struct Dechunker<R: Read> {
    reader: R,
    state: DechunkerState,
}

impl<R: Read> Dechunker<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader,
            state: DechunkerState::AwaitHeader,
        }
    }

    /// Arms the dechunker for the next message. Call after the current one
    /// has been fully consumed.
    pub(crate) fn rearm(&mut self) {
        debug_assert_eq!(self.state, DechunkerState::MessageReady);
        self.state = DechunkerState::AwaitHeader;
    }

    fn read_header(&mut self) -> IoResult<u16> {
        let mut header = [0u8; 2];
        self.reader.read_exact(&mut header)?;
        Ok(u16::from_be_bytes(header))
    }
}

impl<R: Read> Read for Dechunker<R> {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match self.state {
                DechunkerState::MessageReady => return Ok(0),
                DechunkerState::AwaitHeader => {
                    let size = self.read_header()?;
                    if size == 0 {
                        self.state = DechunkerState::MessageReady;
                        return Ok(0);
                    }
                    self.state = DechunkerState::InChunk { remaining: size };
                }
                DechunkerState::InChunk { remaining } => {
                    let want = cmp::min(remaining as usize, buf.len());
                    let read = self.reader.read(&mut buf[..want])?;
                    if read == 0 {
                        return Err(std::io::Error::new(
                            std::io::ErrorKind::UnexpectedEof,
                            "connection closed mid-chunk",
                        ));
                    }
                    let remaining = remaining - read as u16;
                    self.state = if remaining == 0 {
                        DechunkerState::AwaitHeader
                    } else {
                        DechunkerState::InChunk { remaining }
                    };
                    return Ok(read);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn chunk_bytes(bufs: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for buf in bufs {
            for chunk in Chunker::new(buf) {
                out.extend_from_slice(&chunk);
            }
        }
        out
    }

    #[test]
    fn chunker_terminates_with_zero_chunk() {
        let chunks: Vec<_> = Chunker::new(b"hi").collect();
        assert_eq!(chunks.len(), 3); // size, buffer, terminator
        assert_eq!(&*chunks[0], &2u16.to_be_bytes());
        assert_eq!(&*chunks[1], b"hi");
        assert_eq!(&*chunks[2], &[0, 0]);
    }

    #[test]
    fn dechunk_reassembles_byte_identical_message() {
        let wire = chunk_bytes(&[b"hello world"]);
        let mut dechunker = Dechunker::new(Cursor::new(wire));
        let mut out = Vec::new();
        dechunker.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn dechunk_spans_multiple_chunks() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&3u16.to_be_bytes());
        wire.extend_from_slice(b"abc");
        wire.extend_from_slice(&2u16.to_be_bytes());
        wire.extend_from_slice(b"de");
        wire.extend_from_slice(&[0, 0]);
        let mut dechunker = Dechunker::new(Cursor::new(wire));
        let mut out = Vec::new();
        dechunker.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abcde");
    }

    #[test]
    fn empty_message_is_just_the_terminator() {
        let wire = vec![0u8, 0];
        let mut dechunker = Dechunker::new(Cursor::new(wire));
        let mut out = Vec::new();
        dechunker.read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn truncated_mid_chunk_is_an_error() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&5u16.to_be_bytes());
        wire.extend_from_slice(b"ab"); // only 2 of the promised 5 bytes
        let mut dechunker = Dechunker::new(Cursor::new(wire));
        let mut out = Vec::new();
        let err = dechunker.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }
}
