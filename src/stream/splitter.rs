//! Incremental line-frame splitter for SSE byte streams.
//!
//! Upstream bodies arrive as byte chunks cut at arbitrary boundaries: a
//! frame may span two, three, or many chunks, and one chunk may carry many
//! frames. The splitter owns a single accumulating buffer, yields every
//! complete line as soon as its terminator arrives, and keeps the trailing
//! unterminated fragment for the next chunk.
//!
//! Lines are trimmed of surrounding ASCII whitespace (which also absorbs the
//! `\r` of CRLF transports). Empty lines and `:` comment lines are dropped
//! here so downstream decoding only ever sees candidate frames.

use bytes::BytesMut;
use memchr::memchr_iter;
use smallvec::SmallVec;

/// Complete frames produced by one [`FrameSplitter::feed_into`] call.
pub type FrameBatch = SmallVec<[String; 4]>;

pub struct FrameSplitter {
    buffer: BytesMut,
}

impl FrameSplitter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(1024),
        }
    }

    /// Feed one chunk and return the frames it completed.
    #[must_use]
    pub fn feed(&mut self, chunk: &[u8]) -> FrameBatch {
        let mut out = FrameBatch::new();
        self.feed_into(chunk, &mut out);
        out
    }

    /// Feed one chunk and append completed frames to a caller-provided batch.
    ///
    /// Splitting on `\n` bytes is UTF-8 safe (no multi-byte scalar contains
    /// `0x0A`), so a multi-byte character cut across chunks is reassembled
    /// before its line is materialized.
    pub fn feed_into(&mut self, chunk: &[u8], out: &mut FrameBatch) {
        self.buffer.extend_from_slice(chunk);

        let mut consumed = 0usize;
        for newline in memchr_iter(b'\n', &self.buffer) {
            if let Some(frame) = frame_from_line(&self.buffer[consumed..newline]) {
                out.push(frame);
            }
            consumed = newline + 1;
        }

        if consumed == self.buffer.len() {
            self.buffer.clear();
        } else if consumed > 0 {
            // The retained tail never contains a newline, so the next feed
            // only re-scans this short fragment.
            let _ = self.buffer.split_to(consumed);
        }
    }

    /// Flush the unterminated tail at end-of-stream.
    ///
    /// Returns the final frame when the remaining bytes form one, `None` when
    /// the buffer is empty or holds only whitespace/comment content. Idempotent:
    /// a second call returns `None`.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let tail = self.buffer.split();
        frame_from_line(&tail)
    }

    /// Bytes currently held back as an incomplete line.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for FrameSplitter {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn frame_from_line(line: &[u8]) -> Option<String> {
    let trimmed = line.trim_ascii();
    if trimmed.is_empty() || trimmed[0] == b':' {
        return None;
    }
    Some(String::from_utf8_lossy(trimmed).into_owned())
}

#[cfg(test)]
mod tests {
    use super::{FrameBatch, FrameSplitter};

    fn feed_all(splitter: &mut FrameSplitter, chunks: &[&[u8]]) -> Vec<String> {
        let mut frames = Vec::new();
        let mut batch = FrameBatch::new();
        for chunk in chunks {
            splitter.feed_into(chunk, &mut batch);
            frames.extend(batch.drain(..));
        }
        frames.extend(splitter.finish());
        frames
    }

    #[test]
    fn single_chunk_yields_each_line() {
        let mut splitter = FrameSplitter::new();
        let frames = splitter.feed(b"data: one\ndata: two\n");
        assert_eq!(frames.as_slice(), ["data: one", "data: two"]);
        assert_eq!(splitter.buffered_len(), 0);
    }

    #[test]
    fn partial_line_is_held_until_terminated() {
        let mut splitter = FrameSplitter::new();
        assert!(splitter.feed(b"data: hel").is_empty());
        assert!(splitter.feed(b"lo wor").is_empty());
        let frames = splitter.feed(b"ld\n");
        assert_eq!(frames.as_slice(), ["data: hello world"]);
    }

    #[test]
    fn blank_and_comment_lines_are_dropped() {
        let mut splitter = FrameSplitter::new();
        let frames = splitter.feed(b"\n: keep-alive ping\ndata: x\n\n   \n");
        assert_eq!(frames.as_slice(), ["data: x"]);
    }

    #[test]
    fn crlf_terminators_are_trimmed() {
        let mut splitter = FrameSplitter::new();
        let frames = splitter.feed(b"data: a\r\n\r\ndata: b\r\n");
        assert_eq!(frames.as_slice(), ["data: a", "data: b"]);
    }

    #[test]
    fn finish_flushes_unterminated_tail() {
        let mut splitter = FrameSplitter::new();
        assert!(splitter.feed(b"data: [DONE]").is_empty());
        assert_eq!(splitter.finish().as_deref(), Some("data: [DONE]"));
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn finish_drops_whitespace_only_tail() {
        let mut splitter = FrameSplitter::new();
        let frames = splitter.feed(b"data: a\n  \r");
        assert_eq!(frames.as_slice(), ["data: a"]);
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn finish_on_empty_buffer_is_none() {
        let mut splitter = FrameSplitter::new();
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn multibyte_character_split_across_chunks_survives() {
        let text = "data: caf\u{e9} \u{1f600}\n";
        let bytes = text.as_bytes();
        // Cut inside the emoji's four-byte sequence.
        let cut = bytes.len() - 3;
        let mut splitter = FrameSplitter::new();
        let frames = feed_all(&mut splitter, &[&bytes[..cut], &bytes[cut..]]);
        assert_eq!(frames, ["data: caf\u{e9} \u{1f600}"]);
    }

    #[test]
    fn chunking_invariance_over_all_split_sizes() {
        let body: &[u8] = b"data: {\"a\":1}\n\n: comment\ndata: {\"b\":2}\r\n\ndata: [DONE]\n\ntail";
        let expected = feed_all(&mut FrameSplitter::new(), &[body]);
        assert_eq!(
            expected,
            ["data: {\"a\":1}", "data: {\"b\":2}", "data: [DONE]", "tail"]
        );

        for size in 1..body.len() {
            let chunks: Vec<&[u8]> = body.chunks(size).collect();
            let frames = feed_all(&mut FrameSplitter::new(), &chunks);
            assert_eq!(frames, expected, "chunk size {size} diverged");
        }
    }
}
