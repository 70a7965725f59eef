use bytes::{Buf, BytesMut};

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Splits a chunked byte stream into SSE lines.
///
/// Chunk boundaries are arbitrary: a line may span several chunks, a chunk may
/// carry several lines, and a multi-byte UTF-8 character may be cut in half.
/// Bytes of an incomplete character stay in `undecoded` until the rest arrives;
/// decoded text without a line feed yet stays in `pending`.
#[derive(Debug)]
pub struct StreamFrameDecoder {
    undecoded: BytesMut,
    pending: String,
    started: bool,
}

impl StreamFrameDecoder {
    pub fn new() -> Self {
        Self {
            undecoded: BytesMut::with_capacity(1024),
            pending: String::with_capacity(8192),
            started: false,
        }
    }

    /// Feed a chunk and return every line it completes, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.push(chunk);

        let mut lines = Vec::new();
        while let Some(line) = self.next_line() {
            lines.push(line);
        }
        lines
    }

    /// Append a chunk without extracting lines.
    pub fn push(&mut self, chunk: &[u8]) {
        self.undecoded.extend_from_slice(chunk);
        self.decode_available();

        if !self.started && !self.pending.is_empty() {
            if self.pending.starts_with(BYTE_ORDER_MARK) {
                self.pending.drain(..BYTE_ORDER_MARK.len_utf8());
            }
            self.started = true;
        }
    }

    /// Pop the next complete line, without its `\n` or a trailing `\r`.
    pub fn next_line(&mut self) -> Option<String> {
        let newline = self.pending.find('\n')?;
        let mut line: String = self.pending.drain(..=newline).collect();
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
        Some(line)
    }

    /// Put text back in front of the pending buffer.
    ///
    /// No terminator is added, so the next extracted line is `text` joined with
    /// whatever physical line follows it.
    pub fn requeue(&mut self, text: &str) {
        self.pending.insert_str(0, text);
    }

    pub fn has_complete_line(&self) -> bool {
        self.pending.contains('\n')
    }

    /// Bytes held back waiting for a line terminator or the rest of a character.
    pub fn pending_len(&self) -> usize {
        self.pending.len() + self.undecoded.len()
    }

    /// End of input. Whatever is still pending has no terminator and is
    /// dropped; returns how many bytes were discarded.
    pub fn finish(&mut self) -> usize {
        let discarded = self.pending_len();
        if discarded > 0 {
            tracing::debug!(
                bytes = discarded,
                "Discarding unterminated trailing data at end of stream"
            );
        }
        self.pending.clear();
        self.undecoded.clear();
        discarded
    }

    /// Reset the decoder state (useful for connection reuse)
    pub fn reset(&mut self) {
        self.finish();
        if self.pending.capacity() > 65536 {
            self.pending = String::with_capacity(8192);
        }
        self.started = false;
    }

    fn decode_available(&mut self) {
        loop {
            match std::str::from_utf8(&self.undecoded) {
                Ok(text) => {
                    self.pending.push_str(text);
                    self.undecoded.clear();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&self.undecoded[..valid]) {
                        self.pending.push_str(text);
                    }

                    match e.error_len() {
                        Some(invalid) => {
                            tracing::debug!(offset = valid, "Replacing invalid UTF-8 in stream");
                            self.pending.push(char::REPLACEMENT_CHARACTER);
                            self.undecoded.advance(valid + invalid);
                        }
                        None => {
                            // Truncated character: keep its bytes for the next chunk
                            self.undecoded.advance(valid);
                            return;
                        }
                    }
                }
            }
        }
    }
}

impl Default for StreamFrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_chunk_multiple_lines() {
        let mut decoder = StreamFrameDecoder::new();
        let lines = decoder.feed(b"data: one\ndata: two\n\n");
        assert_eq!(lines, vec!["data: one", "data: two", ""]);
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut decoder = StreamFrameDecoder::new();
        assert!(decoder.feed(b"data: hel").is_empty());
        assert!(decoder.feed(b"lo wor").is_empty());
        assert_eq!(decoder.feed(b"ld\ndata"), vec!["data: hello world"]);
        assert_eq!(decoder.pending_len(), 4);
    }

    #[test]
    fn test_crlf_split_between_chunks() {
        let mut decoder = StreamFrameDecoder::new();
        assert!(decoder.feed(b"data: x\r").is_empty());
        assert_eq!(decoder.feed(b"\n"), vec!["data: x"]);
    }

    #[test]
    fn test_multibyte_character_split() {
        let text = "data: ✈ über\n";
        let bytes = text.as_bytes();
        // Cut inside the three-byte airplane glyph
        let cut = "data: ".len() + 1;

        let mut decoder = StreamFrameDecoder::new();
        assert!(decoder.feed(&bytes[..cut]).is_empty());
        assert_eq!(decoder.feed(&bytes[cut..]), vec!["data: ✈ über"]);
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut decoder = StreamFrameDecoder::new();
        let lines = decoder.feed(b"data: a\xffb\n");
        assert_eq!(lines, vec!["data: a\u{fffd}b"]);
    }

    #[test]
    fn test_leading_bom_is_dropped() {
        let mut decoder = StreamFrameDecoder::new();
        let bom = "\u{feff}".as_bytes();
        assert!(decoder.feed(&bom[..1]).is_empty());
        let mut rest = bom[1..].to_vec();
        rest.extend_from_slice(b": ping\n");
        assert_eq!(decoder.feed(&rest), vec![": ping"]);
    }

    #[test]
    fn test_finish_discards_partial_line() {
        let mut decoder = StreamFrameDecoder::new();
        assert_eq!(decoder.feed(b"data: done\ndata: {\"cho"), vec!["data: done"]);
        assert_eq!(decoder.finish(), "data: {\"cho".len());
        assert_eq!(decoder.pending_len(), 0);
        assert!(decoder.next_line().is_none());
    }

    #[test]
    fn test_requeue_joins_with_next_line() {
        let mut decoder = StreamFrameDecoder::new();
        decoder.push(b"data: {\"a\":\n1}\n");
        let first = decoder.next_line().unwrap();
        assert_eq!(first, "data: {\"a\":");

        decoder.requeue(&first);
        assert!(decoder.has_complete_line());
        assert_eq!(decoder.next_line().unwrap(), "data: {\"a\":1}");
    }

    #[test]
    fn test_determinism_across_instances() {
        let input = b": keep-alive\r\ndata: {\"x\":1}\r\n\r\ndata: [DONE]\r\ntrailing";

        let mut first = StreamFrameDecoder::new();
        let mut second = StreamFrameDecoder::new();

        let a: Vec<String> = input.chunks(3).flat_map(|c| first.feed(c)).collect();
        let b: Vec<String> = input.chunks(7).flat_map(|c| second.feed(c)).collect();

        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
    }

    #[test]
    fn test_reset() {
        let mut decoder = StreamFrameDecoder::new();
        decoder.feed(b"partial");
        assert!(decoder.pending_len() > 0);

        decoder.reset();
        assert_eq!(decoder.pending_len(), 0);
        assert!(!decoder.started);
    }
}
