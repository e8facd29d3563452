//! Incremental UTF-8 decoding of network chunks.
//!
//! Transports split the body wherever they like, including in the middle of
//! a multi-byte character. [`Utf8ChunkDecoder`] holds back an incomplete
//! trailing sequence until the next chunk completes it.

/// Stateful byte-to-text decoder for a single response body.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode everything that forms complete characters so far.
    ///
    /// Invalid sequences become U+FFFD and decoding carries on.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::with_capacity(self.pending.len());
        let mut cursor = 0;
        loop {
            match std::str::from_utf8(&self.pending[cursor..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    cursor = self.pending.len();
                    break;
                }
                Err(err) => {
                    let valid_up_to = cursor + err.valid_up_to();
                    // from_utf8 already validated this prefix.
                    out.push_str(&String::from_utf8_lossy(&self.pending[cursor..valid_up_to]));
                    match err.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            cursor = valid_up_to + bad;
                        }
                        None => {
                            // Incomplete sequence at the end: wait for more bytes.
                            cursor = valid_up_to;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..cursor);
        out
    }

    /// Number of bytes held back waiting for a continuation.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Flush at end of stream. A dangling partial character decodes lossily.
    pub fn finish(&mut self) -> String {
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }
}
