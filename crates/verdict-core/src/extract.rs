//! Incremental extraction of top-level JSON objects from a growing buffer.
//!
//! The verification backend streams a JSON array, but the client never waits
//! for the brackets or separators: each object is handed downstream the
//! moment its own closing brace arrives. The scanner only tracks brace depth,
//! whether it is inside a string, and whether the next character is escaped,
//! so braces and quotes inside verifier free text cannot throw it off.
//!
//! A trailing object that never closes is dropped when the stream ends. No
//! error is raised for it; [`ObjectExtractor::finish`] only reports how many
//! bytes were discarded.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::decode::Utf8ChunkDecoder;
use crate::metrics::{Counter, METRICS};

const PREVIEW_CHARS: usize = 120;

/// Scans decoded text and yields complete objects of type `T` in the order
/// their closing braces appear.
#[derive(Debug)]
pub struct ObjectExtractor<T> {
    buffer: String,
    /// Bytes of `buffer` already scanned.
    scanned: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
    /// Offset of the `{` that opened the current top-level object.
    start: Option<usize>,
    emitted: u64,
    malformed: u64,
    _target: PhantomData<fn() -> T>,
}

impl<T> Default for ObjectExtractor<T> {
    fn default() -> Self {
        Self {
            buffer: String::new(),
            scanned: 0,
            depth: 0,
            in_string: false,
            escaped: false,
            start: None,
            emitted: 0,
            malformed: 0,
            _target: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> ObjectExtractor<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `text` and return every object completed by it.
    ///
    /// A candidate that fails to deserialize is logged and skipped; scanning
    /// continues with the next object.
    pub fn feed(&mut self, text: &str) -> Vec<T> {
        self.buffer.push_str(text);

        let mut out = Vec::new();
        let mut consumed = 0;
        let bytes = self.buffer.as_bytes();

        // All delimiters are ASCII and never appear inside a multi-byte UTF-8
        // sequence, so scanning bytes is equivalent to scanning characters.
        for (i, &byte) in bytes.iter().enumerate().skip(self.scanned) {
            if self.escaped {
                self.escaped = false;
                continue;
            }
            match byte {
                b'\\' if self.in_string => self.escaped = true,
                b'"' => self.in_string = !self.in_string,
                b'{' if !self.in_string => {
                    self.depth += 1;
                    if self.depth == 1 {
                        self.start = Some(i);
                    }
                }
                b'}' if !self.in_string && self.depth > 0 => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        if let Some(start) = self.start.take() {
                            let candidate = &self.buffer[start..=i];
                            match serde_json::from_str::<T>(candidate) {
                                Ok(object) => {
                                    self.emitted += 1;
                                    METRICS.inc(Counter::ObjectsExtracted);
                                    out.push(object);
                                }
                                Err(e) => {
                                    self.malformed += 1;
                                    METRICS.inc(Counter::ObjectsMalformed);
                                    warn!(
                                        error = %e,
                                        candidate = %preview(candidate),
                                        "discarding malformed streamed object"
                                    );
                                }
                            }
                        }
                        consumed = i + 1;
                    }
                }
                _ => {}
            }
        }
        self.scanned = bytes.len();

        // Outside an object only array punctuation remains, so everything
        // before the open object (or everything scanned) can go.
        if self.depth == 0 && !self.in_string {
            consumed = self.scanned;
        } else if let Some(start) = self.start {
            consumed = consumed.max(start);
        }
        if consumed > 0 {
            self.buffer.drain(..consumed);
            self.scanned -= consumed;
            self.start = self.start.map(|s| s - consumed);
        }

        out
    }

    /// Objects successfully emitted so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Candidates discarded because they did not deserialize.
    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    /// Bytes currently buffered (bounded by the largest open object).
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// End of stream: drop any unfinished object and return its size in
    /// bytes. The extractor is reset and may be reused.
    pub fn finish(&mut self) -> usize {
        let dropped = self.start.map(|s| self.buffer.len() - s).unwrap_or(0);
        if dropped > 0 {
            debug!(
                dropped_bytes = dropped,
                "stream ended inside an object; dropping truncated fragment"
            );
        }
        let (emitted, malformed) = (self.emitted, self.malformed);
        *self = Self::default();
        self.emitted = emitted;
        self.malformed = malformed;
        dropped
    }
}

fn preview(candidate: &str) -> String {
    if candidate.chars().count() <= PREVIEW_CHARS {
        candidate.to_string()
    } else {
        let head: String = candidate.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    }
}

/// Outcome of extracting a complete, already-captured byte stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionReport<T> {
    pub objects: Vec<T>,
    pub malformed: u64,
    pub dropped_bytes: usize,
}

/// Decode and extract a finite sequence of chunks in one go.
///
/// Used for offline replay of captured responses; the live path drives the
/// decoder and extractor itself so it can check the run epoch between
/// objects.
pub fn extract_chunks<T, I, B>(chunks: I) -> ExtractionReport<T>
where
    T: DeserializeOwned,
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut decoder = Utf8ChunkDecoder::new();
    let mut extractor = ObjectExtractor::<T>::new();
    let mut objects = Vec::new();

    for chunk in chunks {
        let text = decoder.decode(chunk.as_ref());
        objects.extend(extractor.feed(&text));
    }
    objects.extend(extractor.feed(&decoder.finish()));
    let dropped_bytes = extractor.finish();

    ExtractionReport {
        objects,
        malformed: extractor.malformed(),
        dropped_bytes,
    }
}
