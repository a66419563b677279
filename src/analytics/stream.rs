//! Incremental decoder for streamed JSON responses
//!
//! The `:chat` endpoint streams a JSON array of messages, flushing each
//! element as soon as it is produced. `JsonStreamDecoder` turns arbitrary
//! byte chunks of such a body into complete top-level objects without
//! waiting for the closing bracket. A bare sequence of objects (no array)
//! is accepted too.

use serde_json::Value;
use thiserror::Error;

/// Errors raised while decoding a streamed body
#[derive(Error, Debug)]
pub enum StreamDecodeError {
    /// Unexpected byte between elements
    #[error("Unexpected character '{0}' in response stream")]
    UnexpectedChar(char),

    /// An element was complete but not valid JSON
    #[error("Invalid JSON element in response stream: {0}")]
    InvalidElement(#[from] serde_json::Error),

    /// The stream ended in the middle of an element
    #[error("Response stream ended inside an element")]
    Truncated,
}

/// Streaming splitter for a JSON array (or sequence) of objects
#[derive(Debug, Default)]
pub struct JsonStreamDecoder {
    /// Bytes of the element currently being read
    buffer: Vec<u8>,
    /// Nesting depth inside the current element (0 = between elements)
    depth: usize,
    in_string: bool,
    escaped: bool,
    /// Outer `[` has been consumed
    in_array: bool,
    /// Outer `]` has been consumed; anything but whitespace is an error
    finished: bool,
}

impl JsonStreamDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every element it completes
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Value>, StreamDecodeError> {
        let mut complete = Vec::new();

        for &byte in chunk {
            if self.depth > 0 {
                self.buffer.push(byte);
                if self.in_string {
                    if self.escaped {
                        self.escaped = false;
                    } else if byte == b'\\' {
                        self.escaped = true;
                    } else if byte == b'"' {
                        self.in_string = false;
                    }
                    continue;
                }
                match byte {
                    b'"' => self.in_string = true,
                    b'{' | b'[' => self.depth += 1,
                    b'}' | b']' => {
                        self.depth -= 1;
                        if self.depth == 0 {
                            let element = serde_json::from_slice(&self.buffer)?;
                            self.buffer.clear();
                            complete.push(element);
                        }
                    }
                    _ => {}
                }
                continue;
            }

            match byte {
                b' ' | b'\t' | b'\r' | b'\n' => {}
                _ if self.finished => return Err(StreamDecodeError::UnexpectedChar(byte as char)),
                b'[' if !self.in_array => self.in_array = true,
                b',' if self.in_array => {}
                b']' if self.in_array => self.finished = true,
                b'{' => {
                    self.depth = 1;
                    self.buffer.push(byte);
                }
                other => return Err(StreamDecodeError::UnexpectedChar(other as char)),
            }
        }

        Ok(complete)
    }

    /// Signal end of input; fails if an element was cut off
    pub fn finish(&self) -> Result<(), StreamDecodeError> {
        if self.depth > 0 {
            Err(StreamDecodeError::Truncated)
        } else {
            Ok(())
        }
    }
}
