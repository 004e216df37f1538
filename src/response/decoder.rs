//! Incremental framing of the JSON values in a streaming body.
//!
//! Values arrive split across chunks at arbitrary byte boundaries, and the server interleaves
//! blank keep-alive lines between them.  The decoder buffers bytes, tracks object/array depth
//! (ignoring brackets inside strings), and yields each top-level value as soon as its closing
//! bracket has been seen.  Anything other than whitespace between values is an error.
use serde_json::Value;
use std::fmt;

#[derive(Debug)]
pub enum DecodeErr {
    /// A byte other than whitespace, `{` or `[` where a new value should begin.
    UnexpectedByte(char),
    Json(serde_json::Error),
}

impl std::error::Error for DecodeErr {}

impl fmt::Display for DecodeErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeErr::UnexpectedByte(c) => {
                write!(f, "expected `{{` or `[` between messages but found `{}`", c.escape_default())
            }
            DecodeErr::Json(e) => write!(f, "invalid JSON message: {}", e),
        }
    }
}

impl From<serde_json::Error> for DecodeErr {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

#[derive(Debug, Default)]
pub struct Decoder {
    buffer: Vec<u8>,
    /// How much of `buffer` has already been scanned.
    scanned: usize,
    /// Where the value being scanned starts, once its opening bracket has been seen.
    start: Option<usize>,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Bytes held back waiting for the rest of a value.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn reset(&mut self, consumed: usize) {
        self.buffer.drain(..consumed);
        self.scanned = 0;
        self.start = None;
        self.depth = 0;
        self.in_string = false;
        self.escaped = false;
    }
}

impl Iterator for Decoder {
    type Item = Result<Value, DecodeErr>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.scanned < self.buffer.len() {
            let i = self.scanned;
            let byte = self.buffer[i];
            self.scanned += 1;

            let start = match self.start {
                Some(start) => start,
                None if byte.is_ascii_whitespace() => continue,
                None if byte == b'{' || byte == b'[' => {
                    self.start = Some(i);
                    self.depth = 1;
                    continue;
                }
                None => {
                    let len = self.buffer.len();
                    self.reset(len);
                    return Some(Err(DecodeErr::UnexpectedByte(byte as char)));
                }
            };

            if self.in_string {
                match byte {
                    _ if self.escaped => self.escaped = false,
                    b'\\' => self.escaped = true,
                    b'"' => self.in_string = false,
                    _ => (),
                }
                continue;
            }
            match byte {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        let parsed = serde_json::from_slice(&self.buffer[start..=i]);
                        self.reset(i + 1);
                        return Some(parsed.map_err(DecodeErr::from));
                    }
                }
                _ => (),
            }
        }

        if self.start.is_none() {
            self.reset(self.buffer.len());
        }
        None
    }
}
