//! Delimiter framing for the interactive shell protocol
//!
//! Every request is wrapped as `echo <START>; <command>; echo <END>`. The
//! response is whatever the shell printed strictly between the first start
//! marker and the first end marker, minus the line terminator that follows
//! the start marker.

/// Start/end sentinel pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framing {
    start: String,
    end: String,
}

impl Framing {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn end(&self) -> &str {
        &self.end
    }

    /// Build the request line for a command
    pub fn wrap(&self, command: &str) -> String {
        format!("echo {}; {}; echo {}\n", self.start, command, self.end)
    }

    /// Extract the payload of the first complete frame in `buf`.
    ///
    /// Returns the payload and the number of bytes consumed (through the end
    /// marker), or `None` while no end marker has arrived.
    pub fn extract<'a>(&self, buf: &'a [u8]) -> Option<(&'a [u8], usize)> {
        let end_at = find(buf, self.end.as_bytes())?;
        let head = &buf[..end_at];

        // Without a start marker the payload runs from the buffer start
        let payload = match find(head, self.start.as_bytes()) {
            Some(start_at) => strip_line_terminator(&head[start_at + self.start.len()..]),
            None => head,
        };

        Some((payload, end_at + self.end.len()))
    }
}

/// Accumulates shell output and yields complete frames regardless of how
/// the bytes were chunked
#[derive(Debug)]
pub struct FrameDecoder {
    framing: Framing,
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            buf: Vec::new(),
        }
    }

    /// Append bytes read from the shell
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pop the next complete frame, if any
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let (payload, consumed) = self.framing.extract(&self.buf)?;
        let payload = payload.to_vec();
        self.buf.drain(..consumed);
        Some(payload)
    }

    /// Bytes received but not yet part of a frame
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Drain and return everything buffered
    pub fn take_pending(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

fn strip_line_terminator(bytes: &[u8]) -> &[u8] {
    bytes
        .strip_prefix(b"\r\n")
        .or_else(|| bytes.strip_prefix(b"\n"))
        .unwrap_or(bytes)
}

/// Position of the first occurrence of `needle` in `haystack`
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
