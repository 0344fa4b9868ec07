//! Accumulation of emitted records into line-delimited output.

use std::sync::{Mutex, PoisonError};

use bytes::{BufMut, Bytes, BytesMut};

use crate::runtime::{Record, RecordSink};

/// Collects the records of one execution as newline-delimited JSON.
///
/// Each capture owns its own lock, so concurrent executions never contend
/// with each other or with the tool registry.
#[derive(Debug, Default)]
pub struct OutputCapture {
    buffer: Mutex<BytesMut>,
}

impl OutputCapture {
    /// Creates an empty capture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of bytes accumulated so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing has been captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes the accumulated output, leaving the capture empty.
    #[must_use]
    pub fn take(&self) -> Bytes {
        let mut guard = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *guard).freeze()
    }
}

impl RecordSink for OutputCapture {
    fn on_record(&self, record: Record) {
        let line = record.payload().to_string();
        let mut guard = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        guard.reserve(line.len() + 1);
        guard.put_slice(line.as_bytes());
        guard.put_u8(b'\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    #[test]
    fn records_are_line_delimited() {
        let capture = OutputCapture::new();
        capture.on_record(Record::new("dns", json!({"name": "example.com"})));
        capture.on_record(Record::new("dns", json!({"name": "example.org"})));

        let output = capture.take();
        assert_eq!(
            output,
            Bytes::from_static(b"{\"name\":\"example.com\"}\n{\"name\":\"example.org\"}\n")
        );
        assert!(capture.is_empty());
    }

    #[test]
    fn concurrent_sources_do_not_interleave_lines() {
        let capture = Arc::new(OutputCapture::new());
        let handles: Vec<_> = ["a", "b", "c", "d"]
            .into_iter()
            .map(|source| {
                let capture = Arc::clone(&capture);
                std::thread::spawn(move || {
                    for seq in 0..250 {
                        capture.on_record(Record::new(source, json!({"src": source, "seq": seq})));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let output = capture.take();
        let lines: Vec<_> = output
            .split(|byte| *byte == b'\n')
            .filter(|line| !line.is_empty())
            .collect();
        assert_eq!(lines.len(), 1000);
        for line in lines {
            let value: serde_json::Value = serde_json::from_slice(line).unwrap();
            assert!(value.get("seq").is_some());
        }
    }
}
