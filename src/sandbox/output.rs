//! Captured output shared between the worker and the host side.

use parking_lot::Mutex;
use std::sync::Arc;

/// Why a line was not recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// The host stopped accepting output (the run timed out).
    #[error("output is sealed")]
    Sealed,
    /// The line or byte ceiling was reached.
    #[error("output limit reached")]
    Full,
}

#[derive(Debug, Default)]
struct Buffer {
    lines: Vec<String>,
    bytes: usize,
    sealed: bool,
}

/// Ordered, bounded list of output lines.
///
/// Cloning shares the buffer. The host keeps one handle so lines captured
/// before a timeout or worker fault survive.
#[derive(Debug, Clone)]
pub struct OutputSink {
    buffer: Arc<Mutex<Buffer>>,
    max_lines: usize,
    max_bytes: usize,
}

impl OutputSink {
    /// Sink accepting at most `max_lines` lines totalling `max_bytes` bytes.
    pub fn new(max_lines: usize, max_bytes: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Buffer::default())),
            max_lines,
            max_bytes,
        }
    }

    /// Append one line.
    pub fn push(&self, line: String) -> Result<(), CaptureError> {
        let mut buffer = self.buffer.lock();
        if buffer.sealed {
            return Err(CaptureError::Sealed);
        }
        if buffer.lines.len() >= self.max_lines || buffer.bytes + line.len() > self.max_bytes {
            return Err(CaptureError::Full);
        }
        buffer.bytes += line.len();
        buffer.lines.push(line);
        Ok(())
    }

    /// Refuse all further lines.
    pub fn seal(&self) {
        self.buffer.lock().sealed = true;
    }

    /// Number of lines captured so far.
    pub fn len(&self) -> usize {
        self.buffer.lock().lines.len()
    }

    /// Whether nothing has been captured.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seal the sink and take its lines.
    pub fn drain(&self) -> Vec<String> {
        let mut buffer = self.buffer.lock();
        buffer.sealed = true;
        std::mem::take(&mut buffer.lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealing_stops_capture() {
        let sink = OutputSink::new(10, 1024);
        sink.push("a".into()).unwrap();
        let worker = sink.clone();
        sink.seal();
        assert_eq!(worker.push("b".into()), Err(CaptureError::Sealed));
        assert_eq!(sink.drain(), vec!["a".to_string()]);
    }

    #[test]
    fn limits_are_enforced() {
        let sink = OutputSink::new(2, 8);
        sink.push("1234".into()).unwrap();
        assert_eq!(sink.push("123456".into()), Err(CaptureError::Full));
        sink.push("5678".into()).unwrap();
        assert_eq!(sink.push(String::new()), Err(CaptureError::Full));
        assert_eq!(sink.len(), 2);
    }
}
