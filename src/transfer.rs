use std::io::{ErrorKind, Read};

use tracing::debug;

use crate::config::TransferSettings;
use crate::domain::Chunk;
use crate::error::PipelineError;

/// Lazy, forward-only sequence of chunks read from a byte source.
///
/// The source is read `window_bytes` at a time and re-buffered until at least
/// `chunk_size_bytes` have accumulated, at which point the buffer is emitted and reset.
/// A shorter residual buffer is emitted last. The source is dropped as soon as the
/// stream is exhausted or fails, and also when the stream itself is dropped early.
pub struct ChunkStream<R: Read> {
    reader: Option<R>,
    window: Vec<u8>,
    buffer: Vec<u8>,
    chunk_size: usize,
    next_sequence: usize,
}

impl<R: Read> ChunkStream<R> {
    pub fn new(reader: R, settings: TransferSettings) -> Self {
        let chunk_size = settings.chunk_size_bytes.max(1);
        let window_size = settings.window_bytes.max(1);
        Self {
            reader: Some(reader),
            window: vec![0u8; window_size],
            buffer: Vec::with_capacity(chunk_size),
            chunk_size,
            next_sequence: 1,
        }
    }

    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    fn emit(&mut self) -> Chunk {
        let bytes = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.chunk_size));
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        debug!(part = sequence, bytes = bytes.len(), "chunk ready");
        Chunk { bytes, sequence }
    }

    fn close(&mut self) {
        self.reader = None;
    }
}

impl<R: Read> Iterator for ChunkStream<R> {
    type Item = Result<Chunk, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(reader) = self.reader.as_mut() else {
                return None;
            };
            match reader.read(&mut self.window) {
                Ok(0) => {
                    self.close();
                    if self.buffer.is_empty() {
                        return None;
                    }
                    return Some(Ok(self.emit()));
                }
                Ok(read) => {
                    self.buffer.extend_from_slice(&self.window[..read]);
                    if self.buffer.len() >= self.chunk_size {
                        return Some(Ok(self.emit()));
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.close();
                    self.buffer.clear();
                    return Some(Err(PipelineError::TransferHttp(err.to_string())));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};

    use super::*;

    fn settings(chunk: usize, window: usize) -> TransferSettings {
        TransferSettings {
            chunk_size_bytes: chunk,
            window_bytes: window,
        }
    }

    struct FailingReader {
        served: bool,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.served {
                return Err(io::Error::new(ErrorKind::ConnectionReset, "reset"));
            }
            self.served = true;
            buf[0] = 7;
            Ok(1)
        }
    }

    #[test]
    fn error_ends_the_stream() {
        let mut stream = ChunkStream::new(FailingReader { served: false }, settings(8, 4));
        assert!(matches!(
            stream.next(),
            Some(Err(PipelineError::TransferHttp(_)))
        ));
        assert!(!stream.is_open());
        assert!(stream.next().is_none());
    }

    #[test]
    fn empty_source_yields_nothing() {
        let mut stream = ChunkStream::new(Cursor::new(Vec::new()), settings(8, 4));
        assert!(stream.next().is_none());
        assert!(!stream.is_open());
    }
}
