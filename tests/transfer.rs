use std::io::{self, Cursor, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use assert_matches::assert_matches;
use tse_lakehouse::config::TransferSettings;
use tse_lakehouse::error::PipelineError;
use tse_lakehouse::transfer::ChunkStream;

fn settings(chunk_size_bytes: usize, window_bytes: usize) -> TransferSettings {
    TransferSettings {
        chunk_size_bytes,
        window_bytes,
    }
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// Serves at most `step` bytes per read, like a slow socket.
struct Trickle {
    inner: Cursor<Vec<u8>>,
    step: usize,
}

impl Read for Trickle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let limit = buf.len().min(self.step);
        self.inner.read(&mut buf[..limit])
    }
}

struct DropFlag {
    dropped: Arc<AtomicBool>,
}

impl Read for DropFlag {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        buf.fill(1);
        Ok(buf.len())
    }
}

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

#[test]
fn chunks_reassemble_the_source() {
    for len in [0, 1, 7, 64, 100, 1000, 4096] {
        for (chunk, window) in [(1, 1), (8, 3), (16, 16), (64, 10), (100, 7), (1024, 256)] {
            let source = payload(len);
            let chunks = ChunkStream::new(Cursor::new(source.clone()), settings(chunk, window))
                .collect::<Result<Vec<_>, _>>()
                .unwrap();

            let joined: Vec<u8> = chunks.iter().flat_map(|c| c.bytes.clone()).collect();
            assert_eq!(joined, source, "len {len}, chunk {chunk}, window {window}");

            let sequences: Vec<usize> = chunks.iter().map(|c| c.sequence).collect();
            assert_eq!(sequences, (1..=chunks.len()).collect::<Vec<_>>());

            if let Some((last, rest)) = chunks.split_last() {
                assert!(!last.bytes.is_empty());
                for chunk_item in rest {
                    assert!(chunk_item.bytes.len() >= chunk);
                }
            }
        }
    }
}

#[test]
fn chunks_never_exceed_one_window_past_the_chunk_size() {
    let chunks = ChunkStream::new(Cursor::new(payload(1000)), settings(100, 30))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    for chunk in &chunks {
        assert!(chunk.bytes.len() < 100 + 30);
    }
}

#[test]
fn payload_smaller_than_one_window_is_a_single_chunk() {
    let chunks = ChunkStream::new(Cursor::new(payload(10)), settings(1024, 256))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].sequence, 1);
    assert_eq!(chunks[0].bytes, payload(10));
}

#[test]
fn exact_multiple_of_chunk_size_has_no_empty_tail() {
    let chunks = ChunkStream::new(Cursor::new(payload(64)), settings(16, 16))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(chunks.len(), 4);
    assert!(chunks.iter().all(|c| c.bytes.len() == 16));
}

#[test]
fn short_reads_are_accumulated() {
    let source = payload(500);
    let reader = Trickle {
        inner: Cursor::new(source.clone()),
        step: 3,
    };
    let chunks = ChunkStream::new(reader, settings(50, 40))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let joined: Vec<u8> = chunks.into_iter().flat_map(|c| c.bytes).collect();
    assert_eq!(joined, source);
}

#[test]
fn dropping_the_stream_early_releases_the_source() {
    let dropped = Arc::new(AtomicBool::new(false));
    let reader = DropFlag {
        dropped: Arc::clone(&dropped),
    };
    let mut stream = ChunkStream::new(reader, settings(8, 4));
    assert_matches!(stream.next(), Some(Ok(chunk)) if chunk.sequence == 1);
    assert!(stream.is_open());
    drop(stream);
    assert!(dropped.load(Ordering::SeqCst));
}

#[test]
fn exhausted_stream_is_closed() {
    let mut stream = ChunkStream::new(Cursor::new(payload(20)), settings(8, 8));
    while let Some(chunk) = stream.next() {
        chunk.unwrap();
    }
    assert!(!stream.is_open());
    assert_matches!(stream.next(), None);
}

#[test]
fn read_errors_surface_as_transfer_errors() {
    struct Broken;
    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated"))
        }
    }

    let mut stream = ChunkStream::new(Broken, settings(8, 4));
    assert_matches!(stream.next(), Some(Err(PipelineError::TransferHttp(_))));
    assert!(stream.next().is_none());
}
