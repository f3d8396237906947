/*!
    In-memory buffering data source for streaming input.
*/

use std::io::SeekFrom;
use std::sync::{Arc, Mutex};

use log::debug;

use capture_types::{Error, Result};

use crate::data_source::DataSource;

struct Inner {
    data: Vec<u8>,
    position: usize,
    seekable: bool,
    /// Logical end of stream, independent of buffer emptiness.
    finished: bool,
}

/**
    A [`DataSource`] backed by a growable in-memory buffer.

    The handle is cheaply cloneable; all clones share one buffer under a
    single lock, so a producer thread (e.g. a network bridge depacketizing
    into it) can append while the demuxer reads.

    Until [`BufferSource::finish`] is called, running out of buffered bytes
    is reported as the transient [`Error::WouldBlock`]; afterwards it is a
    true EOF (`Ok(0)`).
*/
#[derive(Clone)]
pub struct BufferSource {
    inner: Arc<Mutex<Inner>>,
}

impl BufferSource {
    /**
        A seekable source over a complete, already-known byte buffer.
    */
    pub fn from_data(data: Vec<u8>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                data,
                position: 0,
                seekable: true,
                finished: true,
            })),
        }
    }

    /**
        An empty, non-seekable source for live streams. The producer
        appends bytes as they arrive and calls [`BufferSource::finish`]
        when the stream ends.
    */
    pub fn streaming() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                data: Vec::new(),
                position: 0,
                seekable: false,
                finished: false,
            })),
        }
    }

    /**
        Append bytes at the end of the buffer.
    */
    pub fn append(&self, bytes: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        inner.data.extend_from_slice(bytes);
    }

    /**
        Replace the buffer contents and rewind to the start.
    */
    pub fn set_data(&self, data: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        inner.data = data;
        inner.position = 0;
    }

    /**
        Mark the logical end of stream. Remaining buffered bytes stay
        readable; once they are consumed, reads return `Ok(0)`.
    */
    pub fn finish(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.finished = true;
        debug!("buffer source finished at {} bytes", inner.data.len());
    }

    /**
        Drop all buffered bytes and reset position and EOS state.
    */
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.data.clear();
        inner.position = 0;
        inner.finished = false;
    }

    pub fn set_seekable(&self, seekable: bool) {
        self.inner.lock().unwrap().seekable = seekable;
    }

    /**
        Bytes buffered ahead of the current read position.
    */
    pub fn bytes_available(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.data.len() - inner.position
    }

    pub fn position(&self) -> usize {
        self.inner.lock().unwrap().position
    }
}

impl DataSource for BufferSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.lock().unwrap();

        if inner.position >= inner.data.len() {
            // Empty is only EOF once the producer says so.
            return if inner.finished {
                Ok(0)
            } else {
                Err(Error::WouldBlock)
            };
        }

        let available = inner.data.len() - inner.position;
        let count = buf.len().min(available);
        let start = inner.position;
        buf[..count].copy_from_slice(&inner.data[start..start + count]);
        inner.position += count;
        Ok(count)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.seekable {
            return Err(Error::unsupported("buffer source is not seekable"));
        }

        let len = inner.data.len() as i64;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(offset) => inner.position as i64 + offset,
            SeekFrom::End(offset) => len + offset,
        };

        if target < 0 || target > len {
            return Err(Error::invalid_data(format!(
                "seek position {} out of range 0..{}",
                target, len
            )));
        }

        inner.position = target as usize;
        Ok(target as u64)
    }

    fn size(&self) -> Option<u64> {
        let inner = self.inner.lock().unwrap();
        // Size is only meaningful once the stream is complete.
        inner.finished.then_some(inner.data.len() as u64)
    }

    fn is_seekable(&self) -> bool {
        self.inner.lock().unwrap().seekable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn empty_stream_is_transient_until_finished() {
        let mut source = BufferSource::streaming();
        let mut buf = [0u8; 8];

        assert!(matches!(source.read(&mut buf), Err(Error::WouldBlock)));

        source.append(b"abc");
        assert_eq!(source.read(&mut buf).unwrap(), 3);

        // Drained again, but not finished: still transient.
        assert!(matches!(source.read(&mut buf), Err(Error::WouldBlock)));

        source.finish();
        assert_eq!(source.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn finish_keeps_remaining_bytes_readable() {
        let mut source = BufferSource::streaming();
        source.append(b"tail");
        source.finish();

        let mut buf = [0u8; 8];
        assert_eq!(source.read(&mut buf).unwrap(), 4);
        assert_eq!(source.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn streaming_source_rejects_seek() {
        let mut source = BufferSource::streaming();
        assert!(!source.is_seekable());
        assert!(matches!(
            source.seek(SeekFrom::Start(0)),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn size_unknown_until_finished() {
        let source = BufferSource::streaming();
        source.append(b"xyz");
        assert_eq!(source.size(), None);
        source.finish();
        assert_eq!(source.size(), Some(3));
    }

    #[test]
    fn seekable_buffer_round_trips() {
        let mut source = BufferSource::from_data(b"0123456789".to_vec());
        assert!(source.is_seekable());
        assert_eq!(source.size(), Some(10));

        assert_eq!(source.seek(SeekFrom::End(-4)).unwrap(), 6);
        let mut buf = [0u8; 4];
        assert_eq!(source.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"6789");

        assert!(source.seek(SeekFrom::Current(5)).is_err()); // past end
    }

    #[test]
    fn producer_thread_feeds_consumer() {
        let source = BufferSource::streaming();
        let producer = source.clone();

        let handle = thread::spawn(move || {
            for chunk in [b"aa".as_slice(), b"bb", b"cc"] {
                producer.append(chunk);
                thread::sleep(Duration::from_millis(1));
            }
            producer.finish();
        });

        let mut consumer = source;
        let mut collected = Vec::new();
        let mut buf = [0u8; 4];
        loop {
            match consumer.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => collected.extend_from_slice(&buf[..n]),
                Err(Error::WouldBlock) => thread::yield_now(),
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        handle.join().unwrap();
        assert_eq!(collected, b"aabbcc");
    }
}
