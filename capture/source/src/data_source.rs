/*!
    The byte-provider abstraction the demuxer reads from.
*/

use std::io::SeekFrom;

use capture_types::Result;

/**
    A polymorphic byte provider feeding the demuxer.

    Implementations cover files, in-memory buffers, and live streams fed by
    a producer thread. The demuxer only ever calls these four operations; it
    never touches internal buffers.
*/
pub trait DataSource: Send {
    /**
        Read up to `buf.len()` bytes into `buf`.

        Returns the number of bytes read. `Ok(0)` is terminal end of
        stream. A live source with nothing buffered *yet* returns
        [`capture_types::Error::WouldBlock`] instead; callers retry that,
        and stop on `Ok(0)`.
    */
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /**
        Seek to a position, returning the new absolute position.

        Non-seekable sources return [`capture_types::Error::Unsupported`];
        they never clamp silently.
    */
    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    /**
        Total size in bytes, when known. Must be answerable without
        touching the underlying medium.
    */
    fn size(&self) -> Option<u64>;

    /**
        Whether [`DataSource::seek`] is supported.
    */
    fn is_seekable(&self) -> bool;
}
