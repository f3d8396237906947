/*!
    Custom AVIO bridge feeding demuxing from a [`DataSource`].

    ffmpeg pulls bytes through C callbacks; this module owns the
    callback trampoline, the I/O buffer, and the boxed source behind
    the opaque pointer.
*/

use std::ffi::c_void;
use std::io::SeekFrom;

use ffmpeg_next::ffi;

use capture_types::{Error, Result};

use crate::data_source::DataSource;

/// Transfer buffer handed to avio_alloc_context.
const IO_BUFFER_SIZE: usize = 32 * 1024;

/**
    Owns the `AVIOContext` and the [`DataSource`] it reads from.

    The source is double-boxed so a single thin pointer can round-trip
    through the callback `opaque` slot. Drop order matters: the format
    context using this bridge must be closed first, which the demuxer
    guarantees by field order.
*/
pub(crate) struct IoBridge {
    io_ctx: *mut ffi::AVIOContext,
    source: *mut Box<dyn DataSource>,
}

impl IoBridge {
    pub(crate) fn new(source: Box<dyn DataSource>) -> Result<Self> {
        let source = Box::into_raw(Box::new(source));

        unsafe {
            let buffer = ffi::av_malloc(IO_BUFFER_SIZE) as *mut u8;
            if buffer.is_null() {
                drop(Box::from_raw(source));
                return Err(Error::codec("failed to allocate I/O buffer"));
            }

            let io_ctx = ffi::avio_alloc_context(
                buffer,
                IO_BUFFER_SIZE as i32,
                0, // read-only
                source as *mut c_void,
                Some(read_callback),
                None,
                // Always installed: a non-seekable source still answers
                // AVSEEK_SIZE when its length is known, and real seeks
                // come back as ENOSYS from the source itself.
                Some(seek_callback as _),
            );
            if io_ctx.is_null() {
                ffi::av_free(buffer as *mut c_void);
                drop(Box::from_raw(source));
                return Err(Error::codec("failed to allocate I/O context"));
            }

            Ok(Self { io_ctx, source })
        }
    }

    pub(crate) fn as_ptr(&self) -> *mut ffi::AVIOContext {
        self.io_ctx
    }
}

impl Drop for IoBridge {
    fn drop(&mut self) {
        unsafe {
            // ffmpeg may have swapped the buffer internally; free whatever
            // the context currently holds, then the context itself.
            ffi::av_freep(&mut (*self.io_ctx).buffer as *mut _ as *mut c_void);
            ffi::avio_context_free(&mut self.io_ctx);
            drop(Box::from_raw(self.source));
        }
    }
}

unsafe extern "C" fn read_callback(opaque: *mut c_void, buf: *mut u8, buf_size: i32) -> i32 {
    let source = unsafe { &mut **(opaque as *mut Box<dyn DataSource>) };
    let dest = unsafe { std::slice::from_raw_parts_mut(buf, buf_size.max(0) as usize) };
    read_result_to_code(source.read(dest))
}

unsafe extern "C" fn seek_callback(opaque: *mut c_void, offset: i64, whence: i32) -> i64 {
    let source = unsafe { &mut **(opaque as *mut Box<dyn DataSource>) };

    // AVSEEK_SIZE asks for the stream length without moving the cursor.
    if whence & ffi::AVSEEK_SIZE as i32 != 0 {
        return match source.size() {
            Some(size) => size as i64,
            None => ffi::AVERROR(ffi::ENOSYS) as i64,
        };
    }

    match seek_from_whence(offset, whence) {
        Some(pos) => match source.seek(pos) {
            Ok(new_pos) => new_pos as i64,
            Err(err) => error_to_code(&err) as i64,
        },
        None => ffi::AVERROR(ffi::EINVAL) as i64,
    }
}

/// Map a source read result onto the avio callback contract.
fn read_result_to_code(result: Result<usize>) -> i32 {
    match result {
        Ok(0) => ffi::AVERROR_EOF,
        Ok(n) => n as i32,
        Err(err) => error_to_code(&err),
    }
}

fn error_to_code(err: &Error) -> i32 {
    match err {
        Error::WouldBlock => ffi::AVERROR(ffi::EAGAIN),
        Error::EndOfStream => ffi::AVERROR_EOF,
        Error::Unsupported(_) => ffi::AVERROR(ffi::ENOSYS),
        Error::InvalidData(_) => ffi::AVERROR(ffi::EINVAL),
        _ => ffi::AVERROR(ffi::EIO),
    }
}

/// Translate an avio whence value, ignoring the AVSEEK_FORCE hint bit.
fn seek_from_whence(offset: i64, whence: i32) -> Option<SeekFrom> {
    match whence & !(ffi::AVSEEK_FORCE as i32) {
        0 => Some(SeekFrom::Start(offset.max(0) as u64)),
        1 => Some(SeekFrom::Current(offset)),
        2 => Some(SeekFrom::End(offset)),
        _ => None,
    }
}

// The raw pointers are only touched from the demuxing thread.
unsafe impl Send for IoBridge {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_codes_follow_avio_contract() {
        assert_eq!(read_result_to_code(Ok(0)), ffi::AVERROR_EOF);
        assert_eq!(read_result_to_code(Ok(4096)), 4096);
        assert_eq!(
            read_result_to_code(Err(Error::WouldBlock)),
            ffi::AVERROR(ffi::EAGAIN)
        );
        assert_eq!(
            read_result_to_code(Err(Error::unsupported("no seek"))),
            ffi::AVERROR(ffi::ENOSYS)
        );
        assert_eq!(
            read_result_to_code(Err(Error::invalid_data("bad range"))),
            ffi::AVERROR(ffi::EINVAL)
        );
        assert_eq!(
            read_result_to_code(Err(Error::codec("boom"))),
            ffi::AVERROR(ffi::EIO)
        );
    }

    #[test]
    fn non_seekable_source_still_reports_its_size() {
        use crate::BufferSource;

        let source = BufferSource::streaming();
        source.append(b"stream");
        source.finish();

        let mut boxed: Box<dyn DataSource> = Box::new(source);
        let opaque = &mut boxed as *mut Box<dyn DataSource> as *mut c_void;

        unsafe {
            assert_eq!(seek_callback(opaque, 0, ffi::AVSEEK_SIZE as i32), 6);
            // Real seeks on a live stream are refused by the source.
            assert_eq!(
                seek_callback(opaque, 0, 0),
                ffi::AVERROR(ffi::ENOSYS) as i64
            );
        }
    }

    #[test]
    fn whence_translation_masks_force_bit() {
        assert_eq!(seek_from_whence(10, 0), Some(SeekFrom::Start(10)));
        assert_eq!(seek_from_whence(-3, 1), Some(SeekFrom::Current(-3)));
        assert_eq!(seek_from_whence(-1, 2), Some(SeekFrom::End(-1)));
        assert_eq!(
            seek_from_whence(10, ffi::AVSEEK_FORCE as i32),
            Some(SeekFrom::Start(10))
        );
        assert_eq!(seek_from_whence(0, 7), None);
    }
}
