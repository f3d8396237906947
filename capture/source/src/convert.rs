/*!
    Conversion utilities between raw ffmpeg types and capture-types.
*/

use std::ffi::CStr;

use ffmpeg_next::ffi;

use capture_types::{Rational, VideoCodec};

/**
    Map a raw codec ID onto the hardware-decodable allow-list.

    Anything outside H.264 / H.265 / AV1 yields `None` and the stream
    is rejected during demuxer setup.
*/
pub fn video_codec_from_id(id: ffi::AVCodecID) -> Option<VideoCodec> {
    match id {
        ffi::AVCodecID::AV_CODEC_ID_H264 => Some(VideoCodec::H264),
        ffi::AVCodecID::AV_CODEC_ID_HEVC => Some(VideoCodec::H265),
        ffi::AVCodecID::AV_CODEC_ID_AV1 => Some(VideoCodec::Av1),
        _ => None,
    }
}

/**
    Convert a raw AVRational to our Rational.
*/
pub fn rational_from_raw(r: ffi::AVRational) -> Rational {
    Rational::new(r.num, r.den)
}

/**
    Human-readable message for a negative ffmpeg return code.
*/
pub fn error_string(code: i32) -> String {
    let mut buf = [0i8; ffi::AV_ERROR_MAX_STRING_SIZE as usize];
    unsafe {
        if ffi::av_strerror(code, buf.as_mut_ptr() as *mut _, buf.len()) < 0 {
            return format!("unknown error {}", code);
        }
        CStr::from_ptr(buf.as_ptr() as *const _)
            .to_string_lossy()
            .into_owned()
    }
}
