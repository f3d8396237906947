/*!
    Container demuxing over a pluggable [`DataSource`].

    All input, including plain files, flows through the custom AVIO
    bridge so that buffer-fed and network-fed sources behave exactly
    like file playback.
*/

use std::ffi::CString;
use std::path::Path;
use std::ptr;

use ffmpeg_next::ffi;
use log::{debug, info, warn};

use capture_types::{Error, Packet, PacketSource, Pts, Rational, Result, StreamDescriptor};

use crate::codec_config::CodecConfig;
use crate::convert::{error_string, rational_from_raw, video_codec_from_id};
use crate::data_source::DataSource;
use crate::file::FileSource;
use crate::io_bridge::IoBridge;

/// `AV_NOPTS_VALUE`; the cast macro is not visible through bindgen.
const NO_PTS: i64 = i64::MIN;

/// Frame rate assumed when the container declares none.
const DEFAULT_FRAME_RATE: f64 = 25.0;

struct FormatContext(*mut ffi::AVFormatContext);

impl Drop for FormatContext {
    fn drop(&mut self) {
        unsafe {
            ffi::avformat_close_input(&mut self.0);
        }
    }
}

struct PacketGuard(*mut ffi::AVPacket);

impl Drop for PacketGuard {
    fn drop(&mut self) {
        unsafe {
            ffi::av_packet_free(&mut self.0);
        }
    }
}

/**
    Demuxes a container down to compressed video packets for the first
    hardware-decodable video stream.

    Streams carrying codecs outside the H.264 / H.265 / AV1 allow-list
    are skipped during selection; a container with none of the three is
    rejected at open time.
*/
pub struct Demuxer {
    // Field order is load-bearing: the format context reads through the
    // bridge and must be closed before the bridge is torn down.
    ctx: FormatContext,
    _bridge: IoBridge,
    stream_index: usize,
    descriptor: StreamDescriptor,
    config: CodecConfig,
}

impl Demuxer {
    /**
        Open a media file from disk.
    */
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let source = FileSource::open(path.as_ref())?;
        Self::open_source(Box::new(source), None)
    }

    /**
        Open a media stream from an arbitrary data source.

        Non-seekable sources are supported; backward seeking will then
        fail at seek time rather than here. Raw elementary streams need
        a `format_hint` ("h264", "hevc") since they carry no probe-able
        container header.
    */
    pub fn open_source(source: Box<dyn DataSource>, format_hint: Option<&str>) -> Result<Self> {
        ffmpeg_next::init()
            .map_err(|e| Error::codec(format!("failed to initialize ffmpeg: {}", e)))?;

        let hint = match format_hint {
            Some(name) => Some(
                CString::new(name)
                    .map_err(|_| Error::invalid_data("format hint contains a NUL byte"))?,
            ),
            None => None,
        };

        let bridge = IoBridge::new(source)?;

        unsafe {
            let input_format = match &hint {
                Some(name) => {
                    let fmt = ffi::av_find_input_format(name.as_ptr());
                    if fmt.is_null() {
                        return Err(Error::unsupported(format!(
                            "unknown input format hint {:?}",
                            format_hint
                        )));
                    }
                    fmt
                }
                None => ptr::null(),
            };

            let mut raw = ffi::avformat_alloc_context();
            if raw.is_null() {
                return Err(Error::codec("failed to allocate format context"));
            }
            (*raw).pb = bridge.as_ptr();
            (*raw).flags |= ffi::AVFMT_FLAG_CUSTOM_IO as i32;

            let ret =
                ffi::avformat_open_input(&mut raw, c"".as_ptr(), input_format, ptr::null_mut());
            if ret < 0 {
                // avformat_open_input frees the context on failure.
                return Err(Error::codec(format!(
                    "failed to open input: {}",
                    error_string(ret)
                )));
            }
            let ctx = FormatContext(raw);

            let ret = ffi::avformat_find_stream_info(ctx.0, ptr::null_mut());
            if ret < 0 {
                return Err(Error::codec(format!(
                    "failed to read stream info: {}",
                    error_string(ret)
                )));
            }

            let (stream_index, descriptor, config) = select_video_stream(ctx.0)?;
            info!(
                "opened {} stream {}: {}x{} @ {:.3} fps, {:.2}s",
                descriptor.codec.name(),
                stream_index,
                descriptor.width,
                descriptor.height,
                descriptor.frame_rate,
                descriptor.duration_secs
            );

            Ok(Self {
                ctx,
                _bridge: bridge,
                stream_index,
                descriptor,
                config,
            })
        }
    }

    /**
        Properties of the selected video stream.
    */
    pub fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    pub fn width(&self) -> u32 {
        self.descriptor.width
    }

    pub fn height(&self) -> u32 {
        self.descriptor.height
    }

    pub fn frame_rate(&self) -> f64 {
        self.descriptor.frame_rate
    }

    /// Duration in seconds, 0.0 when the container does not state one.
    pub fn duration(&self) -> f64 {
        self.descriptor.duration_secs
    }

    /**
        Codec parameters for constructing a decoder for this stream.
    */
    pub fn codec_config(&self) -> CodecConfig {
        self.config.clone()
    }

    /**
        Read the next compressed packet of the selected video stream.

        Packets of other streams are discarded. Returns `Ok(None)` at
        end of stream and [`Error::WouldBlock`] when a live source has
        no bytes buffered yet.
    */
    pub fn read_packet(&mut self) -> Result<Option<Packet>> {
        unsafe {
            let guard = PacketGuard(ffi::av_packet_alloc());
            if guard.0.is_null() {
                return Err(Error::codec("failed to allocate packet"));
            }

            loop {
                let ret = ffi::av_read_frame(self.ctx.0, guard.0);
                if ret == ffi::AVERROR_EOF {
                    return Ok(None);
                }
                if ret == ffi::AVERROR(ffi::EAGAIN) {
                    return Err(Error::WouldBlock);
                }
                if ret < 0 {
                    return Err(Error::codec(format!(
                        "failed to read packet: {}",
                        error_string(ret)
                    )));
                }

                let pkt = &mut *guard.0;
                if pkt.stream_index as usize != self.stream_index {
                    ffi::av_packet_unref(guard.0);
                    continue;
                }

                let data = std::slice::from_raw_parts(pkt.data, pkt.size.max(0) as usize);
                let packet = Packet {
                    data: data.to_vec(),
                    pts: (pkt.pts != NO_PTS).then(|| Pts(pkt.pts)),
                    dts: (pkt.dts != NO_PTS).then(|| Pts(pkt.dts)),
                    stream_index: self.stream_index,
                    keyframe: pkt.flags & ffi::AV_PKT_FLAG_KEY as i32 != 0,
                };
                ffi::av_packet_unref(guard.0);
                return Ok(Some(packet));
            }
        }
    }

    /**
        Seek to the keyframe at or before the given time in seconds.

        The decoder must be flushed after a seek; stale reference
        frames otherwise corrupt output until the next keyframe.
    */
    pub fn seek_to_time(&mut self, seconds: f64) -> Result<()> {
        let tb = self.descriptor.time_base;
        let ticks = tb.seconds_to_ticks(seconds);
        debug!("seeking to {:.3}s (ts {})", seconds, ticks);

        let ret = unsafe {
            ffi::av_seek_frame(
                self.ctx.0,
                self.stream_index as i32,
                ticks,
                ffi::AVSEEK_FLAG_BACKWARD as i32,
            )
        };
        if ret < 0 {
            return Err(Error::codec(format!(
                "seek to {:.3}s failed: {}",
                seconds,
                error_string(ret)
            )));
        }
        Ok(())
    }

    /**
        Seek to the keyframe at or before the given frame index,
        positioned via the stream's nominal frame rate.
    */
    pub fn seek_to_frame(&mut self, frame_index: u64) -> Result<()> {
        let rate = self.descriptor.frame_rate;
        if rate <= 0.0 {
            return Err(Error::invalid_data("stream has no usable frame rate"));
        }
        self.seek_to_time(frame_index as f64 / rate)
    }
}

impl PacketSource for Demuxer {
    fn next_packet(&mut self) -> Result<Option<Packet>> {
        self.read_packet()
    }
}

// The format context and bridge are confined to whichever thread owns
// the demuxer; nothing here is shared.
unsafe impl Send for Demuxer {}

unsafe fn select_video_stream(
    ctx: *mut ffi::AVFormatContext,
) -> Result<(usize, StreamDescriptor, CodecConfig)> {
    let nb_streams = unsafe { (*ctx).nb_streams } as usize;

    for index in 0..nb_streams {
        let stream = unsafe { *(*ctx).streams.add(index) };
        let par = unsafe { (*stream).codecpar };
        if unsafe { (*par).codec_type } != ffi::AVMediaType::AVMEDIA_TYPE_VIDEO {
            continue;
        }

        let Some(codec) = video_codec_from_id(unsafe { (*par).codec_id }) else {
            warn!("skipping video stream {}: codec not hardware-decodable", index);
            continue;
        };

        let time_base = rational_from_raw(unsafe { (*stream).time_base });
        let descriptor = StreamDescriptor {
            width: unsafe { (*par).width }.max(0) as u32,
            height: unsafe { (*par).height }.max(0) as u32,
            codec,
            time_base,
            frame_rate: unsafe { resolve_frame_rate(stream) },
            duration_secs: unsafe { resolve_duration(ctx, stream, time_base) },
        };

        let config = unsafe { CodecConfig::from_raw(par, codec)? };
        return Ok((index, descriptor, config));
    }

    Err(Error::unsupported(
        "no hardware-decodable video stream (H.264, H.265, AV1) found",
    ))
}

/// Average frame rate, then the real base frame rate, then 25 fps.
/// A zero numerator means "unknown" and falls through.
unsafe fn resolve_frame_rate(stream: *mut ffi::AVStream) -> f64 {
    let avg = rational_from_raw(unsafe { (*stream).avg_frame_rate });
    if avg.num != 0 && avg.den != 0 {
        return avg.to_f64();
    }
    let real = rational_from_raw(unsafe { (*stream).r_frame_rate });
    if real.num != 0 && real.den != 0 {
        return real.to_f64();
    }
    DEFAULT_FRAME_RATE
}

unsafe fn resolve_duration(
    ctx: *mut ffi::AVFormatContext,
    stream: *mut ffi::AVStream,
    time_base: Rational,
) -> f64 {
    let stream_duration = unsafe { (*stream).duration };
    if stream_duration != NO_PTS && time_base.is_valid() {
        return time_base.ticks_to_seconds(stream_duration);
    }
    // Fall back to the container-level estimate in AV_TIME_BASE units.
    let container_duration = unsafe { (*ctx).duration };
    if container_duration != NO_PTS && container_duration > 0 {
        return container_duration as f64 / ffi::AV_TIME_BASE as f64;
    }
    0.0
}
