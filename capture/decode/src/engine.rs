/*!
    The hardware decode engine.

    Wraps an FFmpeg decoder context bound to a GPU device context. The
    engine refuses software output: the format negotiation callback only
    ever accepts the backend's hardware pixel format, and a frame that
    arrives in system memory anyway is reported as a configuration
    error.
*/

use std::ffi::c_void;
use std::ptr;
use std::sync::Arc;

use ffmpeg_next::codec;
use ffmpeg_next::ffi;
use ffmpeg_next::frame;
use log::{debug, info};

use capture_source::CodecConfig;
use capture_types::{
    DecodeSession, DecodedFrame, DecoderSurface, Error, FramePoll, GpuDevice, GpuFormat, Packet,
    Rational, Result, StreamDescriptor,
};

use crate::extract::resolve_surface;
use crate::registry::{Backend, DecoderInfo};

/// `AV_NOPTS_VALUE`; the cast macro is not visible through bindgen.
const NO_PTS: i64 = i64::MIN;

/// Owns the hardware device context buffer ref.
struct HwDeviceCtx(*mut ffi::AVBufferRef);

impl Drop for HwDeviceCtx {
    fn drop(&mut self) {
        unsafe {
            ffi::av_buffer_unref(&mut self.0);
        }
    }
}

// Only ever touched from the thread that owns the engine.
unsafe impl Send for HwDeviceCtx {}

/**
    A hardware-only decode session for a single video stream.

    Construction is fail-fast: if the registry offers no backend for
    the stream's codec, or the device context cannot be created, `new`
    returns an error instead of degrading to software decode.
*/
pub struct HardwareEngine {
    decoder: codec::decoder::Video,
    _hw_ctx: HwDeviceCtx,
    device: Arc<dyn GpuDevice>,
    backend: Backend,
    stream_time_base: Rational,
    eof_sent: bool,
}

impl HardwareEngine {
    pub fn new(
        config: CodecConfig,
        descriptor: &StreamDescriptor,
        info: &DecoderInfo,
        device: Arc<dyn GpuDevice>,
    ) -> Result<Self> {
        let codec_kind = config.codec();
        if !info.available {
            return Err(Error::unsupported(format!(
                "no hardware decoder for {}",
                codec_kind.name()
            )));
        }
        let backend = info
            .backend
            .ok_or_else(|| Error::configuration("available decoder carries no backend"))?;
        let stream_time_base = descriptor.time_base;

        let hw_ctx = create_device_context(backend, device.as_ref())?;

        let mut ctx = codec::context::Context::from_parameters(config.into_parameters())
            .map_err(|e| Error::codec(format!("failed to build decoder context: {}", e)))?;

        unsafe {
            let raw = ctx.as_mut_ptr();
            (*raw).hw_device_ctx = ffi::av_buffer_ref(hw_ctx.0);
            // The negotiation callback reads the wanted format out of
            // the opaque slot; it has no other channel back to us.
            (*raw).opaque = backend.hw_pixel_format() as isize as *mut c_void;
            (*raw).get_format = Some(negotiate_hw_format);
        }

        let implementation = ffmpeg_next::decoder::find_by_name(info.name).ok_or_else(|| {
            Error::unsupported(format!("decoder {} not present in this build", info.name))
        })?;
        let decoder = ctx
            .decoder()
            .open_as(implementation)
            .map_err(|e| Error::codec(format!("failed to open {}: {}", info.name, e)))?
            .video()
            .map_err(|e| Error::codec(format!("{} is not a video decoder: {}", info.name, e)))?;

        info!(
            "hardware decode engine ready: {} via {}",
            info.name,
            backend.name()
        );

        Ok(Self {
            decoder,
            _hw_ctx: hw_ctx,
            device,
            backend,
            stream_time_base,
            eof_sent: false,
        })
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /**
        Feed a compressed packet, or begin draining with `None`.

        [`Error::WouldBlock`] means the decoder's input queue is full;
        drain a frame and resend the same packet. Feeding a packet once
        draining has begun is not an error; the packet is ignored.
    */
    pub fn submit(&mut self, packet: Option<&Packet>) -> Result<()> {
        match packet {
            Some(pkt) => {
                if self.eof_sent {
                    return Ok(());
                }
                let mut raw = ffmpeg_next::Packet::copy(&pkt.data);
                raw.set_pts(pkt.pts.map(|p| p.0));
                raw.set_dts(pkt.dts.map(|p| p.0));
                map_send_result(self.decoder.send_packet(&raw))
            }
            None => {
                if self.eof_sent {
                    return Ok(());
                }
                let result = map_send_result(self.decoder.send_eof());
                if result.is_ok() {
                    self.eof_sent = true;
                }
                result
            }
        }
    }

    /**
        Pull the next decoded frame as a GPU texture.
    */
    pub fn poll_frame(&mut self) -> Result<FramePoll> {
        let mut frame = frame::Video::empty();
        match self.decoder.receive_frame(&mut frame) {
            Ok(()) => Ok(FramePoll::Frame(self.export_frame(&frame)?)),
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffi::EAGAIN => {
                Ok(FramePoll::Pending)
            }
            Err(ffmpeg_next::Error::Eof) => Ok(FramePoll::EndOfStream),
            Err(e) => Err(Error::codec(format!("failed to receive frame: {}", e))),
        }
    }

    /**
        Drop all buffered decoder state. Required after a demuxer seek
        and before reusing the engine on a new position.
    */
    pub fn flush(&mut self) {
        self.decoder.flush();
        self.eof_sent = false;
    }

    fn export_frame(&self, frame: &frame::Video) -> Result<DecodedFrame> {
        let raw = unsafe { frame.as_ptr() };

        let (format_code, width, height) = unsafe {
            ((*raw).format, (*raw).width.max(0) as u32, (*raw).height.max(0) as u32)
        };
        if format_code != self.backend.hw_pixel_format() as i32 {
            return Err(Error::configuration(
                "decoded frame is not resident in GPU memory",
            ));
        }

        let (texture_ptr, array_layer) = unsafe {
            let layer = match self.backend {
                // On D3D11 the frame is a slice of a texture array.
                Backend::D3d11va => (*raw).data[1] as usize as u32,
                Backend::Nvdec => 0,
            };
            ((*raw).data[0] as *mut c_void, layer)
        };
        if texture_ptr.is_null() {
            return Err(Error::codec("decoded frame carries no surface pointer"));
        }

        let texture = unsafe { self.device.wrap_decoder_texture(texture_ptr)? };
        let surface = DecoderSurface {
            texture,
            array_layer,
            width,
            height,
        };
        let resolved = resolve_surface(self.device.as_ref(), &surface)?;

        let pts_secs = unsafe { self.frame_time(raw) };
        let keyframe = unsafe {
            (*raw).flags & ffi::AV_FRAME_FLAG_KEY as i32 != 0
                || (*raw).pict_type == ffi::AVPictureType::AV_PICTURE_TYPE_I
        };
        let format = unsafe { surface_format(raw) };

        debug!(
            "decoded frame {}x{} at {:.3}s ({}){}",
            width,
            height,
            pts_secs,
            self.backend.name(),
            if keyframe { " [key]" } else { "" }
        );

        Ok(DecodedFrame {
            texture: resolved,
            width,
            height,
            pts_secs,
            keyframe,
            layout: format.layout(),
            format,
        })
    }

    /// Presentation time in seconds, preferring the stream time base.
    unsafe fn frame_time(&self, raw: *const ffi::AVFrame) -> f64 {
        let pts = unsafe {
            let pts = (*raw).pts;
            if pts != NO_PTS {
                pts
            } else {
                (*raw).best_effort_timestamp
            }
        };
        if pts == NO_PTS {
            return 0.0;
        }
        if self.stream_time_base.is_valid() {
            return self.stream_time_base.ticks_to_seconds(pts);
        }
        let codec_tb = unsafe { (*self.decoder.as_ptr()).time_base };
        let codec_tb = Rational::new(codec_tb.num, codec_tb.den);
        if codec_tb.is_valid() {
            codec_tb.ticks_to_seconds(pts)
        } else {
            0.0
        }
    }
}

impl DecodeSession for HardwareEngine {
    fn submit(&mut self, packet: Option<&Packet>) -> Result<()> {
        HardwareEngine::submit(self, packet)
    }

    fn poll_frame(&mut self) -> Result<FramePoll> {
        HardwareEngine::poll_frame(self)
    }
}

/// The send side of the decoder maps EOF to success: once draining has
/// begun, further input is simply ignored.
fn map_send_result(result: std::result::Result<(), ffmpeg_next::Error>) -> Result<()> {
    match result {
        Ok(()) | Err(ffmpeg_next::Error::Eof) => Ok(()),
        Err(ffmpeg_next::Error::Other { errno }) if errno == ffi::EAGAIN => {
            Err(Error::WouldBlock)
        }
        Err(e) => Err(Error::codec(format!("failed to send to decoder: {}", e))),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum DeviceBinding {
    /// Build the FFmpeg context around the caller's driver device.
    Adopted(*mut c_void),
    /// Let FFmpeg open a device of its own.
    Owned,
}

/// Decoded D3D11 surfaces are only usable on the device that owns them,
/// so when the caller's device exposes its driver handle the decode
/// context must be built around that handle rather than a fresh device.
fn select_device_binding(backend: Backend, handle: Option<*mut c_void>) -> DeviceBinding {
    match (backend, handle) {
        (Backend::D3d11va, Some(handle)) => DeviceBinding::Adopted(handle),
        _ => DeviceBinding::Owned,
    }
}

fn create_device_context(backend: Backend, device: &dyn GpuDevice) -> Result<HwDeviceCtx> {
    match select_device_binding(backend, device.raw_device_handle()) {
        DeviceBinding::Adopted(handle) => adopt_device_context(backend, handle),
        DeviceBinding::Owned => unsafe {
            let mut ctx: *mut ffi::AVBufferRef = ptr::null_mut();
            let ret = ffi::av_hwdevice_ctx_create(
                &mut ctx,
                backend.device_type(),
                ptr::null(),
                ptr::null_mut(),
                0,
            );
            if ret < 0 {
                return Err(Error::unsupported(format!(
                    "failed to create {} device context ({})",
                    backend.name(),
                    ret
                )));
            }
            Ok(HwDeviceCtx(ctx))
        },
    }
}

/**
    Builds the hardware device context around the caller's own driver
    device, so decoded surfaces come out on the device the rest of the
    pipeline uses.

    The backend-specific context begins with the driver device pointer.
    The handle's reference is consumed; it is released when the context
    is freed.
*/
fn adopt_device_context(backend: Backend, handle: *mut c_void) -> Result<HwDeviceCtx> {
    unsafe {
        let raw = ffi::av_hwdevice_ctx_alloc(backend.device_type());
        if raw.is_null() {
            return Err(Error::codec(format!(
                "failed to allocate {} device context",
                backend.name()
            )));
        }
        let ctx = HwDeviceCtx(raw);
        let device_ctx = (*raw).data as *mut ffi::AVHWDeviceContext;
        *((*device_ctx).hwctx as *mut *mut c_void) = handle;
        let ret = ffi::av_hwdevice_ctx_init(raw);
        if ret < 0 {
            return Err(Error::unsupported(format!(
                "failed to bind {} device context ({})",
                backend.name(),
                ret
            )));
        }
        Ok(ctx)
    }
}

/**
    Pick the hardware pixel format out of the decoder's candidate list.

    Returning `AV_PIX_FMT_NONE` when the hardware format is absent makes
    FFmpeg fail the decode instead of silently negotiating a software
    format.
*/
unsafe extern "C" fn negotiate_hw_format(
    ctx: *mut ffi::AVCodecContext,
    mut formats: *const ffi::AVPixelFormat,
) -> ffi::AVPixelFormat {
    let wanted = unsafe { (*ctx).opaque } as isize as i32;
    unsafe {
        while *formats as i32 != ffi::AVPixelFormat::AV_PIX_FMT_NONE as i32 {
            if *formats as i32 == wanted {
                return *formats;
            }
            formats = formats.add(1);
        }
    }
    ffi::AVPixelFormat::AV_PIX_FMT_NONE
}

/// The software layout backing the opaque surface, from the frames context.
unsafe fn surface_format(raw: *const ffi::AVFrame) -> GpuFormat {
    let frames_ref = unsafe { (*raw).hw_frames_ctx };
    if frames_ref.is_null() {
        return GpuFormat::Opaque420;
    }
    let frames_ctx = unsafe { (*frames_ref).data } as *const ffi::AVHWFramesContext;
    match unsafe { (*frames_ctx).sw_format } {
        ffi::AVPixelFormat::AV_PIX_FMT_NV12 => GpuFormat::Nv12,
        ffi::AVPixelFormat::AV_PIX_FMT_P010LE => GpuFormat::P010,
        _ => GpuFormat::Opaque420,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(value: usize) -> *mut c_void {
        value as *mut c_void
    }

    #[test]
    fn d3d11_binding_adopts_the_callers_device() {
        let raw = handle(0x1000);
        assert_eq!(
            select_device_binding(Backend::D3d11va, Some(raw)),
            DeviceBinding::Adopted(raw)
        );
    }

    #[test]
    fn missing_device_handle_falls_back_to_a_fresh_device() {
        assert_eq!(
            select_device_binding(Backend::D3d11va, None),
            DeviceBinding::Owned
        );
    }

    #[test]
    fn cuda_backend_opens_its_own_device() {
        assert_eq!(
            select_device_binding(Backend::Nvdec, Some(handle(0x2000))),
            DeviceBinding::Owned
        );
    }

    #[test]
    fn send_side_eof_is_success() {
        assert!(map_send_result(Err(ffmpeg_next::Error::Eof)).is_ok());
    }

    #[test]
    fn full_send_queue_asks_for_a_resend() {
        let mapped = map_send_result(Err(ffmpeg_next::Error::Other { errno: ffi::EAGAIN }));
        assert!(matches!(mapped, Err(Error::WouldBlock)));
    }

    #[test]
    fn other_send_failures_surface_as_codec_errors() {
        let mapped = map_send_result(Err(ffmpeg_next::Error::InvalidData));
        assert!(matches!(mapped, Err(Error::Codec(_))));
    }
}
