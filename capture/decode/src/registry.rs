/*!
    Hardware decoder discovery.

    Probing constructs a short-lived device context per backend to
    confirm the driver stack actually works, not just that FFmpeg was
    compiled with support. The probe runs once per registry; reusing
    the registry reuses its results.
*/

use std::ffi::CString;
use std::ptr;

use ffmpeg_next::ffi;
use log::{debug, info};

use capture_types::VideoCodec;

/**
    Hardware decode backends, listed in selection priority order.

    The platform compositing API outranks the vendor-specific path when
    both are present, matching how the rest of the rendering stack picks
    its device.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Backend {
    D3d11va,
    Nvdec,
}

impl Backend {
    pub const ALL: [Backend; 2] = [Backend::D3d11va, Backend::Nvdec];

    pub fn name(self) -> &'static str {
        match self {
            Backend::D3d11va => "d3d11va",
            Backend::Nvdec => "nvdec",
        }
    }

    pub(crate) fn device_type(self) -> ffi::AVHWDeviceType {
        match self {
            Backend::D3d11va => ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_D3D11VA,
            Backend::Nvdec => ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_CUDA,
        }
    }

    pub(crate) fn hw_pixel_format(self) -> ffi::AVPixelFormat {
        match self {
            Backend::D3d11va => ffi::AVPixelFormat::AV_PIX_FMT_D3D11,
            Backend::Nvdec => ffi::AVPixelFormat::AV_PIX_FMT_CUDA,
        }
    }

    /**
        The FFmpeg decoder implementation used for a codec on this
        backend. D3D11VA rides the generic decoders through hwaccel;
        NVDEC has dedicated CUVID decoders.
    */
    pub fn decoder_name(self, codec: VideoCodec) -> &'static str {
        match self {
            Backend::D3d11va => codec.name(),
            Backend::Nvdec => match codec {
                VideoCodec::H264 => "h264_cuvid",
                VideoCodec::H265 => "hevc_cuvid",
                VideoCodec::Av1 => "av1_cuvid",
            },
        }
    }
}

/**
    One concrete decoder choice for a codec.

    `available == false` carries the sentinel returned when no backend
    can decode the codec; callers must check before constructing an
    engine.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderInfo {
    pub backend: Option<Backend>,
    pub name: &'static str,
    pub available: bool,
}

impl DecoderInfo {
    /// Sentinel meaning "no hardware decoder".
    pub fn unavailable() -> Self {
        Self {
            backend: None,
            name: "none",
            available: false,
        }
    }

    fn for_backend(backend: Backend, codec: VideoCodec) -> Self {
        Self {
            backend: Some(backend),
            name: backend.decoder_name(codec),
            available: true,
        }
    }
}

/// A working backend together with the codecs it can decode here.
struct BackendEntry {
    backend: Backend,
    codecs: Vec<VideoCodec>,
}

/**
    The set of hardware backends usable on this machine.

    Created empty and filled by a one-shot [`DecoderRegistry::probe`].
    The registry is a plain owned value threaded by reference to
    whoever needs decoder selection; there is no process-wide instance.
*/
#[derive(Default)]
pub struct DecoderRegistry {
    probed: bool,
    entries: Vec<BackendEntry>,
}

impl DecoderRegistry {
    /// An empty, unprobed registry. Everything reads as unavailable
    /// until [`DecoderRegistry::probe`] runs.
    pub fn new() -> Self {
        Self::default()
    }

    /**
        Probe the machine for working hardware decode backends.

        Each candidate backend gets a real device context created and
        immediately released; backends that survive that round trip are
        registered along with the set of codecs FFmpeg can decode
        through them, one log line per decoder found. Probing again is
        a no-op; later lookups only consult the recorded sets.
    */
    pub fn probe(&mut self) {
        if self.probed {
            return;
        }
        for backend in Backend::ALL {
            if !device_works(backend.device_type()) {
                info!("hardware backend {}: unavailable", backend.name());
                continue;
            }
            let codecs: Vec<VideoCodec> = VideoCodec::ALL
                .into_iter()
                .filter(|codec| backend_supports(backend, *codec))
                .collect();
            for codec in &codecs {
                info!(
                    "hardware decoder found: {} via {}",
                    backend.decoder_name(*codec),
                    backend.name()
                );
            }
            if codecs.is_empty() {
                info!(
                    "hardware backend {}: device present, no decoders",
                    backend.name()
                );
                continue;
            }
            self.entries.push(BackendEntry { backend, codecs });
        }
        self.probed = true;
    }

    pub fn probed(&self) -> bool {
        self.probed
    }

    /**
        Build an already-probed registry from a fixed backend list, each
        backend assumed to decode every allow-listed codec. Intended for
        tests and for callers that manage backend selection themselves.
    */
    pub fn with_backends(backends: Vec<Backend>) -> Self {
        Self::with_codec_support(
            backends
                .into_iter()
                .map(|backend| (backend, VideoCodec::ALL.to_vec()))
                .collect(),
        )
    }

    /**
        Build an already-probed registry from explicit per-backend codec
        sets, bypassing the device probe.
    */
    pub fn with_codec_support(support: Vec<(Backend, Vec<VideoCodec>)>) -> Self {
        Self {
            probed: true,
            entries: support
                .into_iter()
                .map(|(backend, codecs)| BackendEntry { backend, codecs })
                .collect(),
        }
    }

    /// Available backends in priority order.
    pub fn backends(&self) -> Vec<Backend> {
        self.entries.iter().map(|entry| entry.backend).collect()
    }

    /**
        Every decoder that could handle the codec, best first. Answered
        from the probe results without touching the driver stack.
    */
    pub fn decoders(&self, codec: VideoCodec) -> Vec<DecoderInfo> {
        self.entries
            .iter()
            .filter(|entry| entry.codecs.contains(&codec))
            .map(|entry| DecoderInfo::for_backend(entry.backend, codec))
            .collect()
    }

    /**
        The highest-priority decoder for the codec, or the unavailable
        sentinel.
    */
    pub fn best_decoder(&self, codec: VideoCodec) -> DecoderInfo {
        self.decoders(codec)
            .into_iter()
            .next()
            .unwrap_or_else(DecoderInfo::unavailable)
    }
}

/// Create and immediately release a device context of the given type.
fn device_works(device_type: ffi::AVHWDeviceType) -> bool {
    unsafe {
        let mut ctx: *mut ffi::AVBufferRef = ptr::null_mut();
        let ret =
            ffi::av_hwdevice_ctx_create(&mut ctx, device_type, ptr::null(), ptr::null_mut(), 0);
        if ret < 0 {
            debug!("device probe for type {:?} failed ({})", device_type, ret);
            return false;
        }
        ffi::av_buffer_unref(&mut ctx);
        true
    }
}

/// Whether FFmpeg ships a decoder the backend can drive for this codec.
fn backend_supports(backend: Backend, codec: VideoCodec) -> bool {
    let name = backend.decoder_name(codec);
    let Ok(cname) = CString::new(name) else {
        return false;
    };
    unsafe {
        let decoder = ffi::avcodec_find_decoder_by_name(cname.as_ptr());
        if decoder.is_null() {
            return false;
        }
        match backend {
            // CUVID decoders are hardware by construction.
            Backend::Nvdec => true,
            // Generic decoders need an hwaccel config for the device type.
            Backend::D3d11va => {
                let mut i = 0;
                loop {
                    let config = ffi::avcodec_get_hw_config(decoder, i);
                    if config.is_null() {
                        return false;
                    }
                    if (*config).device_type == backend.device_type()
                        && (*config).methods
                            & ffi::AV_CODEC_HW_CONFIG_METHOD_HW_DEVICE_CTX as i32
                            != 0
                    {
                        return true;
                    }
                    i += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_yields_sentinel() {
        let registry = DecoderRegistry::with_backends(Vec::new());
        let info = registry.best_decoder(VideoCodec::H264);
        assert!(!info.available);
        assert_eq!(info.name, "none");
        assert_eq!(info.backend, None);
        assert!(registry.decoders(VideoCodec::Av1).is_empty());
    }

    #[test]
    fn unprobed_registry_offers_nothing() {
        let registry = DecoderRegistry::new();
        assert!(!registry.probed());
        assert!(registry.backends().is_empty());
        assert!(!registry.best_decoder(VideoCodec::H265).available);
    }

    #[test]
    fn probe_results_gate_decoder_selection() {
        let registry = DecoderRegistry::with_codec_support(vec![
            (Backend::D3d11va, vec![VideoCodec::H264, VideoCodec::H265]),
            (Backend::Nvdec, vec![VideoCodec::H264, VideoCodec::Av1]),
        ]);

        // Both backends decode H.264; priority picks d3d11va.
        let best = registry.best_decoder(VideoCodec::H264);
        assert_eq!(best.backend, Some(Backend::D3d11va));
        assert_eq!(registry.decoders(VideoCodec::H264).len(), 2);

        // Only nvdec recorded AV1 support, so selection follows the
        // recorded set rather than backend priority.
        let av1 = registry.best_decoder(VideoCodec::Av1);
        assert_eq!(av1.backend, Some(Backend::Nvdec));
        assert_eq!(av1.name, "av1_cuvid");
        assert_eq!(registry.decoders(VideoCodec::Av1).len(), 1);
    }

    #[test]
    fn backend_priority_prefers_d3d11va() {
        assert!(Backend::D3d11va < Backend::Nvdec);
        assert_eq!(Backend::ALL[0], Backend::D3d11va);
    }

    #[test]
    fn nvdec_decoder_names_follow_cuvid_convention() {
        assert_eq!(Backend::Nvdec.decoder_name(VideoCodec::H264), "h264_cuvid");
        assert_eq!(Backend::Nvdec.decoder_name(VideoCodec::H265), "hevc_cuvid");
        assert_eq!(Backend::Nvdec.decoder_name(VideoCodec::Av1), "av1_cuvid");
    }

    #[test]
    fn d3d11va_rides_generic_decoders() {
        assert_eq!(Backend::D3d11va.decoder_name(VideoCodec::H264), "h264");
        assert_eq!(Backend::D3d11va.decoder_name(VideoCodec::H265), "hevc");
        assert_eq!(Backend::D3d11va.decoder_name(VideoCodec::Av1), "av1");
    }
}
