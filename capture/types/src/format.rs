/*!
    Codec identities and GPU pixel formats.
*/

/**
    Video codecs supported by the hardware decode pipeline.

    This is a closed allow-list, enforced at demuxer open time. Streams
    carrying any other codec are rejected before decode resources are
    allocated.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VideoCodec {
    H264,
    H265,
    Av1,
}

impl VideoCodec {
    /// Every codec on the allow-list.
    pub const ALL: [VideoCodec; 3] = [VideoCodec::H264, VideoCodec::H265, VideoCodec::Av1];

    /**
        Short lowercase name, matching FFmpeg demuxer naming ("h264",
        "hevc", "av1"). Useful as a raw-stream format hint.
    */
    pub const fn name(self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::H265 => "hevc",
            Self::Av1 => "av1",
        }
    }
}

/**
    GPU pixel formats a hardware decoder can hand back.

    This is the subset of texture formats hardware decode sessions produce,
    not a general pixel-format catalogue.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum GpuFormat {
    /// Semi-planar YUV 4:2:0, 8-bit (the common hardware decoder output).
    Nv12,
    /// Semi-planar YUV 4:2:0, 10-bit (HDR hardware decoder output).
    P010,
    /// Driver-opaque 4:2:0 layout; sampleable only via video APIs.
    Opaque420,
    /// Packed BGRA, 8-bit per channel.
    Bgra8,
    /// Packed RGBA, 8-bit per channel.
    Rgba8,
    /// Packed BGRX, 8-bit per channel, alpha ignored.
    Bgrx8,
}

impl GpuFormat {
    /**
        Classify this format for the renderer.

        Packed 4-channel 8-bit formats are directly presentable; everything
        else needs a color-space conversion pass downstream.
    */
    pub const fn layout(self) -> PixelLayout {
        match self {
            Self::Bgra8 | Self::Rgba8 | Self::Bgrx8 => PixelLayout::Rgb,
            Self::Nv12 | Self::P010 | Self::Opaque420 => PixelLayout::Yuv,
        }
    }
}

/**
    How a decoded frame's pixels are laid out, from the renderer's point
    of view.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    /// Directly presentable; no conversion pass needed.
    Rgb,
    /// Planar or semi-planar YUV; needs a conversion pass in a shader.
    Yuv,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_formats_are_rgb() {
        assert_eq!(GpuFormat::Bgra8.layout(), PixelLayout::Rgb);
        assert_eq!(GpuFormat::Rgba8.layout(), PixelLayout::Rgb);
        assert_eq!(GpuFormat::Bgrx8.layout(), PixelLayout::Rgb);
    }

    #[test]
    fn video_formats_are_yuv() {
        assert_eq!(GpuFormat::Nv12.layout(), PixelLayout::Yuv);
        assert_eq!(GpuFormat::P010.layout(), PixelLayout::Yuv);
        assert_eq!(GpuFormat::Opaque420.layout(), PixelLayout::Yuv);
    }

    #[test]
    fn codec_names() {
        assert_eq!(VideoCodec::H264.name(), "h264");
        assert_eq!(VideoCodec::H265.name(), "hevc");
        assert_eq!(VideoCodec::Av1.name(), "av1");
    }
}
