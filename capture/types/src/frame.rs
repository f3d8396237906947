/*!
    Decoded frame type.
*/

use crate::{GpuFormat, GpuTexture, PixelLayout};

/**
    One decoded, GPU-resident video frame.

    A `DecodedFrame` that exists is always valid: its texture is a
    single-slice, directly sampleable resource, never a live handle into
    decoder-owned multi-slice storage. Producers signal "no frame" with
    `Option<DecodedFrame>`.

    The texture handle is reference-counted; ownership transfers to
    whoever receives the frame, and the pipeline keeps no strong reference
    after handing it out.
*/
#[derive(Clone, Debug)]
pub struct DecodedFrame {
    /// GPU texture holding the pixels.
    pub texture: GpuTexture,
    /// Decode-true width in pixels (not padded allocation width).
    pub width: u32,
    /// Decode-true height in pixels (not padded allocation height).
    pub height: u32,
    /// Presentation time in seconds.
    pub pts_secs: f64,
    /// True if this frame is a keyframe (I-frame).
    pub keyframe: bool,
    /// Whether the texture is directly presentable or needs a YUV pass.
    pub layout: PixelLayout,
    /// GPU pixel format of the texture.
    pub format: GpuFormat,
}
