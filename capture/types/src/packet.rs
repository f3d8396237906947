/*!
    Compressed access units.
*/

use crate::Pts;

/**
    One compressed access unit as produced by the demuxer.

    Packets are transient: created by one demuxer read, consumed by one
    decoder submit, then dropped. The pipeline never buffers un-submitted
    packets.
*/
#[derive(Clone, Debug)]
pub struct Packet {
    /// Encoded bytes.
    pub data: Vec<u8>,
    /// Presentation timestamp in stream time-base ticks, if known.
    pub pts: Option<Pts>,
    /// Decode timestamp in stream time-base ticks, if known.
    pub dts: Option<Pts>,
    /// Index of the stream this packet belongs to.
    pub stream_index: usize,
    /// True if this packet starts a keyframe.
    pub keyframe: bool,
}
