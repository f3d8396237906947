/*!
    The `VideoCapture` facade.
*/

use std::path::Path;
use std::sync::Arc;

use log::{debug, info};

use capture_decode::{DecoderRegistry, HardwareEngine};
use capture_source::{DataSource, Demuxer};
use capture_types::{DecodedFrame, Error, GpuDevice, Result, StreamDescriptor, VideoCodec};

use crate::pump::decode_next;

/**
    Queryable and settable capture properties.

    Numeric IDs follow the conventional capture-property numbering so
    code ported from other capture APIs keeps working unchanged.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    /// Playback position in milliseconds.
    PosMsec = 0,
    /// Zero-based index of the frame the next read returns.
    PosFrames = 1,
    /// Playback position as a 0.0 to 1.0 fraction of the duration.
    PosRatio = 2,
    FrameWidth = 3,
    FrameHeight = 4,
    Fps = 5,
    /// Codec FourCC packed little-endian into the float.
    Fourcc = 6,
    /// Frame count estimated from duration and frame rate.
    FrameCount = 7,
}

impl Property {
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(Property::PosMsec),
            1 => Some(Property::PosFrames),
            2 => Some(Property::PosRatio),
            3 => Some(Property::FrameWidth),
            4 => Some(Property::FrameHeight),
            5 => Some(Property::Fps),
            6 => Some(Property::Fourcc),
            7 => Some(Property::FrameCount),
            _ => None,
        }
    }

    pub fn id(self) -> i32 {
        self as i32
    }
}

struct OpenState {
    demuxer: Demuxer,
    engine: HardwareEngine,
    descriptor: StreamDescriptor,
    eof_sent: bool,
    /// Index of the frame the next read will return.
    next_frame_index: u64,
    last_pts_secs: f64,
}

/**
    Sequential hardware-decoded frame reader over a file or byte source.

    Opening probes the machine for a hardware backend and fails if none
    can decode the stream's codec; there is no software path. Frames
    come back as GPU textures owned by the caller.
*/
pub struct VideoCapture {
    device: Arc<dyn GpuDevice>,
    state: Option<OpenState>,
}

impl VideoCapture {
    /**
        Open a media file for hardware-decoded reading. The registry
        must have been probed; an unprobed one fails as "no decoder".
    */
    pub fn open(
        path: impl AsRef<Path>,
        registry: &DecoderRegistry,
        device: Arc<dyn GpuDevice>,
    ) -> Result<Self> {
        let demuxer = Demuxer::open_path(path)?;
        Self::from_demuxer(demuxer, registry, device)
    }

    /**
        Open an arbitrary byte source, such as an in-memory buffer fed
        by a network transport. Raw elementary streams need a
        `format_hint` ("h264", "hevc") to demux at all.
    */
    pub fn open_source(
        source: Box<dyn DataSource>,
        format_hint: Option<&str>,
        registry: &DecoderRegistry,
        device: Arc<dyn GpuDevice>,
    ) -> Result<Self> {
        let demuxer = Demuxer::open_source(source, format_hint)?;
        Self::from_demuxer(demuxer, registry, device)
    }

    fn from_demuxer(
        demuxer: Demuxer,
        registry: &DecoderRegistry,
        device: Arc<dyn GpuDevice>,
    ) -> Result<Self> {
        let descriptor = demuxer.descriptor().clone();
        let decoder = registry.best_decoder(descriptor.codec);
        let engine = HardwareEngine::new(
            demuxer.codec_config(),
            &descriptor,
            &decoder,
            Arc::clone(&device),
        )?;
        info!(
            "capture open: {} {}x{} via {}",
            descriptor.codec.name(),
            descriptor.width,
            descriptor.height,
            engine.backend().name()
        );
        Ok(Self {
            device,
            state: Some(OpenState {
                demuxer,
                engine,
                descriptor,
                eof_sent: false,
                next_frame_index: 0,
                last_pts_secs: 0.0,
            }),
        })
    }

    pub fn is_opened(&self) -> bool {
        self.state.is_some()
    }

    /**
        The GPU device frames are resident on.
    */
    pub fn device(&self) -> &Arc<dyn GpuDevice> {
        &self.device
    }

    /**
        Properties of the selected video stream, while open.
    */
    pub fn descriptor(&self) -> Option<&StreamDescriptor> {
        self.state.as_ref().map(|s| &s.descriptor)
    }

    /**
        Decode and return the next frame, or `Ok(None)` at end of
        stream.
    */
    pub fn read(&mut self) -> Result<Option<DecodedFrame>> {
        let state = self.state.as_mut().ok_or_else(not_open)?;
        let frame = decode_next(&mut state.demuxer, &mut state.engine, &mut state.eof_sent)?;
        if let Some(frame) = &frame {
            state.next_frame_index += 1;
            state.last_pts_secs = frame.pts_secs;
        }
        Ok(frame)
    }

    /**
        Query a capture property. Unknown state reads as 0.
    */
    pub fn get(&self, property: Property) -> Result<f64> {
        let state = self.state.as_ref().ok_or_else(not_open)?;
        let d = &state.descriptor;
        Ok(match property {
            Property::PosMsec => state.last_pts_secs * 1000.0,
            Property::PosFrames => state.next_frame_index as f64,
            Property::PosRatio => {
                if d.duration_secs > 0.0 {
                    (state.last_pts_secs / d.duration_secs).clamp(0.0, 1.0)
                } else {
                    0.0
                }
            }
            Property::FrameWidth => d.width as f64,
            Property::FrameHeight => d.height as f64,
            Property::Fps => d.frame_rate,
            Property::Fourcc => fourcc(d.codec) as f64,
            Property::FrameCount => d.approx_frame_count() as f64,
        })
    }

    /**
        Set a capture property. Only the position properties are
        writable; positions seek to the keyframe at or before the
        target, flush the decoder, and rearm the stream after a prior
        end of stream.
    */
    pub fn set(&mut self, property: Property, value: f64) -> Result<()> {
        let state = self.state.as_mut().ok_or_else(not_open)?;
        match property {
            Property::PosFrames => {
                if value < 0.0 {
                    return Err(Error::invalid_data("frame position must be non-negative"));
                }
                let frame_index = value as u64;
                state.demuxer.seek_to_frame(frame_index)?;
                state.after_seek(frame_index);
                Ok(())
            }
            Property::PosMsec => {
                if value < 0.0 {
                    return Err(Error::invalid_data("time position must be non-negative"));
                }
                let seconds = value / 1000.0;
                state.demuxer.seek_to_time(seconds)?;
                state.after_seek((seconds * state.descriptor.frame_rate) as u64);
                Ok(())
            }
            Property::PosRatio => {
                if !(0.0..=1.0).contains(&value) {
                    return Err(Error::invalid_data("position ratio must be within 0..=1"));
                }
                let seconds = value * state.descriptor.duration_secs;
                state.demuxer.seek_to_time(seconds)?;
                state.after_seek((seconds * state.descriptor.frame_rate) as u64);
                Ok(())
            }
            _ => Err(Error::unsupported(format!(
                "property {:?} is read-only",
                property
            ))),
        }
    }

    /**
        Close the stream and release decode resources. Safe to call
        more than once.
    */
    pub fn release(&mut self) {
        if self.state.take().is_some() {
            debug!("capture released");
        }
    }
}

impl OpenState {
    /// Decoder and position bookkeeping after a successful demuxer seek.
    fn after_seek(&mut self, frame_index: u64) {
        self.engine.flush();
        self.eof_sent = false;
        self.next_frame_index = frame_index;
        self.last_pts_secs = if self.descriptor.frame_rate > 0.0 {
            frame_index as f64 / self.descriptor.frame_rate
        } else {
            0.0
        };
    }
}

fn not_open() -> Error {
    Error::configuration("capture is not open")
}

/// Conventional FourCC tag for the codec, packed little-endian.
fn fourcc(codec: VideoCodec) -> u32 {
    let tag: &[u8; 4] = match codec {
        VideoCodec::H264 => b"H264",
        VideoCodec::H265 => b"HEVC",
        VideoCodec::Av1 => b"AV01",
    };
    u32::from_le_bytes(*tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_ids_round_trip() {
        for id in 0..8 {
            let property = Property::from_id(id).unwrap();
            assert_eq!(property.id(), id);
        }
        assert_eq!(Property::from_id(8), None);
        assert_eq!(Property::from_id(-1), None);
    }

    #[test]
    fn fourcc_packs_little_endian() {
        assert_eq!(fourcc(VideoCodec::H264), u32::from_le_bytes(*b"H264"));
        assert_eq!(fourcc(VideoCodec::H265), u32::from_le_bytes(*b"HEVC"));
        assert_eq!(fourcc(VideoCodec::Av1), u32::from_le_bytes(*b"AV01"));
    }
}
