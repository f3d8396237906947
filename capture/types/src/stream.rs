/*!
    Stream information types.
*/

use crate::{Rational, VideoCodec};

/**
    Description of the selected video stream, derived once the container
    is opened. Immutable after stream selection.
*/
#[derive(Clone, Debug)]
pub struct StreamDescriptor {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Codec carried by the stream.
    pub codec: VideoCodec,
    /// Time base for timestamps on this stream.
    pub time_base: Rational,
    /// Frames per second (container average, real rate, or the 25 fallback).
    pub frame_rate: f64,
    /// Container-level duration in seconds, 0.0 when unknown.
    pub duration_secs: f64,
}

impl StreamDescriptor {
    /**
        Duration of a single frame in seconds.
    */
    pub fn frame_interval(&self) -> f64 {
        if self.frame_rate > 0.0 {
            1.0 / self.frame_rate
        } else {
            0.0
        }
    }

    /**
        Approximate total frame count: duration × frame rate, or 0 when
        either is unknown.
    */
    pub fn approx_frame_count(&self) -> i64 {
        if self.duration_secs > 0.0 && self.frame_rate > 0.0 {
            (self.duration_secs * self.frame_rate) as i64
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> StreamDescriptor {
        StreamDescriptor {
            width: 1920,
            height: 1080,
            codec: VideoCodec::H264,
            time_base: Rational::new(1, 90000),
            frame_rate: 30.0,
            duration_secs: 10.0,
        }
    }

    #[test]
    fn frame_count_is_duration_times_rate() {
        assert_eq!(descriptor().approx_frame_count(), 300);
    }

    #[test]
    fn frame_count_zero_when_duration_unknown() {
        let mut d = descriptor();
        d.duration_secs = 0.0;
        assert_eq!(d.approx_frame_count(), 0);
    }

    #[test]
    fn frame_interval() {
        assert!((descriptor().frame_interval() - 1.0 / 30.0).abs() < 1e-9);
    }
}
