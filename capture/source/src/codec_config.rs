/*!
    Opaque codec configuration for passing to decoders.
*/

use ffmpeg_next::codec;
use ffmpeg_next::ffi;

use capture_types::{Error, Result, VideoCodec};

/**
    Opaque codec configuration extracted from a source stream.

    This holds the codec parameters needed to create a decoder.
    It's intentionally opaque to hide ffmpeg-next types from the public API.

    Pass this to `capture-decode` to create a hardware decoder for this
    stream.
*/
pub struct CodecConfig {
    /// The raw codec parameters.
    parameters: codec::Parameters,
    codec: VideoCodec,
}

impl CodecConfig {
    /**
        Create a new codec config by copying raw stream parameters.

        # Safety

        `raw` must point to a valid `AVCodecParameters` owned by a live
        format context.
    */
    pub(crate) unsafe fn from_raw(
        raw: *const ffi::AVCodecParameters,
        codec: VideoCodec,
    ) -> Result<Self> {
        let mut parameters = codec::Parameters::new();
        let ret = unsafe { ffi::avcodec_parameters_copy(parameters.as_mut_ptr(), raw) };
        if ret < 0 {
            return Err(Error::codec(format!(
                "failed to copy codec parameters ({})",
                ret
            )));
        }
        Ok(Self { parameters, codec })
    }

    /**
        The codec carried by the stream these parameters describe.
    */
    pub fn codec(&self) -> VideoCodec {
        self.codec
    }

    /**
        Consume the config, yielding the internal parameters for decoder
        construction.
    */
    pub fn into_parameters(self) -> codec::Parameters {
        self.parameters
    }
}

impl Clone for CodecConfig {
    fn clone(&self) -> Self {
        Self {
            parameters: self.parameters.clone(),
            codec: self.codec,
        }
    }
}

impl std::fmt::Debug for CodecConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecConfig")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}
