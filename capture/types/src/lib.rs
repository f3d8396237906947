/*!
    Shared types for the capture crate ecosystem.

    This crate defines the vocabulary of the ecosystem: the types that cross
    crate boundaries. It has no dependency on FFmpeg or any GPU runtime,
    enabling consumers to depend on it without pulling in heavy bindings.
*/

mod error;
mod format;
mod frame;
mod gpu;
mod packet;
mod session;
mod stream;
mod time;

pub use error::{Error, Result};
pub use format::{GpuFormat, PixelLayout, VideoCodec};
pub use frame::DecodedFrame;
pub use gpu::{
    DecoderSurface, GpuDevice, GpuTexture, GpuTextureResource, TextureDesc, headless,
};
pub use packet::Packet;
pub use session::{DecodeSession, FramePoll, PacketSource};
pub use stream::StreamDescriptor;
pub use time::{Pts, Rational};
