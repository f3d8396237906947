/*!
    Data sources and demuxing for the capture crate ecosystem.

    This crate handles the input side of the pipeline: a polymorphic byte
    source abstraction (files, in-memory buffers, live byte streams), and a
    demuxer that parses containers through FFmpeg and produces the
    compressed access units the decode crate consumes.
*/

mod buffer;
mod codec_config;
mod convert;
mod data_source;
mod demuxer;
mod file;
mod io_bridge;

pub use buffer::BufferSource;
pub use codec_config::CodecConfig;
pub use data_source::DataSource;
pub use demuxer::Demuxer;
pub use file::FileSource;
