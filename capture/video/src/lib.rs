/*!
    Hardware-accelerated video capture facade.

    Ties the source, demuxing, and decode crates into a single
    sequential reader with a small property surface for querying stream
    metadata and repositioning playback. Frames come back as GPU
    textures and never touch system memory.
*/

mod capture;
mod pump;

pub use capture::{Property, VideoCapture};
pub use pump::{MAX_DECODE_ATTEMPTS, decode_next};
