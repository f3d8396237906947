/*!
    Hardware video decoding for the capture crate ecosystem.

    Decoding is hardware-only: the engine binds a GPU device context to
    the codec, forces decoded frames to stay resident in GPU memory, and
    surfaces them as textures. There is no software fallback; when no
    capable backend exists, engine construction fails.
*/

mod engine;
mod extract;
mod registry;

pub use engine::HardwareEngine;
pub use extract::resolve_surface;
pub use registry::{Backend, DecoderInfo, DecoderRegistry};
