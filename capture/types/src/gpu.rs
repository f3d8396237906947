/*!
    The GPU collaborator boundary.

    The decode pipeline never talks to a GPU runtime directly. It sees an
    opaque device through [`GpuDevice`] and hands frames around as
    reference-counted [`GpuTexture`] handles. Real backends wrap a driver
    device (D3D11, CUDA); the [`headless`] module provides a synthetic
    device for tests and headless runs.
*/

use std::ffi::c_void;
use std::fmt;
use std::sync::Arc;

use crate::{GpuFormat, Result};

/**
    Allocation-level description of a GPU texture.

    `width`/`height` here are allocation dimensions, which hardware decoders
    may pad for alignment. Decode-true video dimensions travel separately on
    [`DecoderSurface`] and [`crate::DecodedFrame`].
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: GpuFormat,
    /// Number of array slices. Hardware decode ring buffers commonly
    /// allocate one texture with many slices.
    pub array_layers: u32,
}

impl TextureDesc {
    /**
        A single-slice variant of this description at the given dimensions.
    */
    pub fn single_layer(&self, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: self.format,
            array_layers: 1,
        }
    }
}

/**
    A GPU texture resource as owned by a backend.

    Implementations hold the underlying driver handle and release it when
    the last [`GpuTexture`] clone is dropped.
*/
pub trait GpuTextureResource: Send + Sync {
    fn desc(&self) -> TextureDesc;
}

/**
    Reference-counted handle to a GPU texture.

    Cloning is cheap and shares the underlying resource; the resource is
    released when the last handle drops. Ownership of a handle returned
    from the pipeline transfers to the caller.
*/
#[derive(Clone)]
pub struct GpuTexture {
    inner: Arc<dyn GpuTextureResource>,
}

impl GpuTexture {
    pub fn new(resource: Arc<dyn GpuTextureResource>) -> Self {
        Self { inner: resource }
    }

    pub fn desc(&self) -> TextureDesc {
        self.inner.desc()
    }

    /**
        True if both handles refer to the same underlying resource.
    */
    pub fn ptr_eq(&self, other: &GpuTexture) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for GpuTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let desc = self.desc();
        f.debug_struct("GpuTexture")
            .field("width", &desc.width)
            .field("height", &desc.height)
            .field("format", &desc.format)
            .field("array_layers", &desc.array_layers)
            .finish()
    }
}

/**
    An opaque GPU device plus immediate context, supplied once at
    pipeline construction.

    The pipeline uses it for exactly three things: adopting decoder-owned
    textures, allocating single-slice shader-readable targets, and
    device-side sub-resource copies. Rendering is someone else's job.
*/
pub trait GpuDevice: Send + Sync {
    /**
        Allocate a texture with shader-readable binding.
    */
    fn create_texture(&self, desc: &TextureDesc) -> Result<GpuTexture>;

    /**
        Device-side copy of exactly one array slice of `src` into `dst`.

        When the slice is larger than `dst` (padded decoder allocation),
        only the region covered by `dst` is copied.
    */
    fn copy_texture_layer(&self, src: &GpuTexture, src_layer: u32, dst: &GpuTexture)
    -> Result<()>;

    /**
        Adopt a decoder-owned raw texture pointer, adding a reference so the
        handle stays alive independent of the decoder's reuse of the slot.

        # Safety

        `raw` must be a live texture pointer belonging to this device, as
        surfaced by the decode session bound to it.
    */
    unsafe fn wrap_decoder_texture(&self, raw: *mut c_void) -> Result<GpuTexture>;

    /**
        Raw driver device handle for binding the hardware decode session to
        this device, when the backend has one. `None` lets the decoder
        create its own default device.

        The returned handle must carry a reference owned by the caller;
        the decode session consumes it and releases it when its device
        context is freed.
    */
    fn raw_device_handle(&self) -> Option<*mut c_void> {
        None
    }
}

/**
    The engine-internal view of one decoded hardware frame: its backing
    texture (possibly one slice of a shared array), and the decode-true
    video dimensions from the frame metadata rather than the padded
    allocation dimensions.
*/
#[derive(Clone, Debug)]
pub struct DecoderSurface {
    pub texture: GpuTexture,
    pub array_layer: u32,
    pub width: u32,
    pub height: u32,
}

pub mod headless {
    /*!
        A synthetic GPU device for tests and headless runs.

        Allocations and copies are recorded rather than performed, which is
        exactly what the frame-extraction tests need to assert the
        zero-copy rule.
    */

    use std::collections::HashMap;
    use std::ffi::c_void;
    use std::sync::{Arc, Mutex};

    use super::{GpuDevice, GpuTexture, GpuTextureResource, TextureDesc};
    use crate::{Error, GpuFormat, Result};

    struct HeadlessTexture {
        desc: TextureDesc,
    }

    impl GpuTextureResource for HeadlessTexture {
        fn desc(&self) -> TextureDesc {
            self.desc
        }
    }

    /**
        A recorded sub-resource copy.
    */
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct CopyRecord {
        pub src_layer: u32,
        pub dst_width: u32,
        pub dst_height: u32,
    }

    #[derive(Default)]
    struct State {
        /// Raw pointers registered as decoder-owned textures.
        imports: HashMap<usize, TextureDesc>,
        allocations: u64,
        copies: Vec<CopyRecord>,
    }

    /**
        Synthetic [`GpuDevice`] that fabricates textures and records every
        allocation and copy.
    */
    #[derive(Default)]
    pub struct HeadlessDevice {
        state: Mutex<State>,
    }

    impl HeadlessDevice {
        pub fn new() -> Self {
            Self::default()
        }

        /**
            Build a standalone texture handle without going through the
            device (does not count as an allocation).
        */
        pub fn make_texture(desc: TextureDesc) -> GpuTexture {
            GpuTexture::new(Arc::new(HeadlessTexture { desc }))
        }

        /**
            Register a raw pointer so [`GpuDevice::wrap_decoder_texture`]
            can resolve it to a description.
        */
        pub fn register_import(&self, raw: *mut c_void, desc: TextureDesc) {
            self.state
                .lock()
                .unwrap()
                .imports
                .insert(raw as usize, desc);
        }

        /**
            Number of textures allocated through [`GpuDevice::create_texture`].
        */
        pub fn allocation_count(&self) -> u64 {
            self.state.lock().unwrap().allocations
        }

        /**
            All sub-resource copies issued so far.
        */
        pub fn copies(&self) -> Vec<CopyRecord> {
            self.state.lock().unwrap().copies.clone()
        }
    }

    impl GpuDevice for HeadlessDevice {
        fn create_texture(&self, desc: &TextureDesc) -> Result<GpuTexture> {
            self.state.lock().unwrap().allocations += 1;
            Ok(Self::make_texture(*desc))
        }

        fn copy_texture_layer(
            &self,
            _src: &GpuTexture,
            src_layer: u32,
            dst: &GpuTexture,
        ) -> Result<()> {
            let dst_desc = dst.desc();
            self.state.lock().unwrap().copies.push(CopyRecord {
                src_layer,
                dst_width: dst_desc.width,
                dst_height: dst_desc.height,
            });
            Ok(())
        }

        unsafe fn wrap_decoder_texture(&self, raw: *mut c_void) -> Result<GpuTexture> {
            let state = self.state.lock().unwrap();
            let desc = state.imports.get(&(raw as usize)).copied().unwrap_or(
                // Unregistered pointers get a minimal single-slice NV12
                // description; good enough for smoke runs without a GPU.
                TextureDesc {
                    width: 0,
                    height: 0,
                    format: GpuFormat::Nv12,
                    array_layers: 1,
                },
            );
            if raw.is_null() {
                return Err(Error::configuration("null decoder texture pointer"));
            }
            Ok(Self::make_texture(desc))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::headless::HeadlessDevice;
    use super::*;
    use crate::GpuFormat;

    fn desc(layers: u32) -> TextureDesc {
        TextureDesc {
            width: 1920,
            height: 1088,
            format: GpuFormat::Nv12,
            array_layers: layers,
        }
    }

    #[test]
    fn texture_handles_share_identity() {
        let tex = HeadlessDevice::make_texture(desc(1));
        let clone = tex.clone();
        assert!(tex.ptr_eq(&clone));

        let other = HeadlessDevice::make_texture(desc(1));
        assert!(!tex.ptr_eq(&other));
    }

    #[test]
    fn single_layer_desc_keeps_format() {
        let d = desc(8).single_layer(1920, 1080);
        assert_eq!(d.array_layers, 1);
        assert_eq!(d.width, 1920);
        assert_eq!(d.height, 1080);
        assert_eq!(d.format, GpuFormat::Nv12);
    }

    #[test]
    fn headless_device_records_allocations_and_copies() {
        let device = HeadlessDevice::new();
        assert_eq!(device.allocation_count(), 0);

        let src = HeadlessDevice::make_texture(desc(4));
        let dst = device.create_texture(&desc(4).single_layer(1920, 1080)).unwrap();
        assert_eq!(device.allocation_count(), 1);

        device.copy_texture_layer(&src, 2, &dst).unwrap();
        let copies = device.copies();
        assert_eq!(copies.len(), 1);
        assert_eq!(copies[0].src_layer, 2);
        assert_eq!(copies[0].dst_width, 1920);
    }
}
