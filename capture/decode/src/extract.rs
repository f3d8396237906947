/*!
    Resolving decoder surfaces into standalone textures.
*/

use capture_types::{DecoderSurface, GpuDevice, GpuTexture, Result};

/**
    Turn a decoder surface into a texture the caller can own.

    A dedicated single-slice texture is shared as-is with no copy; the
    allocation may be padded past the video dimensions, which is why
    decode-true dimensions travel as frame metadata rather than being
    read off the texture. Surfaces living in an array-backed decoder
    pool are copied out into a fresh single-slice texture at the true
    video dimensions, so the decoder can recycle the slot.
*/
pub fn resolve_surface(device: &dyn GpuDevice, surface: &DecoderSurface) -> Result<GpuTexture> {
    let desc = surface.texture.desc();

    if desc.array_layers == 1 && surface.array_layer == 0 {
        return Ok(surface.texture.clone());
    }

    let target = desc.single_layer(surface.width, surface.height);
    let dst = device.create_texture(&target)?;
    device.copy_texture_layer(&surface.texture, surface.array_layer, &dst)?;
    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture_types::{GpuFormat, TextureDesc, headless::HeadlessDevice};

    fn surface(desc: TextureDesc, layer: u32, width: u32, height: u32) -> DecoderSurface {
        DecoderSurface {
            texture: HeadlessDevice::make_texture(desc),
            array_layer: layer,
            width,
            height,
        }
    }

    #[test]
    fn dedicated_surface_is_shared_without_copy() {
        let device = HeadlessDevice::new();
        let desc = TextureDesc {
            width: 1280,
            height: 720,
            format: GpuFormat::Nv12,
            array_layers: 1,
        };
        let surface = surface(desc, 0, 1280, 720);

        let resolved = resolve_surface(&device, &surface).unwrap();

        assert!(resolved.ptr_eq(&surface.texture));
        assert_eq!(device.allocation_count(), 0);
        assert!(device.copies().is_empty());
    }

    #[test]
    fn array_slice_is_copied_to_fresh_texture() {
        let device = HeadlessDevice::new();
        // Decoder pool texture: 8 slices, height padded to a macroblock
        // multiple.
        let desc = TextureDesc {
            width: 1920,
            height: 1088,
            format: GpuFormat::Nv12,
            array_layers: 8,
        };
        let surface = surface(desc, 3, 1920, 1080);

        let resolved = resolve_surface(&device, &surface).unwrap();

        assert!(!resolved.ptr_eq(&surface.texture));
        assert_eq!(device.allocation_count(), 1);

        let out = resolved.desc();
        assert_eq!(out.array_layers, 1);
        assert_eq!((out.width, out.height), (1920, 1080));
        assert_eq!(out.format, GpuFormat::Nv12);

        let copies = device.copies();
        assert_eq!(copies.len(), 1);
        assert_eq!(copies[0].src_layer, 3);
        assert_eq!((copies[0].dst_width, copies[0].dst_height), (1920, 1080));
    }

    #[test]
    fn padded_single_slice_is_still_shared() {
        let device = HeadlessDevice::new();
        // Padded allocation; the true 1080 height rides on the frame
        // metadata, not the texture.
        let desc = TextureDesc {
            width: 1920,
            height: 1088,
            format: GpuFormat::P010,
            array_layers: 1,
        };
        let surface = surface(desc, 0, 1920, 1080);

        let resolved = resolve_surface(&device, &surface).unwrap();

        assert!(resolved.ptr_eq(&surface.texture));
        assert_eq!(device.allocation_count(), 0);
        assert!(device.copies().is_empty());
    }
}
