use log::warn;

use crate::data_structures::model::{ImageData, Material};

/// Bind group layout of a material: base colour texture and its sampler.
pub fn base_color_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("Material texture_bind_group_layout"),
    })
}

pub fn load_material(material: &gltf::Material, images: &[gltf::image::Data]) -> Material {
    let base_color_texture = material
        .pbr_metallic_roughness()
        .base_color_texture()
        .and_then(|info| images.get(info.texture().source().index()))
        .and_then(to_rgba8);
    Material {
        name: material.name().unwrap_or("unnamed_material").to_string(),
        base_color_texture,
        double_sided: material.double_sided(),
    }
}

/// Expands a decoded glTF image to RGBA8; formats wider than 8 bits per
/// channel are dropped.
pub fn to_rgba8(image: &gltf::image::Data) -> Option<ImageData> {
    use gltf::image::Format;
    use image::{DynamicImage, ImageBuffer};

    let (width, height, pixels) = (image.width, image.height, image.pixels.clone());
    let decoded = match image.format {
        Format::R8G8B8A8 => ImageBuffer::from_raw(width, height, pixels).map(DynamicImage::ImageRgba8),
        Format::R8G8B8 => ImageBuffer::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
        Format::R8G8 => ImageBuffer::from_raw(width, height, pixels).map(DynamicImage::ImageLumaA8),
        Format::R8 => ImageBuffer::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8),
        other => {
            warn!("Ignoring base colour texture in unsupported format {:?}", other);
            return None;
        }
    };
    let Some(decoded) = decoded else {
        warn!("Base colour texture data does not match its {}x{} size", width, height);
        return None;
    };
    Some(ImageData {
        width,
        height,
        rgba: decoded.to_rgba8().into_raw(),
    })
}
