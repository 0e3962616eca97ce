//! CPU-side mesh and material data.
//!
//! Loaded assets keep their geometry on the CPU so that morph targets can be
//! blended every frame; the renderer mirrors it into GPU buffers lazily.

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
    /// Vertex colour already multiplied with the material's base colour factor.
    pub color: [f32; 4],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// Per-vertex displacements of one morph target.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MorphTarget {
    pub positions: Vec<[f32; 3]>,
    /// Empty when the target does not displace normals.
    pub normals: Vec<[f32; 3]>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Primitive {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    pub morph_targets: Vec<MorphTarget>,
    pub material: usize,
}

impl Primitive {
    /// Returns the vertices with `weights` applied to the morph targets.
    ///
    /// Missing weights count as zero, surplus weights are ignored.
    pub fn blend(&self, weights: &[f32]) -> Vec<ModelVertex> {
        let mut vertices = self.vertices.clone();
        for (target, &weight) in self.morph_targets.iter().zip(weights) {
            if weight == 0.0 {
                continue;
            }
            for (vertex, delta) in vertices.iter_mut().zip(&target.positions) {
                vertex.position[0] += delta[0] * weight;
                vertex.position[1] += delta[1] * weight;
                vertex.position[2] += delta[2] * weight;
            }
            for (vertex, delta) in vertices.iter_mut().zip(&target.normals) {
                vertex.normal[0] += delta[0] * weight;
                vertex.normal[1] += delta[1] * weight;
                vertex.normal[2] += delta[2] * weight;
            }
        }
        vertices
    }

    pub fn is_morphed(&self) -> bool {
        !self.morph_targets.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub primitives: Vec<Primitive>,
    /// Default morph weights declared on the mesh.
    pub weights: Vec<f32>,
}

/// Decoded RGBA8 image used as a base colour texture.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub base_color_texture: Option<ImageData>,
    pub double_sided: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color_texture: None,
            double_sided: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_with_target() -> Primitive {
        let vertex = |x: f32| ModelVertex {
            position: [x, 0.0, 0.0],
            normal: [0.0, 1.0, 0.0],
            ..Default::default()
        };
        Primitive {
            vertices: vec![vertex(0.0), vertex(1.0), vertex(2.0)],
            indices: vec![0, 1, 2],
            morph_targets: vec![MorphTarget {
                positions: vec![[0.0, 2.0, 0.0]; 3],
                normals: Vec::new(),
            }],
            material: 0,
        }
    }

    #[test]
    fn blend_scales_target_by_weight() {
        let primitive = triangle_with_target();

        let blended = primitive.blend(&[0.25]);

        assert_eq!(blended[1].position, [1.0, 0.5, 0.0]);
        assert_eq!(blended[1].normal, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn blend_without_weights_is_base_mesh() {
        let primitive = triangle_with_target();

        assert_eq!(primitive.blend(&[]), primitive.vertices);
    }
}
