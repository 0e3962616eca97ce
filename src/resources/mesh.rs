use cgmath::{InnerSpace, Vector3};
use log::warn;

use crate::data_structures::model::{self, ModelVertex, MorphTarget};

/**
 * Reads every triangle primitive of `mesh` into CPU vertex data.
 *
 * Vertex colours are pre-multiplied with the material's base colour factor so
 * the shader only has to multiply with the base colour texture. Primitives
 * without positions or with a non-triangle topology are skipped.
 */
pub fn load_mesh(
    mesh: &gltf::Mesh,
    buffers: &[gltf::buffer::Data],
    default_material: usize,
) -> model::Mesh {
    let name = mesh.name().unwrap_or("unknown_mesh").to_string();
    let primitives = mesh
        .primitives()
        .filter_map(|primitive| {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                warn!(
                    "Skipping primitive {} of mesh {}: {:?} is not supported",
                    primitive.index(),
                    name,
                    primitive.mode()
                );
                return None;
            }
            load_primitive(&primitive, buffers, default_material)
        })
        .collect();

    model::Mesh {
        name,
        primitives,
        weights: mesh.weights().map(<[f32]>::to_vec).unwrap_or_default(),
    }
}

fn load_primitive(
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
    default_material: usize,
) -> Option<model::Primitive> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| d.0.as_slice()));

    let Some(positions) = reader.read_positions() else {
        warn!("Skipping primitive {} without positions", primitive.index());
        return None;
    };
    let mut vertices: Vec<ModelVertex> = positions
        .map(|position| ModelVertex {
            position,
            color: [1.0; 4],
            ..Default::default()
        })
        .collect();

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };
    if let Some(&max) = indices.iter().max() {
        if max as usize >= vertices.len() {
            warn!(
                "Skipping primitive {}: index {} out of range for {} vertices",
                primitive.index(),
                max,
                vertices.len()
            );
            return None;
        }
    }

    match reader.read_normals() {
        Some(normals) => vertices
            .iter_mut()
            .zip(normals)
            .for_each(|(v, normal)| v.normal = normal),
        None => compute_normals(&mut vertices, &indices),
    }
    if let Some(tex_coords) = reader.read_tex_coords(0).map(|t| t.into_f32()) {
        vertices
            .iter_mut()
            .zip(tex_coords)
            .for_each(|(v, uv)| v.tex_coords = uv);
    }
    if let Some(colors) = reader.read_colors(0).map(|c| c.into_rgba_f32()) {
        vertices
            .iter_mut()
            .zip(colors)
            .for_each(|(v, color)| v.color = color);
    }

    let material = primitive.material();
    let factor = material.pbr_metallic_roughness().base_color_factor();
    vertices.iter_mut().for_each(|v| {
        for (c, f) in v.color.iter_mut().zip(factor) {
            *c *= f;
        }
    });

    let morph_targets = reader
        .read_morph_targets()
        .map(|(positions, normals, _tangents)| MorphTarget {
            positions: positions.map(|p| p.collect()).unwrap_or_default(),
            normals: normals.map(|n| n.collect()).unwrap_or_default(),
        })
        .collect();

    Some(model::Primitive {
        vertices,
        indices,
        morph_targets,
        material: material.index().unwrap_or(default_material),
    })
}

/// Smooth normals from triangle faces, for primitives that ship without them.
fn compute_normals(vertices: &mut [ModelVertex], indices: &[u32]) {
    let mut normals = vec![Vector3::new(0.0f32, 0.0, 0.0); vertices.len()];
    for c in indices.chunks_exact(3) {
        let [a, b, d] = [c[0] as usize, c[1] as usize, c[2] as usize];
        let pos0: Vector3<f32> = vertices[a].position.into();
        let pos1: Vector3<f32> = vertices[b].position.into();
        let pos2: Vector3<f32> = vertices[d].position.into();
        // area-weighted face normal
        let face = (pos1 - pos0).cross(pos2 - pos0);
        normals[a] += face;
        normals[b] += face;
        normals[d] += face;
    }
    for (vertex, normal) in vertices.iter_mut().zip(normals) {
        if normal.magnitude2() > 0.0 {
            vertex.normal = normal.normalize().into();
        }
    }
}
