use log::{debug, warn};
use thiserror::Error;

use crate::{
    animation::AnimationClip,
    data_structures::{
        instance::Instance,
        model::{Material, Mesh},
        scene_graph::{Node, NodeId},
    },
};

/**
 * This module contains all logic for loading glTF assets from remote URLs or local files.
 */
pub mod animation;
pub mod mesh;
pub mod texture;

/// Future returned by asset loads. Loads run on another task natively, so
/// they must be `Send` there; in the browser they stay on the main thread.
#[cfg(not(target_arch = "wasm32"))]
pub type AssetFuture<T> = futures::future::BoxFuture<'static, T>;
#[cfg(target_arch = "wasm32")]
pub type AssetFuture<T> = futures::future::LocalBoxFuture<'static, T>;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("[asset] {0}")]
    Gltf(#[from] gltf::Error),

    #[error("[asset] glTF document contains no scene")]
    NoScene,

    #[error("[asset] {url} answered with status {status}")]
    Status { url: String, status: u16 },
}

/// A parsed glTF document, decoupled from the GPU.
///
/// Node, mesh and material indices are local to the asset.
#[derive(Clone, Debug, Default)]
pub struct GltfAsset {
    pub nodes: Vec<Node>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub animations: Vec<AnimationClip>,
    /// Root nodes of the default scene, in document order.
    pub scene_roots: Vec<usize>,
}

impl GltfAsset {
    /// First root node of the default scene: the model proper for the usual
    /// single-object export.
    pub fn first_root(&self) -> Option<usize> {
        self.scene_roots.first().copied()
    }
}

/// Source of glTF assets, keyed by URL.
pub trait AssetLoader {
    fn load(&self, url: &str) -> AssetFuture<anyhow::Result<GltfAsset>>;
}

/// Fetches assets over HTTP(S), or from `./assets/` for plain paths on native.
#[derive(Clone, Copy, Debug, Default)]
pub struct GltfLoader;

impl AssetLoader for GltfLoader {
    fn load(&self, url: &str) -> AssetFuture<anyhow::Result<GltfAsset>> {
        let url = url.to_string();
        Box::pin(async move {
            let bytes = load_binary(&url).await?;
            debug!("fetched {} bytes from {}", bytes.len(), url);
            Ok(parse_gltf(&bytes)?)
        })
    }
}

fn is_remote(file_name: &str) -> bool {
    file_name.starts_with("http://") || file_name.starts_with("https://")
}

async fn fetch(url: &str) -> anyhow::Result<Vec<u8>> {
    let response = reqwest::get(url).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AssetError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }
        .into());
    }
    Ok(response.bytes().await?.to_vec())
}

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().ok_or_else(|| anyhow::anyhow!("no window"))?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| anyhow::anyhow!("page has no origin"))?;
    let base = reqwest::Url::parse(&format!("{}/assets/", origin))?;
    Ok(base.join(file_name)?)
}

pub async fn load_binary(file_name: &str) -> anyhow::Result<Vec<u8>> {
    if is_remote(file_name) {
        return fetch(file_name).await;
    }
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(file_name)?;
        fetch(url.as_str()).await?
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let path = std::path::Path::new(file_name);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::path::Path::new("./").join("assets").join(file_name)
        };
        std::fs::read(path)?
    };

    Ok(data)
}

/// Parses a binary (`.glb`) or self-contained glTF document.
pub fn parse_gltf(bytes: &[u8]) -> Result<GltfAsset, AssetError> {
    let (document, buffers, images) = gltf::import_slice(bytes)?;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or(AssetError::NoScene)?;
    let scene_roots = scene.nodes().map(|n| n.index()).collect();

    let mut materials: Vec<Material> = document
        .materials()
        .map(|m| texture::load_material(&m, &images))
        .collect();
    // primitives without a material fall back to the trailing default one
    let default_material = materials.len();
    materials.push(Material::default());

    let meshes = document
        .meshes()
        .map(|m| mesh::load_mesh(&m, &buffers, default_material))
        .collect();

    let nodes = document
        .nodes()
        .map(|node| Node {
            name: node.name().map(str::to_string),
            local: Instance::from_decomposed(node.transform().decomposed()),
            mesh: node.mesh().map(|m| m.index()),
            children: node.children().map(|c| NodeId(c.index())).collect(),
            morph_weights: node.weights().map(<[f32]>::to_vec).unwrap_or_default(),
        })
        .collect();

    let animations = animation::load_animations(&document, &buffers);
    if animations.is_empty() {
        warn!("glTF document contains no animations");
    }

    Ok(GltfAsset {
        nodes,
        meshes,
        materials,
        animations,
        scene_roots,
    })
}
