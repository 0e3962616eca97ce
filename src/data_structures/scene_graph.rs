//! Scene graph and hierarchical scene organization.
//!
//! The scene is an arena: nodes, meshes and materials live in flat vectors
//! and reference each other by index. Loaded assets use the same [`Node`]
//! type with asset-local indices, which [`Scene::attach`] remaps when a
//! subtree is cloned into the scene.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use log::warn;

use crate::{
    data_structures::{
        color::Color,
        instance::Instance,
        model::{Material, Mesh},
    },
    resources::GltfAsset,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Node {
    pub name: Option<String>,
    pub local: Instance,
    pub mesh: Option<usize>,
    pub children: Vec<NodeId>,
    /// Current morph target weights; empty means the mesh defaults apply.
    pub morph_weights: Vec<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Light {
    /// Sky colour from above fading into ground colour from below.
    Hemisphere {
        sky_color: Color,
        ground_color: Color,
        intensity: f32,
    },
    /// Parallel light shining from `position` towards the origin.
    Directional {
        color: Color,
        intensity: f32,
        position: cgmath::Point3<f32>,
    },
}

/// Result of cloning an asset subtree into the scene.
#[derive(Clone, Debug)]
pub struct Attached {
    pub root: NodeId,
    /// Asset node index to the node that now represents it in the scene.
    pub node_map: HashMap<usize, NodeId>,
}

static NEXT_SCENE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
pub struct Scene {
    pub background: Option<Color>,
    id: u64,
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
    meshes: Vec<Mesh>,
    materials: Vec<Material>,
    lights: Vec<Light>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            id: NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed),
            ..Default::default()
        }
    }

    /// Distinguishes scene instances, so caches keyed by index can tell when
    /// they are handed a different scene.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Adds `node` under `parent`, or as a root when `parent` is `None`.
    pub fn add_node(&mut self, node: Node, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        match parent.and_then(|p| self.nodes.get_mut(p.0)) {
            Some(parent) => parent.children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn mesh(&self, idx: usize) -> Option<&Mesh> {
        self.meshes.get(idx)
    }

    pub fn material(&self, idx: usize) -> Option<&Material> {
        self.materials.get(idx)
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Clones the subtree rooted at asset node `source_root` into the scene
    /// as a new root. Meshes and materials referenced by the asset are copied
    /// along, so the asset can be dropped afterwards.
    pub fn attach(&mut self, asset: &GltfAsset, source_root: usize) -> Option<Attached> {
        if source_root >= asset.nodes.len() {
            return None;
        }
        let mesh_offset = self.meshes.len();
        let material_offset = self.materials.len();
        self.meshes.extend(asset.meshes.iter().cloned().map(|mut mesh| {
            mesh.primitives
                .iter_mut()
                .for_each(|p| p.material += material_offset);
            mesh
        }));
        self.materials.extend(asset.materials.iter().cloned());

        let mut node_map = HashMap::new();
        let root = self.clone_node(asset, source_root, None, mesh_offset, &mut node_map);
        Some(Attached { root, node_map })
    }

    fn clone_node(
        &mut self,
        asset: &GltfAsset,
        source: usize,
        parent: Option<NodeId>,
        mesh_offset: usize,
        node_map: &mut HashMap<usize, NodeId>,
    ) -> NodeId {
        let source_node = &asset.nodes[source];
        let node = Node {
            name: source_node.name.clone(),
            local: source_node.local,
            mesh: source_node.mesh.map(|m| m + mesh_offset),
            children: Vec::new(),
            morph_weights: source_node.morph_weights.clone(),
        };
        let id = self.add_node(node, parent);
        node_map.insert(source, id);
        for child in &source_node.children {
            if child.0 >= asset.nodes.len() || node_map.contains_key(&child.0) {
                warn!("Skipping invalid or repeated child {} of asset node {}", child.0, source);
                continue;
            }
            self.clone_node(asset, child.0, Some(id), mesh_offset, node_map);
        }
        id
    }

    /// World transform of every node, indexed by `NodeId`.
    ///
    /// Nodes that are not reachable from a root keep the identity transform.
    pub fn world_transforms(&self) -> Vec<Instance> {
        let mut world = vec![Instance::default(); self.nodes.len()];
        let mut visited = vec![false; self.nodes.len()];
        let mut stack: Vec<(NodeId, Instance)> = self
            .roots
            .iter()
            .map(|&root| (root, Instance::default()))
            .collect();
        while let Some((id, parent)) = stack.pop() {
            let Some(node) = self.nodes.get(id.0) else {
                continue;
            };
            if visited[id.0] {
                continue;
            }
            visited[id.0] = true;
            let transform = &parent * &node.local;
            world[id.0] = transform;
            stack.extend(node.children.iter().map(|&child| (child, transform)));
        }
        world
    }

    /// Morph weights in effect for `node`: its own, else the mesh defaults.
    pub fn effective_weights(&self, node: &Node) -> Vec<f32> {
        if !node.morph_weights.is_empty() {
            return node.morph_weights.clone();
        }
        node.mesh
            .and_then(|m| self.meshes.get(m))
            .map(|mesh| mesh.weights.clone())
            .unwrap_or_default()
    }
}
