//! Scene data structures: scene graph, transforms, meshes, colours and textures.
//!
//! - `color` holds linear RGB colours authored as sRGB hex codes
//! - `instance` holds per-node transformation data and its GPU layout
//! - `model` contains CPU mesh, morph target and material definitions
//! - `scene_graph` is the arena scene the controller mutates and the renderer draws
//! - `texture` contains the GPU texture wrapper and creation utilities

pub mod color;
pub mod instance;
pub mod model;
pub mod scene_graph;
pub mod texture;
