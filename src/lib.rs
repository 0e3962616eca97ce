//! flock-scene
//!
//! An animated 3D scene: three glTF birds (parrot, flamingo, stork) flying
//! in place in front of a pale blue sky, lit by a hemisphere and a
//! directional light, with a perspective camera the user can orbit, dolly
//! and pan. Runs natively in a winit window or in the browser inside a
//! container element.
//!
//! High-level modules
//! - `scene`: the scene controller: setup, asset arrival, frame loop, resize
//! - `animation`: keyframe samplers, clips and per-model animation mixers
//! - `camera`: perspective camera and its uniform
//! - `controls`: orbit controls driven by pointer input
//! - `config`: every tunable of the scene with the stock defaults
//! - `data_structures`: scene graph, meshes, materials, transforms, textures
//! - `resources`: fetching and parsing glTF assets
//! - `render`: the renderer trait and its wgpu implementation
//! - `pipelines`: render pipelines and light uniforms
//! - `context`: window, surface and device
//! - `flow`: the application event loop hosting the controller
//!

pub mod animation;
pub mod camera;
pub mod config;
pub mod context;
pub mod controls;
pub mod data_structures;
pub mod flow;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;

// Re-exports commonly used types for convenience in downstream code.
pub use config::{ModelSpec, SceneConfig};
pub use flow::run;
pub use render::{FrameRenderer, WgpuRenderer};
pub use scene::{Clock, Container, InstantClock, LoadOutcome, SceneController};
pub use winit::event::WindowEvent;
