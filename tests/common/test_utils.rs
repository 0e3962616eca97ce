#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, VecDeque},
    rc::Rc,
};

use cgmath::Vector3;
use flock_scene::{
    Clock, Container, FrameRenderer, ModelSpec, SceneConfig, SceneController,
    camera::PerspectiveCamera,
    data_structures::scene_graph::Scene,
    resources::{AssetFuture, AssetLoader, GltfAsset, parse_gltf},
};

/// What the fake renderer saw.
#[derive(Debug, Default)]
pub struct RenderLog {
    pub renders: usize,
    /// Mesh nodes in the scene at each render.
    pub mesh_nodes: Vec<usize>,
    pub aspects: Vec<f32>,
    pub sizes: Vec<(u32, u32)>,
    pub pixel_ratios: Vec<f64>,
    pub fail_next_render: bool,
}

pub struct FakeRenderer {
    pub log: Rc<RefCell<RenderLog>>,
    pub frame_requests: Cell<usize>,
}

impl FakeRenderer {
    pub fn new() -> (Self, Rc<RefCell<RenderLog>>) {
        let log = Rc::new(RefCell::new(RenderLog::default()));
        (
            Self {
                log: log.clone(),
                frame_requests: Cell::new(0),
            },
            log,
        )
    }
}

impl FrameRenderer for FakeRenderer {
    fn set_pixel_ratio(&mut self, ratio: f64) {
        self.log.borrow_mut().pixel_ratios.push(ratio);
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.log.borrow_mut().sizes.push((width, height));
    }

    fn size(&self) -> (u32, u32) {
        self.log.borrow().sizes.last().copied().unwrap_or((0, 0))
    }

    fn request_frame(&self) {
        self.frame_requests.set(self.frame_requests.get() + 1);
    }

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> anyhow::Result<()> {
        let mut log = self.log.borrow_mut();
        if log.fail_next_render {
            log.fail_next_render = false;
            anyhow::bail!("device lost");
        }
        log.renders += 1;
        log.mesh_nodes
            .push(scene.nodes().filter(|(_, node)| node.mesh.is_some()).count());
        log.aspects.push(camera.aspect);
        Ok(())
    }
}

/// Container whose size and pixel ratio the test can change after handing it over.
pub struct FakeContainer {
    size: Rc<Cell<(u32, u32)>>,
    ratio: Rc<Cell<f64>>,
}

impl FakeContainer {
    pub fn new(width: u32, height: u32) -> (Box<dyn Container>, Rc<Cell<(u32, u32)>>) {
        Self::with_ratio(width, height, 1.0)
    }

    pub fn with_ratio(
        width: u32,
        height: u32,
        ratio: f64,
    ) -> (Box<dyn Container>, Rc<Cell<(u32, u32)>>) {
        let (container, size, _) = Self::with_shared_ratio(width, height, ratio);
        (container, size)
    }

    /// Like `with_ratio`, also handing back the ratio so a test can move
    /// the window to another display.
    pub fn with_shared_ratio(
        width: u32,
        height: u32,
        ratio: f64,
    ) -> (Box<dyn Container>, Rc<Cell<(u32, u32)>>, Rc<Cell<f64>>) {
        let size = Rc::new(Cell::new((width, height)));
        let ratio = Rc::new(Cell::new(ratio));
        (
            Box::new(Self {
                size: size.clone(),
                ratio: ratio.clone(),
            }),
            size,
            ratio,
        )
    }
}

impl Container for FakeContainer {
    fn client_width(&self) -> u32 {
        self.size.get().0
    }

    fn client_height(&self) -> u32 {
        self.size.get().1
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.ratio.get()
    }
}

/// Serves canned assets by URL; unknown URLs fail like a 404.
#[derive(Clone, Default)]
pub struct FakeLoader {
    assets: HashMap<String, Result<GltfAsset, String>>,
}

impl FakeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, url: &str, asset: GltfAsset) -> Self {
        self.assets.insert(url.to_string(), Ok(asset));
        self
    }

    pub fn with_failure(mut self, url: &str, message: &str) -> Self {
        self.assets.insert(url.to_string(), Err(message.to_string()));
        self
    }
}

impl AssetLoader for FakeLoader {
    fn load(&self, url: &str) -> AssetFuture<anyhow::Result<GltfAsset>> {
        let result = match self.assets.get(url) {
            Some(Ok(asset)) => Ok(asset.clone()),
            Some(Err(message)) => Err(anyhow::anyhow!("{}", message)),
            None => Err(anyhow::anyhow!("{} answered with status 404", url)),
        };
        Box::pin(futures::future::ready(result))
    }
}

/// Hands out scripted deltas, then zeros.
#[derive(Clone, Default)]
pub struct ManualClock {
    deltas: Rc<RefCell<VecDeque<f32>>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, delta: f32) {
        self.deltas.borrow_mut().push_back(delta);
    }
}

impl Clock for ManualClock {
    fn delta(&mut self) -> f32 {
        self.deltas.borrow_mut().pop_front().unwrap_or(0.0)
    }
}

pub const PARROT_URL: &str = "test://parrot.glb";
pub const FLAMINGO_URL: &str = "test://flamingo.glb";
pub const STORK_URL: &str = "test://stork.glb";

/// The stock scene with the models pointed at the fake loader.
pub fn test_config() -> SceneConfig {
    let mut config = SceneConfig::default();
    config.models = vec![
        ModelSpec::new("parrot", PARROT_URL, Vector3::new(0.0, 0.0, 2.5)),
        ModelSpec::new("flamingo", FLAMINGO_URL, Vector3::new(7.5, 0.0, -10.0)),
        ModelSpec::new("stork", STORK_URL, Vector3::new(0.0, -2.5, -10.0)),
    ];
    config
}

pub fn bird() -> GltfAsset {
    parse_gltf(&animated_triangle_glb(true)).expect("test asset parses")
}

pub fn still_bird() -> GltfAsset {
    parse_gltf(&animated_triangle_glb(false)).expect("test asset parses")
}

/// Loader serving a bird at every default URL.
pub fn flock_loader() -> FakeLoader {
    FakeLoader::new()
        .with_asset(PARROT_URL, bird())
        .with_asset(FLAMINGO_URL, bird())
        .with_asset(STORK_URL, bird())
}

pub struct Harness {
    pub controller: SceneController<FakeRenderer>,
    pub log: Rc<RefCell<RenderLog>>,
    pub size: Rc<Cell<(u32, u32)>>,
    pub clock: ManualClock,
    /// Pending loads in request order; taken as they are finished.
    pub loads: Vec<Option<flock_scene::scene::LoadTask>>,
}

/// An initialized controller with the loads still pending.
pub fn initialized(loader: FakeLoader, width: u32, height: u32) -> Harness {
    let (renderer, log) = FakeRenderer::new();
    let clock = ManualClock::new();
    let mut controller = SceneController::new(test_config(), renderer, loader, clock.clone());
    let (container, size) = FakeContainer::new(width, height);
    let loads = controller.initialize(container).into_iter().map(Some).collect();
    Harness {
        controller,
        log,
        size,
        clock,
        loads,
    }
}

impl Harness {
    /// Resolves the pending loads in the given order and applies each result.
    pub fn finish_loads_in(&mut self, order: &[usize]) {
        for &i in order {
            if let Some(load) = self.loads.get_mut(i).and_then(Option::take) {
                let outcome = futures::executor::block_on(load);
                self.controller.on_model_loaded(outcome);
            }
        }
    }

    pub fn finish_loads(&mut self) {
        let order: Vec<usize> = (0..self.loads.len()).collect();
        self.finish_loads_in(&order);
    }
}

/// A binary glTF with one root node "Bird" whose child "Body" carries a
/// single triangle with one morph target. With `animated`, clip "Fly"
/// (one second long) drives the morph weight from 0 to 1 and lifts the
/// body from y = 0 to y = 2.
pub fn animated_triangle_glb(animated: bool) -> Vec<u8> {
    fn push_f32(bin: &mut Vec<u8>, values: &[f32]) {
        for v in values {
            bin.extend_from_slice(&v.to_le_bytes());
        }
    }

    let mut bin: Vec<u8> = Vec::new();
    // 0: positions
    push_f32(&mut bin, &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    // 36: indices, padded to 4
    for i in [0u16, 1, 2] {
        bin.extend_from_slice(&i.to_le_bytes());
    }
    bin.extend_from_slice(&[0, 0]);
    // 44: morph target displacements
    push_f32(&mut bin, &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
    // 80: keyframe times
    push_f32(&mut bin, &[0.0, 1.0]);
    // 88: weights
    push_f32(&mut bin, &[0.0, 1.0]);
    // 96: translations
    push_f32(&mut bin, &[0.0, 0.0, 0.0, 0.0, 2.0, 0.0]);
    assert_eq!(bin.len(), 120);

    let animations = if animated {
        r#","animations":[{"name":"Fly","samplers":[
            {"input":3,"output":4,"interpolation":"LINEAR"},
            {"input":3,"output":5,"interpolation":"LINEAR"}],
          "channels":[
            {"sampler":0,"target":{"node":1,"path":"weights"}},
            {"sampler":1,"target":{"node":1,"path":"translation"}}]}]"#
    } else {
        ""
    };
    let json = format!(
        r#"{{"asset":{{"version":"2.0"}},"scene":0,"scenes":[{{"nodes":[0]}}],
        "nodes":[{{"name":"Bird","children":[1]}},{{"name":"Body","mesh":0}}],
        "meshes":[{{"name":"body","weights":[0.0],"primitives":[{{"attributes":{{"POSITION":0}},"indices":1,"targets":[{{"POSITION":2}}]}}]}}],
        "buffers":[{{"byteLength":120}}],
        "bufferViews":[
            {{"buffer":0,"byteOffset":0,"byteLength":36}},
            {{"buffer":0,"byteOffset":36,"byteLength":6}},
            {{"buffer":0,"byteOffset":44,"byteLength":36}},
            {{"buffer":0,"byteOffset":80,"byteLength":8}},
            {{"buffer":0,"byteOffset":88,"byteLength":8}},
            {{"buffer":0,"byteOffset":96,"byteLength":24}}],
        "accessors":[
            {{"bufferView":0,"componentType":5126,"count":3,"type":"VEC3","min":[0.0,0.0,0.0],"max":[1.0,1.0,0.0]}},
            {{"bufferView":1,"componentType":5123,"count":3,"type":"SCALAR"}},
            {{"bufferView":2,"componentType":5126,"count":3,"type":"VEC3","min":[0.0,0.0,1.0],"max":[0.0,0.0,1.0]}},
            {{"bufferView":3,"componentType":5126,"count":2,"type":"SCALAR","min":[0.0],"max":[1.0]}},
            {{"bufferView":4,"componentType":5126,"count":2,"type":"SCALAR"}},
            {{"bufferView":5,"componentType":5126,"count":2,"type":"VEC3"}}]{animations}}}"#
    );

    let mut json = json.into_bytes();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }

    let total = 12 + 8 + json.len() + 8 + bin.len();
    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());
    glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"JSON");
    glb.extend_from_slice(&json);
    glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"BIN\0");
    glb.extend_from_slice(&bin);
    glb
}
