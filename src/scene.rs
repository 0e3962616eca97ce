//! The scene controller.
//!
//! [`SceneController`] owns the camera, the lights, every loaded model with
//! its animation mixer, and the renderer. [`SceneController::initialize`]
//! runs the fixed setup sequence and hands the three asset loads back to the
//! host, which feeds each completion into
//! [`SceneController::on_model_loaded`] whenever it arrives. The host then
//! calls [`SceneController::frame`] once per display refresh for as long as
//! the loop is running.

use log::{debug, error, info, warn};
use winit::event::WindowEvent;

use crate::{
    animation::mixer::AnimationMixer,
    camera::PerspectiveCamera,
    config::{ModelSpec, SceneConfig},
    controls::OrbitControls,
    data_structures::scene_graph::{Light, NodeId, Scene},
    render::FrameRenderer,
    resources::{AssetFuture, AssetLoader, GltfAsset, GltfLoader},
};

/// The element the scene is drawn into.
pub trait Container {
    /// Width in CSS / logical pixels.
    fn client_width(&self) -> u32;
    /// Height in CSS / logical pixels.
    fn client_height(&self) -> u32;
    fn device_pixel_ratio(&self) -> f64 {
        1.0
    }
}

/// Source of frame deltas.
pub trait Clock {
    /// Seconds since the previous call; the first call returns zero.
    fn delta(&mut self) -> f32;
}

/// Wall clock backed by `instant`, which also works in the browser.
#[derive(Debug, Default)]
pub struct InstantClock {
    last: Option<instant::Instant>,
}

impl Clock for InstantClock {
    fn delta(&mut self) -> f32 {
        let now = instant::Instant::now();
        let delta = self
            .last
            .map(|last| now.duration_since(last).as_secs_f32())
            .unwrap_or(0.0);
        self.last = Some(now);
        delta
    }
}

/// A finished asset load, successful or not.
pub struct LoadOutcome {
    pub model: ModelSpec,
    pub result: anyhow::Result<GltfAsset>,
}

pub type LoadTask = AssetFuture<LoadOutcome>;

/// A model that made it into the scene graph.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelEntry {
    pub name: String,
    pub root: NodeId,
    /// Index into [`SceneController::mixers`].
    pub mixer: usize,
}

pub struct SceneController<R: FrameRenderer> {
    config: SceneConfig,
    renderer: R,
    loader: Box<dyn AssetLoader>,
    clock: Box<dyn Clock>,
    container: Option<Box<dyn Container>>,
    scene: Scene,
    camera: PerspectiveCamera,
    controls: OrbitControls,
    mixers: Vec<AnimationMixer>,
    models: Vec<ModelEntry>,
    animation_loop: bool,
    resize_listeners: usize,
}

impl<R: FrameRenderer> SceneController<R> {
    pub fn new(
        config: SceneConfig,
        renderer: R,
        loader: impl AssetLoader + 'static,
        clock: impl Clock + 'static,
    ) -> Self {
        let camera = PerspectiveCamera::from_config(&config.camera, 1.0);
        Self {
            config,
            renderer,
            loader: Box::new(loader),
            clock: Box::new(clock),
            container: None,
            scene: Scene::new(),
            camera,
            controls: OrbitControls::new(),
            mixers: Vec::new(),
            models: Vec::new(),
            animation_loop: false,
            resize_listeners: 0,
        }
    }

    /// Controller loading over the network and timing frames with the wall clock.
    pub fn with_defaults(config: SceneConfig, renderer: R) -> Self {
        Self::new(config, renderer, GltfLoader, InstantClock::default())
    }

    /// Builds the scene inside `container` and starts the frame loop.
    ///
    /// The returned tasks are the model loads; they are independent and may
    /// be driven in any order. Every call builds a fresh scene graph, drops
    /// the models of the previous one and registers one more resize
    /// listener; nothing guards against calling this twice.
    pub fn initialize(&mut self, container: Box<dyn Container>) -> Vec<LoadTask> {
        info!(
            "Initializing scene in a {}x{} container",
            container.client_width(),
            container.client_height()
        );
        let aspect = aspect_of(container.client_width(), container.client_height())
            .unwrap_or_else(|| {
                warn!("Container has no area yet, assuming a square viewport");
                1.0
            });
        self.container = Some(container);
        // mixers and models belong to the scene being replaced
        self.mixers.clear();
        self.models.clear();
        self.scene = Scene::new();
        self.scene.background = Some(self.config.background);

        self.create_camera(aspect);
        self.create_controls();
        self.create_lights();
        let loads = self.create_models();
        self.create_renderer();
        self.start();
        loads
    }

    fn create_camera(&mut self, aspect: f32) {
        self.camera = PerspectiveCamera::from_config(&self.config.camera, aspect);
    }

    fn create_controls(&mut self) {
        self.controls = OrbitControls::new();
    }

    fn create_lights(&mut self) {
        let hemisphere = &self.config.hemisphere;
        self.scene.add_light(Light::Hemisphere {
            sky_color: hemisphere.sky_color,
            ground_color: hemisphere.ground_color,
            intensity: hemisphere.intensity,
        });
        let directional = &self.config.directional;
        self.scene.add_light(Light::Directional {
            color: directional.color,
            intensity: directional.intensity,
            position: directional.position,
        });
    }

    fn create_models(&self) -> Vec<LoadTask> {
        self.config
            .models
            .iter()
            .map(|model| {
                debug!("Requesting {} from {}", model.name, model.url);
                let load = self.loader.load(&model.url);
                let model = model.clone();
                let task: LoadTask = Box::pin(async move {
                    LoadOutcome {
                        result: load.await,
                        model,
                    }
                });
                task
            })
            .collect()
    }

    fn create_renderer(&mut self) {
        let Some(container) = &self.container else {
            return;
        };
        self.renderer
            .set_pixel_ratio(container.device_pixel_ratio());
        self.renderer
            .set_size(container.client_width(), container.client_height());
        self.resize_listeners += 1;
    }

    /// Applies a finished load. Failures are logged and leave the scene
    /// untouched; the other loads are unaffected.
    pub fn on_model_loaded(&mut self, outcome: LoadOutcome) -> Option<NodeId> {
        let LoadOutcome { model, result } = outcome;
        match result {
            Ok(asset) => self.add_model(&model, &asset),
            Err(e) => {
                error!("Failed to load {} from {}: {:#}", model.name, model.url, e);
                None
            }
        }
    }

    fn add_model(&mut self, model: &ModelSpec, asset: &GltfAsset) -> Option<NodeId> {
        let Some(first_root) = asset.first_root() else {
            error!("{} contains no root node", model.name);
            return None;
        };
        let attached = self.scene.attach(asset, first_root)?;
        if let Some(node) = self.scene.node_mut(attached.root) {
            node.local.position = model.position;
            node.local.set_uniform_scale(self.config.model_scale);
        }

        let mut mixer = AnimationMixer::new(&attached);
        match asset.animations.first() {
            Some(clip) => {
                mixer.clip_action(clip).play();
            }
            None => warn!("{} has no animation clip, it will stand still", model.name),
        }
        self.mixers.push(mixer);
        self.models.push(ModelEntry {
            name: model.name.clone(),
            root: attached.root,
            mixer: self.mixers.len() - 1,
        });
        info!("Added {} to the scene", model.name);
        Some(attached.root)
    }

    /// Installs the per-frame callback.
    pub fn start(&mut self) {
        self.animation_loop = true;
        self.renderer.request_frame();
    }

    /// Removes the per-frame callback; later frames do nothing.
    pub fn stop(&mut self) {
        self.animation_loop = false;
    }

    pub fn is_running(&self) -> bool {
        self.animation_loop
    }

    /// One display refresh: advance the mixers, render, and ask for the next
    /// frame. Returns whether anything ran.
    pub fn frame(&mut self) -> anyhow::Result<bool> {
        if !self.animation_loop {
            return Ok(false);
        }
        self.update();
        let rendered = self.render();
        // a failed frame must not end the loop
        self.renderer.request_frame();
        rendered?;
        Ok(true)
    }

    fn update(&mut self) {
        let delta = self.clock.delta();
        for mixer in self.mixers.iter_mut() {
            mixer.update(delta, &mut self.scene);
        }
    }

    fn render(&mut self) -> anyhow::Result<()> {
        self.renderer.render(&self.scene, &self.camera)
    }

    /// Delivers a window resize to every registered listener.
    pub fn dispatch_window_resize(&mut self) {
        for _ in 0..self.resize_listeners {
            self.on_window_resize();
        }
    }

    fn on_window_resize(&mut self) {
        let Some(container) = &self.container else {
            return;
        };
        let (width, height) = (container.client_width(), container.client_height());
        let Some(aspect) = aspect_of(width, height) else {
            debug!("Ignoring resize to {}x{}", width, height);
            return;
        };
        let ratio = container.device_pixel_ratio();
        self.camera.aspect = aspect;
        self.camera.update_projection_matrix();
        self.renderer.set_pixel_ratio(ratio);
        self.renderer.set_size(width, height);
    }

    /// Forwards pointer input to the orbit controls; returns whether the camera moved.
    pub fn on_window_event(&mut self, event: &WindowEvent) -> bool {
        let Some(container) = &self.container else {
            return false;
        };
        let height = container.client_height() as f32 * container.device_pixel_ratio() as f32;
        self.controls
            .handle_window_event(event, &mut self.camera, height)
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn controls_mut(&mut self) -> &mut OrbitControls {
        &mut self.controls
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn mixers(&self) -> &[AnimationMixer] {
        &self.mixers
    }

    pub fn models(&self) -> &[ModelEntry] {
        &self.models
    }

    pub fn resize_listener_count(&self) -> usize {
        self.resize_listeners
    }
}

fn aspect_of(width: u32, height: u32) -> Option<f32> {
    (width > 0 && height > 0).then(|| width as f32 / height as f32)
}
