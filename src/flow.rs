//! Application event loop.
//!
//! Hosts a [`SceneController`] inside a winit window (or a canvas appended to
//! the configured container element in the browser) and drives it:
//!
//! 1. `resumed` creates the window and GPU context and initializes the scene
//! 2. every model load runs on its own task and comes back as a
//!    [`FlowEvent::Loaded`] through the event loop proxy, in completion order
//! 3. `Resized` (and, in the browser, the window's `resize` event) is
//!    dispatched to the controller's resize listeners
//! 4. `RedrawRequested` runs one frame; the frame asks for the next redraw
//!    for as long as the loop is running
//! 5. pointer input goes to the orbit controls

use std::{fmt::Debug, sync::Arc};

use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::{
    config::SceneConfig,
    context::Context,
    render::WgpuRenderer,
    scene::{Container, LoadOutcome, LoadTask, SceneController},
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::{JsCast, prelude::*};

pub(crate) enum FlowEvent {
    /// The GPU context finished its asynchronous setup.
    #[cfg(target_arch = "wasm32")]
    Initialized(Context),
    /// The browser window was resized.
    #[cfg(target_arch = "wasm32")]
    Resize,
    Loaded(LoadOutcome),
}

impl Debug for FlowEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(target_arch = "wasm32")]
            Self::Initialized(_) => f.write_str("Initialized"),
            #[cfg(target_arch = "wasm32")]
            Self::Resize => f.write_str("Resize"),
            Self::Loaded(outcome) => f
                .debug_struct("Loaded")
                .field("model", &outcome.model.name)
                .field("ok", &outcome.result.is_ok())
                .finish(),
        }
    }
}

/// The window as seen by the scene: logical size and scale factor.
#[cfg(not(target_arch = "wasm32"))]
struct WindowContainer(Arc<Window>);

#[cfg(not(target_arch = "wasm32"))]
impl Container for WindowContainer {
    fn client_width(&self) -> u32 {
        let size = self.0.inner_size().to_logical::<f64>(self.0.scale_factor());
        size.width.round() as u32
    }

    fn client_height(&self) -> u32 {
        let size = self.0.inner_size().to_logical::<f64>(self.0.scale_factor());
        size.height.round() as u32
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.0.scale_factor()
    }
}

/// The DOM element hosting the canvas.
#[cfg(target_arch = "wasm32")]
struct ElementContainer(web_sys::Element);

#[cfg(target_arch = "wasm32")]
impl Container for ElementContainer {
    fn client_width(&self) -> u32 {
        self.0.client_width().max(0) as u32
    }

    fn client_height(&self) -> u32 {
        self.0.client_height().max(0) as u32
    }

    fn device_pixel_ratio(&self) -> f64 {
        web_sys::window()
            .map(|w| w.device_pixel_ratio())
            .unwrap_or(1.0)
    }
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: winit::event_loop::EventLoopProxy<FlowEvent>,
    config: SceneConfig,
    controller: Option<SceneController<WgpuRenderer>>,
}

impl App {
    fn new(event_loop: &EventLoop<FlowEvent>, config: SceneConfig) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            proxy,
            config,
            controller: None,
        })
    }

    fn container(&self, window: &Arc<Window>) -> anyhow::Result<Box<dyn Container>> {
        #[cfg(not(target_arch = "wasm32"))]
        {
            Ok(Box::new(WindowContainer(window.clone())))
        }
        #[cfg(target_arch = "wasm32")]
        {
            let _ = window;
            Ok(Box::new(ElementContainer(container_element(
                &self.config.container_id,
            )?)))
        }
    }

    /// Builds the controller around a ready context and starts the loads.
    fn start_scene(&mut self, ctx: Context) -> anyhow::Result<()> {
        let container = self.container(ctx.window())?;
        let renderer = WgpuRenderer::new(ctx, &self.config.renderer);
        let mut controller = SceneController::with_defaults(self.config.clone(), renderer);
        let loads = controller.initialize(container);
        self.controller = Some(controller);
        loads.into_iter().for_each(|load| self.spawn_load(load));
        Ok(())
    }

    /// Each load gets its own task; whichever finishes first is applied first.
    fn spawn_load(&self, load: LoadTask) {
        let proxy = self.proxy.clone();
        let task = async move {
            let outcome = load.await;
            if let Err(err) = proxy.send_event(FlowEvent::Loaded(outcome)) {
                log::error!("Event loop closed before a model finished loading: {}", err);
            }
        };
        #[cfg(not(target_arch = "wasm32"))]
        self.async_runtime.spawn(task);
        #[cfg(target_arch = "wasm32")]
        wasm_bindgen_futures::spawn_local(task);
    }
}

#[cfg(target_arch = "wasm32")]
fn container_element(id: &str) -> anyhow::Result<web_sys::Element> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| anyhow::anyhow!("no document"))?;
    document
        .get_element_by_id(id)
        .ok_or_else(|| anyhow::anyhow!("no element with id {:?}", id))
}

/// The canvas keeps the size it was last given, so container changes only
/// show up as resizes of the browser window.
#[cfg(target_arch = "wasm32")]
fn listen_for_window_resize(
    proxy: winit::event_loop::EventLoopProxy<FlowEvent>,
) -> anyhow::Result<()> {
    let window = web_sys::window().ok_or_else(|| anyhow::anyhow!("no window"))?;
    let on_resize = Closure::<dyn FnMut()>::new(move || {
        if let Err(err) = proxy.send_event(FlowEvent::Resize) {
            log::error!("Event loop closed, dropping a window resize: {}", err);
        }
    });
    window
        .add_event_listener_with_callback("resize", on_resize.as_ref().unchecked_ref())
        .map_err(|_| anyhow::anyhow!("cannot listen for window resizes"))?;
    // stays registered for the lifetime of the page
    on_resize.forget();
    Ok(())
}

impl ApplicationHandler<FlowEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.controller.is_some() {
            return;
        }
        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("flock-scene");

        #[cfg(target_arch = "wasm32")]
        {
            use winit::platform::web::WindowAttributesExtWebSys;
            // winit creates the canvas, we append it to the container below
            window_attributes = window_attributes.with_append(false);
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Cannot create a window: {}", e);
                event_loop.exit();
                return;
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            let ctx = self
                .async_runtime
                .block_on(Context::new(window, self.config.renderer.antialias));
            if let Err(e) = ctx.and_then(|ctx| self.start_scene(ctx)) {
                log::error!("App initialization failed: {:#}", e);
                event_loop.exit();
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            use winit::platform::web::WindowExtWebSys;

            let appended = container_element(&self.config.container_id).and_then(|element| {
                let canvas = window
                    .canvas()
                    .ok_or_else(|| anyhow::anyhow!("window has no canvas"))?;
                element
                    .append_child(&canvas)
                    .map_err(|_| anyhow::anyhow!("cannot append the canvas"))?;
                Ok(())
            });
            if let Err(e) = appended.and_then(|_| listen_for_window_resize(self.proxy.clone())) {
                log::error!("App initialization failed: {:#}", e);
                event_loop.exit();
                return;
            }

            let proxy = self.proxy.clone();
            let antialias = self.config.renderer.antialias;
            wasm_bindgen_futures::spawn_local(async move {
                match Context::new(window, antialias).await {
                    Ok(ctx) => {
                        if let Err(err) = proxy.send_event(FlowEvent::Initialized(ctx)) {
                            log::error!("Event loop closed during initialization: {}", err);
                        }
                    }
                    Err(e) => log::error!("App initialization failed: {:#}", e),
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: FlowEvent) {
        match event {
            #[cfg(target_arch = "wasm32")]
            FlowEvent::Initialized(ctx) => {
                // This is the message from our wasm `spawn_local`
                if let Err(e) = self.start_scene(ctx) {
                    log::error!("App initialization failed: {:#}", e);
                    event_loop.exit();
                }
            }
            #[cfg(target_arch = "wasm32")]
            FlowEvent::Resize => {
                if let Some(controller) = &mut self.controller {
                    controller.dispatch_window_resize();
                }
            }
            FlowEvent::Loaded(outcome) => match &mut self.controller {
                Some(controller) => {
                    controller.on_model_loaded(outcome);
                }
                None => log::warn!("Dropping {} loaded before the scene existed", outcome.model.name),
            },
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let controller = match &mut self.controller {
            Some(controller) => controller,
            None => return,
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                controller.dispatch_window_resize()
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = controller.frame() {
                    log::error!("Unable to render {:#}", e);
                }
            }
            event => {
                controller.on_window_event(&event);
            }
        }
    }
}

/// Opens the window and runs the scene until it is closed.
pub fn run(config: SceneConfig) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        // fails only when a logger is already installed
        let _ = console_log::init_with_level(log::Level::Info);
    }

    let event_loop: EventLoop<FlowEvent> = EventLoop::with_user_event().build()?;

    let mut app = App::new(&event_loop, config)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn run_web() -> Result<(), JsValue> {
    run(SceneConfig::default()).map_err(|e| JsValue::from_str(&format!("{:#}", e)))
}
