use cgmath::{Deg, Point3, Vector3};
use flock_scene::{
    FrameRenderer,
    animation::mixer::AnimationMixer,
    data_structures::{color::Color, scene_graph::Light},
};

use crate::common::test_utils::{
    FLAMINGO_URL, FakeLoader, Harness, PARROT_URL, STORK_URL, bird, flock_loader, initialized,
    still_bird,
};

mod common;

fn model_names(harness: &Harness) -> Vec<String> {
    harness
        .controller
        .models()
        .iter()
        .map(|m| m.name.clone())
        .collect()
}

#[test]
fn initialize_builds_camera_lights_and_renderer() {
    let harness = initialized(flock_loader(), 1200, 600);
    let controller = &harness.controller;

    let camera = controller.camera();
    assert_eq!(camera.fov, Deg(35.0));
    assert_eq!(camera.near, 1.0);
    assert_eq!(camera.far, 100.0);
    assert_eq!(camera.aspect, 2.0);
    assert_eq!(camera.position, Point3::new(-1.5, 1.5, 6.5));

    assert_eq!(controller.scene().background, Some(Color::from_hex(0x8fbcd4)));
    let lights = controller.scene().lights();
    assert_eq!(lights.len(), 2);
    assert!(matches!(lights[0], Light::Hemisphere { intensity, .. } if intensity == 5.0));
    assert!(matches!(
        lights[1],
        Light::Directional { intensity, position, .. }
            if intensity == 5.0 && position == Point3::new(10.0, 10.0, 10.0)
    ));

    let log = harness.log.borrow();
    assert_eq!(log.sizes, vec![(1200, 600)]);
    assert_eq!(log.pixel_ratios, vec![1.0]);
    assert_eq!(controller.resize_listener_count(), 1);
    assert!(controller.is_running());
    assert_eq!(harness.loads.len(), 3);
    assert!(controller.models().is_empty());
}

#[test]
fn loaded_models_are_placed_scaled_and_animated() {
    let mut harness = initialized(flock_loader(), 800, 600);
    harness.finish_loads();

    let controller = &harness.controller;
    assert_eq!(model_names(&harness), ["parrot", "flamingo", "stork"]);
    assert_eq!(controller.mixers().len(), 3);

    let expected = [
        Vector3::new(0.0, 0.0, 2.5),
        Vector3::new(7.5, 0.0, -10.0),
        Vector3::new(0.0, -2.5, -10.0),
    ];
    for (model, position) in controller.models().iter().zip(expected) {
        let root = controller.scene().node(model.root).unwrap();
        assert_eq!(root.local.position, position);
        assert_eq!(root.local.scale, Vector3::new(0.02, 0.02, 0.02));
        assert!(controller.scene().roots().contains(&model.root));

        let mixer: &AnimationMixer = &controller.mixers()[model.mixer];
        assert_eq!(mixer.root(), model.root);
        assert_eq!(mixer.actions().len(), 1);
        assert_eq!(mixer.actions()[0].clip().name, "Fly");
        assert!(mixer.actions()[0].is_playing());
    }
}

#[test]
fn models_join_in_completion_order() {
    let mut harness = initialized(flock_loader(), 800, 600);

    harness.finish_loads_in(&[2, 0, 1]);

    assert_eq!(model_names(&harness), ["stork", "parrot", "flamingo"]);
    assert_eq!(harness.controller.mixers().len(), 3);
}

#[test]
fn failed_load_leaves_the_other_models_alone() {
    let loader = FakeLoader::new()
        .with_asset(PARROT_URL, bird())
        .with_failure(FLAMINGO_URL, "connection reset")
        .with_asset(STORK_URL, bird());
    let mut harness = initialized(loader, 800, 600);

    harness.finish_loads();
    harness.clock.push(0.1);
    let ran = harness.controller.frame().unwrap();

    assert!(ran);
    assert_eq!(model_names(&harness), ["parrot", "stork"]);
    assert_eq!(harness.controller.mixers().len(), 2);
    assert_eq!(harness.log.borrow().renders, 1);
}

#[test]
fn every_load_failing_still_renders_the_empty_scene() {
    let mut harness = initialized(FakeLoader::new(), 800, 600);

    harness.finish_loads();
    harness.controller.frame().unwrap();

    assert!(harness.controller.models().is_empty());
    assert_eq!(harness.log.borrow().mesh_nodes, vec![0]);
    assert_eq!(harness.controller.scene().lights().len(), 2);
}

#[test]
fn frames_render_before_any_model_arrives() {
    let mut harness = initialized(flock_loader(), 800, 600);

    harness.controller.frame().unwrap();
    harness.finish_loads_in(&[0]);
    harness.controller.frame().unwrap();

    assert_eq!(harness.log.borrow().mesh_nodes, vec![0, 1]);
}

#[test]
fn each_frame_advances_every_mixer_once() {
    let mut harness = initialized(flock_loader(), 800, 600);
    harness.finish_loads();

    harness.clock.push(0.25);
    harness.controller.frame().unwrap();
    harness.clock.push(0.5);
    harness.controller.frame().unwrap();

    for mixer in harness.controller.mixers() {
        assert!((mixer.time() - 0.75).abs() < 1e-6);
    }
    assert_eq!(harness.log.borrow().renders, 2);
}

#[test]
fn mixers_of_late_models_start_from_zero() {
    let mut harness = initialized(flock_loader(), 800, 600);
    harness.finish_loads_in(&[0]);
    harness.clock.push(0.5);
    harness.controller.frame().unwrap();

    harness.finish_loads_in(&[1]);
    harness.clock.push(0.25);
    harness.controller.frame().unwrap();

    let mixers = harness.controller.mixers();
    assert!((mixers[0].time() - 0.75).abs() < 1e-6);
    assert!((mixers[1].time() - 0.25).abs() < 1e-6);
}

#[test]
fn animation_poses_the_model() {
    let mut harness = initialized(flock_loader(), 800, 600);
    harness.finish_loads_in(&[0]);

    harness.clock.push(0.5);
    harness.controller.frame().unwrap();

    let controller = &harness.controller;
    let root = controller.scene().node(controller.models()[0].root).unwrap();
    let body = controller.scene().node(root.children[0]).unwrap();
    assert!((body.local.position.y - 1.0).abs() < 1e-5);
    assert_eq!(body.morph_weights.len(), 1);
    assert!((body.morph_weights[0] - 0.5).abs() < 1e-5);
    // the clip animates the body only; placement of the root survives
    assert_eq!(root.local.position, Vector3::new(0.0, 0.0, 2.5));
}

#[test]
fn frames_request_the_next_frame_while_running() {
    let mut harness = initialized(flock_loader(), 800, 600);
    let after_init = harness.controller.renderer().frame_requests.get();

    harness.controller.frame().unwrap();
    harness.controller.frame().unwrap();

    assert_eq!(after_init, 1);
    assert_eq!(harness.controller.renderer().frame_requests.get(), 3);
}

#[test]
fn stop_halts_rendering_and_start_resumes_it() {
    let mut harness = initialized(flock_loader(), 800, 600);
    harness.finish_loads();

    harness.controller.stop();
    harness.clock.push(1.0);
    let ran = harness.controller.frame().unwrap();

    assert!(!ran);
    assert!(!harness.controller.is_running());
    assert_eq!(harness.log.borrow().renders, 0);
    for mixer in harness.controller.mixers() {
        assert_eq!(mixer.time(), 0.0);
    }

    harness.controller.start();
    assert!(harness.controller.frame().unwrap());
    assert_eq!(harness.log.borrow().renders, 1);
}

#[test]
fn stop_is_idempotent() {
    let mut harness = initialized(flock_loader(), 800, 600);

    harness.controller.stop();
    harness.controller.stop();

    assert!(!harness.controller.frame().unwrap());
}

#[test]
fn load_finishing_after_stop_still_joins_the_scene() {
    let mut harness = initialized(flock_loader(), 800, 600);

    harness.controller.stop();
    harness.finish_loads();

    assert_eq!(harness.controller.models().len(), 3);
    assert_eq!(harness.log.borrow().renders, 0);
}

#[test]
fn resize_updates_camera_and_renderer() {
    let mut harness = initialized(flock_loader(), 800, 600);

    harness.size.set((1000, 250));
    harness.controller.dispatch_window_resize();
    harness.controller.frame().unwrap();

    let camera = harness.controller.camera();
    assert_eq!(camera.aspect, 4.0);
    let mut square = camera.clone();
    square.aspect = 1.0;
    square.update_projection_matrix();
    assert!((square.projection_matrix().x.x - camera.projection_matrix().x.x * 4.0).abs() < 1e-5);

    let log = harness.log.borrow();
    assert_eq!(log.sizes.last(), Some(&(1000, 250)));
    assert_eq!(log.aspects, vec![4.0]);
}

#[test]
fn resize_to_zero_height_is_ignored() {
    let mut harness = initialized(flock_loader(), 800, 600);

    harness.size.set((800, 0));
    harness.controller.dispatch_window_resize();

    assert!((harness.controller.camera().aspect - 800.0 / 600.0).abs() < 1e-6);
    assert_eq!(harness.log.borrow().sizes, vec![(800, 600)]);
}

#[test]
fn resize_picks_up_a_new_pixel_ratio() {
    let (renderer, log) = common::test_utils::FakeRenderer::new();
    let mut controller = flock_scene::SceneController::new(
        common::test_utils::test_config(),
        renderer,
        flock_loader(),
        common::test_utils::ManualClock::new(),
    );
    let (container, size, ratio) =
        common::test_utils::FakeContainer::with_shared_ratio(800, 600, 1.0);
    controller.initialize(container);

    // moved to a display with twice the density
    ratio.set(2.0);
    size.set((400, 300));
    controller.dispatch_window_resize();

    let log = log.borrow();
    assert_eq!(log.pixel_ratios.last(), Some(&2.0));
    assert_eq!(log.sizes.last(), Some(&(400, 300)));
    assert_eq!(controller.camera().aspect, 400.0 / 300.0);
}

#[test]
fn initialize_with_empty_container_assumes_square_viewport() {
    let harness = initialized(flock_loader(), 0, 0);

    assert_eq!(harness.controller.camera().aspect, 1.0);
    assert!(harness.controller.is_running());
}

#[test]
fn second_initialize_adds_another_resize_listener() {
    let mut harness = initialized(flock_loader(), 800, 600);
    harness.finish_loads();

    let (container, size) = common::test_utils::FakeContainer::new(640, 480);
    let loads = harness.controller.initialize(container);

    assert_eq!(loads.len(), 3);
    assert_eq!(harness.controller.resize_listener_count(), 2);
    // the fresh scene has lights but none of the earlier models
    assert_eq!(harness.controller.scene().lights().len(), 2);
    assert_eq!(harness.controller.scene().roots().len(), 0);
    assert!(harness.controller.models().is_empty());
    assert!(harness.controller.mixers().is_empty());

    size.set((900, 300));
    let before = harness.log.borrow().sizes.len();
    harness.controller.dispatch_window_resize();
    assert_eq!(harness.log.borrow().sizes.len(), before + 2);
}

#[test]
fn asset_without_clips_still_joins_the_scene() {
    let loader = FakeLoader::new()
        .with_asset(PARROT_URL, still_bird())
        .with_asset(FLAMINGO_URL, bird())
        .with_asset(STORK_URL, bird());
    let mut harness = initialized(loader, 800, 600);

    harness.finish_loads();
    harness.clock.push(0.5);
    harness.controller.frame().unwrap();

    let controller = &harness.controller;
    assert_eq!(controller.models().len(), 3);
    assert!(controller.mixers()[0].actions().is_empty());
    let root = controller.scene().node(controller.models()[0].root).unwrap();
    let body = controller.scene().node(root.children[0]).unwrap();
    assert_eq!(body.local.position.y, 0.0);
}

#[test]
fn render_errors_surface_without_stopping_the_loop() {
    let mut harness = initialized(flock_loader(), 800, 600);
    harness.log.borrow_mut().fail_next_render = true;
    let requests = harness.controller.renderer().frame_requests.get();

    assert!(harness.controller.frame().is_err());
    assert!(harness.controller.is_running());
    assert_eq!(harness.controller.renderer().frame_requests.get(), requests + 1);

    assert!(harness.controller.frame().unwrap());
    assert_eq!(harness.controller.renderer().frame_requests.get(), requests + 2);
    assert_eq!(harness.log.borrow().renders, 1);
}

#[test]
fn pointer_input_before_initialize_is_ignored() {
    let (renderer, _) = common::test_utils::FakeRenderer::new();
    let mut controller = flock_scene::SceneController::new(
        common::test_utils::test_config(),
        renderer,
        FakeLoader::new(),
        common::test_utils::ManualClock::new(),
    );

    let moved = controller.on_window_event(&flock_scene::WindowEvent::Focused(true));

    assert!(!moved);
    assert!(!controller.is_running());
}

#[test]
fn renderer_trait_default_frame_request_is_a_no_op() {
    struct Silent;
    impl FrameRenderer for Silent {
        fn set_pixel_ratio(&mut self, _: f64) {}
        fn set_size(&mut self, _: u32, _: u32) {}
        fn size(&self) -> (u32, u32) {
            (0, 0)
        }
        fn render(
            &mut self,
            _: &flock_scene::data_structures::scene_graph::Scene,
            _: &flock_scene::camera::PerspectiveCamera,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    let mut controller = flock_scene::SceneController::new(
        common::test_utils::test_config(),
        Silent,
        FakeLoader::new(),
        common::test_utils::ManualClock::new(),
    );
    let (container, _) = common::test_utils::FakeContainer::new(10, 10);
    controller.initialize(container);

    assert!(controller.frame().unwrap());
}
