//! Scene configuration.
//!
//! Every tunable of the bird scene lives in [`SceneConfig`]. The `Default`
//! implementation reproduces the stock scene: three animated birds in front
//! of a pale blue background, lit by a hemisphere and a directional light.

use cgmath::{Deg, Point3, Vector3};

use crate::data_structures::color::Color;

const MODEL_BASE_URL: &str =
    "https://rawcdn.githack.com/mrdoob/three.js/7249d12dac2907dac95d36227d62c5415af51845/examples/models/gltf";

/// A model to fetch and where to put it once loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelSpec {
    pub name: String,
    pub url: String,
    pub position: Vector3<f32>,
}

impl ModelSpec {
    pub fn new(name: &str, url: &str, position: Vector3<f32>) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            position,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HemisphereLightConfig {
    pub sky_color: Color,
    pub ground_color: Color,
    pub intensity: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DirectionalLightConfig {
    pub color: Color,
    pub intensity: f32,
    pub position: Point3<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CameraConfig {
    pub fov: Deg<f32>,
    pub near: f32,
    pub far: f32,
    pub position: Point3<f32>,
    pub target: Point3<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RendererConfig {
    /// Applied in the shader when the surface format does not encode sRGB itself.
    pub gamma_factor: f32,
    pub gamma_output: bool,
    /// Lambert terms are divided by π, matching real-world light units.
    pub physically_correct_lights: bool,
    pub antialias: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneConfig {
    pub background: Color,
    pub camera: CameraConfig,
    pub hemisphere: HemisphereLightConfig,
    pub directional: DirectionalLightConfig,
    pub renderer: RendererConfig,
    pub models: Vec<ModelSpec>,
    /// Uniform scale applied to every loaded model.
    pub model_scale: f32,
    /// DOM id of the element the canvas gets appended to (web only).
    pub container_id: String,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            background: Color::from_hex(0x8fbcd4),
            camera: CameraConfig {
                fov: Deg(35.0),
                near: 1.0,
                far: 100.0,
                position: Point3::new(-1.5, 1.5, 6.5),
                target: Point3::new(0.0, 0.0, 0.0),
            },
            hemisphere: HemisphereLightConfig {
                sky_color: Color::from_hex(0xddeeff),
                ground_color: Color::from_hex(0x0f0e0d),
                intensity: 5.0,
            },
            directional: DirectionalLightConfig {
                color: Color::from_hex(0xffffff),
                intensity: 5.0,
                position: Point3::new(10.0, 10.0, 10.0),
            },
            renderer: RendererConfig {
                gamma_factor: 2.2,
                gamma_output: true,
                physically_correct_lights: true,
                antialias: true,
            },
            models: vec![
                ModelSpec::new(
                    "parrot",
                    &format!("{MODEL_BASE_URL}/Parrot.glb"),
                    Vector3::new(0.0, 0.0, 2.5),
                ),
                ModelSpec::new(
                    "flamingo",
                    &format!("{MODEL_BASE_URL}/Flamingo.glb"),
                    Vector3::new(7.5, 0.0, -10.0),
                ),
                ModelSpec::new(
                    "stork",
                    &format!("{MODEL_BASE_URL}/Stork.glb"),
                    Vector3::new(0.0, -2.5, -10.0),
                ),
            ],
            model_scale: 0.02,
            container_id: "container".to_string(),
        }
    }
}
