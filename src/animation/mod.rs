//! Keyframe animation: clips, samplers and per-model mixers.
//!
//! A clip is a set of channels, each animating one property of one node.
//! Clips reference nodes by their index in the source asset; the
//! [`mixer::AnimationMixer`] resolves those indices to scene nodes when the
//! model is attached.

pub mod mixer;
pub mod sampler;

use cgmath::{Quaternion, Vector3};

use crate::animation::sampler::Sampler;

/// The animated property of a channel together with its keyframes.
#[derive(Clone, Debug, PartialEq)]
pub enum Keyframes {
    Translation(Sampler<Vector3<f32>>),
    Rotation(Sampler<Quaternion<f32>>),
    Scale(Sampler<Vector3<f32>>),
    /// One weight vector per keyframe.
    MorphTargetWeights(Sampler<Vec<f32>>),
}

impl Keyframes {
    pub fn duration(&self) -> f32 {
        match self {
            Keyframes::Translation(s) | Keyframes::Scale(s) => s.duration(),
            Keyframes::Rotation(s) => s.duration(),
            Keyframes::MorphTargetWeights(s) => s.duration(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Channel {
    /// Index of the animated node in the source asset.
    pub node: usize,
    pub keyframes: Keyframes,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub channels: Vec<Channel>,
}

impl AnimationClip {
    /// Creates a clip whose duration is the latest keyframe of any channel.
    pub fn new(name: &str, channels: Vec<Channel>) -> Self {
        let duration = channels
            .iter()
            .map(|c| c.keyframes.duration())
            .fold(0.0, f32::max);
        Self {
            name: name.to_string(),
            duration,
            channels,
        }
    }
}
