use cgmath::{Quaternion, Vector3};
use gltf::animation::util::ReadOutputs;
use log::warn;

use crate::animation::{
    AnimationClip, Channel, Keyframes,
    sampler::{Interpolation, Sampler},
};

/// Reads every animation of the document into clips, in document order.
pub fn load_animations(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
) -> Vec<AnimationClip> {
    document
        .animations()
        .map(|animation| {
            let channels = animation
                .channels()
                .filter_map(|channel| load_channel(&channel, buffers))
                .collect();
            let name = animation
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("animation_{}", animation.index()));
            AnimationClip::new(&name, channels)
        })
        .collect()
}

fn load_channel(channel: &gltf::animation::Channel, buffers: &[gltf::buffer::Data]) -> Option<Channel> {
    let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(|d| d.0.as_slice()));
    let interpolation = match channel.sampler().interpolation() {
        gltf::animation::Interpolation::Linear => Interpolation::Linear,
        gltf::animation::Interpolation::Step => Interpolation::Step,
        gltf::animation::Interpolation::CubicSpline => Interpolation::CubicSpline,
    };
    let Some(inputs) = reader.read_inputs() else {
        warn!("No keyframe times found in channel {}", channel.index());
        return None;
    };
    let times: Vec<f32> = inputs.collect();
    let Some(outputs) = reader.read_outputs() else {
        warn!("No keyframes found in channel {}", channel.index());
        return None;
    };

    let keyframes = match outputs {
        ReadOutputs::Translations(translations) => Keyframes::Translation(Sampler::new(
            times,
            translations.map(Vector3::from).collect(),
            interpolation,
        )),
        ReadOutputs::Rotations(rotations) => Keyframes::Rotation(Sampler::new(
            times,
            rotations
                .into_f32()
                .map(|[x, y, z, w]| Quaternion::new(w, x, y, z))
                .collect(),
            interpolation,
        )),
        ReadOutputs::Scales(scales) => Keyframes::Scale(Sampler::new(
            times,
            scales.map(Vector3::from).collect(),
            interpolation,
        )),
        ReadOutputs::MorphTargetWeights(weights) => {
            let flat: Vec<f32> = weights.into_f32().collect();
            let outputs_per_time = match interpolation {
                Interpolation::CubicSpline => 3,
                _ => 1,
            };
            let output_count = times.len() * outputs_per_time;
            if output_count == 0 || flat.len() % output_count != 0 {
                warn!(
                    "Morph weight channel {} has {} values for {} keyframes",
                    channel.index(),
                    flat.len(),
                    times.len()
                );
                return None;
            }
            let targets = flat.len() / output_count;
            let values = flat.chunks(targets.max(1)).map(<[f32]>::to_vec).collect();
            Keyframes::MorphTargetWeights(Sampler::new(times, values, interpolation))
        }
    };

    Some(Channel {
        node: channel.target().node().index(),
        keyframes,
    })
}
