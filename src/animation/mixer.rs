//! Per-model animation players.
//!
//! Each loaded model gets its own [`AnimationMixer`]. The mixer owns the
//! actions started on it and, on [`AnimationMixer::update`], advances them by
//! the frame delta and writes the sampled values into the scene graph.

use std::collections::HashMap;

use log::debug;

use crate::{
    animation::{AnimationClip, Keyframes},
    data_structures::scene_graph::{Attached, NodeId, Scene},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopMode {
    /// Restart from the beginning when the clip ends.
    Repeat,
    /// Stop on the last frame.
    Once,
}

/// Playback state of one clip on a mixer.
#[derive(Clone, Debug)]
pub struct AnimationAction {
    clip: AnimationClip,
    time: f32,
    pub time_scale: f32,
    pub loop_mode: LoopMode,
    playing: bool,
}

impl AnimationAction {
    fn new(clip: AnimationClip) -> Self {
        Self {
            clip,
            time: 0.0,
            time_scale: 1.0,
            loop_mode: LoopMode::Repeat,
            playing: false,
        }
    }

    pub fn play(&mut self) -> &mut Self {
        self.playing = true;
        self
    }

    pub fn stop(&mut self) -> &mut Self {
        self.playing = false;
        self.time = 0.0;
        self
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Local time inside the clip, in seconds.
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn clip(&self) -> &AnimationClip {
        &self.clip
    }

    /// Moves the playhead; returns whether the action contributes a pose this frame.
    fn advance(&mut self, delta: f32) -> bool {
        if !self.playing {
            return false;
        }
        let duration = self.clip.duration;
        self.time += delta * self.time_scale;
        if duration <= 0.0 {
            self.time = 0.0;
            return true;
        }
        match self.loop_mode {
            LoopMode::Repeat => self.time = self.time.rem_euclid(duration),
            LoopMode::Once => {
                if self.time >= duration {
                    self.time = duration;
                    self.playing = false;
                }
            }
        }
        true
    }
}

#[derive(Clone, Debug)]
pub struct AnimationMixer {
    root: NodeId,
    bindings: HashMap<usize, NodeId>,
    actions: Vec<AnimationAction>,
    time: f32,
}

impl AnimationMixer {
    /// Creates a mixer driving the model that was attached as `attached`.
    pub fn new(attached: &Attached) -> Self {
        Self {
            root: attached.root,
            bindings: attached.node_map.clone(),
            actions: Vec::new(),
            time: 0.0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Total time this mixer has been advanced by, in seconds.
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn actions(&self) -> &[AnimationAction] {
        &self.actions
    }

    /// Returns the action for `clip`, creating it on first use.
    pub fn clip_action(&mut self, clip: &AnimationClip) -> &mut AnimationAction {
        let idx = match self.actions.iter().position(|a| a.clip.name == clip.name) {
            Some(idx) => idx,
            None => {
                self.actions.push(AnimationAction::new(clip.clone()));
                self.actions.len() - 1
            }
        };
        &mut self.actions[idx]
    }

    /// Advances every playing action by `delta` seconds and applies the
    /// sampled pose to the bound nodes in `scene`.
    pub fn update(&mut self, delta: f32, scene: &mut Scene) {
        self.time += delta;
        for action in self.actions.iter_mut() {
            if !action.advance(delta) {
                continue;
            }
            for channel in &action.clip.channels {
                let Some(node) = self
                    .bindings
                    .get(&channel.node)
                    .and_then(|&id| scene.node_mut(id))
                else {
                    debug!(
                        "clip {} targets node {} outside of the model",
                        action.clip.name, channel.node
                    );
                    continue;
                };
                let time = action.time;
                match &channel.keyframes {
                    Keyframes::Translation(s) => {
                        if let Some(v) = s.sample(time) {
                            node.local.position = v;
                        }
                    }
                    Keyframes::Rotation(s) => {
                        if let Some(q) = s.sample(time) {
                            node.local.rotation = q;
                        }
                    }
                    Keyframes::Scale(s) => {
                        if let Some(v) = s.sample(time) {
                            node.local.scale = v;
                        }
                    }
                    Keyframes::MorphTargetWeights(s) => {
                        if let Some(w) = s.sample(time) {
                            node.morph_weights = w;
                        }
                    }
                }
            }
        }
    }
}
