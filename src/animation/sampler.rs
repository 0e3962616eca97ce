//! Keyframe sampling and interpolation.

use cgmath::{InnerSpace, Quaternion, Vector3};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    Step,
    /// Values are stored as `(in_tangent, value, out_tangent)` triplets.
    CubicSpline,
}

/// Values that can be interpolated between keyframes.
pub trait Animatable: Clone {
    fn interpolate_linear(first: &Self, second: &Self, t: f32) -> Self;

    fn interpolate_cubic_spline(
        first_value: &Self,
        first_tangent: &Self,
        second_value: &Self,
        second_tangent: &Self,
        delta_time: f32,
        t: f32,
    ) -> Self;
}

fn hermite_basis(t: f32) -> (f32, f32, f32, f32) {
    let t2 = t * t;
    let t3 = t2 * t;
    (
        2.0 * t3 - 3.0 * t2 + 1.0,
        t3 - 2.0 * t2 + t,
        -2.0 * t3 + 3.0 * t2,
        t3 - t2,
    )
}

impl Animatable for Vector3<f32> {
    fn interpolate_linear(first: &Self, second: &Self, t: f32) -> Self {
        *first + (*second - *first) * t
    }

    fn interpolate_cubic_spline(
        first_value: &Self,
        first_tangent: &Self,
        second_value: &Self,
        second_tangent: &Self,
        delta_time: f32,
        t: f32,
    ) -> Self {
        let (h00, h10, h01, h11) = hermite_basis(t);
        *first_value * h00
            + *first_tangent * (h10 * delta_time)
            + *second_value * h01
            + *second_tangent * (h11 * delta_time)
    }
}

impl Animatable for Quaternion<f32> {
    fn interpolate_linear(first: &Self, second: &Self, t: f32) -> Self {
        first.slerp(*second, t)
    }

    fn interpolate_cubic_spline(
        first_value: &Self,
        first_tangent: &Self,
        second_value: &Self,
        second_tangent: &Self,
        delta_time: f32,
        t: f32,
    ) -> Self {
        // keep both ends in the same hemisphere so the spline takes the short path
        let (second_value, second_tangent) = if first_value.dot(*second_value) < 0.0 {
            (-*second_value, -*second_tangent)
        } else {
            (*second_value, *second_tangent)
        };
        let (h00, h10, h01, h11) = hermite_basis(t);
        (*first_value * h00
            + *first_tangent * (h10 * delta_time)
            + second_value * h01
            + second_tangent * (h11 * delta_time))
            .normalize()
    }
}

impl Animatable for Vec<f32> {
    fn interpolate_linear(first: &Self, second: &Self, t: f32) -> Self {
        first
            .iter()
            .zip(second)
            .map(|(a, b)| a + (b - a) * t)
            .collect()
    }

    fn interpolate_cubic_spline(
        first_value: &Self,
        first_tangent: &Self,
        second_value: &Self,
        second_tangent: &Self,
        delta_time: f32,
        t: f32,
    ) -> Self {
        let (h00, h10, h01, h11) = hermite_basis(t);
        (0..first_value.len())
            .map(|i| {
                let at = |v: &Vec<f32>| v.get(i).copied().unwrap_or(0.0);
                h00 * at(first_value)
                    + h10 * delta_time * at(first_tangent)
                    + h01 * at(second_value)
                    + h11 * delta_time * at(second_tangent)
            })
            .collect()
    }
}

/// Keyframe times with their values.
#[derive(Clone, Debug, PartialEq)]
pub struct Sampler<T> {
    pub times: Vec<f32>,
    pub values: Vec<T>,
    pub interpolation: Interpolation,
}

impl<T: Animatable> Sampler<T> {
    pub fn new(times: Vec<f32>, values: Vec<T>, interpolation: Interpolation) -> Self {
        Self {
            times,
            values,
            interpolation,
        }
    }

    pub fn duration(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    fn value(&self, keyframe: usize) -> Option<&T> {
        match self.interpolation {
            Interpolation::CubicSpline => self.values.get(keyframe * 3 + 1),
            _ => self.values.get(keyframe),
        }
    }

    fn in_tangent(&self, keyframe: usize) -> Option<&T> {
        self.values.get(keyframe * 3)
    }

    fn out_tangent(&self, keyframe: usize) -> Option<&T> {
        self.values.get(keyframe * 3 + 2)
    }

    /// Samples at `time`, clamping to the first and last keyframe.
    ///
    /// Returns `None` only for samplers without usable keyframes.
    pub fn sample(&self, time: f32) -> Option<T> {
        let len = self.times.len();
        if len == 0 {
            return None;
        }
        let right = self.times.partition_point(|&t| t <= time);
        if right == 0 {
            return self.value(0).cloned();
        }
        if right >= len {
            return self.value(len - 1).cloned();
        }
        let left = right - 1;
        let left_time = self.times[left];
        let right_time = self.times[right];
        let delta_time = right_time - left_time;
        if delta_time <= 0.0 {
            return self.value(left).cloned();
        }
        let t = (time - left_time) / delta_time;

        match self.interpolation {
            Interpolation::Step => self.value(left).cloned(),
            Interpolation::Linear => Some(T::interpolate_linear(
                self.value(left)?,
                self.value(right)?,
                t,
            )),
            Interpolation::CubicSpline => Some(T::interpolate_cubic_spline(
                self.value(left)?,
                self.out_tangent(left)?,
                self.value(right)?,
                self.in_tangent(right)?,
                delta_time,
                t,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Deg, One, Rotation3};

    fn ramp(interpolation: Interpolation) -> Sampler<Vector3<f32>> {
        Sampler::new(
            vec![0.0, 1.0, 2.0],
            vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(10.0, 0.0, 0.0),
                Vector3::new(10.0, 10.0, 0.0),
            ],
            interpolation,
        )
    }

    #[test]
    fn linear_interpolates_between_keyframes() {
        let sampled = ramp(Interpolation::Linear).sample(0.5).unwrap();
        assert_eq!(sampled, Vector3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn step_holds_the_previous_keyframe() {
        let sampled = ramp(Interpolation::Step).sample(1.9).unwrap();
        assert_eq!(sampled, Vector3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn sampling_clamps_outside_the_keyframe_range() {
        let sampler = ramp(Interpolation::Linear);
        assert_eq!(sampler.sample(-1.0).unwrap(), Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(sampler.sample(5.0).unwrap(), Vector3::new(10.0, 10.0, 0.0));
    }

    #[test]
    fn exact_hits_return_the_keyframe() {
        assert_eq!(
            ramp(Interpolation::Linear).sample(1.0).unwrap(),
            Vector3::new(10.0, 0.0, 0.0)
        );
    }

    #[test]
    fn cubic_spline_with_flat_tangents_hits_midpoint() {
        let zero = vec![0.0];
        let sampler = Sampler::new(
            vec![0.0, 1.0],
            vec![zero.clone(), vec![0.0], zero.clone(), zero.clone(), vec![1.0], zero],
            Interpolation::CubicSpline,
        );
        let sampled = sampler.sample(0.5).unwrap();
        assert!((sampled[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn rotations_slerp() {
        let sampler = Sampler::new(
            vec![0.0, 1.0],
            vec![Quaternion::one(), Quaternion::from_angle_y(Deg(90.0))],
            Interpolation::Linear,
        );
        let halfway = sampler.sample(0.5).unwrap();
        let expected = Quaternion::from_angle_y(Deg(45.0));
        assert!((halfway.dot(expected) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_sampler_yields_nothing() {
        let sampler: Sampler<Vec<f32>> = Sampler::new(vec![], vec![], Interpolation::Linear);
        assert!(sampler.sample(0.0).is_none());
    }
}
