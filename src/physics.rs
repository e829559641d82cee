use crate::config::PhysicsConfig;
use crate::context::NameId;
use crate::model::Model;
use glam::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicsSourceType {
    X,
    Y,
    Angle,
}

/// Linear range a parameter is normalized into before driving the chain,
/// piecewise around its default so asymmetric parameter ranges keep their
/// rest pose at the normalized default.
#[derive(Debug, Clone, Copy)]
pub struct PhysicsNormalization {
    pub minimum: f32,
    pub maximum: f32,
    pub default: f32,
}

impl PhysicsNormalization {
    fn map(&self, value: f32, minimum: f32, maximum: f32, default: f32) -> f32 {
        let value = value.clamp(minimum, maximum);
        if value <= default {
            let span = default - minimum;
            if span <= 0.0 {
                self.default
            } else {
                self.minimum + (value - minimum) / span * (self.default - self.minimum)
            }
        } else {
            let span = maximum - default;
            if span <= 0.0 {
                self.default
            } else {
                self.default + (value - default) / span * (self.maximum - self.default)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhysicsInput {
    pub source: NameId,
    pub kind: PhysicsSourceType,
    pub weight: f32,
    pub reflect: bool,
}

#[derive(Debug, Clone)]
pub struct PhysicsOutput {
    pub destination: NameId,
    /// Particle whose motion drives this output; must be ≥ 1 since the root
    /// has no parent segment.
    pub particle_index: usize,
    pub kind: PhysicsSourceType,
    pub scale: f32,
    pub weight: f32,
    pub reflect: bool,
    /// Substitute values written when the scaled output leaves the
    /// destination range; defaults to the range bounds themselves.
    pub value_below_minimum: Option<f32>,
    pub value_exceeded_maximum: Option<f32>,
}

/// Mass-spring state for one link of a chain. Particle 0 is the anchored
/// root; each later particle hangs a fixed `radius` from its parent.
#[derive(Debug, Clone)]
pub struct PhysicsParticle {
    pub position: Vec2,
    pub last_position: Vec2,
    pub velocity: Vec2,
    pub mobility: f32,
    pub delay: f32,
    pub acceleration: f32,
    pub radius: f32,
}

impl PhysicsParticle {
    pub fn new(mobility: f32, delay: f32, acceleration: f32, radius: f32) -> Self {
        Self {
            position: Vec2::ZERO,
            last_position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            mobility,
            delay,
            acceleration,
            radius,
        }
    }
}

/// One independent pendulum chain with its parameter plumbing.
#[derive(Debug, Clone)]
pub struct PhysicsSubRig {
    pub id: NameId,
    pub inputs: Vec<PhysicsInput>,
    pub outputs: Vec<PhysicsOutput>,
    pub particles: Vec<PhysicsParticle>,
    pub normalization_position: PhysicsNormalization,
    pub normalization_angle: PhysicsNormalization,
}

impl PhysicsSubRig {
    /// A chain with no particles or a degenerate link cannot be integrated.
    fn is_degenerate(&self) -> bool {
        self.particles.is_empty()
            || self.particles.iter().skip(1).any(|particle| particle.radius <= 0.0)
    }
}

#[derive(Debug, Clone)]
pub struct PhysicsRig {
    pub sub_rigs: Vec<PhysicsSubRig>,
    pub gravity: Vec2,
    pub wind: Vec2,
    /// Authored simulation rate; 0 means follow the frame delta.
    pub fps: f32,
}

/// Integrates the secondary-motion rigs once per tick: read and normalize
/// the input parameters, settle each chain root-to-leaf, then blend the
/// output scalars back into their destination parameters.
pub struct PhysicsSimulator {
    rig: PhysicsRig,
    config: PhysicsConfig,
    nan_logged: bool,
}

impl PhysicsSimulator {
    pub fn new(mut rig: PhysicsRig, config: PhysicsConfig) -> Self {
        for sub_rig in &mut rig.sub_rigs {
            initialize_chain(sub_rig, rig.gravity);
        }
        Self { rig, config, nan_logged: false }
    }

    pub fn rig(&self) -> &PhysicsRig {
        &self.rig
    }

    pub fn set_wind(&mut self, wind: Vec2) {
        self.rig.wind = wind;
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.rig.gravity = gravity;
    }

    /// Advances every sub-rig by `dt` seconds. Large deltas split into
    /// sub-steps so the chains stay stable at low frame rates.
    pub fn update(&mut self, model: &mut Model, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let max_step = if self.rig.fps > 0.0 { 1.0 / self.rig.fps } else { self.config.max_step_seconds };
        let steps = ((dt / max_step).ceil() as u32).clamp(1, self.config.max_substeps.max(1));
        let sub_dt = dt / steps as f32;
        for _ in 0..steps {
            self.step(model, sub_dt);
        }
    }

    fn step(&mut self, model: &mut Model, dt: f32) {
        let gravity = self.rig.gravity;
        let wind = self.rig.wind;
        for sub_rig in &mut self.rig.sub_rigs {
            if sub_rig.is_degenerate() {
                continue;
            }

            let mut total_translation = Vec2::ZERO;
            let mut total_angle = 0.0_f32;
            for input in &sub_rig.inputs {
                let index = model.parameter_index(input.source);
                if !index.is_valid() {
                    continue;
                }
                let raw = model.parameter_value(index);
                let sign = if input.reflect { -1.0 } else { 1.0 };
                match input.kind {
                    PhysicsSourceType::X => {
                        let normalized = sub_rig.normalization_position.map(
                            raw,
                            model.parameter_minimum(index),
                            model.parameter_maximum(index),
                            model.parameter_default(index),
                        );
                        total_translation.x += normalized * sign * input.weight;
                    }
                    PhysicsSourceType::Y => {
                        let normalized = sub_rig.normalization_position.map(
                            raw,
                            model.parameter_minimum(index),
                            model.parameter_maximum(index),
                            model.parameter_default(index),
                        );
                        total_translation.y += normalized * sign * input.weight;
                    }
                    PhysicsSourceType::Angle => {
                        let normalized = sub_rig.normalization_angle.map(
                            raw,
                            model.parameter_minimum(index),
                            model.parameter_maximum(index),
                            model.parameter_default(index),
                        );
                        total_angle += normalized * sign * input.weight;
                    }
                }
            }

            let gravity_direction = rotate(normalize_or(gravity, Vec2::new(0.0, -1.0)), total_angle.to_radians());
            let nan_recovered =
                integrate_chain(sub_rig, total_translation, gravity_direction, wind, dt);
            if nan_recovered && !self.nan_logged {
                log::warn!("physics integration produced a non-finite value; holding previous state");
                self.nan_logged = true;
            }

            apply_outputs(sub_rig, model, gravity_direction, &mut self.nan_logged);
        }
    }
}

fn normalize_or(v: Vec2, fallback: Vec2) -> Vec2 {
    let length = v.length();
    if length > 1e-6 {
        v / length
    } else {
        fallback
    }
}

fn rotate(v: Vec2, radians: f32) -> Vec2 {
    let (sin, cos) = radians.sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Rests the chain along the gravity direction so the first tick starts from
/// equilibrium instead of a fold at the origin.
fn initialize_chain(sub_rig: &mut PhysicsSubRig, gravity: Vec2) {
    let direction = normalize_or(gravity, Vec2::new(0.0, -1.0));
    let mut previous = Vec2::ZERO;
    for (index, particle) in sub_rig.particles.iter_mut().enumerate() {
        let position = if index == 0 { Vec2::ZERO } else { previous + direction * particle.radius };
        particle.position = position;
        particle.last_position = position;
        particle.velocity = Vec2::ZERO;
        previous = position;
    }
}

/// One integration step for a chain. Each particle springs toward its rest
/// point below the parent's already-updated position, is damped by its
/// mobility, and is reprojected onto its rod length. Returns whether a
/// non-finite result had to be discarded.
fn integrate_chain(
    sub_rig: &mut PhysicsSubRig,
    root_translation: Vec2,
    gravity_direction: Vec2,
    wind: Vec2,
    dt: f32,
) -> bool {
    let mut nan_recovered = false;
    sub_rig.particles[0].last_position = sub_rig.particles[0].position;
    sub_rig.particles[0].position = root_translation;

    for index in 1..sub_rig.particles.len() {
        let parent_position = sub_rig.particles[index - 1].position;
        let particle = &mut sub_rig.particles[index];

        let rest_point = parent_position + gravity_direction * particle.radius;
        let force = (rest_point - particle.position) * particle.acceleration + wind;
        let delay_dt = dt * particle.delay;

        let mut velocity = (particle.velocity + force * delay_dt) * particle.mobility;
        let mut position = particle.position + velocity * delay_dt;

        // Rigid rod: the particle may swing but never stretch away from its
        // parent.
        let offset = position - parent_position;
        let length = offset.length();
        position = if length > 1e-6 {
            parent_position + offset / length * particle.radius
        } else {
            rest_point
        };
        if delay_dt > 0.0 {
            velocity = (position - particle.position) / delay_dt * particle.mobility;
        }

        if !position.is_finite() || !velocity.is_finite() {
            nan_recovered = true;
            particle.velocity = Vec2::ZERO;
            continue;
        }
        particle.last_position = particle.position;
        particle.position = position;
        particle.velocity = velocity;
    }
    nan_recovered
}

/// Maps particle motion back into destination parameters with the same
/// source-blend rule motions use, so physics composes with the motion pass
/// instead of overwriting it.
fn apply_outputs(
    sub_rig: &PhysicsSubRig,
    model: &mut Model,
    gravity_direction: Vec2,
    nan_logged: &mut bool,
) {
    for output in &sub_rig.outputs {
        let particle_index = output.particle_index;
        if particle_index == 0 || particle_index >= sub_rig.particles.len() {
            continue;
        }
        let delta = sub_rig.particles[particle_index].position
            - sub_rig.particles[particle_index - 1].position;

        let mut value = match output.kind {
            PhysicsSourceType::X => delta.x * output.scale,
            PhysicsSourceType::Y => delta.y * output.scale,
            PhysicsSourceType::Angle => {
                let baseline = if particle_index >= 2 {
                    sub_rig.particles[particle_index - 1].position
                        - sub_rig.particles[particle_index - 2].position
                } else {
                    gravity_direction
                };
                signed_angle(baseline, delta).to_degrees() * output.scale
            }
        };
        if output.reflect {
            value = -value;
        }
        if !value.is_finite() {
            if !*nan_logged {
                log::warn!("physics output produced a non-finite value; holding previous parameter");
                *nan_logged = true;
            }
            continue;
        }

        let index = model.parameter_index(output.destination);
        if !index.is_valid() {
            continue;
        }
        let minimum = model.parameter_minimum(index);
        let maximum = model.parameter_maximum(index);
        if value < minimum {
            value = output.value_below_minimum.unwrap_or(minimum);
        } else if value > maximum {
            value = output.value_exceeded_maximum.unwrap_or(maximum);
        }

        let source = model.parameter_value(index);
        model.set_parameter_value(index, source + (value - source) * output.weight, 1.0);
    }
}

fn signed_angle(from: Vec2, to: Vec2) -> f32 {
    let cross = from.x * to.y - from.y * to.x;
    let dot = from.dot(to);
    cross.atan2(dot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_is_default_centered() {
        let norm = PhysicsNormalization { minimum: -10.0, maximum: 10.0, default: 0.0 };
        // Parameter range [-30, 30] with default 0.
        assert_eq!(norm.map(0.0, -30.0, 30.0, 0.0), 0.0);
        assert_eq!(norm.map(30.0, -30.0, 30.0, 0.0), 10.0);
        assert_eq!(norm.map(-30.0, -30.0, 30.0, 0.0), -10.0);
        // Asymmetric default still rests at the normalized default.
        assert_eq!(norm.map(10.0, -30.0, 30.0, 10.0), 0.0);
    }

    #[test]
    fn degenerate_rigs_are_detected() {
        let norm = PhysicsNormalization { minimum: -1.0, maximum: 1.0, default: 0.0 };
        let empty = PhysicsSubRig {
            id: crate::context::IdTable::default().intern("Empty"),
            inputs: Vec::new(),
            outputs: Vec::new(),
            particles: Vec::new(),
            normalization_position: norm,
            normalization_angle: norm,
        };
        assert!(empty.is_degenerate());
    }
}
