use glam::Vec3;

use crate::config::BAUMGARTE_FACTOR;
use crate::core::body::RigidBody;

use super::{
    apply_impulse_pair, apply_position_impulse_pair, effective_mass_linear, local_anchor_of,
    relative_velocity, world_arm, ConstraintSpace, SpringSettings,
};

/// Keeps the distance between two anchors inside `[min, max]`, optionally
/// through a spring instead of a hard stop.
#[derive(Clone)]
pub struct DistanceJoint {
    local_a: Vec3,
    local_b: Vec3,
    pub min: f32,
    pub max: f32,
    pub spring: Option<SpringSettings>,
    // Prepared per step.
    r_a: Vec3,
    r_b: Vec3,
    axis: Vec3,
    error: f32,
    effective_mass: f32,
    gamma: f32,
    bias: f32,
    lambda: f32,
}

impl DistanceJoint {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        a: &RigidBody,
        b: &RigidBody,
        space: ConstraintSpace,
        pivot_a: Vec3,
        pivot_b: Vec3,
        min: f32,
        max: f32,
        spring: Option<SpringSettings>,
    ) -> Self {
        let (world_a, world_b) = match space {
            ConstraintSpace::World => (pivot_a, pivot_b),
            ConstraintSpace::Local => (
                a.transform().point_to_world(pivot_a),
                b.transform().point_to_world(pivot_b),
            ),
        };
        Self {
            local_a: local_anchor_of(a, world_a),
            local_b: local_anchor_of(b, world_b),
            min: min.max(0.0),
            max: max.max(min),
            spring,
            r_a: Vec3::ZERO,
            r_b: Vec3::ZERO,
            axis: Vec3::X,
            error: 0.0,
            effective_mass: 0.0,
            gamma: 0.0,
            bias: 0.0,
            lambda: 0.0,
        }
    }

    /// Current distance between the anchors.
    pub fn current_length(&self, a: &RigidBody, b: &RigidBody) -> f32 {
        let wa = a.center_of_mass_position() + a.rotation * self.local_a;
        let wb = b.center_of_mass_position() + b.rotation * self.local_b;
        (wb - wa).length()
    }

    pub(crate) fn prepare(&mut self, a: &RigidBody, b: &RigidBody, dt: f32) {
        self.r_a = world_arm(a, self.local_a);
        self.r_b = world_arm(b, self.local_b);
        let delta = (b.center_of_mass_position() + self.r_b)
            - (a.center_of_mass_position() + self.r_a);
        let length = delta.length();
        self.axis = if length > 1e-6 { delta / length } else { Vec3::X };

        // Positive error = too long, negative = too short, zero in range.
        self.error = if length > self.max {
            length - self.max
        } else if length < self.min {
            length - self.min
        } else {
            0.0
        };

        if self.error == 0.0 {
            // In range: nothing to warm start.
            self.lambda = 0.0;
        }

        self.effective_mass = effective_mass_linear(a, b, self.r_a, self.r_b, self.axis);
        (self.gamma, self.bias) = match &self.spring {
            Some(spring) if self.error != 0.0 => {
                let (gamma, bias_coeff) = spring.soft_coefficients(dt, self.effective_mass);
                (gamma, bias_coeff * self.error)
            }
            _ => (0.0, 0.0),
        };
    }

    pub(crate) fn warm_start(&mut self, a: &mut RigidBody, b: &mut RigidBody) {
        if self.lambda != 0.0 {
            apply_impulse_pair(a, b, self.axis * self.lambda, self.r_a, self.r_b);
        }
    }

    pub(crate) fn solve_velocity(&mut self, a: &mut RigidBody, b: &mut RigidBody, dt: f32) {
        if self.error == 0.0 {
            self.lambda = 0.0;
            return;
        }

        let v_rel = relative_velocity(a, b, self.r_a, self.r_b).dot(self.axis);
        let (impulse, total) = if self.spring.is_some() {
            let denom = 1.0 / self.effective_mass.max(1e-9) + self.gamma;
            let impulse = -(v_rel + self.bias + self.gamma * self.lambda) / denom;
            (impulse, self.lambda + impulse)
        } else {
            // Hard limit with a capped Baumgarte feedback term.
            let bias = (BAUMGARTE_FACTOR / dt * self.error).clamp(-10.0, 10.0);
            let raw = -self.effective_mass * (v_rel + bias);
            // Too long may only pull, too short may only push.
            let total = if self.error > 0.0 {
                (self.lambda + raw).min(0.0)
            } else {
                (self.lambda + raw).max(0.0)
            };
            (total - self.lambda, total)
        };

        self.lambda = total;
        if impulse != 0.0 {
            apply_impulse_pair(a, b, self.axis * impulse, self.r_a, self.r_b);
        }
    }

    pub(crate) fn solve_position(&mut self, a: &mut RigidBody, b: &mut RigidBody, _dt: f32) {
        if self.spring.is_some() {
            return; // springs resolve through velocities only
        }
        let r_a = world_arm(a, self.local_a);
        let r_b = world_arm(b, self.local_b);
        let delta =
            (b.center_of_mass_position() + r_b) - (a.center_of_mass_position() + r_a);
        let length = delta.length();
        let error = if length > self.max {
            length - self.max
        } else if length < self.min {
            length - self.min
        } else {
            return;
        };
        let axis = if length > 1e-6 { delta / length } else { Vec3::X };
        let effective_mass = effective_mass_linear(a, b, r_a, r_b, axis);
        let impulse = axis * (-error * BAUMGARTE_FACTOR * effective_mass);
        apply_position_impulse_pair(a, b, impulse, r_a, r_b);
    }
}
