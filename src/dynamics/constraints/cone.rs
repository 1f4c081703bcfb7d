use glam::Vec3;

use crate::config::BAUMGARTE_FACTOR;
use crate::core::body::RigidBody;

use super::{
    apply_angular_impulse_pair, apply_rotation_correction_pair, effective_mass_angular,
    ConstraintSpace, PointPart,
};

/// Ball-and-socket joint with a cone limit: the twist axis of body B may
/// deviate from body A's twist axis by at most the cone half-angle.
#[derive(Clone)]
pub struct ConeJoint {
    point: PointPart,
    local_axis_a: Vec3,
    local_axis_b: Vec3,
    pub half_angle: f32,
    // Prepared per step.
    limit_axis: Vec3,
    mass_limit: f32,
    angle: f32,
    lambda: f32,
}

impl ConeJoint {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        a: &RigidBody,
        b: &RigidBody,
        space: ConstraintSpace,
        pivot: Vec3,
        axis: Vec3,
        half_angle: f32,
    ) -> Self {
        let (world_pivot, world_axis) = match space {
            ConstraintSpace::World => (pivot, axis.normalize_or_zero()),
            ConstraintSpace::Local => (
                a.transform().point_to_world(pivot),
                (a.rotation * axis).normalize_or_zero(),
            ),
        };
        let world_axis = if world_axis == Vec3::ZERO {
            Vec3::Y
        } else {
            world_axis
        };
        Self {
            point: PointPart::new(a, b, world_pivot, world_pivot),
            local_axis_a: a.rotation.conjugate() * world_axis,
            local_axis_b: b.rotation.conjugate() * world_axis,
            half_angle: half_angle.max(0.0),
            limit_axis: Vec3::X,
            mass_limit: 0.0,
            angle: 0.0,
            lambda: 0.0,
        }
    }

    /// Current angle between the two twist axes.
    pub fn current_angle(&self, a: &RigidBody, b: &RigidBody) -> f32 {
        let axis_a = (a.rotation * self.local_axis_a).normalize_or_zero();
        let axis_b = (b.rotation * self.local_axis_b).normalize_or_zero();
        axis_a.dot(axis_b).clamp(-1.0, 1.0).acos()
    }

    pub(crate) fn prepare(&mut self, a: &RigidBody, b: &RigidBody, _dt: f32) {
        self.point.prepare(a, b);
        let axis_a = (a.rotation * self.local_axis_a).normalize_or_zero();
        let axis_b = (b.rotation * self.local_axis_b).normalize_or_zero();
        self.angle = axis_a.dot(axis_b).clamp(-1.0, 1.0).acos();
        // Positive rotation around this axis widens the cone angle.
        self.limit_axis = axis_a.cross(axis_b).normalize_or_zero();
        if self.limit_axis == Vec3::ZERO {
            self.limit_axis = axis_a.any_orthonormal_vector();
        }
        self.mass_limit = effective_mass_angular(a, b, self.limit_axis);
        if self.angle < self.half_angle {
            self.lambda = 0.0;
        }
    }

    pub(crate) fn warm_start(&mut self, a: &mut RigidBody, b: &mut RigidBody) {
        self.point.warm_start(a, b);
        if self.lambda != 0.0 {
            apply_angular_impulse_pair(a, b, self.limit_axis * self.lambda);
        }
    }

    pub(crate) fn solve_velocity(&mut self, a: &mut RigidBody, b: &mut RigidBody, dt: f32) {
        self.point.solve_velocity(a, b);

        if self.angle < self.half_angle || self.mass_limit <= 0.0 {
            return;
        }
        let violation = self.angle - self.half_angle;
        let w_rel = (b.motion.angular_velocity - a.motion.angular_velocity).dot(self.limit_axis);
        let bias = (BAUMGARTE_FACTOR / dt * violation).clamp(-2.0, 2.0);
        let raw = -self.mass_limit * (w_rel + bias);
        // The limit may only pull the cone closed.
        let total = (self.lambda + raw).min(0.0);
        let impulse = total - self.lambda;
        self.lambda = total;
        apply_angular_impulse_pair(a, b, self.limit_axis * impulse);
    }

    pub(crate) fn solve_position(&mut self, a: &mut RigidBody, b: &mut RigidBody, _dt: f32) {
        self.point.solve_position(a, b, BAUMGARTE_FACTOR);

        let axis_a = (a.rotation * self.local_axis_a).normalize_or_zero();
        let axis_b = (b.rotation * self.local_axis_b).normalize_or_zero();
        let angle = axis_a.dot(axis_b).clamp(-1.0, 1.0).acos();
        if angle <= self.half_angle {
            return;
        }
        let limit_axis = axis_a.cross(axis_b).normalize_or_zero();
        if limit_axis == Vec3::ZERO {
            return;
        }
        let mass = effective_mass_angular(a, b, limit_axis);
        let impulse =
            limit_axis * (-(angle - self.half_angle) * BAUMGARTE_FACTOR * mass);
        apply_rotation_correction_pair(a, b, impulse);
    }
}
