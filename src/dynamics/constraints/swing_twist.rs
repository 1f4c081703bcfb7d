use glam::Vec3;

use crate::config::BAUMGARTE_FACTOR;
use crate::core::body::RigidBody;

use super::{
    apply_angular_impulse_pair, effective_mass_angular, ConstraintSpace, PointPart,
};

/// Shoulder-style joint separating twist (rotation around a chosen axis)
/// from swing (deviation of that axis), with independent limits: twist in
/// `[twist_min, twist_max]`, swing bounded by two plane cone half-angles.
#[derive(Clone)]
pub struct SwingTwistJoint {
    point: PointPart,
    local_twist_a: Vec3,
    local_twist_b: Vec3,
    local_plane_a: Vec3,
    local_plane_b: Vec3,
    pub twist_min: f32,
    pub twist_max: f32,
    /// Half-angle of the swing cone in the plane-axis direction.
    pub plane_half_angle: f32,
    /// Half-angle of the swing cone in the normal direction.
    pub normal_half_angle: f32,
    // Prepared per step.
    twist_axis: Vec3,
    swing_axes: [Vec3; 2],
    swing_angles: [f32; 2],
    swing_masses: [f32; 2],
    twist_angle: f32,
    twist_mass: f32,
    lambda_swing: [f32; 2],
    lambda_twist: f32,
}

impl SwingTwistJoint {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        a: &RigidBody,
        b: &RigidBody,
        space: ConstraintSpace,
        pivot: Vec3,
        twist_axis: Vec3,
        twist_min: f32,
        twist_max: f32,
        plane_half_angle: f32,
        normal_half_angle: f32,
    ) -> Self {
        let (world_pivot, world_axis) = match space {
            ConstraintSpace::World => (pivot, twist_axis.normalize_or_zero()),
            ConstraintSpace::Local => (
                a.transform().point_to_world(pivot),
                (a.rotation * twist_axis).normalize_or_zero(),
            ),
        };
        let world_axis = if world_axis == Vec3::ZERO {
            Vec3::Y
        } else {
            world_axis
        };
        let (plane, _) = world_axis.any_orthonormal_pair();
        Self {
            point: PointPart::new(a, b, world_pivot, world_pivot),
            local_twist_a: a.rotation.conjugate() * world_axis,
            local_twist_b: b.rotation.conjugate() * world_axis,
            local_plane_a: a.rotation.conjugate() * plane,
            local_plane_b: b.rotation.conjugate() * plane,
            twist_min,
            twist_max: twist_max.max(twist_min),
            plane_half_angle: plane_half_angle.max(0.0),
            normal_half_angle: normal_half_angle.max(0.0),
            twist_axis: world_axis,
            swing_axes: [Vec3::X; 2],
            swing_angles: [0.0; 2],
            swing_masses: [0.0; 2],
            twist_angle: 0.0,
            twist_mass: 0.0,
            lambda_swing: [0.0; 2],
            lambda_twist: 0.0,
        }
    }

    /// Current twist angle around the twist axis.
    pub fn current_twist(&self, a: &RigidBody, b: &RigidBody) -> f32 {
        let axis = (a.rotation * self.local_twist_a).normalize_or_zero();
        let plane_a = a.rotation * self.local_plane_a;
        let plane_b = b.rotation * self.local_plane_b;
        // Project both reference vectors off the twist axis before
        // measuring, so swing does not read as twist.
        let pa = (plane_a - axis * plane_a.dot(axis)).normalize_or_zero();
        let pb = (plane_b - axis * plane_b.dot(axis)).normalize_or_zero();
        if pa == Vec3::ZERO || pb == Vec3::ZERO {
            return 0.0;
        }
        pa.cross(pb).dot(axis).atan2(pa.dot(pb))
    }

    /// Current swing angles `(plane, normal)`.
    pub fn current_swing(&self, a: &RigidBody, b: &RigidBody) -> (f32, f32) {
        let axis_a = (a.rotation * self.local_twist_a).normalize_or_zero();
        let axis_b = (b.rotation * self.local_twist_b).normalize_or_zero();
        let plane = a.rotation * self.local_plane_a;
        let normal = axis_a.cross(plane).normalize_or_zero();
        (
            axis_b.dot(plane).atan2(axis_b.dot(axis_a)),
            axis_b.dot(normal).atan2(axis_b.dot(axis_a)),
        )
    }

    pub(crate) fn prepare(&mut self, a: &RigidBody, b: &RigidBody, _dt: f32) {
        self.point.prepare(a, b);

        self.twist_axis = (a.rotation * self.local_twist_a).normalize_or_zero();
        let plane = (a.rotation * self.local_plane_a).normalize_or_zero();
        let normal = self.twist_axis.cross(plane).normalize_or_zero();

        let (plane_angle, normal_angle) = self.current_swing(a, b);
        self.swing_angles = [plane_angle, normal_angle];
        // Axes oriented so a positive relative rotation increases the
        // corresponding swing angle.
        self.swing_axes = [normal, -plane];
        self.swing_masses = [
            effective_mass_angular(a, b, self.swing_axes[0]),
            effective_mass_angular(a, b, self.swing_axes[1]),
        ];
        self.twist_angle = self.current_twist(a, b);
        self.twist_mass = effective_mass_angular(a, b, self.twist_axis);

        let limits = [self.plane_half_angle, self.normal_half_angle];
        for slot in 0..2 {
            if self.swing_angles[slot].abs() < limits[slot] {
                self.lambda_swing[slot] = 0.0;
            }
        }
        if self.twist_angle > self.twist_min && self.twist_angle < self.twist_max {
            self.lambda_twist = 0.0;
        }
    }

    pub(crate) fn warm_start(&mut self, a: &mut RigidBody, b: &mut RigidBody) {
        self.point.warm_start(a, b);
        let angular = self.swing_axes[0] * self.lambda_swing[0]
            + self.swing_axes[1] * self.lambda_swing[1]
            + self.twist_axis * self.lambda_twist;
        if angular != Vec3::ZERO {
            apply_angular_impulse_pair(a, b, angular);
        }
    }

    pub(crate) fn solve_velocity(&mut self, a: &mut RigidBody, b: &mut RigidBody, dt: f32) {
        self.point.solve_velocity(a, b);

        // Swing limits, one per plane cone.
        let limits = [self.plane_half_angle, self.normal_half_angle];
        for slot in 0..2 {
            let angle = self.swing_angles[slot];
            let limit = limits[slot];
            if angle.abs() < limit || self.swing_masses[slot] <= 0.0 {
                continue;
            }
            let axis = self.swing_axes[slot];
            let violation = angle - angle.clamp(-limit, limit);
            let w_rel = (b.motion.angular_velocity - a.motion.angular_velocity).dot(axis);
            let bias = (BAUMGARTE_FACTOR / dt * violation).clamp(-2.0, 2.0);
            let raw = -self.swing_masses[slot] * (w_rel + bias);
            let total = if violation > 0.0 {
                (self.lambda_swing[slot] + raw).min(0.0)
            } else {
                (self.lambda_swing[slot] + raw).max(0.0)
            };
            let impulse = total - self.lambda_swing[slot];
            self.lambda_swing[slot] = total;
            apply_angular_impulse_pair(a, b, axis * impulse);
        }

        // Twist limit.
        if self.twist_mass > 0.0
            && (self.twist_angle <= self.twist_min || self.twist_angle >= self.twist_max)
        {
            let violation = if self.twist_angle <= self.twist_min {
                self.twist_angle - self.twist_min
            } else {
                self.twist_angle - self.twist_max
            };
            let w_rel =
                (b.motion.angular_velocity - a.motion.angular_velocity).dot(self.twist_axis);
            let bias = (BAUMGARTE_FACTOR / dt * violation).clamp(-2.0, 2.0);
            let raw = -self.twist_mass * (w_rel + bias);
            let total = if violation < 0.0 {
                (self.lambda_twist + raw).max(0.0)
            } else {
                (self.lambda_twist + raw).min(0.0)
            };
            let impulse = total - self.lambda_twist;
            self.lambda_twist = total;
            apply_angular_impulse_pair(a, b, self.twist_axis * impulse);
        }
    }

    pub(crate) fn solve_position(&mut self, a: &mut RigidBody, b: &mut RigidBody, _dt: f32) {
        self.point.solve_position(a, b, BAUMGARTE_FACTOR);
    }
}
