use glam::{Mat3, Quat, Vec3};

use crate::config::BAUMGARTE_FACTOR;
use crate::core::body::RigidBody;

use super::{
    apply_angular_impulse_pair, apply_impulse_pair, effective_mass_angular,
    effective_mass_linear, local_anchor_of, relative_velocity, world_arm, ConstraintSpace,
};

/// Per-axis behavior of a [`SixDofJoint`]: free, fixed, or limited to
/// `[min, max]` (meters for translation, radians for rotation).
#[derive(Debug, Clone, Copy)]
pub struct SixDofAxis {
    pub min: f32,
    pub max: f32,
}

impl SixDofAxis {
    pub fn free() -> Self {
        Self {
            min: f32::NEG_INFINITY,
            max: f32::INFINITY,
        }
    }

    pub fn fixed() -> Self {
        Self { min: 0.0, max: 0.0 }
    }

    pub fn limited(min: f32, max: f32) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    fn is_free(&self) -> bool {
        self.min == f32::NEG_INFINITY && self.max == f32::INFINITY
    }

    fn is_fixed(&self) -> bool {
        self.min == self.max
    }
}

/// General joint with independently enablable limits on all six degrees of
/// freedom, expressed in a constraint frame attached to body A.
#[derive(Clone)]
pub struct SixDofJoint {
    local_anchor_a: Vec3,
    local_anchor_b: Vec3,
    /// Rotation from body A's frame into the constraint frame.
    local_frame_a: Quat,
    /// conj(constraint frame on A) * body B rotation at rest.
    rest_rotation: Quat,
    /// Translation X/Y/Z then rotation X/Y/Z.
    pub axes: [SixDofAxis; 6],
    // Prepared per step.
    r_a: Vec3,
    r_b: Vec3,
    world_axes: [Vec3; 3],
    translation: Vec3,
    rotation_vector: Vec3,
    masses: [f32; 6],
    lambdas: [f32; 6],
}

impl SixDofJoint {
    pub fn new(
        a: &RigidBody,
        b: &RigidBody,
        space: ConstraintSpace,
        anchor: Vec3,
        frame_rotation: Quat,
        axes: [SixDofAxis; 6],
    ) -> Self {
        let (world_anchor, world_frame) = match space {
            ConstraintSpace::World => (anchor, frame_rotation.normalize()),
            ConstraintSpace::Local => (
                a.transform().point_to_world(anchor),
                (a.rotation * frame_rotation).normalize(),
            ),
        };
        let local_frame_a = (a.rotation.conjugate() * world_frame).normalize();
        Self {
            local_anchor_a: local_anchor_of(a, world_anchor),
            local_anchor_b: local_anchor_of(b, world_anchor),
            local_frame_a,
            rest_rotation: (world_frame.conjugate() * b.rotation).normalize(),
            axes,
            r_a: Vec3::ZERO,
            r_b: Vec3::ZERO,
            world_axes: [Vec3::X, Vec3::Y, Vec3::Z],
            translation: Vec3::ZERO,
            rotation_vector: Vec3::ZERO,
            masses: [0.0; 6],
            lambdas: [0.0; 6],
        }
    }

    /// Current translation along the three constraint-frame axes.
    pub fn current_translation(&self, a: &RigidBody, b: &RigidBody) -> Vec3 {
        let frame = (a.rotation * self.local_frame_a).normalize();
        let delta = (b.center_of_mass_position() + b.rotation * self.local_anchor_b)
            - (a.center_of_mass_position() + a.rotation * self.local_anchor_a);
        frame.conjugate() * delta
    }

    /// Current rotation error as a constraint-frame rotation vector.
    pub fn current_rotation(&self, a: &RigidBody, b: &RigidBody) -> Vec3 {
        let frame = (a.rotation * self.local_frame_a).normalize();
        let relative = (frame.conjugate() * b.rotation * self.rest_rotation.conjugate())
            .normalize();
        let (axis, mut angle) = relative.to_axis_angle();
        if angle > std::f32::consts::PI {
            angle -= 2.0 * std::f32::consts::PI;
        }
        axis * angle
    }

    pub(crate) fn prepare(&mut self, a: &RigidBody, b: &RigidBody, _dt: f32) {
        self.r_a = world_arm(a, self.local_anchor_a);
        self.r_b = world_arm(b, self.local_anchor_b);
        let frame = (a.rotation * self.local_frame_a).normalize();
        let basis = Mat3::from_quat(frame);
        self.world_axes = [basis.x_axis, basis.y_axis, basis.z_axis];
        self.translation = self.current_translation(a, b);
        self.rotation_vector = self.current_rotation(a, b);

        for axis_index in 0..3 {
            self.masses[axis_index] = effective_mass_linear(
                a,
                b,
                self.r_a,
                self.r_b,
                self.world_axes[axis_index],
            );
            self.masses[axis_index + 3] =
                effective_mass_angular(a, b, self.world_axes[axis_index]);
        }

        for dof in 0..6 {
            let axis = self.axes[dof];
            let value = self.dof_value(dof);
            let engaged = axis.is_fixed() || value <= axis.min || value >= axis.max;
            if axis.is_free() || !engaged {
                self.lambdas[dof] = 0.0;
            }
        }
    }

    fn dof_value(&self, dof: usize) -> f32 {
        if dof < 3 {
            self.translation[dof]
        } else {
            self.rotation_vector[dof - 3]
        }
    }

    pub(crate) fn warm_start(&mut self, a: &mut RigidBody, b: &mut RigidBody) {
        let mut linear = Vec3::ZERO;
        let mut angular = Vec3::ZERO;
        for dof in 0..3 {
            linear += self.world_axes[dof] * self.lambdas[dof];
            angular += self.world_axes[dof] * self.lambdas[dof + 3];
        }
        if linear != Vec3::ZERO {
            apply_impulse_pair(a, b, linear, self.r_a, self.r_b);
        }
        if angular != Vec3::ZERO {
            apply_angular_impulse_pair(a, b, angular);
        }
    }

    pub(crate) fn solve_velocity(&mut self, a: &mut RigidBody, b: &mut RigidBody, dt: f32) {
        for dof in 0..6 {
            let axis_cfg = self.axes[dof];
            if axis_cfg.is_free() || self.masses[dof] <= 0.0 {
                continue;
            }
            let axis = self.world_axes[dof % 3];
            let value = self.dof_value(dof);

            let (violation, side) = if axis_cfg.is_fixed() {
                (value - axis_cfg.min, Side::Both)
            } else if value <= axis_cfg.min {
                (value - axis_cfg.min, Side::Lower)
            } else if value >= axis_cfg.max {
                (value - axis_cfg.max, Side::Upper)
            } else {
                continue;
            };

            let jv = if dof < 3 {
                relative_velocity(a, b, self.r_a, self.r_b).dot(axis)
            } else {
                (b.motion.angular_velocity - a.motion.angular_velocity).dot(axis)
            };

            let cap = if dof < 3 { 10.0 } else { 2.0 };
            let bias = (BAUMGARTE_FACTOR / dt * violation).clamp(-cap, cap);
            let raw = -self.masses[dof] * (jv + bias);
            let total = match side {
                Side::Both => self.lambdas[dof] + raw,
                Side::Lower => (self.lambdas[dof] + raw).max(0.0),
                Side::Upper => (self.lambdas[dof] + raw).min(0.0),
            };
            let impulse = total - self.lambdas[dof];
            self.lambdas[dof] = total;

            if dof < 3 {
                apply_impulse_pair(a, b, axis * impulse, self.r_a, self.r_b);
            } else {
                apply_angular_impulse_pair(a, b, axis * impulse);
            }
        }
    }

    pub(crate) fn solve_position(&mut self, a: &mut RigidBody, b: &mut RigidBody, _dt: f32) {
        // Translation error correction on fixed/violated axes.
        let r_a = world_arm(a, self.local_anchor_a);
        let r_b = world_arm(b, self.local_anchor_b);
        let frame = (a.rotation * self.local_frame_a).normalize();
        let basis = Mat3::from_quat(frame);
        let translation = self.current_translation(a, b);

        for dof in 0..3 {
            let cfg = self.axes[dof];
            if cfg.is_free() {
                continue;
            }
            let value = translation[dof];
            let violation = if cfg.is_fixed() {
                value - cfg.min
            } else if value < cfg.min {
                value - cfg.min
            } else if value > cfg.max {
                value - cfg.max
            } else {
                continue;
            };
            let axis = basis.col(dof);
            let mass = effective_mass_linear(a, b, r_a, r_b, axis);
            let impulse = axis * (-violation * BAUMGARTE_FACTOR * mass);
            super::apply_position_impulse_pair(a, b, impulse, r_a, r_b);
        }

        // Rotation error correction.
        let rotation = self.current_rotation(a, b);
        for dof in 0..3 {
            let cfg = self.axes[dof + 3];
            if cfg.is_free() {
                continue;
            }
            let value = rotation[dof];
            let violation = if cfg.is_fixed() {
                value - cfg.min
            } else if value < cfg.min {
                value - cfg.min
            } else if value > cfg.max {
                value - cfg.max
            } else {
                continue;
            };
            let axis = basis.col(dof);
            let mass = effective_mass_angular(a, b, axis);
            let impulse = axis * (-violation * BAUMGARTE_FACTOR * mass);
            super::apply_rotation_correction_pair(a, b, impulse);
        }
    }
}

enum Side {
    Both,
    Lower,
    Upper,
}
