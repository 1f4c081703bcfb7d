use glam::Vec3;

use crate::config::BAUMGARTE_FACTOR;
use crate::core::body::RigidBody;

use super::{
    apply_angular_impulse_pair, apply_rotation_correction_pair, effective_mass_angular,
    ConstraintSpace, MotorSettings, MotorState, PointPart, SpringSettings,
};

/// Revolute joint: bodies share a pivot and may only rotate relative to
/// each other around one axis. Supports angular limits and a powered motor
/// around the hinge axis.
#[derive(Clone)]
pub struct HingeJoint {
    point: PointPart,
    local_axis_a: Vec3,
    local_axis_b: Vec3,
    local_basis_a: Vec3,
    local_basis_b: Vec3,
    pub limits: Option<(f32, f32)>,
    pub motor_state: MotorState,
    pub motor: MotorSettings,
    pub target_velocity: f32,
    pub target_angle: f32,
    // Prepared per step.
    axis: Vec3,
    perp1: Vec3,
    perp2: Vec3,
    mass_perp1: f32,
    mass_perp2: f32,
    mass_axis: f32,
    angle: f32,
    lambda_perp: [f32; 2],
    lambda_motor: f32,
    lambda_limit: f32,
}

impl HingeJoint {
    pub fn new(
        a: &RigidBody,
        b: &RigidBody,
        space: ConstraintSpace,
        pivot: Vec3,
        axis: Vec3,
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
        let (basis, _) = world_axis.any_orthonormal_pair();
        Self {
            point: PointPart::new(a, b, world_pivot, world_pivot),
            local_axis_a: a.rotation.conjugate() * world_axis,
            local_axis_b: b.rotation.conjugate() * world_axis,
            local_basis_a: a.rotation.conjugate() * basis,
            local_basis_b: b.rotation.conjugate() * basis,
            limits: None,
            motor_state: MotorState::Off,
            motor: MotorSettings::default(),
            target_velocity: 0.0,
            target_angle: 0.0,
            axis: world_axis,
            perp1: Vec3::X,
            perp2: Vec3::Z,
            mass_perp1: 0.0,
            mass_perp2: 0.0,
            mass_axis: 0.0,
            angle: 0.0,
            lambda_perp: [0.0; 2],
            lambda_motor: 0.0,
            lambda_limit: 0.0,
        }
    }

    /// Signed rotation around the hinge axis relative to the rest pose.
    pub fn current_angle(&self, a: &RigidBody, b: &RigidBody) -> f32 {
        let axis = (a.rotation * self.local_axis_a).normalize_or_zero();
        let basis_a = a.rotation * self.local_basis_a;
        let basis_b = b.rotation * self.local_basis_b;
        basis_a.cross(basis_b).dot(axis).atan2(basis_a.dot(basis_b))
    }

    pub(crate) fn prepare(&mut self, a: &RigidBody, b: &RigidBody, _dt: f32) {
        self.point.prepare(a, b);
        self.axis = (a.rotation * self.local_axis_a).normalize_or_zero();
        let (p1, p2) = self.axis.any_orthonormal_pair();
        self.perp1 = p1;
        self.perp2 = p2;
        self.mass_perp1 = effective_mass_angular(a, b, p1);
        self.mass_perp2 = effective_mass_angular(a, b, p2);
        self.mass_axis = effective_mass_angular(a, b, self.axis);
        self.angle = self.current_angle(a, b);

        if self.motor_state == MotorState::Off {
            self.lambda_motor = 0.0;
        }
        let limit_active = self
            .limits
            .map(|(min, max)| self.angle <= min || self.angle >= max)
            .unwrap_or(false);
        if !limit_active {
            self.lambda_limit = 0.0;
        }
    }

    pub(crate) fn warm_start(&mut self, a: &mut RigidBody, b: &mut RigidBody) {
        self.point.warm_start(a, b);
        let angular = self.perp1 * self.lambda_perp[0]
            + self.perp2 * self.lambda_perp[1]
            + self.axis * (self.lambda_motor + self.lambda_limit);
        if angular != Vec3::ZERO {
            apply_angular_impulse_pair(a, b, angular);
        }
    }

    pub(crate) fn solve_velocity(&mut self, a: &mut RigidBody, b: &mut RigidBody, dt: f32) {
        self.point.solve_velocity(a, b);

        // Keep the rotation axes aligned: remove relative angular velocity
        // on the two perpendicular directions.
        for (slot, (perp, mass)) in [(self.perp1, self.mass_perp1), (self.perp2, self.mass_perp2)]
            .into_iter()
            .enumerate()
        {
            let w_rel = b.motion.angular_velocity - a.motion.angular_velocity;
            let impulse = -mass * w_rel.dot(perp);
            self.lambda_perp[slot] += impulse;
            apply_angular_impulse_pair(a, b, perp * impulse);
        }

        if self.mass_axis <= 0.0 {
            return;
        }

        // Motor around the hinge axis.
        match self.motor_state {
            MotorState::Off => {}
            MotorState::Velocity => {
                let w_axis =
                    (b.motion.angular_velocity - a.motion.angular_velocity).dot(self.axis);
                let raw = self.mass_axis * (self.target_velocity - w_axis);
                let max_impulse = self.motor.max_force * dt;
                let total = (self.lambda_motor + raw).clamp(-max_impulse, max_impulse);
                let impulse = total - self.lambda_motor;
                self.lambda_motor = total;
                apply_angular_impulse_pair(a, b, self.axis * impulse);
            }
            MotorState::Position => {
                let error = self.angle - self.target_angle;
                self.solve_axis_spring(a, b, error, self.motor.spring, dt);
            }
        }

        // Rotation limits.
        if let Some((min, max)) = self.limits {
            let w_axis = (b.motion.angular_velocity - a.motion.angular_velocity).dot(self.axis);
            if self.angle <= min {
                let c = self.angle - min;
                let bias = (BAUMGARTE_FACTOR / dt * c).clamp(-2.0, 2.0);
                let raw = -self.mass_axis * (w_axis + bias);
                let total = (self.lambda_limit + raw).max(0.0);
                let impulse = total - self.lambda_limit;
                self.lambda_limit = total;
                apply_angular_impulse_pair(a, b, self.axis * impulse);
            } else if self.angle >= max {
                let c = self.angle - max;
                let bias = (BAUMGARTE_FACTOR / dt * c).clamp(-2.0, 2.0);
                let raw = -self.mass_axis * (w_axis + bias);
                let total = (self.lambda_limit + raw).min(0.0);
                let impulse = total - self.lambda_limit;
                self.lambda_limit = total;
                apply_angular_impulse_pair(a, b, self.axis * impulse);
            }
        }
    }

    fn solve_axis_spring(
        &mut self,
        a: &mut RigidBody,
        b: &mut RigidBody,
        error: f32,
        spring: SpringSettings,
        dt: f32,
    ) {
        let (gamma, bias_coeff) = spring.soft_coefficients(dt, self.mass_axis);
        let w_axis = (b.motion.angular_velocity - a.motion.angular_velocity).dot(self.axis);
        let denom = 1.0 / self.mass_axis + gamma;
        let raw = -(w_axis + bias_coeff * error + gamma * self.lambda_motor) / denom;
        let max_impulse = self.motor.max_force * dt;
        let total = (self.lambda_motor + raw).clamp(-max_impulse, max_impulse);
        let impulse = total - self.lambda_motor;
        self.lambda_motor = total;
        apply_angular_impulse_pair(a, b, self.axis * impulse);
    }

    pub(crate) fn solve_position(&mut self, a: &mut RigidBody, b: &mut RigidBody, _dt: f32) {
        self.point.solve_position(a, b, BAUMGARTE_FACTOR);

        // Re-align the two hinge axes.
        let axis_a = (a.rotation * self.local_axis_a).normalize_or_zero();
        let axis_b = (b.rotation * self.local_axis_b).normalize_or_zero();
        let misalignment = axis_b.cross(axis_a);
        if misalignment.length_squared() > 1e-10 {
            let k = a.effective_inv_inertia() + b.effective_inv_inertia();
            if k.determinant().abs() > f32::EPSILON {
                let impulse = k.inverse() * (misalignment * BAUMGARTE_FACTOR);
                apply_rotation_correction_pair(a, b, impulse);
            }
        }
    }
}
