use glam::Vec3;

use crate::config::BAUMGARTE_FACTOR;
use crate::core::body::RigidBody;

use super::{
    apply_impulse_pair, apply_position_impulse_pair, effective_mass_linear, local_anchor_of,
    relative_velocity, world_arm, AngularLockPart, ConstraintSpace, MotorSettings, MotorState,
    SpringSettings,
};

/// Prismatic joint: relative rotation fully locked, translation permitted
/// along one axis with optional limits, spring, and a linear motor.
#[derive(Clone)]
pub struct SliderJoint {
    local_a: Vec3,
    local_b: Vec3,
    local_axis_a: Vec3,
    angular: AngularLockPart,
    pub limits: Option<(f32, f32)>,
    pub spring: Option<SpringSettings>,
    pub motor_state: MotorState,
    pub motor: MotorSettings,
    pub target_velocity: f32,
    pub target_position: f32,
    // Prepared per step.
    r_a: Vec3,
    r_b: Vec3,
    axis: Vec3,
    perp1: Vec3,
    perp2: Vec3,
    mass_perp1: f32,
    mass_perp2: f32,
    mass_axis: f32,
    position: f32,
    lambda_perp: [f32; 2],
    lambda_motor: f32,
    lambda_limit: f32,
}

impl SliderJoint {
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
            Vec3::X
        } else {
            world_axis
        };
        Self {
            local_a: local_anchor_of(a, world_pivot),
            local_b: local_anchor_of(b, world_pivot),
            local_axis_a: a.rotation.conjugate() * world_axis,
            angular: AngularLockPart::new(a, b),
            limits: None,
            spring: None,
            motor_state: MotorState::Off,
            motor: MotorSettings::default(),
            target_velocity: 0.0,
            target_position: 0.0,
            r_a: Vec3::ZERO,
            r_b: Vec3::ZERO,
            axis: world_axis,
            perp1: Vec3::Y,
            perp2: Vec3::Z,
            mass_perp1: 0.0,
            mass_perp2: 0.0,
            mass_axis: 0.0,
            position: 0.0,
            lambda_perp: [0.0; 2],
            lambda_motor: 0.0,
            lambda_limit: 0.0,
        }
    }

    /// Current translation along the slider axis.
    pub fn current_position(&self, a: &RigidBody, b: &RigidBody) -> f32 {
        let axis = (a.rotation * self.local_axis_a).normalize_or_zero();
        let delta = (b.center_of_mass_position() + b.rotation * self.local_b)
            - (a.center_of_mass_position() + a.rotation * self.local_a);
        delta.dot(axis)
    }

    pub(crate) fn prepare(&mut self, a: &RigidBody, b: &RigidBody, _dt: f32) {
        self.angular.prepare(a, b);
        self.r_a = world_arm(a, self.local_a);
        self.r_b = world_arm(b, self.local_b);
        self.axis = (a.rotation * self.local_axis_a).normalize_or_zero();
        let (p1, p2) = self.axis.any_orthonormal_pair();
        self.perp1 = p1;
        self.perp2 = p2;
        self.mass_perp1 = effective_mass_linear(a, b, self.r_a, self.r_b, p1);
        self.mass_perp2 = effective_mass_linear(a, b, self.r_a, self.r_b, p2);
        self.mass_axis = effective_mass_linear(a, b, self.r_a, self.r_b, self.axis);
        self.position = self.current_position(a, b);

        if self.motor_state == MotorState::Off {
            self.lambda_motor = 0.0;
        }
        let limit_active = self
            .limits
            .map(|(min, max)| self.position <= min || self.position >= max)
            .unwrap_or(false);
        if !limit_active {
            self.lambda_limit = 0.0;
        }
    }

    pub(crate) fn warm_start(&mut self, a: &mut RigidBody, b: &mut RigidBody) {
        self.angular.warm_start(a, b);
        let impulse = self.perp1 * self.lambda_perp[0]
            + self.perp2 * self.lambda_perp[1]
            + self.axis * (self.lambda_motor + self.lambda_limit);
        if impulse != Vec3::ZERO {
            apply_impulse_pair(a, b, impulse, self.r_a, self.r_b);
        }
    }

    pub(crate) fn solve_velocity(&mut self, a: &mut RigidBody, b: &mut RigidBody, dt: f32) {
        self.angular.solve_velocity(a, b);

        // Lock translation perpendicular to the slide axis, with a position
        // feedback term so drift does not accumulate.
        let delta = (b.center_of_mass_position() + self.r_b)
            - (a.center_of_mass_position() + self.r_a);
        for (slot, (perp, mass)) in [(self.perp1, self.mass_perp1), (self.perp2, self.mass_perp2)]
            .into_iter()
            .enumerate()
        {
            let v_rel = relative_velocity(a, b, self.r_a, self.r_b).dot(perp);
            let bias = BAUMGARTE_FACTOR / dt * delta.dot(perp);
            let impulse = -mass * (v_rel + bias.clamp(-20.0, 20.0));
            self.lambda_perp[slot] += impulse;
            apply_impulse_pair(a, b, perp * impulse, self.r_a, self.r_b);
        }

        if self.mass_axis <= 0.0 {
            return;
        }

        match self.motor_state {
            MotorState::Off => {}
            MotorState::Velocity => {
                let v_axis = relative_velocity(a, b, self.r_a, self.r_b).dot(self.axis);
                let raw = self.mass_axis * (self.target_velocity - v_axis);
                let max_impulse = self.motor.max_force * dt;
                let total = (self.lambda_motor + raw).clamp(-max_impulse, max_impulse);
                let impulse = total - self.lambda_motor;
                self.lambda_motor = total;
                apply_impulse_pair(a, b, self.axis * impulse, self.r_a, self.r_b);
            }
            MotorState::Position => {
                let error = self.position - self.target_position;
                let (gamma, bias_coeff) = self.motor.spring.soft_coefficients(dt, self.mass_axis);
                let v_axis = relative_velocity(a, b, self.r_a, self.r_b).dot(self.axis);
                let denom = 1.0 / self.mass_axis + gamma;
                let raw = -(v_axis + bias_coeff * error + gamma * self.lambda_motor) / denom;
                let max_impulse = self.motor.max_force * dt;
                let total = (self.lambda_motor + raw).clamp(-max_impulse, max_impulse);
                let impulse = total - self.lambda_motor;
                self.lambda_motor = total;
                apply_impulse_pair(a, b, self.axis * impulse, self.r_a, self.r_b);
            }
        }

        if let Some((min, max)) = self.limits {
            let v_axis = relative_velocity(a, b, self.r_a, self.r_b).dot(self.axis);
            let (violation, clamp_low) = if self.position <= min {
                (self.position - min, true)
            } else if self.position >= max {
                (self.position - max, false)
            } else {
                return;
            };

            match &self.spring {
                Some(spring) => {
                    let (gamma, bias_coeff) = spring.soft_coefficients(dt, self.mass_axis);
                    let denom = 1.0 / self.mass_axis + gamma;
                    let raw =
                        -(v_axis + bias_coeff * violation + gamma * self.lambda_limit) / denom;
                    let total = if clamp_low {
                        (self.lambda_limit + raw).max(0.0)
                    } else {
                        (self.lambda_limit + raw).min(0.0)
                    };
                    let impulse = total - self.lambda_limit;
                    self.lambda_limit = total;
                    apply_impulse_pair(a, b, self.axis * impulse, self.r_a, self.r_b);
                }
                None => {
                    let bias = (BAUMGARTE_FACTOR / dt * violation).clamp(-10.0, 10.0);
                    let raw = -self.mass_axis * (v_axis + bias);
                    let total = if clamp_low {
                        (self.lambda_limit + raw).max(0.0)
                    } else {
                        (self.lambda_limit + raw).min(0.0)
                    };
                    let impulse = total - self.lambda_limit;
                    self.lambda_limit = total;
                    apply_impulse_pair(a, b, self.axis * impulse, self.r_a, self.r_b);
                }
            }
        }
    }

    pub(crate) fn solve_position(&mut self, a: &mut RigidBody, b: &mut RigidBody, _dt: f32) {
        self.angular.solve_position(a, b, BAUMGARTE_FACTOR);

        // Remove residual perpendicular drift.
        let r_a = world_arm(a, self.local_a);
        let r_b = world_arm(b, self.local_b);
        let axis = (a.rotation * self.local_axis_a).normalize_or_zero();
        let delta =
            (b.center_of_mass_position() + r_b) - (a.center_of_mass_position() + r_a);
        let perpendicular = delta - axis * delta.dot(axis);
        if perpendicular.length_squared() > 1e-10 {
            let dir = perpendicular.normalize();
            let mass = effective_mass_linear(a, b, r_a, r_b, dir);
            let impulse = dir * (-perpendicular.length() * BAUMGARTE_FACTOR * mass);
            apply_position_impulse_pair(a, b, impulse, r_a, r_b);
        }

        if let Some((min, max)) = self.limits {
            let s = delta.dot(axis);
            let violation = if s < min {
                s - min
            } else if s > max {
                s - max
            } else {
                return;
            };
            let mass = effective_mass_linear(a, b, r_a, r_b, axis);
            let impulse = axis * (-violation * BAUMGARTE_FACTOR * mass);
            apply_position_impulse_pair(a, b, impulse, r_a, r_b);
        }
    }
}
