//! Joint constraints. Every joint follows the same contract: `prepare`
//! computes Jacobian arms and effective masses from current body state,
//! `warm_start` re-applies the previous step's accumulated impulses,
//! `solve_velocity` runs inside the solver's velocity iterations, and
//! `solve_position` removes residual position error afterwards.

pub mod cone;
pub mod distance;
pub mod fixed;
pub mod hinge;
pub mod point;
pub mod six_dof;
pub mod slider;
pub mod swing_twist;

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::core::body::RigidBody;
use crate::core::body_pool::BodyId;
use crate::utils::allocator::SlotId;
use crate::utils::math::skew;

pub use cone::ConeJoint;
pub use distance::DistanceJoint;
pub use fixed::FixedJoint;
pub use hinge::HingeJoint;
pub use point::PointJoint;
pub use six_dof::{SixDofAxis, SixDofJoint};
pub use slider::SliderJoint;
pub use swing_twist::SwingTwistJoint;

/// Stable handle to a constraint in the world's constraint pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintId(pub(crate) SlotId);

impl ConstraintId {
    pub const INVALID: ConstraintId = ConstraintId(SlotId::INVALID);

    pub fn index(self) -> u32 {
        self.0.index()
    }
}

/// Whether constraint frames are given in body-local or world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintSpace {
    Local,
    World,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpringMode {
    /// Frequency (Hz) and damping ratio, converted per step.
    FrequencyAndDamping,
    /// Direct stiffness and damping coefficients.
    StiffnessAndDamping,
}

/// Soft-constraint parameters shared by limit springs and position motors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpringSettings {
    pub mode: SpringMode,
    /// Frequency in Hz or stiffness, depending on `mode`.
    pub value: f32,
    /// Damping ratio or damping coefficient, depending on `mode`.
    pub damping: f32,
}

impl SpringSettings {
    pub fn frequency(frequency: f32, damping_ratio: f32) -> Self {
        Self {
            mode: SpringMode::FrequencyAndDamping,
            value: frequency,
            damping: damping_ratio,
        }
    }

    pub fn stiffness(stiffness: f32, damping: f32) -> Self {
        Self {
            mode: SpringMode::StiffnessAndDamping,
            value: stiffness,
            damping,
        }
    }

    /// `(gamma, bias_coefficient)` for a soft 1-DOF constraint with the
    /// given effective mass: gamma softens the effective mass, and
    /// `bias_coefficient * C` is the feedback velocity.
    pub(crate) fn soft_coefficients(&self, dt: f32, effective_mass: f32) -> (f32, f32) {
        let (k, c) = match self.mode {
            SpringMode::FrequencyAndDamping => {
                let omega = 2.0 * std::f32::consts::PI * self.value;
                let k = effective_mass * omega * omega;
                let c = 2.0 * effective_mass * self.damping * omega;
                (k, c)
            }
            SpringMode::StiffnessAndDamping => (self.value, self.damping),
        };
        let denom = dt * (c + dt * k);
        if denom <= f32::EPSILON {
            return (0.0, 0.0);
        }
        let gamma = 1.0 / denom;
        let bias = dt * k * gamma;
        (gamma, bias)
    }
}

impl Default for SpringSettings {
    fn default() -> Self {
        Self::frequency(20.0, 1.0)
    }
}

/// Motor sub-state machine; transitions happen between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MotorState {
    #[default]
    Off,
    /// Drive towards a target linear/angular rate.
    Velocity,
    /// Drive towards a target position/angle with the limit spring.
    Position,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MotorSettings {
    /// Maximum force (linear) or torque (angular) the motor may apply.
    pub max_force: f32,
    /// Spring used in `Position` mode.
    pub spring: SpringSettings,
}

impl Default for MotorSettings {
    fn default() -> Self {
        Self {
            max_force: f32::MAX,
            spring: SpringSettings::frequency(2.0, 1.0),
        }
    }
}

/// A constraint record: the joined bodies, per-constraint solver iteration
/// overrides (0 keeps the world default), and the joint-specific state.
#[derive(Clone)]
pub struct Constraint {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub enabled: bool,
    pub velocity_iterations: u32,
    pub position_iterations: u32,
    pub island_index: u32,
    pub kind: ConstraintKind,
}

#[derive(Clone)]
pub enum ConstraintKind {
    Point(PointJoint),
    Distance(DistanceJoint),
    Hinge(HingeJoint),
    Slider(SliderJoint),
    Cone(ConeJoint),
    SwingTwist(SwingTwistJoint),
    SixDof(SixDofJoint),
    Fixed(FixedJoint),
}

impl Constraint {
    pub fn new(body_a: BodyId, body_b: BodyId, kind: ConstraintKind) -> Self {
        Self {
            body_a,
            body_b,
            enabled: true,
            velocity_iterations: 0,
            position_iterations: 0,
            island_index: crate::core::body::NO_ISLAND,
            kind,
        }
    }

    pub fn bodies(&self) -> (BodyId, BodyId) {
        (self.body_a, self.body_b)
    }

    pub(crate) fn prepare(&mut self, a: &RigidBody, b: &RigidBody, dt: f32) {
        match &mut self.kind {
            ConstraintKind::Point(j) => j.prepare(a, b, dt),
            ConstraintKind::Distance(j) => j.prepare(a, b, dt),
            ConstraintKind::Hinge(j) => j.prepare(a, b, dt),
            ConstraintKind::Slider(j) => j.prepare(a, b, dt),
            ConstraintKind::Cone(j) => j.prepare(a, b, dt),
            ConstraintKind::SwingTwist(j) => j.prepare(a, b, dt),
            ConstraintKind::SixDof(j) => j.prepare(a, b, dt),
            ConstraintKind::Fixed(j) => j.prepare(a, b, dt),
        }
    }

    pub(crate) fn warm_start(&mut self, a: &mut RigidBody, b: &mut RigidBody) {
        match &mut self.kind {
            ConstraintKind::Point(j) => j.warm_start(a, b),
            ConstraintKind::Distance(j) => j.warm_start(a, b),
            ConstraintKind::Hinge(j) => j.warm_start(a, b),
            ConstraintKind::Slider(j) => j.warm_start(a, b),
            ConstraintKind::Cone(j) => j.warm_start(a, b),
            ConstraintKind::SwingTwist(j) => j.warm_start(a, b),
            ConstraintKind::SixDof(j) => j.warm_start(a, b),
            ConstraintKind::Fixed(j) => j.warm_start(a, b),
        }
    }

    pub(crate) fn solve_velocity(&mut self, a: &mut RigidBody, b: &mut RigidBody, dt: f32) {
        match &mut self.kind {
            ConstraintKind::Point(j) => j.solve_velocity(a, b, dt),
            ConstraintKind::Distance(j) => j.solve_velocity(a, b, dt),
            ConstraintKind::Hinge(j) => j.solve_velocity(a, b, dt),
            ConstraintKind::Slider(j) => j.solve_velocity(a, b, dt),
            ConstraintKind::Cone(j) => j.solve_velocity(a, b, dt),
            ConstraintKind::SwingTwist(j) => j.solve_velocity(a, b, dt),
            ConstraintKind::SixDof(j) => j.solve_velocity(a, b, dt),
            ConstraintKind::Fixed(j) => j.solve_velocity(a, b, dt),
        }
    }

    pub(crate) fn solve_position(&mut self, a: &mut RigidBody, b: &mut RigidBody, dt: f32) {
        match &mut self.kind {
            ConstraintKind::Point(j) => j.solve_position(a, b, dt),
            ConstraintKind::Distance(j) => j.solve_position(a, b, dt),
            ConstraintKind::Hinge(j) => j.solve_position(a, b, dt),
            ConstraintKind::Slider(j) => j.solve_position(a, b, dt),
            ConstraintKind::Cone(j) => j.solve_position(a, b, dt),
            ConstraintKind::SwingTwist(j) => j.solve_position(a, b, dt),
            ConstraintKind::SixDof(j) => j.solve_position(a, b, dt),
            ConstraintKind::Fixed(j) => j.solve_position(a, b, dt),
        }
    }
}

// --- shared Jacobian machinery -------------------------------------------

/// World-space arm from a body's center of mass to a body-local anchor.
pub(crate) fn world_arm(body: &RigidBody, local_anchor: Vec3) -> Vec3 {
    body.rotation * local_anchor
}

/// Converts a world-space point to an anchor relative to the body COM in
/// the body frame.
pub(crate) fn local_anchor_of(body: &RigidBody, world_point: Vec3) -> Vec3 {
    body.rotation.conjugate() * (world_point - body.center_of_mass_position())
}

pub(crate) fn relative_velocity(
    a: &RigidBody,
    b: &RigidBody,
    r_a: Vec3,
    r_b: Vec3,
) -> Vec3 {
    (b.motion.linear_velocity + b.motion.angular_velocity.cross(r_b))
        - (a.motion.linear_velocity + a.motion.angular_velocity.cross(r_a))
}

/// Effective mass of a 1-DOF linear constraint along `axis`.
pub(crate) fn effective_mass_linear(
    a: &RigidBody,
    b: &RigidBody,
    r_a: Vec3,
    r_b: Vec3,
    axis: Vec3,
) -> f32 {
    let ia = a.effective_inv_inertia();
    let ib = b.effective_inv_inertia();
    let term_a = axis.dot((ia * r_a.cross(axis)).cross(r_a));
    let term_b = axis.dot((ib * r_b.cross(axis)).cross(r_b));
    let k = a.effective_inv_mass() + b.effective_inv_mass() + term_a + term_b;
    if k > f32::EPSILON {
        1.0 / k
    } else {
        0.0
    }
}

/// Effective mass of a 1-DOF angular constraint around `axis`.
pub(crate) fn effective_mass_angular(a: &RigidBody, b: &RigidBody, axis: Vec3) -> f32 {
    let k = axis.dot(a.effective_inv_inertia() * axis) + axis.dot(b.effective_inv_inertia() * axis);
    if k > f32::EPSILON {
        1.0 / k
    } else {
        0.0
    }
}

/// Inverse of the 3x3 point-to-point constraint mass matrix.
pub(crate) fn point_k_inverse(a: &RigidBody, b: &RigidBody, r_a: Vec3, r_b: Vec3) -> Mat3 {
    let ra_skew = skew(r_a);
    let rb_skew = skew(r_b);
    let k = Mat3::from_diagonal(Vec3::splat(a.effective_inv_mass() + b.effective_inv_mass()))
        - ra_skew * a.effective_inv_inertia() * ra_skew
        - rb_skew * b.effective_inv_inertia() * rb_skew;
    if k.determinant().abs() > f32::EPSILON {
        k.inverse()
    } else {
        Mat3::ZERO
    }
}

pub(crate) fn apply_impulse_pair(
    a: &mut RigidBody,
    b: &mut RigidBody,
    impulse: Vec3,
    r_a: Vec3,
    r_b: Vec3,
) {
    a.apply_solver_impulse(-impulse, r_a);
    b.apply_solver_impulse(impulse, r_b);
}

pub(crate) fn apply_angular_impulse_pair(a: &mut RigidBody, b: &mut RigidBody, impulse: Vec3) {
    a.motion.angular_velocity += a.effective_inv_inertia() * -impulse;
    b.motion.angular_velocity += b.effective_inv_inertia() * impulse;
}

/// Applies a positional (pseudo) impulse: translates and rotates the poses
/// directly without touching velocities.
pub(crate) fn apply_position_impulse_pair(
    a: &mut RigidBody,
    b: &mut RigidBody,
    impulse: Vec3,
    r_a: Vec3,
    r_b: Vec3,
) {
    apply_position_impulse(a, -impulse, r_a);
    apply_position_impulse(b, impulse, r_b);
}

pub(crate) fn apply_position_impulse(body: &mut RigidBody, impulse: Vec3, r: Vec3) {
    let inv_mass = body.effective_inv_mass();
    if inv_mass == 0.0 {
        return;
    }
    body.position += impulse * inv_mass;
    let dw = body.effective_inv_inertia() * r.cross(impulse);
    rotate_by_scaled_axis(body, dw);
}

pub(crate) fn apply_rotation_correction_pair(
    a: &mut RigidBody,
    b: &mut RigidBody,
    angular_impulse: Vec3,
) {
    let dwa = a.effective_inv_inertia() * -angular_impulse;
    let dwb = b.effective_inv_inertia() * angular_impulse;
    rotate_by_scaled_axis(a, dwa);
    rotate_by_scaled_axis(b, dwb);
}

fn rotate_by_scaled_axis(body: &mut RigidBody, rotation_vector: Vec3) {
    let angle = rotation_vector.length();
    if angle < 1e-9 {
        return;
    }
    let delta = Quat::from_axis_angle(rotation_vector / angle, angle);
    body.rotation = (delta * body.rotation).normalize();
}

/// Rotation needed to take `q_b` back into the rest orientation relative to
/// `q_a`, expressed as a world-space rotation vector.
pub(crate) fn rotation_error(q_a: Quat, q_b: Quat, rest: Quat) -> Vec3 {
    // rest holds conj(q_a) * q_b at setup time.
    let error = q_b * rest.conjugate() * q_a.conjugate();
    let (axis, mut angle) = error.normalize().to_axis_angle();
    if angle > std::f32::consts::PI {
        angle -= 2.0 * std::f32::consts::PI;
    }
    axis * angle
}

// --- reusable joint parts -------------------------------------------------

/// 3-DOF point-to-point lock used by point, hinge, cone, swing-twist, and
/// fixed joints.
#[derive(Debug, Clone)]
pub(crate) struct PointPart {
    pub local_a: Vec3,
    pub local_b: Vec3,
    r_a: Vec3,
    r_b: Vec3,
    k_inverse: Mat3,
    pub lambda: Vec3,
}

impl PointPart {
    pub fn new(a: &RigidBody, b: &RigidBody, world_pivot_a: Vec3, world_pivot_b: Vec3) -> Self {
        Self {
            local_a: local_anchor_of(a, world_pivot_a),
            local_b: local_anchor_of(b, world_pivot_b),
            r_a: Vec3::ZERO,
            r_b: Vec3::ZERO,
            k_inverse: Mat3::ZERO,
            lambda: Vec3::ZERO,
        }
    }

    pub fn prepare(&mut self, a: &RigidBody, b: &RigidBody) {
        self.r_a = world_arm(a, self.local_a);
        self.r_b = world_arm(b, self.local_b);
        self.k_inverse = point_k_inverse(a, b, self.r_a, self.r_b);
    }

    pub fn warm_start(&self, a: &mut RigidBody, b: &mut RigidBody) {
        if self.lambda != Vec3::ZERO {
            apply_impulse_pair(a, b, self.lambda, self.r_a, self.r_b);
        }
    }

    pub fn solve_velocity(&mut self, a: &mut RigidBody, b: &mut RigidBody) {
        let v_rel = relative_velocity(a, b, self.r_a, self.r_b);
        let impulse = self.k_inverse * -v_rel;
        self.lambda += impulse;
        apply_impulse_pair(a, b, impulse, self.r_a, self.r_b);
    }

    pub fn solve_position(&mut self, a: &mut RigidBody, b: &mut RigidBody, baumgarte: f32) {
        let world_a = a.center_of_mass_position() + world_arm(a, self.local_a);
        let world_b = b.center_of_mass_position() + world_arm(b, self.local_b);
        let error = world_b - world_a;
        if error.length_squared() < 1e-12 {
            return;
        }
        let r_a = world_arm(a, self.local_a);
        let r_b = world_arm(b, self.local_b);
        let k_inverse = point_k_inverse(a, b, r_a, r_b);
        let impulse = k_inverse * (-error * baumgarte);
        apply_position_impulse_pair(a, b, impulse, r_a, r_b);
    }
}

/// 3-DOF angular lock used by fixed and slider joints.
#[derive(Debug, Clone)]
pub(crate) struct AngularLockPart {
    /// conj(q_a) * q_b captured at construction.
    pub rest: Quat,
    k_inverse: Mat3,
    pub lambda: Vec3,
}

impl AngularLockPart {
    pub fn new(a: &RigidBody, b: &RigidBody) -> Self {
        Self {
            rest: (a.rotation.conjugate() * b.rotation).normalize(),
            k_inverse: Mat3::ZERO,
            lambda: Vec3::ZERO,
        }
    }

    pub fn prepare(&mut self, a: &RigidBody, b: &RigidBody) {
        let k = a.effective_inv_inertia() + b.effective_inv_inertia();
        self.k_inverse = if k.determinant().abs() > f32::EPSILON {
            k.inverse()
        } else {
            Mat3::ZERO
        };
    }

    pub fn warm_start(&self, a: &mut RigidBody, b: &mut RigidBody) {
        if self.lambda != Vec3::ZERO {
            apply_angular_impulse_pair(a, b, self.lambda);
        }
    }

    pub fn solve_velocity(&mut self, a: &mut RigidBody, b: &mut RigidBody) {
        let w_rel = b.motion.angular_velocity - a.motion.angular_velocity;
        let impulse = self.k_inverse * -w_rel;
        self.lambda += impulse;
        apply_angular_impulse_pair(a, b, impulse);
    }

    pub fn solve_position(&mut self, a: &mut RigidBody, b: &mut RigidBody, baumgarte: f32) {
        let error = rotation_error(a.rotation, b.rotation, self.rest);
        if error.length_squared() < 1e-12 {
            return;
        }
        let k = a.effective_inv_inertia() + b.effective_inv_inertia();
        if k.determinant().abs() <= f32::EPSILON {
            return;
        }
        let impulse = k.inverse() * (-error * baumgarte);
        apply_rotation_correction_pair(a, b, impulse);
    }
}
