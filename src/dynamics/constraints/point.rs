use glam::Vec3;

use crate::config::BAUMGARTE_FACTOR;
use crate::core::body::RigidBody;

use super::{ConstraintSpace, PointPart};

/// Ball-and-socket joint: locks the three translational degrees of freedom
/// at a shared pivot, leaving rotation free.
#[derive(Clone)]
pub struct PointJoint {
    part: PointPart,
}

impl PointJoint {
    pub fn new(
        a: &RigidBody,
        b: &RigidBody,
        space: ConstraintSpace,
        pivot_a: Vec3,
        pivot_b: Vec3,
    ) -> Self {
        let (world_a, world_b) = match space {
            ConstraintSpace::World => (pivot_a, pivot_b),
            ConstraintSpace::Local => (
                a.transform().point_to_world(pivot_a),
                b.transform().point_to_world(pivot_b),
            ),
        };
        Self {
            part: PointPart::new(a, b, world_a, world_b),
        }
    }

    pub(crate) fn prepare(&mut self, a: &RigidBody, b: &RigidBody, _dt: f32) {
        self.part.prepare(a, b);
    }

    pub(crate) fn warm_start(&mut self, a: &mut RigidBody, b: &mut RigidBody) {
        self.part.warm_start(a, b);
    }

    pub(crate) fn solve_velocity(&mut self, a: &mut RigidBody, b: &mut RigidBody, _dt: f32) {
        self.part.solve_velocity(a, b);
    }

    pub(crate) fn solve_position(&mut self, a: &mut RigidBody, b: &mut RigidBody, _dt: f32) {
        self.part.solve_position(a, b, BAUMGARTE_FACTOR);
    }

    /// Current world-space separation of the two pivots.
    pub fn pivot_error(&self, a: &RigidBody, b: &RigidBody) -> f32 {
        let wa = a.center_of_mass_position() + a.rotation * self.part.local_a;
        let wb = b.center_of_mass_position() + b.rotation * self.part.local_b;
        (wb - wa).length()
    }
}
