use glam::Vec3;

use crate::config::BAUMGARTE_FACTOR;
use crate::core::body::RigidBody;

use super::{AngularLockPart, ConstraintSpace, PointPart};

/// Welds two bodies together: all six degrees of freedom constrained.
#[derive(Clone)]
pub struct FixedJoint {
    point: PointPart,
    angular: AngularLockPart,
}

impl FixedJoint {
    /// Welds at a shared anchor; `World` space takes the anchor as-is,
    /// `Local` interprets it in body A's frame.
    pub fn new(a: &RigidBody, b: &RigidBody, space: ConstraintSpace, anchor: Vec3) -> Self {
        let world = match space {
            ConstraintSpace::World => anchor,
            ConstraintSpace::Local => a.transform().point_to_world(anchor),
        };
        Self {
            point: PointPart::new(a, b, world, world),
            angular: AngularLockPart::new(a, b),
        }
    }

    pub(crate) fn prepare(&mut self, a: &RigidBody, b: &RigidBody, _dt: f32) {
        self.point.prepare(a, b);
        self.angular.prepare(a, b);
    }

    pub(crate) fn warm_start(&mut self, a: &mut RigidBody, b: &mut RigidBody) {
        self.point.warm_start(a, b);
        self.angular.warm_start(a, b);
    }

    pub(crate) fn solve_velocity(&mut self, a: &mut RigidBody, b: &mut RigidBody, _dt: f32) {
        self.angular.solve_velocity(a, b);
        self.point.solve_velocity(a, b);
    }

    pub(crate) fn solve_position(&mut self, a: &mut RigidBody, b: &mut RigidBody, _dt: f32) {
        self.angular.solve_position(a, b, BAUMGARTE_FACTOR);
        self.point.solve_position(a, b, BAUMGARTE_FACTOR);
    }
}
