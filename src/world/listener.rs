use glam::Vec3;

use crate::collision::contact::ContactSettings;
use crate::collision::narrowphase::ManifoldPoint;
use crate::core::body_pool::BodyId;
use crate::core::sub_shape::SubShapeId;

/// Read-only view of a contact handed to listener callbacks. The normal
/// points from body A towards body B; points are world space.
#[derive(Debug, Clone, Copy)]
pub struct ContactView<'a> {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub sub_shape_a: SubShapeId,
    pub sub_shape_b: SubShapeId,
    pub normal: Vec3,
    pub points: &'a [ManifoldPoint],
}

/// Step callbacks. All methods are optional; they are invoked from the
/// thread that called `update` and must not mutate the world (applying
/// impulses through the world API between steps is the supported pattern).
#[allow(unused_variables)]
pub trait PhysicsListener {
    /// Called once per body pair, before narrowphase. Returning false skips
    /// the pair entirely (used to disable collision between joined bodies).
    fn on_body_pair_validate(&mut self, body_a: BodyId, body_b: BodyId) -> bool {
        true
    }

    /// Called per manifold before it is stored. May write surface
    /// velocities into `settings`; returning false rejects the manifold.
    fn on_contact_validate(
        &mut self,
        contact: &ContactView<'_>,
        settings: &mut ContactSettings,
    ) -> bool {
        true
    }

    fn on_contact_added(&mut self, contact: &ContactView<'_>) {}

    fn on_contact_persisted(&mut self, contact: &ContactView<'_>) {}

    fn on_contact_removed(
        &mut self,
        body_a: BodyId,
        body_b: BodyId,
        sub_shape_a: SubShapeId,
        sub_shape_b: SubShapeId,
    ) {
    }
}

/// Listener that ignores every event.
pub struct NoopListener;

impl PhysicsListener for NoopListener {}
