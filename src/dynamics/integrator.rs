use glam::{Quat, Vec3};

use crate::core::body::RigidBody;
use crate::core::body_pool::BodyPool;
use crate::utils::math::angular_velocity_to_quat;

/// Force integration: gravity, accumulated forces and torques, damping,
/// speed clamps, and the degree-of-freedom mask, applied to every active
/// body before the broadphase runs. Position integration happens inside
/// the solver, after the velocity iterations.
pub struct Integrator {
    pub gravity: Vec3,
    pub gravity_enabled: bool,
}

impl Integrator {
    pub fn new(gravity: Vec3, gravity_enabled: bool) -> Self {
        Self {
            gravity,
            gravity_enabled,
        }
    }

    /// Advances velocities of all active dynamic bodies by `dt`.
    pub fn integrate_forces(&self, bodies: &mut BodyPool, dt: f32) {
        let active: Vec<_> = bodies.active_bodies().to_vec();
        for id in active {
            if let Some(body) = bodies.get_mut(id) {
                self.integrate_body_forces(body, dt);
            }
        }
    }

    pub fn integrate_body_forces(&self, body: &mut RigidBody, dt: f32) {
        if !body.is_dynamic() || body.sleeping {
            return;
        }

        if self.gravity_enabled {
            body.motion.linear_velocity += self.gravity * (body.motion.gravity_factor * dt);
        }

        let inv_mass = body.motion.inv_mass;
        body.motion.linear_velocity += body.motion.force * (inv_mass * dt);
        body.motion.angular_velocity += body.inv_inertia_world() * body.motion.torque * dt;
        body.motion.force = Vec3::ZERO;
        body.motion.torque = Vec3::ZERO;

        // Damping as a per-step scalar decay, clamped at zero.
        body.motion.linear_velocity *= (1.0 - body.motion.linear_damping * dt).max(0.0);
        body.motion.angular_velocity *= (1.0 - body.motion.angular_damping * dt).max(0.0);

        body.clamp_velocities();
        body.enforce_allowed_dofs();
    }

    /// Advances a body's pose by its current velocities. Used by the solver
    /// for island members and by the world for kinematic bodies.
    pub fn integrate_position(body: &mut RigidBody, dt: f32) {
        if body.is_static() || body.sleeping {
            return;
        }

        body.position += body.motion.linear_velocity * dt;

        let delta: Quat = angular_velocity_to_quat(body.motion.angular_velocity, dt);
        if delta != Quat::IDENTITY {
            body.rotation = (delta * body.rotation).normalize();
        }

        body.update_world_aabb();
    }

    /// Derives the velocities that carry a kinematic body to a target pose
    /// over `dt`.
    pub fn velocities_for_kinematic_move(
        body: &RigidBody,
        target_position: Vec3,
        target_rotation: Quat,
        dt: f32,
    ) -> (Vec3, Vec3) {
        if dt <= 0.0 {
            return (Vec3::ZERO, Vec3::ZERO);
        }
        let linear = (target_position - body.position) / dt;

        let delta = (target_rotation * body.rotation.conjugate()).normalize();
        let (axis, mut angle) = delta.to_axis_angle();
        if angle > std::f32::consts::PI {
            angle -= 2.0 * std::f32::consts::PI;
        }
        let angular = if angle.abs() < 1e-9 {
            Vec3::ZERO
        } else {
            axis * (angle / dt)
        };
        (linear, angular)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::body::{MotionProperties, MotionType, INACTIVE, NO_ISLAND};
    use crate::core::shape::Shape;
    use crate::core::types::{MassProperties, Material};
    use crate::core::Aabb;
    use crate::collision::contact::ContactKey;
    use std::sync::Arc;

    fn dynamic_body() -> RigidBody {
        let mut body = RigidBody {
            id: crate::core::BodyId::INVALID,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            shape: Arc::new(Shape::sphere(1.0).unwrap()),
            motion_type: MotionType::Dynamic,
            object_layer: 0,
            motion: MotionProperties::default(),
            mass_properties: MassProperties::default(),
            material: Material::default(),
            world_aabb: Aabb::empty(),
            broadphase_proxy: u32::MAX,
            contact_list_head: ContactKey::EMPTY,
            contact_count: 0,
            constraints: Vec::new(),
            sleeping: false,
            active_index: INACTIVE,
            island_index: NO_ISLAND,
            sensor: false,
            collide_kinematic_vs_non_dynamic: false,
            allow_sleeping: true,
            collision_group: u32::MAX,
            collision_mask: u32::MAX,
        };
        body.motion.linear_damping = 0.0;
        body.motion.angular_damping = 0.0;
        body
    }

    #[test]
    fn gravity_scales_with_the_per_body_factor() {
        let integrator = Integrator::new(Vec3::new(0.0, -10.0, 0.0), true);
        let dt = 1.0 / 60.0;

        let mut body = dynamic_body();
        integrator.integrate_body_forces(&mut body, dt);
        assert!((body.motion.linear_velocity.y + 10.0 * dt).abs() < 1e-6);

        let mut weightless = dynamic_body();
        weightless.motion.gravity_factor = 0.0;
        integrator.integrate_body_forces(&mut weightless, dt);
        assert_eq!(weightless.motion.linear_velocity, Vec3::ZERO);
    }

    #[test]
    fn force_accumulators_are_consumed() {
        let integrator = Integrator::new(Vec3::ZERO, false);
        let mut body = dynamic_body();
        body.add_force(Vec3::new(60.0, 0.0, 0.0));
        integrator.integrate_body_forces(&mut body, 1.0 / 60.0);
        assert!((body.motion.linear_velocity.x - 1.0).abs() < 1e-5);
        assert_eq!(body.motion.force, Vec3::ZERO);
    }

    #[test]
    fn kinematic_move_reaches_the_target_in_one_step() {
        let dt = 1.0 / 60.0;
        let mut body = dynamic_body();
        body.motion_type = MotionType::Kinematic;
        let target = Vec3::new(1.0, 2.0, 3.0);
        let target_rot = Quat::from_rotation_y(0.5);

        let (linear, angular) =
            Integrator::velocities_for_kinematic_move(&body, target, target_rot, dt);
        body.motion.linear_velocity = linear;
        body.motion.angular_velocity = angular;
        Integrator::integrate_position(&mut body, dt);

        assert!((body.position - target).length() < 1e-4);
        assert!(body.rotation.dot(target_rot).abs() > 1.0 - 1e-4);
    }

    #[test]
    fn damping_decays_velocity() {
        let integrator = Integrator::new(Vec3::ZERO, false);
        let mut body = dynamic_body();
        body.motion.linear_damping = 0.5;
        body.motion.linear_velocity = Vec3::new(1.0, 0.0, 0.0);
        integrator.integrate_body_forces(&mut body, 0.1);
        assert!((body.motion.linear_velocity.x - 0.95).abs() < 1e-5);
    }
}
