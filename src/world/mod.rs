//! The physics world: owns every pool, drives the fixed per-step pipeline,
//! and exposes the body / constraint / query API.

pub mod listener;
pub mod settings;

use glam::{Quat, Vec3};

use crate::collision::broadphase::{BodyPair, BroadPhase};
use crate::collision::contact::{refresh_contact_points, Contact, ContactCache, ContactKey};
use crate::collision::narrowphase::{collide_shapes, CollideSettings, Manifold};
use crate::collision::queries::{
    self, HitCollector, OverlapHit, PointHit, QueryFilter, RayCastSettings, RayHit,
    ShapeCastHit, ShapeCastSettings,
};
use crate::core::body::{
    MotionProperties, MotionType, RigidBody, RigidBodyDesc, INACTIVE, NO_ISLAND,
};
use crate::core::body_pool::{BodyId, BodyPool};
use crate::core::shape::Shape;
use crate::core::sub_shape::SubShapeId;
use crate::core::types::Material;
use crate::core::Aabb;
use crate::dynamics::constraints::{
    ConeJoint, Constraint, ConstraintId, ConstraintKind, ConstraintSpace, DistanceJoint,
    FixedJoint, HingeJoint, MotorState, PointJoint, SixDofAxis, SixDofJoint, SliderJoint,
    SpringSettings, SwingTwistJoint,
};
use crate::dynamics::integrator::Integrator;
use crate::dynamics::island::IslandBuilder;
use crate::dynamics::sleep;
use crate::dynamics::solver::{self, SolverStepMetrics};
use crate::error::PhysicsError;
use crate::utils::allocator::Pool;
use crate::utils::profiling::{ScopedSection, StepProfiler};

pub use listener::{ContactView, NoopListener, PhysicsListener};
pub use settings::{LayerConfig, WorldSettings};

/// Central simulation container orchestrating all subsystems.
pub struct PhysicsWorld {
    pub settings: WorldSettings,
    bodies: BodyPool,
    broadphase: BroadPhase,
    contacts: ContactCache,
    constraints: Pool<Constraint>,
    islands: IslandBuilder,
    pair_buffer: Vec<BodyPair>,
    manifold_buffer: Vec<Manifold>,
    pending_contact_removals: Vec<(BodyId, BodyId, SubShapeId, SubShapeId)>,
    last_solver_metrics: SolverStepMetrics,
    solver_metrics_logging: bool,
    parallel_enabled: bool,
    frame_index: u64,
    pub profiler: StepProfiler,
}

impl PhysicsWorld {
    pub fn new(mut settings: WorldSettings) -> Self {
        if settings.layers.is_empty() {
            // Convenience fallback: one broadphase layer, one object layer,
            // self-colliding.
            log::debug!("no layers configured; installing a default layer");
            let bp = settings.add_broad_phase_layer();
            let layer = settings
                .add_object_layer(bp)
                .expect("freshly added broadphase layer");
            settings
                .enable_collision(layer, layer)
                .expect("freshly added object layer");
        }
        let broadphase = BroadPhase::new(settings.layers.broad_phase_layer_count());
        Self {
            settings,
            bodies: BodyPool::new(),
            broadphase,
            contacts: ContactCache::new(),
            constraints: Pool::new(),
            islands: IslandBuilder::new(),
            pair_buffer: Vec::new(),
            manifold_buffer: Vec::new(),
            pending_contact_removals: Vec::new(),
            last_solver_metrics: SolverStepMetrics::default(),
            solver_metrics_logging: false,
            parallel_enabled: cfg!(feature = "parallel"),
            frame_index: 0,
            profiler: StepProfiler::default(),
        }
    }

    // --- bodies -----------------------------------------------------------

    /// Creates a rigid body from a description. Fails without side effects
    /// when the description is invalid (unknown layer, dynamic body with no
    /// derivable mass and no override, all degrees of freedom locked).
    pub fn create_body(&mut self, desc: RigidBodyDesc) -> Result<BodyId, PhysicsError> {
        let bp_layer = self.settings.layers.broad_phase_layer_of(desc.object_layer)?;

        let mass_properties = match desc.mass_properties_override {
            Some(props) => props,
            None => {
                let derived = desc.shape.mass_properties(1.0);
                match desc.mass {
                    Some(mass) => derived.scaled_to_mass(mass),
                    None => derived,
                }
            }
        };
        if desc.motion_type == MotionType::Dynamic {
            if mass_properties.mass <= f32::EPSILON {
                return Err(PhysicsError::InvalidMass);
            }
            if desc.allowed_dofs.is_empty() {
                return Err(PhysicsError::AllDofsLocked);
            }
        }

        let id = self.bodies.insert(|id| {
            let motion = MotionProperties {
                linear_velocity: desc.linear_velocity,
                angular_velocity: desc.angular_velocity,
                gravity_factor: desc.gravity_factor,
                linear_damping: desc.linear_damping,
                angular_damping: desc.angular_damping,
                max_linear_velocity: desc.max_linear_velocity,
                max_angular_velocity: desc.max_angular_velocity,
                velocity_iterations: desc.velocity_iterations,
                position_iterations: desc.position_iterations,
                allowed_dofs: desc.allowed_dofs,
                ..MotionProperties::default()
            };
            let mut body = RigidBody {
                id,
                position: desc.position,
                rotation: desc.rotation.normalize(),
                shape: desc.shape.clone(),
                motion_type: desc.motion_type,
                object_layer: desc.object_layer,
                motion,
                mass_properties,
                material: Material::new(desc.friction, desc.restitution),
                world_aabb: Aabb::empty(),
                broadphase_proxy: crate::collision::aabb_tree::NULL_NODE,
                contact_list_head: ContactKey::EMPTY,
                contact_count: 0,
                constraints: Vec::new(),
                sleeping: false,
                active_index: INACTIVE,
                island_index: NO_ISLAND,
                sensor: desc.sensor,
                collide_kinematic_vs_non_dynamic: desc.collide_kinematic_vs_non_dynamic,
                allow_sleeping: desc.allow_sleeping,
                collision_group: desc.collision_group,
                collision_mask: desc.collision_mask,
            };
            body.set_mass_properties(mass_properties);
            body.update_world_aabb();
            body
        });

        let tight = self.bodies.get(id).expect("just inserted").world_aabb;
        let proxy = self.broadphase.add_body(id, &tight, bp_layer);
        if let Some(body) = self.bodies.get_mut(id) {
            body.broadphase_proxy = proxy;
        }
        if desc.motion_type != MotionType::Static {
            self.bodies.activate(id);
        }
        Ok(id)
    }

    /// Removes a body: destroys all contacts it participates in (queuing
    /// `on_contact_removed` callbacks for the next step), detaches its
    /// constraints, unlinks it from the broadphase, and frees the slot.
    pub fn remove_body(&mut self, id: BodyId) -> bool {
        if self.bodies.get(id).is_none() {
            return false;
        }

        for contact_index in self.contacts.collect_contacts_of(&self.bodies, id) {
            if let Some(contact) = self.contacts.remove(&mut self.bodies, contact_index) {
                self.pending_contact_removals.push((
                    contact.body_a,
                    contact.body_b,
                    contact.sub_shape_a,
                    contact.sub_shape_b,
                ));
            }
        }

        let attached: Vec<ConstraintId> = self
            .bodies
            .get(id)
            .map(|body| body.constraints.clone())
            .unwrap_or_default();
        for constraint in attached {
            self.remove_constraint(constraint);
        }

        self.bodies.deactivate(id);
        if let Some(body) = self.bodies.get(id) {
            let layer = self
                .settings
                .layers
                .broad_phase_layer_of(body.object_layer)
                .unwrap_or(0);
            self.broadphase.remove_body(body.broadphase_proxy, layer);
        }
        self.bodies.remove(id).is_some()
    }

    /// Sequence-validated lookup; stale ids resolve to `None`.
    pub fn body(&self, id: BodyId) -> Option<&RigidBody> {
        self.bodies.get(id)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        self.bodies.get_mut(id)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn active_body_count(&self) -> usize {
        self.bodies.active_bodies().len()
    }

    // --- forces and impulses (ignored on non-dynamic bodies) --------------

    /// Wakes the body if it is dynamic, so the following mutation takes
    /// effect immediately, and reports whether it may receive forces.
    fn wake_for_force(&mut self, id: BodyId) -> bool {
        let is_dynamic = self
            .bodies
            .get(id)
            .map(|body| body.is_dynamic())
            .unwrap_or(false);
        if is_dynamic {
            self.wake(id);
        }
        is_dynamic
    }

    pub fn add_force(&mut self, id: BodyId, force: Vec3) {
        if self.wake_for_force(id) {
            if let Some(body) = self.bodies.get_mut(id) {
                body.add_force(force);
            }
        }
    }

    pub fn add_torque(&mut self, id: BodyId, torque: Vec3) {
        if self.wake_for_force(id) {
            if let Some(body) = self.bodies.get_mut(id) {
                body.add_torque(torque);
            }
        }
    }

    pub fn add_force_at_position(&mut self, id: BodyId, force: Vec3, position: Vec3) {
        if self.wake_for_force(id) {
            if let Some(body) = self.bodies.get_mut(id) {
                body.add_force_at_position(force, position);
            }
        }
    }

    pub fn add_impulse(&mut self, id: BodyId, impulse: Vec3) {
        if self.wake_for_force(id) {
            if let Some(body) = self.bodies.get_mut(id) {
                body.add_impulse(impulse);
            }
        }
    }

    pub fn add_impulse_at_position(&mut self, id: BodyId, impulse: Vec3, position: Vec3) {
        if self.wake_for_force(id) {
            if let Some(body) = self.bodies.get_mut(id) {
                body.add_impulse_at_position(impulse, position);
            }
        }
    }

    pub fn add_angular_impulse(&mut self, id: BodyId, angular_impulse: Vec3) {
        if self.wake_for_force(id) {
            if let Some(body) = self.bodies.get_mut(id) {
                body.add_angular_impulse(angular_impulse);
            }
        }
    }

    // --- transforms and velocities ----------------------------------------

    pub fn set_transform(
        &mut self,
        id: BodyId,
        position: Vec3,
        rotation: Quat,
        activate: bool,
    ) {
        let Some(body) = self.bodies.get_mut(id) else {
            return;
        };
        body.position = position;
        body.rotation = rotation.normalize();
        body.update_world_aabb();
        let (proxy, tight, layer) = (
            body.broadphase_proxy,
            body.world_aabb,
            self.settings
                .layers
                .broad_phase_layer_of(body.object_layer)
                .unwrap_or(0),
        );
        self.broadphase.update_body(proxy, &tight, layer);
        if activate {
            self.wake(id);
        }
    }

    pub fn set_position(&mut self, id: BodyId, position: Vec3, activate: bool) {
        let rotation = match self.bodies.get(id) {
            Some(body) => body.rotation,
            None => return,
        };
        self.set_transform(id, position, rotation, activate);
    }

    pub fn set_linear_velocity(&mut self, id: BodyId, velocity: Vec3) {
        if let Some(body) = self.bodies.get_mut(id) {
            if !body.is_static() {
                body.motion.linear_velocity = velocity;
                self.wake(id);
            }
        }
    }

    pub fn set_angular_velocity(&mut self, id: BodyId, velocity: Vec3) {
        if let Some(body) = self.bodies.get_mut(id) {
            if !body.is_static() {
                body.motion.angular_velocity = velocity;
                self.wake(id);
            }
        }
    }

    /// Sets a kinematic body's velocities so that integrating over `dt`
    /// lands it exactly on the target pose.
    pub fn move_kinematic(&mut self, id: BodyId, target_position: Vec3, target_rotation: Quat, dt: f32) {
        let Some(body) = self.bodies.get_mut(id) else {
            return;
        };
        if !body.is_kinematic() {
            return;
        }
        let (linear, angular) =
            Integrator::velocities_for_kinematic_move(body, target_position, target_rotation, dt);
        body.motion.linear_velocity = linear;
        body.motion.angular_velocity = angular;
        self.wake(id);
    }

    // --- sleeping ----------------------------------------------------------

    pub fn wake(&mut self, id: BodyId) {
        self.bodies.activate(id);
    }

    pub fn sleep(&mut self, id: BodyId) {
        if let Some(body) = self.bodies.get_mut(id) {
            if !body.is_dynamic() && !body.is_kinematic() {
                return;
            }
            body.sleeping = true;
            body.motion.linear_velocity = Vec3::ZERO;
            body.motion.angular_velocity = Vec3::ZERO;
        }
        self.bodies.deactivate(id);
    }

    /// Wakes every non-static body whose fat AABB intersects `region`.
    pub fn wake_bodies_in_aabb(&mut self, region: &Aabb) {
        let mut to_wake = Vec::new();
        self.broadphase.query_aabb(region, u32::MAX, &mut |id| {
            to_wake.push(id);
            true
        });
        for id in to_wake {
            let is_static = self
                .bodies
                .get(id)
                .map(|body| body.is_static())
                .unwrap_or(true);
            if !is_static {
                self.wake(id);
            }
        }
    }

    // --- derived state ------------------------------------------------------

    /// Velocity of the body's material point at a world position.
    pub fn velocity_at_point(&self, id: BodyId, world_point: Vec3) -> Option<Vec3> {
        Some(self.bodies.get(id)?.velocity_at_point(world_point))
    }

    /// Velocity at a point given relative to the center of mass.
    pub fn velocity_at_point_com(&self, id: BodyId, com_relative: Vec3) -> Option<Vec3> {
        let body = self.bodies.get(id)?;
        Some(body.motion.linear_velocity + body.motion.angular_velocity.cross(com_relative))
    }

    /// World-space surface normal on a body at a world point, routed through
    /// the sub-shape id.
    pub fn surface_normal(
        &self,
        id: BodyId,
        sub_shape: SubShapeId,
        world_point: Vec3,
    ) -> Option<Vec3> {
        let body = self.bodies.get(id)?;
        let local = body.transform().point_to_local(world_point);
        Some((body.rotation * body.shape.surface_normal(sub_shape, local)).normalize_or_zero())
    }

    pub fn center_of_mass_position(&self, id: BodyId) -> Option<Vec3> {
        Some(self.bodies.get(id)?.center_of_mass_position())
    }

    // --- constraints --------------------------------------------------------

    pub fn create_point_constraint(
        &mut self,
        body_a: BodyId,
        body_b: BodyId,
        space: ConstraintSpace,
        pivot_a: Vec3,
        pivot_b: Vec3,
    ) -> Result<ConstraintId, PhysicsError> {
        let (a, b) = self.constraint_bodies(body_a, body_b)?;
        let joint = PointJoint::new(a, b, space, pivot_a, pivot_b);
        self.attach_constraint(body_a, body_b, ConstraintKind::Point(joint))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_distance_constraint(
        &mut self,
        body_a: BodyId,
        body_b: BodyId,
        space: ConstraintSpace,
        pivot_a: Vec3,
        pivot_b: Vec3,
        min: f32,
        max: f32,
        spring: Option<SpringSettings>,
    ) -> Result<ConstraintId, PhysicsError> {
        let (a, b) = self.constraint_bodies(body_a, body_b)?;
        let joint = DistanceJoint::new(a, b, space, pivot_a, pivot_b, min, max, spring);
        self.attach_constraint(body_a, body_b, ConstraintKind::Distance(joint))
    }

    pub fn create_hinge_constraint(
        &mut self,
        body_a: BodyId,
        body_b: BodyId,
        space: ConstraintSpace,
        pivot: Vec3,
        axis: Vec3,
    ) -> Result<ConstraintId, PhysicsError> {
        let (a, b) = self.constraint_bodies(body_a, body_b)?;
        let joint = HingeJoint::new(a, b, space, pivot, axis);
        self.attach_constraint(body_a, body_b, ConstraintKind::Hinge(joint))
    }

    pub fn create_slider_constraint(
        &mut self,
        body_a: BodyId,
        body_b: BodyId,
        space: ConstraintSpace,
        pivot: Vec3,
        axis: Vec3,
    ) -> Result<ConstraintId, PhysicsError> {
        let (a, b) = self.constraint_bodies(body_a, body_b)?;
        let joint = SliderJoint::new(a, b, space, pivot, axis);
        self.attach_constraint(body_a, body_b, ConstraintKind::Slider(joint))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_cone_constraint(
        &mut self,
        body_a: BodyId,
        body_b: BodyId,
        space: ConstraintSpace,
        pivot: Vec3,
        axis: Vec3,
        half_angle: f32,
    ) -> Result<ConstraintId, PhysicsError> {
        let (a, b) = self.constraint_bodies(body_a, body_b)?;
        let joint = ConeJoint::new(a, b, space, pivot, axis, half_angle);
        self.attach_constraint(body_a, body_b, ConstraintKind::Cone(joint))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_swing_twist_constraint(
        &mut self,
        body_a: BodyId,
        body_b: BodyId,
        space: ConstraintSpace,
        pivot: Vec3,
        twist_axis: Vec3,
        twist_min: f32,
        twist_max: f32,
        plane_half_angle: f32,
        normal_half_angle: f32,
    ) -> Result<ConstraintId, PhysicsError> {
        let (a, b) = self.constraint_bodies(body_a, body_b)?;
        let joint = SwingTwistJoint::new(
            a,
            b,
            space,
            pivot,
            twist_axis,
            twist_min,
            twist_max,
            plane_half_angle,
            normal_half_angle,
        );
        self.attach_constraint(body_a, body_b, ConstraintKind::SwingTwist(joint))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_six_dof_constraint(
        &mut self,
        body_a: BodyId,
        body_b: BodyId,
        space: ConstraintSpace,
        anchor: Vec3,
        frame_rotation: Quat,
        axes: [SixDofAxis; 6],
    ) -> Result<ConstraintId, PhysicsError> {
        let (a, b) = self.constraint_bodies(body_a, body_b)?;
        let joint = SixDofJoint::new(a, b, space, anchor, frame_rotation, axes);
        self.attach_constraint(body_a, body_b, ConstraintKind::SixDof(joint))
    }

    pub fn create_fixed_constraint(
        &mut self,
        body_a: BodyId,
        body_b: BodyId,
        space: ConstraintSpace,
        anchor: Vec3,
    ) -> Result<ConstraintId, PhysicsError> {
        let (a, b) = self.constraint_bodies(body_a, body_b)?;
        let joint = FixedJoint::new(a, b, space, anchor);
        self.attach_constraint(body_a, body_b, ConstraintKind::Fixed(joint))
    }

    pub fn remove_constraint(&mut self, id: ConstraintId) -> bool {
        let Some(constraint) = self.constraints.remove(id.0) else {
            return false;
        };
        for body_id in [constraint.body_a, constraint.body_b] {
            if let Some(body) = self.bodies.get_mut(body_id) {
                body.constraints.retain(|&c| c != id);
            }
        }
        true
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.get(id.0)
    }

    pub fn constraint_mut(&mut self, id: ConstraintId) -> Option<&mut Constraint> {
        self.constraints.get_mut(id.0)
    }

    /// True when some constraint joins the two bodies (O(degree of `a`)).
    pub fn bodies_share_constraint(&self, a: BodyId, b: BodyId) -> bool {
        let Some(body) = self.bodies.get(a) else {
            return false;
        };
        body.constraints.iter().any(|&id| {
            self.constraints
                .get(id.0)
                .map(|c| c.body_a == b || c.body_b == b)
                .unwrap_or(false)
        })
    }

    /// Switches a hinge or slider motor state; transitions apply from the
    /// next step.
    pub fn set_motor_state(&mut self, id: ConstraintId, state: MotorState) {
        let mut wake = None;
        if let Some(constraint) = self.constraints.get_mut(id.0) {
            match &mut constraint.kind {
                ConstraintKind::Hinge(j) => j.motor_state = state,
                ConstraintKind::Slider(j) => j.motor_state = state,
                _ => return,
            }
            wake = Some((constraint.body_a, constraint.body_b));
        }
        if let Some((a, b)) = wake {
            self.wake(a);
            self.wake(b);
        }
    }

    /// Target rate for a velocity motor (rad/s for hinges, m/s for sliders).
    pub fn set_target_velocity(&mut self, id: ConstraintId, velocity: f32) {
        let mut wake = None;
        if let Some(constraint) = self.constraints.get_mut(id.0) {
            match &mut constraint.kind {
                ConstraintKind::Hinge(j) => j.target_velocity = velocity,
                ConstraintKind::Slider(j) => j.target_velocity = velocity,
                _ => return,
            }
            wake = Some((constraint.body_a, constraint.body_b));
        }
        if let Some((a, b)) = wake {
            self.wake(a);
            self.wake(b);
        }
    }

    /// Target for a position motor (radians for hinges, meters for sliders).
    pub fn set_target_position(&mut self, id: ConstraintId, target: f32) {
        let mut wake = None;
        if let Some(constraint) = self.constraints.get_mut(id.0) {
            match &mut constraint.kind {
                ConstraintKind::Hinge(j) => j.target_angle = target,
                ConstraintKind::Slider(j) => j.target_position = target,
                _ => return,
            }
            wake = Some((constraint.body_a, constraint.body_b));
        }
        if let Some((a, b)) = wake {
            self.wake(a);
            self.wake(b);
        }
    }

    /// Current coordinate of a joint: hinge angle, slider translation,
    /// distance length, or cone angle.
    pub fn current_position(&self, id: ConstraintId) -> Option<f32> {
        let constraint = self.constraints.get(id.0)?;
        let a = self.bodies.get(constraint.body_a)?;
        let b = self.bodies.get(constraint.body_b)?;
        match &constraint.kind {
            ConstraintKind::Hinge(j) => Some(j.current_angle(a, b)),
            ConstraintKind::Slider(j) => Some(j.current_position(a, b)),
            ConstraintKind::Distance(j) => Some(j.current_length(a, b)),
            ConstraintKind::Cone(j) => Some(j.current_angle(a, b)),
            ConstraintKind::SwingTwist(j) => Some(j.current_twist(a, b)),
            _ => None,
        }
    }

    fn constraint_bodies(
        &self,
        a: BodyId,
        b: BodyId,
    ) -> Result<(&RigidBody, &RigidBody), PhysicsError> {
        let body_a = self.bodies.get(a).ok_or(PhysicsError::BodyNotFound)?;
        let body_b = self.bodies.get(b).ok_or(PhysicsError::BodyNotFound)?;
        Ok((body_a, body_b))
    }

    fn attach_constraint(
        &mut self,
        body_a: BodyId,
        body_b: BodyId,
        kind: ConstraintKind,
    ) -> Result<ConstraintId, PhysicsError> {
        let id = ConstraintId(self.constraints.insert(Constraint::new(body_a, body_b, kind)));
        for body_id in [body_a, body_b] {
            if let Some(body) = self.bodies.get_mut(body_id) {
                body.constraints.push(id);
            }
        }
        self.wake(body_a);
        self.wake(body_b);
        Ok(id)
    }

    // --- queries ------------------------------------------------------------

    pub fn cast_ray(
        &self,
        collector: &mut dyn HitCollector<RayHit>,
        settings: &RayCastSettings,
        origin: Vec3,
        direction: Vec3,
        length: f32,
        filter: &QueryFilter<'_>,
    ) {
        queries::cast_ray(
            &self.bodies,
            &self.broadphase,
            collector,
            settings,
            origin,
            direction,
            length,
            filter,
        );
    }

    #[allow(clippy::too_many_arguments)]
    pub fn cast_shape(
        &self,
        collector: &mut dyn HitCollector<ShapeCastHit>,
        settings: &ShapeCastSettings,
        shape: &Shape,
        position: Vec3,
        rotation: Quat,
        scale: Vec3,
        displacement: Vec3,
        filter: &QueryFilter<'_>,
    ) {
        queries::cast_shape(
            &self.bodies,
            &self.broadphase,
            collector,
            settings,
            shape,
            position,
            rotation,
            scale,
            displacement,
            filter,
        );
    }

    pub fn collide_point(
        &self,
        collector: &mut dyn HitCollector<PointHit>,
        point: Vec3,
        filter: &QueryFilter<'_>,
    ) {
        queries::collide_point(&self.bodies, &self.broadphase, collector, point, filter);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn collide_shape(
        &self,
        collector: &mut dyn HitCollector<OverlapHit>,
        settings: &CollideSettings,
        shape: &Shape,
        position: Vec3,
        rotation: Quat,
        scale: Vec3,
        filter: &QueryFilter<'_>,
    ) {
        queries::collide_shape(
            &self.bodies,
            &self.broadphase,
            collector,
            settings,
            shape,
            position,
            rotation,
            scale,
            filter,
        );
    }

    // --- stepping -----------------------------------------------------------

    pub fn set_parallel_enabled(&mut self, enabled: bool) {
        self.parallel_enabled = enabled;
    }

    pub fn parallel_enabled(&self) -> bool {
        self.parallel_enabled
    }

    pub fn last_solver_metrics(&self) -> &SolverStepMetrics {
        &self.last_solver_metrics
    }

    pub fn set_solver_metrics_logging(&mut self, enabled: bool) {
        self.solver_metrics_logging = enabled;
    }

    /// Advances the simulation by `dt` without listener callbacks.
    pub fn update(&mut self, dt: f32) {
        self.update_with_listener(&mut NoopListener, dt);
    }

    /// Advances the simulation by one step of `dt` seconds, firing listener
    /// callbacks from the calling thread.
    pub fn update_with_listener(&mut self, listener: &mut dyn PhysicsListener, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        self.frame_index = self.frame_index.wrapping_add(1);
        let mut profiler = StepProfiler::default();
        let step_timer = ScopedSection::new(&mut profiler.total_step_time);

        // Contacts destroyed between steps (body removal) report now, so
        // the added -> persisted -> removed ordering holds per pair.
        for (a, b, sub_a, sub_b) in std::mem::take(&mut self.pending_contact_removals) {
            listener.on_contact_removed(a, b, sub_a, sub_b);
        }

        // 1. Integrate forces into velocities.
        {
            let _section = ScopedSection::new(&mut profiler.integrator_time);
            let integrator =
                Integrator::new(self.settings.gravity, self.settings.gravity_enabled);
            integrator.integrate_forces(&mut self.bodies, dt);
        }

        // 2. Broadphase: incremental optimization and pair discovery.
        {
            let _section = ScopedSection::new(&mut profiler.broad_phase_time);
            self.broadphase.optimize();
            let mut pairs = std::mem::take(&mut self.pair_buffer);
            self.broadphase
                .find_pairs(&self.bodies, &self.settings.layers, &mut pairs);
            self.pair_buffer = pairs;
        }
        profiler.pair_count = self.pair_buffer.len();

        // A moving kinematic wakes overlapping sleepers before narrowphase
        // so their contacts form this step. Sleeping bodies touched only by
        // awake dynamics stay asleep and act as solver terminals.
        for slot in 0..self.pair_buffer.len() {
            let pair = self.pair_buffer[slot];
            for (id, other) in [(pair.a, pair.b), (pair.b, pair.a)] {
                let sleeping = self
                    .bodies
                    .get(id)
                    .map(|body| body.sleeping)
                    .unwrap_or(false);
                let partner_is_kinematic = self
                    .bodies
                    .get(other)
                    .map(|body| body.is_kinematic() && !body.sleeping)
                    .unwrap_or(false);
                if sleeping && partner_is_kinematic {
                    self.bodies.activate(id);
                }
            }
        }

        // 3. Narrowphase and contact cache update.
        {
            let _section = ScopedSection::new(&mut profiler.narrow_phase_time);
            self.run_narrowphase(listener, dt);
        }

        // 4. Sweep contacts that no longer exist.
        for index in self.contacts.collect_stale() {
            if let Some(contact) = self.contacts.remove(&mut self.bodies, index) {
                listener.on_contact_removed(
                    contact.body_a,
                    contact.body_b,
                    contact.sub_shape_a,
                    contact.sub_shape_b,
                );
            }
        }
        profiler.contact_count = self.contacts.len();

        // 5. Island decomposition.
        let islands = self.islands.build(
            &mut self.bodies,
            &mut self.contacts,
            &mut self.constraints,
            self.settings.velocity_iterations,
            self.settings.position_iterations,
        );
        profiler.island_count = islands.len();

        // 6-8. Velocity solve, position integration, position solve.
        {
            let _section = ScopedSection::new(&mut profiler.solver_time);
            self.last_solver_metrics = solver::solve(
                &mut self.bodies,
                &mut self.contacts,
                &mut self.constraints,
                &islands,
                dt,
                self.parallel_enabled,
            );
        }
        if self.solver_metrics_logging {
            let metrics = &self.last_solver_metrics;
            log::debug!(
                "solver: islands={} contacts={} constraints={} normal_sum={:.4} friction_sum={:.4}",
                metrics.islands_solved,
                metrics.contacts_solved,
                metrics.constraints_solved,
                metrics.normal_impulse_sum,
                metrics.friction_impulse_sum
            );
        }

        // Kinematic bodies are not island members; integrate them here.
        {
            let _section = ScopedSection::new(&mut profiler.integrator_time);
            let active: Vec<BodyId> = self.bodies.active_bodies().to_vec();
            for id in active {
                if let Some(body) = self.bodies.get_mut(id) {
                    if body.is_kinematic() {
                        Integrator::integrate_position(body, dt);
                    }
                }
            }
        }

        // Relocate moved bodies in the broadphase trees.
        {
            let _section = ScopedSection::new(&mut profiler.broad_phase_time);
            let active: Vec<BodyId> = self.bodies.active_bodies().to_vec();
            for id in active {
                let Some(body) = self.bodies.get(id) else {
                    continue;
                };
                let layer = self
                    .settings
                    .layers
                    .broad_phase_layer_of(body.object_layer)
                    .unwrap_or(0);
                self.broadphase
                    .update_body(body.broadphase_proxy, &body.world_aabb, layer);
            }
        }

        // 9. Sleep detection.
        for id in sleep::update_sleep_timers(&mut self.bodies, &self.settings.sleep, dt) {
            self.bodies.deactivate(id);
        }

        profiler.body_count = self.bodies.len();
        profiler.active_body_count = self.bodies.active_bodies().len();
        drop(step_timer);
        self.profiler = profiler;
    }

    fn run_narrowphase(&mut self, listener: &mut dyn PhysicsListener, _dt: f32) {
        self.contacts.mark_all_stale();

        let pairs = std::mem::take(&mut self.pair_buffer);
        for pair in &pairs {
            if !listener.on_body_pair_validate(pair.a, pair.b) {
                continue;
            }
            let (Some(a), Some(b)) = (self.bodies.get(pair.a), self.bodies.get(pair.b)) else {
                continue;
            };

            let transform_a = a.transform();
            let transform_b = b.transform();
            let shape_a = a.shape.clone();
            let shape_b = b.shape.clone();
            let sensor = a.sensor || b.sensor;
            let (friction, restitution) = Material::combine(&a.material, &b.material);
            let sliding = a.motion.linear_velocity - b.motion.linear_velocity;
            let collide_settings = CollideSettings {
                sliding_direction: (sliding.length_squared() > 1e-8).then_some(sliding),
            };

            let mut manifolds = std::mem::take(&mut self.manifold_buffer);
            manifolds.clear();
            collide_shapes(
                &shape_a,
                &transform_a,
                &shape_b,
                &transform_b,
                &collide_settings,
                &mut manifolds,
            );

            for manifold in &manifolds {
                if manifold.points.is_empty() {
                    continue;
                }
                let view = ContactView {
                    body_a: pair.a,
                    body_b: pair.b,
                    sub_shape_a: manifold.sub_shape_a,
                    sub_shape_b: manifold.sub_shape_b,
                    normal: manifold.normal,
                    points: &manifold.points,
                };

                let existing = self.contacts.find(
                    &self.bodies,
                    pair.a,
                    pair.b,
                    manifold.sub_shape_a,
                    manifold.sub_shape_b,
                );

                let mut contact_settings = existing
                    .and_then(|index| self.contacts.get(index))
                    .map(|contact| contact.settings)
                    .unwrap_or_default();
                if !listener.on_contact_validate(&view, &mut contact_settings) {
                    continue;
                }

                match existing {
                    Some(index) => {
                        if let Some(contact) = self.contacts.get_mut(index) {
                            refresh_contact_points(
                                contact,
                                manifold,
                                |p| transform_a.point_to_local(p),
                                |p| transform_b.point_to_local(p),
                            );
                            contact.friction = friction;
                            contact.restitution = restitution;
                            contact.settings = contact_settings;
                            contact.sensor = sensor;
                        }
                        listener.on_contact_persisted(&view);
                    }
                    None => {
                        let mut contact = Contact {
                            body_a: pair.a,
                            body_b: pair.b,
                            sub_shape_a: manifold.sub_shape_a,
                            sub_shape_b: manifold.sub_shape_b,
                            edges: [
                                crate::collision::contact::ContactEdge {
                                    body_index: 0,
                                    prev: ContactKey::EMPTY,
                                    next: ContactKey::EMPTY,
                                },
                                crate::collision::contact::ContactEdge {
                                    body_index: 0,
                                    prev: ContactKey::EMPTY,
                                    next: ContactKey::EMPTY,
                                },
                            ],
                            normal: manifold.normal,
                            points: Vec::new(),
                            friction,
                            restitution,
                            settings: contact_settings,
                            stale: false,
                            sensor,
                            island_index: NO_ISLAND,
                        };
                        refresh_contact_points(
                            &mut contact,
                            manifold,
                            |p| transform_a.point_to_local(p),
                            |p| transform_b.point_to_local(p),
                        );
                        self.contacts.insert(&mut self.bodies, contact);
                        // A new contact with a non-sleeping body wakes the
                        // sleeping partner.
                        for id in [pair.a, pair.b] {
                            let asleep = self
                                .bodies
                                .get(id)
                                .map(|body| body.sleeping)
                                .unwrap_or(false);
                            if asleep {
                                self.bodies.activate(id);
                            }
                        }
                        listener.on_contact_added(&view);
                    }
                }
            }
            self.manifold_buffer = manifolds;
        }
        self.pair_buffer = pairs;
    }
}

