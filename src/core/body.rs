use std::sync::Arc;

use bitflags::bitflags;
use glam::{Mat3, Quat, Vec3};

use crate::collision::contact::ContactKey;
use crate::config;
use crate::dynamics::constraints::ConstraintId;

use super::aabb::Aabb;
use super::body_pool::BodyId;
use super::shape::Shape;
use super::types::{MassProperties, Material, Transform, Velocity};

/// Dense-index sentinel: the body is not in the active list.
pub const INACTIVE: u32 = u32::MAX;

/// Island-index sentinel: the body is not in any island this step.
pub const NO_ISLAND: u32 = u32::MAX;

/// How a body participates in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionType {
    /// Immovable, infinite mass, never sleeps or appears in the active list.
    Static,
    /// Infinite mass, but driven by user-set velocities and affecting
    /// dynamic bodies it touches.
    Kinematic,
    /// Fully simulated.
    Dynamic,
}

bitflags! {
    /// Degrees of freedom a dynamic body is allowed to use. Locked axes have
    /// their velocity component zeroed after every velocity-producing phase.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AllowedDofs: u8 {
        const TRANSLATION_X = 1 << 0;
        const TRANSLATION_Y = 1 << 1;
        const TRANSLATION_Z = 1 << 2;
        const ROTATION_X = 1 << 3;
        const ROTATION_Y = 1 << 4;
        const ROTATION_Z = 1 << 5;

        const TRANSLATION = Self::TRANSLATION_X.bits()
            | Self::TRANSLATION_Y.bits()
            | Self::TRANSLATION_Z.bits();
        const ROTATION = Self::ROTATION_X.bits()
            | Self::ROTATION_Y.bits()
            | Self::ROTATION_Z.bits();
        const ALL = Self::TRANSLATION.bits() | Self::ROTATION.bits();
    }
}

impl Default for AllowedDofs {
    fn default() -> Self {
        AllowedDofs::ALL
    }
}

/// Velocity-level state carried by non-static bodies.
#[derive(Debug, Clone)]
pub struct MotionProperties {
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    /// Force accumulator, cleared after integration.
    pub force: Vec3,
    /// Torque accumulator, cleared after integration.
    pub torque: Vec3,
    pub inv_mass: f32,
    /// Inverse principal moments of inertia.
    pub inv_inertia_diagonal: Vec3,
    /// Rotation from the body frame into the principal inertia frame.
    pub inertia_rotation: Quat,
    pub gravity_factor: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub max_linear_velocity: f32,
    pub max_angular_velocity: f32,
    /// Per-body solver iteration overrides; 0 keeps the world default.
    pub velocity_iterations: u32,
    pub position_iterations: u32,
    pub allowed_dofs: AllowedDofs,
    /// Seconds spent continuously below the sleep thresholds.
    pub sleep_timer: f32,
}

impl Default for MotionProperties {
    fn default() -> Self {
        Self {
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            inv_mass: 1.0,
            inv_inertia_diagonal: Vec3::ONE,
            inertia_rotation: Quat::IDENTITY,
            gravity_factor: 1.0,
            linear_damping: 0.05,
            angular_damping: 0.05,
            max_linear_velocity: config::DEFAULT_MAX_LINEAR_VELOCITY,
            max_angular_velocity: config::DEFAULT_MAX_ANGULAR_VELOCITY,
            velocity_iterations: 0,
            position_iterations: 0,
            allowed_dofs: AllowedDofs::ALL,
            sleep_timer: 0.0,
        }
    }
}

/// A simulated rigid body. Owned by the world's body pool; user code holds
/// [`BodyId`]s and reaches state through the world accessors.
#[derive(Debug, Clone)]
pub struct RigidBody {
    pub id: BodyId,
    pub position: Vec3,
    pub rotation: Quat,
    pub shape: Arc<Shape>,
    pub motion_type: MotionType,
    pub object_layer: u32,
    pub motion: MotionProperties,
    pub mass_properties: MassProperties,
    pub material: Material,
    /// Tight world-space bounds, refreshed whenever the pose changes.
    pub world_aabb: Aabb,
    /// Leaf index inside the broadphase tree of this body's layer.
    pub broadphase_proxy: u32,
    /// Head of the intrusive contact list threading this body's contacts.
    pub contact_list_head: ContactKey,
    pub contact_count: u32,
    /// Constraints attached to this body, for `bodies_share_constraint`.
    pub constraints: Vec<ConstraintId>,
    pub sleeping: bool,
    /// Dense index into the world's active list, or [`INACTIVE`].
    pub active_index: u32,
    /// Valid only during the step that built it.
    pub island_index: u32,
    pub sensor: bool,
    pub collide_kinematic_vs_non_dynamic: bool,
    pub allow_sleeping: bool,
    pub collision_group: u32,
    pub collision_mask: u32,
}

impl RigidBody {
    pub fn is_static(&self) -> bool {
        self.motion_type == MotionType::Static
    }

    pub fn is_kinematic(&self) -> bool {
        self.motion_type == MotionType::Kinematic
    }

    pub fn is_dynamic(&self) -> bool {
        self.motion_type == MotionType::Dynamic
    }

    /// Awake and simulated this step.
    pub fn is_active(&self) -> bool {
        !self.is_static() && !self.sleeping
    }

    pub fn transform(&self) -> Transform {
        Transform::new(self.position, self.rotation)
    }

    /// World-space center of mass: pose plus the shape-local COM rotated
    /// into world.
    pub fn center_of_mass_position(&self) -> Vec3 {
        self.position + self.rotation * self.shape.center_of_mass()
    }

    /// World-space inverse inertia tensor.
    pub fn inv_inertia_world(&self) -> Mat3 {
        if self.motion.inv_mass == 0.0 {
            return Mat3::ZERO;
        }
        let rot = Mat3::from_quat((self.rotation * self.motion.inertia_rotation).normalize());
        rot * Mat3::from_diagonal(self.motion.inv_inertia_diagonal) * rot.transpose()
    }

    /// Velocity of the material point of this body at a world position.
    pub fn velocity_at_point(&self, world_point: Vec3) -> Vec3 {
        self.motion.linear_velocity
            + self
                .motion
                .angular_velocity
                .cross(world_point - self.center_of_mass_position())
    }

    pub fn add_force(&mut self, force: Vec3) {
        if !self.is_dynamic() {
            return;
        }
        self.motion.force += force;
    }

    pub fn add_torque(&mut self, torque: Vec3) {
        if !self.is_dynamic() {
            return;
        }
        self.motion.torque += torque;
    }

    pub fn add_force_at_position(&mut self, force: Vec3, world_position: Vec3) {
        if !self.is_dynamic() {
            return;
        }
        self.motion.force += force;
        self.motion.torque += (world_position - self.center_of_mass_position()).cross(force);
    }

    pub fn add_impulse(&mut self, impulse: Vec3) {
        if !self.is_dynamic() {
            return;
        }
        self.motion.linear_velocity += impulse * self.motion.inv_mass;
    }

    pub fn add_impulse_at_position(&mut self, impulse: Vec3, world_position: Vec3) {
        if !self.is_dynamic() {
            return;
        }
        self.motion.linear_velocity += impulse * self.motion.inv_mass;
        let torque = (world_position - self.center_of_mass_position()).cross(impulse);
        self.motion.angular_velocity += self.inv_inertia_world() * torque;
    }

    pub fn add_angular_impulse(&mut self, angular_impulse: Vec3) {
        if !self.is_dynamic() {
            return;
        }
        self.motion.angular_velocity += self.inv_inertia_world() * angular_impulse;
    }

    /// Inverse mass as the solver sees it: sleeping bodies are terminals
    /// and must not pick up velocity from contacts that press against them.
    pub(crate) fn effective_inv_mass(&self) -> f32 {
        if self.sleeping {
            0.0
        } else {
            self.motion.inv_mass
        }
    }

    pub(crate) fn effective_inv_inertia(&self) -> Mat3 {
        if self.sleeping {
            Mat3::ZERO
        } else {
            self.inv_inertia_world()
        }
    }

    /// Applies a solver impulse at a point given the world-space arm from
    /// the center of mass.
    pub(crate) fn apply_solver_impulse(&mut self, impulse: Vec3, arm: Vec3) {
        self.motion.linear_velocity += impulse * self.effective_inv_mass();
        self.motion.angular_velocity += self.effective_inv_inertia() * arm.cross(impulse);
    }

    /// Zeroes velocity components on locked axes.
    pub fn enforce_allowed_dofs(&mut self) {
        let dofs = self.motion.allowed_dofs;
        if dofs == AllowedDofs::ALL {
            return;
        }
        let v = &mut self.motion.linear_velocity;
        if !dofs.contains(AllowedDofs::TRANSLATION_X) {
            v.x = 0.0;
        }
        if !dofs.contains(AllowedDofs::TRANSLATION_Y) {
            v.y = 0.0;
        }
        if !dofs.contains(AllowedDofs::TRANSLATION_Z) {
            v.z = 0.0;
        }
        let w = &mut self.motion.angular_velocity;
        if !dofs.contains(AllowedDofs::ROTATION_X) {
            w.x = 0.0;
        }
        if !dofs.contains(AllowedDofs::ROTATION_Y) {
            w.y = 0.0;
        }
        if !dofs.contains(AllowedDofs::ROTATION_Z) {
            w.z = 0.0;
        }
    }

    /// Clamps the velocity magnitudes to the per-body maxima.
    pub fn clamp_velocities(&mut self) {
        let linear_len = self.motion.linear_velocity.length();
        if linear_len > self.motion.max_linear_velocity {
            self.motion.linear_velocity *= self.motion.max_linear_velocity / linear_len;
        }
        let angular_len = self.motion.angular_velocity.length();
        if angular_len > self.motion.max_angular_velocity {
            self.motion.angular_velocity *= self.motion.max_angular_velocity / angular_len;
        }
    }

    pub fn update_world_aabb(&mut self) {
        self.world_aabb = self.shape.local_aabb().transformed(&self.transform());
    }

    pub(crate) fn set_mass_properties(&mut self, props: MassProperties) {
        self.mass_properties = props;
        match self.motion_type {
            MotionType::Dynamic => {
                self.motion.inv_mass = if props.mass > f32::EPSILON {
                    1.0 / props.mass
                } else {
                    0.0
                };
                self.motion.inv_inertia_diagonal = Vec3::new(
                    safe_recip(props.inertia_diagonal.x),
                    safe_recip(props.inertia_diagonal.y),
                    safe_recip(props.inertia_diagonal.z),
                );
                self.motion.inertia_rotation = props.inertia_rotation;
            }
            MotionType::Static | MotionType::Kinematic => {
                self.motion.inv_mass = 0.0;
                self.motion.inv_inertia_diagonal = Vec3::ZERO;
                self.motion.inertia_rotation = Quat::IDENTITY;
            }
        }
    }

    pub fn velocity(&self) -> Velocity {
        Velocity {
            linear: self.motion.linear_velocity,
            angular: self.motion.angular_velocity,
        }
    }
}

fn safe_recip(value: f32) -> f32 {
    if value > f32::EPSILON {
        1.0 / value
    } else {
        0.0
    }
}

/// Description consumed by `PhysicsWorld::create_body`, mirroring the
/// builder style of the shape constructors.
#[derive(Clone)]
pub struct RigidBodyDesc {
    pub shape: Arc<Shape>,
    pub motion_type: MotionType,
    pub object_layer: u32,
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    /// Scales the shape-derived mass to this value when set.
    pub mass: Option<f32>,
    /// Replaces the shape-derived mass properties entirely when set.
    pub mass_properties_override: Option<MassProperties>,
    pub friction: f32,
    pub restitution: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub max_linear_velocity: f32,
    pub max_angular_velocity: f32,
    pub gravity_factor: f32,
    pub collision_group: u32,
    pub collision_mask: u32,
    pub sensor: bool,
    pub allowed_dofs: AllowedDofs,
    pub allow_sleeping: bool,
    pub collide_kinematic_vs_non_dynamic: bool,
    pub velocity_iterations: u32,
    pub position_iterations: u32,
}

impl RigidBodyDesc {
    pub fn new(shape: Arc<Shape>, motion_type: MotionType, object_layer: u32) -> Self {
        let defaults = MotionProperties::default();
        Self {
            shape,
            motion_type,
            object_layer,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            mass: None,
            mass_properties_override: None,
            friction: Material::default().friction,
            restitution: Material::default().restitution,
            linear_damping: defaults.linear_damping,
            angular_damping: defaults.angular_damping,
            max_linear_velocity: defaults.max_linear_velocity,
            max_angular_velocity: defaults.max_angular_velocity,
            gravity_factor: 1.0,
            collision_group: u32::MAX,
            collision_mask: u32::MAX,
            sensor: false,
            allowed_dofs: AllowedDofs::ALL,
            allow_sleeping: true,
            collide_kinematic_vs_non_dynamic: false,
            velocity_iterations: 0,
            position_iterations: 0,
        }
    }

    pub fn position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation.normalize();
        self
    }

    pub fn velocity(mut self, linear: Vec3, angular: Vec3) -> Self {
        self.linear_velocity = linear;
        self.angular_velocity = angular;
        self
    }

    pub fn mass(mut self, mass: f32) -> Self {
        self.mass = Some(mass);
        self
    }

    pub fn mass_properties_override(mut self, props: MassProperties) -> Self {
        self.mass_properties_override = Some(props);
        self
    }

    pub fn friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    pub fn gravity_factor(mut self, factor: f32) -> Self {
        self.gravity_factor = factor;
        self
    }

    pub fn sensor(mut self, sensor: bool) -> Self {
        self.sensor = sensor;
        self
    }

    pub fn allowed_dofs(mut self, dofs: AllowedDofs) -> Self {
        self.allowed_dofs = dofs;
        self
    }

    pub fn allow_sleeping(mut self, allow: bool) -> Self {
        self.allow_sleeping = allow;
        self
    }

    pub fn collision_filter(mut self, group: u32, mask: u32) -> Self {
        self.collision_group = group;
        self.collision_mask = mask;
        self
    }

    pub fn collide_kinematic_vs_non_dynamic(mut self, enabled: bool) -> Self {
        self.collide_kinematic_vs_non_dynamic = enabled;
        self
    }

    pub fn solver_iterations(mut self, velocity: u32, position: u32) -> Self {
        self.velocity_iterations = velocity;
        self.position_iterations = position;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_body() -> RigidBody {
        let shape = Arc::new(Shape::sphere(1.0).unwrap());
        let mut body = RigidBody {
            id: BodyId::INVALID,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            shape,
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
        body.update_world_aabb();
        body
    }

    #[test]
    fn dof_mask_zeroes_locked_axes() {
        let mut body = test_body();
        body.motion.allowed_dofs = AllowedDofs::TRANSLATION_Y | AllowedDofs::ROTATION;
        body.motion.linear_velocity = Vec3::new(1.0, 2.0, 3.0);
        body.motion.angular_velocity = Vec3::new(0.5, 0.5, 0.5);
        body.enforce_allowed_dofs();
        assert_eq!(body.motion.linear_velocity, Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(body.motion.angular_velocity, Vec3::new(0.5, 0.5, 0.5));
    }

    #[test]
    fn velocity_clamp_preserves_direction() {
        let mut body = test_body();
        body.motion.max_linear_velocity = 10.0;
        body.motion.linear_velocity = Vec3::new(30.0, 40.0, 0.0);
        body.clamp_velocities();
        assert!((body.motion.linear_velocity.length() - 10.0).abs() < 1e-4);
        assert!(body.motion.linear_velocity.x > 0.0);
    }

    #[test]
    fn impulses_are_ignored_on_non_dynamic_bodies() {
        let mut body = test_body();
        body.motion_type = MotionType::Static;
        body.add_impulse(Vec3::X);
        body.add_force(Vec3::X);
        assert_eq!(body.motion.linear_velocity, Vec3::ZERO);
        assert_eq!(body.motion.force, Vec3::ZERO);
    }

    #[test]
    fn impulse_at_offset_point_spins_the_body() {
        let mut body = test_body();
        body.add_impulse_at_position(Vec3::Y, Vec3::new(1.0, 0.0, 0.0));
        assert!(body.motion.linear_velocity.y > 0.0);
        assert!(body.motion.angular_velocity.z > 0.0);
    }
}
