//! Tremor – a real-time 3D rigid-body physics engine.
//!
//! The crate is organized around a [`PhysicsWorld`] that owns every pool
//! and drives a fixed per-step pipeline: force integration, broadphase
//! pair discovery over per-layer dynamic AABB trees, narrowphase manifold
//! generation, contact-cache persistence with listener callbacks, island
//! decomposition, a warm-started sequential-impulse solve, and sleep
//! bookkeeping. Spatial queries (ray, shape cast, point, overlap) run
//! against the same broadphase through pluggable hit collectors.

pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod error;
pub mod utils;
pub mod world;

pub use glam::{Mat3, Mat4, Quat, Vec3};

pub use collision::{
    AllCollector, AnyCollector, ClosestCollector, CollideSettings, HitCollector, OverlapHit,
    PointHit, QueryFilter, RayCastSettings, RayHit, ShapeCastHit, ShapeCastSettings,
};
pub use core::{
    AllowedDofs, Aabb, BodyId, CompoundChild, MassProperties, Material, MeshBuilder, MotionType,
    RigidBody, RigidBodyDesc, Shape, SubShapeId, Transform, TriangleMesh, Velocity,
};
pub use dynamics::{
    ConstraintId, ConstraintSpace, MotorSettings, MotorState, SixDofAxis, SpringSettings,
};
pub use error::PhysicsError;
pub use utils::StepProfiler;
pub use world::{ContactView, NoopListener, PhysicsListener, PhysicsWorld, WorldSettings};
