//! Core types describing physics entities, shapes, and shared data.

pub mod aabb;
pub mod body;
pub mod body_pool;
pub mod mesh;
pub mod shape;
pub mod sub_shape;
pub mod types;

pub use aabb::Aabb;
pub use body::{AllowedDofs, MotionProperties, MotionType, RigidBody, RigidBodyDesc};
pub use body_pool::{BodyId, BodyPool};
pub use mesh::{MeshBuilder, TriangleMesh};
pub use shape::{CompoundChild, Shape, ShapeLeaf};
pub use sub_shape::{SubShapeId, SubShapeIdBuilder};
pub use types::{MassProperties, Material, MixingMode, Transform, Velocity};
