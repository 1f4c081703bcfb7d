//! Collision detection: broadphase trees, convex kernels, narrowphase
//! dispatch, the persistent contact cache, and the public query API.

pub mod aabb_tree;
pub mod broadphase;
pub mod clipping;
pub mod contact;
pub mod gjk;
pub mod narrowphase;
pub mod queries;

pub use aabb_tree::{AabbTree, Visit};
pub use broadphase::{BodyPair, BroadPhase};
pub use contact::{Contact, ContactCache, ContactKey, ContactPoint, ContactSettings};
pub use narrowphase::{CollideSettings, Manifold, ManifoldPoint};
pub use queries::{
    AllCollector, AnyCollector, ClosestCollector, HitCollector, OverlapHit, PointHit, QueryFilter,
    QueryHit, RayCastSettings, RayHit, ShapeCastHit, ShapeCastSettings,
};
