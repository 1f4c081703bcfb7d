//! Global tuning constants for the Tremor engine.

/// Default gravity vector applied in the physics world (Y-up).
pub const DEFAULT_GRAVITY: [f32; 3] = [0.0, -9.81, 0.0];

/// Default fixed timestep assumed by the solver bias terms (in seconds).
pub const DEFAULT_TIME_STEP: f32 = 1.0 / 60.0;

/// Default number of velocity iterations performed by the contact solver.
pub const DEFAULT_VELOCITY_ITERATIONS: u32 = 10;

/// Default number of position-correction iterations performed per step.
pub const DEFAULT_POSITION_ITERATIONS: u32 = 5;

/// Margin added on all sides of a body's tight AABB before it is stored in
/// the broadphase tree. The body is only relocated in the tree once its tight
/// AABB escapes the fattened one.
pub const FAT_AABB_MARGIN: f32 = 0.1;

/// Number of tree leaves re-inserted per step by the incremental optimizer.
pub const BROADPHASE_OPTIMIZATION_LEAVES: u32 = 4;

/// Penetration depth tolerated before position correction kicks in.
pub const CONTACT_SLOP: f32 = 0.01;

/// Baumgarte stabilization factor shared by the velocity bias and the
/// position-correction pass.
pub const BAUMGARTE_FACTOR: f32 = 0.2;

/// Normal-direction approach speed below which restitution is suppressed.
pub const RESTITUTION_VELOCITY_THRESHOLD: f32 = 1.0;

/// Contact points whose local anchor moved less than this distance between
/// frames keep their accumulated impulses for warm starting.
pub const WARM_START_PROXIMITY: f32 = 0.05;

/// Time a body must stay below the sleep velocity thresholds before it is
/// put to sleep (in seconds).
pub const DEFAULT_TIME_BEFORE_SLEEP: f32 = 0.5;

/// Linear speed threshold below which a body is considered resting.
pub const DEFAULT_SLEEP_LINEAR_THRESHOLD: f32 = 0.05;

/// Angular speed threshold below which a body is considered resting.
pub const DEFAULT_SLEEP_ANGULAR_THRESHOLD: f32 = 0.05;

/// Default cap on linear speed (m/s).
pub const DEFAULT_MAX_LINEAR_VELOCITY: f32 = 500.0;

/// Default cap on angular speed (rad/s).
pub const DEFAULT_MAX_ANGULAR_VELOCITY: f32 = 47.12389;

/// Mesh edges whose adjoining face normals agree within this cosine are
/// interior seams; contact normals reported on them are re-projected onto
/// the neighbouring face normal.
pub const ACTIVE_EDGE_COS_THRESHOLD: f32 = 0.996_194_7; // cos(5 deg)

/// Convergence tolerance for shape casts (conservative advancement).
pub const SHAPE_CAST_TOLERANCE: f32 = 1.0e-4;

/// Iteration cap for shape casts.
pub const MAX_SHAPE_CAST_ITERATIONS: u32 = 32;

/// Total bit budget of a [`SubShapeId`](crate::core::sub_shape::SubShapeId).
/// Shape trees that need more index bits than this cannot be addressed.
pub const SUB_SHAPE_ID_BITS: u32 = 32;
