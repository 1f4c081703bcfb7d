use thiserror::Error;

/// Errors surfaced synchronously when constructing bodies, shapes,
/// constraints, or layer configuration.
///
/// Failure never leaves partial state behind: a body that fails to be
/// created is not inserted into any pool or tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhysicsError {
    /// A dynamic body ended up with zero mass and no explicit override.
    #[error("invalid mass: dynamic body has no derivable mass and no mass override")]
    InvalidMass,

    /// A shape parameter was out of range (negative radius, non-positive
    /// half extent, hull with fewer than four points, ...).
    #[error("invalid shape parameter: {0}")]
    InvalidShapeParameter(&'static str),

    /// An object layer index outside the configured range was referenced.
    #[error("unknown object layer {0}")]
    UnknownObjectLayer(u32),

    /// A broadphase layer index outside the configured range was referenced.
    #[error("unknown broadphase layer {0}")]
    UnknownBroadPhaseLayer(u32),

    /// A sub-shape path exceeded the 32-bit sub-shape id budget.
    #[error("sub-shape id bit budget exceeded")]
    SubShapeDepthExceeded,

    /// A constraint referenced a body that is not alive.
    #[error("constraint references a removed body")]
    BodyNotFound,

    /// All six degrees of freedom were locked on a dynamic body.
    #[error("a dynamic body must keep at least one degree of freedom")]
    AllDofsLocked,
}
