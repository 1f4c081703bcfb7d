//! Simulation dynamics: force integration, joint constraints, island
//! decomposition, the impulse solver, and sleep bookkeeping.

pub mod constraints;
pub mod integrator;
pub mod island;
pub mod sleep;
pub mod solver;

pub use constraints::{
    ConeJoint, Constraint, ConstraintId, ConstraintKind, ConstraintSpace, DistanceJoint,
    FixedJoint, HingeJoint, MotorSettings, MotorState, PointJoint, SixDofAxis, SixDofJoint,
    SliderJoint, SpringMode, SpringSettings, SwingTwistJoint,
};
pub use integrator::Integrator;
pub use island::{Island, IslandBuilder};
pub use sleep::SleepSettings;
pub use solver::SolverStepMetrics;
