//! Utility helpers: the generational pool allocator, math extensions, and
//! profiling.

pub mod allocator;
pub mod math;
pub mod profiling;

pub use allocator::{Pool, SlotId};
pub use profiling::{ScopedSection, StepProfiler};
