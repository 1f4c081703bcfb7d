use std::time::{Duration, Instant};

/// Per-step timing and count snapshot, reset at the start of each step.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepProfiler {
    pub broad_phase_time: Duration,
    pub narrow_phase_time: Duration,
    pub solver_time: Duration,
    pub integrator_time: Duration,
    pub total_step_time: Duration,

    pub body_count: usize,
    pub active_body_count: usize,
    pub pair_count: usize,
    pub contact_count: usize,
    pub island_count: usize,
}

impl StepProfiler {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn report(&self) {
        let total_us = self.total_step_time.as_micros() as f32;
        if total_us < 1.0 {
            return;
        }
        log::debug!(
            "step {:.2} ms | bodies {} (active {}) pairs {} contacts {} islands {}",
            self.total_step_time.as_secs_f32() * 1000.0,
            self.body_count,
            self.active_body_count,
            self.pair_count,
            self.contact_count,
            self.island_count
        );
        log::debug!(
            "  broadphase {:.2} ms, narrowphase {:.2} ms, solver {:.2} ms, integrator {:.2} ms",
            self.broad_phase_time.as_secs_f32() * 1000.0,
            self.narrow_phase_time.as_secs_f32() * 1000.0,
            self.solver_time.as_secs_f32() * 1000.0,
            self.integrator_time.as_secs_f32() * 1000.0
        );
    }
}

/// Drop guard accumulating elapsed time into a profiler slot.
pub struct ScopedSection<'a> {
    start: Instant,
    output: &'a mut Duration,
}

impl<'a> ScopedSection<'a> {
    pub fn new(output: &'a mut Duration) -> Self {
        Self {
            start: Instant::now(),
            output,
        }
    }
}

impl Drop for ScopedSection<'_> {
    fn drop(&mut self) {
        *self.output += self.start.elapsed();
    }
}
