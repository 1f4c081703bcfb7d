use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config;
use crate::core::body_pool::{BodyId, BodyPool};

/// Thresholds controlling when resting bodies are put to sleep.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SleepSettings {
    /// Seconds a body must stay below both thresholds before sleeping.
    pub time_before_sleep: f32,
    pub linear_threshold: f32,
    pub angular_threshold: f32,
}

impl Default for SleepSettings {
    fn default() -> Self {
        Self {
            time_before_sleep: config::DEFAULT_TIME_BEFORE_SLEEP,
            linear_threshold: config::DEFAULT_SLEEP_LINEAR_THRESHOLD,
            angular_threshold: config::DEFAULT_SLEEP_ANGULAR_THRESHOLD,
        }
    }
}

/// Advances per-body sleep timers and returns the bodies that crossed the
/// sleep delay this step. The caller deactivates them (the active list
/// cannot be edited while it is being iterated).
pub fn update_sleep_timers(bodies: &mut BodyPool, settings: &SleepSettings, dt: f32) -> Vec<BodyId> {
    let mut fell_asleep = Vec::new();
    let active: Vec<BodyId> = bodies.active_bodies().to_vec();

    for id in active {
        let Some(body) = bodies.get_mut(id) else {
            continue;
        };
        if !body.is_dynamic() || !body.allow_sleeping {
            // Kinematic bodies rest only when explicitly stopped; they keep
            // their timers zeroed.
            body.motion.sleep_timer = 0.0;
            continue;
        }

        let resting = body.motion.linear_velocity.length_squared()
            < settings.linear_threshold * settings.linear_threshold
            && body.motion.angular_velocity.length_squared()
                < settings.angular_threshold * settings.angular_threshold;

        if resting {
            body.motion.sleep_timer += dt;
            if body.motion.sleep_timer >= settings.time_before_sleep {
                body.sleeping = true;
                body.motion.linear_velocity = Vec3::ZERO;
                body.motion.angular_velocity = Vec3::ZERO;
                fell_asleep.push(id);
            }
        } else {
            body.motion.sleep_timer = 0.0;
        }
    }

    fell_asleep
}
