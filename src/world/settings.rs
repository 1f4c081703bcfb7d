use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config;
use crate::dynamics::sleep::SleepSettings;
use crate::error::PhysicsError;

/// Layer configuration: broadphase layers partition the DBVT forest, object
/// layers are the fine-grained collision categories, and a symmetric matrix
/// says which object layers may collide.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerConfig {
    broad_phase_layer_count: u32,
    /// Broadphase layer of each object layer.
    object_layers: Vec<u32>,
    /// Symmetric object-layer collision matrix, row-major.
    collision_matrix: Vec<bool>,
}

impl LayerConfig {
    pub fn broad_phase_layer_count(&self) -> u32 {
        self.broad_phase_layer_count
    }

    pub fn object_layer_count(&self) -> u32 {
        self.object_layers.len() as u32
    }

    pub fn add_broad_phase_layer(&mut self) -> u32 {
        self.broad_phase_layer_count += 1;
        self.broad_phase_layer_count - 1
    }

    pub fn add_object_layer(&mut self, broad_phase_layer: u32) -> Result<u32, PhysicsError> {
        if broad_phase_layer >= self.broad_phase_layer_count {
            return Err(PhysicsError::UnknownBroadPhaseLayer(broad_phase_layer));
        }
        let index = self.object_layers.len() as u32;
        self.object_layers.push(broad_phase_layer);

        // Grow the matrix to the new layer count, preserving entries.
        let old = index as usize;
        let new = old + 1;
        let mut matrix = vec![false; new * new];
        for row in 0..old {
            for col in 0..old {
                matrix[row * new + col] = self.collision_matrix[row * old + col];
            }
        }
        self.collision_matrix = matrix;
        Ok(index)
    }

    /// Allows collision between two object layers (symmetric).
    pub fn enable_collision(&mut self, a: u32, b: u32) -> Result<(), PhysicsError> {
        let count = self.object_layer_count();
        if a >= count {
            return Err(PhysicsError::UnknownObjectLayer(a));
        }
        if b >= count {
            return Err(PhysicsError::UnknownObjectLayer(b));
        }
        let count = count as usize;
        self.collision_matrix[a as usize * count + b as usize] = true;
        self.collision_matrix[b as usize * count + a as usize] = true;
        Ok(())
    }

    pub fn object_layers_collide(&self, a: u32, b: u32) -> bool {
        let count = self.object_layer_count() as usize;
        let (a, b) = (a as usize, b as usize);
        if a >= count || b >= count {
            return false;
        }
        self.collision_matrix[a * count + b]
    }

    pub fn broad_phase_layer_of(&self, object_layer: u32) -> Result<u32, PhysicsError> {
        self.object_layers
            .get(object_layer as usize)
            .copied()
            .ok_or(PhysicsError::UnknownObjectLayer(object_layer))
    }

    /// Two broadphase layers can meet iff some object-layer pair mapped to
    /// them is allowed to collide.
    pub fn broadphase_layers_collide(&self, i: u32, j: u32) -> bool {
        for (layer_a, &bp_a) in self.object_layers.iter().enumerate() {
            if bp_a != i {
                continue;
            }
            for (layer_b, &bp_b) in self.object_layers.iter().enumerate() {
                if bp_b != j {
                    continue;
                }
                if self.object_layers_collide(layer_a as u32, layer_b as u32) {
                    return true;
                }
            }
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.broad_phase_layer_count == 0
    }
}

/// Everything a world is configured with at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSettings {
    pub gravity: Vec3,
    pub gravity_enabled: bool,
    pub velocity_iterations: u32,
    pub position_iterations: u32,
    pub sleep: SleepSettings,
    pub layers: LayerConfig,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldSettings {
    pub fn new() -> Self {
        Self {
            gravity: Vec3::from_slice(&config::DEFAULT_GRAVITY),
            gravity_enabled: true,
            velocity_iterations: config::DEFAULT_VELOCITY_ITERATIONS,
            position_iterations: config::DEFAULT_POSITION_ITERATIONS,
            sleep: SleepSettings::default(),
            layers: LayerConfig::default(),
        }
    }

    pub fn add_broad_phase_layer(&mut self) -> u32 {
        self.layers.add_broad_phase_layer()
    }

    pub fn add_object_layer(&mut self, broad_phase_layer: u32) -> Result<u32, PhysicsError> {
        self.layers.add_object_layer(broad_phase_layer)
    }

    pub fn enable_collision(&mut self, a: u32, b: u32) -> Result<(), PhysicsError> {
        self.layers.enable_collision(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_matrix_is_symmetric_and_grows() {
        let mut settings = WorldSettings::new();
        let bp = settings.add_broad_phase_layer();
        let first = settings.add_object_layer(bp).unwrap();
        let second = settings.add_object_layer(bp).unwrap();
        let third = settings.add_object_layer(bp).unwrap();

        settings.enable_collision(first, second).unwrap();
        assert!(settings.layers.object_layers_collide(first, second));
        assert!(settings.layers.object_layers_collide(second, first));
        assert!(!settings.layers.object_layers_collide(first, third));
        assert!(!settings.layers.object_layers_collide(first, first));
    }

    #[test]
    fn unknown_layers_are_rejected() {
        let mut settings = WorldSettings::new();
        assert!(matches!(
            settings.add_object_layer(0),
            Err(PhysicsError::UnknownBroadPhaseLayer(0))
        ));
        let bp = settings.add_broad_phase_layer();
        let layer = settings.add_object_layer(bp).unwrap();
        assert!(settings.enable_collision(layer, 7).is_err());
    }

    #[test]
    fn broadphase_matrix_derives_from_object_matrix() {
        let mut settings = WorldSettings::new();
        let moving = settings.add_broad_phase_layer();
        let fixed = settings.add_broad_phase_layer();
        let a = settings.add_object_layer(moving).unwrap();
        let b = settings.add_object_layer(fixed).unwrap();
        settings.enable_collision(a, b).unwrap();

        assert!(settings.layers.broadphase_layers_collide(moving, fixed));
        assert!(!settings.layers.broadphase_layers_collide(moving, moving));
    }
}
