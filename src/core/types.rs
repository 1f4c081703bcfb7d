use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Position and orientation of a body or shape frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Transform {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Builds a homogeneous matrix representation of the transform.
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }

    /// Applies another transform on top of this one, returning the composition.
    pub fn combine(&self, other: &Transform) -> Transform {
        Transform {
            position: self.position + self.rotation * other.position,
            rotation: (self.rotation * other.rotation).normalize(),
        }
    }

    /// Maps a point expressed in this frame into the parent frame.
    pub fn point_to_world(&self, local: Vec3) -> Vec3 {
        self.position + self.rotation * local
    }

    /// Maps a parent-frame point into this frame.
    pub fn point_to_local(&self, world: Vec3) -> Vec3 {
        self.rotation.conjugate() * (world - self.position)
    }

    /// Maps a parent-frame direction into this frame (no translation).
    pub fn direction_to_local(&self, world: Vec3) -> Vec3 {
        self.rotation.conjugate() * world
    }

    pub fn inverse(&self) -> Transform {
        let inv_rotation = self.rotation.conjugate();
        Transform {
            position: inv_rotation * -self.position,
            rotation: inv_rotation,
        }
    }
}

/// Linear and angular velocity of a rigid body.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub linear: Vec3,
    pub angular: Vec3,
}

/// Mass and local-frame inertia data derived from a shape or supplied by the
/// caller as an override.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MassProperties {
    pub mass: f32,
    /// Principal moments of inertia around the axes of `inertia_rotation`.
    pub inertia_diagonal: Vec3,
    /// Rotation from the body frame into the principal inertia frame.
    pub inertia_rotation: Quat,
}

impl Default for MassProperties {
    fn default() -> Self {
        Self {
            mass: 1.0,
            inertia_diagonal: Vec3::ONE,
            inertia_rotation: Quat::IDENTITY,
        }
    }
}

impl MassProperties {
    pub const ZERO: MassProperties = MassProperties {
        mass: 0.0,
        inertia_diagonal: Vec3::ZERO,
        inertia_rotation: Quat::IDENTITY,
    };

    pub fn new(mass: f32, inertia_diagonal: Vec3) -> Self {
        Self {
            mass,
            inertia_diagonal,
            inertia_rotation: Quat::IDENTITY,
        }
    }

    /// Uniformly scales the mass (and therefore the inertia) of the shape.
    pub fn scaled_to_mass(&self, mass: f32) -> Self {
        if self.mass <= f32::EPSILON {
            return Self::new(mass, Vec3::splat(mass));
        }
        let factor = mass / self.mass;
        Self {
            mass,
            inertia_diagonal: self.inertia_diagonal * factor,
            inertia_rotation: self.inertia_rotation,
        }
    }
}

/// Surface coefficients that affect contact response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub friction: f32,
    pub restitution: f32,
    /// How this material mixes its coefficients with another material.
    pub mixing: MixingMode,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            friction: 0.5,
            restitution: 0.0,
            mixing: MixingMode::GeometricMean,
        }
    }
}

impl Material {
    pub fn new(friction: f32, restitution: f32) -> Self {
        Self {
            friction,
            restitution,
            ..Self::default()
        }
    }

    /// Combines two materials into the coefficients used for one contact.
    /// Friction mixes with the resolved mode; restitution always takes the
    /// larger coefficient so a bouncy body stays bouncy on dead ground.
    pub fn combine(a: &Material, b: &Material) -> (f32, f32) {
        let mode = a.mixing.resolve(b.mixing);
        let friction = mode.combine(a.friction, b.friction);
        let restitution = a.restitution.max(b.restitution);
        (friction, restitution)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MixingMode {
    Average,
    Min,
    Max,
    #[default]
    GeometricMean,
}

impl MixingMode {
    fn combine(self, a: f32, b: f32) -> f32 {
        match self {
            MixingMode::Average => 0.5 * (a + b),
            MixingMode::Min => a.min(b),
            MixingMode::Max => a.max(b),
            MixingMode::GeometricMean => (a.abs() * b.abs()).sqrt(),
        }
    }

    fn resolve(self, other: MixingMode) -> MixingMode {
        if matches!(self, MixingMode::GeometricMean) {
            other
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_round_trips_points() {
        let t = Transform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_y(0.7).normalize(),
        );
        let p = Vec3::new(-4.0, 0.5, 2.0);
        let there = t.point_to_world(p);
        let back = t.point_to_local(there);
        assert!((back - p).length() < 1e-5);
    }

    #[test]
    fn transform_inverse_composes_to_identity() {
        let t = Transform::new(Vec3::new(3.0, -1.0, 0.5), Quat::from_rotation_x(1.2));
        let id = t.combine(&t.inverse());
        assert!(id.position.length() < 1e-5);
        assert!(id.rotation.dot(Quat::IDENTITY).abs() > 1.0 - 1e-5);
    }

    #[test]
    fn mixing_modes_combine_expected_values() {
        use approx::assert_abs_diff_eq;
        assert_abs_diff_eq!(MixingMode::Average.combine(0.6, 0.2), 0.4, epsilon = 1e-5);
        assert_abs_diff_eq!(MixingMode::Min.combine(0.6, 0.2), 0.2, epsilon = 1e-5);
        assert_abs_diff_eq!(MixingMode::Max.combine(0.6, 0.2), 0.6, epsilon = 1e-5);
        let expected = (0.6_f32 * 0.2_f32).sqrt();
        assert_abs_diff_eq!(
            MixingMode::GeometricMean.combine(0.6, 0.2),
            expected,
            epsilon = 1e-5
        );
    }

    #[test]
    fn restitution_takes_the_larger_coefficient() {
        let bouncy = Material::new(0.5, 0.9);
        let dead = Material::new(0.5, 0.0);
        let (_, restitution) = Material::combine(&bouncy, &dead);
        approx::assert_abs_diff_eq!(restitution, 0.9, epsilon = 1e-6);
    }
}
