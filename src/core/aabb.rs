use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::types::Transform;

/// Axis-aligned bounding box used for body bounds, broadphase nodes, and
/// mesh BVH nodes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    pub fn from_center_extent(center: Vec3, half_extent: Vec3) -> Self {
        Self {
            min: center - half_extent,
            max: center + half_extent,
        }
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        let mut bounds = Self::empty();
        for &p in points {
            bounds.extend(p);
        }
        bounds
    }

    pub fn extend(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn merged(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn expanded(&self, margin: f32) -> Aabb {
        Aabb {
            min: self.min - Vec3::splat(margin),
            max: self.max + Vec3::splat(margin),
        }
    }

    /// Extends the box along a displacement, covering the swept volume.
    pub fn swept(&self, displacement: Vec3) -> Aabb {
        Aabb {
            min: self.min + displacement.min(Vec3::ZERO),
            max: self.max + displacement.max(Vec3::ZERO),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn surface_area(&self) -> f32 {
        let d = (self.max - self.min).max(Vec3::ZERO);
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    pub fn contains(&self, other: &Aabb) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.min.z <= other.min.z
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
            && self.max.z >= other.max.z
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Slab test against a ray. Returns the entry parameter if the ray
    /// touches the box within `[0, max_t]`. A ray starting inside yields 0.
    pub fn ray_entry(&self, origin: Vec3, direction: Vec3, max_t: f32) -> Option<f32> {
        let mut t_min = 0.0_f32;
        let mut t_max = max_t;

        for i in 0..3 {
            let o = origin[i];
            let d = direction[i];
            if d.abs() < 1e-12 {
                if o < self.min[i] || o > self.max[i] {
                    return None;
                }
            } else {
                let inv = 1.0 / d;
                let mut t1 = (self.min[i] - o) * inv;
                let mut t2 = (self.max[i] - o) * inv;
                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                }
                t_min = t_min.max(t1);
                t_max = t_max.min(t2);
                if t_min > t_max {
                    return None;
                }
            }
        }

        Some(t_min)
    }

    /// Bounds of this box after rotating and translating it. Conservative:
    /// the result contains the rotated box exactly.
    pub fn transformed(&self, transform: &Transform) -> Aabb {
        let center = transform.point_to_world(self.center());
        let extent = self.extent();
        let abs_rot = abs_rotation_columns(transform.rotation);
        let new_extent = abs_rot[0] * extent.x + abs_rot[1] * extent.y + abs_rot[2] * extent.z;
        Aabb::from_center_extent(center, new_extent)
    }

    pub fn scaled(&self, scale: Vec3) -> Aabb {
        let a = self.min * scale;
        let b = self.max * scale;
        Aabb {
            min: a.min(b),
            max: a.max(b),
        }
    }
}

fn abs_rotation_columns(rotation: Quat) -> [Vec3; 3] {
    let m = glam::Mat3::from_quat(rotation);
    [m.x_axis.abs(), m.y_axis.abs(), m.z_axis.abs()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ray_entry_hits_and_misses() {
        let bounds = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let hit = bounds.ray_entry(Vec3::new(-5.0, 0.0, 0.0), Vec3::X, 100.0);
        assert!(hit.is_some());
        assert!((hit.unwrap() - 4.0).abs() < 1e-5);

        let miss = bounds.ray_entry(Vec3::new(-5.0, 3.0, 0.0), Vec3::X, 100.0);
        assert!(miss.is_none());

        let inside = bounds.ray_entry(Vec3::ZERO, Vec3::X, 100.0);
        assert_eq!(inside, Some(0.0));
    }

    #[test]
    fn transformed_contains_rotated_corners() {
        let bounds = Aabb::new(Vec3::new(-1.0, -2.0, -0.5), Vec3::new(1.0, 2.0, 0.5));
        let t = Transform::new(Vec3::new(3.0, 0.0, 0.0), Quat::from_rotation_z(0.9));
        let moved = bounds.transformed(&t);
        for corner in [
            Vec3::new(-1.0, -2.0, -0.5),
            Vec3::new(1.0, 2.0, 0.5),
            Vec3::new(1.0, -2.0, 0.5),
            Vec3::new(-1.0, 2.0, -0.5),
        ] {
            assert!(moved.contains_point(t.point_to_world(corner)));
        }
    }

    #[test]
    fn swept_covers_both_ends() {
        let bounds = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let swept = bounds.swept(Vec3::new(2.0, -1.0, 0.0));
        assert!(swept.contains(&bounds));
        assert!(swept.contains_point(Vec3::new(3.0, -1.0, 0.5)));
    }
}
