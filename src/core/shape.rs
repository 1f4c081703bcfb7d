use std::sync::Arc;

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;
use crate::utils::math;

use super::aabb::Aabb;
use super::mesh::TriangleMesh;
use super::sub_shape::{SubShapeId, SubShapeIdBuilder};
use super::types::{MassProperties, Transform};

/// Collision geometry attached to a rigid body. Shapes are immutable once
/// constructed, so composite wrappers share their inner shape through an
/// [`Arc`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Shape {
    Sphere {
        radius: f32,
    },
    Box {
        half_extents: Vec3,
    },
    Capsule {
        radius: f32,
        half_height: f32,
    },
    TaperedCapsule {
        bottom_radius: f32,
        top_radius: f32,
        half_height: f32,
    },
    Cylinder {
        radius: f32,
        half_height: f32,
    },
    ConvexHull {
        points: Vec<Vec3>,
        center: Vec3,
    },
    TriangleMesh(TriangleMesh),
    Empty,
    Scaled {
        inner: Arc<Shape>,
        scale: Vec3,
    },
    Transformed {
        inner: Arc<Shape>,
        transform: Transform,
    },
    Compound {
        children: Vec<CompoundChild>,
    },
}

/// One member of a compound shape, posed in the compound's frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompoundChild {
    pub shape: Arc<Shape>,
    pub position: Vec3,
    pub rotation: Quat,
}

impl CompoundChild {
    pub fn new(shape: Arc<Shape>, position: Vec3, rotation: Quat) -> Self {
        Self {
            shape,
            position,
            rotation,
        }
    }

    fn transform(&self) -> Transform {
        Transform::new(self.position, self.rotation)
    }
}

/// A flattened leaf handed out by [`Shape::for_each_leaf`].
pub enum ShapeLeaf<'a> {
    Convex(&'a Shape),
    Mesh(&'a TriangleMesh),
}

impl Shape {
    pub fn sphere(radius: f32) -> Result<Shape, PhysicsError> {
        if radius <= 0.0 {
            return Err(PhysicsError::InvalidShapeParameter(
                "sphere radius must be positive",
            ));
        }
        Ok(Shape::Sphere { radius })
    }

    pub fn cuboid(half_extents: Vec3) -> Result<Shape, PhysicsError> {
        if half_extents.min_element() <= 0.0 {
            return Err(PhysicsError::InvalidShapeParameter(
                "box half extents must be positive",
            ));
        }
        Ok(Shape::Box { half_extents })
    }

    pub fn capsule(radius: f32, half_height: f32) -> Result<Shape, PhysicsError> {
        if radius <= 0.0 || half_height < 0.0 {
            return Err(PhysicsError::InvalidShapeParameter(
                "capsule needs a positive radius and non-negative half height",
            ));
        }
        Ok(Shape::Capsule {
            radius,
            half_height,
        })
    }

    pub fn tapered_capsule(
        bottom_radius: f32,
        top_radius: f32,
        half_height: f32,
    ) -> Result<Shape, PhysicsError> {
        if bottom_radius <= 0.0 || top_radius <= 0.0 || half_height < 0.0 {
            return Err(PhysicsError::InvalidShapeParameter(
                "tapered capsule needs positive radii and a non-negative half height",
            ));
        }
        Ok(Shape::TaperedCapsule {
            bottom_radius,
            top_radius,
            half_height,
        })
    }

    pub fn cylinder(radius: f32, half_height: f32) -> Result<Shape, PhysicsError> {
        if radius <= 0.0 || half_height <= 0.0 {
            return Err(PhysicsError::InvalidShapeParameter(
                "cylinder needs positive radius and half height",
            ));
        }
        Ok(Shape::Cylinder {
            radius,
            half_height,
        })
    }

    pub fn convex_hull(points: Vec<Vec3>) -> Result<Shape, PhysicsError> {
        if points.len() < 4 {
            return Err(PhysicsError::InvalidShapeParameter(
                "convex hull needs at least four points",
            ));
        }
        let center = points.iter().copied().sum::<Vec3>() / points.len() as f32;
        Ok(Shape::ConvexHull { points, center })
    }

    pub fn mesh(mesh: TriangleMesh) -> Shape {
        Shape::TriangleMesh(mesh)
    }

    pub fn empty() -> Shape {
        Shape::Empty
    }

    pub fn scaled(inner: Arc<Shape>, scale: Vec3) -> Result<Shape, PhysicsError> {
        if scale.abs().min_element() <= 1e-6 {
            return Err(PhysicsError::InvalidShapeParameter(
                "scale components must be non-zero",
            ));
        }
        Ok(Shape::Scaled { inner, scale })
    }

    pub fn transformed(inner: Arc<Shape>, position: Vec3, rotation: Quat) -> Shape {
        Shape::Transformed {
            inner,
            transform: Transform::new(position, rotation.normalize()),
        }
    }

    pub fn compound(children: Vec<CompoundChild>) -> Result<Shape, PhysicsError> {
        if children.is_empty() {
            return Err(PhysicsError::InvalidShapeParameter(
                "compound needs at least one child",
            ));
        }
        Ok(Shape::Compound { children })
    }

    /// Whether GJK can consume this shape directly through its support
    /// function.
    pub fn is_convex(&self) -> bool {
        match self {
            Shape::Sphere { .. }
            | Shape::Box { .. }
            | Shape::Capsule { .. }
            | Shape::TaperedCapsule { .. }
            | Shape::Cylinder { .. }
            | Shape::ConvexHull { .. } => true,
            Shape::Scaled { inner, .. } => inner.is_convex(),
            Shape::Transformed { inner, .. } => inner.is_convex(),
            Shape::TriangleMesh(_) | Shape::Empty | Shape::Compound { .. } => false,
        }
    }

    /// Shape-local bounding box.
    pub fn local_aabb(&self) -> Aabb {
        match self {
            Shape::Sphere { radius } => {
                Aabb::from_center_extent(Vec3::ZERO, Vec3::splat(*radius))
            }
            Shape::Box { half_extents } => Aabb::from_center_extent(Vec3::ZERO, *half_extents),
            Shape::Capsule {
                radius,
                half_height,
            } => Aabb::from_center_extent(
                Vec3::ZERO,
                Vec3::new(*radius, half_height + radius, *radius),
            ),
            Shape::TaperedCapsule {
                bottom_radius,
                top_radius,
                half_height,
            } => {
                let r = bottom_radius.max(*top_radius);
                let mut bounds = Aabb::from_center_extent(Vec3::ZERO, Vec3::splat(r));
                bounds.extend(Vec3::new(r, half_height + top_radius, r));
                bounds.extend(Vec3::new(-r, -half_height - bottom_radius, -r));
                bounds
            }
            Shape::Cylinder {
                radius,
                half_height,
            } => Aabb::from_center_extent(Vec3::ZERO, Vec3::new(*radius, *half_height, *radius)),
            Shape::ConvexHull { points, .. } => Aabb::from_points(points),
            Shape::TriangleMesh(mesh) => mesh.bounds(),
            Shape::Empty => Aabb::from_center_extent(Vec3::ZERO, Vec3::ZERO),
            Shape::Scaled { inner, scale } => inner.local_aabb().scaled(*scale),
            Shape::Transformed { inner, transform } => inner.local_aabb().transformed(transform),
            Shape::Compound { children } => {
                let mut bounds = Aabb::empty();
                for child in children {
                    bounds =
                        bounds.merged(&child.shape.local_aabb().transformed(&child.transform()));
                }
                bounds
            }
        }
    }

    /// Center of mass in the shape's local frame.
    pub fn center_of_mass(&self) -> Vec3 {
        match self {
            Shape::Sphere { .. }
            | Shape::Box { .. }
            | Shape::Capsule { .. }
            | Shape::Cylinder { .. }
            | Shape::Empty => Vec3::ZERO,
            Shape::TaperedCapsule {
                bottom_radius,
                top_radius,
                half_height,
            } => {
                // Volume-weighted blend of the two cap centers and the
                // frustum between them.
                let vb = sphere_volume(*bottom_radius) * 0.5;
                let vt = sphere_volume(*top_radius) * 0.5;
                let vf = frustum_volume(*bottom_radius, *top_radius, 2.0 * half_height);
                let total = (vb + vt + vf).max(1e-12);
                let frustum_com =
                    frustum_com_height(*bottom_radius, *top_radius, 2.0 * half_height)
                        - half_height;
                Vec3::new(
                    0.0,
                    (vt * *half_height + vb * -*half_height + vf * frustum_com) / total,
                    0.0,
                )
            }
            Shape::ConvexHull { center, .. } => *center,
            Shape::TriangleMesh(mesh) => mesh.bounds().center(),
            Shape::Scaled { inner, scale } => inner.center_of_mass() * *scale,
            Shape::Transformed { inner, transform } => {
                transform.point_to_world(inner.center_of_mass())
            }
            Shape::Compound { children } => {
                let mut weighted = Vec3::ZERO;
                let mut total = 0.0;
                for child in children {
                    let volume = child.shape.volume().max(1e-9);
                    weighted += child.transform().point_to_world(child.shape.center_of_mass())
                        * volume;
                    total += volume;
                }
                weighted / total.max(1e-9)
            }
        }
    }

    pub fn volume(&self) -> f32 {
        match self {
            Shape::Sphere { radius } => sphere_volume(*radius),
            Shape::Box { half_extents } => {
                8.0 * half_extents.x * half_extents.y * half_extents.z
            }
            Shape::Capsule {
                radius,
                half_height,
            } => {
                sphere_volume(*radius)
                    + std::f32::consts::PI * radius * radius * 2.0 * half_height
            }
            Shape::TaperedCapsule {
                bottom_radius,
                top_radius,
                half_height,
            } => {
                0.5 * sphere_volume(*bottom_radius)
                    + 0.5 * sphere_volume(*top_radius)
                    + frustum_volume(*bottom_radius, *top_radius, 2.0 * half_height)
            }
            Shape::Cylinder {
                radius,
                half_height,
            } => std::f32::consts::PI * radius * radius * 2.0 * half_height,
            Shape::ConvexHull { points, .. } => {
                // Half the bounding volume; coarse but stable for mass
                // derivation from a raw point cloud.
                let extent = Aabb::from_points(points).extent();
                (8.0 * extent.x * extent.y * extent.z) * 0.5
            }
            Shape::TriangleMesh(_) | Shape::Empty => 0.0,
            Shape::Scaled { inner, scale } => {
                inner.volume() * (scale.x * scale.y * scale.z).abs()
            }
            Shape::Transformed { inner, .. } => inner.volume(),
            Shape::Compound { children } => children.iter().map(|c| c.shape.volume()).sum(),
        }
    }

    /// Mass and principal inertia derived from the geometry at `density`.
    /// Meshes and empty shapes have no volume and report zero mass; dynamic
    /// bodies carrying them need an explicit override.
    pub fn mass_properties(&self, density: f32) -> MassProperties {
        let (mass, _, tensor) = self.mass_tensor(density);
        if mass <= f32::EPSILON {
            return MassProperties::ZERO;
        }
        let (diagonal, rotation) = math::diagonalize_symmetric(tensor);
        MassProperties {
            mass,
            inertia_diagonal: diagonal.max(Vec3::splat(1e-9)),
            inertia_rotation: rotation,
        }
    }

    /// `(mass, com, inertia tensor about com in the shape frame)`.
    fn mass_tensor(&self, density: f32) -> (f32, Vec3, Mat3) {
        let mass = self.volume() * density;
        match self {
            Shape::Sphere { radius } => (
                mass,
                Vec3::ZERO,
                Mat3::from_diagonal(math::inertia_sphere(*radius, mass)),
            ),
            Shape::Box { half_extents } => (
                mass,
                Vec3::ZERO,
                Mat3::from_diagonal(math::inertia_box(*half_extents, mass)),
            ),
            Shape::Capsule {
                radius,
                half_height,
            } => (
                mass,
                Vec3::ZERO,
                Mat3::from_diagonal(math::inertia_capsule(*radius, *half_height, mass)),
            ),
            Shape::TaperedCapsule {
                bottom_radius,
                top_radius,
                half_height,
            } => {
                // Bounded by the equivalent straight capsule of the larger
                // radius; close enough for the solver's purposes.
                let radius = 0.5 * (bottom_radius + top_radius);
                (
                    mass,
                    self.center_of_mass(),
                    Mat3::from_diagonal(math::inertia_capsule(radius, *half_height, mass)),
                )
            }
            Shape::Cylinder {
                radius,
                half_height,
            } => (
                mass,
                Vec3::ZERO,
                Mat3::from_diagonal(math::inertia_cylinder(*radius, *half_height, mass)),
            ),
            Shape::ConvexHull { points, center } => (
                mass,
                *center,
                math::inertia_point_cloud(points, *center, mass),
            ),
            Shape::TriangleMesh(_) | Shape::Empty => (0.0, Vec3::ZERO, Mat3::ZERO),
            Shape::Scaled { inner, scale } => {
                let (inner_mass, inner_com, inner_tensor) = inner.mass_tensor(density);
                let volume_scale = (scale.x * scale.y * scale.z).abs();
                let scaled_mass = inner_mass * volume_scale;
                // Scale the tensor through its box equivalent.
                let diag = Vec3::new(
                    inner_tensor.x_axis.x,
                    inner_tensor.y_axis.y,
                    inner_tensor.z_axis.z,
                );
                let scaled = scale_box_equivalent(diag, inner_mass, scaled_mass, *scale);
                (scaled_mass, inner_com * *scale, Mat3::from_diagonal(scaled))
            }
            Shape::Transformed { inner, transform } => {
                let (inner_mass, inner_com, inner_tensor) = inner.mass_tensor(density);
                let rot = Mat3::from_quat(transform.rotation);
                (
                    inner_mass,
                    transform.point_to_world(inner_com),
                    rot * inner_tensor * rot.transpose(),
                )
            }
            Shape::Compound { children } => {
                let com = self.center_of_mass();
                let mut total_mass = 0.0;
                let mut tensor = Mat3::ZERO;
                for child in children {
                    let (child_mass, child_com, child_tensor) = child.shape.mass_tensor(density);
                    if child_mass <= f32::EPSILON {
                        continue;
                    }
                    let rot = Mat3::from_quat(child.rotation);
                    let rotated = rot * child_tensor * rot.transpose();
                    let offset = child.transform().point_to_world(child_com) - com;
                    // Parallel axis theorem.
                    let shift = Mat3::from_diagonal(Vec3::splat(offset.length_squared()))
                        - Mat3::from_cols(offset * offset.x, offset * offset.y, offset * offset.z);
                    tensor = add(tensor, add(rotated, mul(shift, child_mass)));
                    total_mass += child_mass;
                }
                (total_mass, com, tensor)
            }
        }
    }

    /// Furthest point of the shape in `direction` (shape-local space).
    /// Only meaningful for convex shapes.
    pub fn support_point(&self, direction: Vec3) -> Vec3 {
        let dir = direction.normalize_or_zero();
        match self {
            Shape::Sphere { radius } => dir * *radius,
            Shape::Box { half_extents } => Vec3::new(
                half_extents.x.copysign(direction.x),
                half_extents.y.copysign(direction.y),
                half_extents.z.copysign(direction.z),
            ),
            Shape::Capsule {
                radius,
                half_height,
            } => Vec3::new(0.0, half_height.copysign(direction.y), 0.0) + dir * *radius,
            Shape::TaperedCapsule {
                bottom_radius,
                top_radius,
                half_height,
            } => {
                let top = Vec3::new(0.0, *half_height, 0.0) + dir * *top_radius;
                let bottom = Vec3::new(0.0, -*half_height, 0.0) + dir * *bottom_radius;
                if top.dot(direction) >= bottom.dot(direction) {
                    top
                } else {
                    bottom
                }
            }
            Shape::Cylinder {
                radius,
                half_height,
            } => {
                let lateral =
                    Vec3::new(direction.x, 0.0, direction.z).normalize_or_zero() * *radius;
                lateral + Vec3::new(0.0, half_height.copysign(direction.y), 0.0)
            }
            Shape::ConvexHull { points, .. } => {
                let mut best = points[0];
                let mut best_dot = best.dot(direction);
                for &p in &points[1..] {
                    let d = p.dot(direction);
                    if d > best_dot {
                        best_dot = d;
                        best = p;
                    }
                }
                best
            }
            Shape::Scaled { inner, scale } => {
                *scale * inner.support_point(*scale * direction)
            }
            Shape::Transformed { inner, transform } => transform
                .point_to_world(inner.support_point(transform.direction_to_local(direction))),
            Shape::Compound { children } => {
                let mut best = Vec3::ZERO;
                let mut best_dot = f32::NEG_INFINITY;
                for child in children {
                    let t = child.transform();
                    let p = t.point_to_world(
                        child.shape.support_point(t.direction_to_local(direction)),
                    );
                    let d = p.dot(direction);
                    if d > best_dot {
                        best_dot = d;
                        best = p;
                    }
                }
                best
            }
            Shape::TriangleMesh(_) | Shape::Empty => Vec3::ZERO,
        }
    }

    /// Outward unit surface normal at a local-space point, routed through the
    /// sub-shape id for composite shapes and meshes.
    pub fn surface_normal(&self, sub_shape: SubShapeId, local_point: Vec3) -> Vec3 {
        match self {
            Shape::Sphere { .. } => {
                let n = local_point.normalize_or_zero();
                if n == Vec3::ZERO {
                    Vec3::Y
                } else {
                    n
                }
            }
            Shape::Box { half_extents } => {
                // Snap to the dominant face relative to the half extent.
                let rel = local_point / *half_extents;
                let abs = rel.abs();
                if abs.x >= abs.y && abs.x >= abs.z {
                    Vec3::new(rel.x.signum(), 0.0, 0.0)
                } else if abs.y >= abs.z {
                    Vec3::new(0.0, rel.y.signum(), 0.0)
                } else {
                    Vec3::new(0.0, 0.0, rel.z.signum())
                }
            }
            Shape::Capsule { half_height, .. } => {
                let clamped_y = local_point.y.clamp(-*half_height, *half_height);
                let axis_point = Vec3::new(0.0, clamped_y, 0.0);
                let n = (local_point - axis_point).normalize_or_zero();
                if n == Vec3::ZERO {
                    Vec3::Y
                } else {
                    n
                }
            }
            Shape::TaperedCapsule {
                bottom_radius,
                top_radius,
                half_height,
            } => {
                // Closest-feature analysis against the two cap centers.
                let top_center = Vec3::new(0.0, *half_height, 0.0);
                let bottom_center = Vec3::new(0.0, -*half_height, 0.0);
                let to_top = (local_point - top_center).length() - top_radius;
                let to_bottom = (local_point - bottom_center).length() - bottom_radius;
                let n = if to_top.abs() <= to_bottom.abs() {
                    (local_point - top_center).normalize_or_zero()
                } else {
                    (local_point - bottom_center).normalize_or_zero()
                };
                if n == Vec3::ZERO {
                    Vec3::Y
                } else {
                    n
                }
            }
            Shape::Cylinder {
                radius,
                half_height,
            } => {
                let radial = Vec3::new(local_point.x, 0.0, local_point.z);
                let radial_dist = (radial.length() - radius).abs();
                let cap_dist = (local_point.y.abs() - half_height).abs();
                if cap_dist < radial_dist {
                    Vec3::new(0.0, local_point.y.signum(), 0.0)
                } else {
                    let n = radial.normalize_or_zero();
                    if n == Vec3::ZERO {
                        Vec3::Y
                    } else {
                        n
                    }
                }
            }
            Shape::ConvexHull { points, center } => {
                // Face plane with the largest dot product against the point.
                let outward = (local_point - *center).normalize_or_zero();
                if outward == Vec3::ZERO {
                    return Vec3::Y;
                }
                let mut best = outward;
                let mut best_dot = f32::NEG_INFINITY;
                for &p in points {
                    let candidate = (p - *center).normalize_or_zero();
                    if candidate == Vec3::ZERO {
                        continue;
                    }
                    let d = candidate.dot(outward);
                    if d > best_dot {
                        best_dot = d;
                        best = candidate;
                    }
                }
                // Blend the closest vertex direction with the query direction
                // to approximate the supporting face normal.
                let blended = (best + outward).normalize_or_zero();
                if blended == Vec3::ZERO {
                    outward
                } else {
                    blended
                }
            }
            Shape::TriangleMesh(mesh) => {
                let (tri, _) = sub_shape.pop(mesh.sub_shape_bits());
                mesh.face_normal(tri)
            }
            Shape::Empty => Vec3::Y,
            Shape::Scaled { inner, scale } => {
                let inner_normal =
                    inner.surface_normal(sub_shape, local_point / *scale);
                // Normals transform by the inverse scale; re-normalize.
                (inner_normal / *scale).normalize_or_zero()
            }
            Shape::Transformed { inner, transform } => {
                let local = transform.point_to_local(local_point);
                transform.rotation * inner.surface_normal(sub_shape, local)
            }
            Shape::Compound { children } => {
                let (index, rest) = sub_shape.pop(SubShapeId::bits_for(children.len()));
                match children.get(index as usize) {
                    Some(child) => {
                        let t = child.transform();
                        t.rotation * child.shape.surface_normal(rest, t.point_to_local(local_point))
                    }
                    None => Vec3::Y,
                }
            }
        }
    }

    /// Visits the collision leaves of this shape tree: convex pieces and
    /// triangle meshes, each with its accumulated world transform,
    /// component-wise scale, and the sub-shape id bits consumed so far.
    /// The visitor returns `false` to stop; the method reports whether the
    /// walk ran to completion.
    pub fn for_each_leaf(
        &self,
        transform: &Transform,
        visitor: &mut dyn FnMut(ShapeLeaf<'_>, &Transform, Vec3, SubShapeIdBuilder) -> bool,
    ) -> bool {
        self.walk_leaves(transform, Vec3::ONE, SubShapeIdBuilder::new(), visitor)
    }

    /// [`Shape::for_each_leaf`] with an extra root-level scale, used by the
    /// query API's scaled casts and overlap tests.
    pub fn for_each_leaf_scaled(
        &self,
        transform: &Transform,
        scale: Vec3,
        visitor: &mut dyn FnMut(ShapeLeaf<'_>, &Transform, Vec3, SubShapeIdBuilder) -> bool,
    ) -> bool {
        self.walk_leaves(transform, scale, SubShapeIdBuilder::new(), visitor)
    }

    fn walk_leaves(
        &self,
        transform: &Transform,
        scale: Vec3,
        builder: SubShapeIdBuilder,
        visitor: &mut dyn FnMut(ShapeLeaf<'_>, &Transform, Vec3, SubShapeIdBuilder) -> bool,
    ) -> bool {
        match self {
            Shape::Empty => true,
            Shape::Scaled {
                inner,
                scale: inner_scale,
            } => inner.walk_leaves(transform, scale * *inner_scale, builder, visitor),
            Shape::Transformed {
                inner,
                transform: local,
            } => {
                let scaled_local = Transform::new(local.position * scale, local.rotation);
                let combined = transform.combine(&scaled_local);
                inner.walk_leaves(&combined, scale, builder, visitor)
            }
            Shape::Compound { children } => {
                let bits = SubShapeId::bits_for(children.len());
                for (index, child) in children.iter().enumerate() {
                    let mut child_builder = builder;
                    if child_builder.push_back(index as u32, bits).is_err() {
                        log::debug!("sub-shape id budget exhausted; skipping compound child");
                        continue;
                    }
                    let scaled_local =
                        Transform::new(child.position * scale, child.rotation);
                    let combined = transform.combine(&scaled_local);
                    if !child
                        .shape
                        .walk_leaves(&combined, scale, child_builder, visitor)
                    {
                        return false;
                    }
                }
                true
            }
            Shape::TriangleMesh(mesh) => visitor(ShapeLeaf::Mesh(mesh), transform, scale, builder),
            convex => visitor(ShapeLeaf::Convex(convex), transform, scale, builder),
        }
    }
}

/// Support point of a convex leaf under a component-wise scale.
pub fn scaled_support(shape: &Shape, scale: Vec3, direction: Vec3) -> Vec3 {
    if scale == Vec3::ONE {
        shape.support_point(direction)
    } else {
        scale * shape.support_point(scale * direction)
    }
}

fn sphere_volume(radius: f32) -> f32 {
    (4.0 / 3.0) * std::f32::consts::PI * radius * radius * radius
}

fn frustum_volume(r0: f32, r1: f32, height: f32) -> f32 {
    (std::f32::consts::PI * height / 3.0) * (r0 * r0 + r0 * r1 + r1 * r1)
}

/// Height of a conical frustum's centroid above its base.
fn frustum_com_height(r0: f32, r1: f32, height: f32) -> f32 {
    let denom = r0 * r0 + r0 * r1 + r1 * r1;
    if denom < 1e-12 {
        return height * 0.5;
    }
    height * (r0 * r0 + 2.0 * r0 * r1 + 3.0 * r1 * r1) / (4.0 * denom)
}

/// Maps principal inertia through an equivalent solid box so it can be
/// rescaled component-wise.
fn scale_box_equivalent(diag: Vec3, mass: f32, new_mass: f32, scale: Vec3) -> Vec3 {
    if mass <= f32::EPSILON {
        return Vec3::ZERO;
    }
    let k = 6.0 / mass;
    let sq = Vec3::new(
        (k * (diag.y + diag.z - diag.x)).max(0.0),
        (k * (diag.x + diag.z - diag.y)).max(0.0),
        (k * (diag.x + diag.y - diag.z)).max(0.0),
    );
    let half = Vec3::new(sq.x.sqrt(), sq.y.sqrt(), sq.z.sqrt()) * 0.5 * scale.abs();
    math::inertia_box(half, new_mass)
}

fn add(a: Mat3, b: Mat3) -> Mat3 {
    Mat3::from_cols(a.x_axis + b.x_axis, a.y_axis + b.y_axis, a.z_axis + b.z_axis)
}

fn mul(a: Mat3, s: f32) -> Mat3 {
    Mat3::from_cols(a.x_axis * s, a.y_axis * s, a.z_axis * s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(Shape::sphere(-1.0).is_err());
        assert!(Shape::cuboid(Vec3::new(1.0, 0.0, 1.0)).is_err());
        assert!(Shape::convex_hull(vec![Vec3::ZERO, Vec3::X]).is_err());
        assert!(Shape::compound(Vec::new()).is_err());
    }

    #[test]
    fn sphere_surface_normal_is_radial_and_unit() {
        let shape = Shape::sphere(2.0).unwrap();
        let n = shape.surface_normal(SubShapeId::EMPTY, Vec3::new(0.0, 2.0, 0.0));
        assert!((n - Vec3::Y).length() < 1e-5);
        assert!((n.length() - 1.0).abs() < 1e-5);
        // Degenerate query at the origin falls back to Y.
        assert_eq!(shape.surface_normal(SubShapeId::EMPTY, Vec3::ZERO), Vec3::Y);
    }

    #[test]
    fn box_surface_normal_snaps_to_dominant_face() {
        let shape = Shape::cuboid(Vec3::new(1.0, 2.0, 3.0)).unwrap();
        let n = shape.surface_normal(SubShapeId::EMPTY, Vec3::new(0.99, 1.0, 0.0));
        assert!((n - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn support_point_respects_scale() {
        let sphere = Arc::new(Shape::sphere(1.0).unwrap());
        let scaled = Shape::scaled(sphere, Vec3::new(2.0, 1.0, 1.0)).unwrap();
        let support = scaled.support_point(Vec3::X);
        assert!((support.x - 2.0).abs() < 1e-4);
    }

    #[test]
    fn compound_routes_sub_shape_ids() {
        let a = Arc::new(Shape::sphere(1.0).unwrap());
        let b = Arc::new(Shape::cuboid(Vec3::ONE).unwrap());
        let compound = Shape::compound(vec![
            CompoundChild::new(a, Vec3::new(-2.0, 0.0, 0.0), Quat::IDENTITY),
            CompoundChild::new(b, Vec3::new(2.0, 0.0, 0.0), Quat::IDENTITY),
        ])
        .unwrap();

        let mut ids = Vec::new();
        compound.for_each_leaf(&Transform::default(), &mut |_, t, _, builder| {
            ids.push((builder.build(), t.position));
            true
        });
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0].0, ids[1].0);

        // The normal on the right child points along +X at its rightmost point.
        let n = compound.surface_normal(ids[1].0, Vec3::new(3.0, 0.0, 0.0));
        assert!((n - Vec3::X).length() < 1e-4);
    }

    #[test]
    fn mass_properties_match_analytic_box() {
        let shape = Shape::cuboid(Vec3::new(0.5, 0.5, 0.5)).unwrap();
        let props = shape.mass_properties(1.0);
        assert!((props.mass - 1.0).abs() < 1e-4);
        // Unit cube: I = m/6 on each axis.
        for axis in 0..3 {
            assert!((props.inertia_diagonal[axis] - 1.0 / 6.0).abs() < 1e-3);
        }
    }

    #[test]
    fn mesh_shape_has_no_mass() {
        let mesh = TriangleMesh::builder(
            vec![Vec3::ZERO, Vec3::X, Vec3::Z],
            vec![[0, 1, 2]],
        )
        .build()
        .unwrap();
        let shape = Shape::mesh(mesh);
        assert_eq!(shape.mass_properties(1.0).mass, 0.0);
    }
}
