//! User-facing spatial queries: ray casts, shape casts, point and overlap
//! tests, each parameterized by a collector (closest / any / all) and a
//! filter over layers, groups, and an optional per-body predicate.

use glam::{Quat, Vec3};

use crate::config::{MAX_SHAPE_CAST_ITERATIONS, SHAPE_CAST_TOLERANCE};
use crate::core::aabb::Aabb;
use crate::core::body::RigidBody;
use crate::core::body_pool::{BodyId, BodyPool};
use crate::core::shape::{Shape, ShapeLeaf};
use crate::core::sub_shape::{SubShapeId, SubShapeIdBuilder};
use crate::core::types::Transform;

use super::aabb_tree::Visit;
use super::broadphase::BroadPhase;
use super::gjk::{self, ConvexSupport, OffsetSupport, PointSupport, Support, TriangleSupport};
use super::narrowphase::{collide_shapes_scaled, CollideSettings};

/// Common surface of all query hits: a fraction in `[0, 1]` along the query.
pub trait QueryHit {
    fn fraction(&self) -> f32;
}

/// Result of a ray cast.
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub body: BodyId,
    pub sub_shape: SubShapeId,
    pub fraction: f32,
    pub point: Vec3,
    pub normal: Vec3,
}

impl QueryHit for RayHit {
    fn fraction(&self) -> f32 {
        self.fraction
    }
}

/// Result of a shape cast: earliest time of impact along the displacement.
#[derive(Debug, Clone, Copy)]
pub struct ShapeCastHit {
    pub body: BodyId,
    pub sub_shape: SubShapeId,
    pub fraction: f32,
    pub point: Vec3,
    /// Surface normal on the hit body, facing the cast shape.
    pub normal: Vec3,
    /// Direction to translate the cast shape out of penetration; only
    /// meaningful for `fraction == 0` hits.
    pub penetration_axis: Vec3,
}

impl QueryHit for ShapeCastHit {
    fn fraction(&self) -> f32 {
        self.fraction
    }
}

/// Result of a point containment test.
#[derive(Debug, Clone, Copy)]
pub struct PointHit {
    pub body: BodyId,
    pub sub_shape: SubShapeId,
}

impl QueryHit for PointHit {
    fn fraction(&self) -> f32 {
        0.0
    }
}

/// Result of an overlap (collide-shape) test.
#[derive(Debug, Clone, Copy)]
pub struct OverlapHit {
    pub body: BodyId,
    pub sub_shape: SubShapeId,
    pub point: Vec3,
    pub normal: Vec3,
    pub depth: f32,
}

impl QueryHit for OverlapHit {
    fn fraction(&self) -> f32 {
        0.0
    }
}

/// Receives hits during a query. `should_exit` stops the search;
/// `max_fraction` lets the driver prune everything further than the best
/// hit so far.
pub trait HitCollector<H: QueryHit> {
    fn add_hit(&mut self, hit: H);

    fn should_exit(&self) -> bool {
        false
    }

    fn max_fraction(&self) -> f32 {
        1.0
    }
}

/// Keeps only the hit with the smallest fraction, narrowing the search as
/// it goes.
#[derive(Debug, Default)]
pub struct ClosestCollector<H> {
    pub hit: Option<H>,
}

impl<H> ClosestCollector<H> {
    pub fn new() -> Self {
        Self { hit: None }
    }
}

impl<H: QueryHit> HitCollector<H> for ClosestCollector<H> {
    fn add_hit(&mut self, hit: H) {
        let better = self
            .hit
            .as_ref()
            .map(|best| hit.fraction() < best.fraction())
            .unwrap_or(true);
        if better {
            self.hit = Some(hit);
        }
    }

    fn max_fraction(&self) -> f32 {
        self.hit.as_ref().map(|h| h.fraction()).unwrap_or(1.0)
    }
}

/// Accepts the first hit and stops the query.
#[derive(Debug, Default)]
pub struct AnyCollector<H> {
    pub hit: Option<H>,
}

impl<H> AnyCollector<H> {
    pub fn new() -> Self {
        Self { hit: None }
    }
}

impl<H: QueryHit> HitCollector<H> for AnyCollector<H> {
    fn add_hit(&mut self, hit: H) {
        if self.hit.is_none() {
            self.hit = Some(hit);
        }
    }

    fn should_exit(&self) -> bool {
        self.hit.is_some()
    }
}

/// Appends every hit; the caller sorts if needed.
#[derive(Debug, Default)]
pub struct AllCollector<H> {
    pub hits: Vec<H>,
}

impl<H> AllCollector<H> {
    pub fn new() -> Self {
        Self { hits: Vec::new() }
    }
}

impl<H: QueryHit> HitCollector<H> for AllCollector<H> {
    fn add_hit(&mut self, hit: H) {
        self.hits.push(hit);
    }
}

/// Restricts which bodies a query sees.
#[derive(Clone, Copy)]
pub struct QueryFilter<'a> {
    /// Bit `i` enables broadphase layer `i`.
    pub broad_phase_layer_mask: u32,
    /// Bit `i` enables object layer `i` (layers above 63 always pass).
    pub object_layer_mask: u64,
    pub group: u32,
    pub mask: u32,
    pub predicate: Option<&'a dyn Fn(&RigidBody) -> bool>,
}

impl Default for QueryFilter<'_> {
    fn default() -> Self {
        Self {
            broad_phase_layer_mask: u32::MAX,
            object_layer_mask: u64::MAX,
            group: u32::MAX,
            mask: u32::MAX,
            predicate: None,
        }
    }
}

impl QueryFilter<'_> {
    pub fn accepts(&self, body: &RigidBody) -> bool {
        if body.object_layer < 64 && self.object_layer_mask & (1 << body.object_layer) == 0 {
            return false;
        }
        if (self.group & body.collision_mask) == 0 || (body.collision_group & self.mask) == 0 {
            return false;
        }
        match self.predicate {
            Some(predicate) => predicate(body),
            None => true,
        }
    }
}

/// Ray-cast tuning.
#[derive(Debug, Clone, Copy)]
pub struct RayCastSettings {
    /// Report a fraction-0 hit when the ray starts inside a shape.
    pub solid: bool,
}

impl Default for RayCastSettings {
    fn default() -> Self {
        Self { solid: true }
    }
}

/// Shape-cast tuning.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShapeCastSettings {
    /// Overrides the sliding direction used for inactive-edge normal
    /// correction on mesh targets; defaults to the cast displacement.
    pub sliding_direction: Option<Vec3>,
}

/// Casts a ray against every body passing the filter.
pub fn cast_ray(
    bodies: &BodyPool,
    broadphase: &BroadPhase,
    collector: &mut dyn HitCollector<RayHit>,
    settings: &RayCastSettings,
    origin: Vec3,
    direction: Vec3,
    length: f32,
    filter: &QueryFilter<'_>,
) {
    let dir = direction.normalize_or_zero();
    if dir == Vec3::ZERO || length <= 0.0 {
        return;
    }

    broadphase.query_ray(
        origin,
        dir,
        length,
        filter.broad_phase_layer_mask,
        &mut |body_id| {
            let Some(body) = bodies.get(body_id) else {
                return Visit::Continue;
            };
            if !filter.accepts(body) {
                return Visit::Continue;
            }

            let max_t = collector.max_fraction() * length;
            if let Some(hit) = raycast_body(body, origin, dir, max_t, settings) {
                collector.add_hit(RayHit {
                    fraction: hit.0 / length,
                    ..hit.1
                });
            }
            if collector.should_exit() {
                Visit::Stop
            } else {
                Visit::Shrink(collector.max_fraction() * length)
            }
        },
    );
}

/// Closest hit against one body's shape tree: `(t, hit)` with `t` in world
/// units (the returned hit still carries a placeholder fraction).
fn raycast_body(
    body: &RigidBody,
    origin: Vec3,
    dir: Vec3,
    max_t: f32,
    settings: &RayCastSettings,
) -> Option<(f32, RayHit)> {
    let mut best: Option<(f32, RayHit)> = None;
    let transform = body.transform();
    body.shape
        .for_each_leaf(&transform, &mut |leaf, leaf_t, scale, builder| {
            let limit = best.map(|(t, _)| t).unwrap_or(max_t);
            if let Some((t, sub_shape, local_point, mesh_normal)) =
                raycast_leaf(&leaf, leaf_t, scale, builder, origin, dir, limit)
            {
                if t == 0.0 && !settings.solid {
                    return true;
                }
                let normal = match (&leaf, mesh_normal) {
                    (_, Some(n)) => n,
                    (ShapeLeaf::Convex(shape), None) => {
                        let local = shape.surface_normal(SubShapeId::EMPTY, local_point);
                        (leaf_t.rotation * (local / scale)).normalize_or_zero()
                    }
                    (ShapeLeaf::Mesh(_), None) => Vec3::Y,
                };
                best = Some((
                    t,
                    RayHit {
                        body: body.id,
                        sub_shape,
                        fraction: 0.0,
                        point: origin + dir * t,
                        normal,
                    },
                ));
            }
            true
        });
    best
}

/// Ray vs one leaf: `(t, sub_shape, leaf-local hit point, mesh normal)`.
fn raycast_leaf(
    leaf: &ShapeLeaf<'_>,
    transform: &Transform,
    scale: Vec3,
    builder: SubShapeIdBuilder,
    origin: Vec3,
    dir: Vec3,
    max_t: f32,
) -> Option<(f32, SubShapeId, Vec3, Option<Vec3>)> {
    match leaf {
        ShapeLeaf::Mesh(mesh) => {
            let local_origin = transform.point_to_local(origin) / scale;
            let local_dir = transform.direction_to_local(dir) / scale;
            let (t, tri) = mesh.raycast(local_origin, local_dir, max_t)?;
            let mut tri_builder = builder;
            tri_builder.push_back(tri, mesh.sub_shape_bits()).ok()?;
            let normal_local = mesh.face_normal(tri);
            // Orient against the ray.
            let mut normal =
                (transform.rotation * (normal_local / scale)).normalize_or_zero();
            if normal.dot(dir) > 0.0 {
                normal = -normal;
            }
            Some((t, tri_builder.build(), Vec3::ZERO, Some(normal)))
        }
        ShapeLeaf::Convex(shape) => {
            let t = raycast_convex_leaf(shape, transform, scale, origin, dir, max_t)?;
            let local_point = transform.point_to_local(origin + dir * t) / scale;
            Some((t, builder.build(), local_point, None))
        }
    }
}

fn raycast_convex_leaf(
    shape: &Shape,
    transform: &Transform,
    scale: Vec3,
    origin: Vec3,
    dir: Vec3,
    max_t: f32,
) -> Option<f32> {
    match shape {
        Shape::Sphere { radius } => ray_sphere(
            origin,
            dir,
            transform.position,
            radius * scale.abs().max_element(),
            max_t,
        ),
        Shape::Box { half_extents } => {
            let local_origin = transform.point_to_local(origin);
            let local_dir = transform.direction_to_local(dir);
            let bounds = Aabb::from_center_extent(Vec3::ZERO, *half_extents * scale.abs());
            bounds.ray_entry(local_origin, local_dir, max_t)
        }
        Shape::Capsule {
            radius,
            half_height,
        } => {
            let local_origin = transform.point_to_local(origin);
            let local_dir = transform.direction_to_local(dir);
            let r = radius * radial_scale(scale);
            let h = half_height * scale.y.abs();
            ray_capsule(local_origin, local_dir, r, h, max_t)
        }
        Shape::Cylinder {
            radius,
            half_height,
        } => {
            let local_origin = transform.point_to_local(origin);
            let local_dir = transform.direction_to_local(dir);
            let r = radius * radial_scale(scale);
            let h = half_height * scale.y.abs();
            ray_cylinder(local_origin, local_dir, r, h, max_t)
        }
        _ => {
            // Hulls, tapered capsules, and nested wrappers go through
            // conservative advancement over the support function.
            let support = ConvexSupport {
                shape,
                transform: *transform,
                scale,
            };
            raycast_support(&support, origin, dir, max_t)
        }
    }
}

fn radial_scale(scale: Vec3) -> f32 {
    scale.x.abs().max(scale.z.abs())
}

fn ray_sphere(origin: Vec3, dir: Vec3, center: Vec3, radius: f32, max_t: f32) -> Option<f32> {
    let oc = origin - center;
    let a = dir.length_squared();
    let b = 2.0 * oc.dot(dir);
    let c = oc.length_squared() - radius * radius;
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }
    let sqrt_disc = discriminant.sqrt();
    let t = (-b - sqrt_disc) / (2.0 * a);
    if t < 0.0 {
        // Origin inside the sphere counts as an immediate hit.
        let exit = (-b + sqrt_disc) / (2.0 * a);
        return if exit >= 0.0 { Some(0.0) } else { None };
    }
    (t <= max_t).then_some(t)
}

fn ray_cylinder(origin: Vec3, dir: Vec3, radius: f32, half_height: f32, max_t: f32) -> Option<f32> {
    let mut best: Option<f32> = None;

    let a = dir.x * dir.x + dir.z * dir.z;
    if a.abs() > 1e-9 {
        let b = 2.0 * (origin.x * dir.x + origin.z * dir.z);
        let c = origin.x * origin.x + origin.z * origin.z - radius * radius;
        let disc = b * b - 4.0 * a * c;
        if disc >= 0.0 {
            let sqrt_disc = disc.sqrt();
            for t in [(-b - sqrt_disc) / (2.0 * a), (-b + sqrt_disc) / (2.0 * a)] {
                if (0.0..=max_t).contains(&t) {
                    let y = origin.y + dir.y * t;
                    if y.abs() <= half_height {
                        best = Some(best.map_or(t, |b: f32| b.min(t)));
                    }
                }
            }
        }
    }

    if dir.y.abs() > 1e-9 {
        for cap in [-half_height, half_height] {
            let t = (cap - origin.y) / dir.y;
            if !(0.0..=max_t).contains(&t) {
                continue;
            }
            let x = origin.x + dir.x * t;
            let z = origin.z + dir.z * t;
            if x * x + z * z <= radius * radius {
                best = Some(best.map_or(t, |b: f32| b.min(t)));
            }
        }
    }

    // Inside the cylinder counts as fraction zero.
    if best.is_none()
        && origin.y.abs() <= half_height
        && origin.x * origin.x + origin.z * origin.z <= radius * radius
    {
        return Some(0.0);
    }
    best
}

fn ray_capsule(origin: Vec3, dir: Vec3, radius: f32, half_height: f32, max_t: f32) -> Option<f32> {
    let mut best = ray_cylinder(origin, dir, radius, half_height, max_t);
    for cap in [Vec3::new(0.0, half_height, 0.0), Vec3::new(0.0, -half_height, 0.0)] {
        if let Some(t) = ray_sphere(origin, dir, cap, radius, max_t) {
            best = Some(best.map_or(t, |b: f32| b.min(t)));
        }
    }
    best
}

/// Conservative advancement of a point along a ray towards a support
/// volume.
fn raycast_support(support: &dyn Support, origin: Vec3, dir: Vec3, max_t: f32) -> Option<f32> {
    let mut t = 0.0_f32;
    for _ in 0..MAX_SHAPE_CAST_ITERATIONS {
        let probe = PointSupport(origin + dir * t);
        let Some(closest) = gjk::gjk_closest(&probe, support, dir) else {
            return Some(t); // inside (t = 0) or touching
        };
        if closest.distance < SHAPE_CAST_TOLERANCE {
            return Some(t);
        }
        let to_surface = closest.normal();
        let approach = dir.dot(to_surface);
        if approach <= 1e-9 {
            return None;
        }
        t += closest.distance / approach;
        if t > max_t {
            return None;
        }
    }
    None
}

/// Sweeps a shape along `displacement` and reports times of impact.
#[allow(clippy::too_many_arguments)]
pub fn cast_shape(
    bodies: &BodyPool,
    broadphase: &BroadPhase,
    collector: &mut dyn HitCollector<ShapeCastHit>,
    settings: &ShapeCastSettings,
    shape: &Shape,
    position: Vec3,
    rotation: Quat,
    scale: Vec3,
    displacement: Vec3,
    filter: &QueryFilter<'_>,
) {
    let cast_transform = Transform::new(position, rotation);
    let start_aabb = shape.local_aabb().scaled(scale).transformed(&cast_transform);
    let displacement_len = displacement.length();

    broadphase.query_swept_aabb(
        &start_aabb,
        displacement,
        filter.broad_phase_layer_mask,
        &mut |body_id| {
            let Some(body) = bodies.get(body_id) else {
                return Visit::Continue;
            };
            if !filter.accepts(body) {
                return Visit::Continue;
            }

            cast_shape_against_body(
                collector,
                settings,
                shape,
                &cast_transform,
                scale,
                displacement,
                body,
            );

            if collector.should_exit() {
                Visit::Stop
            } else {
                Visit::Shrink(collector.max_fraction() * displacement_len)
            }
        },
    );
}

fn cast_shape_against_body(
    collector: &mut dyn HitCollector<ShapeCastHit>,
    settings: &ShapeCastSettings,
    cast_shape: &Shape,
    cast_transform: &Transform,
    cast_scale: Vec3,
    displacement: Vec3,
    body: &RigidBody,
) {
    let body_transform = body.transform();
    cast_shape.for_each_leaf_scaled(
        cast_transform,
        cast_scale,
        &mut |cast_leaf, cast_t, cast_s, _| {
            let ShapeLeaf::Convex(cast_convex) = cast_leaf else {
                log::debug!("mesh shapes cannot be cast; skipping leaf");
                return true;
            };
            let cast_support = ConvexSupport {
                shape: cast_convex,
                transform: *cast_t,
                scale: cast_s,
            };

            body.shape
                .for_each_leaf(&body_transform, &mut |leaf, leaf_t, leaf_s, builder| {
                    match leaf {
                        ShapeLeaf::Convex(target) => {
                            let target_support = ConvexSupport {
                                shape: target,
                                transform: *leaf_t,
                                scale: leaf_s,
                            };
                            if let Some(mut hit) = sweep_supports(
                                &cast_support,
                                &target_support,
                                displacement,
                                collector.max_fraction(),
                            ) {
                                hit.body = body.id;
                                hit.sub_shape = builder.build();
                                collector.add_hit(hit);
                            }
                        }
                        ShapeLeaf::Mesh(mesh) => {
                            let cast_world = cast_convex
                                .local_aabb()
                                .scaled(cast_s)
                                .transformed(cast_t)
                                .swept(displacement);
                            let inv = leaf_t.inverse();
                            let local_query = cast_world
                                .transformed(&inv)
                                .scaled(Vec3::ONE / leaf_s)
                                .expanded(1e-3);
                            let slide = settings.sliding_direction.unwrap_or(displacement);
                            let tri_bits = mesh.sub_shape_bits();

                            mesh.for_each_triangle_in_aabb(&local_query, |tri| {
                                let verts = mesh.triangle(tri);
                                let world = [
                                    leaf_t.point_to_world(verts[0] * leaf_s),
                                    leaf_t.point_to_world(verts[1] * leaf_s),
                                    leaf_t.point_to_world(verts[2] * leaf_s),
                                ];
                                let triangle = TriangleSupport { vertices: world };
                                if let Some(mut hit) = sweep_supports(
                                    &cast_support,
                                    &triangle,
                                    displacement,
                                    collector.max_fraction(),
                                ) {
                                    // Inactive-edge correction: trust the
                                    // face normal when the reported normal
                                    // came from an interior seam.
                                    let face = (world[1] - world[0])
                                        .cross(world[2] - world[0])
                                        .normalize_or_zero();
                                    let face = if face.dot(hit.normal) < 0.0 { -face } else { face };
                                    if slide.length_squared() > 0.0
                                        && hit.normal.dot(face)
                                            < crate::config::ACTIVE_EDGE_COS_THRESHOLD
                                        && !nearest_edge_active(mesh, tri, &world, hit.point)
                                    {
                                        hit.normal = face;
                                    }
                                    let mut tri_builder = builder;
                                    if tri_builder.push_back(tri, tri_bits).is_ok() {
                                        hit.body = body.id;
                                        hit.sub_shape = tri_builder.build();
                                        collector.add_hit(hit);
                                    }
                                }
                                !collector.should_exit()
                            });
                        }
                    }
                    !collector.should_exit()
                });
            !collector.should_exit()
        },
    );
}

fn nearest_edge_active(
    mesh: &crate::core::mesh::TriangleMesh,
    triangle: u32,
    world_verts: &[Vec3; 3],
    point: Vec3,
) -> bool {
    let mut best_edge = 0;
    let mut best_dist = f32::MAX;
    for edge in 0..3 {
        let a = world_verts[edge];
        let b = world_verts[(edge + 1) % 3];
        let ab = b - a;
        let t = ((point - a).dot(ab) / ab.length_squared().max(1e-12)).clamp(0.0, 1.0);
        let dist = (point - (a + ab * t)).length_squared();
        if dist < best_dist {
            best_dist = dist;
            best_edge = edge;
        }
    }
    mesh.edge_active(triangle, best_edge)
}

/// Conservative advancement of one convex support towards another along a
/// displacement. Fractions are normalized to `[0, 1]`.
fn sweep_supports(
    cast: &dyn Support,
    target: &dyn Support,
    displacement: Vec3,
    max_fraction: f32,
) -> Option<ShapeCastHit> {
    let mut fraction = 0.0_f32;

    for _ in 0..MAX_SHAPE_CAST_ITERATIONS {
        let moved = OffsetSupport {
            inner: cast,
            offset: displacement * fraction,
        };
        match gjk::gjk_closest(&moved, target, displacement) {
            None => {
                // Penetrating. At the sweep start this is a fraction-0 hit
                // with a penetration axis from EPA; later it means we have
                // already converged onto the surface.
                if fraction == 0.0 {
                    let simplex = gjk::gjk_intersect(&moved, target, displacement)?;
                    let (depth, axis) = gjk::epa_penetration(&simplex, &moved, target);
                    return Some(ShapeCastHit {
                        body: BodyId::INVALID,
                        sub_shape: SubShapeId::EMPTY,
                        fraction: 0.0,
                        point: moved.support(axis) - axis * depth,
                        normal: -axis,
                        penetration_axis: axis,
                    });
                }
                return Some(hit_at(cast, target, displacement, fraction));
            }
            Some(closest) => {
                if closest.distance < SHAPE_CAST_TOLERANCE {
                    return Some(ShapeCastHit {
                        body: BodyId::INVALID,
                        sub_shape: SubShapeId::EMPTY,
                        fraction,
                        point: closest.point_b,
                        normal: -closest.normal(),
                        penetration_axis: closest.normal(),
                    });
                }
                let to_target = closest.normal();
                let approach = displacement.dot(to_target);
                if approach <= 1e-9 {
                    return None;
                }
                fraction += closest.distance / approach;
                if fraction > max_fraction || fraction > 1.0 {
                    return None;
                }
            }
        }
    }
    None
}

fn hit_at(
    cast: &dyn Support,
    target: &dyn Support,
    displacement: Vec3,
    fraction: f32,
) -> ShapeCastHit {
    let moved = OffsetSupport {
        inner: cast,
        offset: displacement * fraction,
    };
    let dir = displacement.normalize_or_zero();
    let point = moved.support(dir);
    // Refine the normal from the target surface near the contact point.
    let mut normal = -dir;
    if let Some(closest) = gjk::gjk_closest(&PointSupport(point), target, dir) {
        if closest.distance > 1e-6 {
            normal = -closest.normal();
        }
    }
    ShapeCastHit {
        body: BodyId::INVALID,
        sub_shape: SubShapeId::EMPTY,
        fraction,
        point,
        normal,
        penetration_axis: -normal,
    }
}

/// Reports every body whose shape contains `point`.
pub fn collide_point(
    bodies: &BodyPool,
    broadphase: &BroadPhase,
    collector: &mut dyn HitCollector<PointHit>,
    point: Vec3,
    filter: &QueryFilter<'_>,
) {
    let probe = Aabb::from_center_extent(point, Vec3::splat(1e-4));
    broadphase.query_aabb(&probe, filter.broad_phase_layer_mask, &mut |body_id| {
        let Some(body) = bodies.get(body_id) else {
            return true;
        };
        if !filter.accepts(body) {
            return true;
        }
        let transform = body.transform();
        body.shape
            .for_each_leaf(&transform, &mut |leaf, leaf_t, leaf_s, builder| {
                if let ShapeLeaf::Convex(shape) = leaf {
                    let support = ConvexSupport {
                        shape,
                        transform: *leaf_t,
                        scale: leaf_s,
                    };
                    if gjk::gjk_closest(&PointSupport(point), &support, Vec3::X).is_none() {
                        collector.add_hit(PointHit {
                            body: body.id,
                            sub_shape: builder.build(),
                        });
                    }
                }
                !collector.should_exit()
            });
        !collector.should_exit()
    });
}

/// Reports every body overlapping a posed (and optionally scaled) shape.
#[allow(clippy::too_many_arguments)]
pub fn collide_shape(
    bodies: &BodyPool,
    broadphase: &BroadPhase,
    collector: &mut dyn HitCollector<OverlapHit>,
    settings: &CollideSettings,
    shape: &Shape,
    position: Vec3,
    rotation: Quat,
    scale: Vec3,
    filter: &QueryFilter<'_>,
) {
    let transform = Transform::new(position, rotation);
    let query_aabb = shape.local_aabb().scaled(scale).transformed(&transform);

    broadphase.query_aabb(&query_aabb, filter.broad_phase_layer_mask, &mut |body_id| {
        let Some(body) = bodies.get(body_id) else {
            return true;
        };
        if !filter.accepts(body) {
            return true;
        }

        let mut manifolds = Vec::new();
        collide_shapes_scaled(
            shape,
            &transform,
            scale,
            &body.shape,
            &body.transform(),
            Vec3::ONE,
            settings,
            &mut manifolds,
        );
        for manifold in manifolds {
            let deepest = manifold
                .points
                .iter()
                .max_by(|a, b| a.depth.partial_cmp(&b.depth).unwrap_or(std::cmp::Ordering::Equal));
            if let Some(point) = deepest {
                collector.add_hit(OverlapHit {
                    body: body.id,
                    sub_shape: manifold.sub_shape_b,
                    point: point.on_b,
                    normal: manifold.normal,
                    depth: point.depth,
                });
            }
            if collector.should_exit() {
                break;
            }
        }
        !collector.should_exit()
    });
}
