//! Shape-vs-shape collision: walks composite shape trees down to convex and
//! mesh leaves, dispatches specialized pairs where closed forms exist, and
//! falls back to GJK/EPA for the rest. Produces world-space manifolds keyed
//! by sub-shape ids.

use glam::{Mat3, Vec3};

use crate::config::ACTIVE_EDGE_COS_THRESHOLD;
use crate::core::aabb::Aabb;
use crate::core::mesh::TriangleMesh;
use crate::core::shape::{Shape, ShapeLeaf};
use crate::core::sub_shape::{SubShapeId, SubShapeIdBuilder};
use crate::core::types::Transform;

use super::clipping::{clip_polygon, rectangle_planes};
use super::gjk::{self, ConvexSupport, Support, TriangleSupport};

pub const MAX_MANIFOLD_POINTS: usize = 4;

/// One persisted-contact candidate: matching surface points on both bodies
/// and the penetration along the shared normal.
#[derive(Debug, Clone, Copy)]
pub struct ManifoldPoint {
    pub on_a: Vec3,
    pub on_b: Vec3,
    pub depth: f32,
}

/// Contact region between one leaf of shape A and one leaf of shape B.
/// The normal points from A towards B.
#[derive(Debug, Clone)]
pub struct Manifold {
    pub normal: Vec3,
    pub points: Vec<ManifoldPoint>,
    pub sub_shape_a: SubShapeId,
    pub sub_shape_b: SubShapeId,
}

/// Knobs observed by the narrowphase.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollideSettings {
    /// Recent tangential motion of body A relative to B. When set, contact
    /// normals landing on inactive mesh edges are re-projected onto the
    /// neighbouring face normal so bodies do not catch on interior seams.
    pub sliding_direction: Option<Vec3>,
}

/// Collides two posed shapes and appends one manifold per touching leaf
/// pair.
pub fn collide_shapes(
    shape_a: &Shape,
    transform_a: &Transform,
    shape_b: &Shape,
    transform_b: &Transform,
    settings: &CollideSettings,
    out: &mut Vec<Manifold>,
) {
    collide_shapes_scaled(
        shape_a,
        transform_a,
        Vec3::ONE,
        shape_b,
        transform_b,
        Vec3::ONE,
        settings,
        out,
    );
}

/// [`collide_shapes`] with root-level scales on both shapes.
#[allow(clippy::too_many_arguments)]
pub fn collide_shapes_scaled(
    shape_a: &Shape,
    transform_a: &Transform,
    root_scale_a: Vec3,
    shape_b: &Shape,
    transform_b: &Transform,
    root_scale_b: Vec3,
    settings: &CollideSettings,
    out: &mut Vec<Manifold>,
) {
    shape_a.for_each_leaf_scaled(
        transform_a,
        root_scale_a,
        &mut |leaf_a, leaf_ta, scale_a, builder_a| {
            shape_b.for_each_leaf_scaled(
                transform_b,
                root_scale_b,
                &mut |leaf_b, leaf_tb, scale_b, builder_b| {
                    collide_leaves(
                        &leaf_a, leaf_ta, scale_a, builder_a, &leaf_b, leaf_tb, scale_b,
                        builder_b, settings, out,
                    );
                    true
                },
            );
            true
        },
    );
}

#[allow(clippy::too_many_arguments)]
fn collide_leaves(
    leaf_a: &ShapeLeaf<'_>,
    ta: &Transform,
    scale_a: Vec3,
    builder_a: SubShapeIdBuilder,
    leaf_b: &ShapeLeaf<'_>,
    tb: &Transform,
    scale_b: Vec3,
    builder_b: SubShapeIdBuilder,
    settings: &CollideSettings,
    out: &mut Vec<Manifold>,
) {
    match (leaf_a, leaf_b) {
        (ShapeLeaf::Convex(a), ShapeLeaf::Convex(b)) => {
            if let Some(mut manifold) =
                collide_convex_convex(a, ta, scale_a, b, tb, scale_b)
            {
                manifold.sub_shape_a = builder_a.build();
                manifold.sub_shape_b = builder_b.build();
                out.push(manifold);
            }
        }
        (ShapeLeaf::Convex(a), ShapeLeaf::Mesh(mesh)) => {
            collide_convex_mesh(
                a, ta, scale_a, builder_a, mesh, tb, scale_b, builder_b, settings, false, out,
            );
        }
        (ShapeLeaf::Mesh(mesh), ShapeLeaf::Convex(b)) => {
            collide_convex_mesh(
                b, tb, scale_b, builder_b, mesh, ta, scale_a, builder_a, settings, true, out,
            );
        }
        (ShapeLeaf::Mesh(_), ShapeLeaf::Mesh(_)) => {
            log::debug!("mesh vs mesh collision is not supported; skipping leaf pair");
        }
    }
}

fn collide_convex_convex(
    shape_a: &Shape,
    ta: &Transform,
    scale_a: Vec3,
    shape_b: &Shape,
    tb: &Transform,
    scale_b: Vec3,
) -> Option<Manifold> {
    // Closed-form fast paths.
    match (shape_a, shape_b) {
        (Shape::Sphere { radius: ra }, Shape::Sphere { radius: rb }) => {
            return collide_spheres(
                ta.position,
                *ra * scale_a.abs().max_element(),
                tb.position,
                *rb * scale_b.abs().max_element(),
            );
        }
        (Shape::Sphere { radius }, Shape::Box { half_extents }) => {
            // The helper reports the sphere as manifold side A.
            return collide_sphere_box(
                ta.position,
                *radius * scale_a.abs().max_element(),
                tb,
                *half_extents * scale_b.abs(),
            );
        }
        (Shape::Box { half_extents }, Shape::Sphere { radius }) => {
            return collide_sphere_box(
                tb.position,
                *radius * scale_b.abs().max_element(),
                ta,
                *half_extents * scale_a.abs(),
            )
            .map(flip_manifold);
        }
        (Shape::Box { half_extents: ha }, Shape::Box { half_extents: hb }) => {
            return collide_boxes(ta, *ha * scale_a.abs(), tb, *hb * scale_b.abs());
        }
        _ => {}
    }

    // Generic convex pair through GJK/EPA.
    let support_a = ConvexSupport {
        shape: shape_a,
        transform: *ta,
        scale: scale_a,
    };
    let support_b = ConvexSupport {
        shape: shape_b,
        transform: *tb,
        scale: scale_b,
    };
    let simplex = gjk::gjk_intersect(&support_a, &support_b, tb.position - ta.position)?;
    let (depth, normal) = gjk::epa_penetration(&simplex, &support_a, &support_b);
    Some(single_point_manifold(&support_a, &support_b, normal, depth))
}

fn single_point_manifold(
    support_a: &dyn Support,
    support_b: &dyn Support,
    normal: Vec3,
    depth: f32,
) -> Manifold {
    let on_a = support_a.support(normal);
    let on_b = support_b.support(-normal);
    Manifold {
        normal,
        points: vec![ManifoldPoint { on_a, on_b, depth }],
        sub_shape_a: SubShapeId::EMPTY,
        sub_shape_b: SubShapeId::EMPTY,
    }
}

fn collide_spheres(ca: Vec3, ra: f32, cb: Vec3, rb: f32) -> Option<Manifold> {
    let delta = cb - ca;
    let dist_sq = delta.length_squared();
    let sum = ra + rb;
    if dist_sq >= sum * sum {
        return None;
    }
    let dist = dist_sq.sqrt();
    let normal = if dist > 1e-6 { delta / dist } else { Vec3::X };
    Some(Manifold {
        normal,
        points: vec![ManifoldPoint {
            on_a: ca + normal * ra,
            on_b: cb - normal * rb,
            depth: sum - dist,
        }],
        sub_shape_a: SubShapeId::EMPTY,
        sub_shape_b: SubShapeId::EMPTY,
    })
}

/// Sphere vs box with the sphere as shape A of the returned manifold.
fn collide_sphere_box(
    sphere_center: Vec3,
    radius: f32,
    box_transform: &Transform,
    half_extents: Vec3,
) -> Option<Manifold> {
    let local_center = box_transform.point_to_local(sphere_center);
    let clamped = local_center.clamp(-half_extents, half_extents);
    let delta = local_center - clamped;
    let dist_sq = delta.length_squared();

    if dist_sq > radius * radius {
        return None;
    }

    let (local_normal, depth, local_surface) = if dist_sq > 1e-12 {
        // Sphere center outside the box: push along the separation axis.
        let dist = dist_sq.sqrt();
        (delta / dist, radius - dist, clamped)
    } else {
        // Center inside the box: exit through the nearest face.
        let face_dist = half_extents - local_center.abs();
        let (axis, _) = [face_dist.x, face_dist.y, face_dist.z]
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, d)| (i, *d))
            .unwrap_or((1, 0.0));
        let mut normal = Vec3::ZERO;
        normal[axis] = local_center[axis].signum();
        if normal[axis] == 0.0 {
            normal[axis] = 1.0;
        }
        let mut surface = local_center;
        surface[axis] = half_extents[axis] * normal[axis];
        (normal, half_extents[axis] - local_center[axis].abs() + radius, surface)
    };

    // Normal from sphere towards box is the negated push direction.
    let world_push = box_transform.rotation * local_normal;
    let normal = -world_push;
    Some(Manifold {
        normal,
        points: vec![ManifoldPoint {
            on_a: sphere_center + normal * radius,
            on_b: box_transform.point_to_world(local_surface),
            depth,
        }],
        sub_shape_a: SubShapeId::EMPTY,
        sub_shape_b: SubShapeId::EMPTY,
    })
}

fn flip_manifold(mut manifold: Manifold) -> Manifold {
    manifold.normal = -manifold.normal;
    for point in &mut manifold.points {
        std::mem::swap(&mut point.on_a, &mut point.on_b);
    }
    std::mem::swap(&mut manifold.sub_shape_a, &mut manifold.sub_shape_b);
    manifold
}

#[derive(Clone, Copy)]
struct OrientedBox {
    center: Vec3,
    axes: [Vec3; 3],
    half_extents: Vec3,
}

impl OrientedBox {
    fn new(transform: &Transform, half_extents: Vec3) -> Self {
        let rot = Mat3::from_quat(transform.rotation);
        Self {
            center: transform.position,
            axes: [rot.x_axis, rot.y_axis, rot.z_axis],
            half_extents,
        }
    }

    fn project_radius(&self, axis: Vec3) -> f32 {
        self.half_extents.x * self.axes[0].dot(axis).abs()
            + self.half_extents.y * self.axes[1].dot(axis).abs()
            + self.half_extents.z * self.axes[2].dot(axis).abs()
    }
}

/// Box-box face contact through reference-face clipping; produces up to
/// four contact points so stacks stay stable.
fn collide_boxes(
    ta: &Transform,
    half_a: Vec3,
    tb: &Transform,
    half_b: Vec3,
) -> Option<Manifold> {
    let box_a = OrientedBox::new(ta, half_a);
    let box_b = OrientedBox::new(tb, half_b);

    // Find the face axis of least overlap; bail out on any separating face
    // axis. Edge-edge cases fall back to GJK-quality single points via the
    // clipped face, which is adequate at these margins.
    let center_diff = box_b.center - box_a.center;
    let mut best_overlap = f32::MAX;
    let mut reference_is_a = true;
    let mut axis_index = 0;
    let mut face_sign = 1.0;

    for i in 0..3 {
        let axis = box_a.axes[i];
        let overlap =
            box_a.half_extents[i] + box_b.project_radius(axis) - center_diff.dot(axis).abs();
        if overlap < 0.0 {
            return None;
        }
        if overlap < best_overlap {
            best_overlap = overlap;
            reference_is_a = true;
            axis_index = i;
            face_sign = if center_diff.dot(axis) >= 0.0 { 1.0 } else { -1.0 };
        }
    }
    for i in 0..3 {
        let axis = box_b.axes[i];
        let overlap =
            box_b.half_extents[i] + box_a.project_radius(axis) - center_diff.dot(axis).abs();
        if overlap < 0.0 {
            return None;
        }
        if overlap < best_overlap {
            best_overlap = overlap;
            reference_is_a = false;
            axis_index = i;
            face_sign = if (-center_diff).dot(axis) >= 0.0 { 1.0 } else { -1.0 };
        }
    }

    let (reference, incident) = if reference_is_a {
        (box_a, box_b)
    } else {
        (box_b, box_a)
    };

    let reference_normal = reference.axes[axis_index] * face_sign;
    let reference_center = reference.center
        + reference.axes[axis_index] * reference.half_extents[axis_index] * face_sign;

    // Face of the incident box most anti-parallel to the reference normal.
    let mut incident_axis = 0;
    let mut best_dot = -1.0;
    for i in 0..3 {
        let dot = incident.axes[i].dot(reference_normal).abs();
        if dot > best_dot {
            best_dot = dot;
            incident_axis = i;
        }
    }
    let incident_sign = if incident.axes[incident_axis].dot(reference_normal) <= 0.0 {
        1.0
    } else {
        -1.0
    };
    let incident_center = incident.center
        + incident.axes[incident_axis] * incident.half_extents[incident_axis] * incident_sign;
    let (u_idx, v_idx) = other_axes(incident_axis);
    let iu = incident.axes[u_idx] * incident.half_extents[u_idx];
    let iv = incident.axes[v_idx] * incident.half_extents[v_idx];
    let incident_face = [
        incident_center + iu + iv,
        incident_center + iu - iv,
        incident_center - iu - iv,
        incident_center - iu + iv,
    ];

    let (ru_idx, rv_idx) = other_axes(axis_index);
    let planes = rectangle_planes(
        reference_center,
        reference.axes[ru_idx],
        reference.axes[rv_idx],
        reference.half_extents[ru_idx],
        reference.half_extents[rv_idx],
    );
    let clipped = clip_polygon(&incident_face, &planes);
    if clipped.is_empty() {
        return None;
    }

    let mut points = Vec::new();
    for point in clipped {
        let depth = (reference_center - point).dot(reference_normal);
        if depth <= 0.0 {
            continue;
        }
        let on_reference = point + reference_normal * depth;
        let (on_a, on_b) = if reference_is_a {
            (on_reference, point)
        } else {
            (point, on_reference)
        };
        points.push(ManifoldPoint { on_a, on_b, depth });
    }
    if points.is_empty() {
        return None;
    }

    let normal = if reference_is_a {
        reference_normal
    } else {
        -reference_normal
    };
    let points = reduce_points(points, normal);
    Some(Manifold {
        normal,
        points,
        sub_shape_a: SubShapeId::EMPTY,
        sub_shape_b: SubShapeId::EMPTY,
    })
}

fn other_axes(axis: usize) -> (usize, usize) {
    match axis {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    }
}

/// Keeps at most [`MAX_MANIFOLD_POINTS`] points: the deepest one plus the
/// ones maximizing tangential spread (and therefore contact area).
pub fn reduce_points(mut points: Vec<ManifoldPoint>, normal: Vec3) -> Vec<ManifoldPoint> {
    if points.len() <= MAX_MANIFOLD_POINTS {
        return points;
    }

    points.sort_unstable_by(|a, b| {
        b.depth
            .partial_cmp(&a.depth)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut selected: Vec<ManifoldPoint> = vec![points[0]];
    while selected.len() < MAX_MANIFOLD_POINTS {
        let mut best_index = None;
        let mut best_score = f32::NEG_INFINITY;
        for (index, candidate) in points.iter().enumerate() {
            if selected
                .iter()
                .any(|s| (s.on_b - candidate.on_b).length_squared() < 1e-10)
            {
                continue;
            }
            let mut min_spread = f32::MAX;
            for existing in &selected {
                let diff = candidate.on_b - existing.on_b;
                let tangential = diff - normal * diff.dot(normal);
                min_spread = min_spread.min(tangential.length());
            }
            let score = min_spread + candidate.depth;
            if score > best_score {
                best_score = score;
                best_index = Some(index);
            }
        }
        match best_index {
            Some(index) => selected.push(points[index]),
            None => break,
        }
    }
    selected
}

#[allow(clippy::too_many_arguments)]
fn collide_convex_mesh(
    convex: &Shape,
    convex_transform: &Transform,
    convex_scale: Vec3,
    convex_builder: SubShapeIdBuilder,
    mesh: &TriangleMesh,
    mesh_transform: &Transform,
    mesh_scale: Vec3,
    mesh_builder: SubShapeIdBuilder,
    settings: &CollideSettings,
    mesh_is_a: bool,
    out: &mut Vec<Manifold>,
) {
    // Conservative convex bounds in mesh-local space.
    let convex_world = convex
        .local_aabb()
        .scaled(convex_scale)
        .transformed(convex_transform);
    let inv = mesh_transform.inverse();
    let local_query = convex_world
        .transformed(&inv)
        .scaled(Vec3::ONE / mesh_scale)
        .expanded(1e-3);

    let convex_support = ConvexSupport {
        shape: convex,
        transform: *convex_transform,
        scale: convex_scale,
    };
    let tri_bits = mesh.sub_shape_bits();

    mesh.for_each_triangle_in_aabb(&local_query, |tri_index| {
        let local = mesh.triangle(tri_index);
        let world = [
            mesh_transform.point_to_world(local[0] * mesh_scale),
            mesh_transform.point_to_world(local[1] * mesh_scale),
            mesh_transform.point_to_world(local[2] * mesh_scale),
        ];
        let triangle = TriangleSupport { vertices: world };

        let tri_center = (world[0] + world[1] + world[2]) / 3.0;
        let Some(simplex) = gjk::gjk_intersect(
            &convex_support,
            &triangle,
            tri_center - convex_transform.position,
        ) else {
            return true;
        };
        // Normal from the convex shape towards the triangle.
        let (depth, mut normal) = gjk::epa_penetration(&simplex, &convex_support, &triangle);

        // Face normal in world space, oriented against the convex shape.
        let face_normal = {
            let n = (world[1] - world[0]).cross(world[2] - world[0]).normalize_or_zero();
            if n.dot(normal) < 0.0 {
                -n
            } else {
                n
            }
        };

        if settings.sliding_direction.is_some()
            && normal.dot(face_normal) < ACTIVE_EDGE_COS_THRESHOLD
        {
            // The reported normal deviates from the face; if the closest
            // edge is an interior seam, trust the face normal instead.
            let contact = convex_support.support(normal);
            if !nearest_edge_is_active(mesh, tri_index, &local, inv.point_to_world(contact)) {
                normal = face_normal;
            }
        }

        let on_convex = convex_support.support(normal);
        let on_triangle = on_convex - normal * depth;

        let mut tri_builder = mesh_builder;
        if tri_builder.push_back(tri_index, tri_bits).is_err() {
            log::debug!("sub-shape id budget exhausted addressing mesh triangle");
            return true;
        }

        let manifold = if mesh_is_a {
            Manifold {
                normal: -normal,
                points: vec![ManifoldPoint {
                    on_a: on_triangle,
                    on_b: on_convex,
                    depth,
                }],
                sub_shape_a: tri_builder.build(),
                sub_shape_b: convex_builder.build(),
            }
        } else {
            Manifold {
                normal,
                points: vec![ManifoldPoint {
                    on_a: on_convex,
                    on_b: on_triangle,
                    depth,
                }],
                sub_shape_a: convex_builder.build(),
                sub_shape_b: tri_builder.build(),
            }
        };
        out.push(manifold);
        true
    });
}

/// Finds the triangle edge nearest to a mesh-local point and reports
/// whether it is active.
fn nearest_edge_is_active(
    mesh: &TriangleMesh,
    triangle: u32,
    verts: &[Vec3; 3],
    local_point: Vec3,
) -> bool {
    let mut best_edge = 0;
    let mut best_dist = f32::MAX;
    for edge in 0..3 {
        let a = verts[edge];
        let b = verts[(edge + 1) % 3];
        let ab = b - a;
        let t = ((local_point - a).dot(ab) / ab.length_squared().max(1e-12)).clamp(0.0, 1.0);
        let dist = (local_point - (a + ab * t)).length_squared();
        if dist < best_dist {
            best_dist = dist;
            best_edge = edge;
        }
    }
    mesh.edge_active(triangle, best_edge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn manifold_between(
        shape_a: &Shape,
        pos_a: Vec3,
        shape_b: &Shape,
        pos_b: Vec3,
    ) -> Vec<Manifold> {
        let mut out = Vec::new();
        collide_shapes(
            shape_a,
            &Transform::from_position(pos_a),
            shape_b,
            &Transform::from_position(pos_b),
            &CollideSettings::default(),
            &mut out,
        );
        out
    }

    #[test]
    fn sphere_sphere_depth_and_normal() {
        let sphere = Shape::sphere(1.0).unwrap();
        let manifolds =
            manifold_between(&sphere, Vec3::ZERO, &sphere, Vec3::new(1.5, 0.0, 0.0));
        assert_eq!(manifolds.len(), 1);
        let m = &manifolds[0];
        assert!((m.points[0].depth - 0.5).abs() < 1e-4);
        assert!(m.normal.x > 0.99);
        assert!((m.points[0].on_a.x - 1.0).abs() < 1e-4);
        assert!((m.points[0].on_b.x - 0.5).abs() < 1e-4);
    }

    #[test]
    fn separated_spheres_produce_nothing() {
        let sphere = Shape::sphere(1.0).unwrap();
        let manifolds =
            manifold_between(&sphere, Vec3::ZERO, &sphere, Vec3::new(3.0, 0.0, 0.0));
        assert!(manifolds.is_empty());
    }

    #[test]
    fn sphere_resting_on_box_points_down() {
        let sphere = Shape::sphere(0.5).unwrap();
        let floor = Shape::cuboid(Vec3::new(10.0, 0.5, 10.0)).unwrap();
        // Sphere slightly sunk into the floor top at y = 0.95.
        let manifolds =
            manifold_between(&sphere, Vec3::new(0.0, 0.95, 0.0), &floor, Vec3::ZERO);
        assert_eq!(manifolds.len(), 1);
        let m = &manifolds[0];
        assert!(m.normal.y < -0.99, "normal was {:?}", m.normal);
        assert!((m.points[0].depth - 0.05).abs() < 1e-3);
    }

    #[test]
    fn stacked_boxes_make_a_multi_point_manifold() {
        let unit = Shape::cuboid(Vec3::splat(0.5)).unwrap();
        // Top box overlapping the bottom by 0.02.
        let manifolds =
            manifold_between(&unit, Vec3::new(0.0, 0.98, 0.0), &unit, Vec3::ZERO);
        assert_eq!(manifolds.len(), 1);
        let m = &manifolds[0];
        assert!(m.points.len() >= 3, "got {} points", m.points.len());
        assert!(m.normal.y < -0.99);
        for p in &m.points {
            assert!((p.depth - 0.02).abs() < 1e-3);
        }
    }

    #[test]
    fn rotated_boxes_still_collide() {
        let unit = Shape::cuboid(Vec3::ONE).unwrap();
        let mut out = Vec::new();
        collide_shapes(
            &unit,
            &Transform::new(Vec3::ZERO, Quat::from_rotation_z(45f32.to_radians())),
            &unit,
            &Transform::from_position(Vec3::new(2.1, 0.0, 0.0)),
            &CollideSettings::default(),
            &mut out,
        );
        assert!(!out.is_empty());
        assert!(out[0].normal.x.abs() > 0.7);
    }

    #[test]
    fn capsule_box_fall_back_to_gjk() {
        let capsule = Shape::capsule(0.5, 0.5).unwrap();
        let floor = Shape::cuboid(Vec3::new(5.0, 0.5, 5.0)).unwrap();
        let manifolds =
            manifold_between(&capsule, Vec3::new(0.0, 1.4, 0.0), &floor, Vec3::ZERO);
        assert_eq!(manifolds.len(), 1);
        assert!(manifolds[0].normal.y < -0.9);
    }

    #[test]
    fn sphere_touching_mesh_ground_collides_per_triangle() {
        let mesh = TriangleMesh::builder(
            vec![
                Vec3::new(-5.0, 0.0, -5.0),
                Vec3::new(5.0, 0.0, -5.0),
                Vec3::new(5.0, 0.0, 5.0),
                Vec3::new(-5.0, 0.0, 5.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
        .build()
        .unwrap();
        let ground = Shape::mesh(mesh);
        let sphere = Shape::sphere(0.5).unwrap();

        let manifolds =
            manifold_between(&sphere, Vec3::new(1.0, 0.45, 1.0), &ground, Vec3::ZERO);
        assert!(!manifolds.is_empty());
        for m in &manifolds {
            assert!(m.normal.y < -0.9, "normal was {:?}", m.normal);
        }
    }

    #[test]
    fn manifold_reduction_keeps_deepest_point() {
        let mut points = Vec::new();
        for i in 0..8 {
            let angle = i as f32 * std::f32::consts::TAU / 8.0;
            points.push(ManifoldPoint {
                on_a: Vec3::new(angle.cos(), 0.0, angle.sin()),
                on_b: Vec3::new(angle.cos(), -0.01, angle.sin()),
                depth: if i == 3 { 0.5 } else { 0.01 },
            });
        }
        let reduced = reduce_points(points, Vec3::Y);
        assert_eq!(reduced.len(), MAX_MANIFOLD_POINTS);
        assert!(reduced.iter().any(|p| (p.depth - 0.5).abs() < 1e-6));
    }
}
