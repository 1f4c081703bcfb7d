//! Convex collision kernels: GJK intersection, EPA penetration depth, and a
//! distance variant of GJK with witness points used by shape casts and
//! closest-point queries.

use glam::Vec3;

use crate::core::shape::{scaled_support, Shape};
use crate::core::types::Transform;

const GJK_MAX_ITERATIONS: usize = 32;
const GJK_EPSILON: f32 = 1e-6;
const EPA_MAX_ITERATIONS: usize = 32;

/// World-space support function over a convex volume.
pub trait Support {
    fn support(&self, direction: Vec3) -> Vec3;
}

/// A convex shape leaf posed in world space with a component-wise scale.
#[derive(Clone, Copy)]
pub struct ConvexSupport<'a> {
    pub shape: &'a Shape,
    pub transform: Transform,
    pub scale: Vec3,
}

impl Support for ConvexSupport<'_> {
    fn support(&self, direction: Vec3) -> Vec3 {
        let local_dir = self.transform.direction_to_local(direction);
        self.transform
            .point_to_world(scaled_support(self.shape, self.scale, local_dir))
    }
}

/// A world-space triangle treated as a (flat) convex volume.
#[derive(Clone, Copy)]
pub struct TriangleSupport {
    pub vertices: [Vec3; 3],
}

impl Support for TriangleSupport {
    fn support(&self, direction: Vec3) -> Vec3 {
        let mut best = self.vertices[0];
        let mut best_dot = best.dot(direction);
        for &v in &self.vertices[1..] {
            let d = v.dot(direction);
            if d > best_dot {
                best_dot = d;
                best = v;
            }
        }
        best
    }
}

/// A single point.
#[derive(Clone, Copy)]
pub struct PointSupport(pub Vec3);

impl Support for PointSupport {
    fn support(&self, _direction: Vec3) -> Vec3 {
        self.0
    }
}

/// A support translated by a fixed offset (used by shape casts to slide a
/// shape along its sweep without rebuilding transforms).
pub struct OffsetSupport<'a> {
    pub inner: &'a dyn Support,
    pub offset: Vec3,
}

impl Support for OffsetSupport<'_> {
    fn support(&self, direction: Vec3) -> Vec3 {
        self.inner.support(direction) + self.offset
    }
}

/// Boolean GJK over the configuration-space obstacle `A - B`. On overlap the
/// final simplex (a tetrahedron enclosing the origin) is returned for EPA.
pub fn gjk_intersect(a: &dyn Support, b: &dyn Support, initial_dir: Vec3) -> Option<Vec<Vec3>> {
    let mut direction = if initial_dir.length_squared() < GJK_EPSILON {
        Vec3::X
    } else {
        initial_dir
    };
    let mut simplex: Vec<Vec3> = Vec::with_capacity(4);

    for _ in 0..GJK_MAX_ITERATIONS {
        let point = a.support(direction) - b.support(-direction);
        if point.dot(direction) < 0.0 {
            return None;
        }
        simplex.push(point);
        if next_simplex(&mut simplex, &mut direction) {
            return Some(simplex);
        }
    }

    log::debug!("gjk failed to converge; treating pair as non-colliding");
    None
}

/// Advances the simplex towards enclosing the origin. Returns true once a
/// tetrahedron contains it.
fn next_simplex(simplex: &mut Vec<Vec3>, direction: &mut Vec3) -> bool {
    match simplex.len() {
        1 => {
            *direction = -simplex[0];
            false
        }
        2 => {
            let a = simplex[1];
            let b = simplex[0];
            let ab = b - a;
            let ao = -a;
            let dir = ab.cross(ao).cross(ab);
            if dir.length_squared() < GJK_EPSILON {
                // Origin lies on the segment; pick any perpendicular.
                let axis = if ab.x.abs() < 0.57 { Vec3::X } else { Vec3::Y };
                *direction = ab.cross(axis);
            } else {
                *direction = dir;
            }
            false
        }
        3 => {
            let a = simplex[2];
            let b = simplex[1];
            let c = simplex[0];
            let ab = b - a;
            let ac = c - a;
            let ao = -a;
            let abc = ab.cross(ac);

            if abc.cross(ac).dot(ao) > 0.0 {
                simplex.remove(1);
                *direction = ac.cross(ao).cross(ac);
            } else if ab.cross(abc).dot(ao) > 0.0 {
                simplex.remove(0);
                *direction = ab.cross(ao).cross(ab);
            } else if abc.length_squared() < GJK_EPSILON {
                *direction = Vec3::Y;
            } else if abc.dot(ao) > 0.0 {
                *direction = abc;
            } else {
                *direction = -abc;
            }
            false
        }
        _ => {
            let a = simplex[3];
            let b = simplex[2];
            let c = simplex[1];
            let d = simplex[0];
            let ab = b - a;
            let ac = c - a;
            let ad = d - a;
            let ao = -a;
            let abc = ab.cross(ac);
            let acd = ac.cross(ad);
            let adb = ad.cross(ab);

            if abc.dot(ao) > 0.0 {
                simplex.remove(0);
                *direction = abc;
                false
            } else if acd.dot(ao) > 0.0 {
                simplex.remove(2);
                *direction = acd;
                false
            } else if adb.dot(ao) > 0.0 {
                simplex.remove(1);
                *direction = adb;
                false
            } else {
                true
            }
        }
    }
}

/// Expanding Polytope Algorithm: penetration depth and the world normal
/// pointing from shape A towards shape B.
pub fn epa_penetration(simplex: &[Vec3], a: &dyn Support, b: &dyn Support) -> (f32, Vec3) {
    if simplex.len() < 4 {
        log::debug!("epa received a degenerate simplex; using fallback normal");
        return (GJK_EPSILON, fallback_normal(a, b));
    }

    let mut polytope = simplex.to_vec();
    let mut faces = initial_faces(&polytope);

    for _ in 0..EPA_MAX_ITERATIONS {
        let Some((min_dist, normal)) = closest_face(&polytope, &faces) else {
            log::debug!("epa lost all faces; using fallback normal");
            return (GJK_EPSILON, fallback_normal(a, b));
        };

        if min_dist < GJK_EPSILON {
            return (GJK_EPSILON, normal);
        }

        let support = a.support(normal) - b.support(-normal);
        let distance = support.dot(normal);
        if distance - min_dist < GJK_EPSILON {
            return (min_dist, normal);
        }
        expand_polytope(&mut polytope, &mut faces, support);
    }

    match closest_face(&polytope, &faces) {
        Some((dist, normal)) => (dist, normal),
        None => (GJK_EPSILON, fallback_normal(a, b)),
    }
}

fn fallback_normal(a: &dyn Support, b: &dyn Support) -> Vec3 {
    // Center-to-center estimate from opposing supports.
    let delta = (b.support(Vec3::X) + b.support(Vec3::NEG_X))
        - (a.support(Vec3::X) + a.support(Vec3::NEG_X));
    let n = delta.normalize_or_zero();
    if n == Vec3::ZERO {
        Vec3::Y
    } else {
        n
    }
}

fn initial_faces(polytope: &[Vec3]) -> Vec<(usize, usize, usize)> {
    let mut faces = vec![(0, 1, 2), (0, 2, 3), (0, 3, 1), (1, 3, 2)];
    for face in &mut faces {
        let ab = polytope[face.1] - polytope[face.0];
        let ac = polytope[face.2] - polytope[face.0];
        let normal = ab.cross(ac);
        if polytope[face.0].dot(normal) < 0.0 {
            std::mem::swap(&mut face.1, &mut face.2);
        }
    }
    faces
}

fn closest_face(polytope: &[Vec3], faces: &[(usize, usize, usize)]) -> Option<(f32, Vec3)> {
    let mut min_dist = f32::MAX;
    let mut min_normal = Vec3::ZERO;
    for &(a, b, c) in faces {
        let ab = polytope[b] - polytope[a];
        let ac = polytope[c] - polytope[a];
        let normal = ab.cross(ac).normalize_or_zero();
        if normal == Vec3::ZERO {
            continue;
        }
        let dist = polytope[a].dot(normal);
        if dist < min_dist {
            min_dist = dist;
            min_normal = normal;
        }
    }
    if min_dist >= f32::MAX * 0.5 {
        None
    } else {
        Some((min_dist, min_normal))
    }
}

fn expand_polytope(polytope: &mut Vec<Vec3>, faces: &mut Vec<(usize, usize, usize)>, support: Vec3) {
    let new_index = polytope.len();
    polytope.push(support);

    // Remove every face visible from the new point, collecting its edges.
    let mut edges: Vec<(usize, usize)> = Vec::new();
    let mut i = 0;
    while i < faces.len() {
        let (a, b, c) = faces[i];
        let ab = polytope[b] - polytope[a];
        let ac = polytope[c] - polytope[a];
        let normal = ab.cross(ac).normalize_or_zero();
        if normal.dot(support - polytope[a]) > 0.0 {
            edges.push((a, b));
            edges.push((b, c));
            edges.push((c, a));
            faces.swap_remove(i);
        } else {
            i += 1;
        }
    }

    // Keep only the horizon: edges not shared by two removed faces.
    let mut horizon: Vec<(usize, usize)> = Vec::new();
    for (u, v) in edges {
        if let Some(pos) = horizon.iter().position(|&e| e == (v, u)) {
            horizon.remove(pos);
        } else {
            horizon.push((u, v));
        }
    }

    for (u, v) in horizon {
        faces.push((u, v, new_index));
    }
}

/// Closest points between two non-overlapping convex volumes.
#[derive(Debug, Clone, Copy)]
pub struct ClosestResult {
    pub distance: f32,
    pub point_a: Vec3,
    pub point_b: Vec3,
}

impl ClosestResult {
    /// Unit direction from A's witness point towards B's.
    pub fn normal(&self) -> Vec3 {
        let n = (self.point_b - self.point_a).normalize_or_zero();
        if n == Vec3::ZERO {
            Vec3::Y
        } else {
            n
        }
    }
}

#[derive(Clone, Copy)]
struct SimplexVertex {
    w: Vec3,
    a: Vec3,
    b: Vec3,
}

/// Distance GJK: returns the closest points between two convex volumes, or
/// `None` when they overlap (use [`gjk_intersect`] + [`epa_penetration`]
/// for the penetrating case).
pub fn gjk_closest(a: &dyn Support, b: &dyn Support, initial_dir: Vec3) -> Option<ClosestResult> {
    let mut direction = if initial_dir.length_squared() < GJK_EPSILON {
        Vec3::X
    } else {
        initial_dir
    };

    let mut simplex: Vec<SimplexVertex> = vec![support_vertex(a, b, direction)];

    for _ in 0..GJK_MAX_ITERATIONS {
        let (point, bary) = closest_on_simplex(&simplex);
        let dist_sq = point.length_squared();
        if dist_sq < GJK_EPSILON * GJK_EPSILON {
            return None; // origin reached: overlapping or touching
        }
        reduce_simplex(&mut simplex, &bary);

        direction = -point;
        let candidate = support_vertex(a, b, direction);
        // Convergence: the new support gets us no closer to the origin.
        if dist_sq - candidate.w.dot(point) <= GJK_EPSILON * dist_sq.max(1.0) {
            return finish_closest(&simplex);
        }
        simplex.push(candidate);
        if simplex.len() == 4 && tetra_contains_origin(&simplex) {
            return None;
        }
    }

    finish_closest(&simplex)
}

fn finish_closest(simplex: &[SimplexVertex]) -> Option<ClosestResult> {
    let (point, bary) = closest_on_simplex(simplex);
    let distance = point.length();
    if distance < GJK_EPSILON {
        return None;
    }
    let (point_a, point_b) = witness_points(simplex, &bary);
    Some(ClosestResult {
        distance,
        point_a,
        point_b,
    })
}

fn tetra_contains_origin(simplex: &[SimplexVertex]) -> bool {
    const FACES: [[usize; 4]; 4] = [
        [0, 1, 2, 3],
        [0, 1, 3, 2],
        [0, 2, 3, 1],
        [1, 2, 3, 0],
    ];
    for [i, j, k, opposite] in FACES {
        let wi = simplex[i].w;
        let mut normal = (simplex[j].w - wi).cross(simplex[k].w - wi);
        if normal.dot(simplex[opposite].w - wi) > 0.0 {
            normal = -normal; // make it outward
        }
        if normal.dot(-wi) > 0.0 {
            return false; // origin on the outside of this face
        }
    }
    true
}

fn support_vertex(a: &dyn Support, b: &dyn Support, direction: Vec3) -> SimplexVertex {
    let pa = a.support(direction);
    let pb = b.support(-direction);
    SimplexVertex {
        w: pa - pb,
        a: pa,
        b: pb,
    }
}

/// Closest point to the origin on the current simplex, with barycentric
/// weights over the simplex vertices (zero weight = removable vertex).
fn closest_on_simplex(simplex: &[SimplexVertex]) -> (Vec3, Vec<f32>) {
    match simplex.len() {
        1 => (simplex[0].w, vec![1.0]),
        2 => {
            let (p, s, t) = closest_on_segment(simplex[0].w, simplex[1].w);
            (p, vec![s, t])
        }
        3 => {
            let (p, bary) = closest_on_triangle(simplex[0].w, simplex[1].w, simplex[2].w);
            (p, bary.to_vec())
        }
        _ => {
            // Closest over the four faces of the tetrahedron.
            let mut best = (Vec3::ZERO, vec![0.0; 4]);
            let mut best_dist = f32::MAX;
            const FACES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
            for face in FACES {
                let (p, bary) = closest_on_triangle(
                    simplex[face[0]].w,
                    simplex[face[1]].w,
                    simplex[face[2]].w,
                );
                let d = p.length_squared();
                if d < best_dist {
                    best_dist = d;
                    let mut weights = vec![0.0; 4];
                    for (slot, &vert) in face.iter().enumerate() {
                        weights[vert] = bary[slot];
                    }
                    best = (p, weights);
                }
            }
            best
        }
    }
}

fn closest_on_segment(a: Vec3, b: Vec3) -> (Vec3, f32, f32) {
    let ab = b - a;
    let denom = ab.length_squared();
    if denom < 1e-12 {
        return (a, 1.0, 0.0);
    }
    let t = (-a.dot(ab) / denom).clamp(0.0, 1.0);
    (a + ab * t, 1.0 - t, t)
}

/// Closest point to the origin on triangle abc (Ericson, RTCD 5.1.5).
fn closest_on_triangle(a: Vec3, b: Vec3, c: Vec3) -> (Vec3, [f32; 3]) {
    let ab = b - a;
    let ac = c - a;
    let ap = -a;

    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return (a, [1.0, 0.0, 0.0]);
    }

    let bp = -b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return (b, [0.0, 1.0, 0.0]);
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return (a + ab * v, [1.0 - v, v, 0.0]);
    }

    let cp = -c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return (c, [0.0, 0.0, 1.0]);
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return (a + ac * w, [1.0 - w, 0.0, w]);
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return (b + (c - b) * w, [0.0, 1.0 - w, w]);
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    (a + ab * v + ac * w, [1.0 - v - w, v, w])
}

fn reduce_simplex(simplex: &mut Vec<SimplexVertex>, bary: &[f32]) {
    if simplex.len() <= 1 {
        return;
    }
    // Keep the heaviest vertex unconditionally so the simplex never empties.
    let heaviest = bary
        .iter()
        .enumerate()
        .max_by(|x, y| x.1.partial_cmp(y.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let mut slot = 0;
    simplex.retain(|_| {
        let keep = bary[slot] > 1e-7 || slot == heaviest;
        slot += 1;
        keep
    });
}

fn witness_points(simplex: &[SimplexVertex], bary: &[f32]) -> (Vec3, Vec3) {
    let mut point_a = Vec3::ZERO;
    let mut point_b = Vec3::ZERO;
    let mut total = 0.0;
    for (vertex, &weight) in simplex.iter().zip(bary) {
        point_a += vertex.a * weight;
        point_b += vertex.b * weight;
        total += weight;
    }
    if total > 1e-9 {
        point_a /= total;
        point_b /= total;
    }
    (point_a, point_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere_at(center: Vec3, radius: f32) -> (Shape, Transform) {
        (
            Shape::sphere(radius).unwrap(),
            Transform::from_position(center),
        )
    }

    fn convex<'a>(shape: &'a Shape, transform: &Transform) -> ConvexSupport<'a> {
        ConvexSupport {
            shape,
            transform: *transform,
            scale: Vec3::ONE,
        }
    }

    #[test]
    fn overlapping_spheres_intersect_with_expected_depth() {
        let (sa, ta) = sphere_at(Vec3::ZERO, 1.0);
        let (sb, tb) = sphere_at(Vec3::new(1.5, 0.0, 0.0), 1.0);
        let a = convex(&sa, &ta);
        let b = convex(&sb, &tb);

        let simplex = gjk_intersect(&a, &b, tb.position - ta.position)
            .expect("overlapping spheres should intersect");
        let (depth, normal) = epa_penetration(&simplex, &a, &b);
        assert!((depth - 0.5).abs() < 0.05, "depth was {depth}");
        assert!(normal.x > 0.9, "normal was {normal:?}");
    }

    #[test]
    fn separated_spheres_report_distance_and_witnesses() {
        let (sa, ta) = sphere_at(Vec3::ZERO, 1.0);
        let (sb, tb) = sphere_at(Vec3::new(4.0, 0.0, 0.0), 1.0);
        let a = convex(&sa, &ta);
        let b = convex(&sb, &tb);

        let closest = gjk_closest(&a, &b, tb.position - ta.position)
            .expect("separated spheres should report a distance");
        assert!((closest.distance - 2.0).abs() < 1e-3);
        assert!((closest.point_a.x - 1.0).abs() < 1e-2);
        assert!((closest.point_b.x - 3.0).abs() < 1e-2);
        assert!(closest.normal().x > 0.99);
    }

    #[test]
    fn overlapping_boxes_have_no_closest_distance() {
        let shape = Shape::cuboid(Vec3::ONE).unwrap();
        let ta = Transform::default();
        let tb = Transform::from_position(Vec3::new(1.0, 0.0, 0.0));
        let a = convex(&shape, &ta);
        let b = convex(&shape, &tb);
        assert!(gjk_closest(&a, &b, Vec3::X).is_none());
    }

    #[test]
    fn point_vs_box_distance() {
        let shape = Shape::cuboid(Vec3::ONE).unwrap();
        let t = Transform::default();
        let bx = convex(&shape, &t);
        let point = PointSupport(Vec3::new(3.0, 0.0, 0.0));
        let closest = gjk_closest(&point, &bx, Vec3::NEG_X).unwrap();
        assert!((closest.distance - 2.0).abs() < 1e-3);
    }

    #[test]
    fn separated_boxes_distance_along_diagonal() {
        let shape = Shape::cuboid(Vec3::ONE).unwrap();
        let ta = Transform::default();
        let tb = Transform::from_position(Vec3::new(3.0, 3.0, 0.0));
        let a = convex(&shape, &ta);
        let b = convex(&shape, &tb);
        let closest = gjk_closest(&a, &b, Vec3::ONE).unwrap();
        // Corner (1,1,0..) to corner (2,2,..): sqrt(2).
        assert!((closest.distance - std::f32::consts::SQRT_2).abs() < 1e-2);
    }
}
