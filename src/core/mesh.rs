use std::collections::HashMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::ACTIVE_EDGE_COS_THRESHOLD;
use crate::error::PhysicsError;

use super::aabb::Aabb;
use super::sub_shape::SubShapeId;

const BVH_LEAF_SIZE: usize = 4;

/// Node of the triangle-mesh BVH. `count > 0` marks a leaf owning a range of
/// `tri_order`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshBvhNode {
    pub bounds: Aabb,
    pub left: u32,
    pub right: u32,
    pub start: u32,
    pub count: u32,
}

/// Immutable triangle mesh with a BVH over its triangles and per-edge
/// activity flags cooked at build time.
///
/// Edges shared by two near-coplanar triangles are marked inactive; contact
/// normals reported on them get re-projected onto a neighbouring face so
/// sliding bodies do not catch on the seams of tessellated flat ground.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriangleMesh {
    vertices: Vec<Vec3>,
    indices: Vec<[u32; 3]>,
    face_normals: Vec<Vec3>,
    /// Three bits per triangle; bit `e` set means edge `v[e] -> v[e+1]` is
    /// active (an exterior or sharp edge).
    active_edges: Vec<u8>,
    bounds: Aabb,
    nodes: Vec<MeshBvhNode>,
    tri_order: Vec<u32>,
}

impl TriangleMesh {
    pub fn builder(vertices: Vec<Vec3>, indices: Vec<[u32; 3]>) -> MeshBuilder {
        MeshBuilder::new(vertices, indices)
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle(&self, index: u32) -> [Vec3; 3] {
        let tri = self.indices[index as usize];
        [
            self.vertices[tri[0] as usize],
            self.vertices[tri[1] as usize],
            self.vertices[tri[2] as usize],
        ]
    }

    /// Face normal of the triangle addressed by `index`; the averaged mesh
    /// normal when the index is out of range.
    pub fn face_normal(&self, index: u32) -> Vec3 {
        match self.face_normals.get(index as usize) {
            Some(normal) => *normal,
            None => {
                let sum: Vec3 = self.face_normals.iter().copied().sum();
                sum.normalize_or_zero()
            }
        }
    }

    pub fn edge_active(&self, triangle: u32, edge: usize) -> bool {
        debug_assert!(edge < 3);
        self.active_edges
            .get(triangle as usize)
            .map(|bits| bits & (1 << edge) != 0)
            .unwrap_or(true)
    }

    /// Number of sub-shape id bits consumed by this mesh.
    pub fn sub_shape_bits(&self) -> u32 {
        SubShapeId::bits_for(self.indices.len())
    }

    /// Visits every triangle whose bounds intersect `query`, until the
    /// visitor returns `false`.
    pub fn for_each_triangle_in_aabb(&self, query: &Aabb, mut visitor: impl FnMut(u32) -> bool) {
        if self.nodes.is_empty() {
            return;
        }
        let mut stack = vec![0u32];
        while let Some(node_index) = stack.pop() {
            let node = &self.nodes[node_index as usize];
            if !node.bounds.intersects(query) {
                continue;
            }
            if node.count > 0 {
                for slot in node.start..node.start + node.count {
                    let tri = self.tri_order[slot as usize];
                    let verts = self.triangle(tri);
                    if Aabb::from_points(&verts).intersects(query) && !visitor(tri) {
                        return;
                    }
                }
            } else {
                stack.push(node.left);
                stack.push(node.right);
            }
        }
    }

    /// Closest ray hit in mesh-local space: `(t, triangle_index)`.
    pub fn raycast(&self, origin: Vec3, direction: Vec3, max_t: f32) -> Option<(f32, u32)> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut best: Option<(f32, u32)> = None;
        let mut limit = max_t;
        let mut stack = vec![0u32];
        while let Some(node_index) = stack.pop() {
            let node = &self.nodes[node_index as usize];
            if node.bounds.ray_entry(origin, direction, limit).is_none() {
                continue;
            }
            if node.count > 0 {
                for slot in node.start..node.start + node.count {
                    let tri = self.tri_order[slot as usize];
                    let [v0, v1, v2] = self.triangle(tri);
                    if let Some(t) = ray_triangle(origin, direction, v0, v1, v2) {
                        if t <= limit {
                            limit = t;
                            best = Some((t, tri));
                        }
                    }
                }
            } else {
                stack.push(node.left);
                stack.push(node.right);
            }
        }
        best
    }
}

/// Möller–Trumbore ray/triangle intersection; returns the ray parameter.
pub fn ray_triangle(origin: Vec3, dir: Vec3, v0: Vec3, v1: Vec3, v2: Vec3) -> Option<f32> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let pvec = dir.cross(edge2);
    let det = edge1.dot(pvec);
    if det.abs() < 1e-9 {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = origin - v0;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(edge1);
    let v = dir.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(qvec) * inv_det;
    if t < 0.0 {
        return None;
    }
    Some(t)
}

/// Cooks triangle meshes from raw vertex/index buffers.
#[derive(Debug, Clone)]
pub struct MeshBuilder {
    vertices: Vec<Vec3>,
    indices: Vec<[u32; 3]>,
}

impl MeshBuilder {
    pub fn new(vertices: Vec<Vec3>, indices: Vec<[u32; 3]>) -> Self {
        Self { vertices, indices }
    }

    /// Deduplicates vertices using a quantized grid for stability.
    pub fn weld_vertices(mut self, epsilon: f32) -> Self {
        if epsilon <= 0.0 || self.vertices.is_empty() {
            return self;
        }

        let inv = 1.0 / epsilon;
        let mut map: HashMap<(i32, i32, i32), u32> = HashMap::new();
        let mut new_vertices: Vec<Vec3> = Vec::new();
        let mut remap: Vec<u32> = Vec::with_capacity(self.vertices.len());

        for v in &self.vertices {
            let key = (
                (v.x * inv).round() as i32,
                (v.y * inv).round() as i32,
                (v.z * inv).round() as i32,
            );
            let index = *map.entry(key).or_insert_with(|| {
                let idx = new_vertices.len() as u32;
                new_vertices.push(*v);
                idx
            });
            remap.push(index);
        }

        for tri in &mut self.indices {
            tri[0] = remap[tri[0] as usize];
            tri[1] = remap[tri[1] as usize];
            tri[2] = remap[tri[2] as usize];
        }

        self.vertices = new_vertices;
        self
    }

    /// Recenters vertices around their centroid to keep transforms stable.
    pub fn recenter(mut self) -> Self {
        if self.vertices.is_empty() {
            return self;
        }
        let centroid: Vec3 =
            self.vertices.iter().copied().sum::<Vec3>() / self.vertices.len() as f32;
        for vertex in &mut self.vertices {
            *vertex -= centroid;
        }
        self
    }

    pub fn build(self) -> Result<TriangleMesh, PhysicsError> {
        if self.vertices.is_empty() || self.indices.is_empty() {
            return Err(PhysicsError::InvalidShapeParameter(
                "triangle mesh needs at least one triangle",
            ));
        }
        let vertex_count = self.vertices.len() as u32;
        if self
            .indices
            .iter()
            .any(|tri| tri.iter().any(|&i| i >= vertex_count))
        {
            return Err(PhysicsError::InvalidShapeParameter(
                "triangle index out of range",
            ));
        }

        let face_normals: Vec<Vec3> = self
            .indices
            .iter()
            .map(|tri| {
                let v0 = self.vertices[tri[0] as usize];
                let v1 = self.vertices[tri[1] as usize];
                let v2 = self.vertices[tri[2] as usize];
                (v1 - v0).cross(v2 - v0).normalize_or_zero()
            })
            .collect();

        let active_edges = mark_active_edges(&self.indices, &face_normals);
        let bounds = Aabb::from_points(&self.vertices);

        let mut mesh = TriangleMesh {
            vertices: self.vertices,
            indices: self.indices,
            face_normals,
            active_edges,
            bounds,
            nodes: Vec::new(),
            tri_order: Vec::new(),
        };
        build_bvh(&mut mesh);
        Ok(mesh)
    }
}

fn mark_active_edges(indices: &[[u32; 3]], face_normals: &[Vec3]) -> Vec<u8> {
    // Edge key -> (triangle, edge slot) of the first triangle seen with it.
    let mut edge_owner: HashMap<(u32, u32), (usize, usize)> = HashMap::new();
    let mut flags = vec![0b111u8; indices.len()];

    for (tri, corners) in indices.iter().enumerate() {
        for edge in 0..3 {
            let a = corners[edge];
            let b = corners[(edge + 1) % 3];
            let key = if a < b { (a, b) } else { (b, a) };
            match edge_owner.get(&key) {
                Some(&(other_tri, other_edge)) => {
                    let dot = face_normals[tri].dot(face_normals[other_tri]);
                    if dot > ACTIVE_EDGE_COS_THRESHOLD {
                        flags[tri] &= !(1 << edge);
                        flags[other_tri] &= !(1 << other_edge);
                    }
                }
                None => {
                    edge_owner.insert(key, (tri, edge));
                }
            }
        }
    }

    flags
}

fn build_bvh(mesh: &mut TriangleMesh) {
    let centroids: Vec<Vec3> = (0..mesh.indices.len() as u32)
        .map(|i| {
            let [v0, v1, v2] = mesh.triangle(i);
            (v0 + v1 + v2) / 3.0
        })
        .collect();

    mesh.tri_order = (0..mesh.indices.len() as u32).collect();
    let mut nodes = Vec::new();
    let order_len = mesh.tri_order.len();
    subdivide(mesh, &centroids, &mut nodes, 0, order_len);
    mesh.nodes = nodes;
}

fn subdivide(
    mesh: &mut TriangleMesh,
    centroids: &[Vec3],
    nodes: &mut Vec<MeshBvhNode>,
    start: usize,
    count: usize,
) -> u32 {
    let mut bounds = Aabb::empty();
    for slot in start..start + count {
        let verts = mesh.triangle(mesh.tri_order[slot]);
        for v in verts {
            bounds.extend(v);
        }
    }

    let node_index = nodes.len() as u32;
    nodes.push(MeshBvhNode {
        bounds,
        left: 0,
        right: 0,
        start: start as u32,
        count: count as u32,
    });

    if count <= BVH_LEAF_SIZE {
        return node_index;
    }

    // Median split on the longest axis of the centroid bounds.
    let mut centroid_bounds = Aabb::empty();
    for slot in start..start + count {
        centroid_bounds.extend(centroids[mesh.tri_order[slot] as usize]);
    }
    let size = centroid_bounds.max - centroid_bounds.min;
    let axis = if size.x >= size.y && size.x >= size.z {
        0
    } else if size.y >= size.z {
        1
    } else {
        2
    };
    if size[axis] < 1e-9 {
        return node_index;
    }

    mesh.tri_order[start..start + count].sort_unstable_by(|&a, &b| {
        centroids[a as usize][axis]
            .partial_cmp(&centroids[b as usize][axis])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let half = count / 2;
    let left = subdivide(mesh, centroids, nodes, start, half);
    let right = subdivide(mesh, centroids, nodes, start + half, count - half);
    nodes[node_index as usize].left = left;
    nodes[node_index as usize].right = right;
    nodes[node_index as usize].count = 0;
    node_index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_mesh() -> TriangleMesh {
        // Two coplanar triangles sharing the diagonal edge.
        let vertices = vec![
            Vec3::new(-1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(-1.0, 0.0, 1.0),
        ];
        let indices = vec![[0, 1, 2], [0, 2, 3]];
        TriangleMesh::builder(vertices, indices).build().unwrap()
    }

    #[test]
    fn shared_coplanar_edge_is_inactive() {
        let mesh = quad_mesh();
        // Diagonal 0-2 is edge 2 of triangle 0 and edge 0 of triangle 1.
        assert!(!mesh.edge_active(0, 2));
        assert!(!mesh.edge_active(1, 0));
        // Boundary edges stay active.
        assert!(mesh.edge_active(0, 0));
        assert!(mesh.edge_active(1, 2));
    }

    #[test]
    fn raycast_hits_nearest_triangle() {
        let mesh = quad_mesh();
        let hit = mesh.raycast(Vec3::new(0.5, 2.0, -0.5), Vec3::NEG_Y, 10.0);
        let (t, tri) = hit.expect("ray should hit the quad");
        assert!((t - 2.0).abs() < 1e-5);
        assert_eq!(tri, 0);
    }

    #[test]
    fn aabb_query_visits_only_overlapping_triangles() {
        let mesh = quad_mesh();
        let mut visited = Vec::new();
        let query = Aabb::new(Vec3::new(0.4, -0.1, -0.9), Vec3::new(0.9, 0.1, -0.4));
        mesh.for_each_triangle_in_aabb(&query, |tri| {
            visited.push(tri);
            true
        });
        assert!(visited.contains(&0));
    }

    #[test]
    fn weld_merges_duplicate_vertices() {
        let vertices = vec![
            Vec3::ZERO,
            Vec3::X,
            Vec3::Y,
            Vec3::new(1.0 + 1e-5, 0.0, 0.0), // duplicate of X within weld epsilon
        ];
        let indices = vec![[0, 1, 2], [0, 3, 2]];
        let mesh = TriangleMesh::builder(vertices, indices)
            .weld_vertices(1e-3)
            .build()
            .unwrap();
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.triangle(0)[1], mesh.triangle(1)[1]);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let result = TriangleMesh::builder(vec![Vec3::ZERO, Vec3::X], vec![[0, 1, 7]]).build();
        assert!(result.is_err());
    }
}
