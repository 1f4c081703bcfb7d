use glam::Vec3;

use crate::config::{BROADPHASE_OPTIMIZATION_LEAVES, FAT_AABB_MARGIN};
use crate::core::aabb::Aabb;
use crate::core::body_pool::{BodyId, BodyPool};
use crate::world::settings::LayerConfig;

use super::aabb_tree::{AabbTree, Visit};

/// Canonical candidate pair: `a.index() < b.index()` so the contact cache
/// key stays stable across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyPair {
    pub a: BodyId,
    pub b: BodyId,
}

impl BodyPair {
    pub fn new(a: BodyId, b: BodyId) -> Self {
        if a.index() <= b.index() {
            Self { a, b }
        } else {
            Self { a: b, b: a }
        }
    }
}

/// Layered broadphase: one dynamic AABB tree per broadphase layer, storing
/// fattened body bounds, plus the per-step pair discovery walk.
pub struct BroadPhase {
    trees: Vec<AabbTree>,
}

impl BroadPhase {
    pub fn new(layer_count: u32) -> Self {
        Self {
            trees: (0..layer_count.max(1)).map(|_| AabbTree::new()).collect(),
        }
    }

    pub fn layer_count(&self) -> u32 {
        self.trees.len() as u32
    }

    /// Inserts a body's tight AABB (fattened here) into the tree of its
    /// broadphase layer and returns the leaf node index.
    pub fn add_body(&mut self, id: BodyId, tight_aabb: &Aabb, layer: u32) -> u32 {
        debug_assert!((layer as usize) < self.trees.len());
        self.trees[layer as usize].insert(id, tight_aabb.expanded(FAT_AABB_MARGIN))
    }

    pub fn remove_body(&mut self, proxy: u32, layer: u32) {
        if proxy != super::aabb_tree::NULL_NODE {
            self.trees[layer as usize].remove(proxy);
        }
    }

    /// Relocates a leaf only when the tight AABB escaped the stored fat one.
    /// Most bodies move less than the margin per step and stay put.
    pub fn update_body(&mut self, proxy: u32, tight_aabb: &Aabb, layer: u32) {
        let tree = &mut self.trees[layer as usize];
        let fat = tree.leaf_aabb(proxy);
        if fat.contains(tight_aabb) {
            return;
        }
        tree.update(proxy, tight_aabb.expanded(FAT_AABB_MARGIN));
    }

    /// Incremental rebalancing, a few leaves per tree per step.
    pub fn optimize(&mut self) {
        for tree in &mut self.trees {
            tree.optimize_incremental(BROADPHASE_OPTIMIZATION_LEAVES);
        }
    }

    /// The stored (fat) bounds of a body's leaf.
    pub fn fat_aabb(&self, proxy: u32, layer: u32) -> Aabb {
        *self.trees[layer as usize].leaf_aabb(proxy)
    }

    /// Emits every candidate pair for this step into `out`, exactly once
    /// per pair, filtered by layer matrices, group/mask bits, and motion
    /// state.
    pub fn find_pairs(&self, bodies: &BodyPool, layers: &LayerConfig, out: &mut Vec<BodyPair>) {
        out.clear();
        let layer_count = self.trees.len();
        for i in 0..layer_count {
            for j in i..layer_count {
                if !layers.broadphase_layers_collide(i as u32, j as u32) {
                    continue;
                }
                if i == j {
                    self.find_pairs_within(&self.trees[i], bodies, layers, out);
                } else {
                    // Walk the smaller tree, query the larger one.
                    let (walk, query) =
                        if self.trees[i].leaf_count() <= self.trees[j].leaf_count() {
                            (&self.trees[i], &self.trees[j])
                        } else {
                            (&self.trees[j], &self.trees[i])
                        };
                    self.find_pairs_between(walk, query, bodies, layers, out);
                }
            }
        }
    }

    fn find_pairs_within(
        &self,
        tree: &AabbTree,
        bodies: &BodyPool,
        layers: &LayerConfig,
        out: &mut Vec<BodyPair>,
    ) {
        tree.for_each_leaf(&mut |body_id, _, fat| {
            tree.query_aabb(fat, &mut |other_id, _| {
                // Emit each unordered pair once.
                if other_id.index() > body_id.index() {
                    if let Some(pair) = filter_pair(bodies, layers, body_id, other_id) {
                        out.push(pair);
                    }
                }
                true
            });
            true
        });
    }

    fn find_pairs_between(
        &self,
        walk: &AabbTree,
        query: &AabbTree,
        bodies: &BodyPool,
        layers: &LayerConfig,
        out: &mut Vec<BodyPair>,
    ) {
        walk.for_each_leaf(&mut |body_id, _, fat| {
            query.query_aabb(fat, &mut |other_id, _| {
                if let Some(pair) = filter_pair(bodies, layers, body_id, other_id) {
                    out.push(pair);
                }
                true
            });
            true
        });
    }

    /// AABB overlap query across all layers enabled in `layer_mask`
    /// (bit `i` = broadphase layer `i`).
    pub fn query_aabb(
        &self,
        aabb: &Aabb,
        layer_mask: u32,
        visitor: &mut dyn FnMut(BodyId) -> bool,
    ) {
        for (index, tree) in self.trees.iter().enumerate() {
            if layer_mask & (1 << index) == 0 {
                continue;
            }
            let mut keep_going = true;
            tree.query_aabb(aabb, &mut |body, _| {
                keep_going = visitor(body);
                keep_going
            });
            if !keep_going {
                return;
            }
        }
    }

    /// Ray query across the enabled layers; the visitor can shrink the ray.
    pub fn query_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_t: f32,
        layer_mask: u32,
        visitor: &mut dyn FnMut(BodyId) -> Visit,
    ) {
        for (index, tree) in self.trees.iter().enumerate() {
            if layer_mask & (1 << index) == 0 {
                continue;
            }
            let mut stopped = false;
            tree.query_ray(origin, direction, max_t, &mut |body, _| {
                let control = visitor(body);
                if matches!(control, Visit::Stop) {
                    stopped = true;
                }
                control
            });
            if stopped {
                return;
            }
        }
    }

    /// Swept-AABB query across the enabled layers.
    pub fn query_swept_aabb(
        &self,
        start: &Aabb,
        displacement: Vec3,
        layer_mask: u32,
        visitor: &mut dyn FnMut(BodyId) -> Visit,
    ) {
        for (index, tree) in self.trees.iter().enumerate() {
            if layer_mask & (1 << index) == 0 {
                continue;
            }
            let mut stopped = false;
            tree.query_swept_aabb(start, displacement, &mut |body, _| {
                let control = visitor(body);
                if matches!(control, Visit::Stop) {
                    stopped = true;
                }
                control
            });
            if stopped {
                return;
            }
        }
    }
}

/// Applies the object-layer matrix, group/mask bits, and motion-state rules
/// to one candidate pair.
fn filter_pair(
    bodies: &BodyPool,
    layers: &LayerConfig,
    id_a: BodyId,
    id_b: BodyId,
) -> Option<BodyPair> {
    if id_a.index() == id_b.index() {
        return None;
    }
    let a = bodies.get(id_a)?;
    let b = bodies.get(id_b)?;

    if !layers.object_layers_collide(a.object_layer, b.object_layer) {
        return None;
    }
    if (a.collision_group & b.collision_mask) == 0 || (b.collision_group & a.collision_mask) == 0 {
        return None;
    }

    // A pair with no awake, movable member cannot produce new motion.
    // An awake kinematic counts: it must wake sleepers it runs into.
    if !a.is_active() && !b.is_active() {
        return None;
    }

    // Kinematic vs non-dynamic pairs are skipped unless opted in.
    let a_infinite = !a.is_dynamic();
    let b_infinite = !b.is_dynamic();
    if a_infinite
        && b_infinite
        && !(a.collide_kinematic_vs_non_dynamic || b.collide_kinematic_vs_non_dynamic)
    {
        return None;
    }

    Some(BodyPair::new(id_a, id_b))
}
