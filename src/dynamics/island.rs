//! Island decomposition: a union-find over the active dynamic bodies,
//! seeded by every solver-relevant contact and constraint, so each island
//! can be solved independently.

use crate::collision::contact::ContactCache;
use crate::core::body::NO_ISLAND;
use crate::core::body_pool::{BodyId, BodyPool};
use crate::dynamics::constraints::Constraint;
use crate::utils::allocator::{Pool, SlotId};

/// One connected component of awake dynamic bodies. Static and kinematic
/// bodies anchor contacts but never join an island.
pub struct Island {
    pub bodies: Vec<BodyId>,
    pub contacts: Vec<u32>,
    pub constraints: Vec<SlotId>,
    pub velocity_iterations: u32,
    pub position_iterations: u32,
}

/// Rebuilds islands every step; buffers are reused across steps.
#[derive(Default)]
pub struct IslandBuilder {
    parent: Vec<u32>,
    rank: Vec<u32>,
}

impl IslandBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups the active bodies, assigning `island_index` on bodies,
    /// contacts, and constraints as a side effect.
    pub fn build(
        &mut self,
        bodies: &mut BodyPool,
        contacts: &mut ContactCache,
        constraints: &mut Pool<Constraint>,
        default_velocity_iterations: u32,
        default_position_iterations: u32,
    ) -> Vec<Island> {
        let active: Vec<BodyId> = bodies.active_bodies().to_vec();
        let count = active.len();
        self.parent.clear();
        self.rank.clear();
        self.parent.extend(0..count as u32);
        self.rank.resize(count, 0);

        // A vertex is an awake dynamic body; everything else is a terminal.
        let vertex_of = |bodies: &BodyPool, id: BodyId| -> Option<u32> {
            let body = bodies.get(id)?;
            (body.is_dynamic() && body.is_active()).then_some(body.active_index)
        };

        for (_, contact) in contacts.iter() {
            if contact.sensor {
                continue;
            }
            match (
                vertex_of(bodies, contact.body_a),
                vertex_of(bodies, contact.body_b),
            ) {
                (Some(a), Some(b)) => self.union(a, b),
                _ => {}
            }
        }

        for constraint in constraints.iter() {
            if !constraint.enabled {
                continue;
            }
            if let (Some(a), Some(b)) = (
                vertex_of(bodies, constraint.body_a),
                vertex_of(bodies, constraint.body_b),
            ) {
                self.union(a, b);
            }
        }

        // Map union-find roots to dense island slots.
        let mut island_of_root = vec![u32::MAX; count];
        let mut islands: Vec<Island> = Vec::new();
        for slot in 0..count as u32 {
            let id = active[slot as usize];
            if vertex_of(bodies, id).is_none() {
                // Active kinematic bodies stay out of islands.
                if let Some(body) = bodies.get_mut(id) {
                    body.island_index = NO_ISLAND;
                }
                continue;
            }
            let root = self.find(slot) as usize;
            let island_index = if island_of_root[root] == u32::MAX {
                island_of_root[root] = islands.len() as u32;
                islands.push(Island {
                    bodies: Vec::new(),
                    contacts: Vec::new(),
                    constraints: Vec::new(),
                    velocity_iterations: default_velocity_iterations,
                    position_iterations: default_position_iterations,
                });
                island_of_root[root]
            } else {
                island_of_root[root]
            };

            islands[island_index as usize].bodies.push(id);
            if let Some(body) = bodies.get_mut(id) {
                body.island_index = island_index;
                // Per-body iteration overrides raise the island's counts.
                let island = &mut islands[island_index as usize];
                if body.motion.velocity_iterations > 0 {
                    island.velocity_iterations = island
                        .velocity_iterations
                        .max(body.motion.velocity_iterations);
                }
                if body.motion.position_iterations > 0 {
                    island.position_iterations = island
                        .position_iterations
                        .max(body.motion.position_iterations);
                }
            }
        }

        // Attach contacts and constraints to the island of a dynamic member.
        let island_of_body = |bodies: &BodyPool, id: BodyId| -> Option<u32> {
            let body = bodies.get(id)?;
            (body.island_index != NO_ISLAND).then_some(body.island_index)
        };

        for (index, contact) in contacts.iter_mut() {
            contact.island_index = NO_ISLAND;
            if contact.sensor {
                continue;
            }
            let island = island_of_body(bodies, contact.body_a)
                .or_else(|| island_of_body(bodies, contact.body_b));
            if let Some(island_index) = island {
                contact.island_index = island_index;
                islands[island_index as usize].contacts.push(index);
            }
        }

        for id in constraints.ids().collect::<Vec<_>>() {
            let Some(constraint) = constraints.get_mut(id) else {
                continue;
            };
            constraint.island_index = NO_ISLAND;
            if !constraint.enabled {
                continue;
            }
            let island = island_of_body(bodies, constraint.body_a)
                .or_else(|| island_of_body(bodies, constraint.body_b));
            if let Some(island_index) = island {
                constraint.island_index = island_index;
                let island = &mut islands[island_index as usize];
                island.constraints.push(id);
                if constraint.velocity_iterations > 0 {
                    island.velocity_iterations =
                        island.velocity_iterations.max(constraint.velocity_iterations);
                }
                if constraint.position_iterations > 0 {
                    island.position_iterations =
                        island.position_iterations.max(constraint.position_iterations);
                }
            }
        }

        islands
    }

    fn find(&mut self, mut node: u32) -> u32 {
        while self.parent[node as usize] != node {
            // Path halving.
            let grand = self.parent[self.parent[node as usize] as usize];
            self.parent[node as usize] = grand;
            node = grand;
        }
        node
    }

    fn union(&mut self, a: u32, b: u32) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return;
        }
        let (small, large) = if self.rank[root_a as usize] < self.rank[root_b as usize] {
            (root_a, root_b)
        } else {
            (root_b, root_a)
        };
        self.parent[small as usize] = large;
        if self.rank[small as usize] == self.rank[large as usize] {
            self.rank[large as usize] += 1;
        }
    }
}
