//! Inter-frame contact persistence. Contacts are identified by
//! `(bodyA, bodyB, subShapeA, subShapeB)` with `bodyA.index < bodyB.index`
//! canonical, live in a free-list pool, and thread two intrusive edge nodes
//! through per-body doubly-linked lists so lookup costs one walk of the
//! smaller body's contact list instead of a hash probe.

use glam::Vec3;

use crate::config::WARM_START_PROXIMITY;
use crate::core::body_pool::{BodyId, BodyPool};
use crate::core::sub_shape::SubShapeId;

use super::narrowphase::{Manifold, MAX_MANIFOLD_POINTS};

/// Packed `(contact index, edge side)` used to address one edge node of a
/// contact from a body's intrusive list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactKey(u32);

impl ContactKey {
    pub const EMPTY: ContactKey = ContactKey(u32::MAX);

    pub fn new(contact_index: u32, edge: usize) -> Self {
        debug_assert!(edge < 2);
        debug_assert!(contact_index < u32::MAX >> 1);
        Self(contact_index << 1 | edge as u32)
    }

    pub fn contact_index(self) -> u32 {
        self.0 >> 1
    }

    pub fn edge(self) -> usize {
        (self.0 & 1) as usize
    }

    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }
}

/// One node of a body's contact list.
#[derive(Debug, Clone, Copy)]
pub struct ContactEdge {
    pub body_index: u32,
    pub prev: ContactKey,
    pub next: ContactKey,
}

/// Persisted manifold point with local anchors for warm starting and
/// position correction.
#[derive(Debug, Clone, Copy)]
pub struct ContactPoint {
    /// Anchor on body A, in A's body frame.
    pub local_a: Vec3,
    /// Anchor on body B, in B's body frame.
    pub local_b: Vec3,
    pub on_a: Vec3,
    pub on_b: Vec3,
    pub depth: f32,
    pub normal_impulse: f32,
    pub friction_impulse: [f32; 2],
}

/// Surface-velocity overrides a listener may write from
/// `on_contact_validate` (conveyor belts, treadmills).
#[derive(Debug, Clone, Copy, Default)]
pub struct ContactSettings {
    /// Velocity of B's surface relative to A's at the contact, world space.
    pub relative_linear_surface_velocity: Vec3,
    pub relative_angular_surface_velocity: Vec3,
}

/// A persisted contact between two sub-shapes of two bodies.
#[derive(Debug, Clone)]
pub struct Contact {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub sub_shape_a: SubShapeId,
    pub sub_shape_b: SubShapeId,
    /// Edge 0 threads body A's list, edge 1 body B's.
    pub edges: [ContactEdge; 2],
    /// World normal, pointing from A towards B.
    pub normal: Vec3,
    pub points: Vec<ContactPoint>,
    pub friction: f32,
    pub restitution: f32,
    pub settings: ContactSettings,
    /// Set at the start of each step, cleared when the pair is refreshed.
    pub stale: bool,
    /// Events only, no solver response.
    pub sensor: bool,
    pub island_index: u32,
}

/// Free-list pool of contacts. Slots removed mid-frame are not compacted,
/// so contact indices held elsewhere stay valid within the step.
#[derive(Default)]
pub struct ContactCache {
    contacts: Vec<Option<Contact>>,
    free: Vec<u32>,
    live: usize,
}

impl ContactCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn get(&self, index: u32) -> Option<&Contact> {
        self.contacts.get(index as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut Contact> {
        self.contacts.get_mut(index as usize)?.as_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Contact)> {
        self.contacts
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|c| (index as u32, c)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u32, &mut Contact)> {
        self.contacts
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_mut().map(|c| (index as u32, c)))
    }

    /// Finds an existing contact record by walking body A's intrusive list.
    pub fn find(
        &self,
        bodies: &BodyPool,
        body_a: BodyId,
        body_b: BodyId,
        sub_shape_a: SubShapeId,
        sub_shape_b: SubShapeId,
    ) -> Option<u32> {
        let head = bodies.get(body_a)?.contact_list_head;
        let mut key = head;
        while !key.is_empty() {
            let index = key.contact_index();
            let contact = self.get(index)?;
            if contact.body_a == body_a
                && contact.body_b == body_b
                && contact.sub_shape_a == sub_shape_a
                && contact.sub_shape_b == sub_shape_b
            {
                return Some(index);
            }
            key = contact.edges[key.edge()].next;
        }
        None
    }

    /// Visits the indices of every contact touching `body`.
    pub fn for_each_contact_of(
        &self,
        bodies: &BodyPool,
        body: BodyId,
        mut visitor: impl FnMut(u32, &Contact) -> bool,
    ) {
        let Some(body_ref) = bodies.get(body) else {
            return;
        };
        let mut key = body_ref.contact_list_head;
        while !key.is_empty() {
            let index = key.contact_index();
            let Some(contact) = self.get(index) else {
                return;
            };
            let next = contact.edges[key.edge()].next;
            if !visitor(index, contact) {
                return;
            }
            key = next;
        }
    }

    /// Allocates a contact and links its edges into both bodies' lists.
    /// `body_a.index() < body_b.index()` must already hold.
    pub fn insert(&mut self, bodies: &mut BodyPool, mut contact: Contact) -> u32 {
        debug_assert!(contact.body_a.index() < contact.body_b.index());

        let index = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.contacts.push(None);
                (self.contacts.len() - 1) as u32
            }
        };

        contact.edges = [
            ContactEdge {
                body_index: contact.body_a.index(),
                prev: ContactKey::EMPTY,
                next: ContactKey::EMPTY,
            },
            ContactEdge {
                body_index: contact.body_b.index(),
                prev: ContactKey::EMPTY,
                next: ContactKey::EMPTY,
            },
        ];

        for side in 0..2 {
            let body_index = contact.edges[side].body_index;
            let key = ContactKey::new(index, side);
            if let Some(body) = bodies.get_at_mut(body_index) {
                let old_head = body.contact_list_head;
                contact.edges[side].next = old_head;
                body.contact_list_head = key;
                body.contact_count += 1;
                if !old_head.is_empty() {
                    if let Some(old) = self.get_mut(old_head.contact_index()) {
                        old.edges[old_head.edge()].prev = key;
                    }
                }
            }
        }

        self.contacts[index as usize] = Some(contact);
        self.live += 1;
        index
    }

    /// Unlinks both edges and frees the slot, returning the record so the
    /// caller can fire `on_contact_removed`.
    pub fn remove(&mut self, bodies: &mut BodyPool, index: u32) -> Option<Contact> {
        let contact = self.contacts.get_mut(index as usize)?.take()?;
        self.live -= 1;
        self.free.push(index);

        for side in 0..2 {
            let edge = contact.edges[side];
            if edge.prev.is_empty() {
                if let Some(body) = bodies.get_at_mut(edge.body_index) {
                    body.contact_list_head = edge.next;
                }
            } else if let Some(prev) = self.get_mut(edge.prev.contact_index()) {
                prev.edges[edge.prev.edge()].next = edge.next;
            }
            if !edge.next.is_empty() {
                if let Some(next) = self.get_mut(edge.next.contact_index()) {
                    next.edges[edge.next.edge()].prev = edge.prev;
                }
            }
            if let Some(body) = bodies.get_at_mut(edge.body_index) {
                body.contact_count = body.contact_count.saturating_sub(1);
            }
        }

        Some(contact)
    }

    /// Marks every contact stale; refreshed pairs clear the flag during
    /// narrowphase and the rest are swept at the end of the step.
    pub fn mark_all_stale(&mut self) {
        for slot in self.contacts.iter_mut().flatten() {
            slot.stale = true;
        }
    }

    /// Indices of contacts that were not refreshed this step.
    pub fn collect_stale(&self) -> Vec<u32> {
        self.iter()
            .filter(|(_, c)| c.stale)
            .map(|(index, _)| index)
            .collect()
    }

    /// Indices of every contact touching `body` (used on body removal).
    pub fn collect_contacts_of(&self, bodies: &BodyPool, body: BodyId) -> Vec<u32> {
        let mut indices = Vec::new();
        self.for_each_contact_of(bodies, body, |index, _| {
            indices.push(index);
            true
        });
        indices
    }
}

/// Copies a fresh manifold into a contact record, preserving accumulated
/// impulses on points whose local anchor stayed within the warm-start
/// proximity of a prior point.
pub fn refresh_contact_points(
    contact: &mut Contact,
    manifold: &Manifold,
    local_a_of: impl Fn(Vec3) -> Vec3,
    local_b_of: impl Fn(Vec3) -> Vec3,
) {
    let old_points = std::mem::take(&mut contact.points);
    contact.normal = manifold.normal;
    contact.points = manifold
        .points
        .iter()
        .take(MAX_MANIFOLD_POINTS)
        .map(|p| {
            let local_a = local_a_of(p.on_a);
            let local_b = local_b_of(p.on_b);
            let carried = old_points.iter().find(|old| {
                (old.local_a - local_a).length_squared()
                    < WARM_START_PROXIMITY * WARM_START_PROXIMITY
            });
            ContactPoint {
                local_a,
                local_b,
                on_a: p.on_a,
                on_b: p.on_b,
                depth: p.depth,
                normal_impulse: carried.map(|c| c.normal_impulse).unwrap_or(0.0),
                friction_impulse: carried.map(|c| c.friction_impulse).unwrap_or([0.0; 2]),
            }
        })
        .collect();
    contact.stale = false;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::body::{MotionProperties, MotionType, INACTIVE, NO_ISLAND};
    use crate::core::shape::Shape;
    use crate::core::types::{MassProperties, Material};
    use crate::core::Aabb;
    use glam::Quat;
    use std::sync::Arc;

    fn pool_with_bodies(count: usize) -> (BodyPool, Vec<BodyId>) {
        let mut pool = BodyPool::new();
        let shape = Arc::new(Shape::sphere(1.0).unwrap());
        let ids = (0..count)
            .map(|_| {
                let shape = shape.clone();
                pool.insert(move |id| crate::core::body::RigidBody {
                    id,
                    position: Vec3::ZERO,
                    rotation: Quat::IDENTITY,
                    shape,
                    motion_type: MotionType::Dynamic,
                    object_layer: 0,
                    motion: MotionProperties::default(),
                    mass_properties: MassProperties::default(),
                    material: Material::default(),
                    world_aabb: Aabb::empty(),
                    broadphase_proxy: u32::MAX,
                    contact_list_head: ContactKey::EMPTY,
                    contact_count: 0,
                    constraints: Vec::new(),
                    sleeping: false,
                    active_index: INACTIVE,
                    island_index: NO_ISLAND,
                    sensor: false,
                    collide_kinematic_vs_non_dynamic: false,
                    allow_sleeping: true,
                    collision_group: u32::MAX,
                    collision_mask: u32::MAX,
                })
            })
            .collect();
        (pool, ids)
    }

    fn make_contact(a: BodyId, b: BodyId, sub_b: u32) -> Contact {
        Contact {
            body_a: a,
            body_b: b,
            sub_shape_a: SubShapeId::EMPTY,
            sub_shape_b: SubShapeId::from_raw(sub_b),
            edges: [
                ContactEdge {
                    body_index: 0,
                    prev: ContactKey::EMPTY,
                    next: ContactKey::EMPTY,
                },
                ContactEdge {
                    body_index: 0,
                    prev: ContactKey::EMPTY,
                    next: ContactKey::EMPTY,
                },
            ],
            normal: Vec3::Y,
            points: Vec::new(),
            friction: 0.5,
            restitution: 0.0,
            settings: ContactSettings::default(),
            stale: false,
            sensor: false,
            island_index: NO_ISLAND,
        }
    }

    #[test]
    fn insert_find_remove_round_trip() {
        let (mut pool, ids) = pool_with_bodies(3);
        let mut cache = ContactCache::new();

        let c0 = cache.insert(&mut pool, make_contact(ids[0], ids[1], 0));
        let c1 = cache.insert(&mut pool, make_contact(ids[0], ids[2], 0));
        let c2 = cache.insert(&mut pool, make_contact(ids[1], ids[2], 0));

        assert_eq!(
            cache.find(&pool, ids[0], ids[1], SubShapeId::EMPTY, SubShapeId::from_raw(0)),
            Some(c0)
        );
        assert_eq!(
            cache.find(&pool, ids[0], ids[2], SubShapeId::EMPTY, SubShapeId::from_raw(0)),
            Some(c1)
        );
        assert_eq!(pool.get(ids[0]).unwrap().contact_count, 2);
        assert_eq!(pool.get(ids[2]).unwrap().contact_count, 2);

        cache.remove(&mut pool, c0);
        assert_eq!(
            cache.find(&pool, ids[0], ids[1], SubShapeId::EMPTY, SubShapeId::from_raw(0)),
            None
        );
        assert_eq!(pool.get(ids[0]).unwrap().contact_count, 1);
        assert_eq!(
            cache.find(&pool, ids[1], ids[2], SubShapeId::EMPTY, SubShapeId::from_raw(0)),
            Some(c2)
        );
    }

    #[test]
    fn sub_shape_distinguishes_contacts_on_the_same_pair() {
        let (mut pool, ids) = pool_with_bodies(2);
        let mut cache = ContactCache::new();
        let c0 = cache.insert(&mut pool, make_contact(ids[0], ids[1], 0));
        let c1 = cache.insert(&mut pool, make_contact(ids[0], ids[1], 1));
        assert_ne!(c0, c1);
        assert_eq!(
            cache.find(&pool, ids[0], ids[1], SubShapeId::EMPTY, SubShapeId::from_raw(1)),
            Some(c1)
        );
    }

    #[test]
    fn removed_slot_is_reused_without_compaction() {
        let (mut pool, ids) = pool_with_bodies(3);
        let mut cache = ContactCache::new();
        let c0 = cache.insert(&mut pool, make_contact(ids[0], ids[1], 0));
        let c1 = cache.insert(&mut pool, make_contact(ids[0], ids[2], 0));
        cache.remove(&mut pool, c0);
        // c1 keeps its index.
        assert!(cache.get(c1).is_some());
        let c2 = cache.insert(&mut pool, make_contact(ids[1], ids[2], 0));
        assert_eq!(c2, c0, "freed slot should be reused");
    }

    #[test]
    fn warm_start_carries_impulses_for_nearby_anchors() {
        let (_, ids) = pool_with_bodies(2);
        let mut contact = make_contact(ids[0], ids[1], 0);
        contact.points = vec![ContactPoint {
            local_a: Vec3::new(0.0, -1.0, 0.0),
            local_b: Vec3::new(0.0, 1.0, 0.0),
            on_a: Vec3::ZERO,
            on_b: Vec3::ZERO,
            depth: 0.01,
            normal_impulse: 2.5,
            friction_impulse: [0.5, -0.25],
        }];

        let manifold = Manifold {
            normal: Vec3::Y,
            points: vec![crate::collision::narrowphase::ManifoldPoint {
                on_a: Vec3::new(0.005, -1.0, 0.0),
                on_b: Vec3::new(0.005, 1.0, 0.0),
                depth: 0.02,
            }],
            sub_shape_a: SubShapeId::EMPTY,
            sub_shape_b: SubShapeId::EMPTY,
        };
        refresh_contact_points(&mut contact, &manifold, |p| p, |p| p);

        assert_eq!(contact.points.len(), 1);
        assert!((contact.points[0].normal_impulse - 2.5).abs() < 1e-6);
        assert!((contact.points[0].friction_impulse[0] - 0.5).abs() < 1e-6);
        assert!(!contact.stale);
    }
}
