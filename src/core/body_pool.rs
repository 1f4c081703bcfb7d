use std::collections::VecDeque;
use std::fmt;

use super::body::{RigidBody, INACTIVE};

/// Opaque 64-bit body handle packing a pool index (low 32 bits) and a
/// sequence number (high 32 bits). Lookups validate the sequence, so handles
/// to removed bodies resolve to "not found" even after the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(u64);

impl BodyId {
    pub const INVALID: BodyId = BodyId(u64::MAX);

    pub fn new(index: u32, sequence: u32) -> Self {
        Self((sequence as u64) << 32 | index as u64)
    }

    pub fn index(self) -> u32 {
        self.0 as u32
    }

    pub fn sequence(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn is_invalid(self) -> bool {
        self == Self::INVALID
    }
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "body#{}v{}", self.index(), self.sequence())
    }
}

/// Slot-reusing pool of rigid bodies plus the dense list of active
/// (awake, non-static) bodies the pipeline iterates each step.
#[derive(Default)]
pub struct BodyPool {
    slots: Vec<Option<RigidBody>>,
    sequences: Vec<u32>,
    free_list: VecDeque<u32>,
    active: Vec<BodyId>,
}

impl BodyPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a slot (reusing a freed one with a bumped sequence) and
    /// stores the body produced by `make`, which receives the final id.
    pub fn insert(&mut self, make: impl FnOnce(BodyId) -> RigidBody) -> BodyId {
        if let Some(index) = self.free_list.pop_front() {
            let id = BodyId::new(index, self.sequences[index as usize]);
            self.slots[index as usize] = Some(make(id));
            id
        } else {
            let index = self.slots.len() as u32;
            let id = BodyId::new(index, 0);
            self.slots.push(Some(make(id)));
            self.sequences.push(0);
            id
        }
    }

    pub fn get(&self, id: BodyId) -> Option<&RigidBody> {
        if !self.is_valid(id) {
            return None;
        }
        self.slots.get(id.index() as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        if !self.is_valid(id) {
            return None;
        }
        self.slots.get_mut(id.index() as usize)?.as_mut()
    }

    /// Raw slot access used by the intrusive contact lists and the solver,
    /// which address bodies by pool index.
    pub fn get_at(&self, index: u32) -> Option<&RigidBody> {
        self.slots.get(index as usize)?.as_ref()
    }

    pub fn get_at_mut(&mut self, index: u32) -> Option<&mut RigidBody> {
        self.slots.get_mut(index as usize)?.as_mut()
    }

    /// Simultaneous mutable access to two distinct bodies.
    pub fn get2_mut(&mut self, a: BodyId, b: BodyId) -> Option<(&mut RigidBody, &mut RigidBody)> {
        if !self.is_valid(a) || !self.is_valid(b) {
            return None;
        }
        self.get2_mut_at(a.index(), b.index())
    }

    pub fn get2_mut_at(
        &mut self,
        index_a: u32,
        index_b: u32,
    ) -> Option<(&mut RigidBody, &mut RigidBody)> {
        if index_a == index_b {
            return None;
        }
        let (first, second, flipped) = if index_a < index_b {
            (index_a as usize, index_b as usize, false)
        } else {
            (index_b as usize, index_a as usize, true)
        };
        if second >= self.slots.len() {
            return None;
        }
        let (left, right) = self.slots.split_at_mut(second);
        let first_body = left.get_mut(first)?.as_mut()?;
        let second_body = right.get_mut(0)?.as_mut()?;
        if flipped {
            Some((second_body, first_body))
        } else {
            Some((first_body, second_body))
        }
    }

    /// Frees the slot. The caller is responsible for having detached the
    /// body from the broadphase, contacts, constraints, and active list.
    pub fn remove(&mut self, id: BodyId) -> Option<RigidBody> {
        if !self.is_valid(id) {
            return None;
        }
        let index = id.index() as usize;
        let body = self.slots[index].take()?;
        self.sequences[index] = self.sequences[index].wrapping_add(1);
        self.free_list.push_back(id.index());
        Some(body)
    }

    /// Adds a body to the dense active list.
    pub fn activate(&mut self, id: BodyId) {
        let position = self.active.len() as u32;
        if let Some(body) = self.get_mut(id) {
            if body.active_index != INACTIVE || body.is_static() {
                return;
            }
            body.active_index = position;
            body.sleeping = false;
            body.motion.sleep_timer = 0.0;
        } else {
            return;
        }
        self.active.push(id);
    }

    /// Removes a body from the active list with a swap-remove, patching the
    /// moved body's dense index.
    pub fn deactivate(&mut self, id: BodyId) {
        let index = match self.get(id) {
            Some(body) if body.active_index != INACTIVE => body.active_index as usize,
            _ => return,
        };
        self.active.swap_remove(index);
        if let Some(&moved) = self.active.get(index) {
            if let Some(body) = self.get_mut(moved) {
                body.active_index = index as u32;
            }
        }
        if let Some(body) = self.get_mut(id) {
            body.active_index = INACTIVE;
        }
    }

    pub fn active_bodies(&self) -> &[BodyId] {
        &self.active
    }

    pub fn ids(&self) -> impl Iterator<Item = BodyId> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.as_ref()
                .map(|_| BodyId::new(index as u32, self.sequences[index]))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &RigidBody> {
        self.slots.iter().filter_map(|slot| slot.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RigidBody> {
        self.slots.iter_mut().filter_map(|slot| slot.as_mut())
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_valid(&self, id: BodyId) -> bool {
        self.sequences
            .get(id.index() as usize)
            .map(|&sequence| sequence == id.sequence())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::body::{MotionProperties, MotionType, NO_ISLAND};
    use crate::core::shape::Shape;
    use crate::core::types::{MassProperties, Material};
    use crate::core::Aabb;
    use crate::collision::contact::ContactKey;
    use glam::{Quat, Vec3};
    use std::sync::Arc;

    fn make_body(id: BodyId) -> RigidBody {
        RigidBody {
            id,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            shape: Arc::new(Shape::sphere(1.0).unwrap()),
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
        }
    }

    #[test]
    fn reused_slot_gets_a_greater_sequence() {
        let mut pool = BodyPool::new();
        let first = pool.insert(make_body);
        pool.remove(first);
        let second = pool.insert(make_body);
        assert_eq!(first.index(), second.index());
        assert!(second.sequence() > first.sequence());
        assert!(pool.get(first).is_none());
        assert!(pool.get(second).is_some());
    }

    #[test]
    fn active_list_swap_remove_patches_indices() {
        let mut pool = BodyPool::new();
        let a = pool.insert(make_body);
        let b = pool.insert(make_body);
        let c = pool.insert(make_body);
        pool.activate(a);
        pool.activate(b);
        pool.activate(c);

        pool.deactivate(a);
        assert_eq!(pool.active_bodies().len(), 2);
        for &id in pool.active_bodies() {
            let body = pool.get(id).unwrap();
            assert_eq!(pool.active_bodies()[body.active_index as usize], id);
        }
        assert_eq!(pool.get(a).unwrap().active_index, INACTIVE);
    }

    #[test]
    fn get2_mut_preserves_argument_order() {
        let mut pool = BodyPool::new();
        let a = pool.insert(make_body);
        let b = pool.insert(make_body);
        let (body_b, body_a) = pool.get2_mut(b, a).unwrap();
        assert_eq!(body_b.id, b);
        assert_eq!(body_a.id, a);
        assert!(pool.get2_mut(a, a).is_none());
    }
}
