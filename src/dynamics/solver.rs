//! Warm-started sequential-impulse solver. Each island is prepared,
//! warm-started, velocity-iterated, position-integrated, and then
//! position-corrected independently; disjoint islands may solve on worker
//! threads behind the `parallel` feature.

use glam::Vec3;

use crate::collision::contact::{Contact, ContactCache};
use crate::config::{BAUMGARTE_FACTOR, CONTACT_SLOP, RESTITUTION_VELOCITY_THRESHOLD};
use crate::core::body::RigidBody;
use crate::core::body_pool::BodyPool;
use crate::dynamics::constraints::{
    effective_mass_linear, relative_velocity, Constraint,
};
use crate::dynamics::integrator::Integrator;
use crate::dynamics::island::Island;
use crate::utils::allocator::Pool;

/// Per-step solver counters, merged across islands.
#[derive(Debug, Default, Clone)]
pub struct SolverStepMetrics {
    pub islands_solved: usize,
    pub contacts_solved: usize,
    pub constraints_solved: usize,
    pub normal_impulse_sum: f32,
    pub friction_impulse_sum: f32,
}

impl SolverStepMetrics {
    fn record_island(&mut self, contacts: &[PreparedContact], constraint_count: usize) {
        self.islands_solved += 1;
        self.contacts_solved += contacts.len();
        self.constraints_solved += constraint_count;
        for contact in contacts {
            for point in &contact.points {
                self.normal_impulse_sum += point.normal_impulse.abs();
                self.friction_impulse_sum += (point.friction_impulse[0].powi(2)
                    + point.friction_impulse[1].powi(2))
                .sqrt();
            }
        }
    }

    pub fn merge(&mut self, other: &Self) {
        self.islands_solved += other.islands_solved;
        self.contacts_solved += other.contacts_solved;
        self.constraints_solved += other.constraints_solved;
        self.normal_impulse_sum += other.normal_impulse_sum;
        self.friction_impulse_sum += other.friction_impulse_sum;
    }
}

/// Body access indirection so islands can solve either directly against the
/// world pool or against a thread-local copy.
trait BodyStore {
    fn body(&self, index: u32) -> Option<&RigidBody>;
    fn body_mut(&mut self, index: u32) -> Option<&mut RigidBody>;
    fn pair_mut(&mut self, a: u32, b: u32) -> Option<(&mut RigidBody, &mut RigidBody)>;
}

impl BodyStore for BodyPool {
    fn body(&self, index: u32) -> Option<&RigidBody> {
        self.get_at(index)
    }

    fn body_mut(&mut self, index: u32) -> Option<&mut RigidBody> {
        self.get_at_mut(index)
    }

    fn pair_mut(&mut self, a: u32, b: u32) -> Option<(&mut RigidBody, &mut RigidBody)> {
        self.get2_mut_at(a, b)
    }
}

struct PreparedPoint {
    local_a: Vec3,
    local_b: Vec3,
    r_a: Vec3,
    r_b: Vec3,
    normal_mass: f32,
    tangent_mass: [f32; 2],
    /// Target separating velocity: restitution plus Baumgarte feedback.
    bias: f32,
    normal_impulse: f32,
    friction_impulse: [f32; 2],
}

struct PreparedContact {
    contact_index: u32,
    index_a: u32,
    index_b: u32,
    normal: Vec3,
    tangents: [Vec3; 2],
    friction: f32,
    surface_velocity: Vec3,
    points: Vec<PreparedPoint>,
}

fn prepare_contact<S: BodyStore>(
    store: &S,
    contact: &Contact,
    contact_index: u32,
    dt: f32,
) -> Option<PreparedContact> {
    if contact.sensor || contact.points.is_empty() {
        return None;
    }
    let index_a = contact.body_a.index();
    let index_b = contact.body_b.index();
    let a = store.body(index_a)?;
    let b = store.body(index_b)?;

    let normal = contact.normal;
    let (t1, t2) = normal.any_orthonormal_pair();
    let com_a = a.center_of_mass_position();
    let com_b = b.center_of_mass_position();

    let points = contact
        .points
        .iter()
        .map(|point| {
            let world_a = a.transform().point_to_world(point.local_a);
            let world_b = b.transform().point_to_world(point.local_b);
            let r_a = world_a - com_a;
            let r_b = world_b - com_b;

            let normal_mass = effective_mass_linear(a, b, r_a, r_b, normal);
            let tangent_mass = [
                effective_mass_linear(a, b, r_a, r_b, t1),
                effective_mass_linear(a, b, r_a, r_b, t2),
            ];

            // Restitution only for incoming speed above the threshold.
            let approach = relative_velocity(a, b, r_a, r_b).dot(normal);
            let mut bias = 0.0;
            if approach < -RESTITUTION_VELOCITY_THRESHOLD {
                bias += -contact.restitution * approach;
            }
            bias += BAUMGARTE_FACTOR / dt * (point.depth - CONTACT_SLOP).max(0.0);

            PreparedPoint {
                local_a: point.local_a,
                local_b: point.local_b,
                r_a,
                r_b,
                normal_mass,
                tangent_mass,
                bias,
                normal_impulse: point.normal_impulse,
                friction_impulse: point.friction_impulse,
            }
        })
        .collect();

    let surface_velocity = contact.settings.relative_linear_surface_velocity;
    Some(PreparedContact {
        contact_index,
        index_a,
        index_b,
        normal,
        tangents: [t1, t2],
        friction: contact.friction,
        surface_velocity,
        points,
    })
}

fn warm_start_contact<S: BodyStore>(store: &mut S, contact: &PreparedContact) {
    let Some((a, b)) = store.pair_mut(contact.index_a, contact.index_b) else {
        return;
    };
    for point in &contact.points {
        let impulse = contact.normal * point.normal_impulse
            + contact.tangents[0] * point.friction_impulse[0]
            + contact.tangents[1] * point.friction_impulse[1];
        if impulse != Vec3::ZERO {
            a.apply_solver_impulse(-impulse, point.r_a);
            b.apply_solver_impulse(impulse, point.r_b);
        }
    }
}

fn solve_contact_velocity<S: BodyStore>(
    store: &mut S,
    contact: &mut PreparedContact,
    ang_surface: Vec3,
) {
    let Some((a, b)) = store.pair_mut(contact.index_a, contact.index_b) else {
        return;
    };

    for point in &mut contact.points {
        // Normal impulse with accumulated clamping.
        let v_rel = relative_velocity(a, b, point.r_a, point.r_b)
            - contact.surface_velocity
            - ang_surface.cross(point.r_b);
        let vn = v_rel.dot(contact.normal);
        let lambda = -point.normal_mass * (vn - point.bias);
        let total = (point.normal_impulse + lambda).max(0.0);
        let delta = total - point.normal_impulse;
        point.normal_impulse = total;
        if delta != 0.0 {
            let impulse = contact.normal * delta;
            a.apply_solver_impulse(-impulse, point.r_a);
            b.apply_solver_impulse(impulse, point.r_b);
        }

        // Coulomb friction on the two-tangent basis.
        let max_friction = contact.friction * point.normal_impulse;
        if max_friction <= 0.0 {
            point.friction_impulse = [0.0; 2];
            continue;
        }
        let v_rel = relative_velocity(a, b, point.r_a, point.r_b)
            - contact.surface_velocity
            - ang_surface.cross(point.r_b);
        let mut new_impulse = [0.0f32; 2];
        for axis in 0..2 {
            let vt = v_rel.dot(contact.tangents[axis]);
            new_impulse[axis] =
                point.friction_impulse[axis] - point.tangent_mass[axis] * vt;
        }
        // Project back into the friction cone.
        let magnitude =
            (new_impulse[0] * new_impulse[0] + new_impulse[1] * new_impulse[1]).sqrt();
        if magnitude > max_friction {
            let scale = max_friction / magnitude;
            new_impulse[0] *= scale;
            new_impulse[1] *= scale;
        }
        let delta = [
            new_impulse[0] - point.friction_impulse[0],
            new_impulse[1] - point.friction_impulse[1],
        ];
        point.friction_impulse = new_impulse;
        let impulse = contact.tangents[0] * delta[0] + contact.tangents[1] * delta[1];
        if impulse != Vec3::ZERO {
            a.apply_solver_impulse(-impulse, point.r_a);
            b.apply_solver_impulse(impulse, point.r_b);
        }
    }
}

/// Pseudo-impulse resolution of residual penetration using the refreshed
/// local anchors.
fn solve_contact_position<S: BodyStore>(store: &mut S, contact: &PreparedContact) {
    let Some((a, b)) = store.pair_mut(contact.index_a, contact.index_b) else {
        return;
    };
    for point in &contact.points {
        let world_a = a.transform().point_to_world(point.local_a);
        let world_b = b.transform().point_to_world(point.local_b);
        let depth = (world_a - world_b).dot(contact.normal);
        let correction = (depth - CONTACT_SLOP).max(0.0) * BAUMGARTE_FACTOR;
        if correction <= 0.0 {
            continue;
        }
        let r_a = world_a - a.center_of_mass_position();
        let r_b = world_b - b.center_of_mass_position();
        let mass = effective_mass_linear(a, b, r_a, r_b, contact.normal);
        let impulse = contact.normal * (correction * mass);
        crate::dynamics::constraints::apply_position_impulse(a, -impulse, r_a);
        crate::dynamics::constraints::apply_position_impulse(b, impulse, r_b);
    }
}

fn write_back_impulses(cache: &mut ContactCache, prepared: &[PreparedContact]) {
    for contact in prepared {
        if let Some(record) = cache.get_mut(contact.contact_index) {
            for (slot, point) in contact.points.iter().enumerate() {
                if let Some(stored) = record.points.get_mut(slot) {
                    stored.normal_impulse = point.normal_impulse;
                    stored.friction_impulse = point.friction_impulse;
                }
            }
        }
    }
}

/// All solve phases for one island, generic over the body storage so the
/// same code runs against the world pool or a thread-local copy.
fn run_island<S: BodyStore>(
    store: &mut S,
    island: &Island,
    prepared: &mut [PreparedContact],
    surface_angulars: &[Vec3],
    constraints: &mut [&mut Constraint],
    dt: f32,
) {
    // Prepare constraints.
    for constraint in constraints.iter_mut() {
        let index_a = constraint.body_a.index();
        let index_b = constraint.body_b.index();
        let (Some(a), Some(b)) = (store.body(index_a), store.body(index_b)) else {
            continue;
        };
        constraint.prepare(a, b, dt);
    }

    // Warm start.
    for contact in prepared.iter() {
        warm_start_contact(store, contact);
    }
    for constraint in constraints.iter_mut() {
        if let Some((a, b)) =
            store.pair_mut(constraint.body_a.index(), constraint.body_b.index())
        {
            constraint.warm_start(a, b);
        }
    }

    // Velocity iterations.
    for _ in 0..island.velocity_iterations {
        for constraint in constraints.iter_mut() {
            if let Some((a, b)) =
                store.pair_mut(constraint.body_a.index(), constraint.body_b.index())
            {
                constraint.solve_velocity(a, b, dt);
            }
        }
        for (contact, &ang) in prepared.iter_mut().zip(surface_angulars) {
            solve_contact_velocity(store, contact, ang);
        }
    }

    // Integrate island member positions: DOF mask and clamps first.
    for &id in &island.bodies {
        if let Some(body) = store.body_mut(id.index()) {
            body.enforce_allowed_dofs();
            body.clamp_velocities();
            Integrator::integrate_position(body, dt);
        }
    }

    // Position iterations.
    for _ in 0..island.position_iterations {
        for constraint in constraints.iter_mut() {
            if let Some((a, b)) =
                store.pair_mut(constraint.body_a.index(), constraint.body_b.index())
            {
                constraint.solve_position(a, b, dt);
            }
        }
        for contact in prepared.iter() {
            solve_contact_position(store, contact);
        }
    }

    // Poses moved during position solve; refresh bounds.
    for &id in &island.bodies {
        if let Some(body) = store.body_mut(id.index()) {
            body.update_world_aabb();
        }
    }
}

fn prepare_island(
    bodies: &BodyPool,
    cache: &ContactCache,
    island: &Island,
    dt: f32,
) -> (Vec<PreparedContact>, Vec<Vec3>) {
    let prepared: Vec<PreparedContact> = island
        .contacts
        .iter()
        .filter_map(|&index| prepare_contact(bodies, cache.get(index)?, index, dt))
        .collect();
    let surface_angulars = prepared
        .iter()
        .map(|p| {
            cache
                .get(p.contact_index)
                .map(|c| c.settings.relative_angular_surface_velocity)
                .unwrap_or(Vec3::ZERO)
        })
        .collect();
    (prepared, surface_angulars)
}

/// Solves every island. With the `parallel` feature enabled and more than
/// one island, disjoint islands are dispatched to the rayon pool.
pub fn solve(
    bodies: &mut BodyPool,
    cache: &mut ContactCache,
    constraints: &mut Pool<Constraint>,
    islands: &[Island],
    dt: f32,
    parallel: bool,
) -> SolverStepMetrics {
    #[cfg(feature = "parallel")]
    if parallel && islands.len() > 1 {
        return parallel_solve::solve_islands_parallel(bodies, cache, constraints, islands, dt);
    }
    let _ = parallel;
    solve_islands_sequential(bodies, cache, constraints, islands, dt)
}

fn solve_islands_sequential(
    bodies: &mut BodyPool,
    cache: &mut ContactCache,
    constraints: &mut Pool<Constraint>,
    islands: &[Island],
    dt: f32,
) -> SolverStepMetrics {
    let mut metrics = SolverStepMetrics::default();
    for (island_index, island) in islands.iter().enumerate() {
        let (mut prepared, surface_angulars) = prepare_island(bodies, cache, island, dt);
        let mut constraint_refs: Vec<&mut Constraint> = constraints
            .iter_mut()
            .filter(|c| c.island_index == island_index as u32)
            .collect();
        run_island(
            bodies,
            island,
            &mut prepared,
            &surface_angulars,
            &mut constraint_refs,
            dt,
        );
        metrics.record_island(&prepared, constraint_refs.len());
        write_back_impulses(cache, &prepared);
    }
    metrics
}

#[cfg(feature = "parallel")]
mod parallel_solve {
    use super::*;
    use parking_lot::Mutex;
    use rayon::prelude::*;
    use std::collections::HashMap;

    /// Thread-local copies of every body an island touches, addressed by
    /// their pool index.
    struct JobBodies {
        bodies: Vec<RigidBody>,
        map: HashMap<u32, usize>,
    }

    impl BodyStore for JobBodies {
        fn body(&self, index: u32) -> Option<&RigidBody> {
            self.map.get(&index).map(|&slot| &self.bodies[slot])
        }

        fn body_mut(&mut self, index: u32) -> Option<&mut RigidBody> {
            let slot = *self.map.get(&index)?;
            Some(&mut self.bodies[slot])
        }

        fn pair_mut(&mut self, a: u32, b: u32) -> Option<(&mut RigidBody, &mut RigidBody)> {
            let slot_a = *self.map.get(&a)?;
            let slot_b = *self.map.get(&b)?;
            if slot_a == slot_b {
                return None;
            }
            let (low, high, flipped) = if slot_a < slot_b {
                (slot_a, slot_b, false)
            } else {
                (slot_b, slot_a, true)
            };
            let (left, right) = self.bodies.split_at_mut(high);
            let first = &mut left[low];
            let second = &mut right[0];
            if flipped {
                Some((second, first))
            } else {
                Some((first, second))
            }
        }
    }

    struct IslandJob<'a> {
        island: &'a Island,
        bodies: JobBodies,
        prepared: Vec<PreparedContact>,
        surface_angulars: Vec<Vec3>,
        constraints: Vec<(crate::utils::allocator::SlotId, Constraint)>,
    }

    pub(super) fn solve_islands_parallel(
        bodies: &mut BodyPool,
        cache: &mut ContactCache,
        constraints: &mut Pool<Constraint>,
        islands: &[Island],
        dt: f32,
    ) -> SolverStepMetrics {
        // Build jobs serially: clone every body and constraint an island
        // references so workers touch disjoint memory only.
        let mut jobs: Vec<IslandJob<'_>> = islands
            .iter()
            .map(|island| {
                let (prepared, surface_angulars) = prepare_island(bodies, cache, island, dt);

                let mut map = HashMap::new();
                let mut copies = Vec::new();
                let mut add = |index: u32, map: &mut HashMap<u32, usize>,
                               copies: &mut Vec<RigidBody>| {
                    if let std::collections::hash_map::Entry::Vacant(entry) = map.entry(index) {
                        if let Some(body) = bodies.get_at(index) {
                            entry.insert(copies.len());
                            copies.push(body.clone());
                        }
                    }
                };
                for &id in &island.bodies {
                    add(id.index(), &mut map, &mut copies);
                }
                for contact in &prepared {
                    add(contact.index_a, &mut map, &mut copies);
                    add(contact.index_b, &mut map, &mut copies);
                }
                let mut job_constraints = Vec::new();
                for &cid in &island.constraints {
                    if let Some(constraint) = constraints.get(cid) {
                        add(constraint.body_a.index(), &mut map, &mut copies);
                        add(constraint.body_b.index(), &mut map, &mut copies);
                        job_constraints.push((cid, constraint.clone()));
                    }
                }

                IslandJob {
                    island,
                    bodies: JobBodies {
                        bodies: copies,
                        map,
                    },
                    prepared,
                    surface_angulars,
                    constraints: job_constraints,
                }
            })
            .collect();

        let metrics = Mutex::new(SolverStepMetrics::default());
        jobs.par_iter_mut().for_each(|job| {
            let mut refs: Vec<&mut Constraint> =
                job.constraints.iter_mut().map(|(_, c)| c).collect();
            let surface = std::mem::take(&mut job.surface_angulars);
            run_island(
                &mut job.bodies,
                job.island,
                &mut job.prepared,
                &surface,
                &mut refs,
                dt,
            );
            job.surface_angulars = surface;

            let mut local = SolverStepMetrics::default();
            local.record_island(&job.prepared, refs.len());
            metrics.lock().merge(&local);
        });

        // Write results back: only island members can have changed.
        for job in jobs {
            for &id in &job.island.bodies {
                let Some(copy) = job.bodies.body(id.index()) else {
                    continue;
                };
                if let Some(body) = bodies.get_mut(id) {
                    body.position = copy.position;
                    body.rotation = copy.rotation;
                    body.motion.linear_velocity = copy.motion.linear_velocity;
                    body.motion.angular_velocity = copy.motion.angular_velocity;
                    body.world_aabb = copy.world_aabb;
                }
            }
            write_back_impulses(cache, &job.prepared);
            for (cid, constraint) in job.constraints {
                if let Some(slot) = constraints.get_mut(cid) {
                    *slot = constraint;
                }
            }
        }

        metrics.into_inner()
    }
}
