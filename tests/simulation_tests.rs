use std::sync::Arc;

use approx::assert_relative_eq;
use tremor::{
    BodyId, ConstraintSpace, MotionType, NoopListener, PhysicsListener, PhysicsWorld,
    RigidBodyDesc, Shape, Vec3, WorldSettings,
};

const DT: f32 = 1.0 / 60.0;

fn single_layer_world() -> (PhysicsWorld, u32) {
    let mut settings = WorldSettings::new();
    let bp = settings.add_broad_phase_layer();
    let layer = settings.add_object_layer(bp).unwrap();
    settings.enable_collision(layer, layer).unwrap();
    (PhysicsWorld::new(settings), layer)
}

fn dynamic_sphere(world: &mut PhysicsWorld, layer: u32, position: Vec3, restitution: f32) -> BodyId {
    let shape = Arc::new(Shape::sphere(0.5).unwrap());
    world
        .create_body(
            RigidBodyDesc::new(shape, MotionType::Dynamic, layer)
                .position(position)
                .restitution(restitution)
                .damping(0.0, 0.0),
        )
        .unwrap()
}

fn static_floor(world: &mut PhysicsWorld, layer: u32) -> BodyId {
    let shape = Arc::new(Shape::cuboid(Vec3::new(50.0, 0.5, 50.0)).unwrap());
    world
        .create_body(
            RigidBodyDesc::new(shape, MotionType::Static, layer)
                .position(Vec3::new(0.0, -0.5, 0.0)),
        )
        .unwrap()
}

#[test]
fn free_fall_matches_ballistics() {
    let (mut world, layer) = single_layer_world();
    let shape = Arc::new(Shape::sphere(1.0).unwrap());
    let ball = world
        .create_body(
            RigidBodyDesc::new(shape, MotionType::Dynamic, layer)
                .position(Vec3::new(0.0, 10.0, 0.0))
                .mass(1.0)
                .damping(0.0, 0.0),
        )
        .unwrap();

    for _ in 0..60 {
        world.update(DT);
    }

    let body = world.body(ball).unwrap();
    // y = 10 - g t^2 / 2 after one second, within 2%.
    let expected = 10.0 - 0.5 * 9.81;
    assert_relative_eq!(body.position.y, expected, max_relative = 0.02, epsilon = 0.05);
    assert_relative_eq!(body.motion.linear_velocity.y, -9.81, epsilon = 0.1);
}

#[test]
fn restitution_ladder_bounces_monotonically() {
    let (mut world, layer) = single_layer_world();
    static_floor(&mut world, layer);

    let restitutions = [0.0, 0.2, 0.4, 0.6, 0.8, 1.0];
    let balls: Vec<BodyId> = restitutions
        .iter()
        .enumerate()
        .map(|(slot, &e)| {
            dynamic_sphere(
                &mut world,
                layer,
                Vec3::new(slot as f32 * 5.0, 5.0, 0.0),
                e,
            )
        })
        .collect();

    // Drop for two seconds, tracking the rebound peak after the first
    // half of the run (all spheres have hit the floor by then).
    let mut peaks = [0.0f32; 6];
    for step in 0..120 {
        world.update(DT);
        if step >= 60 {
            for (slot, &ball) in balls.iter().enumerate() {
                let y = world.body(ball).unwrap().position.y;
                peaks[slot] = peaks[slot].max(y);
            }
        }
    }

    for pair in peaks.windows(2) {
        assert!(
            pair[1] >= pair[0] - 0.05,
            "rebound peaks should not decrease with restitution: {peaks:?}"
        );
    }
    // The dead sphere stays down, the elastic one comes back up high.
    assert!(peaks[0] < 1.0, "peaks were {peaks:?}");
    assert!(peaks[5] > 2.0, "peaks were {peaks:?}");
}

#[test]
fn settled_stack_goes_to_sleep() {
    let (mut world, layer) = single_layer_world();
    static_floor(&mut world, layer);

    let shape = Arc::new(Shape::cuboid(Vec3::splat(0.5)).unwrap());
    let boxes: Vec<BodyId> = (0..5)
        .map(|level| {
            world
                .create_body(
                    RigidBodyDesc::new(shape.clone(), MotionType::Dynamic, layer)
                        .position(Vec3::new(0.0, 0.52 + level as f32 * 1.02, 0.0))
                        .friction(0.5),
                )
                .unwrap()
        })
        .collect();

    for _ in 0..300 {
        world.update(DT);
    }

    let sleeping = boxes
        .iter()
        .take(3)
        .filter(|&&id| world.body(id).unwrap().sleeping)
        .count();
    assert!(
        sleeping >= 3,
        "bottom three boxes should sleep, {sleeping} did"
    );
    // A sleeping body's pose must not drift.
    let bottom = world.body(boxes[0]).unwrap();
    assert!(bottom.position.y > 0.3 && bottom.position.y < 0.7);
}

#[test]
fn distance_constraint_pulls_bodies_into_range() {
    let (mut world, layer) = single_layer_world();
    world.settings.gravity_enabled = false;

    let shape = Arc::new(Shape::cuboid(Vec3::splat(0.5)).unwrap());
    let a = world
        .create_body(
            RigidBodyDesc::new(shape.clone(), MotionType::Dynamic, layer)
                .position(Vec3::ZERO)
                .damping(0.0, 0.0),
        )
        .unwrap();
    let b = world
        .create_body(
            RigidBodyDesc::new(shape, MotionType::Dynamic, layer)
                .position(Vec3::new(5.0, 0.0, 0.0))
                .damping(0.0, 0.0),
        )
        .unwrap();

    let constraint = world
        .create_distance_constraint(
            a,
            b,
            ConstraintSpace::World,
            Vec3::ZERO,
            Vec3::new(5.0, 0.0, 0.0),
            0.0,
            1.0,
            None,
        )
        .unwrap();

    for _ in 0..60 {
        world.update(DT);
    }

    let distance = world.current_position(constraint).unwrap();
    assert!(
        distance <= 1.0 + 0.05,
        "constraint should pull the bodies within range, distance {distance}"
    );
}

#[derive(Default)]
struct PairRecorder {
    added: Vec<(BodyId, BodyId)>,
}

impl PhysicsListener for PairRecorder {
    fn on_contact_added(&mut self, contact: &tremor::ContactView<'_>) {
        self.added.push((contact.body_a, contact.body_b));
    }
}

#[test]
fn disabled_layer_pairs_never_collide() {
    let mut settings = WorldSettings::new();
    let bp = settings.add_broad_phase_layer();
    let layer_a = settings.add_object_layer(bp).unwrap();
    let layer_b = settings.add_object_layer(bp).unwrap();
    settings.enable_collision(layer_a, layer_a).unwrap();
    settings.enable_collision(layer_b, layer_b).unwrap();
    // A vs B intentionally left disabled.
    let mut world = PhysicsWorld::new(settings);

    let shape = Arc::new(Shape::cuboid(Vec3::splat(0.6)).unwrap());
    let mut membership = std::collections::HashMap::new();
    for x in 0..4 {
        for y in 0..4 {
            for z in 0..4 {
                // Interleave both grids in the same region of space.
                let base = Vec3::new(x as f32, y as f32, z as f32);
                for (layer, offset) in [(layer_a, 0.0), (layer_b, 0.5)] {
                    let id = world
                        .create_body(
                            RigidBodyDesc::new(shape.clone(), MotionType::Dynamic, layer)
                                .position(base + Vec3::splat(offset)),
                        )
                        .unwrap();
                    membership.insert(id, layer);
                }
            }
        }
    }

    let mut recorder = PairRecorder::default();
    world.update_with_listener(&mut recorder, DT);

    assert!(!recorder.added.is_empty(), "grids should self-collide");
    for (a, b) in recorder.added {
        assert_eq!(
            membership[&a], membership[&b],
            "bodies from different layers must not touch"
        );
    }
}

#[test]
fn kinematic_wakes_sleeping_dynamic() {
    let (mut world, layer) = single_layer_world();
    static_floor(&mut world, layer);

    let shape = Arc::new(Shape::cuboid(Vec3::splat(0.5)).unwrap());
    let sleeper = world
        .create_body(
            RigidBodyDesc::new(shape.clone(), MotionType::Dynamic, layer)
                .position(Vec3::new(0.0, 1.0, 0.0)),
        )
        .unwrap();
    world.sleep(sleeper);
    assert!(world.body(sleeper).unwrap().sleeping);

    let pusher = world
        .create_body(
            RigidBodyDesc::new(shape, MotionType::Kinematic, layer)
                .position(Vec3::new(3.0, 1.0, 0.0)),
        )
        .unwrap();

    let mut recorder = PairRecorder::default();
    // Drive the kinematic into overlap over a handful of steps.
    for step in 0..12 {
        let x = 3.0 - (step + 1) as f32 * 0.25;
        world.move_kinematic(pusher, Vec3::new(x, 1.0, 0.0), tremor::Quat::IDENTITY, DT);
        world.update_with_listener(&mut recorder, DT);
    }

    assert!(
        !world.body(sleeper).unwrap().sleeping,
        "dynamic body should be woken by the kinematic"
    );
    assert!(
        recorder
            .added
            .iter()
            .any(|&(a, b)| (a == sleeper && b == pusher) || (a == pusher && b == sleeper)),
        "a contact between the pair should exist"
    );
}

#[test]
fn static_bodies_never_move() {
    let (mut world, layer) = single_layer_world();
    let floor = static_floor(&mut world, layer);
    dynamic_sphere(&mut world, layer, Vec3::new(0.0, 3.0, 0.0), 0.3);

    let before = world.body(floor).unwrap().position;
    world.add_impulse(floor, Vec3::new(100.0, 100.0, 0.0)); // ignored
    for _ in 0..120 {
        world.update_with_listener(&mut NoopListener, DT);
    }
    let after = world.body(floor).unwrap().position;
    assert_eq!(before, after);
    assert_eq!(
        world.body(floor).unwrap().motion.linear_velocity,
        Vec3::ZERO
    );
}
