use std::sync::Arc;

use approx::assert_abs_diff_eq;
use tremor::{
    AllowedDofs, BodyId, MassProperties, MotionType, PhysicsError, PhysicsWorld, RigidBodyDesc,
    Shape, SubShapeId, Vec3, WorldSettings,
};

const DT: f32 = 1.0 / 60.0;

fn world_with_layer() -> (PhysicsWorld, u32) {
    let mut settings = WorldSettings::new();
    let bp = settings.add_broad_phase_layer();
    let layer = settings.add_object_layer(bp).unwrap();
    settings.enable_collision(layer, layer).unwrap();
    (PhysicsWorld::new(settings), layer)
}

fn sphere_desc(layer: u32) -> RigidBodyDesc {
    RigidBodyDesc::new(
        Arc::new(Shape::sphere(0.5).unwrap()),
        MotionType::Dynamic,
        layer,
    )
}

#[test]
fn stale_ids_resolve_to_none_and_slots_reuse_sequences() {
    let (mut world, layer) = world_with_layer();
    let first = world.create_body(sphere_desc(layer)).unwrap();
    assert!(world.remove_body(first));

    let second = world.create_body(sphere_desc(layer)).unwrap();
    assert_eq!(first.index(), second.index());
    assert!(second.sequence() > first.sequence());

    assert!(world.body(first).is_none());
    assert!(world.body(second).is_some());
    assert!(!world.remove_body(first), "stale removal must be a no-op");
}

#[test]
fn body_ids_stay_unique_across_churn() {
    let (mut world, layer) = world_with_layer();
    let mut live: Vec<BodyId> = Vec::new();
    let mut all: Vec<BodyId> = Vec::new();

    for round in 0..8 {
        for _ in 0..4 {
            let id = world.create_body(sphere_desc(layer)).unwrap();
            live.push(id);
            all.push(id);
        }
        if round % 2 == 1 {
            for _ in 0..3 {
                let id = live.remove(0);
                world.remove_body(id);
            }
        }
    }

    let mut raws: Vec<u64> = all.iter().map(|id| id.raw()).collect();
    raws.sort_unstable();
    raws.dedup();
    assert_eq!(raws.len(), all.len(), "every (index, sequence) pair is unique");
}

#[test]
fn dynamic_body_without_mass_fails_cleanly() {
    let (mut world, layer) = world_with_layer();

    // A triangle mesh has no volume: a dynamic body needs an override.
    let mesh = tremor::TriangleMesh::builder(
        vec![Vec3::ZERO, Vec3::X, Vec3::Z],
        vec![[0, 1, 2]],
    )
    .build()
    .unwrap();
    let shape = Arc::new(Shape::mesh(mesh));

    let before = world.body_count();
    let result = world.create_body(RigidBodyDesc::new(
        shape.clone(),
        MotionType::Dynamic,
        layer,
    ));
    assert_eq!(result.unwrap_err(), PhysicsError::InvalidMass);
    assert_eq!(world.body_count(), before, "no partial state on failure");

    // With an explicit override the same description is accepted.
    let ok = world.create_body(
        RigidBodyDesc::new(shape.clone(), MotionType::Dynamic, layer)
            .mass_properties_override(MassProperties::new(2.0, Vec3::ONE)),
    );
    assert!(ok.is_ok());

    // As a static body it never needed mass in the first place.
    assert!(world
        .create_body(RigidBodyDesc::new(shape, MotionType::Static, layer))
        .is_ok());
}

#[test]
fn unknown_object_layer_is_rejected() {
    let (mut world, _) = world_with_layer();
    let result = world.create_body(sphere_desc(42));
    assert_eq!(result.unwrap_err(), PhysicsError::UnknownObjectLayer(42));
}

#[test]
fn locking_every_dof_is_rejected() {
    let (mut world, layer) = world_with_layer();
    let result = world.create_body(sphere_desc(layer).allowed_dofs(AllowedDofs::empty()));
    assert_eq!(result.unwrap_err(), PhysicsError::AllDofsLocked);
}

#[test]
fn locked_axes_hold_zero_velocity_through_steps() {
    let (mut world, layer) = world_with_layer();
    // Only vertical translation allowed; rotation fully locked.
    let body = world
        .create_body(sphere_desc(layer).allowed_dofs(AllowedDofs::TRANSLATION_Y))
        .unwrap();
    world.add_impulse(body, Vec3::new(5.0, 0.0, 5.0));
    world.add_angular_impulse(body, Vec3::new(1.0, 1.0, 1.0));

    for _ in 0..30 {
        world.update(DT);
        let state = world.body(body).unwrap();
        assert_eq!(state.motion.linear_velocity.x, 0.0);
        assert_eq!(state.motion.linear_velocity.z, 0.0);
        assert_eq!(state.motion.angular_velocity, Vec3::ZERO);
        assert!(state.motion.linear_velocity.y <= 0.0, "gravity still applies");
    }
}

#[test]
fn velocity_magnitudes_respect_the_caps() {
    let (mut world, layer) = world_with_layer();
    let mut desc = sphere_desc(layer).damping(0.0, 0.0);
    desc.max_linear_velocity = 10.0;
    desc.max_angular_velocity = 3.0;
    let body = world.create_body(desc).unwrap();

    world.add_impulse(body, Vec3::new(1000.0, 0.0, 0.0));
    world.add_angular_impulse(body, Vec3::new(0.0, 500.0, 0.0));
    for _ in 0..10 {
        world.update(DT);
        let state = world.body(body).unwrap();
        assert!(state.motion.linear_velocity.length() <= 10.0 + 1e-3);
        assert!(state.motion.angular_velocity.length() <= 3.0 + 1e-3);
    }
}

#[test]
fn sensors_report_contacts_without_pushing_back() {
    let (mut world, layer) = world_with_layer();

    let sensor_shape = Arc::new(Shape::cuboid(Vec3::new(2.0, 2.0, 2.0)).unwrap());
    world
        .create_body(
            RigidBodyDesc::new(sensor_shape, MotionType::Static, layer)
                .position(Vec3::new(0.0, -2.0, 0.0))
                .sensor(true),
        )
        .unwrap();
    let falling = world
        .create_body(sphere_desc(layer).position(Vec3::new(0.0, 2.0, 0.0)).damping(0.0, 0.0))
        .unwrap();

    struct Counter {
        added: usize,
    }
    impl tremor::PhysicsListener for Counter {
        fn on_contact_added(&mut self, _contact: &tremor::ContactView<'_>) {
            self.added += 1;
        }
    }

    let mut counter = Counter { added: 0 };
    for _ in 0..90 {
        world.update_with_listener(&mut counter, DT);
    }

    assert!(counter.added > 0, "sensor overlap should fire callbacks");
    let body = world.body(falling).unwrap();
    assert!(
        body.position.y < -1.0,
        "sensor must not block the fall, y = {}",
        body.position.y
    );
}

#[test]
fn surface_normal_is_unit_length_everywhere() {
    let (mut world, layer) = world_with_layer();
    let shapes: Vec<Arc<Shape>> = vec![
        Arc::new(Shape::sphere(1.0).unwrap()),
        Arc::new(Shape::cuboid(Vec3::new(1.0, 2.0, 0.5)).unwrap()),
        Arc::new(Shape::capsule(0.5, 1.0).unwrap()),
        Arc::new(Shape::cylinder(0.5, 1.0).unwrap()),
        Arc::new(Shape::tapered_capsule(0.6, 0.3, 0.8).unwrap()),
    ];

    for (slot, shape) in shapes.into_iter().enumerate() {
        let id = world
            .create_body(
                RigidBodyDesc::new(shape, MotionType::Static, layer)
                    .position(Vec3::new(slot as f32 * 10.0, 0.0, 0.0)),
            )
            .unwrap();
        for probe in [
            Vec3::new(0.9, 0.1, 0.0),
            Vec3::new(0.0, 1.1, 0.2),
            Vec3::new(-0.4, -0.9, 0.3),
        ] {
            let world_point = world.body(id).unwrap().position + probe;
            let normal = world
                .surface_normal(id, SubShapeId::EMPTY, world_point)
                .unwrap();
            assert!(
                (normal.length() - 1.0).abs() < 1e-4,
                "normal {normal:?} on shape {slot}"
            );
        }
    }
}

#[test]
fn velocity_at_point_composes_linear_and_angular_parts() {
    let (mut world, layer) = world_with_layer();
    let body = world.create_body(sphere_desc(layer)).unwrap();
    world.set_linear_velocity(body, Vec3::new(1.0, 0.0, 0.0));
    world.set_angular_velocity(body, Vec3::new(0.0, 0.0, 2.0));

    // At one meter above the center, w x r adds -2 m/s along X... times r.
    let at = world
        .velocity_at_point(body, Vec3::new(0.0, 1.0, 0.0))
        .unwrap();
    assert_abs_diff_eq!(at.x, 1.0 - 2.0, epsilon = 1e-4);
    let com = world.velocity_at_point_com(body, Vec3::ZERO).unwrap();
    assert_abs_diff_eq!(com.x, 1.0, epsilon = 1e-4);
}
