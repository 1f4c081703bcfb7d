use std::sync::Arc;

use tremor::{
    BodyId, ConstraintSpace, MotionType, MotorState, PhysicsWorld, RigidBodyDesc, Shape,
    SixDofAxis, Vec3, WorldSettings,
};

const DT: f32 = 1.0 / 60.0;

fn world_without_gravity() -> (PhysicsWorld, u32) {
    let mut settings = WorldSettings::new();
    settings.gravity_enabled = false;
    let bp = settings.add_broad_phase_layer();
    let layer = settings.add_object_layer(bp).unwrap();
    settings.enable_collision(layer, layer).unwrap();
    (PhysicsWorld::new(settings), layer)
}

fn unit_box(world: &mut PhysicsWorld, layer: u32, motion: MotionType, position: Vec3) -> BodyId {
    let shape = Arc::new(Shape::cuboid(Vec3::splat(0.5)).unwrap());
    // Joint test rigs overlap on purpose; mask out body-vs-body collision.
    world
        .create_body(
            RigidBodyDesc::new(shape, motion, layer)
                .position(position)
                .damping(0.0, 0.0)
                .collision_filter(u32::MAX, 0),
        )
        .unwrap()
}

#[test]
fn hinge_motor_spins_up_to_target_velocity() {
    let (mut world, layer) = world_without_gravity();
    let base = unit_box(&mut world, layer, MotionType::Static, Vec3::ZERO);
    let wheel = unit_box(&mut world, layer, MotionType::Dynamic, Vec3::ZERO);

    let hinge = world
        .create_hinge_constraint(base, wheel, ConstraintSpace::World, Vec3::ZERO, Vec3::Z)
        .unwrap();
    world.set_motor_state(hinge, MotorState::Velocity);
    world.set_target_velocity(hinge, 5.0);

    for _ in 0..120 {
        world.update(DT);
    }

    let spin = world.body(wheel).unwrap().motion.angular_velocity.z;
    assert!((spin - 5.0).abs() < 0.25, "wheel spin was {spin}");
}

#[test]
fn hinge_limits_clamp_the_swing() {
    let (mut world, layer) = world_without_gravity();
    let base = unit_box(&mut world, layer, MotionType::Static, Vec3::ZERO);
    let arm = unit_box(&mut world, layer, MotionType::Dynamic, Vec3::ZERO);

    let hinge = world
        .create_hinge_constraint(base, arm, ConstraintSpace::World, Vec3::ZERO, Vec3::Z)
        .unwrap();
    if let Some(constraint) = world.constraint_mut(hinge) {
        if let tremor::dynamics::ConstraintKind::Hinge(j) = &mut constraint.kind {
            j.limits = Some((-0.4, 0.4));
        }
    }
    // Spin the arm hard into the limit.
    world.set_angular_velocity(arm, Vec3::new(0.0, 0.0, 8.0));

    for _ in 0..180 {
        world.update(DT);
    }

    let angle = world.current_position(hinge).unwrap();
    assert!(
        angle.abs() <= 0.6,
        "hinge angle {angle} escaped the limit range"
    );
}

#[test]
fn fixed_constraint_welds_bodies_together() {
    let (mut world, layer) = world_without_gravity();
    world.settings.gravity_enabled = true;

    let anchor = unit_box(&mut world, layer, MotionType::Static, Vec3::new(0.0, 5.0, 0.0));
    let hanging = unit_box(
        &mut world,
        layer,
        MotionType::Dynamic,
        Vec3::new(1.0, 5.0, 0.0),
    );
    world
        .create_fixed_constraint(anchor, hanging, ConstraintSpace::World, Vec3::new(0.5, 5.0, 0.0))
        .unwrap();

    for _ in 0..180 {
        world.update(DT);
    }

    let body = world.body(hanging).unwrap();
    assert!(
        (body.position - Vec3::new(1.0, 5.0, 0.0)).length() < 0.1,
        "welded body drifted to {:?}",
        body.position
    );
}

#[test]
fn point_constraint_keeps_pivots_together_under_load() {
    let (mut world, layer) = world_without_gravity();
    world.settings.gravity_enabled = true;

    let anchor = unit_box(&mut world, layer, MotionType::Static, Vec3::new(0.0, 5.0, 0.0));
    let bob = unit_box(
        &mut world,
        layer,
        MotionType::Dynamic,
        Vec3::new(1.5, 5.0, 0.0),
    );
    world
        .create_point_constraint(
            anchor,
            bob,
            ConstraintSpace::World,
            Vec3::new(0.5, 5.0, 0.0),
            Vec3::new(0.5, 5.0, 0.0),
        )
        .unwrap();

    for _ in 0..240 {
        world.update(DT);
    }

    // The pendulum may swing, but the pivot gap stays closed.
    let anchor_body = world.body(anchor).unwrap();
    let bob_body = world.body(bob).unwrap();
    let pivot_world = Vec3::new(0.5, 5.0, 0.0);
    let _ = anchor_body;
    let distance = (bob_body.center_of_mass_position() - pivot_world).length();
    assert!(
        (distance - 1.0).abs() < 0.15,
        "pivot arm length drifted: {distance}"
    );
}

#[test]
fn slider_restricts_motion_to_its_axis() {
    let (mut world, layer) = world_without_gravity();
    let rail = unit_box(&mut world, layer, MotionType::Static, Vec3::ZERO);
    let slider = unit_box(&mut world, layer, MotionType::Dynamic, Vec3::new(1.0, 0.0, 0.0));

    let joint = world
        .create_slider_constraint(rail, slider, ConstraintSpace::World, Vec3::ZERO, Vec3::X)
        .unwrap();
    if let Some(constraint) = world.constraint_mut(joint) {
        if let tremor::dynamics::ConstraintKind::Slider(j) = &mut constraint.kind {
            j.limits = Some((-2.0, 2.0));
        }
    }

    // Push diagonally; only the X component should survive.
    world.add_impulse(slider, Vec3::new(3.0, 3.0, 0.0));
    for _ in 0..120 {
        world.update(DT);
    }

    let body = world.body(slider).unwrap();
    assert!(body.position.y.abs() < 0.05, "slider left its axis: {:?}", body.position);
    assert!(body.position.z.abs() < 0.05);
    let travel = world.current_position(joint).unwrap();
    assert!(
        (-2.1..=2.1).contains(&travel),
        "slider escaped its limits: {travel}"
    );
}

#[test]
fn cone_constraint_limits_axis_deviation() {
    let (mut world, layer) = world_without_gravity();
    let base = unit_box(&mut world, layer, MotionType::Static, Vec3::ZERO);
    let limb = unit_box(&mut world, layer, MotionType::Dynamic, Vec3::new(0.0, -1.0, 0.0));

    let cone = world
        .create_cone_constraint(
            base,
            limb,
            ConstraintSpace::World,
            Vec3::ZERO,
            Vec3::NEG_Y,
            0.5,
        )
        .unwrap();
    world.set_angular_velocity(limb, Vec3::new(4.0, 0.0, 0.0));

    for _ in 0..240 {
        world.update(DT);
    }

    let angle = world.current_position(cone).unwrap();
    assert!(angle <= 0.7, "cone opened to {angle}");
}

#[test]
fn six_dof_fixed_axes_hold_while_free_axes_move() {
    let (mut world, layer) = world_without_gravity();
    let frame = unit_box(&mut world, layer, MotionType::Static, Vec3::ZERO);
    let probe = unit_box(&mut world, layer, MotionType::Dynamic, Vec3::new(0.0, 0.0, 0.0));

    // Free along X, everything else fixed.
    let axes = [
        SixDofAxis::free(),
        SixDofAxis::fixed(),
        SixDofAxis::fixed(),
        SixDofAxis::fixed(),
        SixDofAxis::fixed(),
        SixDofAxis::fixed(),
    ];
    world
        .create_six_dof_constraint(
            frame,
            probe,
            ConstraintSpace::World,
            Vec3::ZERO,
            tremor::Quat::IDENTITY,
            axes,
        )
        .unwrap();

    world.add_impulse(probe, Vec3::new(2.0, 2.0, 2.0));
    for _ in 0..120 {
        world.update(DT);
    }

    let body = world.body(probe).unwrap();
    assert!(body.position.x.abs() > 0.2, "free axis should move: {:?}", body.position);
    assert!(body.position.y.abs() < 0.1, "fixed axis leaked: {:?}", body.position);
    assert!(body.position.z.abs() < 0.1);
}

#[test]
fn bodies_share_constraint_tracks_attachment() {
    let (mut world, layer) = world_without_gravity();
    let a = unit_box(&mut world, layer, MotionType::Dynamic, Vec3::ZERO);
    let b = unit_box(&mut world, layer, MotionType::Dynamic, Vec3::new(2.0, 0.0, 0.0));
    let c = unit_box(&mut world, layer, MotionType::Dynamic, Vec3::new(4.0, 0.0, 0.0));

    assert!(!world.bodies_share_constraint(a, b));
    let joint = world
        .create_distance_constraint(
            a,
            b,
            ConstraintSpace::World,
            Vec3::ZERO,
            Vec3::new(2.0, 0.0, 0.0),
            0.0,
            3.0,
            None,
        )
        .unwrap();
    assert!(world.bodies_share_constraint(a, b));
    assert!(world.bodies_share_constraint(b, a));
    assert!(!world.bodies_share_constraint(a, c));

    world.remove_constraint(joint);
    assert!(!world.bodies_share_constraint(a, b));
}
