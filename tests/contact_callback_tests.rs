use std::sync::Arc;

use tremor::{
    BodyId, ContactView, MotionType, PhysicsListener, PhysicsWorld, RigidBodyDesc, Shape,
    SubShapeId, Vec3, WorldSettings,
};

const DT: f32 = 1.0 / 60.0;

fn world_with_layer() -> (PhysicsWorld, u32) {
    let mut settings = WorldSettings::new();
    let bp = settings.add_broad_phase_layer();
    let layer = settings.add_object_layer(bp).unwrap();
    settings.enable_collision(layer, layer).unwrap();
    (PhysicsWorld::new(settings), layer)
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum Event {
    Added,
    Persisted,
    Removed,
}

#[derive(Default)]
struct EventLog {
    events: Vec<(Event, BodyId, BodyId)>,
}

impl PhysicsListener for EventLog {
    fn on_contact_added(&mut self, contact: &ContactView<'_>) {
        self.events
            .push((Event::Added, contact.body_a, contact.body_b));
    }

    fn on_contact_persisted(&mut self, contact: &ContactView<'_>) {
        self.events
            .push((Event::Persisted, contact.body_a, contact.body_b));
    }

    fn on_contact_removed(
        &mut self,
        body_a: BodyId,
        body_b: BodyId,
        _sub_a: SubShapeId,
        _sub_b: SubShapeId,
    ) {
        self.events.push((Event::Removed, body_a, body_b));
    }
}

#[test]
fn contact_lifecycle_fires_added_persisted_removed_in_order() {
    let (mut world, layer) = world_with_layer();

    let floor = world
        .create_body(
            RigidBodyDesc::new(
                Arc::new(Shape::cuboid(Vec3::new(10.0, 0.5, 10.0)).unwrap()),
                MotionType::Static,
                layer,
            )
            .position(Vec3::new(0.0, -0.5, 0.0)),
        )
        .unwrap();
    let ball = world
        .create_body(
            RigidBodyDesc::new(
                Arc::new(Shape::sphere(0.5).unwrap()),
                MotionType::Dynamic,
                layer,
            )
            .position(Vec3::new(0.0, 1.2, 0.0))
            .damping(0.0, 0.0),
        )
        .unwrap();

    let mut log = EventLog::default();
    // Let it land and rest a moment.
    for _ in 0..90 {
        world.update_with_listener(&mut log, DT);
    }
    // Yank the ball far away; the contact must be removed.
    world.set_transform(ball, Vec3::new(0.0, 50.0, 0.0), tremor::Quat::IDENTITY, true);
    for _ in 0..3 {
        world.update_with_listener(&mut log, DT);
    }

    let pair_events: Vec<Event> = log
        .events
        .iter()
        .filter(|(_, a, b)| {
            (*a == floor || *a == ball) && (*b == floor || *b == ball)
        })
        .map(|(event, _, _)| *event)
        .collect();

    assert!(!pair_events.is_empty());
    assert_eq!(pair_events.first(), Some(&Event::Added));
    assert_eq!(pair_events.last(), Some(&Event::Removed));
    let added = pair_events.iter().filter(|e| **e == Event::Added).count();
    let removed = pair_events.iter().filter(|e| **e == Event::Removed).count();
    assert_eq!(added, removed, "every added contact is removed exactly once");
    // Between the first add and the final remove, only persists.
    for window in pair_events.windows(2) {
        if window[0] == Event::Removed {
            assert_eq!(window[1], Event::Added, "removed may only restart the cycle");
        }
    }
}

#[test]
fn removing_a_body_fires_contact_removed() {
    let (mut world, layer) = world_with_layer();
    let floor = world
        .create_body(
            RigidBodyDesc::new(
                Arc::new(Shape::cuboid(Vec3::new(10.0, 0.5, 10.0)).unwrap()),
                MotionType::Static,
                layer,
            )
            .position(Vec3::new(0.0, -0.5, 0.0)),
        )
        .unwrap();
    let ball = world
        .create_body(
            RigidBodyDesc::new(
                Arc::new(Shape::sphere(0.5).unwrap()),
                MotionType::Dynamic,
                layer,
            )
            .position(Vec3::new(0.0, 0.45, 0.0)),
        )
        .unwrap();

    let mut log = EventLog::default();
    for _ in 0..5 {
        world.update_with_listener(&mut log, DT);
    }
    assert!(log
        .events
        .iter()
        .any(|(event, _, _)| *event == Event::Added));

    world.remove_body(ball);
    world.update_with_listener(&mut log, DT);
    assert!(
        log.events
            .iter()
            .any(|(event, a, b)| *event == Event::Removed
                && (*a == ball || *b == ball)
                && (*a == floor || *b == floor)),
        "body removal must fire on_contact_removed"
    );
}

struct PairVeto {
    veto: (BodyId, BodyId),
    added: usize,
}

impl PhysicsListener for PairVeto {
    fn on_body_pair_validate(&mut self, body_a: BodyId, body_b: BodyId) -> bool {
        !((body_a == self.veto.0 && body_b == self.veto.1)
            || (body_a == self.veto.1 && body_b == self.veto.0))
    }

    fn on_contact_added(&mut self, _contact: &ContactView<'_>) {
        self.added += 1;
    }
}

#[test]
fn body_pair_validate_suppresses_narrowphase() {
    let (mut world, layer) = world_with_layer();
    let a = world
        .create_body(
            RigidBodyDesc::new(
                Arc::new(Shape::sphere(1.0).unwrap()),
                MotionType::Dynamic,
                layer,
            )
            .position(Vec3::ZERO),
        )
        .unwrap();
    let b = world
        .create_body(
            RigidBodyDesc::new(
                Arc::new(Shape::sphere(1.0).unwrap()),
                MotionType::Dynamic,
                layer,
            )
            .position(Vec3::new(1.0, 0.0, 0.0)),
        )
        .unwrap();

    let mut veto = PairVeto { veto: (a, b), added: 0 };
    world.update_with_listener(&mut veto, DT);
    assert_eq!(veto.added, 0, "vetoed pair must not produce contacts");
}

struct Conveyor {
    belt: BodyId,
    surface_velocity: Vec3,
}

impl PhysicsListener for Conveyor {
    fn on_contact_validate(
        &mut self,
        contact: &ContactView<'_>,
        settings: &mut tremor::collision::ContactSettings,
    ) -> bool {
        // Belt is always one of the two; velocity of B relative to A.
        let sign = if contact.body_a == self.belt { 1.0 } else { -1.0 };
        settings.relative_linear_surface_velocity = self.surface_velocity * sign;
        true
    }
}

#[test]
fn surface_velocity_drags_resting_bodies_along() {
    let (mut world, layer) = world_with_layer();
    let belt = world
        .create_body(
            RigidBodyDesc::new(
                Arc::new(Shape::cuboid(Vec3::new(10.0, 0.5, 2.0)).unwrap()),
                MotionType::Static,
                layer,
            )
            .position(Vec3::new(0.0, -0.5, 0.0)),
        )
        .unwrap();
    let crate_body = world
        .create_body(
            RigidBodyDesc::new(
                Arc::new(Shape::cuboid(Vec3::splat(0.5)).unwrap()),
                MotionType::Dynamic,
                layer,
            )
            .position(Vec3::new(0.0, 0.55, 0.0))
            .friction(0.9),
        )
        .unwrap();

    let mut conveyor = Conveyor {
        belt,
        surface_velocity: Vec3::new(1.5, 0.0, 0.0),
    };
    for _ in 0..120 {
        world.update_with_listener(&mut conveyor, DT);
    }

    let body = world.body(crate_body).unwrap();
    assert!(
        body.position.x > 0.5,
        "friction against the belt surface should carry the crate, x = {}",
        body.position.x
    );
}
