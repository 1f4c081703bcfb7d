use std::sync::Arc;

use approx::assert_abs_diff_eq;
use tremor::{
    AllCollector, AnyCollector, ClosestCollector, CollideSettings, MotionType, OverlapHit,
    PhysicsWorld, PointHit, QueryFilter, RayCastSettings, RayHit, RigidBodyDesc, Shape,
    ShapeCastHit, ShapeCastSettings, Vec3, WorldSettings,
};

fn world_with_layer() -> (PhysicsWorld, u32) {
    let mut settings = WorldSettings::new();
    let bp = settings.add_broad_phase_layer();
    let layer = settings.add_object_layer(bp).unwrap();
    settings.enable_collision(layer, layer).unwrap();
    (PhysicsWorld::new(settings), layer)
}

fn sphere_at(world: &mut PhysicsWorld, layer: u32, position: Vec3, radius: f32) -> tremor::BodyId {
    let shape = Arc::new(Shape::sphere(radius).unwrap());
    world
        .create_body(RigidBodyDesc::new(shape, MotionType::Static, layer).position(position))
        .unwrap()
}

#[test]
fn closest_ray_hit_wins_and_reports_fraction_and_normal() {
    let (mut world, layer) = world_with_layer();
    let near = sphere_at(&mut world, layer, Vec3::new(0.0, 0.0, 5.0), 1.0);
    sphere_at(&mut world, layer, Vec3::new(0.0, 0.0, 12.0), 1.0);

    let mut collector = ClosestCollector::<RayHit>::new();
    world.cast_ray(
        &mut collector,
        &RayCastSettings::default(),
        Vec3::ZERO,
        Vec3::Z,
        100.0,
        &QueryFilter::default(),
    );

    let hit = collector.hit.expect("ray should hit the near sphere");
    assert_eq!(hit.body, near);
    assert_abs_diff_eq!(hit.fraction, 0.04, epsilon = 1e-3);
    assert_abs_diff_eq!(hit.point.z, 4.0, epsilon = 1e-2);
    assert!(hit.normal.z < -0.99, "normal {:?}", hit.normal);
    assert_abs_diff_eq!(hit.normal.length(), 1.0, epsilon = 1e-4);
}

#[test]
fn all_collector_gathers_every_body_on_the_ray() {
    let (mut world, layer) = world_with_layer();
    sphere_at(&mut world, layer, Vec3::new(0.0, 0.0, 5.0), 1.0);
    sphere_at(&mut world, layer, Vec3::new(0.0, 0.0, 12.0), 1.0);
    sphere_at(&mut world, layer, Vec3::new(0.0, 7.0, 5.0), 1.0); // off the ray

    let mut collector = AllCollector::<RayHit>::new();
    world.cast_ray(
        &mut collector,
        &RayCastSettings::default(),
        Vec3::ZERO,
        Vec3::Z,
        100.0,
        &QueryFilter::default(),
    );
    assert_eq!(collector.hits.len(), 2);

    let mut any = AnyCollector::<RayHit>::new();
    world.cast_ray(
        &mut any,
        &RayCastSettings::default(),
        Vec3::ZERO,
        Vec3::Z,
        100.0,
        &QueryFilter::default(),
    );
    assert!(any.hit.is_some());
}

#[test]
fn query_filter_predicate_excludes_bodies() {
    let (mut world, layer) = world_with_layer();
    let skip_me = sphere_at(&mut world, layer, Vec3::new(0.0, 0.0, 5.0), 1.0);
    let target = sphere_at(&mut world, layer, Vec3::new(0.0, 0.0, 12.0), 1.0);

    let predicate = |body: &tremor::RigidBody| body.id != skip_me;
    let filter = QueryFilter {
        predicate: Some(&predicate),
        ..QueryFilter::default()
    };
    let mut collector = ClosestCollector::<RayHit>::new();
    world.cast_ray(
        &mut collector,
        &RayCastSettings::default(),
        Vec3::ZERO,
        Vec3::Z,
        100.0,
        &filter,
    );
    assert_eq!(collector.hit.unwrap().body, target);
}

#[test]
fn ray_against_box_and_mesh_reports_face_normals() {
    let (mut world, layer) = world_with_layer();
    let box_shape = Arc::new(Shape::cuboid(Vec3::new(1.0, 2.0, 3.0)).unwrap());
    world
        .create_body(
            RigidBodyDesc::new(box_shape, MotionType::Static, layer)
                .position(Vec3::new(10.0, 0.0, 0.0)),
        )
        .unwrap();

    let mesh = tremor::TriangleMesh::builder(
        vec![
            Vec3::new(-5.0, 0.0, -5.0),
            Vec3::new(5.0, 0.0, -5.0),
            Vec3::new(5.0, 0.0, 5.0),
            Vec3::new(-5.0, 0.0, 5.0),
        ],
        vec![[0, 1, 2], [0, 2, 3]],
    )
    .build()
    .unwrap();
    world
        .create_body(
            RigidBodyDesc::new(
                Arc::new(Shape::mesh(mesh)),
                MotionType::Static,
                layer,
            )
            .position(Vec3::new(0.0, -10.0, 0.0)),
        )
        .unwrap();

    // Box face.
    let mut collector = ClosestCollector::<RayHit>::new();
    world.cast_ray(
        &mut collector,
        &RayCastSettings::default(),
        Vec3::ZERO,
        Vec3::X,
        100.0,
        &QueryFilter::default(),
    );
    let hit = collector.hit.unwrap();
    assert_abs_diff_eq!(hit.point.x, 9.0, epsilon = 1e-2);
    assert!(hit.normal.x < -0.99);

    // Mesh triangle, normal facing the ray origin.
    let mut collector = ClosestCollector::<RayHit>::new();
    world.cast_ray(
        &mut collector,
        &RayCastSettings::default(),
        Vec3::new(1.0, 0.0, 1.0),
        Vec3::NEG_Y,
        100.0,
        &QueryFilter::default(),
    );
    let hit = collector.hit.unwrap();
    assert_abs_diff_eq!(hit.fraction * 100.0, 10.0, epsilon = 1e-2);
    assert!(hit.normal.y > 0.99);
}

#[test]
fn shape_cast_reports_time_of_impact() {
    let (mut world, layer) = world_with_layer();
    sphere_at(&mut world, layer, Vec3::new(0.0, 0.0, 10.0), 1.0);

    let cast = Shape::sphere(1.0).unwrap();
    let mut collector = ClosestCollector::<ShapeCastHit>::new();
    world.cast_shape(
        &mut collector,
        &ShapeCastSettings::default(),
        &cast,
        Vec3::ZERO,
        tremor::Quat::IDENTITY,
        Vec3::ONE,
        Vec3::new(0.0, 0.0, 20.0),
        &QueryFilter::default(),
    );

    let hit = collector.hit.expect("sweep should reach the sphere");
    // Surfaces meet after 8 of the 20 units: fraction 0.4.
    assert_abs_diff_eq!(hit.fraction, 0.4, epsilon = 0.02);
    assert!(hit.fraction > 0.0 && hit.fraction <= 1.0);
}

#[test]
fn overlapping_shape_cast_starts_at_fraction_zero() {
    let (mut world, layer) = world_with_layer();
    sphere_at(&mut world, layer, Vec3::new(0.0, 0.0, 1.0), 1.0);

    let cast = Shape::sphere(1.0).unwrap();
    let mut collector = ClosestCollector::<ShapeCastHit>::new();
    world.cast_shape(
        &mut collector,
        &ShapeCastSettings::default(),
        &cast,
        Vec3::ZERO,
        tremor::Quat::IDENTITY,
        Vec3::ONE,
        Vec3::new(0.0, 0.0, 5.0),
        &QueryFilter::default(),
    );

    let hit = collector.hit.expect("initially penetrating cast must hit");
    assert_eq!(hit.fraction, 0.0);
    assert!(hit.penetration_axis.length() > 0.5);
}

#[test]
fn collide_point_finds_containing_bodies() {
    let (mut world, layer) = world_with_layer();
    let ball = sphere_at(&mut world, layer, Vec3::new(0.0, 0.0, 0.0), 2.0);
    sphere_at(&mut world, layer, Vec3::new(10.0, 0.0, 0.0), 1.0);

    let mut collector = AllCollector::<PointHit>::new();
    world.collide_point(
        &mut collector,
        Vec3::new(0.5, 0.5, 0.5),
        &QueryFilter::default(),
    );
    assert_eq!(collector.hits.len(), 1);
    assert_eq!(collector.hits[0].body, ball);

    let mut collector = AllCollector::<PointHit>::new();
    world.collide_point(
        &mut collector,
        Vec3::new(5.0, 0.0, 0.0),
        &QueryFilter::default(),
    );
    assert!(collector.hits.is_empty());
}

#[test]
fn collide_shape_reports_overlap_depth_and_normal() {
    let (mut world, layer) = world_with_layer();
    let ball = sphere_at(&mut world, layer, Vec3::new(0.0, 0.0, 0.0), 1.0);

    let probe = Shape::sphere(1.0).unwrap();
    let mut collector = AllCollector::<OverlapHit>::new();
    world.collide_shape(
        &mut collector,
        &CollideSettings::default(),
        &probe,
        Vec3::new(1.5, 0.0, 0.0),
        tremor::Quat::IDENTITY,
        Vec3::ONE,
        &QueryFilter::default(),
    );

    assert_eq!(collector.hits.len(), 1);
    let hit = &collector.hits[0];
    assert_eq!(hit.body, ball);
    assert_abs_diff_eq!(hit.depth, 0.5, epsilon = 0.05);
    assert!(hit.normal.x < -0.9, "normal {:?}", hit.normal);
}
