//! Scatters a few shapes and probes them with rays and a shape cast.

use std::sync::Arc;

use tremor::{
    AllCollector, ClosestCollector, MotionType, PhysicsWorld, QueryFilter, RayCastSettings,
    RayHit, RigidBodyDesc, Shape, ShapeCastHit, ShapeCastSettings, Vec3, WorldSettings,
};

fn main() {
    let mut settings = WorldSettings::new();
    let bp = settings.add_broad_phase_layer();
    let layer = settings.add_object_layer(bp).unwrap();
    settings.enable_collision(layer, layer).unwrap();
    let mut world = PhysicsWorld::new(settings);

    let shapes: Vec<Arc<Shape>> = vec![
        Arc::new(Shape::sphere(1.0).unwrap()),
        Arc::new(Shape::cuboid(Vec3::new(1.0, 2.0, 1.0)).unwrap()),
        Arc::new(Shape::capsule(0.5, 1.0).unwrap()),
    ];
    for (slot, shape) in shapes.into_iter().enumerate() {
        world
            .create_body(
                RigidBodyDesc::new(shape, MotionType::Static, layer)
                    .position(Vec3::new(slot as f32 * 6.0, 0.0, 10.0)),
            )
            .unwrap();
    }

    for x in [-2.0, 0.0, 6.0, 12.0] {
        let mut collector = ClosestCollector::<RayHit>::new();
        world.cast_ray(
            &mut collector,
            &RayCastSettings::default(),
            Vec3::new(x, 0.0, 0.0),
            Vec3::Z,
            50.0,
            &QueryFilter::default(),
        );
        match collector.hit {
            Some(hit) => println!(
                "ray at x={x}: hit {} at fraction {:.3}, normal {:?}",
                hit.body, hit.fraction, hit.normal
            ),
            None => println!("ray at x={x}: no hit"),
        }
    }

    let probe = Shape::sphere(0.5).unwrap();
    let mut sweep = AllCollector::<ShapeCastHit>::new();
    world.cast_shape(
        &mut sweep,
        &ShapeCastSettings::default(),
        &probe,
        Vec3::new(0.0, 0.0, 0.0),
        tremor::Quat::IDENTITY,
        Vec3::ONE,
        Vec3::new(0.0, 0.0, 40.0),
        &QueryFilter::default(),
    );
    println!("shape cast found {} hits", sweep.hits.len());
    for hit in sweep.hits {
        println!("  body {} at fraction {:.3}", hit.body, hit.fraction);
    }
}
