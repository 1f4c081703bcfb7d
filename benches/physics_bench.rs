use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use tremor::{
    ClosestCollector, MotionType, PhysicsWorld, QueryFilter, RayCastSettings, RayHit,
    RigidBodyDesc, Shape, Vec3, WorldSettings,
};

fn build_pile(count_per_axis: u32) -> PhysicsWorld {
    let mut settings = WorldSettings::new();
    let bp = settings.add_broad_phase_layer();
    let layer = settings.add_object_layer(bp).unwrap();
    settings.enable_collision(layer, layer).unwrap();
    let mut world = PhysicsWorld::new(settings);

    let floor = Arc::new(Shape::cuboid(Vec3::new(100.0, 0.5, 100.0)).unwrap());
    world
        .create_body(
            RigidBodyDesc::new(floor, MotionType::Static, layer)
                .position(Vec3::new(0.0, -0.5, 0.0)),
        )
        .unwrap();

    let unit = Arc::new(Shape::cuboid(Vec3::splat(0.45)).unwrap());
    for x in 0..count_per_axis {
        for y in 0..count_per_axis {
            for z in 0..count_per_axis {
                world
                    .create_body(
                        RigidBodyDesc::new(unit.clone(), MotionType::Dynamic, layer).position(
                            Vec3::new(x as f32, 0.5 + y as f32, z as f32),
                        ),
                    )
                    .unwrap();
            }
        }
    }
    world
}

fn bench_world_step(c: &mut Criterion) {
    c.bench_function("step_pile_5x5x5", |b| {
        let mut world = build_pile(5);
        // Settle a few frames so the benchmark measures steady state.
        for _ in 0..30 {
            world.update(1.0 / 60.0);
        }
        b.iter(|| world.update(1.0 / 60.0));
    });
}

fn bench_ray_casts(c: &mut Criterion) {
    let world = build_pile(6);
    c.bench_function("cast_ray_through_pile", |b| {
        b.iter(|| {
            let mut collector = ClosestCollector::<RayHit>::new();
            world.cast_ray(
                &mut collector,
                &RayCastSettings::default(),
                Vec3::new(-10.0, 1.0, 2.0),
                Vec3::X,
                100.0,
                &QueryFilter::default(),
            );
            collector.hit
        });
    });
}

criterion_group!(benches, bench_world_step, bench_ray_casts);
criterion_main!(benches);
