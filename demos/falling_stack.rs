//! Drops a small stack of boxes onto the ground and prints the simulation
//! state every half second.

use std::sync::Arc;

use tremor::{MotionType, PhysicsWorld, RigidBodyDesc, Shape, Vec3, WorldSettings};

fn main() {
    let mut settings = WorldSettings::new();
    let bp = settings.add_broad_phase_layer();
    let layer = settings.add_object_layer(bp).unwrap();
    settings.enable_collision(layer, layer).unwrap();
    let mut world = PhysicsWorld::new(settings);

    let ground = Arc::new(Shape::cuboid(Vec3::new(20.0, 0.5, 20.0)).unwrap());
    world
        .create_body(
            RigidBodyDesc::new(ground, MotionType::Static, layer)
                .position(Vec3::new(0.0, -0.5, 0.0)),
        )
        .unwrap();

    let unit = Arc::new(Shape::cuboid(Vec3::splat(0.5)).unwrap());
    let boxes: Vec<_> = (0..6)
        .map(|level| {
            world
                .create_body(
                    RigidBodyDesc::new(unit.clone(), MotionType::Dynamic, layer)
                        .position(Vec3::new(0.0, 1.0 + level as f32 * 1.05, 0.0))
                        .friction(0.6),
                )
                .unwrap()
        })
        .collect();

    let dt = 1.0 / 60.0;
    for step in 0..300 {
        world.update(dt);
        if step % 30 == 29 {
            let top = world.body(*boxes.last().unwrap()).unwrap();
            let asleep = boxes
                .iter()
                .filter(|&&id| world.body(id).unwrap().sleeping)
                .count();
            println!(
                "t={:.1}s top box y={:.3} sleeping={}/{}",
                (step + 1) as f32 * dt,
                top.position.y,
                asleep,
                boxes.len()
            );
        }
    }
}
