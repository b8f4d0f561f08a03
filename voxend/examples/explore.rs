//! Request a square of chunks around the origin, wait for the background worker to
//! generate them and cast a ray down to find the surface.

use std::thread;
use std::time::Duration;

use glam::DVec3;

use voxend::server::{LocalServer, Server};
use voxend::worldgen::NoiseGenerator;
use voxend::chunk::CHUNK_HEIGHT;


const RADIUS: i32 = 3;


fn main() {

    tracing_subscriber::fmt::init();

    let server = LocalServer::new(NoiseGenerator::new(9999));

    for cx in -RADIUS..=RADIUS {
        for cz in -RADIUS..=RADIUS {
            server.get_chunk(cx, cz, true);
        }
    }

    let total = ((RADIUS * 2 + 1) * (RADIUS * 2 + 1)) as usize;
    while server.resident_count() < total {
        thread::sleep(Duration::from_millis(10));
    }

    let stats = server.stats();
    println!("generated {} chunks in {:?}", stats.generated_count(), stats.generated_duration());

    let origin = DVec3::new(0.5, CHUNK_HEIGHT as f64 - 1.0, 0.5);
    match server.raycast_block(origin, DVec3::NEG_Y, CHUNK_HEIGHT as f64) {
        Some(hit) => println!("surface block #{} at {}, entered through {:?} face at {}", hit.block, hit.pos, hit.face, hit.point),
        None => println!("no surface below {origin}"),
    }

}
