//! World generation module. Generators are the collaborators turning chunk
//! coordinates into chunk contents, they are only ever invoked from the chunk
//! server's worker thread and are free to be arbitrarily slow.

use std::convert::Infallible;

use glam::{DVec2, IVec3};

use crate::chunk::{Chunk, CHUNK_WIDTH, CHUNK_HEIGHT};
use crate::block;

pub mod noise;
use noise::OctaveNoise;


/// A trait common to all chunk generators. The generator itself is immutable, all of
/// its mutable scratch state goes into the cache that the worker owns and gives back
/// on every call.
pub trait ChunkGenerator {

    /// Scratch state reused between two generated chunks, to avoid reallocations.
    type Cache: Default;

    /// The error type when the generator cannot produce a chunk.
    type Error: std::error::Error;

    /// Generate the chunk at the given coordinates. The given chunk is full of air
    /// blocks. On error the chunk is discarded and the coordinates become
    /// requestable again.
    fn generate(&self, cx: i32, cz: i32, chunk: &mut Chunk, cache: &mut Self::Cache) -> Result<(), Self::Error>;

}


/// A chunk generator that produces the same superflat layers everywhere.
#[derive(Debug, Clone, Copy)]
pub struct FlatGenerator;

impl FlatGenerator {

    /// Y position of the surface (grass) layer of every generated chunk.
    pub const SURFACE_HEIGHT: i32 = 4;

}

impl ChunkGenerator for FlatGenerator {

    type Cache = ();
    type Error = Infallible;

    fn generate(&self, _cx: i32, _cz: i32, chunk: &mut Chunk, _cache: &mut ()) -> Result<(), Infallible> {
        chunk.fill_block(IVec3::new(0, 0, 0), IVec3::new(16, 1, 16), block::BEDROCK, 0);
        chunk.fill_block(IVec3::new(0, 1, 0), IVec3::new(16, 3, 16), block::DIRT, 0);
        chunk.fill_block(IVec3::new(0, Self::SURFACE_HEIGHT, 0), IVec3::new(16, 1, 16), block::GRASS, 0);
        Ok(())
    }

}


/// A chunk generator producing hilly terrain from a fractal noise height map, basins
/// below sea level are filled with water and get sand instead of grass surface.
#[derive(Debug, Clone)]
pub struct NoiseGenerator {
    /// Fractal noise sampled for the surface height map.
    height_noise: OctaveNoise,
    /// Mean surface height.
    base_height: i32,
    /// Amplitude of the height map around the base height.
    amplitude: f64,
    /// Water fills every column up to this height.
    sea_level: i32,
}

/// Scratch state for the noise generator.
#[derive(Default)]
pub struct NoiseCache {
    /// Surface height of each column of the chunk being generated, in X-major order.
    heights: Vec<i32>,
}

impl NoiseGenerator {

    /// Horizontal scale of the height noise, in blocks per noise unit.
    const HEIGHT_NOISE_SCALE: f64 = 128.0;

    /// Create a new generator for the given seed, same seed gives same terrain.
    pub fn new(seed: u64) -> Self {
        Self {
            height_noise: OctaveNoise::new(seed, 4),
            base_height: 68,
            amplitude: 24.0,
            sea_level: 64,
        }
    }

    /// The height that water fills up to in generated chunks.
    pub fn sea_level(&self) -> i32 {
        self.sea_level
    }

    /// Compute the surface height of the column at the given block coordinates.
    fn calc_height(&self, x: i32, z: i32) -> i32 {
        let pos = DVec2::new(x as f64, z as f64) / Self::HEIGHT_NOISE_SCALE;
        let height = self.base_height as f64 + self.height_noise.sample(pos) * self.amplitude;
        (height as i32).clamp(1, CHUNK_HEIGHT as i32 - 1)
    }

}

impl ChunkGenerator for NoiseGenerator {

    type Cache = NoiseCache;
    type Error = Infallible;

    fn generate(&self, cx: i32, cz: i32, chunk: &mut Chunk, cache: &mut NoiseCache) -> Result<(), Infallible> {

        cache.heights.clear();
        for x in 0..CHUNK_WIDTH as i32 {
            for z in 0..CHUNK_WIDTH as i32 {
                cache.heights.push(self.calc_height(cx * CHUNK_WIDTH as i32 + x, cz * CHUNK_WIDTH as i32 + z));
            }
        }

        for x in 0..CHUNK_WIDTH as i32 {
            for z in 0..CHUNK_WIDTH as i32 {

                let height = cache.heights[(x as usize) * CHUNK_WIDTH + z as usize];

                chunk.set_block(IVec3::new(x, 0, z), block::BEDROCK);
                for y in 1..height {
                    let id = if y < height - 3 { block::STONE } else { block::DIRT };
                    chunk.set_block(IVec3::new(x, y, z), id);
                }

                // Submerged and shore columns get sand instead of grass.
                if height <= self.sea_level {
                    chunk.set_block(IVec3::new(x, height, z), block::SAND);
                } else {
                    chunk.set_block(IVec3::new(x, height, z), block::GRASS);
                }

                for y in height + 1..=self.sea_level {
                    chunk.set_block(IVec3::new(x, y, z), block::WATER);
                }

            }
        }

        Ok(())

    }

}
