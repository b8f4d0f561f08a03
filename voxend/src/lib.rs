//! In-process authority over a voxel world's chunk data: lookups are answered
//! immediately for resident chunks, misses are generated asynchronously by a
//! background worker.

pub mod geom;

pub mod block;
pub mod chunk;

pub mod worldgen;
pub mod config;
pub mod server;
