//! A chunk storing the blocks of a 16x256x16 column of the world, optimized for
//! runtime access.

use std::sync::{Arc, RwLock};

use glam::IVec3;

use crate::block;


/// Chunk size in both X and Z coordinates.
pub const CHUNK_WIDTH: usize = 16;
/// Chunk height.
pub const CHUNK_HEIGHT: usize = 256;
/// Internal chunk size, in number of elements per chunk.
const CHUNK_SIZE: usize = CHUNK_HEIGHT * CHUNK_WIDTH * CHUNK_WIDTH;


/// Shared handle to a chunk. The chunk server hands these out from its resident map
/// while keeping its own, so a chunk stays alive for as long as any holder needs it;
/// block edits go through the inner lock and are visible to every holder.
pub type SharedChunk = Arc<RwLock<Chunk>>;


/// Calculate the index in the chunk's arrays for the given chunk-local position, the
/// layout is `xxxx zzzz yyyy yyyy`. Only firsts relevant bits are taken in each
/// coordinate component.
#[inline]
fn calc_index(pos: IVec3) -> usize {
    debug_assert!(pos.y >= 0 && pos.y < CHUNK_HEIGHT as i32);
    let x = pos.x as u32 & 0b1111;
    let z = pos.z as u32 & 0b1111;
    let y = pos.y as u32 & 0b11111111;
    ((x << 12) | (z << 8) | y) as usize
}

/// Calculate the chunk position corresponding to the given block position. This returns
/// no position if the Y coordinate is invalid.
#[inline]
pub fn calc_chunk_pos(pos: IVec3) -> Option<(i32, i32)> {
    if pos.y < 0 || pos.y >= CHUNK_HEIGHT as i32 {
        None
    } else {
        Some(calc_chunk_pos_unchecked(pos))
    }
}

/// Calculate the chunk position corresponding to the given block position. The Y
/// coordinate is ignored, so it may be invalid.
#[inline]
pub fn calc_chunk_pos_unchecked(pos: IVec3) -> (i32, i32) {
    (pos.x >> 4, pos.z >> 4)
}


/// Data structure storing every chunk-local data, chunks are a world subdivision of
/// 16x256x16 blocks.
pub struct Chunk {
    /// The numeric identifier of the block.
    block: ChunkByteArray,
    /// Four bit metadata for each block.
    metadata: ChunkNibbleArray,
}

impl Chunk {

    /// Create a new chunk, full of air blocks, wrapped in a shared handle.
    pub fn new() -> SharedChunk {
        Arc::new(RwLock::new(Self {
            block: [block::AIR; CHUNK_SIZE],
            metadata: ChunkNibbleArray::new(0),
        }))
    }

    /// Get block id at the given global position (rebased to chunk-local).
    /// Panics if Y component of the position is not between 0 and 256 (excluded).
    #[inline]
    pub fn block(&self, pos: IVec3) -> u8 {
        self.block[calc_index(pos)]
    }

    /// Set block id at the given global position (rebased to chunk-local).
    /// Panics if Y component of the position is not between 0 and 256 (excluded).
    #[inline]
    pub fn set_block(&mut self, pos: IVec3, block: u8) {
        self.block[calc_index(pos)] = block;
    }

    /// Get block metadata at the given global position (rebased to chunk-local).
    /// Panics if Y component of the position is not between 0 and 256 (excluded).
    #[inline]
    pub fn metadata(&self, pos: IVec3) -> u8 {
        self.metadata.get(calc_index(pos))
    }

    /// Set block metadata at the given global position (rebased to chunk-local).
    /// Panics if Y component of the position is not between 0 and 256 (excluded).
    #[inline]
    pub fn set_metadata(&mut self, pos: IVec3, metadata: u8) {
        self.metadata.set(calc_index(pos), metadata);
    }

    /// Get block id and metadata at the given global position (rebased to chunk-local).
    /// Panics if Y component of the position is not between 0 and 256 (excluded).
    #[inline]
    pub fn block_and_metadata(&self, pos: IVec3) -> (u8, u8) {
        let index = calc_index(pos);
        (self.block[index], self.metadata.get(index))
    }

    /// Set block id and metadata at the given global position (rebased to chunk-local).
    /// Panics if Y component of the position is not between 0 and 256 (excluded).
    #[inline]
    pub fn set_block_and_metadata(&mut self, pos: IVec3, block: u8, metadata: u8) {
        let index = calc_index(pos);
        self.block[index] = block;
        self.metadata.set(index, metadata);
    }

    /// Fill the given chunk area with given block id and metadata.
    /// Panics if the area is not fully contained in the chunk's height.
    pub fn fill_block(&mut self, start: IVec3, size: IVec3, id: u8, metadata: u8) {

        for x in start.x..start.x + size.x {
            for z in start.z..start.z + size.z {
                let mut index = calc_index(IVec3::new(x, start.y, z));
                for _ in start.y..start.y + size.y {

                    self.block[index] = id;
                    self.metadata.set(index, metadata);

                    // Increment Y component.
                    index += 1;

                }
            }
        }

    }

}

/// Type alias for a chunk array that stores `u8 * CHUNK_SIZE` values.
type ChunkByteArray = [u8; CHUNK_SIZE];

/// Special arrays for chunks that stores `u4 * CHUNK_SIZE` values.
struct ChunkNibbleArray {
    inner: [u8; CHUNK_SIZE / 2]
}

impl ChunkNibbleArray {

    const fn new(init: u8) -> Self {
        debug_assert!(init <= 0x0F);
        let init = init << 4 | init;
        Self { inner: [init; CHUNK_SIZE / 2] }
    }

    #[inline]
    fn get(&self, index: usize) -> u8 {
        let slot = self.inner[index >> 1];
        if index & 1 == 0 {
            slot & 0x0F
        } else {
            (slot & 0xF0) >> 4
        }
    }

    #[inline]
    fn set(&mut self, index: usize, value: u8) {
        debug_assert!(value <= 0x0F);
        let slot = &mut self.inner[index >> 1];
        if index & 1 == 0 {
            *slot = (*slot & 0xF0) | value;
        } else {
            *slot = (*slot & 0x0F) | (value << 4);
        }
    }

}


#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn chunk_pos() {
        assert_eq!(calc_chunk_pos(IVec3::new(0, 0, 0)), Some((0, 0)));
        assert_eq!(calc_chunk_pos(IVec3::new(15, 255, 15)), Some((0, 0)));
        assert_eq!(calc_chunk_pos(IVec3::new(16, 0, -1)), Some((1, -1)));
        assert_eq!(calc_chunk_pos(IVec3::new(-16, 0, -17)), Some((-1, -2)));
        assert_eq!(calc_chunk_pos(IVec3::new(0, -1, 0)), None);
        assert_eq!(calc_chunk_pos(IVec3::new(0, 256, 0)), None);
    }

    #[test]
    fn block_rebase() {

        let handle = Chunk::new();
        let mut chunk = handle.write().unwrap();

        // Positions of different chunks with equal local coordinates alias each other.
        chunk.set_block_and_metadata(IVec3::new(1, 2, 3), block::STONE, 5);
        assert_eq!(chunk.block_and_metadata(IVec3::new(1, 2, 3)), (block::STONE, 5));
        assert_eq!(chunk.block_and_metadata(IVec3::new(17, 2, -13)), (block::STONE, 5));
        assert_eq!(chunk.block(IVec3::new(2, 2, 3)), block::AIR);

    }

    #[test]
    fn nibble_neighbors() {

        let handle = Chunk::new();
        let mut chunk = handle.write().unwrap();

        // Adjacent Y positions share a metadata byte.
        chunk.set_metadata(IVec3::new(0, 4, 0), 0xA);
        chunk.set_metadata(IVec3::new(0, 5, 0), 0x5);
        assert_eq!(chunk.metadata(IVec3::new(0, 4, 0)), 0xA);
        assert_eq!(chunk.metadata(IVec3::new(0, 5, 0)), 0x5);

    }

    #[test]
    fn fill() {

        let handle = Chunk::new();
        let mut chunk = handle.write().unwrap();

        chunk.fill_block(IVec3::new(0, 8, 0), IVec3::new(16, 2, 16), block::SAND, 1);
        assert_eq!(chunk.block_and_metadata(IVec3::new(0, 8, 0)), (block::SAND, 1));
        assert_eq!(chunk.block_and_metadata(IVec3::new(15, 9, 15)), (block::SAND, 1));
        assert_eq!(chunk.block(IVec3::new(0, 7, 0)), block::AIR);
        assert_eq!(chunk.block(IVec3::new(0, 10, 0)), block::AIR);

    }

}
