//! Block store with an occupancy bitmap
//!
//! Owns a fixed pool of equally sized blocks on a [`BlockDevice`] and tracks
//! which of them are in use.
//!
//! ## Allocation Model
//! - Index-based, not contiguous: any free blocks satisfy a request
//! - The bitmap is scanned left to right; lower indices are preferred
//! - A request either gets every block it needs or nothing at all
//!
//! ## Ownership
//! A block is marked occupied exactly while one caller holds its index.
//! Freed blocks are zeroed so a later allocation never observes old content.

use hal::{BlockDevice, BlockError};
use log::{debug, warn};
use thiserror::Error;

/// Errors produced by the block store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockStoreError {
    /// Not enough free blocks for the request
    #[error("out of space: {requested} blocks requested, {available} free")]
    OutOfSpace { requested: usize, available: usize },

    /// Index is outside the device
    #[error("block {0} is outside the store")]
    OutOfRange(u64),

    /// Index is not currently allocated
    #[error("block {0} is not allocated")]
    NotAllocated(u64),

    /// Content longer than the blocks provided for it
    #[error("{len} bytes do not fit in {blocks} blocks")]
    ContentTooLarge { len: usize, blocks: usize },

    /// The underlying device failed
    #[error("device error: {0}")]
    Device(#[from] BlockError),
}

/// Fixed-capacity block allocator and byte mover
pub struct BlockStore<D: BlockDevice> {
    device: D,
    /// `true` = occupied
    bitmap: Vec<bool>,
    block_size: usize,
}

impl<D: BlockDevice> BlockStore<D> {
    /// Wraps a zeroed device; every block starts free
    pub fn new(device: D) -> Self {
        let block_count = device.block_count() as usize;
        let block_size = device.block_size();
        Self {
            device,
            bitmap: vec![false; block_count],
            block_size,
        }
    }

    /// Size of one block in bytes
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Total number of blocks
    pub fn capacity(&self) -> usize {
        self.bitmap.len()
    }

    /// Number of occupied blocks
    pub fn used_blocks(&self) -> usize {
        self.bitmap.iter().filter(|occupied| **occupied).count()
    }

    /// Number of free blocks
    pub fn free_blocks(&self) -> usize {
        self.capacity() - self.used_blocks()
    }

    /// Returns whether `idx` is currently occupied
    pub fn is_allocated(&self, idx: u64) -> bool {
        self.bitmap.get(idx as usize).copied().unwrap_or(false)
    }

    /// Occupancy bitmap, one flag per block
    pub fn bitmap(&self) -> &[bool] {
        &self.bitmap
    }

    /// Number of blocks needed to hold `byte_count` bytes (at least one)
    pub fn blocks_required(&self, byte_count: usize) -> usize {
        byte_count.div_ceil(self.block_size).max(1)
    }

    /// Gets the underlying device (for inspection)
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Gets mutable access to the underlying device
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Allocates enough blocks for `byte_count` bytes
    ///
    /// Returns the indices in ascending order. On failure the bitmap is left
    /// exactly as it was before the call.
    pub fn allocate(&mut self, byte_count: usize) -> Result<Vec<u64>, BlockStoreError> {
        let needed = self.blocks_required(byte_count);
        let mut indices = Vec::with_capacity(needed);

        for (idx, occupied) in self.bitmap.iter_mut().enumerate() {
            if indices.len() == needed {
                break;
            }
            if !*occupied {
                *occupied = true;
                indices.push(idx as u64);
            }
        }

        if indices.len() < needed {
            // Roll back the tentative marks
            for &idx in &indices {
                self.bitmap[idx as usize] = false;
            }
            let available = indices.len();
            warn!(
                "block allocation failed: {} blocks requested, {} free",
                needed,
                available
            );
            return Err(BlockStoreError::OutOfSpace {
                requested: needed,
                available,
            });
        }

        debug!("allocated blocks {:?} for {} bytes", indices, byte_count);
        Ok(indices)
    }

    /// Releases blocks and zeroes their contents
    ///
    /// Every index is validated before anything changes. Once validation
    /// passes all bits are cleared even if zeroing one of the blocks fails;
    /// the first device error is then returned.
    pub fn free(&mut self, indices: &[u64]) -> Result<(), BlockStoreError> {
        for &idx in indices {
            self.check_allocated(idx)?;
        }

        let zeroes = vec![0u8; self.block_size];
        let mut first_error = None;
        for &idx in indices {
            self.bitmap[idx as usize] = false;
            if let Err(err) = self.device.write_block(idx, &zeroes) {
                first_error.get_or_insert(err);
            }
        }

        debug!("freed blocks {:?}", indices);
        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Copies `bytes` sequentially across `indices`
    ///
    /// Only the prefix of the last block covered by `bytes` is overwritten;
    /// the rest of that block keeps its previous value.
    pub fn write(&mut self, indices: &[u64], bytes: &[u8]) -> Result<(), BlockStoreError> {
        if bytes.len() > indices.len() * self.block_size {
            return Err(BlockStoreError::ContentTooLarge {
                len: bytes.len(),
                blocks: indices.len(),
            });
        }
        for &idx in indices {
            self.check_allocated(idx)?;
        }

        let mut buffer = vec![0u8; self.block_size];
        for (&idx, chunk) in indices.iter().zip(bytes.chunks(self.block_size)) {
            if chunk.len() < self.block_size {
                self.device.read_block(idx, &mut buffer)?;
            }
            buffer[..chunk.len()].copy_from_slice(chunk);
            self.device.write_block(idx, &buffer)?;
        }
        Ok(())
    }

    /// Reads up to `declared_size` bytes across `indices`, dropping zero bytes
    ///
    /// Zero bytes inside the stored region are skipped rather than returned,
    /// so content containing `0x00` comes back shorter than it was written.
    pub fn read(&mut self, indices: &[u64], declared_size: usize) -> Result<Vec<u8>, BlockStoreError> {
        let mut content = self.read_exact(indices, declared_size)?;
        content.retain(|byte| *byte != 0);
        Ok(content)
    }

    /// Reads up to `declared_size` raw bytes across `indices`
    pub fn read_exact(
        &mut self,
        indices: &[u64],
        declared_size: usize,
    ) -> Result<Vec<u8>, BlockStoreError> {
        for &idx in indices {
            self.check_allocated(idx)?;
        }

        let mut content = Vec::with_capacity(declared_size);
        let mut buffer = vec![0u8; self.block_size];
        for &idx in indices {
            let remaining = declared_size - content.len();
            if remaining == 0 {
                break;
            }
            self.device.read_block(idx, &mut buffer)?;
            let take = remaining.min(self.block_size);
            content.extend_from_slice(&buffer[..take]);
        }
        Ok(content)
    }

    fn check_allocated(&self, idx: u64) -> Result<(), BlockStoreError> {
        match self.bitmap.get(idx as usize) {
            None => Err(BlockStoreError::OutOfRange(idx)),
            Some(false) => Err(BlockStoreError::NotAllocated(idx)),
            Some(true) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hal::RamDisk;

    fn store(blocks: usize, block_size: usize) -> BlockStore<RamDisk> {
        BlockStore::new(RamDisk::new(blocks, block_size))
    }

    #[test]
    fn test_allocate_rounds_up_to_whole_blocks() {
        let mut store = store(100, 64);

        for (bytes, expected) in [(1, 1), (63, 1), (64, 1), (65, 2), (128, 2), (129, 3), (640, 10)] {
            let indices = store.allocate(bytes).unwrap();
            assert_eq!(indices.len(), expected, "{} bytes", bytes);
            store.free(&indices).unwrap();
        }
    }

    #[test]
    fn test_allocate_zero_bytes_reserves_one_block() {
        let mut store = store(4, 64);
        let indices = store.allocate(0).unwrap();
        assert_eq!(indices, vec![0]);
        assert_eq!(store.used_blocks(), 1);
    }

    #[test]
    fn test_allocate_returns_previously_free_blocks() {
        let mut store = store(8, 16);
        let first = store.allocate(32).unwrap();
        let second = store.allocate(48).unwrap();

        assert_eq!(first, vec![0, 1]);
        assert_eq!(second, vec![2, 3, 4]);
        for idx in first.iter().chain(second.iter()) {
            assert!(store.is_allocated(*idx));
        }
        assert_eq!(store.used_blocks(), 5);
    }

    #[test]
    fn test_allocate_fills_holes_left_to_right() {
        let mut store = store(6, 16);
        let a = store.allocate(16).unwrap();
        let _b = store.allocate(16).unwrap();
        let c = store.allocate(16).unwrap();
        store.free(&a).unwrap();
        store.free(&c).unwrap();

        // Non-contiguous allocation picks up both holes first
        let d = store.allocate(48).unwrap();
        assert_eq!(d, vec![0, 2, 3]);
    }

    #[test]
    fn test_allocate_out_of_space_leaves_bitmap_untouched() {
        let mut store = store(4, 16);
        store.allocate(16).unwrap();
        let hole = store.allocate(16).unwrap();
        store.allocate(16).unwrap();
        store.free(&hole).unwrap();

        let before = store.bitmap().to_vec();
        let result = store.allocate(16 * 3);

        assert_eq!(
            result,
            Err(BlockStoreError::OutOfSpace {
                requested: 3,
                available: 2
            })
        );
        assert_eq!(store.bitmap(), before.as_slice());
    }

    #[test]
    fn test_free_clears_bits_and_zeroes_content() {
        let mut store = store(4, 8);
        let indices = store.allocate(8).unwrap();
        store.write(&indices, b"abcdefgh").unwrap();
        store.free(&indices).unwrap();

        assert!(!store.is_allocated(indices[0]));

        // Same block handed out again reads back as zeroes
        let again = store.allocate(8).unwrap();
        assert_eq!(again, indices);
        assert_eq!(store.read_exact(&again, 8).unwrap(), vec![0u8; 8]);
    }

    #[test]
    fn test_free_validates_before_mutating() {
        let mut store = store(4, 8);
        let indices = store.allocate(8).unwrap();

        let result = store.free(&[indices[0], 3]);
        assert_eq!(result, Err(BlockStoreError::NotAllocated(3)));
        assert!(store.is_allocated(indices[0]));

        let result = store.free(&[99]);
        assert_eq!(result, Err(BlockStoreError::OutOfRange(99)));
    }

    #[test]
    fn test_write_read_across_blocks() {
        let mut store = store(10, 4);
        let content = b"hello, block store";
        let indices = store.allocate(content.len()).unwrap();
        assert_eq!(indices.len(), 5);

        store.write(&indices, content).unwrap();
        assert_eq!(store.read(&indices, content.len()).unwrap(), content.to_vec());
    }

    #[test]
    fn test_write_keeps_tail_of_last_block() {
        let mut store = store(2, 8);
        let indices = store.allocate(8).unwrap();
        store.write(&indices, b"12345678").unwrap();
        store.write(&indices, b"ab").unwrap();

        assert_eq!(store.read_exact(&indices, 8).unwrap(), b"ab345678".to_vec());
    }

    #[test]
    fn test_write_rejects_oversized_content() {
        let mut store = store(4, 4);
        let indices = store.allocate(4).unwrap();
        let result = store.write(&indices, b"too long");
        assert_eq!(
            result,
            Err(BlockStoreError::ContentTooLarge { len: 8, blocks: 1 })
        );
    }

    #[test]
    fn test_read_skips_zero_bytes() {
        let mut store = store(4, 8);
        let content = [b'a', 0, b'b', 0, 0, b'c'];
        let indices = store.allocate(content.len()).unwrap();
        store.write(&indices, &content).unwrap();

        assert_eq!(store.read(&indices, content.len()).unwrap(), b"abc".to_vec());
        assert_eq!(store.read_exact(&indices, content.len()).unwrap(), content.to_vec());
    }

    #[test]
    fn test_read_stops_at_declared_size() {
        let mut store = store(4, 8);
        let indices = store.allocate(16).unwrap();
        store.write(&indices, b"0123456789abcdef").unwrap();

        assert_eq!(store.read(&indices, 10).unwrap(), b"0123456789".to_vec());
        assert_eq!(store.read(&indices, 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_read_unallocated_block_fails() {
        let mut store = store(4, 8);
        assert_eq!(
            store.read(&[1], 8),
            Err(BlockStoreError::NotAllocated(1))
        );
    }
}
