//! Fixed-geometry block devices
//!
//! A device is a numbered array of equally sized blocks that can only be
//! transferred whole. The block store allocates from one of these.
use thiserror::Error;

/// Default block size in bytes
///
/// Deliberately small so that short contents already span several blocks.
pub const DEFAULT_BLOCK_SIZE: usize = 64;

/// Default number of blocks on a freshly created device
pub const DEFAULT_BLOCK_COUNT: usize = 100;

/// Errors reported by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BlockError {
    /// Index at or past `block_count()`
    #[error("block index {0} out of bounds")]
    OutOfBounds(u64),
    /// I/O error (hardware failure, injected fault, etc.)
    #[error("I/O error on block {0}")]
    IoError(u64),
    /// Buffer does not match the block size
    #[error("invalid buffer size: expected {expected} bytes, got {actual}")]
    InvalidSize { expected: usize, actual: usize },
}

/// Whole-block transfers over a fixed number of blocks
///
/// Buffers passed in must be exactly `block_size()` bytes long.
pub trait BlockDevice {
    /// Number of addressable blocks
    fn block_count(&self) -> u64;

    /// Bytes per block
    fn block_size(&self) -> usize;

    /// Copies block `block_idx` into `buffer`
    ///
    /// # Errors
    /// Returns `BlockError::OutOfBounds` if block_idx >= block_count()
    /// Returns `BlockError::InvalidSize` if the buffer length differs from block_size()
    fn read_block(&mut self, block_idx: u64, buffer: &mut [u8]) -> Result<(), BlockError>;

    /// Overwrites block `block_idx` with `buffer`
    ///
    /// # Errors
    /// Returns `BlockError::OutOfBounds` if block_idx >= block_count()
    /// Returns `BlockError::IoError` on device failure
    /// Returns `BlockError::InvalidSize` if the buffer length differs from block_size()
    fn write_block(&mut self, block_idx: u64, buffer: &[u8]) -> Result<(), BlockError>;
}

/// Volatile in-memory device
///
/// Backs the whole filesystem in a single contiguous byte buffer.
/// Data is lost when the device is dropped.
#[derive(Debug, Clone)]
pub struct RamDisk {
    block_size: usize,
    data: Vec<u8>,
}

impl RamDisk {
    /// Create a new zeroed RAM disk with `block_count` blocks of `block_size` bytes
    pub fn new(block_count: usize, block_size: usize) -> Self {
        Self {
            block_size,
            data: vec![0; block_count * block_size],
        }
    }

    fn check(&self, block_idx: u64, len: usize) -> Result<usize, BlockError> {
        if block_idx >= self.block_count() {
            return Err(BlockError::OutOfBounds(block_idx));
        }
        if len != self.block_size {
            return Err(BlockError::InvalidSize {
                expected: self.block_size,
                actual: len,
            });
        }
        Ok(block_idx as usize * self.block_size)
    }
}

impl Default for RamDisk {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_COUNT, DEFAULT_BLOCK_SIZE)
    }
}

impl BlockDevice for RamDisk {
    fn block_count(&self) -> u64 {
        if self.block_size == 0 {
            return 0;
        }
        (self.data.len() / self.block_size) as u64
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read_block(&mut self, block_idx: u64, buffer: &mut [u8]) -> Result<(), BlockError> {
        let start = self.check(block_idx, buffer.len())?;
        buffer.copy_from_slice(&self.data[start..start + self.block_size]);
        Ok(())
    }

    fn write_block(&mut self, block_idx: u64, buffer: &[u8]) -> Result<(), BlockError> {
        let start = self.check(block_idx, buffer.len())?;
        self.data[start..start + self.block_size].copy_from_slice(buffer);
        Ok(())
    }
}
