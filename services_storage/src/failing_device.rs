//! # Fault Injection
//!
//! [`FailingBlockDevice`] forwards to another [`BlockDevice`] and rejects the
//! transfers its [`FailurePolicy`] selects. The filesystem tests use it to
//! break an operation halfway and check that nothing was committed.

use hal::{BlockDevice, BlockError};

/// Which transfers the wrapper rejects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Forward everything
    Never,
    /// Let this many writes through, then reject every later write
    WritesAfter(usize),
    /// Reject writes to these blocks
    WritesTo(Vec<u64>),
    /// Reject reads from these blocks
    ReadsFrom(Vec<u64>),
}

/// Block device wrapper with scripted failures
///
/// A rejected transfer never reaches the inner device and is reported as
/// [`BlockError::IoError`] for the block involved.
#[derive(Debug)]
pub struct FailingBlockDevice<D: BlockDevice> {
    inner: D,
    policy: FailurePolicy,
    writes_passed: usize,
    injected: usize,
}

impl<D: BlockDevice> FailingBlockDevice<D> {
    pub fn new(inner: D, policy: FailurePolicy) -> Self {
        Self {
            inner,
            policy,
            writes_passed: 0,
            injected: 0,
        }
    }

    /// Swaps the policy and restarts the write count
    pub fn set_policy(&mut self, policy: FailurePolicy) {
        self.policy = policy;
        self.writes_passed = 0;
    }

    /// Writes forwarded since the policy was last set
    pub fn writes_passed(&self) -> usize {
        self.writes_passed
    }

    /// Transfers rejected over the wrapper's lifetime
    pub fn injected_failures(&self) -> usize {
        self.injected
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn into_inner(self) -> D {
        self.inner
    }

    fn rejects_write(&self, block_idx: u64) -> bool {
        match &self.policy {
            FailurePolicy::WritesAfter(limit) => self.writes_passed >= *limit,
            FailurePolicy::WritesTo(targets) => targets.contains(&block_idx),
            FailurePolicy::Never | FailurePolicy::ReadsFrom(_) => false,
        }
    }

    fn rejects_read(&self, block_idx: u64) -> bool {
        matches!(&self.policy, FailurePolicy::ReadsFrom(targets) if targets.contains(&block_idx))
    }
}

impl<D: BlockDevice> BlockDevice for FailingBlockDevice<D> {
    fn block_count(&self) -> u64 {
        self.inner.block_count()
    }

    fn block_size(&self) -> usize {
        self.inner.block_size()
    }

    fn read_block(&mut self, block_idx: u64, buffer: &mut [u8]) -> Result<(), BlockError> {
        if self.rejects_read(block_idx) {
            self.injected += 1;
            return Err(BlockError::IoError(block_idx));
        }
        self.inner.read_block(block_idx, buffer)
    }

    fn write_block(&mut self, block_idx: u64, buffer: &[u8]) -> Result<(), BlockError> {
        if self.rejects_write(block_idx) {
            self.injected += 1;
            return Err(BlockError::IoError(block_idx));
        }
        self.inner.write_block(block_idx, buffer)?;
        self.writes_passed += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hal::RamDisk;

    fn wrapped(policy: FailurePolicy) -> FailingBlockDevice<RamDisk> {
        FailingBlockDevice::new(RamDisk::new(4, 8), policy)
    }

    #[test]
    fn test_passthrough() {
        let mut device = wrapped(FailurePolicy::Never);
        device.write_block(1, b"abcdefgh").unwrap();

        let mut buffer = [0u8; 8];
        device.read_block(1, &mut buffer).unwrap();
        assert_eq!(&buffer, b"abcdefgh");
        assert_eq!(device.writes_passed(), 1);
        assert_eq!(device.injected_failures(), 0);
    }

    #[test]
    fn test_writes_after_limit() {
        let mut device = wrapped(FailurePolicy::WritesAfter(1));
        device.write_block(0, &[1; 8]).unwrap();

        assert_eq!(device.write_block(1, &[1; 8]), Err(BlockError::IoError(1)));
        assert_eq!(device.write_block(0, &[1; 8]), Err(BlockError::IoError(0)));
        assert_eq!(device.injected_failures(), 2);

        // Reads are unaffected
        let mut buffer = [0u8; 8];
        device.read_block(0, &mut buffer).unwrap();
        assert_eq!(buffer, [1; 8]);
    }

    #[test]
    fn test_rejected_write_leaves_block_untouched() {
        let mut device = wrapped(FailurePolicy::WritesTo(vec![2]));
        device.write_block(3, &[5; 8]).unwrap();
        assert!(device.write_block(2, &[5; 8]).is_err());

        let mut disk = device.into_inner();
        let mut buffer = [9u8; 8];
        disk.read_block(2, &mut buffer).unwrap();
        assert_eq!(buffer, [0; 8]);
    }

    #[test]
    fn test_read_failures() {
        let mut device = wrapped(FailurePolicy::ReadsFrom(vec![0]));
        device.write_block(0, &[3; 8]).unwrap();

        let mut buffer = [0u8; 8];
        assert_eq!(device.read_block(0, &mut buffer), Err(BlockError::IoError(0)));
        assert!(device.read_block(1, &mut buffer).is_ok());
    }

    #[test]
    fn test_set_policy_restarts_count() {
        let mut device = wrapped(FailurePolicy::WritesAfter(1));
        device.write_block(0, &[1; 8]).unwrap();
        assert!(device.write_block(1, &[1; 8]).is_err());

        device.set_policy(FailurePolicy::WritesAfter(1));
        assert_eq!(device.writes_passed(), 0);
        assert!(device.write_block(1, &[1; 8]).is_ok());
        assert_eq!(device.inner().block_count(), 4);
    }
}
