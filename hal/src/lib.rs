//! # Hardware Abstraction Layer (HAL)
//!
//! This crate defines the device traits the filesystem is built on.
//!
//! ## Philosophy
//!
//! **Devices must be fully abstracted and swappable.**
//!
//! The block store and the engine never touch memory or the system clock
//! directly. They go through the traits defined here, so every device can be
//! replaced by an in-memory or fault-injecting implementation in tests.
//!
//! ## Design Principles
//!
//! 1. **Trait-based**: All device operations go through traits
//! 2. **Fixed geometry**: A block device never changes block size or count
//! 3. **Testable**: Every trait has a deterministic in-memory implementation

pub mod block_device;
pub mod timer;

pub use block_device::{
    BlockDevice, BlockError, RamDisk, DEFAULT_BLOCK_COUNT, DEFAULT_BLOCK_SIZE,
};
pub use timer::{Clock, ManualClock, SystemClock};
