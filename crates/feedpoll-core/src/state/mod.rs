// # Watermark Store Implementations
//
// This module provides implementations of the WatermarkStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::FileWatermarkStore;
pub use memory::MemoryWatermarkStore;
