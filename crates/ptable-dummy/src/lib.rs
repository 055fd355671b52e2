//! ptable-dummy - In-memory flash block device for testing
//!
//! This crate provides a block device that emulates a flash chip in
//! memory, with real flash semantics: erase sets bytes to 0xFF and
//! writes can only clear bits. It's useful for tests and for operating
//! on flash image files without real hardware.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;

use ptable_core::device::BlockDevice;
use ptable_core::error::{Error, Result};

/// Default erase granularity (4 KiB sectors)
const DEFAULT_SECTOR_SIZE: u32 = 4096;

/// In-memory flash device
///
/// Starts fully erased (all 0xFF) unless seeded with data.
pub struct DummyDevice {
    data: Vec<u8>,
    sector_size: u32,
}

impl DummyDevice {
    /// Create a fully erased device of the given size
    pub fn new(size: u32) -> Self {
        Self {
            data: vec![0xFF; size as usize],
            sector_size: DEFAULT_SECTOR_SIZE,
        }
    }

    /// Create a device seeded with the contents of `initial_data`
    ///
    /// The device size equals the data length.
    pub fn with_data(initial_data: Vec<u8>) -> Self {
        Self {
            data: initial_data,
            sector_size: DEFAULT_SECTOR_SIZE,
        }
    }

    /// Override the erase granularity
    pub fn with_sector_size(mut self, sector_size: u32) -> Self {
        self.sector_size = sector_size;
        self
    }

    /// Get a reference to the flash contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the device and return the flash contents
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    fn check_bounds(&self, offset: u32, len: usize) -> Result<()> {
        if offset as usize + len > self.data.len() {
            return Err(Error::RegionOutOfBounds {
                offset,
                size: len as u32,
            });
        }
        Ok(())
    }
}

impl BlockDevice for DummyDevice {
    fn size(&self) -> u32 {
        self.data.len() as u32
    }

    fn erase_granularity(&self) -> u32 {
        self.sector_size
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()> {
        self.check_bounds(offset, buf.len())?;
        let start = offset as usize;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        self.check_bounds(offset, data.len())?;
        let start = offset as usize;
        // Flash programming can only change bits 1 -> 0
        for (dst, &src) in self.data[start..].iter_mut().zip(data) {
            *dst &= src;
        }
        Ok(())
    }

    fn erase(&mut self, offset: u32, len: u32) -> Result<()> {
        if offset % self.sector_size != 0 || len % self.sector_size != 0 {
            log::warn!(
                "erase at 0x{:08X} (+{}) not aligned to {} byte sectors",
                offset,
                len,
                self.sector_size
            );
            return Err(Error::InvalidArgument);
        }
        self.check_bounds(offset, len as usize)?;
        let start = offset as usize;
        self.data[start..start + len as usize].fill(0xFF);
        Ok(())
    }
}
