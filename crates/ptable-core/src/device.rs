//! Block device abstraction
//!
//! The engine itself is pure; the only I/O is reading and writing the
//! table's byte range on a flash image, modeled as an injected block
//! device supplied by the caller. Device failures surface immediately
//! as the engine's own error - retry policy, if any, belongs to the
//! caller.

use alloc::vec;

use crate::error::{Error, Result};
use crate::layout::table::{self, ImportOptions, TABLE_MAX_SIZE};
use crate::layout::Layout;

/// Abstract flash-backed block device
///
/// All offsets are 32-bit, which covers flash sizes up to 4 GiB.
pub trait BlockDevice {
    /// Total device size in bytes
    fn size(&self) -> u32;

    /// Smallest unit that can be erased; erase calls must be aligned
    /// to this and a multiple of it
    fn erase_granularity(&self) -> u32;

    /// Read `buf.len()` bytes starting at `offset`
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<()>;

    /// Write `data` starting at `offset` (destination must be erased)
    fn write(&mut self, offset: u32, data: &[u8]) -> Result<()>;

    /// Erase `len` bytes starting at `offset`
    fn erase(&mut self, offset: u32, len: u32) -> Result<()>;
}

/// Read and parse the partition table stored at `table_offset`
pub fn read_table_from_device<D: BlockDevice + ?Sized>(
    device: &mut D,
    table_offset: u32,
    options: ImportOptions,
) -> Result<Layout> {
    let capacity = device.size();
    if table_offset as u64 + TABLE_MAX_SIZE as u64 > capacity as u64 {
        return Err(Error::InvalidArgument);
    }

    let mut buf = vec![0u8; TABLE_MAX_SIZE];
    device.read(table_offset, &mut buf)?;
    table::import_with_options(&buf, capacity, options)
}

/// Serialize a layout and write it over the table partition
///
/// Erases the table's byte range first, then writes the full
/// 0xFF-padded table buffer. The layout must have been validated.
pub fn write_table_to_device<D: BlockDevice + ?Sized>(
    device: &mut D,
    table_offset: u32,
    layout: &Layout,
) -> Result<()> {
    if !layout.validated {
        return Err(Error::InvalidArgument);
    }
    let bytes = table::serialize(layout)?;

    device.erase(table_offset, bytes.len() as u32)?;
    device.write(table_offset, &bytes)?;
    Ok(())
}
