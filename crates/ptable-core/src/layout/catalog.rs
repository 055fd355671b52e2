//! System partition catalog
//!
//! The fixed set of non-relocatable system partitions present in every
//! layout. Offsets satisfy the hardware's reset/boot expectations: the
//! bootloader and the partition table itself are always at the same
//! offsets, the remaining system regions are sequential after them.
//! These must never move across re-plans.

use alloc::vec::Vec;

use super::types::{PartitionKind, Region, APP_ALIGNMENT, DATA_ALIGNMENT};

/// Bootloader region offset (first erase block is reserved)
pub const BOOTLOADER_OFFSET: u32 = 0x1000;
/// Bootloader region size
pub const BOOTLOADER_SIZE: u32 = 0x7000;

/// Offset of the partition table itself
pub const TABLE_OFFSET: u32 = 0x8000;
/// Size reserved for the partition table (one erase block)
pub const TABLE_SIZE: u32 = 0x1000;

/// Firmware registry offset
pub const REGISTRY_OFFSET: u32 = 0x9000;
/// Firmware registry size
pub const REGISTRY_SIZE: u32 = 0x7000;

/// OTA selection metadata offset
pub const OTA_META_OFFSET: u32 = 0x1_0000;
/// OTA selection metadata size
pub const OTA_META_SIZE: u32 = 0x2000;

/// NVS key-value store offset
pub const NVS_OFFSET: u32 = 0x1_2000;
/// NVS key-value store size
pub const NVS_SIZE: u32 = 0x6000;

// Catalog offsets are fixed data; alignment is checked once at build
// time rather than on every plan call.
const _: () = {
    assert!(BOOTLOADER_OFFSET % DATA_ALIGNMENT == 0);
    assert!(TABLE_OFFSET % DATA_ALIGNMENT == 0);
    assert!(REGISTRY_OFFSET % DATA_ALIGNMENT == 0);
    assert!(OTA_META_OFFSET % DATA_ALIGNMENT == 0);
    assert!(NVS_OFFSET % DATA_ALIGNMENT == 0);
    // System regions are sequential and gap-free after the table
    assert!(REGISTRY_OFFSET == TABLE_OFFSET + TABLE_SIZE);
    assert!(OTA_META_OFFSET == REGISTRY_OFFSET + REGISTRY_SIZE);
    assert!(NVS_OFFSET == OTA_META_OFFSET + OTA_META_SIZE);
};

/// The fixed system partition catalog, in on-disk order
pub fn catalog() -> Vec<Region> {
    let mut bootloader = Region::new(
        "bootloader",
        PartitionKind::Bootloader,
        BOOTLOADER_OFFSET,
        BOOTLOADER_SIZE,
    );
    bootloader.read_only = true;

    let mut table = Region::new(
        "partitions",
        PartitionKind::PartitionTable,
        TABLE_OFFSET,
        TABLE_SIZE,
    );
    table.read_only = true;

    alloc::vec![
        bootloader,
        table,
        Region::new(
            "fw_registry",
            PartitionKind::FirmwareRegistry,
            REGISTRY_OFFSET,
            REGISTRY_SIZE,
        ),
        Region::new(
            "ota_meta",
            PartitionKind::OtaMetadata,
            OTA_META_OFFSET,
            OTA_META_SIZE,
        ),
        Region::new("nvs", PartitionKind::Nvs, NVS_OFFSET, NVS_SIZE),
    ]
}

/// First free OTA-aligned offset after a set of existing regions
pub fn first_free_offset(regions: &[Region]) -> u64 {
    let end = regions.iter().map(|r| r.end()).max().unwrap_or(0);
    // end fits in u33 at most, align_up takes a u32; compute directly
    let align = APP_ALIGNMENT as u64;
    (end + align - 1) & !(align - 1)
}

/// Remaining byte range after the default catalog:
/// `[first_free_offset, capacity)`
pub fn available_after_catalog(capacity: u32) -> (u64, u32) {
    (first_free_offset(&catalog()), capacity)
}
