//! Layout types
//!
//! Core types for flash partition layouts that work in no_std
//! environments: the closed partition kind set, the region value type,
//! and the ordered layout with its validation rules.

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::{Error, Result};

/// Alignment required for data/system region offsets
pub const DATA_ALIGNMENT: u32 = 0x1000;

/// Alignment required for application-image region offsets (OTA
/// requirement of the target flash hardware)
pub const APP_ALIGNMENT: u32 = 0x1_0000;

/// Maximum number of region entries the table format can hold
/// (128 records including the trailing checksum record)
pub const MAX_ENTRIES: usize = 127;

/// Round `value` up to the next multiple of `align`
///
/// `align` must be a power of two. Computed in 64 bits so values near
/// `u32::MAX` do not wrap.
pub const fn align_up(value: u32, align: u32) -> u64 {
    let align = align as u64;
    (value as u64 + align - 1) & !(align - 1)
}

bitflags::bitflags! {
    /// Per-entry flags word as stored on the wire
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RegionFlags: u32 {
        /// Region contents are encrypted at rest
        const ENCRYPTED = 1 << 0;
        /// Region must not be written at runtime
        const READ_ONLY = 1 << 1;
    }
}

/// Kind of a flash partition
///
/// A closed tag set: `OtaSlot` is the only kind the planner creates
/// dynamically, all others come from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum PartitionKind {
    /// Second-stage bootloader
    Bootloader,
    /// The partition table itself
    PartitionTable,
    /// Firmware image registry
    FirmwareRegistry,
    /// OTA selection metadata
    OtaMetadata,
    /// Non-volatile key-value storage
    Nvs,
    /// Factory application image
    FactoryApp,
    /// Updatable application slot `n`
    OtaSlot(u8),
}

impl PartitionKind {
    /// Whether regions of this kind hold an application image
    pub fn is_app(&self) -> bool {
        matches!(self, Self::FactoryApp | Self::OtaSlot(_))
    }

    /// Required offset alignment for regions of this kind
    pub fn alignment(&self) -> u32 {
        if self.is_app() {
            APP_ALIGNMENT
        } else {
            DATA_ALIGNMENT
        }
    }
}

/// A named partition within the flash address space
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct Region {
    /// Name of the region (at most 15 characters survive on the wire)
    pub name: String,
    /// Kind of the partition
    pub kind: PartitionKind,
    /// Raw on-wire subtype byte
    ///
    /// Kept separate from `kind` so that records whose kind was
    /// recovered through the name fallback still serialize back to
    /// their original bytes.
    pub subtype: u8,
    /// Start offset in bytes
    pub offset: u32,
    /// Size in bytes
    pub size: u32,
    /// Whether this region is read-only
    #[cfg_attr(feature = "std", serde(default))]
    pub read_only: bool,
    /// Whether this region is encrypted at rest
    #[cfg_attr(feature = "std", serde(default))]
    pub encrypted: bool,
    /// Set when the planner clamped this region to the remaining space
    #[cfg_attr(feature = "std", serde(skip))]
    pub truncated: bool,
}

impl Region {
    /// Create a new region with the kind's canonical subtype byte
    pub fn new(name: impl Into<String>, kind: PartitionKind, offset: u32, size: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            subtype: crate::layout::table::subtype_code(kind),
            offset,
            size,
            read_only: false,
            encrypted: false,
            truncated: false,
        }
    }

    /// End offset (exclusive), computed in 64 bits
    pub fn end(&self) -> u64 {
        self.offset as u64 + self.size as u64
    }

    /// Whether this region holds an application image
    pub fn is_app_slot(&self) -> bool {
        self.kind.is_app()
    }

    /// Check if an address falls within this region
    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.offset && (addr as u64) < self.end()
    }

    /// Check if this region's byte range overlaps another's
    pub fn overlaps(&self, other: &Region) -> bool {
        (self.offset as u64) < other.end() && self.end() > other.offset as u64
    }

    /// Check if the start offset satisfies this kind's alignment
    pub fn is_aligned(&self) -> bool {
        self.offset % self.kind.alignment() == 0
    }

    /// On-wire flags word for this region
    pub fn flags(&self) -> RegionFlags {
        let mut flags = RegionFlags::empty();
        if self.encrypted {
            flags |= RegionFlags::ENCRYPTED;
        }
        if self.read_only {
            flags |= RegionFlags::READ_ONLY;
        }
        flags
    }
}

/// A candidate firmware image the caller wants placed into an OTA slot
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageRequest {
    /// Identifier of the image (becomes the slot's region name)
    pub id: String,
    /// Size of the image in bytes
    pub byte_size: u32,
}

impl ImageRequest {
    /// Create a new image request
    pub fn new(id: impl Into<String>, byte_size: u32) -> Self {
        Self {
            id: id.into(),
            byte_size,
        }
    }
}

/// A flash partition layout
///
/// Insertion order is on-disk order: the serializer emits records in
/// sequence order and the importer preserves what it read.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct Layout {
    /// Regions in on-disk order
    pub regions: Vec<Region>,
    /// Flash capacity this layout was built for
    pub capacity: u32,
    /// Set only after `validate` has accepted this layout
    #[cfg_attr(feature = "std", serde(skip))]
    pub validated: bool,
}

impl Layout {
    /// Create a new empty layout for a flash of the given capacity
    pub fn new(capacity: u32) -> Self {
        Self {
            regions: Vec::new(),
            capacity,
            validated: false,
        }
    }

    /// Append a region, clearing the validated flag
    pub fn add_region(&mut self, region: Region) {
        self.validated = false;
        self.regions.push(region);
    }

    /// Find a region by name (case-insensitive)
    pub fn find_region(&self, name: &str) -> Option<&Region> {
        self.regions
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// Total bytes covered by all regions
    pub fn total_used(&self) -> u64 {
        self.regions.iter().map(|r| r.size as u64).sum()
    }

    /// Get the number of regions
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Check if the layout has no regions
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Highest end offset over all regions, 0 for an empty layout
    pub fn highest_end(&self) -> u64 {
        self.regions.iter().map(|r| r.end()).max().unwrap_or(0)
    }

    /// Validate the layout
    ///
    /// Checks run in order and stop at the first failure:
    ///
    /// 1. entry count is within `1..=MAX_ENTRIES`
    /// 2. every region lies within the flash capacity
    /// 3. offset alignment - advisory only, a misaligned region is
    ///    logged as a warning and does not fail validation
    /// 4. no byte-range overlap between any pair of regions where at
    ///    least one side is an application slot (system regions are
    ///    fixed by construction and not cross-checked)
    ///
    /// On success the `validated` flag is set.
    pub fn validate(&mut self) -> Result<()> {
        if self.regions.is_empty() {
            return Err(Error::InvalidArgument);
        }
        if self.regions.len() > MAX_ENTRIES {
            return Err(Error::TooManyPartitions {
                count: self.regions.len(),
            });
        }

        for region in &self.regions {
            if region.offset >= self.capacity || region.end() > self.capacity as u64 {
                return Err(Error::RegionOutOfBounds {
                    offset: region.offset,
                    size: region.size,
                });
            }
        }

        for region in &self.regions {
            if !region.is_aligned() {
                log::warn!(
                    "region '{}' at 0x{:08X} is not aligned to 0x{:X}",
                    region.name,
                    region.offset,
                    region.kind.alignment()
                );
            }
        }

        for (i, a) in self.regions.iter().enumerate() {
            for b in self.regions.iter().skip(i + 1) {
                if (a.is_app_slot() || b.is_app_slot()) && a.overlaps(b) {
                    return Err(Error::OverlapDetected {
                        first: a.offset,
                        second: b.offset,
                    });
                }
            }
        }

        self.validated = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(name: &str, offset: u32, size: u32) -> Region {
        Region::new(name, PartitionKind::OtaSlot(0), offset, size)
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 0x1000), 0);
        assert_eq!(align_up(1, 0x1000), 0x1000);
        assert_eq!(align_up(0x1000, 0x1000), 0x1000);
        assert_eq!(align_up(3_004_096, APP_ALIGNMENT), 3_014_656);
        // no wrap near u32::MAX
        assert_eq!(align_up(u32::MAX, 0x1000), 0x1_0000_0000);
    }

    #[test]
    fn test_region_overlap() {
        let a = app("a", 0x20000, 0x10000);
        let b = app("b", 0x30000, 0x10000);
        let c = app("c", 0x28000, 0x10000);
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }

    #[test]
    fn test_region_contains() {
        let r = app("a", 0x20000, 0x10000);
        assert!(r.contains(0x20000));
        assert!(r.contains(0x2FFFF));
        assert!(!r.contains(0x30000));
        assert!(!r.contains(0x1FFFF));
    }

    #[test]
    fn test_validate_empty() {
        let mut layout = Layout::new(0x100000);
        assert_eq!(layout.validate(), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_validate_out_of_bounds() {
        let mut layout = Layout::new(0x100000);
        layout.add_region(app("a", 0xF0000, 0x20000));
        assert_eq!(
            layout.validate(),
            Err(Error::RegionOutOfBounds {
                offset: 0xF0000,
                size: 0x20000
            })
        );
    }

    #[test]
    fn test_validate_overlap() {
        let mut layout = Layout::new(0x1000000);
        layout.add_region(app("a", 0x20000, 0x20000));
        layout.add_region(app("b", 0x30000, 0x20000));
        assert_eq!(
            layout.validate(),
            Err(Error::OverlapDetected {
                first: 0x20000,
                second: 0x30000
            })
        );
    }

    #[test]
    fn test_validate_system_overlap_not_checked() {
        // System-to-system overlaps are asserted correct by construction
        let mut layout = Layout::new(0x1000000);
        layout.add_region(Region::new("nvs", PartitionKind::Nvs, 0x9000, 0x6000));
        layout.add_region(Region::new(
            "ota_meta",
            PartitionKind::OtaMetadata,
            0xA000,
            0x2000,
        ));
        assert!(layout.validate().is_ok());
        assert!(layout.validated);
    }

    #[test]
    fn test_validate_misaligned_is_advisory() {
        // Misalignment warns but does not fail
        let mut layout = Layout::new(0x1000000);
        layout.add_region(app("a", 0x21000, 0x10000));
        assert!(layout.validate().is_ok());
    }

    #[test]
    fn test_validate_too_many() {
        let mut layout = Layout::new(0x4000_0000);
        for i in 0..128u32 {
            layout.add_region(app("a", 0x100000 + i * 0x10000, 0x10000));
        }
        assert_eq!(
            layout.validate(),
            Err(Error::TooManyPartitions { count: 128 })
        );
    }

    #[test]
    fn test_add_region_clears_validated() {
        let mut layout = Layout::new(0x1000000);
        layout.add_region(app("a", 0x20000, 0x10000));
        layout.validate().unwrap();
        assert!(layout.validated);
        layout.add_region(app("b", 0x30000, 0x10000));
        assert!(!layout.validated);
    }
}
