//! Binary partition table format
//!
//! The on-device table is a sequence of fixed 32-byte records followed
//! by one checksum record of the same width:
//!
//! | field   | offset | size | notes                                |
//! |---------|--------|------|--------------------------------------|
//! | magic   | 0      | 2    | 0xAA50 region, 0xEBEB checksum (LE)  |
//! | type    | 2      | 1    | 0x00 app, 0x01 data                  |
//! | subtype | 3      | 1    | app: 0x00 factory, 0x10+n OTA slot n |
//! | offset  | 4      | 4    | little-endian                        |
//! | size    | 8      | 4    | little-endian                        |
//! | name    | 12     | 16   | NUL-padded ASCII, 15 visible chars   |
//! | flags   | 28     | 4    | bit0 encrypted, bit1 read-only       |
//!
//! The checksum record carries 14 bytes of 0xFF after the magic and a
//! 16-byte MD5 digest of all preceding record bytes in its last 16
//! bytes. Unused buffer space is padded with 0xFF, the flash
//! erased-state sentinel.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use md5::{Digest, Md5};

use crate::error::{Error, Result};

use super::types::{Layout, PartitionKind, Region, RegionFlags, MAX_ENTRIES};

/// Size of one table record in bytes
pub const RECORD_SIZE: usize = 32;

/// Maximum serialized table size (128 records incl. the checksum)
pub const TABLE_MAX_SIZE: usize = (MAX_ENTRIES + 1) * RECORD_SIZE;

/// Magic of a region record
pub const REGION_MAGIC: u16 = 0xAA50;

/// Magic of the trailing checksum record
pub const CHECKSUM_MAGIC: u16 = 0xEBEB;

/// Type byte for application partitions
pub const TYPE_APP: u8 = 0x00;
/// Type byte for data partitions
pub const TYPE_DATA: u8 = 0x01;

/// App subtype: factory image
pub const SUBTYPE_FACTORY: u8 = 0x00;
/// App subtype base for OTA slots (slot n = 0x10 + n)
pub const SUBTYPE_OTA_BASE: u8 = 0x10;
/// Highest app subtype recognized as an OTA slot
const SUBTYPE_OTA_MAX: u8 = SUBTYPE_OTA_BASE + MAX_ENTRIES as u8;

/// Data subtype: OTA selection metadata
pub const SUBTYPE_OTA_META: u8 = 0x00;
/// Data subtype: NVS key-value store
pub const SUBTYPE_NVS: u8 = 0x02;
/// Data subtype: second-stage bootloader
pub const SUBTYPE_BOOTLOADER: u8 = 0x80;
/// Data subtype: the partition table itself
pub const SUBTYPE_TABLE: u8 = 0x81;
/// Data subtype: firmware registry
pub const SUBTYPE_REGISTRY: u8 = 0x82;

/// Flash erased-state byte used for padding
const ERASED: u8 = 0xFF;

/// On-wire type byte for a partition kind
pub fn type_code(kind: PartitionKind) -> u8 {
    if kind.is_app() {
        TYPE_APP
    } else {
        TYPE_DATA
    }
}

/// Canonical on-wire subtype byte for a partition kind
///
/// The planner only creates slot indices up to the table's entry
/// limit; an index past the encodable range saturates at 0xFF rather
/// than wrapping.
pub fn subtype_code(kind: PartitionKind) -> u8 {
    match kind {
        PartitionKind::Bootloader => SUBTYPE_BOOTLOADER,
        PartitionKind::PartitionTable => SUBTYPE_TABLE,
        PartitionKind::FirmwareRegistry => SUBTYPE_REGISTRY,
        PartitionKind::OtaMetadata => SUBTYPE_OTA_META,
        PartitionKind::Nvs => SUBTYPE_NVS,
        PartitionKind::FactoryApp => SUBTYPE_FACTORY,
        PartitionKind::OtaSlot(n) => SUBTYPE_OTA_BASE.saturating_add(n),
    }
}

/// Reconstruct a partition kind from on-wire bytes
///
/// Decoding is tag-first: `(type, subtype)` resolves every known code.
/// An app record with an unknown subtype falls back to classification
/// by name (`"factory_app"` is the factory image, anything else a
/// generic OTA slot); data records use the catalog names as the
/// override list. The raw subtype byte stays on the region either way.
fn decode_kind(type_code: u8, subtype: u8, name: &str) -> PartitionKind {
    if type_code == TYPE_APP {
        match subtype {
            SUBTYPE_FACTORY => PartitionKind::FactoryApp,
            SUBTYPE_OTA_BASE..=SUBTYPE_OTA_MAX => {
                PartitionKind::OtaSlot(subtype - SUBTYPE_OTA_BASE)
            }
            _ => {
                log::warn!(
                    "unknown app subtype 0x{:02X} for '{}', classifying by name",
                    subtype,
                    name
                );
                if name == "factory_app" {
                    PartitionKind::FactoryApp
                } else {
                    PartitionKind::OtaSlot(0)
                }
            }
        }
    } else {
        match subtype {
            SUBTYPE_OTA_META => PartitionKind::OtaMetadata,
            SUBTYPE_NVS => PartitionKind::Nvs,
            SUBTYPE_BOOTLOADER => PartitionKind::Bootloader,
            SUBTYPE_TABLE => PartitionKind::PartitionTable,
            SUBTYPE_REGISTRY => PartitionKind::FirmwareRegistry,
            _ => match name {
                "bootloader" => PartitionKind::Bootloader,
                "partitions" => PartitionKind::PartitionTable,
                "fw_registry" => PartitionKind::FirmwareRegistry,
                "ota_meta" => PartitionKind::OtaMetadata,
                "nvs" => PartitionKind::Nvs,
                _ => {
                    log::warn!(
                        "unknown data subtype 0x{:02X} for '{}', treating as NVS",
                        subtype,
                        name
                    );
                    PartitionKind::Nvs
                }
            },
        }
    }
}

/// Serialize a layout into a fresh maximum-size table buffer
///
/// The returned buffer is always [`TABLE_MAX_SIZE`] bytes, 0xFF-padded
/// past the checksum record, ready to be written over the table
/// partition.
pub fn serialize(layout: &Layout) -> Result<Vec<u8>> {
    let mut buf = alloc::vec![ERASED; TABLE_MAX_SIZE];
    serialize_into(layout, &mut buf)?;
    Ok(buf)
}

/// Serialize a layout into the given buffer
///
/// Emits one record per region in layout order plus the trailing
/// checksum record, pads the rest of `buf` with 0xFF, and returns the
/// number of record bytes written.
pub fn serialize_into(layout: &Layout, buf: &mut [u8]) -> Result<usize> {
    let count = layout.regions.len();
    if count > MAX_ENTRIES {
        return Err(Error::TooManyPartitions { count });
    }
    let used = (count + 1) * RECORD_SIZE;
    if buf.len() < used {
        return Err(Error::BufferTooSmall);
    }

    buf.fill(ERASED);

    for (i, region) in layout.regions.iter().enumerate() {
        write_record(&mut buf[i * RECORD_SIZE..(i + 1) * RECORD_SIZE], region);
    }

    // Checksum record: magic, 14 bytes of 0xFF (left from the fill),
    // then the MD5 of every preceding record byte.
    let trailer = count * RECORD_SIZE;
    let digest = Md5::digest(&buf[..trailer]);
    buf[trailer..trailer + 2].copy_from_slice(&CHECKSUM_MAGIC.to_le_bytes());
    buf[trailer + 16..trailer + 32].copy_from_slice(digest.as_slice());

    Ok(used)
}

fn write_record(record: &mut [u8], region: &Region) {
    record[0..2].copy_from_slice(&REGION_MAGIC.to_le_bytes());
    record[2] = type_code(region.kind);
    record[3] = region.subtype;
    record[4..8].copy_from_slice(&region.offset.to_le_bytes());
    record[8..12].copy_from_slice(&region.size.to_le_bytes());

    // Name: 16 bytes, NUL-padded, at most 15 visible characters
    record[12..28].fill(0);
    let name = region.name.as_bytes();
    let visible = name.len().min(15);
    record[12..12 + visible].copy_from_slice(&name[..visible]);

    record[28..32].copy_from_slice(&region.flags().bits().to_le_bytes());
}

/// Options controlling table import
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Verify the MD5 checksum record against the region records.
    ///
    /// Off by default: the boot-time reader writes the trailer but
    /// never checks it back, and bit-for-bit parity keeps that
    /// behavior. A missing checksum record is never an error.
    pub verify_checksum: bool,
}

/// Parse a binary partition table into a layout
///
/// Scans fixed-width records from the start of `bytes` and stops at
/// the first record whose magic is not the region magic - the checksum
/// magic and any unrecognized magic both mean "end of table", not
/// corruption. Record order is preserved.
pub fn import(bytes: &[u8], capacity: u32) -> Layout {
    scan(bytes, capacity).0
}

/// Parse a binary partition table, optionally verifying the checksum
pub fn import_with_options(bytes: &[u8], capacity: u32, options: ImportOptions) -> Result<Layout> {
    let (layout, trailer) = scan(bytes, capacity);
    if options.verify_checksum {
        if let Some(records_end) = trailer {
            let digest = Md5::digest(&bytes[..records_end]);
            let stored = &bytes[records_end + 16..records_end + 32];
            if digest.as_slice() != stored {
                return Err(Error::ChecksumMismatch);
            }
        }
    }
    Ok(layout)
}

/// Scan records; returns the layout and, when a checksum record was
/// seen, the byte offset where the region records end
fn scan(bytes: &[u8], capacity: u32) -> (Layout, Option<usize>) {
    let mut layout = Layout::new(capacity);
    let mut trailer = None;

    for (i, record) in bytes.chunks_exact(RECORD_SIZE).enumerate() {
        let magic = u16::from_le_bytes([record[0], record[1]]);
        if magic == CHECKSUM_MAGIC {
            trailer = Some(i * RECORD_SIZE);
            break;
        }
        if magic != REGION_MAGIC {
            break;
        }
        layout.add_region(read_record(record));
    }

    (layout, trailer)
}

fn read_record(record: &[u8]) -> Region {
    let type_code = record[2];
    let subtype = record[3];
    let offset = u32::from_le_bytes(record[4..8].try_into().unwrap());
    let size = u32::from_le_bytes(record[8..12].try_into().unwrap());
    let name = parse_name(&record[12..28]);
    let flags =
        RegionFlags::from_bits_truncate(u32::from_le_bytes(record[28..32].try_into().unwrap()));

    let mut region = Region::new(name.clone(), decode_kind(type_code, subtype, &name), offset, size);
    region.subtype = subtype;
    region.read_only = flags.contains(RegionFlags::READ_ONLY);
    region.encrypted = flags.contains(RegionFlags::ENCRYPTED);
    region
}

/// Parse a NUL-terminated name field
fn parse_name(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::catalog::catalog;
    use crate::layout::plan::{plan_fixed, SpaceMode};
    use crate::layout::types::ImageRequest;

    const CAP_16M: u32 = 16 * 1024 * 1024;

    fn sample_layout() -> Layout {
        let images = [
            ImageRequest::new("app_a", 1_000_000),
            ImageRequest::new("app_b", 2_500_000),
        ];
        let mut layout = plan_fixed(CAP_16M, &catalog(), &images, SpaceMode::Strict).unwrap();
        layout.validate().unwrap();
        layout
    }

    #[test]
    fn test_record_bytes_exact() {
        let mut layout = Layout::new(CAP_16M);
        let mut region = Region::new("nvs", PartitionKind::Nvs, 0x1_2000, 0x6000);
        region.encrypted = true;
        layout.add_region(region);

        let buf = serialize(&layout).unwrap();

        // magic 0xAA50 little-endian
        assert_eq!(&buf[0..2], &[0x50, 0xAA]);
        // type/subtype
        assert_eq!(buf[2], TYPE_DATA);
        assert_eq!(buf[3], SUBTYPE_NVS);
        // offset/size little-endian
        assert_eq!(&buf[4..8], &0x1_2000u32.to_le_bytes());
        assert_eq!(&buf[8..12], &0x6000u32.to_le_bytes());
        // name NUL-padded to 16 bytes
        assert_eq!(&buf[12..15], b"nvs");
        assert_eq!(&buf[15..28], &[0u8; 13]);
        // flags: bit0 = encrypted
        assert_eq!(&buf[28..32], &1u32.to_le_bytes());
    }

    #[test]
    fn test_checksum_record() {
        let layout = sample_layout();
        let buf = serialize(&layout).unwrap();
        let trailer = layout.len() * RECORD_SIZE;

        assert_eq!(&buf[trailer..trailer + 2], &[0xEB, 0xEB]);
        assert_eq!(&buf[trailer + 2..trailer + 16], &[0xFF; 14]);
        let digest = Md5::digest(&buf[..trailer]);
        assert_eq!(&buf[trailer + 16..trailer + 32], digest.as_slice());
        // Everything after the checksum record is erased-state padding
        assert!(buf[trailer + 32..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_serialize_deterministic() {
        let layout = sample_layout();
        assert_eq!(serialize(&layout).unwrap(), serialize(&layout).unwrap());
    }

    #[test]
    fn test_round_trip() {
        let layout = sample_layout();
        let buf = serialize(&layout).unwrap();
        let imported = import(&buf, CAP_16M);

        assert_eq!(imported.len(), layout.len());
        for (a, b) in layout.regions.iter().zip(&imported.regions) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.kind, b.kind);
            assert_eq!(a.subtype, b.subtype);
            assert_eq!(a.offset, b.offset);
            assert_eq!(a.size, b.size);
            assert_eq!(a.read_only, b.read_only);
            assert_eq!(a.encrypted, b.encrypted);
        }
    }

    #[test]
    fn test_name_truncated_to_15() {
        let mut layout = Layout::new(CAP_16M);
        layout.add_region(Region::new(
            "a_very_long_partition_name",
            PartitionKind::OtaSlot(0),
            0x2_0000,
            0x1_0000,
        ));
        let buf = serialize(&layout).unwrap();
        assert_eq!(&buf[12..27], b"a_very_long_par");
        assert_eq!(buf[27], 0);

        let imported = import(&buf, CAP_16M);
        assert_eq!(imported.regions[0].name, "a_very_long_par");
    }

    #[test]
    fn test_import_unrecognized_magic_is_empty() {
        // All-zero buffer: not corruption, just no table
        let buf = [0u8; TABLE_MAX_SIZE];
        let layout = import(&buf, CAP_16M);
        assert!(layout.is_empty());
    }

    #[test]
    fn test_import_stops_at_checksum() {
        let layout = sample_layout();
        let mut buf = serialize(&layout).unwrap();
        // Garbage after the checksum record must not be parsed
        let trailer = layout.len() * RECORD_SIZE;
        buf[trailer + RECORD_SIZE..trailer + 2 * RECORD_SIZE]
            .copy_from_slice(&[0xAB; RECORD_SIZE]);
        let imported = import(&buf, CAP_16M);
        assert_eq!(imported.len(), layout.len());
    }

    #[test]
    fn test_app_subtype_name_fallback() {
        let mut layout = Layout::new(CAP_16M);
        let mut factory = Region::new("factory_app", PartitionKind::FactoryApp, 0x2_0000, 0x1_0000);
        factory.subtype = 0xEE;
        let mut mystery = Region::new("mystery", PartitionKind::OtaSlot(0), 0x3_0000, 0x1_0000);
        mystery.subtype = 0xEF;
        layout.add_region(factory);
        layout.add_region(mystery);

        let buf = serialize(&layout).unwrap();
        let imported = import(&buf, CAP_16M);

        assert_eq!(imported.regions[0].kind, PartitionKind::FactoryApp);
        assert_eq!(imported.regions[1].kind, PartitionKind::OtaSlot(0));
        // Raw subtype bytes survive the fallback reclassification
        assert_eq!(imported.regions[0].subtype, 0xEE);
        assert_eq!(imported.regions[1].subtype, 0xEF);
    }

    #[test]
    fn test_verify_checksum() {
        let layout = sample_layout();
        let mut buf = serialize(&layout).unwrap();

        let options = ImportOptions {
            verify_checksum: true,
        };
        assert!(import_with_options(&buf, CAP_16M, options).is_ok());

        // Flip one bit in a region record
        buf[8] ^= 0x01;
        assert_eq!(
            import_with_options(&buf, CAP_16M, options),
            Err(Error::ChecksumMismatch)
        );
        // Default options never check the trailer
        assert_eq!(import(&buf, CAP_16M).len(), layout.len());
    }

    #[test]
    fn test_verify_checksum_missing_trailer_ok() {
        let layout = sample_layout();
        let buf = serialize(&layout).unwrap();
        // Chop the buffer right after the region records
        let records = &buf[..layout.len() * RECORD_SIZE];
        let options = ImportOptions {
            verify_checksum: true,
        };
        let imported = import_with_options(records, CAP_16M, options).unwrap();
        assert_eq!(imported.len(), layout.len());
    }

    #[test]
    fn test_serialize_too_many() {
        let mut layout = Layout::new(0x4000_0000);
        for i in 0..128u32 {
            layout.add_region(Region::new(
                "r",
                PartitionKind::OtaSlot(0),
                0x10_0000 + i * 0x1_0000,
                0x1_0000,
            ));
        }
        assert_eq!(
            serialize(&layout),
            Err(Error::TooManyPartitions { count: 128 })
        );
    }

    #[test]
    fn test_subtype_code_saturates() {
        assert_eq!(subtype_code(PartitionKind::OtaSlot(0)), SUBTYPE_OTA_BASE);
        assert_eq!(subtype_code(PartitionKind::OtaSlot(0x7F)), 0x8F);
        // Out-of-range slot indices saturate instead of wrapping
        assert_eq!(subtype_code(PartitionKind::OtaSlot(0xF0)), 0xFF);
        assert_eq!(subtype_code(PartitionKind::OtaSlot(0xFF)), 0xFF);
    }

    #[test]
    fn test_serialize_buffer_too_small() {
        let layout = sample_layout();
        let mut buf = alloc::vec![0u8; RECORD_SIZE];
        assert_eq!(serialize_into(&layout, &mut buf), Err(Error::BufferTooSmall));
    }
}
