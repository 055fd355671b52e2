//! Allocation planner
//!
//! Computes a non-overlapping, aligned set of application-slot regions
//! filling the flash space left over by the system catalog. Placement
//! order is always caller input order; sizes never reorder requests.
//!
//! Two policies are available: fixed-slot (each image gets exactly its
//! aligned requirement) and proportional-fill (images share the
//! remaining space pro rata, floored at each image's own requirement).

use alloc::vec::Vec;

use crate::error::{Error, Result};

use super::catalog::first_free_offset;
use super::types::{ImageRequest, Layout, PartitionKind, Region, APP_ALIGNMENT, MAX_ENTRIES};

/// Padding added to every image before alignment, one erase block
pub const SLOT_PADDING: u32 = 0x1000;

/// Smallest slot the planner will create
pub const MIN_SLOT_SIZE: u32 = APP_ALIGNMENT;

/// How the planner reacts when an image does not fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpaceMode {
    /// Fail with `InsufficientSpace` as soon as a slot does not fit
    #[default]
    Strict,
    /// Clamp the overflowing slot to the remaining space and mark it
    /// `truncated`; images after it are skipped with a warning
    Tolerant,
}

/// Slot sizing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlanPolicy {
    /// Each image gets exactly its aligned size requirement
    #[default]
    Fixed,
    /// Images share the remaining space proportionally to their sizes
    Proportional,
}

/// Planner-internal per-image sizing decision
///
/// `priority` is assigned by input order (0 = highest) and is only the
/// placement order; it is never persisted.
#[derive(Debug, Clone)]
struct SlotRequest {
    priority: usize,
    minimum_size: u64,
    preferred_size: u64,
}

fn align64(value: u64, align: u64) -> u64 {
    (value + align - 1) & !(align - 1)
}

/// Aligned size requirement of a single image
fn fixed_requirement(image: &ImageRequest) -> u64 {
    let need = image.byte_size as u64 + SLOT_PADDING as u64;
    align64(need, APP_ALIGNMENT as u64).max(MIN_SLOT_SIZE as u64)
}

/// Plan fixed-size OTA slots after the given base regions
///
/// Slots start at the first OTA-aligned offset past the highest base
/// region and are placed in input order. See [`SpaceMode`] for the
/// out-of-space behavior.
pub fn plan_fixed(
    capacity: u32,
    base: &[Region],
    images: &[ImageRequest],
    mode: SpaceMode,
) -> Result<Layout> {
    plan(capacity, base, images, PlanPolicy::Fixed, mode)
}

/// Plan proportionally sized OTA slots after the given base regions
///
/// With two or more images the remaining space is divided pro rata by
/// image size, with each slot floored at that image's own fixed
/// requirement so its data always fits; the last slot absorbs any
/// slack. A single image is given the entire remaining space.
pub fn plan_proportional(
    capacity: u32,
    base: &[Region],
    images: &[ImageRequest],
    mode: SpaceMode,
) -> Result<Layout> {
    plan(capacity, base, images, PlanPolicy::Proportional, mode)
}

/// Re-plan application slots while preserving system partitions
///
/// Every `is_app_slot` region of `existing` is dropped; all other
/// regions keep their original offsets, which is the mechanism by
/// which system partitions are never silently relocated. New slots are
/// placed after the highest surviving region.
pub fn plan_preserve_existing(
    existing: &Layout,
    capacity: u32,
    images: &[ImageRequest],
    policy: PlanPolicy,
    mode: SpaceMode,
) -> Result<Layout> {
    let survivors: Vec<Region> = existing
        .regions
        .iter()
        .filter(|r| !r.is_app_slot())
        .cloned()
        .collect();
    plan(capacity, &survivors, images, policy, mode)
}

fn plan(
    capacity: u32,
    base: &[Region],
    images: &[ImageRequest],
    policy: PlanPolicy,
    mode: SpaceMode,
) -> Result<Layout> {
    if images.is_empty() {
        return Err(Error::InvalidArgument);
    }
    let count = base.len() + images.len();
    if count > MAX_ENTRIES {
        return Err(Error::TooManyPartitions { count });
    }

    let start = first_free_offset(base);
    if start >= capacity as u64 {
        return Err(Error::InsufficientSpace {
            required: fixed_requirement(&images[0]).min(u32::MAX as u64) as u32,
            available: 0,
        });
    }
    let available = capacity as u64 - start;

    let requests = size_requests(images, available, policy);

    let mut layout = Layout::new(capacity);
    for region in base {
        layout.add_region(region.clone());
    }

    let mut cursor = start;
    let mut placed = false;
    for (request, image) in requests.iter().zip(images) {
        if cursor >= capacity as u64 && placed && mode == SpaceMode::Tolerant {
            // A previous slot was truncated to the end of flash
            log::warn!("no space left for image '{}', skipping", image.id);
            continue;
        }

        let remaining = capacity as u64 - cursor;
        let wanted = request.preferred_size;
        let mut size = wanted;
        let mut truncated = false;

        if wanted > remaining {
            match mode {
                SpaceMode::Strict => {
                    return Err(Error::InsufficientSpace {
                        required: wanted.min(u32::MAX as u64) as u32,
                        available: remaining as u32,
                    });
                }
                SpaceMode::Tolerant => {
                    size = remaining;
                    truncated = true;
                }
            }
        }

        log::debug!(
            "placing '{}' at 0x{:08X}, {} bytes (min {}, priority {}){}",
            image.id,
            cursor,
            size,
            request.minimum_size,
            request.priority,
            if truncated { ", truncated" } else { "" }
        );

        let slot_index = layout
            .regions
            .iter()
            .filter(|r| matches!(r.kind, PartitionKind::OtaSlot(_)))
            .count() as u8;
        let mut region = Region::new(
            image.id.clone(),
            PartitionKind::OtaSlot(slot_index),
            cursor as u32,
            size as u32,
        );
        region.truncated = truncated;
        layout.add_region(region);

        cursor += size;
        placed = true;
    }

    Ok(layout)
}

/// Compute per-image slot sizes for the given policy
fn size_requests(images: &[ImageRequest], available: u64, policy: PlanPolicy) -> Vec<SlotRequest> {
    let floors: Vec<u64> = images.iter().map(fixed_requirement).collect();

    match policy {
        PlanPolicy::Fixed => floors
            .iter()
            .enumerate()
            .map(|(priority, &floor)| SlotRequest {
                priority,
                minimum_size: floor,
                preferred_size: floor,
            })
            .collect(),
        PlanPolicy::Proportional => {
            if images.len() == 1 {
                // A single image is assigned the whole remaining space
                return alloc::vec![SlotRequest {
                    priority: 0,
                    minimum_size: floors[0],
                    preferred_size: available.max(floors[0]),
                }];
            }

            let total_request: u64 = floors.iter().sum();
            let mut requests = Vec::with_capacity(images.len());
            let mut used = 0u64;
            let last = images.len() - 1;
            for (priority, (image, &floor)) in images.iter().zip(&floors).enumerate() {
                let preferred = if priority == last {
                    // The last image absorbs whatever slack remains
                    available.saturating_sub(used).max(floor)
                } else {
                    let share = image.byte_size as u64 * available / total_request;
                    align64(share, APP_ALIGNMENT as u64).max(floor)
                };
                used += preferred;
                requests.push(SlotRequest {
                    priority,
                    minimum_size: floor,
                    preferred_size: preferred,
                });
            }
            requests
        }
    }
}
