//! Planning and table generation commands

use std::fs;
use std::path::Path;

use ptable_core::device::write_table_to_device;
use ptable_core::layout::catalog::catalog;
use ptable_core::layout::plan::{plan_fixed, plan_proportional, SpaceMode};
use ptable_core::layout::{ImageRequest, Layout};
use ptable_dummy::DummyDevice;

use crate::cli::{parse_size, PlanArgs};
use crate::commands::print_layout;

/// Errors in the `--image ID:SIZE` argument format
#[derive(Debug, thiserror::Error)]
pub enum ImageSpecError {
    #[error("invalid image spec '{0}', expected ID:SIZE")]
    Malformed(String),
    #[error("invalid size in image spec '{spec}': {reason}")]
    BadSize { spec: String, reason: String },
}

/// Parse `--image` arguments into requests, preserving order
pub fn parse_images(specs: &[String]) -> Result<Vec<ImageRequest>, ImageSpecError> {
    specs
        .iter()
        .map(|spec| {
            let (id, size) = spec
                .rsplit_once(':')
                .ok_or_else(|| ImageSpecError::Malformed(spec.clone()))?;
            if id.is_empty() {
                return Err(ImageSpecError::Malformed(spec.clone()));
            }
            let byte_size = parse_size(size).map_err(|reason| ImageSpecError::BadSize {
                spec: spec.clone(),
                reason,
            })?;
            Ok(ImageRequest::new(id, byte_size))
        })
        .collect()
}

/// Plan and validate a layout from CLI arguments
fn plan_layout(args: &PlanArgs) -> Result<Layout, Box<dyn std::error::Error>> {
    let images = parse_images(&args.images)?;
    let mode = if args.tolerant {
        SpaceMode::Tolerant
    } else {
        SpaceMode::Strict
    };

    let mut layout = if args.proportional {
        plan_proportional(args.capacity, &catalog(), &images, mode)?
    } else {
        plan_fixed(args.capacity, &catalog(), &images, mode)?
    };
    layout.validate()?;
    Ok(layout)
}

/// Plan a layout and print it
pub fn cmd_plan(args: &PlanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let layout = plan_layout(args)?;
    print_layout(&layout);

    for region in layout.regions.iter().filter(|r| r.truncated) {
        eprintln!(
            "warning: '{}' was truncated to {} bytes, treat as degraded placement",
            region.name, region.size
        );
    }
    Ok(())
}

/// Plan a layout and write the serialized table into a flash image
pub fn cmd_gen(
    args: &PlanArgs,
    output: &Path,
    table_offset: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let layout = plan_layout(args)?;

    // Reuse an existing image file so partitions outside the table
    // survive; otherwise start from an erased image.
    let mut device = if output.exists() {
        let data = fs::read(output)?;
        if data.len() != args.capacity as usize {
            return Err(format!(
                "existing image is {} bytes, expected capacity {}",
                data.len(),
                args.capacity
            )
            .into());
        }
        DummyDevice::with_data(data)
    } else {
        DummyDevice::new(args.capacity)
    };

    write_table_to_device(&mut device, table_offset, &layout)?;
    fs::write(output, device.into_data())?;

    print_layout(&layout);
    println!(
        "\nWrote partition table at {:#X} in {:?}",
        table_offset, output
    );
    Ok(())
}
