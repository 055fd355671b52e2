//! Table inspection commands

use std::fs;
use std::path::Path;

use ptable_core::layout::table::{import_with_options, ImportOptions, TABLE_MAX_SIZE};
use ptable_core::layout::Layout;

use crate::commands::print_layout;

/// Read and parse the table stored in a flash image file
fn import_from_file(
    input: &Path,
    table_offset: u32,
    options: ImportOptions,
) -> Result<Layout, Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    let start = table_offset as usize;
    if start >= data.len() {
        return Err(format!(
            "table offset {:#X} is beyond the {} byte image",
            table_offset,
            data.len()
        )
        .into());
    }

    let end = (start + TABLE_MAX_SIZE).min(data.len());
    let layout = import_with_options(&data[start..end], data.len() as u32, options)?;
    Ok(layout)
}

/// Parse and print the partition table from a flash image
pub fn cmd_show(input: &Path, table_offset: u32) -> Result<(), Box<dyn std::error::Error>> {
    let layout = import_from_file(input, table_offset, ImportOptions::default())?;
    if layout.is_empty() {
        println!("No partition table found at {:#X}", table_offset);
        return Ok(());
    }
    print_layout(&layout);
    Ok(())
}

/// Parse a flash image and verify the table's MD5 trailer
pub fn cmd_verify(input: &Path, table_offset: u32) -> Result<(), Box<dyn std::error::Error>> {
    let options = ImportOptions {
        verify_checksum: true,
    };
    let layout = import_from_file(input, table_offset, options)?;
    if layout.is_empty() {
        return Err(format!("no partition table found at {:#X}", table_offset).into());
    }
    println!("Checksum OK, {} regions", layout.len());
    Ok(())
}
