//! CLI command implementations
//!
//! The `plan` module covers planning and table generation, `show`
//! covers parsing tables back out of flash images. Both work on plain
//! byte buffers through the `DummyDevice` file-backed path, so the
//! same code serves image files and (eventually) real programmers.

pub mod plan;
pub mod show;

use ptable_core::layout::Layout;

/// Format a byte count with a binary suffix
fn format_size(bytes: u32) -> String {
    if bytes >= 1024 * 1024 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}

/// Print a layout as a table
pub fn print_layout(layout: &Layout) {
    println!("Partition Table");
    println!("===============");
    println!(
        "Capacity: {} bytes ({})",
        layout.capacity,
        format_size(layout.capacity)
    );
    println!(
        "Used:     {} bytes in {} regions",
        layout.total_used(),
        layout.len()
    );

    println!(
        "\n{:<16} {:<12} {:>10} {:>10} {:>6} {:>6} {:>6}",
        "Name", "Kind", "Offset", "Size", "RO", "Enc", "Trunc"
    );
    println!("{:-<72}", "");

    for region in &layout.regions {
        println!(
            "{:<16} {:<12} {:#010X} {:>10} {:>6} {:>6} {:>6}",
            region.name,
            format!("{:?}", region.kind),
            region.offset,
            format_size(region.size),
            if region.read_only { "yes" } else { "-" },
            if region.encrypted { "yes" } else { "-" },
            if region.truncated { "yes" } else { "-" },
        );
    }
}
