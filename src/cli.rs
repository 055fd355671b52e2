//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
pub fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a size string like "16 MiB", "0x1000000" or "4096"
pub fn parse_size(s: &str) -> Result<u32, String> {
    let s = s.trim();

    // Try plain number first
    if let Ok(n) = s.parse::<u32>() {
        return Ok(n);
    }

    // Try hex
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if let Ok(n) = u32::from_str_radix(hex.trim(), 16) {
            return Ok(n);
        }
    }

    // Try with suffix
    let s_lower = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = s_lower.strip_suffix("mib") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("mb") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("kib") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix("kb") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix('b') {
        (n.trim(), 1)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let num: u32 = num_str
        .parse()
        .map_err(|_| format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {}", s))
}

#[derive(Parser)]
#[command(name = "ptable")]
#[command(author, version, about = "Flash partition table planner", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Planning options shared by `plan` and `gen`
#[derive(clap::Args, Debug, Clone)]
pub struct PlanArgs {
    /// Flash capacity (decimal, 0x hex, or KiB/MiB suffix)
    #[arg(short, long, value_parser = parse_size)]
    pub capacity: u32,

    /// Image to place, as ID:SIZE; repeat for multiple images,
    /// placement order is argument order
    #[arg(long = "image", value_name = "ID:SIZE", required = true)]
    pub images: Vec<String>,

    /// Divide the remaining space proportionally instead of giving
    /// each image its fixed requirement
    #[arg(long)]
    pub proportional: bool,

    /// Clamp an overflowing slot to the remaining space instead of
    /// failing
    #[arg(long)]
    pub tolerant: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Plan a layout and print it
    Plan {
        #[command(flatten)]
        args: PlanArgs,
    },

    /// Plan a layout and write the binary table into a flash image
    Gen {
        #[command(flatten)]
        args: PlanArgs,

        /// Flash image file (created 0xFF-filled if missing)
        #[arg(short, long)]
        output: PathBuf,

        /// Offset of the partition table in the image
        #[arg(long, value_parser = parse_hex_u32, default_value = "0x8000")]
        offset: u32,
    },

    /// Parse and print the partition table from a flash image
    Show {
        /// Flash image file
        #[arg(short, long)]
        input: PathBuf,

        /// Offset of the partition table in the image
        #[arg(long, value_parser = parse_hex_u32, default_value = "0x8000")]
        offset: u32,
    },

    /// Parse a flash image and verify the table's MD5 trailer
    Verify {
        /// Flash image file
        #[arg(short, long)]
        input: PathBuf,

        /// Offset of the partition table in the image
        #[arg(long, value_parser = parse_hex_u32, default_value = "0x8000")]
        offset: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4096"), Ok(4096));
        assert_eq!(parse_size("0x8000"), Ok(0x8000));
        assert_eq!(parse_size("16MiB"), Ok(16 * 1024 * 1024));
        assert_eq!(parse_size("64 KiB"), Ok(64 * 1024));
        assert!(parse_size("sixteen").is_err());
    }

    #[test]
    fn test_parse_size_overflow() {
        // Suffixed sizes past u32::MAX must error, not wrap
        assert!(parse_size("8192MiB").is_err());
        assert_eq!(parse_size("4096MiB"), Err("size too large: 4096MiB".to_string()));
        assert_eq!(parse_size("4095MiB"), Ok(4095 * 1024 * 1024));
    }

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x8000"), Ok(0x8000));
        assert_eq!(parse_hex_u32("4096"), Ok(4096));
        assert!(parse_hex_u32("0xZZ").is_err());
    }
}
