//! ptable-core - Flash partition table layout engine
//!
//! This crate decides where each application image lives in a
//! fixed-size flash address space, serializes that decision into the
//! byte-exact on-device table format with its MD5 trailer, validates
//! the result, and parses existing tables back into the same logical
//! model. It is `no_std` compatible (with `alloc`) for use in
//! boot-time code.
//!
//! # Features
//!
//! - `std` - Enable standard library support (serde derives on the
//!   layout types, `std::error::Error` impls)
//!
//! # Example
//!
//! ```ignore
//! use ptable_core::layout::{catalog, plan, table, ImageRequest};
//!
//! let images = [ImageRequest::new("app_a", 3_000_000)];
//! let mut layout = plan::plan_fixed(
//!     16 * 1024 * 1024,
//!     &catalog::catalog(),
//!     &images,
//!     plan::SpaceMode::Strict,
//! )?;
//! layout.validate()?;
//! let bytes = table::serialize(&layout)?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod device;
pub mod error;
pub mod layout;

pub use error::{Error, Result};
