//! ZIP container codec.
//!
//! ## Architecture
//!
//! - [`structures`]: fixed binary layouts (EOCD, central and local headers)
//! - [`parser`]: locate the EOCD, walk the central directory, decode payloads
//! - [`writer`]: regenerate headers and serialize a table back to bytes
//! - [`compression`]: raw DEFLATE and CRC-32
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! ## Supported Features
//!
//! - STORED (no compression) and DEFLATE methods
//! - Archive comments up to 64 KiB
//!
//! ## Limitations
//!
//! - No Zip64, no multi-disk archives, no encryption
//!
//! The codec is synchronous and performs no I/O; remote substitutes live in
//! [`crate::remote`].

pub mod compression;
mod parser;
mod structures;
mod writer;

pub use parser::{ZipParser, extract};
pub use structures::*;
pub use writer::{BuildOptions, DEFAULT_COMPRESSION_LEVEL, build};
