//! # ooxpack
//!
//! An engine for Office Open XML packages (`.pptx`, `.docx`, `.xlsx`).
//!
//! A package is a ZIP archive of XML parts tied together by relationship
//! parts and a content type registry. This library reads one into an
//! ordered in-memory table, edits it at the level of parts and themes, and
//! writes it back. Untouched parts keep their original compressed bytes.
//!
//! ## Layers
//!
//! - [`zip`]: STORED/DEFLATE archive codec
//! - [`package`]: the virtual file table
//! - [`opc`]: content types, relationships and theme editing
//! - [`extensions`]: named operations contributed by pluggable modules
//! - [`remote`]: a retrying remote compression service used when the local
//!   codec cannot decode or encode an archive
//!
//! ## Example
//!
//! ```no_run
//! use ooxpack::opc::OoxmlPackage;
//! use ooxpack::zip::BuildOptions;
//!
//! fn main() -> ooxpack::Result<()> {
//!     let data = std::fs::read("deck.pptx")?;
//!     let mut package = OoxmlPackage::from_bytes(&data)?;
//!
//!     let theme = package.set_colors(&["1F2937", "F9FAFB", "374151", "E5E7EB", "2563EB", "DB2777"])?;
//!     println!("{:?}", theme.major_font);
//!
//!     std::fs::write("deck-themed.pptx", package.to_bytes(&BuildOptions::default())?)?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod extensions;
pub mod io;
pub mod opc;
pub mod package;
pub mod remote;
pub mod xml;
pub mod zip;

pub use cli::Cli;
pub use config::Config;
pub use error::{Error, ErrorCategory, Result};
pub use extensions::Facade;
pub use opc::OoxmlPackage;
pub use package::PackageArchive;
pub use zip::{BuildOptions, build, extract};
