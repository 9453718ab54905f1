//! ZIP archive writer.
//!
//! Headers are regenerated wholesale on every build: offsets shift as soon as
//! any entry changes size, so nothing from the source central directory is
//! patched in place. Entries that were never touched reuse their original
//! compressed payload.

use tracing::debug;

use crate::error::{Error, Result};
use crate::package::PackageArchive;

use super::structures::*;

/// Default deflate level, matching zlib's default.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Deflate level 0-9 for entries that need (re)compression; 0 stores.
    pub level: u32,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl BuildOptions {
    pub fn with_level(level: u32) -> Self {
        Self { level }
    }
}

fn checked_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::ArchiveTooLarge(format!("{} of {} bytes needs Zip64", what, value)))
}

/// Serialize the table to ZIP bytes in archive order.
///
/// Dirty entries get their CRC, sizes and payload recomputed first.
pub fn build(archive: &mut PackageArchive, options: &BuildOptions) -> Result<Vec<u8>> {
    if archive.len() > u16::MAX as usize {
        return Err(Error::ArchiveTooLarge(format!(
            "{} entries exceed the 65535 entry limit",
            archive.len()
        )));
    }

    let mut out: Vec<u8> = Vec::with_capacity(archive.original_size() as usize);
    let mut central = Vec::with_capacity(archive.len());

    for entry in archive.entries_mut() {
        let payload_len = entry.seal(options.level)?.len();
        let name = entry.path().as_bytes().to_vec();
        let flags = if entry.path().is_ascii() { 0 } else { FLAG_UTF8 };
        let lfh_offset = checked_u32(out.len(), "local header offset")?;

        let header = LocalFileHeader {
            version_needed: VERSION_NEEDED,
            flags,
            method: entry.method().as_u16(),
            last_mod_time: entry.last_mod_time(),
            last_mod_date: entry.last_mod_date(),
            crc32: entry.crc32(),
            compressed_size: checked_u32(payload_len, entry.path())?,
            uncompressed_size: checked_u32(entry.data().len(), entry.path())?,
            file_name: name.clone(),
            extra: Vec::new(),
        };
        header.write_to(&mut out)?;
        out.extend_from_slice(entry.raw().unwrap_or_default());

        central.push(CentralDirectoryRecord {
            version_made_by: VERSION_MADE_BY,
            version_needed: VERSION_NEEDED,
            flags,
            method: header.method,
            last_mod_time: header.last_mod_time,
            last_mod_date: header.last_mod_date,
            crc32: header.crc32,
            compressed_size: header.compressed_size,
            uncompressed_size: header.uncompressed_size,
            disk_number_start: 0,
            internal_attrs: 0,
            external_attrs: entry.external_attrs(),
            lfh_offset,
            file_name: name,
            extra: Vec::new(),
            comment: Vec::new(),
        });
    }

    let cd_offset = checked_u32(out.len(), "central directory offset")?;
    for record in &central {
        record.write_to(&mut out)?;
    }
    let cd_size = checked_u32(out.len() - cd_offset as usize, "central directory")?;

    let comment = archive.comment();
    if comment.len() > u16::MAX as usize {
        return Err(Error::ArchiveTooLarge("archive comment exceeds 65535 bytes".to_string()));
    }
    let eocd = EndOfCentralDirectory {
        disk_number: 0,
        disk_with_cd: 0,
        disk_entries: central.len() as u16,
        total_entries: central.len() as u16,
        cd_size,
        cd_offset,
        comment_len: comment.len() as u16,
    };
    eocd.write_to(&mut out, comment)?;

    debug!(entries = central.len(), size = out.len(), "built archive");
    Ok(out)
}
