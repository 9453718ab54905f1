//! Low-level ZIP archive parser.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the buffer's end
//! 2. Read the Central Directory to get metadata for all files
//! 3. For each record, read its Local File Header and payload
//! 4. Decompress and verify the CRC-32
//!
//! The whole archive is already in memory, so the parser works on a byte
//! slice and never performs I/O.

use std::io::Cursor;

use tracing::debug;

use crate::error::{Error, Result};
use crate::package::{Entry, PackageArchive, StoredMeta, normalize_path};

use super::compression;
use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: usize = 65535;

/// Parser over an in-memory archive.
pub struct ZipParser<'data> {
    data: &'data [u8],
}

impl<'data> ZipParser<'data> {
    pub fn new(data: &'data [u8]) -> Self {
        Self { data }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Tries the no-comment position first, then scans backwards through the
    /// last 64 KiB for a signature whose comment length matches the bytes
    /// that follow it.
    ///
    /// # Returns
    ///
    /// A tuple of (EOCD record, offset of EOCD in the buffer).
    pub fn find_eocd(&self) -> Result<(EndOfCentralDirectory, usize)> {
        let size = self.data.len();
        if size < EndOfCentralDirectory::SIZE {
            return Err(Error::MalformedArchive(format!(
                "{} bytes is too short to be a ZIP archive",
                size
            )));
        }

        // Common case: no archive comment
        let offset = size - EndOfCentralDirectory::SIZE;
        let tail = &self.data[offset..];
        if &tail[0..4] == EndOfCentralDirectory::SIGNATURE && tail[20..22] == [0, 0] {
            return Ok((EndOfCentralDirectory::from_bytes(tail)?, offset));
        }

        let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE).min(size);
        let search_start = size - search_size;
        let buf = &self.data[search_start..];

        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
                let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
                if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                    let eocd =
                        EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE])?;
                    return Ok((eocd, search_start + i));
                }
            }
        }

        Err(Error::MalformedArchive(
            "End of Central Directory signature not found".to_string(),
        ))
    }

    /// Read every central directory record in stored order.
    pub fn central_directory(&self) -> Result<(EndOfCentralDirectory, Vec<CentralDirectoryRecord>)> {
        let (eocd, eocd_offset) = self.find_eocd()?;

        if eocd.is_zip64() {
            return Err(Error::MalformedArchive(
                "Zip64 archives are not supported".to_string(),
            ));
        }
        if eocd.disk_number != 0 || eocd.disk_with_cd != 0 || eocd.disk_entries != eocd.total_entries {
            return Err(Error::MalformedArchive(
                "multi-disk archives are not supported".to_string(),
            ));
        }

        let cd_start = eocd.cd_offset as usize;
        let cd_end = cd_start + eocd.cd_size as usize;
        if cd_end > eocd_offset {
            return Err(Error::MalformedArchive(format!(
                "central directory [{}, {}) overlaps the EOCD at {}",
                cd_start, cd_end, eocd_offset
            )));
        }

        let mut cursor = Cursor::new(&self.data[cd_start..cd_end]);
        let mut records = Vec::with_capacity(eocd.total_entries as usize);
        for _ in 0..eocd.total_entries {
            let record = CentralDirectoryRecord::read_from(&mut cursor)?;
            if record.is_zip64() {
                return Err(Error::MalformedArchive(
                    "Zip64 entries are not supported".to_string(),
                ));
            }
            records.push(record);
        }

        Ok((eocd, records))
    }

    /// Read the local header and compressed payload for one record.
    pub fn payload(&self, record: &CentralDirectoryRecord) -> Result<(LocalFileHeader, &'data [u8])> {
        let lfh_offset = record.lfh_offset as usize;
        if lfh_offset >= self.data.len() {
            return Err(Error::MalformedArchive(format!(
                "local header offset {} is past the end of the archive",
                lfh_offset
            )));
        }

        let mut cursor = Cursor::new(&self.data[lfh_offset..]);
        let header = LocalFileHeader::read_from(&mut cursor)?;

        // Sizes in the local header may be zero when bit 3 (data descriptor)
        // is set, so the central directory is authoritative.
        let start = lfh_offset + header.encoded_len();
        let end = start + record.compressed_size as usize;
        if end > self.data.len() {
            return Err(Error::MalformedArchive(format!(
                "payload [{}, {}) runs past the end of the archive",
                start, end
            )));
        }

        Ok((header, &self.data[start..end]))
    }
}

/// Decode an archive into a file table.
///
/// Fails with [`Error::MalformedArchive`] for structural damage,
/// [`Error::UnsupportedCompression`] for methods other than stored/deflate and
/// [`Error::CrcMismatch`] when decompressed content does not verify.
pub fn extract(data: &[u8]) -> Result<PackageArchive> {
    let parser = ZipParser::new(data);
    let (eocd, records) = parser.central_directory()?;

    let comment_start = data.len() - eocd.comment_len as usize;
    let comment = data[comment_start..].to_vec();

    let mut entries = Vec::with_capacity(records.len());
    for record in &records {
        let name = String::from_utf8(record.file_name.clone()).map_err(|_| {
            Error::MalformedArchive(format!(
                "entry name {:?} is not valid UTF-8",
                String::from_utf8_lossy(&record.file_name)
            ))
        })?;
        let path = normalize_path(&name)
            .map_err(|e| Error::MalformedArchive(format!("bad entry name {:?}: {}", name, e)))?;

        let (_header, payload) = parser.payload(record)?;
        let method = CompressionMethod::from_u16(record.method);
        let content =
            compression::decode(&path, method, payload, record.uncompressed_size as usize)?;

        let actual = compression::crc32(&content);
        if actual != record.crc32 {
            return Err(Error::CrcMismatch {
                path,
                expected: record.crc32,
                actual,
            });
        }
        if content.len() != record.uncompressed_size as usize {
            return Err(Error::MalformedArchive(format!(
                "{} declares {} bytes but inflates to {}",
                path,
                record.uncompressed_size,
                content.len()
            )));
        }

        debug!(path = %path, method = record.method, size = content.len(), "extracted entry");
        let meta = StoredMeta {
            method,
            crc32: record.crc32,
            compressed_size: record.compressed_size,
            last_mod_time: record.last_mod_time,
            last_mod_date: record.last_mod_date,
            external_attrs: record.external_attrs,
        };
        entries.push(Entry::from_stored(path, content, payload.to_vec(), meta));
    }

    PackageArchive::from_entries(entries, data.len() as u64, comment)
}
