use std::cell::OnceCell;

use crate::error::Result;
use crate::xml::XmlDocument;
use crate::zip::{CompressionMethod, DOS_EPOCH_DATE, DOS_EPOCH_TIME, compression, dos_date, dos_time};

/// One archive member.
///
/// Content is kept decompressed. The compressed payload read from the source
/// archive is retained alongside it so an untouched entry can be written back
/// byte-for-byte; any write drops it and marks the entry dirty.
#[derive(Debug, Clone)]
pub struct Entry {
    path: String,
    method: CompressionMethod,
    crc32: u32,
    uncompressed_size: u32,
    compressed_size: u32,
    raw: Option<Vec<u8>>,
    data: Vec<u8>,
    last_mod_time: u16,
    last_mod_date: u16,
    external_attrs: u32,
    dirty: bool,
    tree: OnceCell<XmlDocument>,
}

/// Metadata captured from the central directory when an entry is extracted.
#[derive(Debug, Clone)]
pub struct StoredMeta {
    pub method: CompressionMethod,
    pub crc32: u32,
    pub compressed_size: u32,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub external_attrs: u32,
}

impl Entry {
    /// A new entry created in memory; always dirty.
    pub fn new(path: String, data: Vec<u8>) -> Self {
        Self {
            path,
            method: CompressionMethod::Deflate,
            crc32: 0,
            uncompressed_size: 0,
            compressed_size: 0,
            raw: None,
            data,
            last_mod_time: DOS_EPOCH_TIME,
            last_mod_date: DOS_EPOCH_DATE,
            external_attrs: 0,
            dirty: true,
            tree: OnceCell::new(),
        }
    }

    /// An entry decoded from an archive. `raw` is the payload as stored.
    pub fn from_stored(path: String, data: Vec<u8>, raw: Vec<u8>, meta: StoredMeta) -> Self {
        Self {
            path,
            method: meta.method,
            crc32: meta.crc32,
            uncompressed_size: data.len() as u32,
            compressed_size: meta.compressed_size,
            raw: Some(raw),
            data,
            last_mod_time: meta.last_mod_time,
            last_mod_date: meta.last_mod_date,
            external_attrs: meta.external_attrs,
            dirty: false,
            tree: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_directory(&self) -> bool {
        self.path.ends_with('/')
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn method(&self) -> CompressionMethod {
        self.method
    }

    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    pub fn uncompressed_size(&self) -> u32 {
        self.uncompressed_size
    }

    pub fn compressed_size(&self) -> u32 {
        self.compressed_size
    }

    pub fn raw(&self) -> Option<&[u8]> {
        self.raw.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn last_mod_time(&self) -> u16 {
        self.last_mod_time
    }

    pub fn last_mod_date(&self) -> u16 {
        self.last_mod_date
    }

    pub fn external_attrs(&self) -> u32 {
        self.external_attrs
    }

    /// Modification date as (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        dos_date(self.last_mod_date)
    }

    /// Modification time as (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        dos_time(self.last_mod_time)
    }

    /// Replace the content. Stored CRC/sizes are stale until [`Entry::seal`].
    pub fn replace(&mut self, data: Vec<u8>) {
        self.data = data;
        self.raw = None;
        self.dirty = true;
        self.tree = OnceCell::new();
    }

    /// Parsed XML view, built on first access and cached.
    pub fn xml(&self) -> Result<&XmlDocument> {
        if let Some(doc) = self.tree.get() {
            return Ok(doc);
        }
        let doc = XmlDocument::parse(&self.path, &self.data)?;
        Ok(self.tree.get_or_init(|| doc))
    }

    /// Mutate the XML tree and write it back as the entry's content.
    /// When `f` fails its edits are discarded and the content is unchanged.
    pub fn update_xml<T>(&mut self, f: impl FnOnce(&mut XmlDocument) -> Result<T>) -> Result<T> {
        let mut doc = match self.tree.take() {
            Some(doc) => doc,
            None => XmlDocument::parse(&self.path, &self.data)?,
        };
        let out = f(&mut doc)?;
        self.data = doc.to_bytes();
        self.raw = None;
        self.dirty = true;
        self.tree = OnceCell::from(doc);
        Ok(out)
    }

    /// Recompute CRC and sizes and encode the payload if the entry is dirty
    /// or has no retained payload. Returns the payload to write.
    pub fn seal(&mut self, level: u32) -> Result<&[u8]> {
        if self.dirty || self.raw.is_none() {
            let (method, payload) = if self.is_directory() {
                (CompressionMethod::Stored, Vec::new())
            } else {
                compression::encode(&self.path, &self.data, level)?
            };
            self.method = method;
            self.crc32 = compression::crc32(&self.data);
            self.uncompressed_size = self.data.len() as u32;
            self.compressed_size = payload.len() as u32;
            self.raw = Some(payload);
            self.dirty = false;
        }
        Ok(self.raw.as_deref().unwrap_or_default())
    }
}
