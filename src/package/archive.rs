use std::collections::HashMap;

use tracing::debug;

use crate::error::{Error, Result};
use crate::xml::XmlDocument;

use super::entry::Entry;

/// Normalize a part path: forward slashes, no leading slash, no `.` or empty
/// segments, `..` resolved. A trailing slash (directory entry) is kept.
pub fn normalize_path(path: &str) -> Result<String> {
    let unified = path.replace('\\', "/");
    let is_dir = unified.ends_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                if segments.pop().is_none() {
                    return Err(Error::InvalidPath(format!("{} escapes the package root", path)));
                }
            },
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return Err(Error::InvalidPath(format!("{:?} names no entry", path)));
    }
    let mut normalized = segments.join("/");
    if is_dir {
        normalized.push('/');
    }
    Ok(normalized)
}

/// The package as a path-addressable table of entries.
///
/// Entries keep the order they had in the source central directory; new
/// entries are appended. Build writes them back in exactly this order.
#[derive(Debug, Clone, Default)]
pub struct PackageArchive {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
    original_size: u64,
    original_entry_count: usize,
    comment: Vec<u8>,
}

impl PackageArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a table from decoded entries, recording the source metadata.
    pub(crate) fn from_entries(entries: Vec<Entry>, original_size: u64, comment: Vec<u8>) -> Result<Self> {
        let mut archive = Self {
            entries: Vec::with_capacity(entries.len()),
            index: HashMap::with_capacity(entries.len()),
            original_size,
            original_entry_count: entries.len(),
            comment,
        };
        for entry in entries {
            archive.insert_checked(entry)?;
        }
        Ok(archive)
    }

    fn insert_checked(&mut self, entry: Entry) -> Result<()> {
        let path = entry.path().to_string();
        if self.index.contains_key(&path) {
            return Err(Error::MalformedArchive(format!("duplicate entry {}", path)));
        }
        self.check_kind_conflict(&path)?;
        self.index.insert(path, self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    /// A path may not be both a leaf and a directory.
    fn check_kind_conflict(&self, path: &str) -> Result<()> {
        let twin = match path.strip_suffix('/') {
            Some(leaf) => leaf.to_string(),
            None => format!("{}/", path),
        };
        if self.index.contains_key(&twin) {
            return Err(Error::PathConflict(format!(
                "{} collides with existing entry {}",
                path, twin
            )));
        }
        Ok(())
    }

    fn position(&self, path: &str) -> Result<usize> {
        let normalized = normalize_path(path)?;
        self.index
            .get(&normalized)
            .copied()
            .ok_or(Error::EntryNotFound(normalized))
    }

    pub fn has(&self, path: &str) -> bool {
        normalize_path(path)
            .map(|p| self.index.contains_key(&p))
            .unwrap_or(false)
    }

    pub fn get(&self, path: &str) -> Result<&[u8]> {
        Ok(self.entries[self.position(path)?].data())
    }

    pub fn get_text(&self, path: &str) -> Result<String> {
        let bytes = self.get(path)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| Error::Xml {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn entry(&self, path: &str) -> Result<&Entry> {
        Ok(&self.entries[self.position(path)?])
    }

    /// Create or overwrite an entry; the entry is marked dirty either way.
    pub fn set(&mut self, path: &str, content: impl Into<Vec<u8>>) -> Result<()> {
        let normalized = normalize_path(path)?;
        let content = content.into();
        if normalized.ends_with('/') && !content.is_empty() {
            return Err(Error::PathConflict(format!(
                "directory entry {} cannot hold content",
                normalized
            )));
        }
        match self.index.get(&normalized) {
            Some(&i) => self.entries[i].replace(content),
            None => {
                self.check_kind_conflict(&normalized)?;
                debug!(path = %normalized, "adding entry");
                self.index.insert(normalized.clone(), self.entries.len());
                self.entries.push(Entry::new(normalized, content));
            },
        }
        Ok(())
    }

    /// Remove an entry. Only the table is touched; relationship and
    /// content-type bookkeeping is the semantic layer's job.
    pub fn remove(&mut self, path: &str) -> Result<Entry> {
        let i = self.position(path)?;
        let entry = self.entries.remove(i);
        self.index.remove(entry.path());
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        debug!(path = %entry.path(), "removed entry");
        Ok(entry)
    }

    /// Paths in archive order.
    pub fn list(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.path().to_string()).collect()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [Entry] {
        &mut self.entries
    }

    /// Parsed XML of a part; parsed once and cached until the entry changes.
    pub fn xml(&self, path: &str) -> Result<&XmlDocument> {
        self.entries[self.position(path)?].xml()
    }

    pub fn update_xml<T>(
        &mut self,
        path: &str,
        f: impl FnOnce(&mut XmlDocument) -> Result<T>,
    ) -> Result<T> {
        let i = self.position(path)?;
        self.entries[i].update_xml(f)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Size in bytes of the archive this table was extracted from (0 if new).
    pub fn original_size(&self) -> u64 {
        self.original_size
    }

    /// Entry count at extraction time; unaffected by later edits.
    pub fn original_entry_count(&self) -> usize {
        self.original_entry_count
    }

    pub fn comment(&self) -> &[u8] {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: impl Into<Vec<u8>>) {
        self.comment = comment.into();
    }

    pub fn dirty_paths(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.is_dirty())
            .map(|e| e.path())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/ppt/theme/theme1.xml").unwrap(), "ppt/theme/theme1.xml");
        assert_eq!(normalize_path("ppt\\slides\\.\\slide1.xml").unwrap(), "ppt/slides/slide1.xml");
        assert_eq!(normalize_path("ppt/slides/../theme//t.xml").unwrap(), "ppt/theme/t.xml");
        assert_eq!(normalize_path("media/").unwrap(), "media/");
        assert!(normalize_path("../evil").is_err());
        assert!(normalize_path("/").is_err());
    }

    #[test]
    fn test_set_then_get() {
        let mut archive = PackageArchive::new();
        archive.set("docProps/app.xml", b"<Properties/>".to_vec()).unwrap();
        assert!(archive.has("docProps/app.xml"));
        assert!(archive.has("/docProps/app.xml"));
        assert_eq!(archive.get("docProps/app.xml").unwrap(), b"<Properties/>");
        assert!(archive.entry("docProps/app.xml").unwrap().is_dirty());
    }

    #[test]
    fn test_list_keeps_insertion_order_and_appends() {
        let mut archive = PackageArchive::new();
        for name in ["z.xml", "a.xml", "m.xml"] {
            archive.set(name, Vec::new()).unwrap();
        }
        archive.set("a.xml", b"again".to_vec()).unwrap();
        archive.set("b.xml", Vec::new()).unwrap();
        assert_eq!(archive.list(), vec!["z.xml", "a.xml", "m.xml", "b.xml"]);
    }

    #[test]
    fn test_remove_reindexes() {
        let mut archive = PackageArchive::new();
        for name in ["one", "two", "three"] {
            archive.set(name, name.as_bytes().to_vec()).unwrap();
        }
        archive.remove("one").unwrap();
        assert!(!archive.has("one"));
        assert_eq!(archive.get("three").unwrap(), b"three");
        assert_eq!(archive.list(), vec!["two", "three"]);
        assert!(matches!(archive.remove("one"), Err(Error::EntryNotFound(_))));
    }

    #[test]
    fn test_missing_entry() {
        let archive = PackageArchive::new();
        let err = archive.get("nope.xml").unwrap_err();
        assert_eq!(err.code(), "ENTRY_NOT_FOUND");
    }

    #[test]
    fn test_directory_and_leaf_cannot_coexist() {
        let mut archive = PackageArchive::new();
        archive.set("media/", Vec::new()).unwrap();
        assert!(matches!(archive.set("media", b"x".to_vec()), Err(Error::PathConflict(_))));
        assert!(matches!(archive.set("other/", b"x".to_vec()), Err(Error::PathConflict(_))));
    }
}
