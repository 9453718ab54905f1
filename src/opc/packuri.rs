//! Part-name arithmetic: relationship-part naming and relative target
//! resolution.
//!
//! Part paths here use the table's form (`ppt/presentation.xml`, no leading
//! slash). The package root is the empty string.

use crate::error::{Error, Result};
use crate::package::normalize_path;

/// Directory portion of a part path, without a trailing slash.
pub fn directory(part: &str) -> &str {
    part.rfind('/').map(|i| &part[..i]).unwrap_or("")
}

/// Final path segment.
pub fn file_name(part: &str) -> &str {
    part.rfind('/').map(|i| &part[i + 1..]).unwrap_or(part)
}

/// Lower-cased extension without the dot; empty if none.
pub fn extension(part: &str) -> String {
    let name = file_name(part);
    match name.rfind('.') {
        Some(i) if i + 1 < name.len() => name[i + 1..].to_ascii_lowercase(),
        _ => String::new(),
    }
}

/// `/`-prefixed part name as used in `[Content_Types].xml` overrides.
pub fn part_name(part: &str) -> String {
    format!("/{}", part.trim_start_matches('/'))
}

/// The relationships part owned by `part` (`""` means the package root).
///
/// `ppt/presentation.xml` -> `ppt/_rels/presentation.xml.rels`
pub fn rels_path_for(part: &str) -> String {
    if part.is_empty() {
        return "_rels/.rels".to_string();
    }
    let dir = directory(part);
    let name = file_name(part);
    if dir.is_empty() {
        format!("_rels/{}.rels", name)
    } else {
        format!("{}/_rels/{}.rels", dir, name)
    }
}

/// Inverse of [`rels_path_for`]: the owning part of a relationships part, or
/// `None` if `path` is not a relationships part.
pub fn owner_of_rels(path: &str) -> Option<String> {
    let name = file_name(path).strip_suffix(".rels")?;
    let dir = directory(path);
    let owner_dir = if dir == "_rels" {
        ""
    } else {
        dir.strip_suffix("/_rels")?
    };
    Some(match (owner_dir.is_empty(), name.is_empty()) {
        (true, true) => String::new(),
        (true, false) => name.to_string(),
        (false, _) => format!("{}/{}", owner_dir, name),
    })
}

pub fn is_rels_part(path: &str) -> bool {
    owner_of_rels(path).is_some()
}

/// Resolve a relationship target written relative to `owner`'s directory.
/// Absolute targets (`/ppt/...`) are taken from the package root.
pub fn resolve_target(owner: &str, target: &str) -> Result<String> {
    let joined = if target.starts_with('/') {
        target.to_string()
    } else {
        let base = directory(owner);
        if base.is_empty() {
            target.to_string()
        } else {
            format!("{}/{}", base, target)
        }
    };
    normalize_path(&joined).map_err(|_| {
        Error::InvalidPath(format!("target {:?} from {:?} leaves the package", target, owner))
    })
}

/// Express `target` relative to `owner`'s directory, the way relationship
/// parts conventionally reference their targets.
pub fn relative_target(owner: &str, target: &str) -> String {
    let base: Vec<&str> = directory(owner).split('/').filter(|s| !s.is_empty()).collect();
    let dest: Vec<&str> = target.split('/').filter(|s| !s.is_empty()).collect();
    let common = base
        .iter()
        .zip(dest.iter())
        .take_while(|(a, b)| a == b)
        .count()
        // the last destination segment is the file itself
        .min(dest.len().saturating_sub(1));

    let mut parts: Vec<&str> = std::iter::repeat_n("..", base.len() - common).collect();
    parts.extend_from_slice(&dest[common..]);
    parts.join("/")
}
