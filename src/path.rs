//! Archive-internal names.
//!
//! CPIO names are plain relative paths. Normalization strips the leading
//! slash unless the caller explicitly asked for an absolute name, and an
//! empty name is never valid.

use std::path::Path;

use crate::error::{Error, Result};

/// Normalize a caller-supplied name for use as an archive key.
pub fn normalize_name(name: &str, absolute: bool) -> Result<String> {
    let name = if absolute {
        name.to_string()
    } else {
        name.trim_start_matches('/').to_string()
    };

    if name.is_empty() {
        return Err(Error::format("empty entry name".to_string()));
    }

    Ok(name)
}

/// Compute the archive-internal name for a filesystem path.
///
/// With `relative_to` set, the name is the path relative to that root;
/// otherwise the path itself is used. The result is then normalized like any
/// other name.
pub fn name_from_path(path: &Path, relative_to: Option<&Path>, absolute: bool) -> Result<String> {
    let named = match relative_to {
        Some(root) => pathdiff::diff_paths(path, root).ok_or_else(|| {
            Error::format(format!(
                "cannot express {} relative to {}",
                path.display(),
                root.display()
            ))
        })?,
        None => path.to_path_buf(),
    };

    let name = named
        .to_str()
        .ok_or_else(|| Error::format(format!("non-UTF-8 path: {}", named.display())))?;

    normalize_name(name, absolute)
}
