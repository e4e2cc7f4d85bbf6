//! Small file helpers shared by the mutation functions.

use crate::error::{Error, Result};
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Replace `path` with `contents` through a sibling temporary file and a rename.
///
/// With `mode`, the file ends up with exactly that mode. Without it, an
/// existing file keeps its permissions and a new file gets the process default.
pub(crate) fn write_atomic(path: &Path, contents: &str, mode: Option<u32>) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Filesystem(format!("'{}' is not a file path", path.display())))?
        .to_string_lossy();
    let tmp = dir.join(format!(".{}.svcp-tmp", file_name));

    let permissions = match mode {
        Some(mode) => Some(fs::Permissions::from_mode(mode)),
        None => fs::metadata(path).ok().map(|m| m.permissions()),
    };

    let write = || -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        if let Some(perms) = permissions.clone() {
            file.set_permissions(perms)?;
        }
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    };

    write().map_err(|e| {
        let _ = fs::remove_file(&tmp);
        Error::Filesystem(format!("Cannot write '{}': {}", path.display(), e))
    })
}

/// Restrict `path` to owner read/write.
pub(crate) fn restrict_to_owner(path: &Path) -> Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| {
        Error::Filesystem(format!(
            "Cannot set permissions on '{}': {}",
            path.display(),
            e
        ))
    })
}

/// Remove a file, treating "already gone" as success.
pub(crate) fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Filesystem(format!(
            "Cannot remove '{}': {}",
            path.display(),
            e
        ))),
    }
}
