//! File system utilities.

use std::ffi::OsStr;
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// Copy a directory recursively, preserving symbolic links.
pub fn copy_dir_all(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    // Refuse to copy a directory into itself.
    let src_canon = fs::canonicalize(src).map_err(|e| Error::io(src, e))?;
    let dst_parent_canon = dst
        .parent()
        .and_then(|p| fs::canonicalize(p).ok())
        .map(|p| p.join(dst.file_name().unwrap_or_default()));
    if dst_parent_canon.is_some_and(|d| d.starts_with(&src_canon)) {
        return Err(Error::io(
            dst,
            std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("cannot copy {} into itself", src_canon.display()),
            ),
        ));
    }

    fs::create_dir_all(dst).map_err(|e| Error::io(dst, e))?;

    for entry in fs::read_dir(src).map_err(|e| Error::io(src, e))? {
        let entry = entry.map_err(|e| Error::io(src, e))?;
        let ty = entry.file_type().map_err(|e| Error::io(entry.path(), e))?;
        let dst_path = dst.join(entry.file_name());

        if ty.is_dir() {
            copy_dir_all(entry.path(), &dst_path)?;
        } else if ty.is_symlink() {
            let target = fs::read_link(entry.path()).map_err(|e| Error::io(entry.path(), e))?;
            let is_dir = fs::metadata(entry.path())
                .map(|m| m.is_dir())
                .unwrap_or(false);
            symlink(&target, &dst_path, is_dir)?;
        } else {
            fs::copy(entry.path(), &dst_path).map_err(|e| Error::io(&dst_path, e))?;
        }
    }
    Ok(())
}

/// Create a symbolic link at `link` pointing to `target`.
///
/// `is_dir` only matters on Windows, where file and directory links differ.
pub fn symlink(target: &Path, link: &Path, is_dir: bool) -> Result<()> {
    #[cfg(unix)]
    {
        let _ = is_dir;
        std::os::unix::fs::symlink(target, link).map_err(|e| Error::io(link, e))
    }

    #[cfg(windows)]
    {
        if is_dir {
            std::os::windows::fs::symlink_dir(target, link).map_err(|e| Error::io(link, e))
        } else {
            std::os::windows::fs::symlink_file(target, link).map_err(|e| Error::io(link, e))
        }
    }
}

/// Remove whatever occupies `path` without following symlinks.
pub fn remove_path(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::io(path, e)),
    };

    let result = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path).or_else(|e| {
            // Directory symlinks on Windows need remove_dir.
            if cfg!(windows) && meta.file_type().is_symlink() {
                fs::remove_dir(path)
            } else {
                Err(e)
            }
        })
    };
    result.map_err(|e| Error::io(path, e))
}

/// Write `content` to `path` through a temp file in the same directory and
/// an atomic rename.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;

    let mut temp = NamedTempFile::new_in(parent).map_err(|e| Error::io(parent, e))?;
    temp.write_all(content).map_err(|e| Error::io(temp.path(), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| Error::io(temp.path(), e))?;
    temp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}

/// Write `content` to `path` unless something already exists there.
///
/// Returns `true` when the file was written.
pub fn write_if_missing(path: &Path, content: &str) -> Result<bool> {
    if fs::symlink_metadata(path).is_ok() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::write(path, content).map_err(|e| Error::io(path, e))?;
    Ok(true)
}

/// Lexically normalize a path, resolving `.` and `..` without touching disk.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Canonicalize when possible, otherwise fall back to lexical normalization.
///
/// Canonicalizing keeps comparisons stable when a prefix of the path is
/// itself a symlink (e.g. `/tmp` on macOS).
pub fn resolve_lenient(path: &Path) -> PathBuf {
    if let Ok(canon) = fs::canonicalize(path) {
        return canon;
    }
    // Canonicalize the deepest existing ancestor and re-append the rest.
    let normalized = normalize_path(path);
    let mut existing = normalized.as_path();
    let mut rest: Vec<&OsStr> = Vec::new();
    while let Some(parent) = existing.parent() {
        if let Some(name) = existing.file_name() {
            rest.push(name);
        }
        existing = parent;
        if let Ok(canon) = fs::canonicalize(existing) {
            let mut out = canon;
            for name in rest.iter().rev() {
                out.push(name);
            }
            return out;
        }
    }
    normalized
}

/// Path to write into a symlink at `link` so that it resolves to `target`.
///
/// Both ends are resolved first so the result survives symlinked prefixes.
pub fn relative_link_target(link: &Path, target: &Path) -> PathBuf {
    let link_dir = link.parent().unwrap_or(link);
    let from = resolve_lenient(link_dir);
    let to = resolve_lenient(target);
    pathdiff::diff_paths(&to, &from).unwrap_or(to)
}

/// Where the symlink at `link` with stored destination `dest` points to.
pub fn resolve_link_destination(link: &Path, dest: &Path) -> PathBuf {
    if dest.is_absolute() {
        return normalize_path(dest);
    }
    let link_dir = link.parent().unwrap_or(link);
    normalize_path(&resolve_lenient(link_dir).join(dest))
}

/// Check that `raw` names something inside the store and return it as a
/// relative path.
pub fn validate_store_relative(raw: &str) -> Result<PathBuf> {
    let unsafe_path = |reason| Error::UnsafePath {
        path: raw.to_string(),
        reason,
    };

    if raw.trim().is_empty() {
        return Err(unsafe_path("empty path"));
    }
    let path = Path::new(raw);
    if path.is_absolute() || path.has_root() {
        return Err(unsafe_path("must be relative to the store root"));
    }
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir => return Err(unsafe_path("directory traversal")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_path("must be relative to the store root"));
            }
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(unsafe_path("must name a file or directory"));
    }
    Ok(clean)
}

/// Reports whether `path` is a regular file (symlinks are not followed).
pub fn file_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.is_file())
}

/// Read a regular file; FIFOs, sockets and devices are refused, never opened.
pub fn read_regular(path: &Path) -> io::Result<Vec<u8>> {
    if !fs::metadata(path)?.is_file() {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!("{} is not a regular file", path.display()),
        ));
    }
    fs::read(path)
}

/// Reports whether `path` is a directory with at least one entry.
pub fn dir_non_empty(path: &Path) -> bool {
    fs::read_dir(path).is_ok_and(|mut entries| entries.next().is_some())
}

/// Reports whether `path` is an executable regular file.
pub fn is_executable(path: &Path) -> bool {
    let Ok(meta) = fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}
