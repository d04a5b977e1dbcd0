//! Capability-scoped filesystem helpers built on `cap-std` and `camino`.
//!
//! Every helper opens the parent directory of its target with ambient
//! authority and performs the operation relative to that handle. Absence is
//! reported as a typed value rather than an error wherever callers need to
//! branch on it.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use std::io;
use std::path::Component;

/// What, if anything, lives at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathPresence {
    /// Nothing exists at the path, or its parent directory is missing.
    Absent,
    /// A regular file of the given length in bytes.
    File {
        /// File size in bytes.
        len: u64,
    },
    /// A directory.
    Directory,
    /// Something else, such as a socket or device node.
    Other,
}

impl PathPresence {
    /// Whether anything exists at the path.
    #[must_use]
    pub const fn exists(self) -> bool {
        !matches!(self, Self::Absent)
    }

    /// Whether the path is a regular file.
    #[must_use]
    pub const fn is_file(self) -> bool {
        matches!(self, Self::File { .. })
    }

    /// Whether the path is a directory.
    #[must_use]
    pub const fn is_dir(self) -> bool {
        matches!(self, Self::Directory)
    }
}

/// Open the parent directory of `path` and return it with the final component.
pub fn open_dir_and_file(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, String)> {
    let parent = parent_or_current(path);
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other(format!("{path} should include a file name")))?
        .to_owned();
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, file_name))
}

/// Inspect `path` without following failures into errors for missing entries.
pub fn inspect(path: &Utf8Path) -> io::Result<PathPresence> {
    if path.file_name().is_none() {
        return match fs_utf8::Dir::open_ambient_dir(path, ambient_authority()) {
            Ok(_) => Ok(PathPresence::Directory),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(PathPresence::Absent),
            Err(err) => Err(err),
        };
    }
    let (dir, name) = match open_dir_and_file(path) {
        Ok(opened) => opened,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(PathPresence::Absent),
        Err(err) => return Err(err),
    };
    match dir.metadata(name.as_str()) {
        Ok(meta) if meta.is_file() => Ok(PathPresence::File { len: meta.len() }),
        Ok(meta) if meta.is_dir() => Ok(PathPresence::Directory),
        Ok(_) => Ok(PathPresence::Other),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(PathPresence::Absent),
        Err(err) => Err(err),
    }
}

/// Create `path` and any missing ancestors.
pub fn ensure_dir(path: &Utf8Path) -> io::Result<()> {
    if path.as_str().is_empty() {
        return Ok(());
    }
    let (base_dir, relative) = base_dir_and_relative(path)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }
    base_dir.create_dir_all(&relative)
}

/// Create or truncate `path` for writing.
///
/// The handle is converted to a [`std::fs::File`] so async runtimes can adopt
/// it.
pub fn create_file(path: &Utf8Path) -> io::Result<std::fs::File> {
    let (dir, name) = open_dir_and_file(path)?;
    Ok(dir.create(name.as_str())?.into_std())
}

/// Open `path` for reading.
pub fn open_file(path: &Utf8Path) -> io::Result<std::fs::File> {
    let (dir, name) = open_dir_and_file(path)?;
    Ok(dir.open(name.as_str())?.into_std())
}

/// Write `contents` to `path`, replacing any existing file.
pub fn write_file(path: &Utf8Path, contents: impl AsRef<[u8]>) -> io::Result<()> {
    let (dir, name) = open_dir_and_file(path)?;
    dir.write(name.as_str(), contents)
}

/// Read `path` into a string.
pub fn read_to_string(path: &Utf8Path) -> io::Result<String> {
    let (dir, name) = open_dir_and_file(path)?;
    dir.read_to_string(name.as_str())
}

/// Copy a regular file, returning the number of bytes copied.
pub fn copy_file(from: &Utf8Path, to: &Utf8Path) -> io::Result<u64> {
    let (from_dir, from_name) = open_dir_and_file(from)?;
    let (to_dir, to_name) = open_dir_and_file(to)?;
    from_dir.copy(from_name.as_str(), &to_dir, to_name.as_str())
}

/// Rename `from` to `to`, replacing `to` when it is a file.
pub fn rename(from: &Utf8Path, to: &Utf8Path) -> io::Result<()> {
    let (from_dir, from_name) = open_dir_and_file(from)?;
    let (to_dir, to_name) = open_dir_and_file(to)?;
    from_dir.rename(from_name.as_str(), &to_dir, to_name.as_str())
}

/// Remove a file, returning whether anything was removed.
pub fn remove_file_if_exists(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = match open_dir_and_file(path) {
        Ok(opened) => opened,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    match dir.remove_file(name.as_str()) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Remove a directory tree, returning whether anything was removed.
pub fn remove_dir_all_if_exists(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = match open_dir_and_file(path) {
        Ok(opened) => opened,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    match dir.remove_dir_all(name.as_str()) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Names of the regular files directly inside `path`, sorted.
pub fn list_files(path: &Utf8Path) -> io::Result<Vec<String>> {
    let dir = fs_utf8::Dir::open_ambient_dir(path, ambient_authority())?;
    let mut names = Vec::new();
    for entry in dir.entries()? {
        let item = entry?;
        if item.file_type()?.is_file() {
            names.push(item.file_name()?);
        }
    }
    names.sort();
    Ok(names)
}

/// Split an absolute or relative path into an ambient base directory and a
/// relative suffix that `cap-std` will accept.
pub fn base_dir_and_relative(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_path = path.as_std_path();

    let (base, relative) = match std_path.components().next() {
        // Windows drive or UNC prefix.
        Some(Component::Prefix(prefix)) => {
            let prefix_str = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            let base = Utf8PathBuf::from(prefix_str).join(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_path
                .strip_prefix(base.as_std_path())
                .or_else(|_| std_path.strip_prefix(prefix.as_os_str()))
                .map_err(|_| io::Error::other(format!("failed to strip prefix from {path}")))?
                .to_path_buf();
            (base, relative)
        }
        Some(Component::RootDir) => {
            let base = Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_path
                .strip_prefix(base.as_std_path())
                .map_err(|_| io::Error::other(format!("failed to strip root from {path}")))?
                .to_path_buf();
            (base, relative)
        }
        _ => (Utf8PathBuf::from("."), std_path.to_path_buf()),
    };

    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    let relative = Utf8PathBuf::from_path_buf(relative)
        .map_err(|_| io::Error::other(format!("non-UTF-8 path {path}")))?;

    Ok((dir, relative))
}

fn parent_or_current(path: &Utf8Path) -> &Utf8Path {
    match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    }
}
