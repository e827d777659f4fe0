//! Capability-based file access for conversion inputs and outputs.
//!
//! Paths arrive as UTF-8 [`Utf8Path`]s and are resolved against an ambient
//! directory handle; every operation below then goes through that handle.

use std::io;
use std::path::Component;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};

/// Open the directory containing `path` together with the file's name.
fn containing_dir(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, &str)> {
    let name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{path} has no file name"),
        )
    })?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, name))
}

/// Split a directory path into an ambient root handle and the remainder
/// relative to it.
fn root_and_relative(dir: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let mut components = dir.as_std_path().components();
    let root = match components.next() {
        Some(Component::Prefix(prefix)) => {
            let drive = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            // skip the root separator following the drive
            if matches!(components.clone().next(), Some(Component::RootDir)) {
                components.next();
            }
            Utf8PathBuf::from(drive).join(std::path::MAIN_SEPARATOR_STR)
        }
        Some(Component::RootDir) => Utf8PathBuf::from(std::path::MAIN_SEPARATOR_STR),
        _ => return relative_to_ambient_base(dir),
    };
    let relative = Utf8PathBuf::from_path_buf(components.as_path().to_path_buf())
        .map_err(|_| io::Error::other("non-UTF-8 directory path"))?;
    let handle = fs_utf8::Dir::open_ambient_dir(&root, ambient_authority())?;
    Ok((handle, relative))
}

/// Leading `.` and `..` components name the ambient base directory; a
/// capability handle cannot step above the directory it was opened on.
fn relative_to_ambient_base(dir: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let mut components = dir.components().peekable();
    let mut base = Utf8PathBuf::from(".");
    while let Some(component) = components.next_if(|component| {
        matches!(component, Utf8Component::CurDir | Utf8Component::ParentDir)
    }) {
        base.push(component.as_str());
    }
    let relative: Utf8PathBuf = components.map(|component| component.as_str()).collect();
    let handle = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    Ok((handle, relative))
}

/// Open an existing file for reading.
pub fn open_input(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    fs_utf8::File::open_ambient(path, ambient_authority())
}

/// Create every missing ancestor directory of `path`.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_str().is_empty() || parent.parent().is_none() {
        return Ok(());
    }
    let (root, relative) = root_and_relative(parent)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }
    root.create_dir_all(&relative)
}

/// Whether anything exists at `path`. A missing parent directory counts as
/// absence.
pub fn path_exists(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = match containing_dir(path) {
        Ok(found) => found,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    dir.try_exists(name)
}

/// Whether `path` names a regular file.
pub fn is_regular_file(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = containing_dir(path)?;
    match dir.metadata(name) {
        Ok(metadata) => Ok(metadata.is_file()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Delete the file at `path`.
pub fn remove_file(path: &Utf8Path) -> io::Result<()> {
    let (dir, name) = containing_dir(path)?;
    dir.remove_file(name)
}
