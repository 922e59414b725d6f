//! Tar construction and path-traversal-safe ingestion.
//!
//! Archives arrive from untrusted callers and are the one place user input
//! meets the filesystem, so extraction is two-pass: every entry path is
//! validated before a single byte is written. Symlinks, hard links, devices
//! and any other non-regular entries are skipped outright.

use std::collections::HashSet;
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use tar::{Archive, Builder, EntryType, Header};

use crate::errors::TarError;

/// Build an uncompressed tar archive from `(name, content)` pairs, in order.
pub fn build_archive<'a, I>(files: I) -> Result<Vec<u8>, TarError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut builder = Builder::new(Vec::new());
    for (name, content) in files {
        let mut header = Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, content.as_bytes())?;
    }
    builder.into_inner().map_err(TarError::Io)
}

/// Reject any entry whose path could land outside the extraction root.
fn validate_entry_path(path: &Path, raw: &str) -> Result<(), TarError> {
    if raw.is_empty() {
        return Err(TarError::UnsafePath("<empty>".to_string()));
    }
    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(TarError::UnsafePath(format!("{raw} (contains ..)")));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(TarError::UnsafePath(format!("{raw} (absolute path)")));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }
    Ok(())
}

/// Lexical cleanup: drop `.` components so prefix checks compare like with like.
fn lexical_clean(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Validate every entry path in the archive without touching the filesystem.
///
/// This is the same check `extract` runs as its first pass; the request
/// shaper uses it to reject hostile archives before a job record exists.
pub fn validate_archive(data: &[u8]) -> Result<(), TarError> {
    let mut archive = Archive::new(data);
    let entries = archive
        .entries()
        .map_err(|e| TarError::BadArchive(e.to_string()))?;
    for entry in entries {
        let entry = entry.map_err(|e| TarError::BadArchive(e.to_string()))?;
        let path = entry
            .path()
            .map_err(|e| TarError::BadArchive(e.to_string()))?;
        let raw = path.to_string_lossy().into_owned();
        validate_entry_path(&path, &raw)?;
    }
    Ok(())
}

/// Extract an uncompressed archive under `dest`.
///
/// Paths are validated across the whole archive before any I/O happens, so a
/// single hostile entry means nothing is written at all. Regular files keep
/// their POSIX mode bits; directories are created as needed.
pub fn extract(data: &[u8], dest: &Path) -> Result<(), TarError> {
    validate_archive(data)?;

    let dest_clean = lexical_clean(dest);
    let mut archive = Archive::new(data);
    let entries = archive
        .entries()
        .map_err(|e| TarError::BadArchive(e.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| TarError::BadArchive(e.to_string()))?;
        let path = entry
            .path()
            .map_err(|e| TarError::BadArchive(e.to_string()))?
            .into_owned();
        let raw = path.to_string_lossy().into_owned();

        let target = lexical_clean(&dest.join(&path));
        // Validated above, but a joined path must still sit under the root.
        if !target.starts_with(&dest_clean) {
            return Err(TarError::UnsafePath(raw));
        }

        match entry.header().entry_type() {
            EntryType::Directory => {
                fs::create_dir_all(&target)?;
            }
            EntryType::Regular => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut contents = Vec::with_capacity(entry.size() as usize);
                entry.read_to_end(&mut contents)?;
                fs::write(&target, contents)?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    if let Ok(mode) = entry.header().mode() {
                        fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o777))?;
                    }
                }
            }
            // Symlinks, hard links, devices and the rest are dropped.
            _ => continue,
        }
    }

    Ok(())
}

/// Names of the regular files in the archive, in archive order.
pub fn list_files(data: &[u8]) -> Result<Vec<String>, TarError> {
    let mut archive = Archive::new(data);
    let entries = archive
        .entries()
        .map_err(|e| TarError::BadArchive(e.to_string()))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| TarError::BadArchive(e.to_string()))?;
        if entry.header().entry_type() == EntryType::Regular {
            let path = entry
                .path()
                .map_err(|e| TarError::BadArchive(e.to_string()))?;
            files.push(path.to_string_lossy().into_owned());
        }
    }
    Ok(files)
}

/// Pick the file the sandbox should run: `main.py`, then `__main__.py`, then
/// the first `.py` file in archive order.
pub fn detect_entrypoint(data: &[u8]) -> Result<String, TarError> {
    let files = list_files(data)?;
    let names: HashSet<&str> = files.iter().map(String::as_str).collect();
    if names.contains("main.py") {
        return Ok("main.py".to_string());
    }
    if names.contains("__main__.py") {
        return Ok("__main__.py".to_string());
    }
    files
        .into_iter()
        .find(|name| name.ends_with(".py"))
        .ok_or(TarError::NoEntrypoint)
}
