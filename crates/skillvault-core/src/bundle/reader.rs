//! Bundle readers: directory trees and ZIP archives.
//!
//! Both readers produce the same shape: files sorted by raw path bytes with
//! POSIX separators. Enumeration order (filesystem or central directory) is
//! never trusted.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use crate::bundle::{BundleFile, BundleKind, SkillBundle};
use crate::error::{Error, Result};
use crate::finding::{Finding, ReasonCode, Severity};

/// Read a bundle from a directory or a `.zip` file (case-insensitive
/// extension).
pub fn read_bundle(path: &Path) -> Result<SkillBundle> {
    let meta = fs::symlink_metadata(path).map_err(|_| Error::BundleNotFound(path.to_path_buf()))?;

    if meta.is_dir() {
        read_directory(path)
    } else if meta.is_file() && has_zip_extension(path) {
        read_zip(path)
    } else {
        Err(Error::UnsupportedBundleInput(path.to_path_buf()))
    }
}

fn has_zip_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
}

fn read_directory(root: &Path) -> Result<SkillBundle> {
    let mut files = Vec::new();
    let mut symlinks = Vec::new();
    walk(root, PathBuf::new(), &mut files, &mut symlinks)?;
    files.sort_by(|a, b| a.path.as_bytes().cmp(b.path.as_bytes()));

    tracing::debug!(
        files = files.len(),
        symlinks = symlinks.len(),
        "read directory bundle"
    );

    Ok(SkillBundle {
        kind: BundleKind::Directory,
        source_path: root.to_path_buf(),
        files,
        symlinks,
        findings: Vec::new(),
    })
}

fn walk(
    dir: &Path,
    rel: PathBuf,
    files: &mut Vec<BundleFile>,
    symlinks: &mut Vec<String>,
) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let child_rel = rel.join(&name);
        let file_type = entry.file_type()?;

        if file_type.is_symlink() {
            // Never followed; recorded so strict export can reject them.
            symlinks.push(to_posix(&child_rel));
        } else if file_type.is_dir() {
            walk(&entry.path(), child_rel, files, symlinks)?;
        } else if file_type.is_file() {
            let bytes = fs::read(entry.path())?;
            files.push(BundleFile {
                path: to_posix(&child_rel),
                bytes,
            });
        }
        // Anything else (sockets, devices) is skipped.
    }
    Ok(())
}

fn to_posix(path: &Path) -> String {
    let segments: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    segments.join("/")
}

fn read_zip(path: &Path) -> Result<SkillBundle> {
    let file = fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| Error::ZipRead {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    // BTreeMap both de-duplicates (last occurrence wins, matching common
    // extractors) and yields bytewise path order.
    let mut by_path: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    let mut findings = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| Error::ZipRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if entry.is_dir() {
            continue;
        }

        let raw_name = entry.name().replace('\\', "/");
        match sanitize_entry_path(&raw_name) {
            EntryPath::Clean(clean) => {
                let mut bytes = Vec::with_capacity(entry.size() as usize);
                entry.read_to_end(&mut bytes)?;
                by_path.insert(clean, bytes);
            }
            EntryPath::Dropped => {}
            EntryPath::Unsafe => {
                findings.push(
                    Finding::new(
                        ReasonCode::ConstraintUnsafePath,
                        Severity::Error,
                        format!("Archive entry escapes bundle root: {raw_name}"),
                    )
                    .with_path(raw_name),
                );
            }
        }
    }

    let files: Vec<BundleFile> = by_path
        .into_iter()
        .map(|(path, bytes)| BundleFile { path, bytes })
        .collect();

    tracing::debug!(files = files.len(), "read zip bundle");

    Ok(SkillBundle {
        kind: BundleKind::Zip,
        source_path: path.to_path_buf(),
        files,
        symlinks: Vec::new(),
        findings,
    })
}

enum EntryPath {
    Clean(String),
    Dropped,
    Unsafe,
}

/// Normalize an archive entry name. Absolute and empty names are dropped;
/// `.` and empty segments are elided; any `..` segment marks the entry
/// unsafe.
fn sanitize_entry_path(raw: &str) -> EntryPath {
    if raw.is_empty() || raw.starts_with('/') {
        return EntryPath::Dropped;
    }
    let mut segments = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => return EntryPath::Unsafe,
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        EntryPath::Dropped
    } else {
        EntryPath::Clean(segments.join("/"))
    }
}
