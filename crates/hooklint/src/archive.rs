//! Staging areas for repository snapshots.
//!
//! Unpacks a gzip-compressed snapshot tarball into an exclusively-owned
//! temporary directory with path traversal protection.

use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use tempfile::TempDir;

/// Errors arising from snapshot extraction.
#[derive(Debug, thiserror::Error)]
pub enum UnpackError {
    /// I/O error during extraction.
    #[error("unpack I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A path in the archive attempts to traverse outside the staging
    /// directory.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// A link entry points outside the staging directory.
    #[error("link target escapes staging directory: {path} -> {target}")]
    LinkTraversal {
        /// The link entry path.
        path: String,
        /// Its declared target.
        target: String,
    },

    /// The archive extracted to no top-level directory.
    #[error("archive has no top-level directory")]
    NoRoot,

    /// The archive extracted to more than one top-level directory, so
    /// the snapshot root cannot be identified.
    #[error("archive has multiple top-level directories")]
    AmbiguousRoot,
}

/// Exclusively-owned staging directory holding one extracted snapshot.
///
/// The temp directory is deleted when the value is dropped, on every
/// exit path of an invocation.
#[derive(Debug)]
pub struct StagingArea {
    // Held for its Drop impl; never read after construction.
    _dir: TempDir,
    root: PathBuf,
}

impl StagingArea {
    /// Unpack a gzip tarball into a fresh staging directory.
    ///
    /// The archive must extract to exactly one top-level directory
    /// (GitHub snapshot tarballs are rooted at `{owner}-{repo}-{sha}/`);
    /// that directory becomes [`StagingArea::root`]. Zero or multiple
    /// top-level directories is an error.
    pub async fn unpack(tarball: Vec<u8>) -> Result<Self> {
        tokio::task::spawn_blocking(move || Self::unpack_blocking(&tarball))
            .await
            .context("Unpack task panicked")?
    }

    fn unpack_blocking(tarball: &[u8]) -> Result<Self> {
        let dir = TempDir::new().context("Failed to allocate staging directory")?;
        extract(tarball, dir.path()).context("Failed to extract snapshot tarball")?;
        let root = sole_root(dir.path()).context("Failed to locate snapshot root")?;
        Ok(Self { _dir: dir, root })
    }

    /// Path of the snapshot root inside the staging directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Gunzip and untar `tarball` into `dest`, validating every entry path.
fn extract(tarball: &[u8], dest: &Path) -> Result<(), UnpackError> {
    let decoder = GzDecoder::new(Cursor::new(tarball));
    let mut archive = tar::Archive::new(decoder);

    for entry_result in archive.entries()? {
        let mut entry = entry_result?;

        // GitHub tarballs open with a pax global header entry; extended
        // headers are metadata, not files.
        if matches!(
            entry.header().entry_type(),
            tar::EntryType::XGlobalHeader | tar::EntryType::XHeader
        ) {
            continue;
        }

        let entry_path = entry.path()?.into_owned();
        validate_entry_path(&entry_path)?;

        // Link entries can escape the staging directory through their
        // target even when the entry path itself is clean, and later
        // entries would then write through the planted link.
        if matches!(
            entry.header().entry_type(),
            tar::EntryType::Symlink | tar::EntryType::Link
        ) {
            let target = entry.link_name()?.map(|t| t.into_owned());
            validate_link_target(&entry_path, target.as_deref())?;
        }

        let dest_path = dest.join(&entry_path);
        if let Some(parent) = dest_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        entry.unpack(&dest_path)?;
    }

    Ok(())
}

/// Reject absolute paths and parent-directory components (zip-slip).
fn validate_entry_path(path: &Path) -> Result<(), UnpackError> {
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(UnpackError::PathTraversal {
                    path: path.display().to_string(),
                })
            }
        }
    }
    Ok(())
}

/// Validate that a link entry's target stays inside the staging
/// directory when resolved from the entry's own location.
///
/// Targets are resolved lexically: absolute targets and targets whose
/// `..` components climb past the staging root are rejected.
fn validate_link_target(
    entry_path: &Path,
    target: Option<&Path>,
) -> Result<(), UnpackError> {
    let traversal = |target: &Path| UnpackError::LinkTraversal {
        path: entry_path.display().to_string(),
        target: target.display().to_string(),
    };

    let Some(target) = target else {
        return Err(UnpackError::LinkTraversal {
            path: entry_path.display().to_string(),
            target: String::new(),
        });
    };

    if target.is_absolute() {
        return Err(traversal(target));
    }

    // Depth of the entry's containing directory below the staging root.
    let mut depth = entry_path
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count()
        .saturating_sub(1);

    for component in target.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(_) => depth += 1,
            Component::ParentDir => {
                depth = depth.checked_sub(1).ok_or_else(|| traversal(target))?;
            }
            _ => return Err(traversal(target)),
        }
    }

    Ok(())
}

/// Locate the sole top-level directory of the extracted snapshot.
fn sole_root(dir: &Path) -> Result<PathBuf, UnpackError> {
    let mut roots = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            roots.push(entry.path());
        }
    }

    match roots.len() {
        0 => Err(UnpackError::NoRoot),
        1 => Ok(roots.remove(0)),
        _ => Err(UnpackError::AmbiguousRoot),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    enum Entry<'a> {
        File(&'a str, &'a str),
        Symlink(&'a str, &'a str),
    }

    fn tarball_of(entries: &[Entry]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for entry in entries {
            match entry {
                Entry::File(path, contents) => {
                    let mut header = tar::Header::new_gnu();
                    header.set_size(contents.len() as u64);
                    header.set_mode(0o644);
                    header.set_cksum();
                    builder
                        .append_data(&mut header, path, contents.as_bytes())
                        .unwrap();
                }
                Entry::Symlink(path, target) => {
                    let mut header = tar::Header::new_gnu();
                    header.set_entry_type(tar::EntryType::Symlink);
                    header.set_size(0);
                    header.set_mode(0o777);
                    builder.append_link(&mut header, path, target).unwrap();
                }
            }
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn tarball(entries: &[(&str, &str)]) -> Vec<u8> {
        let entries: Vec<Entry> = entries
            .iter()
            .map(|(path, contents)| Entry::File(path, contents))
            .collect();
        tarball_of(&entries)
    }

    #[test]
    fn test_unpack_resolves_single_root() {
        let bytes = tarball(&[
            ("acme-widgets-abc123/index.js", "console.log('hi')\n"),
            ("acme-widgets-abc123/lib/util.js", "module.exports = {}\n"),
        ]);

        let staging = StagingArea::unpack_blocking(&bytes).unwrap();
        assert!(staging.root().ends_with("acme-widgets-abc123"));
        assert!(staging.root().join("index.js").exists());
        assert!(staging.root().join("lib/util.js").exists());
    }

    #[test]
    fn test_unpack_rejects_empty_archive() {
        let bytes = tarball(&[]);
        let err = StagingArea::unpack_blocking(&bytes).unwrap_err();
        assert!(err.to_string().contains("snapshot root"));
    }

    #[test]
    fn test_unpack_rejects_multiple_roots() {
        let bytes = tarball(&[("one/a.txt", "a"), ("two/b.txt", "b")]);
        assert!(StagingArea::unpack_blocking(&bytes).is_err());
    }

    #[test]
    fn test_unpack_ignores_loose_top_level_files() {
        let bytes = tarball(&[("junk.txt", "x"), ("root/a.txt", "a")]);
        let staging = StagingArea::unpack_blocking(&bytes).unwrap();
        assert!(staging.root().ends_with("root"));
    }

    #[test]
    fn test_validate_entry_path_rejects_traversal() {
        assert!(validate_entry_path(Path::new("root/../../evil")).is_err());
        assert!(validate_entry_path(Path::new("/etc/passwd")).is_err());
        assert!(validate_entry_path(Path::new("root/./ok.txt")).is_ok());
    }

    #[test]
    fn test_unpack_rejects_absolute_symlink_target() {
        // A planted link would let the next entry write through it,
        // past the staging directory.
        let bytes = tarball_of(&[
            Entry::Symlink("root/link", "/outside"),
            Entry::File("root/link/file", "x"),
        ]);

        let err = StagingArea::unpack_blocking(&bytes).unwrap_err();
        assert!(err.to_string().contains("extract"));
    }

    #[test]
    fn test_unpack_rejects_symlink_climbing_out() {
        let bytes = tarball_of(&[Entry::Symlink("root/link", "../../evil")]);
        assert!(StagingArea::unpack_blocking(&bytes).is_err());
    }

    #[test]
    fn test_unpack_allows_relative_symlink_within_snapshot() {
        let bytes = tarball_of(&[
            Entry::File("root/index.js", "module.exports = {}\n"),
            Entry::Symlink("root/alias.js", "index.js"),
            Entry::Symlink("root/lib/up.js", "../index.js"),
        ]);

        let staging = StagingArea::unpack_blocking(&bytes).unwrap();
        assert!(staging.root().join("alias.js").exists());
        assert!(staging.root().join("lib/up.js").exists());
    }

    #[test]
    fn test_validate_link_target() {
        let entry = Path::new("root/sub/link");
        assert!(validate_link_target(entry, Some(Path::new("../a.txt"))).is_ok());
        assert!(validate_link_target(entry, Some(Path::new("../../a.txt"))).is_ok());
        assert!(validate_link_target(entry, Some(Path::new("../../../a.txt"))).is_err());
        assert!(validate_link_target(entry, Some(Path::new("/etc/passwd"))).is_err());
        assert!(validate_link_target(entry, None).is_err());
    }

    #[test]
    fn test_staging_area_cleans_up_on_drop() {
        let bytes = tarball(&[("root/a.txt", "a")]);
        let staging = StagingArea::unpack_blocking(&bytes).unwrap();
        let root = staging.root().to_path_buf();
        assert!(root.exists());

        drop(staging);
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_unpack_async() {
        let bytes = tarball(&[("root/a.txt", "a")]);
        let staging = StagingArea::unpack(bytes).await.unwrap();
        assert!(staging.root().join("a.txt").exists());
    }
}
