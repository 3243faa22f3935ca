use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use crate::error::{GuideError, Result};

/// One rendered document and its destination.
#[derive(Debug, Clone, Copy)]
pub struct Artifact<'a> {
    pub path: &'a Path,
    pub contents: &'a str,
}

/// Destination for rendered artifacts.
pub trait ArtifactSink {
    /// Publish the artifacts as one set: if this fails, no destination may
    /// have been replaced by a new version.
    fn publish(&self, artifacts: &[Artifact<'_>]) -> Result<()>;
}

/// Writes each artifact next to its destination and renames it into place, so
/// whoever serves the file sees either the previous version or the new one.
/// Every `.tmp` file is written before the first rename.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSink;

impl ArtifactSink for FileSink {
    #[instrument(skip_all, fields(count = artifacts.len()))]
    fn publish(&self, artifacts: &[Artifact<'_>]) -> Result<()> {
        let mut staged: Vec<(PathBuf, &Path)> = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            match stage(artifact) {
                Ok(tmp) => staged.push((tmp, artifact.path)),
                Err(err) => {
                    discard(&staged);
                    return Err(err);
                }
            }
        }

        for (i, (tmp, path)) in staged.iter().enumerate() {
            if let Err(source) = fs::rename(tmp, path) {
                discard(&staged[i..]);
                if i > 0 {
                    warn!(path = %path.display(), replaced = i, "artifact set only partly replaced");
                }
                return Err(GuideError::Write {
                    path: path.to_path_buf(),
                    source,
                });
            }
            debug!(path = %path.display(), "replaced artifact");
        }
        Ok(())
    }
}

/// Write the `.tmp` sibling of the destination and return its path.
fn stage(artifact: &Artifact<'_>) -> Result<PathBuf> {
    let path = artifact.path;
    let write_error = |source: io::Error| GuideError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_error)?;
    }
    // rename() cannot replace a directory; find out before anything is committed.
    if fs::symlink_metadata(path).is_ok_and(|meta| meta.is_dir()) {
        return Err(write_error(io::Error::other("destination is a directory")));
    }

    let tmp = tmp_path(path);
    if let Err(err) = fs::write(&tmp, artifact.contents) {
        let _ = fs::remove_file(&tmp);
        return Err(write_error(err));
    }
    debug!(path = %path.display(), bytes = artifact.contents.len(), "staged artifact");
    Ok(tmp)
}

fn discard(staged: &[(PathBuf, &Path)]) {
    for (tmp, _) in staged {
        let _ = fs::remove_file(tmp);
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("artifact"));
    name.push(".tmp");
    path.with_file_name(name)
}
