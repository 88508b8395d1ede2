use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Component, Path, PathBuf},
};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::trace;

use super::{ArtifactsError, IntegrityChecker, io_err};

/// Unpacks a gzipped tarball after verifying its integrity.
#[derive(Debug, Clone, Copy)]
pub struct TarballExtractor {
    checker: IntegrityChecker,
}

impl TarballExtractor {
    pub fn new(checker: IntegrityChecker) -> Self {
        Self { checker }
    }

    /// Verifies `src` and unpacks it into `dest`, aborting on the first
    /// entry that cannot be written.
    pub fn extract(&self, src: &Path, dest: &Path) -> Result<(), ArtifactsError> {
        let data = fs::read(src).map_err(io_err("failed to read tarball"))?;
        self.checker.check(&data)?;

        let mut archive = Archive::new(GzDecoder::new(data.as_slice()));
        let entries = archive
            .entries()
            .map_err(io_err("failed to read tar header"))?;

        for entry in entries {
            let mut entry = entry.map_err(io_err("failed to read tar header"))?;
            let raw = entry
                .path()
                .map_err(io_err("failed to read tar header"))?
                .into_owned();
            let Some(relative) = clean_entry_path(&raw) else {
                return Err(ArtifactsError::InvalidEntryPath(raw.display().to_string()));
            };
            let target = dest.join(relative);

            let entry_type = entry.header().entry_type();
            if entry_type.is_dir() {
                fs::create_dir_all(&target).map_err(io_err("failed to create directory"))?;
                continue;
            }
            if !entry_type.is_file() {
                trace!(path = %raw.display(), "skipping non-regular tar entry");
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(io_err("failed to create directory"))?;
            }
            let file = File::create(&target).map_err(io_err("failed to create file"))?;
            let mut writer = BufWriter::new(file);
            let copied = io::copy(&mut entry, &mut writer);
            let flushed = writer.flush();
            copied.map_err(io_err("failed to write file"))?;
            flushed.map_err(io_err("failed to flush buffer"))?;
        }

        Ok(())
    }
}

/// Lexically normalizes an archive entry path. Returns `None` when the path
/// climbs above the extraction root.
pub(crate) fn clean_entry_path(raw: &Path) -> Option<PathBuf> {
    let mut cleaned = PathBuf::new();
    let mut depth = 0usize;
    for component in raw.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                cleaned.pop();
                depth -= 1;
            }
            Component::Normal(part) => {
                cleaned.push(part);
                depth += 1;
            }
        }
    }
    Some(cleaned)
}
