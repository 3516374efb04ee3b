//! Media directory enumeration.

use std::path::{Path, PathBuf};

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::{Configuration, PlaylistOrder};
use crate::error::ScanError;

/// Which files count as playable media.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Lowercase image extensions, without dot.
    pub image_exts: Vec<String>,
    /// Lowercase video extensions, without dot.
    pub video_exts: Vec<String>,
}

impl ScanOptions {
    pub fn from_config(cfg: &Configuration) -> Self {
        Self {
            image_exts: cfg.image_extensions.clone(),
            video_exts: cfg.video_extensions.clone(),
        }
    }

    /// Return `true` if `path` has an eligible extension (case-insensitive).
    #[must_use]
    pub fn is_eligible(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| {
                self.image_exts
                    .iter()
                    .chain(&self.video_exts)
                    .any(|e| e.eq_ignore_ascii_case(ext))
            })
    }
}

/// List eligible regular files directly inside `dir`, sorted by file name.
///
/// Subdirectories are not descended into, hidden files are ignored and
/// symlinks are followed.
///
/// # Errors
/// Returns [`ScanError::BadDir`] if `dir` is missing or not a directory, and
/// [`ScanError::Walk`] if it cannot be listed.
pub fn enumerate(dir: &Path, opts: &ScanOptions) -> Result<Vec<PathBuf>, ScanError> {
    if !dir.is_dir() {
        return Err(ScanError::BadDir(dir.to_path_buf()));
    }

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    let mut out = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            // Depth 0 errors mean the directory itself cannot be read.
            Err(source) if source.depth() == 0 => {
                return Err(ScanError::Walk {
                    path: dir.to_path_buf(),
                    source,
                });
            }
            Err(err) => {
                warn!(error = %err, "skipping unreadable directory entry");
                continue;
            }
        };
        if entry.file_type().is_file() && !is_hidden(&entry) && opts.is_eligible(entry.path()) {
            out.push(entry.into_path());
        }
    }

    debug!(dir = %dir.display(), count = out.len(), "media directory scanned");
    Ok(out)
}

/// Apply the configured playlist order in place. `paths` must already be
/// sorted, as returned by [`enumerate`].
pub fn apply_order<R: Rng + ?Sized>(paths: &mut [PathBuf], order: PlaylistOrder, rng: &mut R) {
    match order {
        PlaylistOrder::Alphanumeric => {}
        PlaylistOrder::Shuffle => paths.shuffle(rng),
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|n| n.starts_with('.'))
}
