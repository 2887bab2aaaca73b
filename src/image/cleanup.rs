use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

/// Key material the sign tool leaves behind in its working directory.
pub const LEFTOVER_SUFFIXES: [&str; 3] = [
    "DevelopmentKey.mvfw",
    "DevelopmentKey.xml",
    "DevelopmentKey.txt",
];

#[derive(Debug, Default)]
pub struct Cleanup {
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, io::Error)>,
}

impl Cleanup {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Shell-glob style `*<suffix>` match; dot-files aren't matched.
fn is_leftover(name: &OsStr, suffix: &str) -> bool {
    let name = name.as_encoded_bytes();
    !name.starts_with(b".") && name.ends_with(suffix.as_bytes())
}

/**
 * List leftovers in `dir`, grouped by suffix (in `LEFTOVER_SUFFIXES` order)
 * and sorted by name within each group.
 */
pub fn find_leftovers(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut names: Vec<OsString> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        names.push(entry.file_name());
    }
    names.sort();

    let mut found = Vec::new();
    for suffix in LEFTOVER_SUFFIXES.iter() {
        found.extend(
            names
                .iter()
                .filter(|n| is_leftover(n, suffix))
                .map(|n| dir.join(n)),
        );
    }
    Ok(found)
}

/**
 * Best-effort removal of every leftover in `dir`. A file that can't be
 * removed is logged and recorded, and the rest are still attempted.
 */
pub fn remove_leftovers(dir: &Path) -> Cleanup {
    info!("Deleting unused files...");
    let mut cleanup = Cleanup::default();

    let found = match find_leftovers(dir) {
        Ok(found) => found,
        Err(e) => {
            warn!("Couldn't list {}: {}", dir.display(), e);
            cleanup.failed.push((dir.to_path_buf(), e));
            return cleanup;
        }
    };

    remove_all(found)
}

/// Remove each path in turn; one failure doesn't stop the others.
pub fn remove_all(paths: Vec<PathBuf>) -> Cleanup {
    let mut cleanup = Cleanup::default();
    for path in paths {
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted {}", path.display());
                cleanup.deleted.push(path);
            }
            Err(e) => {
                warn!("Error while deleting file {}: {}", path.display(), e);
                cleanup.failed.push((path, e));
            }
        }
    }
    cleanup
}

//----------------------------------------------------------------------------
// Tests
//----------------------------------------------------------------------------
