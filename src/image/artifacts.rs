use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

/// Size descriptor, written to the work directory.
pub const BININFO_FILE: &str = "bininfo.txt";

const BININFO_PREFIX: &str = "S20010000,";
const BININFO_SUFFIX: &str = "#";

/// Minute-resolution timestamp, e.g. `2024_03_07_09_41`.
pub fn timestamp(now: &NaiveDateTime) -> String {
    now.format("%Y_%m_%d_%H_%M").to_string()
}

/**
 * Path of the timestamped copy: `<dir>/<stem>_<timestamp>.bin`, alongside
 * the original.
 */
pub fn timestamped_path(original: &Path, now: &NaiveDateTime) -> PathBuf {
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = format!("{}_{}.bin", stem, timestamp(now));
    original.with_file_name(name)
}

/// Descriptor contents, with the image size as upper-case hex.
pub fn bininfo(size: u64) -> String {
    format!("{}{:X}{}", BININFO_PREFIX, size, BININFO_SUFFIX)
}

//----------------------------------------------------------------------------
// Tests
//----------------------------------------------------------------------------
