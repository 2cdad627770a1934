//! Output naming for page files.
//!
//! The raster engine writes `<base>-<counter>.jpg` through the pattern from
//! [`output_pattern`]; [`crate::renumber`] then moves each file to its final
//! name from [`page_file_name`].

use std::path::{Path, PathBuf};

/// Placeholder the engine replaces with its own page counter.
pub const PAGE_COUNTER_PLACEHOLDER: &str = "%d";

/// Extension of every page file.
pub const PAGE_EXTENSION: &str = "jpg";

/// File name without directory and without its final extension.
///
/// Both `/` and `\` count as separators on every platform, so Windows paths
/// handed over by other tools behave the same here. Earlier dots belong to
/// the base name; a name without a dot is returned whole.
pub fn base_name(path: &Path) -> String {
    let path = path.to_string_lossy();
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or_default();
    match file_name.rfind('.') {
        Some(dot) => file_name[..dot].to_string(),
        None => file_name.to_string(),
    }
}

/// Engine output pattern for `source` inside `output_dir`: `<base>-%d.jpg`.
pub fn output_pattern(source: &Path, output_dir: &Path) -> PathBuf {
    output_dir.join(format!(
        "{}-{}.{}",
        base_name(source),
        PAGE_COUNTER_PLACEHOLDER,
        PAGE_EXTENSION
    ))
}

/// Final name of page `page` (1-based): `<base>_p001.jpg`, `<base>_p010.jpg`,
/// `<base>_p100.jpg`. Pages past 999 keep all their digits.
pub fn page_file_name(base: &str, page: usize) -> String {
    format!("{}_p{:03}.{}", base, page, PAGE_EXTENSION)
}
