//! Renumbering of freshly rendered page files.
//!
//! The engine numbers pages with its own counter (`doc-1.jpg`, `doc-2.jpg`,
//! ...). Renumbering moves every file of one page set to the dense, padded
//! scheme from [`page_file_name`], keeping the engine's page order.

use crate::error::{ConversionError, Result};
use crate::naming::{page_file_name, PAGE_EXTENSION};
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Find the page files the engine wrote for `base` in `dir`, ordered by the
/// engine's counter.
///
/// Only `<base>-<counter>.jpg` qualifies; files sharing the prefix with
/// another suffix or extension are left alone.
pub async fn discover_pages(dir: &Path, base: &str) -> Result<Vec<PathBuf>> {
    let pattern = page_set_pattern(base)?;
    let mut pages: Vec<(u64, PathBuf)> = Vec::new();

    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| ConversionError::io(dir, e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ConversionError::io(dir, e))?
    {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(counter) = pattern
            .captures(name)
            .and_then(|caps| caps[1].parse::<u64>().ok())
        else {
            continue;
        };

        let file_type = entry
            .file_type()
            .await
            .map_err(|e| ConversionError::io(entry.path(), e))?;
        if file_type.is_file() {
            pages.push((counter, entry.path()));
        }
    }

    pages.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    Ok(pages.into_iter().map(|(_, path)| path).collect())
}

/// Rename the page set of `base` in `dir` to `<base>_p001.jpg`, ... and
/// return the new paths in page order.
///
/// Must run once per fresh page set. A destination that already exists
/// aborts with [`ConversionError::RenameCollision`]; pages renamed before
/// the collision keep their new names.
pub async fn renumber_pages(dir: &Path, base: &str) -> Result<Vec<PathBuf>> {
    let pages = discover_pages(dir, base).await?;
    let mut renamed = Vec::with_capacity(pages.len());

    for (index, from) in pages.into_iter().enumerate() {
        let to = dir.join(page_file_name(base, index + 1));

        if fs::try_exists(&to)
            .await
            .map_err(|e| ConversionError::io(&to, e))?
        {
            return Err(ConversionError::RenameCollision { from, to });
        }

        fs::rename(&from, &to)
            .await
            .map_err(|e| ConversionError::io(&from, e))?;
        debug!("Renamed {:?} -> {:?}", from.file_name(), to.file_name());
        renamed.push(to);
    }

    Ok(renamed)
}

fn page_set_pattern(base: &str) -> Result<Regex> {
    Regex::new(&format!(
        r"^{}-(\d+)\.{}$",
        regex::escape(base),
        PAGE_EXTENSION
    ))
    .map_err(|e| {
        ConversionError::InvalidArgument(format!("cannot match page files for '{}': {}", base, e))
    })
}
