//! Recursive folder conversion.
//!
//! Each directory is one [`WalkLevel`]: its matching files are converted and
//! renumbered into the level's target directory, then (optionally) every
//! subdirectory becomes a child level. Levels are built fresh for each
//! directory and never mutated. Files go before subdirectories, both in name
//! order. The first fatal failure anywhere in the tree stops the whole walk.

use crate::config::{BatchReport, FileResult, RenderSettings};
use crate::engine::RasterEngine;
use crate::error::{ConversionError, Result};
use crate::naming::{base_name, output_pattern};
use crate::renumber::renumber_pages;
use futures::future::BoxFuture;
use regex::{Regex, RegexBuilder};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::fs;
use tracing::{debug, error, info, warn};

/// File name filter using `*` (any run of characters) and `?` (one
/// character), matched against the whole name, ignoring case.
#[derive(Debug, Clone)]
pub struct Wildcard {
    pattern: String,
    regex: Regex,
}

impl Wildcard {
    /// Compile a wildcard. `*.*` matches every name, dotted or not.
    pub fn new(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(ConversionError::InvalidArgument(
                "wildcard must not be empty".to_string(),
            ));
        }

        let effective = if pattern == "*.*" { "*" } else { pattern };
        let translated = regex::escape(effective)
            .replace(r"\*", ".*")
            .replace(r"\?", ".");
        let regex = RegexBuilder::new(&format!("^{}$", translated))
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                ConversionError::InvalidArgument(format!("invalid wildcard '{}': {}", pattern, e))
            })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Whether `file_name` matches.
    pub fn is_match(&self, file_name: &str) -> bool {
        self.regex.is_match(file_name)
    }

    /// The wildcard as given.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

/// Where converted pages of a walk are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Pages go next to their sources; no directories are created.
    InPlace,
    /// Pages go into a separate tree that mirrors the source tree.
    Mirror,
}

/// One directory's worth of traversal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkLevel {
    /// Directory whose files are converted.
    pub source_dir: PathBuf,
    /// Directory receiving this level's pages.
    pub target_dir: PathBuf,
}

impl WalkLevel {
    /// Root level of a walk.
    pub fn root(source_dir: impl Into<PathBuf>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            target_dir: target_dir.into(),
        }
    }

    /// Level for `subdir`, a directory inside this level's source.
    fn child(&self, subdir: PathBuf, placement: Placement) -> Self {
        let target_dir = match placement {
            Placement::InPlace => subdir.clone(),
            Placement::Mirror => match subdir.file_name() {
                Some(name) => self.target_dir.join(name),
                None => self.target_dir.clone(),
            },
        };
        Self {
            source_dir: subdir,
            target_dir,
        }
    }
}

/// Settings shared by every level of one walk.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Which files to convert.
    pub wildcard: Wildcard,
    /// Delete each source after it converted.
    pub delete_sources: bool,
    /// Descend into subdirectories.
    pub recurse_subfolders: bool,
    /// Output placement for the whole tree.
    pub placement: Placement,
    /// Rendering parameters.
    pub settings: RenderSettings,
}

/// Cooperative cancellation for a running walk.
///
/// Checked before each file and each directory; a conversion already in
/// progress finishes and its pages are renumbered before the walk stops.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create a flag that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Convert one document and renumber its pages inside `target_dir`.
///
/// Returns the final page paths in page order. A run that leaves no page
/// files behind is a failed conversion.
pub async fn convert_document<E: RasterEngine>(
    engine: &mut E,
    source: &Path,
    target_dir: &Path,
    settings: &RenderSettings,
) -> Result<Vec<PathBuf>> {
    let pattern = output_pattern(source, target_dir);
    engine.convert(source, &pattern, settings).await?;

    let pages = renumber_pages(target_dir, &base_name(source)).await?;
    if pages.is_empty() {
        return Err(ConversionError::ConversionFailed {
            path: source.to_path_buf(),
            message: format!("no page files written to {}", target_dir.display()),
        });
    }
    Ok(pages)
}

/// Walk the tree below `root`, converting every matching file with `engine`.
///
/// Missing directories are skipped and listed in
/// [`BatchReport::skipped_dirs`]; anything else that fails ends the walk and
/// is stored in [`BatchReport::failure`].
pub async fn walk_tree<E: RasterEngine>(
    engine: &mut E,
    root: WalkLevel,
    options: &WalkOptions,
    cancel: &CancelFlag,
) -> BatchReport {
    let start = Instant::now();
    let mut walker = Walker {
        engine,
        options,
        cancel,
        target_root: root.target_dir.clone(),
        report: BatchReport::default(),
    };

    // The failure is already recorded in the report.
    let _ = walker.walk_level(root).await;

    let mut report = walker.report;
    report.total_duration = start.elapsed();
    report
}

struct Walker<'a, E> {
    engine: &'a mut E,
    options: &'a WalkOptions,
    cancel: &'a CancelFlag,
    target_root: PathBuf,
    report: BatchReport,
}

/// Files and subdirectories of one directory, sorted by name.
#[derive(Debug, Default)]
struct LevelEntries {
    files: Vec<PathBuf>,
    subdirs: Vec<PathBuf>,
}

impl<'a, E: RasterEngine> Walker<'a, E> {
    fn walk_level(&mut self, level: WalkLevel) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.check_cancelled(&level.source_dir)?;
            debug!("Entering {:?} -> {:?}", level.source_dir, level.target_dir);

            let entries = match read_level(&level.source_dir, &self.options.wildcard).await {
                Ok(entries) => entries,
                Err(ConversionError::DirectoryNotFound(dir)) => {
                    warn!("Directory not found, skipping: {:?}", dir);
                    self.report.skipped_dirs.push(dir);
                    return Ok(());
                }
                Err(e) => return Err(self.fail(&level.source_dir, e)),
            };

            for file in &entries.files {
                self.check_cancelled(file)?;
                self.convert_file(file, &level.target_dir)
                    .await
                    .map_err(|e| self.fail(file, e))?;
            }

            if !self.options.recurse_subfolders {
                return Ok(());
            }

            for subdir in entries.subdirs {
                self.check_cancelled(&subdir)?;

                if self.options.placement == Placement::Mirror && subdir == self.target_root {
                    debug!("Not descending into target tree {:?}", subdir);
                    continue;
                }

                let child = level.child(subdir, self.options.placement);
                if self.options.placement == Placement::Mirror {
                    self.ensure_target_dir(&child.target_dir)
                        .await
                        .map_err(|e| self.fail(&child.source_dir, e))?;
                }
                self.walk_level(child).await?;
            }

            Ok(())
        })
    }

    async fn convert_file(&mut self, source: &Path, target_dir: &Path) -> Result<()> {
        let start = Instant::now();

        let output_paths =
            convert_document(&mut *self.engine, source, target_dir, &self.options.settings).await?;

        let source_deleted = if self.options.delete_sources {
            fs::remove_file(source)
                .await
                .map_err(|e| ConversionError::io(source, e))?;
            true
        } else {
            false
        };

        info!(
            "Converted {:?} to {} pages in {:?}",
            source,
            output_paths.len(),
            start.elapsed()
        );

        self.report.record_file(FileResult {
            input_path: source.to_path_buf(),
            page_count: output_paths.len(),
            output_paths,
            source_deleted,
            duration: start.elapsed(),
        });
        Ok(())
    }

    async fn ensure_target_dir(&mut self, dir: &Path) -> Result<()> {
        if fs::try_exists(dir)
            .await
            .map_err(|e| ConversionError::io(dir, e))?
        {
            return Ok(());
        }
        fs::create_dir_all(dir)
            .await
            .map_err(|e| ConversionError::io(dir, e))?;
        debug!("Created {:?}", dir);
        self.report.created_dirs.push(dir.to_path_buf());
        Ok(())
    }

    fn check_cancelled(&mut self, at: &Path) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(self.fail(at, ConversionError::Cancelled));
        }
        Ok(())
    }

    fn fail(&mut self, at: &Path, err: ConversionError) -> ConversionError {
        error!("Stopping at {:?}: {}", at, err);
        self.report.record_failure(at, &err);
        err
    }
}

/// List one directory: files matching `wildcard` and all subdirectories.
///
/// Symlinked files count as files; symlinked directories are not followed.
async fn read_level(dir: &Path, wildcard: &Wildcard) -> Result<LevelEntries> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConversionError::DirectoryNotFound(dir.to_path_buf()));
        }
        Err(e) => return Err(ConversionError::io(dir, e)),
    };

    let mut level = LevelEntries::default();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ConversionError::io(dir, e))?
    {
        let path = entry.path();
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| ConversionError::io(&path, e))?;

        if file_type.is_dir() {
            level.subdirs.push(path);
            continue;
        }

        let is_file = file_type.is_file()
            || (file_type.is_symlink()
                && fs::metadata(&path)
                    .await
                    .map(|m| m.is_file())
                    .unwrap_or(false));
        if is_file && wildcard.is_match(&entry.file_name().to_string_lossy()) {
            level.files.push(path);
        }
    }

    level.files.sort();
    level.subdirs.sort();
    Ok(level)
}
