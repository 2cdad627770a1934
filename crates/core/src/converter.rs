//! Main converter orchestrator that ties together the engine pool, the
//! renumberer and the directory walker.
//!
//! Both entry points validate their parameters before touching the
//! filesystem or the pool, then borrow one engine for the whole batch.

use crate::config::{BatchReport, ConversionRequest, ConverterConfig, FileResult, FolderRequest};
use crate::engine::{GhostscriptEngine, RasterEngine};
use crate::error::{ConversionError, Result};
use crate::pool::{ConverterPool, PoolHealth};
use crate::walker::{convert_document, walk_tree, CancelFlag, Placement, WalkLevel, WalkOptions, Wildcard};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs;
use tracing::{debug, error, info};

/// Main converter for documents to per-page JPEGs.
///
/// Cheap to share: concurrent calls each borrow their own engine from the
/// pool and wait when all engines are busy.
pub struct Converter<E: RasterEngine = GhostscriptEngine> {
    /// Engine pool.
    pool: Arc<ConverterPool<E>>,
    /// Configuration.
    config: ConverterConfig,
}

impl Converter<GhostscriptEngine> {
    /// Create a converter backed by a pool of Ghostscript engines.
    pub fn new(config: ConverterConfig) -> Result<Self> {
        config.validate()?;

        info!(
            "Initializing converter with pool_size={}, resolution={}x{}",
            config.pool.pool_size, config.defaults.resolution_x, config.defaults.resolution_y
        );

        let pool = ConverterPool::new(&config.pool)?;
        Ok(Self::with_pool(pool, config))
    }
}

impl<E: RasterEngine> Converter<E> {
    /// Create a converter around an existing pool.
    pub fn with_pool(pool: ConverterPool<E>, mut config: ConverterConfig) -> Self {
        config.pool.pool_size = pool.pool_size();
        Self {
            pool: Arc::new(pool),
            config,
        }
    }

    /// Create a converter owning the given engines, with default settings.
    pub fn from_engines(engines: Vec<E>) -> Result<Self> {
        let pool = ConverterPool::from_engines(engines)?;
        Ok(Self::with_pool(pool, ConverterConfig::default()))
    }

    /// Single-file request using the configured default settings.
    pub fn file_request(
        &self,
        source_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> ConversionRequest {
        ConversionRequest::new(source_path, output_dir).with_settings(self.config.defaults)
    }

    /// Folder request using the configured default settings.
    pub fn folder_request(
        &self,
        source_dir: impl Into<PathBuf>,
        target_dir: impl Into<PathBuf>,
    ) -> FolderRequest {
        FolderRequest::new(source_dir, target_dir).with_settings(self.config.defaults)
    }

    /// Convert one document into `<base>_pNNN.jpg` files in the output directory.
    ///
    /// Returns `Err` only for invalid parameters or a shut-down pool; a failed
    /// conversion is reported through [`BatchReport::failure`].
    pub async fn convert_file(&self, request: &ConversionRequest) -> Result<BatchReport> {
        request.settings.validate()?;

        let mut engine = self.pool.acquire().await?;
        let start = Instant::now();
        let mut report = BatchReport::default();

        info!("Converting {:?}", request.source_path);

        match self.convert_single(&mut *engine, request, &mut report).await {
            Ok(result) => {
                info!(
                    "Converted {:?} to {} pages in {:?}",
                    request.source_path,
                    result.page_count,
                    start.elapsed()
                );
                report.record_file(result);
            }
            Err(e) => {
                error!("Failed to convert {:?}: {}", request.source_path, e);
                report.record_failure(&request.source_path, &e);
            }
        }

        report.total_duration = start.elapsed();
        Ok(report)
    }

    async fn convert_single(
        &self,
        engine: &mut E,
        request: &ConversionRequest,
        report: &mut BatchReport,
    ) -> Result<FileResult> {
        let start = Instant::now();

        let is_file = fs::metadata(&request.source_path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(ConversionError::InputNotFound(request.source_path.clone()));
        }

        if ensure_dir(&request.output_dir).await? {
            report.created_dirs.push(request.output_dir.clone());
        }

        let output_paths = convert_document(
            engine,
            &request.source_path,
            &request.output_dir,
            &request.settings,
        )
        .await?;

        Ok(FileResult {
            input_path: request.source_path.clone(),
            page_count: output_paths.len(),
            output_paths,
            source_deleted: false,
            duration: start.elapsed(),
        })
    }

    /// Convert every matching file below the source directory.
    ///
    /// With `target_dir == source_dir` pages are written next to their
    /// sources; otherwise the target tree mirrors the source tree.
    pub async fn convert_folder(&self, request: &FolderRequest) -> Result<BatchReport> {
        self.convert_folder_with_cancel(request, &CancelFlag::new())
            .await
    }

    /// [`convert_folder`](Self::convert_folder) that stops between files once
    /// `cancel` is set.
    pub async fn convert_folder_with_cancel(
        &self,
        request: &FolderRequest,
        cancel: &CancelFlag,
    ) -> Result<BatchReport> {
        request.settings.validate()?;
        let wildcard = Wildcard::new(&request.wildcard)?;

        let mut engine = self.pool.acquire().await?;
        let start = Instant::now();

        info!(
            "Converting folder {:?} -> {:?} (wildcard={}, recurse={}, delete_sources={})",
            request.source_dir,
            request.target_dir,
            wildcard.as_str(),
            request.recurse_subfolders,
            request.delete_sources
        );

        let source_dir = resolve(&request.source_dir).await;
        let mut target_dir = resolve(&request.target_dir).await;
        let placement = if source_dir == target_dir {
            Placement::InPlace
        } else {
            Placement::Mirror
        };

        let mut created_root = None;
        if placement == Placement::Mirror && fs::metadata(&source_dir).await.is_ok() {
            match ensure_dir(&target_dir).await {
                Ok(created) => {
                    if created {
                        created_root = Some(target_dir.clone());
                    }
                    target_dir = resolve(&target_dir).await;
                }
                Err(e) => {
                    error!("Cannot prepare target {:?}: {}", target_dir, e);
                    let mut report = BatchReport::default();
                    report.record_failure(&target_dir, &e);
                    report.total_duration = start.elapsed();
                    return Ok(report);
                }
            }
        }

        let options = WalkOptions {
            wildcard,
            delete_sources: request.delete_sources,
            recurse_subfolders: request.recurse_subfolders,
            placement,
            settings: request.settings,
        };
        let mut report = walk_tree(
            &mut *engine,
            WalkLevel::root(source_dir, target_dir),
            &options,
            cancel,
        )
        .await;

        if let Some(root) = created_root {
            report.created_dirs.insert(0, root);
        }
        report.total_duration = start.elapsed();

        info!(
            "Folder conversion finished: {} files, {} pages, succeeded={} in {:?}",
            report.converted.len(),
            report.total_pages,
            report.succeeded(),
            report.total_duration
        );

        Ok(report)
    }

    /// Get pool health information.
    pub fn health(&self) -> PoolHealth {
        self.pool.health()
    }

    /// Shutdown the converter and release resources.
    pub fn shutdown(&self) {
        info!("Shutting down converter");
        self.pool.shutdown();
    }

    /// Get the current configuration.
    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Get statistics about processing.
    pub fn stats(&self) -> ConverterStats {
        ConverterStats {
            total_batches: self.pool.total_checkouts(),
            pool_size: self.pool.pool_size(),
            idle_engines: self.pool.available(),
        }
    }
}

impl<E: RasterEngine> Clone for Converter<E> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            config: self.config.clone(),
        }
    }
}

/// Canonical form of `path` when it exists, the path as given otherwise.
async fn resolve(path: &Path) -> PathBuf {
    fs::canonicalize(path)
        .await
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Create `dir` if needed; true when it was created.
async fn ensure_dir(dir: &Path) -> Result<bool> {
    if fs::try_exists(dir)
        .await
        .map_err(|e| ConversionError::io(dir, e))?
    {
        return Ok(false);
    }
    fs::create_dir_all(dir)
        .await
        .map_err(|e| ConversionError::io(dir, e))?;
    debug!("Created output directory {:?}", dir);
    Ok(true)
}

/// Statistics about the converter.
#[derive(Debug, Clone)]
pub struct ConverterStats {
    /// Batches started since creation.
    pub total_batches: usize,
    /// Pool size.
    pub pool_size: usize,
    /// Engines idle right now.
    pub idle_engines: usize,
}

/// Builder for creating a Converter with custom settings.
pub struct ConverterBuilder {
    config: ConverterConfig,
}

impl ConverterBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ConverterConfig::default(),
        }
    }

    /// Set the pool size.
    pub fn pool_size(mut self, size: usize) -> Self {
        self.config.pool.pool_size = size;
        self
    }

    /// Set the default resolution on both axes.
    pub fn resolution(mut self, dpi: f64) -> Self {
        self.config.defaults.resolution_x = dpi;
        self.config.defaults.resolution_y = dpi;
        self
    }

    /// Set the default anti-aliasing.
    pub fn smoothing(mut self, graphics: i32, text: i32) -> Self {
        self.config.defaults.graphics_smoothing = graphics;
        self.config.defaults.text_smoothing = text;
        self
    }

    /// Set the default JPEG quality.
    pub fn quality(mut self, quality: i32) -> Self {
        self.config.defaults.quality = quality;
        self
    }

    /// Set the conversion timeout.
    pub fn conversion_timeout(mut self, timeout: Duration) -> Self {
        self.config.pool.conversion_timeout = timeout;
        self
    }

    /// Set the path to the Ghostscript binary.
    pub fn ghostscript_path(mut self, path: PathBuf) -> Self {
        self.config.pool.ghostscript_path = Some(path);
        self
    }

    /// Build the converter.
    pub fn build(self) -> Result<Converter> {
        Converter::new(self.config)
    }
}

impl Default for ConverterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
