//! Configuration, request and result types for doc-to-jpg conversion.

use crate::error::{ConversionError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Anti-aliasing levels accepted by the renderer for graphics and text.
pub const SMOOTHING_LEVELS: [i32; 3] = [1, 2, 4];

/// Wildcard used by folder conversions when none is given.
pub const DEFAULT_WILDCARD: &str = "*.pdf";

/// Rendering parameters passed through to the raster engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Horizontal resolution in dots per inch.
    /// Default: 150.
    pub resolution_x: f64,

    /// Vertical resolution in dots per inch.
    /// Default: 150.
    pub resolution_y: f64,

    /// Graphics anti-aliasing bits (1, 2 or 4).
    /// Default: 4.
    pub graphics_smoothing: i32,

    /// Text anti-aliasing bits (1, 2 or 4).
    /// Default: 4.
    pub text_smoothing: i32,

    /// JPEG quality (0-100).
    /// Default: 85.
    pub quality: i32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            resolution_x: 150.0,
            resolution_y: 150.0,
            graphics_smoothing: 4,
            text_smoothing: 4,
            quality: 85,
        }
    }
}

impl RenderSettings {
    /// Create settings with the same resolution on both axes.
    pub fn with_resolution(dpi: f64) -> Self {
        Self {
            resolution_x: dpi,
            resolution_y: dpi,
            ..Default::default()
        }
    }

    /// Set independent horizontal and vertical resolution.
    pub fn resolution(mut self, x: f64, y: f64) -> Self {
        self.resolution_x = x;
        self.resolution_y = y;
        self
    }

    /// Set graphics and text anti-aliasing.
    pub fn smoothing(mut self, graphics: i32, text: i32) -> Self {
        self.graphics_smoothing = graphics;
        self.text_smoothing = text;
        self
    }

    /// Set JPEG quality.
    pub fn quality(mut self, quality: i32) -> Self {
        self.quality = quality;
        self
    }

    /// Check every parameter against its accepted domain.
    ///
    /// Only the first violation is reported, in this order: resolution,
    /// graphics smoothing, text smoothing, quality.
    pub fn validate(&self) -> Result<()> {
        // Negated comparison so NaN is rejected too.
        if !(self.resolution_x > 0.0) || !(self.resolution_y > 0.0) {
            return Err(ConversionError::InvalidArgument(
                "resolution must be positive".to_string(),
            ));
        }
        if !SMOOTHING_LEVELS.contains(&self.graphics_smoothing) {
            return Err(ConversionError::InvalidArgument(
                "graphics smoothing must be 1, 2, or 4".to_string(),
            ));
        }
        if !SMOOTHING_LEVELS.contains(&self.text_smoothing) {
            return Err(ConversionError::InvalidArgument(
                "text smoothing must be 1, 2, or 4".to_string(),
            ));
        }
        if !(0..=100).contains(&self.quality) {
            return Err(ConversionError::InvalidArgument(
                "quality must be within 0–100".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the converter pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of engine handles in the pool.
    /// Default: number of CPU cores.
    pub pool_size: usize,

    /// Timeout for individual document conversions.
    /// Default: 120 seconds.
    pub conversion_timeout: Duration,

    /// Path to the Ghostscript binary. If None, searches common locations and PATH.
    pub ghostscript_path: Option<PathBuf>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: num_cpus::get(),
            conversion_timeout: Duration::from_secs(120),
            ghostscript_path: None,
        }
    }
}

impl PoolConfig {
    /// Create a new pool config with specified pool size.
    pub fn with_pool_size(pool_size: usize) -> Self {
        Self {
            pool_size,
            ..Default::default()
        }
    }

    /// Set the conversion timeout.
    pub fn conversion_timeout(mut self, timeout: Duration) -> Self {
        self.conversion_timeout = timeout;
        self
    }

    /// Set the Ghostscript binary path.
    pub fn ghostscript_path(mut self, path: PathBuf) -> Self {
        self.ghostscript_path = Some(path);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(ConversionError::InvalidConfig(
                "pool_size must be at least 1".to_string(),
            ));
        }
        if self.conversion_timeout.is_zero() {
            return Err(ConversionError::InvalidConfig(
                "conversion_timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Combined configuration for the converter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Pool configuration.
    pub pool: PoolConfig,

    /// Settings used when a caller does not supply its own.
    pub defaults: RenderSettings,
}

impl ConverterConfig {
    /// Create a converter config with the given pool size and resolution.
    pub fn new(pool_size: usize, dpi: f64) -> Self {
        Self {
            pool: PoolConfig::with_pool_size(pool_size),
            defaults: RenderSettings::with_resolution(dpi),
        }
    }

    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| ConversionError::io(path, e))?;
        Self::from_json_str(&json)
    }

    /// Validate the entire configuration.
    pub fn validate(&self) -> Result<()> {
        self.pool.validate()?;
        self.defaults.validate()?;
        Ok(())
    }
}

/// A single-file conversion request.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// Path to the input document.
    pub source_path: PathBuf,

    /// Directory the page JPEGs are written to.
    pub output_dir: PathBuf,

    /// Rendering parameters.
    pub settings: RenderSettings,
}

impl ConversionRequest {
    /// Create a new conversion request with default settings.
    pub fn new(source_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            output_dir: output_dir.into(),
            settings: RenderSettings::default(),
        }
    }

    /// Use the given rendering parameters.
    pub fn with_settings(mut self, settings: RenderSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// A folder conversion request.
#[derive(Debug, Clone)]
pub struct FolderRequest {
    /// Root of the tree to convert.
    pub source_dir: PathBuf,

    /// Root of the output tree. Equal to `source_dir` for in-place conversion.
    pub target_dir: PathBuf,

    /// File name wildcard (`*` and `?`), matched case-insensitively.
    pub wildcard: String,

    /// Delete each source after it converted successfully.
    pub delete_sources: bool,

    /// Descend into subdirectories.
    pub recurse_subfolders: bool,

    /// Rendering parameters.
    pub settings: RenderSettings,
}

impl FolderRequest {
    /// Create a non-recursive request for `*.pdf` with default settings.
    pub fn new(source_dir: impl Into<PathBuf>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            target_dir: target_dir.into(),
            wildcard: DEFAULT_WILDCARD.to_string(),
            delete_sources: false,
            recurse_subfolders: false,
            settings: RenderSettings::default(),
        }
    }

    /// Set the file name wildcard.
    pub fn wildcard(mut self, wildcard: impl Into<String>) -> Self {
        self.wildcard = wildcard.into();
        self
    }

    /// Delete sources after successful conversion.
    pub fn delete_sources(mut self, enabled: bool) -> Self {
        self.delete_sources = enabled;
        self
    }

    /// Convert subdirectories too.
    pub fn recurse_subfolders(mut self, enabled: bool) -> Self {
        self.recurse_subfolders = enabled;
        self
    }

    /// Use the given rendering parameters.
    pub fn with_settings(mut self, settings: RenderSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Result for a single successfully converted file.
#[derive(Debug, Clone)]
pub struct FileResult {
    /// Original input path.
    pub input_path: PathBuf,

    /// Renumbered page files, in page order.
    pub output_paths: Vec<PathBuf>,

    /// Number of pages.
    pub page_count: usize,

    /// Whether the source was deleted afterwards.
    pub source_deleted: bool,

    /// Processing time for this file.
    pub duration: Duration,
}

/// Information about the failure that stopped a batch.
#[derive(Debug, Clone)]
pub struct FailedFile {
    /// File or directory being processed when the batch stopped.
    pub input_path: PathBuf,

    /// Error message.
    pub error: String,
}

/// Outcome of a file or folder conversion.
///
/// A batch stops at its first fatal failure, so at most one failure is
/// recorded. Files converted before it stay on disk.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Files converted, in processing order.
    pub converted: Vec<FileResult>,

    /// The failure that aborted the batch, if any.
    pub failure: Option<FailedFile>,

    /// Directories that were missing when the walk reached them.
    pub skipped_dirs: Vec<PathBuf>,

    /// Directories created in the target tree.
    pub created_dirs: Vec<PathBuf>,

    /// Total pages written.
    pub total_pages: usize,

    /// Total processing time.
    pub total_duration: Duration,
}

impl BatchReport {
    /// True when no fatal failure was encountered.
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    pub(crate) fn record_file(&mut self, result: FileResult) {
        self.total_pages += result.page_count;
        self.converted.push(result);
    }

    pub(crate) fn record_failure(&mut self, path: &Path, error: &ConversionError) {
        self.failure = Some(FailedFile {
            input_path: path.to_path_buf(),
            error: error.to_string(),
        });
    }
}
