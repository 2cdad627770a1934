//! Raster engines: the external renderer behind every conversion.
//!
//! An engine turns one document into page JPEGs named after an output
//! pattern containing `%d`, numbering the pages itself. The orchestrator
//! never renders anything on its own; it only drives a [`RasterEngine`].

use crate::config::{PoolConfig, RenderSettings};
use crate::error::{ConversionError, Result};
use crate::naming::PAGE_COUNTER_PLACEHOLDER;
use async_process::Command;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info};

/// Renderer contract used by the converter pool.
///
/// Implementations are expensive to create and are reused across many
/// conversions, one caller at a time.
pub trait RasterEngine: Send + 'static {
    /// Render `source` into page files matching `output_pattern`.
    ///
    /// Returns an error when the renderer reports failure; the pages it may
    /// have written are left in place.
    fn convert(
        &mut self,
        source: &Path,
        output_pattern: &Path,
        settings: &RenderSettings,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Ghostscript executable names, most specific first.
const GHOSTSCRIPT_BINARIES: &[&str] = &["gs", "gswin64c", "gswin32c"];

/// A Ghostscript installation bound to one pool slot.
#[derive(Debug)]
pub struct GhostscriptEngine {
    /// Slot ID for logging.
    id: usize,
    /// Path to the Ghostscript binary.
    gs_path: PathBuf,
    /// Per-document timeout.
    conversion_timeout: Duration,
    /// Number of documents converted by this engine.
    docs_processed: u32,
}

impl GhostscriptEngine {
    /// Create an engine using an already located binary.
    pub fn new(id: usize, gs_path: PathBuf, conversion_timeout: Duration) -> Self {
        debug!("Created Ghostscript engine {} using {:?}", id, gs_path);
        Self {
            id,
            gs_path,
            conversion_timeout,
            docs_processed: 0,
        }
    }

    /// Locate the Ghostscript binary.
    pub fn find_ghostscript(config: &PoolConfig) -> Result<PathBuf> {
        // Check if explicit path is provided
        if let Some(ref path) = config.ghostscript_path {
            if path.exists() {
                return Ok(path.clone());
            }
            return Err(ConversionError::GhostscriptNotFound);
        }

        // Search common locations
        let candidates = [
            // Linux
            "/usr/bin/gs",
            "/usr/local/bin/gs",
            // macOS (Homebrew)
            "/opt/homebrew/bin/gs",
        ];

        for candidate in candidates {
            let path = PathBuf::from(candidate);
            if path.exists() {
                return Ok(path);
            }
        }

        // Try PATH
        GHOSTSCRIPT_BINARIES
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or(ConversionError::GhostscriptNotFound)
    }

    /// Slot ID of this engine.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Number of documents this engine converted.
    pub fn docs_processed(&self) -> u32 {
        self.docs_processed
    }

    /// Command-line arguments for one conversion.
    fn arguments(source: &Path, output_pattern: &Path, settings: &RenderSettings) -> Vec<String> {
        vec![
            "-dNOPAUSE".to_string(),
            "-dBATCH".to_string(),
            "-dSAFER".to_string(),
            "-dQUIET".to_string(),
            "-sDEVICE=jpeg".to_string(),
            format!("-r{}x{}", settings.resolution_x, settings.resolution_y),
            format!("-dGraphicsAlphaBits={}", settings.graphics_smoothing),
            format!("-dTextAlphaBits={}", settings.text_smoothing),
            format!("-dJPEGQ={}", settings.quality),
            format!("-sOutputFile={}", Self::output_file(output_pattern)),
            source.display().to_string(),
        ]
    }

    /// Ghostscript `OutputFile` template for `output_pattern`.
    ///
    /// Ghostscript formats the whole value, so every literal `%` is doubled
    /// and only the trailing page placeholder is left live.
    fn output_file(output_pattern: &Path) -> String {
        let pattern = output_pattern.to_string_lossy();
        match pattern.rfind(PAGE_COUNTER_PLACEHOLDER) {
            Some(at) => {
                let (head, tail) = pattern.split_at(at);
                let tail = &tail[PAGE_COUNTER_PLACEHOLDER.len()..];
                format!(
                    "{}{}{}",
                    head.replace('%', "%%"),
                    PAGE_COUNTER_PLACEHOLDER,
                    tail.replace('%', "%%")
                )
            }
            None => pattern.replace('%', "%%"),
        }
    }
}

impl RasterEngine for GhostscriptEngine {
    async fn convert(
        &mut self,
        source: &Path,
        output_pattern: &Path,
        settings: &RenderSettings,
    ) -> Result<()> {
        let start = Instant::now();

        debug!("Engine {} converting {:?}", self.id, source.file_name());

        let mut cmd = Command::new(&self.gs_path);
        cmd.args(Self::arguments(source, output_pattern, settings))
            .kill_on_drop(true);

        // Run with timeout
        let output = timeout(self.conversion_timeout, cmd.output())
            .await
            .map_err(|_| ConversionError::Timeout {
                path: source.to_path_buf(),
                timeout_secs: self.conversion_timeout.as_secs(),
            })?
            .map_err(ConversionError::ProcessStartFailed)?;

        // Check exit status
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("Ghostscript failed for {:?}: {}", source, stderr);
            return Err(ConversionError::ConversionFailed {
                path: source.to_path_buf(),
                message: format!("{}: {}", output.status, stderr.trim()),
            });
        }

        self.docs_processed += 1;
        info!(
            "Engine {} converted {:?} in {:?}",
            self.id,
            source.file_name(),
            start.elapsed()
        );

        Ok(())
    }
}
