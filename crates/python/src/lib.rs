//! Python bindings for doc-to-jpg using PyO3.
//!
//! # Example
//!
//! ```python
//! import asyncio
//! from doc_to_jpg import DocConverter
//!
//! async def main():
//!     converter = DocConverter(pool_size=2)
//!
//!     report = await converter.convert_file("report.pdf", "./pages", resolution=200)
//!     print(f"Rendered {report.total_pages} pages")
//!
//!     report = await converter.convert_folder(
//!         "./scans", "./jpegs", wildcard="*.pdf", recurse_subfolders=True
//!     )
//!     if not report.succeeded:
//!         print(report.failure)
//!
//! asyncio.run(main())
//! ```

use doc_to_jpg_core::{
    BatchReport, ConversionError, Converter, ConverterConfig, FileResult, RenderSettings,
};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

/// Map library errors onto Python exceptions.
fn to_py_err(err: ConversionError) -> PyErr {
    match err {
        ConversionError::InvalidArgument(_) | ConversionError::InvalidConfig(_) => {
            PyValueError::new_err(err.to_string())
        }
        other => PyRuntimeError::new_err(other.to_string()),
    }
}

/// Python wrapper for FileResult.
#[pyclass(name = "FileResult")]
#[derive(Clone)]
pub struct PyFileResult {
    #[pyo3(get)]
    pub input_path: String,
    #[pyo3(get)]
    pub output_paths: Vec<String>,
    #[pyo3(get)]
    pub page_count: usize,
    #[pyo3(get)]
    pub source_deleted: bool,
    #[pyo3(get)]
    pub duration_secs: f64,
}

impl From<FileResult> for PyFileResult {
    fn from(r: FileResult) -> Self {
        Self {
            input_path: r.input_path.to_string_lossy().to_string(),
            output_paths: r
                .output_paths
                .iter()
                .map(|p| p.to_string_lossy().to_string())
                .collect(),
            page_count: r.page_count,
            source_deleted: r.source_deleted,
            duration_secs: r.duration.as_secs_f64(),
        }
    }
}

#[pymethods]
impl PyFileResult {
    fn __repr__(&self) -> String {
        format!(
            "FileResult(input='{}', pages={}, duration={:.2}s)",
            self.input_path, self.page_count, self.duration_secs
        )
    }
}

/// Python wrapper for BatchReport.
#[pyclass(name = "BatchReport")]
#[derive(Clone)]
pub struct PyBatchReport {
    #[pyo3(get)]
    pub converted: Vec<PyFileResult>,
    #[pyo3(get)]
    pub failure: Option<(String, String)>, // (path, error)
    #[pyo3(get)]
    pub skipped_dirs: Vec<String>,
    #[pyo3(get)]
    pub created_dirs: Vec<String>,
    #[pyo3(get)]
    pub total_pages: usize,
    #[pyo3(get)]
    pub total_duration_secs: f64,
}

impl From<BatchReport> for PyBatchReport {
    fn from(r: BatchReport) -> Self {
        let paths = |dirs: Vec<std::path::PathBuf>| {
            dirs.into_iter()
                .map(|p| p.to_string_lossy().to_string())
                .collect()
        };

        Self {
            converted: r.converted.into_iter().map(PyFileResult::from).collect(),
            failure: r
                .failure
                .map(|f| (f.input_path.to_string_lossy().to_string(), f.error)),
            skipped_dirs: paths(r.skipped_dirs),
            created_dirs: paths(r.created_dirs),
            total_pages: r.total_pages,
            total_duration_secs: r.total_duration.as_secs_f64(),
        }
    }
}

#[pymethods]
impl PyBatchReport {
    /// True when the batch ran to completion.
    #[getter]
    fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    fn __bool__(&self) -> bool {
        self.succeeded()
    }

    fn __repr__(&self) -> String {
        format!(
            "BatchReport(converted={}, pages={}, succeeded={}, duration={:.2}s)",
            self.converted.len(),
            self.total_pages,
            if self.succeeded() { "True" } else { "False" },
            self.total_duration_secs
        )
    }
}

/// Batch converter from PDF/PostScript documents to per-page JPEG files.
///
/// Ghostscript engines are started lazily on the first conversion and shared
/// by all concurrent calls on this object.
///
/// Args:
///     pool_size: Number of Ghostscript engines (default: CPU count)
///     ghostscript_path: Explicit path to the gs binary (default: search PATH)
///     conversion_timeout: Timeout per document in seconds (default: 120)
///
/// Example:
///     >>> converter = DocConverter(pool_size=4)
///     >>> report = await converter.convert_folder("./in", "./out")
#[pyclass(name = "DocConverter")]
pub struct PyDocConverter {
    converter: Arc<OnceCell<Converter>>,
    config: ConverterConfig,
}

impl PyDocConverter {
    async fn converter(cell: &OnceCell<Converter>, config: ConverterConfig) -> PyResult<&Converter> {
        cell.get_or_try_init(|| async move {
            debug!("Starting converter pool");
            Converter::new(config)
        })
        .await
        .map_err(to_py_err)
    }
}

/// Build render settings from optional Python keyword arguments.
fn settings_from(
    defaults: RenderSettings,
    resolution: Option<f64>,
    resolution_y: Option<f64>,
    graphics_smoothing: Option<i32>,
    text_smoothing: Option<i32>,
    quality: Option<i32>,
) -> PyResult<RenderSettings> {
    let mut settings = defaults;
    if let Some(x) = resolution {
        settings = settings.resolution(x, resolution_y.unwrap_or(x));
    } else if let Some(y) = resolution_y {
        settings.resolution_y = y;
    }
    settings = settings.smoothing(
        graphics_smoothing.unwrap_or(settings.graphics_smoothing),
        text_smoothing.unwrap_or(settings.text_smoothing),
    );
    if let Some(q) = quality {
        settings = settings.quality(q);
    }
    settings.validate().map_err(to_py_err)?;
    Ok(settings)
}

#[pymethods]
impl PyDocConverter {
    #[new]
    #[pyo3(signature = (pool_size=None, ghostscript_path=None, conversion_timeout=None))]
    fn new(
        pool_size: Option<usize>,
        ghostscript_path: Option<String>,
        conversion_timeout: Option<u64>,
    ) -> PyResult<Self> {
        let mut config = ConverterConfig::default();
        if let Some(size) = pool_size {
            config.pool.pool_size = size;
        }
        if let Some(path) = ghostscript_path {
            config.pool.ghostscript_path = Some(path.into());
        }
        if let Some(timeout) = conversion_timeout {
            config.pool.conversion_timeout = Duration::from_secs(timeout);
        }

        config.validate().map_err(to_py_err)?;

        Ok(Self {
            converter: Arc::new(OnceCell::new()),
            config,
        })
    }

    /// Convert a single document to `<base>_pNNN.jpg` files.
    ///
    /// Args:
    ///     source_path: Path to the input document
    ///     output_dir: Directory receiving the page JPEGs (created if missing)
    ///     resolution: Horizontal DPI (default: 150); also vertical unless resolution_y is given
    ///     resolution_y: Vertical DPI
    ///     graphics_smoothing: Graphics anti-aliasing, 1, 2 or 4
    ///     text_smoothing: Text anti-aliasing, 1, 2 or 4
    ///     quality: JPEG quality 0-100
    ///
    /// Returns:
    ///     BatchReport describing the conversion
    ///
    /// Raises:
    ///     ValueError: if a parameter is out of range
    #[pyo3(signature = (
        source_path,
        output_dir,
        resolution=None,
        resolution_y=None,
        graphics_smoothing=None,
        text_smoothing=None,
        quality=None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn convert_file<'py>(
        &self,
        py: Python<'py>,
        source_path: String,
        output_dir: String,
        resolution: Option<f64>,
        resolution_y: Option<f64>,
        graphics_smoothing: Option<i32>,
        text_smoothing: Option<i32>,
        quality: Option<i32>,
    ) -> PyResult<Bound<'py, PyAny>> {
        let settings = settings_from(
            self.config.defaults,
            resolution,
            resolution_y,
            graphics_smoothing,
            text_smoothing,
            quality,
        )?;
        let cell = Arc::clone(&self.converter);
        let config = self.config.clone();

        pyo3_async_runtimes::tokio::future_into_py(py, async move {
            let converter = Self::converter(&cell, config).await?;
            let request = converter
                .file_request(source_path, output_dir)
                .with_settings(settings);
            let report = converter.convert_file(&request).await.map_err(to_py_err)?;
            Ok(PyBatchReport::from(report))
        })
    }

    /// Convert every matching document below a folder.
    ///
    /// Args:
    ///     source_dir: Folder to scan
    ///     target_dir: Output root; equal to source_dir writes pages next to their sources
    ///     wildcard: File name pattern, `*` and `?` supported (default: "*.pdf")
    ///     delete_sources: Delete each document once its pages are written
    ///     recurse_subfolders: Descend into subfolders, mirroring them under target_dir
    ///     resolution, resolution_y, graphics_smoothing, text_smoothing, quality:
    ///         as for convert_file
    ///
    /// Returns:
    ///     BatchReport; `succeeded` is False when the batch stopped early
    ///
    /// Raises:
    ///     ValueError: if a parameter or the wildcard is invalid
    #[pyo3(signature = (
        source_dir,
        target_dir,
        wildcard=None,
        delete_sources=false,
        recurse_subfolders=false,
        resolution=None,
        resolution_y=None,
        graphics_smoothing=None,
        text_smoothing=None,
        quality=None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn convert_folder<'py>(
        &self,
        py: Python<'py>,
        source_dir: String,
        target_dir: String,
        wildcard: Option<String>,
        delete_sources: bool,
        recurse_subfolders: bool,
        resolution: Option<f64>,
        resolution_y: Option<f64>,
        graphics_smoothing: Option<i32>,
        text_smoothing: Option<i32>,
        quality: Option<i32>,
    ) -> PyResult<Bound<'py, PyAny>> {
        let settings = settings_from(
            self.config.defaults,
            resolution,
            resolution_y,
            graphics_smoothing,
            text_smoothing,
            quality,
        )?;
        let wildcard = wildcard.unwrap_or_else(|| "*.pdf".to_string());
        doc_to_jpg_core::Wildcard::new(&wildcard).map_err(to_py_err)?;
        let cell = Arc::clone(&self.converter);
        let config = self.config.clone();

        pyo3_async_runtimes::tokio::future_into_py(py, async move {
            let converter = Self::converter(&cell, config).await?;
            let request = converter
                .folder_request(source_dir, target_dir)
                .wildcard(wildcard)
                .delete_sources(delete_sources)
                .recurse_subfolders(recurse_subfolders)
                .with_settings(settings);
            let report = converter
                .convert_folder(&request)
                .await
                .map_err(to_py_err)?;
            Ok(PyBatchReport::from(report))
        })
    }

    /// Get health information about the engine pool.
    fn health(&self) -> String {
        match self.converter.get() {
            Some(converter) => {
                let health = converter.health();
                format!(
                    "Pool: {}/{} idle, {} batches started, shutdown={}",
                    health.idle, health.pool_size, health.total_checkouts, health.is_shutdown
                )
            }
            None => "Not initialized".to_string(),
        }
    }

    /// Shutdown the converter; later conversions raise RuntimeError.
    fn shutdown(&self) {
        if let Some(converter) = self.converter.get() {
            converter.shutdown();
        }
    }

    /// Get the configured pool size.
    #[getter]
    fn pool_size(&self) -> usize {
        self.config.pool.pool_size
    }

    fn __repr__(&self) -> String {
        format!(
            "DocConverter(pool_size={}, timeout={}s)",
            self.config.pool.pool_size,
            self.config.pool.conversion_timeout.as_secs()
        )
    }
}

/// Check if Ghostscript is installed and available.
#[pyfunction]
fn is_ghostscript_available() -> bool {
    doc_to_jpg_core::is_ghostscript_available()
}

/// Get the list of supported file extensions.
#[pyfunction]
fn supported_extensions() -> Vec<&'static str> {
    doc_to_jpg_core::SUPPORTED_EXTENSIONS.to_vec()
}

/// Check if a file extension is supported.
#[pyfunction]
fn is_supported_extension(ext: &str) -> bool {
    doc_to_jpg_core::is_supported_extension(ext)
}

/// Initialize logging for the library.
#[pyfunction]
fn init_logging() {
    doc_to_jpg_core::init_logging();
}

/// Python module definition.
#[pymodule]
fn doc_to_jpg(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyDocConverter>()?;
    m.add_class::<PyFileResult>()?;
    m.add_class::<PyBatchReport>()?;

    m.add_function(wrap_pyfunction!(is_ghostscript_available, m)?)?;
    m.add_function(wrap_pyfunction!(supported_extensions, m)?)?;
    m.add_function(wrap_pyfunction!(is_supported_extension, m)?)?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;

    Ok(())
}
