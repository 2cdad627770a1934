//! # doc-to-jpg-core
//!
//! Batch conversion of PDF and PostScript documents into per-page JPEG files.
//!
//! Rendering is delegated to Ghostscript. This library provides:
//!
//! - a **pool** of reusable Ghostscript engines shared by concurrent batches
//! - a **directory walker** that converts every matching file, either next to
//!   its source or into a mirrored target tree
//! - **renumbering** of the renderer's `<base>-<n>.jpg` output into stable
//!   `<base>_p001.jpg`, `<base>_p002.jpg`, ... names
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doc_to_jpg_core::{ConversionRequest, Converter, ConverterConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Two Ghostscript engines rendering at 300 DPI
//!     let converter = Converter::new(ConverterConfig::new(2, 300.0))?;
//!
//!     let request = converter.file_request("report.pdf", "./pages");
//!     let report = converter.convert_file(&request).await?;
//!
//!     println!("Rendered {} pages", report.total_pages);
//!     Ok(())
//! }
//! ```
//!
//! ## Converting a Folder Tree
//!
//! ```rust,no_run
//! use doc_to_jpg_core::{Converter, ConverterBuilder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let converter = ConverterBuilder::new().resolution(200.0).quality(90).build()?;
//!
//!     let request = converter
//!         .folder_request("./scans", "./jpegs")
//!         .wildcard("*.pdf")
//!         .recurse_subfolders(true);
//!     let report = converter.convert_folder(&request).await?;
//!
//!     if let Some(failed) = &report.failure {
//!         eprintln!("Stopped at {}: {}", failed.input_path.display(), failed.error);
//!     }
//!     println!(
//!         "{} files, {} pages in {:?}",
//!         report.converted.len(),
//!         report.total_pages,
//!         report.total_duration
//!     );
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod converter;
pub mod engine;
pub mod error;
pub mod naming;
pub mod pool;
pub mod renumber;
pub mod walker;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use config::{
    BatchReport, ConversionRequest, ConverterConfig, FailedFile, FileResult, FolderRequest,
    PoolConfig, RenderSettings,
};
pub use converter::{Converter, ConverterBuilder, ConverterStats};
pub use engine::{GhostscriptEngine, RasterEngine};
pub use error::{ConversionError, Result};
pub use pool::{ConverterPool, PoolHealth, PooledEngine};
pub use walker::{CancelFlag, Wildcard};

/// Extensions Ghostscript renders directly.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "ps", "eps"];

/// Check if a file extension is supported.
pub fn is_supported_extension(ext: &str) -> bool {
    SUPPORTED_EXTENSIONS
        .iter()
        .any(|&e| e.eq_ignore_ascii_case(ext))
}

/// Check whether a Ghostscript binary can be found with default settings.
pub fn is_ghostscript_available() -> bool {
    GhostscriptEngine::find_ghostscript(&PoolConfig::default()).is_ok()
}

/// Initialize the library's logging.
/// Call this once at application startup if you want to see logs.
pub fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // A subscriber installed earlier by the host application wins.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init();
}
