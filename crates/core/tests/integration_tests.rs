//! Integration tests for doc-to-jpg-core.
//!
//! Most tests drive the converter with a scripted engine that writes page
//! files the way Ghostscript does. The tests at the bottom require
//! Ghostscript (`gs` in PATH) and skip themselves otherwise.
//!
//! Run with: cargo test --package doc-to-jpg-core --test integration_tests

use doc_to_jpg_core::{
    config::{ConversionRequest, ConverterConfig, FolderRequest, RenderSettings},
    converter::Converter,
    engine::RasterEngine,
    error::{ConversionError, Result},
    pool::ConverterPool,
    walker::CancelFlag,
};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Engine that writes `<pattern with %d>` files, one per scripted page.
#[derive(Debug, Clone, Default)]
struct ScriptedEngine {
    /// Page count per file name; unknown files get one page.
    pages: HashMap<String, usize>,
    /// File name whose conversion fails.
    fail_on: Option<String>,
    /// Simulated render time.
    delay: Duration,
    /// Conversions started across all clones.
    started: Arc<AtomicUsize>,
}

impl ScriptedEngine {
    fn pages(mut self, file_name: &str, pages: usize) -> Self {
        self.pages.insert(file_name.to_string(), pages);
        self
    }

    fn fail_on(mut self, file_name: &str) -> Self {
        self.fail_on = Some(file_name.to_string());
        self
    }

    fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl RasterEngine for ScriptedEngine {
    fn convert(
        &mut self,
        source: &Path,
        output_pattern: &Path,
        _settings: &RenderSettings,
    ) -> impl Future<Output = Result<()>> + Send {
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let pages = self.pages.get(&file_name).copied().unwrap_or(1);
        let fails = self.fail_on.as_deref() == Some(file_name.as_str());
        let pattern = output_pattern.to_string_lossy().into_owned();
        let source = source.to_path_buf();
        let delay = self.delay;
        self.started.fetch_add(1, Ordering::SeqCst);

        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if fails {
                return Err(ConversionError::ConversionFailed {
                    path: source,
                    message: "Unrecoverable error, exit code 1".to_string(),
                });
            }
            for page in 1..=pages {
                let path = pattern.replace("%d", &page.to_string());
                tokio::fs::write(&path, b"\xFF\xD8\xFF")
                    .await
                    .map_err(|e| ConversionError::io(&path, e))?;
            }
            Ok(())
        }
    }
}

fn write_doc(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"%PDF-1.4\n%%EOF\n").unwrap();
}

fn converter_with(engines: Vec<ScriptedEngine>) -> Converter<ScriptedEngine> {
    let pool = ConverterPool::from_engines(engines).unwrap();
    Converter::with_pool(pool, ConverterConfig::default())
}

/// Sorted file names directly inside `dir`.
fn names_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ============================================================================
// Folder Conversion Tests
// ============================================================================

#[tokio::test]
async fn test_folder_in_place_keeps_sources() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    write_doc(&dir.join("doc1.pdf"));
    write_doc(&dir.join("doc2.pdf"));

    let converter = converter_with(vec![ScriptedEngine::default().pages("doc1.pdf", 2)]);
    let report = converter
        .convert_folder(&FolderRequest::new(dir, dir))
        .await
        .unwrap();

    assert!(report.succeeded());
    assert_eq!(report.total_pages, 3);
    assert_eq!(
        names_in(dir),
        vec![
            "doc1.pdf",
            "doc1_p001.jpg",
            "doc1_p002.jpg",
            "doc2.pdf",
            "doc2_p001.jpg"
        ]
    );
}

#[tokio::test]
async fn test_folder_mirror_with_delete_and_recursion() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src");
    let target = temp.path().join("dst");
    write_doc(&source.join("top.pdf"));
    write_doc(&source.join("a/inner.pdf"));
    write_doc(&source.join("a/b/deep.pdf"));
    std::fs::write(source.join("a/notes.txt"), "keep me").unwrap();

    let converter = converter_with(vec![ScriptedEngine::default().pages("deep.pdf", 12)]);
    let request = FolderRequest::new(&source, &target)
        .delete_sources(true)
        .recurse_subfolders(true);
    let report = converter.convert_folder(&request).await.unwrap();

    assert!(report.succeeded());
    assert_eq!(report.converted.len(), 3);
    assert!(report.converted.iter().all(|f| f.source_deleted));
    assert!(target.join("top_p001.jpg").exists());
    assert!(target.join("a/inner_p001.jpg").exists());
    assert!(target.join("a/b/deep_p012.jpg").exists());
    assert!(!target.join("a/b/deep-1.jpg").exists());

    assert!(!source.join("top.pdf").exists());
    assert!(!source.join("a/b/deep.pdf").exists());
    assert!(source.join("a/notes.txt").exists());
    assert!(!target.join("a/notes.txt").exists());
}

#[tokio::test]
async fn test_folder_wildcard_is_case_insensitive() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    write_doc(&dir.join("UPPER.PDF"));
    write_doc(&dir.join("scan.ps"));

    let converter = converter_with(vec![ScriptedEngine::default()]);
    let pdf_only = converter
        .convert_folder(&FolderRequest::new(dir, dir).wildcard("*.pdf"))
        .await
        .unwrap();
    assert_eq!(pdf_only.converted.len(), 1);
    assert!(dir.join("UPPER_p001.jpg").exists());
    assert!(!dir.join("scan_p001.jpg").exists());

    let ps_only = converter
        .convert_folder(&FolderRequest::new(dir, dir).wildcard("*.ps"))
        .await
        .unwrap();
    assert_eq!(ps_only.converted.len(), 1);
    assert!(dir.join("scan_p001.jpg").exists());
}

#[tokio::test]
async fn test_folder_stops_at_first_failure() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("in");
    let target = temp.path().join("out");
    write_doc(&source.join("a.pdf"));
    write_doc(&source.join("b.pdf"));
    write_doc(&source.join("c.pdf"));

    let converter = converter_with(vec![ScriptedEngine::default().fail_on("b.pdf")]);
    let report = converter
        .convert_folder(&FolderRequest::new(&source, &target).delete_sources(true))
        .await
        .unwrap();

    assert!(!report.succeeded());
    let failure = report.failure.as_ref().unwrap();
    assert_eq!(failure.input_path.file_name().unwrap(), "b.pdf");
    assert!(failure.error.contains("exit code 1"));

    assert_eq!(report.converted.len(), 1);
    assert!(!source.join("a.pdf").exists());
    assert!(source.join("b.pdf").exists());
    assert!(source.join("c.pdf").exists());
    assert!(!target.join("c_p001.jpg").exists());
}

#[tokio::test]
async fn test_folder_cancelled_before_start() {
    let temp = TempDir::new().unwrap();
    write_doc(&temp.path().join("a.pdf"));

    let converter = converter_with(vec![ScriptedEngine::default()]);
    let cancel = CancelFlag::new();
    cancel.cancel();
    let report = converter
        .convert_folder_with_cancel(&FolderRequest::new(temp.path(), temp.path()), &cancel)
        .await
        .unwrap();

    assert!(!report.succeeded());
    assert!(report.failure.unwrap().error.contains("cancelled"));
    assert!(report.converted.is_empty());
}

#[tokio::test]
async fn test_folder_invalid_parameters() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("out");
    let converter = converter_with(vec![ScriptedEngine::default()]);

    let request = FolderRequest::new(temp.path(), &target)
        .with_settings(RenderSettings::default().resolution(0.0, 150.0));
    let result = converter.convert_folder(&request).await;

    assert!(matches!(result, Err(ConversionError::InvalidArgument(_))));
    assert!(!target.exists());
}

// ============================================================================
// Single File Tests
// ============================================================================

#[tokio::test]
async fn test_single_file_into_new_directory() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("manual.pdf");
    let output = temp.path().join("pages/manual");
    write_doc(&source);

    let converter = converter_with(vec![ScriptedEngine::default().pages("manual.pdf", 4)]);
    let report = converter
        .convert_file(&ConversionRequest::new(&source, &output))
        .await
        .unwrap();

    assert!(report.succeeded());
    assert_eq!(report.created_dirs, vec![output.clone()]);
    assert_eq!(
        names_in(&output),
        vec![
            "manual_p001.jpg",
            "manual_p002.jpg",
            "manual_p003.jpg",
            "manual_p004.jpg"
        ]
    );
}

#[tokio::test]
async fn test_single_file_missing_source() {
    let temp = TempDir::new().unwrap();
    let converter = converter_with(vec![ScriptedEngine::default()]);

    let report = converter
        .convert_file(&ConversionRequest::new(temp.path().join("ghost.pdf"), temp.path()))
        .await
        .unwrap();

    assert!(!report.succeeded());
    assert_eq!(converter.health().idle, 1);
}

// ============================================================================
// Pool Sharing Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_batches_bounded_by_pool() {
    let temp = TempDir::new().unwrap();
    let engine = ScriptedEngine::default().delay(Duration::from_millis(20));
    let started = Arc::clone(&engine.started);
    let converter = converter_with(vec![engine.clone(), engine]);

    let mut handles = Vec::new();
    for i in 0..6 {
        let dir = temp.path().join(format!("batch{}", i));
        write_doc(&dir.join(format!("doc{}.pdf", i)));
        let converter = converter.clone();
        handles.push(tokio::spawn(async move {
            converter
                .convert_folder(&FolderRequest::new(&dir, &dir))
                .await
        }));
    }

    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        assert!(report.succeeded());
        assert_eq!(report.total_pages, 1);
    }

    let health = converter.health();
    assert_eq!(health.pool_size, 2);
    assert_eq!(health.idle, 2);
    assert_eq!(health.total_checkouts, 6);
    assert_eq!(started.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn test_shutdown_rejects_work() {
    let temp = TempDir::new().unwrap();
    let converter = converter_with(vec![ScriptedEngine::default()]);
    converter.shutdown();

    let result = converter
        .convert_file(&ConversionRequest::new(temp.path().join("a.pdf"), temp.path()))
        .await;
    assert!(matches!(result, Err(ConversionError::PoolShutdown)));
}

// ============================================================================
// Ghostscript Tests
// ============================================================================

/// Minimal two-page PDF.
const TWO_PAGE_PDF: &str = "%PDF-1.4
1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj
2 0 obj << /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 >> endobj
3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 200 200] >> endobj
4 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 200 200] >> endobj
trailer << /Root 1 0 R >>
%%EOF
";

/// Skip test if Ghostscript is not available
macro_rules! require_ghostscript {
    () => {
        if !doc_to_jpg_core::is_ghostscript_available() {
            eprintln!("Skipping test: Ghostscript not found");
            return;
        }
    };
}

#[tokio::test]
async fn test_ghostscript_converts_two_pages() {
    require_ghostscript!();

    let temp = TempDir::new().unwrap();
    let source = temp.path().join("two.pdf");
    std::fs::write(&source, TWO_PAGE_PDF).unwrap();
    let output: PathBuf = temp.path().join("out");

    let converter = Converter::new(ConverterConfig::new(1, 72.0)).unwrap();
    let request = converter.file_request(&source, &output);
    let report = converter.convert_file(&request).await.unwrap();

    assert!(report.succeeded(), "Conversion failed: {:?}", report.failure);
    assert_eq!(names_in(&output), vec!["two_p001.jpg", "two_p002.jpg"]);

    let jpeg = std::fs::read(output.join("two_p001.jpg")).unwrap();
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn test_ghostscript_rejects_corrupt_document() {
    require_ghostscript!();

    let temp = TempDir::new().unwrap();
    let source = temp.path().join("corrupt.pdf");
    std::fs::write(&source, "this is not a pdf").unwrap();

    let converter = Converter::new(ConverterConfig::new(1, 72.0)).unwrap();
    let request = converter.file_request(&source, temp.path());
    let report = converter.convert_file(&request).await.unwrap();

    assert!(!report.succeeded());
}
