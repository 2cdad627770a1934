//! Test doubles shared by the unit tests.

use crate::config::RenderSettings;
use crate::engine::RasterEngine;
use crate::error::{ConversionError, Result};
use crate::naming::base_name;
use crate::walker::CancelFlag;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};

/// Engine that writes `<pattern with %d>` files the way Ghostscript does.
#[derive(Debug, Default)]
pub struct FakeEngine {
    /// Pages written for documents without an entry in `pages`.
    pub default_pages: usize,
    /// Page count per base name.
    pub pages: HashMap<String, usize>,
    /// Base names whose conversion fails.
    pub failing: HashSet<String>,
    /// Counter of the first page written.
    pub first_counter: u64,
    /// Sources passed to `convert`, in call order.
    pub calls: Vec<PathBuf>,
    /// Cancel the flag once this many calls were made.
    pub cancel_after: Option<(usize, CancelFlag)>,
    /// Settings of the most recent call.
    pub last_settings: Option<RenderSettings>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            default_pages: 1,
            first_counter: 1,
            ..Default::default()
        }
    }

    pub fn with_pages(mut self, base: &str, pages: usize) -> Self {
        self.pages.insert(base.to_string(), pages);
        self
    }

    pub fn failing_on(mut self, base: &str) -> Self {
        self.failing.insert(base.to_string());
        self
    }

    fn render(&mut self, source: &Path, pattern: &Path, settings: &RenderSettings) -> Result<()> {
        self.calls.push(source.to_path_buf());
        self.last_settings = Some(*settings);
        if let Some((after, flag)) = &self.cancel_after {
            if self.calls.len() >= *after {
                flag.cancel();
            }
        }

        let base = base_name(source);
        if self.failing.contains(&base) {
            return Err(ConversionError::ConversionFailed {
                path: source.to_path_buf(),
                message: "renderer reported failure".to_string(),
            });
        }

        let pages = self.pages.get(&base).copied().unwrap_or(self.default_pages);
        let pattern = pattern.to_string_lossy();
        for page in 0..pages {
            let counter = self.first_counter + page as u64;
            let path = pattern.replace("%d", &counter.to_string());
            std::fs::write(&path, format!("{} page {}", base, page + 1))
                .map_err(|e| ConversionError::io(&path, e))?;
        }
        Ok(())
    }
}

impl RasterEngine for FakeEngine {
    fn convert(
        &mut self,
        source: &Path,
        output_pattern: &Path,
        settings: &RenderSettings,
    ) -> impl Future<Output = Result<()>> + Send {
        std::future::ready(self.render(source, output_pattern, settings))
    }
}

/// Create `path` (and its parents) with PDF-looking contents.
pub fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, "%PDF-1.4").unwrap();
}
