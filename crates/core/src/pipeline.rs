//! Batch rendering of source trees into code cards.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::highlight::tokenize;
use crate::render::{render_ansi, AnsiOptions, CodeCard, Palette};

/// Output format for [`render_file`] and [`render_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFormat {
    Html,
    Ansi,
}

impl RenderFormat {
    pub fn extension(self) -> &'static str {
        match self {
            RenderFormat::Html => "html",
            RenderFormat::Ansi => "ansi",
        }
    }
}

/// Configuration for batch rendering.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Extension of the files to pick up, without the dot.
    pub extension: String,
    pub format: RenderFormat,
    pub palette: Palette,
    pub gutter: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            extension: "py".to_string(),
            format: RenderFormat::Html,
            palette: Palette::default(),
            gutter: true,
        }
    }
}

/// One rendered source file.
#[derive(Debug)]
pub struct RenderedFile {
    pub output: String,
    pub lines: usize,
    pub tokens: usize,
}

/// Counts from a batch run.
#[derive(Debug, Default, Serialize)]
pub struct RenderSummary {
    pub files: usize,
    pub rendered: usize,
    pub failed: usize,
    pub lines: usize,
    pub tokens: usize,
}

/// Discover all files with `extension` under `root`, sorted.
pub fn discover_source_files(root: &Path, extension: &str) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == extension))
        .map(|e| e.path().to_path_buf())
        .collect();
    paths.sort();
    paths
}

/// Render one file. Invalid UTF-8 is replaced rather than rejected.
pub fn render_file(path: &Path, config: &RenderConfig) -> io::Result<RenderedFile> {
    let bytes = std::fs::read(path)?;
    let source = String::from_utf8_lossy(&bytes);
    let tokens = tokenize(&source).len();
    let lines = source.split('\n').count();

    let output = match config.format {
        RenderFormat::Html => {
            let title = path.file_name().map(|n| n.to_string_lossy().to_string());
            let card = CodeCard {
                palette: config.palette,
                title,
                emphasized: Vec::new(),
            };
            card.to_html(&source)
        }
        RenderFormat::Ansi => {
            let options = AnsiOptions {
                palette: config.palette,
                gutter: config.gutter,
                emphasized: Vec::new(),
            };
            render_ansi(&source, &options)
        }
    };

    Ok(RenderedFile { output, lines, tokens })
}

/// Render every matching file under `root` into `out_dir` in parallel.
///
/// Output paths mirror the input tree with the format's extension appended,
/// e.g. `pkg/main.py` becomes `pkg/main.py.html`. A file that fails is
/// counted and logged; it does not stop the batch.
pub fn render_all(root: &Path, out_dir: &Path, config: &RenderConfig) -> Result<RenderSummary, Box<dyn std::error::Error>> {
    let files = discover_source_files(root, &config.extension);
    if files.is_empty() {
        return Err(format!("No .{} files found under {:?}", config.extension, root).into());
    }
    std::fs::create_dir_all(out_dir)?;

    let total_files = files.len();
    let processed_count = AtomicUsize::new(0);

    let results: Vec<Option<(usize, usize)>> = files
        .par_iter()
        .map(|path| {
            let result = render_one(root, out_dir, path, config);
            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
            if count % 100 == 0 || count == total_files {
                info!(count, total_files, "rendered files");
            }
            match result {
                Ok(file) => Some((file.lines, file.tokens)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to render");
                    None
                }
            }
        })
        .collect();

    let mut summary = RenderSummary {
        files: total_files,
        ..Default::default()
    };
    for result in results {
        match result {
            Some((lines, tokens)) => {
                summary.rendered += 1;
                summary.lines += lines;
                summary.tokens += tokens;
            }
            None => summary.failed += 1,
        }
    }
    Ok(summary)
}

/// Where the rendering of `path` goes: its path below `root`, moved under
/// `out_dir`, with the format's extension appended. A `root` that is the file
/// itself keeps just the file name.
fn output_path(root: &Path, out_dir: &Path, path: &Path, format: RenderFormat) -> PathBuf {
    let relative = match path.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel,
        _ => path.file_name().map_or(path, Path::new),
    };
    let mut target = out_dir.join(relative).into_os_string();
    target.push(".");
    target.push(format.extension());
    PathBuf::from(target)
}

fn render_one(root: &Path, out_dir: &Path, path: &Path, config: &RenderConfig) -> io::Result<RenderedFile> {
    let rendered = render_file(path, config)?;
    let target = output_path(root, out_dir, path, config.format);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&target, &rendered.output)?;
    Ok(rendered)
}
