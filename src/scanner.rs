use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::directory::DirectoryParser;
use crate::reconcile::{reconcile, BookRecord};
use crate::tags;

/// One audio file run through the full pipeline
#[derive(Debug, Clone, Serialize)]
pub struct ScannedBook {
    pub path: PathBuf,
    pub book: BookRecord,
    /// Records the decoder skipped, rendered for display
    pub issues: Vec<String>,
}

/// A file that could not be decoded
#[derive(Debug, Clone, Serialize)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Result of scanning a library; both lists are sorted by path
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanOutcome {
    pub books: Vec<ScannedBook>,
    pub failures: Vec<ScanFailure>,
}

/// Recursively find audio files under `root`, sorted by path
pub fn find_audio_files(root: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_audio_file(e.path(), extensions))
        .map(|e| e.into_path())
        .collect();

    // Sort by path for consistent output
    files.sort();
    files
}

/// Check if a path has one of the given extensions (case-insensitive)
pub fn is_audio_file(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext_lower))
        })
        .unwrap_or(false)
}

/// Path handed to the directory parser: the library folder's own name
/// followed by the file's path inside it.
pub fn library_path(root: &Path, path: &Path) -> String {
    let Ok(relative) = path.strip_prefix(root) else {
        return path.to_string_lossy().into_owned();
    };
    let root_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "library".to_string());

    Path::new(&root_name)
        .join(relative)
        .to_string_lossy()
        .into_owned()
}

/// Decode one file, parse its library path, and reconcile the two.
///
/// The file is closed before this returns.
pub fn process_file(root: &Path, path: &Path, parser: &DirectoryParser) -> Result<ScannedBook> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let size = file
        .metadata()
        .with_context(|| format!("Failed to stat {:?}", path))?
        .len();

    let mut reader = BufReader::new(file);
    let tag = tags::decode(&mut reader)
        .with_context(|| format!("Failed to read tags from {:?}", path))?;

    for issue in tag.issues() {
        debug!(path = %path.display(), %issue, "skipped record");
    }

    let dir = parser.parse(&library_path(root, path));
    let book = reconcile(&dir, &*tag, size, None);

    Ok(ScannedBook {
        path: path.to_path_buf(),
        book,
        issues: tag.issues().iter().map(ToString::to_string).collect(),
    })
}

/// Scan every audio file under `root`, decoding up to `workers` files at once.
///
/// Files that fail to decode are collected as failures rather than aborting
/// the scan.
pub async fn scan_library(
    root: PathBuf,
    parser: DirectoryParser,
    extensions: &[String],
    workers: usize,
) -> Result<ScanOutcome> {
    let files = find_audio_files(&root, extensions);
    info!(count = files.len(), root = %root.display(), "scanning library");

    let root = Arc::new(root);
    let parser = Arc::new(parser);
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks = JoinSet::new();

    for path in files {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .context("Worker pool closed")?;
        let root = Arc::clone(&root);
        let parser = Arc::clone(&parser);

        tasks.spawn_blocking(move || {
            let _permit = permit;
            let result = process_file(&root, &path, &parser);
            (path, result)
        });
    }

    let mut outcome = ScanOutcome::default();
    while let Some(joined) = tasks.join_next().await {
        let (path, result) = joined.context("Scan worker panicked")?;
        match result {
            Ok(book) => outcome.books.push(book),
            Err(e) => {
                warn!(path = %path.display(), "skipping file: {:#}", e);
                outcome.failures.push(ScanFailure {
                    path,
                    error: format!("{:#}", e),
                });
            }
        }
    }

    outcome.books.sort_by(|a, b| a.path.cmp(&b.path));
    outcome.failures.sort_by(|a, b| a.path.cmp(&b.path));
    info!(
        books = outcome.books.len(),
        failures = outcome.failures.len(),
        "scan finished"
    );

    Ok(outcome)
}
