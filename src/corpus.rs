//! Corpus document store.
//!
//! Walks the configured corpus root, selects files with include/exclude
//! globs, and turns each file into a [`Document`] whose id is its path
//! relative to the root. PDFs are run through `pdf-extract`; every other
//! file is read as UTF-8.
//!
//! PDF extraction is slow, so extracted text can be cached on disk under
//! `<cache_dir>/<sha256 of file bytes>.txt`. A changed file hashes
//! differently and is extracted again.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use context_bench_core::error::BenchError;

use crate::config::CorpusConfig;
use crate::models::Document;

/// Supported content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Pdf,
    Text,
}

impl ContentKind {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("pdf") => ContentKind::Pdf,
            _ => ContentKind::Text,
        }
    }
}

/// Loaded, immutable corpus.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    documents: Vec<Document>,
    skipped: Vec<(String, String)>,
}

impl DocumentStore {
    /// Scan and load the corpus described by `config`.
    ///
    /// Unreadable or unextractable files are skipped with a warning. An
    /// empty corpus is an error.
    pub fn load(config: &CorpusConfig) -> Result<Self> {
        let root = &config.root;
        if !root.exists() {
            bail!("Corpus root does not exist: {}", root.display());
        }

        if let Some(dir) = &config.cache_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create cache dir: {}", dir.display()))?;
        }

        let files = scan_corpus(config)?;
        let mut documents = Vec::with_capacity(files.len());
        let mut skipped = Vec::new();

        for (path, id) in files {
            match load_text(&path, config.cache_dir.as_deref()) {
                Ok(text) if text.trim().is_empty() => {
                    tracing::warn!("Skipping {}: no text extracted", id);
                    skipped.push((id, "no text extracted".to_string()));
                }
                Ok(text) => {
                    tracing::debug!("Loaded {} ({} bytes of text)", id, text.len());
                    documents.push(Document::new(id, text));
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {:#}", id, e);
                    skipped.push((id, format!("{:#}", e)));
                }
            }
        }

        if documents.is_empty() {
            return Err(BenchError::InvalidParameter(format!(
                "no documents could be loaded from {}",
                root.display()
            ))
            .into());
        }

        tracing::info!(
            "Loaded {} documents from {} ({} skipped)",
            documents.len(),
            root.display(),
            skipped.len()
        );

        Ok(Self {
            documents,
            skipped,
        })
    }

    /// Documents sorted by id.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// `(id, reason)` for every file that was matched but not loaded.
    pub fn skipped(&self) -> &[(String, String)] {
        &self.skipped
    }

    pub fn total_words(&self) -> usize {
        self.documents.iter().map(Document::word_count).sum()
    }
}

/// Return `(absolute path, relative id)` for every matching file, sorted by id.
pub fn scan_corpus(config: &CorpusConfig) -> Result<Vec<(PathBuf, String)>> {
    // Canonical forms so `./docs` and `docs/.cache` compare as nested.
    let root = std::fs::canonicalize(&config.root)
        .with_context(|| format!("Failed to resolve corpus root: {}", config.root.display()))?;
    let cache = config
        .cache_dir
        .as_ref()
        .and_then(|dir| std::fs::canonicalize(dir).ok());
    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut files = Vec::new();
    let walker = WalkDir::new(&root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(&root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }
        if let Some(cache) = &cache {
            if path.starts_with(cache) {
                continue;
            }
        }

        files.push((path.to_path_buf(), rel_str));
    }

    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

fn load_text(path: &Path, cache_dir: Option<&Path>) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    match ContentKind::from_path(path) {
        ContentKind::Text => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        ContentKind::Pdf => match cache_dir {
            Some(dir) => {
                let cache_file = dir.join(format!("{}.txt", content_hash(&bytes)));
                if let Ok(cached) = std::fs::read_to_string(&cache_file) {
                    tracing::debug!("Cache hit for {}", path.display());
                    return Ok(cached);
                }
                let text = extract_pdf(&bytes)?;
                if let Err(e) = std::fs::write(&cache_file, &text) {
                    tracing::warn!("Could not write cache file {}: {}", cache_file.display(), e);
                }
                Ok(text)
            }
            None => extract_pdf(&bytes),
        },
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| anyhow::anyhow!("PDF extraction failed: {}", e))
}

/// SHA-256 of file bytes, hex-encoded.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
