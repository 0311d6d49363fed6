//! Expand tags in markdown documents on disk.
//!
//! This is the CLI's stand-in for a host preprocessor: it reads markdown
//! files, runs them through a [`TagRegistry`], and writes the result to an
//! output directory that mirrors the source layout.
//!
//! ```text
//! posts/                     dist/
//! ├── trip.md        →       ├── trip.md     (or trip.html with --html)
//! └── 2020/                  └── 2020/
//!     └── winter.md  →           └── winter.md
//! ```
//!
//! With `html` enabled the expanded markdown is rendered with pulldown-cmark.
//! Gallery HTML passes through untouched as a raw HTML block.

use crate::config::ConfigLookup;
use crate::hooks::{HookError, TagRegistry};
use pulldown_cmark::{Options, Parser, html as md_html};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ExpandError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("{path}: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: HookError,
    },
}

/// One processed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedFile {
    /// Source path relative to the source root.
    pub source: PathBuf,
    /// Output path relative to the output root.
    pub output: PathBuf,
    /// Number of tags replaced.
    pub tags: usize,
}

/// Render markdown to an HTML fragment.
pub fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, Options::all());
    let mut body = String::new();
    md_html::push_html(&mut body, parser);
    body
}

/// Collect markdown files under `source`, sorted by path.
///
/// A file path yields just that file. The `exclude` directory is not
/// descended into, so an output directory nested in the source tree is
/// never read back as input.
pub fn find_documents(source: &Path, exclude: Option<&Path>) -> Result<Vec<PathBuf>, ExpandError> {
    if source.is_file() {
        return Ok(vec![source.to_path_buf()]);
    }
    let exclude = exclude.and_then(|dir| fs::canonicalize(dir).ok());
    let walker = WalkDir::new(source)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let skip = entry.depth() > 0
                && entry.file_type().is_dir()
                && exclude.as_deref().is_some_and(|dir| {
                    fs::canonicalize(entry.path()).is_ok_and(|path| path.as_path() == dir)
                });
            !skip
        });

    let mut docs = Vec::new();
    for entry in walker {
        let entry = entry?;
        let is_md = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("md"));
        if entry.file_type().is_file() && is_md {
            docs.push(entry.into_path());
        }
    }
    Ok(docs)
}

/// Expand every document under `source` into `output`.
///
/// Stops at the first failing document; files already written stay written.
pub fn expand_path(
    source: &Path,
    output: &Path,
    registry: &TagRegistry,
    config: &dyn ConfigLookup,
    html: bool,
) -> Result<Vec<ExpandedFile>, ExpandError> {
    let root = if source.is_file() {
        source.parent().unwrap_or(Path::new(""))
    } else {
        source
    };

    let mut results = Vec::new();
    for path in find_documents(source, Some(output))? {
        let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
        let text = fs::read_to_string(&path)?;
        let expansion = registry
            .expand(&text, config)
            .map_err(|source| ExpandError::Document {
                path: relative.clone(),
                source,
            })?;

        let (out_rel, body) = if html {
            (
                relative.with_extension("html"),
                markdown_to_html(&expansion.text),
            )
        } else {
            (relative.clone(), expansion.text)
        };

        let out_path = output.join(&out_rel);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&out_path, body)?;
        info!(source = %relative.display(), tags = expansion.expanded, "expanded");

        results.push(ExpandedFile {
            source: relative,
            output: out_rel,
            tags: expansion.expanded,
        });
    }
    Ok(results)
}
