//! Bulk loader: mirrors a directory on disk into a content tree.
//!
//! Plain text files become plain text documents holding one text line with a
//! single text block per line of the file. Other files become rich text or
//! generic documents without content. Hidden entries are skipped.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::models::{ContentTree, DocumentFormat, NodeId, NodeKind};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub folders: usize,
    pub documents: usize,
    pub lines: usize,
    pub skipped: usize,
}

/// Document flavour and MIME type for a file name.
pub fn classify(path: &Path) -> (DocumentFormat, &'static str) {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "txt" | "text" | "log" | "csv" => (DocumentFormat::PlainText, "text/plain"),
        "md" | "markdown" => (DocumentFormat::PlainText, "text/markdown"),
        "rtf" => (DocumentFormat::RichText, "application/rtf"),
        "html" | "htm" => (DocumentFormat::RichText, "text/html"),
        "odt" => (DocumentFormat::RichText, "application/vnd.oasis.opendocument.text"),
        "docx" => (
            DocumentFormat::RichText,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ),
        "pdf" => (DocumentFormat::Generic, "application/pdf"),
        _ => (DocumentFormat::Generic, "application/octet-stream"),
    }
}

/// Imports the contents of `dir` under the folder `parent`.
pub fn import_directory(tree: &mut ContentTree, parent: NodeId, dir: &Path) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();
    import_into(tree, parent, dir, &mut summary)?;
    info!(
        folders = summary.folders,
        documents = summary.documents,
        lines = summary.lines,
        skipped = summary.skipped,
        "Imported {}",
        dir.display()
    );
    Ok(summary)
}

fn import_into(
    tree: &mut ContentTree,
    parent: NodeId,
    dir: &Path,
    summary: &mut ImportSummary,
) -> Result<()> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            warn!("Skipping non-UTF-8 name {}", path.display());
            summary.skipped += 1;
            continue;
        };
        if name.starts_with('.') {
            summary.skipped += 1;
            continue;
        }

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            let folder = tree.create_folder(parent, &name)?;
            summary.folders += 1;
            import_into(tree, folder, &path, summary)?;
        } else if file_type.is_file() {
            import_file(tree, parent, &path, &name, summary)?;
        } else {
            debug!("Skipping special file {}", path.display());
            summary.skipped += 1;
        }
    }
    Ok(())
}

fn import_file(
    tree: &mut ContentTree,
    parent: NodeId,
    path: &Path,
    name: &str,
    summary: &mut ImportSummary,
) -> Result<()> {
    let (format, mime_type) = classify(path);
    let text = match format {
        DocumentFormat::PlainText => match fs::read_to_string(path) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Importing {} without content: {}", path.display(), e);
                None
            }
        },
        _ => None,
    };

    let format = match (format, &text) {
        (DocumentFormat::PlainText, None) => DocumentFormat::Generic,
        (format, _) => format,
    };
    let kind = NodeKind::Document {
        mime_type: mime_type.to_string(),
        format,
    };
    let document = tree.create_node(parent, kind, Some(name))?;
    summary.documents += 1;

    if let Some(text) = text {
        for line in text.lines() {
            let text_line = tree.create_text_line(document)?;
            tree.create_text_block(text_line, Some(line))?;
            summary.lines += 1;
        }
    }
    Ok(())
}

/// Adds the root folder and every boundary below it. Returns the number of
/// objects stored.
pub fn add_all(tree: &mut ContentTree) -> crate::Result<usize> {
    let root = tree.root();
    let mut count = tree.add(root)?;
    for id in tree.subtree(root)? {
        if id != root && tree.is_boundary(id)? {
            count += tree.add(id)?;
        }
    }
    Ok(count)
}
