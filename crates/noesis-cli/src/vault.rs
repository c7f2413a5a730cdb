//! Markdown vault scanning.

use std::path::Path;

use noesis_core::DocumentEvent;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Markdown files under `root`, as events with vault-relative `/` paths,
/// sorted by path. Hidden files and directories are skipped; unreadable
/// files are logged and skipped.
pub fn scan(root: &Path) -> Vec<DocumentEvent> {
    let mut events: Vec<DocumentEvent> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable vault entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file() && is_markdown(e.path()))
        .filter_map(|entry| {
            let path = relative_path(root, entry.path())?;
            match std::fs::read_to_string(entry.path()) {
                Ok(content) => Some(DocumentEvent::Created { path, content }),
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Skipping unreadable document");
                    None
                }
            }
        })
        .collect();

    events.sort_by(|a, b| a.path().cmp(b.path()));
    debug!(root = %root.display(), documents = events.len(), "Scanned vault");
    events
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_finds_markdown_only() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("notes/deep")).unwrap();
        fs::create_dir_all(root.join(".obsidian")).unwrap();
        fs::write(root.join("index.md"), "# Index").unwrap();
        fs::write(root.join("notes/deep/rust.MD"), "Ownership.").unwrap();
        fs::write(root.join("notes/image.png"), [0u8, 1, 2]).unwrap();
        fs::write(root.join(".obsidian/workspace.md"), "hidden").unwrap();

        let events = scan(root);
        let paths: Vec<&str> = events.iter().map(|e| e.path()).collect();
        assert_eq!(paths, vec!["index.md", "notes/deep/rust.MD"]);
        assert_eq!(events[1].content(), "Ownership.");
    }
}
