//! Workspace root handling for file and execution tools.
//!
//! Every path a tool receives is resolved relative to the workspace root.
//! Anything that would land outside the root (absolute paths, `..` escapes,
//! symlinks pointing elsewhere) is rejected with a path violation.

use crate::error::ToolError;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// The directory tree the agent is allowed to touch.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    /// Entry names hidden from listings.
    excludes: Vec<String>,
}

impl Workspace {
    /// Create a workspace rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            excludes: vec!["__pycache__".to_string(), ".venv".to_string(), "venv".to_string()],
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root and the given subdirectories if they are missing.
    pub fn ensure_layout(&self, subdirs: &[&str]) -> std::io::Result<()> {
        fs::create_dir_all(&self.root)?;
        for dir in subdirs {
            fs::create_dir_all(self.root.join(dir))?;
        }
        Ok(())
    }

    /// Resolve a workspace-relative path to a full path inside the root.
    ///
    /// Nothing on disk is created or modified.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, ToolError> {
        let mut normalized = PathBuf::new();

        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => normalized.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(ToolError::PathViolation(relative.to_string()));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(ToolError::PathViolation(relative.to_string()));
                }
            }
        }

        let full_path = self.root.join(&normalized);

        if !self.is_within_root(&full_path) {
            return Err(ToolError::PathViolation(relative.to_string()));
        }

        Ok(full_path)
    }

    /// List a directory. Directories get a trailing `/`.
    pub fn list_directory(&self, relative_dir: &str, recursive: bool) -> Result<Vec<String>, ToolError> {
        let dir_path = self.resolve(relative_dir)?;

        if !dir_path.exists() {
            return Err(ToolError::NotFound(format!("directory {}", relative_dir)));
        }

        if !dir_path.is_dir() {
            return Err(ToolError::InvalidArgument {
                name: "directory".to_string(),
                reason: format!("not a directory: {}", relative_dir),
            });
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut entries = Vec::new();

        let walker = WalkDir::new(&dir_path)
            .min_depth(1)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(|e| !self.is_excluded(&e.file_name().to_string_lossy()));

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            let rel = entry
                .path()
                .strip_prefix(&dir_path)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();
            let suffix = if entry.file_type().is_dir() { "/" } else { "" };
            entries.push(format!("{}{}", rel, suffix));
        }

        entries.sort();
        Ok(entries)
    }

    /// Check if a name matches exclusion patterns.
    fn is_excluded(&self, name: &str) -> bool {
        // Hidden files
        if name.starts_with('.') {
            return true;
        }

        self.excludes.iter().any(|pattern| name == pattern)
    }

    /// Symlink-aware containment check on the deepest existing ancestor.
    fn is_within_root(&self, path: &Path) -> bool {
        let Ok(canonical_root) = fs::canonicalize(&self.root) else {
            // Root not created yet: the lexical check already passed.
            return true;
        };

        match path.ancestors().find(|p| p.exists()) {
            Some(existing) => fs::canonicalize(existing)
                .map(|canonical| canonical.starts_with(&canonical_root))
                .unwrap_or(false),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_inside_root() {
        let temp_dir = TempDir::new().unwrap();
        let ws = Workspace::new(temp_dir.path());

        let path = ws.resolve("solutions/./main.py").unwrap();
        assert_eq!(path, temp_dir.path().join("solutions").join("main.py"));

        let path = ws.resolve("solutions/../notes.txt").unwrap();
        assert_eq!(path, temp_dir.path().join("notes.txt"));
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let temp_dir = TempDir::new().unwrap();
        let ws = Workspace::new(temp_dir.path());

        assert!(matches!(
            ws.resolve("../../etc/passwd"),
            Err(ToolError::PathViolation(_))
        ));
        assert!(matches!(
            ws.resolve("solutions/../../outside.txt"),
            Err(ToolError::PathViolation(_))
        ));
        assert!(matches!(ws.resolve("/etc/passwd"), Err(ToolError::PathViolation(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_rejects_symlink_escape() {
        let outside = TempDir::new().unwrap();
        let temp_dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), temp_dir.path().join("link")).unwrap();

        let ws = Workspace::new(temp_dir.path());
        assert!(matches!(
            ws.resolve("link/secret.txt"),
            Err(ToolError::PathViolation(_))
        ));
    }

    #[test]
    fn test_list_directory() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("main.py"), "print(1)").unwrap();
        std::fs::write(temp_dir.path().join(".hidden"), "").unwrap();
        std::fs::create_dir(temp_dir.path().join("solutions")).unwrap();
        std::fs::write(temp_dir.path().join("solutions").join("a.py"), "").unwrap();

        let ws = Workspace::new(temp_dir.path());

        let flat = ws.list_directory(".", false).unwrap();
        assert_eq!(flat, vec!["main.py".to_string(), "solutions/".to_string()]);

        let deep = ws.list_directory(".", true).unwrap();
        assert!(deep.contains(&"solutions/a.py".to_string()));
        assert!(!deep.iter().any(|e| e.contains(".hidden")));
    }

    #[test]
    fn test_ensure_layout() {
        let temp_dir = TempDir::new().unwrap();
        let ws = Workspace::new(temp_dir.path().join("ws"));
        ws.ensure_layout(&["solutions", "logs"]).unwrap();
        assert!(temp_dir.path().join("ws").join("solutions").is_dir());
        assert!(temp_dir.path().join("ws").join("logs").is_dir());
    }
}
