//! Filesystem allow-list for file operation steps.
//!
//! `PathGuard` is a prefix-containment check over lexically resolved,
//! lower-cased paths. It does not follow symlinks: a link inside an allowed
//! root that points elsewhere passes the check.

use std::path::{Component, Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PathGuardError {
    #[error("Access denied to path: {}", .0.display())]
    AccessDenied(PathBuf),
}

/// Expand a leading `~`, `$HOME` or `${HOME}` against `home`.
///
/// Values without one of those prefixes, or with no home available, are
/// returned unchanged.
pub fn expand_home(raw: &str, home: Option<&Path>) -> PathBuf {
    let Some(home) = home else {
        return PathBuf::from(raw);
    };
    for prefix in ["${HOME}", "$HOME", "~"] {
        if let Some(rest) = raw.strip_prefix(prefix) {
            if rest.is_empty() {
                return home.to_path_buf();
            }
            if let Some(rest) = rest.strip_prefix(['/', '\\']) {
                return home.join(rest);
            }
        }
    }
    PathBuf::from(raw)
}

/// Make `path` absolute against `base` and fold `.`/`..` components without
/// touching the filesystem.
pub fn resolve_lexically(path: &Path, base: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut resolved = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                resolved.pop();
            }
            Component::CurDir => {}
            other => resolved.push(other.as_os_str()),
        }
    }
    resolved
}

#[derive(Debug, Clone)]
pub struct PathGuard {
    /// Resolved, lower-cased roots.
    roots: Vec<String>,
    base: PathBuf,
}

impl PathGuard {
    /// Build a guard over already-expanded roots, resolving relative paths
    /// against the process working directory.
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let base = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        Self::with_base(roots, base)
    }

    pub fn with_base<I, P>(roots: I, base: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let base = base.into();
        let roots = roots
            .into_iter()
            .map(|root| normalized_text(root.as_ref(), &base))
            .collect();
        Self { roots, base }
    }

    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    pub fn is_allowed(&self, path: &Path) -> bool {
        let resolved = normalized_text(path, &self.base);
        if resolved.contains("..") {
            return false;
        }
        self.roots.iter().any(|root| resolved.starts_with(root.as_str()))
    }

    pub fn check(&self, path: &Path) -> Result<(), PathGuardError> {
        if self.is_allowed(path) {
            Ok(())
        } else {
            tracing::warn!(path = %path.display(), "path outside allow-list");
            Err(PathGuardError::AccessDenied(path.to_path_buf()))
        }
    }
}

fn normalized_text(path: &Path, base: &Path) -> String {
    resolve_lexically(path, base)
        .to_string_lossy()
        .to_lowercase()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
