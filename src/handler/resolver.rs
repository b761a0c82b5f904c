//! Request path resolution module
//!
//! Maps a request URI onto a regular file below the document root. The only
//! traversal defense is lexical normalization followed by a prefix check,
//! then a second prefix check on the canonical path so symlinks cannot lead
//! outside the root.

use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

use crate::logger;

/// A file confirmed to exist below the document root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    path: PathBuf,
}

impl ResolvedTarget {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Resolves URIs against a fixed document root
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    // False when the root did not exist at startup; it is then canonicalized
    // again on each lookup
    root_is_canonical: bool,
    index_file: String,
}

impl PathResolver {
    /// Create a resolver for `root`, made absolute and canonical where possible
    pub fn new(root: impl AsRef<Path>, index_file: impl Into<String>) -> io::Result<Self> {
        let root = root.as_ref();
        let absolute = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()?.join(root)
        };
        let (root, root_is_canonical) = match std::fs::canonicalize(&absolute) {
            Ok(canonical) => (canonical, true),
            Err(e) => {
                logger::warning(&format!(
                    "Document root '{}' cannot be canonicalized ({e}); it will be re-checked on each request",
                    absolute.display()
                ));
                (normalize(&absolute), false)
            }
        };
        Ok(Self {
            root,
            root_is_canonical,
            index_file: index_file.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the path portion of `uri` to an existing regular file
    pub async fn resolve(&self, uri: &str) -> Option<ResolvedTarget> {
        let candidate = self.candidate(uri)?;

        let Ok(canonical) = fs::canonicalize(&candidate).await else {
            return None;
        };
        let root = if self.root_is_canonical {
            Cow::Borrowed(self.root.as_path())
        } else {
            Cow::Owned(fs::canonicalize(&self.root).await.ok()?)
        };
        if !canonical.starts_with(&*root) {
            logger::log_traversal_attempt(uri);
            return None;
        }

        match fs::metadata(&canonical).await {
            Ok(meta) if meta.is_file() => Some(ResolvedTarget { path: canonical }),
            _ => None,
        }
    }

    /// Lexically normalized location for `uri`, or `None` if it is not a
    /// strict descendant of the root
    pub fn candidate(&self, uri: &str) -> Option<PathBuf> {
        let path = uri.split(['?', '#']).next().unwrap_or_default();
        let path = if path == "/" {
            format!("/{}", self.index_file)
        } else {
            path.to_string()
        };

        let Ok(decoded) = percent_decode_str(&path).decode_utf8() else {
            logger::warning(&format!("Undecodable request path: {uri}"));
            return None;
        };
        if decoded.contains('\0') {
            return None;
        }

        // Joining an absolute suffix replaces the root, which the prefix
        // check below then rejects.
        let suffix = decoded.strip_prefix('/').unwrap_or(&decoded);
        let candidate = normalize(&self.root.join(suffix));

        if candidate == self.root || !candidate.starts_with(&self.root) {
            if candidate != self.root {
                logger::log_traversal_attempt(uri);
            }
            return None;
        }
        Some(candidate)
    }
}

/// Lexical normalization: drops `.` and folds `..` without touching the disk
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(segment) => out.push(segment),
        }
    }
    out
}
