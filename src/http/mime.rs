//! MIME type detection module
//!
//! Resolves the Content-Type of a served file through a pluggable sniffer,
//! falling back to `application/octet-stream`.

use std::path::Path;
use std::sync::Arc;

pub const FALLBACK_MIME: &str = "application/octet-stream";

/// Source of MIME types for files on disk
pub trait MimeSniffer: Send + Sync {
    /// Best-effort type of the file at `path`, `None` if unknown
    fn sniff(&self, path: &Path) -> Option<String>;
}

/// Extension-based sniffer backed by the `mime_guess` database
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtensionSniffer;

impl MimeSniffer for ExtensionSniffer {
    fn sniff(&self, path: &Path) -> Option<String> {
        mime_guess::from_path(path).first_raw().map(ToString::to_string)
    }
}

#[derive(Clone)]
pub struct ContentTypeResolver {
    sniffer: Arc<dyn MimeSniffer>,
}

impl ContentTypeResolver {
    pub fn new(sniffer: Arc<dyn MimeSniffer>) -> Self {
        Self { sniffer }
    }

    /// MIME type for `path`; never fails
    pub fn mime_type_of(&self, path: &Path) -> String {
        self.sniffer
            .sniff(path)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_MIME.to_string())
    }
}

impl Default for ContentTypeResolver {
    fn default() -> Self {
        Self::new(Arc::new(ExtensionSniffer))
    }
}

/// Whether a MIME type denotes an HTML page
pub fn is_html(mime: &str) -> bool {
    mime.trim_start().to_ascii_lowercase().starts_with("text/html")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenSniffer;

    impl MimeSniffer for BrokenSniffer {
        fn sniff(&self, _path: &Path) -> Option<String> {
            None
        }
    }

    #[test]
    fn test_common_types() {
        let resolver = ContentTypeResolver::default();
        assert_eq!(resolver.mime_type_of(Path::new("index.html")), "text/html");
        assert_eq!(resolver.mime_type_of(Path::new("style.css")), "text/css");
        assert_eq!(resolver.mime_type_of(Path::new("logo.png")), "image/png");
    }

    #[test]
    fn test_unknown_falls_back() {
        let resolver = ContentTypeResolver::default();
        assert_eq!(resolver.mime_type_of(Path::new("blob.zzzunknown")), FALLBACK_MIME);
        assert_eq!(resolver.mime_type_of(Path::new("Makefile")), FALLBACK_MIME);

        let broken = ContentTypeResolver::new(Arc::new(BrokenSniffer));
        assert_eq!(broken.mime_type_of(Path::new("index.html")), FALLBACK_MIME);
    }

    #[test]
    fn test_is_html() {
        assert!(is_html("text/html"));
        assert!(is_html("text/html; charset=utf-8"));
        assert!(!is_html("text/plain"));
        assert!(!is_html(FALLBACK_MIME));
    }
}
