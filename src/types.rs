/// Core domain types for migration runs: documents, version roots, links, issues.
use std::fmt;
use std::path::PathBuf;

/// A hex-encoded SHA-256 digest of a document's raw bytes, always lowercase.
/// Newtype prevents mixing with arbitrary strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Checksum(
    /// The hex-encoded SHA-256 digest string.
    pub String,
);

/// A named snapshot of one product's documentation on disk.
#[derive(Debug, Clone)]
pub struct VersionRoot {
    /// Directory holding the snapshot.
    pub dir: PathBuf,
    /// Label used in output paths and canonical links (e.g. `next`, `v0.52`).
    pub label: String,
}

/// A document read from a version root. Immutable once read.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Raw text content.
    pub content: String,
    /// Path relative to the version root, with ordering prefixes intact.
    pub path: PathBuf,
}

/// How a link target is treated by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// `#fragment` on the current page.
    Anchor,
    /// Internal link to another document.
    Document,
    /// Scheme-qualified or protocol-relative URL.
    External,
    /// Reference to an image asset.
    Image,
}

/// Severity of a problem found while transforming a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IssueKind {
    /// Content could not be emitted safely and needs a manual fix.
    Error,
    /// Content was corrected automatically but is worth a look.
    Warning,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return match self {
            IssueKind::Error => f.write_str("error"),
            IssueKind::Warning => f.write_str("warning"),
        };
    }
}

/// A problem raised while transforming one document. Carries no file path so
/// that cached results stay identical across byte-identical documents; the
/// report attaches the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Severity.
    pub kind: IssueKind,
    /// One-based line number in the source document; `0` for the whole file.
    pub line: u32,
    /// What went wrong.
    pub message: String,
    /// Optional hint for fixing the source.
    pub suggestion: Option<String>,
}

impl Issue {
    /// An error-kind issue at `line`.
    pub fn error(line: u32, message: impl Into<String>) -> Self {
        return Self {
            kind: IssueKind::Error,
            line,
            message: message.into(),
            suggestion: None,
        };
    }

    /// A warning-kind issue at `line`.
    pub fn warning(line: u32, message: impl Into<String>) -> Self {
        return Self {
            kind: IssueKind::Warning,
            line,
            message: message.into(),
            suggestion: None,
        };
    }

    /// Attach a fix suggestion.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        return self;
    }
}

/// An issue attributed to a file, as collected by the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformIssue {
    /// File the issue belongs to, displayed as `<version>/<relative path>`.
    pub file: PathBuf,
    /// The underlying issue.
    pub issue: Issue,
}

/// An internal document link found while rendering, kept for link checking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLink {
    /// One-based line number in the source document.
    pub line: u32,
    /// Canonical target, including any fragment or query.
    pub target: String,
}
