//! Link resolution: maps source-relative link targets to canonical
//! `/<product>/<version>/<path>` references without touching the filesystem.

use std::path::{Component, Path, PathBuf};

use crate::types::LinkKind;

/// Everything resolution depends on besides the link target itself.
#[derive(Debug, Clone, Copy)]
pub struct LinkContext<'a> {
    /// URL prefix images are served under, without trailing slash.
    pub assets_url: &'a str,
    /// Path of the document containing the link, relative to its version root.
    pub document: &'a Path,
    /// Extensions (without dot, lowercase) treated as images.
    pub image_extensions: &'a [String],
    /// Product namespace.
    pub product: &'a str,
    /// Extensions (without dot, lowercase) stripped from document links.
    pub source_extensions: &'a [String],
    /// Version label.
    pub version: &'a str,
}

/// Outcome of resolving one link target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Rewritten to a canonical target.
    Rewritten {
        /// More `..` segments than the path had; the excess was dropped.
        escaped_root: bool,
        /// Canonical target with fragment/query carried over.
        target: String,
    },
    /// External, anchor-only, or already canonical: emit as written.
    Unchanged,
}

/// Classify a raw link target. `image` is true when the link is written with
/// image syntax, which forces image treatment for internal targets.
pub fn classify(target: &str, image: bool, ctx: &LinkContext<'_>) -> LinkKind {
    let trimmed = target.trim();
    if trimmed.starts_with('#') {
        return LinkKind::Anchor;
    }
    if has_scheme(trimmed) || trimmed.starts_with("//") {
        return LinkKind::External;
    }
    let (path, _) = split_suffix(trimmed);
    if path.is_empty() {
        return LinkKind::Anchor;
    }
    let is_image_ext = Path::new(path)
        .extension()
        .and_then(|e| return e.to_str())
        .is_some_and(|e| return ctx.image_extensions.iter().any(|i| return i.eq_ignore_ascii_case(e)));
    if image || is_image_ext {
        return LinkKind::Image;
    }
    return LinkKind::Document;
}

/// Resolve a link target found in `ctx.document`.
///
/// Anchor and external targets come back `Unchanged`. Document links become
/// `/<product>/<version>/<path>` with ordering prefixes and the source
/// extension stripped; leading-`/` links are stripped but not re-based.
/// Images become `<assets>/<product>/images/<path-in-version-root>`.
pub fn resolve(target: &str, image: bool, ctx: &LinkContext<'_>) -> Resolution {
    let trimmed = target.trim();
    return match classify(trimmed, image, ctx) {
        LinkKind::Anchor | LinkKind::External => Resolution::Unchanged,
        LinkKind::Document => resolve_document(trimmed, ctx),
        LinkKind::Image => resolve_image(trimmed, ctx),
    };
}

/// Resolve an internal document link.
fn resolve_document(target: &str, ctx: &LinkContext<'_>) -> Resolution {
    let (path, suffix) = split_suffix(target);

    let (segments, escaped_root) = if let Some(rooted) = path.strip_prefix('/') {
        normalize_segments(rooted.split('/'))
    } else {
        let base = parent_segments(ctx.document);
        normalize_segments(base.iter().map(String::as_str).chain(path.split('/')))
    };

    let mut cleaned: Vec<String> = segments
        .iter()
        .map(|s| return strip_ordering_prefix(s).to_string())
        .collect();
    if let Some(last) = cleaned.last_mut() {
        *last = strip_source_extension(last, ctx.source_extensions);
    }
    let joined = cleaned.join("/");

    let canonical = if path.starts_with('/') {
        format!("/{joined}")
    } else if joined.is_empty() {
        format!("/{}/{}", ctx.product, ctx.version)
    } else {
        format!("/{}/{}/{joined}", ctx.product, ctx.version)
    };

    let rewritten = format!("{canonical}{suffix}");
    if rewritten == target {
        return Resolution::Unchanged;
    }
    return Resolution::Rewritten { escaped_root, target: rewritten };
}

/// Resolve an image reference into the product-scoped asset namespace.
/// On-disk names are kept, prefixes included, so the copier and the link agree.
fn resolve_image(target: &str, ctx: &LinkContext<'_>) -> Resolution {
    let assets_prefix = format!("{}/", ctx.assets_url);
    if target.starts_with(&assets_prefix) {
        return Resolution::Unchanged;
    }

    let (path, suffix) = split_suffix(target);
    let (segments, escaped_root) = if let Some(rooted) = path.strip_prefix('/') {
        normalize_segments(rooted.split('/'))
    } else {
        let base = parent_segments(ctx.document);
        normalize_segments(base.iter().map(String::as_str).chain(path.split('/')))
    };

    let rewritten = format!(
        "{}/{}/images/{}{suffix}",
        ctx.assets_url,
        ctx.product,
        segments.join("/")
    );
    return Resolution::Rewritten { escaped_root, target: rewritten };
}

/// Output path for a document: prefixes stripped from every component,
/// extension replaced by `target_ext`.
pub fn destination_path(relative: &Path, target_ext: &str) -> PathBuf {
    let mut out: PathBuf = relative
        .components()
        .filter_map(|c| {
            return match c {
                Component::Normal(name) => Some(strip_ordering_prefix(&name.to_string_lossy()).to_string()),
                _ => None,
            };
        })
        .collect();
    out.set_extension(target_ext);
    return out;
}

/// Canonical page URL for a document path, as links to it resolve.
pub fn page_url(relative: &Path, ctx: &LinkContext<'_>) -> String {
    let mut cleaned: Vec<String> = relative
        .components()
        .filter_map(|c| {
            return match c {
                Component::Normal(name) => Some(strip_ordering_prefix(&name.to_string_lossy()).to_string()),
                _ => None,
            };
        })
        .collect();
    if let Some(last) = cleaned.last_mut() {
        *last = strip_source_extension(last, ctx.source_extensions);
    }
    return format!("/{}/{}/{}", ctx.product, ctx.version, cleaned.join("/"));
}

/// Strip a numeric ordering prefix (`01-intro` → `intro`). Names that would
/// become empty, or have no digits before the dash, are left alone.
pub fn strip_ordering_prefix(segment: &str) -> &str {
    let digits = segment.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return segment;
    }
    let Some(rest) = segment.get(digits..).and_then(|r| return r.strip_prefix('-')) else {
        return segment;
    };
    if rest.is_empty() {
        return segment;
    }
    return rest;
}

/// Whether the target starts with a URL scheme such as `https:` or `mailto:`.
fn has_scheme(target: &str) -> bool {
    let Some((scheme, _)) = target.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    let starts_alpha = chars.next().is_some_and(|c| return c.is_ascii_alphabetic());
    return starts_alpha && chars.all(|c| return c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'));
}

/// Collapse `.` and `..` segments. Excess `..` is dropped and reported.
fn normalize_segments<'a>(segments: impl Iterator<Item = &'a str>) -> (Vec<String>, bool) {
    let mut out: Vec<String> = Vec::new();
    let mut escaped = false;
    for segment in segments {
        match segment {
            "" | "." => {},
            ".." => {
                if out.pop().is_none() {
                    escaped = true;
                }
            },
            other => out.push(other.to_string()),
        }
    }
    return (out, escaped);
}

/// Directory components of a document path, as strings.
fn parent_segments(document: &Path) -> Vec<String> {
    return document
        .parent()
        .map(|p| {
            return p
                .components()
                .filter_map(|c| {
                    return match c {
                        Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                        _ => None,
                    };
                })
                .collect();
        })
        .unwrap_or_default();
}

/// Split `path#frag` / `path?query` into the path and the carried suffix.
fn split_suffix(target: &str) -> (&str, &str) {
    return match target.find(['#', '?']) {
        Some(idx) => target.split_at(idx),
        None => (target, ""),
    };
}

/// Drop a known source extension from the final path segment.
fn strip_source_extension(segment: &str, source_extensions: &[String]) -> String {
    if let Some((stem, ext)) = segment.rsplit_once('.')
        && !stem.is_empty()
        && source_extensions.iter().any(|e| return e.eq_ignore_ascii_case(ext))
    {
        return stem.to_string();
    }
    return segment.to_string();
}
