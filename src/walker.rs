//! Batch driver: walks version roots, runs every document through the cache
//! and renderer, and hands results to the writer.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::cache::ContentCache;
use crate::config::Config;
use crate::error::Error;
use crate::hasher;
use crate::linkcheck::{self, CheckedLink};
use crate::nav::Manifest;
use crate::report::Report;
use crate::resolver::{self, LinkContext};
use crate::transform;
use crate::types::{Issue, SourceDocument, VersionRoot};
use crate::writer::{ImageOutcome, WriteOutcome, Writer};

/// Files found under one version root, each relative to it.
#[derive(Debug, Default)]
struct VersionFiles {
    /// Documents, in lexicographic order.
    documents: Vec<PathBuf>,
    /// Images, in lexicographic order.
    images: Vec<PathBuf>,
}

/// One invocation's worth of state: cache, report, writer and the pages
/// produced so far. Nothing here outlives the run.
#[derive(Debug)]
pub struct MigrationRun<'c> {
    /// Prepare-phase memo, shared by every version.
    cache: ContentCache,
    /// Run configuration.
    config: &'c Config,
    /// Internal links seen while rendering, checked once all pages exist.
    links: Vec<CheckedLink>,
    /// Page ids (`<product>/<version>/<page>`) per version label.
    pages: BTreeMap<String, BTreeSet<String>>,
    /// Product namespace.
    product: String,
    /// Issues and counters.
    report: Report,
    /// Sole owner of filesystem side effects.
    writer: Writer,
}

impl<'c> MigrationRun<'c> {
    /// A fresh run for `product`.
    pub fn new(config: &'c Config, product: impl Into<String>, writer: Writer) -> Self {
        return Self {
            cache: ContentCache::new(config.front_matter.clone()),
            config,
            links: Vec::new(),
            pages: BTreeMap::new(),
            product: product.into(),
            report: Report::new(),
            writer,
        };
    }

    /// Migrate every version root, then check links and, if asked, update
    /// the navigation manifest.
    ///
    /// Per-file problems end up in the report; only conditions that make
    /// the whole run meaningless are returned as errors.
    ///
    /// # Errors
    ///
    /// Returns a nav error from [`Manifest::load`] before anything is
    /// written, or `Error::OutputRootUnwritable` if the output roots cannot
    /// be created.
    pub fn run(&mut self, versions: &[VersionRoot], update_nav: bool) -> Result<(), Error> {
        let manifest = if update_nav { Some(Manifest::load(&self.config.nav_file)?) } else { None };
        self.writer.prepare_roots()?;

        for version in versions {
            self.migrate_version(version);
        }

        if self.config.check_links {
            let produced: BTreeSet<String> =
                self.pages.values().flatten().map(|id| return format!("/{id}")).collect();
            linkcheck::check(&self.links, &produced, &self.product, &mut self.report);
        }

        log::debug!("cache holds {} distinct document(s)", self.cache.distinct());
        self.report.counters.cache_hits = self.cache.hits();
        self.report.counters.transformer_runs = self.cache.misses();

        if let Some(mut manifest) = manifest {
            manifest.merge(&self.product, &self.pages);
            match manifest.save(&self.writer) {
                Ok(written) => log::info!("navigation updated: {}", written.display()),
                Err(e) => self.report.record_one(
                    &self.config.nav_file,
                    Issue::error(0, format!("cannot write navigation file: {e}")),
                ),
            }
        }
        return Ok(());
    }

    /// The report, for rendering and the exit code.
    pub const fn report(&self) -> &Report {
        return &self.report;
    }

    /// Consume the run, keeping only its report.
    pub fn into_report(self) -> Report {
        return self.report;
    }

    /// Process every document and image under one version root.
    fn migrate_version(&mut self, version: &VersionRoot) {
        let files = self.collect_files(version);
        log::info!(
            "version {}: {} document(s), {} image(s)",
            version.label,
            files.documents.len(),
            files.images.len()
        );
        self.pages.entry(version.label.clone()).or_default();

        for relative in &files.documents {
            self.migrate_document(version, relative);
        }
        for relative in &files.images {
            self.copy_image(version, relative);
        }
    }

    /// Enumerate files under a version root in lexicographic order, applying
    /// the include/exclude filters to documents and images alike.
    fn collect_files(&mut self, version: &VersionRoot) -> VersionFiles {
        let mut files = VersionFiles::default();

        for entry in WalkDir::new(&version.dir).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    let relative = e
                        .path()
                        .and_then(|p| return p.strip_prefix(&version.dir).ok())
                        .map_or_else(PathBuf::new, Path::to_path_buf);
                    self.report.record_one(
                        &display_path(version, &relative),
                        Issue::error(0, format!("cannot read directory entry: {e}")),
                    );
                    continue;
                },
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Ok(relative) = path.strip_prefix(&version.dir) else {
                continue;
            };
            let Some(ext) = path.extension().map(|e| return e.to_string_lossy()) else {
                continue;
            };

            let is_document = self.config.is_source_extension(&ext);
            if !is_document && !self.config.is_image_extension(&ext) {
                continue;
            }
            let relative_str = relative.to_string_lossy().replace('\\', "/");
            if !self.config.should_scan(&relative_str) {
                log::debug!("skipping filtered {relative_str}");
                continue;
            }
            if is_document {
                files.documents.push(relative.to_path_buf());
            } else {
                files.images.push(relative.to_path_buf());
            }
        }
        return files;
    }

    /// Read, transform and dispatch one document.
    fn migrate_document(&mut self, version: &VersionRoot, relative: &Path) {
        let shown = display_path(version, relative);
        self.report.counters.documents = self.report.counters.documents.saturating_add(1);

        let bytes = match std::fs::read(version.dir.join(relative)) {
            Ok(b) => b,
            Err(e) => {
                self.report.record_one(&shown, Issue::error(0, format!("cannot read file: {e}")));
                return;
            },
        };
        let checksum = hasher::checksum(&bytes);
        let document = match String::from_utf8(bytes) {
            Ok(content) => SourceDocument { content, path: relative.to_path_buf() },
            Err(_) => {
                self.report.record_one(&shown, Issue::error(0, "file is not valid UTF-8"));
                return;
            },
        };

        let prepared = self.cache.prepare(&checksum, &document.content);
        let ctx = LinkContext {
            assets_url: &self.config.assets_url,
            document: &document.path,
            image_extensions: &self.config.image_extensions,
            product: &self.product,
            source_extensions: &self.config.source_extensions,
            version: &version.label,
        };
        let rendered = transform::render(&prepared, &ctx);
        self.report.record(&shown, &rendered.issues);

        let destination =
            Path::new(&version.label).join(resolver::destination_path(&document.path, &self.config.target_extension));
        match self.writer.write_document(&destination, &rendered.text) {
            Ok(WriteOutcome::Written(path)) => {
                log::debug!("{} -> {}", shown.display(), path.display());
                self.report.counters.documents_written = self.report.counters.documents_written.saturating_add(1);
                let page = resolver::page_url(&document.path, &ctx);
                self.pages
                    .entry(version.label.clone())
                    .or_default()
                    .insert(page.trim_start_matches('/').to_string());
                self.links.extend(
                    rendered
                        .links
                        .into_iter()
                        .map(|link| return CheckedLink { file: shown.clone(), link }),
                );
            },
            Ok(WriteOutcome::Collision) => {
                self.report.record_one(
                    &shown,
                    Issue::error(0, format!("output path {} is already produced by another document", destination.display()))
                        .with_suggestion("rename one of the files so their names differ after ordering prefixes are stripped"),
                );
            },
            Err(e) => {
                self.report.record_one(
                    &shown,
                    Issue::error(0, format!("cannot write {}: {e}", destination.display())),
                );
            },
        }
    }

    /// Copy one image into the product's flattened image namespace.
    fn copy_image(&mut self, version: &VersionRoot, relative: &Path) {
        let shown = display_path(version, relative);
        let bytes = match std::fs::read(version.dir.join(relative)) {
            Ok(b) => b,
            Err(e) => {
                self.report.record_one(&shown, Issue::error(0, format!("cannot read image: {e}")));
                return;
            },
        };

        let destination = Path::new(&self.product).join("images").join(relative);
        match self.writer.copy_image(&destination, &bytes) {
            Ok(ImageOutcome::Copied) => {
                self.report.counters.images_copied = self.report.counters.images_copied.saturating_add(1);
            },
            Ok(ImageOutcome::Duplicate) => {
                log::trace!("image {} already copied", destination.display());
            },
            Ok(ImageOutcome::Conflict) => {
                self.report.record_one(
                    &shown,
                    Issue::warning(0, "an image with the same path but different content was already copied from an earlier version; the earlier copy is kept"),
                );
            },
            Err(e) => {
                self.report.record_one(
                    &shown,
                    Issue::error(0, format!("cannot copy image to {}: {e}", destination.display())),
                );
            },
        }
    }
}

/// Find the version roots of a source tree.
///
/// Configured versions are used as given. Otherwise every non-hidden
/// subdirectory is a version, sorted by name; `version-X` is labelled `vX`.
///
/// # Errors
///
/// Returns `Error::SourceRootNotFound` if `source_root` is not a directory,
/// `Error::VersionNotFound` if a configured version directory is missing, or
/// `Error::NoVersionRoots` if discovery finds nothing.
pub fn discover_versions(source_root: &Path, config: &Config) -> Result<Vec<VersionRoot>, Error> {
    if !source_root.is_dir() {
        return Err(Error::SourceRootNotFound { path: source_root.to_path_buf() });
    }

    if !config.versions.is_empty() {
        let mut roots = Vec::with_capacity(config.versions.len());
        for entry in &config.versions {
            let dir = source_root.join(&entry.dir);
            if !dir.is_dir() {
                return Err(Error::VersionNotFound { label: entry.label.clone(), path: dir });
            }
            roots.push(VersionRoot { dir, label: entry.label.clone() });
        }
        return Ok(roots);
    }

    let mut roots = Vec::new();
    for entry in WalkDir::new(source_root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| return e.file_type().is_dir())
    {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        roots.push(VersionRoot { dir: entry.path().to_path_buf(), label: version_label(&name) });
    }

    if roots.is_empty() {
        return Err(Error::NoVersionRoots { path: source_root.to_path_buf() });
    }
    return Ok(roots);
}

/// Label for a discovered version directory.
fn version_label(dir_name: &str) -> String {
    return match dir_name.strip_prefix("version-") {
        Some(rest) if !rest.is_empty() => format!("v{rest}"),
        _ => dir_name.to_string(),
    };
}

/// How a file is named in the report: `<version>/<relative path>`.
fn display_path(version: &VersionRoot, relative: &Path) -> PathBuf {
    return Path::new(&version.label).join(relative);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IssueKind;
    use crate::writer::OutputMode;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn dry_writer(dir: &Path) -> Writer {
        return Writer::new(OutputMode::DryRun, dir.join("out"), dir.join("assets"));
    }

    #[test]
    fn discovers_sorted_versions_with_labels() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["version-0.52", "next", ".git"] {
            std::fs::create_dir_all(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("README.md"), "x").unwrap();

        let versions = discover_versions(dir.path(), &Config::default()).unwrap();
        let labels: Vec<&str> = versions.iter().map(|v| v.label.as_str()).collect();
        assert_eq!(labels, vec!["next", "v0.52"]);
    }

    #[test]
    fn missing_source_root_and_empty_root_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            discover_versions(&dir.path().join("nope"), &Config::default()),
            Err(Error::SourceRootNotFound { .. })
        ));
        assert!(matches!(
            discover_versions(dir.path(), &Config::default()),
            Err(Error::NoVersionRoots { .. })
        ));
    }

    #[test]
    fn configured_version_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::parse("[[versions]]\nlabel = \"v1\"\ndir = \"missing\"\n").unwrap();
        assert!(matches!(
            discover_versions(dir.path(), &config),
            Err(Error::VersionNotFound { .. })
        ));
    }

    #[test]
    fn identical_documents_across_versions_prepare_once() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let body = ":::tip\nSee [the intro](../00-intro.md).\n:::\n";
        write(&src, "next/01-learn/guide.md", body);
        write(&src, "version-1/01-learn/guide.md", body);
        write(&src, "next/00-intro.md", "# Intro\n");
        write(&src, "version-1/00-intro.md", "# Intro v1\n");

        let config = Config::default();
        let versions = discover_versions(&src, &config).unwrap();
        let mut run = MigrationRun::new(&config, "sdk", dry_writer(dir.path()));
        run.run(&versions, false).unwrap();

        let counters = run.report().counters;
        assert_eq!(counters.documents, 4);
        assert_eq!(counters.transformer_runs, 3);
        assert_eq!(counters.cache_hits, 1);
        assert_eq!(counters.documents_written, 4);
        assert_eq!(counters.links_checked, 2);
        assert!(run.report().issues().is_empty(), "{:?}", run.report().issues());
    }

    #[test]
    fn writes_documents_and_images_to_their_layout() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(&src, "next/01-learn/00-intro.md", "![diagram](./img/flow.png)\n");
        write(&src, "next/01-learn/img/flow.png", "png");

        let config = Config::default();
        let versions = discover_versions(&src, &config).unwrap();
        let writer = Writer::new(OutputMode::Write, dir.path().join("out"), dir.path().join("assets"));
        let mut run = MigrationRun::new(&config, "sdk", writer);
        run.run(&versions, false).unwrap();

        let written = std::fs::read_to_string(dir.path().join("out/next/learn/intro.mdx")).unwrap();
        assert_eq!(written, "![diagram](/assets/sdk/images/01-learn/img/flow.png)\n");
        assert!(dir.path().join("assets/sdk/images/01-learn/img/flow.png").exists());
        assert_eq!(run.report().counters.images_copied, 1);
    }

    #[test]
    fn colliding_outputs_error_on_the_second_document() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(&src, "next/01-intro.md", "a\n");
        write(&src, "next/intro.md", "b\n");

        let config = Config::default();
        let versions = discover_versions(&src, &config).unwrap();
        let mut run = MigrationRun::new(&config, "sdk", dry_writer(dir.path()));
        run.run(&versions, false).unwrap();

        let report = run.into_report();
        assert_eq!(report.count(IssueKind::Error), 1);
        assert_eq!(report.issues().first().unwrap().file, PathBuf::from("next/intro.md"));
        assert_eq!(report.counters.documents_written, 1);
    }

    #[test]
    fn malformed_file_does_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(&src, "next/a.md", ":::note\nnever closed\n");
        std::fs::create_dir_all(src.join("next")).unwrap();
        std::fs::write(src.join("next/b.md"), [0xff, 0xfe, 0x00]).unwrap();
        write(&src, "next/c.md", "fine\n");

        let config = Config::default();
        let versions = discover_versions(&src, &config).unwrap();
        let mut run = MigrationRun::new(&config, "sdk", dry_writer(dir.path()));
        run.run(&versions, false).unwrap();

        let report = run.report();
        assert_eq!(report.count(IssueKind::Error), 2);
        assert_eq!(report.counters.documents, 3);
        assert_eq!(report.counters.documents_written, 2);
    }

    #[test]
    fn broken_internal_link_is_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(&src, "next/a.md", "[gone](./missing.md)\n");

        let config = Config::default();
        let versions = discover_versions(&src, &config).unwrap();
        let mut run = MigrationRun::new(&config, "sdk", dry_writer(dir.path()));
        run.run(&versions, false).unwrap();

        let report = run.report();
        assert!(!report.has_errors());
        assert_eq!(report.count(IssueKind::Warning), 1);
    }

    #[test]
    fn filters_apply_to_documents_and_images() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(&src, "next/guide/a.md", "a\n");
        write(&src, "next/guide/shown.png", "png");
        write(&src, "next/drafts/b.md", "b\n");
        write(&src, "next/drafts/hidden.png", "png");

        let config = Config::parse("exclude = [\"drafts/\"]\n").unwrap();
        let versions = discover_versions(&src, &config).unwrap();
        let writer = Writer::new(OutputMode::Write, dir.path().join("out"), dir.path().join("assets"));
        let mut run = MigrationRun::new(&config, "sdk", writer);
        run.run(&versions, false).unwrap();

        assert_eq!(run.report().counters.documents, 1);
        assert_eq!(run.report().counters.images_copied, 1);
        assert!(dir.path().join("assets/sdk/images/guide/shown.png").exists());
        assert!(!dir.path().join("assets/sdk/images/drafts/hidden.png").exists());
    }

    #[test]
    fn corrupt_nav_file_stops_the_run_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(&src, "next/a.md", ":::note\nnever closed\n");
        let nav_path = dir.path().join("docs.json");
        std::fs::write(&nav_path, "{not json").unwrap();

        let mut config = Config::default();
        config.nav_file = nav_path.clone();
        let versions = discover_versions(&src, &config).unwrap();
        let writer = Writer::new(OutputMode::Write, dir.path().join("out"), dir.path().join("assets"));
        let mut run = MigrationRun::new(&config, "sdk", writer);

        assert!(matches!(run.run(&versions, true), Err(Error::NavCorrupt { .. })));
        assert!(!dir.path().join("out").exists());
        assert!(!dir.path().join("assets").exists());
        assert_eq!(std::fs::read_to_string(&nav_path).unwrap(), "{not json");
    }

    #[test]
    fn valid_nav_file_is_merged_after_migration() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(&src, "next/01-learn/00-intro.md", "# Intro\n");
        let nav_path = dir.path().join("docs.json");
        std::fs::write(&nav_path, "{\"name\": \"Docs\"}").unwrap();

        let mut config = Config::default();
        config.nav_file = nav_path.clone();
        let versions = discover_versions(&src, &config).unwrap();
        let writer = Writer::new(OutputMode::Write, dir.path().join("out"), dir.path().join("assets"));
        let mut run = MigrationRun::new(&config, "sdk", writer);
        run.run(&versions, true).unwrap();

        let nav = std::fs::read_to_string(&nav_path).unwrap();
        assert!(nav.contains("\"name\": \"Docs\""), "{nav}");
        assert!(nav.contains("sdk/next/learn/intro"), "{nav}");
    }

    #[test]
    fn version_labels() {
        assert_eq!(version_label("version-0.52"), "v0.52");
        assert_eq!(version_label("next"), "next");
        assert_eq!(version_label("version-"), "version-");
    }
}
