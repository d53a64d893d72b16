use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;

/// Name of the config file looked up in the source root.
pub const CONFIG_FILE_NAME: &str = ".docmigrate.toml";

/// Front-matter fields that may be rewritten when explicitly requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontMatterField {
    /// `description:` value.
    Description,
    /// `title:` value; derived from the first heading when missing.
    Title,
}

/// Explicitly configured version root.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VersionEntry {
    /// Directory relative to the source root.
    pub dir: PathBuf,
    /// Label used in output paths and links.
    pub label: String,
}

/// Project configuration loaded from `.docmigrate.toml`.
/// Include/exclude patterns are path prefixes applied to document and image
/// paths relative to their version root.
#[derive(Debug, Clone)]
pub struct Config {
    /// Filesystem directory images are copied into; `None` means a sibling
    /// `assets` directory next to the target root.
    pub assets_root: Option<PathBuf>,
    /// URL prefix the assets root is served under.
    pub assets_url: String,
    /// Report internal links whose target page is not produced by the run.
    pub check_links: bool,
    /// Prefix filters; empty means everything.
    exclude: Vec<String>,
    /// Front-matter fields to rewrite; empty leaves front matter untouched.
    pub front_matter: Vec<FrontMatterField>,
    /// Extensions (without dot) treated as images.
    pub image_extensions: Vec<String>,
    /// Prefix filters; empty means everything.
    include: Vec<String>,
    /// JSON navigation file updated by `--update-nav`.
    pub nav_file: PathBuf,
    /// Extensions (without dot) treated as documents.
    pub source_extensions: Vec<String>,
    /// Extension (without dot) of written documents.
    pub target_extension: String,
    /// Explicit version roots; empty means discover subdirectories.
    pub versions: Vec<VersionEntry>,
}

/// Raw TOML structure for `.docmigrate.toml`.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DocmigrateTomlConfig {
    assets_root: Option<PathBuf>,
    assets_url: Option<String>,
    check_links: Option<bool>,
    #[serde(default)]
    exclude: Vec<String>,
    #[serde(default)]
    front_matter: FrontMatterTomlConfig,
    image_extensions: Option<Vec<String>>,
    #[serde(default)]
    include: Vec<String>,
    nav_file: Option<PathBuf>,
    source_extensions: Option<Vec<String>>,
    target_extension: Option<String>,
    #[serde(default)]
    versions: Vec<VersionEntry>,
}

/// Raw `[front_matter]` table.
#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FrontMatterTomlConfig {
    #[serde(default)]
    rewrite: Vec<FrontMatterField>,
}

impl Default for Config {
    fn default() -> Self {
        return Self {
            assets_root: None,
            assets_url: "/assets".to_string(),
            check_links: true,
            exclude: Vec::new(),
            front_matter: Vec::new(),
            image_extensions: ["png", "jpg", "jpeg", "gif", "svg", "webp", "avif", "ico"]
                .map(String::from)
                .to_vec(),
            include: Vec::new(),
            nav_file: PathBuf::from("docs.json"),
            source_extensions: vec!["md".to_string(), "mdx".to_string()],
            target_extension: "mdx".to_string(),
            versions: Vec::new(),
        };
    }
}

impl Config {
    /// Load config from `explicit` when given, otherwise from
    /// `.docmigrate.toml` in the source root.
    /// Returns defaults if the implicit file doesn't exist. Returns an error
    /// if a file exists but is malformed; never silently falls back to
    /// defaults when the user wrote a config file.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigNotFound` if an explicit path is missing,
    /// `Error::Io` if reading fails, or `Error::TomlDe` if the TOML is malformed.
    pub fn load(source_root: &Path, explicit: Option<&Path>) -> Result<Self, Error> {
        let path = explicit.map_or_else(|| return source_root.join(CONFIG_FILE_NAME), Path::to_path_buf);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if explicit.is_some() {
                    return Err(Error::ConfigNotFound { path });
                }
                log::debug!("no {CONFIG_FILE_NAME} in {}, using defaults", source_root.display());
                return Ok(Self::default());
            },
            Err(e) => return Err(Error::Io(e)),
        };

        log::debug!("loading config from {}", path.display());
        return Self::parse(&content);
    }

    /// Parse config TOML, filling unset keys with defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlDe` if the TOML is malformed or has unknown keys.
    pub fn parse(content: &str) -> Result<Self, Error> {
        let raw: DocmigrateTomlConfig = toml::from_str(content)?;
        let defaults = Self::default();
        return Ok(Self {
            assets_root: raw.assets_root,
            assets_url: raw
                .assets_url
                .map_or(defaults.assets_url, |u| return u.trim_end_matches('/').to_string()),
            check_links: raw.check_links.unwrap_or(defaults.check_links),
            exclude: raw.exclude,
            front_matter: raw.front_matter.rewrite,
            image_extensions: raw.image_extensions.map_or(defaults.image_extensions, lowercase_all),
            include: raw.include,
            nav_file: raw.nav_file.unwrap_or(defaults.nav_file),
            source_extensions: raw.source_extensions.map_or(defaults.source_extensions, lowercase_all),
            target_extension: raw
                .target_extension
                .map_or(defaults.target_extension, |e| return e.trim_start_matches('.').to_string()),
            versions: raw.versions,
        });
    }

    /// Whether `ext` (without dot, any case) names an image.
    pub fn is_image_extension(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        return self.image_extensions.iter().any(|e| return *e == ext);
    }

    /// Whether `ext` (without dot, any case) names a source document.
    pub fn is_source_extension(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        return self.source_extensions.iter().any(|e| return *e == ext);
    }

    /// Check whether a document or image path should be migrated.
    ///
    /// A path is included if no include patterns are set (migrate everything),
    /// or if the path starts with at least one include pattern.
    /// An included path is then excluded if it starts with any exclude pattern.
    pub fn should_scan(&self, relative_path: &str) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|p| return relative_path.starts_with(p.as_str()));

        if !included {
            return false;
        }

        return !self.exclude.iter().any(|p| return relative_path.starts_with(p.as_str()));
    }
}

/// Normalize configured extensions for case-insensitive comparison.
fn lowercase_all(exts: Vec<String>) -> Vec<String> {
    return exts
        .into_iter()
        .map(|e| return e.trim_start_matches('.').to_ascii_lowercase())
        .collect();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.target_extension, "mdx");
        assert_eq!(config.assets_url, "/assets");
        assert!(config.check_links);
        assert!(config.front_matter.is_empty());
        assert!(config.is_source_extension("MD"));
        assert!(config.is_image_extension("png"));
        assert!(!config.is_image_extension("md"));
    }

    #[test]
    fn include_and_exclude_are_prefix_filters() {
        let config = Config::parse(
            r#"
include = ["01-learn/"]
exclude = ["01-learn/99-archive/"]
"#,
        )
        .unwrap();
        assert!(config.should_scan("01-learn/00-intro.md"));
        assert!(!config.should_scan("02-build/00-intro.md"));
        assert!(!config.should_scan("01-learn/99-archive/old.md"));
    }

    #[test]
    fn parses_versions_and_front_matter_policy() {
        let config = Config::parse(
            r#"
assets_url = "/static/"
target_extension = ".mdx"

[front_matter]
rewrite = ["title", "description"]

[[versions]]
label = "next"
dir = "docs"
"#,
        )
        .unwrap();
        assert_eq!(config.assets_url, "/static");
        assert_eq!(config.target_extension, "mdx");
        assert_eq!(
            config.front_matter,
            vec![FrontMatterField::Title, FrontMatterField::Description]
        );
        assert_eq!(config.versions.len(), 1);
        assert_eq!(config.versions.first().unwrap().label, "next");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(Config::parse("inclde = []"), Err(Error::TomlDe(_))));
        assert!(matches!(
            Config::parse("[front_matter]\nrewrite = [\"slug\"]"),
            Err(Error::TomlDe(_))
        ));
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let result = Config::load(dir.path(), Some(&missing));
        assert!(matches!(result, Err(Error::ConfigNotFound { .. })));
    }

    #[test]
    fn missing_implicit_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path(), None).unwrap();
        assert_eq!(config.nav_file, PathBuf::from("docs.json"));
    }
}
