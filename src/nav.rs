//! Merge produced pages into the JSON navigation manifest.
//!
//! The manifest is loaded and validated before anything is migrated, so a
//! corrupt file stops the run while the output tree is still untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};

use crate::error::Error;
use crate::writer::Writer;

/// A navigation manifest whose shape has been checked: a JSON object with a
/// `navigation` array.
#[derive(Debug)]
pub struct Manifest {
    /// Where the manifest lives.
    path: PathBuf,
    /// The whole document; other keys are carried through untouched.
    root: Value,
}

impl Manifest {
    /// Read and validate `path`. A missing file counts as empty.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file exists but cannot be read, or
    /// `Error::NavCorrupt` if it has the wrong shape.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let existing = match std::fs::read_to_string(path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(Error::Io(e)),
        };
        return Self::parse(existing.as_deref(), path);
    }

    /// Validate manifest text; `None` or blank text is an empty manifest.
    ///
    /// # Errors
    ///
    /// Returns `Error::NavCorrupt` if the text is not JSON, the top level is
    /// not an object, or `navigation` is not an array.
    pub fn parse(existing: Option<&str>, path: &Path) -> Result<Self, Error> {
        let corrupt = |reason: String| return Error::NavCorrupt { path: path.to_path_buf(), reason };

        let mut root = match existing {
            Some(text) if !text.trim().is_empty() => {
                serde_json::from_str::<Value>(text).map_err(|e| return corrupt(e.to_string()))?
            },
            _ => Value::Object(Map::new()),
        };
        let Some(object) = root.as_object_mut() else {
            return Err(corrupt("top level is not an object".to_string()));
        };
        let navigation = object
            .entry("navigation")
            .or_insert_with(|| return Value::Array(Vec::new()));
        if !navigation.is_array() {
            return Err(corrupt("`navigation` is not an array".to_string()));
        }

        return Ok(Self { path: path.to_path_buf(), root });
    }

    /// Replace or append one `{product, version, pages}` entry per version.
    pub fn merge(&mut self, product: &str, pages: &BTreeMap<String, BTreeSet<String>>) {
        let Some(entries) = self.root.get_mut("navigation").and_then(Value::as_array_mut) else {
            return;
        };

        for (version, version_pages) in pages {
            let entry = json!({
                "product": product,
                "version": version,
                "pages": version_pages,
            });
            let slot = entries.iter_mut().find(|e| {
                return e.get("product").and_then(Value::as_str) == Some(product)
                    && e.get("version").and_then(Value::as_str) == Some(version.as_str());
            });
            if let Some(slot) = slot {
                *slot = entry;
                continue;
            }
            entries.push(entry);
        }
    }

    /// Pretty-printed JSON with a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if serialization fails.
    pub fn render(&self) -> Result<String, Error> {
        let mut out = serde_json::to_string_pretty(&self.root)?;
        out.push('\n');
        return Ok(out);
    }

    /// Hand the rendered manifest to the writer.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if serialization fails or `Error::Io` if writing
    /// fails.
    pub fn save(&self, writer: &Writer) -> Result<PathBuf, Error> {
        let text = self.render()?;
        return Ok(writer.write_file(&self.path, &text)?);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::OutputMode;

    fn pages(version: &str, ids: &[&str]) -> BTreeMap<String, BTreeSet<String>> {
        let mut map = BTreeMap::new();
        map.insert(version.to_string(), ids.iter().map(|s| s.to_string()).collect());
        return map;
    }

    fn merged(existing: Option<&str>, version: &str, ids: &[&str]) -> Value {
        let mut manifest = Manifest::parse(existing, Path::new("docs.json")).unwrap();
        manifest.merge("sdk", &pages(version, ids));
        return serde_json::from_str(&manifest.render().unwrap()).unwrap();
    }

    #[test]
    fn creates_manifest_from_nothing() {
        let value = merged(None, "next", &["sdk/next/intro"]);
        assert_eq!(
            value["navigation"],
            json!([{ "product": "sdk", "version": "next", "pages": ["sdk/next/intro"] }])
        );
    }

    #[test]
    fn replaces_matching_entry_and_keeps_the_rest() {
        let existing = r#"{
            "name": "Docs",
            "navigation": [
                { "product": "sdk", "version": "next", "pages": ["sdk/next/old"] },
                { "product": "cli", "version": "next", "pages": ["cli/next/a"] }
            ]
        }"#;
        let value = merged(Some(existing), "next", &["sdk/next/new"]);

        assert_eq!(value["name"], "Docs");
        let nav = value["navigation"].as_array().unwrap();
        assert_eq!(nav.len(), 2);
        assert_eq!(nav.first().unwrap()["pages"], json!(["sdk/next/new"]));
        assert_eq!(nav.get(1).unwrap()["product"], "cli");
    }

    #[test]
    fn wrong_shape_is_corrupt() {
        for text in ["[1, 2]", r#"{"navigation": {}}"#, "{not json"] {
            assert!(
                matches!(Manifest::parse(Some(text), Path::new("docs.json")), Err(Error::NavCorrupt { .. })),
                "{text}"
            );
        }
    }

    #[test]
    fn corrupt_file_fails_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let nav_path = dir.path().join("docs.json");
        std::fs::write(&nav_path, "{not json").unwrap();
        assert!(matches!(Manifest::load(&nav_path), Err(Error::NavCorrupt { .. })));
        assert!(Manifest::load(&dir.path().join("absent.json")).is_ok());
    }

    #[test]
    fn save_goes_through_the_writer() {
        let dir = tempfile::tempdir().unwrap();
        let nav_path = dir.path().join("docs.json");
        let mut manifest = Manifest::load(&nav_path).unwrap();
        manifest.merge("sdk", &pages("next", &["sdk/next/intro"]));

        let writer = Writer::new(OutputMode::DryRun, dir.path().join("out"), dir.path().join("assets"));
        manifest.save(&writer).unwrap();
        assert!(!nav_path.exists());

        let writer = Writer::new(OutputMode::Write, dir.path().join("out"), dir.path().join("assets"));
        manifest.save(&writer).unwrap();
        assert!(std::fs::read_to_string(&nav_path).unwrap().contains("sdk/next/intro"));
    }
}
