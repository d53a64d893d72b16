//! The only component that mutates the filesystem.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::hasher;
use crate::types::Checksum;

/// How output reaches the filesystem. Chosen once per run and consumed only
/// by the [`Writer`]; upstream components never see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Compute everything, touch nothing.
    DryRun,
    /// Write under `root` instead of the real destinations, mirroring them
    /// as `target/`, `assets/` and `nav/`.
    Staging {
        /// Staging directory.
        root: PathBuf,
    },
    /// Write to the real destinations.
    Write,
}

/// Result of dispatching a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Another document already claimed this destination in this run.
    Collision,
    /// Written (or would be, in dry-run) at this path.
    Written(PathBuf),
}

/// Result of dispatching an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    /// Copied (or would be, in dry-run).
    Copied,
    /// Same destination already claimed with different bytes; first copy kept.
    Conflict,
    /// Same destination already claimed with identical bytes.
    Duplicate,
}

/// Applies output side effects according to an [`OutputMode`].
#[derive(Debug)]
pub struct Writer {
    /// Root images are copied into.
    assets_root: PathBuf,
    /// Document destinations claimed this run.
    claimed_documents: HashSet<PathBuf>,
    /// Image destinations claimed this run, with their content checksum.
    claimed_images: HashMap<PathBuf, Checksum>,
    /// Selected mode.
    mode: OutputMode,
    /// Root documents are written into.
    target_root: PathBuf,
}

impl Writer {
    /// A writer for the given roots.
    pub fn new(mode: OutputMode, target_root: PathBuf, assets_root: PathBuf) -> Self {
        return Self {
            assets_root,
            claimed_documents: HashSet::new(),
            claimed_images: HashMap::new(),
            mode,
            target_root,
        };
    }

    /// Selected mode.
    pub const fn mode(&self) -> &OutputMode {
        return &self.mode;
    }

    /// Create the output roots. Failure here aborts the run.
    ///
    /// # Errors
    ///
    /// Returns `Error::OutputRootUnwritable` if a root cannot be created.
    pub fn prepare_roots(&self) -> Result<(), Error> {
        if self.mode == OutputMode::DryRun {
            return Ok(());
        }
        for root in [self.document_root(), self.image_root()] {
            std::fs::create_dir_all(&root).map_err(|source| {
                return Error::OutputRootUnwritable { path: root.clone(), source };
            })?;
        }
        return Ok(());
    }

    /// Directory documents actually land in.
    pub fn document_root(&self) -> PathBuf {
        return match &self.mode {
            OutputMode::Staging { root } => root.join("target"),
            OutputMode::DryRun | OutputMode::Write => self.target_root.clone(),
        };
    }

    /// Directory images actually land in.
    pub fn image_root(&self) -> PathBuf {
        return match &self.mode {
            OutputMode::Staging { root } => root.join("assets"),
            OutputMode::DryRun | OutputMode::Write => self.assets_root.clone(),
        };
    }

    /// Write a document at `relative` under the target root, overwriting.
    /// Each destination is claimed once per run; later claims collide.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file or its parents cannot be written.
    pub fn write_document(&mut self, relative: &Path, content: &str) -> Result<WriteOutcome, std::io::Error> {
        if !self.claimed_documents.insert(relative.to_path_buf()) {
            return Ok(WriteOutcome::Collision);
        }

        let dest = self.document_root().join(relative);
        self.put(&dest, content.as_bytes())?;
        return Ok(WriteOutcome::Written(dest));
    }

    /// Copy image bytes to `relative` under the assets root. The first
    /// claim of a destination wins.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file or its parents cannot be written.
    pub fn copy_image(&mut self, relative: &Path, bytes: &[u8]) -> Result<ImageOutcome, std::io::Error> {
        let sum = hasher::checksum(bytes);
        if let Some(existing) = self.claimed_images.get(relative) {
            if *existing == sum {
                return Ok(ImageOutcome::Duplicate);
            }
            return Ok(ImageOutcome::Conflict);
        }
        self.claimed_images.insert(relative.to_path_buf(), sum);

        let dest = self.image_root().join(relative);
        if self.mode != OutputMode::DryRun && std::fs::read(&dest).is_ok_and(|current| return current == bytes) {
            log::trace!("image unchanged: {}", dest.display());
            return Ok(ImageOutcome::Copied);
        }
        self.put(&dest, bytes)?;
        return Ok(ImageOutcome::Copied);
    }

    /// Write an auxiliary file such as the navigation manifest. In staging
    /// mode it lands under `nav/` keeping its file name.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file or its parents cannot be written.
    pub fn write_file(&self, path: &Path, content: &str) -> Result<PathBuf, std::io::Error> {
        let dest = match &self.mode {
            OutputMode::Staging { root } => {
                let name = path.file_name().map_or_else(|| return PathBuf::from("nav.json"), PathBuf::from);
                root.join("nav").join(name)
            },
            OutputMode::DryRun | OutputMode::Write => path.to_path_buf(),
        };
        self.put(&dest, content.as_bytes())?;
        return Ok(dest);
    }

    /// Create parents and write, unless in dry-run.
    fn put(&self, dest: &Path, bytes: &[u8]) -> Result<(), std::io::Error> {
        if self.mode == OutputMode::DryRun {
            log::debug!("dry-run: would write {}", dest.display());
            return Ok(());
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, bytes)?;
        log::debug!("wrote {}", dest.display());
        return Ok(());
    }
}
