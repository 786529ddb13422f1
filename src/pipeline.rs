//! Book assembly, one stage at a time.
//!
//! An [`Assembly`] owns the input description and threads each stage's
//! result into the next:
//!
//! ```text
//! Created -> DefaultsResolved -> AssetsResolved -> PagesTransformed
//!         -> ManifestBuilt -> Packaged
//! ```
//!
//! `clean` may run from any stage and ends in `Cleaned`. Stages never run
//! backwards; calling one out of order fails with
//! [`Error::SequencingViolation`].

use std::fmt;
use std::io;
use std::path::PathBuf;

use log::info;

use crate::assets::{self, Fetch, HttpFetcher, ResolvedAssets};
use crate::book::{BookSpec, ResolvedBook, defaults};
use crate::config::{BuildConfig, OutputMode};
use crate::error::{Error, Result};
use crate::export::{self, Archive, ArchiveTarget, Manifest};
use crate::io::{FsStorage, MemoryStorage, Storage, Store};
use crate::transform::{self, TransformedPages};
use crate::util::uuid_v4;

/// Processing stage of a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Created,
    DefaultsResolved,
    AssetsResolved,
    PagesTransformed,
    ManifestBuilt,
    Packaged,
    Cleaned,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Created => "created",
            Stage::DefaultsResolved => "defaults-resolved",
            Stage::AssetsResolved => "assets-resolved",
            Stage::PagesTransformed => "pages-transformed",
            Stage::ManifestBuilt => "manifest-built",
            Stage::Packaged => "packaged",
            Stage::Cleaned => "cleaned",
        };
        f.write_str(name)
    }
}

/// What a finished build produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutput {
    /// An `.epub` file on disk.
    Archive(PathBuf),
    /// An unzipped book tree on disk.
    Tree(PathBuf),
    /// The archive bytes of an in-memory build.
    Bytes(Vec<u8>),
}

/// The assembly of one book.
pub struct Assembly<F = HttpFetcher> {
    spec: BookSpec,
    config: BuildConfig,
    fetcher: F,
    store: Store,
    build_id: String,
    stage: Stage,
    book: Option<ResolvedBook>,
    assets: Option<ResolvedAssets>,
    pages: Option<TransformedPages>,
    manifest: Option<Manifest>,
    output: Option<BuildOutput>,
}

impl Assembly<HttpFetcher> {
    /// Start an assembly that fetches remote sources over HTTP.
    pub fn new(spec: BookSpec, config: BuildConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.user_agent).map_err(Error::HttpClient)?;
        Ok(Self::with_fetcher(spec, config, fetcher))
    }
}

impl<F: Fetch> Assembly<F> {
    pub fn with_fetcher(spec: BookSpec, config: BuildConfig, fetcher: F) -> Self {
        let build_id = uuid_v4();
        let store = match &config.output {
            OutputMode::Filesystem { dir, .. } => Store::Fs(FsStorage::new(dir.join(&build_id))),
            OutputMode::Memory => Store::Memory(MemoryStorage::new()),
        };
        Self {
            spec,
            config,
            fetcher,
            store,
            build_id,
            stage: Stage::Created,
            book: None,
            assets: None,
            pages: None,
            manifest: None,
            output: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Random id naming the working tree and, by default, the archive.
    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    pub fn storage(&self) -> &Store {
        &self.store
    }

    pub fn book(&self) -> Option<&ResolvedBook> {
        self.book.as_ref()
    }

    pub fn assets(&self) -> Option<&ResolvedAssets> {
        self.assets.as_ref()
    }

    pub fn pages(&self) -> Option<&TransformedPages> {
        self.pages.as_ref()
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    pub fn output(&self) -> Option<&BuildOutput> {
        self.output.as_ref()
    }

    /// Validate the input and fill in defaults. Idempotent.
    pub fn resolve_defaults(&mut self) -> Result<&ResolvedBook> {
        const OPERATION: &str = "resolve_defaults";
        match self.stage {
            Stage::Created => {
                let book = defaults::resolve(&self.spec)?;
                info!("Resolved defaults for '{}'", book.title);
                self.stage = Stage::DefaultsResolved;
                Ok(&*self.book.insert(book))
            }
            Stage::Cleaned => Err(self.violation(OPERATION)),
            _ => self.book.as_ref().ok_or_else(|| self.violation(OPERATION)),
        }
    }

    /// Fetch and store every asset.
    pub async fn resolve_assets(&mut self) -> Result<&ResolvedAssets> {
        const OPERATION: &str = "resolve_assets";
        self.require(OPERATION, Stage::DefaultsResolved)?;
        let book = self.book.as_ref().ok_or_else(|| self.violation(OPERATION))?;

        let assets = assets::resolve(book, &self.fetcher, &self.store).await?;
        info!("Resolved {} assets", assets.all().count());
        self.stage = Stage::AssetsResolved;
        Ok(&*self.assets.insert(assets))
    }

    /// Rewrite and store every page.
    pub async fn transform_pages(&mut self) -> Result<&TransformedPages> {
        const OPERATION: &str = "transform_pages";
        self.require(OPERATION, Stage::AssetsResolved)?;
        let (Some(book), Some(assets)) = (&self.book, &self.assets) else {
            return Err(self.violation(OPERATION));
        };

        let pages = transform::transform_pages(book, assets, &self.store).await?;
        self.stage = Stage::PagesTransformed;
        Ok(&*self.pages.insert(pages))
    }

    /// Build the manifest and store the package and navigation documents.
    pub async fn build_manifest(&mut self) -> Result<&Manifest> {
        const OPERATION: &str = "build_manifest";
        self.require(OPERATION, Stage::PagesTransformed)?;
        let (Some(book), Some(assets), Some(pages)) = (&self.book, &self.assets, &self.pages)
        else {
            return Err(self.violation(OPERATION));
        };

        let manifest = export::write_manifest(book, assets, pages, &self.store).await?;
        self.stage = Stage::ManifestBuilt;
        Ok(&*self.manifest.insert(manifest))
    }

    /// Zip the stored tree, or hand back the tree itself for unarchived builds.
    pub async fn package(&mut self) -> Result<&BuildOutput> {
        const OPERATION: &str = "package";
        self.require(OPERATION, Stage::ManifestBuilt)?;
        let (Some(book), Some(assets), Some(pages)) = (&self.book, &self.assets, &self.pages)
        else {
            return Err(self.violation(OPERATION));
        };

        let target = match &self.config.output {
            OutputMode::Memory => Some(ArchiveTarget::Memory),
            OutputMode::Filesystem { .. } if !self.config.archive => None,
            OutputMode::Filesystem { dir, file_name } => {
                let name = file_name
                    .clone()
                    .unwrap_or_else(|| format!("{}.epub", self.build_id));
                Some(ArchiveTarget::File(dir.join(name)))
            }
        };

        let output = match (target, self.store.root()) {
            (Some(target), _) => {
                let paths = export::archive_paths(book.viewport.is_some(), assets, pages);
                match export::package(&self.store, &paths, self.config.compression_level, target)
                    .await?
                {
                    Archive::File(path) => BuildOutput::Archive(path),
                    Archive::Bytes(bytes) => BuildOutput::Bytes(bytes),
                }
            }
            (None, Some(root)) => {
                info!("Left unarchived book tree at {}", root.display());
                BuildOutput::Tree(root.to_path_buf())
            }
            (None, None) => return Err(self.violation(OPERATION)),
        };

        self.stage = Stage::Packaged;
        Ok(&*self.output.insert(output))
    }

    /// Run every remaining stage and return the result.
    pub async fn build(&mut self) -> Result<BuildOutput> {
        self.resolve_defaults()?;
        self.resolve_assets().await?;
        self.transform_pages().await?;
        self.build_manifest().await?;
        self.package().await.cloned()
    }

    /// Remove the working tree and the archive, if any.
    pub async fn clean(&mut self) -> Result<()> {
        if self.stage == Stage::Cleaned {
            return Ok(());
        }

        let tree = self
            .store
            .root()
            .map(|root| root.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string());
        self.store
            .remove_all()
            .await
            .map_err(|cause| Error::Clean { path: tree, cause })?;

        if let Some(BuildOutput::Archive(path)) = &self.output {
            match tokio::fs::remove_file(path).await {
                Err(e) if e.kind() != io::ErrorKind::NotFound => {
                    return Err(Error::Clean {
                        path: path.display().to_string(),
                        cause: e,
                    });
                }
                _ => {}
            }
        }

        info!("Cleaned build {}", self.build_id);
        self.stage = Stage::Cleaned;
        Ok(())
    }

    fn require(&self, operation: &'static str, stage: Stage) -> Result<()> {
        if self.stage == stage {
            Ok(())
        } else {
            Err(self.violation(operation))
        }
    }

    fn violation(&self, operation: &'static str) -> Error {
        Error::SequencingViolation {
            operation,
            stage: self.stage,
        }
    }
}

/// Assemble `spec` in one go.
///
/// Validation runs before any fetch or write, so a missing title or cover
/// fails without touching the network or the disk.
pub async fn build_epub(spec: BookSpec, config: BuildConfig) -> Result<BuildOutput> {
    defaults::resolve(&spec)?;
    Assembly::new(spec, config)?.build().await
}
