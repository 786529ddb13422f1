//! # folio
//!
//! Assemble EPUB 3 packages from declarative book descriptions.
//!
//! ## Features
//!
//! - Pages as HTML fragments, inline or from local files
//! - Cover, images, audio and video fetched from local files, `data:` URIs or
//!   over HTTP, each source exactly once
//! - EPUB 3 package document with an EPUB 2 NCX for older readers
//! - Fixed-layout books with a declared viewport
//! - Build on disk or entirely in memory
//!
//! ## Quick Start
//!
//! ```no_run
//! use folio::{BookSpec, BuildConfig, BuildOutput, PageSpec, build_epub};
//!
//! # async fn run() -> folio::Result<()> {
//! let spec = BookSpec::new("Field Notes", "https://example.com/cover.jpg")
//!     .with_creator("A. Writer")
//!     .with_page(PageSpec::new("<h1>One</h1><p>First page.</p>").in_toc());
//!
//! match build_epub(spec, BuildConfig::for_path("out/field-notes.epub")).await? {
//!     BuildOutput::Archive(path) => println!("wrote {}", path.display()),
//!     other => println!("built {other:?}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Stage by stage
//!
//! [`Assembly`] exposes each stage separately, for callers that want to
//! inspect the resolved assets or manifest before packaging:
//!
//! ```no_run
//! use folio::{Assembly, BookSpec, BuildConfig, PageSpec};
//!
//! # async fn run() -> folio::Result<()> {
//! let spec = BookSpec::new("Notes", "cover.png").with_page(PageSpec::new("<p>Hi</p>"));
//! let mut assembly = Assembly::new(spec, BuildConfig::memory())?;
//! assembly.resolve_defaults()?;
//! assembly.resolve_assets().await?;
//! assembly.transform_pages().await?;
//! let manifest = assembly.build_manifest().await?;
//! println!("{} manifest items", manifest.items.len());
//! assembly.package().await?;
//! # Ok(())
//! # }
//! ```

pub mod assets;
pub mod book;
pub mod config;
pub mod error;
pub mod export;
pub mod io;
pub mod markup;
pub mod pipeline;
pub mod transform;
pub(crate) mod util;

pub use book::{BookSpec, Contributor, DateInput, FixedFormat, Identifier, PageSpec, ResolvedBook};
pub use config::{BuildConfig, OutputMode};
pub use error::{Error, FetchError, Result};
pub use pipeline::{Assembly, BuildOutput, Stage, build_epub};
