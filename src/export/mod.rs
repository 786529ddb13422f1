//! Manifest construction, document templates and the EPUB packager.
//!
//! The manifest stage renders every structural document of the container
//! into storage. The packager then reads the whole tree back and zips it.

mod epub;
pub mod manifest;
pub mod templates;

pub use epub::{
    Archive, ArchiveEntry, ArchiveTarget, DEFAULT_COMPRESSION_LEVEL, archive_paths, package,
    write_archive,
};
pub use manifest::{Manifest, ManifestItem, NavEntry, build_manifest, write_manifest};
pub use templates::{Template, TemplateId};
