//! EPUB packager.
//!
//! Reads the finished file tree back from storage and zips it into an OCF
//! container: `mimetype` first and stored, everything else deflated.

use std::io::{self, Cursor, Seek, Write};
use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use log::{debug, info};
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::assets::ResolvedAssets;
use crate::error::{Error, Result, io_error};
use crate::io::Storage;
use crate::transform::TransformedPages;

use super::templates::{MIMETYPE_PATH, TemplateId};

/// Default deflate level.
pub const DEFAULT_COMPRESSION_LEVEL: i64 = 6;

const MEMORY_TARGET: &str = "<memory>";

/// One file of the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Where the finished archive goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveTarget {
    File(PathBuf),
    Memory,
}

/// A finished archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Archive {
    File(PathBuf),
    Bytes(Vec<u8>),
}

impl ArchiveTarget {
    fn describe(&self) -> String {
        match self {
            ArchiveTarget::File(path) => path.display().to_string(),
            ArchiveTarget::Memory => MEMORY_TARGET.to_string(),
        }
    }
}

/// Every path of the book tree, in archive order.
///
/// Structural documents come first, then pages, media, styles and scripts.
pub fn archive_paths(
    display_options: bool,
    assets: &ResolvedAssets,
    pages: &TransformedPages,
) -> Vec<String> {
    let mut structural = vec![TemplateId::Container];
    if display_options {
        structural.push(TemplateId::DisplayOptions);
    }
    structural.extend([TemplateId::Package, TemplateId::Nav, TemplateId::Ncx]);

    let mut paths = vec![MIMETYPE_PATH.to_string()];
    paths.extend(
        structural
            .into_iter()
            .filter_map(TemplateId::path)
            .map(str::to_string),
    );
    paths.extend(pages.pages.iter().map(|page| page.path()));
    paths.extend(assets.all().map(|asset| asset.path()));
    paths
}

/// Write `entries` as a zip archive.
///
/// The first entry is stored uncompressed; callers put `mimetype` there.
pub fn write_archive<W: Write + Seek>(
    entries: &[ArchiveEntry],
    compression_level: Option<i64>,
    writer: W,
) -> io::Result<W> {
    let mut zip = ZipWriter::new(writer);

    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(
            compression_level.unwrap_or(DEFAULT_COMPRESSION_LEVEL),
        ));

    for (i, entry) in entries.iter().enumerate() {
        let options = if i == 0 { stored } else { deflated };
        zip.start_file(entry.name.as_str(), options)
            .map_err(io_error)?;
        zip.write_all(&entry.bytes)?;
    }

    zip.finish().map_err(io_error)
}

/// Read `paths` from `storage` and zip them into `target`.
pub async fn package<S: Storage>(
    storage: &S,
    paths: &[String],
    compression_level: Option<i64>,
    target: ArchiveTarget,
) -> Result<Archive> {
    let entries = try_join_all(paths.iter().map(|path| async move {
        let bytes = storage
            .read(path)
            .await
            .map_err(|cause| Error::ArchiveWriteFailed {
                path: path.clone(),
                cause,
            })?;
        Ok::<_, Error>(ArchiveEntry {
            name: path.clone(),
            bytes,
        })
    }))
    .await?;
    debug!("Collected {} archive entries", entries.len());

    let described = target.describe();
    let archive = tokio::task::spawn_blocking(move || -> io::Result<Archive> {
        match target {
            ArchiveTarget::File(path) => {
                write_archive_file(&entries, compression_level, &path)?;
                Ok(Archive::File(path))
            }
            ArchiveTarget::Memory => {
                let cursor = write_archive(&entries, compression_level, Cursor::new(Vec::new()))?;
                Ok(Archive::Bytes(cursor.into_inner()))
            }
        }
    })
    .await
    .map_err(io_error)
    .and_then(|result| result)
    .map_err(|cause| Error::ArchiveWriteFailed {
        path: described.clone(),
        cause,
    })?;

    info!("Packaged {} files into {described}", paths.len());
    Ok(archive)
}

fn write_archive_file(
    entries: &[ArchiveEntry],
    compression_level: Option<i64>,
    path: &Path,
) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let written = write_archive(entries, compression_level, file).and_then(|mut file| file.flush());
    if written.is_err() {
        let _ = std::fs::remove_file(path);
    }
    written
}
