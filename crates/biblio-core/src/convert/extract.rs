//! Extraction of a source document from an uploaded archive.
//!
//! Uploads may arrive as ZIP containers (commonly `.fb2.zip`). Exactly one
//! recognized document is materialized into the caller's scratch directory;
//! the archive itself is never modified or deleted, and scratch cleanup is
//! owned by the caller.

use crate::catalog::BookFormat;
use crate::{BiblioError, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extract the first recognized source document out of `archive_path`.
///
/// Members are scanned in their stored order. An unreadable container maps to
/// `CorruptArchive`; a readable container with no recognized member maps to
/// `NoMatchingMember`. The extracted file keeps its basename (member paths
/// are flattened).
pub fn extract_source_document(archive_path: &Path, scratch_dir: &Path) -> Result<PathBuf> {
    let corrupt = |detail: String| BiblioError::CorruptArchive {
        path: archive_path.to_path_buf(),
        detail,
    };

    let file = File::open(archive_path)
        .map_err(|e| BiblioError::io_with_path(e, archive_path))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| corrupt(e.to_string()))?;

    for index in 0..archive.len() {
        let mut member = archive
            .by_index(index)
            .map_err(|e| corrupt(e.to_string()))?;
        if member.is_dir() {
            continue;
        }

        // enclosed_name rejects entries that would escape the scratch dir
        let Some(member_path) = member.enclosed_name() else {
            continue;
        };
        if BookFormat::from_extension(&member_path).is_none() {
            continue;
        }

        let file_name = member_path
            .file_name()
            .ok_or_else(|| corrupt(format!("member {} has no file name", member.name())))?;

        std::fs::create_dir_all(scratch_dir)
            .map_err(|e| BiblioError::io_with_path(e, scratch_dir))?;
        let out_path = scratch_dir.join(file_name);

        let mut out_file =
            File::create(&out_path).map_err(|e| BiblioError::io_with_path(e, &out_path))?;
        std::io::copy(&mut member, &mut out_file).map_err(|e| corrupt(e.to_string()))?;

        debug!(
            "Extracted {} from {} to {}",
            member.name(),
            archive_path.display(),
            out_path.display()
        );
        return Ok(out_path);
    }

    Err(BiblioError::NoMatchingMember {
        path: archive_path.to_path_buf(),
    })
}
