//! I/O glue: maps the logical old/new byte views — plain file or
//! extent-backed — onto the reconstruction engine, and exposes the public
//! operations spec.md §6 names.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::path::Path;

use crate::error::{Error, Result};
use crate::extent::{Extent, ExtentSequence};
use crate::extent_view::ExtentView;
use crate::header::read_header;
use crate::streams::{open_sub_streams, ReadSeek};
use crate::{engine, extent};

/// How an [`open_extent_view`] caller intends to use the resulting view.
///
/// Mirrors spec.md §6: `read` never creates the underlying file; `write`
/// opens write-only *without* truncation, since the extents — not the
/// file's prior length — define the span in use and truncating would
/// destroy data outside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Read,
    Write,
    ReadWrite,
}

/// Opens `path` per `mode` and wraps it in an [`ExtentView`] over
/// `extents`. Matches spec.md §6's `open_extent_view(file_or_fd, mode,
/// extent_sequence, release_hook?)`; the release hook is exposed via
/// [`ExtentView::with_release_hook`] on the returned view when needed —
/// most callers don't need one (spec.md §9).
pub fn open_extent_view(
    path: &Path,
    mode: ViewMode,
    extents: ExtentSequence,
) -> Result<ExtentView<File>> {
    let file = match mode {
        ViewMode::Read => OpenOptions::new().read(true).open(path),
        ViewMode::Write => OpenOptions::new().write(true).create(true).open(path),
        ViewMode::ReadWrite => OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path),
    }
    .map_err(|e| Error::from(e).with_path(path))?;

    Ok(ExtentView::new(file, extents))
}

fn synthetic_whole_file_extents(len: u64) -> Result<ExtentSequence> {
    let extents = if len == 0 {
        Vec::new()
    } else {
        vec![Extent::new_physical(0, len)]
    };
    Ok(ExtentSequence::from_extents(extents)?)
}

/// Applies `patch_path` (a BSDIFF40 patch) to `old_path`, writing the
/// result to `new_path`. `old_extents`/`new_extents`, when given, are
/// extent specification strings (spec.md §4.1); when omitted, the whole
/// file is used as a single contiguous extent, per spec.md §4.6.
///
/// Matches spec.md §6's `apply_patch(old_path, new_path, patch_path,
/// old_extents?, new_extents?)`.
pub fn apply_patch(
    old_path: &Path,
    new_path: &Path,
    patch_path: &Path,
    old_extents: Option<&str>,
    new_extents: Option<&str>,
) -> Result<()> {
    let header = {
        let mut f = File::open(patch_path).map_err(|e| Error::from(e).with_path(patch_path))?;
        read_header(&mut f)?
    };

    let old_seq = match old_extents {
        Some(spec) => extent::parse_extents(spec)?,
        None => {
            let len = File::open(old_path)
                .map_err(|e| Error::from(e).with_path(old_path))?
                .seek(SeekFrom::End(0))
                .map_err(|e| Error::from(e).with_path(old_path))?;
            synthetic_whole_file_extents(len)?
        }
    };
    let mut old_view = open_extent_view(old_path, ViewMode::Read, old_seq)?;

    let patch_path_owned = patch_path.to_path_buf();
    let mut streams = open_sub_streams(
        move || -> Result<Box<dyn ReadSeek>> {
            let f = File::open(&patch_path_owned)
                .map_err(|e| Error::from(e).with_path(patch_path_owned.as_path()))?;
            Ok(Box::new(f))
        },
        header.ctrl_compressed_len,
        header.diff_compressed_len,
    )?;

    let new_image = engine::reconstruct(
        &mut old_view,
        &mut *streams.ctrl,
        &mut *streams.diff,
        &mut *streams.extra,
        header.new_image_len,
    )?;

    let new_seq = match new_extents {
        Some(spec) => extent::parse_extents(spec)?,
        None => synthetic_whole_file_extents(header.new_image_len)?,
    };
    let mut new_view = open_extent_view(new_path, ViewMode::Write, new_seq)?;

    let mut written = 0usize;
    while written < new_image.len() {
        let n = new_view.write(&new_image[written..])?;
        if n == 0 {
            return Err(Error::ExtentBounds(
                "new view refused bytes before the image was fully written".into(),
            ));
        }
        written += n;
    }

    Ok(())
}
