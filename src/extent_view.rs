//! The extent view: presents an ordered extent list over an underlying
//! random-access handle as a single logical `Read + Write + Seek` stream.
//!
//! Grounded in the teacher's generic-over-`Read`/`Write` style
//! (`bsdiff-android/src/patch.rs`'s `T: Read, W: io::Write`), generalized
//! per spec.md §9's design note to expose a concrete byte-stream interface
//! rather than a platform-specific "cookie I/O" stream.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::{Error, Result};
use crate::extent::{Extent, ExtentSequence, Offset};

/// A byte-addressable read/write/seek handle over an [`ExtentSequence`].
///
/// Value semantics own both the underlying handle and the extent array;
/// per spec.md §9's design note, no release hook is required for the
/// common case. [`ExtentView::with_release_hook`] supports callers that
/// still need one (e.g. an extent array shared with a wrapping object).
pub struct ExtentView<F> {
    file: F,
    extents: Vec<Extent>,
    prefix: Vec<u64>,
    logical_len: u64,
    logical_pos: u64,
    current_extent_ix: usize,
    /// Offset within the current extent; always 0 when `current_extent_ix`
    /// is past the last extent.
    intra_extent_pos: u64,
    /// Lazily tracked position of the underlying file's cursor; `None`
    /// means unknown (must reseek before the next non-sparse I/O).
    physical_pos: Option<u64>,
    release_hook: Option<Box<dyn FnOnce(Vec<Extent>)>>,
    /// Diagnostic counter incremented once per prefix-array comparison
    /// performed while locating a logical position; exists to support
    /// spec.md §8 property 7's white-box seek-locality test.
    pub(crate) seek_comparisons: u64,
}

impl<F> ExtentView<F> {
    /// Builds a view over `file` using an already-parsed extent sequence.
    pub fn new(file: F, extents: ExtentSequence) -> Self {
        let logical_len = extents.logical_len();
        let prefix = extents.prefix().to_vec();
        ExtentView {
            file,
            extents: extents.into_extents(),
            prefix,
            logical_len,
            logical_pos: 0,
            current_extent_ix: 0,
            intra_extent_pos: 0,
            physical_pos: None,
            release_hook: None,
            seek_comparisons: 0,
        }
    }

    /// Same as [`ExtentView::new`], but `hook` runs once on [`ExtentView::close`]
    /// with the extent array, mirroring the caller-supplied release hook of
    /// spec.md §6's `open_extent_view`.
    pub fn with_release_hook(
        file: F,
        extents: ExtentSequence,
        hook: impl FnOnce(Vec<Extent>) + 'static,
    ) -> Self {
        let mut view = Self::new(file, extents);
        view.release_hook = Some(Box::new(hook));
        view
    }

    /// Logical length of the view, `L = Σ eᵢ.length`.
    pub fn logical_len(&self) -> u64 {
        self.logical_len
    }

    /// Releases the underlying handle and runs the release hook, if any,
    /// with the extent array.
    pub fn close(mut self) {
        if let Some(hook) = self.release_hook.take() {
            hook(std::mem::take(&mut self.extents));
        }
    }

    /// Locates the extent index containing logical position `target`
    /// (`target == logical_len` maps to `extents.len()`, i.e. end-of-view).
    ///
    /// Implements spec.md §4.2's exponential-then-binary search: starting
    /// from the current extent, an interval is doubled outward until it
    /// brackets `target`, then a binary search over the prefix array picks
    /// out the exact extent. This keeps both sequential and
    /// locally-random seek patterns cheap relative to a plain
    /// `O(log n)` search from the array's midpoint every time.
    fn locate(&mut self, target: u64) -> usize {
        let n = self.extents.len();
        if target >= self.logical_len {
            return n;
        }

        let cur = self.current_extent_ix.min(n - 1);
        let mut i = cur;
        let mut j = cur;
        let mut step: usize = 1;
        loop {
            self.seek_comparisons += 1;
            let brackets = self.prefix[i] <= target && target < self.prefix[j + 1];
            if brackets || (i == 0 && j == n - 1) {
                break;
            }
            i = i.saturating_sub(step);
            j = (j + step).min(n - 1);
            step = step.saturating_mul(2);
        }

        // binary search within [i, j] using the prefix table (length n+1):
        // find the largest k with prefix[k] <= target.
        let mut lo = i;
        let mut hi = j;
        while lo < hi {
            self.seek_comparisons += 1;
            let mid = lo + (hi - lo + 1) / 2;
            if self.prefix[mid] <= target {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        lo
    }

    fn set_logical_pos(&mut self, target: u64) {
        let ix = self.locate(target);
        self.current_extent_ix = ix;
        self.intra_extent_pos = if ix < self.extents.len() {
            target - self.prefix[ix]
        } else {
            0
        };
        self.logical_pos = target;
    }
}

impl<F: Read + Write + Seek> ExtentView<F> {
    /// Fills `buf` from the current logical position, advancing it. A
    /// single call may satisfy the whole request across extent
    /// boundaries; it returns fewer bytes than requested only at
    /// end-of-view.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut total = 0usize;
        while total < buf.len() && self.current_extent_ix < self.extents.len() {
            let extent = self.extents[self.current_extent_ix];
            let remaining_in_extent = extent.length - self.intra_extent_pos;
            let want = (buf.len() - total).min(remaining_in_extent as usize);

            match extent.offset {
                Offset::Sparse => {
                    for b in &mut buf[total..total + want] {
                        *b = 0;
                    }
                }
                Offset::Physical(off) => {
                    let physical_target = off + self.intra_extent_pos;
                    self.reposition(physical_target)?;
                    let got = read_fully_up_to(&mut self.file, &mut buf[total..total + want])?;
                    self.physical_pos = Some(physical_target + got as u64);
                    if got < want {
                        self.advance(got as u64);
                        total += got;
                        return Ok(total);
                    }
                }
            }

            self.advance(want as u64);
            total += want;
        }
        Ok(total)
    }

    /// Writes up to `buf.len()` bytes at the current logical position,
    /// advancing it; sparse spans silently consume bytes without
    /// performing I/O. Writing past the logical end is an error.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.logical_pos >= self.logical_len {
            return Err(Error::ExtentBounds(format!(
                "write at logical end (pos {}, len {})",
                self.logical_pos, self.logical_len
            )));
        }

        let mut total = 0usize;
        while total < buf.len() && self.current_extent_ix < self.extents.len() {
            let extent = self.extents[self.current_extent_ix];
            let remaining_in_extent = extent.length - self.intra_extent_pos;
            let want = (buf.len() - total).min(remaining_in_extent as usize);

            match extent.offset {
                Offset::Sparse => {
                    // discarded: no underlying I/O
                }
                Offset::Physical(off) => {
                    let physical_target = off + self.intra_extent_pos;
                    self.reposition(physical_target)?;
                    self.file.write_all(&buf[total..total + want])?;
                    self.physical_pos = Some(physical_target + want as u64);
                }
            }

            self.advance(want as u64);
            total += want;
        }
        Ok(total)
    }

    /// Standard `SET`/`CUR`/`END` seek; the target must land in
    /// `[0, logical_len]`.
    pub fn seek_to(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => p as i128,
            SeekFrom::Current(d) => self.logical_pos as i128 + d as i128,
            SeekFrom::End(d) => self.logical_len as i128 + d as i128,
        };
        if target < 0 || target > self.logical_len as i128 {
            return Err(Error::ExtentBounds(format!(
                "seek target {target} out of range [0, {}]",
                self.logical_len
            )));
        }
        let target = target as u64;
        self.set_logical_pos(target);
        Ok(target)
    }

    fn reposition(&mut self, physical_target: u64) -> Result<()> {
        if self.physical_pos != Some(physical_target) {
            self.file.seek(SeekFrom::Start(physical_target))?;
            self.physical_pos = Some(physical_target);
        }
        Ok(())
    }

    fn advance(&mut self, n: u64) {
        self.logical_pos += n;
        self.intra_extent_pos += n;
        let cur_len = self.extents[self.current_extent_ix].length;
        if self.intra_extent_pos == cur_len {
            self.current_extent_ix += 1;
            self.intra_extent_pos = 0;
        }
    }
}

/// Reads into `buf` until it's full or the reader hits EOF, looping
/// through short reads the way a single positioned I/O call might return
/// them. Returns the number of bytes actually read.
fn read_fully_up_to<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match r.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

impl<F: Read + Write + Seek> Read for ExtentView<F> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        ExtentView::read(self, buf).map_err(to_io_error)
    }
}

impl<F: Read + Write + Seek> Write for ExtentView<F> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        ExtentView::write(self, buf).map_err(to_io_error)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl<F: Read + Write + Seek> Seek for ExtentView<F> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        ExtentView::seek_to(self, pos).map_err(to_io_error)
    }
}

fn to_io_error(e: Error) -> io::Error {
    match e {
        Error::Io { source, .. } => source,
        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
    }
}
