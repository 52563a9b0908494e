//! Triple-stream decoder: three independent bzip2 cursors over one patch
//! file at disjoint byte offsets (spec.md §4.4).
//!
//! The patch generator/physical-file-open collaborators named out of
//! scope in spec.md §1 mean this module only needs a way to *open a fresh
//! positioned reader* — it doesn't care whether that reader is backed by
//! a file, a byte slice, or anything else `Read + Seek`. That's expressed
//! as a factory closure rather than a concrete `File` type so both
//! `apply_patch`'s path-based entry point and in-memory tests share one
//! implementation.

use std::io::{Read, Seek, SeekFrom};

use bzip2::read::BzDecoder;

use crate::error::{Error, Result};
use crate::header::HEADER_LEN;

/// Blanket-implemented so `Box<dyn ReadSeek>` is usable where the standard
/// library has no single built-in trait for "reads and seeks".
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// The three decompressed sub-stream cursors an `apply_patch` run reads
/// from. Each is consumed strictly sequentially and independently, as
/// spec.md §4.4 requires.
pub struct SubStreams {
    pub ctrl: Box<dyn Read>,
    pub diff: Box<dyn Read>,
    pub extra: Box<dyn Read>,
}

/// Opens the three bzip2 sub-streams described by a patch header.
///
/// `open` must produce a fresh handle seeked to the start of the
/// underlying patch file each time it's called; this function seeks each
/// of the three handles to its own stream's start offset and wraps it in
/// a bzip2 decoder, bounding the `ctrl` and `diff` streams to their
/// declared compressed lengths with [`Read::take`]. The `extra` stream's
/// length is implicit — it runs to the end of the file, per spec.md §6.
pub fn open_sub_streams<O>(mut open: O, ctrl_len: u64, diff_len: u64) -> Result<SubStreams>
where
    O: FnMut() -> Result<Box<dyn ReadSeek>>,
{
    let ctrl_start = HEADER_LEN as u64;
    let diff_start = ctrl_start
        .checked_add(ctrl_len)
        .ok_or_else(|| Error::CorruptPatch("control stream length overflows u64".into()))?;
    let extra_start = diff_start
        .checked_add(diff_len)
        .ok_or_else(|| Error::CorruptPatch("diff stream length overflows u64".into()))?;

    let ctrl = positioned(open()?, ctrl_start)?;
    let diff = positioned(open()?, diff_start)?;
    let extra = positioned(open()?, extra_start)?;

    Ok(SubStreams {
        ctrl: Box::new(BzDecoder::new(ctrl.take(ctrl_len))),
        diff: Box::new(BzDecoder::new(diff.take(diff_len))),
        extra: Box::new(BzDecoder::new(extra)),
    })
}

fn positioned(mut handle: Box<dyn ReadSeek>, start: u64) -> Result<Box<dyn ReadSeek>> {
    handle.seek(SeekFrom::Start(start))?;
    Ok(handle)
}
