//! Extent grammar parser and the flat extent sequence it produces.
//!
//! Grammar: `pair ("," pair)*`, `pair = offset ":" length`,
//! `offset = "-"? digit+`, `length = digit+`. No whitespace. The empty
//! string is rejected.

use crate::error::ExtentParseError;

/// One `(offset, length)` range. A sparse extent (negative offset in the
/// spec text) is normalized to `Offset::Sparse` at parse time; its original
/// magnitude isn't retained since only the sign carries meaning (spec.md
/// §4.1: "any negative value is normalized to sparse").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offset {
    /// A byte offset into the underlying file.
    Physical(u64),
    /// Reads as zeros; writes are discarded.
    Sparse,
}

/// A single extent: an offset (physical or sparse) and a strictly positive
/// length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub offset: Offset,
    pub length: u64,
}

impl Extent {
    pub fn new_physical(offset: u64, length: u64) -> Self {
        Extent {
            offset: Offset::Physical(offset),
            length,
        }
    }

    pub fn new_sparse(length: u64) -> Self {
        Extent {
            offset: Offset::Sparse,
            length,
        }
    }

    #[inline]
    pub fn is_sparse(&self) -> bool {
        matches!(self.offset, Offset::Sparse)
    }
}

/// A parsed, validated extent list together with its prefix-length table.
///
/// `prefix[k]` is the logical offset at which extent `k` begins;
/// `prefix[n] == logical_len()` caps the table so range lookups never need
/// a special case for "one past the last extent".
#[derive(Debug, Clone)]
pub struct ExtentSequence {
    extents: Vec<Extent>,
    prefix: Vec<u64>,
}

impl ExtentSequence {
    /// Wraps an already-built, non-empty extent list (e.g. the single
    /// synthetic extent used for a plain, non-extent-backed file).
    ///
    /// The extent grammar (`parse`) never produces an empty list — the
    /// empty string is rejected at that layer. An empty `extents` here is
    /// still accepted, representing a logical length of zero; this is
    /// how a genuinely empty plain old/new file is modeled when no
    /// extent string was supplied (spec.md §4.6).
    ///
    /// Fails with `Overflow` if the cumulative logical length overflows
    /// `u64` — reachable from untrusted input via `parse`, so this
    /// surfaces as an error rather than panicking.
    pub fn from_extents(extents: Vec<Extent>) -> Result<Self, ExtentParseError> {
        let mut prefix = Vec::with_capacity(extents.len() + 1);
        let mut acc = 0u64;
        prefix.push(0);
        for e in &extents {
            acc = acc.checked_add(e.length).ok_or(ExtentParseError::Overflow)?;
            prefix.push(acc);
        }
        Ok(ExtentSequence { extents, prefix })
    }

    /// Parses an extent specification string per spec.md §4.1.
    pub fn parse(spec: &str) -> Result<Self, ExtentParseError> {
        if spec.is_empty() {
            return Err(ExtentParseError::BadGrammar);
        }
        if spec.bytes().any(|b| b.is_ascii_whitespace()) {
            return Err(ExtentParseError::BadGrammar);
        }

        let mut extents = Vec::new();
        for pair in spec.split(',') {
            let mut parts = pair.splitn(2, ':');
            let offset_str = parts.next().ok_or(ExtentParseError::BadGrammar)?;
            let length_str = parts.next().ok_or(ExtentParseError::BadGrammar)?;
            if offset_str.is_empty() || length_str.is_empty() {
                return Err(ExtentParseError::BadGrammar);
            }

            let offset = parse_offset(offset_str)?;
            let length = parse_length(length_str)?;
            extents.push(Extent { offset, length });
        }

        Self::from_extents(extents)
    }

    pub fn extents(&self) -> &[Extent] {
        &self.extents
    }

    pub fn prefix(&self) -> &[u64] {
        &self.prefix
    }

    /// Total logical length `L = Σ eᵢ.length`.
    pub fn logical_len(&self) -> u64 {
        *self.prefix.last().expect("prefix table is never empty")
    }

    pub fn len(&self) -> usize {
        self.extents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extents.is_empty()
    }

    pub fn into_extents(self) -> Vec<Extent> {
        self.extents
    }
}

/// Public entry point matching spec.md §6's `parse_extents(string)`.
pub fn parse_extents(spec: &str) -> Result<ExtentSequence, ExtentParseError> {
    ExtentSequence::parse(spec)
}

fn parse_offset(s: &str) -> Result<Offset, ExtentParseError> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ExtentParseError::BadGrammar);
    }
    let magnitude: u128 = digits.parse().map_err(|_| ExtentParseError::Overflow)?;

    if negative {
        // offset < 0 is sparse regardless of magnitude, but the literal
        // itself must still fit a signed 64-bit integer.
        if magnitude > 1u128 << 63 {
            return Err(ExtentParseError::Overflow);
        }
        Ok(Offset::Sparse)
    } else {
        if magnitude > i64::MAX as u128 {
            return Err(ExtentParseError::Overflow);
        }
        Ok(Offset::Physical(magnitude as u64))
    }
}

fn parse_length(s: &str) -> Result<u64, ExtentParseError> {
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ExtentParseError::BadGrammar);
    }
    let magnitude: u128 = s.parse().map_err(|_| ExtentParseError::Overflow)?;
    if magnitude > i64::MAX as u128 {
        return Err(ExtentParseError::Overflow);
    }
    if magnitude == 0 {
        return Err(ExtentParseError::ZeroLength);
    }
    Ok(magnitude as u64)
}
