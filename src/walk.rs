//! Block-by-block iteration over buffers
//!
//! A request names a source and a destination, each a logically contiguous
//! run of bytes that may be split into several fragments in memory. The
//! walker hands the request to a per-block callback one [`Block`] at a time,
//! in ascending offset order, regardless of where fragment boundaries fall.
//!
//! Every source block is copied out before the callback runs, and the
//! callback's output is copied back before the next source block is read.
//! This makes in-place operation safe and matches the single transaction
//! slot of the AES unit.

use as_slice::{AsMutSlice, AsSlice};

use crate::block::{Block, BLOCK_SIZE};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The requested length isn't a multiple of [`BLOCK_SIZE`]
    ///
    /// Padding is up to the caller.
    Alignment { len: usize },
    /// A buffer holds fewer bytes than requested
    BufferTooShort { len: usize, available: usize },
}

/// A readable, possibly fragmented, run of bytes
pub trait BufferView {
    /// Total number of bytes
    fn len(&self) -> usize;

    /// Fills `out` with the bytes starting at `offset`
    ///
    /// The caller guarantees `offset + out.len() <= self.len()`.
    fn read_at(&self, offset: usize, out: &mut [u8]);
}

/// A writable, possibly fragmented, run of bytes
pub trait BufferViewMut: BufferView {
    /// Copies `data` into the buffer, starting at `offset`
    ///
    /// The caller guarantees `offset + data.len() <= self.len()`.
    fn write_at(&mut self, offset: usize, data: &[u8]);
}

impl BufferView for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn read_at(&self, offset: usize, out: &mut [u8]) {
        out.copy_from_slice(&self[offset..offset + out.len()]);
    }
}

impl BufferViewMut for [u8] {
    fn write_at(&mut self, offset: usize, data: &[u8]) {
        self[offset..offset + data.len()].copy_from_slice(data);
    }
}

/// A read-only scatter list
///
/// The fragments are concatenated in order. Empty fragments are allowed.
pub struct Scatter<'a, F> {
    fragments: &'a [F],
    len: usize,
}

impl<'a, F> Scatter<'a, F>
where
    F: AsSlice<Element = u8>,
{
    pub fn new(fragments: &'a [F]) -> Self {
        let len = fragments.iter().map(|f| f.as_slice().len()).sum();
        Scatter { fragments, len }
    }
}

impl<F> BufferView for Scatter<'_, F>
where
    F: AsSlice<Element = u8>,
{
    fn len(&self) -> usize {
        self.len
    }

    fn read_at(&self, offset: usize, out: &mut [u8]) {
        gather(self.fragments, offset, out)
    }
}

/// A writable scatter list
pub struct ScatterMut<'a, F> {
    fragments: &'a mut [F],
    len: usize,
}

impl<'a, F> ScatterMut<'a, F>
where
    F: AsMutSlice<Element = u8>,
{
    pub fn new(fragments: &'a mut [F]) -> Self {
        let len = fragments.iter().map(|f| f.as_slice().len()).sum();
        ScatterMut { fragments, len }
    }
}

impl<F> BufferView for ScatterMut<'_, F>
where
    F: AsMutSlice<Element = u8>,
{
    fn len(&self) -> usize {
        self.len
    }

    fn read_at(&self, offset: usize, out: &mut [u8]) {
        gather(&*self.fragments, offset, out)
    }
}

impl<F> BufferViewMut for ScatterMut<'_, F>
where
    F: AsMutSlice<Element = u8>,
{
    fn write_at(&mut self, offset: usize, data: &[u8]) {
        let mut skip = offset;
        let mut done = 0;

        for fragment in self.fragments.iter_mut() {
            if done == data.len() {
                break;
            }

            let fragment = fragment.as_mut_slice();
            if skip >= fragment.len() {
                skip -= fragment.len();
                continue;
            }

            let n = (fragment.len() - skip).min(data.len() - done);
            fragment[skip..skip + n].copy_from_slice(&data[done..done + n]);
            done += n;
            skip = 0;
        }
    }
}

fn gather<F>(fragments: &[F], offset: usize, out: &mut [u8])
where
    F: AsSlice<Element = u8>,
{
    let mut skip = offset;
    let mut done = 0;

    for fragment in fragments {
        if done == out.len() {
            break;
        }

        let fragment = fragment.as_slice();
        if skip >= fragment.len() {
            skip -= fragment.len();
            continue;
        }

        let n = (fragment.len() - skip).min(out.len() - done);
        out[done..done + n].copy_from_slice(&fragment[skip..skip + n]);
        done += n;
        skip = 0;
    }
}

/// Fails unless `len` is a whole number of blocks
pub fn check_alignment(len: usize) -> Result<(), Error> {
    if len % BLOCK_SIZE != 0 {
        return Err(Error::Alignment { len });
    }
    Ok(())
}

fn check(len: usize, available: usize) -> Result<(), Error> {
    check_alignment(len)?;
    if available < len {
        return Err(Error::BufferTooShort { len, available });
    }
    Ok(())
}

/// Walks `len` bytes of `src` and `dst` block by block
///
/// Calls `per_block` once per block with the source block and the output
/// block to fill. Fails before the first call if `len` isn't block-aligned
/// or either buffer is too short. Stops at the first error returned by
/// `per_block`; blocks before it have been written, blocks after it haven't.
pub fn walk<S, D, F, E>(src: &S, dst: &mut D, len: usize, mut per_block: F) -> Result<(), E>
where
    S: BufferView + ?Sized,
    D: BufferViewMut + ?Sized,
    F: FnMut(&Block, &mut Block) -> Result<(), E>,
    E: From<Error>,
{
    check(len, src.len())?;
    check(len, dst.len())?;

    let mut input = [0; BLOCK_SIZE];
    let mut output = [0; BLOCK_SIZE];
    for offset in (0..len).step_by(BLOCK_SIZE) {
        src.read_at(offset, &mut input);
        per_block(&input, &mut output)?;
        dst.write_at(offset, &output);
    }

    Ok(())
}

/// Walks `len` bytes of `buf` block by block, writing results back in place
///
/// Same contract as [`walk`].
pub fn walk_in_place<B, F, E>(buf: &mut B, len: usize, mut per_block: F) -> Result<(), E>
where
    B: BufferViewMut + ?Sized,
    F: FnMut(&Block, &mut Block) -> Result<(), E>,
    E: From<Error>,
{
    check(len, buf.len())?;

    let mut input = [0; BLOCK_SIZE];
    let mut output = [0; BLOCK_SIZE];
    for offset in (0..len).step_by(BLOCK_SIZE) {
        buf.read_at(offset, &mut input);
        per_block(&input, &mut output)?;
        buf.write_at(offset, &output);
    }

    Ok(())
}
