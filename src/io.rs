//! Access to the register region of the AES unit

use core::ptr::NonNull;

use crate::{
    block::{Block, BLOCK_SIZE},
    regmap::WORD_SIZE,
};

/// Raw register access
///
/// Implemented by [`Mmio`] for real hardware. All accesses are expected to
/// reach the device in program order, without caching or merging.
pub trait RegisterIo {
    /// Copies one block into the region, starting at `offset`
    fn write_block(&mut self, offset: usize, block: &Block);

    /// Copies one block out of the region, starting at `offset`
    fn read_block(&mut self, offset: usize) -> Block;

    fn write_word(&mut self, offset: usize, value: u32);

    fn read_word(&mut self, offset: usize) -> u32;
}

impl<T> RegisterIo for &mut T
where
    T: RegisterIo + ?Sized,
{
    fn write_block(&mut self, offset: usize, block: &Block) {
        (**self).write_block(offset, block)
    }

    fn read_block(&mut self, offset: usize) -> Block {
        (**self).read_block(offset)
    }

    fn write_word(&mut self, offset: usize, value: u32) {
        (**self).write_word(offset, value)
    }

    fn read_word(&mut self, offset: usize) -> u32 {
        (**self).read_word(offset)
    }
}

/// A mapped, memory-mapped register region
///
/// Blocks are moved as four 32-bit little-endian words, lowest address
/// first. Every access is checked against the region: an offset that isn't
/// word-aligned or reaches past the end panics.
pub struct Mmio {
    base: NonNull<u8>,
    len: usize,
}

impl Mmio {
    /// Wraps a mapped region
    ///
    /// Returns `None` if `base` is null or not word-aligned.
    ///
    /// # Safety
    ///
    /// `base` must point to `len` bytes of device memory that stay mapped for
    /// as long as the returned value exists, and nothing else may access that
    /// memory in the meantime.
    pub unsafe fn new(base: *mut u8, len: usize) -> Option<Self> {
        let base = NonNull::new(base)?;
        if base.as_ptr() as usize % WORD_SIZE != 0 {
            return None;
        }

        Some(Mmio { base, len })
    }

    fn word(&self, offset: usize) -> *mut u32 {
        assert!(
            offset % WORD_SIZE == 0,
            "register offset {:#x} is not word-aligned",
            offset
        );
        assert!(
            offset
                .checked_add(WORD_SIZE)
                .map_or(false, |end| end <= self.len),
            "register offset {:#x} outside a {} byte region",
            offset,
            self.len
        );

        // Safe, as the offset was checked against the region handed to `new`.
        unsafe { self.base.as_ptr().add(offset) as *mut u32 }
    }
}

impl RegisterIo for Mmio {
    fn write_block(&mut self, offset: usize, block: &Block) {
        for (i, chunk) in block.chunks_exact(WORD_SIZE).enumerate() {
            let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            self.write_word(offset + i * WORD_SIZE, word);
        }
    }

    fn read_block(&mut self, offset: usize) -> Block {
        let mut block = [0; BLOCK_SIZE];
        for (i, chunk) in block.chunks_exact_mut(WORD_SIZE).enumerate() {
            let word = self.read_word(offset + i * WORD_SIZE);
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        block
    }

    fn write_word(&mut self, offset: usize, value: u32) {
        // Safe, see `Mmio::word` and the contract of `Mmio::new`.
        unsafe { self.word(offset).write_volatile(value) }
    }

    fn read_word(&mut self, offset: usize) -> u32 {
        // Safe, see `Mmio::word` and the contract of `Mmio::new`.
        unsafe { self.word(offset).read_volatile() }
    }
}
