//! Register layout of the AES unit
//!
//! Two incompatible register maps exist for this unit. The four-register
//! map puts DATA_IN, DATA_OUT, CONTROL and STATUS at distinct offsets and
//! knows three opcodes. The single-register map multiplexes all four roles
//! onto one address and only knows ENCRYPT and DECRYPT, so keys can't be
//! loaded and the chaining modes aren't offered for it.
//!
//! Neither map is hard-coded. Pass the one your hardware implements to
//! [`crate::aes::Config::layout`].

use crate::block::BLOCK_SIZE;

/// Width of the CONTROL and STATUS registers in bytes
pub const WORD_SIZE: usize = 4;

/// Operations the unit can be asked to perform
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Encrypt,
    Decrypt,
    SetKey,
}

/// Values written to CONTROL to trigger an operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Opcodes {
    pub encrypt: u32,
    pub decrypt: u32,
    /// `None` if the unit has no key-load operation
    pub set_key: Option<u32>,
}

impl Opcodes {
    /// 0 = ENCRYPT, 1 = DECRYPT, 2 = SET_KEY
    pub const fn sequential() -> Self {
        Opcodes {
            encrypt: 0,
            decrypt: 1,
            set_key: Some(2),
        }
    }

    /// Disjoint half-word patterns, as used by the Zybo bitstream
    pub const fn bit_encoded() -> Self {
        Opcodes {
            encrypt: 0x0000_0000,
            decrypt: 0x0000_ffff,
            set_key: Some(0xffff_0000),
        }
    }

    /// ENCRYPT and DECRYPT only
    pub const fn without_key_load() -> Self {
        Opcodes {
            encrypt: 0,
            decrypt: 1,
            set_key: None,
        }
    }

    /// Returns the CONTROL value for `op`, if the unit supports it
    pub fn encode(&self, op: Operation) -> Option<u32> {
        match op {
            Operation::Encrypt => Some(self.encrypt),
            Operation::Decrypt => Some(self.decrypt),
            Operation::SetKey => self.set_key,
        }
    }

    /// Maps a CONTROL value back to the operation it triggers
    pub fn decode(&self, value: u32) -> Option<Operation> {
        if value == self.encrypt {
            Some(Operation::Encrypt)
        } else if value == self.decrypt {
            Some(Operation::Decrypt)
        } else if Some(value) == self.set_key {
            Some(Operation::SetKey)
        } else {
            None
        }
    }
}

/// Offsets of the registers relative to the start of the mapped region
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterLayout {
    /// Operand block or key bytes, written
    pub data_in: usize,
    /// Result block, read
    pub data_out: usize,
    /// Opcode, written
    pub control: usize,
    /// 0 while busy, non-zero once the result is ready
    pub status: usize,
    pub opcodes: Opcodes,
    /// Whether the chaining modes are offered on this unit
    pub chaining: bool,
}

impl RegisterLayout {
    /// The four-register map
    ///
    /// | Offset | Register |
    /// |--------|----------|
    /// | 0x00   | DATA_IN  |
    /// | 0x10   | DATA_OUT |
    /// | 0x20   | CONTROL  |
    /// | 0x24   | STATUS   |
    pub const fn split() -> Self {
        RegisterLayout {
            data_in: 0x00,
            data_out: 0x10,
            control: 0x20,
            status: 0x24,
            opcodes: Opcodes::bit_encoded(),
            chaining: true,
        }
    }

    /// The single-register map
    ///
    /// All roles live at offset 0. Block-wide accesses move data, word-wide
    /// accesses are CONTROL (write) and STATUS (read).
    pub const fn shared() -> Self {
        RegisterLayout {
            data_in: 0x00,
            data_out: 0x00,
            control: 0x00,
            status: 0x00,
            opcodes: Opcodes::without_key_load(),
            chaining: false,
        }
    }

    /// Replaces the opcode encoding
    pub fn opcodes(mut self, opcodes: Opcodes) -> Self {
        self.opcodes = opcodes;
        self
    }

    /// Whether keys can be loaded through this layout
    pub fn supports_key_load(&self) -> bool {
        self.opcodes.set_key.is_some()
    }

    /// Whether every register starts on a word boundary
    pub fn is_word_aligned(&self) -> bool {
        [self.data_in, self.data_out, self.control, self.status]
            .iter()
            .all(|offset| offset % WORD_SIZE == 0)
    }

    /// Number of bytes, from offset 0, that the layout touches
    pub fn span(&self) -> usize {
        let ends = [
            self.data_in.saturating_add(BLOCK_SIZE),
            self.data_out.saturating_add(BLOCK_SIZE),
            self.control.saturating_add(WORD_SIZE),
            self.status.saturating_add(WORD_SIZE),
        ];
        let mut span = 0;
        for end in ends.iter() {
            span = span.max(*end);
        }
        span
    }
}

impl Default for RegisterLayout {
    fn default() -> Self {
        RegisterLayout::split()
    }
}
