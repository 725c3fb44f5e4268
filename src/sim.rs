//! A simulated AES unit for tests
//!
//! Models the register protocol of either layout: DATA_IN latches the
//! operand, a CONTROL write runs the transform, STATUS reads 0 for a
//! configurable number of reads before turning 1, DATA_OUT holds the result.
//! An unknown opcode, or [`SimulatedAes::hang`], makes STATUS stay 0 forever.

use core::cell::RefCell;

use ::aes::{
    cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit},
    Aes128,
};

use crate::{
    block::{Block, Key, BLOCK_SIZE},
    io::RegisterIo,
    regmap::{Operation, RegisterLayout},
};

/// Software AES-128 encryption of one block
pub fn encrypt(key: &Key, block: &Block) -> Block {
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut data = GenericArray::clone_from_slice(block);
    cipher.encrypt_block(&mut data);

    let mut out = [0; BLOCK_SIZE];
    out.copy_from_slice(&data);
    out
}

/// Software AES-128 decryption of one block
pub fn decrypt(key: &Key, block: &Block) -> Block {
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut data = GenericArray::clone_from_slice(block);
    cipher.decrypt_block(&mut data);

    let mut out = [0; BLOCK_SIZE];
    out.copy_from_slice(&data);
    out
}

struct Hardware {
    layout: RegisterLayout,
    key: Option<Key>,
    data_in: Block,
    data_out: Block,
    countdown: u32,
    latency: u32,
    hung: bool,
    last_control: Option<u32>,
    triggers: usize,
    status_reads: usize,
    result_reads: usize,
}

impl Hardware {
    fn trigger(&mut self, value: u32) {
        self.triggers += 1;
        self.last_control = Some(value);
        self.countdown = self.latency;

        let key = self.key.unwrap_or([0; BLOCK_SIZE]);
        match self.layout.opcodes.decode(value) {
            Some(Operation::SetKey) => self.key = Some(self.data_in),
            Some(Operation::Encrypt) => self.data_out = encrypt(&key, &self.data_in),
            Some(Operation::Decrypt) => self.data_out = decrypt(&key, &self.data_in),
            None => self.hung = true,
        }
    }

    fn status(&mut self) -> u32 {
        self.status_reads += 1;

        if self.hung {
            return 0;
        }
        if self.countdown > 0 {
            self.countdown -= 1;
            return 0;
        }

        1
    }
}

pub struct SimulatedAes {
    hw: RefCell<Hardware>,
}

impl SimulatedAes {
    pub fn new(layout: RegisterLayout) -> Self {
        SimulatedAes {
            hw: RefCell::new(Hardware {
                layout,
                key: None,
                data_in: [0; BLOCK_SIZE],
                data_out: [0; BLOCK_SIZE],
                countdown: 0,
                latency: 0,
                hung: false,
                last_control: None,
                triggers: 0,
                status_reads: 0,
                result_reads: 0,
            }),
        }
    }

    /// Register access to this unit
    pub fn bus(&self) -> Bus<'_> {
        Bus { hw: &self.hw }
    }

    /// Number of STATUS reads returning 0 after each trigger
    pub fn set_latency(&self, latency: u32) {
        self.hw.borrow_mut().latency = latency;
    }

    /// Keeps STATUS at 0 from now on
    pub fn hang(&self) {
        self.hw.borrow_mut().hung = true;
    }

    /// Installs a key without going through the register protocol
    pub fn preload_key(&self, key: Key) {
        self.hw.borrow_mut().key = Some(key);
    }

    pub fn key(&self) -> Option<Key> {
        self.hw.borrow().key
    }

    pub fn last_control(&self) -> Option<u32> {
        self.hw.borrow().last_control
    }

    /// Number of CONTROL writes so far
    pub fn triggers(&self) -> usize {
        self.hw.borrow().triggers
    }

    pub fn status_reads(&self) -> usize {
        self.hw.borrow().status_reads
    }

    /// Number of DATA_OUT reads so far
    pub fn result_reads(&self) -> usize {
        self.hw.borrow().result_reads
    }
}

/// Register access to a [`SimulatedAes`]
///
/// Accesses to an address the layout doesn't define panic.
pub struct Bus<'a> {
    hw: &'a RefCell<Hardware>,
}

impl RegisterIo for Bus<'_> {
    fn write_block(&mut self, offset: usize, block: &Block) {
        let mut hw = self.hw.borrow_mut();
        assert_eq!(offset, hw.layout.data_in, "block write outside DATA_IN");
        hw.data_in = *block;
    }

    fn read_block(&mut self, offset: usize) -> Block {
        let mut hw = self.hw.borrow_mut();
        assert_eq!(offset, hw.layout.data_out, "block read outside DATA_OUT");
        hw.result_reads += 1;
        hw.data_out
    }

    fn write_word(&mut self, offset: usize, value: u32) {
        let mut hw = self.hw.borrow_mut();
        assert_eq!(offset, hw.layout.control, "word write outside CONTROL");
        hw.trigger(value);
    }

    fn read_word(&mut self, offset: usize) -> u32 {
        let mut hw = self.hw.borrow_mut();
        assert_eq!(offset, hw.layout.status, "word read outside STATUS");
        hw.status()
    }
}
