//! Interface to the AES unit
//!
//! The unit transforms one 128-bit block at a time and has a single
//! transaction slot. An operand is written to DATA_IN, writing an opcode to
//! CONTROL starts the transform, STATUS turns non-zero once the result can be
//! read from DATA_OUT. There is no interrupt, completion is found by polling.
//!
//! Callers must serialize access. [`Aes`] takes `&mut self` for every
//! operation, which is enough within one thread of control; sharing it
//! between threads needs an external lock.

use core::{
    hint::spin_loop,
    sync::atomic::{compiler_fence, Ordering},
};

use void::Void;

use crate::{
    block::{Block, Key},
    io::RegisterIo,
    regmap::{Operation, RegisterLayout},
};

/// Number of STATUS reads before a transaction is declared dead
pub const DEFAULT_POLL_LIMIT: u32 = 1_000_000;

/// Configuration of the register protocol
#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub layout: RegisterLayout,
    pub poll_limit: u32,
}

impl Config {
    pub fn layout(mut self, layout: RegisterLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Maximum number of STATUS reads per transaction
    ///
    /// At least one read is always made.
    pub fn poll_limit(mut self, poll_limit: u32) -> Self {
        self.poll_limit = poll_limit;
        self
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            layout: RegisterLayout::split(),
            poll_limit: DEFAULT_POLL_LIMIT,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// STATUS didn't signal completion within the configured number of reads
    Timeout,
    /// The register layout has no opcode for this operation
    Unsupported(Operation),
    /// A transaction is still running in the unit's only slot
    Busy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Busy(Operation),
    Done(Operation),
}

/// Entry point to the AES unit
pub struct Aes<IO> {
    io: IO,
    config: Config,
    state: State,
    keyed: bool,
}

impl<IO> Aes<IO>
where
    IO: RegisterIo,
{
    /// Takes ownership of the register region
    pub fn new(io: IO, config: Config) -> Self {
        debug!("aes: new adapter, poll limit {}", config.poll_limit);

        Aes {
            io,
            config,
            state: State::Idle,
            keyed: false,
        }
    }

    pub fn layout(&self) -> &RegisterLayout {
        &self.config.layout
    }

    /// Whether a key has been loaded successfully
    pub fn is_keyed(&self) -> bool {
        self.keyed
    }

    /// Loads a key into the unit
    ///
    /// The unit has one key slot, so this replaces whatever key was loaded
    /// before. Loading produces no result in DATA_OUT.
    pub fn load_key(&mut self, key: &Key) -> Result<(), Error> {
        self.start(key, Operation::SetKey)?;
        self.keyed = false;
        self.wait()?;
        self.keyed = true;
        Ok(())
    }

    /// Writes one block and starts `op` on it, without waiting
    ///
    /// Nothing is written if the layout has no opcode for `op`, or if the
    /// previous transaction hasn't completed yet.
    pub fn start(&mut self, block: &Block, op: Operation) -> Result<(), Error> {
        if let State::Busy(_) = self.state {
            return Err(Error::Busy);
        }

        let opcode = match self.config.layout.opcodes.encode(op) {
            Some(opcode) => opcode,
            None => return Err(Error::Unsupported(op)),
        };

        trace!("aes: start {:?}", op);

        self.io.write_block(self.config.layout.data_in, block);

        // "Preceding reads and writes cannot be moved past subsequent writes."
        compiler_fence(Ordering::Release);
        self.io.write_word(self.config.layout.control, opcode);

        self.state = State::Busy(op);
        Ok(())
    }

    /// Checks once whether the running transaction has finished
    ///
    /// Returns immediately if no transaction is running.
    pub fn poll(&mut self) -> nb::Result<(), Void> {
        let op = match self.state {
            State::Busy(op) => op,
            _ => return Ok(()),
        };

        if self.io.read_word(self.config.layout.status) == 0 {
            return Err(nb::Error::WouldBlock);
        }

        // "Subsequent reads and writes cannot be moved ahead of preceding reads."
        compiler_fence(Ordering::Acquire);
        self.state = State::Done(op);
        Ok(())
    }

    /// Waits for the running transaction, giving up after
    /// [`Config::poll_limit`] STATUS reads
    ///
    /// After a timeout the transaction is still considered running. Use
    /// [`Aes::abandon`] before starting another one.
    pub fn wait(&mut self) -> Result<(), Error> {
        for _ in 0..self.config.poll_limit.max(1) {
            match self.poll() {
                Ok(()) => return Ok(()),
                Err(nb::Error::WouldBlock) => spin_loop(),
                Err(nb::Error::Other(never)) => void::unreachable(never),
            }
        }

        error!(
            "aes: no completion after {} status reads",
            self.config.poll_limit
        );
        Err(Error::Timeout)
    }

    /// Gives up on a transaction that didn't complete
    ///
    /// The unit may still be working on it. Whatever it produces is never
    /// read.
    pub fn abandon(&mut self) {
        if let State::Busy(op) = self.state {
            warn!("aes: abandoning {:?}", op);
            if op == Operation::SetKey {
                self.keyed = false;
            }
        }
        self.state = State::Idle;
    }

    /// Writes one block, starts `op` on it and waits for completion
    pub fn submit_block(&mut self, block: &Block, op: Operation) -> Result<(), Error> {
        self.start(block, op)?;
        self.wait()
    }

    /// Reads the result of the last completed encryption or decryption
    ///
    /// Only meaningful after [`Aes::submit_block`] returned `Ok`. Otherwise
    /// DATA_OUT holds stale or undefined data.
    pub fn read_result(&mut self) -> Block {
        match self.state {
            State::Done(Operation::Encrypt) | State::Done(Operation::Decrypt) => {}
            state => warn!("aes: reading result in state {:?}", state),
        }

        let block = self.io.read_block(self.config.layout.data_out);
        self.state = State::Idle;
        block
    }

    /// Processes one block of data
    ///
    /// Writes one block to the unit, waits until it is processed, then reads
    /// the processed block and returns it.
    pub fn process(&mut self, block: &Block, op: Operation) -> Result<Block, Error> {
        self.submit_block(block, op)?;
        Ok(self.read_result())
    }

    /// Releases the register region
    pub fn free(self) -> IO {
        self.io
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        block::BLOCK_SIZE,
        regmap::Opcodes,
        sim::{self, SimulatedAes},
    };

    fn counting() -> Block {
        let mut block = [0; BLOCK_SIZE];
        for (i, b) in block.iter_mut().enumerate() {
            *b = i as u8;
        }
        block
    }

    #[test]
    fn load_key_writes_key_without_result() {
        let hw = SimulatedAes::new(RegisterLayout::split());
        let mut aes = Aes::new(hw.bus(), Config::default());
        let key = [0x2b; 16];

        assert!(!aes.is_keyed());
        aes.load_key(&key).unwrap();

        assert!(aes.is_keyed());
        assert_eq!(hw.key(), Some(key));
        assert_eq!(hw.triggers(), 1);
        assert_eq!(hw.result_reads(), 0);
    }

    #[test]
    fn process_matches_fips_197() {
        let hw = SimulatedAes::new(RegisterLayout::split());
        let mut aes = Aes::new(hw.bus(), Config::default());

        let plaintext = [
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff,
        ];
        let ciphertext = [
            0x69, 0xc4, 0xe0, 0xd8, 0x6a, 0x7b, 0x04, 0x30, 0xd8, 0xcd, 0xb7, 0x80, 0x70, 0xb4,
            0xc5, 0x5a,
        ];

        aes.load_key(&counting()).unwrap();
        assert_eq!(aes.process(&plaintext, Operation::Encrypt), Ok(ciphertext));
        assert_eq!(aes.process(&ciphertext, Operation::Decrypt), Ok(plaintext));
        assert_eq!(hw.triggers(), 3);
    }

    #[test]
    fn sequential_opcodes() {
        let layout = RegisterLayout::split().opcodes(Opcodes::sequential());
        let hw = SimulatedAes::new(layout);
        let mut aes = Aes::new(hw.bus(), Config::default().layout(layout));
        let key = [7; 16];

        aes.load_key(&key).unwrap();
        let out = aes.process(&counting(), Operation::Encrypt).unwrap();
        assert_eq!(out, sim::encrypt(&key, &counting()));
        assert_eq!(hw.last_control(), Some(0));
    }

    #[test]
    fn poll_reports_would_block_while_busy() {
        let hw = SimulatedAes::new(RegisterLayout::split());
        hw.set_latency(2);
        let mut aes = Aes::new(hw.bus(), Config::default());

        assert!(aes.poll().is_ok());

        aes.start(&counting(), Operation::Encrypt).unwrap();
        assert!(matches!(aes.poll(), Err(nb::Error::WouldBlock)));
        assert!(matches!(aes.poll(), Err(nb::Error::WouldBlock)));
        assert!(aes.poll().is_ok());
        assert_eq!(hw.status_reads(), 3);

        // Finished transactions don't touch STATUS again
        assert!(aes.poll().is_ok());
        assert_eq!(hw.status_reads(), 3);
    }

    #[test]
    fn slow_unit_within_limit() {
        let hw = SimulatedAes::new(RegisterLayout::split());
        hw.set_latency(9);
        let mut aes = Aes::new(hw.bus(), Config::default().poll_limit(10));

        assert_eq!(aes.load_key(&[1; 16]), Ok(()));
        assert_eq!(hw.status_reads(), 10);
    }

    #[test]
    fn hung_unit_times_out() {
        let hw = SimulatedAes::new(RegisterLayout::split());
        let mut aes = Aes::new(hw.bus(), Config::default().poll_limit(16));

        aes.load_key(&[1; 16]).unwrap();
        assert!(aes.is_keyed());

        hw.hang();
        assert_eq!(
            aes.submit_block(&counting(), Operation::Encrypt),
            Err(Error::Timeout)
        );
        assert_eq!(hw.status_reads(), 1 + 16);

        // The slot stays occupied until the transaction is abandoned
        assert_eq!(aes.load_key(&[2; 16]), Err(Error::Busy));
        assert!(aes.is_keyed());
        assert_eq!(hw.triggers(), 2);
        aes.abandon();

        // A key load that never completes leaves the unit unkeyed
        assert_eq!(aes.load_key(&[2; 16]), Err(Error::Timeout));
        assert!(!aes.is_keyed());
        aes.abandon();
        assert!(!aes.is_keyed());
    }

    #[test]
    fn latency_equal_to_poll_limit_times_out() {
        let hw = SimulatedAes::new(RegisterLayout::split());
        hw.set_latency(10);
        let mut aes = Aes::new(hw.bus(), Config::default().poll_limit(10));

        assert_eq!(aes.load_key(&[1; 16]), Err(Error::Timeout));
        assert_eq!(hw.status_reads(), 10);
        assert!(!aes.is_keyed());
    }

    #[test]
    fn second_start_while_busy_is_rejected() {
        let hw = SimulatedAes::new(RegisterLayout::split());
        hw.set_latency(3);
        let mut aes = Aes::new(hw.bus(), Config::default());
        aes.load_key(&[1; 16]).unwrap();

        aes.start(&counting(), Operation::Encrypt).unwrap();
        assert_eq!(
            aes.start(&[0xff; BLOCK_SIZE], Operation::Decrypt),
            Err(Error::Busy)
        );
        assert_eq!(hw.triggers(), 2);

        // The first transaction is unaffected
        aes.wait().unwrap();
        assert_eq!(aes.read_result(), sim::encrypt(&[1; 16], &counting()));
        assert!(aes.start(&counting(), Operation::Decrypt).is_ok());
    }

    #[test]
    fn abandon_frees_the_slot() {
        let hw = SimulatedAes::new(RegisterLayout::split());
        let mut aes = Aes::new(hw.bus(), Config::default().poll_limit(4));
        aes.load_key(&[1; 16]).unwrap();

        hw.set_latency(100);
        assert_eq!(
            aes.process(&counting(), Operation::Encrypt),
            Err(Error::Timeout)
        );
        aes.abandon();

        hw.set_latency(0);
        assert_eq!(
            aes.process(&counting(), Operation::Encrypt),
            Ok(sim::encrypt(&[1; 16], &counting()))
        );
        assert!(aes.is_keyed());
    }

    #[test]
    fn zero_poll_limit_still_polls_once() {
        let hw = SimulatedAes::new(RegisterLayout::split());
        let mut aes = Aes::new(hw.bus(), Config::default().poll_limit(0));

        assert_eq!(aes.load_key(&[1; 16]), Ok(()));
        assert_eq!(hw.status_reads(), 1);
    }

    #[test]
    fn shared_layout_cannot_load_keys() {
        let layout = RegisterLayout::shared();
        let hw = SimulatedAes::new(layout);
        let mut aes = Aes::new(hw.bus(), Config::default().layout(layout));

        assert_eq!(
            aes.load_key(&[1; 16]),
            Err(Error::Unsupported(Operation::SetKey))
        );
        assert!(!aes.is_keyed());
        assert_eq!(hw.triggers(), 0);
    }

    #[test]
    fn shared_layout_transforms_with_factory_key() {
        let layout = RegisterLayout::shared();
        let hw = SimulatedAes::new(layout);
        let key = [0x5a; 16];
        hw.preload_key(key);
        let mut aes = Aes::new(hw.bus(), Config::default().layout(layout));

        let ciphertext = aes.process(&counting(), Operation::Encrypt).unwrap();
        assert_eq!(ciphertext, sim::encrypt(&key, &counting()));
        assert_eq!(aes.process(&ciphertext, Operation::Decrypt), Ok(counting()));
    }

    #[test]
    fn free_returns_register_access() {
        let hw = SimulatedAes::new(RegisterLayout::split());
        let aes = Aes::new(hw.bus(), Config::default());

        let mut bus = aes.free();
        bus.write_word(RegisterLayout::split().control, 0xffff_0000);
        assert_eq!(hw.triggers(), 1);
    }
}
