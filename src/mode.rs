//! Block cipher modes of operation on top of the AES unit
//!
//! The unit only knows how to transform a single block. [`Cipher`] walks a
//! request block by block and lets a [`Mode`] decide what goes into the unit
//! and what comes out of it. Nothing is kept between requests, except what
//! the caller keeps in a [`Cbc`] (or passes back in as the next IV).

use crate::{
    aes::{self, Aes},
    block::{xor_blocks, Block, Key, KEY_SIZE},
    io::RegisterIo,
    regmap::Operation,
    walk::{self, BufferView, BufferViewMut},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The request length isn't a multiple of the block size
    Alignment { len: usize },
    /// A buffer holds fewer bytes than requested
    BufferTooShort { len: usize, available: usize },
    /// Encryption or decryption attempted before a key was loaded
    KeyNotSet,
    /// Only 128-bit keys are supported
    InvalidKeyLength(usize),
    /// The register layout of the unit doesn't offer this mode
    Unsupported,
    /// The unit failed or didn't finish in time
    Device(aes::Error),
}

impl From<walk::Error> for Error {
    fn from(error: walk::Error) -> Self {
        match error {
            walk::Error::Alignment { len } => Error::Alignment { len },
            walk::Error::BufferTooShort { len, available } => {
                Error::BufferTooShort { len, available }
            }
        }
    }
}

impl From<aes::Error> for Error {
    fn from(error: aes::Error) -> Self {
        Error::Device(error)
    }
}

/// Implemented for all chaining modes
///
/// A mode receives one source block at a time and produces one output block,
/// using the unit as often as it needs to.
pub trait Mode {
    /// Name used in log messages
    const NAME: &'static str;

    /// Whether the mode chains blocks, which not every unit supports
    fn chained(&self) -> bool {
        false
    }

    fn encrypt_block<IO>(
        &mut self,
        aes: &mut Aes<IO>,
        input: &Block,
        output: &mut Block,
    ) -> Result<(), aes::Error>
    where
        IO: RegisterIo;

    fn decrypt_block<IO>(
        &mut self,
        aes: &mut Aes<IO>,
        input: &Block,
        output: &mut Block,
    ) -> Result<(), aes::Error>
    where
        IO: RegisterIo;
}

/// The ECB (electronic code book) mode
///
/// Every block is transformed on its own. Identical plaintext blocks give
/// identical ciphertext blocks.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ecb;

impl Mode for Ecb {
    const NAME: &'static str = "ecb";

    fn encrypt_block<IO>(
        &mut self,
        aes: &mut Aes<IO>,
        input: &Block,
        output: &mut Block,
    ) -> Result<(), aes::Error>
    where
        IO: RegisterIo,
    {
        *output = aes.process(input, Operation::Encrypt)?;
        Ok(())
    }

    fn decrypt_block<IO>(
        &mut self,
        aes: &mut Aes<IO>,
        input: &Block,
        output: &mut Block,
    ) -> Result<(), aes::Error>
    where
        IO: RegisterIo,
    {
        *output = aes.process(input, Operation::Decrypt)?;
        Ok(())
    }
}

/// The CBC (cipher block chaining) mode
///
/// Holds the chaining value. It starts out as the IV and, after every block,
/// becomes the ciphertext block just produced (encryption) or consumed
/// (decryption). If a request fails part way, the chaining value belongs to
/// the last block that was completed.
#[derive(Clone, Copy, Debug)]
pub struct Cbc {
    chain: Block,
}

impl Cbc {
    pub fn new(iv: Block) -> Self {
        Cbc { chain: iv }
    }

    /// The current chaining value, i.e. the IV for a follow-up request
    pub fn iv(&self) -> Block {
        self.chain
    }
}

impl Mode for Cbc {
    const NAME: &'static str = "cbc";

    fn chained(&self) -> bool {
        true
    }

    fn encrypt_block<IO>(
        &mut self,
        aes: &mut Aes<IO>,
        input: &Block,
        output: &mut Block,
    ) -> Result<(), aes::Error>
    where
        IO: RegisterIo,
    {
        let mixed = xor_blocks(input, &self.chain);
        let ciphertext = aes.process(&mixed, Operation::Encrypt)?;

        *output = ciphertext;
        self.chain = ciphertext;
        Ok(())
    }

    fn decrypt_block<IO>(
        &mut self,
        aes: &mut Aes<IO>,
        input: &Block,
        output: &mut Block,
    ) -> Result<(), aes::Error>
    where
        IO: RegisterIo,
    {
        // The next chaining value is this ciphertext block. Take it before
        // anything is written, the output may alias the input.
        let ciphertext = *input;
        let mixed = aes.process(&ciphertext, Operation::Decrypt)?;

        *output = xor_blocks(&mixed, &self.chain);
        self.chain = ciphertext;
        Ok(())
    }
}

/// Encrypts and decrypts buffers using the AES unit
///
/// Borrows the unit for as long as it exists. The key lives in the unit, so
/// it survives dropping the `Cipher`.
pub struct Cipher<'a, IO> {
    aes: &'a mut Aes<IO>,
}

impl<'a, IO> Cipher<'a, IO>
where
    IO: RegisterIo,
{
    pub fn new(aes: &'a mut Aes<IO>) -> Self {
        Cipher { aes }
    }

    /// Loads the key for all following requests
    pub fn set_key(&mut self, key: &[u8]) -> Result<(), Error> {
        if key.len() != KEY_SIZE {
            return Err(Error::InvalidKeyLength(key.len()));
        }

        let mut material: Key = [0; KEY_SIZE];
        material.copy_from_slice(key);

        info!("aes: set key");
        self.aes.load_key(&material)?;
        Ok(())
    }

    fn prepare<M>(&self, mode: &M, len: usize) -> Result<(), Error>
    where
        M: Mode,
    {
        walk::check_alignment(len)?;

        if mode.chained() && !self.aes.layout().chaining {
            warn!("aes: {} not supported by this unit", M::NAME);
            return Err(Error::Unsupported);
        }
        if !self.aes.is_keyed() {
            return Err(Error::KeyNotSet);
        }
        Ok(())
    }

    /// Encrypts `len` bytes from `src` into `dst`
    pub fn encrypt<M, S, D>(
        &mut self,
        mode: &mut M,
        src: &S,
        dst: &mut D,
        len: usize,
    ) -> Result<(), Error>
    where
        M: Mode,
        S: BufferView + ?Sized,
        D: BufferViewMut + ?Sized,
    {
        self.prepare(mode, len)?;
        debug!("aes: {} encrypt, {} bytes", M::NAME, len);

        let aes = &mut *self.aes;
        walk::walk(src, dst, len, |input, output| {
            mode.encrypt_block(aes, input, output).map_err(Error::from)
        })
    }

    /// Decrypts `len` bytes from `src` into `dst`
    pub fn decrypt<M, S, D>(
        &mut self,
        mode: &mut M,
        src: &S,
        dst: &mut D,
        len: usize,
    ) -> Result<(), Error>
    where
        M: Mode,
        S: BufferView + ?Sized,
        D: BufferViewMut + ?Sized,
    {
        self.prepare(mode, len)?;
        debug!("aes: {} decrypt, {} bytes", M::NAME, len);

        let aes = &mut *self.aes;
        walk::walk(src, dst, len, |input, output| {
            mode.decrypt_block(aes, input, output).map_err(Error::from)
        })
    }

    /// Encrypts the first `len` bytes of `buf` in place
    pub fn encrypt_in_place<M, B>(
        &mut self,
        mode: &mut M,
        buf: &mut B,
        len: usize,
    ) -> Result<(), Error>
    where
        M: Mode,
        B: BufferViewMut + ?Sized,
    {
        self.prepare(mode, len)?;
        debug!("aes: {} encrypt in place, {} bytes", M::NAME, len);

        let aes = &mut *self.aes;
        walk::walk_in_place(buf, len, |input, output| {
            mode.encrypt_block(aes, input, output).map_err(Error::from)
        })
    }

    /// Decrypts the first `len` bytes of `buf` in place
    pub fn decrypt_in_place<M, B>(
        &mut self,
        mode: &mut M,
        buf: &mut B,
        len: usize,
    ) -> Result<(), Error>
    where
        M: Mode,
        B: BufferViewMut + ?Sized,
    {
        self.prepare(mode, len)?;
        debug!("aes: {} decrypt in place, {} bytes", M::NAME, len);

        let aes = &mut *self.aes;
        walk::walk_in_place(buf, len, |input, output| {
            mode.decrypt_block(aes, input, output).map_err(Error::from)
        })
    }

    pub fn ecb_encrypt<S, D>(&mut self, src: &S, dst: &mut D, len: usize) -> Result<(), Error>
    where
        S: BufferView + ?Sized,
        D: BufferViewMut + ?Sized,
    {
        self.encrypt(&mut Ecb, src, dst, len)
    }

    pub fn ecb_decrypt<S, D>(&mut self, src: &S, dst: &mut D, len: usize) -> Result<(), Error>
    where
        S: BufferView + ?Sized,
        D: BufferViewMut + ?Sized,
    {
        self.decrypt(&mut Ecb, src, dst, len)
    }

    /// CBC-encrypts `len` bytes, chaining from `iv`
    ///
    /// On return `iv` holds the last ciphertext block, ready to continue the
    /// stream with another call.
    pub fn cbc_encrypt<S, D>(
        &mut self,
        src: &S,
        dst: &mut D,
        len: usize,
        iv: &mut Block,
    ) -> Result<(), Error>
    where
        S: BufferView + ?Sized,
        D: BufferViewMut + ?Sized,
    {
        let mut cbc = Cbc::new(*iv);
        let result = self.encrypt(&mut cbc, src, dst, len);
        *iv = cbc.iv();
        result
    }

    /// CBC-decrypts `len` bytes, chaining from `iv`
    ///
    /// On return `iv` holds the last ciphertext block consumed.
    pub fn cbc_decrypt<S, D>(
        &mut self,
        src: &S,
        dst: &mut D,
        len: usize,
        iv: &mut Block,
    ) -> Result<(), Error>
    where
        S: BufferView + ?Sized,
        D: BufferViewMut + ?Sized,
    {
        let mut cbc = Cbc::new(*iv);
        let result = self.decrypt(&mut cbc, src, dst, len);
        *iv = cbc.iv();
        result
    }
}
