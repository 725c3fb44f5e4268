//! Binding the AES unit to a cipher registry
//!
//! [`probe`] publishes the modes the unit offers and attaches to it,
//! [`remove`] tears both down again. A failing probe leaves nothing behind:
//! every step already taken is undone in reverse order.

use crate::{
    block::{BLOCK_SIZE, KEY_SIZE},
    device::{AttachError, Device, DeviceManager, Platform, Region},
    io::RegisterIo,
    mode::Cipher,
};

/// Name of the driver
pub const DRIVER_NAME: &str = "aesdriver";

/// Describes a cipher mode offered to the registry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Algorithm {
    /// Generic name, e.g. `ecb(aes)`
    pub name: &'static str,
    /// Name of this particular implementation
    pub driver_name: &'static str,
    /// Preference over other implementations of `name`, higher wins
    pub priority: u32,
    pub block_size: usize,
    pub min_key_size: usize,
    pub max_key_size: usize,
    pub iv_size: usize,
}

pub const ECB_AES: Algorithm = Algorithm {
    name: "ecb(aes)",
    driver_name: "aesdriver-ecb",
    priority: 100,
    block_size: BLOCK_SIZE,
    min_key_size: KEY_SIZE,
    max_key_size: KEY_SIZE,
    iv_size: 0,
};

pub const CBC_AES: Algorithm = Algorithm {
    name: "cbc(aes)",
    driver_name: "aesdriver-cbc",
    priority: 100,
    block_size: BLOCK_SIZE,
    min_key_size: KEY_SIZE,
    max_key_size: KEY_SIZE,
    iv_size: BLOCK_SIZE,
};

/// The host's table of cipher implementations
pub trait Registry {
    type Error;

    fn register(&mut self, algorithm: &'static Algorithm) -> Result<(), Self::Error>;

    fn unregister(&mut self, algorithm: &'static Algorithm);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeError<E> {
    /// The registry refused an algorithm
    Register(E),
    /// No register region was given
    NoMemoryResource,
    Attach(AttachError),
}

impl<E> From<AttachError> for ProbeError<E> {
    fn from(error: AttachError) -> Self {
        ProbeError::Attach(error)
    }
}

/// A probed unit and the algorithms published for it
pub struct Driver<IO> {
    device: Device<IO>,
    cbc: bool,
}

impl<IO> Driver<IO>
where
    IO: RegisterIo,
{
    pub fn device(&self) -> &Device<IO> {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut Device<IO> {
        &mut self.device
    }

    pub fn cipher(&mut self) -> Cipher<'_, IO> {
        self.device.cipher()
    }

    /// Algorithms currently registered for this unit
    pub fn algorithms(&self) -> impl Iterator<Item = &'static Algorithm> {
        let cbc: Option<&'static Algorithm> = if self.cbc { Some(&CBC_AES) } else { None };
        Some(&ECB_AES).into_iter().chain(cbc)
    }
}

/// Registers the algorithms and attaches to the unit at `resource`
///
/// `cbc(aes)` is only registered if the configured layout offers chaining.
pub fn probe<P, R, const N: usize>(
    manager: &mut DeviceManager<P, N>,
    registry: &mut R,
    resource: Option<Region>,
) -> Result<Driver<P::Io>, ProbeError<R::Error>>
where
    P: Platform,
    R: Registry,
{
    let cbc = manager.config().layout.chaining;

    if let Err(e) = registry.register(&ECB_AES) {
        error!("{}: failed to register {}", DRIVER_NAME, ECB_AES.driver_name);
        return Err(ProbeError::Register(e));
    }

    if cbc {
        if let Err(e) = registry.register(&CBC_AES) {
            error!("{}: failed to register {}", DRIVER_NAME, CBC_AES.driver_name);
            registry.unregister(&ECB_AES);
            return Err(ProbeError::Register(e));
        }
    }

    let attached = match resource {
        Some(region) => manager.attach(region).map_err(ProbeError::from),
        None => {
            error!("{}: no memory resource", DRIVER_NAME);
            Err(ProbeError::NoMemoryResource)
        }
    };

    match attached {
        Ok(device) => {
            info!("{}: probed", DRIVER_NAME);
            Ok(Driver { device, cbc })
        }
        Err(e) => {
            if cbc {
                registry.unregister(&CBC_AES);
            }
            registry.unregister(&ECB_AES);
            error!("{}: failed to initialize device", DRIVER_NAME);
            Err(e)
        }
    }
}

/// Detaches from the unit and unregisters its algorithms
pub fn remove<P, R, const N: usize>(
    driver: Driver<P::Io>,
    manager: &mut DeviceManager<P, N>,
    registry: &mut R,
) where
    P: Platform,
    R: Registry,
{
    let Driver { device, cbc } = driver;

    manager.detach(device);
    if cbc {
        registry.unregister(&CBC_AES);
    }
    registry.unregister(&ECB_AES);

    info!("{}: removed", DRIVER_NAME);
}
