//! Attaching to and detaching from the AES unit
//!
//! The [`DeviceManager`] hands out at most one [`Device`] per register
//! region. Attaching reserves the region, maps it through the [`Platform`]
//! and builds the [`Aes`] adapter on top. Detaching undoes all of that.

use heapless::Vec;

use crate::{
    aes::{self, Aes},
    io::{Mmio, RegisterIo},
    mode::Cipher,
};

/// Number of bytes reserved and mapped for every attached unit
pub const MIN_REGION_SIZE: usize = 512;

/// A span of the physical address space
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub start: usize,
    pub size: usize,
}

impl Region {
    pub const fn new(start: usize, size: usize) -> Self {
        Region { start, size }
    }

    /// First address past the region
    pub fn end(&self) -> usize {
        self.start.saturating_add(self.size)
    }

    pub fn overlaps(&self, other: &Region) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachError {
    /// Part of the region belongs to another attached device
    AlreadyReserved,
    /// The reservation table is full
    TooManyRegions,
    /// The platform couldn't map the region
    MapFailed,
    /// The register layout reaches past the mapped region
    LayoutOutOfBounds,
    /// A register offset of the layout isn't word-aligned
    MisalignedLayout,
}

/// Maps physical register regions into addressable memory
pub trait Platform {
    type Io: RegisterIo;

    /// Maps `size` bytes starting at physical address `start`
    fn map(&mut self, start: usize, size: usize) -> Option<Self::Io>;

    /// Unmaps a region returned by [`Platform::map`]
    fn unmap(&mut self, io: Self::Io);
}

/// Platform for targets where physical addresses are directly accessible
pub struct IdentityMapped {
    _private: (),
}

impl IdentityMapped {
    /// # Safety
    ///
    /// Every region later attached through this platform must be device
    /// memory that nothing else accesses while it is attached.
    pub unsafe fn new() -> Self {
        IdentityMapped { _private: () }
    }
}

impl Platform for IdentityMapped {
    type Io = Mmio;

    fn map(&mut self, start: usize, size: usize) -> Option<Mmio> {
        // Safe, as guaranteed by the caller of `IdentityMapped::new`.
        unsafe { Mmio::new(start as *mut u8, size) }
    }

    fn unmap(&mut self, _: Mmio) {}
}

/// An attached AES unit
pub struct Device<IO> {
    region: Region,
    aes: Aes<IO>,
}

impl<IO> Device<IO>
where
    IO: RegisterIo,
{
    /// The reserved region
    pub fn region(&self) -> Region {
        self.region
    }

    pub fn aes(&self) -> &Aes<IO> {
        &self.aes
    }

    pub fn aes_mut(&mut self) -> &mut Aes<IO> {
        &mut self.aes
    }

    pub fn cipher(&mut self) -> Cipher<'_, IO> {
        Cipher::new(&mut self.aes)
    }
}

/// Owns the reservations of all attached units
///
/// `N` is the maximum number of units attached at the same time.
pub struct DeviceManager<P, const N: usize> {
    platform: P,
    config: aes::Config,
    reserved: Vec<Region, N>,
}

impl<P, const N: usize> DeviceManager<P, N>
where
    P: Platform,
{
    pub fn new(platform: P, config: aes::Config) -> Self {
        DeviceManager {
            platform,
            config,
            reserved: Vec::new(),
        }
    }

    pub fn config(&self) -> &aes::Config {
        &self.config
    }

    /// Whether any part of `region` is reserved
    pub fn is_reserved(&self, region: &Region) -> bool {
        self.reserved.iter().any(|r| r.overlaps(region))
    }

    /// Attaches to the unit whose registers start at `region.start`
    ///
    /// Always claims [`MIN_REGION_SIZE`] bytes, whatever `region.size` says.
    /// Nothing stays reserved or mapped if this fails.
    pub fn attach(&mut self, region: Region) -> Result<Device<P::Io>, AttachError> {
        let region = Region::new(region.start, MIN_REGION_SIZE);

        self.reserve(region)?;

        if self.config.layout.span() > region.size {
            error!(
                "aes: layout needs {} bytes, region has {}",
                self.config.layout.span(),
                region.size
            );
            self.release(&region);
            return Err(AttachError::LayoutOutOfBounds);
        }
        if !self.config.layout.is_word_aligned() {
            error!("aes: layout has misaligned registers");
            self.release(&region);
            return Err(AttachError::MisalignedLayout);
        }

        let io = match self.platform.map(region.start, region.size) {
            Some(io) => io,
            None => {
                error!("aes: failed to map {:#x}", region.start);
                self.release(&region);
                return Err(AttachError::MapFailed);
            }
        };

        info!("aes: attached at {:#x}", region.start);
        Ok(Device {
            region,
            aes: Aes::new(io, self.config),
        })
    }

    /// Unmaps and releases an attached unit
    pub fn detach(&mut self, device: Device<P::Io>) {
        let Device { region, aes } = device;

        self.platform.unmap(aes.free());
        self.release(&region);
        info!("aes: detached from {:#x}", region.start);
    }

    /// Releases the platform
    ///
    /// Attached devices stay mapped.
    pub fn free(self) -> P {
        self.platform
    }

    fn reserve(&mut self, region: Region) -> Result<(), AttachError> {
        if self.is_reserved(&region) {
            warn!("aes: region at {:#x} already reserved", region.start);
            return Err(AttachError::AlreadyReserved);
        }

        self.reserved
            .push(region)
            .map_err(|_| AttachError::TooManyRegions)
    }

    fn release(&mut self, region: &Region) {
        self.reserved.retain(|r| r != region);
    }
}
