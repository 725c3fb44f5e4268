//! Driver for a memory-mapped AES-128 accelerator
//!
//! The unit transforms single 128-bit blocks. This crate drives its
//! registers ([`aes`]), splits requests into blocks ([`walk`]), layers the
//! ECB and CBC modes on top ([`mode`]) and manages attaching to the unit and
//! publishing it to a cipher registry ([`device`], [`driver`]).

#![no_std]

#[macro_use]
mod fmt;

pub mod aes;
pub mod block;
pub mod device;
pub mod driver;
pub mod io;
pub mod mode;
pub mod prelude;
pub mod regmap;
pub mod walk;

#[cfg(test)]
mod sim;

pub use crate::block::{Block, Key, BLOCK_SIZE, KEY_SIZE};
