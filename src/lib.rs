#![no_std]
#[cfg(any(feature = "std", test))]
extern crate std;

#[cfg(any(feature = "host", feature = "device", test))]
mod mutex;

pub mod command;
pub mod crc16;
pub mod datagram;
pub mod parser;
pub mod registry;
#[cfg(feature = "host")]
pub mod host;
#[cfg(feature = "device")]
pub mod device;
