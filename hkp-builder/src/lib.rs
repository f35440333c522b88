#![no_std]

#[cfg(feature = "rp")]
pub mod rp;

#[cfg(feature = "defmt")]
use defmt_rtt as _;

pub use hkp_firmware::*;
