//! A library to access the embedded controller of 51nb X210/X2100 laptops and building tools to do so.
//!
//! Besides the standard ACPI register space, the EC has a 16 MiB RAM space and
//! a GPIO space, reachable through vendor commands on the ACPI EC ports.
//! See [`ec`] for the protocol and the exposed endpoints.

#[macro_use]
extern crate log;

#[cfg(feature = "std")]
pub mod commandline;
pub mod config;
pub mod ec;
mod os_specific;
mod util;
