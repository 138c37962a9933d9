//! Core type definitions using newtype patterns for type safety.
//!
//! These types make invalid inputs unrepresentable once parsed: a
//! `PortInterval` is never reversed and an `AddressRange` is always a
//! well-formed IPv4 block.

mod port;
mod range;
mod target;

pub use port::PortInterval;
pub use range::{AddressRange, Addresses};
pub use target::ScanTarget;
