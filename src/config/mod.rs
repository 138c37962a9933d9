//! Configuration management for Sweep.
//!
//! XDG-compliant settings storage.

mod settings;

pub use settings::{AppSettings, Paths};
